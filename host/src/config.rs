use anyhow::{Context, Result};
use esc_pwm::PwmConfig;
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf};

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Timer parameters, same fields as the firmware's `PwmConfig`
    pub pwm: PwmConfig,
    pub sweep_step_hz: u32,
    pub tone_frequency_hz: u32,
    pub tone_duration_msec: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            pwm: PwmConfig::default(),
            sweep_step_hz: 5_000,
            tone_frequency_hz: 2_000,
            tone_duration_msec: 100,
        }
    }
}

impl HostConfig {
    /// Priority: ESC_PWM_CONFIG env var, then ./esc-pwm.toml if it exists,
    /// then built-in defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var("ESC_PWM_CONFIG") {
            return Self::from_path(&PathBuf::from(p));
        }
        let p = env::current_dir()
            .context("Failed to read working directory")?
            .join("esc-pwm.toml");
        if p.exists() {
            return Self::from_path(&p);
        }
        Ok(Self::default())
    }

    fn from_path(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&s).with_context(|| format!("Failed to parse config (TOML) {}", path.display()))
    }

    fn parse(s: &str) -> Result<Self> {
        let cfg: HostConfig = toml::from_str(s)?;
        if cfg.sweep_step_hz == 0 {
            anyhow::bail!("sweep_step_hz must be non-zero");
        }
        Ok(cfg)
    }
}
