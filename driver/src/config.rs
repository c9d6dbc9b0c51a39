//! PWM timing configuration and the derived timer plan.

use crate::error::ConfigError;

/// Lowest accepted PWM frequency, Hz.
pub const MIN_FREQUENCY: u32 = 20_000;
/// Highest accepted PWM frequency, Hz.
pub const MAX_FREQUENCY: u32 = 50_000;

/// Below this many ticks per period the duty resolution is useless.
pub(crate) const MIN_PERIOD_TICKS: u64 = 100;
/// Longest period a 16-bit auto-reload register can count.
pub(crate) const MAX_PERIOD_TICKS: u64 = u16::MAX as u64 + 1;
/// ADC sampling period unit: hundredths of a microsecond.
const HNSEC_PER_SEC: u64 = 100_000_000;
const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Static PWM parameters of the power stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PwmConfig {
    /// Timer kernel clock, Hz
    pub timer_clock_hz: u32,
    /// Timer prescale factor (1 = undivided)
    pub prescaler: u16,
    /// Frequency used when `init` is called without one, Hz
    pub default_frequency_hz: u32,
    /// Gate driver dead time inserted between complementary switches, ns
    pub dead_time_ns: u32,
    /// Position of the ADC trigger inside the PWM period, per mille
    pub adc_trigger_phase_permille: u16,
    /// One ADC trigger every `adc_trigger_divider` PWM periods
    pub adc_trigger_divider: u8,
}

impl PwmConfig {
    pub const fn new() -> Self {
        Self {
            timer_clock_hz: 170_000_000, // TIM1 on APB2 at SYSCLK
            prescaler: 1,
            default_frequency_hz: 20_000,
            dead_time_ns: 400,
            adc_trigger_phase_permille: 500,
            adc_trigger_divider: 1,
        }
    }

    /// Derives the timer plan for `frequency_hz`.
    ///
    /// `PwmTop = timer_clock / (frequency × prescaler) − 1`. Frequencies
    /// outside [`MIN_FREQUENCY`, `MAX_FREQUENCY`] are rejected, never clamped.
    pub fn timing(&self, frequency_hz: u32) -> Result<PwmTiming, ConfigError> {
        if !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&frequency_hz) {
            return Err(ConfigError::FrequencyOutOfRange { frequency_hz });
        }
        self.validate()?;

        let clock = u64::from(self.timer_clock_hz);
        let prescaler = u64::from(self.prescaler);

        let period_ticks = clock / (u64::from(frequency_hz) * prescaler);
        if !(MIN_PERIOD_TICKS..=MAX_PERIOD_TICKS).contains(&period_ticks) {
            return Err(ConfigError::PeriodOutOfRange {
                ticks: period_ticks.min(u64::from(u32::MAX)) as u32,
            });
        }
        let top = (period_ticks - 1) as u16;

        // Dead time is counted on the undivided kernel clock.
        let dead_time_ticks = (u64::from(self.dead_time_ns) * clock).div_ceil(NSEC_PER_SEC);
        if dead_time_ticks * 8 > period_ticks * prescaler {
            return Err(ConfigError::DeadTimeTooLong {
                ticks: dead_time_ticks.min(u64::from(u32::MAX)) as u32,
            });
        }

        let adc_trigger_compare =
            ((u64::from(top) * u64::from(self.adc_trigger_phase_permille) + 500) / 1000) as u16;

        Ok(PwmTiming {
            frequency_hz,
            top,
            prescaler: self.prescaler,
            dead_time_ticks: dead_time_ticks as u16,
            adc_trigger_compare: adc_trigger_compare.min(top),
            adc_trigger_divider: self.adc_trigger_divider,
            timer_clock_hz: self.timer_clock_hz,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timer_clock_hz == 0 {
            return Err(ConfigError::InvalidConfig("timer clock is zero"));
        }
        if self.prescaler == 0 {
            return Err(ConfigError::InvalidConfig("prescaler is zero"));
        }
        if self.adc_trigger_divider == 0 {
            return Err(ConfigError::InvalidConfig("ADC trigger divider is zero"));
        }
        if self.adc_trigger_phase_permille > 1000 {
            return Err(ConfigError::InvalidConfig("ADC trigger phase above 1000 permille"));
        }
        Ok(())
    }
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Register-level timer plan derived from a [`PwmConfig`] and a frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmTiming {
    pub frequency_hz: u32,
    /// Auto-reload value; compare values live in `[0, top]`
    pub top: u16,
    pub prescaler: u16,
    /// Dead time in kernel clock ticks
    pub dead_time_ticks: u16,
    /// Compare value that fires the ADC trigger
    pub adc_trigger_compare: u16,
    pub adc_trigger_divider: u8,
    pub timer_clock_hz: u32,
}

impl PwmTiming {
    /// Time between ADC triggers in hundredths of a microsecond.
    pub fn adc_sampling_period_hnsec(&self) -> u32 {
        let ticks = (u64::from(self.top) + 1)
            * u64::from(self.prescaler)
            * u64::from(self.adc_trigger_divider);
        (ticks * HNSEC_PER_SEC / u64::from(self.timer_clock_hz)) as u32
    }

    /// Actual PWM frequency after integer division of the timer clock.
    pub fn effective_frequency_hz(&self) -> u32 {
        let ticks = (u32::from(self.top) + 1) * u32::from(self.prescaler);
        self.timer_clock_hz / ticks
    }
}
