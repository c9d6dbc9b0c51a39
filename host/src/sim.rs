//! Dry run of the driver against a stage that logs every register-level call.

use std::cell::Cell;

use anyhow::{Context, Result};
use esc_pwm::{
    MotorPwm, Phase, PhaseManipCommand, PhaseOutput, PowerStage, PwmConfig, PwmTiming, SafetyMode,
    SixStep,
};
use tracing::info;

/// Counts commits so the output shows which calls reached the pins.
#[derive(Default)]
pub struct TraceStage {
    commits: Cell<u32>,
}

impl PowerStage for TraceStage {
    fn configure(&self, timing: &PwmTiming) {
        info!(
            target: "stage",
            "configure top={} psc={} dtg={} trig@{} /{}",
            timing.top,
            timing.prescaler,
            timing.dead_time_ticks,
            timing.adc_trigger_compare,
            timing.adc_trigger_divider
        );
    }

    fn set_phase(&self, phase: Phase, output: PhaseOutput) {
        info!(target: "stage", "  {:?} <- {:?}", phase, output);
    }

    fn commit(&self) {
        self.commits.set(self.commits.get() + 1);
        info!(target: "stage", "commit #{}", self.commits.get());
    }

    fn enable_outputs(&self) {
        info!(target: "stage", "outputs ON");
    }

    fn disable_outputs(&self) {
        info!(target: "stage", "outputs OFF");
    }
}

/// Walks the driver through alignment, one electrical revolution and an
/// emergency stop.
pub fn run(config: PwmConfig, frequency_hz: u32, duty: f32) -> Result<()> {
    let pwm = MotorPwm::new(TraceStage::default(), config);

    pwm.init(Some(frequency_hz))
        .with_context(|| format!("Failed to configure PWM at {frequency_hz} Hz"))?;
    info!("mode={:?} top={}", pwm.mode(), pwm.pwm_top());

    pwm.manip(&[
        PhaseManipCommand::Half,
        PhaseManipCommand::Low,
        PhaseManipCommand::Floating,
    ]);
    pwm.energize(&[1, -1, 0]);
    info!("mode={:?}", pwm.mode());

    pwm.prepare_to_start();
    let pwm_val = pwm.compute_pwm_val(duty);
    info!("mode={:?} pwm_val={} for duty {}", pwm.mode(), pwm_val, duty);

    let mut step = SixStep::Step0;
    for _ in 0..SixStep::ALL.len() {
        pwm.set_step_from_isr(&step.commutation(), pwm_val);
        step = step.next();
    }

    pwm.emergency();
    // Ignored: latched
    pwm.set_step_from_isr(&step.commutation(), pwm_val);
    pwm.prepare_to_start();
    if pwm.mode() != SafetyMode::Emergency {
        anyhow::bail!("emergency latch did not hold: {:?}", pwm.mode());
    }

    pwm.set_freewheeling();
    info!(
        "mode={:?} after {} commits",
        pwm.mode(),
        pwm.stage().commits.get()
    );
    Ok(())
}
