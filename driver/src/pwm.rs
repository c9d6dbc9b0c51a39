//! Phase PWM driver: timing setup, step application and the safety latch

use core::sync::atomic::{AtomicU8, AtomicU16, AtomicU32, Ordering};

use crate::config::{PwmConfig, PwmTiming};
use crate::duty::duty_to_compare;
use crate::error::ConfigError;
use crate::mode::{ModeCell, SafetyMode};
use crate::six_step::{CommutationStep, NUM_PHASES, Phase};
use crate::stage::{PhaseOutput, PowerStage};

/// Direct per-phase drive for self-test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhaseManipCommand {
    /// Low side fully on
    Low,
    /// High side fully on
    High,
    /// Both switches off
    Floating,
    /// 50% complementary PWM
    Half,
}

impl PhaseManipCommand {
    fn output(self, top: u16) -> PhaseOutput {
        match self {
            Self::Low => PhaseOutput::Sink(top),
            Self::High => PhaseOutput::Source(top),
            Self::Floating => PhaseOutput::Floating,
            Self::Half => PhaseOutput::Source(top / 2),
        }
    }
}

/// Owned handle to the motor power stage.
///
/// All hardware state lives here and every method takes `&self`, so one
/// instance can sit in a `static` shared by the commutation interrupt and
/// scheduled code. The mode is an atomic checked by every output-producing
/// operation; phase writes run inside short critical sections so a
/// preempting `emergency` or `set_freewheeling` is never half-overwritten.
pub struct MotorPwm<S> {
    stage: S,
    config: PwmConfig,
    mode: ModeCell,
    /// 0 until the first successful `init`
    top: AtomicU16,
    frequency_hz: AtomicU32,
    sampling_period_hnsec: AtomicU32,
    pub(crate) tone_selector: AtomicU8,
}

impl<S: PowerStage> MotorPwm<S> {
    /// Wraps `stage` without touching the hardware; outputs stay as reset
    /// left them (disabled) until [`MotorPwm::init`] succeeds.
    pub const fn new(stage: S, config: PwmConfig) -> Self {
        Self {
            stage,
            config,
            mode: ModeCell::new(SafetyMode::Idle),
            top: AtomicU16::new(0),
            frequency_hz: AtomicU32::new(0),
            sampling_period_hnsec: AtomicU32::new(0),
            tone_selector: AtomicU8::new(0),
        }
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn config(&self) -> &PwmConfig {
        &self.config
    }

    pub fn mode(&self) -> SafetyMode {
        self.mode.load()
    }

    /// Current timer period in ticks; 0 before the first `init`.
    pub fn pwm_top(&self) -> u16 {
        self.top.load(Ordering::Relaxed)
    }

    /// Configured PWM frequency; 0 before the first `init`.
    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz.load(Ordering::Relaxed)
    }

    /// Programs edge-aligned PWM at `frequency_hz` (or the configured
    /// default) and returns to `Idle` with the output stage disabled.
    ///
    /// This is the only way out of `Emergency`. A rejected frequency leaves
    /// the hardware, the previous timing and the mode untouched.
    pub fn init(&self, frequency_hz: Option<u32>) -> Result<(), ConfigError> {
        let frequency_hz = frequency_hz.unwrap_or(self.config.default_frequency_hz);
        let timing = self
            .config
            .timing(frequency_hz)
            .and_then(|timing| {
                if timing.adc_trigger_divider > S::MAX_ADC_TRIGGER_DIVIDER {
                    return Err(ConfigError::InvalidConfig(
                        "ADC trigger divider not supported by the power stage",
                    ));
                }
                Ok(timing)
            })
            .inspect_err(|e| warn!("PWM init rejected: {}", e))?;

        critical_section::with(|_| {
            self.stage.disable_outputs();
            self.stage.configure(&timing);
            self.float_all();
            self.store_timing(&timing);
            self.mode.reset(SafetyMode::Idle);
        });

        info!(
            "PWM init: freq={}Hz, top={}, dead_time={} ticks, adc_period={} x10ns",
            timing.frequency_hz,
            timing.top,
            timing.dead_time_ticks,
            timing.adc_sampling_period_hnsec()
        );
        Ok(())
    }

    fn store_timing(&self, timing: &PwmTiming) {
        self.top.store(timing.top, Ordering::Relaxed);
        self.frequency_hz.store(timing.frequency_hz, Ordering::Relaxed);
        self.sampling_period_hnsec
            .store(timing.adc_sampling_period_hnsec(), Ordering::Relaxed);
    }

    /// Arms the power stage for commutation: every phase floating, pending
    /// compare writes discarded, outputs enabled, mode `Running`.
    ///
    /// Must precede the first [`MotorPwm::set_step_from_isr`]. Ignored before
    /// `init` and while the emergency latch is set.
    pub fn prepare_to_start(&self) {
        if self.pwm_top() == 0 {
            warn!("prepare_to_start before init, ignored");
            return;
        }
        let armed = critical_section::with(|_| {
            if !self.mode.transition(SafetyMode::Running) {
                return false;
            }
            self.float_all();
            self.stage.enable_outputs();
            true
        });
        if armed {
            debug!("power stage armed");
        } else {
            debug!("prepare_to_start ignored: emergency latched");
        }
    }

    /// Time between ADC triggers in hundredths of a microsecond.
    pub fn adc_sampling_period_hnsec(&self) -> u32 {
        self.sampling_period_hnsec.load(Ordering::Relaxed)
    }

    /// Quantizes `duty` in `[-1, 1]` against the current period.
    pub fn compute_pwm_val(&self, duty: f32) -> i32 {
        i32::from(duty_to_compare(duty, self.pwm_top()))
    }

    /// Applies one commutation step. Called from the PWM interrupt.
    ///
    /// The positive phase sources and the negative phase sinks for
    /// `pwm_val` ticks; the floating phase is switched off. The step replaces
    /// whatever the previous call applied. No-op unless the mode is
    /// `Running`. A step that is not a permutation floats every phase.
    pub fn set_step_from_isr(&self, step: &CommutationStep, pwm_val: i32) {
        critical_section::with(|_| {
            if self.mode.load() != SafetyMode::Running {
                return;
            }
            if !step.is_valid() {
                warn!("malformed commutation step {:?}, floating all phases", step);
                self.float_all();
                return;
            }
            let top = self.pwm_top();
            let compare = pwm_val.clamp(0, i32::from(top)) as u16;
            self.stage_step(step, compare);
        });
    }

    /// Drives each phase independently for self-test. Allowed in `Idle` and
    /// `Energized`; switches the mode to `Energized`.
    pub fn manip(&self, commands: &[PhaseManipCommand; NUM_PHASES]) {
        let top = self.pwm_top();
        let applied = critical_section::with(|_| {
            if !self.enter_energized(top) {
                return false;
            }
            for (phase, command) in Phase::ALL.into_iter().zip(commands) {
                self.stage.set_phase(phase, command.output(top));
            }
            self.stage.commit();
            self.stage.enable_outputs();
            true
        });
        if applied {
            debug!("manip {:?}", commands);
        }
    }

    /// Holds 100% duty of fixed polarity on every phase: `1` sources, `-1`
    /// sinks, `0` floats. Allowed in `Idle` and `Energized`; switches the
    /// mode to `Energized`.
    pub fn energize(&self, polarity: &[i8; NUM_PHASES]) {
        let top = self.pwm_top();
        let applied = critical_section::with(|_| {
            if !self.enter_energized(top) {
                return false;
            }
            for (phase, &sign) in Phase::ALL.into_iter().zip(polarity) {
                let output = match sign {
                    s if s > 0 => PhaseOutput::Source(top),
                    s if s < 0 => PhaseOutput::Sink(top),
                    _ => PhaseOutput::Floating,
                };
                self.stage.set_phase(phase, output);
            }
            self.stage.commit();
            self.stage.enable_outputs();
            true
        });
        if applied {
            debug!("energize {:?}", polarity);
        }
    }

    fn enter_energized(&self, top: u16) -> bool {
        if top == 0 {
            warn!("direct drive before init, ignored");
            return false;
        }
        let mode = self.mode.load();
        match mode {
            SafetyMode::Idle | SafetyMode::Energized => self.mode.replace(mode, SafetyMode::Energized),
            other => {
                debug!("direct drive refused in {:?}", other);
                false
            }
        }
    }

    /// Floats every phase so the motor coasts. Callable from any context.
    /// Outputs are floated even under the emergency latch; the mode only
    /// changes when the latch is clear.
    pub fn set_freewheeling(&self) {
        critical_section::with(|_| {
            self.float_all();
            self.mode.transition(SafetyMode::Freewheeling);
        });
    }

    /// Disables the output stage at the hardware level and latches
    /// `Emergency` until the next successful `init`. Callable from any
    /// context; wins over a concurrent step application.
    pub fn emergency(&self) {
        let previous = critical_section::with(|_| {
            self.stage.disable_outputs();
            let previous = self.mode.latch_emergency();
            self.float_all();
            previous
        });
        if previous != SafetyMode::Emergency {
            error!("emergency stop latched (was {:?})", previous);
        }
    }

    /// Stages `Floating` on every phase and commits. Caller holds the
    /// critical section.
    pub(crate) fn float_all(&self) {
        for phase in Phase::ALL {
            self.stage.set_phase(phase, PhaseOutput::Floating);
        }
        self.stage.commit();
    }

    /// Floating phase off, negative sinks, positive sources, then commit.
    pub(crate) fn stage_step(&self, step: &CommutationStep, compare: u16) {
        self.stage.set_phase(step.floating, PhaseOutput::Floating);
        self.stage.set_phase(step.negative, PhaseOutput::Sink(compare));
        self.stage.set_phase(step.positive, PhaseOutput::Source(compare));
        self.stage.commit();
    }

    pub(crate) fn mode_cell(&self) -> &ModeCell {
        &self.mode
    }
}
