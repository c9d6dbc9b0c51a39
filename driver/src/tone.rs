//! Audible tone through the motor windings

use core::sync::atomic::Ordering;

use embedded_hal::delay::DelayNs;

use crate::mode::SafetyMode;
use crate::pwm::MotorPwm;
use crate::six_step::{CommutationStep, SixStep};
use crate::stage::PowerStage;

pub const TONE_MIN_FREQUENCY: u32 = 100;
pub const TONE_MAX_FREQUENCY: u32 = 5_000;
pub const TONE_MAX_DURATION_MSEC: u32 = 1_000;
/// Upper bound on the energized window of each half period
const TONE_MAX_ACTIVE_NS: u32 = 40_000;

/// Pulse train for one tone.
///
/// Every half period the windings are energized at full duty for a short
/// window and then floated. Consecutive pulses alternate polarity, so one
/// pulse pair is one period of the requested frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TonePlan {
    pub frequency_hz: u32,
    pub active_ns: u32,
    pub idle_ns: u32,
    pub half_periods: u32,
}

impl TonePlan {
    /// Clamps the request to the audible range and to short beeps.
    pub fn new(frequency_hz: u32, duration_msec: u32) -> Self {
        let frequency_hz = frequency_hz.clamp(TONE_MIN_FREQUENCY, TONE_MAX_FREQUENCY);
        let duration_msec = duration_msec.min(TONE_MAX_DURATION_MSEC);

        let half_period_ns = 1_000_000_000 / frequency_hz / 2;
        let active_ns = (half_period_ns / 10).min(TONE_MAX_ACTIVE_NS);

        Self {
            frequency_hz,
            active_ns,
            idle_ns: half_period_ns - active_ns,
            half_periods: duration_msec * frequency_hz * 2 / 1000,
        }
    }
}

impl<S: PowerStage> MotorPwm<S> {
    /// Plays a tone by pulsing one commutation step at full duty with
    /// alternating polarity, blocking for the duration.
    ///
    /// Call from a high priority task while the motor is stopped. Refused in
    /// `Running` and `Emergency`; aborts as soon as the mode is changed from
    /// elsewhere. Afterwards every phase floats and the mode returns to
    /// `Idle` or `Freewheeling`.
    pub fn beep(&self, frequency_hz: u32, duration_msec: u32, delay: &mut impl DelayNs) {
        let top = self.pwm_top();
        if top == 0 {
            warn!("beep before init, ignored");
            return;
        }
        let previous = self.mode();
        let resume = match previous {
            SafetyMode::Idle => SafetyMode::Idle,
            SafetyMode::Freewheeling | SafetyMode::Energized => SafetyMode::Freewheeling,
            SafetyMode::Running | SafetyMode::Emergency => {
                debug!("beep refused in {:?}", previous);
                return;
            }
        };
        if !self.mode_cell().replace(previous, SafetyMode::Energized) {
            return;
        }

        let plan = TonePlan::new(frequency_hz, duration_msec);
        // Round-robin over the steps so a single dead FET cannot mute every beep
        let selector = self.tone_selector.fetch_add(1, Ordering::Relaxed);
        let step = SixStep::from_index(selector).commutation();
        debug!(
            "beep {}Hz x{} pulses on {:?}",
            plan.frequency_hz,
            plan.half_periods,
            step
        );

        critical_section::with(|_| {
            self.float_all();
            self.stage().enable_outputs();
        });

        let reversed = CommutationStep::new(step.negative, step.positive, step.floating);

        for half_period in 0..plan.half_periods {
            let pulse = if half_period % 2 == 0 { &step } else { &reversed };
            let pulsed = critical_section::with(|_| {
                if self.mode() != SafetyMode::Energized {
                    return false;
                }
                self.stage_step(pulse, top);
                true
            });
            if !pulsed {
                debug!("beep aborted: mode changed");
                return;
            }
            delay.delay_ns(plan.active_ns);
            critical_section::with(|_| self.float_all());
            delay.delay_ns(plan.idle_ns);
        }

        critical_section::with(|_| {
            if self.mode_cell().replace(SafetyMode::Energized, resume) {
                self.float_all();
                if resume == SafetyMode::Idle {
                    self.stage().disable_outputs();
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_for_one_kilohertz() {
        let plan = TonePlan::new(1_000, 100);
        assert_eq!(plan.frequency_hz, 1_000);
        assert_eq!(plan.active_ns, 40_000);
        assert_eq!(plan.idle_ns, 460_000);
        assert_eq!(plan.half_periods, 200);
    }

    #[test]
    fn short_half_period_limits_active_window() {
        let plan = TonePlan::new(5_000, 10);
        assert_eq!(plan.active_ns, 10_000);
        assert_eq!(plan.idle_ns, 90_000);
        assert_eq!(plan.half_periods, 100);
    }

    #[test]
    fn request_is_clamped() {
        let low = TonePlan::new(10, 5_000);
        assert_eq!(low.frequency_hz, TONE_MIN_FREQUENCY);
        assert_eq!(low.half_periods, 200);

        let high = TonePlan::new(20_000, 1);
        assert_eq!(high.frequency_hz, TONE_MAX_FREQUENCY);
        assert_eq!(high.half_periods, 10);
    }
}
