//! Hardware seam between the driver and the timer peripheral.

use crate::config::PwmTiming;
use crate::six_step::Phase;

/// Drive state of one half-bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhaseOutput {
    /// Both switches off
    Floating,
    /// High side on for `compare` ticks of each period, low side
    /// complementary (with dead time) for the rest
    Source(u16),
    /// Low side on for `compare` ticks of each period, high side held off
    Sink(u16),
}

/// Timer and output stage of a three-phase bridge.
///
/// Methods take `&self`: the driver calls them from both the PWM interrupt
/// and scheduled code, always inside a critical section.
pub trait PowerStage {
    /// Largest `adc_trigger_divider` the hardware can decimate the ADC
    /// trigger by. `init` rejects configurations above it.
    const MAX_ADC_TRIGGER_DIVIDER: u8 = u8::MAX;

    /// Reprograms the timer for `timing`: edge-aligned up-counting, period,
    /// dead time, compare preload and the ADC trigger. Leaves the output
    /// stage disabled.
    fn configure(&self, timing: &PwmTiming);

    /// Stages the output of one phase. Nothing changes on the pins until
    /// [`PowerStage::commit`].
    fn set_phase(&self, phase: Phase, output: PhaseOutput);

    /// Applies every staged phase output at once, compare values included.
    /// Takes effect immediately; called from the PWM period interrupt it
    /// lands on the period boundary.
    fn commit(&self);

    /// Enables the gate outputs.
    fn enable_outputs(&self);

    /// Forces every gate off at the hardware level, whatever is staged.
    fn disable_outputs(&self);
}
