//! TIM1 complementary PWM power stage for 3-phase motor control
//!
//! Channels 1-3 drive the half-bridges (CHx high side, CHxN low side),
//! channel 4 only generates TRGO for the ADC, once per counter period.
//! Output enables and modes are preloaded (CCPC) and latched together by a
//! software COM event. Compare registers of channels 1-3 are not preloaded,
//! so a step written from the update interrupt switches mode and duty in
//! the same period.

use embassy_stm32::Peri;
use embassy_stm32::gpio::OutputType;
use embassy_stm32::pac;
use embassy_stm32::pac::timer::vals::{Ckd, Cms, Dir, Mms, Ocm};
use embassy_stm32::peripherals::{PA8, PA9, PA10, PA12, PB15, PC13, TIM1};
use embassy_stm32::time::khz;
use embassy_stm32::timer::complementary_pwm::{ComplementaryPwm, ComplementaryPwmPin};
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::PwmPin;
use esc_pwm::{Phase, PhaseOutput, PowerStage, PwmTiming};

/// TIM1 register access for the PWM driver.
///
/// Zero-sized so the driver can live in a `static`; the pins and the timer
/// clock are owned by the handle returned from [`claim`].
pub struct Tim1Stage;

/// Claims TIM1 and the six gate pins of the B-G431B-ESC1 board.
///
/// The returned handle keeps the pins in their alternate function and must
/// stay alive as long as the driver is used. The main output stays off.
pub fn claim<'d>(
    tim1: Peri<'d, TIM1>,
    pa8: Peri<'d, PA8>,
    pc13: Peri<'d, PC13>,
    pa9: Peri<'d, PA9>,
    pa12: Peri<'d, PA12>,
    pa10: Peri<'d, PA10>,
    pb15: Peri<'d, PB15>,
) -> ComplementaryPwm<'d, TIM1> {
    // High-side pins
    let ch1 = PwmPin::new(pa8, OutputType::PushPull); // Phase A high
    let ch2 = PwmPin::new(pa9, OutputType::PushPull); // Phase B high
    let ch3 = PwmPin::new(pa10, OutputType::PushPull); // Phase C high

    // Low-side pins (complementary)
    let ch1n = ComplementaryPwmPin::new(pc13, OutputType::PushPull); // Phase A low
    let ch2n = ComplementaryPwmPin::new(pa12, OutputType::PushPull); // Phase B low
    let ch3n = ComplementaryPwmPin::new(pb15, OutputType::PushPull); // Phase C low

    // Frequency is reprogrammed by `configure`; this only enables the clock
    let pwm = ComplementaryPwm::new(
        tim1,
        Some(ch1),
        Some(ch1n),
        Some(ch2),
        Some(ch2n),
        Some(ch3),
        Some(ch3n),
        None,
        None,
        khz(20),
        CountingMode::EdgeAlignedUp,
    );
    Tim1Stage.disable_outputs();
    pwm
}

/// Enables the update interrupt that paces commutation.
pub fn enable_update_interrupt() {
    pac::TIM1.sr().modify(|w| w.set_uif(false));
    pac::TIM1.dier().modify(|w| w.set_uie(true));
}

/// Acknowledges the update interrupt. Call first thing in the handler.
pub fn clear_update_flag() {
    pac::TIM1.sr().modify(|w| w.set_uif(false));
}

/// Encodes a dead time in kernel clock ticks into BDTR.DTG, rounding up.
///
/// Longer requests saturate at 1008 ticks.
fn dead_time_generator(ticks: u16) -> u8 {
    match ticks {
        0..=127 => ticks as u8,
        128..=254 => 0x80 | (ticks.div_ceil(2) - 64) as u8,
        255..=504 => 0xC0 | (ticks.div_ceil(8) - 32) as u8,
        _ => 0xE0 | (ticks.div_ceil(16).min(63) - 32) as u8,
    }
}

impl PowerStage for Tim1Stage {
    // TRGO follows OC4REF, which fires every counter period
    const MAX_ADC_TRIGGER_DIVIDER: u8 = 1;

    fn configure(&self, timing: &PwmTiming) {
        let tim = pac::TIM1;

        tim.bdtr().modify(|w| w.set_moe(false));
        tim.cr1().modify(|w| w.set_cen(false));

        tim.cr1().modify(|w| {
            w.set_cms(Cms::EDGE_ALIGNED);
            w.set_dir(Dir::UP);
            w.set_ckd(Ckd::DIV1);
            w.set_arpe(true);
        });
        tim.psc().write_value((timing.prescaler - 1).into());
        tim.arr().write(|w| w.set_arr(timing.top.into()));
        // One update interrupt per period; OC4REF cannot skip periods anyway
        tim.rcr().write(|w| w.set_rep(0));

        tim.bdtr().modify(|w| {
            w.set_dtg(dead_time_generator(timing.dead_time_ticks));
            // Disabled channels are driven to their inactive level
            w.set_ossr(true);
            w.set_ossi(true);
        });
        tim.cr2().modify(|w| {
            w.set_ccpc(true);
            w.set_ccus(false);
            w.set_mms(Mms::COMPARE_OC4);
        });

        // OC4REF rises at the compare value and starts the ADC conversion
        tim.ccmr_output(1).modify(|w| {
            w.set_ocm(1, Ocm::PWM_MODE2);
            w.set_ocpe(1, true);
        });
        tim.ccr(3).write(|w| w.set_ccr(timing.adc_trigger_compare.into()));

        for channel in 0..3 {
            tim.ccmr_output(channel / 2).modify(|w| {
                w.set_ocm(channel % 2, Ocm::FORCE_INACTIVE);
                // CCR must land with the COM event, not one update later
                w.set_ocpe(channel % 2, false);
            });
            tim.ccr(channel).write(|w| w.set_ccr(0));
        }
        tim.ccer().modify(|w| {
            for channel in 0..3 {
                w.set_cce(channel, false);
                w.set_ccne(channel, false);
            }
            w.set_cce(3, true);
        });

        tim.egr().write(|w| {
            w.set_ug(true);
            w.set_comg(true);
        });
        tim.cr1().modify(|w| w.set_cen(true));
    }

    fn set_phase(&self, phase: Phase, output: PhaseOutput) {
        let tim = pac::TIM1;
        let channel = phase.index();
        let top = u32::from(tim.arr().read().arr());

        // (mode, compare, CHx enable, CHxN enable)
        let (mode, compare, high_side, low_side) = match output {
            PhaseOutput::Floating => (Ocm::FORCE_INACTIVE, 0, false, false),
            PhaseOutput::Source(0) => (Ocm::FORCE_INACTIVE, 0, true, true),
            PhaseOutput::Source(v) if u32::from(v) >= top => (Ocm::FORCE_ACTIVE, 0, true, true),
            PhaseOutput::Source(v) => (Ocm::PWM_MODE1, v, true, true),
            // With CHx disabled, CHxN follows OCxREF directly (no complement)
            PhaseOutput::Sink(0) => (Ocm::FORCE_INACTIVE, 0, false, false),
            PhaseOutput::Sink(v) if u32::from(v) >= top => (Ocm::FORCE_ACTIVE, 0, false, true),
            PhaseOutput::Sink(v) => (Ocm::PWM_MODE1, v, false, true),
        };

        tim.ccr(channel).write(|w| w.set_ccr(compare.into()));
        tim.ccmr_output(channel / 2)
            .modify(|w| w.set_ocm(channel % 2, mode));
        tim.ccer().modify(|w| {
            w.set_cce(channel, high_side);
            w.set_ccne(channel, low_side);
        });
    }

    fn commit(&self) {
        pac::TIM1.egr().write(|w| w.set_comg(true));
    }

    fn enable_outputs(&self) {
        pac::TIM1.bdtr().modify(|w| w.set_moe(true));
    }

    fn disable_outputs(&self) {
        pac::TIM1.bdtr().modify(|w| w.set_moe(false));
    }
}
