#![cfg_attr(not(test), no_std)]
//! # Phase PWM driver for sensorless BLDC controllers
//!
//! Turns commutation decisions ("phase A sources, B sinks, C floats at
//! 40 % duty") into timer output, and keeps ADC sampling aligned with the
//! PWM period so back-EMF and current readings are phase-synchronous.
//!
//! The driver owns the timer through a [`PowerStage`] implementation and is
//! shared between two contexts:
//!
//! - the PWM interrupt, which calls [`MotorPwm::set_step_from_isr`] once per
//!   electrical step,
//! - scheduled code, which configures the timer, runs diagnostics and plays
//!   tones.
//!
//! [`MotorPwm::emergency`] may be called from either and latches the output
//! stage off until the next successful [`MotorPwm::init`].
//!
//! ```rust,no_run
//! # use esc_pwm::*;
//! # fn demo<S: PowerStage>(stage: S) -> Result<(), ConfigError> {
//! let pwm = MotorPwm::new(stage, PwmConfig::default());
//! pwm.init(Some(25_000))?;
//! pwm.prepare_to_start();
//!
//! // from the PWM interrupt
//! let step = SixStep::Step0.commutation();
//! pwm.set_step_from_isr(&step, pwm.compute_pwm_val(0.5));
//!
//! // from a fault handler
//! pwm.emergency();
//! # Ok(())
//! # }
//! ```

// Must come first so the other modules see its macros
pub(crate) mod fmt;

mod config;
mod duty;
mod error;
mod mode;
mod pwm;
mod six_step;
mod stage;
mod tone;

pub use config::{MAX_FREQUENCY, MIN_FREQUENCY, PwmConfig, PwmTiming};
pub use duty::duty_to_compare;
pub use error::ConfigError;
pub use mode::SafetyMode;
pub use pwm::{MotorPwm, PhaseManipCommand};
pub use six_step::{CommutationStep, NUM_PHASES, Phase, SixStep};
pub use stage::{PhaseOutput, PowerStage};
pub use tone::{TONE_MAX_DURATION_MSEC, TONE_MAX_FREQUENCY, TONE_MIN_FREQUENCY, TonePlan};
