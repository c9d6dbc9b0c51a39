use thiserror::Error;

use crate::config::{MAX_FREQUENCY, MAX_PERIOD_TICKS, MIN_FREQUENCY, MIN_PERIOD_TICKS};

/// Reasons a PWM configuration request is rejected.
///
/// A rejected request never touches the hardware: the previous timer setup
/// and safety mode stay in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("PWM frequency {frequency_hz} Hz outside [{min}, {max}] Hz", min = MIN_FREQUENCY, max = MAX_FREQUENCY)]
    FrequencyOutOfRange { frequency_hz: u32 },
    #[error("PWM period of {ticks} timer ticks outside [{min}, {max}] ticks", min = MIN_PERIOD_TICKS, max = MAX_PERIOD_TICKS)]
    PeriodOutOfRange { ticks: u32 },
    #[error("dead time of {ticks} ticks exceeds 1/8 of the PWM period")]
    DeadTimeTooLong { ticks: u32 },
    #[error("invalid PWM configuration: {0}")]
    InvalidConfig(&'static str),
}
