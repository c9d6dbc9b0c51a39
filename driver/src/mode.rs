//! Safety mode of the power stage

use core::sync::atomic::{AtomicU8, Ordering};

/// Output mode the driver is currently allowed to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SafetyMode {
    /// Configured, all phases floating
    Idle = 0,
    /// Commutation steps are accepted
    Running = 1,
    /// Direct diagnostic drive (energize, manip, tone)
    Energized = 2,
    /// All phases floating, motor coasting
    Freewheeling = 3,
    /// Output stage disabled; latched until the next successful `init`
    Emergency = 4,
}

impl SafetyMode {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Energized,
            3 => Self::Freewheeling,
            // Anything unknown is treated as the safest state
            _ => Self::Emergency,
        }
    }
}

/// Lock-free mode variable shared by the interrupt and scheduled contexts.
///
/// Every transition except the emergency latch and re-initialization goes
/// through [`ModeCell::transition`], which refuses to leave `Emergency`.
pub(crate) struct ModeCell(AtomicU8);

impl ModeCell {
    pub(crate) const fn new(mode: SafetyMode) -> Self {
        Self(AtomicU8::new(mode as u8))
    }

    pub(crate) fn load(&self) -> SafetyMode {
        SafetyMode::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Unconditional store. Only `init` may use this to clear the latch.
    pub(crate) fn reset(&self, mode: SafetyMode) {
        self.0.store(mode as u8, Ordering::Release);
    }

    /// Moves to `next` unless the emergency latch is set.
    pub(crate) fn transition(&self, next: SafetyMode) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != SafetyMode::Emergency as u8).then_some(next as u8)
            })
            .is_ok()
    }

    /// Moves from `expected` to `next`, leaving any other mode untouched.
    pub(crate) fn replace(&self, expected: SafetyMode, next: SafetyMode) -> bool {
        self.0
            .compare_exchange(
                expected as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Latches `Emergency`, returning the mode it replaced.
    pub(crate) fn latch_emergency(&self) -> SafetyMode {
        SafetyMode::from_u8(self.0.swap(SafetyMode::Emergency as u8, Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_refuses_to_leave_emergency() {
        let mode = ModeCell::new(SafetyMode::Idle);
        assert!(mode.transition(SafetyMode::Running));
        assert_eq!(mode.load(), SafetyMode::Running);

        assert_eq!(mode.latch_emergency(), SafetyMode::Running);
        assert!(!mode.transition(SafetyMode::Freewheeling));
        assert!(!mode.transition(SafetyMode::Idle));
        assert_eq!(mode.load(), SafetyMode::Emergency);

        mode.reset(SafetyMode::Idle);
        assert_eq!(mode.load(), SafetyMode::Idle);
    }

    #[test]
    fn replace_only_from_expected() {
        let mode = ModeCell::new(SafetyMode::Energized);
        assert!(!mode.replace(SafetyMode::Idle, SafetyMode::Freewheeling));
        assert_eq!(mode.load(), SafetyMode::Energized);
        assert!(mode.replace(SafetyMode::Energized, SafetyMode::Idle));
        assert_eq!(mode.load(), SafetyMode::Idle);
    }

    #[test]
    fn unknown_encoding_reads_as_emergency() {
        assert_eq!(SafetyMode::from_u8(17), SafetyMode::Emergency);
    }
}
