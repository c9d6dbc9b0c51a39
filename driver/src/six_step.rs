//! Motor phases and the 6-step commutation table

/// Number of motor phases driven by the power stage.
pub const NUM_PHASES: usize = 3;

/// One half-bridge of the power stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Phase {
    A = 0,
    B = 1,
    C = 2,
}

impl Phase {
    pub const ALL: [Phase; NUM_PHASES] = [Phase::A, Phase::B, Phase::C];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Role of every phase for one commutation interval.
///
/// Valid only when the three fields are a permutation of [`Phase::ALL`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommutationStep {
    /// Sources current from the supply rail
    pub positive: Phase,
    /// Sinks current to ground
    pub negative: Phase,
    /// Disconnected, used for back-EMF sensing
    pub floating: Phase,
}

impl CommutationStep {
    pub const fn new(positive: Phase, negative: Phase, floating: Phase) -> Self {
        Self {
            positive,
            negative,
            floating,
        }
    }

    /// True if no phase is assigned two roles.
    pub fn is_valid(&self) -> bool {
        self.positive != self.negative
            && self.positive != self.floating
            && self.negative != self.floating
    }
}

/// 6-step commutation state
///
/// Each step energizes 2 of the 3 phases:
/// - One phase driven high
/// - One phase driven low
/// - One phase floating (high-Z)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SixStep {
    Step0 = 0, // A+, B-, C floating
    Step1 = 1, // A+, C-, B floating
    Step2 = 2, // B+, C-, A floating
    Step3 = 3, // B+, A-, C floating
    Step4 = 4, // C+, A-, B floating
    Step5 = 5, // C+, B-, A floating
}

impl SixStep {
    pub const ALL: [SixStep; 6] = [
        Self::Step0,
        Self::Step1,
        Self::Step2,
        Self::Step3,
        Self::Step4,
        Self::Step5,
    ];

    /// Step for an arbitrary counter, wrapping modulo 6
    pub fn from_index(index: u8) -> Self {
        Self::ALL[usize::from(index % 6)]
    }

    /// Advance to the next commutation step
    pub fn next(self) -> Self {
        match self {
            Self::Step0 => Self::Step1,
            Self::Step1 => Self::Step2,
            Self::Step2 => Self::Step3,
            Self::Step3 => Self::Step4,
            Self::Step4 => Self::Step5,
            Self::Step5 => Self::Step0,
        }
    }

    /// Get the step number (0-5)
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Phase roles for this step
    pub fn commutation(self) -> CommutationStep {
        use Phase::*;
        match self {
            Self::Step0 => CommutationStep::new(A, B, C),
            Self::Step1 => CommutationStep::new(A, C, B),
            Self::Step2 => CommutationStep::new(B, C, A),
            Self::Step3 => CommutationStep::new(B, A, C),
            Self::Step4 => CommutationStep::new(C, A, B),
            Self::Step5 => CommutationStep::new(C, B, A),
        }
    }
}
