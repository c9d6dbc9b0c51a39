#![allow(dead_code)]

use std::cell::RefCell;

use esc_pwm::{NUM_PHASES, Phase, PhaseOutput, PowerStage, PwmTiming};

/// What the pins would show, plus counters for assertions.
#[derive(Debug, Clone)]
pub struct StageState {
    pub timing: Option<PwmTiming>,
    pub staged: [PhaseOutput; NUM_PHASES],
    pub active: [PhaseOutput; NUM_PHASES],
    pub outputs_enabled: bool,
    pub configures: u32,
    pub commits: u32,
    /// Commits that left at least one phase driven
    pub driven_commits: u32,
}

/// `PowerStage` that records register-level effects instead of writing them.
pub struct RecordingStage {
    state: RefCell<StageState>,
}

impl RecordingStage {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(StageState {
                timing: None,
                staged: [PhaseOutput::Floating; NUM_PHASES],
                active: [PhaseOutput::Floating; NUM_PHASES],
                outputs_enabled: false,
                configures: 0,
                commits: 0,
                driven_commits: 0,
            }),
        }
    }

    pub fn snapshot(&self) -> StageState {
        self.state.borrow().clone()
    }

    pub fn active(&self) -> [PhaseOutput; NUM_PHASES] {
        self.state.borrow().active
    }

    pub fn outputs_enabled(&self) -> bool {
        self.state.borrow().outputs_enabled
    }

    /// True if any gate can conduct right now.
    pub fn energized(&self) -> bool {
        let state = self.state.borrow();
        state.outputs_enabled && state.active.iter().any(|o| *o != PhaseOutput::Floating)
    }

    pub fn all_floating(&self) -> bool {
        self.active().iter().all(|o| *o == PhaseOutput::Floating)
    }
}

impl PowerStage for RecordingStage {
    fn configure(&self, timing: &PwmTiming) {
        let mut state = self.state.borrow_mut();
        state.timing = Some(*timing);
        state.outputs_enabled = false;
        state.configures += 1;
    }

    fn set_phase(&self, phase: Phase, output: PhaseOutput) {
        self.state.borrow_mut().staged[phase.index()] = output;
    }

    fn commit(&self) {
        let mut state = self.state.borrow_mut();
        state.active = state.staged;
        state.commits += 1;
        if state.active.iter().any(|o| *o != PhaseOutput::Floating) {
            state.driven_commits += 1;
        }
    }

    fn enable_outputs(&self) {
        self.state.borrow_mut().outputs_enabled = true;
    }

    fn disable_outputs(&self) {
        self.state.borrow_mut().outputs_enabled = false;
    }
}

/// Delay that only accumulates the requested time.
#[derive(Default)]
pub struct CountingDelay {
    pub total_ns: u64,
    pub calls: u32,
}

impl embedded_hal::delay::DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
        self.calls += 1;
    }
}
