use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;

use esc_pwm::{
    MotorPwm, Phase, PhaseOutput, PowerStage, PwmConfig, PwmTiming, SafetyMode, SixStep,
};

/// Thread-safe stage that only tracks whether a gate can conduct.
#[derive(Default)]
struct AtomicStage {
    staged_driven: [AtomicBool; 3],
    outputs_enabled: AtomicBool,
    /// Commits that left a phase driven while the output stage was on
    live_commits: AtomicU32,
}

impl PowerStage for AtomicStage {
    fn configure(&self, _timing: &PwmTiming) {
        self.outputs_enabled.store(false, Ordering::SeqCst);
    }

    fn set_phase(&self, phase: Phase, output: PhaseOutput) {
        self.staged_driven[phase.index()].store(output != PhaseOutput::Floating, Ordering::SeqCst);
    }

    fn commit(&self) {
        let driven = self.staged_driven.iter().any(|p| p.load(Ordering::SeqCst));
        if driven && self.outputs_enabled.load(Ordering::SeqCst) {
            self.live_commits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn enable_outputs(&self) {
        self.outputs_enabled.store(true, Ordering::SeqCst);
    }

    fn disable_outputs(&self) {
        self.outputs_enabled.store(false, Ordering::SeqCst);
    }
}

#[test]
fn emergency_wins_against_concurrent_steps() {
    for _ in 0..200 {
        let pwm = MotorPwm::new(AtomicStage::default(), PwmConfig::default());
        pwm.init(Some(25_000)).unwrap();
        pwm.prepare_to_start();
        let pwm_val = pwm.compute_pwm_val(0.5);
        let stepping = AtomicBool::new(false);

        let after_latch = thread::scope(|s| {
            s.spawn(|| {
                let mut step = SixStep::Step0;
                for _ in 0..2000 {
                    pwm.set_step_from_isr(&step.commutation(), pwm_val);
                    stepping.store(true, Ordering::SeqCst);
                    step = step.next();
                }
            });

            while !stepping.load(Ordering::SeqCst) {
                thread::yield_now();
            }
            pwm.emergency();
            pwm.stage().live_commits.load(Ordering::SeqCst)
        });

        assert_eq!(pwm.mode(), SafetyMode::Emergency);
        assert!(!pwm.stage().outputs_enabled.load(Ordering::SeqCst));
        // Nothing conducted once emergency returned
        assert_eq!(pwm.stage().live_commits.load(Ordering::SeqCst), after_latch);
        assert!(after_latch > 0);
    }
}

#[test]
fn emergency_from_another_thread_stops_a_step_storm() {
    let pwm = MotorPwm::new(AtomicStage::default(), PwmConfig::default());
    pwm.init(Some(50_000)).unwrap();
    pwm.prepare_to_start();
    let pwm_val = pwm.compute_pwm_val(1.0);

    thread::scope(|s| {
        for start in 0..4u8 {
            let pwm = &pwm;
            s.spawn(move || {
                let mut step = SixStep::from_index(start);
                for _ in 0..5000 {
                    pwm.set_step_from_isr(&step.commutation(), pwm_val);
                    step = step.next();
                }
            });
        }
        s.spawn(|| pwm.emergency());
    });

    assert_eq!(pwm.mode(), SafetyMode::Emergency);
    assert!(!pwm.stage().outputs_enabled.load(Ordering::SeqCst));
    let frozen = pwm.stage().live_commits.load(Ordering::SeqCst);
    pwm.set_step_from_isr(&SixStep::Step0.commutation(), pwm_val);
    pwm.prepare_to_start();
    assert_eq!(pwm.stage().live_commits.load(Ordering::SeqCst), frozen);
}
