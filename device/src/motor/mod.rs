//! Motor control module for B-G431B-ESC1 BLDC motor
//!
//! Motor: ZD2808-V1.9 700KV
//! - Configuration: 12N14P (12 stator slots, 14 poles = 7 pole pairs)
//! - KV rating: 700 KV
//! - Voltage: 3S-4S LiPo (11.1-14.8V)
//! - Type: Outrunner disc motor
//!
//! The commutation source here is a fixed-rate open-loop sequencer driven by
//! the TIM1 update interrupt; it only exercises the PWM driver.

pub mod tim1;

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, Ordering};

use embassy_time::{Duration, Timer};
use esc_pwm::{MotorPwm, PwmConfig, SafetyMode, SixStep};

use self::tim1::Tim1Stage;

/// The one PWM driver instance, shared with the TIM1 interrupt
pub static MOTOR_PWM: MotorPwm<Tim1Stage> = MotorPwm::new(Tim1Stage, PwmConfig::new());

/// Open-loop sequencer state, read by the TIM1 update interrupt
static COMMUTATING: AtomicBool = AtomicBool::new(false);
static MOTOR_DUTY: AtomicU8 = AtomicU8::new(0);
static MOTOR_STEP: AtomicU8 = AtomicU8::new(0);
static PERIODS_PER_STEP: AtomicU16 = AtomicU16::new(u16::MAX);
static PERIOD_COUNTER: AtomicU16 = AtomicU16::new(0);

/// Motor physical parameters
pub struct MotorParams {
    /// Number of pole pairs (14 poles = 7 pole pairs)
    pub pole_pairs: u8,
    /// KV rating (RPM per volt)
    pub kv_rating: u16,
}

impl Default for MotorParams {
    fn default() -> Self {
        Self {
            pole_pairs: 7,  // ZD2808-V1.9: 14 poles = 7 pole pairs
            kv_rating: 700, // 700 KV
        }
    }
}

/// Requests from the button handler
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum MotorCommand {
    /// Start when stopped, coast when running
    Toggle,
    /// Re-initialize the power stage (clears an emergency latch)
    Reset,
}

/// Tone played by the high priority executor
#[derive(Clone, Copy, Debug, defmt::Format)]
pub struct ToneRequest {
    pub frequency_hz: u32,
    pub duration_msec: u32,
}

/// Called from the TIM1 update interrupt once per PWM period.
///
/// Advances the six-step sequence every `PERIODS_PER_STEP` periods.
pub fn on_pwm_period() {
    if !COMMUTATING.load(Ordering::Relaxed) {
        return;
    }
    let count = PERIOD_COUNTER.load(Ordering::Relaxed).saturating_add(1);
    if count < PERIODS_PER_STEP.load(Ordering::Relaxed) {
        PERIOD_COUNTER.store(count, Ordering::Relaxed);
        return;
    }
    PERIOD_COUNTER.store(0, Ordering::Relaxed);

    let step = SixStep::from_index(MOTOR_STEP.load(Ordering::Relaxed)).next();
    MOTOR_STEP.store(step.as_u8(), Ordering::Relaxed);

    let duty = f32::from(MOTOR_DUTY.load(Ordering::Relaxed)) / 100.0;
    MOTOR_PWM.set_step_from_isr(&step.commutation(), MOTOR_PWM.compute_pwm_val(duty));
}

/// Motor control context
pub struct MotorController {
    params: MotorParams,
    duty_percent: u8,
    open_loop_rpm: u16,
}

impl MotorController {
    /// Create a new motor controller
    pub fn new() -> Self {
        Self {
            params: MotorParams::default(),
            duty_percent: 10,  // 10% for safe initial testing
            open_loop_rpm: 60, // slow enough to follow without back-EMF
        }
    }

    /// Handle motor command
    pub async fn handle_command(&mut self, cmd: MotorCommand) -> Option<ToneRequest> {
        match cmd {
            MotorCommand::Toggle => {
                if COMMUTATING.load(Ordering::Relaxed) {
                    defmt::info!("Motor command: COAST");
                    self.coast();
                    None
                } else {
                    defmt::info!("Motor command: START duty={}%", self.duty_percent);
                    self.start().await;
                    None
                }
            }
            MotorCommand::Reset => {
                defmt::info!("Motor command: RESET");
                self.reset().then_some(ToneRequest {
                    frequency_hz: 1_000,
                    duration_msec: 150,
                })
            }
        }
    }

    /// Align the rotor, then hand the stage to the commutation interrupt
    async fn start(&mut self) {
        if MOTOR_PWM.mode() == SafetyMode::Emergency {
            defmt::warn!("Start refused: emergency latched, reset first");
            return;
        }
        // Re-arming from Freewheeling goes through a clean init
        if !self.reset() {
            return;
        }

        // Hold A+ B- so the rotor settles on step 0 before stepping
        MOTOR_PWM.energize(&[1, -1, 0]);
        Timer::after(Duration::from_millis(200)).await;

        PERIODS_PER_STEP.store(self.periods_per_step(), Ordering::Relaxed);
        PERIOD_COUNTER.store(0, Ordering::Relaxed);
        MOTOR_STEP.store(SixStep::Step0.as_u8(), Ordering::Relaxed);
        MOTOR_DUTY.store(self.duty_percent.min(100), Ordering::Relaxed);

        MOTOR_PWM.prepare_to_start();
        COMMUTATING.store(true, Ordering::Relaxed);
        defmt::info!(
            "Motor started: {} rpm open loop, {} periods/step",
            self.open_loop_rpm,
            PERIODS_PER_STEP.load(Ordering::Relaxed)
        );
    }

    /// Float all phases and let the motor spin down
    fn coast(&mut self) {
        COMMUTATING.store(false, Ordering::Relaxed);
        MOTOR_PWM.set_freewheeling();
        defmt::info!("Motor coasting");
    }

    /// Returns true if the stage is configured and idle
    fn reset(&mut self) -> bool {
        COMMUTATING.store(false, Ordering::Relaxed);
        match MOTOR_PWM.init(None) {
            Ok(()) => true,
            Err(e) => {
                defmt::error!("PWM init failed: {}", e);
                false
            }
        }
    }

    /// PWM periods between two electrical steps at the open-loop speed
    fn periods_per_step(&self) -> u16 {
        // 6 steps per electrical revolution, pole_pairs electrical revolutions per turn
        let steps_per_min = u32::from(self.open_loop_rpm) * u32::from(self.params.pole_pairs) * 6;
        let periods_per_min = MOTOR_PWM.frequency_hz() * 60;
        (periods_per_min / steps_per_min.max(1)).clamp(1, u32::from(u16::MAX)) as u16
    }
}

/// Deadman for the button hold: cut the stage immediately
pub fn emergency_stop() {
    COMMUTATING.store(false, Ordering::Relaxed);
    MOTOR_PWM.emergency();
}

/// Current mode, for the status LED
pub fn mode() -> SafetyMode {
    MOTOR_PWM.mode()
}
