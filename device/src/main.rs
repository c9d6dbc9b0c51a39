#![no_std]
#![no_main]

use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::{Delay, Duration, Timer, with_timeout};
use esc_pwm::SafetyMode;

mod motor;
use motor::{MOTOR_PWM, MotorCommand, MotorController, ToneRequest, tim1};

// Use panic-probe for panics
use panic_probe as _;

/// Button -> motor task
static MOTOR_CMD_CHANNEL: Channel<CriticalSectionRawMutex, MotorCommand, 4> = Channel::new();
/// Motor task -> tone task
static TONE_CHANNEL: Channel<CriticalSectionRawMutex, ToneRequest, 2> = Channel::new();

/// Runs the tone generator above thread mode, below the PWM interrupt
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn UART4() {
    unsafe { EXECUTOR_HIGH.on_interrupt() }
}

/// PWM period boundary: commutation source for the open-loop demo
#[interrupt]
fn TIM1_UP_TIM16() {
    tim1::clear_update_flag();
    motor::on_pwm_period();
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    rtt_target::rtt_init_defmt!();

    // Initialize STM32 with HSE=8MHz feeding PLL to 170MHz SYSCLK
    let p = {
        let mut config = embassy_stm32::Config::default();
        {
            use embassy_stm32::rcc::*;
            use embassy_stm32::time::Hertz;
            // Use external 8MHz HSE oscillator as PLL source
            config.rcc.hse = Some(Hse {
                freq: Hertz(8_000_000),
                mode: HseMode::Oscillator,
            });
            // VCO in: 8MHz / 2 = 4MHz; VCO: 4MHz * 85 = 340MHz; SYSCLK: 340MHz / 2 = 170MHz
            config.rcc.pll = Some(Pll {
                source: PllSource::HSE,
                prediv: PllPreDiv::DIV2,
                mul: PllMul::MUL85,
                divp: None,
                divq: None,
                divr: Some(PllRDiv::DIV2),
            });
            config.rcc.sys = Sysclk::PLL1_R;
            // Above 150MHz, enable Range1 boost mode per RM0440 guidance
            config.rcc.boost = true;
        }
        embassy_stm32::init(config)
    };

    defmt::info!("esc-pwm device starting");

    // Button: PC10, external pull-up, active-low to GND
    let button = ExtiInput::new(p.PC10, p.EXTI10, Pull::None);
    defmt::info!("Button configured on PC10 (active-low)");

    // LED on PC6
    let mut led = Output::new(p.PC6, Level::Low, Speed::Low);

    // Gate pins stay owned for the lifetime of the firmware
    let _gates = tim1::claim(
        p.TIM1,
        p.PA8,  // Phase A high
        p.PC13, // Phase A low
        p.PA9,  // Phase B high
        p.PA12, // Phase B low
        p.PA10, // Phase C high
        p.PB15, // Phase C low
    );
    if let Err(e) = MOTOR_PWM.init(None) {
        defmt::error!("PWM init failed: {}", e);
    }
    defmt::info!(
        "ADC sampling period: {} x10ns",
        MOTOR_PWM.adc_sampling_period_hnsec()
    );

    interrupt::TIM1_UP_TIM16.set_priority(Priority::P1);
    tim1::enable_update_interrupt();
    unsafe { cortex_m::peripheral::NVIC::unmask(interrupt::TIM1_UP_TIM16) };

    interrupt::UART4.set_priority(Priority::P6);
    let high_spawner = EXECUTOR_HIGH.start(interrupt::UART4);
    high_spawner.spawn(tone_task(TONE_CHANNEL.receiver())).unwrap();

    // Startup chirp
    let _ = TONE_CHANNEL.try_send(ToneRequest {
        frequency_hz: 2_000,
        duration_msec: 100,
    });

    spawner.spawn(button_handler(button, MOTOR_CMD_CHANNEL.sender())).unwrap();
    spawner
        .spawn(motor_control_task(
            MotorController::new(),
            MOTOR_CMD_CHANNEL.receiver(),
            TONE_CHANNEL.sender(),
        ))
        .unwrap();

    defmt::info!("All tasks spawned, entering LED status loop");

    // LED status loop - shows the driver mode via blink patterns
    loop {
        match motor::mode() {
            SafetyMode::Idle => {
                // Slow blink (1 Hz, 10% duty)
                led.set_high();
                Timer::after(Duration::from_millis(100)).await;
                led.set_low();
                Timer::after(Duration::from_millis(900)).await;
            }
            SafetyMode::Energized | SafetyMode::Freewheeling => {
                // Quick double blink
                for _ in 0..2 {
                    led.set_high();
                    Timer::after(Duration::from_millis(100)).await;
                    led.set_low();
                    Timer::after(Duration::from_millis(100)).await;
                }
                Timer::after(Duration::from_millis(600)).await;
            }
            SafetyMode::Running => {
                // Solid ON with periodic short delay to allow state changes
                led.set_high();
                Timer::after(Duration::from_millis(500)).await;
            }
            SafetyMode::Emergency => {
                // Triple blink pattern
                for _ in 0..3 {
                    led.set_high();
                    Timer::after(Duration::from_millis(120)).await;
                    led.set_low();
                    Timer::after(Duration::from_millis(120)).await;
                }
                Timer::after(Duration::from_millis(800)).await;
            }
        }
    }
}

/// Single click toggles the motor, double click resets, hold is an emergency stop
#[embassy_executor::task]
async fn button_handler(
    mut button: ExtiInput<'static>,
    commands: Sender<'static, CriticalSectionRawMutex, MotorCommand, 4>,
) {
    const DOUBLE_CLICK_DELAY: u64 = 250;
    const HOLD_DELAY: u64 = 1000;

    defmt::info!("Button ready (active-low)");

    loop {
        // Wait for press (active-low => falling edge)
        button.wait_for_falling_edge().await;

        // If release does not happen within HOLD_DELAY, it's a hold
        if with_timeout(
            Duration::from_millis(HOLD_DELAY),
            button.wait_for_rising_edge(),
        )
        .await
        .is_err()
        {
            defmt::info!("Button: HOLD");
            motor::emergency_stop();
            // Ensure we're released before next iteration
            button.wait_for_rising_edge().await;
            continue;
        }

        // Released within hold window: check for a second press within DOUBLE_CLICK_DELAY
        let cmd = if with_timeout(
            Duration::from_millis(DOUBLE_CLICK_DELAY),
            button.wait_for_falling_edge(),
        )
        .await
        .is_ok()
        {
            defmt::info!("Button: DOUBLE CLICK");
            // Wait for final release
            button.wait_for_rising_edge().await;
            MotorCommand::Reset
        } else {
            defmt::info!("Button: SINGLE CLICK");
            MotorCommand::Toggle
        };

        if commands.try_send(cmd).is_err() {
            defmt::warn!("Motor command queue full, dropped {}", cmd);
        }
    }
}

#[embassy_executor::task]
async fn motor_control_task(
    mut motor: MotorController,
    commands: Receiver<'static, CriticalSectionRawMutex, MotorCommand, 4>,
    tones: Sender<'static, CriticalSectionRawMutex, ToneRequest, 2>,
) {
    defmt::info!("Motor control task started");

    loop {
        let cmd = commands.receive().await;
        if let Some(tone) = motor.handle_command(cmd).await {
            let _ = tones.try_send(tone);
        }
    }
}

/// Plays tones on the motor windings. Blocks its executor for the tone duration.
#[embassy_executor::task]
async fn tone_task(tones: Receiver<'static, CriticalSectionRawMutex, ToneRequest, 2>) {
    loop {
        let tone = tones.receive().await;
        defmt::debug!("beep {} Hz for {} ms", tone.frequency_hz, tone.duration_msec);
        MOTOR_PWM.beep(tone.frequency_hz, tone.duration_msec, &mut Delay);
    }
}
