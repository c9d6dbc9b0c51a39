use anyhow::{Context, Result};
use esc_pwm::{MAX_FREQUENCY, MIN_FREQUENCY, PwmConfig, TonePlan};
use tracing::{info, warn};

mod config;
use config::HostConfig;

mod sim;

const USAGE: &str = "usage: esc-pwm-host [FREQUENCY_HZ | sweep | simulate [FREQUENCY_HZ] [DUTY]]";

fn init_tracing() {
    // Default INFO; allow override via RUST_LOG
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .compact()
        .try_init();
}

fn parse_frequency(arg: Option<&String>, config: &PwmConfig) -> Result<u32> {
    match arg {
        Some(s) => s
            .parse()
            .with_context(|| format!("Invalid frequency {s:?}\n{USAGE}")),
        None => Ok(config.default_frequency_hz),
    }
}

/// Prints the timer plan derived for one frequency.
fn print_plan(config: &PwmConfig, frequency_hz: u32) -> Result<()> {
    let timing = config
        .timing(frequency_hz)
        .with_context(|| format!("No valid timer plan for {frequency_hz} Hz"))?;

    println!("PWM frequency      {} Hz (effective {} Hz)", frequency_hz, timing.effective_frequency_hz());
    println!("PwmTop             {}", timing.top);
    println!("prescaler          {}", timing.prescaler);
    println!("dead time          {} ticks ({} ns)", timing.dead_time_ticks, config.dead_time_ns);
    println!(
        "ADC trigger        compare {} every {} period(s)",
        timing.adc_trigger_compare, timing.adc_trigger_divider
    );
    let hnsec = timing.adc_sampling_period_hnsec();
    println!("ADC period         {} x10ns ({}.{:02} us)", hnsec, hnsec / 100, hnsec % 100);
    Ok(())
}

/// One line per frequency across the accepted range.
fn print_sweep(config: &PwmConfig, step_hz: u32) {
    println!("{:>8} {:>8} {:>6} {:>10} {:>10}", "freq_hz", "eff_hz", "top", "dead_tk", "adc_x10ns");
    for frequency_hz in (MIN_FREQUENCY..=MAX_FREQUENCY).step_by(step_hz as usize) {
        match config.timing(frequency_hz) {
            Ok(t) => println!(
                "{:>8} {:>8} {:>6} {:>10} {:>10}",
                frequency_hz,
                t.effective_frequency_hz(),
                t.top,
                t.dead_time_ticks,
                t.adc_sampling_period_hnsec()
            ),
            Err(e) => warn!("{} Hz: {}", frequency_hz, e),
        }
    }
}

fn print_tone(cfg: &HostConfig) {
    let plan = TonePlan::new(cfg.tone_frequency_hz, cfg.tone_duration_msec);
    println!(
        "tone               {} Hz, {} pulses of {} ns, {} ns idle",
        plan.frequency_hz, plan.half_periods, plan.active_ns, plan.idle_ns
    );
}

fn main() -> Result<()> {
    init_tracing();

    let cfg = HostConfig::load_default()?;
    info!("Timer clock {} Hz, prescaler {}", cfg.pwm.timer_clock_hz, cfg.pwm.prescaler);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("sweep") => print_sweep(&cfg.pwm, cfg.sweep_step_hz),
        Some("simulate") => {
            let frequency_hz = parse_frequency(args.get(1), &cfg.pwm)?;
            let duty = match args.get(2) {
                Some(s) => s.parse().with_context(|| format!("Invalid duty {s:?}\n{USAGE}"))?,
                None => 0.25,
            };
            sim::run(cfg.pwm, frequency_hz, duty)?;
        }
        Some("-h" | "--help") => println!("{USAGE}"),
        _ => {
            let frequency_hz = parse_frequency(args.first(), &cfg.pwm)?;
            print_plan(&cfg.pwm, frequency_hz)?;
            print_tone(&cfg);
        }
    }
    Ok(())
}
