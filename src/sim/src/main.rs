//! LedSem host simulator.
//!
//! Runs the two-task LED system on a virtual clock and prints the kernel log
//! to stdout. Useful for watching the arbitration without a board.

use std::{fmt, io::Write, process};

use clap::{value_t, App, Arg};
use ledsem_common::{SyncError, TaskId};
use ledsem_hal::{Console, DigitalOutput, Level};
use ledsem_kernel::config::{SystemConfig, DEFAULT_COOLDOWN_TICKS, DEFAULT_HOLD_TICKS};
use ledsem_kernel::console::{self, ConsoleLogger, LoggerError};
use ledsem_kernel::sync::Timeout;
use ledsem_kernel::system::{BuildError, System};
use ledsem_kernel::time::Clock;
use log::LevelFilter;

/// Console printing to the process's stdout.
struct Stdout;

impl Console for Stdout {
    fn write_str(&mut self, s: &str) {
        let mut out = std::io::stdout().lock();
        // Best effort: a closed stdout must not stop the simulation.
        let _ = out.write_all(s.as_bytes());
    }
}

/// An LED that only exists in the log.
struct SimulatedLed {
    pin: u8,
}

impl DigitalOutput for SimulatedLed {
    type Error = core::convert::Infallible;

    fn set(&mut self, level: Level) -> Result<(), Self::Error> {
        log::debug!("pin {} driven {}", self.pin, level);
        Ok(())
    }
}

enum SimError {
    Logger(LoggerError),
    Build(BuildError),
    Halted(TaskId, SyncError),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Logger(err) => write!(f, "logger: {}", err),
            SimError::Build(err) => write!(f, "{}", err),
            SimError::Halted(id, err) => write!(f, "{} halted: {}", id, err),
        }
    }
}

struct Options {
    duration: u64,
    hold: u64,
    cooldown: u64,
    timeout: Option<u64>,
    level: LevelFilter,
}

fn parse_args() -> Options {
    let matches = App::new("ledsem-sim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Two tasks sharing one LED through a binary semaphore")
        .arg(
            Arg::with_name("duration")
                .short("d")
                .long("duration")
                .takes_value(true)
                .default_value("5000")
                .help("Simulated time to run, in ticks (1 tick = 1 ms)"),
        )
        .arg(
            Arg::with_name("hold")
                .long("hold")
                .takes_value(true)
                .help("Ticks each task keeps the LED"),
        )
        .arg(
            Arg::with_name("cooldown")
                .long("cooldown")
                .takes_value(true)
                .help("Ticks each task idles after releasing (hold and cooldown may not both be 0)"),
        )
        .arg(
            Arg::with_name("timeout")
                .short("t")
                .long("timeout")
                .takes_value(true)
                .help("Bound each acquire to this many ticks (default: wait forever)"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Also print pin-level debug output"),
        )
        .get_matches();

    let duration = value_t!(matches, "duration", u64).unwrap_or_else(|e| e.exit());
    let hold = if matches.is_present("hold") {
        value_t!(matches, "hold", u64).unwrap_or_else(|e| e.exit())
    } else {
        DEFAULT_HOLD_TICKS
    };
    let cooldown = if matches.is_present("cooldown") {
        value_t!(matches, "cooldown", u64).unwrap_or_else(|e| e.exit())
    } else {
        DEFAULT_COOLDOWN_TICKS
    };
    let timeout = if matches.is_present("timeout") {
        Some(value_t!(matches, "timeout", u64).unwrap_or_else(|e| e.exit()))
    } else {
        None
    };
    let level = if matches.is_present("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Options {
        duration,
        hold,
        cooldown,
        timeout,
        level,
    }
}

fn run(options: Options) -> Result<(), SimError> {
    let clock = Clock::new();
    console::init(
        ConsoleLogger::new(Stdout)
            .with_timer(clock.clone())
            .with_level(options.level),
    )
    .map_err(SimError::Logger)?;

    let timeout = options.timeout.map_or(Timeout::Forever, Timeout::Ticks);
    let config = SystemConfig::default()
        .with_hold(options.hold)
        .with_cooldown(options.cooldown)
        .with_acquire_timeout(timeout);
    let led = SimulatedLed {
        pin: config.led_pin,
    };

    let mut system = System::with_clock(led, config, clock).map_err(SimError::Build)?;
    system.run_for(options.duration);
    system.shutdown();

    let stats = system.stats();
    log::info!(
        "{} acquisitions, {} releases, {} timeouts, peak holders {}",
        stats.acquisitions,
        stats.releases,
        stats.timeouts,
        stats.peak_holders
    );

    for id in [system.activate_id(), system.deactivate_id()] {
        if let Some(Err(err)) = system.exit_status(id) {
            return Err(SimError::Halted(id, *err));
        }
    }
    Ok(())
}

fn main() {
    let options = parse_args();
    if let Err(err) = run(options) {
        eprintln!("ledsem-sim: {}", err);
        process::exit(1);
    }
}
