//! `log` backend writing to a HAL console.
//!
//! Lines look like the boot log of a small kernel:
//!
//! ```text
//! [ OK ]     1000 ledsem_kernel::task::owner: turn off LED: LED set to OFF
//! [WARN]     1300 ledsem_kernel::task::owner: turn on LED: token not acquired after 300 ticks, retrying
//! ```

use alloc::boxed::Box;
use core::fmt::{self, Write};
use conquer_once::spin::OnceCell;
use ledsem_hal::{Console, Timer};
use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

/// The installed logger. Set once, lives for the rest of the program.
static LOGGER: OnceCell<ConsoleLogger> = OnceCell::uninit();

/// Status tag printed in front of each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Success - `[ OK ]`
    Ok,
    /// Failure - `[FAIL]`
    Fail,
    /// Warning - `[WARN]`
    Warn,
    /// Informational - `[INFO]`
    Info,
}

impl Status {
    fn tag(self) -> &'static str {
        match self {
            Status::Ok => "[ OK ]",
            Status::Fail => "[FAIL]",
            Status::Warn => "[WARN]",
            Status::Info => "[INFO]",
        }
    }
}

impl From<log::Level> for Status {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Status::Fail,
            log::Level::Warn => Status::Warn,
            log::Level::Info => Status::Ok,
            log::Level::Debug | log::Level::Trace => Status::Info,
        }
    }
}

/// Errors installing the global logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerError {
    /// A logger is already installed.
    AlreadyInstalled,
}

impl fmt::Display for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggerError::AlreadyInstalled => write!(f, "a logger is already installed"),
        }
    }
}

/// A [`Log`] implementation printing one line per record to a [`Console`].
pub struct ConsoleLogger {
    sink: Mutex<Box<dyn Console + Send>>,
    timer: Option<Box<dyn Timer + Send + Sync>>,
    level: LevelFilter,
}

impl ConsoleLogger {
    /// Log `Info` and above to `sink`.
    pub fn new(sink: impl Console + Send + 'static) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
            timer: None,
            level: LevelFilter::Info,
        }
    }

    /// Stamp each line with the tick read from `timer`.
    pub fn with_timer(mut self, timer: impl Timer + Send + Sync + 'static) -> Self {
        self.timer = Some(Box::new(timer));
        self
    }

    /// Set the most verbose level that is printed.
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let status = Status::from(record.level());
        let mut sink = self.sink.lock();
        let mut writer = SinkWriter(&mut **sink);
        // SinkWriter never fails
        let _ = match &self.timer {
            Some(timer) => writeln!(
                writer,
                "{} {:>8} {}: {}",
                status.tag(),
                timer.current_ticks(),
                record.target(),
                record.args()
            ),
            None => writeln!(writer, "{} {}: {}", status.tag(), record.target(), record.args()),
        };
    }

    fn flush(&self) {}
}

/// Adapts a [`Console`] to `core::fmt::Write`.
struct SinkWriter<'a>(&'a mut (dyn Console + Send));

impl Write for SinkWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

/// Install `logger` as the global `log` backend.
///
/// Only the first call succeeds; later calls leave the installed logger in
/// place and return `AlreadyInstalled`.
pub fn init(logger: ConsoleLogger) -> Result<(), LoggerError> {
    let level = logger.level;
    LOGGER
        .try_init_once(|| logger)
        .map_err(|_| LoggerError::AlreadyInstalled)?;
    let installed = LOGGER.get().ok_or(LoggerError::AlreadyInstalled)?;
    log::set_logger(installed).map_err(|_| LoggerError::AlreadyInstalled)?;
    log::set_max_level(level);
    Ok(())
}
