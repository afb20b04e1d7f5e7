//! Every transition reaches the console.

use ledsem_kernel::config::SystemConfig;
use ledsem_kernel::console::{self, ConsoleLogger, LoggerError};
use ledsem_kernel::system::System;
use ledsem_kernel::testutil::{MemoryConsole, RecordingOutput};
use ledsem_kernel::time::Clock;

#[test]
fn transitions_are_logged_with_ticks() {
    let console = MemoryConsole::new();
    let clock = Clock::new();
    console::init(ConsoleLogger::new(console.clone()).with_timer(clock.clone()))
        .expect("first logger install");
    assert_eq!(
        console::init(ConsoleLogger::new(MemoryConsole::new())),
        Err(LoggerError::AlreadyInstalled)
    );

    let (output, _log) = RecordingOutput::new();
    let mut system =
        System::with_clock(output, SystemConfig::default(), clock).expect("both owners spawn");
    system.run_for(1500);
    system.shutdown();

    let lines = console.lines();
    let has = |needle: &str| lines.iter().any(|line| line.contains(needle));
    assert!(has("turn on LED: token acquired"));
    assert!(has("turn on LED: LED set to ON"));
    assert!(has("turn on LED: token released"));
    assert!(has("turn off LED: LED set to OFF"));
    assert!(has("turn off LED: stopped"));
    assert!(lines
        .iter()
        .any(|line| line.starts_with("[ OK ]     1000") && line.contains("LED set to OFF")));
}
