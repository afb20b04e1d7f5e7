//! Two owners contending for one LED, run on the virtual clock.

use ledsem_kernel::config::SystemConfig;
use ledsem_kernel::sync::Timeout;
use ledsem_kernel::config::ConfigError;
use ledsem_kernel::system::{BuildError, System};
use ledsem_kernel::testutil::{RecordingOutput, WriteLog};
use ledsem_kernel::time::Clock;
use ledsem_kernel::{Level, SyncError};

fn system(config: SystemConfig) -> (System<RecordingOutput>, WriteLog) {
    let clock = Clock::new();
    let (output, log) = RecordingOutput::with_clock(clock.clone());
    let system = System::with_clock(output, config, clock).expect("both owners spawn");
    (system, log)
}

fn write_ticks(log: &WriteLog) -> Vec<u64> {
    log.writes().iter().map(|w| w.at).collect()
}

#[test]
fn on_then_off_without_intermediate_value() {
    let (mut system, log) = system(SystemConfig::default());

    system.run_for(1500);

    assert_eq!(log.levels(), [Level::On, Level::Off]);
    assert_eq!(write_ticks(&log), [0, 1000]);
    assert_eq!(system.actuator().state(), Some(Level::Off));
}

#[test]
fn simultaneous_contenders_have_one_winner() {
    let (mut system, log) = system(SystemConfig::default());

    system.run_for(0);

    assert_eq!(log.levels(), [Level::On]);
    assert_eq!(system.actuator().holder(), Some(system.activate_id()));
    assert_eq!(system.actuator().waiting(), 1);
    assert_eq!(system.stats().acquisitions, 1);

    // The loser stays blocked for the whole hold
    system.run_for(999);
    assert_eq!(log.levels(), [Level::On]);
    assert_eq!(system.actuator().state(), Some(Level::On));
}

#[test]
fn token_never_has_two_holders() {
    let (mut system, _log) = system(SystemConfig::default().with_hold(7).with_cooldown(3));

    system.run_for(60_000);

    let stats = system.stats();
    assert_eq!(stats.peak_holders, 1);
    assert!(stats.holders <= 1);
    assert!(stats.acquisitions - stats.releases <= 1);
    assert!(stats.acquisitions > 1000);
}

#[test]
fn both_owners_keep_getting_the_led() {
    let (mut system, log) = system(SystemConfig::default());

    system.run_for(10_500);

    let ticks = write_ticks(&log);
    assert_eq!(ticks, (0..=10).map(|n| n * 1000).collect::<Vec<_>>());
    let levels = log.levels();
    assert!(levels.windows(2).all(|pair| pair[0] != pair[1]));
    assert_eq!(log.count(Level::On), 6);
    assert_eq!(log.count(Level::Off), 5);
}

#[test]
fn zero_cooldown_still_alternates() {
    let (mut system, log) = system(SystemConfig::default().with_cooldown(0));

    system.run_for(4500);

    assert_eq!(
        log.levels(),
        [Level::On, Level::Off, Level::On, Level::Off, Level::On]
    );
    assert_eq!(write_ticks(&log), [0, 1000, 2000, 3000, 4000]);
}

#[test]
fn zero_hold_keeps_both_owners_running() {
    let (mut system, log) = system(SystemConfig::default().with_hold(0).with_cooldown(1));

    system.run_for(10);

    assert!(log.count(Level::On) > 1);
    assert!(log.count(Level::Off) > 1);
    assert_eq!(system.stats().peak_holders, 1);
}

#[test]
fn zero_period_is_refused() {
    let (output, _log) = RecordingOutput::new();
    let config = SystemConfig::default().with_hold(0).with_cooldown(0);

    let built = System::with_clock(output, config, Clock::new());

    assert_eq!(
        built.err(),
        Some(BuildError::Config(ConfigError::ZeroPeriod {
            task: "turn on LED"
        }))
    );
}

#[test]
fn actuator_state_follows_last_completed_write() {
    let (mut system, log) = system(SystemConfig::default().with_hold(40).with_cooldown(10));

    for _ in 0..50 {
        system.run_for(13);
        assert_eq!(system.actuator().state(), log.levels().last().copied());
    }
}

#[test]
fn bounded_wait_times_out_and_retries() {
    let config = SystemConfig::default().with_acquire_timeout(Timeout::Ticks(300));
    let (mut system, log) = system(config);

    system.run_for(1000);

    // "turn off" gave up at 300 and 700, then won the token at 1000
    assert_eq!(system.stats().timeouts, 2);
    assert_eq!(log.levels(), [Level::On, Level::Off]);
    assert_eq!(write_ticks(&log), [0, 1000]);
    assert_eq!(system.exit_status(system.activate_id()), None);
    assert_eq!(system.exit_status(system.deactivate_id()), None);
}

#[test]
fn actuator_fault_halts_only_its_owner() {
    let clock = Clock::new();
    let (output, log) = RecordingOutput::failing_on(Level::Off, clock.clone());
    let mut system =
        System::with_clock(output, SystemConfig::default(), clock).expect("both owners spawn");

    system.run_for(5000);

    assert_eq!(
        system.exit_status(system.deactivate_id()),
        Some(&Err(SyncError::ResourceFault))
    );
    assert_eq!(system.exit_status(system.activate_id()), None);
    assert_eq!(write_ticks(&log), [0, 1100, 2200, 3300, 4400]);
    assert_eq!(log.count(Level::Off), 0);
    assert_eq!(system.actuator().state(), Some(Level::On));
}

#[test]
fn shutdown_releases_token_and_stops_both_owners() {
    let (mut system, log) = system(SystemConfig::default());
    system.run_for(1500);
    assert!(system.actuator().holder().is_some());
    assert_eq!(system.actuator().waiting(), 1);

    system.shutdown();

    assert_eq!(system.exit_status(system.activate_id()), Some(&Ok(())));
    assert_eq!(system.exit_status(system.deactivate_id()), Some(&Ok(())));
    assert_eq!(system.actuator().holder(), None);
    assert_eq!(system.actuator().waiting(), 0);
    assert_eq!(system.clock().pending_timers(), 0);
    let stats = system.stats();
    assert_eq!(stats.acquisitions, stats.releases);

    // Nothing moves after shutdown
    system.run_for(5000);
    assert_eq!(log.levels(), [Level::On, Level::Off]);
}
