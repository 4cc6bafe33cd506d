//! Autohome runs against the simulated index sensors.

mod common;

use approx::assert_abs_diff_eq;
use common::Rig;
use eqmount::mock::MockSpec;
use eqmount::{AutohomeState, AxisId, MountConfig, MountError, MountState};

const HOME_RA: f64 = 0x800000 as f64;
const HOME_DEC: f64 = (0x800000 + 9_024_000 / 4) as f64;

/// Put both axes off home by hand, on opposite sides of their sensors.
fn displaced(config: MountConfig, spec: MockSpec) -> Rig {
    let rig = Rig::connect(config, spec);
    rig.mount.set_physical_position(AxisId::Ra, HOME_RA + 200_000.0);
    rig.mount.set_physical_position(AxisId::Dec, HOME_DEC - 150_000.0);
    rig
}

fn confirm(rig: &mut Rig) {
    assert_eq!(rig.driver.autohome().unwrap(), AutohomeState::Confirm);
    assert_eq!(rig.driver.autohome().unwrap(), AutohomeState::Phase1);
    assert_eq!(rig.driver.state(), MountState::Homing);
}

#[test]
fn test_autohome_finds_both_sensors() {
    let mut rig = displaced(MountConfig::default(), MockSpec::default());
    confirm(&mut rig);

    let mut phases = Vec::new();
    for _ in 0..200 {
        let snapshot = rig.tick();
        if phases.last() != Some(&snapshot.autohome) {
            phases.push(snapshot.autohome);
        }
        if snapshot.autohome == AutohomeState::Idle {
            break;
        }
    }

    assert_eq!(
        phases,
        vec![
            AutohomeState::Phase1,
            AutohomeState::Phase2,
            AutohomeState::Phase3,
            AutohomeState::Phase4,
            AutohomeState::Phase5,
            AutohomeState::Phase6,
            AutohomeState::Idle,
        ]
    );
    assert_eq!(rig.driver.state(), MountState::Idle);

    let home = &rig.driver.config().autohome;
    assert_abs_diff_eq!(rig.mount.encoder(AxisId::Ra), f64::from(home.home_encoder_ra), epsilon = 1e-6);
    assert_abs_diff_eq!(rig.mount.encoder(AxisId::Dec), f64::from(home.home_encoder_dec), epsilon = 1e-6);
    assert_abs_diff_eq!(rig.mount.physical_position(AxisId::Ra), HOME_RA, epsilon = 1.0);
    assert_abs_diff_eq!(rig.mount.physical_position(AxisId::Dec), HOME_DEC, epsilon = 1.0);
    assert!(rig.mount.aux_encoder_enabled(AxisId::Ra));
    assert!(rig.mount.aux_encoder_enabled(AxisId::Dec));

    let geometry = rig.driver.info().unwrap().geometry;
    assert_eq!(geometry.ra_zero, 0x800000);
    assert_eq!(geometry.dec_zero, 0x800000);

    // Home is the pole on the normal side.
    let snapshot = rig.tick();
    assert_abs_diff_eq!(snapshot.dec, 90.0, epsilon = 1e-3);
}

#[test]
fn test_autohome_needs_confirmation() {
    let mut rig = displaced(MountConfig::default(), MockSpec::default());
    assert_eq!(rig.driver.autohome().unwrap(), AutohomeState::Confirm);
    assert_eq!(rig.driver.state(), MountState::Idle);

    let timeout = rig.driver.config().autohome.confirm_timeout_ticks;
    for _ in 0..=timeout {
        rig.tick();
    }
    assert_eq!(rig.driver.autohome_state(), AutohomeState::Idle);
    assert_eq!(rig.driver.state(), MountState::Idle);
    assert!(!rig.mount.axis_status(AxisId::Ra).running);
}

#[test]
fn test_abort_during_search_stops_both_axes() {
    let mut rig = displaced(MountConfig::default(), MockSpec::default());
    confirm(&mut rig);

    let mut searching = 0;
    for _ in 0..50 {
        if rig.tick().autohome == AutohomeState::Phase3 {
            searching += 1;
            if searching == 3 {
                break;
            }
        }
    }
    assert_eq!(searching, 3);
    assert!(rig.mount.axis_status(AxisId::Ra).running);

    rig.driver.abort().unwrap();
    assert_eq!(rig.driver.autohome_state(), AutohomeState::Idle);
    assert_eq!(rig.driver.state(), MountState::Idle);
    assert!(!rig.mount.axis_status(AxisId::Ra).running);
    assert!(!rig.mount.axis_status(AxisId::Dec).running);

    // Nothing resumes on later ticks.
    let snapshot = rig.tick();
    assert_eq!(snapshot.autohome, AutohomeState::Idle);
    assert!(!rig.mount.axis_status(AxisId::Ra).running);
}

#[test]
fn test_missing_sensor_fails_after_search_limit() {
    let mut config = MountConfig::default();
    config.autohome.search_limit_ticks = 20;
    let spec = MockSpec {
        home_position: [None, Some(0x800000 + 9_024_000 / 4)],
        ..MockSpec::default()
    };
    let mut rig = displaced(config, spec);
    confirm(&mut rig);

    let mut finished = false;
    for _ in 0..60 {
        if rig.tick().autohome == AutohomeState::Idle {
            finished = true;
            break;
        }
    }
    assert!(finished, "autohome should give up");
    assert_eq!(rig.driver.state(), MountState::Idle);
    assert!(!rig.mount.axis_status(AxisId::Ra).running);
    assert!(!rig.mount.axis_status(AxisId::Dec).running);
    // Encoders were never overwritten.
    assert!(!rig.mount.aux_encoder_enabled(AxisId::Ra));
}

#[test]
fn test_parameter_error_is_reported_not_folded_into_failure() {
    let mut config = MountConfig::default();
    // Above the configured maximum slew rate.
    config.autohome.fast_rate = 1000.0;
    let mut rig = displaced(config, MockSpec::default());
    confirm(&mut rig);

    let mut error = None;
    for _ in 0..20 {
        rig.clock.advance(rig.driver.config().tick_period());
        if let Err(e) = rig.driver.tick() {
            error = Some(e);
            break;
        }
    }
    assert!(matches!(error, Some(MountError::InvalidParameter(_))), "{error:?}");
    assert!(rig.driver.is_connected());
    assert_eq!(rig.driver.autohome_state(), AutohomeState::Idle);
    assert_eq!(rig.driver.state(), MountState::Idle);
    assert!(!rig.mount.axis_status(AxisId::Ra).running);
    assert!(!rig.mount.axis_status(AxisId::Dec).running);
}

#[test]
fn test_autohome_refused_while_parked() {
    let mut rig = Rig::north();
    rig.driver.park().unwrap();
    rig.tick();
    assert_eq!(rig.driver.state(), MountState::Parked);
    assert!(rig.driver.autohome().is_err());
    assert_eq!(rig.driver.autohome_state(), AutohomeState::Idle);
}
