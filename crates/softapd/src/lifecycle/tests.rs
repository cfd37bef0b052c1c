//! Lifecycle sequencing against the recording plant.

use rstest::{fixture, rstest};

use super::*;
use crate::command::ResponseCode;
use crate::driver::DriverMode;
use crate::hostapd::{ApConfig, Security, Visibility};
use crate::power::RadioPowerState;
use crate::supervisor::DaemonRunState;
use crate::test_support::{Faults, Rig};

const IFACE: &str = "athap0";

#[fixture]
fn rig() -> Rig {
    Rig::new()
}

fn guest_network() -> ApConfig {
    ApConfig {
        iface: IFACE.to_owned(),
        ssid: "guest".to_owned(),
        channel: 11,
        visibility: Visibility::Broadcast,
        security: Security::Wpa2Psk {
            passphrase: "correct horse".to_owned(),
        },
    }
}

fn assert_quiescent(rig: &Rig) {
    assert_eq!(rig.lifecycle.state(), LifecycleState::Idle);
    let plant = rig.plant();
    assert_eq!(plant.radio, RadioPowerState::Off);
    assert_eq!(plant.daemon, DaemonRunState::Stopped);
    assert!(!plant.wake_lock_held);
    assert!(!plant.session_live);
}

fn kill_daemon(rig: &Rig) {
    let mut plant = rig.plant();
    plant.daemon = DaemonRunState::Stopped;
    plant.session_live = false;
}

#[rstest]
fn cold_start_brackets_the_switch_with_power(rig: Rig) {
    let outcome = rig.lifecycle.start(IFACE).expect("start succeeds");

    assert_eq!(outcome, StartOutcome::Started);
    assert!(rig.lifecycle.is_softap_started());
    let plant = rig.plant();
    assert_eq!(plant.power_ops, [RadioPowerState::Off, RadioPowerState::On]);
    assert_eq!(plant.switches, [DriverMode::AccessPoint]);
    assert_eq!(plant.interfaces_up, [IFACE]);
    assert_eq!(plant.daemon, DaemonRunState::Running);
    assert!(plant.session_live);
    assert!(plant.wake_lock_held);
}

#[rstest]
fn cold_start_seeds_the_daemon_configuration(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("start succeeds");
    assert_eq!(rig.config_file().as_deref(), Some("interface=athap0\n"));
}

#[rstest]
fn cold_start_keeps_an_existing_configuration(rig: Rig) {
    rig.write_config_file("ssid=previous\n");
    rig.lifecycle.start(IFACE).expect("start succeeds");
    assert_eq!(rig.config_file().as_deref(), Some("ssid=previous\n"));
}

#[rstest]
fn start_while_active_touches_nothing(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("first start");
    let counts = |rig: &Rig| {
        let plant = rig.plant();
        (plant.power_ops.len(), plant.start_requests)
    };
    let before = counts(&rig);

    let outcome = rig.lifecycle.start(IFACE).expect("second start");

    assert_eq!(outcome, StartOutcome::AlreadyRunning);
    assert_eq!(counts(&rig), before);
}

#[rstest]
fn stop_while_idle_is_a_no_op(rig: Rig) {
    assert_eq!(
        rig.lifecycle.stop().expect("stop succeeds"),
        StopOutcome::AlreadyStopped
    );
    assert!(rig.plant().power_ops.is_empty());
    assert_eq!(rig.plant().stop_requests, 0);
}

#[rstest]
fn stop_unwinds_everything(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("start succeeds");

    assert_eq!(rig.lifecycle.stop().expect("stop succeeds"), StopOutcome::Stopped);

    assert_quiescent(&rig);
    let plant = rig.plant();
    assert_eq!(plant.driver_mode, DriverMode::Station);
    assert_eq!(plant.stop_requests, 1);
}

#[rstest]
#[case::switch(|f: &mut Faults| f.switch = true)]
#[case::daemon_timeout(|f: &mut Faults| f.daemon_never_runs = true)]
#[case::daemon_crash(|f: &mut Faults| f.daemon_crashes = true)]
#[case::attach(|f: &mut Faults| f.connect = true)]
#[case::wake_lock(|f: &mut Faults| f.wake_lock = true)]
fn failed_start_leaves_the_radio_off(rig: Rig, #[case] fault: fn(&mut Faults)) {
    rig.arm(fault);

    let error = rig.lifecycle.start(IFACE).expect_err("start fails");

    assert!(matches!(error, LifecycleError::Start(_)));
    assert_eq!(error.response_code(), ResponseCode::ServiceStartFailed);
    assert_quiescent(&rig);
}

#[rstest]
fn daemon_timeout_reports_the_supervisor_and_unbinds(rig: Rig) {
    rig.arm(|f| f.daemon_never_runs = true);

    let error = rig.lifecycle.start(IFACE).expect_err("start fails");

    assert!(matches!(
        error,
        LifecycleError::Start(StepError::Supervisor(_))
    ));
    assert_eq!(
        rig.plant().switches,
        [DriverMode::AccessPoint, DriverMode::Station]
    );
}

#[rstest]
fn start_recovers_after_a_failed_attempt(rig: Rig) {
    rig.arm(|f| f.connect = true);
    rig.lifecycle.start(IFACE).expect_err("first start fails");

    rig.arm(|f| f.connect = false);
    let outcome = rig.lifecycle.start(IFACE).expect("second start succeeds");

    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(rig.plant().connects, 2);
}

#[rstest]
fn failing_unbind_still_forces_idle(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("start succeeds");
    rig.arm(|f| f.switch = true);

    let error = rig.lifecycle.stop().expect_err("stop reports the failure");

    assert!(matches!(error, LifecycleError::Stop(StepError::Driver(_))));
    assert_eq!(error.response_code(), ResponseCode::OperationFailed);
    assert_quiescent(&rig);
}

#[rstest]
fn reconfigure_while_idle_only_saves(rig: Rig) {
    let outcome = rig
        .lifecycle
        .reconfigure(guest_network())
        .expect("reconfigure succeeds");

    assert_eq!(outcome, ReconfigureOutcome::Saved);
    assert_eq!(rig.plant().reloads, 0);
    let written = rig.config_file().expect("config written");
    assert!(written.contains("ssid=guest\n"));
    assert!(written.contains("wpa_passphrase=correct horse\n"));
}

#[rstest]
fn reconfigure_while_active_reloads_the_daemon(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("start succeeds");

    let outcome = rig
        .lifecycle
        .reconfigure(guest_network())
        .expect("reconfigure succeeds");

    assert_eq!(outcome, ReconfigureOutcome::Applied);
    assert_eq!(rig.plant().reloads, 1);
    assert!(rig.lifecycle.is_softap_started());
}

#[rstest]
fn rejected_reload_is_an_operation_failure(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("start succeeds");
    rig.arm(|f| f.reload = true);

    let error = rig
        .lifecycle
        .reconfigure(guest_network())
        .expect_err("reload rejected");

    assert!(matches!(
        error,
        LifecycleError::Reconfigure(StepError::Session(_))
    ));
    assert_eq!(error.response_code(), ResponseCode::OperationFailed);
    assert!(rig.config_file().is_some_and(|c| c.contains("ssid=guest\n")));
    assert!(rig.lifecycle.is_softap_started());
}

#[rstest]
fn reload_that_takes_the_daemon_down_tears_down(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("start succeeds");
    rig.arm(|f| f.reload_crashes_daemon = true);

    let error = rig
        .lifecycle
        .reconfigure(guest_network())
        .expect_err("reload fails");

    assert!(matches!(error, LifecycleError::Reconfigure(_)));
    assert_quiescent(&rig);
}

#[rstest]
fn reconfigure_after_the_daemon_dies_only_saves(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("start succeeds");
    kill_daemon(&rig);

    let outcome = rig
        .lifecycle
        .reconfigure(guest_network())
        .expect("reconfigure succeeds");

    assert_eq!(outcome, ReconfigureOutcome::Saved);
    assert_eq!(rig.plant().reloads, 0);
    assert_quiescent(&rig);
}

#[rstest]
fn unwritable_config_is_a_reconfigure_failure(rig: Rig) {
    let root = rig.config.ctrl_dir.parent().expect("rig root");
    std::fs::remove_dir_all(root).expect("remove rig dir");

    let error = rig
        .lifecycle
        .reconfigure(guest_network())
        .expect_err("write fails");

    assert!(matches!(
        error,
        LifecycleError::Reconfigure(StepError::ConfigWrite(_))
    ));
}

#[rstest]
fn status_reports_an_active_softap(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("start succeeds");

    let status = rig.lifecycle.status();

    assert!(status.is_started());
    assert_eq!(status.iface.as_deref(), Some(IFACE));
    assert_eq!(status.radio, Some(RadioPowerState::On));
    assert!(status.daemon_running);
}

#[rstest]
fn status_tears_down_after_the_daemon_dies(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("start succeeds");
    kill_daemon(&rig);

    let status = rig.lifecycle.status();

    assert!(!status.is_started());
    assert_eq!(status.state, LifecycleState::Idle);
    assert_eq!(status.radio, Some(RadioPowerState::Off));
    assert_quiescent(&rig);
}

#[rstest]
fn is_softap_started_notices_a_dead_daemon(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("start succeeds");
    kill_daemon(&rig);

    assert!(!rig.lifecycle.is_softap_started());
    assert_quiescent(&rig);
}

#[rstest]
fn start_after_the_daemon_dies_brings_it_back(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("first start");
    kill_daemon(&rig);

    let outcome = rig.lifecycle.start(IFACE).expect("second start");

    assert_eq!(outcome, StartOutcome::Started);
    let plant = rig.plant();
    assert_eq!(plant.start_requests, 2);
    assert_eq!(plant.daemon, DaemonRunState::Running);
    assert!(plant.session_live);
}

#[rstest]
fn driver_leaving_access_point_mode_ends_the_softap(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("start succeeds");
    rig.plant().driver_mode = DriverMode::Station;

    let status = rig.lifecycle.status();

    assert!(!status.is_started());
    assert_quiescent(&rig);
}

#[rstest]
fn firmware_reload_while_idle_only_rebinds(rig: Rig) {
    rig.lifecycle
        .reload_firmware(IFACE, DriverMode::AccessPoint)
        .expect("reload succeeds");

    assert_eq!(rig.lifecycle.state(), LifecycleState::Idle);
    let plant = rig.plant();
    assert_eq!(plant.switches, [DriverMode::AccessPoint]);
    assert_eq!(plant.radio, RadioPowerState::On);
    assert_eq!(plant.start_requests, 0);
}

#[rstest]
fn firmware_reload_in_access_point_mode_keeps_the_softap(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("start succeeds");

    rig.lifecycle
        .reload_firmware(IFACE, DriverMode::AccessPoint)
        .expect("reload succeeds");

    assert!(rig.lifecycle.is_softap_started());
}

#[rstest]
fn firmware_reload_to_station_ends_an_active_softap(rig: Rig) {
    rig.lifecycle.start(IFACE).expect("start succeeds");

    rig.lifecycle
        .reload_firmware(IFACE, DriverMode::Station)
        .expect("reload succeeds");

    assert_quiescent(&rig);
    assert_eq!(rig.plant().driver_mode, DriverMode::Station);
}

#[rstest]
fn failed_firmware_reload_is_an_operation_failure(rig: Rig) {
    rig.arm(|f| f.switch = true);

    let error = rig
        .lifecycle
        .reload_firmware(IFACE, DriverMode::AccessPoint)
        .expect_err("switch fails");

    assert!(matches!(
        error,
        LifecycleError::FirmwareReload(StepError::Driver(_))
    ));
    assert_eq!(error.response_code(), ResponseCode::OperationFailed);
    assert_eq!(rig.plant().radio, RadioPowerState::Off);
}

#[rstest]
fn status_display_summarises_state(rig: Rig) {
    let status = rig.lifecycle.status();
    assert_eq!(
        status.to_string(),
        "Softap service is not running (state=idle radio=off daemon=stopped)"
    );
}
