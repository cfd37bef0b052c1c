//! Recording fakes standing in for the radio, kernel, OS supervisor and
//! daemon, shared by the lifecycle unit tests and the behaviour tests.
//!
//! The fakes all update one [`Plant`], so a test can inject a fault before an
//! operation and inspect the resulting hardware state afterwards. The real
//! [`DriverBinder`], [`DaemonSupervisor`] and [`HostapdConfigWriter`] run on
//! top of them.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use camino::Utf8PathBuf;
use tempfile::TempDir;

use softap_config::{Config, Timings};

use crate::driver::{
    BindFailure, ConfigFileSpec, DriverBinder, DriverMode, ModeSwitch, SwitchOutcome,
};
use crate::hostapd::HostapdConfigWriter;
use crate::interface::{InterfaceControl, InterfaceError};
use crate::lifecycle::{Collaborators, SoftapLifecycle};
use crate::poll::Cancellation;
use crate::power::{PowerError, RadioPower, RadioPowerState};
use crate::session::{SessionControl, SessionError};
use crate::supervisor::{
    DaemonControl, DaemonRunState, DaemonSupervisor, ServiceManager, ServiceStatus,
};
use crate::wake_lock::{WakeLock, WakeLockError};

/// Faults a test can arm before an operation.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Faults {
    pub switch: bool,
    pub daemon_never_runs: bool,
    pub daemon_crashes: bool,
    pub connect: bool,
    pub wake_lock: bool,
    pub reload: bool,
    pub reload_crashes_daemon: bool,
}

/// Simulated hardware and daemon state plus a record of calls.
#[derive(Debug)]
pub(crate) struct Plant {
    pub radio: RadioPowerState,
    pub driver_mode: DriverMode,
    pub daemon: DaemonRunState,
    pub generation: u32,
    pub session_live: bool,
    pub wake_lock_held: bool,
    pub faults: Faults,
    pub power_ops: Vec<RadioPowerState>,
    pub switches: Vec<DriverMode>,
    pub interfaces_up: Vec<String>,
    pub start_requests: u32,
    pub stop_requests: u32,
    pub connects: u32,
    pub reloads: u32,
}

impl Default for Plant {
    fn default() -> Self {
        Self {
            radio: RadioPowerState::Off,
            driver_mode: DriverMode::Station,
            daemon: DaemonRunState::Stopped,
            generation: 0,
            session_live: false,
            wake_lock_held: false,
            faults: Faults::default(),
            power_ops: Vec::new(),
            switches: Vec::new(),
            interfaces_up: Vec::new(),
            start_requests: 0,
            stop_requests: 0,
            connects: 0,
            reloads: 0,
        }
    }
}

pub(crate) type SharedPlant = Arc<Mutex<Plant>>;

fn with<T>(plant: &SharedPlant, f: impl FnOnce(&mut Plant) -> T) -> T {
    let mut guard = plant.lock().expect("plant lock");
    f(&mut guard)
}

struct FakePower(SharedPlant);

impl RadioPower for FakePower {
    fn query_power(&mut self) -> Result<RadioPowerState, PowerError> {
        Ok(with(&self.0, |plant| plant.radio))
    }

    fn power_on(&mut self) -> Result<(), PowerError> {
        with(&self.0, |plant| {
            plant.power_ops.push(RadioPowerState::On);
            plant.radio = RadioPowerState::On;
        });
        Ok(())
    }

    fn power_off(&mut self) -> Result<(), PowerError> {
        with(&self.0, |plant| {
            plant.power_ops.push(RadioPowerState::Off);
            plant.radio = RadioPowerState::Off;
        });
        Ok(())
    }
}

struct FakeSwitch(SharedPlant);

impl ModeSwitch for FakeSwitch {
    fn switch(&mut self, target: DriverMode) -> Result<SwitchOutcome, BindFailure> {
        with(&self.0, |plant| {
            plant.switches.push(target);
            if plant.faults.switch {
                return Err(BindFailure::Parameter {
                    path: PathBuf::from("ifname"),
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                });
            }
            if plant.driver_mode == target {
                return Ok(SwitchOutcome::AlreadyInMode);
            }
            plant.driver_mode = target;
            Ok(SwitchOutcome::Switched)
        })
    }

    fn current(&mut self) -> Option<DriverMode> {
        Some(with(&self.0, |plant| plant.driver_mode))
    }
}

struct FakeServiceManager(SharedPlant);

impl ServiceManager for FakeServiceManager {
    fn request_start(&mut self, _service: &str) -> io::Result<()> {
        with(&self.0, |plant| {
            plant.start_requests += 1;
            if plant.faults.daemon_never_runs {
                return;
            }
            plant.generation += 1;
            plant.daemon = if plant.faults.daemon_crashes {
                DaemonRunState::Stopped
            } else {
                DaemonRunState::Running
            };
        });
        Ok(())
    }

    fn request_stop(&mut self, _service: &str) -> io::Result<()> {
        with(&self.0, |plant| {
            plant.stop_requests += 1;
            plant.daemon = DaemonRunState::Stopped;
            plant.session_live = false;
        });
        Ok(())
    }

    fn status(&mut self, _service: &str) -> io::Result<ServiceStatus> {
        Ok(with(&self.0, |plant| ServiceStatus {
            state: plant.daemon,
            generation: (plant.generation > 0).then(|| plant.generation.to_string()),
        }))
    }
}

struct FakeInterface(SharedPlant);

impl InterfaceControl for FakeInterface {
    fn bring_up(&mut self, iface: &str) -> Result<(), InterfaceError> {
        with(&self.0, |plant| plant.interfaces_up.push(iface.to_owned()));
        Ok(())
    }
}

struct FakeSession {
    plant: SharedPlant,
    live: bool,
}

impl SessionControl for FakeSession {
    fn connect(
        &mut self,
        iface: &str,
        daemon: &mut dyn DaemonControl,
    ) -> Result<(), SessionError> {
        if !daemon.is_running() {
            return Err(SessionError::DaemonNotRunning);
        }
        self.close();
        with(&self.plant, |plant| {
            plant.connects += 1;
            if plant.faults.connect {
                return Err(SessionError::AttachFailed {
                    path: PathBuf::from(iface),
                    reason: "unexpected reply \"FAIL\"".to_owned(),
                });
            }
            plant.session_live = true;
            Ok(())
        })?;
        self.live = true;
        Ok(())
    }

    fn reload(&mut self) -> Result<(), SessionError> {
        if !self.live {
            return Err(SessionError::NoSession);
        }
        with(&self.plant, |plant| {
            if plant.faults.reload_crashes_daemon {
                plant.daemon = DaemonRunState::Stopped;
                plant.session_live = false;
                return Err(SessionError::NoSession);
            }
            if plant.faults.reload {
                return Err(SessionError::Rejected {
                    command: "RELOAD".to_owned(),
                    reply: "FAIL".to_owned(),
                });
            }
            plant.reloads += 1;
            Ok(())
        })
    }

    fn close(&mut self) {
        self.live = false;
        with(&self.plant, |plant| plant.session_live = false);
    }

    fn is_connected(&self) -> bool {
        self.live && with(&self.plant, |plant| plant.session_live)
    }
}

struct FakeWakeLock(SharedPlant);

impl WakeLock for FakeWakeLock {
    fn acquire(&self, name: &str) -> Result<(), WakeLockError> {
        with(&self.0, |plant| {
            if plant.faults.wake_lock {
                return Err(WakeLockError::Write {
                    name: name.to_owned(),
                    path: PathBuf::from("wake_lock"),
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                });
            }
            plant.wake_lock_held = true;
            Ok(())
        })
    }

    fn release(&self, _name: &str) -> Result<(), WakeLockError> {
        with(&self.0, |plant| plant.wake_lock_held = false);
        Ok(())
    }
}

/// A lifecycle wired to fakes over a shared [`Plant`], with the daemon
/// configuration kept in a temporary directory.
pub(crate) struct Rig {
    pub plant: SharedPlant,
    pub lifecycle: Arc<SoftapLifecycle>,
    pub config: Config,
    _dir: TempDir,
}

impl Rig {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create rig dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
        for sub in ["ctrl", "client"] {
            fs::create_dir(root.join(sub)).expect("create rig subdir");
        }
        let config = Config {
            hostapd_config_path: root.join("hostapd.conf"),
            hostapd_config_template: root.join("hostapd.conf.template"),
            ctrl_dir: root.join("ctrl"),
            client_dir: root.join("client"),
            ..Config::default()
        };
        fs::write(&config.hostapd_config_template, "interface=athap0\n").expect("seed template");

        let plant = SharedPlant::default();
        let cancel = Cancellation::new();
        let timings = Timings::immediate();
        let parts = Collaborators {
            driver: Box::new(DriverBinder::new(
                FakePower(Arc::clone(&plant)),
                Box::new(FakeSwitch(Arc::clone(&plant))),
                ConfigFileSpec::new(
                    config.hostapd_config_path.as_std_path(),
                    config.hostapd_config_template.as_std_path(),
                ),
            )),
            interface: Box::new(FakeInterface(Arc::clone(&plant))),
            daemon: Box::new(DaemonSupervisor::new(
                FakeServiceManager(Arc::clone(&plant)),
                &config,
                &timings,
                cancel,
            )),
            session: Box::new(FakeSession {
                plant: Arc::clone(&plant),
                live: false,
            }),
            config_sink: Box::new(HostapdConfigWriter::from_config(&config)),
            wake_lock: Arc::new(FakeWakeLock(Arc::clone(&plant))),
        };
        let lifecycle = Arc::new(SoftapLifecycle::with_config(parts, &config));
        Self {
            plant,
            lifecycle,
            config,
            _dir: dir,
        }
    }

    pub fn plant(&self) -> MutexGuard<'_, Plant> {
        self.plant.lock().expect("plant lock")
    }

    pub fn arm(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut self.plant().faults);
    }

    pub fn config_file(&self) -> Option<String> {
        fs::read_to_string(&self.config.hostapd_config_path).ok()
    }

    pub fn write_config_file(&self, contents: &str) {
        fs::write(&self.config.hostapd_config_path, contents).expect("write config file");
    }
}
