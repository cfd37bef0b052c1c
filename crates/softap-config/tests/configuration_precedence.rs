//! Precedence between defaults, configuration files, environment variables
//! and command-line flags.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use softap_config::{
    Config, DEFAULT_HOSTAPD_SERVICE, DriverStrategy, SocketFallback, default_log_filter,
    default_log_format,
};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

struct EnvOverride {
    key: &'static str,
    previous: Option<OsString>,
    guard: Option<MutexGuard<'static, ()>>,
}

impl EnvOverride {
    fn set_var(key: &'static str, value: &OsStr) -> Self {
        let guard = env_lock();
        let previous = std::env::var_os(key);
        // Environment mutation is unsafe under edition 2024; `Drop` restores
        // the previous value so other tests inherit a clean environment.
        unsafe { std::env::set_var(key, value) };
        Self {
            key,
            previous,
            guard: Some(guard),
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
        drop(self.guard.take());
    }
}

#[fixture]
fn config_dir() -> TempDir {
    TempDir::new().expect("create temp dir")
}

fn write_config(dir: &TempDir, contents: &str) -> OsString {
    let path = dir.path().join("softap.toml");
    fs::write(&path, contents).expect("write configuration");
    path.into_os_string()
}

fn load(args: &[OsString]) -> Config {
    let mut full = vec![OsString::from("softapd")];
    full.extend_from_slice(args);
    Config::load_from_iter(full).expect("configuration should load")
}

#[test]
fn defaults_apply_without_sources() {
    let _guard = env_lock();
    let config = load(&[]);
    assert_eq!(config.log_filter(), default_log_filter());
    assert_eq!(config.log_format(), default_log_format());
    assert_eq!(config.hostapd_service, DEFAULT_HOSTAPD_SERVICE);
    assert_eq!(config.driver_strategy, DriverStrategy::Rename);
    assert_eq!(config.socket_fallback, SocketFallback::BareName);
}

#[rstest]
fn file_overrides_defaults(config_dir: TempDir) {
    let _guard = env_lock();
    let path = write_config(
        &config_dir,
        "driver_strategy = \"module\"\nsocket_fallback = \"none\"\nhostapd_service = \"ap-daemon\"\n",
    );
    let config = load(&[OsString::from("--config-path"), path]);
    assert_eq!(config.driver_strategy, DriverStrategy::Module);
    assert_eq!(config.socket_fallback, SocketFallback::None);
    assert_eq!(config.hostapd_service, "ap-daemon");
}

#[rstest]
fn environment_overrides_file(config_dir: TempDir) {
    let path = write_config(&config_dir, "hostapd_service = \"from-file\"\n");
    let _env = EnvOverride::set_var("SOFTAP_HOSTAPD_SERVICE", OsStr::new("from-env"));
    let config = load(&[OsString::from("--config-path"), path]);
    assert_eq!(config.hostapd_service, "from-env");
}

#[test]
fn cli_overrides_environment() {
    let _env = EnvOverride::set_var("SOFTAP_LOG_FILTER", OsStr::new("warn"));
    let config = load(&[OsString::from("--log-filter"), OsString::from("debug")]);
    assert_eq!(config.log_filter(), "debug");
}
