//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "FROLF_ROUNDS_CONFIG_PATH";

/// Default wait for a correlated cross-module response.
const DEFAULT_RPC_TIMEOUT_MS: u64 = 5_000;
/// Reminder jobs fire this long before the round start.
const DEFAULT_REMINDER_LEAD_MINUTES: u64 = 60;
/// Upper bound on a downloaded scorecard export.
const DEFAULT_SCORECARD_MAX_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// How long tag/role lookups wait for a correlated response.
    pub rpc_timeout: Duration,
    /// Lead time between the reminder job and the round start.
    pub reminder_lead: Duration,
    /// Maximum accepted size of a scorecard export download.
    pub scorecard_max_bytes: usize,
    /// Hosts a scorecard export URL may point at. Anything else is
    /// rejected before any network I/O happens.
    pub allowed_import_hosts: Vec<String>,
    /// Roles allowed to delete rounds they did not create.
    pub delete_roles: Vec<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// built-in defaults when the file is absent or malformed.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration from file");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS),
            reminder_lead: Duration::from_secs(DEFAULT_REMINDER_LEAD_MINUTES * 60),
            scorecard_max_bytes: DEFAULT_SCORECARD_MAX_BYTES,
            allowed_import_hosts: default_import_hosts(),
            delete_roles: default_delete_roles(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    rpc_timeout_ms: Option<u64>,
    reminder_lead_minutes: Option<u64>,
    scorecard_max_bytes: Option<usize>,
    allowed_import_hosts: Option<Vec<String>>,
    delete_roles: Option<Vec<String>>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            rpc_timeout: value
                .rpc_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.rpc_timeout),
            reminder_lead: value
                .reminder_lead_minutes
                .map(|minutes| Duration::from_secs(minutes * 60))
                .unwrap_or(defaults.reminder_lead),
            scorecard_max_bytes: value
                .scorecard_max_bytes
                .unwrap_or(defaults.scorecard_max_bytes),
            allowed_import_hosts: value
                .allowed_import_hosts
                .filter(|hosts| !hosts.is_empty())
                .unwrap_or(defaults.allowed_import_hosts),
            delete_roles: value
                .delete_roles
                .filter(|roles| !roles.is_empty())
                .unwrap_or(defaults.delete_roles),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in export host allowlist.
fn default_import_hosts() -> Vec<String> {
    vec!["udisc.com".into(), "www.udisc.com".into()]
}

/// Built-in privileged roles for round deletion.
fn default_delete_roles() -> Vec<String> {
    vec!["admin".into(), "editor".into()]
}
