use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kernel::time::DailyReset;
use crate::planner::SafetyMargin;
use crate::services::Endpoints;

pub const CONFIG_ENV: &str = "RENDEZVOUS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "rendezvous.json";

/// Process settings. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Login server base URL.
    pub auth_url: String,
    /// Game data server base URL.
    pub data_url: String,
    /// Cache for downloaded bundles, decoded to JSON.
    pub bundle_dir: PathBuf,
    pub bundle_name: String,
    /// Account subscription and schedule file.
    pub store_path: PathBuf,
    pub poll_interval_secs: u64,
    pub sync_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Accounts allowed to log in at the same time.
    pub max_concurrent_logins: usize,
    /// Shortest delay between two cycles of one account.
    pub min_wake_delay_secs: u64,
    /// Claim resource while an event has not started yet.
    pub precollect: bool,
    pub safety_margin: SafetyMargin,
    pub daily_reset: DailyReset,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auth_url: "https://ntk-login-api.kokmm.net".to_string(),
            data_url: "https://ntk-zone-api.kokmm.net".to_string(),
            bundle_dir: PathBuf::from("bundles"),
            bundle_name: "SexualDatingSetting.zip".to_string(),
            store_path: PathBuf::from("accounts.json"),
            poll_interval_secs: 10,
            sync_interval_secs: 60,
            request_timeout_secs: 10,
            max_concurrent_logins: 4,
            min_wake_delay_secs: 30,
            precollect: true,
            safety_margin: SafetyMargin::default(),
            daily_reset: DailyReset::default(),
        }
    }
}

impl Settings {
    /// Reads a JSON settings file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings: Settings = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => return Err(e.into()),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// First CLI argument, then `RENDEZVOUS_CONFIG`, then `rendezvous.json`.
    pub fn resolve_path(arg: Option<String>) -> PathBuf {
        arg.or_else(|| std::env::var(CONFIG_ENV).ok())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("poll_interval_secs", self.poll_interval_secs),
            ("sync_interval_secs", self.sync_interval_secs),
            ("request_timeout_secs", self.request_timeout_secs),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, v)| *v == 0) {
            return Err(Error::Config(format!("{} must be positive", name)));
        }
        if self.max_concurrent_logins == 0 {
            return Err(Error::Config("max_concurrent_logins must be positive".into()));
        }
        if self.daily_reset.hour >= 24 {
            return Err(Error::Config(format!(
                "daily_reset.hour out of range: {}",
                self.daily_reset.hour
            )));
        }
        if self.auth_url.is_empty() || self.data_url.is_empty() {
            return Err(Error::Config("server urls must not be empty".into()));
        }
        Ok(())
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            auth_url: self.auth_url.trim_end_matches('/').to_string(),
            data_url: self.data_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
