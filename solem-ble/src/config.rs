//! `config.json` in SOLEM_HOME: default device and session tuning

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use solem_ble_controller::{AddressType, DrainPolicy, RetryPolicy, SessionConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Public,
    Random,
}

impl From<AddressKind> for AddressType {
    fn from(kind: AddressKind) -> Self {
        match kind {
            AddressKind::Public => AddressType::Public,
            AddressKind::Random => AddressType::Random,
        }
    }
}

/// Values read from the config file. Anything missing falls back to the
/// session defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Controller address, e.g. "C8:B9:61:0A:47:FD"
    pub device: Option<String>,
    pub address_type: Option<AddressKind>,
    pub retries: Option<u32>,
    pub backoff_secs: Option<u64>,
    pub scan_secs: Option<u64>,
    /// Ceiling on each BLE connect, read or write
    pub io_timeout_secs: Option<u64>,
    pub drain_polls: Option<u32>,
    pub drain_timeout_ms: Option<u64>,
}

/// SOLEM_HOME, or ~/.solem
pub fn solem_home() -> Option<PathBuf> {
    std::env::var("SOLEM_HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(|| dirs::home_dir().map(|home| home.join(".solem")))
}

/// Load `path`, or `config.json` in SOLEM_HOME. A missing default file is
/// not an error; an explicitly named one is.
pub fn load(path: Option<&Path>) -> Result<FileConfig, Box<dyn std::error::Error>> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match solem_home().map(|home| home.join("config.json")) {
            Some(path) if path.exists() => path,
            _ => return Ok(FileConfig::default()),
        },
    };

    let data = std::fs::read_to_string(&path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let config = parse(&data).map_err(|e| format!("failed to parse {}: {e}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

pub fn parse(data: &str) -> serde_json::Result<FileConfig> {
    serde_json::from_str(data)
}

/// Command-line values that override the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub address_type: Option<AddressKind>,
    pub retries: Option<u32>,
    pub backoff_secs: Option<u64>,
}

impl FileConfig {
    pub fn session_config(&self, overrides: &Overrides) -> SessionConfig {
        let retry_default = RetryPolicy::default();
        let drain_default = DrainPolicy::default();

        SessionConfig {
            address_type: overrides
                .address_type
                .or(self.address_type)
                .map(AddressType::from)
                .unwrap_or_default(),
            retry: RetryPolicy::new(
                overrides.retries.or(self.retries).unwrap_or(retry_default.attempts),
                overrides
                    .backoff_secs
                    .or(self.backoff_secs)
                    .map(Duration::from_secs)
                    .unwrap_or(retry_default.backoff),
            ),
            drain: DrainPolicy {
                polls: self.drain_polls.unwrap_or(drain_default.polls),
                timeout: self
                    .drain_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(drain_default.timeout),
            },
        }
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        self.scan_secs.map(Duration::from_secs)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_session_defaults() {
        let config = parse("{}").unwrap();
        assert_eq!(config, FileConfig::default());
        assert_eq!(config.session_config(&Overrides::default()), SessionConfig::default());
    }

    #[test]
    fn file_values_are_applied() {
        let config = parse(
            r#"{
                "device": "C8:B9:61:0A:47:FD",
                "address_type": "public",
                "retries": 4,
                "backoff_secs": 1,
                "drain_polls": 5,
                "drain_timeout_ms": 300
            }"#,
        )
        .unwrap();
        assert_eq!(config.device.as_deref(), Some("C8:B9:61:0A:47:FD"));

        let session = config.session_config(&Overrides::default());
        assert_eq!(session.address_type, AddressType::Public);
        assert_eq!(session.retry, RetryPolicy::new(4, Duration::from_secs(1)));
        assert_eq!(session.drain.polls, 5);
        assert_eq!(session.drain.timeout, Duration::from_millis(300));
    }

    #[test]
    fn command_line_overrides_file() {
        let config = parse(r#"{"retries": 4, "backoff_secs": 1}"#).unwrap();
        let overrides = Overrides {
            address_type: Some(AddressKind::Public),
            retries: Some(2),
            backoff_secs: None,
        };
        let session = config.session_config(&overrides);
        assert_eq!(session.retry, RetryPolicy::new(2, Duration::from_secs(1)));
        assert_eq!(session.address_type, AddressType::Public);
    }

    #[test]
    fn transport_timeouts_are_optional() {
        let config = parse(r#"{"scan_secs": 8, "io_timeout_secs": 20}"#).unwrap();
        assert_eq!(config.scan_timeout(), Some(Duration::from_secs(8)));
        assert_eq!(config.io_timeout(), Some(Duration::from_secs(20)));
        assert_eq!(FileConfig::default().io_timeout(), None);
    }

    #[test]
    fn unknown_address_type_is_rejected() {
        assert!(parse(r#"{"address_type": "static"}"#).is_err());
    }
}
