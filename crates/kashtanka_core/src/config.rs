//! Environment-style storage configuration.
//!
//! # Responsibility
//! - Read contact points, keyspace and engine passthrough options.
//! - Report the "no engine configured" state so callers fall back to the
//!   in-memory stand-in.
//!
//! # Invariants
//! - `Ok(None)` means the address list or keyspace is absent or blank.
//! - Malformed values are errors, never silently defaulted.

use crate::model::identifier::{Identifier, IdentifierError};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const ENV_STORAGE_ADDRS: &str = "STORAGE_ADDRS";
pub const ENV_KEYSPACE: &str = "KEYSPACE";
pub const ENV_BUSY_TIMEOUT_MS: &str = "STORAGE_BUSY_TIMEOUT_MS";
pub const ENV_CONNECT_ATTEMPTS: &str = "STORAGE_CONNECT_ATTEMPTS";
pub const ENV_RETRY_BACKOFF_MS: &str = "STORAGE_RETRY_BACKOFF_MS";
pub const ENV_PAGE_SIZE: &str = "STORAGE_PAGE_SIZE";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
const DEFAULT_PAGE_SIZE: u32 = 64;

/// Schema names the engine owns; a keyspace cannot be attached under them.
const RESERVED_KEYSPACES: &[&str] = &["main", "temp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidKeyspace(IdentifierError),
    ReservedKeyspace(String),
    InvalidNumber { key: &'static str, value: String },
    MustBePositive(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKeyspace(err) => write!(f, "invalid keyspace: {err}"),
            Self::ReservedKeyspace(name) => {
                write!(f, "keyspace `{name}` is reserved by the storage engine")
            }
            Self::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer, got `{value}`")
            }
            Self::MustBePositive(key) => write!(f, "{key} must be greater than zero"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidKeyspace(err) => Some(err),
            Self::ReservedKeyspace(_) | Self::InvalidNumber { .. } | Self::MustBePositive(_) => {
                None
            }
        }
    }
}

/// Settings for the SQLite-backed storage engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Data node locations, tried in order.
    pub contact_points: Vec<String>,
    pub keyspace: Identifier,
    /// Engine lock wait, passed straight to the session.
    pub busy_timeout: Duration,
    /// Connect rounds over all contact points before giving up.
    pub connect_attempts: u32,
    pub retry_backoff: Duration,
    /// Rows fetched per round-trip by streaming listings.
    pub page_size: u32,
}

impl StorageConfig {
    /// Config with default passthrough options.
    pub fn new(contact_points: Vec<String>, keyspace: Identifier) -> Self {
        Self {
            contact_points,
            keyspace,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    ///
    /// # Errors
    /// - Keyspace is not a valid identifier.
    /// - Keyspace names an engine-owned schema (`main`, `temp`).
    /// - A numeric option is malformed, or zero where zero is meaningless.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (Some(addrs), Some(keyspace)) = (lookup(ENV_STORAGE_ADDRS), lookup(ENV_KEYSPACE))
        else {
            warn!(
                "event=config_load module=config status=fallback reason=missing_env vars={ENV_STORAGE_ADDRS},{ENV_KEYSPACE} backend=memory"
            );
            return Ok(None);
        };

        let contact_points = split_contact_points(&addrs);
        if contact_points.is_empty() {
            warn!(
                "event=config_load module=config status=fallback reason=empty_addrs backend=memory"
            );
            return Ok(None);
        }

        let keyspace = Identifier::new(keyspace).map_err(ConfigError::InvalidKeyspace)?;
        if keyspace.as_str().is_empty() {
            warn!(
                "event=config_load module=config status=fallback reason=empty_keyspace backend=memory"
            );
            return Ok(None);
        }
        if RESERVED_KEYSPACES
            .iter()
            .any(|reserved| keyspace.as_str().eq_ignore_ascii_case(reserved))
        {
            return Err(ConfigError::ReservedKeyspace(keyspace.into()));
        }
        let mut config = Self::new(contact_points, keyspace);

        if let Some(ms) = read_number::<u64, _>(&lookup, ENV_BUSY_TIMEOUT_MS)? {
            config.busy_timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = read_number::<u32, _>(&lookup, ENV_CONNECT_ATTEMPTS)? {
            if attempts == 0 {
                return Err(ConfigError::MustBePositive(ENV_CONNECT_ATTEMPTS));
            }
            config.connect_attempts = attempts;
        }
        if let Some(ms) = read_number::<u64, _>(&lookup, ENV_RETRY_BACKOFF_MS)? {
            config.retry_backoff = Duration::from_millis(ms);
        }
        if let Some(page_size) = read_number::<u32, _>(&lookup, ENV_PAGE_SIZE)? {
            if page_size == 0 {
                return Err(ConfigError::MustBePositive(ENV_PAGE_SIZE));
            }
            config.page_size = page_size;
        }

        Ok(Some(config))
    }
}

fn split_contact_points(addrs: &str) -> Vec<String> {
    addrs
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_number<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StorageConfig, ENV_CONNECT_ATTEMPTS};
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_addrs_or_keyspace_selects_memory() {
        assert_eq!(StorageConfig::from_lookup(lookup(&[])).unwrap(), None);
        assert_eq!(
            StorageConfig::from_lookup(lookup(&[("KEYSPACE", "kashtanka")])).unwrap(),
            None
        );
        assert_eq!(
            StorageConfig::from_lookup(lookup(&[("STORAGE_ADDRS", "/data")])).unwrap(),
            None
        );
        assert_eq!(
            StorageConfig::from_lookup(lookup(&[("STORAGE_ADDRS", " , "), ("KEYSPACE", "k")]))
                .unwrap(),
            None
        );
    }

    #[test]
    fn blank_keyspace_selects_memory() {
        for keyspace in ["", "   ", "\t"] {
            assert_eq!(
                StorageConfig::from_lookup(lookup(&[
                    ("STORAGE_ADDRS", "/data"),
                    ("KEYSPACE", keyspace),
                ]))
                .unwrap(),
                None
            );
        }
    }

    #[test]
    fn engine_schema_names_are_rejected_as_keyspaces() {
        for keyspace in ["main", "temp", "MAIN", " Temp "] {
            let err = StorageConfig::from_lookup(lookup(&[
                ("STORAGE_ADDRS", "/data"),
                ("KEYSPACE", keyspace),
            ]))
            .unwrap_err();
            assert_eq!(err, ConfigError::ReservedKeyspace(keyspace.trim().to_string()));
        }

        let config = StorageConfig::from_lookup(lookup(&[
            ("STORAGE_ADDRS", "/data"),
            ("KEYSPACE", "maintenance"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(config.keyspace.as_str(), "maintenance");
    }

    #[test]
    fn parses_addresses_and_passthrough_options() {
        let config = StorageConfig::from_lookup(lookup(&[
            ("STORAGE_ADDRS", " /data/a , ,/data/b"),
            ("KEYSPACE", " kashtanka "),
            ("STORAGE_BUSY_TIMEOUT_MS", "250"),
            ("STORAGE_CONNECT_ATTEMPTS", "7"),
            ("STORAGE_PAGE_SIZE", "2"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(config.contact_points, vec!["/data/a", "/data/b"]);
        assert_eq!(config.keyspace.as_str(), "kashtanka");
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert_eq!(config.connect_attempts, 7);
        assert_eq!(config.retry_backoff, Duration::from_millis(500));
        assert_eq!(config.page_size, 2);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = StorageConfig::from_lookup(lookup(&[
            ("STORAGE_ADDRS", "/data"),
            ("KEYSPACE", "bad keyspace"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKeyspace(_)));

        let err = StorageConfig::from_lookup(lookup(&[
            ("STORAGE_ADDRS", "/data"),
            ("KEYSPACE", "k"),
            ("STORAGE_BUSY_TIMEOUT_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { value, .. } if value == "soon"));

        let err = StorageConfig::from_lookup(lookup(&[
            ("STORAGE_ADDRS", "/data"),
            ("KEYSPACE", "k"),
            ("STORAGE_CONNECT_ATTEMPTS", "0"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MustBePositive(ENV_CONNECT_ATTEMPTS));
    }
}
