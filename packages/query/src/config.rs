//! Client configuration.
//!
//! Configuration is read once at the composition root: start from
//! [`PairsConfig::default`] or a TOML file, then apply environment
//! overrides with [`PairsConfig::with_env`].
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |---|---|
//! | `PAIRS_SERVER` | Base URL of the PAIRS API |
//! | `PAIRS_USER` | Account name for basic auth |
//! | `PAIRS_API_KEY` | Password or API key for basic auth |
//! | `PAIRS_DEFAULT_WORKERS` | Default batch concurrency |
//! | `PAIRS_MAX_WORKERS` | Upper bound on batch concurrency |
//! | `PAIRS_STATUS_INTERVAL_SECS` | Default delay between status polls |
//! | `PAIRS_MIN_STATUS_INTERVAL_SECS` | Smallest delay a batch may request |
//! | `PAIRS_DOWNLOAD_DIR` | Folder result archives are written to |

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::QueryError;

/// Default API base URL.
pub const DEFAULT_SERVER: &str = "https://pairs.res.ibm.com";

/// Default folder for downloaded archives, relative to the working
/// directory.
pub const DEFAULT_DOWNLOAD_DIR: &str = "download";

/// Settings shared by every query lifecycle in the process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PairsConfig {
    /// Base URL of the API.
    pub server: String,
    /// Account name for basic auth.
    pub user: Option<String>,
    /// Password or API key for basic auth.
    pub api_key: Option<String>,
    /// Batch concurrency used when the caller does not choose one.
    pub default_workers: usize,
    /// Upper bound on batch concurrency.
    pub max_workers: usize,
    /// Delay between status polls, in seconds.
    pub status_interval_secs: u64,
    /// Smallest poll delay a batch may request, in seconds.
    pub min_status_interval_secs: u64,
    /// Folder result archives are written to.
    pub download_dir: PathBuf,
}

impl Default for PairsConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            user: None,
            api_key: None,
            default_workers: 2,
            max_workers: 8,
            status_interval_secs: 15,
            min_status_interval_secs: 1,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
        }
    }
}

impl PairsConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Config`] if the document is malformed or
    /// contains unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, QueryError> {
        toml::from_str(text).map_err(|e| QueryError::Config {
            message: format!("invalid config: {e}"),
        })
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Io`] if the file cannot be read, or
    /// [`QueryError::Config`] if it cannot be parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self, QueryError> {
        let text = std::fs::read_to_string(path).map_err(|e| QueryError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&text)
    }

    /// Builds the default configuration with environment overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Config`] if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self, QueryError> {
        Self::default().with_env(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up by variable name.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Config`] if a numeric variable cannot be parsed
    /// or the result fails [`Self::validate`].
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, QueryError> {
        if let Some(server) = lookup("PAIRS_SERVER") {
            self.server = server;
        }
        if let Some(user) = lookup("PAIRS_USER") {
            self.user = Some(user);
        }
        if let Some(key) = lookup("PAIRS_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(dir) = lookup("PAIRS_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(dir);
        }
        parse_var(&lookup, "PAIRS_DEFAULT_WORKERS", &mut self.default_workers)?;
        parse_var(&lookup, "PAIRS_MAX_WORKERS", &mut self.max_workers)?;
        parse_var(
            &lookup,
            "PAIRS_STATUS_INTERVAL_SECS",
            &mut self.status_interval_secs,
        )?;
        parse_var(
            &lookup,
            "PAIRS_MIN_STATUS_INTERVAL_SECS",
            &mut self.min_status_interval_secs,
        )?;
        self.validate()?;
        Ok(self)
    }

    /// Checks that the worker and interval bounds are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Config`] describing the first inconsistency.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.max_workers == 0 {
            return Err(QueryError::Config {
                message: "max_workers must be at least 1".to_string(),
            });
        }
        if self.default_workers == 0 || self.default_workers > self.max_workers {
            return Err(QueryError::Config {
                message: format!(
                    "default_workers ({}) must be between 1 and max_workers ({})",
                    self.default_workers, self.max_workers
                ),
            });
        }
        if self.status_interval_secs < self.min_status_interval_secs {
            return Err(QueryError::Config {
                message: format!(
                    "status_interval_secs ({}) is below min_status_interval_secs ({})",
                    self.status_interval_secs, self.min_status_interval_secs
                ),
            });
        }
        Ok(())
    }

    /// Default delay between status polls.
    #[must_use]
    pub const fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    /// Smallest poll delay a batch may request.
    #[must_use]
    pub const fn min_status_interval(&self) -> Duration {
        Duration::from_secs(self.min_status_interval_secs)
    }

    /// Returns `interval` if it is not below [`Self::min_status_interval`].
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Config`] if `interval` is too short.
    pub fn check_interval(&self, interval: Duration) -> Result<Duration, QueryError> {
        let min = self.min_status_interval();
        if interval < min {
            return Err(QueryError::Config {
                message: format!("status interval must be at least {min:?}, got {interval:?}"),
            });
        }
        Ok(interval)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) -> Result<(), QueryError>
where
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(name) {
        *target = raw.trim().parse().map_err(|e| QueryError::Config {
            message: format!("{name}={raw:?}: {e}"),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_consistent() {
        PairsConfig::default().validate().unwrap();
    }

    #[test]
    fn env_overrides_defaults() {
        let config = PairsConfig::default()
            .with_env(env(&[
                ("PAIRS_SERVER", "http://localhost:8080"),
                ("PAIRS_USER", "me@example.com"),
                ("PAIRS_MAX_WORKERS", "4"),
                ("PAIRS_STATUS_INTERVAL_SECS", " 5 "),
            ]))
            .unwrap();
        assert_eq!(config.server, "http://localhost:8080");
        assert_eq!(config.user.as_deref(), Some("me@example.com"));
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.status_interval(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_unparsable_number() {
        let err = PairsConfig::default()
            .with_env(env(&[("PAIRS_MAX_WORKERS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("PAIRS_MAX_WORKERS"), "{err}");
    }

    #[test]
    fn rejects_default_workers_above_max() {
        let err = PairsConfig::default()
            .with_env(env(&[("PAIRS_DEFAULT_WORKERS", "9")]))
            .unwrap_err();
        assert!(matches!(err, QueryError::Config { .. }));
    }

    #[test]
    fn parses_partial_toml() {
        let config = PairsConfig::from_toml_str(
            r#"
            server = "https://pairs.example.com"
            download_dir = "/tmp/pairs"
            min_status_interval_secs = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.server, "https://pairs.example.com");
        assert_eq!(config.download_dir, PathBuf::from("/tmp/pairs"));
        assert_eq!(config.min_status_interval(), Duration::from_secs(2));
        assert_eq!(config.default_workers, 2);
    }

    #[test]
    fn rejects_unknown_toml_keys() {
        assert!(PairsConfig::from_toml_str("colour = \"blue\"").is_err());
    }

    #[test]
    fn checks_interval_against_minimum() {
        let config = PairsConfig::default();
        assert!(matches!(
            config.check_interval(Duration::ZERO),
            Err(QueryError::Config { .. })
        ));
        assert_eq!(
            config.check_interval(config.min_status_interval()).unwrap(),
            config.min_status_interval()
        );
    }
}
