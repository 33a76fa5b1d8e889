//! Settings file and environment handling

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use netprov_session::SessionOptions;

/// Prefix of the environment variables overriding file settings
pub const ENV_PREFIX: &str = "NETPROV";

/// Searched in order when no `--config` is given; later files win
pub const SEARCH_PATHS: [&str; 2] = ["/etc/netprov/netprov.toml", "./netprov.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Runtime settings of the `netprov` binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory with template overrides; built-ins are used when unset
    pub templates_dir: Option<PathBuf>,
    pub ledger_path: PathBuf,
    pub output_path: PathBuf,
    /// Structured creation input read by `create --from-file`
    pub input_path: PathBuf,
    pub command_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub username: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            templates_dir: None,
            ledger_path: PathBuf::from("./netprov-ledger.json"),
            output_path: PathBuf::from("./netprov-output.txt"),
            input_path: PathBuf::from("./input.yaml"),
            command_timeout_secs: 100,
            connect_timeout_secs: 20,
            probe_timeout_secs: 2,
            username: None,
        }
    }
}

impl AppConfig {
    /// Load settings from `explicit` (which must exist) or from the search
    /// paths, then apply `NETPROV_*` environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let search: Vec<PathBuf> = SEARCH_PATHS.iter().map(PathBuf::from).collect();
        Self::load_from(explicit, &search, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from(
        explicit: Option<&Path>,
        search: &[PathBuf],
        environment: config::Environment,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::MissingFile(path.to_path_buf()));
                }
                log::debug!("Loading configuration from {}", path.display());
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                for path in search.iter().filter(|path| path.exists()) {
                    log::debug!("Loading configuration from {}", path.display());
                    builder = builder.add_source(config::File::from(path.as_path()).required(false));
                }
            }
        }

        let settings = builder
            .add_source(environment.try_parsing(true))
            .build()?;
        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let bounds = [
            ("command_timeout_secs", self.command_timeout_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("probe_timeout_secs", self.probe_timeout_secs),
        ];
        for (field, value) in bounds {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be at least one second".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_environment() -> config::Environment {
        config::Environment::with_prefix("NETPROV_TEST_UNSET")
    }

    #[test]
    fn test_defaults_without_files() {
        let config = AppConfig::load_from(None, &[], quiet_environment()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.session_options(), SessionOptions::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("netprov.toml");
        std::fs::write(
            &path,
            "ledger_path = \"/var/lib/netprov/ledger.json\"\ncommand_timeout_secs = 30\nusername = \"admin\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(&path), &[], quiet_environment()).unwrap();
        assert_eq!(config.ledger_path, PathBuf::from("/var/lib/netprov/ledger.json"));
        assert_eq!(config.command_timeout_secs, 30);
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert_eq!(config.connect_timeout_secs, 20);
    }

    #[test]
    fn test_later_search_path_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let system = temp_dir.path().join("system.toml");
        let local = temp_dir.path().join("local.toml");
        std::fs::write(&system, "probe_timeout_secs = 5\nusername = \"ops\"\n").unwrap();
        std::fs::write(&local, "probe_timeout_secs = 7\n").unwrap();

        let search = vec![system, temp_dir.path().join("absent.toml"), local];
        let config = AppConfig::load_from(None, &search, quiet_environment()).unwrap();
        assert_eq!(config.probe_timeout_secs, 7);
        assert_eq!(config.username.as_deref(), Some("ops"));
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let err = AppConfig::load_from(Some(Path::new("/nonexistent/netprov.toml")), &[], quiet_environment())
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("netprov.toml");
        std::fs::write(&path, "connect_timeout_secs = 0\n").unwrap();

        let err = AppConfig::load_from(Some(&path), &[], quiet_environment()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "connect_timeout_secs", .. }));
    }
}
