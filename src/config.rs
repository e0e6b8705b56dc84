use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for the region mover
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MoverConfig {
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Procedure store settings
    pub store: StoreConfig,
    /// Executor settings
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Default log filter, overridden by RUST_LOG
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Directory holding one record per unfinished procedure
    pub directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExecutorConfig {
    /// Consecutive steps a procedure may take without suspending before the
    /// executor yields it
    pub max_steps_per_run: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_steps_per_run: 16,
        }
    }
}

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: true,
            },
            store: StoreConfig {
                directory: PathBuf::from(".region-mover/procedures"),
            },
            executor: ExecutorConfig::default(),
        }
    }
}

impl MoverConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (region-mover.toml)
    /// 3. Environment variables (prefixed with REGION_MOVER__)
    pub fn load() -> Result<Self> {
        let file = Path::new("region-mover.toml");
        Self::load_with_file(file.exists().then_some(file))
    }

    /// Same as [`MoverConfig::load`] with an explicit configuration file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_file(Some(path.as_ref()))
    }

    fn load_with_file(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&MoverConfig::default())?);

        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("REGION_MOVER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("region-mover.toml");
        std::fs::write(
            &path,
            "[store]\ndirectory = \"/var/lib/region-mover\"\n\n[executor]\nmax_steps_per_run = 4\n",
        )
        .unwrap();

        let config = MoverConfig::load_from(&path).unwrap();
        assert_eq!(config.store.directory, PathBuf::from("/var/lib/region-mover"));
        assert_eq!(config.executor.max_steps_per_run, 4);
        assert_eq!(config.observability, MoverConfig::default().observability);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("saved.toml");

        let mut config = MoverConfig::default();
        config.observability.json_logs = false;
        config.observability.log_level = "debug".to_string();
        config.save_to_file(&path).unwrap();

        assert_eq!(MoverConfig::load_from(&path).unwrap(), config);
    }
}
