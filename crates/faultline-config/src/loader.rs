//! Layered configuration loading.

use crate::{ConfigError, FaultlineConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Builder that merges defaults, the project `faultline.toml`, and `FLT_*`
/// environment variables, in increasing precedence.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Loader rooted at the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "FLT".to_string(),
        }
    }

    /// Sets the project directory to look for `faultline.toml` in.
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Sets the environment variable prefix (default: `FLT`).
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Loads and validates the merged configuration.
    pub fn load(self) -> Result<FaultlineConfig, ConfigError> {
        let mut builder = config::Config::builder();

        // 1. Built-in defaults
        let defaults = FaultlineConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. Project config (faultline.toml)
        let project_file = self.project_dir.join("faultline.toml");
        if project_file.exists() {
            builder = builder.add_source(
                config::File::from(project_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 3. Environment variables (FLT_*)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("_")
                .try_parsing(true),
        );

        let config: FaultlineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults_from_empty_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = ConfigLoader::new()
            .with_project_dir(temp.path())
            .with_env_prefix("FLT_TEST_NONE")
            .load()
            .unwrap();
        assert_eq!(config.cluster.nodes.len(), 3);
        assert_eq!(config.workload.tables, 5);
    }

    #[test]
    fn test_project_file_overrides_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("faultline.toml"),
            "[workload]\ntables = 11\nread_ratio = 0.8\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_project_dir(temp.path())
            .with_env_prefix("FLT_TEST_NONE")
            .load()
            .unwrap();
        assert_eq!(config.workload.tables, 11);
        assert!((config.workload.read_ratio - 0.8).abs() < f64::EPSILON);
        // Untouched sections keep their defaults.
        assert_eq!(config.cluster.port, 3306);
    }

    #[test]
    fn test_invalid_file_value_is_rejected() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("faultline.toml"), "[workload]\ntables = 0\n").unwrap();

        let result = ConfigLoader::new()
            .with_project_dir(temp.path())
            .with_env_prefix("FLT_TEST_NONE")
            .load();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
