//! Server configuration
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML file,
//! `PROPVAL_*` environment variables, then command-line overrides.

use anyhow::{Context, Result};
use config::{Config, Environment, File as ConfigFile, FileFormat};
use propval_core::ArtifactPaths;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `PROPVAL_PORT`
pub const ENV_PREFIX: &str = "PROPVAL";

/// Environment variable naming a config file when `--config` is absent
pub const CONFIG_PATH_ENV: &str = "PROPVAL_CONFIG";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Pipeline artifact written by the trainer
    pub model_path: PathBuf,
    /// Feature metadata written by the trainer
    pub meta_path: PathBuf,
    /// CSV backing the dropdown and analytics endpoints
    pub data_path: PathBuf,
    pub log_level: String,
    pub cors_permissive: bool,
    pub verify_model_hash: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_path: PathBuf::from("models/best_model.json"),
            meta_path: PathBuf::from("models/model_meta.json"),
            data_path: PathBuf::from("data/delhi_housing_synthetic.csv"),
            log_level: "info".to_string(),
            cors_permissive: true,
            verify_model_hash: true,
        }
    }
}

/// Values given on the command line; `None` leaves the lower layers alone
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ApiConfig {
    /// Resolve the full configuration stack
    pub fn load(file: Option<&Path>, overrides: &CliOverrides) -> Result<Self> {
        Self::load_with_env(file, Environment::with_prefix(ENV_PREFIX), overrides)
    }

    /// Same as [`ApiConfig::load`] with a caller-supplied environment source
    pub fn load_with_env(
        file: Option<&Path>,
        env: Environment,
        overrides: &CliOverrides,
    ) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("host", defaults.host.as_str())?
            .set_default("port", i64::from(defaults.port))?
            .set_default("model_path", path_str(&defaults.model_path))?
            .set_default("meta_path", path_str(&defaults.meta_path))?
            .set_default("data_path", path_str(&defaults.data_path))?
            .set_default("log_level", defaults.log_level.as_str())?
            .set_default("cors_permissive", defaults.cors_permissive)?
            .set_default("verify_model_hash", defaults.verify_model_hash)?;

        if let Some(path) = file {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            builder = builder.add_source(ConfigFile::from(path).format(FileFormat::Toml));
        }

        builder = builder
            .add_source(env.try_parsing(true))
            .set_override_option("host", overrides.host.clone())?
            .set_override_option("port", overrides.port.map(i64::from))?;

        builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Listen address as `host:port`
    pub fn bind_addr(&self) -> String {
        match self.host.parse::<std::net::IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, self.port).to_string(),
            Err(_) => format!("{}:{}", self.host, self.port),
        }
    }

    /// Storage locations handed to the serving context
    pub fn artifact_paths(&self) -> ArtifactPaths {
        let mut paths = ArtifactPaths::new(&self.model_path, &self.meta_path)
            .with_dataset(&self.data_path);
        paths.verify_hash = self.verify_model_hash;
        paths
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::load_with_env(None, env(&[]), &CliOverrides::default()).unwrap();
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_file_then_env_then_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("propval.toml");
        std::fs::write(
            &path,
            "host = \"127.0.0.1\"\nport = 9000\nlog_level = \"debug\"\nverify_model_hash = false\n",
        )
        .unwrap();

        let config =
            ApiConfig::load_with_env(Some(&path), env(&[]), &CliOverrides::default()).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_level, "debug");
        assert!(!config.verify_model_hash);
        assert_eq!(config.model_path, PathBuf::from("models/best_model.json"));

        let config = ApiConfig::load_with_env(
            Some(&path),
            env(&[("PROPVAL_PORT", "9100"), ("PROPVAL_MODEL_PATH", "/srv/model.json")]),
            &CliOverrides::default(),
        )
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.model_path, PathBuf::from("/srv/model.json"));

        let config = ApiConfig::load_with_env(
            Some(&path),
            env(&[("PROPVAL_PORT", "9100")]),
            &CliOverrides {
                host: Some("localhost".to_string()),
                port: Some(9200),
            },
        )
        .unwrap();
        assert_eq!(config.port, 9200);
        assert_eq!(config.bind_addr(), "localhost:9200");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(ApiConfig::load_with_env(Some(&path), env(&[]), &CliOverrides::default()).is_err());
    }

    #[test]
    fn test_artifact_paths() {
        let config = ApiConfig {
            verify_model_hash: false,
            ..ApiConfig::default()
        };
        let paths = config.artifact_paths();
        assert_eq!(paths.model, PathBuf::from("models/best_model.json"));
        assert_eq!(
            paths.dataset,
            Some(PathBuf::from("data/delhi_housing_synthetic.csv"))
        );
        assert!(!paths.verify_hash);
    }
}
