//! Command-line configuration

use refarq_core::{Error, Result};
use refarq_query::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Result output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text grid
    #[default]
    Text,
    /// SPARQL 1.1 query results JSON
    Json,
}

/// CLI configuration, optionally loaded from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,

    /// Output format
    pub format: OutputFormat,

    /// Engine settings
    pub engine: EngineConfig,

    /// Service endpoints answered from local N-Quads files
    pub services: BTreeMap<String, PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: OutputFormat::Text,
            engine: EngineConfig::default(),
            services: BTreeMap::new(),
        }
    }
}

impl CliConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file; missing fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Builder: set log level
    pub fn log_level(mut self, level: &str) -> Self {
        self.log_level = level.to_string();
        self
    }

    /// Builder: set output format
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Builder: set engine settings
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Builder: serve `endpoint` from the N-Quads file at `path`
    pub fn service<P: Into<PathBuf>>(mut self, endpoint: &str, path: P) -> Self {
        self.services.insert(endpoint.to_string(), path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.format, OutputFormat::Text);
        assert!(config.engine.allow_service);
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = CliConfig::new()
            .log_level("debug")
            .format(OutputFormat::Json)
            .engine(EngineConfig::new().max_depth(64))
            .service("http://ex/sparql", "remote.nq");

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.engine.max_depth, 64);
        assert_eq!(
            config.services.get("http://ex/sparql"),
            Some(&PathBuf::from("remote.nq"))
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"format": "json", "engine": {{"allow_service": false}}}}"#
        )
        .unwrap();

        let config = CliConfig::from_file(file.path()).unwrap();
        assert_eq!(config.format, OutputFormat::Json);
        assert!(!config.engine.allow_service);
        assert_eq!(config.engine.max_depth, refarq_query::DEFAULT_MAX_DEPTH);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = CliConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
