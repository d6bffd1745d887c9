use std::fs;
use std::path::PathBuf;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::RunOptions;
use crate::error::DatastoreError;
use crate::tools::ToolPaths;

pub const CONFIG_FILE: &str = "ds-lint.json";
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub tools: ToolPaths,
    #[serde(default)]
    pub checks: ChecksSection,
    #[serde(default)]
    pub normalize: NormalizeSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ChecksSection {
    #[serde(default)]
    pub verify_checksums: Option<bool>,
    #[serde(default)]
    pub check_dois: Option<bool>,
    #[serde(default)]
    pub gff3_validator: Option<bool>,
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NormalizeSection {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub prefix_names: Option<bool>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub source: Option<PathBuf>,
    pub tools: ToolPaths,
    pub verify_checksums: bool,
    pub check_dois: bool,
    pub gff3_validator: bool,
    pub report_dir: PathBuf,
    pub normalize: bool,
    pub prefix_names: bool,
    pub output_dir: PathBuf,
}

impl ResolvedConfig {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            normalize: self.normalize,
            prefix_names: self.prefix_names,
            verify_checksums: self.verify_checksums,
            check_dois: self.check_dois,
            gff3_validator: self.gff3_validator,
            output_dir: self.output_dir.clone(),
            report_dir: self.report_dir.clone(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist; otherwise `./ds-lint.json`, then the user
    /// config directory, then built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, DatastoreError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };
        let Some(config_path) = config_path else {
            debug!("no config file found, using defaults");
            return Self::resolve_config(Config::default(), None);
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| DatastoreError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| DatastoreError::ConfigParse(err.to_string()))?;
        debug!(path = %config_path.display(), "loaded config");

        Self::resolve_config(config, Some(config_path))
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("ds-lint").join("config.json"))
            .filter(|path| path.exists())
    }

    pub fn resolve_config(
        config: Config,
        source: Option<PathBuf>,
    ) -> Result<ResolvedConfig, DatastoreError> {
        let schema_version = config.schema_version.unwrap_or(SCHEMA_VERSION);
        if schema_version != SCHEMA_VERSION {
            return Err(DatastoreError::InvalidConfig(format!(
                "unsupported schema_version {schema_version}, expected {SCHEMA_VERSION}"
            )));
        }

        Ok(ResolvedConfig {
            schema_version,
            source,
            tools: config.tools,
            verify_checksums: config.checks.verify_checksums.unwrap_or(true),
            check_dois: config.checks.check_dois.unwrap_or(false),
            gff3_validator: config.checks.gff3_validator.unwrap_or(true),
            report_dir: config
                .checks
                .report_dir
                .unwrap_or_else(default_report_dir),
            normalize: config.normalize.enabled.unwrap_or(false),
            prefix_names: config.normalize.prefix_names.unwrap_or(false),
            output_dir: config
                .normalize
                .output_dir
                .unwrap_or_else(default_output_dir),
        })
    }
}

pub fn default_output_dir() -> PathBuf {
    PathBuf::from("normalized")
}

pub fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_when_sections_are_absent() {
        let config: Config = serde_json::from_str("{}").unwrap();
        let resolved = ConfigLoader::resolve_config(config, None).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert!(resolved.verify_checksums);
        assert!(!resolved.check_dois);
        assert!(resolved.gff3_validator);
        assert!(!resolved.normalize);
        assert_eq!(resolved.output_dir, default_output_dir());
        assert_eq!(resolved.tools, ToolPaths::default());
    }

    #[test]
    fn unknown_schema_version() {
        let config: Config = serde_json::from_str(r#"{"schema_version": 2}"#).unwrap();
        assert_matches!(
            ConfigLoader::resolve_config(config, None),
            Err(DatastoreError::InvalidConfig(_))
        );
    }
}
