//! Configuration management for the SDE editor
//!
//! Handles loading and validation of the YAML configuration file. Every
//! section is optional; a missing file yields the SDE-3000 defaults.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use crate::params::{ParameterDefinition, ParameterTable};
use crate::session::{DeviceMatcher, DEFAULT_DEVICE_PATTERN};
use crate::sysex::{SysExCodec, SysExHeader};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub sysex: SysExHeader,
    /// Replaces the built-in parameter catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ParameterDefinition>>,
}

/// Device discovery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(default = "default_name_pattern")]
    pub name_pattern: String,
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name_pattern: default_name_pattern(),
            ignore_case: false,
            client_name: default_client_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&contents).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Load configuration, falling back to defaults when the file does not exist
    pub async fn load_or_default(path: &str) -> Result<Self> {
        let exists = fs::try_exists(path)
            .await
            .with_context(|| format!("Failed to check config file: {}", path))?;
        if !exists {
            info!("Config file {} not found, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    /// Parse and validate YAML contents
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let header = &self.sysex;
        for (name, byte) in [
            ("manufacturer_id", header.manufacturer_id),
            ("family_id", header.family_id),
            ("unit_id", header.unit_id),
        ] {
            if byte > 0x7F {
                bail!("sysex.{} must be a 7-bit value, got 0x{:02X}", name, byte);
            }
        }
        if self.device.name_pattern.is_empty() {
            bail!("device.name_pattern must not be empty");
        }
        self.parameter_table()?;
        Ok(())
    }

    /// Configured catalog, or the SDE-3000 default
    pub fn parameter_table(&self) -> Result<ParameterTable> {
        match &self.parameters {
            Some(defs) => {
                ParameterTable::new(defs.clone()).context("Invalid parameter catalog")
            }
            None => Ok(ParameterTable::default()),
        }
    }

    pub fn codec(&self) -> Result<SysExCodec> {
        Ok(SysExCodec::new(self.sysex, Arc::new(self.parameter_table()?)))
    }

    pub fn matcher(&self) -> DeviceMatcher {
        DeviceMatcher::NameContains {
            pattern: self.device.name_pattern.clone(),
            ignore_case: self.device.ignore_case,
        }
    }
}

// Default value functions
fn default_name_pattern() -> String { DEFAULT_DEVICE_PATTERN.to_string() }
fn default_client_name() -> String { "SDE-Editor".to_string() }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("{}").unwrap();
        assert_eq!(config.device.name_pattern, "SDE-3000");
        assert!(!config.device.ignore_case);
        assert_eq!(config.sysex, SysExHeader::default());
        assert_eq!(config.parameter_table().unwrap(), ParameterTable::default());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
device:
  name_pattern: "sde"
  ignore_case: true
sysex:
  manufacturer_id: 65
  family_id: 16
  unit_id: 18
parameters:
  - { id: 1, key: delayTime, name: Delay Time, min: 0, max: 127 }
  - { id: 5, key: modDepth, name: Mod Depth, min: 0, max: 100 }
"#;
        let config = AppConfig::parse(yaml).unwrap();
        assert!(config.matcher().matches("Roland SDE-3000"));
        assert_eq!(config.device.client_name, "SDE-Editor");

        let codec = config.codec().unwrap();
        assert_eq!(codec.header().unit_id, 0x12);
        assert_eq!(codec.table().len(), 2);
        assert_eq!(codec.table().lookup("modDepth").unwrap().max, 100);
    }

    #[test]
    fn test_rejects_invalid_catalog() {
        let yaml = r#"
parameters:
  - { id: 1, key: a, name: A, min: 0, max: 127 }
  - { id: 1, key: b, name: B, min: 0, max: 127 }
"#;
        assert!(AppConfig::parse(yaml).is_err());
    }

    #[test]
    fn test_rejects_wide_header_byte() {
        let yaml = "sysex: { manufacturer_id: 200, family_id: 16, unit_id: 17 }";
        assert!(AppConfig::parse(yaml).is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "device:\n  name_pattern: \"EVH\"").unwrap();

        let config = AppConfig::load(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(config.device.name_pattern, "EVH");
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let config = AppConfig::load_or_default(path.to_str().unwrap()).await.unwrap();
        assert_eq!(config.device.name_pattern, "SDE-3000");
        assert!(AppConfig::load(path.to_str().unwrap()).await.is_err());
    }

    #[tokio::test]
    async fn test_existing_file_is_loaded_not_defaulted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sde-editor.yaml");
        fs::write(&path, "device:\n  name_pattern: \"Boss\"\n").await.unwrap();

        let config = AppConfig::load_or_default(path.to_str().unwrap()).await.unwrap();
        assert_eq!(config.device.name_pattern, "Boss");
    }
}
