use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tagforge_core::ConfigurationError;
use thiserror::Error;

/// Lifecycle stage of the application; only `Development` enables extra diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectStage {
    Development,
    #[default]
    Production,
    SystemTest,
    UnitTest,
}

/// Engine-wide switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineOptions {
    pub project_stage: ProjectStage,
    /// Consult the resource locator before claiming a composite library namespace.
    pub enable_missing_resource_library_detection: bool,
    /// Maximum number of target types kept in the metadata cache.
    pub metadata_cache_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            project_stage: ProjectStage::Production,
            enable_missing_resource_library_detection: false,
            metadata_cache_capacity: 256,
        }
    }
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read options file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse options: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("metadata cache capacity must be greater than zero")]
    ZeroCapacity,
}

impl From<OptionsError> for ConfigurationError {
    fn from(err: OptionsError) -> Self {
        ConfigurationError::Options(err.to_string())
    }
}

impl EngineOptions {
    pub fn builder() -> EngineOptionsBuilder {
        EngineOptionsBuilder::default()
    }

    pub fn is_development(&self) -> bool {
        self.project_stage == ProjectStage::Development
    }

    /// Parses options from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, OptionsError> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    fn validate(self) -> Result<Self, OptionsError> {
        if self.metadata_cache_capacity == 0 {
            return Err(OptionsError::ZeroCapacity);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineOptionsBuilder {
    options: EngineOptions,
}

impl EngineOptionsBuilder {
    pub fn with_project_stage(mut self, stage: ProjectStage) -> Self {
        self.options.project_stage = stage;
        self
    }

    pub fn with_missing_resource_library_detection(mut self, enabled: bool) -> Self {
        self.options.enable_missing_resource_library_detection = enabled;
        self
    }

    pub fn with_metadata_cache_capacity(mut self, capacity: usize) -> Self {
        self.options.metadata_cache_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<EngineOptions, OptionsError> {
        self.options.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_are_production() {
        let options = EngineOptions::default();
        assert!(!options.is_development());
        assert_eq!(options.metadata_cache_capacity, 256);
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let options = EngineOptions::from_json_str(r#"{ "projectStage": "Development" }"#).unwrap();
        assert!(options.is_development());
        assert!(!options.enable_missing_resource_library_detection);
        assert_eq!(options.metadata_cache_capacity, 256);
    }

    #[rstest]
    #[case(r#"{ "projectStage": "Staging" }"#)]
    #[case(r#"{ "metadataCacheCapacity": 0 }"#)]
    #[case("not json")]
    fn invalid_json_is_a_configuration_error(#[case] json: &str) {
        let err: ConfigurationError = EngineOptions::from_json_str(json).unwrap_err().into();
        assert!(matches!(err, ConfigurationError::Options(_)));
    }

    #[test]
    fn builder_sets_every_switch() {
        let options = EngineOptions::builder()
            .with_project_stage(ProjectStage::UnitTest)
            .with_missing_resource_library_detection(true)
            .with_metadata_cache_capacity(8)
            .build()
            .unwrap();
        assert_eq!(options.project_stage, ProjectStage::UnitTest);
        assert!(options.enable_missing_resource_library_detection);
        assert_eq!(options.metadata_cache_capacity, 8);
        assert!(EngineOptions::builder().with_metadata_cache_capacity(0).build().is_err());
    }
}
