//! Configuration for itemdesk-core
//!
//! Service behavior knobs and the template definitions handed to the
//! [`TemplateRegistry`](crate::registry::TemplateRegistry).

use serde::{Deserialize, Serialize};

use crate::registry::{RegistryError, TemplateRegistry};
use crate::schema::Template;

/// Core configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Record service behavior
    pub service: ServiceConfig,
    /// Custom-field templates
    pub templates: Vec<Template>,
}

/// When a recorded approval stops counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalReset {
    /// Cleared whenever `templateId` or `workflowStage` takes a different value.
    #[default]
    OnChange,
    /// Kept until the record is deleted.
    Never,
}

/// Record service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub approval_reset: ApprovalReset,
    /// Dispatch audit events after committed writes
    pub audit_enabled: bool,
    /// Dispatch notifications after create and update
    pub notifications_enabled: bool,
    /// Snapshot records to the backup sink after create and update
    pub backup_enabled: bool,
    /// Parent chains longer than this are treated as cycles
    pub max_ancestor_depth: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            approval_reset: ApprovalReset::OnChange,
            audit_enabled: true,
            notifications_enabled: true,
            backup_enabled: false,
            max_ancestor_depth: 1024,
        }
    }
}

impl CoreConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.max_ancestor_depth == 0 {
            return Err(ConfigError::OutOfRange(
                "max_ancestor_depth must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the template registry described by `templates`.
    pub fn registry(&self) -> Result<TemplateRegistry, ConfigError> {
        Ok(TemplateRegistry::from_templates(self.templates.clone())?)
    }
}

/// Configuration loading or validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid templates: {0}")]
    Templates(#[from] RegistryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.service.approval_reset, ApprovalReset::OnChange);
        assert!(config.service.audit_enabled);
        assert!(!config.service.backup_enabled);
    }

    #[test]
    fn test_json_serialization() {
        let mut config = CoreConfig::default();
        config.service.approval_reset = ApprovalReset::Never;
        let json = config.to_json().unwrap();
        let parsed = CoreConfig::from_json(&json).unwrap();
        assert_eq!(parsed.service.approval_reset, ApprovalReset::Never);
    }

    #[test]
    fn test_toml_with_templates() {
        let config = CoreConfig::from_toml(
            r#"
            [service]
            approval_reset = "never"
            backup_enabled = true

            [[templates]]
            id = "tracked"
            name = "Tracked"

            [[templates.fields]]
            name = "risk"
            field_type = "string"

            [[templates]]
            id = "hardware"
            name = "Hardware"
            inherits = "tracked"
            "#,
        )
        .unwrap();
        assert_eq!(config.service.approval_reset, ApprovalReset::Never);
        assert!(config.service.backup_enabled);
        assert!(config.service.notifications_enabled);
        assert_eq!(config.service.max_ancestor_depth, 1024);
        let registry = config.registry().unwrap();
        assert!(registry.get("hardware").is_some());
    }

    #[test]
    fn test_out_of_range() {
        let mut config = CoreConfig::default();
        config.service.max_ancestor_depth = 0;
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange(_))));
    }

    #[test]
    fn test_bad_parent_template() {
        let config = CoreConfig::from_json(
            r#"{"templates":[{"id":"child","name":"Child","inherits":"missing"}]}"#,
        )
        .unwrap();
        assert!(matches!(config.registry(), Err(ConfigError::Templates(_))));
    }
}
