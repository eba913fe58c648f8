//! Project build configuration handed to agent workers.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Project types accepted from clients.
pub const PROJECT_TYPES: &[&str] = &["web_app", "api", "script"];

/// Build configuration for one project.
///
/// Serialized to JSON and passed on the worker's command line, so the wire
/// field names (`projectType`) must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Free-form description of what to build.
    pub description: String,

    /// Project kind, one of [`PROJECT_TYPES`].
    pub project_type: String,

    /// Additional requirement lines.
    #[serde(default)]
    pub requirements: Vec<String>,
}

impl ProjectConfig {
    /// Validate the config against the request limits.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.description.len() < 10 || self.description.len() > 1000 {
            return Err(CoreError::InvalidInput(
                "description must be between 10 and 1000 characters".to_string(),
            ));
        }
        if !PROJECT_TYPES.contains(&self.project_type.as_str()) {
            return Err(CoreError::InvalidInput(format!(
                "unknown project type: {}",
                self.project_type
            )));
        }
        if self.requirements.len() > 10 {
            return Err(CoreError::InvalidInput(
                "at most 10 requirements are allowed".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProjectConfig {
        ProjectConfig {
            description: "A todo list web application".to_string(),
            project_type: "web_app".to_string(),
            requirements: vec!["user accounts".to_string()],
        }
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_string(&config()).unwrap();
        assert!(json.contains("\"projectType\":\"web_app\""));
        assert!(json.contains("\"requirements\":[\"user accounts\"]"));
    }

    #[test]
    fn test_requirements_default_to_empty() {
        let parsed: ProjectConfig =
            serde_json::from_str(r#"{"description":"ten chars ok","projectType":"api"}"#).unwrap();
        assert!(parsed.requirements.is_empty());
    }

    #[test]
    fn test_validate_rejects_unknown_type() {
        let mut bad = config();
        bad.project_type = "desktop".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_description() {
        let mut bad = config();
        bad.description = "too short".to_string();
        assert!(bad.validate().is_err());
        assert!(config().validate().is_ok());
    }
}
