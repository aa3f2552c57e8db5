//! Project setup decisions, independent of any presentation layer.
//!
//! The confirmation step is split in two: [`SetupRequest`] describes what the
//! user should be asked, and [`ProjectSetupValidator`] decides whether the
//! answer is acceptable (legal name, overwrite conflict). Rendering the
//! request is up to the caller.

use crate::models::{ProjectIdentitySuggestion, ProjectSetupDecision};
use camino::Utf8PathBuf;
use thiserror::Error;

/// Characters that cannot appear in a project name on any supported platform
const INVALID_NAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Reasons a setup decision is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("Project name must not be empty")]
    EmptyName,

    #[error("Project name {0:?} contains characters that are not allowed in file names")]
    InvalidCharacters(String),

    #[error("Project {0:?} already exists and overwriting was declined")]
    OverwriteDeclined(String),
}

/// What the presentation layer should ask the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    pub title: String,
    pub confirm_text: String,
    pub project_name: String,
    pub is_self_contained: bool,
    pub drawable_message: Option<String>,
}

impl SetupRequest {
    /// Request shown before creating an empty project
    pub fn for_new_project() -> Self {
        Self {
            title: "Create New Project".to_string(),
            confirm_text: "Create".to_string(),
            project_name: String::new(),
            is_self_contained: true,
            drawable_message: None,
        }
    }

    /// Request shown before opening existing addons
    pub fn for_open_addon(suggestion: &ProjectIdentitySuggestion) -> Self {
        let drawable_message = if suggestion.descriptor_count > 1 {
            format!(
                "Found {} drawable(s) in {} .meta files",
                suggestion.drawable_count, suggestion.descriptor_count
            )
        } else {
            format!("Found {} drawable(s)", suggestion.drawable_count)
        };

        Self {
            title: "Open Existing Addon".to_string(),
            confirm_text: "Open".to_string(),
            project_name: suggestion.suggested_name.clone(),
            is_self_contained: false,
            drawable_message: Some(drawable_message),
        }
    }
}

/// Checks project names against naming rules and existing projects
#[derive(Debug, Clone, Default)]
pub struct ProjectSetupValidator {
    main_projects_folder: Option<Utf8PathBuf>,
}

impl ProjectSetupValidator {
    pub fn new(main_projects_folder: Option<Utf8PathBuf>) -> Self {
        Self {
            main_projects_folder,
        }
    }

    /// Check a project name is non-blank and usable as a file name.
    pub fn validate_name(&self, name: &str) -> Result<(), SetupError> {
        if name.trim().is_empty() {
            return Err(SetupError::EmptyName);
        }
        if name
            .chars()
            .any(|c| c.is_control() || INVALID_NAME_CHARS.contains(&c))
        {
            return Err(SetupError::InvalidCharacters(name.to_string()));
        }
        Ok(())
    }

    pub fn is_valid_name(&self, name: &str) -> bool {
        self.validate_name(name).is_ok()
    }

    /// Check whether a saved project with this name already exists.
    pub fn project_exists(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        match &self.main_projects_folder {
            Some(folder) if !folder.as_str().is_empty() => folder.join(name).exists(),
            _ => false,
        }
    }

    /// Turn the user's answer into a final decision.
    ///
    /// Unconfirmed answers pass through untouched. Confirmed answers must have
    /// a valid name, and if the project already exists `confirm_overwrite` is
    /// asked; declining rejects the decision.
    pub fn finalize<F>(
        &self,
        decision: ProjectSetupDecision,
        confirm_overwrite: F,
    ) -> Result<ProjectSetupDecision, SetupError>
    where
        F: FnOnce(&str) -> bool,
    {
        if !decision.confirmed {
            return Ok(decision);
        }

        self.validate_name(&decision.project_name)?;

        if self.project_exists(&decision.project_name) && !confirm_overwrite(&decision.project_name)
        {
            return Err(SetupError::OverwriteDeclined(decision.project_name));
        }

        Ok(ProjectSetupDecision {
            project_name: decision.project_name.trim().to_string(),
            ..decision
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_open_addon_request_single() {
        let suggestion = ProjectIdentitySuggestion {
            suggested_name: "tshirt".to_string(),
            drawable_count: 4,
            descriptor_count: 1,
        };
        let request = SetupRequest::for_open_addon(&suggestion);

        assert_eq!(request.title, "Open Existing Addon");
        assert_eq!(request.confirm_text, "Open");
        assert_eq!(request.project_name, "tshirt");
        assert!(!request.is_self_contained);
        assert_eq!(request.drawable_message.as_deref(), Some("Found 4 drawable(s)"));
    }

    #[test]
    fn test_open_addon_request_multiple() {
        let suggestion = ProjectIdentitySuggestion {
            suggested_name: "tshirt".to_string(),
            drawable_count: 2,
            descriptor_count: 2,
        };
        let request = SetupRequest::for_open_addon(&suggestion);

        assert_eq!(
            request.drawable_message.as_deref(),
            Some("Found 2 drawable(s) in 2 .meta files")
        );
    }

    #[test]
    fn test_new_project_request() {
        let request = SetupRequest::for_new_project();
        assert!(request.is_self_contained);
        assert!(request.drawable_message.is_none());
    }

    #[test]
    fn test_name_rules() {
        let validator = ProjectSetupValidator::default();
        assert!(validator.is_valid_name("tshirt"));
        assert!(validator.is_valid_name("my tshirts 2"));
        assert_eq!(validator.validate_name("   "), Err(SetupError::EmptyName));
        assert!(!validator.is_valid_name("a/b"));
        assert!(!validator.is_valid_name("what?"));
        assert!(!validator.is_valid_name("tab\there"));
    }

    #[test]
    fn test_project_exists() {
        let temp_dir = TempDir::new().unwrap();
        let folder = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(folder.join("tshirt")).unwrap();

        let validator = ProjectSetupValidator::new(Some(folder));
        assert!(validator.project_exists("tshirt"));
        assert!(validator.project_exists("  tshirt  "));
        assert!(!validator.project_exists("jacket"));
        assert!(!validator.project_exists(""));

        let unconfigured = ProjectSetupValidator::default();
        assert!(!unconfigured.project_exists("tshirt"));
    }

    #[test]
    fn test_finalize_passes_cancelled_through() {
        let validator = ProjectSetupValidator::default();
        let decision = validator
            .finalize(ProjectSetupDecision::cancelled(), |_| panic!("not asked"))
            .unwrap();
        assert!(!decision.confirmed);
    }

    #[test]
    fn test_finalize_rejects_invalid_name() {
        let validator = ProjectSetupValidator::default();
        let result = validator.finalize(ProjectSetupDecision::confirmed("a|b", true), |_| true);
        assert!(matches!(result, Err(SetupError::InvalidCharacters(_))));
    }

    #[test]
    fn test_finalize_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let folder = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(folder.join("tshirt")).unwrap();
        let validator = ProjectSetupValidator::new(Some(folder));

        let declined =
            validator.finalize(ProjectSetupDecision::confirmed("tshirt", false), |_| false);
        assert_eq!(
            declined,
            Err(SetupError::OverwriteDeclined("tshirt".to_string()))
        );

        let accepted = validator
            .finalize(ProjectSetupDecision::confirmed(" tshirt ", false), |name| {
                name == " tshirt "
            })
            .unwrap();
        assert!(accepted.confirmed);
        assert_eq!(accepted.project_name, "tshirt");
    }
}
