use crate::models::{ProjectIdentitySuggestion, ProjectSetupDecision};
use crate::services::SetupRequest;

/// Questions the intake workflow asks the person driving it.
///
/// The workflow decides *when* to ask; implementations decide *how* (a
/// terminal, a dialog, a scripted answer). Answers are returned synchronously.
#[cfg_attr(test, mockall::automock)]
pub trait IntakePrompt: Send + Sync {
    /// Asked before an open replaces a project with unsaved changes.
    fn confirm_discard_unsaved_changes(&self) -> bool;

    /// Ask for the project name and type.
    fn confirm_setup(&self, request: &SetupRequest) -> ProjectSetupDecision;

    /// Asked when a project with the chosen name already exists.
    fn confirm_overwrite(&self, project_name: &str) -> bool;

    /// Blocking warning shown when the selection has no drawables.
    fn acknowledge_no_drawables(&self, suggestion: &ProjectIdentitySuggestion);
}

/// Answers every question affirmatively without interaction.
///
/// The project name defaults to the suggested one unless overridden.
#[derive(Debug, Clone, Default)]
pub struct AutoConfirm {
    pub project_name: Option<String>,
    pub is_self_contained: bool,
}

impl AutoConfirm {
    pub fn new(project_name: Option<String>, is_self_contained: bool) -> Self {
        Self {
            project_name,
            is_self_contained,
        }
    }
}

impl IntakePrompt for AutoConfirm {
    fn confirm_discard_unsaved_changes(&self) -> bool {
        true
    }

    fn confirm_setup(&self, request: &SetupRequest) -> ProjectSetupDecision {
        let name = self
            .project_name
            .clone()
            .unwrap_or_else(|| request.project_name.clone());
        ProjectSetupDecision::confirmed(name, self.is_self_contained)
    }

    fn confirm_overwrite(&self, project_name: &str) -> bool {
        tracing::info!("Overwriting existing project {}", project_name);
        true
    }

    fn acknowledge_no_drawables(&self, suggestion: &ProjectIdentitySuggestion) {
        tracing::warn!(
            "No drawable files (.ydd) were found for {} descriptor(s)",
            suggestion.descriptor_count
        );
    }
}
