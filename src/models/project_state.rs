use crate::models::addon::LoadedAddon;
use std::collections::HashSet;
use std::fmt;

/// Phase of the intake operation currently driving the project.
///
/// Every open, add or import walks these phases in order. A cancelled
/// confirmation returns to [`IntakePhase::Idle`] without touching project data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntakePhase {
    #[default]
    Idle,
    CandidatesSelected,
    Validated,
    IdentitySuggested,
    AwaitingUserConfirmation,
    Confirmed,
    Loading,
    Loaded,
    Cancelled,
}

impl fmt::Display for IntakePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::CandidatesSelected => "candidates selected",
            Self::Validated => "validated",
            Self::IdentitySuggested => "identity suggested",
            Self::AwaitingUserConfirmation => "awaiting confirmation",
            Self::Confirmed => "confirmed",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// The project currently being edited.
///
/// `ProjectState` is wrapped in `Arc<RwLock<ProjectState>>` by
/// [`crate::state::StateManager`], which is handed explicitly to every intake
/// operation. Mutate it through the manager so change events are emitted.
#[derive(Clone, Debug, Default)]
pub struct ProjectState {
    // Identity
    pub project_name: String,
    pub is_external_project: bool,

    // Loaded addons, in load order
    pub addons: Vec<LoadedAddon>,

    // Runtime state
    pub has_unsaved_changes: bool,
    pub intake_phase: IntakePhase,
    pub current_operation: String,
}

impl ProjectState {
    /// Check if the project holds no addons and no name.
    pub fn is_empty(&self) -> bool {
        self.addons.is_empty() && self.project_name.is_empty()
    }

    /// Total drawables across all loaded addons, counted per addon.
    pub fn total_drawables(&self) -> usize {
        self.addons.iter().map(|addon| addon.drawables.len()).sum()
    }

    /// Drawables across all loaded addons with shared files counted once.
    pub fn distinct_drawables(&self) -> usize {
        self.addons
            .iter()
            .flat_map(|addon| addon.drawables.iter())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Drop every addon and return to the empty home state.
    pub fn clear(&mut self) {
        self.project_name.clear();
        self.is_external_project = false;
        self.addons.clear();
        self.has_unsaved_changes = false;
        self.intake_phase = IntakePhase::Idle;
        self.current_operation.clear();
    }

    /// One-line description of the project for status output.
    pub fn summary(&self) -> String {
        if self.addons.is_empty() {
            return "No addons loaded".to_string();
        }

        let name = if self.project_name.is_empty() {
            "(unnamed)"
        } else {
            self.project_name.as_str()
        };
        let kind = if self.is_external_project {
            "External"
        } else {
            "Self-contained"
        };

        format!(
            "{} project {}: {} addon(s), {} drawable(s)",
            kind,
            name,
            self.addons.len(),
            self.total_drawables()
        )
    }
}
