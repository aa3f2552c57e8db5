// State management module
//
// This module provides the StateManager which wraps ProjectState with thread-safe access
// using Arc<RwLock<T>> and emits change events for presentation updates.

use crate::models::{IntakePhase, LoadedAddon, ProjectState};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast};

/// Held for the duration of one intake operation
pub type IntakeGuard = OwnedMutexGuard<()>;

/// Change events emitted when state is modified
///
/// These events notify interested parties (a UI, the CLI) about state
/// changes without requiring them to poll the state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The project was replaced by a freshly opened set of addons
    ProjectReplaced {
        project_name: String,
        addon_count: usize,
    },

    /// Addons were appended to the existing project
    AddonsAppended {
        added: usize,
        total: usize,
    },

    /// Project name has changed
    ProjectNameChanged {
        name: String,
    },

    /// Project switched between self-contained and external
    ProjectTypeChanged {
        is_external: bool,
    },

    /// Unsaved-changes flag flipped
    UnsavedChangesChanged {
        has_unsaved_changes: bool,
    },

    /// Intake operation moved to another phase
    IntakePhaseChanged {
        phase: IntakePhase,
    },

    /// Current operation has changed
    OperationChanged {
        operation: String,
    },

    /// Project has been cleared
    StateReset,
}

/// Thread-safe project state manager with event emission
///
/// This is the explicit owner of the current project. It:
/// - Provides thread-safe access to [`ProjectState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Hands out the intake lock so only one open/add/import runs at a time
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// A `StateManager` is passed to every
/// [`IntakeWorkflow`](crate::workflow::IntakeWorkflow) operation; nothing
/// reaches it through globals.
pub struct StateManager {
    /// The project state protected by RwLock for thread-safe access
    state: Arc<RwLock<ProjectState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,

    /// Exclusive lock held by the running intake operation
    intake_lock: Arc<Mutex<()>>,
}

impl StateManager {
    /// Create a new StateManager with an empty project
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(ProjectState::default())),
            state_tx,
            intake_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Get a read-only snapshot of the current state
    pub fn snapshot(&self) -> ProjectState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let addon_count = state_manager.read(|state| state.addons.len());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ProjectState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// This is the primary way to modify state. It:
    /// 1. Captures the old state
    /// 2. Applies the update function
    /// 3. Detects what changed
    /// 4. Emits appropriate events
    ///
    /// # Returns
    /// A vector of StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut ProjectState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = self.detect_changes(&old_state, &state);

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Try to start an intake operation.
    ///
    /// Returns `None` if another open, add or import is still running. The
    /// returned guard must be held until the operation finishes.
    pub fn try_begin_intake(&self) -> Option<IntakeGuard> {
        Arc::clone(&self.intake_lock).try_lock_owned().ok()
    }

    /// Detect what changed between two states and generate events
    fn detect_changes(&self, old: &ProjectState, new: &ProjectState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.intake_phase != new.intake_phase {
            changes.push(StateChange::IntakePhaseChanged {
                phase: new.intake_phase,
            });
        }

        if old.project_name != new.project_name {
            changes.push(StateChange::ProjectNameChanged {
                name: new.project_name.clone(),
            });
        }

        if old.is_external_project != new.is_external_project {
            changes.push(StateChange::ProjectTypeChanged {
                is_external: new.is_external_project,
            });
        }

        if old.has_unsaved_changes != new.has_unsaved_changes {
            changes.push(StateChange::UnsavedChangesChanged {
                has_unsaved_changes: new.has_unsaved_changes,
            });
        }

        if old.current_operation != new.current_operation {
            changes.push(StateChange::OperationChanged {
                operation: new.current_operation.clone(),
            });
        }

        changes
    }

    fn emit(&self, changes: &mut Vec<StateChange>, event: StateChange) {
        let _ = self.state_tx.send(event.clone());
        changes.push(event);
    }

    // Convenience methods for common state updates

    /// Replace every addon with a freshly opened set
    pub fn replace_project(
        &self,
        addons: Vec<LoadedAddon>,
        project_name: String,
        is_external: bool,
    ) -> Vec<StateChange> {
        let addon_count = addons.len();
        let name = project_name.clone();

        let mut changes = self.update(|state| {
            state.addons = addons;
            state.project_name = project_name;
            state.is_external_project = is_external;
            state.has_unsaved_changes = true;
        });

        self.emit(
            &mut changes,
            StateChange::ProjectReplaced {
                project_name: name,
                addon_count,
            },
        );

        changes
    }

    /// Append addons to the current project
    pub fn append_addons(&self, addons: Vec<LoadedAddon>) -> Vec<StateChange> {
        let added = addons.len();
        let mut total = 0;

        let mut changes = self.update(|state| {
            state.addons.extend(addons);
            state.has_unsaved_changes = true;
            total = state.addons.len();
        });

        self.emit(&mut changes, StateChange::AddonsAppended { added, total });

        changes
    }

    /// Set the project name
    pub fn set_project_name(&self, name: impl Into<String>) -> Vec<StateChange> {
        let name = name.into();
        self.update(|state| {
            state.project_name = name;
        })
    }

    /// Move the running intake operation to another phase
    pub fn set_intake_phase(&self, phase: IntakePhase) -> Vec<StateChange> {
        tracing::debug!("Intake phase: {}", phase);
        self.update(|state| {
            state.intake_phase = phase;
        })
    }

    /// Update the current operation text
    pub fn set_operation(&self, operation: impl Into<String>) -> Vec<StateChange> {
        let operation = operation.into();
        self.update(|state| {
            state.current_operation = operation;
        })
    }

    /// Record that the project has been saved
    pub fn mark_saved(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.has_unsaved_changes = false;
        })
    }

    /// Clear the project and return to the empty home state
    pub fn clear_project(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.clear();
        });

        self.emit(&mut changes, StateChange::StateReset);
        tracing::info!("Cleared project data");

        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across tasks
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
            intake_lock: Arc::clone(&self.intake_lock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenderToken;
    use camino::Utf8PathBuf;

    fn addon(name: &str) -> LoadedAddon {
        LoadedAddon {
            name: name.to_string(),
            descriptor_path: Utf8PathBuf::from(format!("/addons/mp_m_freemode_01_{name}.meta")),
            gender: GenderToken::Male,
            drawables: vec![Utf8PathBuf::from(format!(
                "/addons/mp_m_freemode_01_{name}^jbib_000_u.ydd"
            ))],
            suggested_project_name: None,
        }
    }

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert!(state.is_empty());
        assert_eq!(state.intake_phase, IntakePhase::Idle);
    }

    #[test]
    fn test_update_with_change_detection() {
        let manager = StateManager::new();

        let changes = manager.update(|state| {
            state.intake_phase = IntakePhase::Loading;
            state.project_name = "tshirt".to_string();
        });

        assert_eq!(changes.len(), 2);
        assert!(matches!(
            changes[0],
            StateChange::IntakePhaseChanged {
                phase: IntakePhase::Loading
            }
        ));
        assert!(matches!(changes[1], StateChange::ProjectNameChanged { .. }));
    }

    #[test]
    fn test_replace_project() {
        let manager = StateManager::new();
        manager.append_addons(vec![addon("old")]);

        let changes = manager.replace_project(
            vec![addon("tshirt_1"), addon("tshirt_2")],
            "tshirt".to_string(),
            true,
        );

        assert!(changes.iter().any(|c| matches!(
            c,
            StateChange::ProjectReplaced { addon_count: 2, .. }
        )));
        assert!(changes.contains(&StateChange::ProjectTypeChanged { is_external: true }));

        let state = manager.snapshot();
        assert_eq!(state.addons.len(), 2);
        assert_eq!(state.project_name, "tshirt");
        assert!(state.is_external_project);
        assert!(state.has_unsaved_changes);
    }

    #[test]
    fn test_append_addons() {
        let manager = StateManager::new();
        manager.append_addons(vec![addon("a")]);

        let changes = manager.append_addons(vec![addon("b"), addon("c")]);

        assert!(changes.contains(&StateChange::AddonsAppended { added: 2, total: 3 }));
        assert_eq!(manager.read(|s| s.addons.len()), 3);
    }

    #[test]
    fn test_mark_saved() {
        let manager = StateManager::new();
        manager.append_addons(vec![addon("a")]);

        let changes = manager.mark_saved();

        assert_eq!(
            changes,
            vec![StateChange::UnsavedChangesChanged {
                has_unsaved_changes: false
            }]
        );
    }

    #[test]
    fn test_clear_project() {
        let manager = StateManager::new();
        manager.replace_project(vec![addon("a")], "a".to_string(), false);

        let changes = manager.clear_project();

        assert!(changes.iter().any(|c| matches!(c, StateChange::StateReset)));
        assert!(manager.snapshot().is_empty());
    }

    #[test]
    fn test_intake_lock_is_exclusive() {
        let manager = StateManager::new();
        let shared = manager.clone();

        let guard = manager.try_begin_intake();
        assert!(guard.is_some());
        assert!(shared.try_begin_intake().is_none());

        drop(guard);
        assert!(shared.try_begin_intake().is_some());
    }

    #[test]
    fn test_subscribe_to_changes() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.set_intake_phase(IntakePhase::CandidatesSelected);

        let event = rx.try_recv();
        assert!(matches!(
            event,
            Ok(StateChange::IntakePhaseChanged {
                phase: IntakePhase::CandidatesSelected
            })
        ));
    }

    #[test]
    fn test_multiple_subscribers() {
        let manager = StateManager::new();
        let mut rx1 = manager.subscribe();
        let mut rx2 = manager.subscribe();

        manager.set_project_name("tshirt");

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }
}
