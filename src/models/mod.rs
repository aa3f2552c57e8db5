//! Data models for clothkit.
//!
//! This module contains the core data structures used throughout the crate:
//! - [`CandidateFile`], [`AddonIdentity`], [`ProjectIdentitySuggestion`] and
//!   [`ProjectSetupDecision`]: the transient values produced during an intake operation
//! - [`LoadedAddon`]: an addon recorded in the project after loading
//! - [`ProjectState`]: the project being edited, wrapped by
//!   [`StateManager`](crate::state::StateManager)
//! - [`ToolConfig`]: settings loaded from `clothkit.yaml`

pub mod addon;
pub mod config;
pub mod project_state;

pub use addon::{
    AddonIdentity, CandidateFile, DESCRIPTOR_MARKER, GenderToken, LoadedAddon,
    ProjectIdentitySuggestion, ProjectSetupDecision,
};
pub use self::config::{DrawableCountPolicy, ToolConfig};
pub use project_state::{IntakePhase, ProjectState};
