// clothkit - Addon project intake and portability for clothing addon projects
//
// This is the library crate containing the core business logic and data structures.
// The binary crate (main.rs) provides the command line entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod workflow;

// Re-export commonly used types for convenience
pub use self::config::ConfigManager;
pub use metrics::Metrics;
pub use models::{LoadedAddon, ProjectIdentitySuggestion, ProjectState, ToolConfig};
pub use state::{StateChange, StateManager};
pub use workflow::{IntakeError, IntakeOutcome, IntakeReport, IntakeWorkflow};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
