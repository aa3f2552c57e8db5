//! Services module - Pure business logic for addon intake and project portability.
//!
//! The services are **framework-agnostic** and have no dependencies on any
//! presentation layer, making them testable and reusable.
//!
//! # Components
//!
//! - [`descriptor`]: decides whether a selected `.meta` file is an addon descriptor
//!   by looking for the `ShopPedApparel` marker in its first two lines.
//! - [`identity`]: strips ped prefixes from descriptor names and merges several
//!   short names into one suggested project name.
//! - [`drawables`]: finds the `.ydd` drawables that belong to a descriptor.
//! - [`archive`]: packs a project tree into a portable project file and back.
//! - [`setup`]: validates the user's project setup answer (name rules, overwrite check).
//! - [`staging`]: fixed per-operation temporary directories.
//! - [`loader`]: the [`AddonLoader`] seam to the addon manager, with a disk-backed default.
//!
//! # Blocking work
//!
//! Drawable search and archive work are synchronous filesystem walks. The
//! intake workflow runs them on tokio's blocking pool.

pub mod archive;
pub mod descriptor;
pub mod drawables;
pub mod identity;
pub mod loader;
pub mod setup;
pub mod staging;

pub use archive::{
    ArchiveError, ArchiveStats, PROJECT_FILE_EXTENSION, ProjectArchiver, export_file_name,
};
pub use drawables::{DrawableError, DrawableMatches, count_drawables, find_drawables};
pub use identity::{ShortNames, extract_short_name, suggest_project_name};
pub use loader::{AddonLoader, DiskAddonLoader};
pub use setup::{ProjectSetupValidator, SetupError, SetupRequest};
pub use staging::{StagingArea, StagingKind};
