use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fmt;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

/// Kinds of operations that stage files in a temporary directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StagingKind {
    Import,
    Export,
    DragDrop,
}

impl StagingKind {
    pub const ALL: [StagingKind; 3] = [Self::Import, Self::Export, Self::DragDrop];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Export => "export",
            Self::DragDrop => "dragdrop",
        }
    }
}

impl fmt::Display for StagingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed per-kind temporary directories under a common root.
///
/// Each kind owns `<root>/<prefix>_<kind>`. Directories left over from a
/// previous run are removed with [`StagingArea::cleanup_all`] at startup.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: Utf8PathBuf,
    prefix: String,
}

impl StagingArea {
    pub fn new(root: impl Into<Utf8PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    /// Directory used by one kind of operation
    pub fn path(&self, kind: StagingKind) -> Utf8PathBuf {
        self.root.join(format!("{}_{}", self.prefix, kind))
    }

    /// Clear any stale directory of this kind and create it empty.
    pub fn prepare(&self, kind: StagingKind) -> Result<Utf8PathBuf> {
        let path = self.path(kind);
        if path.exists() {
            tracing::debug!("Clearing stale {} staging directory {}", kind, path);
            fs::remove_dir_all(&path)
                .with_context(|| format!("Failed to clear staging directory: {}", path))?;
        }
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create staging directory: {}", path))?;
        Ok(path)
    }

    /// Make sure the directory of this kind exists without clearing it.
    pub fn ensure(&self, kind: StagingKind) -> Result<Utf8PathBuf> {
        let path = self.path(kind);
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create staging directory: {}", path))?;
        Ok(path)
    }

    /// Fresh, uniquely named build directory inside the import area.
    ///
    /// Earlier builds stay in place because loaded addons still reference them.
    pub fn import_build_dir(&self, project_name: &str) -> Result<Utf8PathBuf> {
        let import_root = self.ensure(StagingKind::Import)?;
        let ticks = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();

        let mut candidate = import_root.join(format!("{project_name}_{ticks}"));
        let mut suffix = 1;
        while candidate.exists() {
            candidate = import_root.join(format!("{project_name}_{ticks}_{suffix}"));
            suffix += 1;
        }
        Ok(candidate)
    }

    /// Remove every staging directory left by a previous session.
    pub fn cleanup_all(&self) -> Result<()> {
        for kind in StagingKind::ALL {
            let path = self.path(kind);
            if path.exists() {
                fs::remove_dir_all(&path)
                    .with_context(|| format!("Failed to remove staging directory: {}", path))?;
                tracing::info!("Removed stale staging directory {}", path);
            }
        }
        Ok(())
    }
}
