use crate::models::{GenderToken, LoadedAddon};
use crate::services::{descriptor, drawables, identity};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use camino::Utf8Path;

/// Loads one validated descriptor into a project addon.
///
/// This is the seam to the addon manager that owns full descriptor parsing.
/// The intake workflow calls it once per descriptor after the user confirmed,
/// and records the returned addon in the project state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AddonLoader: Send + Sync {
    /// Load a descriptor.
    ///
    /// When `should_set_project_name` is true the returned addon carries a
    /// suggested project name.
    async fn load_addon(
        &self,
        descriptor: &Utf8Path,
        should_set_project_name: bool,
    ) -> Result<LoadedAddon>;
}

/// Loader that builds addons straight from the files on disk.
///
/// It re-checks the descriptor marker and records the short name, gender and
/// matched drawables. Drawable search errors fail the load.
#[derive(Debug, Clone, Default)]
pub struct DiskAddonLoader;

impl DiskAddonLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AddonLoader for DiskAddonLoader {
    async fn load_addon(
        &self,
        descriptor: &Utf8Path,
        should_set_project_name: bool,
    ) -> Result<LoadedAddon> {
        if !descriptor::validate(descriptor).await {
            bail!("{} is not an addon descriptor", descriptor);
        }

        let identity = identity::identity_for(descriptor);
        let path = descriptor.to_path_buf();
        let matches = tokio::task::spawn_blocking(move || drawables::find_drawables(&path))
            .await
            .context("Drawable search task failed")?
            .with_context(|| format!("Failed to find drawables for {}", descriptor))?;

        let gender = matches.gender.unwrap_or_else(|| {
            GenderToken::from_descriptor_stem(descriptor.file_stem().unwrap_or_default())
        });

        tracing::info!(
            "Loaded addon {} from {} with {} drawable(s)",
            identity.short_name(),
            identity.source_file_name(),
            matches.count()
        );

        Ok(LoadedAddon {
            name: identity.short_name().to_string(),
            descriptor_path: descriptor.to_path_buf(),
            gender,
            drawables: matches.files,
            suggested_project_name: should_set_project_name
                .then(|| identity.short_name().to_string()),
        })
    }
}
