use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// How drawables are totalled when several descriptors match the same file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawableCountPolicy {
    /// Each descriptor counts its matches independently
    #[default]
    PerDescriptor,
    /// A file matched by several descriptors counts once
    Distinct,
}

/// Tool configuration from clothkit.yaml
///
/// Every field has a default so partial files and environment overrides work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Folder holding saved projects, used for overwrite checks
    #[serde(default)]
    pub main_projects_folder: Option<Utf8PathBuf>,

    /// Root for staging directories, the OS temp dir when unset
    #[serde(default)]
    pub temp_root: Option<Utf8PathBuf>,

    #[serde(default = "default_staging_prefix")]
    pub staging_prefix: String,

    #[serde(default)]
    pub drawable_count_policy: DrawableCountPolicy,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub debug_mode: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            main_projects_folder: None,
            temp_root: None,
            staging_prefix: default_staging_prefix(),
            drawable_count_policy: DrawableCountPolicy::default(),
            log_dir: default_log_dir(),
            debug_mode: false,
        }
    }
}

fn default_staging_prefix() -> String {
    "clothkit".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl ToolConfig {
    /// Resolve the staging root, falling back to the OS temp directory.
    pub fn resolved_temp_root(&self) -> Utf8PathBuf {
        if let Some(root) = &self.temp_root {
            return root.clone();
        }

        let system_temp = std::env::temp_dir();
        Utf8PathBuf::from_path_buf(system_temp)
            .unwrap_or_else(|path| Utf8PathBuf::from(path.to_string_lossy().into_owned()))
    }
}
