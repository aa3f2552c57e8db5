use crate::models::ToolConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use ::config::{Config, Environment, File, FileFormat};
use std::fs;

/// Name of the configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "clothkit.yaml";

/// Prefix of environment variables that override file settings
pub const ENV_PREFIX: &str = "CLOTHKIT";

/// Configuration manager for loading and saving the YAML configuration file.
///
/// Settings are layered: built-in defaults, then `clothkit.yaml`, then
/// `CLOTHKIT_*` environment variables (for example `CLOTHKIT_DEBUG_MODE=true`).
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing `clothkit.yaml`, created if missing
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// Load the tool configuration.
    ///
    /// # Returns
    /// The layered ToolConfig; defaults fill anything the file and
    /// environment leave unset
    pub fn load_config(&self) -> Result<ToolConfig> {
        self.load_config_with(Environment::with_prefix(ENV_PREFIX))
    }

    fn load_config_with(&self, environment: Environment) -> Result<ToolConfig> {
        if !self.config_path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
        }

        let settings = Config::builder()
            .add_source(File::new(self.config_path.as_str(), FileFormat::Yaml).required(false))
            .add_source(environment.try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        let config: ToolConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        tracing::info!("Loaded config from {}", self.config_path);
        Ok(config)
    }

    /// Save the tool configuration file.
    ///
    /// # Arguments
    /// * `config` - The ToolConfig to save
    pub fn save_config(&self, config: &ToolConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
