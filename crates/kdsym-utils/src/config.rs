//! # Host Configuration
//!
//! JSON configuration consumed by the filesystem symbol host.
//!
//! The configuration answers the two questions the symbol loader cannot answer
//! on its own: *where is the symbol file for this module* and *where is this
//! module loaded / what build is it*.
//!
//! ```json
//! {
//!     "symbols": { "driver.sys": "/symbols/driver.sym" },
//!     "modules": {
//!         "driver.sys": { "base": 4096, "image": "/images/driver.sys" }
//!     },
//!     "lock_memory": true
//! }
//! ```
//!
//! Module names are matched case-insensitively, the way registry value names
//! are.
//!
//! ## Environment Variables
//!
//! - `KDSYM_CONFIG`: Path to the configuration file used by [`HostConfig::from_env`]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use serde::{Deserialize, Serialize};

/// Environment variable naming the default configuration file.
pub const CONFIG_ENV: &str = "KDSYM_CONFIG";

/// Where a module lives and how to learn its build identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig
{
    /// Load address of the module.
    pub base: u32,
    /// Image file whose PE header carries the build timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
    /// Explicit build identity; takes precedence over `image`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_identity: Option<u32>,
}

/// Top-level host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig
{
    /// Module name to symbol file path.
    #[serde(default)]
    pub symbols: BTreeMap<String, PathBuf>,
    /// Module name to load information.
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleConfig>,
    /// Lock mapped symbol files into RAM (`mlock`).
    #[serde(default = "default_lock_memory")]
    pub lock_memory: bool,
}

fn default_lock_memory() -> bool
{
    true
}

impl HostConfig
{
    /// Parse a configuration from a JSON string.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is not valid configuration JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError>
    {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a configuration file.
    ///
    /// Relative paths inside the file are resolved against the file's directory.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid configuration JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError>
    {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json(&text)?;
        if let Some(dir) = path.parent() {
            config.rebase(dir);
        }
        Ok(config)
    }

    /// Load the file named by `KDSYM_CONFIG`.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::NotConfigured`] when the variable is unset, otherwise
    /// the errors of [`HostConfig::load`].
    pub fn from_env() -> Result<Self, ConfigError>
    {
        let path = env::var_os(CONFIG_ENV).ok_or(ConfigError::NotConfigured)?;
        Self::load(Path::new(&path))
    }

    /// Symbol file configured for `module_name`.
    pub fn symbol_file(&self, module_name: &str) -> Option<&Path>
    {
        lookup_ignore_case(&self.symbols, module_name).map(PathBuf::as_path)
    }

    /// Load information configured for `module_name`.
    pub fn module(&self, module_name: &str) -> Option<&ModuleConfig>
    {
        lookup_ignore_case(&self.modules, module_name)
    }

    fn rebase(&mut self, dir: &Path)
    {
        for path in self.symbols.values_mut() {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
        for module in self.modules.values_mut() {
            if let Some(image) = module.image.as_mut().filter(|image| image.is_relative()) {
                *image = dir.join(&*image);
            }
        }
    }
}

fn lookup_ignore_case<'a, V>(map: &'a BTreeMap<String, V>, key: &str) -> Option<&'a V>
{
    map.get(key)
        .or_else(|| map.iter().find(|(name, _)| name.eq_ignore_ascii_case(key)).map(|(_, value)| value))
}

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError
{
    /// `KDSYM_CONFIG` is not set and no path was given
    #[error("No configuration file given (set {CONFIG_ENV} or pass --config)")]
    NotConfigured,

    /// The configuration file could not be read
    #[error("Failed to read {}: {source}", .path.display())]
    Io
    {
        /// File that failed to read
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// The configuration file is not valid JSON for [`HostConfig`]
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
