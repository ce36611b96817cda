//! Command-line interface configuration
//!
//! Both `boardflash` and `board-selftest` read an optional `boardflash.toml`;
//! the [Config] type handles locating and loading it.

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{command::ToolPaths, error::Error};

const CONFIG_FILE: &str = "boardflash.toml";

/// A configured, known serial connection
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Name of the serial port used for communication
    pub serial: Option<String>,
}

/// Deserialized contents of a configuration file
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Preferred serial port connection information
    #[serde(default)]
    pub connection: Connection,
    /// External flashing tools
    #[serde(default)]
    pub tools: ToolPaths,
}

impl Config {
    /// Load the configuration from the first configuration file found, or
    /// the defaults when there is none.
    pub fn load() -> Result<Self, Error> {
        match Self::find_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load the configuration from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let Ok(data) = read_to_string(path) else {
            debug!("No configuration at {}", path.display());
            return Ok(Self::default());
        };

        let config: Config = toml::from_str(&data)
            .map_err(|e| Error::InvalidConfig(path.to_path_buf(), e.message().to_owned()))?;
        debug!("Config from {}: {:#?}", path.display(), &config);

        Ok(config)
    }

    /// Look in the current directory, its parent, then the user's config
    /// directory.
    fn find_config_path() -> Option<PathBuf> {
        let user_dir = ProjectDirs::from("rs", "boardflash", "boardflash")
            .map(|dirs| dirs.config_dir().to_path_buf());

        search_config_path(std::env::current_dir().ok().as_deref(), user_dir)
    }
}

/// First existing config file in `dir` or its parent, falling back to the
/// (possibly absent) file in `user_dir`.
fn search_config_path(dir: Option<&Path>, user_dir: Option<PathBuf>) -> Option<PathBuf> {
    let local = dir
        .iter()
        .flat_map(|dir| [Some(*dir), dir.parent()])
        .flatten()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|path| path.exists());

    local.or_else(|| user_dir.map(|dir| dir.join(CONFIG_FILE)))
}
