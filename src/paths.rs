//! Configuration path resolution.
//!
//! ## Lookup order
//!
//! 1. An explicit `--config` path, used as given.
//! 2. `gdc-kit.yaml` in the current working directory (project-local setups).
//! 3. `<config dir>/gdc-kit/config.yaml`, where the config dir comes from
//!    `dirs::config_dir()` (`~/.config` on Linux, `%APPDATA%` on Windows).
//!
//! A path that does not exist is still returned; the loader falls back to
//! defaults in that case.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name under the platform config dir
const APP_DIR: &str = "gdc-kit";

/// Project-local config file name
const LOCAL_CONFIG: &str = "gdc-kit.yaml";

/// Where the config file was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit,
    WorkingDir,
    UserDir,
}

/// Resolved configuration location
#[derive(Debug, Clone)]
pub struct ConfigPath {
    pub path: PathBuf,
    pub source: ConfigSource,
}

impl ConfigPath {
    /// Resolve against the process working directory and user config dir
    pub fn resolve(explicit: Option<&Path>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::resolve_in(explicit, &cwd, dirs::config_dir())
    }

    fn resolve_in(explicit: Option<&Path>, cwd: &Path, config_dir: Option<PathBuf>) -> Self {
        if let Some(path) = explicit {
            return Self {
                path: path.to_path_buf(),
                source: ConfigSource::Explicit,
            };
        }

        let local = cwd.join(LOCAL_CONFIG);
        if local.exists() {
            debug!("Using project config: {}", local.display());
            return Self {
                path: local,
                source: ConfigSource::WorkingDir,
            };
        }

        // Without a platform config dir, fall back to the working directory
        let path = config_dir
            .map(|dir| dir.join(APP_DIR).join("config.yaml"))
            .unwrap_or(local);
        debug!("Using user config: {}", path.display());

        Self {
            path,
            source: ConfigSource::UserDir,
        }
    }
}
