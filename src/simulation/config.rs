//! Locating and watching a scenery package's `groundtraffic.txt`

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::parser::ConfigError;

pub const CONFIG_FILE: &str = "groundtraffic.txt";

/// Result of a reload attempt
#[derive(Debug)]
pub enum ReloadOutcome {
    /// File not modified since the last successful load
    Unchanged,
    Reloaded,
    /// The load failed and the airport was cleared
    Failed(ConfigError),
}

impl ReloadOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ReloadOutcome::Failed(_))
    }
}

/// Find `groundtraffic.txt` in a package directory, matching the file name
/// case-insensitively
pub fn locate_config(package: &Path) -> Result<PathBuf, ConfigError> {
    if !package.is_dir() {
        return Err(ConfigError::MissingPackage(package.to_path_buf()));
    }
    let direct = package.join(CONFIG_FILE);
    if direct.is_file() {
        return Ok(direct);
    }

    let entries = fs::read_dir(package).map_err(|source| ConfigError::Unreadable {
        path: package.to_path_buf(),
        source,
    })?;
    for entry in entries.flatten() {
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.eq_ignore_ascii_case(CONFIG_FILE));
        if matches && entry.path().is_file() {
            return Ok(entry.path());
        }
    }
    Err(ConfigError::NotFound(package.to_path_buf()))
}

/// A config file that changed since it was last loaded
#[derive(Debug)]
pub struct ChangedConfig {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
    pub text: String,
}

/// Remembers the modification time of the last successfully loaded file
#[derive(Debug, Clone, Default)]
pub struct ConfigWatcher {
    loaded: Option<(PathBuf, Option<SystemTime>)>,
}

impl ConfigWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the package's config if it differs from the last loaded one.
    /// Returns `None` when unchanged.
    pub fn check(&self, package: &Path) -> Result<Option<ChangedConfig>, ConfigError> {
        let path = locate_config(package)?;
        let unreadable = |source| ConfigError::Unreadable {
            path: path.clone(),
            source,
        };
        let modified = fs::metadata(&path).map_err(unreadable)?.modified().ok();

        if let Some((loaded_path, loaded_modified)) = &self.loaded {
            if *loaded_path == path && modified.is_some() && *loaded_modified == modified {
                return Ok(None);
            }
        }

        // Hand-edited files are often Latin-1; only ASCII matters to the parser
        let bytes = fs::read(&path).map_err(unreadable)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Some(ChangedConfig {
            path,
            modified,
            text,
        }))
    }

    /// Record a successful load
    pub fn commit(&mut self, changed: &ChangedConfig) {
        self.loaded = Some((changed.path.clone(), changed.modified));
    }

    /// Forget the last load so the next check always reads the file
    pub fn forget(&mut self) {
        self.loaded = None;
    }
}
