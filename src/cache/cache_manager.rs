use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::file_cache::{validate_name, Cache};
use super::stats_file::StatsFile;
use super::types::StatsOptions;
use super::Result;
use crate::constants::{APP_NAME, DEFAULT_CACHES_DIR};
use crate::utils::CacherError;

/// Registry of named caches under one root directory
///
/// Holds no live `Cache` instances; every lookup constructs a fresh one
/// from whatever was last saved on disk.
#[derive(Debug, Clone)]
pub struct CacheManager {
    root_location: PathBuf,
    options: StatsOptions,
}

impl CacheManager {
    /// Create a manager rooted at `root_location`
    pub fn new(root_location: impl Into<PathBuf>) -> Self {
        Self::with_options(root_location, StatsOptions::default())
    }

    pub fn with_options(root_location: impl Into<PathBuf>, options: StatsOptions) -> Self {
        Self {
            root_location: root_location.into(),
            options,
        }
    }

    /// Platform cache directory (~/.cache/cacher/caches on Linux)
    pub fn default_root() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
            return Ok(proj_dirs.cache_dir().join(DEFAULT_CACHES_DIR));
        }
        // Fallback to ~/.cache/cacher/caches
        let home = std::env::var("HOME")
            .map_err(|_| CacherError::ConfigError("Could not determine home directory".into()))?;
        Ok(PathBuf::from(home)
            .join(".cache")
            .join(APP_NAME)
            .join(DEFAULT_CACHES_DIR))
    }

    pub fn root_location(&self) -> &Path {
        &self.root_location
    }

    pub fn cache_exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.root_location.join(name).is_dir()
    }

    /// Create the directory for a new cache
    ///
    /// An existing cache is an error unless `overwrite` is set, in which case
    /// its contents are cleared.
    pub fn initiate_new_cache(&self, name: &str, overwrite: bool) -> Result<Cache> {
        validate_name(name)?;
        let dir = self.root_location.join(name);

        if dir.is_dir() {
            if !overwrite {
                return Err(CacherError::CacheAlreadyExists(name.to_string()));
            }
            fs::remove_dir_all(&dir)?;
            info!("Cleared existing cache '{}'", name);
        }

        fs::create_dir_all(&dir)?;
        info!("Initiated cache '{}' at {}", name, dir.display());
        Cache::open(&self.root_location, name, self.options)
    }

    pub fn get_cache(&self, name: &str) -> Result<Cache> {
        Cache::open(&self.root_location, name, self.options)
    }

    pub fn get_or_initiate_cache(&self, name: &str) -> Result<Cache> {
        if self.cache_exists(name) {
            self.get_cache(name)
        } else {
            self.initiate_new_cache(name, false)
        }
    }

    /// Names of every cache directory under the root, sorted
    pub fn list_caches(&self) -> Result<Vec<String>> {
        if !self.root_location.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root_location)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete a cache directory with everything in it
    pub fn remove_cache(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let dir = self.root_location.join(name);
        if !dir.is_dir() {
            return Err(CacherError::CacheNotFound(dir));
        }
        fs::remove_dir_all(&dir)?;
        info!("Removed cache '{}'", name);
        Ok(())
    }

    /// Location of a cache's stats file, whether or not it exists yet
    pub fn stats_file_path(&self, name: &str) -> PathBuf {
        StatsFile::path_for(&self.root_location.join(name), name)
    }
}
