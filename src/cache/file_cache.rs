use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::filter;
use super::stats_file::StatsFile;
use super::types::{
    AddFileOptions, AddStatus, CacheStats, FileFilter, FileLocation, FileRecord, Metadata,
    QueryResult, RemoveStatus, StatsOptions, UpdateStatus,
};
use super::Result;
use crate::constants::STAGING_PREFIX;
use crate::utils::CacherError;

/// One named cache: a directory of copied files plus its stats file
#[derive(Debug)]
pub struct Cache {
    name: String,
    dir: PathBuf,
    stats: StatsFile,
}

/// Reject names that are empty, contain path separators, or are `.`/`..`
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(CacherError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Delete staged copies left behind by an interrupted add or save
///
/// Assumes a single writer per cache directory.
fn sweep_staging_files(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not scan {} for staging files: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let is_staged = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(STAGING_PREFIX));
        if !is_staged || !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => debug!("Removed stale staging file {}", entry.path().display()),
            Err(e) => warn!("Could not remove {}: {}", entry.path().display(), e),
        }
    }
}

impl Cache {
    /// Open the cache at `<root>/<name>/`; the directory must already exist
    pub fn open(root: &Path, name: &str, options: StatsOptions) -> Result<Self> {
        validate_name(name)?;
        let dir = root.join(name);
        if !dir.is_dir() {
            return Err(CacherError::CacheNotFound(dir));
        }

        sweep_staging_files(&dir);
        let stats = StatsFile::load(&dir, name, options);
        Ok(Self {
            name: name.to_string(),
            dir,
            stats,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `location` into the cache and register it
    ///
    /// The copy is staged in a temp file and only renamed into place after
    /// the stats file has been saved, so a failure leaves neither an orphaned
    /// file nor a dangling record.
    pub fn add_file<S: AsRef<str>>(
        &mut self,
        location: &Path,
        metadata: Metadata,
        groups: &[S],
        options: AddFileOptions,
    ) -> AddStatus {
        match self.try_add_file(location, metadata, groups, &options) {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to add {} to cache '{}': {}", location.display(), self.name, e);
                AddStatus::Unknown
            }
        }
    }

    fn try_add_file<S: AsRef<str>>(
        &mut self,
        location: &Path,
        metadata: Metadata,
        groups: &[S],
        options: &AddFileOptions,
    ) -> Result<AddStatus> {
        if !location.is_file() {
            return Ok(AddStatus::InputFileNotExist);
        }

        let name = match &options.new_name {
            Some(name) => name.clone(),
            None => location
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| CacherError::InvalidName(location.display().to_string()))?,
        };
        self.validate_entry_name(&name)?;

        if self.stats.has_file(&name) && !options.overwrite {
            return Ok(AddStatus::FileAlreadyExists);
        }

        let mut source = File::open(location)?;
        let permissions = source.metadata()?.permissions();
        let mut staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.dir)?;
        let size = io::copy(&mut source, staged.as_file_mut())?;
        fs::set_permissions(staged.path(), permissions)?;

        let snapshot = self.stats.clone();
        self.stats.add_file(&name, metadata, groups, size);
        if let Err(e) = self.stats.save_file() {
            self.stats = snapshot;
            return Err(e);
        }

        if let Err(e) = staged.persist(self.dir.join(&name)) {
            self.stats = snapshot;
            if let Err(save_err) = self.stats.save_file() {
                warn!("Could not restore stats for cache '{}': {}", self.name, save_err);
            }
            return Err(e.error.into());
        }

        debug!("Cached {} as '{}' ({} bytes)", location.display(), name, size);
        Ok(AddStatus::Ok)
    }

    fn validate_entry_name(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        if self.dir.join(name) == self.stats.path() || name.starts_with(STAGING_PREFIX) {
            return Err(CacherError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    /// Apply a mutation and save; the in-memory state is rolled back if the
    /// save fails. Returns false without saving when `mutate` does.
    fn commit<F>(&mut self, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut StatsFile) -> bool,
    {
        let snapshot = self.stats.clone();
        if !mutate(&mut self.stats) {
            return Ok(false);
        }
        if let Err(e) = self.stats.save_file() {
            self.stats = snapshot;
            return Err(e);
        }
        Ok(true)
    }

    fn update_status(changed: bool) -> UpdateStatus {
        if changed {
            UpdateStatus::Ok
        } else {
            UpdateStatus::FileDoesntExist
        }
    }

    /// Merge metadata into a tracked file's mapping
    pub fn add_metadata_to_file(
        &mut self,
        name: &str,
        metadata: Metadata,
    ) -> Result<UpdateStatus> {
        let changed = self.commit(|stats| stats.add_metadata(name, metadata))?;
        debug!("add_metadata_to_file '{}': {}", name, changed);
        Ok(Self::update_status(changed))
    }

    pub fn add_file_to_group<S: AsRef<str>>(
        &mut self,
        name: &str,
        groups: &[S],
    ) -> Result<UpdateStatus> {
        let changed = self.commit(|stats| stats.add_to_group(name, groups))?;
        debug!("add_file_to_group '{}': {}", name, changed);
        Ok(Self::update_status(changed))
    }

    pub fn remove_metadata<S: AsRef<str>>(
        &mut self,
        name: &str,
        keys: &[S],
    ) -> Result<UpdateStatus> {
        let changed = self.commit(|stats| stats.remove_metadata(name, keys))?;
        Ok(Self::update_status(changed))
    }

    pub fn remove_group<S: AsRef<str>>(
        &mut self,
        name: &str,
        groups: &[S],
    ) -> Result<UpdateStatus> {
        let changed = self.commit(|stats| stats.remove_group(name, groups))?;
        Ok(Self::update_status(changed))
    }

    /// Unlink a tracked file and drop its record
    ///
    /// The backing file goes first; if that fails the record is kept.
    pub fn remove_file(&mut self, name: &str) -> RemoveStatus {
        match self.try_remove_file(name) {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to remove '{}' from cache '{}': {}", name, self.name, e);
                RemoveStatus::Unknown
            }
        }
    }

    fn try_remove_file(&mut self, name: &str) -> Result<RemoveStatus> {
        if !self.stats.has_file(name) {
            return Ok(RemoveStatus::FileDoesntExist);
        }
        self.validate_entry_name(name)?;

        match fs::remove_file(self.dir.join(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("'{}' was already missing from disk", name);
            }
            Err(e) => return Err(e.into()),
        }

        self.commit(|stats| stats.remove_file(name))?;
        debug!("Removed '{}' from cache '{}'", name, self.name);
        Ok(RemoveStatus::Ok)
    }

    /// Remove several files, returning one status per name in order
    pub fn remove_files<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<RemoveStatus> {
        names
            .iter()
            .map(|name| self.remove_file(name.as_ref()))
            .collect()
    }

    /// Files whose name contains `substring`
    pub fn get_files(&self, substring: &str) -> QueryResult {
        self.build_result(self.stats.match_files(substring))
    }

    pub fn get_files_with_filter(&self, file_filter: &FileFilter) -> QueryResult {
        let groups = self.stats.groups();
        let names = self
            .stats
            .iter_metadata()
            .filter(|(name, metadata)| filter::matches(file_filter, name, metadata, groups))
            .map(|(name, _)| name.to_string())
            .collect();
        self.build_result(names)
    }

    /// Members of a group, or `None` if it has none
    pub fn get_files_in_group(&self, group: &str) -> Option<Vec<String>> {
        self.stats.get_group(group)
    }

    pub fn get_metadata(&self, name: &str, key: &str) -> Option<String> {
        self.stats
            .get_metadata(name)
            .and_then(|metadata| metadata.get(key))
            .cloned()
    }

    pub fn get_all_metadata(&self, name: &str) -> Option<Metadata> {
        self.stats.get_metadata(name).cloned()
    }

    pub fn get_files_with_metadata_key(&self, key: &str) -> QueryResult {
        self.build_result(self.stats.get_files_that_have_metadata_key(key))
    }

    pub fn get_files_where_metadata_value_matches(&self, key: &str, value: &str) -> QueryResult {
        let names = self
            .stats
            .iter_metadata()
            .filter(|(_, metadata)| metadata.get(key).is_some_and(|v| v == value))
            .map(|(name, _)| name.to_string())
            .collect();
        self.build_result(names)
    }

    pub fn get_file(&self, name: &str) -> Option<FileRecord> {
        self.stats.get_file(name)
    }

    /// On-disk location of a tracked file
    pub fn file_path(&self, name: &str) -> Option<PathBuf> {
        self.stats.has_file(name).then(|| self.dir.join(name))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.name.clone(),
            file_count: self.stats.get_all_files().len(),
            group_count: self.stats.groups().group_names().len(),
            total_size: self.stats.total_size(),
            cache_directory: self.dir.clone(),
        }
    }

    fn build_result(&self, names: Vec<String>) -> QueryResult {
        let more_info = names
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    FileLocation {
                        dir: self.dir.clone(),
                        path_to_file: self.dir.join(name),
                    },
                )
            })
            .collect();

        QueryResult {
            count: names.len(),
            names,
            more_info,
        }
    }
}
