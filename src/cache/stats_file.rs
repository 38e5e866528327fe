use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::groups::GroupsManager;
use super::types::{FileRecord, Metadata, StatsOptions};
use super::Result;
use crate::constants::{STAGING_PREFIX, STATS_FILE_EXTENSION};
use crate::utils::CacherError;

/// Per-file data persisted in the stats document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default = "Utc::now")]
    added_at: DateTime<Utc>,
    #[serde(default)]
    size: u64,
}

/// On-disk shape: `{ "groups": {...}, "files": { name: {...} } }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StatsDocument {
    #[serde(default)]
    groups: GroupsManager,
    #[serde(default)]
    files: BTreeMap<String, FileEntry>,
}

/// In-memory view of one cache's `<name>.json`
///
/// Mutations only touch memory; [`StatsFile::save_file`] is the single
/// durability point.
#[derive(Debug, Clone)]
pub struct StatsFile {
    path: PathBuf,
    options: StatsOptions,
    document: StatsDocument,
}

impl StatsFile {
    /// Load `<cache_dir>/<cache_name>.json`, falling back to an empty
    /// document when the file is missing, empty or malformed
    pub fn load(cache_dir: &Path, cache_name: &str, options: StatsOptions) -> Self {
        let path = Self::path_for(cache_dir, cache_name);

        let document = match Self::read_document(&path) {
            Ok(Some(document)) => document,
            Ok(None) => StatsDocument::default(),
            Err(e) => {
                warn!("Starting with empty stats: {}", e);
                StatsDocument::default()
            }
        };

        let mut stats = Self {
            path,
            options,
            document,
        };
        stats.reconcile();
        stats
    }

    /// Location of the stats file for a cache
    pub fn path_for(cache_dir: &Path, cache_name: &str) -> PathBuf {
        cache_dir.join(format!("{}.{}", cache_name, STATS_FILE_EXTENSION))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(path: &Path) -> Result<Option<StatsDocument>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| CacherError::StatsFileError {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Bring both sides of the group index into agreement, then drop
    /// memberships of files that have no record
    fn reconcile(&mut self) {
        self.document.groups.make_symmetric();
        let files = &self.document.files;
        self.document
            .groups
            .retain_files(|name| files.contains_key(name));
    }

    /// Run group cleanup, then rewrite the whole document
    pub fn save_file(&mut self) -> Result<()> {
        self.document.groups.run_cleanup();

        let json = if self.options.pretty {
            serde_json::to_string_pretty(&self.document)?
        } else {
            serde_json::to_string(&self.document)?
        };

        if self.options.atomic {
            let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
            let mut tmp = tempfile::Builder::new()
                .prefix(STAGING_PREFIX)
                .tempfile_in(dir)?;
            tmp.write_all(json.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&self.path).map_err(|e| e.error)?;
        } else {
            fs::write(&self.path, json)?;
        }

        debug!(
            "Saved stats file {} ({} files)",
            self.path.display(),
            self.document.files.len()
        );
        Ok(())
    }

    /// Register a file, replacing any existing record of the same name
    pub fn add_file<S: AsRef<str>>(&mut self, name: &str, metadata: Metadata, groups: &[S], size: u64) {
        self.document.groups.remove_file(name);
        self.document.files.insert(
            name.to_string(),
            FileEntry {
                metadata,
                added_at: Utc::now(),
                size,
            },
        );
        self.document.groups.add_group(name, groups);
    }

    /// Remove a record and its memberships, returning whether it existed
    pub fn remove_file(&mut self, name: &str) -> bool {
        let existed = self.document.files.remove(name).is_some();
        self.document.groups.remove_file(name);
        existed
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.document.files.contains_key(name)
    }

    /// Merge `metadata` into a file's mapping; false if the file is unknown
    pub fn add_metadata(&mut self, name: &str, metadata: Metadata) -> bool {
        match self.document.files.get_mut(name) {
            Some(entry) => {
                entry.metadata.extend(metadata);
                true
            }
            None => false,
        }
    }

    /// Remove the given keys from a file's mapping; false if the file is unknown
    pub fn remove_metadata<S: AsRef<str>>(&mut self, name: &str, keys: &[S]) -> bool {
        match self.document.files.get_mut(name) {
            Some(entry) => {
                for key in keys {
                    entry.metadata.remove(key.as_ref());
                }
                true
            }
            None => false,
        }
    }

    pub fn get_metadata(&self, name: &str) -> Option<&Metadata> {
        self.document.files.get(name).map(|entry| &entry.metadata)
    }

    pub fn get_file(&self, name: &str) -> Option<FileRecord> {
        self.document.files.get(name).map(|entry| FileRecord {
            name: name.to_string(),
            metadata: entry.metadata.clone(),
            groups: self
                .document
                .groups
                .get_all_groups_of_a_file(name)
                .unwrap_or_default(),
            added_at: entry.added_at,
            size: entry.size,
        })
    }

    /// Names containing `substring`, in iteration order
    pub fn match_files(&self, substring: &str) -> Vec<String> {
        self.document
            .files
            .keys()
            .filter(|name| name.contains(substring))
            .cloned()
            .collect()
    }

    pub fn get_all_files(&self) -> Vec<String> {
        self.document.files.keys().cloned().collect()
    }

    /// Iterate over names with their metadata, in iteration order
    pub fn iter_metadata(&self) -> impl Iterator<Item = (&str, &Metadata)> {
        self.document
            .files
            .iter()
            .map(|(name, entry)| (name.as_str(), &entry.metadata))
    }

    pub fn total_size(&self) -> u64 {
        self.document.files.values().map(|entry| entry.size).sum()
    }

    pub fn groups(&self) -> &GroupsManager {
        &self.document.groups
    }

    pub fn get_group(&self, group_name: &str) -> Option<Vec<String>> {
        self.document.groups.get_all_files_in_group(group_name)
    }

    /// Add a tracked file to groups; false if the file is unknown
    pub fn add_to_group<S: AsRef<str>>(&mut self, name: &str, groups: &[S]) -> bool {
        if !self.has_file(name) {
            return false;
        }
        self.document.groups.add_group(name, groups);
        true
    }

    /// Remove a tracked file from groups; false if the file is unknown
    pub fn remove_group<S: AsRef<str>>(&mut self, name: &str, groups: &[S]) -> bool {
        if !self.has_file(name) {
            return false;
        }
        self.document.groups.remove_group(name, groups);
        true
    }

    pub fn get_files_that_have_metadata_key(&self, key: &str) -> Vec<String> {
        self.iter_metadata()
            .filter(|(_, metadata)| metadata.contains_key(key))
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let stats = StatsFile::load(temp_dir.path(), "jobs", StatsOptions::default());

        assert!(stats.get_all_files().is_empty());
        assert_eq!(stats.path(), temp_dir.path().join("jobs.json"));
    }

    #[test]
    fn test_malformed_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("jobs.json"), "{not json").unwrap();
        let stats = StatsFile::load(temp_dir.path(), "jobs", StatsOptions::default());
        assert!(stats.get_all_files().is_empty());

        fs::write(temp_dir.path().join("jobs.json"), "   ").unwrap();
        let stats = StatsFile::load(temp_dir.path(), "jobs", StatsOptions::default());
        assert!(stats.get_all_files().is_empty());
    }

    #[test]
    fn test_round_trip_preserves_records_and_groups() {
        let temp_dir = TempDir::new().unwrap();
        let mut stats = StatsFile::load(temp_dir.path(), "jobs", StatsOptions::default());
        stats.add_file("a.pdf", meta(&[("type", "invoice")]), &["monthly"], 10);
        stats.add_file("b.pdf", Metadata::new(), &["monthly", "urgent"], 20);
        stats.save_file().unwrap();

        let reloaded = StatsFile::load(temp_dir.path(), "jobs", StatsOptions::default());
        assert_eq!(reloaded.get_file("a.pdf"), stats.get_file("a.pdf"));
        assert_eq!(reloaded.get_file("b.pdf"), stats.get_file("b.pdf"));
        assert_eq!(
            reloaded.get_group("monthly"),
            Some(vec!["a.pdf".to_string(), "b.pdf".to_string()])
        );
        assert_eq!(reloaded.total_size(), 30);
    }

    #[test]
    fn test_save_twice_is_byte_identical() {
        for options in [
            StatsOptions::default(),
            StatsOptions {
                pretty: false,
                atomic: false,
            },
        ] {
            let temp_dir = TempDir::new().unwrap();
            let mut stats = StatsFile::load(temp_dir.path(), "jobs", options);
            stats.add_file("a.pdf", meta(&[("k", "v")]), &["g"], 1);

            stats.save_file().unwrap();
            let first = fs::read(stats.path()).unwrap();
            stats.save_file().unwrap();
            let second = fs::read(stats.path()).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_save_runs_cleanup() {
        let temp_dir = TempDir::new().unwrap();
        let mut stats = StatsFile::load(temp_dir.path(), "jobs", StatsOptions::default());
        stats.add_file("a.pdf", Metadata::new(), &["g"], 1);
        stats.remove_group("a.pdf", &["g"]);
        stats.save_file().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(stats.path()).unwrap()).unwrap();
        assert_eq!(raw["groups"]["groupToFile"], serde_json::json!({}));
        assert_eq!(raw["groups"]["fileToGroup"], serde_json::json!({}));
        assert!(raw["files"]["a.pdf"].is_object());
    }

    #[test]
    fn test_load_drops_memberships_of_untracked_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("jobs.json"),
            r#"{
                "groups": {
                    "groupToFile": {"g": ["a.pdf", "ghost.pdf"]},
                    "fileToGroup": {"a.pdf": ["g"], "ghost.pdf": ["g"]}
                },
                "files": {"a.pdf": {"metadata": {"k": "v"}}}
            }"#,
        )
        .unwrap();

        let stats = StatsFile::load(temp_dir.path(), "jobs", StatsOptions::default());
        assert_eq!(stats.get_group("g"), Some(vec!["a.pdf".to_string()]));
        assert_eq!(stats.groups().get_all_groups_of_a_file("ghost.pdf"), None);
        assert_eq!(stats.get_metadata("a.pdf"), Some(&meta(&[("k", "v")])));
    }

    #[test]
    fn test_load_repairs_one_sided_group_index() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("jobs.json"),
            r#"{
                "groups": {
                    "groupToFile": {"g": ["a.pdf"]},
                    "fileToGroup": {"b.pdf": ["h"]}
                },
                "files": {"a.pdf": {"metadata": {}}, "b.pdf": {"metadata": {}}}
            }"#,
        )
        .unwrap();

        let mut stats = StatsFile::load(temp_dir.path(), "jobs", StatsOptions::default());
        assert_eq!(stats.get_group("g"), Some(vec!["a.pdf".to_string()]));
        assert!(stats.groups().is_in_group("a.pdf", "g"));
        assert_eq!(stats.get_file("a.pdf").unwrap().groups, vec!["g".to_string()]);
        assert_eq!(stats.get_group("h"), Some(vec!["b.pdf".to_string()]));

        stats.save_file().unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(stats.path()).unwrap()).unwrap();
        assert_eq!(raw["groups"]["fileToGroup"]["a.pdf"], serde_json::json!(["g"]));
        assert_eq!(raw["groups"]["groupToFile"]["h"], serde_json::json!(["b.pdf"]));
    }

    #[test]
    fn test_metadata_mutations() {
        let temp_dir = TempDir::new().unwrap();
        let mut stats = StatsFile::load(temp_dir.path(), "jobs", StatsOptions::default());
        stats.add_file("a.pdf", meta(&[("k1", "v1")]), &[] as &[&str], 1);

        assert!(stats.add_metadata("a.pdf", meta(&[("k2", "v2"), ("k1", "new")])));
        assert_eq!(
            stats.get_metadata("a.pdf"),
            Some(&meta(&[("k1", "new"), ("k2", "v2")]))
        );

        assert!(stats.remove_metadata("a.pdf", &["k1", "missing"]));
        assert_eq!(stats.get_metadata("a.pdf"), Some(&meta(&[("k2", "v2")])));

        assert!(!stats.add_metadata("nope.pdf", Metadata::new()));
        assert!(!stats.remove_metadata("nope.pdf", &["k2"]));
        assert_eq!(stats.get_files_that_have_metadata_key("k2"), vec!["a.pdf".to_string()]);
    }

    #[test]
    fn test_add_file_replaces_existing_record() {
        let temp_dir = TempDir::new().unwrap();
        let mut stats = StatsFile::load(temp_dir.path(), "jobs", StatsOptions::default());
        stats.add_file("a.pdf", meta(&[("old", "1")]), &["old-group"], 1);
        stats.add_file("a.pdf", meta(&[("new", "2")]), &["new-group"], 2);

        let record = stats.get_file("a.pdf").unwrap();
        assert_eq!(record.metadata, meta(&[("new", "2")]));
        assert_eq!(record.groups, vec!["new-group".to_string()]);
        assert_eq!(stats.get_group("old-group"), None);
    }

    #[test]
    fn test_group_ops_require_tracked_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut stats = StatsFile::load(temp_dir.path(), "jobs", StatsOptions::default());
        assert!(!stats.add_to_group("ghost.pdf", &["g"]));
        assert_eq!(stats.get_group("g"), None);

        stats.add_file("a.pdf", Metadata::new(), &[] as &[&str], 1);
        assert!(stats.add_to_group("a.pdf", &["g"]));
        assert!(stats.remove_file("a.pdf"));
        assert!(!stats.remove_file("a.pdf"));
        assert_eq!(stats.get_group("g"), None);
    }
}
