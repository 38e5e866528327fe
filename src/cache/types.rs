use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{LOGIC_AND, LOGIC_OR};
use crate::utils::CacherError;

/// Key/value metadata attached to a cached file
pub type Metadata = BTreeMap<String, String>;

/// One file admitted to a cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub name: String,
    pub metadata: Metadata,
    pub groups: Vec<String>,
    pub added_at: DateTime<Utc>,
    pub size: u64,
}

/// Options for `Cache::add_file`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFileOptions {
    /// Name to store the file under instead of the source's base name
    pub new_name: Option<String>,
    /// Replace an existing record with the same name
    pub overwrite: bool,
}

impl AddFileOptions {
    pub fn new_name(mut self, name: impl Into<String>) -> Self {
        self.new_name = Some(name.into());
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Outcome of `Cache::add_file`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddStatus {
    Ok,
    FileAlreadyExists,
    InputFileNotExist,
    Unknown,
}

/// Outcome of `Cache::remove_file`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoveStatus {
    Ok,
    FileDoesntExist,
    Unknown,
}

/// Outcome of metadata and group mutations on a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateStatus {
    Ok,
    FileDoesntExist,
}

impl fmt::Display for AddStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AddStatus::Ok => "Ok",
            AddStatus::FileAlreadyExists => "FileAlreadyExists",
            AddStatus::InputFileNotExist => "InputFileNotExist",
            AddStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

impl fmt::Display for RemoveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoveStatus::Ok => "Ok",
            RemoveStatus::FileDoesntExist => "FileDoesntExist",
            RemoveStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateStatus::Ok => "Ok",
            UpdateStatus::FileDoesntExist => "FileDoesntExist",
        };
        f.write_str(s)
    }
}

/// How multiple criteria within one filter category combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterLogic {
    #[default]
    And,
    Or,
}

impl FromStr for FilterLogic {
    type Err = CacherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            LOGIC_AND => Ok(FilterLogic::And),
            LOGIC_OR => Ok(FilterLogic::Or),
            _ => Err(CacherError::InvalidFilterLogic(s.to_string())),
        }
    }
}

impl fmt::Display for FilterLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterLogic::And => f.write_str(LOGIC_AND),
            FilterLogic::Or => f.write_str(LOGIC_OR),
        }
    }
}

/// Required group memberships
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFilter {
    pub groups: Vec<String>,
    #[serde(default)]
    pub logic: FilterLogic,
}

/// Required metadata key/value pairs (exact string equality)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub entries: Metadata,
    #[serde(default)]
    pub logic: FilterLogic,
}

/// Combined query for `Cache::get_files_with_filter`
///
/// Categories that are present are ANDed together. An empty category
/// (no names, no groups, no entries) places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFilter {
    /// A name matches if it contains any of these substrings
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub groups: Option<GroupFilter>,
    #[serde(default)]
    pub metadata: Option<MetadataFilter>,
}

impl FileFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, substring: impl Into<String>) -> Self {
        self.names.push(substring.into());
        self
    }

    pub fn groups<I, S>(mut self, groups: I, logic: FilterLogic) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = Some(GroupFilter {
            groups: groups.into_iter().map(Into::into).collect(),
            logic,
        });
        self
    }

    pub fn metadata<I, K, V>(mut self, entries: I, logic: FilterLogic) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata = Some(MetadataFilter {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            logic,
        });
        self
    }
}

/// Where a matched file lives on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLocation {
    pub dir: PathBuf,
    pub path_to_file: PathBuf,
}

/// Result of every multi-file query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub count: usize,
    /// Matches in stats-file iteration order (sorted by name)
    pub names: Vec<String>,
    pub more_info: BTreeMap<String, FileLocation>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.more_info.contains_key(name)
    }
}

/// How the stats file is written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsOptions {
    /// Pretty-print the JSON document
    pub pretty: bool,
    /// Write to a temp file in the cache directory and rename over the target
    pub atomic: bool,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            atomic: true,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub name: String,
    pub file_count: usize,
    pub group_count: usize,
    pub total_size: u64,
    pub cache_directory: PathBuf,
}

impl CacheStats {
    /// Format cache stats for display
    pub fn format(&self) -> String {
        format!(
            "Cache '{}':\n\
            Directory: {}\n\
            Files: {}\n\
            Groups: {}\n\
            Total Size: {:.2} MB",
            self.name,
            self.cache_directory.display(),
            self.file_count,
            self.group_count,
            self.total_size as f64 / 1_048_576.0,
        )
    }
}
