// Gateway module for cache - follows the Train Station Pattern
// All external access must go through this gateway
// Each cache is a directory of copied files plus a `<name>.json` stats file

// Private submodules - not directly accessible from outside
mod cache_manager;
mod file_cache;
mod filter;
mod groups;
mod stats_file;
mod types;

// Public re-exports - the ONLY way to access cache functionality
pub use cache_manager::CacheManager;
pub use file_cache::{validate_name, Cache};
pub use groups::GroupsManager;
pub use stats_file::StatsFile;
pub use types::{
    AddFileOptions, AddStatus, CacheStats, FileFilter, FileLocation, FileRecord, FilterLogic,
    GroupFilter, Metadata, MetadataFilter, QueryResult, RemoveStatus, StatsOptions, UpdateStatus,
};

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, crate::utils::CacherError>;
