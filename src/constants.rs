/// Constants module to avoid magic strings in the codebase

// Application identity (used for platform config/cache directories)
pub const APP_NAME: &str = "cacher";

// Stats file
pub const STATS_FILE_EXTENSION: &str = "json";

// Temp files written inside a cache directory before being renamed into place
pub const STAGING_PREFIX: &str = ".cacher-staging-";

// Default layout under the platform cache directory
pub const DEFAULT_CACHES_DIR: &str = "caches";

// Configuration
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const LOCAL_CONFIG_PATH: &str = ".cacher/config.toml";
pub const ENV_PREFIX: &str = "CACHER_";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

// Filter logic spellings
pub const LOGIC_AND: &str = "and";
pub const LOGIC_OR: &str = "or";
