pub mod app;
pub mod cache;
pub mod cli;
pub mod constants;
pub mod utils;

pub use app::{load_config, Config};
pub use cache::{
    AddFileOptions, AddStatus, Cache, CacheManager, FileFilter, FilterLogic, QueryResult,
    RemoveStatus, UpdateStatus,
};
pub use utils::CacherError;
