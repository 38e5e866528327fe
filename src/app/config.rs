use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::{CacheManager, StatsOptions};
use crate::constants::{APP_NAME, CONFIG_FILE_NAME, DEFAULT_LOG_LEVEL, ENV_PREFIX, LOCAL_CONFIG_PATH};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Cache storage configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cache storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one sub-directory per cache (platform cache dir if unset)
    pub root_location: Option<PathBuf>,
    /// Pretty-print stats files
    pub pretty_stats: bool,
    /// Write stats files via temp file + rename
    pub atomic_writes: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let options = StatsOptions::default();
        Self {
            root_location: None,
            pretty_stats: options.pretty,
            atomic_writes: options.atomic,
        }
    }
}

impl CacheConfig {
    pub fn stats_options(&self) -> StatsOptions {
        StatsOptions {
            pretty: self.pretty_stats,
            atomic: self.atomic_writes,
        }
    }

    /// Build a manager, with `root_override` taking precedence over the config
    pub fn manager(&self, root_override: Option<PathBuf>) -> Result<CacheManager> {
        let root = match root_override.or_else(|| self.root_location.clone()) {
            Some(root) => root,
            None => CacheManager::default_root()?,
        };
        Ok(CacheManager::with_options(root, self.stats_options()))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Build the layered figment without touching the filesystem
fn build_figment(global: Option<&Path>, local: Option<&Path>, explicit: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    for path in [global, local].into_iter().flatten() {
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }
    }

    if let Some(path) = explicit {
        figment = figment.merge(Toml::file(path));
    }

    // CACHER_CACHE__ROOT_LOCATION=/srv/caches
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load configuration from multiple sources
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let global_config = get_config_dir().ok().map(|dir| dir.join(CONFIG_FILE_NAME));
    let local_config = PathBuf::from(LOCAL_CONFIG_PATH);

    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
    }

    build_figment(global_config.as_deref(), Some(&local_config), explicit)
        .extract()
        .context("Failed to load configuration")
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
        Ok(proj_dirs.config_dir().to_path_buf())
    } else {
        // Fallback to home directory
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        Ok(PathBuf::from(home).join(".config").join(APP_NAME))
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p,
        None => get_config_dir()?.join(CONFIG_FILE_NAME),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(path)
}

/// Create a default configuration file if it doesn't exist
pub fn init_config(path: Option<PathBuf>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p,
        None => get_config_dir()?.join(CONFIG_FILE_NAME),
    };

    if !path.exists() {
        save_config(&Config::default(), Some(path.clone()))?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.cache.root_location.is_none());
        assert!(config.cache.pretty_stats);
        assert!(config.cache.atomic_writes);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_layering_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "global.toml",
                r#"
                [cache]
                root_location = "/srv/global"
                pretty_stats = false
                atomic_writes = true

                [logging]
                level = "info"
                "#,
            )?;
            jail.create_file(
                "local.toml",
                r#"
                [cache]
                root_location = "/srv/local"
                pretty_stats = false
                atomic_writes = true
                "#,
            )?;
            jail.set_env("CACHER_LOGGING__LEVEL", "debug");

            let config: Config = build_figment(
                Some(Path::new("global.toml")),
                Some(Path::new("local.toml")),
                None,
            )
            .extract()?;

            assert_eq!(config.cache.root_location, Some(PathBuf::from("/srv/local")));
            assert!(!config.cache.pretty_stats);
            assert_eq!(config.logging.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_missing_layers_are_skipped() {
        Jail::expect_with(|_jail| {
            let config: Config = build_figment(Some(Path::new("absent.toml")), None, None).extract()?;
            assert!(config.cache.atomic_writes);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_missing_file_errors() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_config(Some(&temp_dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_save_and_init_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.cache.root_location = Some(PathBuf::from("/data/caches"));
        config.logging.level = "info".to_string();
        save_config(&config, Some(path.clone())).unwrap();

        // init must not clobber an existing file
        init_config(Some(path.clone())).unwrap();

        let loaded: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.cache.root_location, Some(PathBuf::from("/data/caches")));
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn test_manager_prefers_override() {
        let mut config = CacheConfig::default();
        config.root_location = Some(PathBuf::from("/from/config"));
        config.atomic_writes = false;

        let manager = config.manager(Some(PathBuf::from("/from/flag"))).unwrap();
        assert_eq!(manager.root_location(), Path::new("/from/flag"));

        let manager = config.manager(None).unwrap();
        assert_eq!(manager.root_location(), Path::new("/from/config"));
    }
}
