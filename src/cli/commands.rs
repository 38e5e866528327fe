use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

use crate::app::{init_config, Config};
use crate::cache::{
    AddFileOptions, AddStatus, Cache, CacheManager, FileFilter, Metadata, QueryResult,
    RemoveStatus, UpdateStatus,
};

use super::{Cli, Commands, GroupAction, MetaAction, OutputFormat};

/// Handle a parsed command line
///
/// Returns `Ok(false)` when the command ran but reported a non-`Ok` status,
/// so the binary can exit non-zero.
pub fn handle_command(cli: &Cli, config: &Config) -> Result<bool> {
    let format = cli.output_format;

    let manager = config.cache.manager(cli.root.clone())?;

    match &cli.command {
        Commands::Init { cache, overwrite } => {
            let cache = manager.initiate_new_cache(cache, *overwrite)?;
            emit(format, &json!({ "cache": cache.name(), "dir": cache.dir() }), || {
                format!("{} {}", "Created cache".green(), cache.dir().display())
            })?;
            Ok(true)
        }
        Commands::Add {
            cache,
            file,
            name,
            meta,
            groups,
            overwrite,
        } => {
            let mut cache = manager.get_cache(cache)?;
            let options = AddFileOptions {
                new_name: name.clone(),
                overwrite: *overwrite,
            };
            let status = cache.add_file(file, to_metadata(meta), groups.as_slice(), options);
            let ok = status == AddStatus::Ok;
            print_status(format, &file.display().to_string(), &status, ok)?;
            Ok(ok)
        }
        Commands::Remove { cache, names } => {
            let mut cache = manager.get_cache(cache)?;
            let statuses = cache.remove_files(names.as_slice());
            let mut all_ok = true;
            for (name, status) in names.iter().zip(statuses) {
                let ok = status == RemoveStatus::Ok;
                all_ok &= ok;
                print_status(format, name, &status, ok)?;
            }
            Ok(all_ok)
        }
        Commands::List { cache, substring } => {
            let cache = manager.get_cache(cache)?;
            print_query(format, &cache.get_files(substring.as_deref().unwrap_or_default()))?;
            Ok(true)
        }
        Commands::Query {
            cache,
            names,
            groups,
            group_logic,
            meta,
            meta_logic,
        } => {
            let cache = manager.get_cache(cache)?;
            let mut filter = FileFilter::new();
            filter.names = names.clone();
            if !groups.is_empty() {
                filter = filter.groups(groups.iter().cloned(), *group_logic);
            }
            if !meta.is_empty() {
                filter = filter.metadata(meta.iter().cloned(), *meta_logic);
            }
            print_query(format, &cache.get_files_with_filter(&filter))?;
            Ok(true)
        }
        Commands::Meta { action } => handle_meta(&manager, action, format),
        Commands::Group { action } => handle_group(&manager, action, format),
        Commands::Stats { cache } => {
            let stats = manager.get_cache(cache)?.stats();
            emit(format, &stats, || stats.format())?;
            Ok(true)
        }
        Commands::Caches => {
            let caches = manager.list_caches()?;
            emit(format, &caches, || {
                if caches.is_empty() {
                    format!("No caches under {}", manager.root_location().display())
                } else {
                    caches
                        .iter()
                        .map(|c| format!("  • {}", c.green()))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            })?;
            Ok(true)
        }
        Commands::Drop { cache } => {
            manager.remove_cache(cache)?;
            emit(format, &json!({ "removed": cache }), || {
                format!("{} {}", "Removed cache".yellow(), cache)
            })?;
            Ok(true)
        }
        Commands::Config { init } => show_config(config, *init, cli.config.clone(), format),
    }
}

fn handle_meta(manager: &CacheManager, action: &MetaAction, format: OutputFormat) -> Result<bool> {
    match action {
        MetaAction::Get { cache, file, key } => {
            let cache = manager.get_cache(cache)?;
            match key {
                Some(key) => {
                    let value = cache.get_metadata(file, key);
                    emit(format, &value, || value.clone().unwrap_or_default())?;
                    Ok(value.is_some())
                }
                None => {
                    let metadata = cache.get_all_metadata(file);
                    emit(format, &metadata, || match &metadata {
                        Some(metadata) => metadata
                            .iter()
                            .map(|(k, v)| format!("{}={}", k.cyan(), v))
                            .collect::<Vec<_>>()
                            .join("\n"),
                        None => format!("{} {}", "No such file:".red(), file),
                    })?;
                    Ok(metadata.is_some())
                }
            }
        }
        MetaAction::Set {
            cache,
            file,
            entries,
        } => {
            let mut cache = manager.get_cache(cache)?;
            let status = cache.add_metadata_to_file(file, to_metadata(entries))?;
            report_update(format, file, status)
        }
        MetaAction::Unset { cache, file, keys } => {
            let mut cache = manager.get_cache(cache)?;
            let status = cache.remove_metadata(file, keys.as_slice())?;
            report_update(format, file, status)
        }
        MetaAction::Find { cache, key, value } => {
            let cache = manager.get_cache(cache)?;
            let result = match value {
                Some(value) => cache.get_files_where_metadata_value_matches(key, value),
                None => cache.get_files_with_metadata_key(key),
            };
            print_query(format, &result)?;
            Ok(true)
        }
    }
}

fn handle_group(manager: &CacheManager, action: &GroupAction, format: OutputFormat) -> Result<bool> {
    match action {
        GroupAction::Show { cache, group } => {
            let cache: Cache = manager.get_cache(cache)?;
            let members = cache.get_files_in_group(group);
            emit(format, &members, || match &members {
                Some(members) => members.join("\n"),
                None => format!("{} {}", "Group has no members:".yellow(), group),
            })?;
            Ok(true)
        }
        GroupAction::Add {
            cache,
            file,
            groups,
        } => {
            let mut cache = manager.get_cache(cache)?;
            let status = cache.add_file_to_group(file, groups.as_slice())?;
            report_update(format, file, status)
        }
        GroupAction::Remove {
            cache,
            file,
            groups,
        } => {
            let mut cache = manager.get_cache(cache)?;
            let status = cache.remove_group(file, groups.as_slice())?;
            report_update(format, file, status)
        }
    }
}

fn show_config(
    config: &Config,
    init: bool,
    path: Option<PathBuf>,
    format: OutputFormat,
) -> Result<bool> {
    if init {
        let written = init_config(path)?;
        emit(format, &json!({ "config": written }), || {
            format!("{} {}", "Configuration at".green(), written.display())
        })?;
        return Ok(true);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => print!("{}", toml::to_string_pretty(config)?),
    }
    Ok(true)
}

fn to_metadata(pairs: &[(String, String)]) -> Metadata {
    pairs.iter().cloned().collect()
}

fn report_update(format: OutputFormat, file: &str, status: UpdateStatus) -> Result<bool> {
    let ok = status == UpdateStatus::Ok;
    print_status(format, file, &status, ok)?;
    Ok(ok)
}

fn print_status<S>(format: OutputFormat, subject: &str, status: &S, ok: bool) -> Result<()>
where
    S: Serialize + std::fmt::Display,
{
    emit(format, &json!({ "file": subject, "status": status }), || {
        let label = if ok {
            status.to_string().green()
        } else {
            status.to_string().red()
        };
        format!("[{}] {}", label, subject)
    })
}

fn print_query(format: OutputFormat, result: &QueryResult) -> Result<()> {
    emit(format, result, || {
        let mut lines = vec![format!("{} file(s)", result.count).bold().to_string()];
        for name in &result.names {
            let path = &result.more_info[name].path_to_file;
            lines.push(format!("  {}  {}", name.green(), path.display().to_string().dimmed()));
        }
        lines.join("\n")
    })
}

/// Print `value` as JSON, or the text produced by `text`
fn emit<T, F>(format: OutputFormat, value: &T, text: F) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce() -> String,
{
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", text()),
    }
    Ok(())
}
