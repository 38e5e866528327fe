use super::groups::GroupsManager;
use super::types::{FileFilter, FilterLogic, GroupFilter, Metadata, MetadataFilter};

/// Decide whether one record satisfies a combined filter
///
/// Names use OR across substrings; groups and metadata use their own logic;
/// the three categories are ANDed.
pub fn matches(filter: &FileFilter, name: &str, metadata: &Metadata, groups: &GroupsManager) -> bool {
    matches_names(&filter.names, name)
        && filter
            .groups
            .as_ref()
            .map_or(true, |g| matches_groups(g, name, groups))
        && filter
            .metadata
            .as_ref()
            .map_or(true, |m| matches_metadata(m, metadata))
}

fn matches_names(substrings: &[String], name: &str) -> bool {
    substrings.is_empty() || substrings.iter().any(|s| name.contains(s.as_str()))
}

fn matches_groups(filter: &GroupFilter, name: &str, groups: &GroupsManager) -> bool {
    if filter.groups.is_empty() {
        return true;
    }
    let mut member = filter.groups.iter().map(|g| groups.is_in_group(name, g));
    match filter.logic {
        FilterLogic::And => member.all(|m| m),
        FilterLogic::Or => member.any(|m| m),
    }
}

fn matches_metadata(filter: &MetadataFilter, metadata: &Metadata) -> bool {
    if filter.entries.is_empty() {
        return true;
    }
    let mut hits = filter
        .entries
        .iter()
        .map(|(key, value)| metadata.get(key) == Some(value));
    match filter.logic {
        FilterLogic::And => hits.all(|h| h),
        FilterLogic::Or => hits.any(|h| h),
    }
}
