use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bidirectional group <-> file membership index
///
/// Both sides are updated together on every add/remove. Empty entries may
/// linger between mutations and are dropped by [`GroupsManager::run_cleanup`],
/// which the stats file runs before every save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsManager {
    #[serde(default)]
    group_to_file: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    file_to_group: BTreeMap<String, Vec<String>>,
}

impl GroupsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `file_name` to every group in `group_names`
    pub fn add_group<S: AsRef<str>>(&mut self, file_name: &str, group_names: &[S]) {
        for group in group_names {
            let group = group.as_ref();
            push_unique(
                self.group_to_file.entry(group.to_string()).or_default(),
                file_name,
            );
            push_unique(
                self.file_to_group.entry(file_name.to_string()).or_default(),
                group,
            );
        }
    }

    /// Remove `file_name` from every group in `group_names`
    pub fn remove_group<S: AsRef<str>>(&mut self, file_name: &str, group_names: &[S]) {
        for group in group_names {
            let group = group.as_ref();
            if let Some(files) = self.group_to_file.get_mut(group) {
                files.retain(|f| f != file_name);
            }
            if let Some(groups) = self.file_to_group.get_mut(file_name) {
                groups.retain(|g| g != group);
            }
        }
    }

    /// Drop every membership of `file_name`
    pub fn remove_file(&mut self, file_name: &str) {
        if let Some(groups) = self.file_to_group.remove(file_name) {
            for group in groups {
                if let Some(files) = self.group_to_file.get_mut(&group) {
                    files.retain(|f| f != file_name);
                }
            }
        }
    }

    pub fn get_all_files_in_group(&self, group_name: &str) -> Option<Vec<String>> {
        self.group_to_file
            .get(group_name)
            .filter(|files| !files.is_empty())
            .cloned()
    }

    pub fn get_all_groups_of_a_file(&self, file_name: &str) -> Option<Vec<String>> {
        self.file_to_group
            .get(file_name)
            .filter(|groups| !groups.is_empty())
            .cloned()
    }

    pub fn group_exists(&self, group_name: &str) -> bool {
        self.group_to_file
            .get(group_name)
            .is_some_and(|files| !files.is_empty())
    }

    pub fn is_in_group(&self, file_name: &str, group_name: &str) -> bool {
        self.file_to_group
            .get(file_name)
            .is_some_and(|groups| groups.iter().any(|g| g == group_name))
    }

    /// Names of all groups with at least one member
    pub fn group_names(&self) -> Vec<String> {
        self.group_to_file
            .iter()
            .filter(|(_, files)| !files.is_empty())
            .map(|(group, _)| group.clone())
            .collect()
    }

    /// Remove every group or file entry whose list is empty
    pub fn run_cleanup(&mut self) {
        self.group_to_file.retain(|_, files| !files.is_empty());
        self.file_to_group.retain(|_, groups| !groups.is_empty());
    }

    /// Drop memberships of files for which `keep` returns false, on both sides
    pub fn retain_files<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.file_to_group.retain(|file, _| keep(file));
        for files in self.group_to_file.values_mut() {
            files.retain(|f| keep(f));
        }
        self.run_cleanup();
    }

    /// Make both sides agree by adding every membership either side records
    /// to the other one
    pub fn make_symmetric(&mut self) {
        let from_groups: Vec<(String, String)> = self
            .group_to_file
            .iter()
            .flat_map(|(group, files)| files.iter().map(move |f| (f.clone(), group.clone())))
            .collect();
        let from_files: Vec<(String, String)> = self
            .file_to_group
            .iter()
            .flat_map(|(file, groups)| groups.iter().map(move |g| (file.clone(), g.clone())))
            .collect();

        for (file, group) in from_groups {
            push_unique(self.file_to_group.entry(file).or_default(), &group);
        }
        for (file, group) in from_files {
            push_unique(self.group_to_file.entry(group).or_default(), &file);
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_group_is_symmetric_and_idempotent() {
        let mut groups = GroupsManager::new();
        groups.add_group("a.pdf", &["monthly", "invoices"]);
        groups.add_group("a.pdf", &["monthly"]);

        assert_eq!(
            groups.get_all_files_in_group("monthly"),
            Some(vec!["a.pdf".to_string()])
        );
        assert_eq!(
            groups.get_all_groups_of_a_file("a.pdf"),
            Some(vec!["monthly".to_string(), "invoices".to_string()])
        );
        assert!(groups.group_exists("invoices"));
        assert!(groups.is_in_group("a.pdf", "invoices"));
    }

    #[test]
    fn test_remove_group_without_membership_is_noop() {
        let mut groups = GroupsManager::new();
        groups.add_group("a.pdf", &["monthly"]);
        groups.remove_group("b.pdf", &["monthly"]);
        groups.remove_group("a.pdf", &["weekly"]);

        assert_eq!(
            groups.get_all_files_in_group("monthly"),
            Some(vec!["a.pdf".to_string()])
        );
    }

    #[test]
    fn test_emptied_group_reports_none_before_and_after_cleanup() {
        let mut groups = GroupsManager::new();
        groups.add_group("a.pdf", &["monthly"]);
        groups.remove_group("a.pdf", &["monthly"]);

        assert_eq!(groups.get_all_files_in_group("monthly"), None);
        assert_eq!(groups.get_all_groups_of_a_file("a.pdf"), None);
        assert!(!groups.group_exists("monthly"));

        groups.run_cleanup();
        assert_eq!(groups, GroupsManager::new());
    }

    #[test]
    fn test_remove_file_clears_both_sides() {
        let mut groups = GroupsManager::new();
        groups.add_group("a.pdf", &["x", "y"]);
        groups.add_group("b.pdf", &["x"]);
        groups.remove_file("a.pdf");
        groups.run_cleanup();

        assert_eq!(groups.get_all_files_in_group("x"), Some(vec!["b.pdf".to_string()]));
        assert!(!groups.group_exists("y"));
        assert_eq!(groups.group_names(), vec!["x".to_string()]);
    }

    #[test]
    fn test_retain_files_drops_unknown_members() {
        let mut groups = GroupsManager::new();
        groups.add_group("kept.pdf", &["x"]);
        groups.add_group("gone.pdf", &["x", "y"]);
        groups.retain_files(|f| f == "kept.pdf");

        assert_eq!(groups.get_all_files_in_group("x"), Some(vec!["kept.pdf".to_string()]));
        assert!(!groups.group_exists("y"));
        assert_eq!(groups.get_all_groups_of_a_file("gone.pdf"), None);
    }

    #[test]
    fn test_make_symmetric_fills_the_missing_side() {
        let mut groups: GroupsManager = serde_json::from_str(
            r#"{
                "groupToFile": {"g": ["a.pdf"]},
                "fileToGroup": {"b.pdf": ["h"], "a.pdf": []}
            }"#,
        )
        .unwrap();
        groups.make_symmetric();

        assert!(groups.is_in_group("a.pdf", "g"));
        assert_eq!(groups.get_all_files_in_group("h"), Some(vec!["b.pdf".to_string()]));
        assert_eq!(groups.get_all_groups_of_a_file("a.pdf"), Some(vec!["g".to_string()]));

        // Already consistent input is left as it was
        let before = groups.clone();
        groups.make_symmetric();
        assert_eq!(groups, before);
    }

    #[test]
    fn test_missing_sides_default_on_deserialize() {
        let groups: GroupsManager = serde_json::from_str("{}").unwrap();
        assert_eq!(groups, GroupsManager::new());

        let groups: GroupsManager =
            serde_json::from_str(r#"{"groupToFile":{"g":["f"]},"fileToGroup":{"f":["g"]}}"#)
                .unwrap();
        assert!(groups.is_in_group("f", "g"));
    }
}
