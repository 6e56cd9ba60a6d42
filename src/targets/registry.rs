//! Target registry: ordered application groups plus dynamic tree, user and
//! group targets.
//!
//! Targets live in one arena and are reachable from three roots. The app root
//! holds application group targets in configuration order followed by tree
//! fallback targets; the user and group roots grow as new uids and gids show
//! up. Targets are never removed.

use ahash::AHashMap as HashMap;
use tracing::debug;

use crate::error::RuleError;
use crate::process::ProcessRecord;
use crate::targets::rule::MatchRule;
use crate::targets::users::{group_name, user_name};
use crate::targets::{Target, TargetId, TargetKind};

#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: Vec<Target>,
    apps_root: Vec<TargetId>,
    users_root: Vec<TargetId>,
    groups_root: Vec<TargetId>,
    app_by_name: HashMap<String, TargetId>,
    tree_by_name: HashMap<String, TargetId>,
    by_uid: HashMap<u32, TargetId>,
    by_gid: HashMap<u32, TargetId>,
    assignment_attempts: u64,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, target: Target) -> TargetId {
        let id = TargetId(self.targets.len() as u32);
        self.targets.push(target);
        id
    }

    /// Appends a rule for group `name`. The first rule of a group becomes its
    /// reporting target; later rules alias to it. Names starting with `-`
    /// are hidden from listings.
    pub fn add_app_group(&mut self, name: &str, token: &str) -> Result<TargetId, RuleError> {
        let (hidden, name) = match name.trim().strip_prefix('-') {
            Some(rest) => (true, rest.trim()),
            None => (false, name.trim()),
        };
        if name.is_empty() {
            return Err(RuleError::EmptyGroupName);
        }

        let rule = MatchRule::parse(name, token)?;
        let mut target = Target::new(name, TargetKind::AppGroup);
        target.rule = Some(rule);
        target.hidden = hidden;
        target.alias = self.app_by_name.get(name).copied();

        let id = self.push(target);
        self.apps_root.push(id);
        self.app_by_name.entry(name.to_string()).or_insert(id);
        Ok(id)
    }

    /// Existing or new tree fallback target called `name`.
    pub fn tree_target(&mut self, name: &str) -> TargetId {
        if let Some(&id) = self.tree_by_name.get(name) {
            return id;
        }
        let id = self.push(Target::new(name, TargetKind::Tree));
        self.apps_root.push(id);
        self.tree_by_name.insert(name.to_string(), id);
        debug!("Created tree target '{}'", name);
        id
    }

    /// Existing or new target for user `uid`.
    pub fn user_target(&mut self, uid: u32) -> TargetId {
        if let Some(&id) = self.by_uid.get(&uid) {
            return id;
        }
        let mut target = Target::new(&user_name(uid), TargetKind::User);
        target.uid = Some(uid);
        let id = self.push(target);
        self.users_root.push(id);
        self.by_uid.insert(uid, id);
        id
    }

    /// Existing or new target for group `gid`.
    pub fn group_target(&mut self, gid: u32) -> TargetId {
        if let Some(&id) = self.by_gid.get(&gid) {
            return id;
        }
        let mut target = Target::new(&group_name(gid), TargetKind::Group);
        target.gid = Some(gid);
        let id = self.push(target);
        self.groups_root.push(id);
        self.by_gid.insert(gid, id);
        id
    }

    pub fn get(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(id.index())
    }

    pub fn get_mut(&mut self, id: TargetId) -> Option<&mut Target> {
        self.targets.get_mut(id.index())
    }

    pub fn contains(&self, id: TargetId) -> bool {
        id.index() < self.targets.len()
    }

    /// Follows `alias` to the reporting target.
    pub fn resolve(&self, id: TargetId) -> TargetId {
        let mut current = id;
        // aliases are one level deep when built by add_app_group; the bound
        // stops a hand-built cycle
        for _ in 0..self.targets.len() {
            match self.get(current).and_then(Target::alias) {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }
        current
    }

    /// Reporting target of the first application group rule matching `p`.
    ///
    /// Counts one assignment attempt. Process managers never match. On a
    /// match `p.matched_by_rule` is set.
    pub fn match_process(&mut self, p: &mut ProcessRecord) -> Option<TargetId> {
        self.assignment_attempts += 1;

        if p.is_process_manager {
            return None;
        }

        let matched = self.apps_root.iter().copied().find(|&id| {
            self.targets[id.index()].kind == TargetKind::AppGroup
                && self.targets[id.index()]
                    .rule
                    .as_ref()
                    .is_some_and(|rule| rule.matches(p))
        })?;

        p.matched_by_rule = true;
        Some(self.resolve(matched))
    }

    /// Number of match attempts since the registry was created.
    pub fn assignment_attempts(&self) -> u64 {
        self.assignment_attempts
    }

    /// Zeroes every target reachable from `root`, returning how many there were.
    fn reset_root(targets: &mut [Target], root: &[TargetId]) -> usize {
        for id in root {
            targets[id.index()].reset();
        }
        root.len()
    }

    /// Zeroes every target in every root. Returns the app root size.
    pub fn reset_all(&mut self) -> usize {
        let apps = Self::reset_root(&mut self.targets, &self.apps_root);
        Self::reset_root(&mut self.targets, &self.users_root);
        Self::reset_root(&mut self.targets, &self.groups_root);
        apps
    }

    pub fn apps_targets(&self) -> impl Iterator<Item = (TargetId, &Target)> {
        self.apps_root.iter().map(|&id| (id, &self.targets[id.index()]))
    }

    pub fn user_targets(&self) -> impl Iterator<Item = (TargetId, &Target)> {
        self.users_root.iter().map(|&id| (id, &self.targets[id.index()]))
    }

    pub fn group_targets(&self) -> impl Iterator<Item = (TargetId, &Target)> {
        self.groups_root.iter().map(|&id| (id, &self.targets[id.index()]))
    }

    /// Reporting targets of the app root: application groups that are not
    /// aliases, plus tree targets.
    pub fn reporting_apps_targets(&self) -> impl Iterator<Item = (TargetId, &Target)> {
        self.apps_targets().filter(|(_, t)| t.alias.is_none())
    }

    /// First reporting application group called `name`.
    pub fn app_group(&self, name: &str) -> Option<&Target> {
        self.app_by_name.get(name).and_then(|&id| self.get(id))
    }

    pub fn tree(&self, name: &str) -> Option<&Target> {
        self.tree_by_name.get(name).and_then(|&id| self.get(id))
    }

    pub fn user(&self, uid: u32) -> Option<&Target> {
        self.by_uid.get(&uid).and_then(|&id| self.get(id))
    }

    pub fn group(&self, gid: u32) -> Option<&Target> {
        self.by_gid.get(&gid).and_then(|&id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(comm: &str) -> ProcessRecord {
        ProcessRecord::new(100, comm)
    }

    #[test]
    fn test_first_match_wins_over_more_specific_rule() {
        let mut reg = TargetRegistry::new();
        let broad = reg.add_app_group("databases", "post*").unwrap();
        reg.add_app_group("postgres", "postgres").unwrap();

        let mut p = process("postgres");
        assert_eq!(reg.match_process(&mut p), Some(broad));
        assert!(p.matched_by_rule);
    }

    #[test]
    fn test_alias_resolves_to_first_rule_of_group() {
        let mut reg = TargetRegistry::new();
        let web = reg.add_app_group("web", "nginx").unwrap();
        let second = reg.add_app_group("web", "httpd*").unwrap();

        assert_eq!(reg.get(second).unwrap().alias(), Some(web));
        let mut p = process("httpd-worker");
        assert_eq!(reg.match_process(&mut p), Some(web));
        assert_eq!(reg.reporting_apps_targets().count(), 1);
    }

    #[test]
    fn test_no_match_leaves_flag_clear_and_counts_attempt() {
        let mut reg = TargetRegistry::new();
        reg.add_app_group("web", "nginx").unwrap();

        let mut p = process("sshd");
        assert_eq!(reg.match_process(&mut p), None);
        assert!(!p.matched_by_rule);
        assert_eq!(reg.assignment_attempts(), 1);
    }

    #[test]
    fn test_process_manager_never_matches() {
        let mut reg = TargetRegistry::new();
        reg.add_app_group("system", "systemd").unwrap();

        let mut p = process("systemd");
        p.is_process_manager = true;
        assert_eq!(reg.match_process(&mut p), None);
        assert!(!p.matched_by_rule);
        assert_eq!(reg.assignment_attempts(), 1);
    }

    #[test]
    fn test_hidden_group_and_empty_name() {
        let mut reg = TargetRegistry::new();
        let id = reg.add_app_group("-kernel", "kworker*").unwrap();
        let t = reg.get(id).unwrap();
        assert!(t.is_hidden());
        assert_eq!(t.name(), "kernel");

        assert!(matches!(
            reg.add_app_group(" - ", "x"),
            Err(RuleError::EmptyGroupName)
        ));
    }

    #[test]
    fn test_dynamic_targets_are_reused() {
        let mut reg = TargetRegistry::new();
        let a = reg.user_target(4_000_000_010);
        let b = reg.user_target(4_000_000_010);
        let g = reg.group_target(4_000_000_010);
        let t1 = reg.tree_target("bash");
        let t2 = reg.tree_target("bash");

        assert_eq!(a, b);
        assert_ne!(a, g);
        assert_eq!(t1, t2);
        assert_eq!(reg.user_targets().count(), 1);
        assert_eq!(reg.group_targets().count(), 1);
        assert_eq!(reg.apps_targets().count(), 1);
        assert_eq!(reg.get(a).unwrap().uid(), Some(4_000_000_010));
        assert_eq!(reg.get(a).unwrap().name(), "4000000010");
    }

    #[test]
    fn test_tree_targets_are_never_matched_by_rules() {
        let mut reg = TargetRegistry::new();
        reg.tree_target("nginx");
        let mut p = process("nginx");
        assert_eq!(reg.match_process(&mut p), None);
    }
}
