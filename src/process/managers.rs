//! Process-manager detection.
//!
//! Init systems, supervisors and container shims start processes on behalf of
//! unrelated applications. They never match application group rules and the
//! classifier does not inherit targets across them.

use tracing::warn;

use crate::targets::pattern::{has_wildcards, SimplePattern};

/// Names treated as process managers when the configuration has none.
pub const DEFAULT_MANAGERS: &[&str] = &[
    "init",
    "systemd",
    "containerd-shim-runc-v2",
    "containerd-shim",
    "dumb-init",
    "gnome-shell",
    "docker-init",
    "tini",
    "runsvdir",
    "s6-svscan",
    "supervisord",
];

#[derive(Debug, Clone)]
enum ManagerName {
    Literal(String),
    Pattern(SimplePattern),
}

/// Set of process-manager command names.
#[derive(Debug, Clone)]
pub struct ManagerSet {
    names: Vec<ManagerName>,
}

impl Default for ManagerSet {
    fn default() -> Self {
        Self::new(DEFAULT_MANAGERS.iter().copied())
    }
}

impl ManagerSet {
    /// Builds the set; names with `*` or `?` are globs. Invalid globs are
    /// dropped with a warning.
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let names = names
            .into_iter()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .filter_map(|n| {
                if has_wildcards(n) {
                    match SimplePattern::new(n) {
                        Ok(p) => Some(ManagerName::Pattern(p)),
                        Err(e) => {
                            warn!("Ignoring process manager pattern '{}': {}", n, e);
                            None
                        }
                    }
                } else {
                    Some(ManagerName::Literal(n.to_string()))
                }
            })
            .collect();
        Self { names }
    }

    pub fn is_manager(&self, comm: &str) -> bool {
        self.names.iter().any(|n| match n {
            ManagerName::Literal(name) => name == comm,
            ManagerName::Pattern(p) => p.matches(comm),
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
