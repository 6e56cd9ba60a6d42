//! Application group rule files.
//!
//! Rules are listed as groups, each with one or more match tokens. Order in
//! the file is the matching order, so the first group whose token matches a
//! process claims it.
//!
//! ```toml
//! [[groups]]
//! name = "web"
//! matches = ["nginx", "httpd*", "*apache2*"]
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::RuleError;
use crate::targets::TargetRegistry;

/// Built-in rules compiled into the binary.
pub const DEFAULT_APPS_GROUPS: &str = include_str!("../../data/apps_groups.toml");

/// Optional system-wide rules appended to the built-ins.
pub const SYSTEM_APPS_GROUPS_PATH: &str = "/etc/herakles/apps_groups.toml";

/// Optional rules in the working directory appended after the system-wide ones.
pub const LOCAL_APPS_GROUPS_PATH: &str = "./apps_groups.toml";

/// One configured application group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppGroupDef {
    pub name: String,
    #[serde(default)]
    pub matches: Vec<String>,
}

/// Root structure of a rules file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppsGroupsFile {
    #[serde(default)]
    pub groups: Vec<AppGroupDef>,
}

impl AppsGroupsFile {
    /// Builds a registry with one target per match token, in file order.
    pub fn build_registry(&self) -> Result<TargetRegistry, RuleError> {
        let mut registry = TargetRegistry::new();
        for group in &self.groups {
            if group.matches.is_empty() {
                warn!("Application group '{}' has no match tokens, skipping", group.name);
                continue;
            }
            for token in &group.matches {
                registry.add_app_group(&group.name, token)?;
            }
        }
        Ok(registry)
    }

    pub fn token_count(&self) -> usize {
        self.groups.iter().map(|g| g.matches.len()).sum()
    }
}

/// Parses a rules document; `ext` picks the format (`toml`, `json`, else YAML).
pub fn parse_apps_groups(content: &str, ext: Option<&str>, origin: &Path) -> Result<AppsGroupsFile, RuleError> {
    let parse_err = |message: String| RuleError::Parse {
        path: origin.to_path_buf(),
        message,
    };
    match ext {
        Some("toml") => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
        Some("json") => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        _ => serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string())),
    }
}

/// Reads and parses a rules file.
pub fn load_apps_groups_file(path: &Path) -> Result<AppsGroupsFile, RuleError> {
    let content = fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file = parse_apps_groups(&content, path.extension().and_then(|s| s.to_str()), path)?;
    info!(
        "Loaded {} application groups from {}",
        file.groups.len(),
        path.display()
    );
    Ok(file)
}

/// Loads the effective rule set.
///
/// An explicit `path` replaces everything else. Without one, the built-in
/// rules are used, followed by the system-wide and local files if present.
pub fn load_apps_groups(path: Option<&Path>) -> Result<AppsGroupsFile, RuleError> {
    if let Some(p) = path {
        return load_apps_groups_file(p);
    }

    let mut rules = parse_apps_groups(DEFAULT_APPS_GROUPS, Some("toml"), Path::new("<built-in>"))?;

    for extra in [SYSTEM_APPS_GROUPS_PATH, LOCAL_APPS_GROUPS_PATH] {
        let p = Path::new(extra);
        if p.exists() {
            let more = load_apps_groups_file(p)?;
            rules.groups.extend(more.groups);
        }
    }

    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_rules_parse_and_build() {
        let rules = parse_apps_groups(DEFAULT_APPS_GROUPS, Some("toml"), Path::new("<built-in>")).unwrap();
        assert!(!rules.groups.is_empty());
        let registry = rules.build_registry().unwrap();
        assert_eq!(registry.apps_targets().count(), rules.token_count());
    }

    #[test]
    fn test_yaml_and_json_rules() {
        let yaml = "groups:\n  - name: web\n    matches: [nginx, \"httpd*\"]\n";
        let rules = parse_apps_groups(yaml, Some("yaml"), Path::new("x.yaml")).unwrap();
        assert_eq!(rules.groups[0].matches, vec!["nginx", "httpd*"]);

        let json = r#"{"groups": [{"name": "db", "matches": ["postgres"]}]}"#;
        let rules = parse_apps_groups(json, Some("json"), Path::new("x.json")).unwrap();
        assert_eq!(rules.groups[0].name, "db");
    }

    #[test]
    fn test_explicit_file_replaces_builtins() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[[groups]]\nname = \"only\"\nmatches = [\"one\"]").unwrap();

        let rules = load_apps_groups(Some(file.path())).unwrap();
        assert_eq!(rules.groups.len(), 1);
        assert_eq!(rules.groups[0].name, "only");
    }

    #[test]
    fn test_bad_token_fails_registry_build() {
        let rules = AppsGroupsFile {
            groups: vec![AppGroupDef {
                name: "broken".into(),
                matches: vec!["*".into()],
            }],
        };
        assert!(matches!(rules.build_registry(), Err(RuleError::EmptyToken(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_apps_groups(Some(Path::new("/nonexistent/apps_groups.toml"))).unwrap_err();
        assert!(matches!(err, RuleError::Io { .. }));
    }

    #[test]
    fn test_group_without_tokens_is_skipped() {
        let rules = AppsGroupsFile {
            groups: vec![AppGroupDef {
                name: "empty".into(),
                matches: Vec::new(),
            }],
        };
        assert!(rules.build_registry().unwrap().is_empty());
    }
}
