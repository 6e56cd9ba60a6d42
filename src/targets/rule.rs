//! Application group match rules.
//!
//! A rule is written as a single token:
//!
//! | token     | kind     | compared against  |
//! |-----------|----------|-------------------|
//! | `name`    | exact    | `comm`/`comm_orig`|
//! | `name*`   | prefix   | `comm`            |
//! | `*name`   | suffix   | `comm`            |
//! | `*name*`  | contains | full command line |
//!
//! When the token still has wildcards after stripping the leading and
//! trailing `*`, the whole token is compiled as a glob pattern.

use crate::error::RuleError;
use crate::process::ProcessRecord;
use crate::targets::pattern::{has_wildcards, SimplePattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Prefix,
    Suffix,
    Contains,
}

#[derive(Debug, Clone)]
pub enum Matcher {
    Literal(String),
    Pattern(SimplePattern),
}

#[derive(Debug, Clone)]
pub struct MatchRule {
    kind: MatchKind,
    matcher: Matcher,
    token: String,
}

impl MatchRule {
    pub fn parse(group: &str, token: &str) -> Result<Self, RuleError> {
        let token = token.trim();
        let suffix = token.starts_with('*');
        let prefix = token.len() > 1 && token.ends_with('*');

        let core = token.trim_start_matches('*');
        let core = if prefix { core.strip_suffix('*').unwrap_or(core) } else { core };
        if core.is_empty() {
            return Err(RuleError::EmptyToken(group.to_string()));
        }

        let kind = match (prefix, suffix) {
            (false, false) => MatchKind::Exact,
            (true, false) => MatchKind::Prefix,
            (false, true) => MatchKind::Suffix,
            (true, true) => MatchKind::Contains,
        };

        let matcher = if has_wildcards(core) {
            Matcher::Pattern(SimplePattern::new(token)?)
        } else {
            Matcher::Literal(core.to_string())
        };

        Ok(Self {
            kind,
            matcher,
            token: token.to_string(),
        })
    }

    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn matches(&self, p: &ProcessRecord) -> bool {
        match (self.kind, &self.matcher) {
            (MatchKind::Contains, Matcher::Pattern(pattern)) => {
                p.cmdline.as_deref().is_some_and(|c| pattern.matches(c))
            }
            (MatchKind::Contains, Matcher::Literal(compare)) => {
                p.cmdline.as_deref().is_some_and(|c| c.contains(compare.as_str()))
            }
            (_, Matcher::Pattern(pattern)) => pattern.matches(&p.comm),
            (MatchKind::Exact, Matcher::Literal(compare)) => {
                *compare == p.comm || *compare == p.comm_orig
            }
            // The renamed-process branch re-tests `comm`; `comm_orig` is
            // only consulted by exact rules.
            #[allow(clippy::nonminimal_bool, clippy::overly_complex_bool_expr)]
            (MatchKind::Prefix, Matcher::Literal(compare)) => {
                p.comm.starts_with(compare.as_str())
                    || (p.comm != p.comm_orig && p.comm.starts_with(compare.as_str()))
            }
            #[allow(clippy::nonminimal_bool, clippy::overly_complex_bool_expr)]
            (MatchKind::Suffix, Matcher::Literal(compare)) => {
                p.comm.ends_with(compare.as_str())
                    || (p.comm != p.comm_orig && p.comm.ends_with(compare.as_str()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(comm: &str, comm_orig: &str, cmdline: Option<&str>) -> ProcessRecord {
        let mut p = ProcessRecord::new(100, comm);
        p.comm_orig = comm_orig.to_string();
        p.cmdline = cmdline.map(str::to_string);
        p
    }

    #[test]
    fn test_parse_kinds() {
        let cases = [
            ("nginx", MatchKind::Exact),
            ("php-fpm*", MatchKind::Prefix),
            ("*-worker", MatchKind::Suffix),
            ("*elasticsearch*", MatchKind::Contains),
        ];
        for (token, kind) in cases {
            let rule = MatchRule::parse("g", token).unwrap();
            assert_eq!(rule.kind(), kind, "token {}", token);
            assert!(matches!(rule.matcher(), Matcher::Literal(_)));
        }
    }

    #[test]
    fn test_inner_wildcard_compiles_pattern() {
        let rule = MatchRule::parse("g", "python*manage*").unwrap();
        assert_eq!(rule.kind(), MatchKind::Prefix);
        assert!(matches!(rule.matcher(), Matcher::Pattern(_)));
        assert!(rule.matches(&process("python3-manage.py", "python3-manage.py", None)));
        assert!(!rule.matches(&process("python3", "python3", None)));
    }

    #[test]
    fn test_empty_tokens_are_rejected() {
        assert!(matches!(
            MatchRule::parse("web", "*"),
            Err(RuleError::EmptyToken(g)) if g == "web"
        ));
        assert!(MatchRule::parse("web", "**").is_err());
        assert!(MatchRule::parse("web", "  ").is_err());
    }

    #[test]
    fn test_exact_falls_back_to_original_name() {
        let rule = MatchRule::parse("g", "kube-controller").unwrap();
        assert!(rule.matches(&process(
            "kube-controller-manager",
            "kube-controller",
            None
        )));
        assert!(!rule.matches(&process("kube-proxy", "kube-proxy", None)));
    }

    #[test]
    fn test_prefix_and_suffix_ignore_original_name() {
        let prefix = MatchRule::parse("g", "orig*").unwrap();
        let suffix = MatchRule::parse("g", "*orig").unwrap();
        let renamed = process("renamed", "orig-name-orig", None);

        assert!(!prefix.matches(&renamed));
        assert!(!suffix.matches(&renamed));

        assert!(prefix.matches(&process("original", "x", None)));
        assert!(suffix.matches(&process("was-orig", "x", None)));
    }

    #[test]
    fn test_contains_requires_cmdline() {
        let rule = MatchRule::parse("g", "*catalina*").unwrap();
        assert!(rule.matches(&process(
            "java",
            "java",
            Some("java -Dcatalina.home=/opt/tomcat org.apache.catalina.startup.Bootstrap")
        )));
        assert!(!rule.matches(&process("catalina", "catalina", None)));
    }

    #[test]
    fn test_contains_pattern_runs_against_cmdline() {
        let rule = MatchRule::parse("g", "*java*kafka*").unwrap();
        assert!(rule.matches(&process("java", "java", Some("/usr/bin/java -cp kafka.jar"))));
        assert!(!rule.matches(&process("java", "java", Some("/usr/bin/java -jar app.jar"))));
    }
}
