//! Glob-style name patterns.
//!
//! A pattern is a whitespace-separated list of globs (`*` and `?`). A glob
//! prefixed with `!` is negative. The first glob that matches decides the
//! result; when none matches the pattern does not match.

use regex::Regex;

use crate::error::RuleError;

#[derive(Debug, Clone)]
struct Glob {
    regex: Regex,
    negative: bool,
}

/// Compiled glob list.
#[derive(Debug, Clone)]
pub struct SimplePattern {
    source: String,
    globs: Vec<Glob>,
}

impl SimplePattern {
    pub fn new(expr: &str) -> Result<Self, RuleError> {
        let mut globs = Vec::new();

        for word in expr.split_whitespace() {
            let (negative, glob) = match word.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, word),
            };
            if glob.is_empty() {
                continue;
            }

            let regex = Regex::new(&glob_to_regex(glob)).map_err(|source| {
                RuleError::InvalidPattern {
                    pattern: expr.to_string(),
                    source,
                }
            })?;
            globs.push(Glob { regex, negative });
        }

        Ok(Self {
            source: expr.to_string(),
            globs,
        })
    }

    pub fn matches(&self, subject: &str) -> bool {
        self.globs
            .iter()
            .find(|g| g.regex.is_match(subject))
            .is_some_and(|g| !g.negative)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Returns true if `s` uses glob wildcards.
pub fn has_wildcards(s: &str) -> bool {
    s.contains('*') || s.contains('?')
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    out.push('$');
    out
}
