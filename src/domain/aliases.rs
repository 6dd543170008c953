//! Path aliasing for data recorded on other machines
//!
//! A [`PathAliases`] holds ordered `(pattern, result)` rules. When data files
//! from several machines are combined, each recorded path is run through
//! [`PathAliases::map`] so that `/jenkins/build/42/src/a.py` and
//! `c:\ned\src\a.py` both land on the local `./src/a.py`.
//!
//! Pattern rules:
//! - `*` matches exactly one path segment, except as the very first segment,
//!   where it matches any prefix
//! - `/` and `\` are interchangeable
//! - matching is anchored at the start of the path and case-insensitive
//! - a pattern may not end with a wildcard segment

use regex::Regex;
use tracing::debug;

use super::error::DataError;
use super::paths::{abs_file, canonical_filename, isabs_anywhere, sep};

const SEPARATORS: &[char] = &['/', '\\'];

#[derive(Debug, Clone)]
struct Alias {
    regex: Regex,
    result: String,
    pattern_sep: char,
    result_sep: char,
}

/// Ordered rules for rewriting foreign paths into local ones
#[derive(Debug, Clone, Default)]
pub struct PathAliases {
    aliases: Vec<Alias>,
}

impl PathAliases {
    /// Creates an empty set of aliases
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered rules
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// True if no rules are registered
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Registers a rule mapping paths under `pattern` to `result`
    ///
    /// Relative patterns (`.`, `../other`, `~`) are made absolute first,
    /// unless they start with a wildcard. `result` always gets a trailing
    /// separator of its own style.
    pub fn add(&mut self, pattern: &str, result: &str) -> Result<(), DataError> {
        let trimmed = pattern.trim_end_matches(SEPARATORS);
        if trimmed.ends_with('*') {
            return Err(DataError::WildcardAtEnd(pattern.to_string()));
        }
        let pattern_sep = sep(pattern);

        let mut full = if trimmed.is_empty() || trimmed.starts_with('*') || isabs_anywhere(trimmed)
        {
            trimmed.to_string()
        } else {
            abs_file(trimmed)
        };
        full.push(pattern_sep);

        let regex = compile(&full)?;

        let result_sep = sep(result);
        let mut result = result.trim_end_matches(SEPARATORS).to_string();
        result.push(result_sep);

        debug!(pattern = %full, result = %result, "Added path alias");
        self.aliases.push(Alias {
            regex,
            result,
            pattern_sep,
            result_sep,
        });
        Ok(())
    }

    /// Maps `path` through the first matching rule
    ///
    /// A mapped path is canonicalized. A path no rule matches is returned
    /// exactly as given.
    pub fn map(&self, path: &str) -> String {
        for alias in &self.aliases {
            let Some(found) = alias.regex.find(path) else {
                continue;
            };

            let mut mapped = format!("{}{}", alias.result, &path[found.end()..]);
            if alias.pattern_sep != alias.result_sep {
                mapped = mapped.replace(alias.pattern_sep, &alias.result_sep.to_string());
            }
            let mapped = canonical_filename(&mapped);
            debug!(from = path, to = %mapped, "Mapped path through alias");
            return mapped;
        }
        path.to_string()
    }
}

/// Turns a pattern into an anchored regex, escaping everything that isn't a
/// wildcard or a separator
fn compile(pattern: &str) -> Result<Regex, DataError> {
    let mut re = String::from("(?i)^");
    let mut chars = pattern.chars().peekable();

    // A leading wildcard segment stands for any prefix
    if pattern.starts_with('*') {
        while chars.next_if_eq(&'*').is_some() {}
        re.push_str(".*");
    }

    let mut buf = [0u8; 4];
    for c in chars {
        match c {
            '*' => re.push_str(r"[^/\\]+"),
            '/' | '\\' => re.push_str(r"[/\\]"),
            _ => re.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }

    Regex::new(&re).map_err(|e| DataError::BadPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
