//! Label matchers shared by silences, inhibition rules, and routing.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};

/// The operator of a label matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchOp {
    /// Exact equality (=).
    #[serde(rename = "=")]
    Equal,
    /// Exact inequality (!=).
    #[serde(rename = "!=")]
    NotEqual,
    /// Anchored regex match (=~).
    #[serde(rename = "=~")]
    RegexMatch,
    /// Negated anchored regex match (!~).
    #[serde(rename = "!~")]
    RegexNoMatch,
}

impl MatchOp {
    /// Returns the operator as a string symbol.
    #[must_use]
    pub const fn as_symbol(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::RegexMatch => "=~",
            Self::RegexNoMatch => "!~",
        }
    }
}

impl fmt::Display for MatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_symbol())
    }
}

/// A single label predicate, e.g. `severity = critical` or `service =~ "api-.*"`.
///
/// A label absent from the set under test matches as if its value were the
/// empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matcher {
    /// The label name to test.
    pub name: String,
    /// The comparison operator.
    pub op: MatchOp,
    /// The value or pattern to compare against.
    pub value: String,
}

impl Matcher {
    /// Creates an equality matcher.
    #[must_use]
    pub fn eq(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: MatchOp::Equal,
            value: value.into(),
        }
    }

    /// Creates an inequality matcher.
    #[must_use]
    pub fn ne(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: MatchOp::NotEqual,
            value: value.into(),
        }
    }

    /// Creates a regex matcher.
    #[must_use]
    pub fn re(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: MatchOp::RegexMatch,
            value: pattern.into(),
        }
    }

    /// Creates a negated regex matcher.
    #[must_use]
    pub fn not_re(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: MatchOp::RegexNoMatch,
            value: pattern.into(),
        }
    }

    /// Compiles the matcher for evaluation.
    ///
    /// Regex patterns are anchored to the full label value, mirroring the
    /// usual alert-matcher semantics, and compiled exactly once here.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidMatcher` if the matcher has an empty
    /// label name or an invalid regex pattern.
    pub fn compile(&self) -> Result<CompiledMatcher> {
        if self.name.is_empty() {
            return Err(AlertError::InvalidMatcher {
                reason: "matcher label name cannot be empty".to_string(),
            });
        }

        let regex = match self.op {
            MatchOp::Equal | MatchOp::NotEqual => None,
            MatchOp::RegexMatch | MatchOp::RegexNoMatch => {
                let anchored = format!("^(?:{})$", self.value);
                let compiled = Regex::new(&anchored).map_err(|e| AlertError::InvalidMatcher {
                    reason: format!("invalid regex for label {:?}: {e}", self.name),
                })?;
                Some(compiled)
            }
        };

        Ok(CompiledMatcher {
            matcher: self.clone(),
            regex,
        })
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.op, self.value)
    }
}

/// A matcher with its regex (if any) compiled and ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    matcher: Matcher,
    regex: Option<Regex>,
}

impl CompiledMatcher {
    /// Returns the source matcher.
    #[must_use]
    pub const fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Tests the matcher against a label set.
    #[must_use]
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        let value = labels.get(&self.matcher.name).map_or("", String::as_str);
        match (&self.matcher.op, &self.regex) {
            (MatchOp::Equal, _) => value == self.matcher.value,
            (MatchOp::NotEqual, _) => value != self.matcher.value,
            (MatchOp::RegexMatch, Some(re)) => re.is_match(value),
            (MatchOp::RegexNoMatch, Some(re)) => !re.is_match(value),
            // compile() always populates the regex for regex ops
            (MatchOp::RegexMatch | MatchOp::RegexNoMatch, None) => false,
        }
    }
}

/// Compiles a list of matchers, failing on the first invalid one.
///
/// # Errors
///
/// Returns `AlertError::InvalidMatcher` for the first matcher that fails
/// to compile.
pub fn compile_all(matchers: &[Matcher]) -> Result<Vec<CompiledMatcher>> {
    matchers.iter().map(Matcher::compile).collect()
}

/// Tests whether every matcher in the list matches the label set.
///
/// An empty list matches everything.
#[must_use]
pub fn matches_all(matchers: &[CompiledMatcher], labels: &HashMap<String, String>) -> bool {
    matchers.iter().all(|m| m.matches(labels))
}
