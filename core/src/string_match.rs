//! `StringMatchSpec` and `FieldMatchSpec`: config-level field match specifications
//!
//! These types represent what the rule author wrote (e.g. "regex `^Hi` on
//! `message`"). They compile to runtime [`InputMatcher`]s via
//! [`to_input_matcher()`](StringMatchSpec::to_input_matcher).
//!
//! # Naming: Spec vs Matcher
//!
//! - [`StringMatchSpec`] = config-level specification (what the user wrote)
//! - [`StringMatcher`] = runtime engine (what evaluates at match time)

use crate::{
    BoolMatcher, ConfigError, InputMatcher, IntMatcher, StringMatcher, MAX_PATTERN_LENGTH,
    MAX_REGEX_PATTERN_LENGTH,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A string match specification from a rule file.
///
/// Externally tagged, so it reads naturally in YAML:
///
/// ```yaml
/// message: { Regex: "^Hi" }
/// ```
///
/// # Example
///
/// ```
/// use mockrpc::{FieldData, StringMatchSpec};
///
/// let spec = StringMatchSpec::Prefix("How".into());
/// let matcher = spec.to_input_matcher().unwrap();
/// assert!(matcher.matches(&FieldData::String("How are you?")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringMatchSpec {
    /// Exact string equality.
    Exact(String),
    /// String starts with prefix.
    Prefix(String),
    /// String ends with suffix.
    Suffix(String),
    /// String contains substring.
    Contains(String),
    /// Regular expression match (Rust `regex` crate syntax, linear time).
    Regex(String),
    /// The wrapped strategy, compared case-insensitively.
    ///
    /// ```yaml
    /// message: { IgnoreCase: { Prefix: "how" } }
    /// ```
    IgnoreCase(Box<StringMatchSpec>),
}

impl StringMatchSpec {
    /// Compile this spec into a runtime [`InputMatcher`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PatternTooLong`] if the pattern exceeds the
    /// length limit, or [`ConfigError::InvalidPattern`] if the regex is invalid.
    pub fn to_input_matcher(&self) -> Result<Box<dyn InputMatcher>, ConfigError> {
        self.compile(false).map(|sm| Box::new(sm) as Box<dyn InputMatcher>)
    }

    fn compile(&self, ignore_case: bool) -> Result<StringMatcher, ConfigError> {
        match self {
            Self::Exact(v) => check_len(v, MAX_PATTERN_LENGTH)
                .map(|()| StringMatcher::exact(v.as_str(), ignore_case)),
            Self::Prefix(v) => check_len(v, MAX_PATTERN_LENGTH)
                .map(|()| StringMatcher::prefix(v.as_str(), ignore_case)),
            Self::Suffix(v) => check_len(v, MAX_PATTERN_LENGTH)
                .map(|()| StringMatcher::suffix(v.as_str(), ignore_case)),
            Self::Contains(v) => check_len(v, MAX_PATTERN_LENGTH)
                .map(|()| StringMatcher::contains(v.as_str(), ignore_case)),
            Self::Regex(v) => {
                check_len(v, MAX_REGEX_PATTERN_LENGTH)?;
                let compiled = if ignore_case {
                    StringMatcher::regex_ignore_case(v)
                } else {
                    StringMatcher::regex(v)
                };
                compiled.map_err(|e| ConfigError::InvalidPattern {
                    pattern: v.clone(),
                    reason: e.to_string(),
                })
            }
            Self::IgnoreCase(inner) => inner.compile(true),
        }
    }
}

impl fmt::Display for StringMatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "Exact(\"{v}\")"),
            Self::Prefix(v) => write!(f, "Prefix(\"{v}\")"),
            Self::Suffix(v) => write!(f, "Suffix(\"{v}\")"),
            Self::Contains(v) => write!(f, "Contains(\"{v}\")"),
            Self::Regex(v) => write!(f, "Regex(\"{v}\")"),
            Self::IgnoreCase(inner) => write!(f, "IgnoreCase({inner})"),
        }
    }
}

/// Per-field value specification inside a `fields` input.
///
/// Untagged: a bare string is an exact string match, a bare bool or integer
/// is an equality match, and a tagged [`StringMatchSpec`] selects a strategy.
///
/// ```yaml
/// fields:
///   message: Hello            # Text
///   urgent: true              # Flag
///   id: 42                    # Number
///   name: { Prefix: "Jo" }    # Match
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldMatchSpec {
    /// Exact string equality.
    Text(String),
    /// Boolean equality.
    Flag(bool),
    /// Integer equality.
    Number(i64),
    /// Explicit string strategy.
    Match(StringMatchSpec),
}

impl FieldMatchSpec {
    /// Compile this spec into a runtime [`InputMatcher`].
    ///
    /// # Errors
    ///
    /// Same as [`StringMatchSpec::to_input_matcher`].
    pub fn to_input_matcher(&self) -> Result<Box<dyn InputMatcher>, ConfigError> {
        match self {
            Self::Text(v) => StringMatchSpec::Exact(v.clone()).to_input_matcher(),
            Self::Flag(b) => Ok(Box::new(BoolMatcher::new(*b))),
            Self::Number(i) => Ok(Box::new(IntMatcher::new(*i))),
            Self::Match(spec) => spec.to_input_matcher(),
        }
    }
}

fn check_len(pattern: &str, max: usize) -> Result<(), ConfigError> {
    if pattern.len() > max {
        return Err(ConfigError::PatternTooLong {
            len: pattern.len(),
            max,
        });
    }
    Ok(())
}
