//! `InputMatcher`: value matching on a single message field
//!
//! An `InputMatcher` decides whether one extracted [`FieldData`] value is
//! acceptable. It knows nothing about messages, rules or methods, so the same
//! matcher works for any field of any method.
//!
//! # Available Matchers
//!
//! - [`StringMatcher`]: exact, prefix, suffix, contains, regex
//! - [`BoolMatcher`]: boolean equality
//! - [`IntMatcher`]: integer equality

use crate::FieldData;
use std::fmt::{self, Debug};

/// Matches against one type-erased field value.
///
/// Implementations must return `false` for value types they do not handle
/// rather than coercing. Custom matchers can be plugged into
/// [`FieldPredicate`](crate::FieldPredicate) when building rules in code.
///
/// # Example
///
/// ```
/// use mockrpc::{FieldData, InputMatcher, StringMatcher};
///
/// let matcher = StringMatcher::exact("Hello", false);
/// assert!(matcher.matches(&FieldData::String("Hello")));
/// assert!(!matcher.matches(&FieldData::String("hello")));
/// assert!(!matcher.matches(&FieldData::Int(1)));
/// ```
pub trait InputMatcher: Send + Sync + Debug {
    /// Check if the given value matches.
    fn matches(&self, value: &FieldData<'_>) -> bool;

    /// Returns the data types this matcher supports.
    fn supported_types(&self) -> &[&'static str] {
        &["string"]
    }
}

impl InputMatcher for Box<dyn InputMatcher> {
    fn matches(&self, value: &FieldData<'_>) -> bool {
        (**self).matches(value)
    }

    fn supported_types(&self) -> &[&'static str] {
        (**self).supported_types()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// StringMatcher
// ═══════════════════════════════════════════════════════════════════════════════

/// Unified string matcher.
///
/// # Example
///
/// ```
/// use mockrpc::{FieldData, InputMatcher, StringMatcher};
///
/// let matcher = StringMatcher::prefix("how", true);
/// assert!(matcher.matches(&FieldData::String("How are you?")));
///
/// let matcher = StringMatcher::regex(r"^Hi\b").unwrap();
/// assert!(matcher.matches(&FieldData::String("Hi. I'm Frank")));
/// assert!(!matcher.matches(&FieldData::String("Hello")));
/// ```
#[derive(Clone)]
pub enum StringMatcher {
    /// Exact string equality.
    Exact { value: String, ignore_case: bool },
    /// String prefix match.
    Prefix { value: String, ignore_case: bool },
    /// String suffix match.
    Suffix { value: String, ignore_case: bool },
    /// Substring contains match.
    Contains { value: String, ignore_case: bool },
    /// Regular expression match (RE2 semantics, linear time).
    Regex(regex::Regex),
}

impl StringMatcher {
    /// Create an exact match.
    #[must_use]
    pub fn exact(value: impl Into<String>, ignore_case: bool) -> Self {
        Self::Exact {
            value: value.into(),
            ignore_case,
        }
    }

    /// Create a prefix match.
    #[must_use]
    pub fn prefix(value: impl Into<String>, ignore_case: bool) -> Self {
        Self::Prefix {
            value: value.into(),
            ignore_case,
        }
    }

    /// Create a suffix match.
    #[must_use]
    pub fn suffix(value: impl Into<String>, ignore_case: bool) -> Self {
        Self::Suffix {
            value: value.into(),
            ignore_case,
        }
    }

    /// Create a contains match.
    ///
    /// With `ignore_case` the needle is lowercased once here instead of on
    /// every call.
    #[must_use]
    pub fn contains(value: impl Into<String>, ignore_case: bool) -> Self {
        let value = value.into();
        Self::Contains {
            value: if ignore_case {
                value.to_ascii_lowercase()
            } else {
                value
            },
            ignore_case,
        }
    }

    /// Create a regex match.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the regex pattern is invalid.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        regex::Regex::new(pattern).map(Self::Regex)
    }

    /// Create a case-insensitive regex match.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the regex pattern is invalid.
    pub fn regex_ignore_case(pattern: &str) -> Result<Self, regex::Error> {
        regex::Regex::new(&format!("(?i){pattern}")).map(Self::Regex)
    }
}

impl InputMatcher for StringMatcher {
    fn matches(&self, value: &FieldData<'_>) -> bool {
        let Some(input) = value.as_str() else {
            return false;
        };

        match self {
            Self::Exact { value, ignore_case } => {
                if *ignore_case {
                    input.eq_ignore_ascii_case(value)
                } else {
                    input == value
                }
            }
            Self::Prefix { value, ignore_case } => {
                if *ignore_case {
                    input
                        .get(..value.len())
                        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(value))
                } else {
                    input.starts_with(value.as_str())
                }
            }
            Self::Suffix { value, ignore_case } => {
                if *ignore_case {
                    input
                        .len()
                        .checked_sub(value.len())
                        .and_then(|start| input.get(start..))
                        .is_some_and(|suffix| suffix.eq_ignore_ascii_case(value))
                } else {
                    input.ends_with(value.as_str())
                }
            }
            Self::Contains { value, ignore_case } => {
                if *ignore_case {
                    input.to_ascii_lowercase().contains(value.as_str())
                } else {
                    input.contains(value.as_str())
                }
            }
            Self::Regex(re) => re.is_match(input),
        }
    }
}

impl Debug for StringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |ignore_case: &bool| if *ignore_case { "/i" } else { "" };
        match self {
            Self::Exact { value, ignore_case } => write!(f, "Exact({value:?}){}", flag(ignore_case)),
            Self::Prefix { value, ignore_case } => {
                write!(f, "Prefix({value:?}){}", flag(ignore_case))
            }
            Self::Suffix { value, ignore_case } => {
                write!(f, "Suffix({value:?}){}", flag(ignore_case))
            }
            Self::Contains { value, ignore_case } => {
                write!(f, "Contains({value:?}){}", flag(ignore_case))
            }
            Self::Regex(re) => write!(f, "Regex({:?})", re.as_str()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scalar matchers
// ═══════════════════════════════════════════════════════════════════════════════

/// Boolean equality matcher.
#[derive(Debug, Clone, Copy)]
pub struct BoolMatcher {
    expected: bool,
}

impl BoolMatcher {
    /// Create a new boolean matcher.
    #[must_use]
    pub fn new(expected: bool) -> Self {
        Self { expected }
    }
}

impl InputMatcher for BoolMatcher {
    fn matches(&self, value: &FieldData<'_>) -> bool {
        value.as_bool().is_some_and(|b| b == self.expected)
    }

    fn supported_types(&self) -> &[&'static str] {
        &["bool"]
    }
}

/// Integer equality matcher.
///
/// Proto3 JSON renders 64-bit integers as strings, so a string holding the
/// decimal form of the expected value also matches.
#[derive(Debug, Clone, Copy)]
pub struct IntMatcher {
    expected: i64,
}

impl IntMatcher {
    /// Create a new integer matcher.
    #[must_use]
    pub fn new(expected: i64) -> Self {
        Self { expected }
    }
}

impl InputMatcher for IntMatcher {
    fn matches(&self, value: &FieldData<'_>) -> bool {
        match value {
            FieldData::Int(i) => *i == self.expected,
            FieldData::String(s) => s.parse::<i64>().is_ok_and(|i| i == self.expected),
            _ => false,
        }
    }

    fn supported_types(&self) -> &[&'static str] {
        &["int", "string"]
    }
}
