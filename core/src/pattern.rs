//! `MessageMatcher`: does an inbound message satisfy a rule's expected input?
//!
//! One tagged variant per kind of expectation, all behind a single
//! [`accepts`](MessageMatcher::accepts) call:
//!
//! | Variant | Accepts when |
//! |---------|--------------|
//! | `Exact` | the message is structurally equal to the expected message |
//! | `Fields` | every [`FieldPredicate`] holds (logical AND) |
//! | `Pattern` | the regex matches the message's compact JSON rendering |
//! | `Any` | always |

use crate::trace::{FieldTrace, PatternTrace};
use crate::{InputMatcher, Message};
use std::fmt;

/// A single field predicate: a field path paired with an [`InputMatcher`].
///
/// # INV: missing field → false
///
/// If the path does not resolve, the predicate is `false` and the matcher is
/// never consulted.
pub struct FieldPredicate {
    path: String,
    matcher: Box<dyn InputMatcher>,
}

impl FieldPredicate {
    /// Create a predicate over the dot-separated `path`.
    #[must_use]
    pub fn new(path: impl Into<String>, matcher: Box<dyn InputMatcher>) -> Self {
        Self {
            path: path.into(),
            matcher,
        }
    }

    /// The field path this predicate reads.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The matcher applied to the field value.
    #[must_use]
    pub fn matcher(&self) -> &dyn InputMatcher {
        &*self.matcher
    }

    /// Evaluate against a message.
    #[must_use]
    pub fn evaluate(&self, message: &Message) -> bool {
        let data = message.field(&self.path);
        !data.is_none() && self.matcher.matches(&data)
    }

    /// Evaluate with a trace entry for debugging.
    #[must_use]
    pub fn evaluate_with_trace(&self, message: &Message) -> FieldTrace {
        let data = message.field(&self.path);
        let matched = !data.is_none() && self.matcher.matches(&data);
        FieldTrace {
            path: self.path.clone(),
            matched,
            data: format!("{data:?}"),
            matcher: format!("{:?}", self.matcher),
        }
    }
}

impl fmt::Debug for FieldPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldPredicate")
            .field("path", &self.path)
            .field("matcher", &self.matcher)
            .finish()
    }
}

/// Expected-input matcher for one rule step.
///
/// Built from rule configuration (see [`MessageMatchSpec`](crate::MessageMatchSpec))
/// or directly in code.
///
/// # Example
///
/// ```
/// use mockrpc::{Message, MessageMatcher};
/// use serde_json::json;
///
/// let exact = MessageMatcher::exact(json!({ "message": "Hello" }));
/// assert!(exact.accepts(&Message::from(json!({ "message": "Hello" }))));
/// assert!(!exact.accepts(&Message::from(json!({ "message": "Hi" }))));
///
/// assert!(MessageMatcher::Any.accepts(&Message::empty()));
/// ```
pub enum MessageMatcher {
    /// Structural equality with the expected message.
    Exact(Message),
    /// All field predicates must hold.
    Fields(Vec<FieldPredicate>),
    /// Regex over the compact JSON rendering of the whole message.
    Pattern(regex::Regex),
    /// Accepts every message.
    Any,
}

impl MessageMatcher {
    /// Shorthand for an exact matcher.
    #[must_use]
    pub fn exact(expected: impl Into<Message>) -> Self {
        Self::Exact(expected.into())
    }

    /// Decide whether `message` satisfies this matcher.
    #[must_use]
    pub fn accepts(&self, message: &Message) -> bool {
        match self {
            Self::Exact(expected) => expected == message,
            Self::Fields(predicates) => predicates.iter().all(|p| p.evaluate(message)),
            Self::Pattern(re) => re.is_match(&message.to_compact_string()),
            Self::Any => true,
        }
    }

    /// Evaluate with full trace for debugging.
    ///
    /// Field predicates are all evaluated (no short-circuit) so the trace
    /// shows every failing field. The `matched` result equals
    /// [`accepts`](Self::accepts).
    #[must_use]
    pub fn accepts_with_trace(&self, message: &Message) -> PatternTrace {
        match self {
            Self::Exact(expected) => PatternTrace::Exact {
                matched: expected == message,
                expected: expected.to_compact_string(),
                actual: message.to_compact_string(),
            },
            Self::Fields(predicates) => {
                let fields: Vec<FieldTrace> = predicates
                    .iter()
                    .map(|p| p.evaluate_with_trace(message))
                    .collect();
                PatternTrace::Fields {
                    matched: fields.iter().all(|f| f.matched),
                    fields,
                }
            }
            Self::Pattern(re) => {
                let data = message.to_compact_string();
                PatternTrace::Pattern {
                    matched: re.is_match(&data),
                    regex: re.as_str().to_owned(),
                    data,
                }
            }
            Self::Any => PatternTrace::Any,
        }
    }

    /// Returns `true` for the wildcard.
    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Returns `true` if every message accepted by `other` is provably
    /// accepted by `self`.
    ///
    /// Conservative: only the wildcard and identical exact messages are
    /// recognised. Used to detect unreachable rules.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Any, _) => true,
            (Self::Exact(a), Self::Exact(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for MessageMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(m) => f.debug_tuple("Exact").field(m).finish(),
            Self::Fields(ps) => f.debug_tuple("Fields").field(ps).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Any => f.write_str("Any"),
        }
    }
}

impl fmt::Display for MessageMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(m) => write!(f, "{m}"),
            Self::Fields(ps) => {
                f.write_str("fields {")?;
                for (i, p) in ps.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {:?}", p.path, p.matcher)?;
                }
                f.write_str("}")
            }
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
            Self::Any => f.write_str("any message"),
        }
    }
}
