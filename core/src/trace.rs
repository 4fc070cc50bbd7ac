//! Evaluation trace types for debugging rule selection.
//!
//! Trace types mirror the runtime types ([`MessageMatcher`](crate::MessageMatcher),
//! [`Rule`](crate::Rule)) but capture evaluation results instead. Use
//! [`Matcher::find_with_trace`](crate::Matcher::find_with_trace) to see why a
//! call ended in `NotFound`.
//!
//! # Three Levels of Trace
//!
//! - [`PatternTrace`]: per matcher: which fields or patterns held?
//! - [`RuleTrace`]: per rule: was it a candidate, which steps matched?
//! - [`MatchTrace`]: per lookup: every rule tried, and the winner.
//!
//! # Example
//!
//! ```ignore
//! let trace = Matcher::new(&store).find_with_trace("hello", StreamType::Unary, &[msg]);
//! for rule in &trace.rules {
//!     println!("rule[{}]: matched={}", rule.index, rule.matched);
//! }
//! ```

use crate::StreamType;

/// Trace of one [`MessageMatcher`](crate::MessageMatcher) evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternTrace {
    /// Wildcard; always matched.
    Any,
    /// Structural equality check.
    Exact {
        /// Whether the message equalled the expectation.
        matched: bool,
        /// Expected message (compact JSON).
        expected: String,
        /// Received message (compact JSON).
        actual: String,
    },
    /// Whole-message regex.
    Pattern {
        /// Whether the regex matched.
        matched: bool,
        /// The regex source.
        regex: String,
        /// The string the regex ran against.
        data: String,
    },
    /// Field predicates (all evaluated, no short-circuit).
    Fields {
        /// Whether every field matched.
        matched: bool,
        /// One entry per predicate, in declaration order.
        fields: Vec<FieldTrace>,
    },
}

impl PatternTrace {
    /// Get the overall match result.
    #[must_use]
    pub fn matched(&self) -> bool {
        match self {
            Self::Any => true,
            Self::Exact { matched, .. }
            | Self::Pattern { matched, .. }
            | Self::Fields { matched, .. } => *matched,
        }
    }
}

/// One field predicate's evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTrace {
    /// Field path.
    pub path: String,
    /// Whether the predicate held.
    pub matched: bool,
    /// Extracted [`FieldData`](crate::FieldData) (Debug format).
    pub data: String,
    /// The matcher (Debug format).
    pub matcher: String,
}

/// One rule step's evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTrace {
    /// Step index (0-based).
    pub step: usize,
    /// Pattern trace for the step's input matcher.
    pub pattern: PatternTrace,
}

/// Why a rule was not evaluated against the messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The rule serves a different stream type.
    StreamType(StreamType),
    /// The rule expects a different number of inbound messages.
    StepCount {
        /// Steps the rule expects.
        expected: usize,
        /// Messages supplied.
        received: usize,
    },
}

/// One rule's evaluation in a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTrace {
    /// Index in the method's rule list (registration order).
    pub index: usize,
    /// Whether the rule accepted the messages.
    pub matched: bool,
    /// Set when the rule was skipped without looking at messages.
    pub skipped: Option<SkipReason>,
    /// Steps evaluated, stopping at the first failing one.
    pub steps: Vec<StepTrace>,
}

/// Trace of a full rule lookup.
///
/// # INV: `result` agrees with `find()`
///
/// `result` is the index of the rule [`Matcher::find`](crate::Matcher::find)
/// returns for the same inputs, or `None` when it returns `NotFound`. Rules
/// after the winner are not traced (first-match-wins).
#[derive(Debug, Clone, PartialEq)]
pub struct MatchTrace {
    /// Method looked up.
    pub method: String,
    /// Stream type of the call.
    pub stream_type: StreamType,
    /// Index of the winning rule.
    pub result: Option<usize>,
    /// Every rule tried, in registration order.
    pub rules: Vec<RuleTrace>,
}

impl MatchTrace {
    /// Returns `true` if a rule matched.
    #[must_use]
    pub fn matched(&self) -> bool {
        self.result.is_some()
    }
}
