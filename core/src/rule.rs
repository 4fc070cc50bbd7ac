//! `Rule`: one configured mapping from expected input to response
//!
//! A rule belongs to one method and one [`StreamType`]. The shape of its
//! steps depends on the stream type, so [`RuleKind`] has one variant per
//! stream type and the per-type invariants hold by construction:
//!
//! | Stream type | Inputs | Responses |
//! |-------------|--------|-----------|
//! | unary | one matcher | one message or an error |
//! | client-stream | one matcher per step | one message or an error, after the last step |
//! | server-stream | one matcher | one message per step, or an error |
//! | mutual-stream | one matcher per step | one message per step |

use crate::{ErrorDescriptor, Message, MessageMatcher};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message cardinality of an RPC method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    /// One request, one response.
    #[default]
    #[serde(rename = "unary")]
    Unary,
    /// Many requests, one response.
    #[serde(rename = "client", alias = "client-stream", alias = "client_stream")]
    ClientStream,
    /// One request, many responses.
    #[serde(rename = "server", alias = "server-stream", alias = "server_stream")]
    ServerStream,
    /// Requests and responses interleaved in lockstep.
    #[serde(
        rename = "mutual",
        alias = "mutual-stream",
        alias = "mutual_stream",
        alias = "bidi"
    )]
    MutualStream,
}

impl StreamType {
    /// The canonical config spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unary => "unary",
            Self::ClientStream => "client-stream",
            Self::ServerStream => "server-stream",
            Self::MutualStream => "mutual-stream",
        }
    }

    /// Returns `true` if the client sends more than one message.
    #[must_use]
    pub fn is_client_streaming(self) -> bool {
        matches!(self, Self::ClientStream | Self::MutualStream)
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a rule answers with once its inputs have been accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Messages emitted in this exact order.
    Messages(Vec<Message>),
    /// A configured error; no message is emitted alongside it.
    Error(ErrorDescriptor),
}

impl Outcome {
    /// A single-message outcome.
    #[must_use]
    pub fn message(message: impl Into<Message>) -> Self {
        Self::Messages(vec![message.into()])
    }

    /// Returns `true` for configured errors.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// One lockstep step of a mutual-stream rule.
#[derive(Debug)]
pub struct Exchange {
    /// Expected inbound message.
    pub input: MessageMatcher,
    /// Message emitted as soon as `input` is accepted.
    pub output: Message,
}

/// Stream-type specific body of a [`Rule`].
#[derive(Debug)]
pub enum RuleKind {
    /// One request, one outcome.
    Unary {
        /// Expected request.
        input: MessageMatcher,
        /// Response or error.
        outcome: Outcome,
    },
    /// Ordered requests, then one outcome.
    ClientStream {
        /// Expected requests, in order.
        steps: Vec<MessageMatcher>,
        /// Response or error, emitted after the stream ends.
        outcome: Outcome,
    },
    /// One request, then ordered responses.
    ServerStream {
        /// Expected request.
        input: MessageMatcher,
        /// Per-step responses, or an error.
        outcome: Outcome,
    },
    /// Request/response pairs in lockstep.
    MutualStream {
        /// Exchanges, in order.
        steps: Vec<Exchange>,
    },
}

/// A configured rule for one method.
///
/// Rules are immutable once registered; the [`RuleStore`](crate::RuleStore)
/// shares them behind `Arc` with every call that resolves to them.
#[derive(Debug)]
pub struct Rule {
    method: String,
    kind: RuleKind,
}

impl Rule {
    /// Create a rule from its parts.
    #[must_use]
    pub fn new(method: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            method: method.into(),
            kind,
        }
    }

    /// A unary rule.
    #[must_use]
    pub fn unary(method: impl Into<String>, input: MessageMatcher, outcome: Outcome) -> Self {
        Self::new(method, RuleKind::Unary { input, outcome })
    }

    /// A client-stream rule.
    #[must_use]
    pub fn client_stream(
        method: impl Into<String>,
        steps: Vec<MessageMatcher>,
        outcome: Outcome,
    ) -> Self {
        Self::new(method, RuleKind::ClientStream { steps, outcome })
    }

    /// A server-stream rule.
    #[must_use]
    pub fn server_stream(
        method: impl Into<String>,
        input: MessageMatcher,
        outcome: Outcome,
    ) -> Self {
        Self::new(method, RuleKind::ServerStream { input, outcome })
    }

    /// A mutual-stream rule.
    #[must_use]
    pub fn mutual_stream(method: impl Into<String>, steps: Vec<Exchange>) -> Self {
        Self::new(method, RuleKind::MutualStream { steps })
    }

    /// Method name this rule serves.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Stream-type specific body.
    #[must_use]
    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Stream type this rule serves.
    #[must_use]
    pub fn stream_type(&self) -> StreamType {
        match self.kind {
            RuleKind::Unary { .. } => StreamType::Unary,
            RuleKind::ClientStream { .. } => StreamType::ClientStream,
            RuleKind::ServerStream { .. } => StreamType::ServerStream,
            RuleKind::MutualStream { .. } => StreamType::MutualStream,
        }
    }

    /// Number of inbound messages this rule expects.
    #[must_use]
    pub fn input_count(&self) -> usize {
        match &self.kind {
            RuleKind::Unary { .. } | RuleKind::ServerStream { .. } => 1,
            RuleKind::ClientStream { steps, .. } => steps.len(),
            RuleKind::MutualStream { steps } => steps.len(),
        }
    }

    /// Number of stream steps: inbound messages, or for a server stream the
    /// messages it emits.
    #[must_use]
    pub fn step_count(&self) -> usize {
        match &self.kind {
            RuleKind::ServerStream { outcome: Outcome::Messages(messages), .. } => messages.len(),
            _ => self.input_count(),
        }
    }

    /// The input matcher for inbound message `step`, if the rule has one.
    #[must_use]
    pub fn input_at(&self, step: usize) -> Option<&MessageMatcher> {
        match &self.kind {
            RuleKind::Unary { input, .. } | RuleKind::ServerStream { input, .. } => {
                (step == 0).then_some(input)
            }
            RuleKind::ClientStream { steps, .. } => steps.get(step),
            RuleKind::MutualStream { steps } => steps.get(step).map(|e| &e.input),
        }
    }

    /// The terminal outcome, for every kind except mutual-stream.
    #[must_use]
    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.kind {
            RuleKind::Unary { outcome, .. }
            | RuleKind::ClientStream { outcome, .. }
            | RuleKind::ServerStream { outcome, .. } => Some(outcome),
            RuleKind::MutualStream { .. } => None,
        }
    }

    /// Returns `true` if the first `messages.len()` inputs accept `messages`.
    ///
    /// A prefix longer than the rule's input count never matches.
    #[must_use]
    pub fn accepts_prefix(&self, messages: &[Message]) -> bool {
        messages.len() <= self.input_count()
            && messages
                .iter()
                .enumerate()
                .all(|(i, m)| self.input_at(i).is_some_and(|matcher| matcher.accepts(m)))
    }

    /// Returns `true` if `messages` is exactly the rule's full input sequence.
    #[must_use]
    pub fn accepts_sequence(&self, messages: &[Message]) -> bool {
        messages.len() == self.input_count() && self.accepts_prefix(messages)
    }

    /// Returns `true` if every call this rule could answer is answered by
    /// `earlier` first.
    ///
    /// Resolution differs per stream type: mutual-stream calls pick their
    /// rule on the first message, every other type on the full sequence.
    #[must_use]
    pub fn is_shadowed_by(&self, earlier: &Self) -> bool {
        if self.stream_type() != earlier.stream_type() {
            return false;
        }
        match self.stream_type() {
            StreamType::MutualStream => match (earlier.input_at(0), self.input_at(0)) {
                (Some(a), Some(b)) => a.covers(b),
                _ => false,
            },
            _ => {
                self.input_count() == earlier.input_count()
                    && (0..self.input_count()).all(|i| match (earlier.input_at(i), self.input_at(i)) {
                        (Some(a), Some(b)) => a.covers(b),
                        _ => false,
                    })
            }
        }
    }
}
