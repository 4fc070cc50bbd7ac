//! Responder: turns a resolved rule into protocol-level output.
//!
//! The responder never transforms configured data: messages are emitted in
//! the order written, and configured errors keep their code, message and
//! metadata exactly.

use crate::{CallError, Message, Outcome, Rule, RuleKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// gRPC status codes used by the engine.
///
/// Configured errors may carry any code; these are the ones the engine
/// itself produces or that fixtures commonly use.
pub mod status {
    /// `OK`
    pub const OK: i32 = 0;
    /// `INVALID_ARGUMENT`
    pub const INVALID_ARGUMENT: i32 = 3;
    /// `NOT_FOUND`
    pub const NOT_FOUND: i32 = 5;
    /// `FAILED_PRECONDITION`: a streaming input arrived out of sequence.
    pub const FAILED_PRECONDITION: i32 = 9;
    /// `UNIMPLEMENTED`: no rule matches the call.
    pub const UNIMPLEMENTED: i32 = 12;
    /// `INTERNAL`
    pub const INTERNAL: i32 = 13;
}

/// A structured failure outcome.
///
/// Deserializes straight from the `error` key of a rule record:
///
/// ```yaml
/// error: { code: 3, message: "Message text is required", metadata: { key: value } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// gRPC status code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Trailing metadata; empty when unspecified.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ErrorDescriptor {
    /// Create a descriptor with no metadata.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Add a metadata entry (builder pattern).
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Output of the responder for one emission point.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Messages to emit, in order.
    Messages(Vec<Message>),
    /// The call terminates with this error.
    Error(ErrorDescriptor),
}

impl Reply {
    /// Convert into the shape the dispatcher returns.
    ///
    /// # Errors
    ///
    /// A `Reply::Error` becomes [`CallError::Configured`].
    pub fn into_result(self) -> Result<Vec<Message>, CallError> {
        match self {
            Self::Messages(messages) => Ok(messages),
            Self::Error(descriptor) => Err(CallError::Configured(descriptor)),
        }
    }
}

impl From<&Outcome> for Reply {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Messages(messages) => Self::Messages(messages.clone()),
            Outcome::Error(descriptor) => Self::Error(descriptor.clone()),
        }
    }
}

/// Produces replies from rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct Responder;

impl Responder {
    /// The terminal reply of a rule.
    ///
    /// Mutual-stream rules emit per step (see [`respond_step`](Self::respond_step))
    /// and have nothing left to say at the end.
    #[must_use]
    pub fn respond(&self, rule: &Rule) -> Reply {
        let reply = rule
            .outcome()
            .map_or(Reply::Messages(Vec::new()), Reply::from);
        match &reply {
            Reply::Messages(messages) => {
                tracing::debug!(method = rule.method(), count = messages.len(), "emitting messages");
            }
            Reply::Error(descriptor) => {
                tracing::debug!(method = rule.method(), code = descriptor.code, "emitting configured error");
            }
        }
        reply
    }

    /// The paired output for `step` of a mutual-stream rule.
    #[must_use]
    pub fn respond_step(&self, rule: &Rule, step: usize) -> Option<Message> {
        match rule.kind() {
            RuleKind::MutualStream { steps } => steps.get(step).map(|e| e.output.clone()),
            _ => None,
        }
    }
}
