//! Stream session engine: per-call step sequencing.
//!
//! A [`Session`] tracks one call's inbound messages against the rules of its
//! method. It decides *when* a rule is resolved and *which* emission is due;
//! the [`Responder`](crate::Responder) decides *what* is emitted.
//!
//! ```text
//!            accept(msg)
//!   Open ───────────────▶ AwaitingStep ──▶ Open     (more steps expected)
//!    ▲                                 └─▶ Closed   (last step, or failure)
//!    └──────────────────────────────────────
//! ```
//!
//! | Stream type | Rule resolved | Emission |
//! |-------------|---------------|----------|
//! | unary | on the single message | the outcome, at once |
//! | server-stream | on the single message | every output, in order |
//! | client-stream | at end of stream | the outcome |
//! | mutual-stream | on the first message | one output per accepted message |

use std::sync::Arc;

use crate::{CallError, Matcher, Message, Rule, StreamType};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting inbound messages.
    Open,
    /// A message has arrived and is being matched.
    AwaitingStep,
    /// No further message is accepted; entered on completion or failure.
    Closed,
}

/// What the caller must do after a session event.
#[derive(Debug, Clone)]
pub enum Advance {
    /// Nothing to emit yet.
    Pending,
    /// Emit the terminal outcome of this rule.
    Respond(Arc<Rule>),
    /// Emit the paired output of mutual-stream step `index`.
    Step {
        /// The resolved rule.
        rule: Arc<Rule>,
        /// Step whose output is due.
        index: usize,
    },
    /// The call is complete; nothing more to emit.
    Done,
}

const END_OF_STREAM: &str = "end of stream";

/// Sequencing state of one call.
///
/// # INV: the cursor only advances on an accepted message
///
/// A message that does not match the expected step fails the call with
/// [`CallError::SequenceMismatch`] and closes the session; it is never
/// skipped.
///
/// # INV: a failed session stays failed
///
/// Once an event has failed, every later [`accept`](Self::accept) and
/// [`end`](Self::end) returns that same error.
#[derive(Debug)]
pub struct Session {
    method: String,
    stream_type: StreamType,
    state: SessionState,
    received: Vec<Message>,
    candidates: Vec<Arc<Rule>>,
    rule: Option<Arc<Rule>>,
    failure: Option<CallError>,
}

impl Session {
    /// Open a session for `method` with cursor at 0.
    #[must_use]
    pub fn new(method: impl Into<String>, stream_type: StreamType) -> Self {
        Self {
            method: method.into(),
            stream_type,
            state: SessionState::Open,
            received: Vec::new(),
            candidates: Vec::new(),
            rule: None,
            failure: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of accepted messages.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.received.len()
    }

    /// Messages accepted so far, in arrival order.
    #[must_use]
    pub fn received(&self) -> &[Message] {
        &self.received
    }

    /// The resolved rule, once known. Never changes after it is set.
    #[must_use]
    pub fn rule(&self) -> Option<&Arc<Rule>> {
        self.rule.as_ref()
    }

    /// Stream type of the call.
    #[must_use]
    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    /// The error that ended the call, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&CallError> {
        self.failure.as_ref()
    }

    /// Fail the call with an error raised outside the session, such as a
    /// configured error outcome. The first recorded failure is kept.
    pub fn fail(&mut self, err: CallError) {
        self.state = SessionState::Closed;
        if self.failure.is_none() {
            self.failure = Some(err);
        }
    }

    /// Feed one inbound message.
    ///
    /// # Errors
    ///
    /// - [`CallError::NotFound`] if a unary or server-stream request matches
    ///   no rule, or the method has no rule of this stream type.
    /// - [`CallError::SequenceMismatch`] if the message does not fit the
    ///   expected step, or arrives after the session closed.
    /// - The recorded failure, if the session already failed.
    ///
    /// Any error closes the session.
    pub fn accept(&mut self, matcher: &Matcher<'_>, message: Message) -> Result<Advance, CallError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if self.state == SessionState::Closed {
            let err = self.mismatch(END_OF_STREAM.to_owned(), message.to_compact_string());
            self.fail(err.clone());
            return Err(err);
        }
        self.state = SessionState::AwaitingStep;

        let result = match self.stream_type {
            StreamType::Unary | StreamType::ServerStream => self.accept_single(matcher, message),
            StreamType::ClientStream => self.accept_client(matcher, message),
            StreamType::MutualStream => self.accept_mutual(matcher, message),
        };

        self.state = match &result {
            Ok(Advance::Pending) => SessionState::Open,
            Ok(Advance::Step { rule, .. }) if self.received.len() < rule.input_count() => {
                SessionState::Open
            }
            _ => SessionState::Closed,
        };
        if let Err(err) = &result {
            self.fail(err.clone());
        }
        result
    }

    /// Signal end of the inbound stream.
    ///
    /// # Errors
    ///
    /// - [`CallError::NotFound`] if the stream ended before any message and
    ///   the method has no rule of this stream type.
    /// - [`CallError::SequenceMismatch`] if the stream ended early.
    /// - The recorded failure, if the session already failed.
    pub fn end(&mut self, matcher: &Matcher<'_>) -> Result<Advance, CallError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let result = match self.stream_type {
            StreamType::Unary | StreamType::ServerStream => {
                if self.received.is_empty() {
                    Err(self.mismatch("one request".to_owned(), END_OF_STREAM.to_owned()))
                } else {
                    Ok(Advance::Done)
                }
            }
            StreamType::ClientStream => self.end_client(matcher),
            StreamType::MutualStream => self.end_mutual(matcher),
        };
        self.state = SessionState::Closed;
        if let Err(err) = &result {
            self.fail(err.clone());
        }
        result
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Per stream type
    // ═══════════════════════════════════════════════════════════════════════

    fn accept_single(&mut self, matcher: &Matcher<'_>, message: Message) -> Result<Advance, CallError> {
        if !self.received.is_empty() {
            return Err(self.mismatch(END_OF_STREAM.to_owned(), message.to_compact_string()));
        }
        self.received.push(message);
        let rule = matcher.find(&self.method, self.stream_type, &self.received)?;
        self.rule = Some(Arc::clone(&rule));
        Ok(Advance::Respond(rule))
    }

    fn accept_client(&mut self, matcher: &Matcher<'_>, message: Message) -> Result<Advance, CallError> {
        let step = self.received.len();
        if step == 0 {
            let candidates =
                matcher.candidates(&self.method, self.stream_type, std::slice::from_ref(&message));
            if candidates.is_empty() {
                return Err(self.unmatched_opening(matcher, message.to_compact_string()));
            }
            self.candidates = candidates;
        } else {
            let remaining: Vec<Arc<Rule>> = self
                .candidates
                .iter()
                .filter(|rule| rule.input_at(step).is_some_and(|input| input.accepts(&message)))
                .cloned()
                .collect();
            if remaining.is_empty() {
                let expected = self.expected_at(step);
                return Err(self.mismatch(expected, message.to_compact_string()));
            }
            self.candidates = remaining;
        }
        self.received.push(message);
        Ok(Advance::Pending)
    }

    fn end_client(&mut self, matcher: &Matcher<'_>) -> Result<Advance, CallError> {
        let count = self.received.len();
        if count == 0 {
            self.candidates = matcher.candidates(&self.method, self.stream_type, &[]);
        }
        match self.candidates.iter().find(|rule| rule.input_count() == count) {
            Some(rule) => {
                let rule = Arc::clone(rule);
                self.rule = Some(Arc::clone(&rule));
                Ok(Advance::Respond(rule))
            }
            None if self.candidates.is_empty() => Err(self.not_found()),
            None => {
                let expected = self.expected_at(count);
                Err(self.mismatch(expected, END_OF_STREAM.to_owned()))
            }
        }
    }

    fn accept_mutual(&mut self, matcher: &Matcher<'_>, message: Message) -> Result<Advance, CallError> {
        let index = self.received.len();
        let rule = match self.rule.clone() {
            Some(rule) => rule,
            None => {
                let first = matcher
                    .candidates(&self.method, self.stream_type, std::slice::from_ref(&message))
                    .into_iter()
                    .next();
                let Some(rule) = first else {
                    return Err(self.unmatched_opening(matcher, message.to_compact_string()));
                };
                self.rule = Some(Arc::clone(&rule));
                rule
            }
        };

        let Some(input) = rule.input_at(index) else {
            return Err(self.mismatch(END_OF_STREAM.to_owned(), message.to_compact_string()));
        };
        if !input.accepts(&message) {
            return Err(self.mismatch(input.to_string(), message.to_compact_string()));
        }
        self.received.push(message);
        Ok(Advance::Step { rule, index })
    }

    fn end_mutual(&mut self, matcher: &Matcher<'_>) -> Result<Advance, CallError> {
        let Some(rule) = self.rule.clone() else {
            return Err(self.unmatched_opening(matcher, END_OF_STREAM.to_owned()));
        };
        let count = self.received.len();
        match rule.input_at(count) {
            Some(input) => Err(self.mismatch(input.to_string(), END_OF_STREAM.to_owned())),
            None => Ok(Advance::Done),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Errors
    // ═══════════════════════════════════════════════════════════════════════

    /// What the best remaining candidate expects at `step`.
    fn expected_at(&self, step: usize) -> String {
        self.candidates
            .first()
            .and_then(|rule| rule.input_at(step))
            .map_or_else(|| END_OF_STREAM.to_owned(), ToString::to_string)
    }

    /// Nothing accepts the opening event: `NotFound` when the method has no
    /// rule of this stream type, a step 0 mismatch otherwise.
    fn unmatched_opening(&mut self, matcher: &Matcher<'_>, received: String) -> CallError {
        self.candidates = matcher.candidates(&self.method, self.stream_type, &[]);
        if self.candidates.is_empty() {
            return self.not_found();
        }
        let expected = self.expected_at(0);
        self.mismatch(expected, received)
    }

    fn not_found(&self) -> CallError {
        CallError::NotFound {
            method: self.method.clone(),
            stream_type: self.stream_type,
        }
    }

    fn mismatch(&self, expected: String, received: String) -> CallError {
        CallError::SequenceMismatch {
            method: self.method.clone(),
            step: self.received.len(),
            expected,
            received,
        }
    }
}
