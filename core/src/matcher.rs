//! `Matcher`: first-match-wins rule selection.
//!
//! Rules for a method are tried in registration order; only rules of the
//! call's stream type are candidates. The first rule whose input matchers
//! accept the messages, step by step, wins. Register more specific rules
//! before looser ones: a wildcard registered first takes every call.

use std::sync::Arc;

use crate::trace::{MatchTrace, RuleTrace, SkipReason, StepTrace};
use crate::{CallError, Message, MethodPath, Rule, RuleStore, StreamType};

/// Read-only rule lookup over a [`RuleStore`].
///
/// Borrowing the store keeps lookups lock-free; create one per lookup or per
/// call, it is a single reference.
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'s> {
    store: &'s RuleStore,
}

impl<'s> Matcher<'s> {
    /// Create a matcher over `store`.
    #[must_use]
    pub fn new(store: &'s RuleStore) -> Self {
        Self { store }
    }

    /// The store this matcher reads.
    #[must_use]
    pub fn store(&self) -> &'s RuleStore {
        self.store
    }

    /// Rules for a method as addressed by a client.
    ///
    /// `method` may be bare or a full gRPC path. A path naming another service
    /// yields no rules.
    #[must_use]
    pub fn rules(&self, method: &str) -> &'s [Arc<Rule>] {
        let path = MethodPath::parse(method);
        if let Some(service) = path.service {
            if !self.store.service().matches(service) {
                return &[];
            }
        }
        self.store
            .resolve(path.method)
            .map(|name| self.store.rules_for(name))
            .unwrap_or_default()
    }

    /// Find the rule answering the full message sequence of a call.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::NotFound`] if no rule of `stream_type` accepts
    /// exactly `messages`.
    pub fn find(
        &self,
        method: &str,
        stream_type: StreamType,
        messages: &[Message],
    ) -> Result<Arc<Rule>, CallError> {
        self.rules(method)
            .iter()
            .find(|rule| rule.stream_type() == stream_type && rule.accepts_sequence(messages))
            .cloned()
            .ok_or_else(|| CallError::NotFound {
                method: method.to_owned(),
                stream_type,
            })
    }

    /// Rules of `stream_type` whose first `prefix.len()` steps accept `prefix`,
    /// in registration order.
    #[must_use]
    pub fn candidates(
        &self,
        method: &str,
        stream_type: StreamType,
        prefix: &[Message],
    ) -> Vec<Arc<Rule>> {
        self.rules(method)
            .iter()
            .filter(|rule| rule.stream_type() == stream_type && rule.accepts_prefix(prefix))
            .cloned()
            .collect()
    }

    /// Like [`find`](Self::find), recording why each rule did or did not match.
    ///
    /// # INV: `trace.result` agrees with `find()`
    ///
    /// The winning index is the position of the rule `find` returns, and
    /// tracing stops after it.
    #[must_use]
    pub fn find_with_trace(
        &self,
        method: &str,
        stream_type: StreamType,
        messages: &[Message],
    ) -> MatchTrace {
        let mut rules = Vec::new();
        let mut result = None;

        for (index, rule) in self.rules(method).iter().enumerate() {
            if rule.stream_type() != stream_type {
                rules.push(RuleTrace {
                    index,
                    matched: false,
                    skipped: Some(SkipReason::StreamType(rule.stream_type())),
                    steps: Vec::new(),
                });
                continue;
            }
            if rule.input_count() != messages.len() {
                rules.push(RuleTrace {
                    index,
                    matched: false,
                    skipped: Some(SkipReason::StepCount {
                        expected: rule.input_count(),
                        received: messages.len(),
                    }),
                    steps: Vec::new(),
                });
                continue;
            }

            let mut steps = Vec::with_capacity(messages.len());
            let mut matched = true;
            for (step, message) in messages.iter().enumerate() {
                let Some(input) = rule.input_at(step) else {
                    matched = false;
                    break;
                };
                let pattern = input.accepts_with_trace(message);
                let ok = pattern.matched();
                steps.push(StepTrace { step, pattern });
                if !ok {
                    matched = false;
                    break;
                }
            }

            rules.push(RuleTrace {
                index,
                matched,
                skipped: None,
                steps,
            });
            if matched {
                result = Some(index);
                break;
            }
        }

        MatchTrace {
            method: method.to_owned(),
            stream_type,
            result,
            rules,
        }
    }
}
