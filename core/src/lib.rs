//! mockrpc - rule-driven engine for mock gRPC services
//!
//! Given a set of configured rules, decides what a mock service answers to
//! each call: unary, client-stream, server-stream or mutual-stream.
//!
//! # Architecture
//!
//! ```text
//!   transport ──▶ Dispatcher ──▶ Session ──▶ Matcher ──▶ RuleStore
//!                     │              │
//!                     └──────────────┴──▶ Responder ──▶ messages | ErrorDescriptor
//! ```
//!
//! - [`RuleStore`]: ordered rules per method, immutable after [`RuleStoreBuilder::build`]
//! - [`Matcher`]: first-match-wins selection over a method's rules
//! - [`Session`]: per-call step sequencing for streaming calls
//! - [`Responder`]: configured messages or configured error, verbatim
//! - [`Dispatcher`]: owns each [`Call`] from start to finish
//!
//! # Key Design Insights
//!
//! 1. **Registration order is match order**: the first rule whose inputs accept
//!    the call wins. Put specific rules before wildcards; rules that can never
//!    win are reported by [`RuleStore::shadowed`].
//!
//! 2. **Missing field → false**: a field predicate whose path does not resolve
//!    never matches.
//!
//! 3. **Validate at load time**: patterns, limits and rule shapes are checked
//!    when configuration is compiled, never during a call.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use mockrpc::prelude::*;
//! use serde_json::json;
//!
//! let config = MockConfig::from_yaml(r#"
//! packageName: greeter
//! serviceName: Greeter
//! rules:
//!   - { method: hello, input: { message: Hi }, output: { message: "A little familar, are't you" } }
//!   - method: chat
//!     streamType: mutual
//!     stream:
//!       - { input: { message: Hi }, output: { message: Hi there } }
//! "#).unwrap();
//!
//! let dispatcher = Dispatcher::new(Arc::new(config.build().unwrap()));
//!
//! let reply = dispatcher
//!     .unary("/greeter.Greeter/hello", Message::from(json!({ "message": "Hi" })))
//!     .unwrap();
//! assert_eq!(reply[0].field("message").as_str(), Some("A little familar, are't you"));
//!
//! let mut call = dispatcher.start("chat", StreamType::MutualStream);
//! let out = call.on_message(Message::from(json!({ "message": "Hi" }))).unwrap();
//! assert_eq!(out, vec![Message::from(json!({ "message": "Hi there" }))]);
//! assert!(call.finish().unwrap().is_empty());
//! ```

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod config;
mod dispatcher;
mod error;
mod input_matcher;
mod matcher;
mod message;
mod method;
mod pattern;
mod responder;
mod rule;
mod session;
mod store;
mod string_match;
pub mod trace;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

// Core types
pub use dispatcher::{Call, Dispatcher};
pub use matcher::Matcher;
pub use message::{FieldData, Message};
pub use method::MethodPath;
pub use pattern::{FieldPredicate, MessageMatcher};
pub use responder::{status, ErrorDescriptor, Reply, Responder};
pub use rule::{Exchange, Outcome, Rule, RuleKind, StreamType};
pub use session::{Advance, Session, SessionState};
pub use store::{RuleStore, RuleStoreBuilder, ServiceInfo, Shadowed};

// Config types
pub use config::{FieldsSpec, MessageMatchSpec, MockConfig, RuleConfig, StepConfig};
pub use string_match::{FieldMatchSpec, StringMatchSpec};

// Matchers
pub use input_matcher::{BoolMatcher, InputMatcher, IntMatcher, StringMatcher};

// Errors
pub use error::{CallError, ConfigError};

// Trace types
pub use trace::{FieldTrace, MatchTrace, PatternTrace, RuleTrace, SkipReason, StepTrace};

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════════════════════════════════════════

/// Prelude module for convenient imports.
///
/// ```
/// use mockrpc::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Core types
        Call,
        // Errors
        CallError,
        ConfigError,
        Dispatcher,
        ErrorDescriptor,
        Exchange,
        Matcher,
        Message,
        MessageMatcher,
        // Config types
        MockConfig,
        Outcome,
        Rule,
        RuleStore,
        RuleStoreBuilder,
        StreamType,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum length for non-regex string match patterns (exact, prefix, suffix, contains).
pub const MAX_PATTERN_LENGTH: usize = 8192;

/// Maximum length for regex patterns, field-level or whole-message.
///
/// Shorter than [`MAX_PATTERN_LENGTH`] because regex compilation cost grows
/// faster than literal matching.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4096;

/// Maximum number of field predicates in one `fields` input.
pub const MAX_FIELD_PATTERNS: usize = 256;

/// Maximum number of rules registered for one method.
pub const MAX_RULES_PER_METHOD: usize = 1024;

/// Maximum number of stream steps in one rule.
pub const MAX_STREAM_STEPS: usize = 256;
