//! Error types.
//!
//! Two families, caught at different times:
//!
//! - [`ConfigError`]: rule files and rule construction, at load time.
//!   Fix the configuration and reload.
//! - [`CallError`]: a single RPC, at dispatch time. Reported once to the
//!   call that triggered it and never retried.

use crate::{status, ErrorDescriptor, StreamType};
use std::path::PathBuf;

/// Errors from loading rule configuration and building the store.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The rules file could not be read.
    #[error("failed to read \"{}\": {source}", path.display())]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// JSON syntax or shape error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML syntax error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A regex or input pattern is invalid.
    #[error("invalid pattern \"{pattern}\": {reason}")]
    InvalidPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A string match pattern exceeds the maximum allowed length.
    #[error("pattern length is {len}, but maximum allowed is {max}")]
    PatternTooLong {
        /// Actual length of the pattern.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// A field input names too many fields.
    #[error("field input has {count} fields, but maximum allowed is {max}")]
    TooManyFields {
        /// Actual field count.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// A rule record does not have the shape its stream type requires.
    #[error("rule #{index} (`{method}`): {reason}")]
    InvalidRule {
        /// Position of the record in the rules list.
        index: usize,
        /// Method the record names.
        method: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Too many rules registered for one method.
    #[error("`{method}` has {count} rules, but maximum allowed is {max}")]
    TooManyRules {
        /// The method.
        method: String,
        /// Actual count.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// A rule has too many stream steps.
    #[error("a rule for `{method}` has {count} stream steps, but maximum allowed is {max}")]
    TooManySteps {
        /// The method.
        method: String,
        /// Actual count.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },
}

/// Why a call failed.
///
/// `NotFound` and `SequenceMismatch` mean the fixture and the client
/// disagree; `Configured` is the rule's intended outcome and is delivered
/// verbatim.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    /// No rule matches the method and input.
    #[error("no {stream_type} rule for `{method}` matches the request")]
    NotFound {
        /// Method called.
        method: String,
        /// Stream type of the call.
        stream_type: StreamType,
    },

    /// A streaming input does not match the expected step.
    #[error("`{method}` step {step}: expected {expected}, received {received}")]
    SequenceMismatch {
        /// Method called.
        method: String,
        /// Step index at which the mismatch happened.
        step: usize,
        /// What the matched rule expected there.
        expected: String,
        /// What actually arrived.
        received: String,
    },

    /// The matched rule is configured to fail.
    #[error("{}", .0.message)]
    Configured(ErrorDescriptor),
}

impl CallError {
    /// Short machine-readable kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::SequenceMismatch { .. } => "SEQUENCE_MISMATCH",
            Self::Configured(_) => "CONFIGURED",
        }
    }

    /// gRPC status code for this error.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => status::UNIMPLEMENTED,
            Self::SequenceMismatch { .. } => status::FAILED_PRECONDITION,
            Self::Configured(descriptor) => descriptor.code,
        }
    }

    /// The protocol-level error to send back to the client.
    ///
    /// Configured errors are returned unchanged, metadata included.
    #[must_use]
    pub fn to_descriptor(&self) -> ErrorDescriptor {
        match self {
            Self::Configured(descriptor) => descriptor.clone(),
            other => ErrorDescriptor::new(other.code(), other.to_string()),
        }
    }

    /// Consume into the protocol-level error.
    #[must_use]
    pub fn into_descriptor(self) -> ErrorDescriptor {
        match self {
            Self::Configured(descriptor) => descriptor,
            other => other.to_descriptor(),
        }
    }
}
