//! Rule configuration: serde types compiled into a [`RuleStore`].
//!
//! These types mirror the runtime types but are deserializable, and are
//! validated when compiled. Every pattern, limit and rule shape is checked
//! at load time, never at call time.
//!
//! # Relationship to runtime types
//!
//! | Config type | Runtime type | Compiled by |
//! |-------------|--------------|-------------|
//! | [`MockConfig`] | [`RuleStore`] | [`MockConfig::build`] |
//! | [`RuleConfig`] | [`Rule`] | [`RuleConfig::compile`] |
//! | [`MessageMatchSpec`] | [`MessageMatcher`] | [`MessageMatchSpec::compile`] |
//! | [`FieldMatchSpec`] | `Box<dyn InputMatcher>` | [`FieldMatchSpec::to_input_matcher`] |
//!
//! # Document shape
//!
//! ```yaml
//! protoPath: /proto/greeter.proto
//! packageName: greeter
//! serviceName: Greeter
//! rules:
//!   - { method: hello, input: { message: Hello }, output: { message: Hello } }
//!   - { method: goodbye, input: ".*", output: { message: Goodbye } }
//!   - method: howAreYou
//!     streamType: client
//!     stream:
//!       - input: { message: Hi }
//!       - input: { message: "How are you?" }
//!     output: { message: "I'm fine, thank you" }
//! ```
//!
//! A bare `rules` array is accepted as a document too.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ConfigError, ErrorDescriptor, Exchange, FieldMatchSpec, FieldPredicate, Message,
    MessageMatcher, Outcome, Rule, RuleKind, RuleStore, RuleStoreBuilder, ServiceInfo,
    StreamType, MAX_FIELD_PATTERNS, MAX_REGEX_PATTERN_LENGTH,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Document
// ═══════════════════════════════════════════════════════════════════════════════

/// A rules document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockConfig {
    /// Path of the `.proto` file the rules were written against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto_path: Option<String>,

    /// Proto package of the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,

    /// Service name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// Rules, in match order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl MockConfig {
    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] on syntax or shape errors.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_value(value)
    }

    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] on syntax errors and
    /// [`ConfigError::Json`] on shape errors.
    pub fn from_yaml(input: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(input)?;
        Self::from_value(value)
    }

    /// Read a document from disk: `.json` files as JSON, anything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, plus any
    /// parse error of the chosen format.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json(&input)?
        } else {
            Self::from_yaml(&input)?
        };
        tracing::debug!(
            path = %path.display(),
            rules = config.rules.len(),
            "loaded rules document"
        );
        Ok(config)
    }

    /// Interpret an already-parsed document.
    ///
    /// Accepts either a full document or a bare `rules` array.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] on shape errors.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        if value.is_array() {
            return Ok(Self {
                rules: serde_json::from_value(value)?,
                ..Self::default()
            });
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Service identity of this document.
    #[must_use]
    pub fn service(&self) -> ServiceInfo {
        ServiceInfo {
            proto_path: self.proto_path.clone(),
            package: self.package_name.clone(),
            service: self.service_name.clone(),
        }
    }

    /// Compile every rule and build the store.
    ///
    /// # Errors
    ///
    /// The first rule that fails to compile, or a store limit violation.
    pub fn build(&self) -> Result<RuleStore, ConfigError> {
        let mut builder = RuleStoreBuilder::new().service(self.service());
        for (index, rule) in self.rules.iter().enumerate() {
            builder.push(rule.compile(index)?);
        }
        builder.build()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Rules
// ═══════════════════════════════════════════════════════════════════════════════

/// One rule record.
///
/// Which keys are allowed depends on `streamType`:
///
/// | `streamType` | `input` | `stream` steps | response |
/// |--------------|---------|----------------|----------|
/// | `unary` | optional | none | `output` or `error` |
/// | `client` | none | `input` only | `output` or `error` |
/// | `server` | optional | `output` only | the steps, `output` or `error` |
/// | `mutual` | none | `input` and `output` | the steps |
///
/// A missing `input` accepts any message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleConfig {
    /// Method name.
    pub method: String,

    /// Stream type; `unary` when omitted.
    #[serde(default)]
    pub stream_type: StreamType,

    /// Expected request (unary and server-stream).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<MessageMatchSpec>,

    /// Per-step inputs and outputs (streaming types).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<Vec<StepConfig>>,

    /// Single response message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Message>,

    /// Configured failure instead of a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
}

/// One step of a streaming rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Expected request at this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<MessageMatchSpec>,

    /// Response at this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Message>,
}

impl RuleConfig {
    /// Compile into a runtime [`Rule`].
    ///
    /// `index` is the record's position, used in error messages.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidRule`] if the record's keys do not fit its stream
    /// type, or any pattern error from its inputs.
    pub fn compile(&self, index: usize) -> Result<Rule, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidRule {
            index,
            method: self.method.clone(),
            reason: reason.to_owned(),
        };

        if self.method.is_empty() {
            return Err(invalid("method name is empty"));
        }

        let kind = match self.stream_type {
            StreamType::Unary => {
                if self.stream.is_some() {
                    return Err(invalid("unary rules cannot have `stream` steps"));
                }
                RuleKind::Unary {
                    input: self.compile_input()?,
                    outcome: self.terminal_outcome(&invalid)?,
                }
            }
            StreamType::ClientStream => {
                if self.input.is_some() {
                    return Err(invalid("client-stream rules take inputs from `stream` steps"));
                }
                let steps = self
                    .stream
                    .as_deref()
                    .ok_or_else(|| invalid("client-stream rules need `stream` steps"))?;
                if steps.iter().any(|s| s.output.is_some()) {
                    return Err(invalid("client-stream steps cannot have outputs"));
                }
                let inputs = steps
                    .iter()
                    .map(|s| compile_optional(s.input.as_ref()))
                    .collect::<Result<Vec<_>, _>>()?;
                RuleKind::ClientStream {
                    steps: inputs,
                    outcome: self.terminal_outcome(&invalid)?,
                }
            }
            StreamType::ServerStream => {
                let outcome = match (&self.stream, &self.output, &self.error) {
                    (Some(steps), None, None) => {
                        if steps.iter().any(|s| s.input.is_some()) {
                            return Err(invalid("server-stream steps cannot have inputs"));
                        }
                        let outputs = steps
                            .iter()
                            .map(|s| s.output.clone())
                            .collect::<Option<Vec<_>>>()
                            .ok_or_else(|| invalid("every server-stream step needs an `output`"))?;
                        Outcome::Messages(outputs)
                    }
                    (None, Some(output), None) => Outcome::message(output.clone()),
                    (None, None, Some(error)) => Outcome::Error(error.clone()),
                    (None, None, None) => {
                        return Err(invalid("needs `stream` steps, an `output` or an `error`"))
                    }
                    _ => {
                        return Err(invalid(
                            "`stream`, `output` and `error` are mutually exclusive",
                        ))
                    }
                };
                RuleKind::ServerStream {
                    input: self.compile_input()?,
                    outcome,
                }
            }
            StreamType::MutualStream => {
                if self.input.is_some() || self.output.is_some() {
                    return Err(invalid(
                        "mutual-stream rules take inputs and outputs from `stream` steps",
                    ));
                }
                if self.error.is_some() {
                    return Err(invalid("mutual-stream rules cannot carry an error"));
                }
                let steps = self
                    .stream
                    .as_deref()
                    .ok_or_else(|| invalid("mutual-stream rules need `stream` steps"))?;
                if steps.is_empty() {
                    return Err(invalid("mutual-stream rules need at least one step"));
                }
                let exchanges = steps
                    .iter()
                    .map(|s| {
                        let output = s
                            .output
                            .clone()
                            .ok_or_else(|| invalid("every mutual-stream step needs an `output`"))?;
                        let input = s
                            .input
                            .as_ref()
                            .ok_or_else(|| invalid("every mutual-stream step needs an `input`"))?
                            .compile()?;
                        Ok(Exchange { input, output })
                    })
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                RuleKind::MutualStream { steps: exchanges }
            }
        };

        Ok(Rule::new(self.method.clone(), kind))
    }

    fn compile_input(&self) -> Result<MessageMatcher, ConfigError> {
        compile_optional(self.input.as_ref())
    }

    fn terminal_outcome(
        &self,
        invalid: &dyn Fn(&str) -> ConfigError,
    ) -> Result<Outcome, ConfigError> {
        match (&self.output, &self.error) {
            (Some(output), None) => Ok(Outcome::message(output.clone())),
            (None, Some(error)) => Ok(Outcome::Error(error.clone())),
            (Some(_), Some(_)) => Err(invalid("`output` and `error` are mutually exclusive")),
            (None, None) => Err(invalid("needs an `output` or an `error`")),
        }
    }
}

fn compile_optional(spec: Option<&MessageMatchSpec>) -> Result<MessageMatcher, ConfigError> {
    spec.map_or(Ok(MessageMatcher::Any), MessageMatchSpec::compile)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Inputs
// ═══════════════════════════════════════════════════════════════════════════════

/// Expected-input specification.
///
/// Untagged; the variants are tried in order:
///
/// ```yaml
/// input: "^\\{\"message\":\"Hi"        # Pattern: regex over compact JSON
/// input: { fields: { message: Hi } }   # Fields: per-field matchers
/// input: { message: Hi }               # Exact: structural equality
/// input: {}                            # wildcard
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageMatchSpec {
    /// Whole-message regex. `.*`, `^.*$` and the empty string are the wildcard.
    Pattern(String),
    /// Per-field matchers.
    Fields(FieldsSpec),
    /// Exact message. `{}` is the wildcard.
    Exact(Value),
}

/// Field map of a [`MessageMatchSpec::Fields`] input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldsSpec {
    /// Field path to matcher. Every entry must hold.
    pub fields: BTreeMap<String, FieldMatchSpec>,
}

impl MessageMatchSpec {
    /// Compile into a runtime [`MessageMatcher`].
    ///
    /// # Errors
    ///
    /// - [`ConfigError::PatternTooLong`] / [`ConfigError::InvalidPattern`] for
    ///   bad regexes and field patterns.
    /// - [`ConfigError::TooManyFields`] over [`MAX_FIELD_PATTERNS`].
    /// - [`ConfigError::InvalidPattern`] for an exact input that is not an
    ///   object.
    pub fn compile(&self) -> Result<MessageMatcher, ConfigError> {
        match self {
            Self::Pattern(pattern) => {
                if matches!(pattern.as_str(), "" | ".*" | "^.*$") {
                    return Ok(MessageMatcher::Any);
                }
                if pattern.len() > MAX_REGEX_PATTERN_LENGTH {
                    return Err(ConfigError::PatternTooLong {
                        len: pattern.len(),
                        max: MAX_REGEX_PATTERN_LENGTH,
                    });
                }
                let re = regex::Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
                Ok(MessageMatcher::Pattern(re))
            }
            Self::Fields(spec) => {
                if spec.fields.len() > MAX_FIELD_PATTERNS {
                    return Err(ConfigError::TooManyFields {
                        count: spec.fields.len(),
                        max: MAX_FIELD_PATTERNS,
                    });
                }
                if spec.fields.is_empty() {
                    return Ok(MessageMatcher::Any);
                }
                let predicates = spec
                    .fields
                    .iter()
                    .map(|(path, field)| Ok(FieldPredicate::new(path, field.to_input_matcher()?)))
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                Ok(MessageMatcher::Fields(predicates))
            }
            Self::Exact(Value::Object(map)) if map.is_empty() => Ok(MessageMatcher::Any),
            Self::Exact(value @ Value::Object(_)) => Ok(MessageMatcher::exact(value.clone())),
            Self::Exact(other) => Err(ConfigError::InvalidPattern {
                pattern: other.to_string(),
                reason: "expected an object, a regex string or a `fields` map".to_owned(),
            }),
        }
    }
}
