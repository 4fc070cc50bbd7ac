//! Conformance fixture runner
//!
//! Loads YAML fixtures and runs them against the mockrpc engine.
//!
//! ```yaml
//! name: greeter unary
//! description: exact inputs select their rule
//! config:                      # a rules document, as MockConfig reads it
//!   rules:
//!     - { method: hello, input: { message: Hi }, output: { message: Hey } }
//! cases:
//!   - name: hi
//!     method: hello            # bare name or /package.Service/method
//!     stream_type: unary       # default
//!     inputs: [{ message: Hi }]
//!     expect:
//!       outputs: [{ message: Hey }]
//!   - name: unknown
//!     method: hello
//!     inputs: [{ message: Yo }]
//!     expect:
//!       error: { code: 12 }    # message and metadata are optional
//! ```
//!
//! A fixture with `expect_error: true` must fail to load and has no cases.

use std::collections::BTreeMap;
use std::sync::Arc;

use mockrpc::prelude::*;
use serde::Deserialize;

/// A complete test fixture
#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Raw rules document.
    pub config: serde_json::Value,
    /// The document must be rejected at load time.
    #[serde(default)]
    pub expect_error: bool,
    /// Rules reported as unreachable, checked when present.
    #[serde(default)]
    pub shadowed: Option<Vec<ShadowedRule>>,
    #[serde(default)]
    pub cases: Vec<FixtureCase>,
}

/// An expected unreachable rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShadowedRule {
    pub method: String,
    pub index: usize,
}

/// One call and its expected outcome.
#[derive(Debug, Deserialize)]
pub struct FixtureCase {
    pub name: String,
    pub method: String,
    #[serde(default)]
    pub stream_type: StreamType,
    #[serde(default)]
    pub inputs: Vec<Message>,
    pub expect: Expectation,
}

/// Expected outcome of a call.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expectation {
    /// Every emitted message, in order, including those before an error.
    #[serde(default)]
    pub outputs: Vec<Message>,
    /// Messages emitted right after each inbound message, checked when present.
    #[serde(default)]
    pub per_message: Option<Vec<Vec<Message>>>,
    /// The error that ends the call, if any.
    #[serde(default)]
    pub error: Option<ExpectedError>,
}

/// Expected protocol-level error.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectedError {
    pub code: i32,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl ExpectedError {
    fn matches(&self, actual: &ErrorDescriptor) -> bool {
        self.code == actual.code
            && self.message.as_ref().map_or(true, |m| *m == actual.message)
            && self.metadata.as_ref().map_or(true, |m| *m == actual.metadata)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Runner
// ═══════════════════════════════════════════════════════════════════════════════

/// What a call actually did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CallRecord {
    /// Emissions after each accepted inbound message.
    pub per_message: Vec<Vec<Message>>,
    /// Emissions at end of stream.
    pub on_finish: Vec<Message>,
    /// The error that ended the call.
    pub error: Option<ErrorDescriptor>,
}

impl CallRecord {
    /// Every emitted message, in order.
    #[must_use]
    pub fn outputs(&self) -> Vec<Message> {
        self.per_message
            .iter()
            .flatten()
            .chain(&self.on_finish)
            .cloned()
            .collect()
    }
}

/// Result of running a single test case
#[derive(Debug)]
pub struct CaseResult {
    pub case_name: String,
    pub passed: bool,
    pub failure: Option<String>,
    pub actual: CallRecord,
}

impl FixtureCase {
    /// Drive this call through `dispatcher` the way a transport would.
    #[must_use]
    pub fn drive(&self, dispatcher: &Dispatcher) -> CallRecord {
        let mut call = dispatcher.start(&self.method, self.stream_type);
        let mut record = CallRecord::default();

        for input in &self.inputs {
            match call.on_message(input.clone()) {
                Ok(out) => record.per_message.push(out),
                Err(err) => {
                    record.error = Some(err.into_descriptor());
                    return record;
                }
            }
        }

        match call.finish() {
            Ok(out) => record.on_finish = out,
            Err(err) => record.error = Some(err.into_descriptor()),
        }
        record
    }

    /// Run against `dispatcher` and compare with the expectation.
    #[must_use]
    pub fn run(&self, dispatcher: &Dispatcher) -> CaseResult {
        let actual = self.drive(dispatcher);
        let failure = self.check(&actual);
        CaseResult {
            case_name: self.name.clone(),
            passed: failure.is_none(),
            failure,
            actual,
        }
    }

    fn check(&self, actual: &CallRecord) -> Option<String> {
        let outputs = actual.outputs();
        if outputs != self.expect.outputs {
            return Some(format!(
                "expected outputs {:?}, got {outputs:?}",
                self.expect.outputs
            ));
        }
        if let Some(per_message) = &self.expect.per_message {
            if *per_message != actual.per_message {
                return Some(format!(
                    "expected per-message outputs {per_message:?}, got {:?}",
                    actual.per_message
                ));
            }
        }
        match (&self.expect.error, &actual.error) {
            (None, None) => None,
            (Some(expected), Some(got)) if expected.matches(got) => None,
            (expected, got) => Some(format!("expected error {expected:?}, got {got:?}")),
        }
    }
}

impl Fixture {
    /// Parse a fixture from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Parse multiple fixtures from a YAML file with `---` separators
    pub fn from_yaml_multi(yaml: &str) -> Result<Vec<Self>, serde_yaml::Error> {
        let mut fixtures = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(yaml) {
            fixtures.push(Self::deserialize(doc)?);
        }
        Ok(fixtures)
    }

    /// Compile the fixture's rules document.
    pub fn load(&self) -> Result<RuleStore, ConfigError> {
        MockConfig::from_value(self.config.clone())?.build()
    }

    /// Run all test cases against an already loaded store.
    pub fn run(&self, store: RuleStore) -> Vec<CaseResult> {
        let dispatcher = Dispatcher::new(Arc::new(store));
        self.cases
            .iter()
            .map(|case| {
                let result = case.run(&dispatcher);
                tracing::debug!(
                    fixture = %self.name,
                    case = %case.name,
                    passed = result.passed,
                    "ran fixture case"
                );
                result
            })
            .collect()
    }

    /// Load, run all test cases and panic on first failure
    pub fn run_and_assert(&self) {
        let loaded = self.load();
        if self.expect_error {
            assert!(
                loaded.is_err(),
                "Fixture '{}' expected a config error, but the rules loaded",
                self.name
            );
            return;
        }
        let store = loaded
            .unwrap_or_else(|e| panic!("Fixture '{}' failed to load: {e}", self.name));

        if let Some(expected) = &self.shadowed {
            let actual: Vec<ShadowedRule> = store
                .shadowed()
                .iter()
                .map(|s| ShadowedRule {
                    method: s.method.clone(),
                    index: s.index,
                })
                .collect();
            assert_eq!(
                &actual, expected,
                "Fixture '{}' reported unexpected shadowed rules",
                self.name
            );
        }

        for result in self.run(store) {
            assert!(
                result.passed,
                "Fixture '{}' case '{}' failed: {}",
                self.name,
                result.case_name,
                result.failure.unwrap_or_default()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT: &str = r#"
name: chat
config:
  rules:
    - method: chat
      streamType: mutual
      stream:
        - { input: { message: Hi }, output: { message: Hi there } }
        - { input: { message: "How are you?" }, output: { message: "I'm fine, thank you." } }
cases:
  - name: lockstep
    method: chat
    stream_type: mutual
    inputs: [{ message: Hi }, { message: "How are you?" }]
    expect:
      outputs: [{ message: Hi there }, { message: "I'm fine, thank you." }]
      per_message: [[{ message: Hi there }], [{ message: "I'm fine, thank you." }]]
  - name: wrong second step
    method: chat
    stream_type: mutual
    inputs: [{ message: Hi }, { message: Bye }]
    expect:
      outputs: [{ message: Hi there }]
      error: { code: 9 }
"#;

    #[test]
    fn chat_fixture_passes() {
        let fixture = Fixture::from_yaml(CHAT).unwrap();
        let results = fixture.run(fixture.load().unwrap());
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.passed), "{results:?}");
    }

    #[test]
    fn wrong_expectation_fails_with_reason() {
        let fixture = Fixture::from_yaml(
            r#"
name: wrong
config:
  rules:
    - { method: m, output: { a: 1 } }
cases:
  - name: expects the wrong thing
    method: m
    inputs: [{}]
    expect:
      outputs: [{ a: 2 }]
"#,
        )
        .unwrap();
        let results = fixture.run(fixture.load().unwrap());
        assert!(!results[0].passed);
        assert!(results[0].failure.as_deref().unwrap().starts_with("expected outputs"));
    }

    #[test]
    fn multi_document() {
        let yaml = format!("{CHAT}\n---\n{CHAT}");
        assert_eq!(Fixture::from_yaml_multi(&yaml).unwrap().len(), 2);
    }

    #[test]
    fn expected_error_partial_match() {
        let expected = ExpectedError {
            code: 3,
            message: None,
            metadata: Some(BTreeMap::from([("key".to_owned(), "value".to_owned())])),
        };
        let actual = ErrorDescriptor::new(3, "Message text is required").with_metadata("key", "value");
        assert!(expected.matches(&actual));
        assert!(!expected.matches(&ErrorDescriptor::new(3, "Message text is required")));
    }
}
