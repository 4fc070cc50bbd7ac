//! Rule store: ordered rules per method, immutable after build.
//!
//! Registration happens on a [`RuleStoreBuilder`]; [`build()`](RuleStoreBuilder::build)
//! validates limits, reports unreachable rules and produces a [`RuleStore`]
//! that is only ever read. Share it as `Arc<RuleStore>`: lookups need no
//! locking.
//!
//! # Example
//!
//! ```
//! use mockrpc::{MessageMatcher, Outcome, Rule, RuleStoreBuilder};
//! use serde_json::json;
//!
//! let store = RuleStoreBuilder::new()
//!     .register(Rule::unary(
//!         "goodbye",
//!         MessageMatcher::Any,
//!         Outcome::message(json!({ "message": "Goodbye" })),
//!     ))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(store.rules_for("goodbye").len(), 1);
//! assert!(store.rules_for("hello").is_empty());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::{ConfigError, Rule, MAX_RULES_PER_METHOD, MAX_STREAM_STEPS};

// ═══════════════════════════════════════════════════════════════════════════════
// Service identity
// ═══════════════════════════════════════════════════════════════════════════════

/// The gRPC service the rules were written for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Path of the `.proto` file, as configured. Informational only.
    pub proto_path: Option<String>,
    /// Proto package, e.g. `greeter`.
    pub package: Option<String>,
    /// Service name, e.g. `Greeter`.
    pub service: Option<String>,
}

impl ServiceInfo {
    /// Fully-qualified service name (`greeter.Greeter`), if a service is set.
    #[must_use]
    pub fn full_name(&self) -> Option<String> {
        let service = self.service.as_deref()?;
        Some(match self.package.as_deref() {
            Some(package) if !package.is_empty() => format!("{package}.{service}"),
            _ => service.to_owned(),
        })
    }

    /// Returns `true` if `name` addresses this service.
    ///
    /// Without a configured service every name is accepted. Otherwise `name`
    /// must be either the fully-qualified or the bare service name.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self.service.as_deref() {
            None => true,
            Some(service) => name == service || self.full_name().as_deref() == Some(name),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════════════════════

/// Write phase of the [`RuleStore`].
///
/// Rules are appended in registration order. Nothing is merged or
/// deduplicated: duplicates are legal and resolved by ordering at match time.
#[derive(Debug, Default)]
pub struct RuleStoreBuilder {
    service: ServiceInfo,
    rules: HashMap<String, Vec<Rule>>,
    order: Vec<String>,
}

impl RuleStoreBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service identity.
    #[must_use]
    pub fn service(mut self, service: ServiceInfo) -> Self {
        self.service = service;
        self
    }

    /// Append a rule to its method's list.
    #[must_use]
    pub fn register(mut self, rule: Rule) -> Self {
        self.push(rule);
        self
    }

    /// Append a rule in place.
    pub fn push(&mut self, rule: Rule) {
        let method = rule.method().to_owned();
        if !self.rules.contains_key(&method) {
            self.order.push(method.clone());
        }
        self.rules.entry(method).or_default().push(rule);
    }

    /// Validate limits and freeze the store.
    ///
    /// Rules that can never be selected because an earlier rule accepts
    /// everything they accept are logged at `warn` and listed by
    /// [`RuleStore::shadowed`]. They are kept, not removed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TooManyRules`] if a method has more than
    /// [`MAX_RULES_PER_METHOD`] rules, or [`ConfigError::TooManySteps`] if a
    /// rule has more than [`MAX_STREAM_STEPS`] stream steps.
    pub fn build(self) -> Result<RuleStore, ConfigError> {
        let mut rules = HashMap::with_capacity(self.rules.len());
        let mut shadowed = Vec::new();

        for (method, list) in self.rules {
            if list.len() > MAX_RULES_PER_METHOD {
                return Err(ConfigError::TooManyRules {
                    method,
                    count: list.len(),
                    max: MAX_RULES_PER_METHOD,
                });
            }
            if let Some(rule) = list.iter().find(|r| r.step_count() > MAX_STREAM_STEPS) {
                return Err(ConfigError::TooManySteps {
                    method,
                    count: rule.step_count(),
                    max: MAX_STREAM_STEPS,
                });
            }

            for (index, rule) in list.iter().enumerate() {
                if let Some(by) = list[..index].iter().position(|e| rule.is_shadowed_by(e)) {
                    tracing::warn!(
                        method = %method,
                        stream_type = %rule.stream_type(),
                        rule = index,
                        shadowed_by = by,
                        "rule is unreachable: an earlier rule accepts everything it accepts"
                    );
                    shadowed.push(Shadowed {
                        method: method.clone(),
                        index,
                        by,
                    });
                }
            }

            rules.insert(method, list.into_iter().map(Arc::new).collect());
        }

        // HashMap iteration order is arbitrary; report in registration order.
        shadowed.sort_by_key(|s| {
            (
                self.order.iter().position(|m| *m == s.method),
                s.index,
            )
        });

        let store = RuleStore {
            service: self.service,
            rules,
            order: self.order,
            shadowed,
        };
        tracing::debug!(
            methods = store.order.len(),
            rules = store.len(),
            shadowed = store.shadowed.len(),
            "rule store built"
        );
        Ok(store)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store
// ═══════════════════════════════════════════════════════════════════════════════

/// A rule that can never be selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shadowed {
    /// Method of both rules.
    pub method: String,
    /// Index of the unreachable rule in the method's list.
    pub index: usize,
    /// Index of the earlier rule that wins instead.
    pub by: usize,
}

/// Immutable store of rules, keyed by method name.
///
/// # INV: registration order is match order
///
/// [`rules_for`](Self::rules_for) returns rules in the order they were
/// registered, and the [`Matcher`](crate::Matcher) picks the first that
/// accepts. Register more specific rules before looser ones.
#[derive(Debug)]
pub struct RuleStore {
    service: ServiceInfo,
    rules: HashMap<String, Vec<Arc<Rule>>>,
    order: Vec<String>,
    shadowed: Vec<Shadowed>,
}

impl RuleStore {
    /// Start building a store.
    #[must_use]
    pub fn builder() -> RuleStoreBuilder {
        RuleStoreBuilder::new()
    }

    /// Rules registered under exactly `method`, in registration order.
    ///
    /// Empty if none are registered.
    #[must_use]
    pub fn rules_for(&self, method: &str) -> &[Arc<Rule>] {
        self.rules.get(method).map(Vec::as_slice).unwrap_or_default()
    }

    /// Resolve a method name as written by a client.
    ///
    /// Tries `method` verbatim, then with a lowercase first letter, so that
    /// `SayHello` finds rules written for `sayHello`. Returns the registered
    /// name on success.
    #[must_use]
    pub fn resolve(&self, method: &str) -> Option<&str> {
        if let Some((name, _)) = self.rules.get_key_value(method) {
            return Some(name);
        }
        let mut chars = method.chars();
        let first = chars.next()?;
        if first.is_lowercase() {
            return None;
        }
        let lowered: String = first.to_lowercase().chain(chars).collect();
        self.rules.get_key_value(&lowered).map(|(name, _)| name.as_str())
    }

    /// Registered method names, in first-registration order.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Total number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    /// Returns `true` if no rules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The configured service identity.
    #[must_use]
    pub fn service(&self) -> &ServiceInfo {
        &self.service
    }

    /// Rules that can never be selected, in registration order.
    #[must_use]
    pub fn shadowed(&self) -> &[Shadowed] {
        &self.shadowed
    }
}
