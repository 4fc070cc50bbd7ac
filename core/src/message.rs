//! `Message`: the request/response payload that flows through the engine
//!
//! Messages are kept in their JSON object model (`serde_json::Value`). The
//! transport layer owns protobuf encoding; the engine only ever sees the
//! structured form, which is also what rule files are written in.
//!
//! # Field access
//!
//! [`Message::field`] resolves a dot-separated path and returns a borrowed,
//! type-erased [`FieldData`]. Numeric segments index into arrays:
//!
//! ```
//! use mockrpc::{FieldData, Message};
//!
//! let msg = Message::from(serde_json::json!({
//!     "user": { "name": "alice", "tags": ["a", "b"] }
//! }));
//! assert_eq!(msg.field("user.name"), FieldData::String("alice"));
//! assert_eq!(msg.field("user.tags.1"), FieldData::String("b"));
//! assert!(msg.field("user.email").is_none());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A structured gRPC message in its JSON object model.
///
/// Equality is structural: two messages are equal when their JSON trees are
/// equal, independent of object key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Value);

impl Message {
    /// Wrap a JSON value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// An empty message (`{}`).
    #[must_use]
    pub fn empty() -> Self {
        Self(Value::Object(serde_json::Map::new()))
    }

    /// Borrow the underlying JSON value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Take the underlying JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Returns `true` if this message is a JSON object with no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.as_object().is_some_and(serde_json::Map::is_empty)
    }

    /// Resolve a dot-separated field path.
    ///
    /// Returns [`FieldData::None`] when any segment is missing, when a
    /// segment indexes into a scalar, or when an array index is not a number.
    #[must_use]
    pub fn field(&self, path: &str) -> FieldData<'_> {
        let mut current = &self.0;
        for segment in path.split('.') {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return FieldData::None,
            }
        }
        FieldData::from(current)
    }

    /// Compact JSON rendering.
    ///
    /// Object keys come out sorted because `serde_json` keeps maps in a
    /// `BTreeMap`; enabling its `preserve_order` feature would keep
    /// insertion order instead. Whole-message patterns are evaluated
    /// against this string.
    #[must_use]
    pub fn to_compact_string(&self) -> String {
        self.0.to_string()
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<Message> for Value {
    fn from(message: Message) -> Self {
        message.0
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-erased view of one message field.
///
/// This is what [`InputMatcher`](crate::InputMatcher) implementations consume.
/// Strings are borrowed from the message, so extraction never allocates.
///
/// # INV: None → no match
///
/// A missing field is [`FieldData::None`]; field predicates evaluate to
/// `false` on it without consulting the matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldData<'a> {
    /// The path does not resolve to a value.
    None,
    /// Explicit JSON `null`.
    Null,
    /// String field.
    String(&'a str),
    /// Integer field (fits in `i64`).
    Int(i64),
    /// Non-integer number.
    Float(f64),
    /// Boolean field.
    Bool(bool),
    /// Nested object or array.
    Structured(&'a Value),
}

impl<'a> FieldData<'a> {
    /// Returns `true` if the path did not resolve.
    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Try to get the value as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Self::String(s) => Some(s),
            _ => Option::None,
        }
    }

    /// Try to get the value as an integer.
    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => Option::None,
        }
    }

    /// Try to get the value as a boolean.
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => Option::None,
        }
    }

    /// Returns a string describing the type of this data.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Structured(_) => "structured",
        }
    }
}

impl<'a> From<&'a Value> for FieldData<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Structured(value)),
            Value::String(s) => Self::String(s.as_str()),
            Value::Array(_) | Value::Object(_) => Self::Structured(value),
        }
    }
}
