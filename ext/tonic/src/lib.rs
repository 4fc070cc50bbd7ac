//! mockrpc-tonic: gRPC status mapping for mockrpc
//!
//! The engine reports failures as plain [`ErrorDescriptor`]s. A tonic service
//! hands them back to its client as a [`tonic::Status`]:
//!
//! ```text
//! CallError ──▶ ErrorDescriptor { code, message, metadata } ──▶ tonic::Status
//! ```
//!
//! Configured errors keep their code, message and metadata verbatim. Metadata
//! entries that are not valid ASCII gRPC metadata are dropped with a warning.
//!
//! # Example
//!
//! ```
//! use mockrpc::ErrorDescriptor;
//! use mockrpc_tonic::IntoStatus;
//!
//! let status = ErrorDescriptor::new(3, "Message text is required")
//!     .with_metadata("key", "value")
//!     .into_status();
//!
//! assert_eq!(status.code(), tonic::Code::InvalidArgument);
//! assert_eq!(status.metadata().get("key").unwrap(), "value");
//! ```

use std::collections::BTreeMap;

use mockrpc::{CallError, ErrorDescriptor};
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, KeyAndValueRef, MetadataMap};
use tonic::{Code, Status};

/// Conversion into a [`tonic::Status`].
pub trait IntoStatus {
    /// Consume `self` and build the status sent to the client.
    fn into_status(self) -> Status;
}

impl IntoStatus for ErrorDescriptor {
    fn into_status(self) -> Status {
        let metadata = metadata_map(&self.metadata);
        Status::with_metadata(Code::from(self.code), self.message, metadata)
    }
}

impl IntoStatus for CallError {
    fn into_status(self) -> Status {
        self.into_descriptor().into_status()
    }
}

/// Recover a descriptor from a received status.
///
/// Binary metadata and values that are not valid UTF-8 text are skipped.
#[must_use]
pub fn descriptor_from_status(status: &Status) -> ErrorDescriptor {
    let metadata = status
        .metadata()
        .iter()
        .filter_map(|entry| match entry {
            KeyAndValueRef::Ascii(key, value) => value
                .to_str()
                .ok()
                .map(|v| (key.as_str().to_owned(), v.to_owned())),
            KeyAndValueRef::Binary(..) => None,
        })
        .collect();
    ErrorDescriptor {
        code: status.code() as i32,
        message: status.message().to_owned(),
        metadata,
    }
}

fn metadata_map(entries: &BTreeMap<String, String>) -> MetadataMap {
    let mut map = MetadataMap::new();
    for (key, value) in entries {
        let Ok(name) = AsciiMetadataKey::from_bytes(key.as_bytes()) else {
            tracing::warn!(key = %key, "dropping error metadata with invalid key");
            continue;
        };
        let Ok(value) = value.parse::<AsciiMetadataValue>() else {
            tracing::warn!(key = %key, "dropping error metadata with invalid value");
            continue;
        };
        map.insert(name, value);
    }
    map
}
