//! mockrpc-test: fixture conformance for the mockrpc engine
//!
//! Fixtures are YAML documents pairing a rules document with calls and their
//! expected outcomes. The runner drives every call through a
//! [`Dispatcher`](mockrpc::Dispatcher) exactly as a transport would: one
//! `on_message` per inbound message, then `finish`.
//!
//! # Example
//!
//! ```
//! use mockrpc_test::fixture::Fixture;
//!
//! let fixture = Fixture::from_yaml(r#"
//! name: goodbye
//! config:
//!   rules:
//!     - { method: goodbye, input: ".*", output: { message: Goodbye } }
//! cases:
//!   - name: anything says goodbye
//!     method: goodbye
//!     inputs: [{ message: Bye }]
//!     expect:
//!       outputs: [{ message: Goodbye }]
//! "#).unwrap();
//!
//! fixture.run_and_assert();
//! ```

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub mod fixture;

/// Install a test-friendly subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::fixture::{CaseResult, Fixture, FixtureCase};
    pub use super::init_tracing;
    pub use mockrpc::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_twice_does_not_panic() {
        init_tracing();
        init_tracing();
    }
}
