//! # Relay Testing Utils
//!
//! Shared test doubles for the relay workspace: scripted senders and
//! listeners, recording monitoring sinks and audit logs, and configuration
//! builders.
//!
//! ```toml
//! [dev-dependencies]
//! relay-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
