//! Domain model of the keel agent.
//!
//! Container and task status enumerations, the concurrency-safe container record,
//! the progression rules and the message shapes exchanged with the backend.

mod error;
pub use error::ModelError;

mod domain;
pub use domain::*;

mod message;
pub use message::*;
