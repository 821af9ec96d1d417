//! Configuration entities read by the engine, and the immutable log records it
//! writes.
//!
//! Everything here is populated by the external configuration layer (or the
//! fixtures file for the in-memory store). The engine never mutates these
//! entities itself.
//!
//! Dynamic payloads (condition values, response and callback bodies) are
//! carried as [`serde_json::Value`], so template and operator evaluation can
//! match on the value kind exhaustively.

mod callback;
mod definition;
mod project;
mod record;
mod rule;

pub use callback::Callback;
pub use definition::{MockDefinition, ServingMode};
pub use project::{Project, ProjectStatus};
pub use record::{CallLogRecord, CallbackLogRecord};
pub use rule::{Condition, ConditionGroup, ConditionOperator, GroupOperator, Rule};

/// Maximum number of rules per definition (configuration-time limit).
pub const MAX_RULES_PER_DEFINITION: usize = 5;

/// Maximum number of conditions per rule group (configuration-time limit).
pub const MAX_CONDITIONS_PER_GROUP: usize = 5;

/// Maximum number of callbacks per definition (configuration-time limit).
pub const MAX_CALLBACKS_PER_DEFINITION: usize = 10;

/// HTTP methods served on the mock listener. Anything else yields 405.
pub const SERVED_METHODS: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];
