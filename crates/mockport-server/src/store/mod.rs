//! Persistence seams.
//!
//! The relational store that owns projects, definitions, rules, callbacks and
//! logs is an external collaborator. The engine only needs the read side of
//! the configuration ([`ConfigStore`]) and an append-only log sink
//! ([`LogStore`]). [`InMemoryStore`] implements both, seeded from a fixtures
//! file, and is what the binary runs with.

mod fixtures;
mod inmemory;

pub use fixtures::{DefinitionFixture, Fixtures, ProjectFixture};
pub use inmemory::InMemoryStore;

use crate::model::{CallLogRecord, Callback, CallbackLogRecord, MockDefinition, Project, Rule};
use async_trait::async_trait;

/// Error types for store access
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Project {0} not found")]
    ProjectNotFound(String),
    #[error("Definition {0} not found")]
    DefinitionNotFound(String),
    #[error("Definition {0} already has the maximum of {1} rules")]
    RuleLimit(String, usize),
    #[error("Rule {0} has more than {1} conditions")]
    ConditionLimit(String, usize),
    #[error("Definition {0} already has the maximum of {1} callbacks")]
    CallbackLimit(String, usize),
    #[error("Failed to load fixtures: {0}")]
    Fixtures(String),
}

/// Read side of the configuration store.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn project_by_short_id(&self, short_id: &str) -> Result<Option<Project>, StoreError>;

    /// Definitions of a project for a method, in declaration order.
    async fn definitions(
        &self,
        project_id: &str,
        method: &str,
    ) -> Result<Vec<MockDefinition>, StoreError>;

    async fn definition(&self, id: &str) -> Result<Option<MockDefinition>, StoreError>;

    /// Rules of a definition, in declaration order.
    async fn rules(&self, definition_id: &str) -> Result<Vec<Rule>, StoreError>;

    /// Callbacks of a definition, in declaration order.
    async fn callbacks(&self, definition_id: &str) -> Result<Vec<Callback>, StoreError>;
}

/// Append-only sink for call and callback records.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn insert_call_log(&self, record: &CallLogRecord) -> Result<(), StoreError>;

    async fn insert_callback_log(&self, record: &CallbackLogRecord) -> Result<(), StoreError>;
}
