//! Persistence traits for workflow state.
//!
//! The engine operates exclusively through these traits, enabling pluggable
//! backends (MemoryStore for tests and POC, Postgres behind the `database`
//! feature for production).

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::history::{HistoryEntry, HistoryFilter};
use crate::types::{InstanceFilter, WorkflowInstance};

/// Persistence for workflow instances.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert a new instance. Fails if the id already exists.
    async fn insert_instance(&self, instance: &WorkflowInstance) -> Result<()>;

    async fn load_instance(&self, id: Uuid) -> Result<Option<WorkflowInstance>>;

    /// Save the full state of an existing instance.
    async fn save_instance(&self, instance: &WorkflowInstance) -> Result<()>;

    /// List instances matching the filter, newest first.
    async fn list_instances(&self, filter: &InstanceFilter) -> Result<Vec<WorkflowInstance>>;
}

/// Append-only persistence for audit history.
///
/// A failed append must surface as an error — history is compliance-critical
/// and callers treat an append failure as a reason to abort the surrounding
/// operation.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: &HistoryEntry) -> Result<()>;

    /// List entries matching the filter, oldest first.
    async fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>>;
}
