//! HR workflow orchestration engine.
//!
//! Drives fixed-shape, linear approval workflows (recruitment, onboarding,
//! promotion, transfer, salary adjustment, performance review, resignation)
//! against HR business records. The crate splits into three layers:
//! - `engine` - the kind-agnostic [`WorkflowManager`]: instance lifecycle,
//!   step advancement, status transitions, stats
//! - `adapters` - one flow type per workflow family, owning step graphs,
//!   related-entity mutations and audit history
//! - `store` / `memory` / `postgres` - pluggable persistence behind async
//!   traits; Postgres is gated behind the `database` feature
//!
//! All reads and writes are tenant-scoped by `company_id`, and every engine
//! event lands in an append-only history log.

pub mod adapters;
pub mod engine;
pub mod entities;
pub mod error;
pub mod history;
pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;
pub mod stats;
pub mod steps;
pub mod store;
pub mod types;

pub use adapters::{
    AdvanceRequest, EmployeeLifecycleFlow, PerformanceFlow, PromotionParams, RecruitmentFlow,
    ResignationFlow, SalaryAdjustmentParams, TransferParams,
};
pub use engine::WorkflowManager;
pub use error::WorkflowError;
pub use history::{Actor, HistoryAction, HistoryEntry, HistoryFilter};
pub use memory::{MemoryHrStore, MemoryStore};
pub use stats::WorkflowStats;
pub use store::{HistoryStore, WorkflowStore};
pub use types::{
    Assignee, InstanceFilter, InstanceStatus, NewInstance, Priority, RelatedEntity,
    RelatedEntityKind, Step, StepEffect, StepKind, StepStatus, WorkflowInstance, WorkflowKind,
};
