//! Domain adapters: process-specific logic over the core engine.
//!
//! Each adapter builds the default step graph for its process family, seeds
//! the instance form data from the business entities, and applies the entity
//! mutations that fire as steps complete. The engine stays domain-agnostic.

pub mod lifecycle;
pub mod performance;
pub mod recruitment;
pub mod resignation;

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::history::{Actor, HistoryAction, HistoryEntry};
use crate::types::{InstanceStatus, Step, WorkflowInstance};

pub use lifecycle::{
    EmployeeLifecycleFlow, PromotionParams, SalaryAdjustmentParams, TransferParams,
};
pub use performance::PerformanceFlow;
pub use recruitment::RecruitmentFlow;
pub use resignation::ResignationFlow;

/// A step result submitted by an actor.
#[derive(Debug, Clone)]
pub struct AdvanceRequest {
    /// Must match the id of the instance's current step.
    pub step_id: Uuid,
    pub result: String,
    pub comments: Option<String>,
    pub form_data: Option<HashMap<String, serde_json::Value>>,
    /// When false, the completed step is persisted without moving
    /// `current_step_index` (partial/incremental update).
    pub advance_to_next: bool,
}

impl AdvanceRequest {
    pub fn new(step_id: Uuid, result: impl Into<String>) -> Self {
        Self {
            step_id,
            result: result.into(),
            comments: None,
            form_data: None,
            advance_to_next: true,
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    pub fn with_form_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.form_data = Some(data);
        self
    }

    pub fn without_advance(mut self) -> Self {
        self.advance_to_next = false;
        self
    }
}

/// Validate the request against the current step and complete it in place.
///
/// The step-id check runs before any mutation: a stale or duplicate submit
/// fails with `StepMismatch` and leaves the instance untouched. Returns a
/// snapshot of the completed step.
pub(crate) fn complete_current_step(
    instance: &mut WorkflowInstance,
    req: &AdvanceRequest,
) -> Result<Step, WorkflowError> {
    if instance.status.is_terminal() {
        return Err(WorkflowError::AlreadyTerminal {
            id: instance.id,
            status: instance.status,
        });
    }
    if instance.status != InstanceStatus::Active {
        return Err(WorkflowError::NotActive {
            id: instance.id,
            status: instance.status,
        });
    }
    let id = instance.id;
    let Some(step) = instance.current_step_mut() else {
        return Err(WorkflowError::NoStepInProgress(id));
    };
    if step.id != req.step_id {
        return Err(WorkflowError::StepMismatch {
            expected: step.id,
            got: req.step_id,
        });
    }

    step.complete(
        Utc::now(),
        req.result.clone(),
        req.comments.clone(),
        req.form_data.clone(),
    );
    Ok(step.clone())
}

/// Read a required decimal field (salary, score) out of a form-data bag.
pub(crate) fn decimal_field(
    data: &HashMap<String, serde_json::Value>,
    key: &'static str,
) -> Result<Decimal, WorkflowError> {
    data.get(key)
        .and_then(|v| serde_json::from_value::<Decimal>(v.clone()).ok())
        .ok_or(WorkflowError::BadFormData(key))
}

// ── History entry constructors shared by all adapters ──

pub(crate) fn created_entry(
    instance: &WorkflowInstance,
    actor: &Actor,
    description: String,
) -> HistoryEntry {
    HistoryEntry::new(instance, HistoryAction::Created, actor, description)
}

pub(crate) fn step_completed_entry(
    instance: &WorkflowInstance,
    step: &Step,
    actor: &Actor,
) -> HistoryEntry {
    let mut entry = HistoryEntry::new(
        instance,
        HistoryAction::StepCompleted,
        actor,
        format!("{} completed step '{}'", actor.name, step.name),
    )
    .for_step(step);
    if let Some(result) = &step.result {
        entry = entry.with_metadata("result", serde_json::json!(result));
    }
    entry
}

pub(crate) fn step_started_entry(
    instance: &WorkflowInstance,
    step: &Step,
    actor: &Actor,
) -> HistoryEntry {
    HistoryEntry::new(
        instance,
        HistoryAction::StepStarted,
        actor,
        format!("Step '{}' started", step.name),
    )
    .for_step(step)
}

pub(crate) fn completed_entry(instance: &WorkflowInstance, actor: &Actor) -> HistoryEntry {
    HistoryEntry::new(
        instance,
        HistoryAction::Completed,
        actor,
        format!("Workflow '{}' completed", instance.name),
    )
}

pub(crate) fn cancelled_entry(
    instance: &WorkflowInstance,
    actor: &Actor,
    reason: &str,
) -> HistoryEntry {
    HistoryEntry::new(
        instance,
        HistoryAction::Cancelled,
        actor,
        format!("Workflow '{}' cancelled", instance.name),
    )
    .with_metadata("reason", serde_json::json!(reason))
}
