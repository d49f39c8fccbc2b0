//! Audit history types.
//!
//! History entries are append-only. They are never mutated or deleted after
//! creation; the log is the sole source of "what happened and when" for
//! compliance and traceability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::types::WorkflowKind;

/// Engine events recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    StepStarted,
    StepCompleted,
    Completed,
    Cancelled,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::StepStarted => "step_started",
            Self::StepCompleted => "step_completed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who performed an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub role: Option<String>,
}

impl Actor {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub company_id: Uuid,
    pub instance_id: Uuid,
    pub instance_name: String,
    pub template_id: Option<Uuid>,
    pub kind: WorkflowKind,
    pub action: HistoryAction,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub actor_role: Option<String>,
    pub step_id: Option<Uuid>,
    pub step_name: Option<String>,
    pub description: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Build an entry for one engine event on an instance.
    pub fn new(
        instance: &crate::types::WorkflowInstance,
        action: HistoryAction,
        actor: &Actor,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id: instance.company_id,
            instance_id: instance.id,
            instance_name: instance.name.clone(),
            template_id: instance.template_id,
            kind: instance.kind,
            action,
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            actor_role: actor.role.clone(),
            step_id: None,
            step_name: None,
            description: description.into(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn for_step(mut self, step: &crate::types::Step) -> Self {
        self.step_id = Some(step.id);
        self.step_name = Some(step.name.clone());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Filter for history queries, tenant-scoped like instance queries.
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    pub company_id: Uuid,
    pub instance_id: Option<Uuid>,
    pub kind: Option<WorkflowKind>,
}

impl HistoryFilter {
    pub fn for_company(company_id: Uuid) -> Self {
        Self {
            company_id,
            instance_id: None,
            kind: None,
        }
    }

    pub fn for_instance(company_id: Uuid, instance_id: Uuid) -> Self {
        Self {
            company_id,
            instance_id: Some(instance_id),
            kind: None,
        }
    }
}
