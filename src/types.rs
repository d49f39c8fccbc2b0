//! Core workflow state types.
//!
//! A [`WorkflowInstance`] is one execution of a process template against a
//! single related business entity. Steps form a linear, single-branch
//! sequence; exactly one step is in progress while the instance is active.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ─── Process classification ───────────────────────────────────

/// The fixed set of process types the engine drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Recruitment,
    Onboarding,
    Promotion,
    Transfer,
    SalaryAdjustment,
    Performance,
    Resignation,
    Training,
    Attendance,
    Points,
    ContractRenewal,
    ProbationAssessment,
    Interview,
    ExitInterview,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recruitment => "recruitment",
            Self::Onboarding => "onboarding",
            Self::Promotion => "promotion",
            Self::Transfer => "transfer",
            Self::SalaryAdjustment => "salary_adjustment",
            Self::Performance => "performance",
            Self::Resignation => "resignation",
            Self::Training => "training",
            Self::Attendance => "attendance",
            Self::Points => "points",
            Self::ContractRenewal => "contract_renewal",
            Self::ProbationAssessment => "probation_assessment",
            Self::Interview => "interview",
            Self::ExitInterview => "exit_interview",
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Instance priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

// ─── Instance status machine ──────────────────────────────────

/// Instance lifecycle status.
///
/// `draft -> active -> {paused, completed, cancelled, error}`, with
/// `paused -> active` (resume) and `error -> active` (retry) allowed.
/// `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Cancelled,
    Error,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }

    /// True when no further transitions are permitted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Check whether a transition to `to` is in the allowed set.
    pub fn can_transition_to(&self, to: InstanceStatus) -> bool {
        use InstanceStatus::*;
        matches!(
            (self, to),
            (Draft, Active)
                | (Active, Paused)
                | (Active, Completed)
                | (Active, Cancelled)
                | (Active, Error)
                | (Paused, Active)
                | (Paused, Cancelled)
                | (Error, Active)
                | (Error, Cancelled)
        )
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── Steps ────────────────────────────────────────────────────

/// Kind of work a step represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Approval,
    Task,
}

/// Step lifecycle. Linear; rejection is modeled as instance cancellation,
/// not as a step failure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

/// Who a step is assigned to: a specific user, or a role category resolved
/// by the caller (e.g. "hr", "department_manager"). Exactly one of the two,
/// enforced by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Assignee {
    User { id: Uuid },
    Role { role: String },
}

impl Assignee {
    pub fn user(id: Uuid) -> Self {
        Self::User { id }
    }

    pub fn role(role: impl Into<String>) -> Self {
        Self::Role { role: role.into() }
    }
}

/// Domain side effect that fires when a step completes.
///
/// Resolved at step-graph construction time so advancement logic switches on
/// a closed enum; renaming a step cannot silently drop its effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepEffect {
    #[default]
    None,
    /// Candidate passed screening and moves into the interview loop.
    MarkCandidateInterviewing,
    /// Offer has been sent to the candidate.
    MarkCandidateOffered,
    /// Apply `new_salary` from the instance form data to the employee.
    ApplySalaryChange,
    /// Record the employee's self-assessment score on the review.
    RecordSelfScore,
    /// Record the manager's assessment score on the review.
    RecordReviewerScore,
    /// Record manager approval on the resignation request.
    RecordResignationApproval,
}

/// One ordered unit of work within an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    pub name: String,
    pub kind: StepKind,
    #[serde(default)]
    pub description: String,
    pub assignee: Assignee,
    #[serde(default)]
    pub effect: StepEffect,
    pub status: StepStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub comments: Option<String>,
    #[serde(default)]
    pub form_data: HashMap<String, serde_json::Value>,
}

impl Step {
    /// Create a pending step.
    pub fn new(name: impl Into<String>, kind: StepKind, assignee: Assignee) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            description: String::new(),
            assignee,
            effect: StepEffect::None,
            status: StepStatus::Pending,
            start_time: None,
            end_time: None,
            result: None,
            comments: None,
            form_data: HashMap::new(),
        }
    }

    pub fn approval(name: impl Into<String>, assignee: Assignee) -> Self {
        Self::new(name, StepKind::Approval, assignee)
    }

    pub fn task(name: impl Into<String>, assignee: Assignee) -> Self {
        Self::new(name, StepKind::Task, assignee)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_effect(mut self, effect: StepEffect) -> Self {
        self.effect = effect;
        self
    }

    /// Mark this step in progress as of `now`.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = StepStatus::InProgress;
        self.start_time = Some(now);
    }

    /// Mark this step completed with the actor-supplied outcome.
    pub fn complete(
        &mut self,
        now: DateTime<Utc>,
        result: impl Into<String>,
        comments: Option<String>,
        form_data: Option<HashMap<String, serde_json::Value>>,
    ) {
        self.status = StepStatus::Completed;
        self.end_time = Some(now);
        self.result = Some(result.into());
        if comments.is_some() {
            self.comments = comments;
        }
        if let Some(data) = form_data {
            self.form_data.extend(data);
        }
    }
}

// ─── Related entity linkage ───────────────────────────────────

/// Kind of business record a workflow acts upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedEntityKind {
    Candidate,
    Employee,
    PerformanceReview,
    ResignationRequest,
}

/// Weak back-reference to the business record the workflow acts upon.
/// Relation and lookup only, never ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub kind: RelatedEntityKind,
    pub id: Uuid,
    pub name: String,
}

// ─── Workflow instance ────────────────────────────────────────

/// One running execution of a workflow type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: Uuid,
    /// Tenant scope. Every read and write is scoped by this id.
    pub company_id: Uuid,
    pub template_id: Option<Uuid>,
    pub template_name: String,
    pub kind: WorkflowKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub initiator_id: Uuid,
    pub initiator_name: String,
    pub related: RelatedEntity,
    /// Process-specific context gathered at creation and mutated as steps
    /// progress (target position, old/new salary, ...).
    #[serde(default)]
    pub form_data: HashMap<String, serde_json::Value>,
    pub steps: Vec<Step>,
    /// Count of steps that have been started, `0 <= n <= steps.len()`.
    /// For an active instance the in-progress step is
    /// `steps[current_step_index - 1]`; adapters pre-start step 0 and create
    /// instances with `current_step_index = 1`.
    pub current_step_index: usize,
    pub status: InstanceStatus,
    pub start_date: DateTime<Utc>,
    /// Set exactly once, when the status becomes terminal.
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowInstance {
    /// The most recently started step — for an active instance, the one in
    /// progress. `None` for a draft with no started steps.
    pub fn current_step(&self) -> Option<&Step> {
        self.current_step_index
            .checked_sub(1)
            .and_then(|i| self.steps.get(i))
    }

    pub fn current_step_mut(&mut self) -> Option<&mut Step> {
        self.current_step_index
            .checked_sub(1)
            .and_then(|i| self.steps.get_mut(i))
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Specification for a new instance, built by a domain adapter.
///
/// By convention the adapter pre-starts step 0 and passes
/// `current_step_index = 1`; the engine persists the spec as given.
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub company_id: Uuid,
    pub template_id: Option<Uuid>,
    pub template_name: String,
    pub kind: WorkflowKind,
    pub name: String,
    pub description: String,
    pub initiator_id: Uuid,
    pub initiator_name: String,
    pub related: RelatedEntity,
    pub form_data: HashMap<String, serde_json::Value>,
    pub steps: Vec<Step>,
    pub current_step_index: usize,
    pub status: InstanceStatus,
    pub start_date: DateTime<Utc>,
    pub priority: Priority,
}

// ─── Query filters ────────────────────────────────────────────

/// Filter for instance queries. `company_id` is mandatory — the stores are
/// shared across tenants and every query must be tenant-scoped.
#[derive(Debug, Clone)]
pub struct InstanceFilter {
    pub company_id: Uuid,
    pub kind: Option<WorkflowKind>,
    pub related_entity_id: Option<Uuid>,
    pub status: Option<InstanceStatus>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

impl InstanceFilter {
    pub fn for_company(company_id: Uuid) -> Self {
        Self {
            company_id,
            kind: None,
            related_entity_id: None,
            status: None,
            limit: None,
            skip: None,
        }
    }

    pub fn with_kind(mut self, kind: WorkflowKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_related_entity(mut self, id: Uuid) -> Self {
        self.related_entity_id = Some(id);
        self
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = Some(status);
        self
    }
}
