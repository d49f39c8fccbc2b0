//! Business entity records acted upon by workflows, and their store traits.
//!
//! These are external collaborators: the engine never owns them, it only
//! reads them by key and patches status fields as steps complete. The traits
//! are deliberately narrow (`load`/`save`) — the backing system is a generic
//! CRUD repository.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Candidate ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Applied,
    Screening,
    Interviewing,
    Offered,
    Hired,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub job_id: Uuid,
    pub status: CandidateStatus,
    pub updated_at: DateTime<Utc>,
}

// ─── Employee ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Onboarding,
    Active,
    Resigned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub department_id: Uuid,
    pub department_name: String,
    pub position_id: Uuid,
    pub position_name: String,
    pub salary: Decimal,
    pub employment_status: EmploymentStatus,
    pub updated_at: DateTime<Utc>,
}

// ─── Performance review ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    InReview,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReview {
    pub id: Uuid,
    pub company_id: Uuid,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub cycle_name: String,
    pub self_score: Option<Decimal>,
    pub reviewer_score: Option<Decimal>,
    pub final_score: Option<Decimal>,
    pub status: ReviewStatus,
    pub reviewed_at: Option<DateTime<Utc>>,
}

// ─── Resignation request ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResignationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResignationRequest {
    pub id: Uuid,
    pub company_id: Uuid,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub reason: String,
    pub planned_leave_date: Option<NaiveDate>,
    pub status: ResignationStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
}

// ─── Job posting (read-only lookup) ───────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub department_id: Uuid,
}

// ─── Store traits ─────────────────────────────────────────────

#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn load(&self, id: Uuid) -> Result<Option<Candidate>>;
    async fn save(&self, candidate: &Candidate) -> Result<()>;
}

#[async_trait]
pub trait EmployeeStore: Send + Sync {
    async fn load(&self, id: Uuid) -> Result<Option<Employee>>;
    async fn save(&self, employee: &Employee) -> Result<()>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn load(&self, id: Uuid) -> Result<Option<PerformanceReview>>;
    async fn save(&self, review: &PerformanceReview) -> Result<()>;
}

#[async_trait]
pub trait ResignationStore: Send + Sync {
    async fn load(&self, id: Uuid) -> Result<Option<ResignationRequest>>;
    async fn save(&self, request: &ResignationRequest) -> Result<()>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn load(&self, id: Uuid) -> Result<Option<JobPosting>>;
}
