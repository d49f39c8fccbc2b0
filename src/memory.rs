//! In-memory store implementations.
//!
//! Backs tests and single-process deployments. All maps live behind
//! `tokio::sync::RwLock`; no persistence across restarts.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entities::{
    Candidate, CandidateStore, Employee, EmployeeStore, JobPosting, JobStore, PerformanceReview,
    ResignationRequest, ResignationStore, ReviewStore,
};
use crate::history::{HistoryEntry, HistoryFilter};
use crate::store::{HistoryStore, WorkflowStore};
use crate::types::{InstanceFilter, WorkflowInstance};

/// In-memory workflow + history store.
#[derive(Default)]
pub struct MemoryStore {
    instances: RwLock<HashMap<Uuid, WorkflowInstance>>,
    history: RwLock<Vec<HistoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn insert_instance(&self, instance: &WorkflowInstance) -> Result<()> {
        let mut map = self.instances.write().await;
        if map.contains_key(&instance.id) {
            bail!("instance {} already exists", instance.id);
        }
        map.insert(instance.id, instance.clone());
        Ok(())
    }

    async fn load_instance(&self, id: Uuid) -> Result<Option<WorkflowInstance>> {
        Ok(self.instances.read().await.get(&id).cloned())
    }

    async fn save_instance(&self, instance: &WorkflowInstance) -> Result<()> {
        let mut map = self.instances.write().await;
        if !map.contains_key(&instance.id) {
            bail!("instance {} does not exist", instance.id);
        }
        map.insert(instance.id, instance.clone());
        Ok(())
    }

    async fn list_instances(&self, filter: &InstanceFilter) -> Result<Vec<WorkflowInstance>> {
        let map = self.instances.read().await;
        let mut matches: Vec<WorkflowInstance> = map
            .values()
            .filter(|i| i.company_id == filter.company_id)
            .filter(|i| filter.kind.is_none_or(|k| i.kind == k))
            .filter(|i| filter.related_entity_id.is_none_or(|id| i.related.id == id))
            .filter(|i| filter.status.is_none_or(|s| i.status == s))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let skip = filter.skip.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(matches.into_iter().skip(skip).take(limit).collect())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append(&self, entry: &HistoryEntry) -> Result<()> {
        self.history.write().await.push(entry.clone());
        Ok(())
    }

    async fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>> {
        let log = self.history.read().await;
        Ok(log
            .iter()
            .filter(|e| e.company_id == filter.company_id)
            .filter(|e| filter.instance_id.is_none_or(|id| e.instance_id == id))
            .filter(|e| filter.kind.is_none_or(|k| e.kind == k))
            .cloned()
            .collect())
    }
}

/// In-memory entity repository implementing all HR entity store traits.
#[derive(Default)]
pub struct MemoryHrStore {
    candidates: RwLock<HashMap<Uuid, Candidate>>,
    employees: RwLock<HashMap<Uuid, Employee>>,
    reviews: RwLock<HashMap<Uuid, PerformanceReview>>,
    resignations: RwLock<HashMap<Uuid, ResignationRequest>>,
    jobs: RwLock<HashMap<Uuid, JobPosting>>,
}

impl MemoryHrStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_candidate(&self, candidate: Candidate) {
        self.candidates.write().await.insert(candidate.id, candidate);
    }

    pub async fn put_employee(&self, employee: Employee) {
        self.employees.write().await.insert(employee.id, employee);
    }

    pub async fn put_review(&self, review: PerformanceReview) {
        self.reviews.write().await.insert(review.id, review);
    }

    pub async fn put_resignation(&self, request: ResignationRequest) {
        self.resignations.write().await.insert(request.id, request);
    }

    pub async fn put_job(&self, job: JobPosting) {
        self.jobs.write().await.insert(job.id, job);
    }
}

#[async_trait]
impl CandidateStore for MemoryHrStore {
    async fn load(&self, id: Uuid) -> Result<Option<Candidate>> {
        Ok(self.candidates.read().await.get(&id).cloned())
    }

    async fn save(&self, candidate: &Candidate) -> Result<()> {
        self.candidates
            .write()
            .await
            .insert(candidate.id, candidate.clone());
        Ok(())
    }
}

#[async_trait]
impl EmployeeStore for MemoryHrStore {
    async fn load(&self, id: Uuid) -> Result<Option<Employee>> {
        Ok(self.employees.read().await.get(&id).cloned())
    }

    async fn save(&self, employee: &Employee) -> Result<()> {
        self.employees
            .write()
            .await
            .insert(employee.id, employee.clone());
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for MemoryHrStore {
    async fn load(&self, id: Uuid) -> Result<Option<PerformanceReview>> {
        Ok(self.reviews.read().await.get(&id).cloned())
    }

    async fn save(&self, review: &PerformanceReview) -> Result<()> {
        self.reviews.write().await.insert(review.id, review.clone());
        Ok(())
    }
}

#[async_trait]
impl ResignationStore for MemoryHrStore {
    async fn load(&self, id: Uuid) -> Result<Option<ResignationRequest>> {
        Ok(self.resignations.read().await.get(&id).cloned())
    }

    async fn save(&self, request: &ResignationRequest) -> Result<()> {
        self.resignations
            .write()
            .await
            .insert(request.id, request.clone());
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryHrStore {
    async fn load(&self, id: Uuid) -> Result<Option<JobPosting>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Assignee, InstanceStatus, NewInstance, Priority, RelatedEntity, RelatedEntityKind, Step,
        WorkflowKind,
    };
    use chrono::Utc;

    fn sample_instance(company_id: Uuid, kind: WorkflowKind) -> WorkflowInstance {
        let now = Utc::now();
        let spec = NewInstance {
            company_id,
            template_id: None,
            template_name: "test".to_string(),
            kind,
            name: "test instance".to_string(),
            description: String::new(),
            initiator_id: Uuid::new_v4(),
            initiator_name: "tester".to_string(),
            related: RelatedEntity {
                kind: RelatedEntityKind::Employee,
                id: Uuid::new_v4(),
                name: "subject".to_string(),
            },
            form_data: HashMap::new(),
            steps: vec![Step::task("step", Assignee::role("hr"))],
            current_step_index: 0,
            status: InstanceStatus::Active,
            start_date: now,
            priority: Priority::Medium,
        };
        WorkflowInstance {
            id: Uuid::new_v4(),
            company_id: spec.company_id,
            template_id: spec.template_id,
            template_name: spec.template_name,
            kind: spec.kind,
            name: spec.name,
            description: spec.description,
            initiator_id: spec.initiator_id,
            initiator_name: spec.initiator_name,
            related: spec.related,
            form_data: spec.form_data,
            steps: spec.steps,
            current_step_index: spec.current_step_index,
            status: spec.status,
            start_date: spec.start_date,
            end_date: None,
            priority: spec.priority,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let store = MemoryStore::new();
        let instance = sample_instance(Uuid::new_v4(), WorkflowKind::Onboarding);
        store.insert_instance(&instance).await.unwrap();
        assert!(store.insert_instance(&instance).await.is_err());
    }

    #[tokio::test]
    async fn test_list_is_tenant_scoped() {
        let store = MemoryStore::new();
        let company_a = Uuid::new_v4();
        let company_b = Uuid::new_v4();
        store
            .insert_instance(&sample_instance(company_a, WorkflowKind::Recruitment))
            .await
            .unwrap();
        store
            .insert_instance(&sample_instance(company_b, WorkflowKind::Recruitment))
            .await
            .unwrap();

        let found = store
            .list_instances(&InstanceFilter::for_company(company_a))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].company_id, company_a);
    }

    #[tokio::test]
    async fn test_list_filters_kind_and_pagination() {
        let store = MemoryStore::new();
        let company = Uuid::new_v4();
        for _ in 0..3 {
            store
                .insert_instance(&sample_instance(company, WorkflowKind::Promotion))
                .await
                .unwrap();
        }
        store
            .insert_instance(&sample_instance(company, WorkflowKind::Transfer))
            .await
            .unwrap();

        let mut filter = InstanceFilter::for_company(company).with_kind(WorkflowKind::Promotion);
        filter.limit = Some(2);
        filter.skip = Some(1);
        let found = store.list_instances(&filter).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|i| i.kind == WorkflowKind::Promotion));
    }
}
