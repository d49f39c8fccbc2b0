//! Recruitment workflow adapter.
//!
//! Drives a candidate through resume screening, the interview loop, the
//! offer, and acceptance. Candidate status tracks workflow progress:
//! `screening` at creation, `interviewing` once screening passes, `offered`
//! when the offer goes out, `hired` at completion, `rejected` on rejection.

use anyhow::anyhow;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::adapters::{
    cancelled_entry, complete_current_step, completed_entry, created_entry, step_completed_entry,
    step_started_entry, AdvanceRequest,
};
use crate::engine::WorkflowManager;
use crate::entities::{CandidateStatus, CandidateStore, JobStore};
use crate::error::WorkflowError;
use crate::history::Actor;
use crate::stats::WorkflowStats;
use crate::steps::recruitment_steps;
use crate::types::{
    InstanceStatus, NewInstance, Priority, RelatedEntity, RelatedEntityKind, Step, StepEffect,
    WorkflowInstance, WorkflowKind,
};

pub struct RecruitmentFlow {
    engine: Arc<WorkflowManager>,
    candidates: Arc<dyn CandidateStore>,
    jobs: Arc<dyn JobStore>,
}

impl RecruitmentFlow {
    pub fn new(
        engine: Arc<WorkflowManager>,
        candidates: Arc<dyn CandidateStore>,
        jobs: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            engine,
            candidates,
            jobs,
        }
    }

    /// Start a recruitment workflow for a candidate.
    pub async fn create_workflow(
        &self,
        company_id: Uuid,
        candidate_id: Uuid,
        initiator: &Actor,
        custom_steps: Option<Vec<Step>>,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let mut candidate = self
            .candidates
            .load(candidate_id)
            .await?
            .ok_or(WorkflowError::EntityNotFound {
                entity: "candidate",
                id: candidate_id,
            })?;
        let job = self
            .jobs
            .load(candidate.job_id)
            .await?
            .ok_or(WorkflowError::EntityNotFound {
                entity: "job posting",
                id: candidate.job_id,
            })?;

        let now = Utc::now();
        let mut steps = custom_steps.unwrap_or_else(recruitment_steps);
        let Some(first) = steps.first_mut() else {
            return Err(anyhow!("step graph must not be empty").into());
        };
        first.start(now);

        let mut form_data = HashMap::new();
        form_data.insert("candidate_id".to_string(), serde_json::json!(candidate.id));
        form_data.insert(
            "candidate_name".to_string(),
            serde_json::json!(candidate.name),
        );
        form_data.insert("job_id".to_string(), serde_json::json!(job.id));
        form_data.insert("job_title".to_string(), serde_json::json!(job.title));

        let instance = self
            .engine
            .create_instance(NewInstance {
                company_id,
                template_id: None,
                template_name: "recruitment".to_string(),
                kind: WorkflowKind::Recruitment,
                name: format!("Recruitment: {} for {}", candidate.name, job.title),
                description: format!(
                    "Recruitment workflow for candidate {} applying to {}",
                    candidate.name, job.title
                ),
                initiator_id: initiator.id,
                initiator_name: initiator.name.clone(),
                related: RelatedEntity {
                    kind: RelatedEntityKind::Candidate,
                    id: candidate.id,
                    name: candidate.name.clone(),
                },
                form_data,
                steps,
                current_step_index: 1,
                status: InstanceStatus::Active,
                start_date: now,
                priority: Priority::Medium,
            })
            .await?;

        candidate.status = CandidateStatus::Screening;
        candidate.updated_at = now;
        self.candidates.save(&candidate).await?;

        self.engine
            .add_history(created_entry(
                &instance,
                initiator,
                format!("Recruitment workflow started for {}", candidate.name),
            ))
            .await?;

        Ok(instance)
    }

    /// Complete the current step and advance the workflow.
    pub async fn advance_step(
        &self,
        instance_id: Uuid,
        req: AdvanceRequest,
        actor: &Actor,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let _guard = self.engine.instance_lock(instance_id).await;
        let mut instance = self.engine.get_instance(instance_id).await?;
        let step = complete_current_step(&mut instance, &req)?;

        // The instance write is the source of truth; candidate mutations
        // only happen once it has succeeded.
        if req.advance_to_next {
            self.engine.advance_loaded(&mut instance).await?;
        } else {
            self.engine.save_loaded(&mut instance).await?;
        }

        match step.effect {
            StepEffect::MarkCandidateInterviewing => {
                self.set_candidate_status(instance.related.id, CandidateStatus::Interviewing)
                    .await?;
            }
            StepEffect::MarkCandidateOffered => {
                self.set_candidate_status(instance.related.id, CandidateStatus::Offered)
                    .await?;
            }
            _ => {}
        }

        self.engine
            .add_history(step_completed_entry(&instance, &step, actor))
            .await?;

        if req.advance_to_next {
            if instance.status == InstanceStatus::Completed {
                self.set_candidate_status(instance.related.id, CandidateStatus::Hired)
                    .await?;
                info!(
                    instance_id = %instance.id,
                    candidate_id = %instance.related.id,
                    "candidate hired"
                );
                self.engine
                    .add_history(completed_entry(&instance, actor))
                    .await?;
            } else if let Some(next) = instance.current_step() {
                self.engine
                    .add_history(step_started_entry(&instance, next, actor))
                    .await?;
            }
        }

        Ok(instance)
    }

    /// Reject the candidate and cancel the workflow.
    pub async fn reject(
        &self,
        instance_id: Uuid,
        reason: &str,
        actor: &Actor,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let _guard = self.engine.instance_lock(instance_id).await;
        let mut instance = self.engine.get_instance(instance_id).await?;
        self.engine
            .update_status_loaded(&mut instance, InstanceStatus::Cancelled, None)
            .await?;

        self.set_candidate_status(instance.related.id, CandidateStatus::Rejected)
            .await?;

        self.engine
            .add_history(cancelled_entry(&instance, actor, reason))
            .await?;
        Ok(instance)
    }

    pub async fn stats(&self, company_id: Uuid) -> Result<WorkflowStats, WorkflowError> {
        self.engine
            .stats(company_id, WorkflowKind::Recruitment)
            .await
    }

    async fn set_candidate_status(
        &self,
        candidate_id: Uuid,
        status: CandidateStatus,
    ) -> Result<(), WorkflowError> {
        let mut candidate = self
            .candidates
            .load(candidate_id)
            .await?
            .ok_or(WorkflowError::EntityNotFound {
                entity: "candidate",
                id: candidate_id,
            })?;
        candidate.status = status;
        candidate.updated_at = Utc::now();
        self.candidates.save(&candidate).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Candidate, JobPosting};
    use crate::history::{HistoryAction, HistoryFilter};
    use crate::memory::{MemoryHrStore, MemoryStore};

    struct Fixture {
        flow: RecruitmentFlow,
        engine: Arc<WorkflowManager>,
        hr: Arc<MemoryHrStore>,
        company_id: Uuid,
        candidate_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(WorkflowManager::new(store.clone(), store));
        let hr = Arc::new(MemoryHrStore::new());
        let company_id = Uuid::new_v4();
        let candidate_id = Uuid::new_v4();
        let job_id = Uuid::new_v4();

        hr.put_job(JobPosting {
            id: job_id,
            company_id,
            title: "Backend Engineer".to_string(),
            department_id: Uuid::new_v4(),
        })
        .await;
        hr.put_candidate(Candidate {
            id: candidate_id,
            company_id,
            name: "李雷".to_string(),
            job_id,
            status: CandidateStatus::Applied,
            updated_at: Utc::now(),
        })
        .await;

        let flow = RecruitmentFlow::new(engine.clone(), hr.clone(), hr.clone());
        Fixture {
            flow,
            engine,
            hr,
            company_id,
            candidate_id,
        }
    }

    fn actor() -> Actor {
        Actor::new(Uuid::new_v4(), "王芳").with_role("hr")
    }

    #[tokio::test]
    async fn test_create_workflow_seeds_graph_and_candidate() {
        let fx = fixture().await;
        let instance = fx
            .flow
            .create_workflow(fx.company_id, fx.candidate_id, &actor(), None)
            .await
            .unwrap();

        assert_eq!(instance.steps.len(), 6);
        assert_eq!(instance.steps[0].name, "简历筛选");
        assert_eq!(
            instance.steps[0].status,
            crate::types::StepStatus::InProgress
        );
        assert_eq!(instance.current_step_index, 1);
        assert_eq!(instance.status, InstanceStatus::Active);

        let candidate = CandidateStore::load(fx.hr.as_ref(), fx.candidate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.status, CandidateStatus::Screening);

        let history = fx
            .engine
            .history(&HistoryFilter::for_instance(fx.company_id, instance.id))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, HistoryAction::Created);
    }

    #[tokio::test]
    async fn test_advance_screening_marks_candidate_interviewing() {
        let fx = fixture().await;
        let instance = fx
            .flow
            .create_workflow(fx.company_id, fx.candidate_id, &actor(), None)
            .await
            .unwrap();

        let req = AdvanceRequest::new(instance.steps[0].id, "passed");
        let advanced = fx
            .flow
            .advance_step(instance.id, req, &actor())
            .await
            .unwrap();

        assert_eq!(advanced.current_step_index, 2);
        assert_eq!(
            advanced.steps[1].status,
            crate::types::StepStatus::InProgress
        );
        assert_eq!(advanced.steps[1].name, "初试");

        let candidate = CandidateStore::load(fx.hr.as_ref(), fx.candidate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.status, CandidateStatus::Interviewing);

        let history = fx
            .engine
            .history(&HistoryFilter::for_instance(fx.company_id, instance.id))
            .await
            .unwrap();
        let actions: Vec<_> = history.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                HistoryAction::Created,
                HistoryAction::StepCompleted,
                HistoryAction::StepStarted,
            ]
        );
    }

    #[tokio::test]
    async fn test_full_flow_hires_candidate() {
        let fx = fixture().await;
        let instance = fx
            .flow
            .create_workflow(fx.company_id, fx.candidate_id, &actor(), None)
            .await
            .unwrap();

        let mut current = instance;
        for _ in 0..6 {
            let step_id = current.steps[current.current_step_index - 1].id;
            current = fx
                .flow
                .advance_step(current.id, AdvanceRequest::new(step_id, "passed"), &actor())
                .await
                .unwrap();
        }

        assert_eq!(current.status, InstanceStatus::Completed);
        assert!(current.end_date.is_some());

        let candidate = CandidateStore::load(fx.hr.as_ref(), fx.candidate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.status, CandidateStatus::Hired);

        let history = fx
            .engine
            .history(&HistoryFilter::for_instance(fx.company_id, current.id))
            .await
            .unwrap();
        assert_eq!(history.first().unwrap().action, HistoryAction::Created);
        assert_eq!(history.last().unwrap().action, HistoryAction::Completed);
        let completions = history
            .iter()
            .filter(|e| e.action == HistoryAction::Completed)
            .count();
        assert_eq!(completions, 1);
    }

    #[tokio::test]
    async fn test_step_mismatch_mutates_nothing() {
        let fx = fixture().await;
        let instance = fx
            .flow
            .create_workflow(fx.company_id, fx.candidate_id, &actor(), None)
            .await
            .unwrap();

        // Target a later step instead of the current one.
        let wrong = AdvanceRequest::new(instance.steps[3].id, "passed");
        let err = fx
            .flow
            .advance_step(instance.id, wrong, &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::StepMismatch { .. }));

        let reloaded = fx.engine.get_instance(instance.id).await.unwrap();
        assert_eq!(reloaded.current_step_index, 1);
        assert_eq!(
            reloaded.steps[0].status,
            crate::types::StepStatus::InProgress
        );
        assert!(reloaded.steps[0].result.is_none());

        // No new history beyond the creation row.
        let history = fx
            .engine
            .history(&HistoryFilter::for_instance(fx.company_id, instance.id))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);

        // Candidate still in screening.
        let candidate = CandidateStore::load(fx.hr.as_ref(), fx.candidate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.status, CandidateStatus::Screening);
    }

    #[tokio::test]
    async fn test_reject_cancels_and_marks_candidate() {
        let fx = fixture().await;
        let instance = fx
            .flow
            .create_workflow(fx.company_id, fx.candidate_id, &actor(), None)
            .await
            .unwrap();

        let cancelled = fx
            .flow
            .reject(instance.id, "failed background check", &actor())
            .await
            .unwrap();
        assert_eq!(cancelled.status, InstanceStatus::Cancelled);
        assert!(cancelled.end_date.is_some());

        let candidate = CandidateStore::load(fx.hr.as_ref(), fx.candidate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.status, CandidateStatus::Rejected);

        let history = fx
            .engine
            .history(&HistoryFilter::for_instance(fx.company_id, instance.id))
            .await
            .unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.action, HistoryAction::Cancelled);
        assert_eq!(
            last.metadata.get("reason"),
            Some(&serde_json::json!("failed background check"))
        );
    }

    #[tokio::test]
    async fn test_create_fails_fast_on_missing_candidate() {
        let fx = fixture().await;
        let missing = Uuid::new_v4();
        let err = fx
            .flow
            .create_workflow(fx.company_id, missing, &actor(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::EntityNotFound { .. }));

        // No partial workflow was created.
        let instances = fx
            .engine
            .list_instances(&crate::types::InstanceFilter::for_company(fx.company_id))
            .await
            .unwrap();
        assert!(instances.is_empty());
    }

    /// Workflow store that fails the next `save_instance` call.
    struct FlakySaveStore {
        inner: MemoryStore,
        fail_next_save: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl crate::store::WorkflowStore for FlakySaveStore {
        async fn insert_instance(&self, instance: &WorkflowInstance) -> anyhow::Result<()> {
            self.inner.insert_instance(instance).await
        }

        async fn load_instance(&self, id: Uuid) -> anyhow::Result<Option<WorkflowInstance>> {
            self.inner.load_instance(id).await
        }

        async fn save_instance(&self, instance: &WorkflowInstance) -> anyhow::Result<()> {
            if self
                .fail_next_save
                .swap(false, std::sync::atomic::Ordering::SeqCst)
            {
                anyhow::bail!("storage unavailable");
            }
            self.inner.save_instance(instance).await
        }

        async fn list_instances(
            &self,
            filter: &crate::types::InstanceFilter,
        ) -> anyhow::Result<Vec<WorkflowInstance>> {
            self.inner.list_instances(filter).await
        }
    }

    #[async_trait::async_trait]
    impl crate::store::HistoryStore for FlakySaveStore {
        async fn append(&self, entry: &crate::history::HistoryEntry) -> anyhow::Result<()> {
            crate::store::HistoryStore::append(&self.inner, entry).await
        }

        async fn list(
            &self,
            filter: &HistoryFilter,
        ) -> anyhow::Result<Vec<crate::history::HistoryEntry>> {
            crate::store::HistoryStore::list(&self.inner, filter).await
        }
    }

    #[tokio::test]
    async fn test_failed_instance_save_leaves_candidate_untouched() {
        let store = Arc::new(FlakySaveStore {
            inner: MemoryStore::new(),
            fail_next_save: std::sync::atomic::AtomicBool::new(false),
        });
        let engine = Arc::new(WorkflowManager::new(store.clone(), store.clone()));
        let hr = Arc::new(MemoryHrStore::new());
        let company_id = Uuid::new_v4();
        let candidate_id = Uuid::new_v4();
        let job_id = Uuid::new_v4();

        hr.put_job(JobPosting {
            id: job_id,
            company_id,
            title: "Backend Engineer".to_string(),
            department_id: Uuid::new_v4(),
        })
        .await;
        hr.put_candidate(Candidate {
            id: candidate_id,
            company_id,
            name: "李雷".to_string(),
            job_id,
            status: CandidateStatus::Applied,
            updated_at: Utc::now(),
        })
        .await;

        let flow = RecruitmentFlow::new(engine.clone(), hr.clone(), hr.clone());
        let instance = flow
            .create_workflow(company_id, candidate_id, &actor(), None)
            .await
            .unwrap();

        store
            .fail_next_save
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let err = flow
            .advance_step(
                instance.id,
                AdvanceRequest::new(instance.steps[0].id, "passed"),
                &actor(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Store(_)));

        // The instance write failed, so the candidate was not touched.
        let candidate = CandidateStore::load(hr.as_ref(), candidate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.status, CandidateStatus::Screening);

        let reloaded = engine.get_instance(instance.id).await.unwrap();
        assert_eq!(reloaded.current_step_index, 1);
        assert_eq!(
            reloaded.steps[0].status,
            crate::types::StepStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_concurrent_advances_serialize() {
        let fx = fixture().await;
        let instance = fx
            .flow
            .create_workflow(fx.company_id, fx.candidate_id, &actor(), None)
            .await
            .unwrap();
        let flow = Arc::new(fx.flow);
        let step_id = instance.steps[0].id;

        let a = {
            let flow = flow.clone();
            let act = actor();
            tokio::spawn(async move {
                flow.advance_step(instance.id, AdvanceRequest::new(step_id, "passed"), &act)
                    .await
            })
        };
        let b = {
            let flow = flow.clone();
            let act = actor();
            tokio::spawn(async move {
                flow.advance_step(instance.id, AdvanceRequest::new(step_id, "passed"), &act)
                    .await
            })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let ok = results.iter().filter(|r| r.is_ok()).count();
        let mismatches = results
            .iter()
            .filter(|r| matches!(r, Err(WorkflowError::StepMismatch { .. })))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(mismatches, 1);

        let reloaded = fx.engine.get_instance(instance.id).await.unwrap();
        assert_eq!(reloaded.current_step_index, 2);
    }
}
