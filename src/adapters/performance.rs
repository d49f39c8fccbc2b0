//! Performance review adapter.
//!
//! Drives a review through self-assessment, manager assessment, the review
//! meeting, and final confirmation. Scores land on the review record as the
//! corresponding steps complete; the final score and `reviewed_at` are set
//! when the workflow completes.

use anyhow::anyhow;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::adapters::{
    complete_current_step, completed_entry, created_entry, decimal_field, step_completed_entry,
    step_started_entry, AdvanceRequest,
};
use crate::engine::WorkflowManager;
use crate::entities::{PerformanceReview, ReviewStatus, ReviewStore};
use crate::error::WorkflowError;
use crate::history::Actor;
use crate::stats::WorkflowStats;
use crate::steps::performance_steps;
use crate::types::{
    InstanceStatus, NewInstance, Priority, RelatedEntity, RelatedEntityKind, Step, StepEffect,
    WorkflowInstance, WorkflowKind,
};

pub struct PerformanceFlow {
    engine: Arc<WorkflowManager>,
    reviews: Arc<dyn ReviewStore>,
}

impl PerformanceFlow {
    pub fn new(engine: Arc<WorkflowManager>, reviews: Arc<dyn ReviewStore>) -> Self {
        Self { engine, reviews }
    }

    /// Start a performance review workflow for an existing review record.
    pub async fn create_workflow(
        &self,
        company_id: Uuid,
        review_id: Uuid,
        initiator: &Actor,
        custom_steps: Option<Vec<Step>>,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let mut review = self.load_review(review_id).await?;

        let now = Utc::now();
        let mut steps = custom_steps.unwrap_or_else(performance_steps);
        let Some(first) = steps.first_mut() else {
            return Err(anyhow!("step graph must not be empty").into());
        };
        first.start(now);

        let form_data = HashMap::from([
            ("review_id".to_string(), serde_json::json!(review.id)),
            (
                "employee_id".to_string(),
                serde_json::json!(review.employee_id),
            ),
            (
                "cycle_name".to_string(),
                serde_json::json!(review.cycle_name),
            ),
        ]);

        let instance = self
            .engine
            .create_instance(NewInstance {
                company_id,
                template_id: None,
                template_name: "performance".to_string(),
                kind: WorkflowKind::Performance,
                name: format!(
                    "Performance review: {} ({})",
                    review.employee_name, review.cycle_name
                ),
                description: format!(
                    "Performance review workflow for {} in cycle {}",
                    review.employee_name, review.cycle_name
                ),
                initiator_id: initiator.id,
                initiator_name: initiator.name.clone(),
                related: RelatedEntity {
                    kind: RelatedEntityKind::PerformanceReview,
                    id: review.id,
                    name: review.employee_name.clone(),
                },
                form_data,
                steps,
                current_step_index: 1,
                status: InstanceStatus::Active,
                start_date: now,
                priority: Priority::Medium,
            })
            .await?;

        review.status = ReviewStatus::InReview;
        self.reviews.save(&review).await?;

        self.engine
            .add_history(created_entry(
                &instance,
                initiator,
                format!(
                    "Performance review workflow started for {}",
                    review.employee_name
                ),
            ))
            .await?;
        Ok(instance)
    }

    /// Complete the current step and advance. Score-recording steps require a
    /// numeric `score` field in the submitted step form data.
    pub async fn advance_step(
        &self,
        instance_id: Uuid,
        req: AdvanceRequest,
        actor: &Actor,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let _guard = self.engine.instance_lock(instance_id).await;
        let mut instance = self.engine.get_instance(instance_id).await?;
        let step = complete_current_step(&mut instance, &req)?;

        // The score is validated up front: a missing score rejects the whole
        // request before any write lands.
        let score = match step.effect {
            StepEffect::RecordSelfScore | StepEffect::RecordReviewerScore => {
                Some(decimal_field(&step.form_data, "score")?)
            }
            _ => None,
        };

        // Instance write first; the review record is only patched once the
        // workflow state is durable.
        if req.advance_to_next {
            self.engine.advance_loaded(&mut instance).await?;
        } else {
            self.engine.save_loaded(&mut instance).await?;
        }

        if let Some(score) = score {
            let mut review = self.load_review(instance.related.id).await?;
            if step.effect == StepEffect::RecordSelfScore {
                review.self_score = Some(score);
            } else {
                review.reviewer_score = Some(score);
            }
            self.reviews.save(&review).await?;
        }

        self.engine
            .add_history(step_completed_entry(&instance, &step, actor))
            .await?;

        if req.advance_to_next {
            if instance.status == InstanceStatus::Completed {
                self.finalize_review(&instance, &step).await?;
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

    pub async fn stats(&self, company_id: Uuid) -> Result<WorkflowStats, WorkflowError> {
        self.engine
            .stats(company_id, WorkflowKind::Performance)
            .await
    }

    async fn load_review(&self, id: Uuid) -> Result<PerformanceReview, WorkflowError> {
        self.reviews
            .load(id)
            .await?
            .ok_or(WorkflowError::EntityNotFound {
                entity: "performance review",
                id,
            })
    }

    /// The final score comes from the confirmation step's form data when
    /// supplied, otherwise the reviewer's score stands.
    async fn finalize_review(
        &self,
        instance: &WorkflowInstance,
        last_step: &crate::types::Step,
    ) -> Result<(), WorkflowError> {
        let mut review = self.load_review(instance.related.id).await?;
        let final_score = last_step
            .form_data
            .get("final_score")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .or(review.reviewer_score);
        review.final_score = final_score;
        review.status = ReviewStatus::Completed;
        review.reviewed_at = Some(Utc::now());
        self.reviews.save(&review).await?;
        info!(
            instance_id = %instance.id,
            review_id = %review.id,
            "performance review finalized"
        );
        Ok(())
    }
}
