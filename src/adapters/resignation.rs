//! Resignation workflow adapter.
//!
//! Drives a resignation request through manager and HR approval, handover,
//! asset return, the exit interview, and final processing. Manager approval
//! is recorded on the request; the employee is marked resigned only when the
//! whole workflow completes. Rejection cancels the workflow and leaves the
//! employee record untouched.

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
use crate::entities::{
    EmployeeStore, EmploymentStatus, ResignationRequest, ResignationStatus, ResignationStore,
};
use crate::error::WorkflowError;
use crate::history::Actor;
use crate::stats::WorkflowStats;
use crate::steps::resignation_steps;
use crate::types::{
    InstanceStatus, NewInstance, Priority, RelatedEntity, RelatedEntityKind, Step, StepEffect,
    WorkflowInstance, WorkflowKind,
};

pub struct ResignationFlow {
    engine: Arc<WorkflowManager>,
    resignations: Arc<dyn ResignationStore>,
    employees: Arc<dyn EmployeeStore>,
}

impl ResignationFlow {
    pub fn new(
        engine: Arc<WorkflowManager>,
        resignations: Arc<dyn ResignationStore>,
        employees: Arc<dyn EmployeeStore>,
    ) -> Self {
        Self {
            engine,
            resignations,
            employees,
        }
    }

    /// Start a resignation workflow for a pending resignation request.
    pub async fn create_workflow(
        &self,
        company_id: Uuid,
        resignation_id: Uuid,
        initiator: &Actor,
        custom_steps: Option<Vec<Step>>,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let request = self.load_request(resignation_id).await?;
        // The employee must exist before we commit to a workflow against it.
        let employee = self
            .employees
            .load(request.employee_id)
            .await?
            .ok_or(WorkflowError::EntityNotFound {
                entity: "employee",
                id: request.employee_id,
            })?;

        let now = Utc::now();
        let mut steps = custom_steps.unwrap_or_else(resignation_steps);
        let Some(first) = steps.first_mut() else {
            return Err(anyhow!("step graph must not be empty").into());
        };
        first.start(now);

        let mut form_data = HashMap::from([
            ("resignation_id".to_string(), serde_json::json!(request.id)),
            ("employee_id".to_string(), serde_json::json!(employee.id)),
            ("reason".to_string(), serde_json::json!(request.reason)),
        ]);
        if let Some(date) = request.planned_leave_date {
            form_data.insert("planned_leave_date".to_string(), serde_json::json!(date));
        }

        let instance = self
            .engine
            .create_instance(NewInstance {
                company_id,
                template_id: None,
                template_name: "resignation".to_string(),
                kind: WorkflowKind::Resignation,
                name: format!("Resignation: {}", employee.name),
                description: format!(
                    "Resignation workflow for {} ({})",
                    employee.name, employee.department_name
                ),
                initiator_id: initiator.id,
                initiator_name: initiator.name.clone(),
                related: RelatedEntity {
                    kind: RelatedEntityKind::ResignationRequest,
                    id: request.id,
                    name: employee.name.clone(),
                },
                form_data,
                steps,
                current_step_index: 1,
                status: InstanceStatus::Active,
                start_date: now,
                priority: Priority::Medium,
            })
            .await?;

        self.engine
            .add_history(created_entry(
                &instance,
                initiator,
                format!("Resignation workflow started for {}", employee.name),
            ))
            .await?;
        Ok(instance)
    }

    /// Complete the current step and advance.
    pub async fn advance_step(
        &self,
        instance_id: Uuid,
        req: AdvanceRequest,
        actor: &Actor,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let _guard = self.engine.instance_lock(instance_id).await;
        let mut instance = self.engine.get_instance(instance_id).await?;
        let step = complete_current_step(&mut instance, &req)?;

        // Instance write first; the resignation request is only patched once
        // the workflow state is durable.
        if req.advance_to_next {
            self.engine.advance_loaded(&mut instance).await?;
        } else {
            self.engine.save_loaded(&mut instance).await?;
        }

        if step.effect == StepEffect::RecordResignationApproval {
            let mut request = self.load_request(instance.related.id).await?;
            request.status = ResignationStatus::Approved;
            request.approved_by = Some(actor.id);
            request.approved_at = Some(Utc::now());
            self.resignations.save(&request).await?;
        }

        self.engine
            .add_history(step_completed_entry(&instance, &step, actor))
            .await?;

        if req.advance_to_next {
            if instance.status == InstanceStatus::Completed {
                self.mark_employee_resigned(&instance).await?;
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

    /// Reject the resignation request and cancel the workflow. The employee
    /// record is not touched.
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

        let mut request = self.load_request(instance.related.id).await?;
        request.status = ResignationStatus::Rejected;
        self.resignations.save(&request).await?;

        self.engine
            .add_history(cancelled_entry(&instance, actor, reason))
            .await?;
        Ok(instance)
    }

    pub async fn stats(&self, company_id: Uuid) -> Result<WorkflowStats, WorkflowError> {
        self.engine
            .stats(company_id, WorkflowKind::Resignation)
            .await
    }

    async fn load_request(&self, id: Uuid) -> Result<ResignationRequest, WorkflowError> {
        self.resignations
            .load(id)
            .await?
            .ok_or(WorkflowError::EntityNotFound {
                entity: "resignation request",
                id,
            })
    }

    async fn mark_employee_resigned(
        &self,
        instance: &WorkflowInstance,
    ) -> Result<(), WorkflowError> {
        let request = self.load_request(instance.related.id).await?;
        let mut employee = self
            .employees
            .load(request.employee_id)
            .await?
            .ok_or(WorkflowError::EntityNotFound {
                entity: "employee",
                id: request.employee_id,
            })?;
        employee.employment_status = EmploymentStatus::Resigned;
        employee.updated_at = Utc::now();
        self.employees.save(&employee).await?;
        info!(
            instance_id = %instance.id,
            employee_id = %employee.id,
            "employee marked resigned"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Employee;
    use crate::history::{HistoryAction, HistoryFilter};
    use crate::memory::{MemoryHrStore, MemoryStore};
    use rust_decimal::Decimal;

    struct Fixture {
        flow: ResignationFlow,
        engine: Arc<WorkflowManager>,
        hr: Arc<MemoryHrStore>,
        company_id: Uuid,
        employee_id: Uuid,
        resignation_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(WorkflowManager::new(store.clone(), store));
        let hr = Arc::new(MemoryHrStore::new());
        let company_id = Uuid::new_v4();
        let employee_id = Uuid::new_v4();
        let resignation_id = Uuid::new_v4();

        hr.put_employee(Employee {
            id: employee_id,
            company_id,
            name: "李雷".to_string(),
            department_id: Uuid::new_v4(),
            department_name: "研发部".to_string(),
            position_id: Uuid::new_v4(),
            position_name: "工程师".to_string(),
            salary: Decimal::from(20000),
            employment_status: EmploymentStatus::Active,
            updated_at: Utc::now(),
        })
        .await;
        hr.put_resignation(ResignationRequest {
            id: resignation_id,
            company_id,
            employee_id,
            employee_name: "李雷".to_string(),
            reason: "personal reasons".to_string(),
            planned_leave_date: None,
            status: ResignationStatus::Pending,
            approved_by: None,
            approved_at: None,
        })
        .await;

        let flow = ResignationFlow::new(engine.clone(), hr.clone(), hr.clone());
        Fixture {
            flow,
            engine,
            hr,
            company_id,
            employee_id,
            resignation_id,
        }
    }

    fn actor() -> Actor {
        Actor::new(Uuid::new_v4(), "赵经理").with_role("manager")
    }

    #[tokio::test]
    async fn test_manager_approval_recorded_on_request() {
        let fx = fixture().await;
        let instance = fx
            .flow
            .create_workflow(fx.company_id, fx.resignation_id, &actor(), None)
            .await
            .unwrap();
        assert_eq!(instance.steps.len(), 6);
        assert_eq!(instance.steps[0].name, "离职审批");

        let approver = actor();
        fx.flow
            .advance_step(
                instance.id,
                AdvanceRequest::new(instance.steps[0].id, "approved"),
                &approver,
            )
            .await
            .unwrap();

        let request = ResignationStore::load(fx.hr.as_ref(), fx.resignation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.status, ResignationStatus::Approved);
        assert_eq!(request.approved_by, Some(approver.id));
        assert!(request.approved_at.is_some());

        // Employee unaffected until the workflow completes.
        let employee = EmployeeStore::load(fx.hr.as_ref(), fx.employee_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(employee.employment_status, EmploymentStatus::Active);
    }

    #[tokio::test]
    async fn test_completion_marks_employee_resigned() {
        let fx = fixture().await;
        let mut instance = fx
            .flow
            .create_workflow(fx.company_id, fx.resignation_id, &actor(), None)
            .await
            .unwrap();

        while instance.status == InstanceStatus::Active {
            let step_id = instance.steps[instance.current_step_index - 1].id;
            instance = fx
                .flow
                .advance_step(instance.id, AdvanceRequest::new(step_id, "done"), &actor())
                .await
                .unwrap();
        }
        assert_eq!(instance.status, InstanceStatus::Completed);

        let employee = EmployeeStore::load(fx.hr.as_ref(), fx.employee_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(employee.employment_status, EmploymentStatus::Resigned);
    }

    #[tokio::test]
    async fn test_reject_mid_flow_leaves_employee_untouched() {
        let fx = fixture().await;
        let instance = fx
            .flow
            .create_workflow(fx.company_id, fx.resignation_id, &actor(), None)
            .await
            .unwrap();

        // Approve the first step, then reject at HR review.
        let advanced = fx
            .flow
            .advance_step(
                instance.id,
                AdvanceRequest::new(instance.steps[0].id, "approved"),
                &actor(),
            )
            .await
            .unwrap();

        let cancelled = fx
            .flow
            .reject(advanced.id, "retention agreement reached", &actor())
            .await
            .unwrap();
        assert_eq!(cancelled.status, InstanceStatus::Cancelled);
        assert!(cancelled.end_date.is_some());

        let request = ResignationStore::load(fx.hr.as_ref(), fx.resignation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.status, ResignationStatus::Rejected);

        let employee = EmployeeStore::load(fx.hr.as_ref(), fx.employee_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(employee.employment_status, EmploymentStatus::Active);

        let history = fx
            .engine
            .history(&HistoryFilter::for_instance(fx.company_id, instance.id))
            .await
            .unwrap();
        let cancelled_rows: Vec<_> = history
            .iter()
            .filter(|e| e.action == HistoryAction::Cancelled)
            .collect();
        assert_eq!(cancelled_rows.len(), 1);
        assert_eq!(
            cancelled_rows[0].metadata.get("reason"),
            Some(&serde_json::json!("retention agreement reached"))
        );
    }
}
