//! Employee lifecycle adapter: onboarding, promotion, transfer, and salary
//! adjustment workflows.
//!
//! All four process types act on an [`Employee`] record, share one advance
//! path, and differ in their step graphs, form-data snapshots, and the
//! mutation applied when the workflow completes.

use anyhow::anyhow;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::adapters::{
    complete_current_step, completed_entry, created_entry, decimal_field, step_completed_entry,
    step_started_entry, AdvanceRequest,
};
use crate::engine::WorkflowManager;
use crate::entities::{Employee, EmployeeStore, EmploymentStatus};
use crate::error::WorkflowError;
use crate::history::Actor;
use crate::stats::WorkflowStats;
use crate::steps::{
    onboarding_steps, promotion_steps, salary_adjustment_steps, transfer_steps,
};
use crate::types::{
    InstanceStatus, NewInstance, Priority, RelatedEntity, RelatedEntityKind, Step, StepEffect,
    WorkflowInstance, WorkflowKind,
};

/// Parameters for a promotion workflow.
#[derive(Debug, Clone)]
pub struct PromotionParams {
    pub employee_id: Uuid,
    pub target_position_id: Uuid,
    pub target_position_name: String,
    pub new_salary: Decimal,
}

/// Parameters for a transfer workflow.
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub employee_id: Uuid,
    pub target_department_id: Uuid,
    pub target_department_name: String,
}

/// Parameters for a salary adjustment workflow.
#[derive(Debug, Clone)]
pub struct SalaryAdjustmentParams {
    pub employee_id: Uuid,
    pub new_salary: Decimal,
}

pub struct EmployeeLifecycleFlow {
    engine: Arc<WorkflowManager>,
    employees: Arc<dyn EmployeeStore>,
}

impl EmployeeLifecycleFlow {
    pub fn new(engine: Arc<WorkflowManager>, employees: Arc<dyn EmployeeStore>) -> Self {
        Self { engine, employees }
    }

    // ── Creation ──

    /// Start an onboarding workflow. The employee record is put into
    /// `onboarding` status until the workflow completes.
    pub async fn create_onboarding_workflow(
        &self,
        company_id: Uuid,
        employee_id: Uuid,
        initiator: &Actor,
        custom_steps: Option<Vec<Step>>,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let mut employee = self.load_employee(employee_id).await?;
        let form_data = HashMap::from([
            ("employee_id".to_string(), serde_json::json!(employee.id)),
            (
                "department_id".to_string(),
                serde_json::json!(employee.department_id),
            ),
            (
                "position_id".to_string(),
                serde_json::json!(employee.position_id),
            ),
        ]);

        let instance = self
            .create(
                company_id,
                WorkflowKind::Onboarding,
                &employee,
                format!("Onboarding: {}", employee.name),
                format!(
                    "Onboarding workflow for {} joining {}",
                    employee.name, employee.department_name
                ),
                form_data,
                custom_steps.unwrap_or_else(onboarding_steps),
                initiator,
            )
            .await?;

        employee.employment_status = EmploymentStatus::Onboarding;
        employee.updated_at = Utc::now();
        self.employees.save(&employee).await?;

        self.engine
            .add_history(created_entry(
                &instance,
                initiator,
                format!("Onboarding workflow started for {}", employee.name),
            ))
            .await?;
        Ok(instance)
    }

    /// Start a promotion workflow toward a target position and salary.
    pub async fn create_promotion_workflow(
        &self,
        company_id: Uuid,
        params: PromotionParams,
        initiator: &Actor,
        custom_steps: Option<Vec<Step>>,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let employee = self.load_employee(params.employee_id).await?;
        let form_data = HashMap::from([
            ("employee_id".to_string(), serde_json::json!(employee.id)),
            (
                "current_position_id".to_string(),
                serde_json::json!(employee.position_id),
            ),
            (
                "target_position_id".to_string(),
                serde_json::json!(params.target_position_id),
            ),
            (
                "target_position_name".to_string(),
                serde_json::json!(params.target_position_name),
            ),
            (
                "old_salary".to_string(),
                serde_json::json!(employee.salary),
            ),
            (
                "new_salary".to_string(),
                serde_json::json!(params.new_salary),
            ),
        ]);

        let instance = self
            .create(
                company_id,
                WorkflowKind::Promotion,
                &employee,
                format!(
                    "Promotion: {} to {}",
                    employee.name, params.target_position_name
                ),
                format!(
                    "Promotion of {} from {} to {}",
                    employee.name, employee.position_name, params.target_position_name
                ),
                form_data,
                custom_steps.unwrap_or_else(promotion_steps),
                initiator,
            )
            .await?;

        self.engine
            .add_history(created_entry(
                &instance,
                initiator,
                format!("Promotion workflow started for {}", employee.name),
            ))
            .await?;
        Ok(instance)
    }

    /// Start a transfer workflow toward a target department.
    pub async fn create_transfer_workflow(
        &self,
        company_id: Uuid,
        params: TransferParams,
        initiator: &Actor,
        custom_steps: Option<Vec<Step>>,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let employee = self.load_employee(params.employee_id).await?;
        let form_data = HashMap::from([
            ("employee_id".to_string(), serde_json::json!(employee.id)),
            (
                "source_department_id".to_string(),
                serde_json::json!(employee.department_id),
            ),
            (
                "target_department_id".to_string(),
                serde_json::json!(params.target_department_id),
            ),
            (
                "target_department_name".to_string(),
                serde_json::json!(params.target_department_name),
            ),
        ]);

        let instance = self
            .create(
                company_id,
                WorkflowKind::Transfer,
                &employee,
                format!(
                    "Transfer: {} to {}",
                    employee.name, params.target_department_name
                ),
                format!(
                    "Transfer of {} from {} to {}",
                    employee.name, employee.department_name, params.target_department_name
                ),
                form_data,
                custom_steps.unwrap_or_else(transfer_steps),
                initiator,
            )
            .await?;

        self.engine
            .add_history(created_entry(
                &instance,
                initiator,
                format!("Transfer workflow started for {}", employee.name),
            ))
            .await?;
        Ok(instance)
    }

    /// Start a salary adjustment workflow.
    pub async fn create_salary_adjustment_workflow(
        &self,
        company_id: Uuid,
        params: SalaryAdjustmentParams,
        initiator: &Actor,
        custom_steps: Option<Vec<Step>>,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let employee = self.load_employee(params.employee_id).await?;
        let form_data = HashMap::from([
            ("employee_id".to_string(), serde_json::json!(employee.id)),
            (
                "old_salary".to_string(),
                serde_json::json!(employee.salary),
            ),
            (
                "new_salary".to_string(),
                serde_json::json!(params.new_salary),
            ),
        ]);

        let instance = self
            .create(
                company_id,
                WorkflowKind::SalaryAdjustment,
                &employee,
                format!("Salary adjustment: {}", employee.name),
                format!("Salary adjustment for {}", employee.name),
                form_data,
                custom_steps.unwrap_or_else(salary_adjustment_steps),
                initiator,
            )
            .await?;

        self.engine
            .add_history(created_entry(
                &instance,
                initiator,
                format!("Salary adjustment workflow started for {}", employee.name),
            ))
            .await?;
        Ok(instance)
    }

    // ── Advancement ──

    /// Complete the current step and advance. Shared by all four lifecycle
    /// process types; the step effect and the terminal mutation are resolved
    /// from the step graph and the instance kind.
    pub async fn advance_step(
        &self,
        instance_id: Uuid,
        req: AdvanceRequest,
        actor: &Actor,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let _guard = self.engine.instance_lock(instance_id).await;
        let mut instance = self.engine.get_instance(instance_id).await?;
        let step = complete_current_step(&mut instance, &req)?;

        // Required form data is validated before anything is persisted, so a
        // bad request leaves no partial state anywhere.
        let new_salary = if step.effect == StepEffect::ApplySalaryChange {
            Some(decimal_field(&instance.form_data, "new_salary")?)
        } else {
            None
        };

        // Instance write first; the employee record is only patched once the
        // workflow state is durable.
        if req.advance_to_next {
            self.engine.advance_loaded(&mut instance).await?;
        } else {
            self.engine.save_loaded(&mut instance).await?;
        }

        if let Some(new_salary) = new_salary {
            self.apply_salary_change(&instance, new_salary).await?;
        }

        self.engine
            .add_history(step_completed_entry(&instance, &step, actor))
            .await?;

        if req.advance_to_next {
            if instance.status == InstanceStatus::Completed {
                self.apply_terminal_mutation(&instance).await?;
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

    pub async fn stats(
        &self,
        company_id: Uuid,
        kind: WorkflowKind,
    ) -> Result<WorkflowStats, WorkflowError> {
        self.engine.stats(company_id, kind).await
    }

    // ── Internals ──

    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        company_id: Uuid,
        kind: WorkflowKind,
        employee: &Employee,
        name: String,
        description: String,
        form_data: HashMap<String, serde_json::Value>,
        mut steps: Vec<Step>,
        initiator: &Actor,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let now = Utc::now();
        let Some(first) = steps.first_mut() else {
            return Err(anyhow!("step graph must not be empty").into());
        };
        first.start(now);

        self.engine
            .create_instance(NewInstance {
                company_id,
                template_id: None,
                template_name: kind.as_str().to_string(),
                kind,
                name,
                description,
                initiator_id: initiator.id,
                initiator_name: initiator.name.clone(),
                related: RelatedEntity {
                    kind: RelatedEntityKind::Employee,
                    id: employee.id,
                    name: employee.name.clone(),
                },
                form_data,
                steps,
                current_step_index: 1,
                status: InstanceStatus::Active,
                start_date: now,
                priority: Priority::Medium,
            })
            .await
    }

    async fn load_employee(&self, id: Uuid) -> Result<Employee, WorkflowError> {
        self.employees
            .load(id)
            .await?
            .ok_or(WorkflowError::EntityNotFound {
                entity: "employee",
                id,
            })
    }

    async fn apply_salary_change(
        &self,
        instance: &WorkflowInstance,
        new_salary: Decimal,
    ) -> Result<(), WorkflowError> {
        let mut employee = self.load_employee(instance.related.id).await?;
        employee.salary = new_salary;
        employee.updated_at = Utc::now();
        self.employees.save(&employee).await?;
        info!(
            instance_id = %instance.id,
            employee_id = %employee.id,
            "salary change applied"
        );
        Ok(())
    }

    async fn apply_terminal_mutation(
        &self,
        instance: &WorkflowInstance,
    ) -> Result<(), WorkflowError> {
        let mut employee = self.load_employee(instance.related.id).await?;
        match instance.kind {
            WorkflowKind::Onboarding => {
                employee.employment_status = EmploymentStatus::Active;
            }
            WorkflowKind::Promotion => {
                let position_id = instance
                    .form_data
                    .get("target_position_id")
                    .and_then(|v| serde_json::from_value::<Uuid>(v.clone()).ok())
                    .ok_or(WorkflowError::BadFormData("target_position_id"))?;
                let position_name = instance
                    .form_data
                    .get("target_position_name")
                    .and_then(|v| v.as_str())
                    .ok_or(WorkflowError::BadFormData("target_position_name"))?;
                employee.position_id = position_id;
                employee.position_name = position_name.to_string();
            }
            WorkflowKind::Transfer => {
                let department_id = instance
                    .form_data
                    .get("target_department_id")
                    .and_then(|v| serde_json::from_value::<Uuid>(v.clone()).ok())
                    .ok_or(WorkflowError::BadFormData("target_department_id"))?;
                let department_name = instance
                    .form_data
                    .get("target_department_name")
                    .and_then(|v| v.as_str())
                    .ok_or(WorkflowError::BadFormData("target_department_name"))?;
                employee.department_id = department_id;
                employee.department_name = department_name.to_string();
            }
            // Salary adjustment already applied its change at the 薪资生效 step.
            _ => return Ok(()),
        }
        employee.updated_at = Utc::now();
        self.employees.save(&employee).await?;
        Ok(())
    }
}
