//! Postgres persistence.
//!
//! Column-per-field for everything queries filter on; steps, form data and
//! the related-entity link are JSONB snapshots. Expected schema lives in
//! `migrations/001_workflow_tables.sql`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::history::{HistoryAction, HistoryEntry, HistoryFilter};
use crate::store::{HistoryStore, WorkflowStore};
use crate::types::{
    InstanceFilter, InstanceStatus, Priority, RelatedEntity, WorkflowInstance, WorkflowKind,
};

pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSTANCE_COLUMNS: &str = r#"
    id, company_id, template_id, template_name, kind, name, description,
    initiator_id, initiator_name, related, form_data, steps,
    current_step_index, status, start_date, end_date, priority,
    created_at, updated_at
"#;

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn insert_instance(&self, instance: &WorkflowInstance) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_instances
            (id, company_id, template_id, template_name, kind, name, description,
             initiator_id, initiator_name, related, form_data, steps,
             current_step_index, status, start_date, end_date, priority,
             created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(instance.id)
        .bind(instance.company_id)
        .bind(instance.template_id)
        .bind(&instance.template_name)
        .bind(instance.kind.as_str())
        .bind(&instance.name)
        .bind(&instance.description)
        .bind(instance.initiator_id)
        .bind(&instance.initiator_name)
        .bind(serde_json::to_value(&instance.related)?)
        .bind(serde_json::to_value(&instance.form_data)?)
        .bind(serde_json::to_value(&instance.steps)?)
        .bind(instance.current_step_index as i32)
        .bind(instance.status.as_str())
        .bind(instance.start_date)
        .bind(instance.end_date)
        .bind(priority_str(instance.priority))
        .bind(instance.created_at)
        .bind(instance.updated_at)
        .execute(&self.pool)
        .await
        .context("insert workflow instance")?;
        Ok(())
    }

    async fn load_instance(&self, id: Uuid) -> Result<Option<WorkflowInstance>> {
        let row = sqlx::query_as::<_, InstanceRow>(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM workflow_instances WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("load workflow instance")?;
        row.map(TryInto::try_into).transpose()
    }

    async fn save_instance(&self, instance: &WorkflowInstance) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_instances SET
                form_data = $2,
                steps = $3,
                current_step_index = $4,
                status = $5,
                end_date = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(instance.id)
        .bind(serde_json::to_value(&instance.form_data)?)
        .bind(serde_json::to_value(&instance.steps)?)
        .bind(instance.current_step_index as i32)
        .bind(instance.status.as_str())
        .bind(instance.end_date)
        .bind(instance.updated_at)
        .execute(&self.pool)
        .await
        .context("save workflow instance")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("workflow instance {} does not exist", instance.id);
        }
        Ok(())
    }

    async fn list_instances(&self, filter: &InstanceFilter) -> Result<Vec<WorkflowInstance>> {
        // NULL filter parameters match everything; NULL LIMIT/OFFSET are
        // no-ops in Postgres.
        let rows = sqlx::query_as::<_, InstanceRow>(&format!(
            r#"
            SELECT {INSTANCE_COLUMNS}
            FROM workflow_instances
            WHERE company_id = $1
              AND ($2::text IS NULL OR kind = $2)
              AND ($3::uuid IS NULL OR (related->>'id')::uuid = $3)
              AND ($4::text IS NULL OR status = $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(filter.company_id)
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.related_entity_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit.map(|n| n as i64))
        .bind(filter.skip.map(|n| n as i64))
        .fetch_all(&self.pool)
        .await
        .context("list workflow instances")?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl HistoryStore for PgWorkflowStore {
    async fn append(&self, entry: &HistoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_history
            (id, company_id, instance_id, instance_name, template_id, kind,
             action, actor_id, actor_name, actor_role, step_id, step_name,
             description, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(entry.id)
        .bind(entry.company_id)
        .bind(entry.instance_id)
        .bind(&entry.instance_name)
        .bind(entry.template_id)
        .bind(entry.kind.as_str())
        .bind(entry.action.as_str())
        .bind(entry.actor_id)
        .bind(&entry.actor_name)
        .bind(&entry.actor_role)
        .bind(entry.step_id)
        .bind(&entry.step_name)
        .bind(&entry.description)
        .bind(serde_json::to_value(&entry.metadata)?)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .context("append history entry")?;
        Ok(())
    }

    async fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, company_id, instance_id, instance_name, template_id, kind,
                   action, actor_id, actor_name, actor_role, step_id, step_name,
                   description, metadata, created_at
            FROM workflow_history
            WHERE company_id = $1
              AND ($2::uuid IS NULL OR instance_id = $2)
              AND ($3::text IS NULL OR kind = $3)
            ORDER BY created_at ASC
            "#,
        )
        .bind(filter.company_id)
        .bind(filter.instance_id)
        .bind(filter.kind.map(|k| k.as_str()))
        .fetch_all(&self.pool)
        .await
        .context("list history entries")?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

// ─── Row mapping ──────────────────────────────────────────────

fn priority_str(p: Priority) -> &'static str {
    match p {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
    }
}

/// Parse an enum stored as its snake_case text form.
fn text_enum<T: serde::de::DeserializeOwned>(column: &str, s: String) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(s))
        .with_context(|| format!("unrecognized {column} value"))
}

#[derive(sqlx::FromRow)]
struct InstanceRow {
    id: Uuid,
    company_id: Uuid,
    template_id: Option<Uuid>,
    template_name: String,
    kind: String,
    name: String,
    description: String,
    initiator_id: Uuid,
    initiator_name: String,
    related: serde_json::Value,
    form_data: serde_json::Value,
    steps: serde_json::Value,
    current_step_index: i32,
    status: String,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    priority: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InstanceRow> for WorkflowInstance {
    type Error = anyhow::Error;

    fn try_from(row: InstanceRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            company_id: row.company_id,
            template_id: row.template_id,
            template_name: row.template_name,
            kind: text_enum::<WorkflowKind>("kind", row.kind)?,
            name: row.name,
            description: row.description,
            initiator_id: row.initiator_id,
            initiator_name: row.initiator_name,
            related: serde_json::from_value::<RelatedEntity>(row.related)
                .context("related entity column")?,
            form_data: serde_json::from_value(row.form_data).context("form_data column")?,
            steps: serde_json::from_value(row.steps).context("steps column")?,
            current_step_index: row.current_step_index as usize,
            status: text_enum::<InstanceStatus>("status", row.status)?,
            start_date: row.start_date,
            end_date: row.end_date,
            priority: text_enum::<Priority>("priority", row.priority)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    company_id: Uuid,
    instance_id: Uuid,
    instance_name: String,
    template_id: Option<Uuid>,
    kind: String,
    action: String,
    actor_id: Uuid,
    actor_name: String,
    actor_role: Option<String>,
    step_id: Option<Uuid>,
    step_name: Option<String>,
    description: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = anyhow::Error;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            company_id: row.company_id,
            instance_id: row.instance_id,
            instance_name: row.instance_name,
            template_id: row.template_id,
            kind: text_enum::<WorkflowKind>("kind", row.kind)?,
            action: text_enum::<HistoryAction>("action", row.action)?,
            actor_id: row.actor_id,
            actor_name: row.actor_name,
            actor_role: row.actor_role,
            step_id: row.step_id,
            step_name: row.step_name,
            description: row.description,
            metadata: serde_json::from_value(row.metadata).context("metadata column")?,
            created_at: row.created_at,
        })
    }
}
