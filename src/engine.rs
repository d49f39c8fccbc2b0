//! The core workflow engine.
//!
//! [`WorkflowManager`] owns instance creation, step advancement, status
//! transitions, and completion detection. It operates exclusively through the
//! store traits and never applies domain side effects — those belong to the
//! adapters, which alone know the process-specific completion semantics.
//!
//! Concurrency: two concurrent advances against one instance would race on
//! the read-modify-write of `steps` and `current_step_index`. The manager
//! therefore keeps a keyed mutex per instance id; every mutating path runs
//! under that lock. Adapters hold the lock across their whole
//! read-mutate-advance-persist sequence via [`WorkflowManager::instance_lock`].

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::history::{HistoryEntry, HistoryFilter};
use crate::stats::WorkflowStats;
use crate::store::{HistoryStore, WorkflowStore};
use crate::types::{
    InstanceFilter, InstanceStatus, NewInstance, WorkflowInstance, WorkflowKind,
};

/// The workflow engine.
pub struct WorkflowManager {
    store: Arc<dyn WorkflowStore>,
    history: Arc<dyn HistoryStore>,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl WorkflowManager {
    pub fn new(store: Arc<dyn WorkflowStore>, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            store,
            history,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the serialization lock for one instance id.
    ///
    /// Mutating operations that load an instance, modify it, and persist it
    /// must hold this guard for the whole sequence. The `*_loaded` methods on
    /// this type assume the caller holds it.
    pub async fn instance_lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Evict entries no one holds anymore (map entry is the only
            // strong reference), otherwise the map grows by one per
            // instance id ever locked.
            locks.retain(|lid, l| *lid == id || Arc::strong_count(l) > 1);
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    // ── Creation ──

    /// Persist a new instance from an adapter-built specification.
    ///
    /// The engine performs no validation of step graph shape; adapters are
    /// responsible for well-formed graphs (non-empty, first step in progress,
    /// rest pending). The caller writes the `created` history entry.
    pub async fn create_instance(
        &self,
        spec: NewInstance,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let now = Utc::now();
        let instance = WorkflowInstance {
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
        };
        self.store.insert_instance(&instance).await?;
        info!(
            instance_id = %instance.id,
            kind = %instance.kind,
            company_id = %instance.company_id,
            "workflow instance created"
        );
        Ok(instance)
    }

    // ── Advancement ──

    /// Advance an instance to its next step, or complete it.
    ///
    /// This does NOT complete the previous current step — the calling adapter
    /// marks it completed (status, end time, result) before invoking this.
    pub async fn advance_step(&self, id: Uuid) -> Result<WorkflowInstance, WorkflowError> {
        let _guard = self.instance_lock(id).await;
        let mut instance = self.load_required(id).await?;
        self.advance_loaded(&mut instance).await?;
        Ok(instance)
    }

    /// In-lock advancement primitive: caller holds [`Self::instance_lock`]
    /// and has already loaded (and possibly mutated) the instance.
    pub async fn advance_loaded(
        &self,
        instance: &mut WorkflowInstance,
    ) -> Result<(), WorkflowError> {
        if instance.status.is_terminal() {
            return Err(WorkflowError::AlreadyTerminal {
                id: instance.id,
                status: instance.status,
            });
        }
        // A paused or errored instance must be resumed first; without this
        // check the last step would take a paused -> completed edge the
        // transition table forbids.
        if instance.status != InstanceStatus::Active {
            return Err(WorkflowError::NotActive {
                id: instance.id,
                status: instance.status,
            });
        }

        let now = Utc::now();
        if instance.current_step_index >= instance.steps.len() {
            // The step just completed was the last one.
            instance.status = InstanceStatus::Completed;
            instance.end_date = Some(now);
            info!(instance_id = %instance.id, "workflow instance completed");
        } else {
            let index = instance.current_step_index;
            let step = &mut instance.steps[index];
            step.start(now);
            instance.current_step_index += 1;
            debug!(
                instance_id = %instance.id,
                step = %step.name,
                index,
                "step started"
            );
        }

        instance.updated_at = now;
        self.store.save_instance(instance).await?;
        Ok(())
    }

    /// Persist the current state of a loaded instance without advancing.
    /// Used for partial step updates (`advance_to_next = false`).
    pub async fn save_loaded(&self, instance: &mut WorkflowInstance) -> Result<(), WorkflowError> {
        instance.updated_at = Utc::now();
        self.store.save_instance(instance).await?;
        Ok(())
    }

    // ── Status transitions ──

    /// Out-of-band status transition: pause, resume, or cancel.
    /// Never touches steps.
    pub async fn update_instance_status(
        &self,
        id: Uuid,
        status: InstanceStatus,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let _guard = self.instance_lock(id).await;
        let mut instance = self.load_required(id).await?;
        self.update_status_loaded(&mut instance, status, end_date)
            .await?;
        Ok(instance)
    }

    /// In-lock variant of [`Self::update_instance_status`].
    pub async fn update_status_loaded(
        &self,
        instance: &mut WorkflowInstance,
        status: InstanceStatus,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<(), WorkflowError> {
        if !instance.status.can_transition_to(status) {
            return Err(WorkflowError::InvalidTransition {
                from: instance.status,
                to: status,
            });
        }

        let now = Utc::now();
        instance.status = status;
        if status.is_terminal() {
            instance.end_date = Some(end_date.unwrap_or(now));
        }
        instance.updated_at = now;
        self.store.save_instance(instance).await?;
        info!(instance_id = %instance.id, status = %status, "instance status updated");
        Ok(())
    }

    // ── Queries ──

    pub async fn get_instance(&self, id: Uuid) -> Result<WorkflowInstance, WorkflowError> {
        self.load_required(id).await
    }

    pub async fn list_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<WorkflowInstance>, WorkflowError> {
        Ok(self.store.list_instances(filter).await?)
    }

    async fn load_required(&self, id: Uuid) -> Result<WorkflowInstance, WorkflowError> {
        self.store
            .load_instance(id)
            .await?
            .ok_or(WorkflowError::InstanceNotFound(id))
    }

    // ── History ──

    /// Append one immutable audit record. A store failure propagates; history
    /// writes are never silently dropped.
    pub async fn add_history(&self, entry: HistoryEntry) -> Result<HistoryEntry, WorkflowError> {
        self.history.append(&entry).await?;
        debug!(
            instance_id = %entry.instance_id,
            action = %entry.action,
            "history entry appended"
        );
        Ok(entry)
    }

    pub async fn history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<HistoryEntry>, WorkflowError> {
        Ok(self.history.list(filter).await?)
    }

    // ── Statistics ──

    /// Aggregate counts, mean completion time, and completion rate for one
    /// process type within a tenant.
    pub async fn stats(
        &self,
        company_id: Uuid,
        kind: WorkflowKind,
    ) -> Result<WorkflowStats, WorkflowError> {
        let filter = InstanceFilter::for_company(company_id).with_kind(kind);
        let instances = self.store.list_instances(&filter).await?;
        Ok(WorkflowStats::from_instances(&instances))
    }
}
