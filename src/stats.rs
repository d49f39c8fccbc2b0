//! Per-process-type statistics.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{InstanceStatus, WorkflowInstance};

/// Aggregated figures for one process type within a tenant.
#[derive(Debug, Clone, Serialize, Default)]
pub struct WorkflowStats {
    pub total: u64,
    /// Instance counts bucketed by status.
    pub by_status: BTreeMap<&'static str, u64>,
    /// Mean `end_date - start_date` over completed instances, in
    /// milliseconds. 0 if nothing has completed.
    pub avg_completion_ms: i64,
    /// `completed / total * 100`. 0 if there are no instances.
    pub completion_rate: f64,
}

impl WorkflowStats {
    pub fn from_instances(instances: &[WorkflowInstance]) -> Self {
        let mut by_status: BTreeMap<&'static str, u64> = BTreeMap::new();
        let mut completed = 0u64;
        let mut duration_sum_ms = 0i64;
        let mut duration_count = 0i64;

        for instance in instances {
            *by_status.entry(instance.status.as_str()).or_insert(0) += 1;
            if instance.status == InstanceStatus::Completed {
                completed += 1;
                if let Some(end) = instance.end_date {
                    duration_sum_ms += (end - instance.start_date).num_milliseconds();
                    duration_count += 1;
                }
            }
        }

        let total = instances.len() as u64;
        Self {
            total,
            by_status,
            avg_completion_ms: if duration_count > 0 {
                duration_sum_ms / duration_count
            } else {
                0
            },
            completion_rate: if total > 0 {
                completed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Priority, RelatedEntity, RelatedEntityKind, WorkflowKind,
    };
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn instance_with(status: InstanceStatus, hours: Option<i64>) -> WorkflowInstance {
        let start = Utc::now() - Duration::hours(12);
        WorkflowInstance {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            template_id: None,
            template_name: "t".to_string(),
            kind: WorkflowKind::Recruitment,
            name: "n".to_string(),
            description: String::new(),
            initiator_id: Uuid::new_v4(),
            initiator_name: "i".to_string(),
            related: RelatedEntity {
                kind: RelatedEntityKind::Candidate,
                id: Uuid::new_v4(),
                name: "c".to_string(),
            },
            form_data: Default::default(),
            steps: Vec::new(),
            current_step_index: 0,
            status,
            start_date: start,
            end_date: hours.map(|h| start + Duration::hours(h)),
            priority: Priority::Medium,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_stats_avg_and_rate() {
        // 3 completed with 2h / 4h / 6h durations, 1 cancelled.
        let instances = vec![
            instance_with(InstanceStatus::Completed, Some(2)),
            instance_with(InstanceStatus::Completed, Some(4)),
            instance_with(InstanceStatus::Completed, Some(6)),
            instance_with(InstanceStatus::Cancelled, Some(1)),
        ];
        let stats = WorkflowStats::from_instances(&instances);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_status.get("completed"), Some(&3));
        assert_eq!(stats.by_status.get("cancelled"), Some(&1));
        assert_eq!(stats.avg_completion_ms, 4 * 3600 * 1000);
        assert!((stats.completion_rate - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_empty() {
        let stats = WorkflowStats::from_instances(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.avg_completion_ms, 0);
        assert_eq!(stats.completion_rate, 0.0);
    }
}
