//! Error types for the workflow engine.

use thiserror::Error;
use uuid::Uuid;

use crate::types::InstanceStatus;

/// Main error type for workflow operations.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("workflow instance {0} not found")]
    InstanceNotFound(Uuid),

    #[error("{entity} {id} not found")]
    EntityNotFound { entity: &'static str, id: Uuid },

    #[error("step mismatch: current step is {expected}, request targeted {got}")]
    StepMismatch { expected: Uuid, got: Uuid },

    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition {
        from: InstanceStatus,
        to: InstanceStatus,
    },

    #[error("workflow instance {id} is {status}; no further transitions permitted")]
    AlreadyTerminal { id: Uuid, status: InstanceStatus },

    #[error("workflow instance {id} is {status}; only active instances can advance")]
    NotActive { id: Uuid, status: InstanceStatus },

    #[error("workflow instance {0} has no step in progress")]
    NoStepInProgress(Uuid),

    #[error("form data field '{0}' is missing or invalid")]
    BadFormData(&'static str),

    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}
