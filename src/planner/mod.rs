//! Planning module for synchronization operations.
//!
//! This module prepares the desired state, compares it with the remote
//! state, and generates and applies execution plans.

mod desired;
mod diff;
mod executor;
mod plan;

pub use desired::{
    DesiredClass, DesiredPresentation, DesiredResource, DesiredState, DesiredStateBuilder,
    RemoteSnapshot,
};
pub use diff::{DiffEngine, MAX_PRESENTATION_BYTES};
pub use executor::{ActionResult, ExecutionFailure, ExecutionResult, PlanExecutor};
pub use plan::{ActionType, FieldChange, NotesTarget, Operation, PlannedAction, SyncPlan};
