//! Plan executor for applying synchronization plans.
//!
//! Actions run strictly in plan order, one remote call at a time. Ids
//! assigned by the platform during the run (the class, uploaded
//! presentations) are tracked so later actions can reference them. The first
//! failing action aborts the run.

use std::collections::HashMap;
use tracing::{error, info};

use crate::error::{ReconcileError, Result, SyncError};
use crate::platform::RemoteApi;

use super::plan::{ActionType, NotesTarget, Operation, PlannedAction, SyncPlan};

/// Executor for synchronization plans.
pub struct PlanExecutor<'a> {
    /// Platform client.
    api: &'a dyn RemoteApi,
}

/// Result of executing a single action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    /// Action index in the plan.
    pub index: usize,
    /// Kind of action.
    pub action_type: ActionType,
    /// Name of the entity the action applied to.
    pub target: String,
    /// Id assigned by the platform, if the action created something.
    pub created_id: Option<String>,
}

/// Result of executing the entire plan.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Class id after execution, `None` only if the plan had no class.
    pub class_id: Option<String>,
    /// Individual action results, in execution order.
    pub results: Vec<ActionResult>,
}

/// A run aborted by a failing action.
///
/// Carries what was applied before the failure, the class id in particular,
/// so the caller can record it before reporting the error.
#[derive(Debug)]
pub struct ExecutionFailure {
    /// Class id known when the run stopped, including one created by the run.
    pub class_id: Option<String>,
    /// Actions applied before the failure.
    pub applied: Vec<ActionResult>,
    /// Error of the failing action, unmodified.
    pub error: SyncError,
}

/// Ids learned while executing.
#[derive(Debug, Default)]
struct RunContext {
    class_id: Option<String>,
    uploaded: HashMap<String, String>,
}

impl<'a> PlanExecutor<'a> {
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(api: &'a dyn RemoteApi) -> Self {
        Self { api }
    }

    /// Executes a synchronization plan.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionFailure`] wrapping the error of the first failing
    /// action. Actions applied before it are not rolled back.
    pub async fn execute(&self, plan: &SyncPlan) -> std::result::Result<ExecutionResult, ExecutionFailure> {
        info!("Executing sync plan with {} actions", plan.actions.len());

        let mut context = RunContext {
            class_id: plan.class_id.clone(),
            uploaded: HashMap::new(),
        };
        let mut results = Vec::with_capacity(plan.actions.len());

        for (index, action) in plan.actions.iter().enumerate() {
            info!("Executing action {index}: {}", action.description());

            match self.execute_action(action, &mut context).await {
                Ok(created_id) => results.push(ActionResult {
                    index,
                    action_type: action.action_type(),
                    target: action.target().to_string(),
                    created_id,
                }),
                Err(e) => {
                    error!(
                        "Action {index} ({}) failed after {} applied actions: {e}",
                        action.description(),
                        results.len()
                    );
                    return Err(ExecutionFailure {
                        class_id: context.class_id,
                        applied: results,
                        error: e,
                    });
                }
            }
        }

        Ok(ExecutionResult {
            class_id: context.class_id,
            results,
        })
    }

    /// Executes a single action, returning the id of what it created.
    async fn execute_action(&self, action: &PlannedAction, context: &mut RunContext) -> Result<Option<String>> {
        if let Operation::CreateClass { request } = &action.operation {
            let class = self.api.create_class(request).await?;
            info!("Created class: {} (ID: {})", class.name, class.id);
            context.class_id = Some(class.id.clone());
            return Ok(Some(class.id));
        }

        let class_id = context
            .class_id
            .clone()
            .ok_or_else(|| ReconcileError::MissingClassId {
                action: action.description(),
            })?;

        match &action.operation {
            Operation::CreateClass { .. } => Ok(None),
            Operation::UpdateClass { request } => {
                self.api.update_class(&class_id, request).await?;
                Ok(None)
            }
            Operation::DeletePresentation {
                presentation_id, ..
            } => {
                self.api.delete_presentation(&class_id, presentation_id).await?;
                Ok(None)
            }
            Operation::CreatePresentation { file, filename } => {
                let presentation = self.api.create_presentation(&class_id, file).await?;
                info!("Uploaded presentation: {filename} (ID: {})", presentation.id);
                context
                    .uploaded
                    .insert(filename.clone(), presentation.id.clone());
                Ok(Some(presentation.id))
            }
            Operation::UpdatePresentation {
                presentation_id,
                file,
                filename,
            } => {
                let presentation = self
                    .api
                    .update_presentation(&class_id, presentation_id, file)
                    .await?;
                info!("Replaced presentation: {filename} (ID: {})", presentation.id);
                context
                    .uploaded
                    .insert(filename.clone(), presentation.id.clone());
                Ok(Some(presentation.id))
            }
            Operation::CreateNotes { target, notes } => {
                let presentation_id = match target {
                    NotesTarget::Existing {
                        presentation_id, ..
                    } => presentation_id.clone(),
                    NotesTarget::Uploaded { filename } => context
                        .uploaded
                        .get(filename)
                        .cloned()
                        .ok_or_else(|| ReconcileError::UnresolvedPresentation {
                            filename: filename.clone(),
                        })?,
                };
                self.api.create_notes(&class_id, &presentation_id, notes).await?;
                Ok(None)
            }
            Operation::DeleteResource { resource_id, .. } => {
                self.api.delete_resource(&class_id, resource_id).await?;
                Ok(None)
            }
            Operation::CreateResource { request } => {
                let resource = self.api.create_resource(&class_id, request).await?;
                info!("Created resource: {} (ID: {})", resource.name, resource.id);
                Ok(Some(resource.id))
            }
            Operation::UpdateResource {
                resource_id,
                request,
            } => {
                self.api.update_resource(&class_id, resource_id, request).await?;
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for PlanExecutor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanExecutor").finish_non_exhaustive()
    }
}

impl ExecutionFailure {
    /// Returns whether the class was created before the failure.
    #[must_use]
    pub fn class_created(&self) -> bool {
        self.applied
            .iter()
            .any(|r| r.action_type == ActionType::CreateClass)
    }
}

impl std::fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for ExecutionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

impl From<ExecutionFailure> for SyncError {
    fn from(failure: ExecutionFailure) -> Self {
        failure.error
    }
}

impl ExecutionResult {
    /// Returns the number of applied actions.
    #[must_use]
    pub const fn applied(&self) -> usize {
        self.results.len()
    }
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Applied {} actions", self.results.len())?;
        if let Some(id) = &self.class_id {
            write!(f, " on class {id}")?;
        }
        Ok(())
    }
}
