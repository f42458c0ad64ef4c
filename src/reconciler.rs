//! Reconciler for synchronizing a class with its configuration.
//!
//! This module implements the reconciliation run: fetch a snapshot of the
//! remote class, prepare the desired state, compute the plan and apply it.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{ClassConfig, ConfigValidator};
use crate::error::Result;
use crate::planner::{
    ActionType, DesiredStateBuilder, DiffEngine, ExecutionFailure, ExecutionResult, PlanExecutor,
    RemoteSnapshot, SyncPlan,
};
use crate::platform::RemoteApi;
use crate::resolve::ScriptResolver;

/// Reconciler for a class configuration.
pub struct Reconciler {
    /// Platform client.
    api: Arc<dyn RemoteApi>,
    /// Script renderer, shared across runs to reuse fetched fragments.
    scripts: ScriptResolver,
    /// Diff engine.
    diff_engine: DiffEngine,
    /// Directory relative configuration paths are resolved against.
    base_dir: Option<PathBuf>,
}

/// Result of a reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    /// Class id after the run.
    pub class_id: Option<String>,
    /// Whether the class was created by this run.
    pub class_created: bool,
    /// Number of created presentations and resources.
    pub created: usize,
    /// Number of updated entities, class metadata included.
    pub updated: usize,
    /// Number of deleted presentations and resources.
    pub deleted: usize,
    /// Number of notes uploads.
    pub notes: usize,
    /// Non-fatal issues found while planning.
    pub warnings: Vec<String>,
}

/// Report of drift detection.
#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    /// Class id checked, `None` when the configuration has none.
    pub class_id: Option<String>,
    /// Whether drift was detected.
    pub has_drift: bool,
    /// Description of every pending action.
    pub drifted: Vec<String>,
    /// Non-fatal issues found while planning.
    pub warnings: Vec<String>,
}

impl Reconciler {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(api: Arc<dyn RemoteApi>, scripts: ScriptResolver) -> Self {
        Self {
            api,
            scripts,
            diff_engine: DiffEngine::new(),
            base_dir: None,
        }
    }

    /// Resolves relative presentation, notes and script paths against `dir`,
    /// the directory of the configuration file.
    #[must_use]
    pub fn with_base_dir(self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            scripts: self.scripts.with_base_dir(dir.clone()),
            base_dir: Some(dir),
            ..self
        }
    }

    /// Returns the platform client.
    #[must_use]
    pub fn api(&self) -> &dyn RemoteApi {
        self.api.as_ref()
    }

    /// Fetches the remote state of a class.
    ///
    /// A class id unknown to the platform yields an empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if a remote read fails.
    pub async fn fetch_snapshot(&self, class_id: Option<&str>) -> Result<RemoteSnapshot> {
        let Some(class_id) = class_id else {
            debug!("No class id, remote state is empty");
            return Ok(RemoteSnapshot::empty());
        };

        let class = match self.api.get_class(class_id).await {
            Ok(class) => class,
            Err(e) if e.is_not_found() => {
                warn!("Class {class_id} not found on the platform");
                return Ok(RemoteSnapshot::empty());
            }
            Err(e) => return Err(e),
        };

        let presentations = self.api.list_presentations(class_id).await?;
        let mut snapshot = RemoteSnapshot {
            class: Some(class),
            presentations,
            ..RemoteSnapshot::empty()
        };

        for presentation in &snapshot.presentations {
            let notes = match self.api.get_notes(class_id, &presentation.id).await {
                Ok(notes) => notes,
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(e),
            };
            snapshot.notes.insert(presentation.id.clone(), notes);
        }

        debug!(
            "Fetched class {class_id}: {} presentations, {} resources",
            snapshot.presentations.len(),
            snapshot.resources().len()
        );
        Ok(snapshot)
    }

    /// Computes the plan for a configuration without changing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, a remote read fails
    /// or the desired state cannot be prepared.
    pub async fn plan(&self, config: &ClassConfig) -> Result<SyncPlan> {
        let snapshot = self.fetch_snapshot(config.id.as_deref()).await?;
        self.plan_against(config, &snapshot).await
    }

    /// Computes the plan for a configuration against a known snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the desired state
    /// cannot be prepared.
    pub async fn plan_against(&self, config: &ClassConfig, snapshot: &RemoteSnapshot) -> Result<SyncPlan> {
        info!("Planning synchronization of class '{}'", config.name);

        let mut validator = ConfigValidator::new();
        if let Some(dir) = &self.base_dir {
            validator = validator.with_base_dir(dir.clone());
        }
        let validation = validator.validate(config)?;
        for warning in &validation.warnings {
            warn!("{warning}");
        }

        let desired = DesiredStateBuilder::new(&self.scripts)
            .with_base_dir(self.base_dir.as_deref())
            .build(config, snapshot)
            .await?;
        debug!("{} script fragments cached", self.scripts.cache().len().await);
        let plan = self.diff_engine.compute(&desired, snapshot);

        info!("Plan has {} actions", plan.action_count());
        Ok(plan)
    }

    /// Plans and applies a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if planning fails or an action fails. Actions applied
    /// before a failure stay applied. A class created before the failure is
    /// only known through [`Reconciler::apply_plan`].
    pub async fn apply(&self, config: &ClassConfig) -> Result<ReconciliationResult> {
        let plan = self.plan(config).await?;
        Ok(self.apply_plan(&plan).await?)
    }

    /// Applies a previously computed plan.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionFailure`] carrying the error of the first failing
    /// action and the class id known at that point. Recording that id before
    /// running again keeps the next run from creating a second class.
    pub async fn apply_plan(
        &self,
        plan: &SyncPlan,
    ) -> std::result::Result<ReconciliationResult, ExecutionFailure> {
        if plan.is_empty() {
            info!("Class '{}' is up to date", plan.class_name);
            return Ok(ReconciliationResult::from_plan(plan, &ExecutionResult {
                class_id: plan.class_id.clone(),
                results: Vec::new(),
            }));
        }

        let execution = PlanExecutor::new(self.api.as_ref()).execute(plan).await?;
        info!("{execution}");
        Ok(ReconciliationResult::from_plan(plan, &execution))
    }

    /// Checks for drift without applying changes.
    ///
    /// # Errors
    ///
    /// Returns an error if planning fails.
    pub async fn check_drift(&self, config: &ClassConfig) -> Result<DriftReport> {
        info!("Checking for drift of class '{}'", config.name);
        let plan = self.plan(config).await?;

        Ok(DriftReport {
            class_id: config.id.clone(),
            has_drift: !plan.is_empty(),
            drifted: plan.actions.iter().map(ToString::to_string).collect(),
            warnings: plan.warnings,
        })
    }

    /// Deletes a class and everything attached to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    pub async fn destroy(&self, class_id: &str) -> Result<()> {
        info!("Deleting class {class_id}");
        self.api.delete_class(class_id).await
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("scripts", &self.scripts)
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

impl ReconciliationResult {
    fn from_plan(plan: &SyncPlan, execution: &ExecutionResult) -> Self {
        let count = |types: &[ActionType]| {
            execution
                .results
                .iter()
                .filter(|r| types.contains(&r.action_type))
                .count()
        };

        Self {
            class_id: execution.class_id.clone(),
            class_created: count(&[ActionType::CreateClass]) > 0,
            created: count(&[ActionType::CreatePresentation, ActionType::CreateResource]),
            updated: count(&[
                ActionType::UpdateClass,
                ActionType::UpdatePresentation,
                ActionType::UpdateResource,
            ]),
            deleted: count(&[ActionType::DeletePresentation, ActionType::DeleteResource]),
            notes: count(&[ActionType::CreateNotes]),
            warnings: plan.warnings.clone(),
        }
    }

    /// Returns the total number of applied changes.
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted + self.notes + usize::from(self.class_created)
    }
}

impl DriftReport {
    /// Returns true if the class matches its configuration.
    #[must_use]
    pub const fn is_converged(&self) -> bool {
        !self.has_drift
    }
}

impl std::fmt::Display for DriftReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_drift {
            writeln!(f, "Drift detected:")?;
            for action in &self.drifted {
                writeln!(f, "  - {action}")?;
            }
        } else {
            write!(f, "No drift detected, class is in sync")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Synchronization complete:")?;
        if let Some(id) = &self.class_id {
            let created = if self.class_created { " (created)" } else { "" };
            writeln!(f, "  Class: {id}{created}")?;
        }
        writeln!(f, "  Created: {}", self.created)?;
        writeln!(f, "  Updated: {}", self.updated)?;
        writeln!(f, "  Deleted: {}", self.deleted)?;
        writeln!(f, "  Notes: {}", self.notes)?;

        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }

        Ok(())
    }
}
