//! Synchronization plan types.
//!
//! A plan is an ordered list of operations against the platform, each with
//! the field-level changes that motivated it.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::platform::{ClassRequest, Note, ResourceRequest};

/// A complete synchronization plan.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Class the plan applies to, `None` when it creates the class.
    pub class_id: Option<String>,
    /// Class name.
    pub class_name: String,
    /// Planned actions in execution order.
    pub actions: Vec<PlannedAction>,
    /// Non-fatal issues found while planning.
    pub warnings: Vec<String>,
}

/// A single planned action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    /// Operation to perform.
    pub operation: Operation,
    /// Human-readable reason.
    pub reason: String,
    /// Field-level changes, empty for creations and deletions.
    pub changes: Vec<FieldChange>,
}

/// A change of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// Field name.
    pub field: String,
    /// Remote value.
    pub old_value: String,
    /// Desired value.
    pub new_value: String,
}

/// Presentation a notes operation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotesTarget {
    /// A presentation already on the platform.
    Existing {
        /// Presentation id.
        presentation_id: String,
        /// File name.
        filename: String,
    },
    /// A presentation uploaded earlier in the same run.
    Uploaded {
        /// File name.
        filename: String,
    },
}

/// Operations against the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create the class.
    CreateClass {
        /// Class metadata.
        request: ClassRequest,
    },
    /// Replace the class metadata.
    UpdateClass {
        /// Class metadata.
        request: ClassRequest,
    },
    /// Delete a presentation absent from the configuration.
    DeletePresentation {
        /// Presentation id.
        presentation_id: String,
        /// File name.
        filename: String,
    },
    /// Upload a new presentation.
    CreatePresentation {
        /// Local file.
        file: PathBuf,
        /// File name.
        filename: String,
    },
    /// Replace a presentation whose content changed.
    UpdatePresentation {
        /// Id of the presentation being replaced.
        presentation_id: String,
        /// Local file.
        file: PathBuf,
        /// File name.
        filename: String,
    },
    /// Set the notes of a presentation.
    CreateNotes {
        /// Target presentation.
        target: NotesTarget,
        /// Notes, ordered by page.
        notes: Vec<Note>,
    },
    /// Delete a resource.
    DeleteResource {
        /// Resource id.
        resource_id: String,
        /// Resource name.
        name: String,
    },
    /// Create a resource.
    CreateResource {
        /// Resource definition.
        request: ResourceRequest,
    },
    /// Re-specify a resource that drifted.
    UpdateResource {
        /// Resource id.
        resource_id: String,
        /// Full resource definition.
        request: ResourceRequest,
    },
}

/// Kinds of actions in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// Create the class.
    CreateClass,
    /// Update class metadata.
    UpdateClass,
    /// Delete a presentation.
    DeletePresentation,
    /// Upload a presentation.
    CreatePresentation,
    /// Replace a presentation.
    UpdatePresentation,
    /// Set presentation notes.
    CreateNotes,
    /// Delete a resource.
    DeleteResource,
    /// Create a resource.
    CreateResource,
    /// Update a resource.
    UpdateResource,
}

impl Operation {
    /// Returns the kind of operation.
    #[must_use]
    pub const fn action_type(&self) -> ActionType {
        match self {
            Self::CreateClass { .. } => ActionType::CreateClass,
            Self::UpdateClass { .. } => ActionType::UpdateClass,
            Self::DeletePresentation { .. } => ActionType::DeletePresentation,
            Self::CreatePresentation { .. } => ActionType::CreatePresentation,
            Self::UpdatePresentation { .. } => ActionType::UpdatePresentation,
            Self::CreateNotes { .. } => ActionType::CreateNotes,
            Self::DeleteResource { .. } => ActionType::DeleteResource,
            Self::CreateResource { .. } => ActionType::CreateResource,
            Self::UpdateResource { .. } => ActionType::UpdateResource,
        }
    }

    /// Returns the name of the entity the operation applies to.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::CreateClass { request } | Self::UpdateClass { request } => &request.name,
            Self::DeletePresentation { filename, .. }
            | Self::CreatePresentation { filename, .. }
            | Self::UpdatePresentation { filename, .. }
            | Self::CreateNotes {
                target:
                    NotesTarget::Existing { filename, .. } | NotesTarget::Uploaded { filename },
                ..
            } => filename,
            Self::DeleteResource { name, .. } => name,
            Self::CreateResource { request } | Self::UpdateResource { request, .. } => {
                &request.name
            }
        }
    }

    /// Returns whether the operation removes something from the platform.
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::DeletePresentation { .. }
                | Self::UpdatePresentation { .. }
                | Self::DeleteResource { .. }
        )
    }
}

impl PlannedAction {
    /// Creates an action without field changes.
    #[must_use]
    pub fn new(operation: Operation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
            changes: Vec::new(),
        }
    }

    /// Attaches field changes.
    #[must_use]
    pub fn with_changes(mut self, changes: Vec<FieldChange>) -> Self {
        self.changes = changes;
        self
    }

    /// Returns the kind of action.
    #[must_use]
    pub const fn action_type(&self) -> ActionType {
        self.operation.action_type()
    }

    /// Returns the name of the entity the action applies to.
    #[must_use]
    pub fn target(&self) -> &str {
        self.operation.target()
    }

    /// Returns a human-readable description of the action.
    #[must_use]
    pub fn description(&self) -> String {
        let target = self.target();
        match &self.operation {
            Operation::CreateClass { .. } => format!("Create class '{target}'"),
            Operation::UpdateClass { .. } => format!("Update class '{target}'"),
            Operation::DeletePresentation { .. } => format!("Delete presentation '{target}'"),
            Operation::CreatePresentation { .. } => format!("Upload presentation '{target}'"),
            Operation::UpdatePresentation { .. } => format!("Replace presentation '{target}'"),
            Operation::CreateNotes { notes, .. } => {
                format!("Set {} notes on presentation '{target}'", notes.len())
            }
            Operation::DeleteResource { .. } => format!("Delete resource '{target}'"),
            Operation::CreateResource { .. } => format!("Create resource '{target}'"),
            Operation::UpdateResource { .. } => format!("Update resource '{target}'"),
        }
    }
}

impl FieldChange {
    /// Creates a field change.
    #[must_use]
    pub fn new(field: impl Into<String>, old_value: impl Into<String>, new_value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }
}

impl SyncPlan {
    /// Creates a plan.
    #[must_use]
    pub fn new(
        class_id: Option<String>,
        class_name: impl Into<String>,
        actions: Vec<PlannedAction>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            created_at: Utc::now(),
            class_id,
            class_name: class_name.into(),
            actions,
            warnings,
        }
    }

    /// Returns true if the plan is empty (no changes).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the number of actions.
    #[must_use]
    pub const fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Returns the number of actions of a kind.
    #[must_use]
    pub fn count(&self, action_type: ActionType) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type() == action_type)
            .count()
    }

    /// Returns the kinds of actions, in plan order.
    #[must_use]
    pub fn action_types(&self) -> Vec<ActionType> {
        self.actions.iter().map(PlannedAction::action_type).collect()
    }

    /// Returns the number of destructive actions.
    #[must_use]
    pub fn destructive_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.operation.is_destructive())
            .count()
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CreateClass => "create-class",
            Self::UpdateClass => "update-class",
            Self::DeletePresentation => "delete-presentation",
            Self::CreatePresentation => "create-presentation",
            Self::UpdatePresentation => "update-presentation",
            Self::CreateNotes => "create-notes",
            Self::DeleteResource => "delete-resource",
            Self::CreateResource => "create-resource",
            Self::UpdateResource => "update-resource",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for FieldChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.old_value, self.new_value)
    }
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for SyncPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.actions.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Sync Plan ({} actions):", self.actions.len())?;
        for (i, action) in self.actions.iter().enumerate() {
            writeln!(f, "  {i}. {action}")?;
            for change in &action.changes {
                writeln!(f, "       {change}")?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f, "\nWarnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  - {warning}")?;
            }
        }

        Ok(())
    }
}
