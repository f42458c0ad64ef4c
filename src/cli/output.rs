//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{ClassConfig, ValidationResult};
use crate::planner::{ActionType, SyncPlan};
use crate::platform::Class;
use crate::reconciler::{DriftReport, ReconciliationResult};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Class row for table display.
#[derive(Tabled)]
struct ClassRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Resources")]
    resources: usize,
    #[tabled(rename = "Labels")]
    labels: String,
    #[tabled(rename = "Owner")]
    owner: String,
}

/// Plan action row for table display.
#[derive(Tabled)]
struct PlanActionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Returns the output format.
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    /// Formats a synchronization plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &SyncPlan, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => to_json(&PlanJson::from(plan)),
            OutputFormat::Text => Self::format_plan_text(plan, detailed),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &SyncPlan, detailed: bool) -> String {
        let mut output = String::new();

        if plan.is_empty() {
            let _ = writeln!(
                output,
                "{} No changes required, class '{}' is up to date.",
                "✓".green(),
                plan.class_name
            );
        } else {
            let _ = writeln!(output, "\nSync plan for class '{}'", plan.class_name);
            let class_id = plan.class_id.as_deref().unwrap_or("(new class)");
            let _ = writeln!(output, "   Class id: {class_id}\n");

            let rows: Vec<PlanActionRow> = plan
                .actions
                .iter()
                .enumerate()
                .map(|(i, a)| PlanActionRow {
                    index: i + 1,
                    action: Self::format_action_type(a.action_type()),
                    target: Self::truncate(a.target(), 40),
                    reason: Self::truncate(&a.reason, 40),
                })
                .collect();

            output.push_str(&Table::new(rows).to_string());
            output.push('\n');

            if detailed {
                output.push_str("\nDetailed changes:\n");
                for (i, action) in plan.actions.iter().enumerate() {
                    if action.changes.is_empty() {
                        continue;
                    }
                    let _ = writeln!(output, "   {}. {}", i + 1, action.description());
                    for change in &action.changes {
                        let _ = writeln!(output, "        {change}");
                    }
                }
            }

            let creates = plan.count(ActionType::CreateClass)
                + plan.count(ActionType::CreatePresentation)
                + plan.count(ActionType::CreateResource);
            let deletes =
                plan.count(ActionType::DeletePresentation) + plan.count(ActionType::DeleteResource);
            let _ = writeln!(
                output,
                "\nPlan: {} to create, {} to update, {} to destroy",
                creates.to_string().green(),
                (plan.action_count() - creates - deletes).to_string().yellow(),
                deletes.to_string().red()
            );

            let destructive = plan.destructive_count();
            if destructive > 0 {
                let _ = writeln!(
                    output,
                    "{} {destructive} action(s) remove or replace content on Strigo",
                    "!".red()
                );
            }
        }

        if !plan.warnings.is_empty() {
            let _ = writeln!(output, "\n{} Warnings:", "⚠".yellow());
            for warning in &plan.warnings {
                let _ = writeln!(output, "   - {warning}");
            }
        }

        output
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &ClassConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "valid": result.is_valid(),
                "class": config.name,
                "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "warnings": result.warnings,
            })),
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid!\n", "✓".green())
                } else {
                    let mut output = format!("{} Configuration is invalid:\n", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                    output
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = writeln!(output, "\n{} Warnings:", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output.push_str("\nConfiguration summary:\n");
                let _ = writeln!(output, "   Class: {}", config.name);
                let _ = writeln!(output, "   Id: {}", config.id.as_deref().unwrap_or("(none)"));
                let _ = writeln!(output, "   Presentations: {}", config.presentations.len());
                let _ = writeln!(output, "   Resources: {}", config.resource_names().join(", "));
                output
            }
        }
    }

    /// Formats the classes of the organization.
    #[must_use]
    pub fn format_classes(&self, classes: &[Class]) -> String {
        match self.format {
            OutputFormat::Json => to_json(&classes),
            OutputFormat::Text => {
                if classes.is_empty() {
                    return String::from("No classes found.\n");
                }

                let rows: Vec<ClassRow> = classes
                    .iter()
                    .map(|c| ClassRow {
                        id: c.id.clone(),
                        name: Self::truncate(&c.name, 40),
                        resources: c.resources.len(),
                        labels: Self::truncate(&c.labels.join(", "), 30),
                        owner: c
                            .owner
                            .as_ref()
                            .map(|o| o.email.clone())
                            .unwrap_or_default(),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                let _ = write!(output, "\n\n{} classes\n", classes.len());
                output
            }
        }
    }

    /// Formats a drift report.
    #[must_use]
    pub fn format_drift(&self, report: &DriftReport) -> String {
        match self.format {
            OutputFormat::Json => to_json(report),
            OutputFormat::Text => {
                if report.is_converged() {
                    format!("{} No drift detected, class is in sync.\n", "✓".green())
                } else {
                    let mut output = format!("{} Drift detected:\n\n", "⚠".yellow());
                    for action in &report.drifted {
                        let _ = writeln!(output, "   - {action}");
                    }
                    let _ = write!(output, "\n{} pending actions.\n", report.drifted.len());
                    output
                }
            }
        }
    }

    /// Formats a reconciliation result.
    #[must_use]
    pub fn format_reconciliation(&self, result: &ReconciliationResult) -> String {
        match self.format {
            OutputFormat::Json => to_json(result),
            OutputFormat::Text => {
                let mut output = format!("{} Synchronization successful\n\n", "✓".green());
                if let Some(id) = &result.class_id {
                    let created = if result.class_created { " (created)" } else { "" };
                    let _ = writeln!(output, "   Class: {id}{created}");
                }
                let _ = writeln!(output, "   Created: {}", result.created);
                let _ = writeln!(output, "   Updated: {}", result.updated);
                let _ = writeln!(output, "   Deleted: {}", result.deleted);
                let _ = writeln!(output, "   Notes: {}", result.notes);

                if !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    /// Formats an action type with color.
    fn format_action_type(action_type: ActionType) -> String {
        let label = format!("{action_type}");
        match action_type {
            ActionType::CreateClass | ActionType::CreatePresentation | ActionType::CreateResource => {
                format!("+{label}").green().to_string()
            }
            ActionType::UpdateClass
            | ActionType::UpdatePresentation
            | ActionType::UpdateResource
            | ActionType::CreateNotes => format!("~{label}").yellow().to_string(),
            ActionType::DeletePresentation | ActionType::DeleteResource => {
                format!("-{label}").red().to_string()
            }
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", &format!("{} {message}", "✓".green()), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.message("error", &format!("{} {message}", "✗".red()), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", &format!("{} {message}", "⚠".yellow()), message)
    }

    fn message(&self, status: &str, text: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({ "status": status, "message": message })),
            OutputFormat::Text => text.to_string(),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

// JSON serialization helpers

#[derive(Serialize)]
struct PlanJson {
    class_id: Option<String>,
    class_name: String,
    created_at: String,
    action_count: usize,
    actions: Vec<ActionJson>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct ActionJson {
    action_type: String,
    target: String,
    reason: String,
    changes: Vec<ChangeJson>,
}

#[derive(Serialize)]
struct ChangeJson {
    field: String,
    old_value: String,
    new_value: String,
}

impl From<&SyncPlan> for PlanJson {
    fn from(plan: &SyncPlan) -> Self {
        Self {
            class_id: plan.class_id.clone(),
            class_name: plan.class_name.clone(),
            created_at: plan.created_at.to_rfc3339(),
            action_count: plan.action_count(),
            actions: plan
                .actions
                .iter()
                .map(|a| ActionJson {
                    action_type: a.action_type().to_string(),
                    target: a.target().to_string(),
                    reason: a.reason.clone(),
                    changes: a
                        .changes
                        .iter()
                        .map(|c| ChangeJson {
                            field: c.field.clone(),
                            old_value: c.old_value.clone(),
                            new_value: c.new_value.clone(),
                        })
                        .collect(),
                })
                .collect(),
            warnings: plan.warnings.clone(),
        }
    }
}
