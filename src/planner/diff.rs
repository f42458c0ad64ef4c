//! Diff engine for comparing desired vs remote state.
//!
//! Planning runs three phases over one snapshot: class metadata,
//! presentations and resources. Each phase is idempotent: a desired state
//! equal to the remote one produces no action.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use super::desired::{DesiredClass, DesiredPresentation, DesiredResource, DesiredState, RemoteSnapshot};
use super::plan::{FieldChange, NotesTarget, Operation, PlannedAction, SyncPlan};
use crate::config::ViewInterfaceSetting;
use crate::platform::{Class, Note, Presentation, Resource, WebviewLink};
use crate::resolve::normalize_script;

/// Largest presentation the tool uploads, larger files go through the web UI.
pub const MAX_PRESENTATION_BYTES: u64 = 50 * 1024 * 1024;

/// Engine for computing plans between desired and remote states.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the plan converging `snapshot` to `desired`.
    ///
    /// Without a class id the class is created and the remaining phases run
    /// against an empty remote state.
    #[must_use]
    pub fn compute(&self, desired: &DesiredState, snapshot: &RemoteSnapshot) -> SyncPlan {
        let mut actions = Vec::new();
        let mut warnings = Vec::new();

        let empty = RemoteSnapshot::empty();
        let remote = match (&desired.class.id, &snapshot.class) {
            (None, _) => {
                actions.push(PlannedAction::new(
                    Operation::CreateClass {
                        request: desired.class.request(),
                    },
                    "class has no id",
                ));
                &empty
            }
            (Some(id), None) => {
                warnings.push(format!(
                    "Class '{id}' was not found on the platform, a new class will be created"
                ));
                actions.push(PlannedAction::new(
                    Operation::CreateClass {
                        request: desired.class.request(),
                    },
                    "class not found",
                ));
                &empty
            }
            (Some(_), Some(class)) => {
                if let Some(action) = Self::diff_class(&desired.class, class) {
                    actions.push(action);
                }
                snapshot
            }
        };

        Self::diff_presentations(&desired.presentations, remote, &mut actions, &mut warnings);
        Self::diff_resources(&desired.resources, remote.resources(), &mut actions);

        let class_id = remote.class.as_ref().map(|c| c.id.clone());
        SyncPlan::new(class_id, desired.class.name.clone(), actions, warnings)
    }

    fn diff_class(desired: &DesiredClass, remote: &Class) -> Option<PlannedAction> {
        let mut changes = Vec::new();

        if desired.name != remote.name {
            changes.push(FieldChange::new("name", remote.name.as_str(), desired.name.as_str()));
        }

        if desired.description != remote.description_text() {
            changes.push(FieldChange::new(
                "description",
                remote.description_text(),
                desired.description.as_str(),
            ));
        }

        let remote_labels: BTreeSet<String> = remote.labels.iter().cloned().collect();
        if desired.labels != remote_labels {
            changes.push(FieldChange::new(
                "labels",
                join(&remote_labels),
                join(&desired.labels),
            ));
        }

        for change in &changes {
            debug!("Class field {change}");
        }

        (!changes.is_empty()).then(|| {
            PlannedAction::new(
                Operation::UpdateClass {
                    request: desired.request(),
                },
                "class metadata changed",
            )
            .with_changes(changes)
        })
    }

    fn diff_presentations(
        desired: &[DesiredPresentation],
        remote: &RemoteSnapshot,
        actions: &mut Vec<PlannedAction>,
        warnings: &mut Vec<String>,
    ) {
        for presentation in &remote.presentations {
            if !desired.iter().any(|d| d.filename == presentation.filename) {
                debug!("Presentation {} is not configured", presentation.filename);
                actions.push(PlannedAction::new(
                    Operation::DeletePresentation {
                        presentation_id: presentation.id.clone(),
                        filename: presentation.filename.clone(),
                    },
                    "removed from configuration",
                ));
            }
        }

        for presentation in desired {
            match remote.presentation(&presentation.filename) {
                None => {
                    if Self::too_large(presentation, warnings) {
                        continue;
                    }
                    actions.push(PlannedAction::new(
                        Operation::CreatePresentation {
                            file: presentation.file.clone(),
                            filename: presentation.filename.clone(),
                        },
                        "new presentation",
                    ));
                    if !presentation.notes.is_empty() {
                        actions.push(Self::notes_action(
                            NotesTarget::Uploaded {
                                filename: presentation.filename.clone(),
                            },
                            presentation,
                            "new presentation",
                        ));
                    }
                }
                Some(existing) => {
                    let changes = Self::binary_changes(presentation, existing);
                    if changes.is_empty() {
                        let remote_notes = sorted_notes(remote.notes_of(&existing.id));
                        if presentation.notes != remote_notes {
                            debug!("Notes of {} changed", presentation.filename);
                            actions.push(Self::notes_action(
                                NotesTarget::Existing {
                                    presentation_id: existing.id.clone(),
                                    filename: presentation.filename.clone(),
                                },
                                presentation,
                                "notes changed",
                            ));
                        }
                        continue;
                    }

                    if Self::too_large(presentation, warnings) {
                        continue;
                    }
                    actions.push(
                        PlannedAction::new(
                            Operation::UpdatePresentation {
                                presentation_id: existing.id.clone(),
                                file: presentation.file.clone(),
                                filename: presentation.filename.clone(),
                            },
                            "content changed",
                        )
                        .with_changes(changes),
                    );
                    if !presentation.notes.is_empty() {
                        actions.push(Self::notes_action(
                            NotesTarget::Uploaded {
                                filename: presentation.filename.clone(),
                            },
                            presentation,
                            "presentation replaced",
                        ));
                    }
                }
            }
        }
    }

    fn binary_changes(desired: &DesiredPresentation, remote: &Presentation) -> Vec<FieldChange> {
        if desired.size_bytes != remote.size_bytes {
            debug!(
                "Presentation {} size: {} -> {}",
                desired.filename, remote.size_bytes, desired.size_bytes
            );
            return vec![FieldChange::new(
                "size_bytes",
                remote.size_bytes.to_string(),
                desired.size_bytes.to_string(),
            )];
        }

        match &desired.md5 {
            Some(md5) if !md5.eq_ignore_ascii_case(&remote.md5) => {
                debug!("Presentation {} md5: {} -> {md5}", desired.filename, remote.md5);
                vec![FieldChange::new("md5", remote.md5.as_str(), md5.as_str())]
            }
            _ => Vec::new(),
        }
    }

    fn too_large(presentation: &DesiredPresentation, warnings: &mut Vec<String>) -> bool {
        if presentation.size_bytes <= MAX_PRESENTATION_BYTES {
            return false;
        }
        let message = format!(
            "Presentation '{}' is {} bytes, above the {MAX_PRESENTATION_BYTES} bytes upload limit: upload it through the Strigo web interface",
            presentation.filename, presentation.size_bytes
        );
        warn!("{message}");
        warnings.push(message);
        true
    }

    fn notes_action(target: NotesTarget, presentation: &DesiredPresentation, reason: &str) -> PlannedAction {
        PlannedAction::new(
            Operation::CreateNotes {
                target,
                notes: presentation.notes.clone(),
            },
            reason,
        )
    }

    fn diff_resources(desired: &[DesiredResource], remote: &[Resource], actions: &mut Vec<PlannedAction>) {
        let len = desired.len().max(remote.len());

        for i in 0..len {
            match (desired.get(i), remote.get(i)) {
                (None, Some(resource)) => {
                    debug!("Resource {} at index {i} is not configured", resource.name);
                    actions.push(PlannedAction::new(
                        Operation::DeleteResource {
                            resource_id: resource.id.clone(),
                            name: resource.name.clone(),
                        },
                        "removed from configuration",
                    ));
                }
                (Some(resource), None) => {
                    debug!("Resource {} at index {i} is new", resource.name);
                    actions.push(PlannedAction::new(
                        Operation::CreateResource {
                            request: resource.create_request(),
                        },
                        "new resource",
                    ));
                }
                (Some(resource), Some(existing)) => {
                    let changes = Self::resource_changes(resource, existing);
                    if !changes.is_empty() {
                        actions.push(
                            PlannedAction::new(
                                Operation::UpdateResource {
                                    resource_id: existing.id.clone(),
                                    request: resource.update_request(),
                                },
                                "resource drifted",
                            )
                            .with_changes(changes),
                        );
                    }
                }
                (None, None) => {}
            }
        }
    }

    fn resource_changes(desired: &DesiredResource, remote: &Resource) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        if desired.name != remote.name {
            changes.push(FieldChange::new("name", remote.name.as_str(), desired.name.as_str()));
        }

        let remote_instance_type = remote.instance_type.as_deref().unwrap_or_default();
        if desired.instance_type != remote_instance_type {
            changes.push(FieldChange::new(
                "instance_type",
                remote_instance_type,
                desired.instance_type.as_str(),
            ));
        }

        if desired.image.user != remote.image_user {
            changes.push(FieldChange::new(
                "image_user",
                remote.image_user.as_str(),
                desired.image.user.as_str(),
            ));
        }

        let remote_mapping = remote.region_mapping();
        if desired.image.region_mapping != remote_mapping {
            changes.push(FieldChange::new(
                "image_region_mapping",
                format_mapping(&remote_mapping),
                format_mapping(&desired.image.region_mapping),
            ));
        }

        if let Some(change) = script_change("userdata", &desired.init_script, remote.userdata.as_deref()) {
            changes.push(change);
        }
        if let Some(change) = script_change(
            "post_launch_script",
            &desired.post_launch_script,
            remote.post_launch_script.as_deref(),
        ) {
            changes.push(change);
        }

        let interface_changed = match desired.view_interface {
            ViewInterfaceSetting::Unset => false,
            ViewInterfaceSetting::Clear => remote.view_interface.is_some(),
            ViewInterfaceSetting::Set(interface) => remote.view_interface != Some(interface),
        };
        if interface_changed {
            changes.push(FieldChange::new(
                "view_interface",
                format_interface(remote.view_interface),
                format_interface(desired.view_interface.desired().flatten()),
            ));
        }

        if desired.webview_links != remote.webview_links {
            changes.push(FieldChange::new(
                "webview_links",
                format_links(&remote.webview_links),
                format_links(&desired.webview_links),
            ));
        }

        for change in &changes {
            debug!("Resource {} field {change}", desired.name);
        }

        changes
    }
}

/// Compares a rendered script with its remote counterpart.
///
/// Absent and empty remote scripts are equivalent, and nothing is reported
/// when both sides are empty.
fn script_change(field: &str, desired: &str, remote: Option<&str>) -> Option<FieldChange> {
    let remote = normalize_script(remote.unwrap_or_default());
    if desired.is_empty() && remote.is_empty() {
        return None;
    }
    (desired != remote).then(|| {
        FieldChange::new(
            field,
            format!("{} bytes", remote.len()),
            format!("{} bytes", desired.len()),
        )
    })
}

fn sorted_notes(notes: &[Note]) -> Vec<Note> {
    let mut notes = notes.to_vec();
    notes.sort_by_key(|n| n.page);
    notes
}

fn join(labels: &BTreeSet<String>) -> String {
    labels.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn format_mapping(mapping: &BTreeMap<String, String>) -> String {
    mapping
        .iter()
        .map(|(region, ami)| format!("{region}={ami}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_interface(interface: Option<crate::platform::ViewInterface>) -> String {
    interface.map_or_else(|| String::from("none"), |i| i.to_string())
}

fn format_links(links: &[WebviewLink]) -> String {
    links.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
