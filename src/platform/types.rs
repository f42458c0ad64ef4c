//! Strigo API types and data structures.
//!
//! Remote entities are owned by the platform. Unknown JSON fields are ignored
//! and every optional field defaults, so new platform fields never break
//! deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A Strigo class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Class {
    /// Unique class identifier.
    pub id: String,
    /// Class name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Labels attached to the class.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Class owner.
    #[serde(default)]
    pub owner: Option<Owner>,
    /// Lab resources attached to the class.
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Notes of the current presentation.
    #[serde(default)]
    pub presentation_notes: Vec<Note>,
    /// Filename of the current presentation.
    #[serde(default)]
    pub presentation_filename: Option<String>,
    /// Creation date.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update date.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Owner of a class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Owner {
    /// User identifier.
    pub id: String,
    /// User email.
    #[serde(default)]
    pub email: String,
}

/// An uploaded presentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Presentation {
    /// Unique presentation identifier.
    pub id: String,
    /// Owning class.
    #[serde(default)]
    pub class_id: String,
    /// MD5 of the uploaded file, hex encoded.
    #[serde(default)]
    pub md5: String,
    /// Size of the uploaded file.
    #[serde(default)]
    pub size_bytes: u64,
    /// Original filename.
    pub filename: String,
    /// Upload date.
    #[serde(default)]
    pub upload_date: Option<DateTime<Utc>>,
}

/// A speaker note attached to a presentation page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Note {
    /// 1-based page number.
    pub page: u32,
    /// Note text.
    pub content: String,
}

/// A lab resource (cloud virtual machine) of a class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    /// Unique resource identifier.
    pub id: String,
    /// Resource type reported by the platform.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Resource name.
    pub name: String,
    /// AMI in the active region.
    #[serde(default)]
    pub image_id: String,
    /// User to log in with.
    #[serde(default)]
    pub image_user: String,
    /// Whether the image is not one of the platform images.
    #[serde(default)]
    pub is_custom_image: bool,
    /// Interface shown to attendees.
    #[serde(default)]
    pub view_interface: Option<ViewInterface>,
    /// Extra web views exposed by the machine.
    #[serde(default)]
    pub webview_links: Vec<WebviewLink>,
    /// Script executed once the machine is reachable.
    #[serde(default)]
    pub post_launch_script: Option<String>,
    /// EC2 user data executed at boot.
    #[serde(default)]
    pub userdata: Option<String>,
    /// Active EC2 region.
    #[serde(default)]
    pub ec2_region: Option<String>,
    /// EC2 instance type.
    #[serde(default)]
    pub instance_type: Option<String>,
    /// AMI per region.
    #[serde(default)]
    pub image_region_mapping: Option<BTreeMap<String, String>>,
}

/// Interface shown to attendees for a resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ViewInterface {
    /// Web terminal.
    Terminal,
    /// Remote desktop.
    Desktop,
}

/// A named link to a web application running on a resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebviewLink {
    /// Tab name.
    pub name: String,
    /// URL, usually relative to the machine.
    pub url: String,
}

/// Body of class creation and update requests.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClassRequest {
    /// Class name.
    pub name: String,
    /// Description, lines joined with newlines.
    pub description: String,
    /// Labels.
    pub labels: Vec<String>,
}

/// Body of resource creation and update requests.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct ResourceRequest {
    /// Resource name.
    pub name: String,
    /// AMI in the active region.
    pub image_id: String,
    /// User to log in with.
    pub image_user: String,
    /// Web views.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webview_links: Option<Vec<WebviewLink>>,
    /// Post-launch script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_launch_script: Option<String>,
    /// Init script sent as EC2 user data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userdata: Option<String>,
    /// Active EC2 region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ec2_region: Option<String>,
    /// EC2 instance type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    /// AMI per region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_region_mapping: Option<BTreeMap<String, String>>,
    /// `None` leaves the interface untouched, `Some(None)` clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_interface: Option<Option<ViewInterface>>,
}

/// Body of the notes creation request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct NotesRequest<'a> {
    /// Notes, ordered by page.
    pub notes: &'a [Note],
}

impl Class {
    /// Returns the description, empty when unset.
    #[must_use]
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

impl Resource {
    /// Returns the region mapping, falling back to the active region and AMI
    /// when the platform did not record one.
    #[must_use]
    pub fn region_mapping(&self) -> BTreeMap<String, String> {
        if let Some(mapping) = &self.image_region_mapping {
            return mapping.clone();
        }
        let mut mapping = BTreeMap::new();
        if let Some(region) = &self.ec2_region {
            if !self.image_id.is_empty() {
                mapping.insert(region.clone(), self.image_id.clone());
            }
        }
        mapping
    }
}

impl std::fmt::Display for ViewInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Terminal => "terminal",
            Self::Desktop => "desktop",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for WebviewLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_ignores_unknown_fields() {
        let json = r#"{
            "id": "r1",
            "type": "ec2",
            "name": "lab",
            "image_id": "ami-1",
            "image_user": "ubuntu",
            "webview_links": [{"_id": "w1", "name": "ide", "url": "http://{{ .IP }}:8080"}],
            "something_new": 42
        }"#;
        let resource: Resource = serde_json::from_str(json).unwrap();
        assert_eq!(resource.kind, "ec2");
        assert_eq!(resource.webview_links.len(), 1);
        assert_eq!(resource.webview_links[0].name, "ide");
        assert!(resource.userdata.is_none());
        assert!(!resource.is_custom_image);
    }

    #[test]
    fn test_region_mapping_fallback() {
        let json = r#"{"id": "r1", "name": "lab", "image_id": "ami-1", "ec2_region": "eu-west-1"}"#;
        let resource: Resource = serde_json::from_str(json).unwrap();
        let mapping = resource.region_mapping();
        assert_eq!(mapping.get("eu-west-1").map(String::as_str), Some("ami-1"));
    }

    #[test]
    fn test_class_parses_dates() {
        let json = r#"{
            "id": "c1",
            "name": "Kubernetes",
            "owner": {"id": "u1", "email": "trainer@example.com"},
            "created_at": "2023-01-10T08:00:00.000Z",
            "updated_at": "2023-01-11T08:00:00Z"
        }"#;
        let class: Class = serde_json::from_str(json).unwrap();
        assert!(class.created_at.is_some());
        assert_eq!(class.description_text(), "");
    }

    #[test]
    fn test_resource_request_skips_unset_fields() {
        let request = ResourceRequest {
            name: String::from("lab"),
            image_id: String::from("ami-1"),
            image_user: String::from("ubuntu"),
            view_interface: Some(None),
            ..ResourceRequest::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("userdata").is_none());
        assert!(json.get("view_interface").unwrap().is_null());
    }
}
