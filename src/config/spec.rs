//! Configuration specification types for a training class.
//!
//! This module defines the structs that map to the class configuration file
//! (`strigo.json` by default). They describe the desired state of one class:
//! metadata, the presentation and the lab resources.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::platform::{ViewInterface, WebviewLink};

/// Region used by the platform for new resources.
pub const DEFAULT_REGION: &str = "eu-west-1";

/// Region used by the platform before `eu-west-1` became the default.
pub const LEGACY_REGION: &str = "eu-central-1";

/// Default notes index, relative to the configuration directory.
pub const DEFAULT_NOTES_SOURCE: &str = "Slides/slides.json";

/// Default version (git ref) of remote script fragments.
pub const DEFAULT_SCRIPT_VERSION: &str = "main";

/// Resolves a path read from a configuration file.
///
/// Relative paths are taken from the configuration directory when one is
/// known, from the working directory otherwise.
#[must_use]
pub fn resolve_path(base_dir: Option<&Path>, path: &Path) -> PathBuf {
    base_dir.map_or_else(|| path.to_path_buf(), |base| base.join(path))
}

/// The root configuration structure for a training class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassConfig {
    /// JSON schema pointer, preserved when the file is written back.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Class name.
    pub name: String,
    /// Remote class id, absent until the class is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Description, one entry per line.
    #[serde(default)]
    pub description: Vec<String>,
    /// Labels, compared as a set.
    #[serde(default)]
    pub labels: BTreeSet<String>,
    /// Presentations (at most one).
    #[serde(default)]
    pub presentations: Vec<PresentationConfig>,
    /// Lab resources, matched positionally against the remote ones.
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

/// A presentation and the source of its speaker notes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationConfig {
    /// Path to the presentation file (usually a PDF).
    pub file: PathBuf,
    /// Path to the notes index file.
    #[serde(default = "default_notes_source")]
    pub notes_source: PathBuf,
}

/// Configuration for a single lab resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Resource name, unique within the class.
    pub name: String,
    /// EC2 instance type.
    pub instance_type: String,
    /// Machine image.
    pub image: ImageSpec,
    /// Overrides Windows detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_windows: Option<bool>,
    /// Scripts executed at boot, in order.
    #[serde(default)]
    pub init_scripts: Vec<ScriptRef>,
    /// Scripts executed once the machine is reachable, in order.
    #[serde(default)]
    pub post_launch_scripts: Vec<ScriptRef>,
    /// Interface shown to attendees.
    #[serde(default, skip_serializing_if = "ViewInterfaceSetting::is_unset")]
    pub view_interface: ViewInterfaceSetting,
    /// Extra web views, names unique.
    #[serde(default)]
    pub webview_links: Vec<WebviewLink>,
}

/// Machine image of a resource: a catalog name or an explicit image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ImageSpec {
    /// Symbolic name from the image catalog (e.g. `ubuntu-20.04`).
    Named(String),
    /// Explicit image.
    Custom(CustomImage),
}

/// Explicit image definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomImage {
    /// AMI in `ec2_region`.
    pub image_id: String,
    /// User to log in with.
    pub image_user: String,
    /// Active region.
    #[serde(default = "default_region")]
    pub ec2_region: String,
    /// AMIs in other regions.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub region_mapping: BTreeMap<String, String>,
    /// Whether the image runs Windows.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_windows: bool,
}

/// Reference to a script: a local file or a remote fragment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ScriptRef {
    /// Path to a local script file.
    File(PathBuf),
    /// Fragment from the remote script library.
    Fragment(FragmentRef),
}

/// Remote script fragment with its environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FragmentRef {
    /// Fragment file name in the library.
    pub script: String,
    /// Library version (git ref).
    #[serde(default = "default_script_version")]
    pub version: String,
    /// Variables assigned before the fragment body, in order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
}

/// Desired view interface of a resource.
///
/// Absent from the file means "leave as is", `null` means "clear". TOML has
/// no null, so `Clear` only exists in JSON and YAML files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewInterfaceSetting {
    /// Never compared nor sent.
    #[default]
    Unset,
    /// Cleared on the platform.
    Clear,
    /// Set to the given interface.
    Set(ViewInterface),
}

fn default_notes_source() -> PathBuf {
    PathBuf::from(DEFAULT_NOTES_SOURCE)
}

fn default_region() -> String {
    String::from(DEFAULT_REGION)
}

fn default_script_version() -> String {
    String::from(DEFAULT_SCRIPT_VERSION)
}

impl ClassConfig {
    /// Creates an empty class configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            id: None,
            description: Vec::new(),
            labels: BTreeSet::new(),
            presentations: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Returns the description as sent to the platform.
    #[must_use]
    pub fn description_text(&self) -> String {
        self.description.join("\n")
    }

    /// Returns the labels in sorted order.
    #[must_use]
    pub fn label_list(&self) -> Vec<String> {
        self.labels.iter().cloned().collect()
    }

    /// Returns resource names.
    #[must_use]
    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name.as_str()).collect()
    }
}

impl PresentationConfig {
    /// Creates a presentation with the default notes source.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            notes_source: default_notes_source(),
        }
    }

    /// Returns the file name the platform stores the upload under.
    #[must_use]
    pub fn filename(&self) -> String {
        self.file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl ResourceConfig {
    /// Returns whether the resource runs Windows.
    ///
    /// The explicit override wins; otherwise catalog names starting with
    /// `windows` and custom images flagged as Windows are.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.is_windows.unwrap_or_else(|| match &self.image {
            ImageSpec::Named(name) => name.starts_with("windows"),
            ImageSpec::Custom(image) => image.is_windows,
        })
    }
}

impl ScriptRef {
    /// Returns the name shown in the start and end banners.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Fragment(fragment) => fragment.script.clone(),
        }
    }

    /// Returns the local path of a file reference.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Fragment(_) => None,
        }
    }
}

impl FragmentRef {
    /// Creates a fragment reference on the default version.
    #[must_use]
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            version: default_script_version(),
            env: IndexMap::new(),
        }
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl ViewInterfaceSetting {
    /// Returns `true` when the file does not mention the interface.
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Returns the interface to send, `None` when unset.
    #[must_use]
    pub const fn desired(&self) -> Option<Option<ViewInterface>> {
        match self {
            Self::Unset => None,
            Self::Clear => Some(None),
            Self::Set(interface) => Some(Some(*interface)),
        }
    }
}

impl From<Option<ViewInterface>> for ViewInterfaceSetting {
    fn from(value: Option<ViewInterface>) -> Self {
        value.map_or(Self::Unset, Self::Set)
    }
}

impl Serialize for ViewInterfaceSetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unset | Self::Clear => serializer.serialize_none(),
            Self::Set(interface) => interface.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ViewInterfaceSetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<ViewInterface>::deserialize(deserializer)?;
        Ok(value.map_or(Self::Clear, Self::Set))
    }
}
