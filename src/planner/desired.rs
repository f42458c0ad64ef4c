//! Desired and remote state snapshots.
//!
//! The diff engine never touches the filesystem or the network. Everything
//! it compares is gathered beforehand: the remote side into a
//! [`RemoteSnapshot`], the local side into a [`DesiredState`] where images
//! are resolved, scripts rendered, notes parsed and presentation digests
//! computed.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{
    resolve_path, ClassConfig, ContentHasher, PresentationConfig, ResourceConfig, ViewInterfaceSetting,
};
use crate::error::Result;
use crate::notes::NotesParser;
use crate::platform::{Class, ClassRequest, Note, Presentation, Resource, ResourceRequest, WebviewLink};
use crate::resolve::{ImageCatalog, ResolvedImage, ScriptResolver, ScriptTarget};

/// Remote state of one class, fetched once per run.
#[derive(Debug, Clone, Default)]
pub struct RemoteSnapshot {
    /// The class, `None` when it does not exist yet.
    pub class: Option<Class>,
    /// Presentations of the class.
    pub presentations: Vec<Presentation>,
    /// Notes per presentation id.
    pub notes: HashMap<String, Vec<Note>>,
}

impl RemoteSnapshot {
    /// Creates the snapshot of a class that does not exist.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the remote resources, in platform order.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        self.class
            .as_ref()
            .map(|c| c.resources.as_slice())
            .unwrap_or_default()
    }

    /// Finds a presentation by file name.
    #[must_use]
    pub fn presentation(&self, filename: &str) -> Option<&Presentation> {
        self.presentations.iter().find(|p| p.filename == filename)
    }

    /// Returns the notes of a presentation, empty when unknown.
    #[must_use]
    pub fn notes_of(&self, presentation_id: &str) -> &[Note] {
        self.notes
            .get(presentation_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Fully prepared local state.
#[derive(Debug, Clone)]
pub struct DesiredState {
    /// Class metadata.
    pub class: DesiredClass,
    /// Presentations, in configuration order.
    pub presentations: Vec<DesiredPresentation>,
    /// Resources, in configuration order.
    pub resources: Vec<DesiredResource>,
}

/// Desired class metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredClass {
    /// Remote id, `None` when the class must be created.
    pub id: Option<String>,
    /// Class name.
    pub name: String,
    /// Description lines joined with newlines.
    pub description: String,
    /// Labels.
    pub labels: BTreeSet<String>,
}

/// Desired presentation with its digest and notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredPresentation {
    /// Local file.
    pub file: PathBuf,
    /// File name on the platform.
    pub filename: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// MD5, only computed when the remote file has the same size.
    pub md5: Option<String>,
    /// Parsed speaker notes.
    pub notes: Vec<Note>,
}

/// Desired resource with its image resolved and scripts rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredResource {
    /// Resource name.
    pub name: String,
    /// EC2 instance type.
    pub instance_type: String,
    /// Resolved image.
    pub image: ResolvedImage,
    /// Rendered init script, empty when none.
    pub init_script: String,
    /// Rendered post-launch script, empty when none.
    pub post_launch_script: String,
    /// Desired view interface.
    pub view_interface: ViewInterfaceSetting,
    /// Web views.
    pub webview_links: Vec<WebviewLink>,
}

impl DesiredClass {
    /// Returns the request body creating or updating the class.
    #[must_use]
    pub fn request(&self) -> ClassRequest {
        ClassRequest {
            name: self.name.clone(),
            description: self.description.clone(),
            labels: self.labels.iter().cloned().collect(),
        }
    }
}

impl DesiredResource {
    fn base_request(&self) -> ResourceRequest {
        ResourceRequest {
            name: self.name.clone(),
            image_id: self.image.id.clone(),
            image_user: self.image.user.clone(),
            webview_links: Some(self.webview_links.clone()),
            ec2_region: Some(self.image.region.clone()),
            instance_type: Some(self.instance_type.clone()),
            image_region_mapping: Some(self.image.region_mapping.clone()),
            ..ResourceRequest::default()
        }
    }

    /// Returns the creation request. Empty scripts are omitted.
    #[must_use]
    pub fn create_request(&self) -> ResourceRequest {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        ResourceRequest {
            userdata: non_empty(&self.init_script),
            post_launch_script: non_empty(&self.post_launch_script),
            view_interface: match self.view_interface {
                ViewInterfaceSetting::Set(interface) => Some(Some(interface)),
                ViewInterfaceSetting::Unset | ViewInterfaceSetting::Clear => None,
            },
            ..self.base_request()
        }
    }

    /// Returns the full re-specification sent on any drift.
    #[must_use]
    pub fn update_request(&self) -> ResourceRequest {
        ResourceRequest {
            userdata: Some(self.init_script.clone()),
            post_launch_script: Some(self.post_launch_script.clone()),
            view_interface: self.view_interface.desired(),
            ..self.base_request()
        }
    }
}

/// Prepares the desired state of a configuration.
///
/// This performs every local read (script files, notes sources, presentation
/// digests) and fragment fetch, but never calls the platform.
#[derive(Debug)]
pub struct DesiredStateBuilder<'a> {
    scripts: &'a ScriptResolver,
    hasher: ContentHasher,
    base_dir: Option<&'a Path>,
}

impl<'a> DesiredStateBuilder<'a> {
    /// Creates a builder rendering scripts with `scripts`.
    #[must_use]
    pub const fn new(scripts: &'a ScriptResolver) -> Self {
        Self {
            scripts,
            hasher: ContentHasher::new(),
            base_dir: None,
        }
    }

    /// Reads relative presentation and notes paths from `dir`.
    #[must_use]
    pub const fn with_base_dir(mut self, dir: Option<&'a Path>) -> Self {
        self.base_dir = dir;
        self
    }

    /// Builds the desired state of `config`.
    ///
    /// The snapshot decides whether a presentation digest is needed: the MD5
    /// is only computed when a remote file of the same name and size exists.
    ///
    /// # Errors
    ///
    /// Returns an error if an image is unknown, a script cannot be rendered,
    /// notes cannot be parsed or a presentation cannot be read.
    pub async fn build(&self, config: &ClassConfig, snapshot: &RemoteSnapshot) -> Result<DesiredState> {
        let class = DesiredClass {
            id: config.id.clone(),
            name: config.name.clone(),
            description: config.description_text(),
            labels: config.labels.clone(),
        };

        let presentations = config
            .presentations
            .iter()
            .map(|p| self.presentation(p, snapshot))
            .collect::<Result<Vec<_>>>()?;

        let mut resources = Vec::with_capacity(config.resources.len());
        for resource in &config.resources {
            resources.push(self.resource(resource).await?);
        }

        Ok(DesiredState {
            class,
            presentations,
            resources,
        })
    }

    fn presentation(&self, config: &PresentationConfig, snapshot: &RemoteSnapshot) -> Result<DesiredPresentation> {
        let filename = config.filename();
        let file = resolve_path(self.base_dir, &config.file);
        let size_bytes = self.hasher.file_size(&file)?;

        let md5 = match snapshot.presentation(&filename) {
            Some(remote) if remote.size_bytes == size_bytes => Some(self.hasher.md5_file(&file)?),
            _ => None,
        };

        let notes = NotesParser::parse(&resolve_path(self.base_dir, &config.notes_source))?;
        debug!("Presentation {filename}: {size_bytes} bytes, {} notes", notes.len());

        Ok(DesiredPresentation {
            file,
            filename,
            size_bytes,
            md5,
            notes,
        })
    }

    async fn resource(&self, config: &ResourceConfig) -> Result<DesiredResource> {
        let is_windows = config.is_windows();
        let mut image = ImageCatalog::resolve(&config.image)?;
        image.is_windows = is_windows;

        let init_script = self
            .scripts
            .render(&config.init_scripts, ScriptTarget::Init, is_windows)
            .await?;
        let post_launch_script = self
            .scripts
            .render(&config.post_launch_scripts, ScriptTarget::PostLaunch, is_windows)
            .await?;

        Ok(DesiredResource {
            name: config.name.clone(),
            instance_type: config.instance_type.clone(),
            image,
            init_script,
            post_launch_script,
            view_interface: config.view_interface,
            webview_links: config.webview_links.clone(),
        })
    }
}
