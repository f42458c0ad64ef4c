//! Configuration import from an existing remote class.
//!
//! Builds a [`ClassConfig`] describing a class as it exists on the platform.
//! Remote scripts are written to local files under `Installation/strigo/`
//! and referenced from the generated configuration; presentations are
//! located in the working tree by file name.

use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::spec::{ClassConfig, ImageSpec, PresentationConfig, ResourceConfig, ScriptRef};
use crate::error::Result;
use crate::platform::{Class, Presentation, Resource};
use crate::resolve::{normalize_script, ImageCatalog};

/// Directory receiving the imported scripts, relative to the root.
pub const SCRIPTS_DIR: &str = "Installation/strigo";

/// Directory presentations are expected in when not found in the tree.
const PRESENTATIONS_DIR: &str = "PDF";

/// Builds class configurations from remote state.
#[derive(Debug, Clone)]
pub struct ConfigImporter {
    /// Root of the training material; generated paths are relative to it.
    root: PathBuf,
}

impl ConfigImporter {
    /// Creates an importer writing under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Derives a configuration from a remote class and its presentations.
    ///
    /// # Errors
    ///
    /// Returns an error if a script file cannot be written.
    pub fn from_remote(&self, class: &Class, presentations: &[Presentation]) -> Result<ClassConfig> {
        info!("Importing class '{}' ({})", class.name, class.id);

        let mut config = ClassConfig::new(class.name.clone());
        config.id = Some(class.id.clone());
        config.description = class
            .description_text()
            .lines()
            .map(ToString::to_string)
            .collect();
        config.labels = class.labels.iter().cloned().collect();
        config.presentations = presentations
            .iter()
            .map(|p| PresentationConfig::new(self.search_file(&p.filename)))
            .collect();
        config.resources = class
            .resources
            .iter()
            .map(|r| self.resource(r))
            .collect::<Result<Vec<_>>>()?;

        Ok(config)
    }

    fn resource(&self, resource: &Resource) -> Result<ResourceConfig> {
        let image = ImageCatalog::from_remote(resource);
        let is_windows = matches!(&image, ImageSpec::Named(name) if name.starts_with("windows"));
        let file_name: String = resource
            .name
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        let extension = if is_windows { "ps1" } else { "sh" };

        let mut init_scripts = Vec::new();
        if let Some(userdata) = resource.userdata.as_deref() {
            let content = normalize_script(
                &userdata
                    .replace("<powershell>", "")
                    .replace("</powershell>", ""),
            );
            if !content.is_empty() {
                let path = self.write_script(&format!("init_{file_name}.{extension}"), &content)?;
                init_scripts.push(ScriptRef::File(path));
            }
        }

        let mut post_launch_scripts = Vec::new();
        if let Some(script) = resource.post_launch_script.as_deref() {
            let content = normalize_script(script);
            if !content.is_empty() {
                let path =
                    self.write_script(&format!("post_launch_{file_name}.{extension}"), &content)?;
                post_launch_scripts.push(ScriptRef::File(path));
            }
        }

        Ok(ResourceConfig {
            name: resource.name.clone(),
            instance_type: resource.instance_type.clone().unwrap_or_default(),
            image,
            is_windows: None,
            init_scripts,
            post_launch_scripts,
            view_interface: resource.view_interface.into(),
            webview_links: resource.webview_links.clone(),
        })
    }

    /// Writes a script and returns its path relative to the root.
    fn write_script(&self, name: &str, content: &str) -> Result<PathBuf> {
        let relative = Path::new(SCRIPTS_DIR).join(name);
        let absolute = self.root.join(&relative);
        if let Some(parent) = absolute.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&absolute, content)?;
        debug!("Wrote {}", absolute.display());
        Ok(relative)
    }

    /// Finds a file by name anywhere under the root, in a stable order.
    ///
    /// Falls back to `PDF/<filename>` when the file is not found.
    #[must_use]
    pub fn search_file(&self, filename: &str) -> PathBuf {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(std::result::Result::ok)
            .find(|e| e.file_type().is_file() && e.file_name() == filename)
            .and_then(|e| e.path().strip_prefix(&self.root).ok().map(Path::to_path_buf))
            .unwrap_or_else(|| Path::new(PRESENTATIONS_DIR).join(filename))
    }
}
