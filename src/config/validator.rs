//! Configuration validation for class configurations.
//!
//! Structural rules (unique names, at most one presentation, known images)
//! are errors. Missing local files are only warnings because the
//! configuration may be validated away from the training material.

use crate::error::{ConfigError, Result, SyncError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::spec::{resolve_path, ClassConfig, ImageSpec, ResourceConfig, ScriptRef};
use crate::resolve::ImageCatalog;

/// Validation result containing every issue found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors.
    pub errors: Vec<ConfigError>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

/// Validator for class configurations.
#[derive(Debug, Default, Clone)]
pub struct ConfigValidator {
    /// Directory relative file paths are checked against.
    base_dir: Option<PathBuf>,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_dir: None }
    }

    /// Checks relative file paths against `dir` instead of the working
    /// directory.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn exists(&self, path: &Path) -> bool {
        resolve_path(self.base_dir.as_deref(), path).exists()
    }

    /// Validates a class configuration, failing on the first error.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, config: &ClassConfig) -> Result<ValidationResult> {
        let mut result = self.check(config);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            Err(SyncError::Config(result.errors.swap_remove(0)))
        }
    }

    /// Collects every error and warning of a class configuration.
    #[must_use]
    pub fn check(&self, config: &ClassConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::check_class(config, &mut result);
        self.check_presentations(config, &mut result);
        self.check_resources(&config.resources, &mut result);

        result
    }

    fn check_class(config: &ClassConfig, result: &mut ValidationResult) {
        if config.name.trim().is_empty() {
            result
                .errors
                .push(ConfigError::validation("Class name cannot be empty", "name"));
        }

        if config.id.as_ref().is_some_and(|id| id.trim().is_empty()) {
            result
                .errors
                .push(ConfigError::validation("Class id cannot be empty when set", "id"));
        }
    }

    fn check_presentations(&self, config: &ClassConfig, result: &mut ValidationResult) {
        if config.presentations.len() > 1 {
            result.errors.push(ConfigError::validation(
                format!(
                    "A class has at most one presentation, found {}",
                    config.presentations.len()
                ),
                "presentations",
            ));
        }

        for (i, presentation) in config.presentations.iter().enumerate() {
            if presentation.filename().is_empty() {
                result.errors.push(ConfigError::validation(
                    "Presentation file must name a file",
                    format!("presentations[{i}].file"),
                ));
                continue;
            }
            if !self.exists(&presentation.file) {
                result.warnings.push(format!(
                    "presentations[{i}].file: '{}' does not exist",
                    presentation.file.display()
                ));
            }
            if !self.exists(&presentation.notes_source) {
                result.warnings.push(format!(
                    "presentations[{i}].notes_source: '{}' does not exist",
                    presentation.notes_source.display()
                ));
            }
        }
    }

    fn check_resources(&self, resources: &[ResourceConfig], result: &mut ValidationResult) {
        let mut seen_names = HashSet::new();

        for (i, resource) in resources.iter().enumerate() {
            let prefix = format!("resources[{i}]");

            if resource.name.trim().is_empty() {
                result.errors.push(ConfigError::validation(
                    "Resource name cannot be empty",
                    format!("{prefix}.name"),
                ));
            } else if !seen_names.insert(resource.name.as_str()) {
                result.errors.push(ConfigError::DuplicateName {
                    resource_type: String::from("resource"),
                    name: resource.name.clone(),
                });
            }

            if resource.instance_type.trim().is_empty() {
                result.errors.push(ConfigError::validation(
                    "Instance type cannot be empty",
                    format!("{prefix}.instance_type"),
                ));
            }

            Self::check_image(&resource.image, &prefix, result);
            self.check_scripts(&resource.init_scripts, &format!("{prefix}.init_scripts"), result);
            self.check_scripts(
                &resource.post_launch_scripts,
                &format!("{prefix}.post_launch_scripts"),
                result,
            );
            Self::check_webview_links(resource, &prefix, result);
        }
    }

    fn check_image(image: &ImageSpec, prefix: &str, result: &mut ValidationResult) {
        match image {
            ImageSpec::Named(name) => {
                if !ImageCatalog::contains(name) {
                    result.errors.push(ConfigError::validation(
                        ImageCatalog::unknown(name).to_string(),
                        format!("{prefix}.image"),
                    ));
                }
            }
            ImageSpec::Custom(custom) => {
                if custom.image_id.trim().is_empty() {
                    result.errors.push(ConfigError::validation(
                        "Custom image id cannot be empty",
                        format!("{prefix}.image.image_id"),
                    ));
                }
                if custom.image_user.trim().is_empty() {
                    result.errors.push(ConfigError::validation(
                        "Custom image user cannot be empty",
                        format!("{prefix}.image.image_user"),
                    ));
                }
            }
        }
    }

    fn check_scripts(&self, scripts: &[ScriptRef], prefix: &str, result: &mut ValidationResult) {
        for (i, script) in scripts.iter().enumerate() {
            match script {
                ScriptRef::Fragment(fragment) => {
                    if fragment.script.trim().is_empty() {
                        result.errors.push(ConfigError::validation(
                            "Script fragment name cannot be empty",
                            format!("{prefix}[{i}].script"),
                        ));
                    }
                    if fragment.version.trim().is_empty() {
                        result.errors.push(ConfigError::validation(
                            "Script fragment version cannot be empty",
                            format!("{prefix}[{i}].version"),
                        ));
                    }
                }
                ScriptRef::File(path) => {
                    if !self.exists(path) {
                        result.warnings.push(format!(
                            "{prefix}[{i}]: script file '{}' does not exist",
                            path.display()
                        ));
                    }
                }
            }
        }
    }

    fn check_webview_links(resource: &ResourceConfig, prefix: &str, result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (i, link) in resource.webview_links.iter().enumerate() {
            if link.name.trim().is_empty() {
                result.errors.push(ConfigError::validation(
                    "Webview link name cannot be empty",
                    format!("{prefix}.webview_links[{i}].name"),
                ));
            } else if !seen.insert(link.name.as_str()) {
                result.errors.push(ConfigError::DuplicateName {
                    resource_type: format!("webview link of resource '{}'", resource.name),
                    name: link.name.clone(),
                });
            }

            if link.url.trim().is_empty() {
                result.errors.push(ConfigError::validation(
                    "Webview link url cannot be empty",
                    format!("{prefix}.webview_links[{i}].url"),
                ));
            }
        }
    }
}
