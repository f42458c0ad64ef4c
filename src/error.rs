//! Error types for the Strigo synchronization tool.
//!
//! This module provides the error hierarchy for every stage of a sync run:
//! configuration loading, image and script resolution, notes parsing,
//! platform API calls and reconciliation.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the synchronization tool.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Image resolution errors.
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// Script rendering errors.
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// Speaker notes parsing errors.
    #[error("Notes error: {0}")]
    Notes(#[from] NotesError),

    /// Strigo API errors.
    #[error("Strigo API error: {0}")]
    Api(#[from] ApiError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file already exists and would be overwritten.
    #[error("Configuration file already exists: {path}")]
    AlreadyExists {
        /// Path to the existing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// The configuration could not be serialized back to disk.
    #[error("Failed to write configuration: {message}")]
    WriteError {
        /// Description of the serialization or IO error.
        message: String,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Duplicate name inside a list that requires unique names.
    #[error("Duplicate {resource_type} name: {name}")]
    DuplicateName {
        /// Kind of entry (resource, webview link).
        resource_type: String,
        /// The duplicated name.
        name: String,
    },

    /// The configuration has no remote class id where one is required.
    #[error("Class '{name}' has no id, it has not been created on Strigo yet")]
    MissingClassId {
        /// Class name.
        name: String,
    },
}

/// Image resolution errors.
#[derive(Debug, Error)]
pub enum ImageError {
    /// A symbolic image name is not part of the catalog.
    #[error(
        "Unknown image name: {name}\nAvailable image names are: {}\nOr use a custom image with '{{image_id: <ami_id>, image_user: <image_user>, ec2_region: <ec2_region>}}'",
        .available.join(", ")
    )]
    UnknownImage {
        /// The unknown name.
        name: String,
        /// Every name known to the catalog.
        available: Vec<String>,
    },
}

/// Script rendering errors.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// A remote fragment could not be fetched.
    #[error("Failed to fetch script fragment {url}: {message}")]
    Fetch {
        /// URL of the fragment.
        url: String,
        /// Status line or transport error.
        message: String,
    },

    /// A local script file could not be read.
    #[error("Failed to read script file {path}: {message}")]
    File {
        /// Path to the script.
        path: PathBuf,
        /// Underlying IO error.
        message: String,
    },
}

/// Speaker notes parsing errors.
#[derive(Debug, Error)]
pub enum NotesError {
    /// The index file or one of the slide decks does not exist.
    #[error("Notes source file '{path}' does not exist")]
    MissingSource {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The index file is not a JSON array of paths.
    #[error("Invalid notes index '{path}': {message}")]
    InvalidIndex {
        /// Path to the index file.
        path: PathBuf,
        /// Parse error.
        message: String,
    },
}

/// Strigo API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The platform rejected a request with field-level errors (HTTP 422).
    #[error("Request rejected by Strigo: {message}{}", format_field_errors(.errors))]
    Validation {
        /// Error message from the API.
        message: String,
        /// Field-level errors, as returned by the API.
        errors: Vec<serde_json::Value>,
    },

    /// The platform answered with a structured failure envelope.
    #[error("Strigo request failed with HTTP {status} ({kind}): {message}")]
    Failure {
        /// HTTP status code.
        status: u16,
        /// Error type reported by the API.
        kind: String,
        /// Error message from the API.
        message: String,
    },

    /// Unexpected HTTP status outside the failure envelope.
    #[error("HTTP {status} on {method} {path}: {body}")]
    Transport {
        /// HTTP method.
        method: String,
        /// Request path.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Network error.
    #[error("Network error communicating with Strigo: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from Strigo API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A planned action referenced a presentation created earlier in the run
    /// that never received an id.
    #[error("No uploaded presentation named '{filename}' to attach notes to")]
    UnresolvedPresentation {
        /// Presentation filename.
        filename: String,
    },

    /// An action needed the class id before the class was created.
    #[error("Action '{action}' requires a class id")]
    MissingClassId {
        /// Description of the action.
        action: String,
    },

    /// Reconciliation was aborted.
    #[error("Reconciliation aborted: {reason}")]
    Aborted {
        /// Reason for abort.
        reason: String,
    },
}

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

fn format_field_errors(errors: &[serde_json::Value]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!(" [{}]", rendered.join(", "))
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl ApiError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns whether the platform reported a missing entity.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Failure { status, kind, .. } => {
                *status == 404 || kind.to_ascii_lowercase().replace('_', "") == "notfound"
            }
            Self::Transport { status, .. } => *status == 404,
            _ => false,
        }
    }
}

impl SyncError {
    /// Returns whether the error is a platform "not found" answer.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_not_found())
    }
}
