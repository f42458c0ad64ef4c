//! Configuration module for the class synchronization tool.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and writing class configuration files (JSON, TOML, YAML)
//! - Validation of configuration values
//! - Presentation digests for change detection
//! - Deriving a configuration from a remote class

mod hash;
mod import;
mod parser;
mod spec;
mod validator;

pub use hash::ContentHasher;
pub use import::{ConfigImporter, SCRIPTS_DIR};
pub use parser::{
    ConfigFormat, ConfigParser, Credentials, ENV_API_KEY, ENV_CLASS_ID, ENV_CLASS_NAME,
    ENV_ENDPOINT, ENV_ORG_ID, ENV_SCRIPTS_URL,
};
pub use spec::{
    resolve_path, ClassConfig, CustomImage, FragmentRef, ImageSpec, PresentationConfig, ResourceConfig,
    ScriptRef, ViewInterfaceSetting, DEFAULT_NOTES_SOURCE, DEFAULT_REGION,
    DEFAULT_SCRIPT_VERSION, LEGACY_REGION,
};
pub use validator::{ConfigValidator, ValidationResult};
