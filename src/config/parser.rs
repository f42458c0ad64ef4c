//! Configuration parser for loading and writing class configuration files.
//!
//! This module handles loading configuration from JSON, TOML or YAML files
//! (chosen by extension), environment variable overrides, `.env` loading
//! and credentials lookup.

use crate::error::{ConfigError, Result, SyncError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{ClassConfig, ViewInterfaceSetting};

/// Environment variable holding the organization id.
pub const ENV_ORG_ID: &str = "STRIGO_ORG_ID";
/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "STRIGO_API_KEY";
/// Environment variable overriding the API endpoint.
pub const ENV_ENDPOINT: &str = "STRIGO_ENDPOINT";
/// Environment variable overriding the script library location.
pub const ENV_SCRIPTS_URL: &str = "STRIGO_SCRIPTS_URL";
/// Environment variable overriding the class id.
pub const ENV_CLASS_ID: &str = "STRIGO_CLASS_ID";
/// Environment variable overriding the class name.
pub const ENV_CLASS_NAME: &str = "STRIGO_CLASS_NAME";

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    /// JSON (`.json` and unknown extensions).
    #[default]
    Json,
    /// TOML (`.toml`).
    Toml,
    /// YAML (`.yaml`, `.yml`).
    Yaml,
}

impl ConfigFormat {
    /// Picks the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("toml") => Self::Toml,
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Json => "JSON",
            Self::Toml => "TOML",
            Self::Yaml => "YAML",
        };
        write!(f, "{s}")
    }
}

/// Platform credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Organization id.
    pub organization_id: String,
    /// API key.
    pub api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("organization_id", &self.organization_id)
            .field("api_key", &"***")
            .finish()
    }
}

/// Configuration parser for loading class configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ClassConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(SyncError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse(&content, ConfigFormat::from_path(path), Some(path))
    }

    /// Parses configuration from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is invalid for the format.
    pub fn parse(
        &self,
        content: &str,
        format: ConfigFormat,
        source: Option<&Path>,
    ) -> Result<ClassConfig> {
        debug!("Parsing {format} configuration");

        let parsed = match format {
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        };

        let config: ClassConfig = parsed.map_err(|e| {
            SyncError::Config(ConfigError::ParseError {
                message: format!("{format} parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        debug!("Successfully parsed configuration for class: {}", config.name);
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ClassConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies `STRIGO_CLASS_ID` and `STRIGO_CLASS_NAME` overrides.
    fn apply_overrides(config: &mut ClassConfig, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(ENV_CLASS_ID).filter(|id| !id.is_empty()) {
            debug!("Overriding class id from environment");
            config.id = Some(id);
        }

        if let Some(name) = lookup(ENV_CLASS_NAME).filter(|name| !name.is_empty()) {
            debug!("Overriding class name from environment");
            config.name = name;
        }
    }

    /// Serializes a configuration in the given format.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized. TOML has
    /// no null, so a resource clearing its view interface cannot be written
    /// as TOML.
    pub fn serialize(&self, config: &ClassConfig, format: ConfigFormat) -> Result<String> {
        if format == ConfigFormat::Toml {
            if let Some(resource) = config
                .resources
                .iter()
                .find(|r| r.view_interface == ViewInterfaceSetting::Clear)
            {
                return Err(SyncError::Config(ConfigError::WriteError {
                    message: format!(
                        "resource '{}' clears its view_interface, which TOML cannot express; use JSON or YAML",
                        resource.name
                    ),
                }));
            }
        }

        let rendered = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(config)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yaml::to_string(config).map_err(|e| e.to_string()),
        };

        rendered.map_err(|message| SyncError::Config(ConfigError::WriteError { message }))
    }

    /// Writes a configuration back to disk, replacing the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or written.
    pub fn write_file(&self, config: &ClassConfig, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.serialize(config, ConfigFormat::from_path(path))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        info!("Configuration written to: {}", path.display());
        Ok(())
    }

    /// Writes a new configuration file, refusing to overwrite unless forced.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyExists`] if the file exists and `force`
    /// is not set.
    pub fn create_file(&self, config: &ClassConfig, path: impl AsRef<Path>, force: bool) -> Result<()> {
        let path = path.as_ref();
        if path.exists() && !force {
            return Err(SyncError::Config(ConfigError::AlreadyExists {
                path: path.to_path_buf(),
            }));
        }
        self.write_file(config, path)
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                SyncError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the platform credentials from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `STRIGO_ORG_ID` or `STRIGO_API_KEY` is not set.
    pub fn credentials() -> Result<Credentials> {
        Self::credentials_from(|name| std::env::var(name).ok())
    }

    fn credentials_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
        let required = |name: &str| {
            lookup(name).filter(|v| !v.is_empty()).ok_or_else(|| {
                SyncError::Config(ConfigError::MissingEnvVar {
                    name: name.to_string(),
                })
            })
        };

        Ok(Credentials {
            organization_id: required(ENV_ORG_ID)?,
            api_key: required(ENV_API_KEY)?,
        })
    }

    /// Gets the API endpoint override (optional).
    #[must_use]
    pub fn endpoint() -> Option<String> {
        std::env::var(ENV_ENDPOINT).ok().filter(|v| !v.is_empty())
    }

    /// Gets the script library override (optional).
    #[must_use]
    pub fn scripts_url() -> Option<String> {
        std::env::var(ENV_SCRIPTS_URL).ok().filter(|v| !v.is_empty())
    }
}
