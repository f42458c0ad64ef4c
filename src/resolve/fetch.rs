//! Remote script fragments.
//!
//! Fragments live in a script library repository, one file per fragment,
//! under a folder that depends on the script target. A given version of a
//! fragment never changes, so bodies are memoized in a [`FragmentCache`].

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::script::ScriptTarget;
use crate::config::FragmentRef;
use crate::error::{Result, ScriptError};

/// Default script library location.
pub const DEFAULT_SCRIPTS_URL: &str =
    "https://raw.githubusercontent.com/Zenika/strigo-init-script-libs";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Library folder a fragment is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptFolder {
    /// Linux init scripts.
    Scripts,
    /// Windows init scripts.
    WinScripts,
    /// Post-launch scripts.
    PostLaunchScripts,
}

impl ScriptFolder {
    /// Returns the folder for a script target.
    #[must_use]
    pub const fn for_target(target: ScriptTarget, is_windows: bool) -> Self {
        match (target, is_windows) {
            (ScriptTarget::Init, false) => Self::Scripts,
            (ScriptTarget::Init, true) => Self::WinScripts,
            (ScriptTarget::PostLaunch, _) => Self::PostLaunchScripts,
        }
    }

    /// Returns the folder name in the library.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scripts => "scripts",
            Self::WinScripts => "win_scripts",
            Self::PostLaunchScripts => "post_launch_scripts",
        }
    }
}

impl fmt::Display for ScriptFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source of fragment bodies.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Fetches the body of a fragment.
    async fn fetch(&self, script: &str, version: &str, folder: ScriptFolder) -> Result<String>;
}

/// Fetches fragments over HTTP from the script library.
#[derive(Debug, Clone)]
pub struct HttpFragmentSource {
    client: Client,
    base_url: String,
}

impl HttpFragmentSource {
    /// Creates a source for the default library.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_SCRIPTS_URL)
    }

    /// Creates a source for a custom library location.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ScriptError::Fetch {
                url: base_url.to_string(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, script: &str, version: &str, folder: ScriptFolder) -> String {
        format!("{}/{version}/{folder}/{script}", self.base_url)
    }
}

#[async_trait]
impl FragmentSource for HttpFragmentSource {
    async fn fetch(&self, script: &str, version: &str, folder: ScriptFolder) -> Result<String> {
        let url = self.url(script, version, folder);
        debug!("Fetching script fragment {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ScriptError::Fetch {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ScriptError::Fetch {
            url: url.clone(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            let mut message = status.to_string();
            if !body.is_empty() {
                message.push_str(&format!(" -> {body}"));
            }
            return Err(ScriptError::Fetch { url, message }.into());
        }

        trace!("Fragment {url}: {} bytes", body.len());
        Ok(body)
    }
}

type FragmentKey = (String, String, ScriptFolder);

/// Memoized fragment bodies, keyed by `(script, version, folder)`.
#[derive(Debug, Default)]
pub struct FragmentCache {
    entries: Mutex<HashMap<FragmentKey, String>>,
}

impl FragmentCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached body of a fragment, fetching it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the fragment is not cached and cannot be fetched.
    pub async fn get_or_fetch(
        &self,
        source: &dyn FragmentSource,
        fragment: &FragmentRef,
        folder: ScriptFolder,
    ) -> Result<String> {
        let key = (fragment.script.clone(), fragment.version.clone(), folder);

        if let Some(body) = self.entries.lock().await.get(&key) {
            trace!("Fragment {} ({folder}) served from cache", fragment.script);
            return Ok(body.clone());
        }

        let body = source
            .fetch(&fragment.script, &fragment.version, folder)
            .await?;
        self.entries.lock().await.insert(key, body.clone());
        Ok(body)
    }

    /// Returns the number of cached fragments.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
