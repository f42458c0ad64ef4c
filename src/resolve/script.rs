//! Script rendering.
//!
//! A resource declares ordered lists of script references for two targets.
//! Each list is rendered into the single script body the platform stores:
//! fragments get their environment prelude, are minified, wrapped in start
//! and end banners, joined, then wrapped for the target shell.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::fetch::{FragmentCache, FragmentSource, ScriptFolder};
use crate::config::{resolve_path, FragmentRef, ScriptRef};
use crate::error::{Result, ScriptError};

/// When a script runs on the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptTarget {
    /// At boot, sent as EC2 user data.
    Init,
    /// Once the machine is reachable.
    PostLaunch,
}

impl fmt::Display for ScriptTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::PostLaunch => "post-launch",
        };
        write!(f, "{s}")
    }
}

/// Trims a script and terminates it with a single newline.
///
/// Empty and whitespace-only scripts normalize to the empty string.
#[must_use]
pub fn normalize_script(script: &str) -> String {
    let trimmed = script.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

/// Drops full-line comments and collapses runs of blank lines.
///
/// Interpreter directives (`#!`, `#requires`) are kept. PowerShell block
/// comments (`<#` to `#>`) are dropped whole when they span full lines.
#[must_use]
pub fn minify(script: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    let mut in_block = false;

    for line in script.lines() {
        let trimmed = line.trim();
        if in_block {
            if let Some(end) = trimmed.find("#>") {
                in_block = false;
                // Code after the closing marker stays
                let rest = trimmed[end + 2..].trim();
                if !rest.is_empty() {
                    lines.push(rest);
                    previous_blank = false;
                }
            }
            continue;
        }
        if let Some(body) = trimmed.strip_prefix("<#") {
            match body.find("#>") {
                None => {
                    in_block = true;
                    continue;
                }
                Some(end) if body[end + 2..].trim().is_empty() => continue,
                Some(_) => {}
            }
        }
        if is_comment(trimmed) {
            continue;
        }
        let blank = trimmed.is_empty();
        if blank && previous_blank {
            continue;
        }
        previous_blank = blank;
        lines.push(line.trim_end());
    }

    lines.join("\n").trim().to_string()
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#')
        && !line.starts_with("#!")
        && !line.to_ascii_lowercase().starts_with("#requires")
}

/// Renders the environment prelude of a fragment.
fn env_prelude(fragment: &FragmentRef, is_windows: bool) -> String {
    fragment
        .env
        .iter()
        .map(|(key, value)| {
            if is_windows {
                format!("${key} = '{}'", value.replace('\'', "''"))
            } else {
                format!("{key}='{}'", value.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn decorate(body: &str, name: &str, is_windows: bool) -> String {
    let print = if is_windows { "Write-Output" } else { "echo" };
    let mut decorated = format!("{print} \"--------- Start {name}\"\n");
    if !body.is_empty() {
        decorated.push_str(body);
        decorated.push('\n');
    }
    decorated.push_str(&format!("{print} \"--------- End {name}\""));
    decorated
}

/// Renders script lists into the bodies sent to the platform.
pub struct ScriptResolver {
    source: Arc<dyn FragmentSource>,
    cache: FragmentCache,
    base_dir: Option<PathBuf>,
}

impl fmt::Debug for ScriptResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptResolver")
            .field("cache", &self.cache)
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

impl ScriptResolver {
    /// Creates a resolver with an empty fragment cache.
    #[must_use]
    pub fn new(source: Arc<dyn FragmentSource>) -> Self {
        Self {
            source,
            cache: FragmentCache::new(),
            base_dir: None,
        }
    }

    /// Reads relative script files from `dir` instead of the working
    /// directory. Banners keep the configured path.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Returns the fragment cache.
    #[must_use]
    pub const fn cache(&self) -> &FragmentCache {
        &self.cache
    }

    /// Renders a script list for a target.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::File`] if a local script cannot be read and
    /// [`ScriptError::Fetch`] if a fragment cannot be fetched. Nothing is
    /// rendered in either case.
    pub async fn render(
        &self,
        scripts: &[ScriptRef],
        target: ScriptTarget,
        is_windows: bool,
    ) -> Result<String> {
        if scripts.is_empty() {
            return Ok(String::new());
        }

        let mut parts = Vec::with_capacity(scripts.len());
        for script in scripts {
            let content = self.content(script, target, is_windows).await?;
            parts.push(decorate(&minify(&content), &script.name(), is_windows));
        }

        let body = normalize_script(&parts.join("\n\n"));
        debug!(
            "Rendered {} {target} script(s) into {} bytes",
            scripts.len(),
            body.len()
        );

        if body.is_empty() {
            return Ok(body);
        }
        Ok(match (target, is_windows) {
            (ScriptTarget::Init, true) => format!("<powershell>\n{body}</powershell>\n"),
            (_, true) => body,
            (_, false) => format!("#!/bin/bash\n{body}"),
        })
    }

    async fn content(
        &self,
        script: &ScriptRef,
        target: ScriptTarget,
        is_windows: bool,
    ) -> Result<String> {
        match script {
            ScriptRef::File(path) => {
                let path = resolve_path(self.base_dir.as_deref(), path);
                tokio::fs::read_to_string(&path).await.map_err(|e| {
                    ScriptError::File {
                        path,
                        message: e.to_string(),
                    }
                    .into()
                })
            }
            ScriptRef::Fragment(fragment) => {
                let folder = ScriptFolder::for_target(target, is_windows);
                let body = self
                    .cache
                    .get_or_fetch(self.source.as_ref(), fragment, folder)
                    .await?;
                let prelude = env_prelude(fragment, is_windows);
                if prelude.is_empty() {
                    Ok(body)
                } else {
                    Ok(format!("{prelude}\n{body}"))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSource {
        bodies: HashMap<(String, ScriptFolder), String>,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn new(entries: &[(&str, ScriptFolder, &str)]) -> Self {
            Self {
                bodies: entries
                    .iter()
                    .map(|(name, folder, body)| (((*name).to_string(), *folder), (*body).to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FragmentSource for StaticSource {
        async fn fetch(&self, script: &str, _version: &str, folder: ScriptFolder) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies
                .get(&(script.to_string(), folder))
                .cloned()
                .ok_or_else(|| {
                    ScriptError::Fetch {
                        url: format!("{folder}/{script}"),
                        message: String::from("404 Not Found"),
                    }
                    .into()
                })
        }
    }

    fn resolver(entries: &[(&str, ScriptFolder, &str)]) -> (ScriptResolver, Arc<StaticSource>) {
        let source = Arc::new(StaticSource::new(entries));
        (ScriptResolver::new(source.clone()), source)
    }

    #[test]
    fn test_normalize_script() {
        assert_eq!(normalize_script(""), "");
        assert_eq!(normalize_script("  \n\t"), "");
        assert_eq!(normalize_script("\necho hi\n\n"), "echo hi\n");
    }

    #[test]
    fn test_minify() {
        let script = "#!/bin/bash\n# install\napt-get update\n\n\n\n  # indented comment\napt-get install -y git # trailing\n";
        assert_eq!(
            minify(script),
            "#!/bin/bash\napt-get update\n\napt-get install -y git # trailing"
        );
        assert_eq!(minify("#Requires -RunAsAdministrator\n# note\nGet-Date"), "#Requires -RunAsAdministrator\nGet-Date");
    }

    #[test]
    fn test_minify_powershell_block_comments() {
        let script = "<#\n.SYNOPSIS\nInstall tools\n#>\nGet-Date\n<# one line #>\n<# inline #> Write-Output 'ok'\n";
        assert_eq!(minify(script), "Get-Date\n<# inline #> Write-Output 'ok'");

        let nested_hash = "<#\n# not a directive\n#>\nGet-Date";
        assert_eq!(minify(nested_hash), "Get-Date");
    }

    #[test]
    fn test_env_prelude_quoting() {
        let fragment = FragmentRef::new("x.sh")
            .with_env("NAME", "it's")
            .with_env("PLAIN", "v");
        assert_eq!(env_prelude(&fragment, false), "NAME='it'\\''s'\nPLAIN='v'");
        assert_eq!(env_prelude(&fragment, true), "$NAME = 'it''s'\n$PLAIN = 'v'");
    }

    #[tokio::test]
    async fn test_render_empty() {
        let (resolver, _) = resolver(&[]);
        let rendered = resolver.render(&[], ScriptTarget::Init, true).await.unwrap();
        assert_eq!(rendered, "");
    }

    #[tokio::test]
    async fn test_render_linux_init() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("init.sh");
        std::fs::write(&local, "# setup\ntouch /tmp/ready\n").unwrap();

        let (resolver, _) = resolver(&[("docker.sh", ScriptFolder::Scripts, "apt-get install -y docker.io")]);
        let scripts = vec![
            ScriptRef::Fragment(FragmentRef::new("docker.sh").with_env("VERSION", "24")),
            ScriptRef::File(local.clone()),
        ];
        let rendered = resolver
            .render(&scripts, ScriptTarget::Init, false)
            .await
            .unwrap();

        let expected = format!(
            "#!/bin/bash\n\
             echo \"--------- Start docker.sh\"\n\
             VERSION='24'\n\
             apt-get install -y docker.io\n\
             echo \"--------- End docker.sh\"\n\
             \n\
             echo \"--------- Start {name}\"\n\
             touch /tmp/ready\n\
             echo \"--------- End {name}\"\n",
            name = local.display()
        );
        assert_eq!(rendered, expected);
    }

    #[tokio::test]
    async fn test_render_windows_envelopes() {
        let (resolver, _) = resolver(&[
            ("choco.ps1", ScriptFolder::WinScripts, "choco install git"),
            ("choco.ps1", ScriptFolder::PostLaunchScripts, "git --version"),
        ]);
        let scripts = vec![ScriptRef::Fragment(FragmentRef::new("choco.ps1"))];

        let init = resolver
            .render(&scripts, ScriptTarget::Init, true)
            .await
            .unwrap();
        assert!(init.starts_with("<powershell>\nWrite-Output \"--------- Start choco.ps1\"\n"));
        assert!(init.ends_with("Write-Output \"--------- End choco.ps1\"\n</powershell>\n"));

        let post = resolver
            .render(&scripts, ScriptTarget::PostLaunch, true)
            .await
            .unwrap();
        assert!(!post.contains("powershell>"));
        assert!(post.contains("git --version"));
    }

    #[tokio::test]
    async fn test_render_reuses_cache() {
        let (resolver, source) = resolver(&[("a.sh", ScriptFolder::Scripts, "echo a")]);
        let scripts = vec![ScriptRef::Fragment(FragmentRef::new("a.sh"))];
        let first = resolver.render(&scripts, ScriptTarget::Init, false).await.unwrap();
        let second = resolver.render(&scripts, ScriptTarget::Init, false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cache().len().await, 1);
    }

    #[tokio::test]
    async fn test_render_missing_file_fails() {
        let (resolver, _) = resolver(&[]);
        let scripts = vec![ScriptRef::File(PathBuf::from("/nonexistent/init.sh"))];
        let err = resolver
            .render(&scripts, ScriptTarget::Init, false)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Script(ScriptError::File { .. })));
    }

    #[tokio::test]
    async fn test_render_reads_relative_files_from_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Installation")).unwrap();
        std::fs::write(dir.path().join("Installation/init.sh"), "touch /tmp/ready\n").unwrap();

        let (resolver, _) = resolver(&[]);
        let resolver = resolver.with_base_dir(dir.path());
        let scripts = vec![ScriptRef::File(PathBuf::from("Installation/init.sh"))];
        let rendered = resolver
            .render(&scripts, ScriptTarget::Init, false)
            .await
            .unwrap();
        assert_eq!(
            rendered,
            "#!/bin/bash\necho \"--------- Start Installation/init.sh\"\ntouch /tmp/ready\necho \"--------- End Installation/init.sh\"\n"
        );
    }

    #[tokio::test]
    async fn test_render_missing_fragment_fails() {
        let (resolver, _) = resolver(&[]);
        let scripts = vec![ScriptRef::Fragment(FragmentRef::new("missing.sh"))];
        let err = resolver
            .render(&scripts, ScriptTarget::PostLaunch, false)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Script(ScriptError::Fetch { .. })));
    }
}
