//! Post-completion command catalog and process launcher

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info, warn};

/// Ordered mapping from menu label to executable path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCatalog {
    entries: Vec<(String, PathBuf)>,
}

impl CommandCatalog {
    pub fn new(entries: Vec<(String, PathBuf)>) -> Self {
        Self { entries }
    }

    pub fn resolve(&self, label: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, path)| path.as_path())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.resolve(label).is_some()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn entries(&self) -> &[(String, PathBuf)] {
        &self.entries
    }
}

impl Default for CommandCatalog {
    fn default() -> Self {
        Self::new(vec![
            ("Run Firefox".to_string(), PathBuf::from("/usr/bin/firefox")),
            ("Run Terminal".to_string(), PathBuf::from("/usr/bin/gnome-terminal")),
            ("Run File Browser".to_string(), PathBuf::from("/usr/bin/nautilus")),
        ])
    }
}

/// Parse a `LABEL=PATH` catalog entry.
pub fn parse_catalog_entry(raw: &str) -> Result<(String, PathBuf), String> {
    let (label, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=PATH, got '{}'", raw))?;
    let label = label.trim();
    let path = path.trim();
    if label.is_empty() || path.is_empty() {
        return Err(format!("expected LABEL=PATH, got '{}'", raw));
    }
    Ok((label.to_string(), PathBuf::from(path)))
}

/// Launches a post-completion command without blocking the caller.
pub trait CommandLauncher: Send + Sync {
    fn launch(&self, label: &str, path: &Path);
}

/// Spawns the executable as a child process on a detached task.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl CommandLauncher for ProcessLauncher {
    fn launch(&self, label: &str, path: &Path) {
        let label = label.to_string();
        let path = path.to_path_buf();

        tokio::spawn(async move {
            debug!("Launching '{}' ({})", label, path.display());
            let mut child = match Command::new(&path).spawn() {
                Ok(child) => child,
                Err(e) => {
                    warn!("Failed to launch '{}' ({}): {}", label, path.display(), e);
                    return;
                }
            };
            info!("Launched '{}' ({})", label, path.display());

            match child.wait().await {
                Ok(status) => debug!("'{}' exited with {}", label, status),
                Err(e) => warn!("Failed to wait for '{}': {}", label, e),
            }
        });
    }
}

/// Warn about catalog entries whose executable is missing
pub async fn check_catalog_paths(catalog: &CommandCatalog) -> usize {
    let mut missing = 0;
    for (label, path) in catalog.entries() {
        match tokio::fs::try_exists(path).await {
            Ok(true) => debug!("Command '{}' available at {}", label, path.display()),
            Ok(false) => {
                missing += 1;
                warn!("Command '{}' points at missing {}", label, path.display());
            }
            Err(e) => {
                missing += 1;
                warn!("Cannot check command '{}' at {}: {}", label, path.display(), e);
            }
        }
    }
    missing
}
