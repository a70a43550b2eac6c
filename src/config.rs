use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_destination_name() -> String {
    "My Drive".to_string()
}

fn default_gclone_path() -> PathBuf {
    PathBuf::from("gclone")
}

fn default_remote() -> String {
    "gc".to_string()
}

fn default_edit_interval() -> u64 {
    5
}

/// Process-wide configuration, read once at startup and passed by value
/// into the pieces that need it.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub token: String,
    /// Chat ids allowed to drive the bot. The first entry receives the
    /// status messages. An empty list disables everything but `/id`.
    #[serde(default)]
    pub allowed_chats: Vec<i64>,
    /// Destination Drive folder id.
    pub destination_folder: String,
    /// Human name of the destination, shown in status messages.
    #[serde(default = "default_destination_name")]
    pub destination_folder_name: String,
    #[serde(default = "default_gclone_path")]
    pub gclone_path: PathBuf,
    #[serde(default)]
    pub gclone_config: Option<PathBuf>,
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Minimum seconds between edits of a status message.
    #[serde(default = "default_edit_interval")]
    pub edit_interval_secs: u64,
    /// Cap on concurrently running batches. Absent means unlimited.
    #[serde(default)]
    pub max_concurrent_batches: Option<usize>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Config =
            toml::from_str(&raw).with_context(|| format!("parse config {}", path.display()))?;
        Ok(config)
    }

    /// Checked-once startup preconditions. Everything downstream assumes
    /// these hold.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token.trim().is_empty() {
            bail!("bot token is not set");
        }
        if self.destination_folder.trim().is_empty() {
            bail!("destination folder id is not set");
        }
        self.resolve_gclone()?;
        Ok(())
    }

    /// Locate the gclone binary: an explicit file path wins, otherwise
    /// the name is searched on PATH.
    pub fn resolve_gclone(&self) -> anyhow::Result<PathBuf> {
        if self.gclone_path.is_file() {
            return Ok(self.gclone_path.clone());
        }
        if let Some(found) = search_path(&self.gclone_path) {
            return Ok(found);
        }
        bail!(
            "gclone executable not found: {}",
            self.gclone_path.display()
        );
    }
}

fn search_path(name: &Path) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}
