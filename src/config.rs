use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file structure for stagecast.
///
/// Holds the chat and CI credentials plus the store and rendering settings
/// shared by every subcommand. Files are loaded from the current directory
/// or a specified path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub gitlab: GitLabConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SlackConfig {
    /// Bot token used for chat.postMessage / chat.update
    pub token: Option<String>,

    /// Web API base URL
    #[serde(default = "default_slack_base_url")]
    pub base_url: String,

    /// Channel new pipeline messages are posted to
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitLabConfig {
    /// Token with read access to job traces
    pub token: Option<String>,

    /// GitLab instance base URL
    #[serde(default = "default_gitlab_base_url")]
    pub base_url: String,

    /// Project id or path (e.g., 'group/project') job output is read from
    pub project: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory for the file backend; defaults to the user cache dir
    pub path: Option<PathBuf>,

    /// Age after which `prune` deletes a pipeline's state
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RenderConfig {
    /// Lines of job output shown when a log is expanded
    #[serde(default = "default_log_lines")]
    pub log_lines: usize,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_slack_base_url(),
            channel: None,
        }
    }
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_gitlab_base_url(),
            project: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            retention_days: default_retention_days(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            log_lines: default_log_lines(),
        }
    }
}

fn default_slack_base_url() -> String {
    "https://slack.com/api/".to_string()
}

fn default_gitlab_base_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_retention_days() -> u32 {
    7
}

fn default_log_lines() -> usize {
    30
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./stagecast.toml
    /// 3. ./stagecast.json
    /// 4. ./stagecast.yaml
    /// 5. ./stagecast.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "stagecast.toml",
            "stagecast.json",
            "stagecast.yaml",
            "stagecast.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Channel for new messages; required by every subcommand that posts.
    pub fn channel(&self) -> Result<&str> {
        match self.slack.channel.as_deref() {
            Some(channel) if !channel.is_empty() => Ok(channel),
            _ => bail!("No Slack channel configured (set slack.channel)"),
        }
    }

    /// Directory for the file store.
    pub fn store_dir(&self) -> Result<PathBuf> {
        self.store
            .path
            .clone()
            .or_else(crate::store::FileStore::default_dir)
            .context("No store path configured and no cache directory available")
    }
}
