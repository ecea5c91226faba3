use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::auth::Token;
use crate::config::{Config, StoreBackend};
use crate::output;
use crate::pipeline::{decode_event, InboundEvent};
use crate::providers::slack::decode_interaction;
use crate::providers::{GitLabClient, SlackClient};
use crate::relay::retention::prune;
use crate::relay::{ActionOutcome, EventOutcome, Relay, RelayOptions};
use crate::render::render;
use crate::store::{FileStore, MemoryStore, StateStore};

#[derive(Parser)]
#[command(name = "stagecast")]
#[command(author, version, about = "Pipeline status relay for chat", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./stagecast.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    #[arg(long, global = true, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    slack_token: Option<String>,

    #[arg(long, global = true, env = "GITLAB_TOKEN", hide_env_values = true)]
    gitlab_token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply GitLab pipeline/job webhook bodies (one or more JSON documents)
    Event {
        /// Read from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Apply a Slack block_actions interaction (JSON or `payload=` form body)
    Action {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Render a pipeline webhook body without posting anything
    Render {
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Stage to show expanded; repeatable
        #[arg(short, long)]
        expand: Vec<String>,

        /// Print a terminal preview instead of Block Kit JSON
        #[arg(short, long, default_value_t = false)]
        table: bool,
    },

    /// Delete stored pipeline state older than the retention period
    Prune {
        /// Overrides store.retention-days
        #[arg(long)]
        max_age_days: Option<u32>,
    },
}

type CliRelay = Relay<Box<dyn StateStore>, SlackClient, Option<GitLabClient>>;

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(token) = &self.slack_token {
            config.slack.token = Some(token.clone());
        }
        if let Some(token) = &self.gitlab_token {
            config.gitlab.token = Some(token.clone());
        }
        Ok(config)
    }

    fn build_relay(config: &Config) -> Result<CliRelay> {
        let Some(slack_token) = config.slack.token.as_deref() else {
            bail!("No Slack bot token configured (set SLACK_BOT_TOKEN or slack.token)");
        };
        let transport = SlackClient::new(&config.slack.base_url, Token::from(slack_token))?;

        let logs = match &config.gitlab.project {
            Some(project) => Some(GitLabClient::new(
                &config.gitlab.base_url,
                project.clone(),
                config.gitlab.token.as_deref().map(Token::from),
            )?),
            None => {
                warn!("No gitlab.project configured; log and test summary controls will fail");
                None
            }
        };

        let options = RelayOptions {
            channel: config.channel()?.to_string(),
            log_lines: config.render.log_lines,
            ..RelayOptions::default()
        };

        Ok(Relay::new(open_store(config)?, transport, logs, options))
    }

    async fn execute_event(&self, file: Option<&Path>) -> Result<()> {
        let config = self.load_config()?;
        let relay = Self::build_relay(&config)?;
        let input = read_input(file)?;

        let mut report = Vec::new();
        for (index, document) in serde_json::Deserializer::from_str(&input)
            .into_iter::<Value>()
            .enumerate()
        {
            let document = document.with_context(|| format!("Invalid JSON in event {index}"))?;
            match relay.handle_event(&document.to_string()).await {
                Ok(outcome) => report.push(describe_event(&outcome)),
                Err(err) => {
                    error!("Failed to apply event {index}: {err}");
                    report.push(json!({ "outcome": "error", "error": err.to_string() }));
                }
            }
        }

        info!("Processed {} event(s)", report.len());
        self.write_output(&Value::Array(report))
    }

    async fn execute_action(&self, file: Option<&Path>) -> Result<()> {
        let config = self.load_config()?;
        let input = read_input(file)?;

        let Some(request) = decode_interaction(&input)? else {
            info!("Interaction carries no message action; nothing to do");
            return self.write_output(&json!({ "outcome": "ignored", "reason": "not_a_message_action" }));
        };

        let relay = Self::build_relay(&config)?;
        let report = match relay.handle_action(&request).await {
            Ok(outcome) => describe_action(&outcome),
            Err(err) => {
                error!("Failed to apply '{}' action: {err}", request.action_id);
                json!({ "outcome": "error", "error": err.to_string() })
            }
        };

        self.write_output(&report)
    }

    fn execute_render(&self, file: Option<&Path>, expand: &[String], table: bool) -> Result<()> {
        let input = read_input(file)?;
        let InboundEvent::Pipeline(snapshot) = decode_event(&input)? else {
            bail!("render expects a pipeline webhook body");
        };
        let expanded: BTreeSet<String> = expand.iter().cloned().collect();

        if table {
            output::print_preview(&snapshot, &expanded);
            return Ok(());
        }

        let rendered = render(&snapshot, &expanded);
        self.write_output(&json!({
            "text": rendered.text,
            "blocks": rendered.json_blocks()?,
        }))
    }

    async fn execute_prune(&self, max_age_days: Option<u32>) -> Result<()> {
        let config = self.load_config()?;
        let days = max_age_days.unwrap_or(config.store.retention_days);
        let store = open_store(&config)?;

        let removed = prune(
            store.as_ref(),
            chrono::Duration::days(i64::from(days)),
            chrono::Utc::now(),
        )
        .await?;

        self.write_output(&json!({ "removed": removed, "max_age_days": days }))
    }

    fn write_output(&self, value: &Value) -> Result<()> {
        let json_output = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, json_output)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            info!("Result written to: {}", output_path.display());
        } else {
            println!("{json_output}");
        }

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Event { file } => self.execute_event(file.as_deref()).await,
            Commands::Action { file } => self.execute_action(file.as_deref()).await,
            Commands::Render {
                file,
                expand,
                table,
            } => self.execute_render(file.as_deref(), expand, *table),
            Commands::Prune { max_age_days } => self.execute_prune(*max_age_days).await,
        }
    }
}

fn open_store(config: &Config) -> Result<Box<dyn StateStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            warn!("Using the memory store; state is lost when this process exits");
            Ok(Box::new(MemoryStore::new()))
        }
        StoreBackend::File => {
            let dir = config.store_dir()?;
            let store = FileStore::new(&dir)
                .with_context(|| format!("Failed to open store at {}", dir.display()))?;
            Ok(Box::new(store))
        }
    }
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => std::io::read_to_string(std::io::stdin()).context("Failed to read stdin"),
    }
}

fn describe_event(outcome: &EventOutcome) -> Value {
    match outcome {
        EventOutcome::Created(message) => {
            json!({ "outcome": "created", "channel": message.channel, "ts": message.ts })
        }
        EventOutcome::Updated(message) => {
            json!({ "outcome": "updated", "channel": message.channel, "ts": message.ts })
        }
        EventOutcome::Ignored(reason) => json!({ "outcome": "ignored", "reason": format!("{reason:?}") }),
    }
}

fn describe_action(outcome: &ActionOutcome) -> Value {
    match outcome {
        ActionOutcome::Updated(message) => {
            json!({ "outcome": "updated", "channel": message.channel, "ts": message.ts })
        }
        ActionOutcome::Acknowledged => json!({ "outcome": "acknowledged" }),
        ActionOutcome::Ignored(reason) => json!({ "outcome": "ignored", "reason": format!("{reason:?}") }),
    }
}
