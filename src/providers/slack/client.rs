use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::auth::Token;
use crate::error::{RelayError, Result};
use crate::pipeline::MessageRef;
use crate::providers::{ChatTransport, TransportError};

const MAX_RATE_LIMIT_RETRIES: u32 = 3;
const DEFAULT_RETRY_AFTER_SECONDS: u64 = 1;

/// Slack Web API client posting Block Kit messages with a bot token.
pub struct SlackClient {
    client: Client,
    api_url: Url,
    token: Token,
}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    blocks: &'a [Value],
    text: &'a str,
}

#[derive(Serialize)]
struct UpdateMessage<'a> {
    channel: &'a str,
    ts: &'a str,
    blocks: &'a [Value],
    text: &'a str,
}

#[derive(Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

impl SlackClient {
    /// Creates a client against `base_url` (normally <https://slack.com/api/>).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the URL is invalid.
    pub fn new(base_url: &str, token: Token) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stagecast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {e}")))?;

        // `join` drops the last path segment unless the base ends with '/'
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let api_url =
            Url::parse(&base).map_err(|e| RelayError::Config(format!("Invalid Slack API URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    /// Calls a Web API method, waiting out rate limits.
    async fn call(&self, method: &str, body: &impl Serialize) -> std::result::Result<SlackResponse, TransportError> {
        let url = self
            .api_url
            .join(method)
            .map_err(|e| TransportError::Malformed(format!("Invalid method URL: {e}")))?;

        let mut retry_count = 0;
        loop {
            let response = self
                .client
                .post(url.clone())
                .bearer_auth(self.token.as_str())
                .json(body)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if retry_count >= MAX_RATE_LIMIT_RETRIES {
                    return Err(TransportError::Rejected("rate_limited".to_string()));
                }

                let wait = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECONDS);
                warn!(
                    "Slack rate limited {method}, retrying in {wait}s ({}/{MAX_RATE_LIMIT_RETRIES})...",
                    retry_count + 1
                );

                tokio::time::sleep(Duration::from_secs(wait)).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                return Err(TransportError::Rejected(format!("HTTP {status}")));
            }

            let body: SlackResponse = response.json().await?;
            if !body.ok {
                return Err(TransportError::Rejected(
                    body.error.unwrap_or_else(|| "unknown_error".to_string()),
                ));
            }

            return Ok(body);
        }
    }
}

#[async_trait]
impl ChatTransport for SlackClient {
    async fn create_message(
        &self,
        channel: &str,
        blocks: &[Value],
        text: &str,
    ) -> std::result::Result<MessageRef, TransportError> {
        let response = self
            .call(
                "chat.postMessage",
                &PostMessage {
                    channel,
                    blocks,
                    text,
                },
            )
            .await?;

        match (response.channel, response.ts) {
            (Some(channel), Some(ts)) => {
                debug!("Posted message {ts} to {channel}");
                Ok(MessageRef { channel, ts })
            }
            _ => Err(TransportError::Malformed(
                "chat.postMessage response lacks channel or ts".to_string(),
            )),
        }
    }

    async fn update_message(
        &self,
        message: &MessageRef,
        blocks: &[Value],
        text: &str,
    ) -> std::result::Result<(), TransportError> {
        self.call(
            "chat.update",
            &UpdateMessage {
                channel: &message.channel,
                ts: &message.ts,
                blocks,
                text,
            },
        )
        .await?;

        debug!("Updated message {} in {}", message.ts, message.channel);
        Ok(())
    }
}
