use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use url::Url;

use crate::auth::Token;
use crate::error::{RelayError, Result};
use crate::pipeline::JobId;
use crate::providers::{JobLogSource, LogFetchError};

/// GitLab REST client used to read job traces.
pub struct GitLabClient {
    client: Client,
    api_url: Url,
    project: String,
    token: Option<Token>,
}

impl GitLabClient {
    /// Creates a client for one project.
    ///
    /// # Arguments
    ///
    /// * `base_url` - GitLab instance base URL (e.g., <https://gitlab.com>)
    /// * `project` - Numeric project id or full path (e.g., "group/project")
    /// * `token` - Optional access token
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the URL is invalid.
    pub fn new(base_url: &str, project: String, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stagecast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(base_url)
            .map_err(|e| RelayError::Config(format!("Invalid base URL: {e}")))?
            .join("api/v4/")
            .map_err(|e| RelayError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            project,
            token,
        })
    }

    /// Helper to build authenticated requests
    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    /// `.../projects/{project}/jobs/{job_id}/trace`, with the project path
    /// escaped into a single segment.
    fn trace_url(&self, job_id: JobId) -> std::result::Result<Url, LogFetchError> {
        let job = job_id.to_string();
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| LogFetchError::Request(format!("Cannot extend base URL: {}", self.api_url)))?
            .pop_if_empty()
            .extend([
                "projects",
                self.project.as_str(),
                "jobs",
                job.as_str(),
                "trace",
            ]);
        Ok(url)
    }
}

#[async_trait]
impl JobLogSource for GitLabClient {
    async fn fetch_job_text(&self, job_id: JobId) -> std::result::Result<String, LogFetchError> {
        let url = self.trace_url(job_id)?;
        debug!("Fetching trace for job {job_id}");

        let response = self.auth_request(self.client.get(url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LogFetchError::Status {
                job_id,
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}
