use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::config::ResearchConfig;
use crate::error::Result;
use crate::research::{ExtractMode, Lookup, ProfileSource, SourceFailure};

/// Profile source backed by an HTTP GET against a URL template.
pub struct HttpProfileSource {
    name: String,
    client: Client,
    url_template: String,
    mode: ExtractMode,
}

impl HttpProfileSource {
    pub fn new(
        name: &str,
        url_template: &str,
        mode: ExtractMode,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            name: name.to_string(),
            client,
            url_template: url_template.to_string(),
            mode,
        })
    }

    /// The (primary, fallback) pair described by the research config.
    pub fn pair_from_config(config: &ResearchConfig) -> Result<(Self, Self)> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let primary = Self::new(
            "primary",
            &config.primary_url,
            config.primary_mode,
            timeout,
            &config.user_agent,
        )?;
        let fallback = Self::new(
            "fallback",
            &config.fallback_url,
            config.fallback_mode,
            timeout,
            &config.user_agent,
        )?;
        Ok((primary, fallback))
    }

    pub fn url_for(&self, identifier: &str) -> String {
        self.url_template
            .replace("{id}", &urlencoding::encode(identifier))
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, identifier: &str) -> Lookup {
        let url = self.url_for(identifier);
        tracing::debug!(source = %self.name, url = %url, "Fetching profile page");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceFailure::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceFailure::NotFound);
        }
        if !status.is_success() {
            return Err(SourceFailure::Transport(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceFailure::Transport(e.to_string()))?;

        let text = self.mode.extract(&body);
        if text.is_empty() {
            return Err(SourceFailure::Empty);
        }
        Ok(text)
    }
}
