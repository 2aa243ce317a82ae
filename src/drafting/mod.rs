pub mod claude;
pub mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::DraftingConfig;
use crate::error::{Result, WorkflowError};
use crate::research::extract_interests;

pub use claude::ClaudeClient;

/// A generated email awaiting review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Draft {
    pub subject: String,
    pub body: String,
}

/// Prompt in, text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

pub struct EmailDrafter {
    generator: Box<dyn TextGenerator>,
    config: DraftingConfig,
    keywords: Vec<String>,
    max_retries: u32,
    backoff: Duration,
}

impl EmailDrafter {
    pub fn new(
        generator: Box<dyn TextGenerator>,
        config: DraftingConfig,
        keywords: Vec<String>,
        max_retries: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            generator,
            config,
            keywords,
            max_retries,
            backoff,
        }
    }

    /// Generate a placeholder-free email for `professor` from their profile text.
    pub async fn draft(
        &self,
        professor: &str,
        profile_text: &str,
    ) -> std::result::Result<Draft, WorkflowError> {
        if profile_text.trim().is_empty() {
            return Err(WorkflowError::InsufficientInput(
                "profile text is empty".to_string(),
            ));
        }

        let interests = extract_interests(profile_text, &self.keywords);
        let excerpt: String = profile_text
            .chars()
            .take(self.config.max_profile_chars)
            .collect();
        let prompt = prompt::drafting_prompt(professor, &excerpt, &interests, &self.config);

        let output = self.generate_with_retry(&prompt).await?;
        let draft = parse_output(&output, &self.config.default_subject);
        validate(&draft, &self.config.placeholder_markers)?;

        tracing::info!(
            professor = %professor,
            subject = %draft.subject,
            chars = draft.body.len(),
            "Email drafted"
        );
        Ok(draft)
    }

    async fn generate_with_retry(&self, prompt: &str) -> std::result::Result<String, WorkflowError> {
        let mut attempt = 0;
        loop {
            match self.generator.generate(prompt::SYSTEM_PROMPT, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let backoff = self.backoff * 2u32.saturating_pow(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying draft generation"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(WorkflowError::DraftGenerationFailed(e.to_string())),
            }
        }
    }
}

/// Split generator output of the form `SUBJECT: … / --- / BODY: …`.
///
/// Output without the markers is taken as the body under `default_subject`.
pub fn parse_output(raw: &str, default_subject: &str) -> Draft {
    let (subject, body) = if raw.contains("SUBJECT:") && raw.contains("BODY:") {
        let (head, tail) = raw
            .split_once("---")
            .or_else(|| raw.split_once("BODY:"))
            .unwrap_or((raw, ""));
        let subject = head
            .replace("SUBJECT:", "")
            .replace("BODY:", "")
            .trim()
            .to_string();
        let body = tail.split_once("BODY:").map_or(tail, |(_, b)| b);
        (subject, body.to_string())
    } else {
        (String::new(), raw.to_string())
    };

    let body = body
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.to_lowercase().starts_with("subject:") && trimmed != "---"
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    Draft {
        subject: if subject.is_empty() {
            default_subject.to_string()
        } else {
            subject
        },
        body,
    }
}

/// Reject drafts that are empty or still contain template markers.
pub fn validate(draft: &Draft, markers: &[String]) -> std::result::Result<(), WorkflowError> {
    if draft.body.trim().is_empty() {
        return Err(WorkflowError::MalformedDraft("body is empty".to_string()));
    }

    let leftover = markers
        .iter()
        .filter(|m| !m.is_empty())
        .find(|m| draft.body.contains(m.as_str()) || draft.subject.contains(m.as_str()));

    match leftover {
        Some(marker) => Err(WorkflowError::MalformedDraft(format!(
            "placeholder `{marker}` left in draft"
        ))),
        None => Ok(()),
    }
}
