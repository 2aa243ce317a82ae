pub mod html;
pub mod http;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::error::WorkflowError;
use crate::workflow::types::SourceUsed;

pub use http::HttpProfileSource;

/// Why a single profile source produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceFailure {
    /// The source answered but there was no text to work with.
    #[error("empty content")]
    Empty,

    #[error("not found")]
    NotFound,

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Lookup = std::result::Result<String, SourceFailure>;

/// How to turn a fetched page into profile text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    /// All visible text on the page.
    PageText,
    /// Affiliation, interest tags and top publications of a Google Scholar profile.
    Scholar,
}

impl ExtractMode {
    pub fn extract(self, body: &str) -> String {
        match self {
            ExtractMode::PageText => html::page_text(body),
            ExtractMode::Scholar => html::scholar_profile(body),
        }
    }
}

#[async_trait]
pub trait ProfileSource: Send + Sync {
    fn name(&self) -> &str;

    /// Look up raw profile text for a subject identifier.
    async fn lookup(&self, identifier: &str) -> Lookup;
}

/// Profile text together with the source that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Research {
    pub profile_text: String,
    pub source: SourceUsed,
}

/// Primary-then-fallback profile lookup.
pub struct ProfileFetcher {
    primary: Box<dyn ProfileSource>,
    fallback: Box<dyn ProfileSource>,
}

impl ProfileFetcher {
    pub fn new(primary: Box<dyn ProfileSource>, fallback: Box<dyn ProfileSource>) -> Self {
        Self { primary, fallback }
    }

    pub async fn fetch(&self, identifier: &str) -> std::result::Result<Research, WorkflowError> {
        let primary = lookup_non_empty(self.primary.as_ref(), identifier).await;

        let fallback = match &primary {
            Ok(_) => None,
            Err(reason) => {
                tracing::warn!(
                    identifier = %identifier,
                    source = self.primary.name(),
                    reason = %reason,
                    "Primary profile source failed, trying fallback"
                );
                Some(lookup_non_empty(self.fallback.as_ref(), identifier).await)
            }
        };

        let research = route(primary, fallback)?;
        tracing::info!(
            identifier = %identifier,
            source = ?research.source,
            chars = research.profile_text.len(),
            "Research complete"
        );
        Ok(research)
    }
}

async fn lookup_non_empty(source: &dyn ProfileSource, identifier: &str) -> Lookup {
    match source.lookup(identifier).await {
        Ok(text) if text.trim().is_empty() => Err(SourceFailure::Empty),
        Ok(text) => Ok(text),
        Err(e) => Err(e),
    }
}

/// Decide which lookup supplies the profile text.
///
/// `fallback` is `None` when it was never consulted.
pub fn route(primary: Lookup, fallback: Option<Lookup>) -> std::result::Result<Research, WorkflowError> {
    match (primary, fallback) {
        (Ok(profile_text), _) => Ok(Research {
            profile_text,
            source: SourceUsed::Primary,
        }),
        (Err(_), Some(Ok(profile_text))) => Ok(Research {
            profile_text,
            source: SourceUsed::Fallback,
        }),
        (Err(p), Some(Err(f))) => Err(WorkflowError::ResearchUnavailable(format!(
            "primary: {p}; fallback: {f}"
        ))),
        (Err(p), None) => Err(WorkflowError::ResearchUnavailable(format!(
            "primary: {p}; fallback not attempted"
        ))),
    }
}

const MAX_INTERESTS: usize = 6;

/// Keywords found in `text`, title-cased, in keyword order, without duplicates.
pub fn extract_interests(text: &str, keywords: &[String]) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut found: Vec<String> = Vec::new();

    for keyword in keywords {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() || !lower.contains(&needle) {
            continue;
        }
        let titled = title_case(&needle);
        if !found.contains(&titled) {
            found.push(titled);
        }
        if found.len() == MAX_INTERESTS {
            break;
        }
    }

    found
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
