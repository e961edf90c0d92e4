use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type JobId = u64;

/// One syndication entry as handed over by the feed import job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub raw_content: Option<String>,
    pub categories: Vec<String>,
    pub published_at: DateTime<Utc>,
}

impl FeedItem {
    pub fn new(title: impl Into<String>, published_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into().trim().to_string(),
            raw_content: None,
            categories: Vec::new(),
            published_at,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.raw_content = Some(content.into());
        self
    }

    /// Picks the first non-blank candidate, in the order content, summary, description.
    pub fn with_first_content<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.raw_content = candidates
            .into_iter()
            .flatten()
            .map(Into::into)
            .find(|c: &String| !c.trim().is_empty());
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformContext {
    /// The feed's own URL; base for relative image paths.
    pub feed_url: String,
    /// Canonical URL of this item; base for absolute-path images and the canonical link.
    pub feed_source_url: String,
    pub mark_canonical: bool,
    pub resolve_referential_links: bool,
}

impl TransformContext {
    pub fn new(feed_url: impl Into<String>, feed_source_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            feed_source_url: feed_source_url.into(),
            mark_canonical: false,
            resolve_referential_links: false,
        }
    }

    pub fn mark_canonical(mut self, enabled: bool) -> Self {
        self.mark_canonical = enabled;
        self
    }

    pub fn resolve_referential_links(mut self, enabled: bool) -> Self {
        self.resolve_referential_links = enabled;
        self
    }
}

/// Front matter followed by a blank line and the Markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument(String);

impl AssembledDocument {
    pub(crate) fn new(content: String) -> Self {
        Self(content)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Everything after the closing front matter fence.
    pub fn body(&self) -> &str {
        self.0
            .strip_prefix("---\n")
            .and_then(|rest| rest.split_once("\n---"))
            .map(|(_, after)| after.trim_start_matches('\n'))
            .unwrap_or("")
    }
}

impl fmt::Display for AssembledDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A previously imported article, as returned by the lookup collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRef {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Queued,
    Cleaning,
    Routing,
    Converting,
    Assembling,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub job_id: JobId,
    pub stage: Stage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Progress(JobProgress),
    JobCompleted {
        job_id: JobId,
        document: AssembledDocument,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ResolveError {
    pub kind: FailureKind,
    pub message: String,
}

impl ResolveError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
