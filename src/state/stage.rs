/// Per-URL processing stages
///
/// This module defines every stage a URL passes through inside the crawl
/// pipeline and which transitions between them are legal.
use crate::CrawlError;
use std::fmt;

/// Represents the current stage of a URL in the processing pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    // ===== Active Stages =====
    /// Dequeued from the frontier, not yet requested
    Queued,

    /// Request in progress (including retries)
    Fetching,

    /// Deciding the resource kind
    Classifying,

    /// Collecting outbound links from markup
    Extracting,

    /// Resolving a script-gated page through the renderer
    Escalating,

    /// Computing the content digest
    Fingerprinting,

    /// Writing the entry and the body
    Recording,

    // ===== Terminal Stages =====
    /// Entry recorded and URL completed
    Done,

    /// Processing gave up on this URL
    Failed,
}

impl Stage {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// ```text
    /// Queued → Fetching → Classifying → Extracting  → Fingerprinting → Recording → Done
    ///                         │       → Escalating  ↗
    ///                         └──────────────────────↗
    /// Fetching | Escalating → Failed
    /// ```
    pub fn can_advance_to(&self, next: Stage) -> bool {
        use Stage::*;

        matches!(
            (self, next),
            (Queued, Fetching)
                | (Fetching, Classifying)
                | (Fetching, Failed)
                | (Classifying, Extracting)
                | (Classifying, Escalating)
                | (Classifying, Fingerprinting)
                | (Extracting, Fingerprinting)
                | (Escalating, Fingerprinting)
                | (Escalating, Failed)
                | (Fingerprinting, Recording)
                | (Recording, Done)
        )
    }

    /// String representation used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Classifying => "classifying",
            Self::Extracting => "extracting",
            Self::Escalating => "escalating",
            Self::Fingerprinting => "fingerprinting",
            Self::Recording => "recording",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns all stages
    pub fn all_stages() -> Vec<Self> {
        vec![
            Self::Queued,
            Self::Fetching,
            Self::Classifying,
            Self::Extracting,
            Self::Escalating,
            Self::Fingerprinting,
            Self::Recording,
            Self::Done,
            Self::Failed,
        ]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the stage of a single URL and rejects illegal transitions
#[derive(Debug, Clone)]
pub struct StageTracker {
    url: String,
    stage: Stage,
}

impl StageTracker {
    /// Starts tracking a freshly dequeued URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stage: Stage::Queued,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Moves to the next stage
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The transition is legal and was applied
    /// * `Err(CrawlError::InvalidTransition)` - The stage is left unchanged
    pub fn advance(&mut self, next: Stage) -> Result<(), CrawlError> {
        if !self.stage.can_advance_to(next) {
            return Err(CrawlError::InvalidTransition {
                url: self.url.clone(),
                from: self.stage,
                to: next,
            });
        }

        tracing::trace!("{}: {} -> {}", self.url, self.stage, next);
        self.stage = next;
        Ok(())
    }
}
