//! Message admission: decides per inbound message whether to keep or discard it.
//!
//! Stages run strictly in order and the first terminal outcome wins:
//! 1. validity (empty text, retweet marker, retweeted flag, non-English source)
//! 2. self-reply shortcut (the bot's own screen name skips everything below)
//! 3. language heuristic (signal only, never discards)
//! 4. near-duplicate check against the recent history window

use std::{future::Future, sync::Arc, sync::OnceLock, time::Duration};

use regex::Regex;

use crate::{
    config::Config,
    domain::{Account, Message},
    errors::Error,
    formatting::{annotate_with_link, status_url},
    history::RecentHistory,
    ports::{LanguageClassifier, LinkShortener},
    utils::truncate_text,
    Result,
};

const DOUBTFUL_CONFIDENCE: f64 = 0.25;
const SHORT_TEXT_CHARS: usize = 50;
const ACCEPTED_LANGUAGES: [&str; 2] = ["english", "pidgin"];

/// Filter settings, fixed for the lifetime of a pipeline.
#[derive(Clone, Debug)]
pub struct FilterConfig {
    /// Edit distances strictly below this mark a near-duplicate.
    pub distance_threshold: usize,
    pub history_capacity: usize,
    pub self_screen_name: String,
    pub capability_timeout: Duration,
}

impl FilterConfig {
    pub fn new(cfg: &Config, account: &Account) -> Self {
        Self {
            distance_threshold: cfg.distance_threshold,
            history_capacity: cfg.history_capacity,
            self_screen_name: account.screen_name.clone(),
            capability_timeout: cfg.capability_timeout,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscardReason {
    Invalid,
    NearDuplicate,
}

impl DiscardReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscardReason::Invalid => "invalid",
            DiscardReason::NearDuplicate => "nearDuplicate",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    Discard(DiscardReason),
    /// Reply by the bot's own account; dedup was skipped.
    KeepDirect(Message),
    Keep { message: Message, text: String },
}

impl Decision {
    pub fn is_keep(&self) -> bool {
        !matches!(self, Decision::Discard(_))
    }

    /// The kept message and its (not yet annotated) text.
    pub fn kept(&self) -> Option<(&Message, &str)> {
        match self {
            Decision::Discard(_) => None,
            Decision::KeepDirect(m) => Some((m, m.text.as_str())),
            Decision::Keep { message, text } => Some((message, text.as_str())),
        }
    }
}

/// Outcome of the language heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LanguageSignal {
    Plausible,
    /// Top guess is a foreign language with low confidence on a short text.
    Doubtful,
    Unavailable,
}

pub struct AdmissionPipeline {
    cfg: FilterConfig,
    history: RecentHistory,
    classifier: Option<Arc<dyn LanguageClassifier>>,
}

impl AdmissionPipeline {
    pub fn new(cfg: FilterConfig, classifier: Option<Arc<dyn LanguageClassifier>>) -> Self {
        let history = RecentHistory::new(cfg.history_capacity);
        Self {
            cfg,
            history,
            classifier,
        }
    }

    /// Start from persisted history (oldest-first).
    pub fn with_history(mut self, entries: impl IntoIterator<Item = String>) -> Self {
        self.history = RecentHistory::restore(self.cfg.history_capacity, entries);
        self
    }

    pub fn history(&self) -> &RecentHistory {
        &self.history
    }

    /// Run the stage chain. Does not touch the history.
    pub async fn evaluate(&self, msg: &Message) -> Decision {
        if !is_valid(msg) {
            tracing::debug!(author = %msg.author, "discarding invalid message");
            return Decision::Discard(DiscardReason::Invalid);
        }

        if msg.author == self.cfg.self_screen_name {
            tracing::info!(author = %msg.author, text = %msg.text, "tweet kept directly");
            return Decision::KeepDirect(msg.clone());
        }

        // Errs on the side of keeping English tweets: the signal is logged, not acted on.
        let signal = self.language_signal(&msg.text).await;
        if signal == LanguageSignal::Doubtful {
            tracing::debug!(author = %msg.author, "language heuristic is doubtful; keeping anyway");
        }

        if self.is_near_duplicate(msg) {
            tracing::info!(author = %msg.author, text = %msg.text, "tweet declared garbage");
            return Decision::Discard(DiscardReason::NearDuplicate);
        }

        Decision::Keep {
            message: msg.clone(),
            text: msg.text.clone(),
        }
    }

    /// Record a kept decision's text. Returns the recorded text, or `None` for discards.
    pub fn commit(&mut self, decision: &Decision) -> Option<String> {
        let (_, text) = decision.kept()?;
        self.history.record(text);
        Some(text.to_string())
    }

    /// `evaluate` followed by `commit`, as one read-modify cycle.
    pub async fn admit(&mut self, msg: &Message) -> Decision {
        let decision = self.evaluate(msg).await;
        self.commit(&decision);
        decision
    }

    pub async fn language_signal(&self, text: &str) -> LanguageSignal {
        let Some(classifier) = &self.classifier else {
            return LanguageSignal::Unavailable;
        };

        let guesses =
            match call_capability(self.cfg.capability_timeout, "language classifier", async {
                classifier.detect(text).await
            })
            .await
            {
                Ok(g) => g,
                Err(e) => {
                    tracing::debug!(error = %e, "language classifier unavailable");
                    return LanguageSignal::Unavailable;
                }
            };

        let Some(top) = guesses.first() else {
            return LanguageSignal::Unavailable;
        };

        let foreign = !ACCEPTED_LANGUAGES.contains(&top.language.as_str());
        if foreign
            && top.confidence < DOUBTFUL_CONFIDENCE
            && text.chars().count() < SHORT_TEXT_CHARS
        {
            LanguageSignal::Doubtful
        } else {
            LanguageSignal::Plausible
        }
    }

    /// Compares against every entry; each match is logged.
    fn is_near_duplicate(&self, msg: &Message) -> bool {
        let mut garbage = false;
        for (idx, recent) in self.history.as_slice().iter().enumerate() {
            let distance = levenshtein::levenshtein(&msg.text, recent);
            if distance < self.cfg.distance_threshold {
                tracing::debug!(
                    idx,
                    distance,
                    recent = %truncate_text(recent, 80),
                    "near-duplicate of recent tweet"
                );
                garbage = true;
            }
        }
        garbage
    }
}

fn retweet_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bRT\b:?").expect("valid regex"))
}

/// Hard validity rules; anything failing these is never kept.
pub fn is_valid(msg: &Message) -> bool {
    if msg.text.is_empty() || msg.retweeted {
        return false;
    }
    if retweet_marker().is_match(&msg.text) {
        return false;
    }
    msg.lang.as_deref() == Some("en")
}

/// Run an external capability call under `limit`.
///
/// Every failure, including the timeout, comes back as `Error::CapabilityUnavailable`.
pub async fn call_capability<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(Error::CapabilityUnavailable(reason))) => Err(Error::CapabilityUnavailable(reason)),
        Ok(Err(e)) => Err(Error::CapabilityUnavailable(format!("{what}: {e}"))),
        Err(_) => Err(Error::CapabilityUnavailable(format!(
            "{what} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Append a short link to the kept text when a shortener is available.
///
/// Any shortener failure leaves the text unannotated.
pub async fn attach_short_link(
    shortener: Option<&dyn LinkShortener>,
    limit: Duration,
    msg: &Message,
    text: &str,
) -> String {
    let Some(shortener) = shortener else {
        return text.to_string();
    };

    let long_url = status_url(&msg.author, &msg.id);
    match call_capability(limit, "link shortener", shortener.shorten(&long_url)).await {
        Ok(short) if !short.trim().is_empty() => annotate_with_link(text, short.trim()),
        Ok(_) => text.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "short link unavailable; keeping text unannotated");
            text.to_string()
        }
    }
}
