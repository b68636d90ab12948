//! Hexagonal ports for the external capabilities the core calls but does not implement.

use async_trait::async_trait;

use crate::{
    domain::{Account, AccountId, LanguageGuess, Message},
    Result,
};

/// Ranked language detection.
#[async_trait]
pub trait LanguageClassifier: Send + Sync {
    /// Returns guesses ordered best-first. Implementations must return at least one
    /// entry or an error.
    async fn detect(&self, text: &str) -> Result<Vec<LanguageGuess>>;
}

#[async_trait]
pub trait LinkShortener: Send + Sync {
    async fn shorten(&self, url: &str) -> Result<String>;
}

/// Filter parameters for a streaming connection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamParams {
    pub track: Option<String>,
    pub follow: Option<AccountId>,
}

#[derive(Clone, Debug)]
pub enum StreamEvent {
    Data(Message),
    /// Transport-level problem; the connection may or may not survive it.
    Error(String),
}

/// An open inbound connection.
#[async_trait]
pub trait InboundStream: Send {
    /// Next event, or `None` once the connection has closed.
    async fn next_event(&mut self) -> Option<StreamEvent>;

    /// Tear the connection down. Must be safe to call more than once.
    async fn destroy(&mut self);
}

#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn connect(&self, method: &str, params: &StreamParams)
        -> Result<Box<dyn InboundStream>>;
}

/// Outbound account actions plus credential verification.
#[async_trait]
pub trait SocialActions: Send + Sync {
    async fn verify_credentials(&self) -> Result<Account>;

    async fn post(&self, text: &str) -> Result<()>;
    async fn follow(&self, id: &str) -> Result<()>;

    /// Returns the screen name of the reported account.
    async fn report_spam(&self, id: &str) -> Result<String>;

    /// Returns the screen name of the blocked account.
    async fn block(&self, id: &str) -> Result<String>;
}
