/// Core error type for the bot.
///
/// Adapter crates should map their specific errors into this type so the core can
/// tell fatal startup failures apart from degradable capability failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credential verification failed; the process must not start streaming.
    #[error("credential error: {0}")]
    Credential(String),

    /// Classifier / shortener missing, failing or timed out for this call.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("stream already active")]
    DuplicateStream,

    #[error("stream transport error: {0}")]
    StreamTransport(String),

    /// A post/follow/report/block call failed.
    #[error("{action} failed: {reason}")]
    Action {
        action: &'static str,
        reason: String,
    },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn action(action: &'static str, reason: impl Into<String>) -> Self {
        Error::Action {
            action,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
