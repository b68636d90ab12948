use chrono::{DateTime, Utc};

/// Numeric account id on the social network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AccountId(pub u64);

/// The account the bot is authenticated as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub screen_name: String,
}

/// One inbound message as delivered by the stream.
///
/// Immutable once received: the pipeline derives a `Decision` from it and never
/// rewrites it.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Originating id (`id_str` on the wire).
    pub id: String,
    pub author: String,
    pub text: String,
    /// Language tag the source reports for the author, e.g. `en`.
    pub lang: Option<String>,
    pub retweeted: bool,
    /// Whether the bot already follows the author.
    pub following: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(id: impl Into<String>, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            text: text.into(),
            lang: Some("en".to_string()),
            retweeted: false,
            following: false,
            created_at: None,
        }
    }
}

/// Ranked language guess returned by a classifier.
#[derive(Clone, Debug, PartialEq)]
pub struct LanguageGuess {
    pub language: String,
    pub confidence: f64,
}
