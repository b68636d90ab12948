//! Twitter adapter (REST v1.1 + streaming).
//!
//! This crate implements the `twh-core` stream and social-action ports over plain
//! HTTP with an app bearer token.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use twh_core::{
    config::Config,
    domain::{Account, AccountId},
    errors::Error,
    ports::SocialActions,
    store::TwitterAuth,
    Result,
};

pub mod stream;

pub use stream::TwitterStream;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct TwitterClient {
    bearer_token: String,
    api_base: String,
    stream_base: String,
    http: reqwest::Client,
    /// No overall timeout: streaming responses stay open. `connect` bounds the wait for headers.
    stream_http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WireAccount {
    id: u64,
    screen_name: String,
}

#[derive(Debug, Deserialize)]
struct WireUserRef {
    screen_name: String,
}

impl TwitterClient {
    pub fn new(auth: TwitterAuth, cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::External(format!("twitter client build failed: {e}")))?;
        let stream_http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::External(format!("twitter client build failed: {e}")))?;

        Ok(Self {
            bearer_token: auth.bearer_token,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            stream_base: cfg.stream_base.trim_end_matches('/').to_string(),
            http,
            stream_http,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{path}.json", self.api_base)
    }

    /// POST a form to a REST endpoint and decode the JSON body.
    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        action: &'static str,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T> {
        let resp = self
            .http
            .post(self.api_url(path))
            .bearer_auth(&self.bearer_token)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::action(action, format!("request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::action(action, error_summary(status, &body)));
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::action(action, format!("json error: {e}")))
    }
}

#[async_trait]
impl SocialActions for TwitterClient {
    async fn verify_credentials(&self) -> Result<Account> {
        let resp = self
            .http
            .get(self.api_url("account/verify_credentials"))
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| Error::Credential(format!("verify request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Credential(error_summary(status, &body)));
        }

        let acct: WireAccount = resp
            .json()
            .await
            .map_err(|e| Error::Credential(format!("verify json error: {e}")))?;

        Ok(Account {
            id: AccountId(acct.id),
            screen_name: acct.screen_name,
        })
    }

    async fn post(&self, text: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_form("post", "statuses/update", &[("status", text)])
            .await?;
        Ok(())
    }

    async fn follow(&self, id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_form("follow", "friendships/create", &[user_param(id)])
            .await?;
        Ok(())
    }

    async fn report_spam(&self, id: &str) -> Result<String> {
        let user: WireUserRef = self
            .post_form("report", "users/report_spam", &[user_param(id)])
            .await?;
        Ok(user.screen_name)
    }

    async fn block(&self, id: &str) -> Result<String> {
        let user: WireUserRef = self
            .post_form("block", "blocks/create", &[user_param(id)])
            .await?;
        Ok(user.screen_name)
    }
}

/// Numeric ids go out as `user_id`, anything else as `screen_name`.
fn user_param(id: &str) -> (&'static str, &str) {
    let id = id.trim_start_matches('@');
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        ("user_id", id)
    } else {
        ("screen_name", id)
    }
}

/// Prefer the API's own error message over the raw body.
fn error_summary(status: reqwest::StatusCode, body: &str) -> String {
    let msg = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("errors")
                .and_then(|e| e.get(0))
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect());
    format!("{status} {msg}").trim().to_string()
}
