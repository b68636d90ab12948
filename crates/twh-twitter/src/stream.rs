//! Streaming endpoint: newline-delimited JSON over a long-lived POST.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use twh_core::{
    domain::Message,
    errors::Error,
    ports::{InboundStream, StreamEvent, StreamParams, StreamSource},
    Result,
};

use crate::{error_summary, TwitterClient};

const EVENT_BUFFER: usize = 256;
const MAX_PENDING_LINE: usize = 1 << 20;
/// Time allowed for the streaming endpoint to answer with headers.
const STREAM_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// `Wed Aug 27 13:08:45 +0000 2008`
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Deserialize)]
struct WireTweet {
    id_str: Option<String>,
    id: Option<u64>,
    text: Option<String>,
    #[serde(default)]
    retweeted: bool,
    created_at: Option<String>,
    user: Option<WireUser>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    screen_name: String,
    lang: Option<String>,
    following: Option<bool>,
}

/// Parse one stream line. `Ok(None)` for keep-alives and non-tweet notices
/// (deletes, limits, friends lists).
fn parse_line(line: &str) -> Result<Option<Message>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let tweet: WireTweet = serde_json::from_str(line)?;
    let (Some(text), Some(user)) = (tweet.text, tweet.user) else {
        return Ok(None);
    };
    let Some(id) = tweet.id_str.or_else(|| tweet.id.map(|n| n.to_string())) else {
        return Ok(None);
    };

    Ok(Some(Message {
        id,
        author: user.screen_name,
        text,
        lang: user.lang,
        retweeted: tweet.retweeted,
        following: user.following.unwrap_or(false),
        created_at: tweet.created_at.as_deref().and_then(parse_created_at),
    }))
}

fn parse_created_at(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, CREATED_AT_FORMAT)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Accumulates raw chunks and yields complete lines. Works on bytes so a
/// multi-byte character split across chunks is reassembled before decoding.
#[derive(Debug)]
struct LineBuffer {
    buf: Vec<u8>,
    limit: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING_LINE)
    }
}

impl LineBuffer {
    fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).trim().to_string());
        }
        lines
    }

    /// Drop an unterminated line that grew past the limit. Returns its length.
    fn discard_oversized(&mut self) -> Option<usize> {
        if self.buf.len() <= self.limit {
            return None;
        }
        let len = self.buf.len();
        self.buf.clear();
        Some(len)
    }
}

async fn pump(resp: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    let mut bytes = resp.bytes_stream();
    let mut lines = LineBuffer::default();

    while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                return;
            }
        };

        for line in lines.push(&chunk) {
            match parse_line(&line) {
                Ok(Some(msg)) => {
                    if tx.send(StreamEvent::Data(msg)).await.is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping unparseable stream line: {e}"),
            }
        }

        if let Some(len) = lines.discard_oversized() {
            warn!(len, "Dropping oversized stream line");
            let reason = format!("stream line exceeded {MAX_PENDING_LINE} bytes without a newline");
            if tx.send(StreamEvent::Error(reason)).await.is_err() {
                return;
            }
        }
    }

    debug!("Stream body ended");
}

/// Handle to one open streaming connection. Dropping it closes the connection.
pub struct TwitterStream {
    rx: mpsc::Receiver<StreamEvent>,
    reader: Option<JoinHandle<()>>,
}

impl TwitterStream {
    fn spawn(resp: reqwest::Response) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let reader = tokio::spawn(pump(resp, tx));
        Self {
            rx,
            reader: Some(reader),
        }
    }
}

#[async_trait]
impl InboundStream for TwitterStream {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    async fn destroy(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.rx.close();
    }
}

impl Drop for TwitterStream {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

#[async_trait]
impl StreamSource for TwitterClient {
    async fn connect(
        &self,
        method: &str,
        params: &StreamParams,
    ) -> Result<Box<dyn InboundStream>> {
        let url = format!("{}/{}.json", self.stream_base, method.trim_matches('/'));

        let mut form: Vec<(&str, String)> = Vec::new();
        if let Some(track) = params.track.as_deref().filter(|t| !t.is_empty()) {
            form.push(("track", track.to_string()));
        }
        if let Some(follow) = params.follow {
            form.push(("follow", follow.0.to_string()));
        }

        info!(url = %url, "Connecting to streaming API");

        let send = self
            .stream_http
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .form(&form)
            .send();
        let resp = tokio::time::timeout(STREAM_RESPONSE_TIMEOUT, send)
            .await
            .map_err(|_| {
                Error::StreamTransport(format!(
                    "no response within {}s",
                    STREAM_RESPONSE_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| Error::StreamTransport(format!("connect error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::StreamTransport(error_summary(status, &body)));
        }

        Ok(Box::new(TwitterStream::spawn(resp)))
    }
}
