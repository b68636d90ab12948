//! Inbound stream lifecycle + outbound actions.
//!
//! One task drains the inbound stream and runs each message through admission and
//! every keep side effect before it reads the next one.

use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    domain::{Account, Message},
    errors::Error,
    events::{ErrorEvent, Event, Publisher},
    formatting::format_kept,
    pipeline::{attach_short_link, AdmissionPipeline, FilterConfig},
    ports::{
        InboundStream, LanguageClassifier, LinkShortener, SocialActions, StreamEvent,
        StreamParams, StreamSource,
    },
    store::{self, ConfigStore, KEY_RECENT_TWEETS},
    Result,
};

/// External collaborators the supervisor drives.
#[derive(Clone)]
pub struct Capabilities {
    pub source: Arc<dyn StreamSource>,
    pub actions: Arc<dyn SocialActions>,
    pub publisher: Arc<dyn Publisher>,
    pub store: Arc<dyn ConfigStore>,
    pub classifier: Option<Arc<dyn LanguageClassifier>>,
    pub shortener: Option<Arc<dyn LinkShortener>>,
}

/// Verify credentials before anything else runs.
///
/// A failure is published as `error::twitterCreds` and returned as
/// `Error::Credential`; the caller must not go on to stream.
pub async fn verify_credentials(
    actions: &dyn SocialActions,
    publisher: &dyn Publisher,
) -> Result<Account> {
    match actions.verify_credentials().await {
        Ok(account) => {
            tracing::info!(screen_name = %account.screen_name, id = account.id.0, "credentials accepted");
            publisher.publish(Event::Verified(
                "Twitter Credentials Accepted!".to_string(),
            ));
            Ok(account)
        }
        Err(e) => {
            let reason = match e {
                Error::Credential(s) => s,
                other => other.to_string(),
            };
            publisher.publish(Event::error(ErrorEvent::TwitterCreds, reason.clone()));
            Err(Error::Credential(reason))
        }
    }
}

#[derive(Clone)]
pub struct StreamSupervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    cfg: Arc<Config>,
    account: Account,
    params: StreamParams,
    caps: Capabilities,
    pipeline: tokio::sync::Mutex<AdmissionPipeline>,
    state: tokio::sync::Mutex<StreamState>,
}

#[derive(Default)]
struct StreamState {
    active: Option<ActiveStream>,
    /// Set while a connect is in flight; cancelling it abandons the attempt.
    connecting: Option<CancellationToken>,
}

struct ActiveStream {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActiveStream {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl StreamSupervisor {
    /// Build the supervisor for a verified account.
    ///
    /// History is seeded from the store's `recentTweets`; the stream filters on the
    /// store's `track` and follows the bot's own account id.
    pub fn new(cfg: Arc<Config>, account: Account, caps: Capabilities) -> Self {
        let saved = store::recent_tweets(caps.store.as_ref());
        let pipeline =
            AdmissionPipeline::new(FilterConfig::new(&cfg, &account), caps.classifier.clone())
                .with_history(saved);
        tracing::info!(
            restored = pipeline.history().len(),
            capacity = pipeline.history().capacity(),
            "recent history loaded"
        );

        let params = StreamParams {
            track: store::track(caps.store.as_ref()),
            follow: Some(account.id),
        };

        Self {
            inner: Arc::new(SupervisorInner {
                cfg,
                account,
                params,
                caps,
                pipeline: tokio::sync::Mutex::new(pipeline),
                state: tokio::sync::Mutex::new(StreamState::default()),
            }),
        }
    }

    pub fn account(&self) -> &Account {
        &self.inner.account
    }

    pub async fn is_active(&self) -> bool {
        self.inner
            .state
            .lock()
            .await
            .active
            .as_ref()
            .is_some_and(ActiveStream::is_live)
    }

    /// Connect and start draining the stream.
    ///
    /// Returns `Ok(false)` (and publishes `error::duplicateStream`) if a stream is
    /// already active or connecting, and `Ok(false)` if `stop` abandoned the attempt.
    /// The connect runs outside the state lock and is bounded by the capability
    /// timeout.
    pub async fn start(&self) -> Result<bool> {
        let attempt = CancellationToken::new();
        {
            let mut st = self.inner.state.lock().await;
            let busy =
                st.connecting.is_some() || st.active.as_ref().is_some_and(ActiveStream::is_live);
            if busy {
                tracing::warn!("start requested while a stream is already active");
                self.publish(Event::error(
                    ErrorEvent::DuplicateStream,
                    Error::DuplicateStream.to_string(),
                ));
                return Ok(false);
            }
            st.connecting = Some(attempt.clone());
        }

        self.publish(Event::Connecting);
        tracing::info!(method = %self.inner.cfg.stream_method, "attempting connection to stream API");

        let limit = self.inner.cfg.capability_timeout;
        let connect = self
            .inner
            .caps
            .source
            .connect(&self.inner.cfg.stream_method, &self.inner.params);
        let outcome = tokio::select! {
            _ = attempt.cancelled() => None,
            res = tokio::time::timeout(limit, connect) => Some(res),
        };

        let mut st = self.inner.state.lock().await;
        // A cancelled attempt no longer owns `connecting`; `stop` already took it.
        if attempt.is_cancelled() {
            drop(st);
            if let Some(Ok(Ok(mut stream))) = outcome {
                stream.destroy().await;
            }
            tracing::info!("connection attempt abandoned");
            return Ok(false);
        }
        st.connecting = None;

        let connected = match outcome {
            Some(Ok(res)) => res,
            Some(Err(_)) => Err(Error::StreamTransport(format!(
                "connect timed out after {}ms",
                limit.as_millis()
            ))),
            None => Err(Error::StreamTransport("connect abandoned".to_string())),
        };
        let stream = match connected {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "stream connection failed");
                self.publish(Event::error(ErrorEvent::Stream, e.to_string()));
                return Err(match e {
                    Error::StreamTransport(s) => Error::StreamTransport(s),
                    other => Error::StreamTransport(other.to_string()),
                });
            }
        };

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let supervisor = self.clone();
        let handle = tokio::spawn(async move {
            supervisor.drain(stream, token).await;
        });
        st.active = Some(ActiveStream { cancel, handle });

        tracing::info!("streaming connection established");
        self.publish(Event::StreamConnected);
        Ok(true)
    }

    /// Tear down the active stream (or abandon a pending connect) and wait for the
    /// drain task to finish.
    ///
    /// Returns `Ok(false)` (and publishes `error::streamInactive`) if nothing was
    /// streaming.
    pub async fn stop(&self) -> Result<bool> {
        let (active, connecting) = {
            let mut st = self.inner.state.lock().await;
            (st.active.take(), st.connecting.take())
        };

        if let Some(attempt) = connecting {
            tracing::info!("abandoning pending stream connection");
            attempt.cancel();
            self.publish(Event::StreamDestroyed);
            return Ok(true);
        }

        let Some(active) = active.filter(ActiveStream::is_live) else {
            tracing::warn!("stop requested with no active stream");
            self.publish(Event::error(ErrorEvent::StreamInactive, "No active stream."));
            return Ok(false);
        };

        self.publish(Event::StreamDestroyed);
        tracing::info!("ending streaming connection");
        active.cancel.cancel();
        active
            .handle
            .await
            .map_err(|e| Error::External(format!("stream task failed: {e}")))?;
        Ok(true)
    }

    /// Stop (if streaming) and connect again.
    pub async fn restart(&self) -> Result<bool> {
        if self.is_active().await {
            self.stop().await?;
        }
        self.start().await
    }

    async fn drain(&self, mut stream: Box<dyn InboundStream>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                ev = stream.next_event() => match ev {
                    Some(StreamEvent::Data(msg)) => {
                        self.handle_message(msg).await;
                    }
                    Some(StreamEvent::Error(e)) => {
                        tracing::warn!(error = %e, "stream transport error");
                        self.publish(Event::error(ErrorEvent::Stream, e));
                    }
                    None => {
                        tracing::info!("stream closed by remote");
                        break;
                    }
                }
            }
        }
        stream.destroy().await;
    }

    /// Admit one message and run every keep side effect.
    ///
    /// Returns the published `keptTweet` line, or `None` if the message was discarded.
    pub async fn handle_message(&self, msg: Message) -> Option<String> {
        let (decision, snapshot) = {
            let mut pipeline = self.inner.pipeline.lock().await;
            let decision = pipeline.admit(&msg).await;
            if !decision.is_keep() {
                return None;
            }
            (decision, pipeline.history().snapshot())
        };
        self.inner.caps.store.set(KEY_RECENT_TWEETS, json!(snapshot));

        let (message, text) = decision.kept()?;
        let text = attach_short_link(
            self.inner.caps.shortener.as_deref(),
            self.inner.cfg.capability_timeout,
            message,
            text,
        )
        .await;

        let line = format_kept(&message.author, &text);
        self.publish(Event::KeptTweet(line.clone()));

        if self.inner.cfg.auto_follow
            && !message.following
            && message.author != self.inner.account.screen_name
        {
            self.auto_follow(&message.author).await;
        }

        Some(line)
    }

    /// Follow `author` within the capability timeout. Failures are published by
    /// `follow`; a timeout is published here. Neither affects admission.
    async fn auto_follow(&self, author: &str) {
        let limit = self.inner.cfg.capability_timeout;
        if tokio::time::timeout(limit, self.follow(author)).await.is_err() {
            tracing::warn!(author, "auto-follow timed out");
            self.publish(Event::error(
                ErrorEvent::Follow,
                format!("follow {author} timed out after {}ms", limit.as_millis()),
            ));
        }
    }

    pub async fn send_tweet(&self, text: &str) -> Result<()> {
        match self.inner.caps.actions.post(text).await {
            Ok(()) => {
                tracing::info!(text, "tweeted");
                self.publish(Event::Tweeted(text.to_string()));
                Ok(())
            }
            Err(e) => {
                self.publish(Event::error(ErrorEvent::SendTweet, e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn follow(&self, id: &str) -> Result<()> {
        match self.inner.caps.actions.follow(id).await {
            Ok(()) => {
                tracing::info!(id, "now following");
                self.publish(Event::Following(id.to_string()));
                Ok(())
            }
            Err(e) => {
                self.publish(Event::error(ErrorEvent::Follow, e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn report_spam(&self, id: &str, to: Option<&str>) -> Result<String> {
        match self.inner.caps.actions.report_spam(id).await {
            Ok(name) => {
                tracing::info!(name = %name, "reported as a spammer");
                self.publish(Event::Reported {
                    name: name.clone(),
                    to: to.map(str::to_string),
                });
                Ok(name)
            }
            Err(e) => {
                self.publish(Event::error(ErrorEvent::ReportSpam, e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn block(&self, id: &str, to: Option<&str>) -> Result<String> {
        match self.inner.caps.actions.block(id).await {
            Ok(name) => {
                tracing::info!(name = %name, "blocked");
                self.publish(Event::Blocked {
                    name: name.clone(),
                    to: to.map(str::to_string),
                });
                Ok(name)
            }
            Err(e) => {
                self.publish(Event::error(ErrorEvent::Block, e.to_string()));
                Err(e)
            }
        }
    }

    /// Persist the config store, including the current history window.
    pub async fn save(&self) -> Result<()> {
        let snapshot = self.dump().await;
        self.inner.caps.store.set(KEY_RECENT_TWEETS, json!(snapshot));
        match self.inner.caps.store.save() {
            Ok(()) => {
                self.publish(Event::Saved);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "saving configuration failed");
                self.publish(Event::error(ErrorEvent::Save, e.to_string()));
                Err(e)
            }
        }
    }

    /// Current history window, oldest-first.
    pub async fn dump(&self) -> Vec<String> {
        self.inner.pipeline.lock().await.history().snapshot()
    }

    fn publish(&self, event: Event) {
        self.inner.caps.publisher.publish(event);
    }
}
