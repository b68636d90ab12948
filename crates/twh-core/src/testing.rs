//! Fakes for every port, shared by the in-crate tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    config::Config,
    domain::{Account, AccountId, Message},
    errors::Error,
    events::{Event, Publisher},
    ports::{
        InboundStream, LinkShortener, SocialActions, StreamEvent, StreamParams, StreamSource,
    },
    store::ConfigStore,
    supervisor::{Capabilities, StreamSupervisor},
    Result,
};

pub(crate) struct FakeStream {
    pub(crate) rx: mpsc::UnboundedReceiver<StreamEvent>,
    pub(crate) destroyed: Arc<AtomicUsize>,
}

#[async_trait]
impl InboundStream for FakeStream {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    async fn destroy(&mut self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct FakeSource {
    pub(crate) fail: bool,
    /// Accept the request but never answer it.
    pub(crate) hang: bool,
    pub(crate) connects: AtomicUsize,
    pub(crate) destroyed: Arc<AtomicUsize>,
    pub(crate) senders: Mutex<Vec<mpsc::UnboundedSender<StreamEvent>>>,
    pub(crate) last_params: Mutex<Option<(String, StreamParams)>>,
}

impl FakeSource {
    pub(crate) fn push(&self, ev: StreamEvent) {
        let senders = self.senders.lock().unwrap();
        senders.last().unwrap().send(ev).unwrap();
    }

    pub(crate) fn close_latest(&self) {
        self.senders.lock().unwrap().pop();
    }
}

#[async_trait]
impl StreamSource for FakeSource {
    async fn connect(
        &self,
        method: &str,
        params: &StreamParams,
    ) -> Result<Box<dyn InboundStream>> {
        if self.fail {
            return Err(Error::External("connection refused".to_string()));
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some((method.to_string(), params.clone()));
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(tx);
        Ok(Box::new(FakeStream {
            rx,
            destroyed: self.destroyed.clone(),
        }))
    }
}

#[derive(Default)]
pub(crate) struct FakeActions {
    pub(crate) fail: AtomicBool,
    pub(crate) hang: AtomicBool,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl FakeActions {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::action("action", "rate limited"));
        }
        Ok(())
    }
}

#[async_trait]
impl SocialActions for FakeActions {
    async fn verify_credentials(&self) -> Result<Account> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::External("401 unauthorized".to_string()));
        }
        Ok(bot_account())
    }

    async fn post(&self, text: &str) -> Result<()> {
        self.record(format!("post:{text}"))
    }

    async fn follow(&self, id: &str) -> Result<()> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.record(format!("follow:{id}"))
    }

    async fn report_spam(&self, id: &str) -> Result<String> {
        self.record(format!("report:{id}"))?;
        Ok(format!("name-{id}"))
    }

    async fn block(&self, id: &str) -> Result<String> {
        self.record(format!("block:{id}"))?;
        Ok(format!("name-{id}"))
    }
}

#[derive(Default)]
pub(crate) struct FakePublisher {
    pub(crate) events: Mutex<Vec<Event>>,
}

impl FakePublisher {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.events().iter().map(Event::name).collect()
    }

    pub(crate) fn kept(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::KeptTweet(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

impl Publisher for FakePublisher {
    fn publish(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    pub(crate) values: Mutex<HashMap<String, Value>>,
    pub(crate) fail_save: bool,
    pub(crate) saves: AtomicUsize,
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.values.lock().unwrap().insert(key.to_string(), value);
    }

    fn save(&self) -> Result<()> {
        if self.fail_save {
            return Err(Error::Io(std::io::Error::other("disk full")));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct FakeShortener {
    pub(crate) fail: bool,
}

#[async_trait]
impl LinkShortener for FakeShortener {
    async fn shorten(&self, url: &str) -> Result<String> {
        if self.fail {
            return Err(Error::External("INVALID_LOGIN".to_string()));
        }
        assert!(url.starts_with("http://twitter.com/#!/"));
        Ok("http://bit.ly/xyz".to_string())
    }
}

pub(crate) fn bot_account() -> Account {
    Account {
        id: AccountId(7),
        screen_name: "thebot".to_string(),
    }
}

pub(crate) struct Harness {
    pub(crate) sup: StreamSupervisor,
    pub(crate) source: Arc<FakeSource>,
    pub(crate) actions: Arc<FakeActions>,
    pub(crate) publisher: Arc<FakePublisher>,
    pub(crate) store: Arc<MemoryStore>,
}

pub(crate) fn harness_with(
    cfg: Config,
    store: MemoryStore,
    shortener: Option<Arc<dyn LinkShortener>>,
) -> Harness {
    let source = Arc::new(FakeSource::default());
    let actions = Arc::new(FakeActions::default());
    let publisher = Arc::new(FakePublisher::default());
    let store = Arc::new(store);
    let caps = Capabilities {
        source: source.clone(),
        actions: actions.clone(),
        publisher: publisher.clone(),
        store: store.clone(),
        classifier: None,
        shortener,
    };
    let sup = StreamSupervisor::new(Arc::new(cfg), bot_account(), caps);
    Harness {
        sup,
        source,
        actions,
        publisher,
        store,
    }
}

pub(crate) fn test_config() -> Config {
    Config {
        capability_timeout: Duration::from_millis(50),
        ..Config::default()
    }
}

pub(crate) fn harness() -> Harness {
    harness_with(test_config(), MemoryStore::default(), None)
}

pub(crate) fn msg(author: &str, text: &str) -> Message {
    Message::new("99", author, text)
}

pub(crate) async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

