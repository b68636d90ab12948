use std::sync::Arc;

use twh_bitly::BitlyClient;
use twh_core::{
    config::Config,
    events::{BroadcastPublisher, ErrorEvent, Event, Publisher},
    ports::{LinkShortener, SocialActions},
    store::{self, BitlyAuth, ConfigStore, JsonFileStore, TwitterAuth},
    supervisor::{self, Capabilities, StreamSupervisor},
};
use twh_twitter::TwitterClient;

mod shell;

#[tokio::main]
async fn main() -> Result<(), twh_core::Error> {
    twh_core::logging::init("twh")?;

    let cfg = Arc::new(Config::load()?);
    let file_store = JsonFileStore::open(&cfg.store_path)?;
    tracing::info!(path = %file_store.path().display(), "configuration store opened");
    let store: Arc<dyn ConfigStore> = Arc::new(file_store);

    let broadcast = BroadcastPublisher::default();
    let printer = tokio::spawn(shell::print_events(broadcast.subscribe()));
    let publisher: Arc<dyn Publisher> = Arc::new(broadcast);

    let Some(twitter_auth) = store::get_typed::<TwitterAuth>(store.as_ref(), store::KEY_TWITTER_AUTH)
    else {
        let reason = format!(
            "no `{}` entry in {}",
            store::KEY_TWITTER_AUTH,
            cfg.store_path.display()
        );
        publisher.publish(Event::error(ErrorEvent::TwitterCreds, reason.clone()));
        return Err(twh_core::Error::Credential(reason));
    };
    let twitter = Arc::new(TwitterClient::new(twitter_auth, &cfg)?);

    let shortener = build_shortener(&cfg, store.as_ref(), publisher.as_ref());

    let account = supervisor::verify_credentials(twitter.as_ref(), publisher.as_ref()).await?;

    let sup = StreamSupervisor::new(
        cfg.clone(),
        account,
        Capabilities {
            source: twitter.clone(),
            actions: twitter as Arc<dyn SocialActions>,
            publisher,
            store,
            classifier: None,
            shortener,
        },
    );

    sup.start().await?;

    let result = if cfg.use_shell {
        shell::run(&sup).await
    } else {
        shell::wait_for_shutdown(&sup).await
    };

    if sup.is_active().await {
        let _ = sup.stop().await;
    }
    if let Err(e) = sup.save().await {
        tracing::warn!("final save failed: {e}");
    }
    printer.abort();

    result.map_err(|e| twh_core::Error::External(format!("twh failed: {e}")))
}

/// Short links are optional: without bit.ly credentials kept tweets go out bare.
fn build_shortener(
    cfg: &Config,
    store: &dyn ConfigStore,
    publisher: &dyn Publisher,
) -> Option<Arc<dyn LinkShortener>> {
    let Some(auth) = store::get_typed::<BitlyAuth>(store, store::KEY_BITLY_AUTH) else {
        publisher.publish(Event::error(
            ErrorEvent::BitlyCreds,
            format!("no `{}` entry; links will not be shortened", store::KEY_BITLY_AUTH),
        ));
        return None;
    };

    match BitlyClient::new(auth, cfg.bitly_base.clone(), cfg.capability_timeout) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            publisher.publish(Event::error(ErrorEvent::BitlyCreds, e.to_string()));
            None
        }
    }
}
