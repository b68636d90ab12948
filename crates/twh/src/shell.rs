//! Interactive control loop and event output.

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};

use twh_core::{
    commands::{dispatch, parse_command},
    events::Event,
    supervisor::StreamSupervisor,
};

const PROMPT_HINT: &str =
    "Commands: tweet <text>, follow <id>, report <id>, block <id>, save, dump, stop, restart, exit";

/// Read commands from stdin until `exit` or EOF.
pub async fn run(sup: &StreamSupervisor) -> anyhow::Result<()> {
    println!("{PROMPT_HINT}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("stdin closed");
                    return Ok(());
                };
                let outcome = dispatch(sup, parse_command(&line)).await;
                if let Some(reply) = outcome.reply {
                    println!("{reply}");
                }
                if outcome.exit {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                return Ok(());
            }
        }
    }
}

/// Headless mode: stream until interrupted.
pub async fn wait_for_shutdown(sup: &StreamSupervisor) -> anyhow::Result<()> {
    tracing::info!(screen_name = %sup.account().screen_name, "running headless; Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// Print every published event: kept tweets to stdout, the rest as log lines.
pub async fn print_events(mut rx: broadcast::Receiver<Event>) {
    loop {
        match rx.recv().await {
            Ok(event) => print_event(&event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("event printer lagged; {n} events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn print_event(event: &Event) {
    match event {
        Event::KeptTweet(text) => println!("{text}"),
        Event::Verified(msg) => tracing::info!("{msg}"),
        Event::Tweeted(text) => tracing::info!("tweeted: {text}"),
        Event::Following(id) => tracing::info!("now following {id}"),
        Event::Reported { name, to } => {
            tracing::info!(to = to.as_deref().unwrap_or("-"), "{name} reported as spam")
        }
        Event::Blocked { name, to } => {
            tracing::info!(to = to.as_deref().unwrap_or("-"), "{name} blocked")
        }
        Event::Error { message, .. } => tracing::warn!(event = %event.name(), "{message}"),
        other => tracing::info!(event = %other.name(), "stream lifecycle"),
    }
}
