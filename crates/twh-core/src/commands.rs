//! Line-oriented control surface (`tweet …`, `follow …`, `stop`, `save`, …).

use crate::supervisor::StreamSupervisor;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Tweet(String),
    Follow(String),
    Report(String),
    Block(String),
    Save,
    Dump,
    Stop,
    Restart,
    Exit,
    Empty,
    Unknown(String),
}

/// Result of dispatching one command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub reply: Option<String>,
    pub exit: bool,
}

impl Outcome {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            exit: false,
        }
    }

    fn silent() -> Self {
        Self {
            reply: None,
            exit: false,
        }
    }
}

pub fn parse_command(line: &str) -> Command {
    let mut parts = line.trim().splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("").to_lowercase();
    let rest = parts.next().unwrap_or("").trim().to_string();
    let first_arg = rest.split_whitespace().next().unwrap_or("").to_string();

    match name.as_str() {
        "" => Command::Empty,
        "tweet" => Command::Tweet(rest),
        "follow" => Command::Follow(first_arg),
        "report" => Command::Report(first_arg),
        "block" => Command::Block(first_arg),
        "save" => Command::Save,
        "dump" => Command::Dump,
        "stop" => Command::Stop,
        "restart" | "start" => Command::Restart,
        "exit" | "quit" => Command::Exit,
        other => Command::Unknown(other.to_string()),
    }
}

/// Run one command against the supervisor.
///
/// Action failures are already published as events by the supervisor; here they
/// only shape the reply text.
pub async fn dispatch(sup: &StreamSupervisor, cmd: Command) -> Outcome {
    match cmd {
        Command::Empty => Outcome::silent(),

        Command::Tweet(text) if text.is_empty() => Outcome::reply("Usage: tweet <text>"),
        Command::Tweet(text) => match sup.send_tweet(&text).await {
            Ok(()) => Outcome::reply(format!("Tweeted: {text}")),
            Err(e) => Outcome::reply(format!("Tweet failed: {e}")),
        },

        Command::Follow(id) if id.is_empty() => Outcome::reply("Usage: follow <id>"),
        Command::Follow(id) => match sup.follow(&id).await {
            Ok(()) => Outcome::reply(format!("I am now following {id}")),
            Err(e) => Outcome::reply(format!("Follow failed: {e}")),
        },

        Command::Report(id) if id.is_empty() => Outcome::reply("Usage: report <id>"),
        Command::Report(id) => match sup.report_spam(&id, None).await {
            Ok(name) => Outcome::reply(format!("{name} has been reported as a spammer.")),
            Err(e) => Outcome::reply(format!("Report failed: {e}")),
        },

        Command::Block(id) if id.is_empty() => Outcome::reply("Usage: block <id>"),
        Command::Block(id) => match sup.block(&id, None).await {
            Ok(name) => Outcome::reply(format!("{name} has been blocked.")),
            Err(e) => Outcome::reply(format!("Block failed: {e}")),
        },

        Command::Save => match sup.save().await {
            Ok(()) => Outcome::reply("Configuration data has been saved."),
            Err(e) => Outcome::reply(format!("Save failed: {e}")),
        },

        Command::Dump => {
            let recent = sup.dump().await;
            let mut out = String::new();
            for (i, t) in recent.iter().enumerate() {
                out.push_str(&format!("{i:>3}: {t}\n"));
            }
            out.push_str(&format!(
                "Dump of recent tweets completed ({} entries).",
                recent.len()
            ));
            Outcome::reply(out)
        }

        Command::Stop => match sup.stop().await {
            Ok(true) => Outcome::reply("Streaming connection stopped."),
            Ok(false) => Outcome::reply("No active stream."),
            Err(e) => Outcome::reply(format!("Stop failed: {e}")),
        },

        Command::Restart => match sup.restart().await {
            Ok(_) => Outcome::reply("Restarting connection to Twitter Streaming API..."),
            Err(e) => Outcome::reply(format!("Restart failed: {e}")),
        },

        Command::Exit => {
            if sup.is_active().await {
                if let Err(e) = sup.stop().await {
                    tracing::warn!("stopping stream on exit failed: {e}");
                }
            }
            Outcome {
                reply: None,
                exit: true,
            }
        }

        Command::Unknown(_) => Outcome::reply("Sorry, that does not make sense to me."),
    }
}
