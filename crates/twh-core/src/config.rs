use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

pub const DEFAULT_DISTANCE_THRESHOLD: usize = 30;
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
pub const DEFAULT_STREAM_METHOD: &str = "statuses/filter";

/// Typed runtime configuration.
///
/// Credentials, the track list and the recent history live in the persisted
/// config store (see `store`), not here.
#[derive(Clone, Debug)]
pub struct Config {
    pub store_path: PathBuf,

    // Filtering
    pub distance_threshold: usize,
    pub history_capacity: usize,

    // Behavior flags
    pub auto_follow: bool,
    pub use_shell: bool,

    // Stream
    pub stream_method: String,

    // Remote endpoints
    pub api_base: String,
    pub stream_base: String,
    pub bitly_base: String,

    /// Upper bound for every classifier / shortener call.
    pub capability_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("config.json"),
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            auto_follow: false,
            use_shell: false,
            stream_method: DEFAULT_STREAM_METHOD.to_string(),
            api_base: "https://api.twitter.com/1.1".to_string(),
            stream_base: "https://stream.twitter.com/1.1".to_string(),
            bitly_base: "https://api-ssl.bitly.com/v3".to_string(),
            capability_timeout: Duration::from_millis(5_000),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let d = Config::default();

        let store_path = env_path("TWH_STORE_PATH").unwrap_or(d.store_path);

        let distance_threshold =
            env_usize("TWH_DISTANCE_THRESHOLD").unwrap_or(d.distance_threshold);
        let history_capacity = env_usize("TWH_HISTORY_CAPACITY").unwrap_or(d.history_capacity);
        if distance_threshold == 0 {
            return Err(Error::Config(
                "TWH_DISTANCE_THRESHOLD must be greater than zero".to_string(),
            ));
        }
        if history_capacity == 0 {
            return Err(Error::Config(
                "TWH_HISTORY_CAPACITY must be greater than zero".to_string(),
            ));
        }

        let auto_follow = env_bool("TWH_AUTO_FOLLOW").unwrap_or(d.auto_follow);
        let use_shell = env_bool("TWH_USE_SHELL").unwrap_or(d.use_shell);

        let stream_method = env_str("TWH_STREAM_METHOD")
            .and_then(non_empty)
            .unwrap_or(d.stream_method);

        let api_base = env_url("TWH_API_BASE").unwrap_or(d.api_base);
        let stream_base = env_url("TWH_STREAM_BASE").unwrap_or(d.stream_base);
        let bitly_base = env_url("TWH_BITLY_BASE").unwrap_or(d.bitly_base);

        let capability_timeout = env_u64("TWH_CAPABILITY_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(d.capability_timeout);

        Ok(Self {
            store_path,
            distance_threshold,
            history_capacity,
            auto_follow,
            use_shell,
            stream_method,
            api_base,
            stream_base,
            bitly_base,
            capability_timeout,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn env_url(key: &str) -> Option<String> {
    env_str(key)
        .and_then(non_empty)
        .map(|s| s.trim().trim_end_matches('/').to_string())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_filter_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.distance_threshold, 30);
        assert_eq!(cfg.history_capacity, 100);
        assert_eq!(cfg.stream_method, "statuses/filter");
        assert!(!cfg.auto_follow);
        assert_eq!(cfg.capability_timeout, Duration::from_secs(5));
    }

    #[test]
    fn dotenv_parsing_skips_comments_and_strips_quotes() {
        let parsed = parse_dotenv(
            "# comment\n\nTWH_AUTO_FOLLOW=\"yes\"\n  TWH_STREAM_METHOD = 'statuses/sample'\nnovalue\n=x\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TWH_AUTO_FOLLOW".to_string(), "yes".to_string()),
                (
                    "TWH_STREAM_METHOD".to_string(),
                    "statuses/sample".to_string()
                ),
            ]
        );
    }

    #[test]
    fn bool_parsing_accepts_common_truthy_values() {
        for v in ["1", "true", "YES", " on "] {
            assert!(parse_bool(v), "{v} should be truthy");
        }
        for v in ["0", "false", "off", ""] {
            assert!(!parse_bool(v), "{v} should be falsy");
        }
    }
}
