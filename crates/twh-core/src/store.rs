//! Persisted configuration store.
//!
//! Keys are `:`-separated paths into one JSON document (`auth:twitter` lives at
//! `{"auth": {"twitter": ...}}`). Writes stay in memory until `save()`.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{errors::Error, Result};

pub const KEY_TWITTER_AUTH: &str = "auth:twitter";
pub const KEY_BITLY_AUTH: &str = "auth:bitly";
pub const KEY_TRACK: &str = "track";
pub const KEY_RECENT_TWEETS: &str = "recentTweets";

pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn save(&self) -> Result<()>;
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TwitterAuth {
    pub bearer_token: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BitlyAuth {
    pub user: String,
    pub key: String,
}

/// Typed read; a missing key and a malformed value both read as `None`.
pub fn get_typed<T: DeserializeOwned>(store: &dyn ConfigStore, key: &str) -> Option<T> {
    let v = store.get(key)?;
    match serde_json::from_value(v) {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring malformed config value");
            None
        }
    }
}

pub fn recent_tweets(store: &dyn ConfigStore) -> Vec<String> {
    get_typed::<Vec<String>>(store, KEY_RECENT_TWEETS).unwrap_or_default()
}

pub fn track(store: &dyn ConfigStore) -> Option<String> {
    get_typed::<String>(store, KEY_TRACK).filter(|s| !s.trim().is_empty())
}

/// JSON file backed store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    doc: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = match fs::read_to_string(&path) {
            Ok(txt) if txt.trim().is_empty() => Map::new(),
            Ok(txt) => match serde_json::from_str::<Value>(&txt)? {
                Value::Object(m) => m,
                _ => {
                    return Err(Error::Config(format!(
                        "{}: top-level value must be a JSON object",
                        path.display()
                    )))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_doc<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        let mut guard = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl ConfigStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.with_doc(|doc| {
            let mut parts = key.split(':');
            let first = parts.next()?;
            let mut cur = doc.get(first)?;
            for p in parts {
                cur = cur.as_object()?.get(p)?;
            }
            Some(cur.clone())
        })
    }

    fn set(&self, key: &str, value: Value) {
        self.with_doc(|doc| {
            let parts: Vec<&str> = key.split(':').collect();
            let Some((last, parents)) = parts.split_last() else {
                return;
            };
            let mut cur = doc;
            for p in parents {
                let slot = cur
                    .entry(p.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                let Value::Object(next) = slot else {
                    return;
                };
                cur = next;
            }
            cur.insert(last.to_string(), value);
        });
    }

    fn save(&self) -> Result<()> {
        let body = self.with_doc(|doc| serde_json::to_string_pretty(&Value::Object(doc.clone())))?;

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        // Write-then-rename; readers never see a partial file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tmp_path(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.json"))
    }

    #[test]
    fn missing_file_opens_empty() {
        let store = JsonFileStore::open(tmp_path("twh-store-missing")).unwrap();
        assert!(store.get(KEY_TRACK).is_none());
        assert!(recent_tweets(&store).is_empty());
    }

    #[test]
    fn nested_keys_round_trip_through_disk() {
        let path = tmp_path("twh-store-nested");
        let store = JsonFileStore::open(&path).unwrap();
        store.set(KEY_BITLY_AUTH, json!({"user": "u", "key": "k"}));
        store.set(KEY_RECENT_TWEETS, json!(["a", "b"]));
        store.save().unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["auth"]["bitly"]["user"], "u");

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.path(), path.as_path());
        let auth: BitlyAuth = get_typed(&reopened, KEY_BITLY_AUTH).unwrap();
        assert_eq!(auth.key, "k");
        assert_eq!(recent_tweets(&reopened), vec!["a", "b"]);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn set_replaces_scalar_parent_with_object() {
        let store = JsonFileStore::open(tmp_path("twh-store-scalar")).unwrap();
        store.set("auth", json!("oops"));
        store.set(KEY_TWITTER_AUTH, json!({"bearer_token": "t"}));
        let auth: TwitterAuth = get_typed(&store, KEY_TWITTER_AUTH).unwrap();
        assert_eq!(auth.bearer_token, "t");
    }

    #[test]
    fn malformed_values_read_as_none() {
        let store = JsonFileStore::open(tmp_path("twh-store-bad")).unwrap();
        store.set(KEY_RECENT_TWEETS, json!("not a list"));
        store.set(KEY_TRACK, json!("   "));
        assert!(recent_tweets(&store).is_empty());
        assert!(track(&store).is_none());
    }

    #[test]
    fn non_object_document_is_a_config_error() {
        let path = tmp_path("twh-store-array");
        fs::write(&path, "[1, 2]").unwrap();
        let err = JsonFileStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let _ = fs::remove_file(path);
    }
}
