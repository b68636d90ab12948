//! bit.ly adapter (short links to kept tweets).
//!
//! Uses the v3 `shorten` endpoint with login + API key credentials.

use std::time::Duration;

use async_trait::async_trait;

use twh_core::{errors::Error, ports::LinkShortener, store::BitlyAuth, Result};

#[derive(Clone, Debug)]
pub struct BitlyClient {
    login: String,
    api_key: String,
    base: String,
    http: reqwest::Client,
}

impl BitlyClient {
    pub fn new(auth: BitlyAuth, base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("bitly client build failed: {e}")))?;
        Ok(Self {
            login: auth.user,
            api_key: auth.key,
            base: base.into().trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl LinkShortener for BitlyClient {
    async fn shorten(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/shorten", self.base))
            .query(&[
                ("login", self.login.as_str()),
                ("apiKey", self.api_key.as_str()),
                ("longUrl", url),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| Error::CapabilityUnavailable(format!("bitly request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::CapabilityUnavailable(format!(
                "bitly shorten failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::CapabilityUnavailable(format!("bitly json error: {e}")))?;

        let short = parse_shorten_response(&v)?;
        tracing::debug!(long = url, short = %short, "shortened");
        Ok(short)
    }
}

/// bit.ly reports API errors inside a 200 response via `status_code`.
fn parse_shorten_response(v: &serde_json::Value) -> Result<String> {
    let code = v.get("status_code").and_then(|c| c.as_u64()).unwrap_or(0);
    if code != 200 {
        let txt = v
            .get("status_txt")
            .and_then(|t| t.as_str())
            .unwrap_or("unknown error");
        return Err(Error::CapabilityUnavailable(format!(
            "bitly error {code}: {txt}"
        )));
    }

    v.get("data")
        .and_then(|d| d.get("url"))
        .and_then(|u| u.as_str())
        .filter(|u| !u.trim().is_empty())
        .map(|u| u.to_string())
        .ok_or_else(|| Error::CapabilityUnavailable("bitly response had no url".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    #[test]
    fn extracts_short_url() {
        let v = json!({
          "status_code": 200,
          "status_txt": "OK",
          "data": { "url": "http://bit.ly/abc", "hash": "abc" }
        });
        assert_eq!(parse_shorten_response(&v).unwrap(), "http://bit.ly/abc");
    }

    #[test]
    fn api_errors_are_capability_failures() {
        let v = json!({ "status_code": 500, "status_txt": "INVALID_LOGIN", "data": [] });
        let err = parse_shorten_response(&v).unwrap_err();
        assert!(matches!(err, Error::CapabilityUnavailable(ref s) if s.contains("INVALID_LOGIN")));
    }

    #[test]
    fn missing_url_is_a_failure() {
        let v = json!({ "status_code": 200, "data": {} });
        assert!(parse_shorten_response(&v).is_err());
    }

    fn client_for(server: &MockServer) -> BitlyClient {
        BitlyClient::new(
            BitlyAuth {
                user: "bot-login".to_string(),
                key: "R_secret".to_string(),
            },
            format!("{}/v3", server.uri()),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn shorten_sends_credentials_and_long_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/shorten"))
            .and(query_param("login", "bot-login"))
            .and(query_param("apiKey", "R_secret"))
            .and(query_param("longUrl", "http://twitter.com/#!/alice/status/1"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status_code": 200,
                "status_txt": "OK",
                "data": { "url": "http://bit.ly/a1b2", "hash": "a1b2" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let short = client_for(&server)
            .shorten("http://twitter.com/#!/alice/status/1")
            .await
            .unwrap();
        assert_eq!(short, "http://bit.ly/a1b2");
    }

    #[tokio::test]
    async fn api_error_inside_ok_response_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/shorten"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status_code": 500,
                "status_txt": "INVALID_APIKEY",
                "data": []
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .shorten("http://twitter.com/#!/alice/status/1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CapabilityUnavailable(ref s) if s.contains("INVALID_APIKEY")));
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_without_panicking() {
        let client = BitlyClient::new(
            BitlyAuth {
                user: "u".to_string(),
                key: "k".to_string(),
            },
            "http://127.0.0.1:9/v3",
            Duration::from_millis(200),
        )
        .unwrap();
        let err = client.shorten("http://example.com").await.unwrap_err();
        assert!(matches!(err, Error::CapabilityUnavailable(_)));
    }
}
