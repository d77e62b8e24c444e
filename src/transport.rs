//! HTTP access to the tracker API.
//!
//! [`ChatTransport`] is the seam the poller fetches through; [`ApiClient`] is
//! the reqwest-backed implementation. Every request carries the configured
//! session cookie, and every failure is mapped onto [`ShoutboxError`] with the
//! URL that produced it.

use std::future::Future;

use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Result, ShoutboxError};
use crate::model::{Message, PublishMessage, UserStats};

pub const MESSAGES_PATH: &str = "/api/v1/chat/messages";
pub const PUBLISH_PATH: &str = "/api/v1/chat/publish";
pub const STATS_PATH: &str = "/api/v1/user/stats";

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// Parameters of one incremental message fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQuery {
    pub network_id: i16,
    /// Only messages created after this epoch second. `None` on a first run.
    pub since: Option<i64>,
    pub limit: Option<u32>,
}

impl MessageQuery {
    /// Path plus query string, e.g. `/api/v1/chat/messages?chat=1&since=1525176000`.
    pub fn path_and_query(&self) -> String {
        let mut out = format!("{MESSAGES_PATH}?chat={}", self.network_id);
        if let Some(since) = self.since {
            out.push_str(&format!("&since={since}"));
        }
        if let Some(limit) = self.limit {
            out.push_str(&format!("&limit={limit}"));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Source of chat messages.
pub trait ChatTransport {
    /// Fetch messages for `query`, newest first.
    ///
    /// `Ok(None)` means the server answered successfully without a payload.
    fn fetch_messages(
        &self,
        query: &MessageQuery,
    ) -> impl Future<Output = Result<Option<Vec<Message>>>> + Send;
}

// ---------------------------------------------------------------------------
// reqwest client
// ---------------------------------------------------------------------------

/// Credentialed JSON client for the tracker API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    client: reqwest::Client,
}

impl ApiClient {
    /// Build a client from `config`: base URL, session cookie and timeouts.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = config.base_url()?;

        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| ShoutboxError::Config(format!("session_cookie is not a valid header value: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ShoutboxError::Connect {
                url: base_url.to_string(),
                detail: e.to_string(),
            })?;

        Ok(ApiClient { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for an API path (with optional query string).
    pub fn endpoint(&self, path_and_query: &str) -> Result<Url> {
        self.base_url
            .join(path_and_query)
            .map_err(|source| ShoutboxError::InvalidUrl {
                input: path_and_query.to_string(),
                source,
            })
    }

    /// `GET` a JSON document. A `null` or empty body yields `Ok(None)`.
    pub async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<Option<T>> {
        let url = self.endpoint(path_and_query)?;
        let resp = self.client.get(url.clone()).send().await.map_err(|e| ShoutboxError::Connect {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
        read_json(url, resp).await
    }

    /// `POST` a JSON body and decode the JSON answer.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let resp = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| ShoutboxError::Connect {
                url: url.to_string(),
                detail: e.to_string(),
            })?;
        read_json(url, resp).await
    }

    /// Current user's transfer statistics.
    pub async fn fetch_stats(&self) -> Result<UserStats> {
        self.get_json::<UserStats>(STATS_PATH)
            .await?
            .ok_or_else(|| ShoutboxError::Json {
                url: STATS_PATH.to_string(),
                detail: "empty response".to_string(),
            })
    }

    /// Post `message` to the room with network id `chat`; returns the stored
    /// message when the server echoes it.
    pub async fn publish(&self, chat: i16, message: &str) -> Result<Option<Message>> {
        let body = PublishMessage {
            chat,
            message: message.to_string(),
        };
        self.post_json(PUBLISH_PATH, &body).await
    }
}

impl ChatTransport for ApiClient {
    async fn fetch_messages(&self, query: &MessageQuery) -> Result<Option<Vec<Message>>> {
        self.get_json(&query.path_and_query()).await
    }
}

async fn read_json<T: DeserializeOwned>(url: Url, resp: reqwest::Response) -> Result<Option<T>> {
    let status = resp.status();
    if !status.is_success() {
        return Err(ShoutboxError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let bytes = resp.bytes().await.map_err(|e| ShoutboxError::Connect {
        url: url.to_string(),
        detail: e.to_string(),
    })?;
    decode_body(&url, &bytes)
}

/// Decode a response body; empty and `null` bodies are "no payload".
pub(crate) fn decode_body<T: DeserializeOwned>(url: &Url, bytes: &[u8]) -> Result<Option<T>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<Option<T>>(bytes).map_err(|e| ShoutboxError::Json {
        url: url.to_string(),
        detail: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("http://tracker.example/api/v1/chat/messages?chat=1").unwrap()
    }

    #[test]
    fn first_run_query_has_no_since() {
        let q = MessageQuery { network_id: 1, since: None, limit: None };
        assert_eq!(q.path_and_query(), "/api/v1/chat/messages?chat=1");
    }

    #[test]
    fn incremental_query_carries_since_and_limit() {
        let q = MessageQuery { network_id: 2, since: Some(1_525_176_000), limit: Some(50) };
        assert_eq!(
            q.path_and_query(),
            "/api/v1/chat/messages?chat=2&since=1525176000&limit=50"
        );
    }

    #[test]
    fn endpoint_joins_onto_base() {
        let mut cfg = ClientConfig::default();
        cfg.base_url = "https://tracker.example/".to_string();
        let client = ApiClient::new(&cfg).unwrap();
        let q = MessageQuery { network_id: 1, since: Some(10), limit: None };
        assert_eq!(
            client.endpoint(&q.path_and_query()).unwrap().as_str(),
            "https://tracker.example/api/v1/chat/messages?chat=1&since=10"
        );
    }

    #[test]
    fn client_rejects_cookie_with_newline() {
        let mut cfg = ClientConfig::default();
        cfg.session_cookie = Some("sid=a\nb".to_string());
        assert!(matches!(ApiClient::new(&cfg), Err(ShoutboxError::Config(_))));
    }

    #[test]
    fn unreachable_server_is_transient_connect_error() {
        let mut cfg = ClientConfig::default();
        cfg.base_url = "http://127.0.0.1:1".to_string();
        cfg.connect_timeout_secs = 1;
        let client = ApiClient::new(&cfg).unwrap();
        let query = MessageQuery {
            network_id: 1,
            since: None,
            limit: None,
        };

        let err = tokio_test::assert_err!(tokio_test::block_on(client.fetch_messages(&query)));
        assert!(err.is_transient());
        match err {
            ShoutboxError::Connect { url, .. } => assert!(url.contains("chat/messages"), "{url}"),
            other => panic!("expected connect error, got {other:?}"),
        }
    }

    #[test]
    fn decode_empty_body_is_none() {
        let out: Option<Vec<Message>> = decode_body(&url(), b"  \n").unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn decode_null_body_is_none() {
        let out: Option<Vec<Message>> = decode_body(&url(), b"null").unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn decode_empty_array_is_some_empty() {
        let out: Option<Vec<Message>> = decode_body(&url(), b"[]").unwrap();
        assert_eq!(out, Some(vec![]));
    }

    #[test]
    fn decode_garbage_is_json_error_with_url() {
        let err = decode_body::<Vec<Message>>(&url(), b"{not json").unwrap_err();
        match err {
            ShoutboxError::Json { url, .. } => assert!(url.contains("chat=1")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
