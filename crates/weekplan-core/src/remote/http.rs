//! HTTP client for the remote task table
//!
//! Speaks the PostgREST dialect: filters as `column=op.value` query pairs,
//! upserts as `POST` with a merge-duplicates preference.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use tracing::debug;

use super::error::{RemoteError, RemoteResult};
use super::message::PROTOCOL_VSN;
use super::realtime;
use super::row::RemoteTaskRow;
use super::{ChangeStream, RemoteClient};
use crate::auth::AuthGate;
use crate::config::Config;
use crate::millis;

const TASKS_PATH: &str = "/rest/v1/tasks";
const REALTIME_PATH: &str = "/realtime/v1/websocket";

/// [`RemoteClient`] over HTTP and websocket
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    auth: Arc<dyn AuthGate>,
}

impl HttpRemote {
    /// Build a client from the configured URL and API key
    pub fn new(config: &Config, auth: Arc<dyn AuthGate>) -> RemoteResult<Self> {
        let remote_url = config
            .remote_url
            .as_deref()
            .ok_or_else(|| RemoteError::NotConfigured("remote_url is not set".to_string()))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| RemoteError::NotConfigured("api_key is not set".to_string()))?;
        let base_url = Url::parse(remote_url)
            .map_err(|e| RemoteError::NotConfigured(format!("remote_url {}: {}", remote_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RemoteError::NotConfigured(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            auth,
        })
    }

    fn tasks_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(TASKS_PATH);
        url
    }

    /// Websocket URL of the realtime endpoint
    pub fn realtime_url(&self) -> RemoteResult<Url> {
        let mut url = self.base_url.clone();
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(RemoteError::NotConfigured(format!(
                    "Unsupported URL scheme '{}'",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| RemoteError::NotConfigured("Cannot derive websocket URL".to_string()))?;
        url.set_path(REALTIME_PATH);
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &self.api_key)
            .append_pair("vsn", PROTOCOL_VSN);
        Ok(url)
    }

    /// Attach API key and bearer token; fails without a session
    fn authorized(&self, request: RequestBuilder) -> RemoteResult<RequestBuilder> {
        let token = self
            .auth
            .access_token()
            .ok_or(RemoteError::Unauthenticated)?;
        Ok(request.header("apikey", &self.api_key).bearer_auth(token))
    }
}

/// Map a non-success status to an error
fn classify_status(status: StatusCode, body: String) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthenticated,
        _ => RemoteError::Rejected {
            status: status.as_u16(),
            message: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
        },
    }
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, body))
}

/// Rows requested per page; stays under the server's response cap
const PAGE_SIZE: usize = 500;

/// PostgREST query for one page of a user's rows changed after a moment
///
/// Rows are ordered by `(updated_at, id)` so consecutive offsets never skip
/// or repeat a row of an unchanged result set.
fn select_filters(
    user_id: &str,
    updated_after: Option<DateTime<Utc>>,
    offset: usize,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("select", "*".to_string()),
        ("user_id", format!("eq.{}", user_id)),
    ];
    if let Some(after) = updated_after {
        query.push(("updated_at", format!("gt.{}", millis::from_datetime(&after))));
    }
    query.push(("order", "updated_at.asc,id.asc".to_string()));
    query.push(("limit", PAGE_SIZE.to_string()));
    query.push(("offset", offset.to_string()));
    query
}

#[async_trait]
impl RemoteClient for HttpRemote {
    async fn upsert_rows(&self, rows: &[RemoteTaskRow]) -> RemoteResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        debug!("Upserting {} rows", rows.len());
        let request = self
            .client
            .post(self.tasks_url())
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows);
        let response = self.authorized(request)?.send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn select_rows_for_user(
        &self,
        user_id: &str,
        updated_after: Option<DateTime<Utc>>,
    ) -> RemoteResult<Vec<RemoteTaskRow>> {
        let mut rows = Vec::new();
        loop {
            let request = self
                .client
                .get(self.tasks_url())
                .query(&select_filters(user_id, updated_after, rows.len()));
            let response = self.authorized(request)?.send().await?;
            let page: Vec<RemoteTaskRow> = check_status(response).await?.json().await?;

            let last = page.len() < PAGE_SIZE;
            rows.extend(page);
            if last {
                break;
            }
        }
        debug!("Fetched {} rows for user {}", rows.len(), user_id);
        Ok(rows)
    }

    async fn delete_row(&self, id: &str, user_id: &str) -> RemoteResult<()> {
        let request = self.client.delete(self.tasks_url()).query(&[
            ("id", format!("eq.{}", id)),
            ("user_id", format!("eq.{}", user_id)),
        ]);
        let response = self.authorized(request)?.send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn subscribe_to_changes(&self, user_id: &str) -> ChangeStream {
        let Some(token) = self.auth.access_token() else {
            return ChangeStream::closed(RemoteError::Unauthenticated.to_string());
        };
        match self.realtime_url() {
            Ok(url) => realtime::subscribe(url.to_string(), user_id, token),
            Err(e) => ChangeStream::closed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Session, SessionGate};
    use crate::remote::ChangeEvent;

    fn config(url: &str) -> Config {
        Config {
            remote_url: Some(url.to_string()),
            api_key: Some("anon-key".to_string()),
            sync_enabled: true,
            ..Config::default()
        }
    }

    fn remote(url: &str, session: Option<Session>) -> HttpRemote {
        HttpRemote::new(&config(url), Arc::new(SessionGate::in_memory(session))).unwrap()
    }

    #[test]
    fn test_requires_url_and_key() {
        let auth: Arc<dyn AuthGate> = Arc::new(SessionGate::signed_out());
        let err = HttpRemote::new(&Config::default(), auth.clone()).err().unwrap();
        assert!(matches!(err, RemoteError::NotConfigured(_)));

        let mut partial = config("https://tasks.example.com");
        partial.api_key = None;
        assert!(HttpRemote::new(&partial, auth).is_err());
    }

    #[test]
    fn test_tasks_url() {
        let remote = remote("https://tasks.example.com", None);
        assert_eq!(
            remote.tasks_url().as_str(),
            "https://tasks.example.com/rest/v1/tasks"
        );
    }

    #[test]
    fn test_realtime_url() {
        let secure = remote("https://tasks.example.com", None);
        assert_eq!(
            secure.realtime_url().unwrap().as_str(),
            "wss://tasks.example.com/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );

        let local = remote("http://localhost:54321", None);
        assert!(local
            .realtime_url()
            .unwrap()
            .as_str()
            .starts_with("ws://localhost:54321/realtime/v1/websocket"));
    }

    #[test]
    fn test_select_filters() {
        let all = select_filters("u1", None, 0);
        assert_eq!(all[1], ("user_id", "eq.u1".to_string()));
        assert!(!all.iter().any(|(k, _)| *k == "updated_at"));

        let after = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let changed = select_filters("u1", Some(after), 0);
        assert_eq!(changed[2], ("updated_at", "gt.1700000000123".to_string()));
    }

    #[test]
    fn test_select_filters_page_in_stable_order() {
        let page = select_filters("u1", None, 2 * PAGE_SIZE);

        assert!(page.contains(&("order", "updated_at.asc,id.asc".to_string())));
        assert!(page.contains(&("limit", PAGE_SIZE.to_string())));
        assert!(page.contains(&("offset", (2 * PAGE_SIZE).to_string())));
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, String::new()),
            RemoteError::Unauthenticated
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "rls".to_string()),
            RemoteError::Unauthenticated
        ));
        match classify_status(StatusCode::CONFLICT, "duplicate".to_string()) {
            RemoteError::Rejected { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "duplicate");
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_upsert_skips_io() {
        // Signed out and unreachable: any request would fail
        let remote = remote("http://127.0.0.1:9", None);
        remote.upsert_rows(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_requests_require_session() {
        let remote = remote("http://127.0.0.1:9", None);

        let err = remote.select_rows_for_user("u1", None).await.unwrap_err();
        assert!(matches!(err, RemoteError::Unauthenticated));

        let err = remote.delete_row("t1", "u1").await.unwrap_err();
        assert!(matches!(err, RemoteError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_subscribe_without_session_fails_open() {
        let remote = remote("https://tasks.example.com", None);
        let mut stream = remote.subscribe_to_changes("u1").await;

        match stream.next().await {
            Some(ChangeEvent::Closed { error }) => assert!(error.is_some()),
            other => panic!("Expected Closed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_select_follows_pages_until_short_page() {
        use crate::models::{Priority, Task};
        use chrono::NaiveDate;
        use wiremock::matchers::{header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let due = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let rows: Vec<RemoteTaskRow> = (0..PAGE_SIZE + 3)
            .map(|i| {
                let task = Task::with_id(format!("t{:04}", i), "Task", "work", Priority::Low, due);
                RemoteTaskRow::from_task(&task, "u1")
            })
            .collect();

        Mock::given(method("GET"))
            .and(path(TASKS_PATH))
            .and(query_param("offset", "0"))
            .and(query_param("order", "updated_at.asc,id.asc"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&rows[..PAGE_SIZE]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(TASKS_PATH))
            .and(query_param("offset", PAGE_SIZE.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(&rows[PAGE_SIZE..]))
            .expect(1)
            .mount(&server)
            .await;

        let remote = remote(&server.uri(), Some(Session::new("u1", "tok")));
        let fetched = remote.select_rows_for_user("u1", None).await.unwrap();

        assert_eq!(fetched.len(), PAGE_SIZE + 3);
        assert_eq!(fetched.last().unwrap().id, format!("t{:04}", PAGE_SIZE + 2));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let remote = remote("http://127.0.0.1:9", Some(Session::new("u1", "tok")));

        let err = remote.select_rows_for_user("u1", None).await.unwrap_err();
        assert!(err.is_network(), "unexpected error: {:?}", err);
    }
}
