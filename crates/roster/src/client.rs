//! HTTP client for the roster API.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use clanwatch_core::{MemberSnapshotEntry, Tag};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::config::RosterConfig;
use crate::error::{FetchError, FetchResult};
use crate::types::{GroupSummary, MemberList};

/// Source of roster snapshots.
///
/// Implementations must not touch the ledger; a fetch is a pure read of the
/// remote roster.
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Fetch the current roster of `group`.
    async fn fetch(&self, group: &Tag) -> FetchResult<Vec<MemberSnapshotEntry>>;
}

/// Error body returned by the roster service on non-success statuses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the remote roster API.
#[derive(Debug, Clone)]
pub struct RosterClient {
    config: Arc<RosterConfig>,
    base_url: Url,
    http_client: reqwest::Client,
}

impl RosterClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns a fatal error if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn with_config(config: RosterConfig) -> FetchResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| FetchError::fatal(None, format!("invalid base URL '{}': {e}", config.base_url)))?;

        if base_url.cannot_be_a_base() {
            return Err(FetchError::fatal(
                None,
                format!("base URL '{}' cannot carry a path", config.base_url),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::fatal(None, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            base_url,
            http_client,
        })
    }

    /// Get the client configuration.
    #[must_use]
    pub fn config(&self) -> &RosterConfig {
        &self.config
    }

    /// Fetch the member list of a group.
    ///
    /// # Errors
    ///
    /// Returns a classified [`FetchError`].
    pub async fn fetch_members(&self, group: &Tag) -> FetchResult<Vec<MemberSnapshotEntry>> {
        let start = Instant::now();
        let url = self.endpoint(&["clans", group.as_str(), "members"]);

        let list: MemberList = self.get_json(url).await?;
        let snapshot = list.into_snapshot()?;

        debug!(
            group = %group,
            members = snapshot.len(),
            duration_ms = start.elapsed().as_millis(),
            "Fetched roster"
        );
        Ok(snapshot)
    }

    /// Fetch the summary of a group.
    ///
    /// # Errors
    ///
    /// Returns a classified [`FetchError`].
    pub async fn fetch_group(&self, group: &Tag) -> FetchResult<GroupSummary> {
        let url = self.endpoint(&["clans", group.as_str()]);
        let summary: GroupSummary = self.get_json(url).await?;
        info!(group = %group, name = %summary.name, "Fetched group summary");
        Ok(summary)
    }

    /// Build an endpoint URL; every segment is percent-encoded (`#` included).
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> FetchResult<T> {
        debug!(url = %url, "Requesting roster endpoint");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.config.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16(), error_reason(&body)));
        }

        serde_json::from_str(&body)
            .map_err(|e| FetchError::transient(Some(status.as_u16()), format!("undecodable response: {e}")))
    }
}

#[async_trait]
impl RosterSource for RosterClient {
    async fn fetch(&self, group: &Tag) -> FetchResult<Vec<MemberSnapshotEntry>> {
        self.fetch_members(group).await
    }
}

/// Extract a human-readable reason from an error body.
fn error_reason(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => match parsed.message {
            Some(message) if !message.is_empty() => format!("{}: {message}", parsed.reason),
            _ => parsed.reason,
        },
        Err(_) => body.chars().take(200).collect(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::time::Duration;

    use super::*;
    use crate::error::FetchErrorKind;
    use clanwatch_core::Role;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RosterClient {
        let config = RosterConfig::new("#2PP", "secret")
            .base_url(server.uri())
            .timeout(Duration::from_millis(500));
        RosterClient::with_config(config).unwrap()
    }

    fn group() -> Tag {
        Tag::new("#2PP").unwrap()
    }

    #[test]
    fn test_invalid_base_url_is_fatal() {
        let config = RosterConfig::new("#2PP", "secret").base_url("not a url");
        let err = RosterClient::with_config(config).unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Fatal);
    }

    #[test]
    fn test_endpoint_encodes_tag_and_keeps_prefix() {
        let config = RosterConfig::new("#2PP", "secret").base_url("https://api.example.com/v1/");
        let client = RosterClient::with_config(config).unwrap();

        let url = client.endpoint(&["clans", "#2PP", "members"]);
        assert_eq!(url.as_str(), "https://api.example.com/v1/clans/%232PP/members");
    }

    #[tokio::test]
    async fn test_fetch_members_success() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/clans/%232PP/members"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"tag": "#ABC", "name": "Alice", "role": "member", "donations": 50},
                    {"tag": "#DEF", "name": "Bob", "role": "admin", "donations": 7}
                ]
            })))
            .mount(&server)
            .await;

        let snapshot = client_for(&server).fetch(&group()).await?;

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].name, "Alice");
        assert_eq!(snapshot[1].role, Role::Elder);
        assert_eq!(snapshot[1].contribution_count, 7);
        Ok(())
    }

    #[tokio::test]
    async fn test_service_unavailable_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "reason": "inMaintenance",
                "message": "Service is temporarily unavailable because of maintenance."
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch(&group()).await.unwrap_err();

        assert_eq!(err.kind(), FetchErrorKind::Transient);
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("inMaintenance"));
    }

    #[tokio::test]
    async fn test_forbidden_is_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "reason": "accessDenied"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch(&group()).await.unwrap_err();

        assert_eq!(err.kind(), FetchErrorKind::Fatal);
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_garbage_body_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch(&group()).await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch(&group()).await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Transient);
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_fetch_group_summary() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/clans/%232PP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag": "#2PP", "name": "Sniffers", "clanLevel": 9, "members": 41
            })))
            .mount(&server)
            .await;

        let summary = client_for(&server).fetch_group(&group()).await?;
        assert_eq!(summary.name, "Sniffers");
        assert_eq!(summary.clan_level, 9);
        Ok(())
    }

    #[test]
    fn test_error_reason_falls_back_to_raw_body() {
        assert_eq!(error_reason("upstream exploded"), "upstream exploded");
        assert_eq!(error_reason(r#"{"reason":"notFound"}"#), "notFound");
    }
}
