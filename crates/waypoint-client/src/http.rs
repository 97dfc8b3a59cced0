//! HTTP implementation of [`ExplorerBackend`] against the waypoint REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use waypoint_types::{
    AddChildrenRequest, CandidateWaypoint, DiscoverNearbyRequest, ErrorResponse, GeoPoint,
    JournalEntry, SaveJournalRequest, SetVisitedRequest, User, UserId, Waypoint, WaypointId,
    WaypointNode,
};

use crate::{ClientError, ExplorerBackend, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize_base(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let url = self.url(path)?;
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        decode(check(response, what).await?).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<T> {
        let url = self.url(path)?;
        debug!(%url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        decode(check(response, what).await?).await
    }

    async fn patch<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<T> {
        let url = self.url(path)?;
        debug!(%url, "PATCH");
        let response = self.client.patch(url).json(body).send().await?;
        decode(check(response, what).await?).await
    }
}

/// Ensure the base path ends with `/` so relative joins append instead of replace.
fn normalize_base(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Map non-success statuses to typed errors, preferring the backend's `{"error": ...}` body.
async fn check(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, what, &body))
}

fn status_error(status: StatusCode, what: &str, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string());
    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(what.to_string()),
        StatusCode::BAD_REQUEST => ClientError::Rejected(message),
        _ => ClientError::Status {
            status: status.as_u16(),
            body: message,
        },
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
}

#[async_trait]
impl ExplorerBackend for HttpBackend {
    async fn fetch_tree(&self, user_id: UserId) -> Result<WaypointNode> {
        self.get(
            &format!("api/waypoint/tree/{user_id}"),
            &format!("waypoint tree for user {user_id}"),
        )
        .await
    }

    async fn fetch_waypoint(&self, id: WaypointId) -> Result<Waypoint> {
        self.get(&format!("api/waypoint/{id}"), &format!("waypoint {id}"))
            .await
    }

    async fn mark_visited(&self, id: WaypointId) -> Result<Waypoint> {
        self.patch(
            &format!("api/waypoint/{id}/visited"),
            &SetVisitedRequest { visited: true },
            &format!("waypoint {id}"),
        )
        .await
    }

    async fn discover_nearby(
        &self,
        position: GeoPoint,
        radius_m: f64,
        count: usize,
    ) -> Result<Vec<CandidateWaypoint>> {
        let body = DiscoverNearbyRequest {
            lat: position.lat,
            lon: position.lon,
            radius: radius_m,
            num: count,
        };
        self.post("api/waypoint/osm", &body, "nearby places").await
    }

    async fn attach_children(
        &self,
        parent_id: WaypointId,
        child_ids: &[WaypointId],
    ) -> Result<Waypoint> {
        let body = AddChildrenRequest {
            child_ids: child_ids.to_vec(),
        };
        self.patch(
            &format!("api/waypoint/{parent_id}/children"),
            &body,
            &format!("waypoint {parent_id}"),
        )
        .await
    }

    async fn save_journal_entry(
        &self,
        waypoint_id: WaypointId,
        user_id: UserId,
        text: &str,
    ) -> Result<JournalEntry> {
        let body = SaveJournalRequest {
            waypoint_id,
            user_id,
            content: text.to_string(),
        };
        self.post("api/journal", &body, "journal").await
    }

    async fn fetch_journal_entry(
        &self,
        waypoint_id: WaypointId,
        user_id: UserId,
    ) -> Result<Option<JournalEntry>> {
        match self
            .get(
                &format!("api/journal/{waypoint_id}/{user_id}"),
                "journal entry",
            )
            .await
        {
            Ok(entry) => Ok(Some(entry)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_user(&self, user_id: UserId) -> Result<User> {
        self.get(&format!("api/user/{user_id}"), &format!("user {user_id}"))
            .await
    }
}
