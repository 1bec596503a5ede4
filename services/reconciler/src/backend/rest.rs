//! HTTP backend for a hosted PostgREST + GoTrue stack
//!
//! Reads and writes go over `reqwest` to `/rest/v1/{table}`; password auth
//! goes to `/auth/v1`. The realtime transport is not implemented here: an
//! external listener publishes decoded changes into [`RestBackend::feed`],
//! and subscriptions read from that hub.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};
use types::change::{ChangeKind, Relation};
use types::errors::CollaboratorError;
use types::ids::UserId;
use types::profile::Profile;
use types::session::{AuthUser, Credentials, Session};
use types::standing::{NewStandingEvent, StandingEvent};

use super::feed::{FeedHub, Subscription};
use super::Backend;
use crate::config::BackendConfig;

const PROFILE_COLUMNS: &str = "id,first_name";
const STANDING_COLUMNS: &str = "id,created_at,loser_id,created_by";

/// Token response from the password grant.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

/// Error body shapes returned by PostgREST and GoTrue.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

/// Best human-readable message for a failed response body.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.to_string()
            } else {
                trimmed.to_string()
            }
        })
}

/// Backend speaking the hosted REST and auth APIs.
pub struct RestBackend {
    http: Client,
    base: Url,
    anon_key: String,
    session: RwLock<Option<Session>>,
    feed: FeedHub,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, CollaboratorError> {
        let base = Url::parse(&config.url)
            .map_err(|e| CollaboratorError::Transport(format!("invalid backend url: {}", e)))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;

        info!(url = %base, timeout_secs = config.timeout_secs, "RestBackend initialized");

        Ok(Self {
            http,
            base,
            anon_key: config.anon_key.clone(),
            session: RwLock::new(None),
            feed: FeedHub::new(config.feed_capacity),
        })
    }

    /// Hub the realtime listener publishes decoded changes into.
    pub fn feed(&self) -> &FeedHub {
        &self.feed
    }

    /// Restore a session persisted by a previous run.
    pub fn restore_session(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn bearer(&self) -> String {
        match self.current_session() {
            Some(session) => session.access_token,
            None => self.anon_key.clone(),
        }
    }

    /// `{base}/rest/v1/{table}` with the given query pairs.
    pub(crate) fn table_url(&self, table: &str, query: &[(&str, &str)]) -> Result<Url, CollaboratorError> {
        let mut url = self
            .base
            .join(&format!("rest/v1/{}", table))
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    pub(crate) fn auth_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, CollaboratorError> {
        let mut url = self
            .base
            .join(&format!("auth/v1/{}", path))
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, String> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_message(status, &body))
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        relation: Relation,
        url: Url,
    ) -> Result<Vec<T>, CollaboratorError> {
        let fetch_err = |message: String| CollaboratorError::Fetch { relation, message };

        let response = self.send(self.http.get(url)).await.map_err(|message| {
            error!(%relation, %message, "Fetch failed");
            fetch_err(message)
        })?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| CollaboratorError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn get_session(&self) -> Result<Option<Session>, CollaboratorError> {
        Ok(self.current_session())
    }

    async fn get_profile(&self, id: &UserId) -> Result<Option<Profile>, CollaboratorError> {
        let filter = format!("eq.{}", id);
        let url = self.table_url(
            Relation::Profiles.table(),
            &[("select", PROFILE_COLUMNS), ("id", &filter)],
        )?;
        let rows: Vec<Profile> = self.fetch_rows(Relation::Profiles, url).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, CollaboratorError> {
        let url = self.table_url(Relation::Profiles.table(), &[("select", PROFILE_COLUMNS)])?;
        self.fetch_rows(Relation::Profiles, url).await
    }

    async fn list_standing_events(&self) -> Result<Vec<StandingEvent>, CollaboratorError> {
        let url = self.table_url(
            Relation::Standing.table(),
            &[("select", STANDING_COLUMNS), ("order", "created_at.desc")],
        )?;
        self.fetch_rows(Relation::Standing, url).await
    }

    async fn insert_standing_event(
        &self,
        event: NewStandingEvent,
    ) -> Result<StandingEvent, CollaboratorError> {
        let url = self.table_url(Relation::Standing.table(), &[("select", STANDING_COLUMNS)])?;
        let request = self
            .http
            .post(url)
            .header("Prefer", "return=representation")
            .json(&[&event]);

        let response = self
            .send(request)
            .await
            .map_err(|message| CollaboratorError::Insert { message })?;
        let rows: Vec<StandingEvent> = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Decode(e.to_string()))?;

        let stored = rows
            .into_iter()
            .next()
            .ok_or_else(|| CollaboratorError::Decode("insert returned no row".to_string()))?;
        debug!(id = ?stored.id, "Standing event stored");
        Ok(stored)
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<(), CollaboratorError> {
        let url = self.table_url(Relation::Profiles.table(), &[("on_conflict", "id")])?;
        let request = self
            .http
            .post(url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&profile);

        self.send(request)
            .await
            .map(|_| ())
            .map_err(|message| CollaboratorError::Upsert { message })
    }

    async fn subscribe(
        &self,
        relation: Relation,
        kinds: &[ChangeKind],
    ) -> Result<Subscription, CollaboratorError> {
        Ok(self.feed.subscribe(relation, kinds))
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<(), CollaboratorError> {
        let url = self.auth_url("signup", &[])?;
        let request = self
            .http
            .post(url)
            .json(&json!({ "email": credentials.email, "password": credentials.password }));

        self.send(request)
            .await
            .map(|_| ())
            .map_err(|message| CollaboratorError::Auth { message })
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, CollaboratorError> {
        let url = self.auth_url("token", &[("grant_type", "password")])?;
        let request = self
            .http
            .post(url)
            .json(&json!({ "email": credentials.email, "password": credentials.password }));

        let response = self
            .send(request)
            .await
            .map_err(|message| CollaboratorError::Auth { message })?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Decode(e.to_string()))?;

        let session = Session {
            access_token: token.access_token,
            user: token.user,
        };
        self.restore_session(Some(session.clone()));
        info!(user = %session.user_id(), "Signed in");
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), CollaboratorError> {
        let result = match self.auth_url("logout", &[]) {
            Ok(url) => self
                .send(self.http.post(url))
                .await
                .map(|_| ())
                .map_err(|message| CollaboratorError::Auth { message }),
            Err(e) => Err(e),
        };
        // The local session is dropped even when the server call fails.
        self.restore_session(None);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> RestBackend {
        RestBackend::new(&BackendConfig {
            url: "https://project.example.co/".to_string(),
            anon_key: "anon".to_string(),
            timeout_secs: 5,
            feed_capacity: 16,
        })
        .unwrap()
    }

    #[test]
    fn test_table_url_encodes_query() {
        let b = backend();
        let url = b
            .table_url("standing", &[("select", STANDING_COLUMNS), ("order", "created_at.desc")])
            .unwrap();
        assert_eq!(url.path(), "/rest/v1/standing");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("select".to_string(), STANDING_COLUMNS.to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
            ]
        );
    }

    #[test]
    fn test_auth_url() {
        let url = backend().auth_url("token", &[("grant_type", "password")]).unwrap();
        assert_eq!(url.as_str(), "https://project.example.co/auth/v1/token?grant_type=password");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = RestBackend::new(&BackendConfig {
            url: "not a url".to_string(),
            ..BackendConfig::default()
        });
        assert!(matches!(result, Err(CollaboratorError::Transport(_))));
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"duplicate key"}"#),
            "duplicate key"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "503 Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_session_restore_and_bearer() {
        let b = backend();
        assert_eq!(b.bearer(), "anon");
        assert_eq!(b.get_session().await.unwrap(), None);

        b.restore_session(Some(Session::new("tok", UserId::new("u1"), None)));
        assert_eq!(b.bearer(), "tok");
        assert_eq!(b.get_session().await.unwrap().unwrap().user_id().as_str(), "u1");
    }

    #[tokio::test]
    async fn test_subscribe_uses_feed_hub() {
        let b = backend();
        let _sub = b.subscribe(Relation::Standing, &[ChangeKind::Insert]).await.unwrap();
        assert_eq!(b.feed().subscriber_count(), 1);
    }
}
