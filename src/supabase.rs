//! HTTP client for a Supabase project: PostgREST for the `entries` table,
//! GoTrue for auth, and the storage API for images.

use crate::{
    collaborator::Collaborator,
    config::BackendConfig,
    diary_entry::{DiaryEntry, EntryId, NewEntry},
    error::DiaryError,
    session::{
        Credentials, Session, SessionEvent, SessionHub, SessionStore, SessionSubscription, User,
    },
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header::CONTENT_TYPE, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct SupabaseClient {
    http: reqwest::Client,
    config: BackendConfig,
    session: RwLock<Option<Session>>,
    store: SessionStore,
    hub: SessionHub,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_at
                .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs)),
            user: self.user,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl SupabaseClient {
    /// Resumes a persisted session from `store` when one is still valid.
    pub fn new(config: BackendConfig, store: SessionStore) -> Self {
        let session = store.load();
        if session.is_some() {
            info!("Resuming persisted session");
        }
        SupabaseClient {
            http: reqwest::Client::new(),
            config,
            session: RwLock::new(session),
            store,
            hub: SessionHub::new(),
        }
    }

    fn rest_url(&self, query: &str) -> Result<String, DiaryError> {
        let (base, _) = self.config.credentials()?;
        Ok(format!("{base}/rest/v1/{}{query}", self.config.table))
    }

    fn url(&self, path: &str) -> Result<String, DiaryError> {
        let (base, _) = self.config.credentials()?;
        Ok(format!("{base}{path}"))
    }

    /// Adds the project key and the best available bearer token.
    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, DiaryError> {
        let (_, key) = self.config.credentials()?;
        let bearer = match self.fresh_session().await {
            Some(session) => session.access_token,
            None => key.to_string(),
        };
        Ok(request.header("apikey", key).bearer_auth(bearer))
    }

    /// The live session, renewed first when its access token has expired.
    /// A session that cannot be renewed is dropped and listeners are told.
    async fn fresh_session(&self) -> Option<Session> {
        let mut guard = self.session.write().await;
        let stale = match guard.as_ref() {
            Some(session) if session.is_expired() => session.clone(),
            current => return current.cloned(),
        };

        match self.refresh(&stale).await {
            Ok(session) => {
                info!(user = %session.user.id, "Session refreshed");
                *guard = Some(session.clone());
                drop(guard);
                self.announce(session.clone());
                Some(session)
            }
            Err(e) => {
                warn!("Session expired and could not be refreshed: {e}");
                *guard = None;
                drop(guard);
                self.forget();
                None
            }
        }
    }

    async fn refresh(&self, stale: &Session) -> Result<Session, DiaryError> {
        let refresh_token = stale
            .refresh_token
            .clone()
            .ok_or_else(|| DiaryError::Auth("Session expired, please sign in again".into()))?;
        let url = self.url("/auth/v1/token?grant_type=refresh_token")?;
        let (_, key) = self.config.credentials()?;
        let response = self
            .http
            .post(url)
            .header("apikey", key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| DiaryError::Auth(e.to_string()))?;

        let mut session = read_token(response).await?;
        if session.refresh_token.is_none() {
            session.refresh_token = Some(refresh_token);
        }
        Ok(session)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        wrap: fn(String) -> DiaryError,
    ) -> Result<Response, DiaryError> {
        let response = self
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(|e| wrap(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        if status == StatusCode::UNAUTHORIZED {
            if self.session.write().await.take().is_some() {
                warn!("Backend rejected the session: {message}");
                self.forget();
            }
            return Err(DiaryError::Auth(message));
        }
        Err(wrap(message))
    }

    /// The local session is already gone by the time this runs, so failures
    /// are only logged.
    async fn revoke(&self, session: Session) {
        let (url, key) = match (self.url("/auth/v1/logout"), self.config.credentials()) {
            (Ok(url), Ok((_, key))) => (url, key),
            _ => return,
        };
        let result = self
            .http
            .post(url)
            .header("apikey", key)
            .bearer_auth(session.access_token)
            .send()
            .await;
        match result {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "Remote sign-out rejected");
            }
            Err(e) => warn!("Remote sign-out failed: {e}"),
            Ok(_) => {}
        }
    }

    async fn store_session(&self, session: Session) {
        *self.session.write().await = Some(session.clone());
        self.announce(session);
    }

    /// Persists `session` and tells listeners about it.
    fn announce(&self, session: Session) {
        if let Err(e) = self.store.save(&session) {
            warn!("Session will not survive a restart: {e}");
        }
        self.hub.publish(SessionEvent::SignedIn(session));
    }

    /// Wipes the persisted session after the in-memory one is gone.
    fn forget(&self) {
        if let Err(e) = self.store.clear() {
            warn!("Stale session left on disk: {e}");
        }
        self.hub.publish(SessionEvent::SignedOut);
    }
}

async fn read_token(response: Response) -> Result<Session, DiaryError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DiaryError::Auth(error_message(status, &body)));
    }
    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| DiaryError::Decode(e.to_string()))?;
    Ok(token.into_session())
}

fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| match status.canonical_reason() {
            Some(reason) => format!("{} {reason}", status.as_u16()),
            None => status.as_u16().to_string(),
        })
}

fn storage_path(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket.trim_matches('/'), key.trim_start_matches('/'))
}

#[async_trait]
impl Collaborator for SupabaseClient {
    async fn fetch_entries(&self) -> Result<Vec<DiaryEntry>, DiaryError> {
        let url = self.rest_url("?select=*&order=is_top.desc.nullslast,created_at.desc")?;
        let response = self
            .send(self.http.get(url), DiaryError::Connectivity)
            .await?;
        let entries: Vec<DiaryEntry> = response
            .json()
            .await
            .map_err(|e| DiaryError::Decode(e.to_string()))?;
        debug!(count = entries.len(), "fetched entries");
        Ok(entries)
    }

    async fn insert_entry(&self, entry: &NewEntry) -> Result<DiaryEntry, DiaryError> {
        let url = self.rest_url("")?;
        let request = self
            .http
            .post(url)
            .header("Prefer", "return=representation")
            .json(entry);
        let rows: Vec<DiaryEntry> = self
            .send(request, DiaryError::Persist)
            .await?
            .json()
            .await
            .map_err(|e| DiaryError::Decode(e.to_string()))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DiaryError::Decode("insert returned no row".into()))
    }

    async fn set_pinned(&self, id: EntryId, pinned: bool) -> Result<(), DiaryError> {
        let url = self.rest_url(&format!("?id=eq.{id}"))?;
        let request = self.http.patch(url).json(&json!({ "is_top": pinned }));
        self.send(request, DiaryError::Persist).await?;
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Session>, DiaryError> {
        Ok(self.fresh_session().await)
    }

    fn subscribe(&self) -> SessionSubscription {
        self.hub.subscribe()
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, DiaryError> {
        let url = self.url("/auth/v1/token?grant_type=password")?;
        let (_, key) = self.config.credentials()?;
        let response = self
            .http
            .post(url)
            .header("apikey", key)
            .json(credentials)
            .send()
            .await
            .map_err(|e| DiaryError::Auth(e.to_string()))?;

        let session = read_token(response).await?;
        info!(user = %session.user.id, "Signed in");
        self.store_session(session.clone()).await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), DiaryError> {
        let previous = self.session.write().await.take();
        self.store.clear()?;
        self.hub.publish(SessionEvent::SignedOut);
        info!("Signed out");

        if let Some(session) = previous {
            self.revoke(session).await;
        }
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DiaryError> {
        let url = self.url(&format!("/storage/v1/object/{}", storage_path(bucket, key)))?;
        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes);
        self.send(request, DiaryError::Upload).await?;
        debug!(bucket, key, "uploaded image");
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        let base = self
            .config
            .url
            .as_deref()
            .unwrap_or_default()
            .trim_end_matches('/');
        format!(
            "{base}/storage/v1/object/public/{}",
            storage_path(bucket, key)
        )
    }
}
