//! Auth collaborator client — session lifecycle against the hosted
//! GoTrue-style REST surface.
//!
//! The app never stores credentials itself: `HostedAuth` keeps the one
//! live session in its own slot (the auth service's storage mechanism)
//! and broadcasts every change — sign-in, sign-out, refresh, expiry —
//! so the session store can react without polling.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the session-change broadcast channel.
const EVENT_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Proof that a user is authenticated, held for the app's runtime.
///
/// At most one live `Session` exists per running app instance; it is
/// owned by the session store and everything else borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Cannot reach the auth service at {0}")]
    Connection(String),
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("Auth service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Failed to parse auth response: {0}")]
    ResponseParsing(String),
    #[error("Internal lock poisoned")]
    LockPoisoned,
}

/// Session lifecycle operations offered by the hosted auth service.
///
/// `session_events` delivers `Some(session)` on sign-in and refresh and
/// `None` on sign-out or invalidation; subscribers drop their receiver
/// to unsubscribe.
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// The persisted session, if one survives from a previous run.
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Subscribe to session changes.
    fn session_events(&self) -> broadcast::Receiver<Option<Session>>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

// ---------------------------------------------------------------------------
// Hosted implementation
// ---------------------------------------------------------------------------

/// HTTP client for the hosted auth service.
pub struct HostedAuth {
    base_url: String,
    anon_key: String,
    client: reqwest::Client,
    stored: Mutex<Option<Session>>,
    events: broadcast::Sender<Option<Session>>,
}

impl HostedAuth {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            client: reqwest::Client::new(),
            stored: Mutex::new(None),
            events,
        }
    }

    pub fn from_config(config: &crate::config::RemoteConfig) -> Self {
        Self::new(&config.base_url, &config.anon_key)
    }

    fn store_and_emit(&self, session: Option<Session>) -> Result<(), AuthError> {
        {
            let mut stored = self.stored.lock().map_err(|_| AuthError::LockPoisoned)?;
            *stored = session.clone();
        }
        // No receivers yet is fine; the store subscribes later.
        let _ = self.events.send(session);
        Ok(())
    }

    async fn token_request(&self, path: &str, body: &CredentialsBody<'_>) -> Result<Session, AuthError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AuthError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    AuthError::HttpClient("Request timed out".to_string())
                } else {
                    AuthError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<AuthFailureBody>()
                .await
                .ok()
                .and_then(|b| b.message())
                .unwrap_or_else(|| "authentication failed".to_string());
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ResponseParsing(e.to_string()))?;

        Ok(Session {
            user_id: parsed.user.id,
            access_token: parsed.access_token,
            expires_at: Utc::now() + Duration::seconds(parsed.expires_in),
        })
    }
}

/// Request body for password sign-in and sign-up.
#[derive(Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

/// Successful token response from the auth service.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    user: AuthUser,
}

#[derive(Deserialize)]
struct AuthUser {
    id: Uuid,
}

/// Failure body; the service uses two different message fields.
#[derive(Deserialize)]
struct AuthFailureBody {
    error_description: Option<String>,
    msg: Option<String>,
}

impl AuthFailureBody {
    fn message(self) -> Option<String> {
        self.error_description.or(self.msg)
    }
}

#[async_trait]
impl AuthClient for HostedAuth {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let stored = {
            let guard = self.stored.lock().map_err(|_| AuthError::LockPoisoned)?;
            guard.clone()
        };

        match stored {
            Some(session) if session.is_expired() => {
                // Expiry is an invalidation: clear and notify like a sign-out.
                self.store_and_emit(None)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn session_events(&self) -> broadcast::Receiver<Option<Session>> {
        self.events.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self
            .token_request("/auth/v1/token?grant_type=password", &CredentialsBody { email, password })
            .await?;
        self.store_and_emit(Some(session.clone()))?;
        tracing::info!(user_id = %session.user_id, "signed in");
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self
            .token_request("/auth/v1/signup", &CredentialsBody { email, password })
            .await?;
        self.store_and_emit(Some(session.clone()))?;
        tracing::info!(user_id = %session.user_id, "account created");
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = {
            let guard = self.stored.lock().map_err(|_| AuthError::LockPoisoned)?;
            guard.as_ref().map(|s| s.access_token.clone())
        };

        if let Some(token) = token {
            let url = format!("{}/auth/v1/logout", self.base_url);
            let result = self
                .client
                .post(&url)
                .header("apikey", &self.anon_key)
                .bearer_auth(&token)
                .send()
                .await;
            // Local sign-out proceeds even if the revoke call fails.
            if let Err(e) = result {
                tracing::warn!("token revoke failed: {e}");
            }
        }

        self.store_and_emit(None)?;
        tracing::info!("signed out");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Mock auth client for testing — scripted sessions and failures.
pub struct MockAuth {
    stored: Mutex<Option<Session>>,
    events: broadcast::Sender<Option<Session>>,
    fail_current_session: bool,
    reject_credentials: bool,
}

impl MockAuth {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            stored: Mutex::new(None),
            events,
            fail_current_session: false,
            reject_credentials: false,
        }
    }

    /// Start with a persisted session already in place.
    pub fn with_session(session: Session) -> Self {
        let mock = Self::new();
        *mock.stored.lock().unwrap() = Some(session);
        mock
    }

    /// Make `current_session` fail, as when the service is unreachable.
    pub fn failing_current_session(mut self) -> Self {
        self.fail_current_session = true;
        self
    }

    /// Reject every sign-in/sign-up attempt.
    pub fn rejecting_credentials(mut self) -> Self {
        self.reject_credentials = true;
        self
    }

    /// Simulate an out-of-band change (token refresh, remote revocation).
    pub fn emit(&self, session: Option<Session>) {
        *self.stored.lock().unwrap() = session.clone();
        let _ = self.events.send(session);
    }

    pub fn test_session(user_id: Uuid) -> Session {
        Session {
            user_id,
            access_token: format!("token-{user_id}"),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }
}

impl Default for MockAuth {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthClient for MockAuth {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        if self.fail_current_session {
            return Err(AuthError::Connection("mock-auth".to_string()));
        }
        Ok(self.stored.lock().map_err(|_| AuthError::LockPoisoned)?.clone())
    }

    fn session_events(&self) -> broadcast::Receiver<Option<Session>> {
        self.events.subscribe()
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<Session, AuthError> {
        if self.reject_credentials {
            return Err(AuthError::Rejected {
                status: 400,
                message: "Invalid login credentials".to_string(),
            });
        }
        let session = Self::test_session(Uuid::new_v4());
        tracing::debug!(%email, "mock sign-in");
        self.emit(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.sign_in(email, password).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.emit(None);
        Ok(())
    }
}
