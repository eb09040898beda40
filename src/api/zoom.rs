//! Zoom provisioning client — server-to-server OAuth and meeting
//! creation.
//!
//! The server holds account credentials the mobile app must never see;
//! each meeting request exchanges them for a short-lived access token
//! and creates one instant meeting under the account's user.

use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::config::MeetingConfig;

const OAUTH_TOKEN_URL: &str = "https://zoom.us/oauth/token";
const API_BASE_URL: &str = "https://api.zoom.us/v2";

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// A provisioned meeting, ready to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meeting {
    pub id: String,
    pub join_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ZoomError {
    #[error("Cannot reach the meeting provider at {0}")]
    Connection(String),
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("Meeting provider rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Failed to parse meeting provider response: {0}")]
    ResponseParsing(String),
}

/// Meeting provisioning offered by the video provider.
#[async_trait]
pub trait MeetingApi: Send + Sync {
    async fn create_meeting(&self, topic: &str) -> Result<Meeting, ZoomError>;
}

// ═══════════════════════════════════════════════════════════
// Zoom client
// ═══════════════════════════════════════════════════════════

/// HTTP client for the Zoom server-to-server OAuth app.
pub struct ZoomClient {
    account_id: String,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
}

impl ZoomClient {
    pub fn new(account_id: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &MeetingConfig) -> Self {
        Self::new(
            &config.zoom_account_id,
            &config.zoom_client_id,
            &config.zoom_client_secret,
        )
    }

    fn send_error(e: reqwest::Error) -> ZoomError {
        if e.is_connect() {
            ZoomError::Connection("zoom.us".to_string())
        } else if e.is_timeout() {
            ZoomError::HttpClient("Request timed out".to_string())
        } else {
            ZoomError::HttpClient(e.to_string())
        }
    }

    /// Exchange account credentials for a short-lived access token.
    async fn access_token(&self) -> Result<String, ZoomError> {
        let url = format!(
            "{OAUTH_TOKEN_URL}?grant_type=account_credentials&account_id={}",
            self.account_id
        );
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Basic {credentials}"))
            .send()
            .await
            .map_err(Self::send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZoomError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: OAuthToken = response
            .json()
            .await
            .map_err(|e| ZoomError::ResponseParsing(e.to_string()))?;
        Ok(token.access_token)
    }
}

#[derive(Deserialize)]
struct OAuthToken {
    access_token: String,
}

/// Zoom's meeting representation; ids are numeric on the wire.
#[derive(Deserialize)]
struct ZoomMeeting {
    id: u64,
    join_url: String,
}

#[async_trait]
impl MeetingApi for ZoomClient {
    async fn create_meeting(&self, topic: &str) -> Result<Meeting, ZoomError> {
        let token = self.access_token().await?;

        // Type 1 is an instant meeting; patients join as soon as the
        // consultation starts.
        let body = json!({
            "topic": topic,
            "type": 1,
            "settings": {
                "join_before_host": true,
                "waiting_room": false,
            },
        });

        let response = self
            .client
            .post(format!("{API_BASE_URL}/users/me/meetings"))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(Self::send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZoomError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let meeting: ZoomMeeting = response
            .json()
            .await
            .map_err(|e| ZoomError::ResponseParsing(e.to_string()))?;

        tracing::info!(meeting_id = meeting.id, "meeting provisioned");
        Ok(Meeting {
            id: meeting.id.to_string(),
            join_url: meeting.join_url,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Mock
// ═══════════════════════════════════════════════════════════

/// Mock meeting provider for testing — deterministic meetings and
/// injectable failures.
pub struct MockMeetingApi {
    topics: Mutex<Vec<String>>,
    fail: bool,
}

impl MockMeetingApi {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// Reject every provisioning attempt.
    pub fn failing() -> Self {
        Self {
            topics: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Every topic requested so far, oldest first.
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }
}

impl Default for MockMeetingApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeetingApi for MockMeetingApi {
    async fn create_meeting(&self, topic: &str) -> Result<Meeting, ZoomError> {
        let mut topics = self.topics.lock().unwrap();
        topics.push(topic.to_string());

        if self.fail {
            return Err(ZoomError::Rejected {
                status: 401,
                body: "invalid client credentials".to_string(),
            });
        }

        let id = format!("mock-meeting-{}", topics.len());
        Ok(Meeting {
            join_url: format!("https://zoom.us/j/{id}"),
            id,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
