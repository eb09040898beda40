//! Shared types for the meeting API layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::zoom::MeetingApi;
use crate::store::RemoteStore;

// ═══════════════════════════════════════════════════════════
// API context — shared state for the meeting router
// ═══════════════════════════════════════════════════════════

/// Shared context for all meeting routes.
#[derive(Clone)]
pub struct ApiContext {
    pub meetings: Arc<dyn MeetingApi>,
    pub store: Arc<dyn RemoteStore>,
    /// Token the server uses when recording meeting ids on appointments.
    pub service_token: String,
}

impl ApiContext {
    pub fn new(
        meetings: Arc<dyn MeetingApi>,
        store: Arc<dyn RemoteStore>,
        service_token: impl Into<String>,
    ) -> Self {
        Self {
            meetings,
            store,
            service_token: service_token.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════

/// Body of `POST /create-meeting`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingRequest {
    #[serde(default)]
    pub appointment_id: Option<String>,
}

/// Successful meeting provisioning response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingResponse {
    pub meeting_id: String,
    pub join_url: String,
}
