//! Video call plumbing — provider selection, room naming, join URLs.

use crate::appointments::Appointment;
use crate::config;

/// Where the call lands when the provider tag is missing or unknown.
pub const DEFAULT_JOIN_URL: &str = "https://meet.jit.si/CuralinkGeneralRoom";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoProvider {
    Jitsi,
    Daily,
    Zoom,
}

impl VideoProvider {
    /// Parse a provider tag from appointment metadata.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "jitsi" => Some(VideoProvider::Jitsi),
            "daily" => Some(VideoProvider::Daily),
            "zoom" => Some(VideoProvider::Zoom),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// URLs
// ---------------------------------------------------------------------------

/// Room name reserved for one appointment's call.
pub fn room_for_appointment(appointment_id: &str) -> String {
    format!("CuralinkRoom_{appointment_id}")
}

/// Join URL for a room under one provider. Unknown tags fall back to
/// the default public room rather than a broken link.
pub fn join_url(provider_tag: &str, room: &str) -> String {
    match VideoProvider::from_tag(provider_tag) {
        Some(VideoProvider::Jitsi) => format!("https://meet.jit.si/{room}"),
        Some(VideoProvider::Daily) => {
            format!("https://{}.daily.co/{room}", config::DAILY_SUBDOMAIN)
        }
        Some(VideoProvider::Zoom) => format!("https://zoom.us/j/{room}"),
        None => {
            tracing::warn!(provider_tag, "unknown video provider, using default room");
            DEFAULT_JOIN_URL.to_string()
        }
    }
}

/// Join URL for one appointment: the provisioned meeting when one is
/// recorded, the appointment's own room otherwise.
pub fn appointment_join_url(appointment: &Appointment, provider_tag: &str) -> String {
    match &appointment.meeting_id {
        Some(meeting_id) => join_url(provider_tag, meeting_id),
        None => join_url(provider_tag, &room_for_appointment(&appointment.id.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
