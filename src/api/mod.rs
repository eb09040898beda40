//! Meeting API — the small HTTP service that provisions video meetings.
//!
//! The mobile app calls `POST /create-meeting` when a video consultation
//! starts; the server exchanges its Zoom account credentials for a
//! meeting and records the meeting id on the appointment row.
//!
//! The router is composable — `meeting_router()` returns a `Router`
//! that can be mounted on any axum server instance.

pub mod error;
pub mod router;
pub mod server;
pub mod types;
pub mod zoom;

pub use router::meeting_router;
pub use server::{start_meeting_server, MeetingServer};
pub use types::ApiContext;
