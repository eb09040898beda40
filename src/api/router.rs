//! Meeting API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! The mobile app calls it from a webview origin, so CORS stays open.

use axum::extract::State;
use axum::http::Method;
use axum::routing::post;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CreateMeetingRequest, CreateMeetingResponse};
use crate::appointments::APPOINTMENTS_TABLE;
use crate::store::{Filter, StoreError};
use crate::video;

/// Build the meeting router.
pub fn meeting_router(ctx: ApiContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/create-meeting", post(create_meeting))
        .with_state(ctx)
        .layer(cors)
}

/// `POST /create-meeting` — provision a meeting for one appointment and
/// record its id on the appointment row.
///
/// Recording is best effort: the meeting already exists upstream, so a
/// failed write must not turn a provisioned call into a client error.
async fn create_meeting(
    State(ctx): State<ApiContext>,
    Json(request): Json<CreateMeetingRequest>,
) -> Result<Json<CreateMeetingResponse>, ApiError> {
    let appointment_id = request
        .appointment_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingAppointmentId)?;

    let topic = video::room_for_appointment(appointment_id);
    let meeting = ctx.meetings.create_meeting(&topic).await?;

    if let Err(e) = record_meeting_id(&ctx, appointment_id, &meeting.id).await {
        tracing::warn!(appointment_id, "failed to record meeting id: {e}");
    }

    Ok(Json(CreateMeetingResponse {
        meeting_id: meeting.id,
        join_url: meeting.join_url,
    }))
}

async fn record_meeting_id(
    ctx: &ApiContext,
    appointment_id: &str,
    meeting_id: &str,
) -> Result<(), StoreError> {
    ctx.store
        .update(
            APPOINTMENTS_TABLE,
            serde_json::json!({ "meeting_id": meeting_id }),
            &[Filter::eq("id", appointment_id)],
            &ctx.service_token,
        )
        .await?;
    Ok(())
}
