//! Appointments — user-scoped fetch, booking, cancellation, and the
//! status lifecycle behind them.
//!
//! Status normalization happens once at the parse boundary: rows carry
//! whatever casing the backend stored, `AppointmentStatus` accepts any
//! casing on the way in and always writes canonical lowercase on the
//! way out. Everything past this module compares enum values only.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;
use uuid::Uuid;

use crate::doctors::{self, Doctor};
use crate::store::{self, Filter, Order, RemoteStore, StoreError};

pub const APPOINTMENTS_TABLE: &str = "appointments";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lifecycle of an appointment, from request to close.
///
/// `Pending` awaits review, `Approved` is confirmed, `Active` means the
/// consultation is underway, and `Completed`/`Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Active,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Active => "active",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown appointment status: {0}")]
pub struct UnknownStatus(String);

impl FromStr for AppointmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "approved" => Ok(AppointmentStatus::Approved),
            "active" => Ok(AppointmentStatus::Active),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AppointmentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AppointmentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentType {
    Online,
    Physical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    pub appointment_date: DateTime<Utc>,
    pub symptoms: String,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
    #[serde(default)]
    pub meeting_id: Option<String>,
}

impl Appointment {
    /// Whether the call screen may be entered for this appointment.
    pub fn video_joinable(&self) -> bool {
        self.appointment_type == AppointmentType::Online
            && matches!(
                self.status,
                AppointmentStatus::Approved | AppointmentStatus::Active
            )
    }
}

/// An appointment joined with its doctor's display name.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentCard {
    pub appointment: Appointment,
    pub doctor_name: String,
}

/// What the booking form submits.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub doctor_id: Option<Uuid>,
    pub appointment_date: DateTime<Utc>,
    pub symptoms: String,
    pub appointment_type: AppointmentType,
}

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Symptoms are required to book an appointment")]
    MissingSymptoms,
    #[error("Appointment not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Repository functions
// ---------------------------------------------------------------------------

/// All appointments for one user, most recent first.
pub async fn fetch_appointments(
    store: &dyn RemoteStore,
    token: &str,
    user_id: Uuid,
) -> Result<Vec<Appointment>, StoreError> {
    let rows = store
        .select(
            APPOINTMENTS_TABLE,
            &[Filter::eq("user_id", user_id)],
            Some(Order::desc("appointment_date")),
            None,
            token,
        )
        .await?;
    store::rows_into(rows)
}

/// Appointments plus doctor names, fetched with one batched directory
/// lookup.
///
/// Enrichment is best effort: a failed directory lookup leaves every
/// card on the fallback name instead of failing the list.
pub async fn fetch_appointment_cards(
    store: &dyn RemoteStore,
    token: &str,
    user_id: Uuid,
) -> Result<Vec<AppointmentCard>, StoreError> {
    let appointments = fetch_appointments(store, token, user_id).await?;
    let ids = doctors::referenced_doctor_ids(appointments.iter().map(|a| a.doctor_id));
    let index = match doctors::fetch_doctors_by_ids(store, token, &ids).await {
        Ok(directory) => doctors::index_doctors(directory),
        Err(e) => {
            tracing::warn!("doctor lookup failed, rendering fallback names: {e}");
            HashMap::new()
        }
    };
    Ok(enrich_with_doctors(appointments, &index))
}

pub fn enrich_with_doctors(
    appointments: Vec<Appointment>,
    index: &HashMap<Uuid, Doctor>,
) -> Vec<AppointmentCard> {
    appointments
        .into_iter()
        .map(|appointment| {
            let doctor_name = doctors::doctor_display_name(index, appointment.doctor_id);
            AppointmentCard {
                appointment,
                doctor_name,
            }
        })
        .collect()
}

/// Appointments in one status segment. The input list is not touched.
pub fn filter_by_status(
    appointments: &[Appointment],
    status: AppointmentStatus,
) -> Vec<Appointment> {
    appointments
        .iter()
        .filter(|a| a.status == status)
        .cloned()
        .collect()
}

/// Book a new appointment. Validation runs before any network call;
/// every booking starts out `pending`.
pub async fn book_appointment(
    store: &dyn RemoteStore,
    token: &str,
    user_id: Uuid,
    request: &BookingRequest,
) -> Result<Appointment, AppointmentError> {
    let symptoms = request.symptoms.trim();
    if symptoms.is_empty() {
        return Err(AppointmentError::MissingSymptoms);
    }

    let row = json!({
        "id": Uuid::new_v4(),
        "user_id": user_id,
        "doctor_id": request.doctor_id,
        "appointment_date": request.appointment_date,
        "symptoms": symptoms,
        "status": AppointmentStatus::Pending,
        "appointment_type": request.appointment_type,
    });

    let inserted = store.insert(APPOINTMENTS_TABLE, vec![row], token).await?;
    let appointment = store::rows_into::<Appointment>(inserted)?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::ResponseParsing("empty insert representation".to_string()))?;

    tracing::info!(appointment_id = %appointment.id, "appointment booked");
    Ok(appointment)
}

/// Cancel one appointment. Scoped to the owning user so a stale or
/// forged id can never touch someone else's record.
pub async fn cancel_appointment(
    store: &dyn RemoteStore,
    token: &str,
    user_id: Uuid,
    appointment_id: Uuid,
) -> Result<(), AppointmentError> {
    let updated = store
        .update(
            APPOINTMENTS_TABLE,
            json!({"status": AppointmentStatus::Cancelled}),
            &[
                Filter::eq("id", appointment_id),
                Filter::eq("user_id", user_id),
            ],
            token,
        )
        .await?;

    if updated.is_empty() {
        return Err(AppointmentError::NotFound);
    }
    tracing::info!(%appointment_id, "appointment cancelled");
    Ok(())
}

/// Locally mirror a confirmed cancellation: flip the one record, leave
/// every other element untouched.
pub fn apply_cancellation(appointments: &[Appointment], appointment_id: Uuid) -> Vec<Appointment> {
    appointments
        .iter()
        .cloned()
        .map(|mut appointment| {
            if appointment.id == appointment_id {
                appointment.status = AppointmentStatus::Cancelled;
            }
            appointment
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
