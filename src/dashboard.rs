//! Dashboard — the signed-in landing screen's combined load.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::appointments::{self, AppointmentCard, AppointmentStatus};
use crate::profile::{self, PatientProfile, ProfileError};
use crate::store::{RemoteStore, StoreError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything the dashboard renders from one load.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardData {
    pub profile: PatientProfile,
    pub upcoming: Vec<AppointmentCard>,
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Repository functions
// ---------------------------------------------------------------------------

/// Load the dashboard: profile and appointments fetched concurrently.
pub async fn fetch_dashboard(
    store: &dyn RemoteStore,
    token: &str,
    user_id: Uuid,
) -> Result<DashboardData, DashboardError> {
    let (profile, cards) = tokio::join!(
        profile::fetch_profile(store, token, user_id),
        appointments::fetch_appointment_cards(store, token, user_id),
    );

    Ok(DashboardData {
        profile: profile?,
        upcoming: upcoming_appointments(&cards?, Utc::now()),
    })
}

/// Future appointments still on the calendar, soonest first.
///
/// Cancelled and completed records never count as upcoming.
pub fn upcoming_appointments(
    cards: &[AppointmentCard],
    now: DateTime<Utc>,
) -> Vec<AppointmentCard> {
    let mut upcoming: Vec<AppointmentCard> = cards
        .iter()
        .filter(|card| {
            card.appointment.appointment_date > now
                && matches!(
                    card.appointment.status,
                    AppointmentStatus::Pending
                        | AppointmentStatus::Approved
                        | AppointmentStatus::Active
                )
        })
        .cloned()
        .collect();
    upcoming.sort_by_key(|card| card.appointment.appointment_date);
    upcoming
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointments::{Appointment, AppointmentType, APPOINTMENTS_TABLE};
    use crate::profile::PATIENTS_TABLE;
    use crate::store::MockStore;
    use chrono::Duration;
    use serde_json::json;

    fn card(status: AppointmentStatus, date: DateTime<Utc>) -> AppointmentCard {
        AppointmentCard {
            appointment: Appointment {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                doctor_id: None,
                appointment_date: date,
                symptoms: "checkup".to_string(),
                status,
                appointment_type: AppointmentType::Online,
                meeting_id: None,
            },
            doctor_name: "Dr. Osei".to_string(),
        }
    }

    #[test]
    fn upcoming_keeps_future_open_appointments_soonest_first() {
        let now = Utc::now();
        let cards = vec![
            card(AppointmentStatus::Pending, now + Duration::days(3)),
            card(AppointmentStatus::Approved, now + Duration::days(1)),
            card(AppointmentStatus::Cancelled, now + Duration::days(2)),
            card(AppointmentStatus::Completed, now + Duration::days(4)),
            card(AppointmentStatus::Approved, now - Duration::days(1)),
        ];
        let before = cards.clone();

        let upcoming = upcoming_appointments(&cards, now);

        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].appointment.status, AppointmentStatus::Approved);
        assert_eq!(upcoming[1].appointment.status, AppointmentStatus::Pending);
        assert!(upcoming[0].appointment.appointment_date < upcoming[1].appointment.appointment_date);
        assert_eq!(cards, before);
    }

    #[tokio::test]
    async fn dashboard_joins_profile_and_appointments() {
        let user = Uuid::new_v4();
        let tomorrow = Utc::now() + Duration::days(1);
        let store = MockStore::new()
            .with_rows(
                PATIENTS_TABLE,
                vec![json!({
                    "user_id": user.to_string(),
                    "full_name": "Pat Example",
                    "email": "pat@example.com",
                })],
            )
            .with_rows(
                APPOINTMENTS_TABLE,
                vec![json!({
                    "id": Uuid::new_v4().to_string(),
                    "user_id": user.to_string(),
                    "appointment_date": tomorrow.to_rfc3339(),
                    "symptoms": "checkup",
                    "status": "approved",
                    "appointment_type": "online",
                })],
            );

        let data = fetch_dashboard(&store, "token", user).await.unwrap();

        assert_eq!(data.profile.full_name, "Pat Example");
        assert_eq!(data.upcoming.len(), 1);
    }

    #[tokio::test]
    async fn dashboard_requires_a_profile() {
        let store = MockStore::new();
        let err = fetch_dashboard(&store, "token", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            DashboardError::Profile(ProfileError::NotFound)
        ));
    }
}
