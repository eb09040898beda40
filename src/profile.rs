//! Patient profile — the account's own record: fetch, edits, and the
//! two-phase registration that creates it.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{AuthClient, AuthError, Session};
use crate::store::{self, Filter, RemoteStore, StoreError};

pub const PATIENTS_TABLE: &str = "patients";

/// Minimum accepted by the auth service.
const MIN_PASSWORD_LEN: usize = 6;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub health_history: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
}

impl PatientProfile {
    /// Completed years since birth, if a birth date is on record.
    pub fn age(&self) -> Option<u32> {
        let dob = self.date_of_birth?;
        let today = Utc::now().date_naive();
        let mut age = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }
}

/// What the signup form submits.
#[derive(Debug, Clone)]
pub struct SignupForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Editable profile fields; absent fields are left as they are.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_history: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Full name is required")]
    MissingName,
    #[error("A valid email address is required")]
    InvalidEmail,
    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("No profile changes to save")]
    EmptyUpdate,
    #[error("No patient profile found for this account")]
    NotFound,
    #[error("Account created but profile setup failed: {0}")]
    ProfileSetupFailed(StoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Repository functions
// ---------------------------------------------------------------------------

/// The signed-in user's own patient record.
pub async fn fetch_profile(
    store: &dyn RemoteStore,
    token: &str,
    user_id: Uuid,
) -> Result<PatientProfile, ProfileError> {
    let rows = store
        .select(
            PATIENTS_TABLE,
            &[Filter::eq("user_id", user_id)],
            None,
            Some(1),
            token,
        )
        .await?;

    store::rows_into::<PatientProfile>(rows)?
        .into_iter()
        .next()
        .ok_or(ProfileError::NotFound)
}

/// Apply profile edits. Callers re-fetch afterwards so the screen shows
/// what the backend actually stored.
pub async fn update_profile(
    store: &dyn RemoteStore,
    token: &str,
    user_id: Uuid,
    patch: &ProfilePatch,
) -> Result<(), ProfileError> {
    if matches!(&patch.full_name, Some(name) if name.trim().is_empty()) {
        return Err(ProfileError::MissingName);
    }

    let body =
        serde_json::to_value(patch).map_err(|e| StoreError::ResponseParsing(e.to_string()))?;
    if body.as_object().map(|o| o.is_empty()).unwrap_or(true) {
        return Err(ProfileError::EmptyUpdate);
    }

    let updated = store
        .update(PATIENTS_TABLE, body, &[Filter::eq("user_id", user_id)], token)
        .await?;
    if updated.is_empty() {
        return Err(ProfileError::NotFound);
    }

    tracing::info!(%user_id, "profile updated");
    Ok(())
}

/// Two-phase registration: create the account, then the patient row.
///
/// If the second phase fails the session from the first stays live, so
/// the user is signed in and can finish their profile later instead of
/// hitting "email already registered" on retry.
pub async fn register_patient(
    auth: &dyn AuthClient,
    store: &dyn RemoteStore,
    form: &SignupForm,
) -> Result<Session, ProfileError> {
    let full_name = form.full_name.trim();
    if full_name.is_empty() {
        return Err(ProfileError::MissingName);
    }
    let email = form.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ProfileError::InvalidEmail);
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ProfileError::WeakPassword);
    }

    let session = auth.sign_up(email, &form.password).await?;

    let row = json!({
        "user_id": session.user_id,
        "full_name": full_name,
        "email": email,
        "phone": form.phone,
        "gender": form.gender,
        "date_of_birth": form.date_of_birth,
    });
    if let Err(e) = store
        .insert(PATIENTS_TABLE, vec![row], &session.access_token)
        .await
    {
        tracing::error!("profile row creation failed after signup: {e}");
        return Err(ProfileError::ProfileSetupFailed(e));
    }

    tracing::info!(user_id = %session.user_id, "patient registered");
    Ok(session)
}

/// Placeholder for profile fields that were never provided.
pub fn field_or_na(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => "N/A",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockAuth;
    use crate::store::MockStore;

    fn profile_row(user_id: Uuid) -> serde_json::Value {
        json!({
            "user_id": user_id.to_string(),
            "full_name": "Pat Example",
            "email": "pat@example.com",
            "phone": "+233201234567",
            "allergies": "Penicillin",
        })
    }

    fn signup_form() -> SignupForm {
        SignupForm {
            full_name: "Pat Example".to_string(),
            email: "pat@example.com".to_string(),
            password: "hunter22".to_string(),
            phone: None,
            gender: Some("female".to_string()),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 6, 15),
        }
    }

    // -- fetch -------------------------------------------------------------

    #[tokio::test]
    async fn fetch_returns_the_single_profile_row() {
        let user = Uuid::new_v4();
        let store = MockStore::new().with_rows(PATIENTS_TABLE, vec![profile_row(user)]);

        let profile = fetch_profile(&store, "token", user).await.unwrap();

        assert_eq!(profile.full_name, "Pat Example");
        assert_eq!(profile.allergies.as_deref(), Some("Penicillin"));
        assert!(profile.address.is_none());
    }

    #[tokio::test]
    async fn fetch_without_row_is_not_found() {
        let store = MockStore::new();
        let err = fetch_profile(&store, "token", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ProfileError::NotFound));
    }

    // -- update ------------------------------------------------------------

    #[tokio::test]
    async fn update_patches_only_provided_fields() {
        let user = Uuid::new_v4();
        let store = MockStore::new().with_rows(PATIENTS_TABLE, vec![profile_row(user)]);

        let patch = ProfilePatch {
            phone: Some("+233209876543".to_string()),
            ..ProfilePatch::default()
        };
        update_profile(&store, "token", user, &patch).await.unwrap();

        let rows = store.rows(PATIENTS_TABLE);
        assert_eq!(rows[0]["phone"], "+233209876543");
        assert_eq!(rows[0]["full_name"], "Pat Example");
    }

    #[tokio::test]
    async fn update_with_no_changes_is_rejected_before_any_call() {
        let store = MockStore::new();
        let err = update_profile(&store, "token", Uuid::new_v4(), &ProfilePatch::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ProfileError::EmptyUpdate));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn update_rejects_blank_name() {
        let store = MockStore::new();
        let patch = ProfilePatch {
            full_name: Some("   ".to_string()),
            ..ProfilePatch::default()
        };
        let err = update_profile(&store, "token", Uuid::new_v4(), &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::MissingName));
    }

    #[tokio::test]
    async fn update_for_unknown_user_is_not_found() {
        let store = MockStore::new();
        let patch = ProfilePatch {
            phone: Some("+233209876543".to_string()),
            ..ProfilePatch::default()
        };
        let err = update_profile(&store, "token", Uuid::new_v4(), &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::NotFound));
    }

    // -- registration ------------------------------------------------------

    #[tokio::test]
    async fn register_validates_before_creating_anything() {
        let auth = MockAuth::new();
        let store = MockStore::new();

        let mut form = signup_form();
        form.full_name = " ".to_string();
        assert!(matches!(
            register_patient(&auth, &store, &form).await.unwrap_err(),
            ProfileError::MissingName
        ));

        let mut form = signup_form();
        form.email = "not-an-email".to_string();
        assert!(matches!(
            register_patient(&auth, &store, &form).await.unwrap_err(),
            ProfileError::InvalidEmail
        ));

        let mut form = signup_form();
        form.password = "abc".to_string();
        assert!(matches!(
            register_patient(&auth, &store, &form).await.unwrap_err(),
            ProfileError::WeakPassword
        ));

        assert!(auth.current_session().await.unwrap().is_none());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn register_creates_account_then_profile_row() {
        let auth = MockAuth::new();
        let store = MockStore::new();

        let session = register_patient(&auth, &store, &signup_form()).await.unwrap();

        let rows = store.rows(PATIENTS_TABLE);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["user_id"], session.user_id.to_string());
        assert_eq!(rows[0]["full_name"], "Pat Example");
    }

    #[tokio::test]
    async fn register_keeps_session_when_profile_row_fails() {
        let auth = MockAuth::new();
        let store = MockStore::new().failing_insert();

        let err = register_patient(&auth, &store, &signup_form()).await.unwrap_err();

        assert!(matches!(err, ProfileError::ProfileSetupFailed(_)));
        // The account exists and the user is signed in; only the row is missing.
        assert!(auth.current_session().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn register_propagates_rejected_credentials() {
        let auth = MockAuth::new().rejecting_credentials();
        let store = MockStore::new();

        let err = register_patient(&auth, &store, &signup_form()).await.unwrap_err();
        assert!(matches!(err, ProfileError::Auth(AuthError::Rejected { .. })));
        assert!(store.calls().is_empty());
    }

    // -- helpers -----------------------------------------------------------

    #[test]
    fn age_counts_completed_years() {
        let today = Utc::now().date_naive();
        let profile = PatientProfile {
            date_of_birth: NaiveDate::from_ymd_opt(today.year() - 30, 1, 1),
            ..blank_profile()
        };
        assert_eq!(profile.age(), Some(30));

        let unborn = PatientProfile {
            date_of_birth: NaiveDate::from_ymd_opt(today.year() + 1, 1, 1),
            ..blank_profile()
        };
        assert_eq!(unborn.age(), None);

        assert_eq!(blank_profile().age(), None);
    }

    #[test]
    fn field_or_na_placeholder() {
        assert_eq!(field_or_na(Some("O+")), "O+");
        assert_eq!(field_or_na(Some("   ")), "N/A");
        assert_eq!(field_or_na(None), "N/A");
    }

    fn blank_profile() -> PatientProfile {
        PatientProfile {
            user_id: Uuid::new_v4(),
            full_name: "Pat Example".to_string(),
            email: "pat@example.com".to_string(),
            phone: None,
            address: None,
            emergency_contact: None,
            health_history: None,
            allergies: None,
            blood_type: None,
            weight: None,
            height: None,
            gender: None,
            date_of_birth: None,
        }
    }
}
