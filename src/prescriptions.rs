//! Prescriptions — patient-scoped fetch, doctor enrichment, and the
//! plain-language explanation prompt.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::doctors::{self, Doctor};
use crate::genai::{self, GenAiError, TextGenerator};
use crate::store::{self, Filter, Order, RemoteStore, StoreError};

pub const PRESCRIPTIONS_TABLE: &str = "prescriptions";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    pub medication_name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub issued_date: NaiveDate,
}

/// A prescription joined with its prescriber's display name.
#[derive(Debug, Clone, PartialEq)]
pub struct PrescriptionCard {
    pub prescription: Prescription,
    pub doctor_name: String,
}

// ---------------------------------------------------------------------------
// Repository functions
// ---------------------------------------------------------------------------

/// All prescriptions for one patient, most recently issued first.
pub async fn fetch_prescriptions(
    store: &dyn RemoteStore,
    token: &str,
    patient_id: Uuid,
) -> Result<Vec<Prescription>, StoreError> {
    let rows = store
        .select(
            PRESCRIPTIONS_TABLE,
            &[Filter::eq("patient_id", patient_id)],
            Some(Order::desc("issued_date")),
            None,
            token,
        )
        .await?;
    store::rows_into(rows)
}

/// Prescriptions plus prescriber names, with one batched directory
/// lookup.
///
/// As with appointments, a failed directory lookup degrades to the
/// fallback name rather than failing the list.
pub async fn fetch_prescription_cards(
    store: &dyn RemoteStore,
    token: &str,
    patient_id: Uuid,
) -> Result<Vec<PrescriptionCard>, StoreError> {
    let prescriptions = fetch_prescriptions(store, token, patient_id).await?;
    let ids = doctors::referenced_doctor_ids(prescriptions.iter().map(|p| p.doctor_id));
    let index = match doctors::fetch_doctors_by_ids(store, token, &ids).await {
        Ok(directory) => doctors::index_doctors(directory),
        Err(e) => {
            tracing::warn!("doctor lookup failed, rendering fallback names: {e}");
            HashMap::new()
        }
    };
    Ok(enrich_with_doctors(prescriptions, &index))
}

pub fn enrich_with_doctors(
    prescriptions: Vec<Prescription>,
    index: &HashMap<Uuid, Doctor>,
) -> Vec<PrescriptionCard> {
    prescriptions
        .into_iter()
        .map(|prescription| {
            let doctor_name = doctors::doctor_display_name(index, prescription.doctor_id);
            PrescriptionCard {
                prescription,
                doctor_name,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Explanation
// ---------------------------------------------------------------------------

/// Prompt asking the AI service to restate a prescription for the
/// patient.
pub fn explanation_prompt(prescription: &Prescription) -> String {
    let dosage = prescription.dosage.as_deref().unwrap_or("Not specified");
    let instructions = prescription
        .instructions
        .as_deref()
        .unwrap_or("Not specified");
    format!(
        "Explain the following prescription in simple, patient-friendly terms. \
         Medication: {}. Dosage: {dosage}. Instructions: {instructions}. \
         Keep the explanation short and avoid medical jargon.",
        prescription.medication_name
    )
}

/// Ask the AI service for a plain-language explanation of one
/// prescription.
pub async fn explain_prescription(
    client: &dyn TextGenerator,
    prescription: &Prescription,
) -> Result<String, GenAiError> {
    let prompt = explanation_prompt(prescription);
    genai::generate_with_retry(client, &prompt, genai::DEFAULT_RETRY).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
