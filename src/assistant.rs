//! AI assistant — patient-aware chat and daily health tips.
//!
//! One `AssistantSession` lives as long as its screen. A single ask is
//! in flight at a time; the transcript gains the question immediately
//! and the reply only when generation succeeds, so a failed ask never
//! leaves a half-written exchange behind.

use std::sync::Mutex;

use crate::genai::{self, GenAiError, TextGenerator};
use crate::profile::PatientProfile;

/// How many tips a tips request asks for.
pub const TIP_COUNT: usize = 5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantMessage {
    pub text: String,
    pub from_user: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Ask a question first")]
    EmptyQuestion,
    #[error("The assistant is still answering the previous question")]
    RequestInFlight,
    #[error(transparent)]
    Generation(#[from] GenAiError),
    #[error("Internal lock poisoned")]
    LockPoisoned,
}

#[derive(Default)]
struct Inner {
    transcript: Vec<AssistantMessage>,
    in_flight: bool,
}

/// One conversation with the assistant.
#[derive(Default)]
pub struct AssistantSession {
    inner: Mutex<Inner>,
}

/// Clears the in-flight flag when the ask ends, however it ends.
struct InFlightGuard<'a> {
    session: &'a AssistantSession,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.session.inner.lock() {
            inner.in_flight = false;
        }
    }
}

impl AssistantSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> Vec<AssistantMessage> {
        match self.inner.lock() {
            Ok(inner) => inner.transcript.clone(),
            Err(_) => {
                tracing::error!("assistant transcript lock poisoned");
                Vec::new()
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        match self.inner.lock() {
            Ok(inner) => inner.in_flight,
            Err(_) => false,
        }
    }

    /// Ask one question. The question joins the transcript right away;
    /// the reply is appended only if generation succeeds.
    pub async fn ask(
        &self,
        client: &dyn TextGenerator,
        profile: Option<&PatientProfile>,
        question: &str,
    ) -> Result<String, AssistantError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AssistantError::EmptyQuestion);
        }

        {
            let mut inner = self.inner.lock().map_err(|_| AssistantError::LockPoisoned)?;
            if inner.in_flight {
                return Err(AssistantError::RequestInFlight);
            }
            inner.in_flight = true;
            inner.transcript.push(AssistantMessage {
                text: question.to_string(),
                from_user: true,
            });
        }
        let _guard = InFlightGuard { session: self };

        let prompt = chat_prompt(profile, question);
        let reply = genai::generate_with_retry(client, &prompt, genai::DEFAULT_RETRY).await?;

        let mut inner = self.inner.lock().map_err(|_| AssistantError::LockPoisoned)?;
        inner.transcript.push(AssistantMessage {
            text: reply.clone(),
            from_user: false,
        });
        Ok(reply)
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

fn chat_prompt(profile: Option<&PatientProfile>, question: &str) -> String {
    let mut prompt = String::from(
        "You are a friendly health assistant for Curalink patients. \
         Answer briefly and in plain language, and advise seeing a doctor \
         for anything serious.",
    );
    let context = patient_context(profile);
    if !context.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(&context);
    }
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(question);
    prompt
}

/// One-line patient summary prefixed to assistant prompts.
pub fn patient_context(profile: Option<&PatientProfile>) -> String {
    let Some(profile) = profile else {
        return String::new();
    };

    let age = profile
        .age()
        .map(|a| a.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let gender = non_empty(profile.gender.as_deref()).unwrap_or("Unknown");
    let conditions = non_empty(profile.health_history.as_deref()).unwrap_or("None");
    let allergies = non_empty(profile.allergies.as_deref()).unwrap_or("None");

    format!(
        "Patient Info: Name: {}, Age: {age}, Gender: {gender}, \
         Known Conditions: {conditions}, Allergies: {allergies}.",
        profile.full_name
    )
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Health tips
// ---------------------------------------------------------------------------

/// Fetch a fresh set of one-line health tips, personalized when a
/// profile is available.
pub async fn health_tips(
    client: &dyn TextGenerator,
    profile: Option<&PatientProfile>,
) -> Result<Vec<String>, GenAiError> {
    let mut prompt = format!(
        "Give exactly {TIP_COUNT} short, practical daily health tips. \
         One tip per line, no introduction and no closing line."
    );
    let context = patient_context(profile);
    if !context.is_empty() {
        prompt.push_str(" Personalize them for this patient.\n\n");
        prompt.push_str(&context);
    }

    let text = genai::generate_with_retry(client, &prompt, genai::DEFAULT_RETRY).await?;
    Ok(parse_tips(&text))
}

/// Split a reply into clean tips, tolerating bullets and numbering.
fn parse_tips(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .take(TIP_COUNT)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim().trim_start_matches(['-', '*', '•']).trim_start();
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
    }
    line
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
