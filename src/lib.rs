pub mod api; // Meeting provisioning HTTP service
pub mod config;
pub mod auth; // Hosted auth client
pub mod store; // Hosted datastore client
pub mod genai; // Gemini text generation
pub mod session; // Session store + change propagation
pub mod navigator;
pub mod resource; // Per-screen fetch state
pub mod doctors;
pub mod appointments;
pub mod prescriptions;
pub mod profile;
pub mod dashboard;
pub mod assistant; // AI chat + health tips
pub mod video;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries and integration harnesses.
///
/// `RUST_LOG` wins when set; otherwise the app default filter applies.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}
