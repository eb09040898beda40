//! Application constants and environment-derived settings.

/// Application-level constants
pub const APP_NAME: &str = "Curalink";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Gemini model used for all assistant completions.
pub const GEMINI_MODEL: &str = "gemini-2.0-flash-001";

/// Subdomain for Daily.co video rooms.
pub const DAILY_SUBDOMAIN: &str = "curalink";

/// Default port for the meeting service.
pub const DEFAULT_MEETING_PORT: u16 = 4000;

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "info,curalink_lib=debug"
}

/// Settings for the hosted datastore and auth service.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub anon_key: String,
}

/// Settings for the meeting service and its Zoom upstream.
#[derive(Debug, Clone)]
pub struct MeetingConfig {
    pub port: u16,
    pub zoom_account_id: String,
    pub zoom_client_id: String,
    pub zoom_client_secret: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),
}

impl RemoteConfig {
    /// Read from SUPABASE_URL / SUPABASE_ANON_KEY.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Lookup-injected constructor so tests never mutate process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            base_url: require(&lookup, "SUPABASE_URL")?,
            anon_key: require(&lookup, "SUPABASE_ANON_KEY")?,
        })
    }
}

impl MeetingConfig {
    /// Read from MEETING_PORT (optional) and the ZOOM_* credentials.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("MEETING_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidVar("MEETING_PORT", raw))?,
            None => DEFAULT_MEETING_PORT,
        };

        Ok(Self {
            port,
            zoom_account_id: require(&lookup, "ZOOM_ACCOUNT_ID")?,
            zoom_client_id: require(&lookup, "ZOOM_CLIENT_ID")?,
            zoom_client_secret: require(&lookup, "ZOOM_CLIENT_SECRET")?,
        })
    }
}

fn require<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(key)),
    }
}
