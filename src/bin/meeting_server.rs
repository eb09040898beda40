//! Standalone meeting provisioning server.
//!
//! Reads Zoom and datastore credentials from the environment, then serves
//! `POST /create-meeting` until interrupted.

use std::sync::Arc;

use curalink_lib::api::zoom::ZoomClient;
use curalink_lib::api::{start_meeting_server, ApiContext};
use curalink_lib::config::{MeetingConfig, RemoteConfig};
use curalink_lib::store::PostgrestStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    curalink_lib::init_tracing();

    let meeting_config = MeetingConfig::from_env()?;
    let remote_config = RemoteConfig::from_env()?;

    let ctx = ApiContext::new(
        Arc::new(ZoomClient::from_config(&meeting_config)),
        Arc::new(PostgrestStore::from_config(&remote_config)),
        remote_config.anon_key.clone(),
    );

    let mut server = start_meeting_server(ctx, meeting_config.port).await?;
    tracing::info!(addr = %server.addr, "meeting server ready");

    tokio::signal::ctrl_c().await?;
    server.shutdown();

    Ok(())
}
