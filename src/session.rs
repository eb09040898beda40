//! Session store — single source of truth for "is there an authenticated
//! user, and who."
//!
//! State is published through a watch channel: the navigator and every
//! resource loader hold a receiver and see sign-in, sign-out, and token
//! refresh the moment the auth service reports them, with no manual
//! refresh. `loading` is true only from construction until the first
//! restore attempt resolves; absence of a session is a valid terminal
//! state, not an error.

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::auth::{AuthClient, Session};

/// Session state visible to every consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub session: Option<Session>,
    pub loading: bool,
}

impl SessionState {
    fn restoring() -> Self {
        Self {
            session: None,
            loading: true,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.user_id)
    }

    pub fn is_authenticated(&self) -> bool {
        !self.loading && self.session.is_some()
    }
}

/// Holds the one live session and propagates every change.
///
/// The owner calls `initialize` once at startup and `teardown` when the
/// app root goes away; `Drop` also tears down, so no exit path can leave
/// the change listener running against a dead store.
pub struct SessionStore {
    tx: watch::Sender<SessionState>,
    listener: Option<JoinHandle<()>>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::restoring());
        Self { tx, listener: None }
    }

    /// Receiver for the navigator and resource loaders.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Restore the persisted session and start forwarding change events.
    ///
    /// A restore failure is not an error: the store fails open to the
    /// unauthenticated state and logs the cause. Either way `loading`
    /// ends false and never flips back.
    pub async fn initialize(&mut self, auth: &dyn AuthClient) {
        if self.listener.is_some() {
            tracing::warn!("session store initialized twice, replacing listener");
            self.teardown();
        }

        // Subscribe before the restore call so a change landing mid-restore
        // is buffered rather than lost.
        let events = auth.session_events();

        let restored = match auth.current_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("session restore failed, continuing unauthenticated: {e}");
                None
            }
        };

        match &restored {
            Some(session) => tracing::info!(user_id = %session.user_id, "session restored"),
            None => tracing::info!("no persisted session"),
        }
        self.tx.send_replace(SessionState {
            session: restored,
            loading: false,
        });

        self.listener = Some(spawn_listener(self.tx.clone(), events));
    }

    /// Stop acting on auth change events. Safe to call more than once;
    /// only the first call does anything.
    pub fn teardown(&mut self) {
        match self.listener.take() {
            Some(handle) => {
                handle.abort();
                tracing::info!("session store torn down");
            }
            None => tracing::debug!("session store teardown with no active listener"),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Forward auth change events into the watch channel until the auth
/// client goes away or the listener is aborted.
fn spawn_listener(
    tx: watch::Sender<SessionState>,
    mut events: broadcast::Receiver<Option<Session>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(session) => {
                    match &session {
                        Some(s) => tracing::info!(user_id = %s.user_id, "session changed"),
                        None => tracing::info!("session cleared"),
                    }
                    tx.send_replace(SessionState {
                        session,
                        loading: false,
                    });
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // The next recv returns the newest buffered event, which
                    // is the only one that matters for current state.
                    tracing::warn!(missed, "session event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
