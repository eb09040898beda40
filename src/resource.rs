//! Resource loader — the one fetch/loading/error/refresh abstraction
//! shared by every screen.
//!
//! Each screen owns one loader; loaders never share state. A load needs
//! a live session before it issues anything, replaces data wholesale on
//! success, and keeps stale data on failure. Results landing after the
//! session changed or after a newer load started are discarded, never
//! committed into the wrong scope.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::auth::Session;
use crate::session::SessionState;

/// Per-screen view state for one fetched resource.
#[derive(Debug, Clone)]
pub struct Resource<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Resource<T> {
    fn idle() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

/// What a finished load did to the resource state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fetched data committed.
    Loaded,
    /// Error recorded; previous data kept.
    Failed,
    /// Result thrown away: session changed mid-flight or a newer load
    /// superseded this one.
    Discarded,
}

/// Shown when a fetch is attempted with no authenticated user.
const NO_SESSION_MESSAGE: &str = "No active session";

pub struct ResourceLoader<T> {
    tx: watch::Sender<Resource<T>>,
    generation: AtomicU64,
}

impl<T: Clone> ResourceLoader<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Resource::idle());
        Self {
            tx,
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Resource<T>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Resource<T> {
        self.tx.borrow().clone()
    }

    /// Run one fetch scoped to the current session.
    ///
    /// Fails immediately, without calling `fetch`, when no session is
    /// available. Otherwise flips `loading` on, awaits the fetch, and
    /// commits the result only if this load is still the newest and the
    /// session still names the same user.
    pub async fn load<F, Fut, E>(
        &self,
        session_rx: &watch::Receiver<SessionState>,
        fetch: F,
    ) -> LoadOutcome
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let Some(session) = session_rx.borrow().session.clone() else {
            self.tx.send_modify(|r| {
                r.loading = false;
                r.error = Some(NO_SESSION_MESSAGE.to_string());
            });
            return LoadOutcome::Failed;
        };
        let user_id = session.user_id;

        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_modify(|r| {
            r.loading = true;
            r.error = None;
        });

        let result = fetch(session).await;

        // A newer load owns the state now; this result is dead either way.
        if self.generation.load(Ordering::SeqCst) != my_generation {
            return LoadOutcome::Discarded;
        }

        // Session went away or switched users mid-flight: never write a
        // result into a scope that no longer holds.
        if session_rx.borrow().user_id() != Some(user_id) {
            self.tx.send_modify(|r| r.loading = false);
            tracing::debug!("discarding fetch result after session change");
            return LoadOutcome::Discarded;
        }

        match result {
            Ok(data) => {
                self.tx.send_modify(|r| {
                    r.data = Some(data);
                    r.loading = false;
                    r.error = None;
                });
                LoadOutcome::Loaded
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!("resource fetch failed: {message}");
                self.tx.send_modify(|r| {
                    r.loading = false;
                    r.error = Some(message);
                });
                LoadOutcome::Failed
            }
        }
    }

    /// Explicit refresh trigger; same semantics as the initial load.
    pub async fn refresh<F, Fut, E>(
        &self,
        session_rx: &watch::Receiver<SessionState>,
        fetch: F,
    ) -> LoadOutcome
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.load(session_rx, fetch).await
    }
}

impl<T: Clone> Default for ResourceLoader<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockAuth;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tokio::sync::oneshot;
    use uuid::Uuid;

    fn session_channel(
        state: SessionState,
    ) -> (watch::Sender<SessionState>, watch::Receiver<SessionState>) {
        watch::channel(state)
    }

    fn live_session() -> SessionState {
        SessionState {
            session: Some(MockAuth::test_session(Uuid::new_v4())),
            loading: false,
        }
    }

    fn no_session() -> SessionState {
        SessionState {
            session: None,
            loading: false,
        }
    }

    #[tokio::test]
    async fn load_commits_fetched_data() {
        let (_tx, rx) = session_channel(live_session());
        let loader = ResourceLoader::<Vec<i32>>::new();

        let outcome = loader
            .load(&rx, |_s| async { Ok::<_, std::io::Error>(vec![1, 2, 3]) })
            .await;

        assert_eq!(outcome, LoadOutcome::Loaded);
        let state = loader.snapshot();
        assert_eq!(state.data, Some(vec![1, 2, 3]));
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn reload_replaces_wholesale() {
        let (_tx, rx) = session_channel(live_session());
        let loader = ResourceLoader::<Vec<i32>>::new();

        loader
            .load(&rx, |_s| async { Ok::<_, std::io::Error>(vec![1, 2]) })
            .await;
        loader
            .load(&rx, |_s| async { Ok::<_, std::io::Error>(vec![9]) })
            .await;

        // Replaced, never merged.
        assert_eq!(loader.snapshot().data, Some(vec![9]));
    }

    #[tokio::test]
    async fn failure_keeps_previous_data() {
        let (_tx, rx) = session_channel(live_session());
        let loader = ResourceLoader::<Vec<i32>>::new();

        loader
            .load(&rx, |_s| async { Ok::<_, std::io::Error>(vec![1, 2]) })
            .await;
        let outcome = loader
            .load(&rx, |_s| async {
                Err::<Vec<i32>, _>(std::io::Error::other("network down"))
            })
            .await;

        assert_eq!(outcome, LoadOutcome::Failed);
        let state = loader.snapshot();
        assert_eq!(state.data, Some(vec![1, 2]));
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("network down"));
    }

    #[tokio::test]
    async fn no_session_fails_without_fetching() {
        let (_tx, rx) = session_channel(no_session());
        let loader = ResourceLoader::<Vec<i32>>::new();
        let fetched = Arc::new(AtomicBool::new(false));

        let flag = fetched.clone();
        let outcome = loader
            .load(&rx, move |_s| async move {
                flag.store(true, Ordering::SeqCst);
                Ok::<_, std::io::Error>(vec![1])
            })
            .await;

        assert_eq!(outcome, LoadOutcome::Failed);
        assert!(!fetched.load(Ordering::SeqCst), "fetch must not be issued");
        let state = loader.snapshot();
        assert!(state.data.is_none());
        assert_eq!(state.error.as_deref(), Some(NO_SESSION_MESSAGE));
    }

    #[tokio::test]
    async fn empty_result_is_success_not_error() {
        let (_tx, rx) = session_channel(live_session());
        let loader = ResourceLoader::<Vec<i32>>::new();

        loader
            .load(&rx, |_s| async { Ok::<_, std::io::Error>(vec![]) })
            .await;

        let state = loader.snapshot();
        assert_eq!(state.data, Some(vec![]));
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn loading_flag_tracks_inflight_fetch() {
        let (_tx, rx) = session_channel(live_session());
        let loader = Arc::new(ResourceLoader::<Vec<i32>>::new());
        let mut states = loader.subscribe();
        let (gate_tx, gate_rx) = oneshot::channel::<()>();

        let task = tokio::spawn({
            let loader = loader.clone();
            let rx = rx.clone();
            async move {
                loader
                    .load(&rx, |_s| async move {
                        gate_rx.await.ok();
                        Ok::<_, std::io::Error>(vec![7])
                    })
                    .await
            }
        });

        states.changed().await.unwrap();
        assert!(states.borrow().loading);

        gate_tx.send(()).unwrap();
        let outcome = task.await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert!(!loader.snapshot().loading);
    }

    #[tokio::test]
    async fn session_cleared_mid_flight_discards_result() {
        let (session_tx, rx) = session_channel(live_session());
        let loader = Arc::new(ResourceLoader::<Vec<i32>>::new());
        let (gate_tx, gate_rx) = oneshot::channel::<()>();

        let task = tokio::spawn({
            let loader = loader.clone();
            let rx = rx.clone();
            async move {
                loader
                    .load(&rx, |_s| async move {
                        gate_rx.await.ok();
                        Ok::<_, std::io::Error>(vec![7])
                    })
                    .await
            }
        });

        // Let the load reach its fetch, then sign out under it.
        tokio::task::yield_now().await;
        session_tx.send_replace(no_session());
        gate_tx.send(()).unwrap();

        let outcome = task.await.unwrap();
        assert_eq!(outcome, LoadOutcome::Discarded);
        let state = loader.snapshot();
        assert!(state.data.is_none(), "stale result must not be committed");
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn superseded_load_is_discarded() {
        let (_tx, rx) = session_channel(live_session());
        let loader = Arc::new(ResourceLoader::<Vec<i32>>::new());
        let (gate_tx, gate_rx) = oneshot::channel::<()>();

        let slow = tokio::spawn({
            let loader = loader.clone();
            let rx = rx.clone();
            async move {
                loader
                    .load(&rx, |_s| async move {
                        gate_rx.await.ok();
                        Ok::<_, std::io::Error>(vec![1])
                    })
                    .await
            }
        });

        // Give the slow load time to start, then run a fresh one to completion.
        tokio::task::yield_now().await;
        loader
            .load(&rx, |_s| async { Ok::<_, std::io::Error>(vec![2]) })
            .await;

        gate_tx.send(()).unwrap();
        let outcome = slow.await.unwrap();

        assert_eq!(outcome, LoadOutcome::Discarded);
        assert_eq!(loader.snapshot().data, Some(vec![2]));
    }
}
