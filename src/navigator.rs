//! Session-gated navigation — one decision point for which screens are
//! reachable.
//!
//! Two screen graphs, never active at once. The navigator derives its
//! state from the session store and refuses to enter any screen outside
//! the active graph; screens themselves never check the session. While
//! the initial restore is pending, neither graph is active, so there is
//! no flash of the wrong graph.

use serde::{Deserialize, Serialize};

use crate::session::SessionState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Every screen in the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    // Unauthenticated graph
    Welcome,
    Login,
    Signup,
    // Authenticated graph
    Dashboard,
    Appointments,
    BookAppointment,
    Prescriptions,
    PrescriptionDetail,
    Profile,
    HealthDetails,
    HealthHistory,
    Recommendations,
    Assistant,
    VideoCall,
}

impl Screen {
    /// All screens, for exhaustive reachability checks.
    pub const ALL: &'static [Screen] = &[
        Screen::Welcome,
        Screen::Login,
        Screen::Signup,
        Screen::Dashboard,
        Screen::Appointments,
        Screen::BookAppointment,
        Screen::Prescriptions,
        Screen::PrescriptionDetail,
        Screen::Profile,
        Screen::HealthDetails,
        Screen::HealthHistory,
        Screen::Recommendations,
        Screen::Assistant,
        Screen::VideoCall,
    ];

    pub fn requires_session(&self) -> bool {
        !matches!(self, Screen::Welcome | Screen::Login | Screen::Signup)
    }
}

/// Which graph is active, derived from the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    /// Initial restore pending: neither graph, indicator only.
    Loading,
    Unauthenticated,
    Authenticated,
}

impl NavState {
    pub fn from_session(state: &SessionState) -> Self {
        if state.loading {
            NavState::Loading
        } else if state.session.is_some() {
            NavState::Authenticated
        } else {
            NavState::Unauthenticated
        }
    }

    /// Whether a screen belongs to the active graph.
    pub fn permits(&self, screen: Screen) -> bool {
        match self {
            NavState::Loading => false,
            NavState::Unauthenticated => !screen.requires_session(),
            NavState::Authenticated => screen.requires_session(),
        }
    }

    /// Where the graph opens after a transition.
    pub fn entry_screen(&self) -> Option<Screen> {
        match self {
            NavState::Loading => None,
            NavState::Unauthenticated => Some(Screen::Welcome),
            NavState::Authenticated => Some(Screen::Dashboard),
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum NavError {
    #[error("Screen {screen:?} is not reachable while {state:?}")]
    Unreachable { screen: Screen, state: NavState },
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// Tracks the current screen and enforces graph membership centrally.
pub struct Navigator {
    state: NavState,
    current: Option<Screen>,
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            state: NavState::Loading,
            current: None,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn current(&self) -> Option<Screen> {
        self.current
    }

    /// Re-derive the active graph from session state.
    ///
    /// On every transition the current screen jumps to the new graph's
    /// entry, so a screen from the old graph can never stay visible.
    pub fn resolve(&mut self, session: &SessionState) -> NavState {
        let derived = NavState::from_session(session);
        if derived != self.state {
            tracing::info!(from = ?self.state, to = ?derived, "navigation graph switched");
            self.state = derived;
            self.current = derived.entry_screen();
        }
        self.state
    }

    /// Move within the active graph.
    pub fn navigate(&mut self, screen: Screen) -> Result<(), NavError> {
        if !self.state.permits(screen) {
            return Err(NavError::Unreachable {
                screen,
                state: self.state,
            });
        }
        self.current = Some(screen);
        Ok(())
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockAuth;
    use uuid::Uuid;

    fn authenticated_state() -> SessionState {
        SessionState {
            session: Some(MockAuth::test_session(Uuid::new_v4())),
            loading: false,
        }
    }

    fn unauthenticated_state() -> SessionState {
        SessionState {
            session: None,
            loading: false,
        }
    }

    fn loading_state() -> SessionState {
        SessionState {
            session: None,
            loading: true,
        }
    }

    #[test]
    fn loading_permits_no_screen() {
        for &screen in Screen::ALL {
            assert!(!NavState::Loading.permits(screen));
        }
        assert_eq!(NavState::Loading.entry_screen(), None);
    }

    #[test]
    fn unauthenticated_permits_exactly_the_public_graph() {
        for &screen in Screen::ALL {
            assert_eq!(
                NavState::Unauthenticated.permits(screen),
                !screen.requires_session(),
            );
        }
    }

    #[test]
    fn authenticated_permits_exactly_the_private_graph() {
        for &screen in Screen::ALL {
            assert_eq!(
                NavState::Authenticated.permits(screen),
                screen.requires_session(),
            );
        }
    }

    #[test]
    fn graphs_are_disjoint() {
        // No screen is reachable from both graphs.
        for &screen in Screen::ALL {
            assert!(
                NavState::Unauthenticated.permits(screen)
                    != NavState::Authenticated.permits(screen)
            );
        }
    }

    #[test]
    fn resolve_maps_session_states() {
        let mut nav = Navigator::new();
        assert_eq!(nav.resolve(&loading_state()), NavState::Loading);
        assert_eq!(nav.resolve(&unauthenticated_state()), NavState::Unauthenticated);
        assert_eq!(nav.resolve(&authenticated_state()), NavState::Authenticated);
    }

    #[test]
    fn sign_in_jumps_to_dashboard() {
        let mut nav = Navigator::new();
        nav.resolve(&unauthenticated_state());
        assert_eq!(nav.current(), Some(Screen::Welcome));

        nav.resolve(&authenticated_state());
        assert_eq!(nav.current(), Some(Screen::Dashboard));
    }

    #[test]
    fn sign_out_jumps_to_welcome_from_any_screen() {
        let mut nav = Navigator::new();
        nav.resolve(&authenticated_state());
        nav.navigate(Screen::Prescriptions).unwrap();

        nav.resolve(&unauthenticated_state());
        assert_eq!(nav.current(), Some(Screen::Welcome));
        assert_eq!(nav.state(), NavState::Unauthenticated);
    }

    #[test]
    fn navigate_within_active_graph() {
        let mut nav = Navigator::new();
        nav.resolve(&authenticated_state());

        nav.navigate(Screen::Appointments).unwrap();
        assert_eq!(nav.current(), Some(Screen::Appointments));

        nav.navigate(Screen::VideoCall).unwrap();
        assert_eq!(nav.current(), Some(Screen::VideoCall));
    }

    #[test]
    fn navigate_across_graphs_is_rejected() {
        let mut nav = Navigator::new();
        nav.resolve(&unauthenticated_state());

        let err = nav.navigate(Screen::Dashboard).unwrap_err();
        assert_eq!(
            err,
            NavError::Unreachable {
                screen: Screen::Dashboard,
                state: NavState::Unauthenticated,
            }
        );
        // Current screen unchanged by the rejected move.
        assert_eq!(nav.current(), Some(Screen::Welcome));

        nav.resolve(&authenticated_state());
        assert!(nav.navigate(Screen::Login).is_err());
    }

    #[test]
    fn resolve_keeps_screen_when_state_unchanged() {
        let mut nav = Navigator::new();
        nav.resolve(&authenticated_state());
        nav.navigate(Screen::Profile).unwrap();

        // Same graph again (e.g. token refresh): no jump.
        nav.resolve(&authenticated_state());
        assert_eq!(nav.current(), Some(Screen::Profile));
    }

    #[test]
    fn while_loading_nothing_is_navigable() {
        let mut nav = Navigator::new();
        nav.resolve(&loading_state());
        assert_eq!(nav.current(), None);
        assert!(nav.navigate(Screen::Welcome).is_err());
        assert!(nav.navigate(Screen::Dashboard).is_err());
    }
}
