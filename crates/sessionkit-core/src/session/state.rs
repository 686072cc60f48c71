use crate::models::User;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing has looked at the stored tokens yet
    #[default]
    Uninitialized,
    /// Stored tokens found; current-user lookup in flight
    Restoring,
    Authenticated(User),
    Unauthenticated,
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// In-memory session snapshot as published to observers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub state: SessionState,
    pub loading: bool,
}

impl Session {
    pub fn user(&self) -> Option<&User> {
        self.state.user()
    }
}
