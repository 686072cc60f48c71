use super::SessionManager;

/// Default redirect target for unauthenticated visitors
pub const LOGIN_PATH: &str = "/login";

/// Landing view for signed-in users
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(String),
}

/// Decides whether a view may be shown, based on the optimistic
/// `is_authenticated` check.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
    home_path: String,
    protected: Vec<String>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(LOGIN_PATH).protect(DASHBOARD_PATH)
    }
}

impl RouteGuard {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
            home_path: DASHBOARD_PATH.to_string(),
            protected: Vec::new(),
        }
    }

    /// Require a session for `path` and everything beneath it.
    pub fn protect(mut self, path: impl Into<String>) -> Self {
        self.protected.push(path.into());
        self
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.protected.iter().any(|p| {
            path == p
                || path
                    .strip_prefix(p.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub fn check(&self, path: &str, session: &SessionManager) -> RouteDecision {
        self.decide(path, session.is_authenticated())
    }

    /// Where a "get started" action should lead.
    pub fn entry_point(&self, session: &SessionManager) -> &str {
        if session.is_authenticated() {
            &self.home_path
        } else {
            &self.login_path
        }
    }

    fn decide(&self, path: &str, authenticated: bool) -> RouteDecision {
        if !self.is_protected(path) || authenticated {
            RouteDecision::Allow
        } else {
            RouteDecision::Redirect(self.login_path.clone())
        }
    }
}
