use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{Session, SessionState, TokenRefresher};
use crate::api::{AuthError, AuthGateway, AuthenticatedClient, Transport};
use crate::auth::TokenStore;
use crate::models::{AuthSession, Credentials, TokenPair, User};

/// Owns the session state machine.
///
/// States move `Uninitialized -> Restoring | Unauthenticated` on
/// [`initialize`](Self::initialize), to `Authenticated` on login,
/// registration or successful restoration, and back to `Unauthenticated`
/// on logout or when the stored tokens turn out to be unusable.
pub struct SessionManager {
    gateway: Arc<dyn AuthGateway>,
    store: Arc<dyn TokenStore>,
    refresher: TokenRefresher,
    session: Arc<watch::Sender<Session>>,
}

/// What `initialize` should do after its atomic state check.
enum Startup {
    Restore,
    AwaitRestore,
    Settled,
}

/// Sets `loading` for the lifetime of an operation, including when the
/// operation's future is dropped early.
struct LoadingGuard<'a> {
    session: &'a watch::Sender<Session>,
}

impl<'a> LoadingGuard<'a> {
    fn start(session: &'a watch::Sender<Session>) -> Self {
        session.send_if_modified(|s| !std::mem::replace(&mut s.loading, true));
        Self { session }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.session
            .send_if_modified(|s| std::mem::replace(&mut s.loading, false));
    }
}

impl SessionManager {
    pub fn new(gateway: Arc<dyn AuthGateway>, store: Arc<dyn TokenStore>) -> Self {
        let (tx, _rx) = watch::channel(Session::default());
        let session = Arc::new(tx);
        let refresher = TokenRefresher::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            Arc::clone(&session),
        );

        Self {
            gateway,
            store,
            refresher,
            session,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Optimistic check: tokens are stored. Restoration may still fail.
    pub fn is_authenticated(&self) -> bool {
        self.store.has_tokens()
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.borrow().user().cloned()
    }

    pub fn loading(&self) -> bool {
        self.session.borrow().loading
    }

    pub fn state(&self) -> SessionState {
        self.session.borrow().state.clone()
    }

    /// Observe every published transition.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    /// Request client sharing this session's token store and refresher.
    pub fn client(&self, transport: Arc<dyn Transport>) -> AuthenticatedClient {
        AuthenticatedClient::new(transport, Arc::clone(&self.store), self.refresher.clone())
    }

    // =========================================================================
    // Restoration
    // =========================================================================

    /// Rebuild the session from stored tokens. Call once at startup.
    ///
    /// Concurrent callers share the in-flight restoration; calls after it
    /// settled return the current state without network traffic.
    pub async fn initialize(&self) -> SessionState {
        let has_tokens = self.store.has_tokens();
        let mut startup = Startup::Settled;

        self.session.send_if_modified(|s| match s.state {
            SessionState::Uninitialized if has_tokens => {
                s.state = SessionState::Restoring;
                startup = Startup::Restore;
                true
            }
            SessionState::Uninitialized => {
                s.state = SessionState::Unauthenticated;
                true
            }
            SessionState::Restoring => {
                startup = Startup::AwaitRestore;
                false
            }
            _ => false,
        });

        match startup {
            Startup::Restore => self.restore().await,
            Startup::AwaitRestore => self.wait_for_restore().await,
            Startup::Settled => self.state(),
        }
    }

    async fn wait_for_restore(&self) -> SessionState {
        debug!("Restoration already in flight, waiting for it");
        let mut rx = self.session.subscribe();
        let state = match rx
            .wait_for(|s| s.state != SessionState::Restoring)
            .await
        {
            Ok(session) => session.state.clone(),
            // The sender lives as long as self
            Err(_) => self.state(),
        };
        state
    }

    async fn restore(&self) -> SessionState {
        let _loading = LoadingGuard::start(&self.session);

        let outcome = match self.store.get() {
            Some(tokens) => self.lookup_user(&tokens).await,
            None => Err(AuthError::Unauthorized),
        };

        let store = &self.store;
        self.session.send_if_modified(|s| {
            // A login that finished meanwhile wins over the restoration
            if s.state != SessionState::Restoring {
                return false;
            }
            match &outcome {
                Ok(user) => {
                    debug!(user_id = %user.id, "Session restored");
                    s.state = SessionState::Authenticated(user.clone());
                }
                Err(e) => {
                    debug!(error = %e, "Session restoration failed, clearing tokens");
                    store.clear();
                    s.state = SessionState::Unauthenticated;
                }
            }
            true
        });

        self.state()
    }

    /// Current-user lookup with one refresh-and-retry when the access
    /// token has expired.
    async fn lookup_user(&self, tokens: &TokenPair) -> Result<User, AuthError> {
        match self.gateway.current_user(&tokens.access_token).await {
            Err(AuthError::Unauthorized) => {
                debug!("Stored access token rejected, attempting refresh");
                let refreshed = self.refresher.refresh(&tokens.refresh_token).await?;
                self.gateway.current_user(&refreshed.access_token).await
            }
            other => other,
        }
    }

    // =========================================================================
    // Login / Register / Logout
    // =========================================================================

    pub async fn login(&self, credentials: &Credentials) -> Result<User, AuthError> {
        Self::require_complete(credentials)?;
        let _loading = LoadingGuard::start(&self.session);

        match self.gateway.login(credentials).await {
            Ok(auth) => Ok(self.establish(auth)),
            Err(e) => {
                warn!(username = %credentials.username, error = %e, "Login failed");
                Err(e)
            }
        }
    }

    pub async fn register(&self, credentials: &Credentials) -> Result<User, AuthError> {
        Self::require_complete(credentials)?;
        let _loading = LoadingGuard::start(&self.session);

        match self.gateway.register(credentials).await {
            Ok(auth) => Ok(self.establish(auth)),
            Err(e) => {
                warn!(username = %credentials.username, error = %e, "Registration failed");
                Err(e)
            }
        }
    }

    /// End the session. Local state is always cleared, even when the
    /// server cannot be reached.
    pub async fn logout(&self) {
        let _loading = LoadingGuard::start(&self.session);

        if let Some(refresh_token) = self.store.refresh_token() {
            if let Err(e) = self.gateway.logout(&refresh_token).await {
                warn!(error = %e, "Logout request failed, clearing local session anyway");
            }
        }

        self.refresher.end_session();
        self.session
            .send_modify(|s| s.state = SessionState::Unauthenticated);
        info!("Logged out");
    }

    fn require_complete(credentials: &Credentials) -> Result<(), AuthError> {
        if credentials.is_complete() {
            Ok(())
        } else {
            Err(AuthError::InvalidRequest(
                "Username and password required".to_string(),
            ))
        }
    }

    /// Persist tokens, then publish the authenticated state.
    fn establish(&self, auth: AuthSession) -> User {
        self.store.set(&auth.tokens);
        let user = auth.user;
        self.session
            .send_modify(|s| s.state = SessionState::Authenticated(user.clone()));
        info!(user_id = %user.id, username = %user.username, "Session established");
        user
    }
}
