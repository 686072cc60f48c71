//! Application wiring for the command-line front end.
//!
//! Builds the transport, gateway, token store, session manager and
//! authenticated client from the loaded configuration, and implements
//! each subcommand on top of them.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use sessionkit_core::session::guard::LOGIN_PATH;
use sessionkit_core::{
    AuthenticatedClient, Config, Credentials, HttpAuthGateway, ReqwestTransport, RouteDecision,
    RouteGuard, SessionManager, SessionState,
};

/// Environment variables consulted before prompting
const USERNAME_ENV: &str = "SESSIONKIT_USERNAME";
const PASSWORD_ENV: &str = "SESSIONKIT_PASSWORD";

pub struct App {
    pub config: Config,
    pub session: SessionManager,
    pub client: AuthenticatedClient,
    pub guard: RouteGuard,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        debug!(base_url = %config.base_url, store = %config.token_store, "Building app");

        let transport = Arc::new(
            ReqwestTransport::new(config.request_timeout())
                .context("Failed to create HTTP client")?,
        );
        let gateway = HttpAuthGateway::new(transport.clone(), config.base_url.clone())
            .with_login_user(config.login_user());
        let store = config.token_store()?;

        let session = SessionManager::new(Arc::new(gateway), store);
        let client = session
            .client(transport)
            .with_base_url(config.base_url.clone());

        Ok(Self {
            config,
            session,
            client,
            guard: RouteGuard::default(),
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub async fn login(&mut self, username: Option<String>) -> Result<()> {
        let credentials = self.prompt_credentials(username)?;

        let user = self
            .session
            .login(&credentials)
            .await
            .context("Login failed")?;

        self.remember_username(&user.username);
        println!("Logged in as {} (id {})", user.username, user.id);
        Ok(())
    }

    pub async fn register(&mut self, username: Option<String>) -> Result<()> {
        let credentials = self.prompt_credentials(username)?;

        let user = self
            .session
            .register(&credentials)
            .await
            .context("Registration failed")?;

        self.remember_username(&user.username);
        println!("Registered and logged in as {} (id {})", user.username, user.id);
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.session.logout().await;
        println!("Logged out");
        Ok(())
    }

    // =========================================================================
    // Session queries
    // =========================================================================

    pub async fn whoami(&self) -> Result<()> {
        match self.session.initialize().await {
            SessionState::Authenticated(user) => {
                println!("[{}] {}", user.initial(), user.username);
                println!("  id:      {}", user.id);
                println!("  created: {}", user.created_at.format("%Y-%m-%d %H:%M UTC"));
            }
            _ => println!("Not logged in"),
        }
        Ok(())
    }

    /// Local view only: no network traffic.
    pub fn status(&self) -> Result<()> {
        println!("Server:        {}", self.config.base_url);
        println!("Token store:   {}", self.config.token_store);
        println!(
            "Tokens stored: {}",
            if self.session.is_authenticated() { "yes" } else { "no" }
        );
        println!("Start at:      {}", self.guard.entry_point(&self.session));
        if !self.session.is_authenticated() {
            println!("Not logged in");
        }
        Ok(())
    }

    pub fn route(&self, path: &str) -> Result<()> {
        match self.guard.check(path, &self.session) {
            RouteDecision::Allow => println!("allow {}", path),
            RouteDecision::Redirect(to) => println!("redirect {} -> {}", path, to),
        }
        Ok(())
    }

    // =========================================================================
    // Authenticated requests
    // =========================================================================

    pub async fn get(&self, path: &str) -> Result<()> {
        let response = self
            .client
            .get(path)
            .await
            .with_context(|| format!("Request to {} failed", path))?;

        eprintln!("{}", response.status);
        println!("{}", response.text());

        if response.is_unauthorized() {
            eprintln!("Session expired - run `sessionkit login` (see {})", LOGIN_PATH);
        }
        Ok(())
    }

    pub async fn live(&self) -> Result<()> {
        let data = self
            .client
            .live_data()
            .await
            .context("Failed to fetch live data")?;

        let m = &data.system_metrics;
        println!("Server time:  {}", data.server_time);
        println!("Counter:      {}", data.counter);
        println!("Last updated: {}", data.last_updated);
        println!("Runtime:      {} on {}", m.go_version, m.platform());
        println!("Uptime:       {}", m.uptime);
        println!("CPUs:         {}  goroutines: {}", m.num_cpu, m.num_goroutines);
        println!(
            "Memory:       {:.1} MB alloc / {:.1} MB total / {:.1} MB sys  ({} GC runs)",
            m.memory_alloc_mb, m.memory_total_mb, m.memory_sys_mb, m.gc_runs
        );
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn prompt_credentials(&self, username: Option<String>) -> Result<Credentials> {
        let username = match username.or_else(|| std::env::var(USERNAME_ENV).ok()) {
            Some(u) => u,
            None => self.prompt_username()?,
        };

        let password = match std::env::var(PASSWORD_ENV) {
            Ok(p) => p,
            Err(_) => rpassword::prompt_password("Password: ")?,
        };

        Ok(Credentials::new(username, password))
    }

    fn prompt_username(&self) -> Result<String> {
        match self.config.last_username {
            Some(ref last_user) => print!("Username [{}]: ", last_user),
            None => print!("Username: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        Ok(match (&self.config.last_username, input.is_empty()) {
            (Some(last_user), true) => last_user.clone(),
            _ => input.to_string(),
        })
    }

    fn remember_username(&mut self, username: &str) {
        self.config.last_username = Some(username.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }
}
