//! Application state and command handlers.
//!
//! `App` owns the configuration, the shared session and the API client, and
//! implements each CLI command on top of them.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use discursis_core::auth::{is_session_expired, token_expiry, FileCookieJar};
use discursis_core::models::{ExportKind, ModelQuery, Project, ResetTokenStatus};
use discursis_core::{ApiClient, ApiError, Config, SessionEvent, SessionStore};

use crate::utils::format::DEFAULT_TRUNCATE_CHARS;
use crate::utils::{format_expiry, format_project_row, truncate_string};

/// Number of utterances previewed by `model`
const UTTERANCE_PREVIEW_COUNT: usize = 5;

/// Environment variable that supplies the password non-interactively
const PASSWORD_ENV: &str = "DISCURSIS_PASSWORD";

pub struct App {
    pub config: Config,
    pub session: Arc<SessionStore>,
    pub api: ApiClient,
    events: broadcast::Receiver<SessionEvent>,
}

impl App {
    /// Create the application, restoring any persisted session lazily
    pub fn new(api_url: Option<String>) -> Result<Self> {
        let mut config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        if let Some(url) = api_url {
            config.api_url = url;
        }
        debug!(api_url = %config.api_url, "Config loaded");

        let cache_dir = config.cache_dir()?;
        debug!(?cache_dir, "Cookie directory configured");

        let session = Arc::new(SessionStore::new(FileCookieJar::new(cache_dir)));
        let events = session.subscribe();
        let api = ApiClient::new(&config, session.clone())?;

        Ok(Self {
            config,
            session,
            api,
            events,
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub async fn login(&mut self, email: Option<String>) -> Result<()> {
        let email = self.resolve_email(email)?;
        let password = Self::prompt_password("Password: ")?;

        let token = self.api.login(&email, &password).await?;
        self.session.set_auth_token(&email, &token);
        self.remember_email(email);

        println!("Logged in as {}", self.session.user().unwrap_or_default());
        Ok(())
    }

    pub async fn register(&mut self, email: Option<String>) -> Result<()> {
        let email = self.resolve_email(email)?;
        let password = Self::prompt_password("Choose a password: ")?;

        let token = self.api.register(&email, &password).await?;
        self.session.set_auth_token(&email, &token);
        self.remember_email(email);

        println!("Registered and logged in as {}", self.session.user().unwrap_or_default());
        Ok(())
    }

    pub fn logout(&self) {
        self.session.clear_auth_token();
        println!("Logged out");
    }

    /// Report the stored session. The expiry shown is read from the token
    /// itself and is advisory; the server decides.
    pub fn status(&self) {
        match self.session.auth_token() {
            Some(token) => {
                let now = Utc::now();
                println!("Logged in as {}", self.session.user().unwrap_or_default());
                println!("Token {}", format_expiry(token_expiry(&token), now));
                if is_session_expired(&token, now) {
                    println!("The server will likely ask you to log in again.");
                }
            }
            None => println!("Not logged in"),
        }
    }

    pub async fn request_password_reset(&self, email: Option<String>) -> Result<()> {
        let email = self.resolve_email(email)?;
        self.api.send_reset_password_link(&email).await?;
        println!("If {} is registered, a reset link is on its way.", email);
        Ok(())
    }

    pub async fn verify_reset_token(&self, email: &str, token: &str) -> Result<()> {
        let status = self.api.verify_reset_password_token(token, email).await?;
        println!("{}", Self::describe_reset_status(status));
        Ok(())
    }

    pub async fn finish_password_reset(&self, email: &str, token: &str) -> Result<()> {
        let password = Self::prompt_password("New password: ")?;
        let status = self.api.update_password(token, email, &password).await?;
        match status {
            ResetTokenStatus::Valid => println!("Password updated. You can now log in."),
            other => println!("{}", Self::describe_reset_status(other)),
        }
        Ok(())
    }

    fn describe_reset_status(status: ResetTokenStatus) -> &'static str {
        match status {
            ResetTokenStatus::Valid => "Reset link is valid.",
            ResetTokenStatus::Invalid => "Reset link is invalid.",
            ResetTokenStatus::Expired => "Reset link has expired. Request a new one.",
        }
    }

    fn resolve_email(&self, email: Option<String>) -> Result<String> {
        if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
            return Ok(email.trim().to_string());
        }
        let last = self.config.last_email.clone().unwrap_or_default();
        let prompt = if last.is_empty() {
            "Email: ".to_string()
        } else {
            format!("Email [{}]: ", last)
        };
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();
        if input.is_empty() && !last.is_empty() {
            Ok(last)
        } else if input.is_empty() {
            Err(anyhow::anyhow!("Email required"))
        } else {
            Ok(input.to_string())
        }
    }

    fn prompt_password(prompt: &str) -> Result<String> {
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            if !password.is_empty() {
                return Ok(password);
            }
        }
        let password = rpassword::prompt_password(prompt)?;
        if password.is_empty() {
            return Err(anyhow::anyhow!("Password required"));
        }
        Ok(password)
    }

    fn remember_email(&mut self, email: String) {
        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    // =========================================================================
    // Projects
    // =========================================================================

    pub async fn list_projects(&self) -> Result<()> {
        let projects = self.api.projects().await?;
        if projects.is_empty() {
            println!("No projects yet. Upload files at {}", self.api.upload_url()?);
            return Ok(());
        }
        println!("{:>5}  {:<8}  {:<10}  NAME", "ID", "STATUS", "LANGUAGE");
        for project in &projects {
            println!("{}", format_project_row(project));
        }
        Ok(())
    }

    pub async fn show_project(&self, id: Option<i64>) -> Result<()> {
        let project = self.select_project(id).await?;
        println!("{}", serde_json::to_string_pretty(&project)?);
        Ok(())
    }

    pub async fn delete_project(&self, id: i64) -> Result<()> {
        self.api.delete_project(id).await?;
        info!(project_id = id, "Project deleted");
        println!("Deleted project {}", id);
        Ok(())
    }

    /// Resolve the project a command works on. An explicit id is fetched and
    /// becomes the current project; otherwise the session's current project
    /// is used.
    async fn select_project(&self, id: Option<i64>) -> Result<Project> {
        if let Some(id) = id {
            let project = self.api.project(id).await?;
            self.session.set_project(project);
        }
        self.session.project(&self.api).await
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    pub async fn show_model(&self, id: Option<i64>, query: &ModelQuery, json: bool) -> Result<()> {
        let project = self.select_project(id).await?;
        let model = self.api.recurrence(project.id, query).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&model)?);
            return Ok(());
        }

        println!(
            "{} ({} model): {} utterances",
            project.name,
            query.model,
            model.utterances.len()
        );
        for utterance in model.utterances.iter().take(UTTERANCE_PREVIEW_COUNT) {
            let text = utterance
                .get("text")
                .and_then(|t| t.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| utterance.to_string());
            println!("  {}", truncate_string(&text, DEFAULT_TRUNCATE_CHARS));
        }
        Ok(())
    }

    pub async fn show_cluster(&self, id: Option<i64>, cluster_type: &str) -> Result<()> {
        let project = self.select_project(id).await?;
        let cluster = self.api.cluster(project.id, cluster_type).await?;
        println!("{}", serde_json::to_string_pretty(&cluster)?);
        Ok(())
    }

    pub async fn show_similar_terms(&self, id: Option<i64>, threshold: Option<f64>) -> Result<()> {
        let project = self.select_project(id).await?;
        let similar = self.api.similar_terms(project.id, threshold).await?;
        for (lead, terms) in &similar.clusters {
            println!("{}: {}", lead, terms.join(", "));
        }
        if !similar.ignored_terms.is_empty() {
            println!("ignored: {}", similar.ignored_terms.join(", "));
        }
        Ok(())
    }

    pub async fn show_term_layout(&self, id: Option<i64>) -> Result<()> {
        let project = self.select_project(id).await?;
        let layout = self.api.term_layout(project.id).await?;
        println!("{}", serde_json::to_string_pretty(&layout)?);
        Ok(())
    }

    /// Print the export URL for the host to open
    pub async fn export(&self, id: Option<i64>, kind: ExportKind, query: &ModelQuery) -> Result<()> {
        let project = self.select_project(id).await?;
        println!("{}", self.api.export_url(project.id, kind, query)?);
        Ok(())
    }

    pub fn upload_url(&self) -> Result<()> {
        println!("{}", self.api.upload_url()?);
        Ok(())
    }

    // =========================================================================
    // Session notifications
    // =========================================================================

    /// Act on session transitions that happened while a command ran
    pub fn handle_session_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                SessionEvent::LoggedIn { email } => debug!(email = %email, "Login event"),
                SessionEvent::LoggedOut => debug!("Logout event"),
                SessionEvent::Invalidated => {
                    eprintln!("Your session has expired. Run `discursis login` to sign in again.");
                }
            }
        }
    }
}

/// User-facing message for a failed command
pub fn user_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::SessionExpired) => "Session expired".to_string(),
        Some(ApiError::Unauthorized(_)) => {
            "Not logged in or not allowed. Run `discursis login` first.".to_string()
        }
        Some(ApiError::BadRequest(msg)) => msg.clone(),
        Some(ApiError::NetworkError(_)) => {
            "Unable to connect to server. Check the API URL and your connection.".to_string()
        }
        _ => format!("{:#}", err),
    }
}
