//! API client for communicating with the Discursis REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! API requests for accounts, projects and their analysis data.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::auth::SessionStore;
use crate::config::Config;
use crate::models::account::TokenResponse;
use crate::models::{
    ExportKind, ModelQuery, Project, RecurrenceModel, ResetTokenStatus, SimilarTerms, TermLayout,
};

use super::ApiError;

/// API client for the Discursis backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    reset_password_base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// Create a new API client reading its token from `session`
    pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let mut builder = Client::builder().default_headers(headers);
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        let base_url = config.api_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).with_context(|| format!("Invalid API URL: {}", config.api_url))?;

        Ok(Self {
            client,
            base_url,
            reset_password_base_url: config.reset_password_base_url(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    fn url(&self, path: &str) -> Result<Url> {
        let url = format!("{}{}", self.base_url, path);
        Url::parse(&url).with_context(|| format!("Invalid request URL: {}", url))
    }

    /// Start a request carrying the session's current token, if any.
    /// The token is sent verbatim, without a `Bearer ` prefix.
    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let mut builder = self.client.request(method, url);
        if let Some(token) = self.session.auth_token() {
            let value =
                HeaderValue::from_str(&token).context("Session token is not a valid header value")?;
            builder = builder.header(header::AUTHORIZATION, value);
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder, url: &Url) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send request to {}", url))?;
        self.intercept(response).await
    }

    /// Response interceptor applied to every call.
    ///
    /// Successful responses pass through. A 401 reporting an expired token
    /// invalidates the session before the error is returned; every other
    /// failure is returned with the session untouched.
    pub async fn intercept(&self, response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let url = response.url().clone();
        let body = read_error_body(response, &url).await;
        Err(self.rejection(status, &body, &url).into())
    }

    fn rejection(&self, status: StatusCode, body: &str, url: &Url) -> ApiError {
        if ApiError::is_expired_token(status, body) {
            warn!(url = %url, "Token expired on server");
            self.session.invalidate();
            return ApiError::SessionExpired;
        }
        debug!(url = %url, status = status.as_u16(), "Request failed");
        ApiError::from_status(status, body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.url(path)?;
        debug!(url = %url, "GET");
        let builder = self.request(Method::GET, url.clone())?.query(query);
        let response = self.send(builder, &url).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        let url = self.url(path)?;
        debug!(url = %url, "POST");
        let builder = self.request(Method::POST, url.clone())?.json(body);
        self.send(builder, &url).await
    }

    /// POST to a reset-token endpoint, where a plain 401 describes the reset
    /// token rather than the session.
    async fn post_reset_token<B: Serialize>(&self, path: &str, body: &B) -> Result<ResetTokenStatus> {
        let url = self.url(path)?;
        debug!(url = %url, "POST");
        let response = self
            .request(Method::POST, url.clone())?
            .json(body)
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        if status.is_success() {
            return Ok(ResetTokenStatus::Valid);
        }
        let body = read_error_body(response, &url).await;
        if status == StatusCode::UNAUTHORIZED && !ApiError::is_expired_token(status, &body) {
            return Ok(ResetTokenStatus::from_rejection(&body));
        }
        Err(self.rejection(status, &body, &url).into())
    }

    // ===== Accounts =====

    /// Log in and return the issued token. The caller stores it in the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let response = self
            .post("/login/", &json!({ "email": email, "password": password }))
            .await?;
        let token: TokenResponse = response.json().await.context("Failed to parse login response")?;
        Ok(token.token)
    }

    /// Register a new account and return its token
    pub async fn register(&self, email: &str, password: &str) -> Result<String> {
        let response = self
            .post("/register/", &json!({ "email": email, "password": password }))
            .await?;
        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse register response")?;
        Ok(token.token)
    }

    /// Ask the server to email a reset link. Succeeds whether or not the
    /// email is registered.
    pub async fn send_reset_password_link(&self, email: &str) -> Result<()> {
        self.post(
            "/send-reset-password-link/",
            &json!({ "base_url": self.reset_password_base_url, "email": email }),
        )
        .await?;
        Ok(())
    }

    pub async fn verify_reset_password_token(&self, token: &str, email: &str) -> Result<ResetTokenStatus> {
        self.post_reset_token(
            "/verify-reset-password-token/",
            &json!({ "token": token, "email": email }),
        )
        .await
    }

    /// Set a new password using a reset token
    pub async fn update_password(&self, token: &str, email: &str, password: &str) -> Result<ResetTokenStatus> {
        self.post_reset_token(
            "/update-password/",
            &json!({ "token": token, "email": email, "password": password }),
        )
        .await
    }

    // ===== Projects =====

    pub async fn projects(&self) -> Result<Vec<Project>> {
        self.get("/projects", &[]).await
    }

    pub async fn project(&self, id: i64) -> Result<Project> {
        self.get(&format!("/projects/{}", id), &[]).await
    }

    pub async fn delete_project(&self, id: i64) -> Result<()> {
        let url = self.url(&format!("/projects/{}", id))?;
        debug!(url = %url, "DELETE");
        let builder = self.request(Method::DELETE, url.clone())?;
        self.send(builder, &url).await?;
        Ok(())
    }

    /// The server's default project, used when no project has been selected
    pub async fn default_project(&self) -> Result<Project> {
        self.get("/model", &[]).await
    }

    // ===== Analysis =====

    /// Utterances and recurrence matrix for the given model
    pub async fn recurrence(&self, project_id: i64, query: &ModelQuery) -> Result<RecurrenceModel> {
        self.get(&format!("/projects/{}/model", project_id), &query.params())
            .await
    }

    pub async fn cluster(&self, project_id: i64, cluster_type: &str) -> Result<serde_json::Value> {
        self.get(
            &format!("/projects/{}/cluster", project_id),
            &[("clusterType", cluster_type.to_string())],
        )
        .await
    }

    /// Similar-term clusters; the server's default threshold applies when
    /// `threshold` is `None` or zero.
    pub async fn similar_terms(&self, project_id: i64, threshold: Option<f64>) -> Result<SimilarTerms> {
        let mut params = Vec::new();
        if let Some(t) = threshold.filter(|t| *t != 0.0) {
            params.push(("threshold", t.to_string()));
        }
        self.get(&format!("/projects/{}/similar_terms", project_id), &params)
            .await
    }

    pub async fn term_layout(&self, project_id: i64) -> Result<TermLayout> {
        self.get(&format!("/projects/{}/term_layout", project_id), &[])
            .await
    }

    // ===== URLs opened by the host =====

    /// Export download URL. The host opens it; nothing is fetched here.
    pub fn export_url(&self, project_id: i64, kind: ExportKind, query: &ModelQuery) -> Result<Url> {
        let url = format!(
            "{}/projects/{}/exports/{}",
            self.base_url,
            project_id,
            kind.path_segment()
        );
        Url::parse_with_params(&url, query.params())
            .with_context(|| format!("Invalid export URL: {}", url))
    }

    /// Form target for project uploads
    pub fn upload_url(&self) -> Result<Url> {
        self.url("/upload")
    }
}

/// Body of a failed response. A body that cannot be read is logged and
/// treated as empty, so the error is still classified by status.
async fn read_error_body(response: Response, url: &Url) -> String {
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, url = %url, "Failed to read error response body");
            String::new()
        }
    }
}
