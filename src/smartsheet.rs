//! Thin Smartsheet API client: OAuth code exchange plus the two read calls
//! the view projections are built from. Upstream bodies are logged, never
//! forwarded to callers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Sheet snapshot as returned by `GET /sheets/{id}`. Only the fields the
/// projections read are modelled; everything else in the payload is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub column_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    #[serde(default)]
    email: String,
}

/// Shared client; cheap to clone, reuses one connection pool.
#[derive(Clone)]
pub struct SmartsheetClient {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl SmartsheetClient {
    pub fn new(config: Arc<Config>) -> Self {
        SmartsheetClient { http: reqwest::Client::new(), config }
    }

    /// Authorization URL the login endpoint redirects the browser to.
    pub fn authorize_url(&self) -> String {
        format!(
            "{}?response_type=code&client_id={}&scope=READ_SHEETS&redirect_uri={}",
            self.config.authorize_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
        )
    }

    /// Exchanges an authorization code for a bearer token.
    pub async fn exchange_code(&self, code: &str) -> AppResult<String> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|err| transport_error("token exchange", &err))?;
        let response = check_upstream("token exchange", response).await?;
        let body: TokenResponse =
            response.json().await.map_err(|err| decode_error("token exchange", &err))?;
        match body.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => {
                error!("token exchange response carried no access token");
                Err(AppError::upstream(
                    "upstream_error",
                    "Access token not found in Smartsheet response.",
                ))
            }
        }
    }

    /// Email of the token's owner, lowercased for case-insensitive matching.
    pub async fn current_user_email(&self, token: &str) -> AppResult<String> {
        let url = format!("{}/users/me", self.config.api_base_url);
        let response = self.get_with_bearer(&url, token, "current user").await?;
        let user: CurrentUser =
            response.json().await.map_err(|err| decode_error("current user", &err))?;
        Ok(user.email.to_lowercase())
    }

    /// Full snapshot of the master sheet.
    pub async fn sheet(&self, token: &str) -> AppResult<Sheet> {
        let url = format!("{}/sheets/{}", self.config.api_base_url, self.config.sheet_id);
        let response = self.get_with_bearer(&url, token, "sheet fetch").await?;
        response.json().await.map_err(|err| decode_error("sheet fetch", &err))
    }

    async fn get_with_bearer(
        &self,
        url: &str,
        token: &str,
        context: &str,
    ) -> AppResult<reqwest::Response> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| transport_error(context, &err))?;
        check_upstream(context, response).await
    }
}

/// Maps a non-success upstream status onto the caller-facing error taxonomy.
/// 4xx keeps its status code, everything else collapses to a plain 500.
async fn check_upstream(context: &str, response: reqwest::Response) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_client_error() {
        error!("smartsheet rejected {context}: {status} {body}");
        return Err(AppError::upstream_client(
            status.as_u16(),
            "Authentication error with Smartsheet.",
        ));
    }
    error!("smartsheet {context} failed: {status} {body}");
    Err(AppError::upstream("upstream_error", "Failed to communicate with Smartsheet."))
}

fn transport_error(context: &str, err: &reqwest::Error) -> AppError {
    error!("smartsheet {context} request failed: {err}");
    AppError::upstream("upstream_error", "Failed to communicate with Smartsheet.")
}

fn decode_error(context: &str, err: &reqwest::Error) -> AppError {
    error!("smartsheet {context} returned an undecodable body: {err}");
    AppError::upstream("upstream_error", "Failed to communicate with Smartsheet.")
}
