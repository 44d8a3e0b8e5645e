//!
//! Compass HTTP server
//! -------------------
//! Axum endpoint layer for the Smartsheet OAuth flow and the sheet-backed
//! data views.
//!
//! Responsibilities:
//! - Login redirect and OAuth callback, sealing the bearer token into a
//!   signed HttpOnly cookie.
//! - Data endpoints that unseal the token, call Smartsheet, and project the
//!   master sheet into the listing, dashboard and count views.
//! - Error-to-response mapping per the taxonomy in `error`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{FromRef, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, Key, SameSite, SignedCookieJar};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::smartsheet::SmartsheetClient;
use crate::views;

const TOKEN_COOKIE: &str = "access_token";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub smartsheet: SmartsheetClient,
    cookie_key: Key,
}

impl AppState {
    /// Derives the cookie signing key from the session secret. The secret's
    /// minimum length is enforced by `Config` validation.
    pub fn new(config: Config) -> AppState {
        let config = Arc::new(config);
        let cookie_key = Key::derive_from(config.session_secret.as_bytes());
        AppState { smartsheet: SmartsheetClient::new(config.clone()), config, cookie_key }
    }
}

// Lets SignedCookieJar pull its key out of the shared state.
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Key {
        state.cookie_key.clone()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "status": "error",
            "code": self.code_str(),
            "message": self.message(),
        }));
        (status, body).into_response()
    }
}

/// Start the Compass HTTP server with configuration taken from the
/// environment.
pub async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    run_with_config(config).await
}

pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    let http_port = config.http_port;
    info!("Configuration: {config:?}");

    let app = router(AppState::new(config));
    let addr: SocketAddr = format!("0.0.0.0:{http_port}").parse()?;
    info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "compass ok" }))
        .route("/api/login", get(oauth_login))
        .route("/api/callback", get(oauth_callback))
        .route("/api/assessments", get(list_assessments))
        .route("/api/assessments/total", get(total_assessments))
        .route("/api/dashboard/{assessment_id}", get(dashboard))
        .with_state(state)
}

async fn oauth_login(State(state): State<AppState>) -> impl IntoResponse {
    redirect_found(&state.smartsheet.authorize_url())
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: String,
}

/// Exchanges the one-time code, seals the token into the cookie and bounces
/// the browser back to the frontend. The browser is mid-navigation here, so
/// every failure redirects to the frontend error page instead of answering
/// with JSON.
async fn oauth_callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    match state.smartsheet.exchange_code(&params.code).await {
        Ok(token) => {
            let cookie = Cookie::build((TOKEN_COOKIE, token))
                .http_only(true)
                .secure(state.config.cookie_secure)
                .same_site(SameSite::Lax)
                .path("/")
                .build();
            let target = format!("{}/my-assessments", state.config.frontend_url);
            (jar.add(cookie), redirect_found(&target)).into_response()
        }
        Err(err) => {
            error!("oauth callback failed: {err}");
            let target = format!("{}/?error=auth_failed", state.config.frontend_url);
            redirect_found(&target).into_response()
        }
    }
}

async fn list_assessments(
    State(state): State<AppState>,
    signed: SignedCookieJar,
    raw: CookieJar,
) -> Result<Json<Value>, AppError> {
    let token = bearer_token(&signed, &raw)?;
    let email = state.smartsheet.current_user_email(&token).await?;
    let sheet = state.smartsheet.sheet(&token).await?;
    let records = views::project_assessments(&sheet, &email)?;
    Ok(Json(Value::Array(records)))
}

async fn dashboard(
    State(state): State<AppState>,
    signed: SignedCookieJar,
    raw: CookieJar,
    Path(assessment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let token = bearer_token(&signed, &raw)?;
    let sheet = state.smartsheet.sheet(&token).await?;
    Ok(Json(views::project_dashboard(&sheet, &assessment_id)?))
}

async fn total_assessments(
    State(state): State<AppState>,
    signed: SignedCookieJar,
    raw: CookieJar,
) -> Result<Json<Value>, AppError> {
    let token = bearer_token(&signed, &raw)?;
    let email = state.smartsheet.current_user_email(&token).await?;
    let sheet = state.smartsheet.sheet(&token).await?;
    let total = views::count_assessments(&sheet, &email)?;
    Ok(Json(json!({ "total": total })))
}

/// Recovers the bearer token from the sealed cookie. Absent and tampered
/// cookies are both 401s with distinct messages; the raw jar tells them
/// apart, since present-but-unverifiable means tampered.
fn bearer_token(signed: &SignedCookieJar, raw: &CookieJar) -> AppResult<String> {
    if let Some(cookie) = signed.get(TOKEN_COOKIE) {
        return Ok(cookie.value().to_string());
    }
    if raw.get(TOKEN_COOKIE).is_some() {
        return Err(AppError::auth("invalid_token", "Invalid token"));
    }
    Err(AppError::auth("not_authenticated", "Not authenticated"))
}

// axum's Redirect helpers emit 303/307/308; the contract here is a plain
// 302 Found.
fn redirect_found(target: &str) -> (StatusCode, HeaderMap) {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(target) {
        Ok(value) => {
            headers.insert(header::LOCATION, value);
            (StatusCode::FOUND, headers)
        }
        Err(err) => {
            error!("invalid redirect target {target}: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new())
        }
    }
}
