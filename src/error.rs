//! Unified application error model and mapping helpers.
//! Request-level failures become one of the `AppError` shapes below; row-level
//! dirty data is represented by `CoercionError` and never surfaces to clients.

use std::fmt::{Display, Formatter};

use thiserror::Error;

#[derive(Debug, Clone)]
pub enum AppError {
    /// Missing or unverifiable sealed token.
    Auth { code: String, message: String },
    /// A required column title is absent from the sheet snapshot. This is a
    /// deployment/config mismatch, not something the caller can fix.
    Schema { code: String, message: String },
    /// Smartsheet rejected the call; the upstream status is forwarded to the
    /// caller with a generic message, never the upstream body.
    UpstreamClient { status: u16, message: String },
    /// Upstream 5xx, transport failure or malformed upstream payload.
    Upstream { code: String, message: String },
    NotFound { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Auth { code, .. }
            | AppError::Schema { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
            AppError::UpstreamClient { .. } => "upstream_client_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Auth { message, .. }
            | AppError::Schema { message, .. }
            | AppError::UpstreamClient { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn auth<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::Auth { code: code.into(), message: msg.into() }
    }
    pub fn schema<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::Schema { code: code.into(), message: msg.into() }
    }
    pub fn upstream_client<M: Into<String>>(status: u16, msg: M) -> Self {
        AppError::UpstreamClient { status, message: msg.into() }
    }
    pub fn upstream<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::Upstream { code: code.into(), message: msg.into() }
    }
    pub fn not_found<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::NotFound { code: code.into(), message: msg.into() }
    }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self {
        AppError::Internal { code: code.into(), message: msg.into() }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Auth { .. } => 401,
            AppError::Schema { .. } => 500,
            AppError::UpstreamClient { status, .. } => *status,
            AppError::Upstream { .. } => 500,
            AppError::NotFound { .. } => 404,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

/// Row-level coercion failure shared by every listing-style projector.
/// Swallowed locally: the row is skipped or the field falls back instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("value is not numeric")]
pub struct CoercionError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::auth("not_authenticated", "no").http_status(), 401);
        assert_eq!(AppError::schema("missing_column", "gone").http_status(), 500);
        assert_eq!(AppError::upstream_client(403, "denied").http_status(), 403);
        assert_eq!(AppError::upstream("upstream_error", "down").http_status(), 500);
        assert_eq!(AppError::not_found("assessment_not_found", "missing").http_status(), 404);
        assert_eq!(AppError::internal("internal_error", "boom").http_status(), 500);
    }

    #[test]
    fn upstream_client_status_is_forwarded_verbatim() {
        for status in [400u16, 401, 403, 404, 429] {
            assert_eq!(AppError::upstream_client(status, "x").http_status(), status);
        }
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = AppError::auth("invalid_token", "Invalid token");
        assert_eq!(err.to_string(), "invalid_token: Invalid token");
        assert_eq!(AppError::upstream_client(403, "x").code_str(), "upstream_client_error");
    }
}
