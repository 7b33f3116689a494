//! Unified application error model and mapping helpers.
//! This module provides the common error enum surfaced by the HTTP handlers,
//! covering authentication, authorization, and merge failure modes, along
//! with the wire label and HTTP status mapping for each.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::merge::MergeError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    MissingCredentials { message: String },
    InvalidCredentials { message: String },
    Unauthenticated { message: String },
    AccessDenied { message: String },
    MergeInput { message: String },
    Internal { message: String },
}

impl AppError {
    /// Stable machine-readable label sent in the `error` field of responses.
    pub fn label(&self) -> &'static str {
        match self {
            AppError::MissingCredentials { .. } => "MissingCredentials",
            AppError::InvalidCredentials { .. } => "InvalidCredentials",
            AppError::Unauthenticated { .. } => "Unauthenticated",
            AppError::AccessDenied { .. } => "AccessDenied",
            AppError::MergeInput { .. } => "MergeInput",
            AppError::Internal { .. } => "Internal",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::MissingCredentials { message }
            | AppError::InvalidCredentials { message }
            | AppError::Unauthenticated { message }
            | AppError::AccessDenied { message }
            | AppError::MergeInput { message }
            | AppError::Internal { message } => message.as_str(),
        }
    }

    pub fn missing_credentials<S: Into<String>>(msg: S) -> Self { AppError::MissingCredentials { message: msg.into() } }
    pub fn invalid_credentials<S: Into<String>>(msg: S) -> Self { AppError::InvalidCredentials { message: msg.into() } }
    pub fn unauthenticated<S: Into<String>>(msg: S) -> Self { AppError::Unauthenticated { message: msg.into() } }
    pub fn access_denied<S: Into<String>>(msg: S) -> Self { AppError::AccessDenied { message: msg.into() } }
    pub fn merge_input<S: Into<String>>(msg: S) -> Self { AppError::MergeInput { message: msg.into() } }
    pub fn internal<S: Into<String>>(msg: S) -> Self { AppError::Internal { message: msg.into() } }

    /// Map to HTTP status code.
    ///
    /// MergeInput maps to 200: a failed profile merge is reported in-band in
    /// the update-profile response body (`success: false`), never as a
    /// transport-level failure.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::MissingCredentials { .. } => 400,
            AppError::InvalidCredentials { .. } => 401,
            AppError::Unauthenticated { .. } => 401,
            AppError::AccessDenied { .. } => 403,
            AppError::MergeInput { .. } => 200,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.label(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<MergeError> for AppError {
    fn from(err: MergeError) -> Self {
        AppError::MergeInput { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::missing_credentials("no fields").http_status(), 400);
        assert_eq!(AppError::invalid_credentials("bad password").http_status(), 401);
        assert_eq!(AppError::unauthenticated("no session").http_status(), 401);
        assert_eq!(AppError::access_denied("not admin").http_status(), 403);
        // Merge failures surface in the 200 response body by contract.
        assert_eq!(AppError::merge_input("bad overlay").http_status(), 200);
        assert_eq!(AppError::internal("panic").http_status(), 500);
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(AppError::missing_credentials("x").label(), "MissingCredentials");
        assert_eq!(AppError::invalid_credentials("x").label(), "InvalidCredentials");
        assert_eq!(AppError::unauthenticated("x").label(), "Unauthenticated");
        assert_eq!(AppError::access_denied("x").label(), "AccessDenied");
        assert_eq!(AppError::merge_input("x").label(), "MergeInput");
        assert_eq!(AppError::internal("x").label(), "Internal");
    }

    #[test]
    fn display_is_label_and_message() {
        let e = AppError::access_denied("Admin access required");
        assert_eq!(e.to_string(), "AccessDenied: Admin access required");
    }

    #[test]
    fn merge_error_converts_in_band() {
        let merge_err = MergeError::OverlayNotObject("array");
        let app: AppError = merge_err.into();
        assert_eq!(app.label(), "MergeInput");
        assert_eq!(app.http_status(), 200);
        assert!(app.message().contains("array"), "type name should survive: {}", app.message());
    }
}
