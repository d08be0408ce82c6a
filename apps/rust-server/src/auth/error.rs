// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Rejections produced while resolving the caller of a request.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingAuthHeader,

    #[error("Authorization header must be 'Bearer <token>'")]
    InvalidAuthHeader,

    #[error("Token is malformed")]
    MalformedToken,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    TokenExpired,

    /// Issued before the account's last password reset or forced logout.
    #[error("Session has been revoked, please log in again")]
    TokenRevoked,

    #[error("Account not found")]
    UnknownAccount,

    #[error("Account is suspended")]
    AccountSuspended,

    #[error("Insufficient permissions for this operation")]
    InsufficientPermissions,

    #[error("Internal authentication error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenRevoked => "token_revoked",
            AuthError::UnknownAccount => "unknown_account",
            AuthError::AccountSuspended => "account_suspended",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// 403 when the caller is known but not allowed, 401 otherwise.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::AccountSuspended | AuthError::InsufficientPermissions => {
                StatusCode::FORBIDDEN
            }
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let message = match &e {
            AuthError::InternalError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        ApiError::new(e.status_code(), e.error_code(), message)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::InternalError(detail) = &self {
            tracing::error!(error = %detail, "Authentication failed internally");
        }
        ApiError::from(self).into_response()
    }
}
