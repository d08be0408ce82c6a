// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public credential endpoints: registration, login, email verification and
//! password recovery.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    audit_log,
    error::{ApiError, ValidJson},
    services::{
        accounts::{mask_email, Registration, RegistrationOutcome, Session},
        AccountService,
    },
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    pub email: String,
    /// Six-digit code sent by email.
    pub otp: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    /// Token from the emailed reset link.
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResendOtpResponse {
    pub message: String,
    pub otp_delivered: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create an account and email a verification code.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "Auth",
    request_body = Registration,
    responses(
        (status = 201, description = "Account created", body = RegistrationOutcome),
        (status = 400, description = "Invalid input", body = crate::error::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::error::ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<Registration>,
) -> Result<(StatusCode, Json<RegistrationOutcome>), ApiError> {
    let outcome = AccountService::new(&state).register(req).await?;

    audit_log!(
        &state.store,
        AuditEvent::new(AuditEventType::AccountRegistered)
            .with_user(&outcome.account.id)
            .with_resource("account", &outcome.account.id)
            .with_details(serde_json::json!({
                "referred_by": outcome.account.referred_by,
            }))
    );

    Ok((StatusCode::CREATED, Json(outcome)))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = Session),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorBody),
        (status = 403, description = "Account suspended", body = crate::error::ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<Json<Session>, ApiError> {
    match AccountService::new(&state).login(&req.email, &req.password) {
        Ok(session) => {
            audit_log!(
                &state.store,
                AuditEvent::new(AuditEventType::AuthSuccess).with_user(&session.account.id)
            );
            Ok(Json(session))
        }
        Err(e) => {
            audit_log!(
                &state.store,
                AuditEvent::new(AuditEventType::AuthFailure)
                    .with_details(serde_json::json!({ "email": mask_email(&req.email) }))
                    .failed(e.to_string())
            );
            Err(e.into())
        }
    }
}

/// Confirm the emailed code. Returns a session on success.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-email",
    tag = "Auth",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = Session),
        (status = 400, description = "Invalid or expired code", body = crate::error::ErrorBody)
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<VerifyEmailRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = AccountService::new(&state).verify_email(&req.email, &req.otp)?;
    audit_log!(
        &state.store,
        AuditEvent::new(AuditEventType::EmailVerified).with_user(&session.account.id)
    );
    Ok(Json(session))
}

#[utoipa::path(
    post,
    path = "/v1/auth/resend-otp",
    tag = "Auth",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "New code issued", body = ResendOtpResponse),
        (status = 400, description = "Email already verified", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown email", body = crate::error::ErrorBody)
    )
)]
pub async fn resend_otp(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<EmailRequest>,
) -> Result<Json<ResendOtpResponse>, ApiError> {
    let otp_delivered = AccountService::new(&state).resend_otp(&req.email).await?;
    Ok(Json(ResendOtpResponse {
        message: "Verification code sent".to_string(),
        otp_delivered,
    }))
}

/// Always answers with the same message so the endpoint cannot be used to
/// discover registered emails.
#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    tag = "Auth",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset link sent if the account exists", body = MessageResponse)
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    AccountService::new(&state).forgot_password(&req.email).await?;
    audit_log!(
        &state.store,
        AuditEvent::new(AuditEventType::PasswordResetRequested)
            .with_details(serde_json::json!({ "email": mask_email(&req.email) }))
    );
    Ok(MessageResponse::new(
        "If an account exists for that email, a reset link has been sent",
    ))
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    tag = "Auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = crate::error::ErrorBody)
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let account_id = AccountService::new(&state).reset_password(
        &req.token,
        &req.password,
        &req.confirm_password,
    )?;
    audit_log!(
        &state.store,
        AuditEvent::new(AuditEventType::PasswordReset)
            .with_user(&account_id)
            .with_resource("account", &account_id)
    );
    Ok(MessageResponse::new("Password has been reset"))
}
