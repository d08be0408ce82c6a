// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The caller's own account: identity, masked profile, profile edits,
//! password change and phone verification.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::auth::MessageResponse,
    audit_log,
    auth::Auth,
    error::{ApiError, ValidJson},
    services::{accounts::ProfileUpdate, AccountService, AccountView, ProfileView},
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PhoneRequest {
    /// E.164 number, e.g. `+919876543210`.
    pub phone: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPhoneRequest {
    pub phone: String,
    pub otp: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PhoneOtpResponse {
    pub message: String,
    pub otp_delivered: bool,
}

/// Full account record of the caller.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Current account", body = AccountView),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<AccountView>, ApiError> {
    Ok(Json(AccountService::new(&state).me(&user.user_id)?))
}

/// Profile with email and phone masked.
#[utoipa::path(
    get,
    path = "/v1/users/me/profile",
    tag = "Users",
    responses(
        (status = 200, description = "Masked profile", body = ProfileView),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn profile(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<ProfileView>, ApiError> {
    Ok(Json(AccountService::new(&state).profile(&user.user_id)?))
}

#[utoipa::path(
    patch,
    path = "/v1/users/me",
    tag = "Users",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = AccountView),
        (status = 400, description = "Invalid input", body = crate::error::ErrorBody),
        (status = 409, description = "Email already in use", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ProfileUpdate>,
) -> Result<Json<AccountView>, ApiError> {
    let account = AccountService::new(&state).update_profile(&user.user_id, req)?;
    audit_log!(
        &state.store,
        AuditEventType::ProfileUpdated,
        &user,
        "account",
        &user.user_id
    );
    Ok(Json(account))
}

#[utoipa::path(
    post,
    path = "/v1/users/me/password",
    tag = "Users",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid input or wrong current password", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    AccountService::new(&state).change_password(
        &user.user_id,
        &req.current_password,
        &req.new_password,
        &req.confirm_password,
    )?;
    audit_log!(&state.store, AuditEventType::PasswordChanged, &user);
    Ok(MessageResponse::new("Password changed"))
}

/// Send a verification code by SMS.
#[utoipa::path(
    post,
    path = "/v1/phone/send-otp",
    tag = "Users",
    request_body = PhoneRequest,
    responses(
        (status = 200, description = "Code issued", body = PhoneOtpResponse),
        (status = 400, description = "Invalid phone number", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn send_phone_otp(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<PhoneRequest>,
) -> Result<Json<PhoneOtpResponse>, ApiError> {
    let otp_delivered = AccountService::new(&state)
        .send_phone_otp(&user.user_id, &req.phone)
        .await?;
    Ok(Json(PhoneOtpResponse {
        message: "Verification code sent".to_string(),
        otp_delivered,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/phone/verify",
    tag = "Users",
    request_body = VerifyPhoneRequest,
    responses(
        (status = 200, description = "Phone verified", body = AccountView),
        (status = 400, description = "Invalid or expired code", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_phone(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<VerifyPhoneRequest>,
) -> Result<Json<AccountView>, ApiError> {
    let account = AccountService::new(&state).verify_phone(&user.user_id, &req.phone, &req.otp)?;
    audit_log!(
        &state.store,
        AuditEvent::new(AuditEventType::PhoneVerified)
            .with_user(&user.user_id)
            .with_resource("account", &user.user_id)
    );
    Ok(Json(account))
}
