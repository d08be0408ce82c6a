// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Back-office endpoints.
//!
//! Listing staff needs the Admin role. Everything that changes another
//! account or the system switches needs Superadmin:
//! - Staff account creation and role changes
//! - Wallet lock, staking lock and suspension toggles
//! - Password resets, forced logout and hard deletion
//! - Withdrawal pause, emergency shutdown and resume
//! - Audit log queries

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::auth::MessageResponse,
    audit_log,
    auth::{AdminOnly, Role, SuperadminOnly},
    error::{ApiError, ValidJson, ValidQuery},
    services::{
        admin::{NewStaffAccount, TemporaryPassword},
        AccountView, AdminService,
    },
    state::AppState,
    storage::{AuditEvent, AuditEventType, KycStatus, SystemConfig},
};

const DEFAULT_AUDIT_PAGE: usize = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UsersQuery {
    /// Case-insensitive substring of the email.
    pub email: Option<String>,
    pub kyc_status: Option<KycStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountListResponse {
    pub accounts: Vec<AccountView>,
    pub total: usize,
}

impl From<Vec<AccountView>> for AccountListResponse {
    fn from(accounts: Vec<AccountView>) -> Self {
        let total = accounts.len();
        Self { accounts, total }
    }
}

/// Query parameters for audit log queries.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Events performed by, or affecting, this account.
    pub user_id: Option<String>,
    /// Maximum number of results (default 100, max 500).
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

/// Response for audit log queries.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    /// Audit events, newest first.
    pub events: Vec<AuditEvent>,
    pub count: usize,
}

fn account_event(event_type: AuditEventType, actor_id: &str, account: &AccountView) -> AuditEvent {
    AuditEvent::new(event_type)
        .with_user(actor_id)
        .with_resource("account", &account.id)
}

// ============================================================================
// Staff
// ============================================================================

#[utoipa::path(
    get,
    path = "/v1/admin/admins",
    tag = "Admin",
    responses(
        (status = 200, description = "Staff accounts", body = AccountListResponse),
        (status = 403, description = "Admin access required", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_admins(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<AccountListResponse>, ApiError> {
    Ok(Json(AdminService::new(&state.store).list_admins()?.into()))
}

#[utoipa::path(
    post,
    path = "/v1/admin/admins",
    tag = "Admin",
    request_body = NewStaffAccount,
    responses(
        (status = 201, description = "Staff account created", body = AccountView),
        (status = 400, description = "Invalid input", body = crate::error::ErrorBody),
        (status = 403, description = "Superadmin access required", body = crate::error::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_admin(
    SuperadminOnly(admin): SuperadminOnly,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<NewStaffAccount>,
) -> Result<(StatusCode, Json<AccountView>), ApiError> {
    let account = AdminService::new(&state.store).create_admin(req)?;
    audit_log!(
        &state.store,
        account_event(AuditEventType::AdminCreated, &admin.user_id, &account)
            .with_details(serde_json::json!({ "role": account.role }))
    );
    Ok((StatusCode::CREATED, Json(account)))
}

// ============================================================================
// Customer accounts
// ============================================================================

#[utoipa::path(
    get,
    path = "/v1/admin/users",
    tag = "Admin",
    params(UsersQuery),
    responses(
        (status = 200, description = "Customer accounts", body = AccountListResponse),
        (status = 403, description = "Superadmin access required", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    SuperadminOnly(_admin): SuperadminOnly,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<UsersQuery>,
) -> Result<Json<AccountListResponse>, ApiError> {
    let users =
        AdminService::new(&state.store).list_users(query.email.as_deref(), query.kyc_status)?;
    Ok(Json(users.into()))
}

#[utoipa::path(
    patch,
    path = "/v1/admin/users/{id}/role",
    tag = "Admin",
    params(("id" = String, Path, description = "Account ID")),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = AccountView),
        (status = 403, description = "Superadmin access required", body = crate::error::ErrorBody),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_role(
    SuperadminOnly(admin): SuperadminOnly,
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    ValidJson(req): ValidJson<ChangeRoleRequest>,
) -> Result<Json<AccountView>, ApiError> {
    let account = AdminService::new(&state.store).change_role(&admin, &account_id, req.role)?;
    audit_log!(
        &state.store,
        account_event(AuditEventType::RoleChanged, &admin.user_id, &account)
            .with_details(serde_json::json!({ "role": account.role }))
    );
    Ok(Json(account))
}

#[utoipa::path(
    post,
    path = "/v1/admin/users/{id}/wallet-lock",
    tag = "Admin",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Wallet lock toggled", body = AccountView),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn toggle_wallet_lock(
    SuperadminOnly(admin): SuperadminOnly,
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<AccountView>, ApiError> {
    let account = AdminService::new(&state.store).toggle_wallet_lock(&account_id)?;
    audit_log!(
        &state.store,
        account_event(AuditEventType::WalletLockToggled, &admin.user_id, &account)
            .with_details(serde_json::json!({ "wallet_locked": account.wallet_locked }))
    );
    Ok(Json(account))
}

#[utoipa::path(
    post,
    path = "/v1/admin/users/{id}/staking-lock",
    tag = "Admin",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Staking lock toggled", body = AccountView),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn toggle_staking_lock(
    SuperadminOnly(admin): SuperadminOnly,
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<AccountView>, ApiError> {
    let account = AdminService::new(&state.store).toggle_staking_lock(&account_id)?;
    audit_log!(
        &state.store,
        account_event(AuditEventType::StakingLockToggled, &admin.user_id, &account)
            .with_details(serde_json::json!({ "staking_locked": account.staking_locked }))
    );
    Ok(Json(account))
}

/// Suspend an active account or reactivate a suspended one.
#[utoipa::path(
    post,
    path = "/v1/admin/users/{id}/suspend",
    tag = "Admin",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Suspension toggled", body = AccountView),
        (status = 403, description = "Cannot suspend yourself", body = crate::error::ErrorBody),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn toggle_suspension(
    SuperadminOnly(admin): SuperadminOnly,
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<AccountView>, ApiError> {
    let account = AdminService::new(&state.store).toggle_suspension(&admin, &account_id)?;
    audit_log!(
        &state.store,
        account_event(AuditEventType::SuspensionToggled, &admin.user_id, &account)
            .with_details(serde_json::json!({ "status": account.status }))
    );
    Ok(Json(account))
}

/// Replace the password with a generated one. The password is returned once
/// and never stored in clear.
#[utoipa::path(
    post,
    path = "/v1/admin/users/{id}/reset-password",
    tag = "Admin",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Temporary password", body = TemporaryPassword),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn reset_user_password(
    SuperadminOnly(admin): SuperadminOnly,
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<TemporaryPassword>, ApiError> {
    let reset = AdminService::new(&state.store).reset_user_password(&account_id)?;
    audit_log!(
        &state.store,
        AuditEventType::AdminPasswordReset,
        &admin,
        "account",
        &account_id
    );
    Ok(Json(reset))
}

#[utoipa::path(
    post,
    path = "/v1/admin/users/{id}/force-logout",
    tag = "Admin",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Outstanding tokens revoked", body = AccountView),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn force_logout(
    SuperadminOnly(admin): SuperadminOnly,
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<AccountView>, ApiError> {
    let account = AdminService::new(&state.store).force_logout(&account_id)?;
    audit_log!(
        &state.store,
        account_event(AuditEventType::ForcedLogout, &admin.user_id, &account)
    );
    Ok(Json(account))
}

/// Permanently delete an account and everything it owns.
#[utoipa::path(
    delete,
    path = "/v1/admin/users/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 403, description = "Cannot delete yourself", body = crate::error::ErrorBody),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_account(
    SuperadminOnly(admin): SuperadminOnly,
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    AdminService::new(&state.store).delete_account(&admin, &account_id)?;
    audit_log!(
        &state.store,
        AuditEventType::AccountDeleted,
        &admin,
        "account",
        &account_id
    );
    Ok(MessageResponse::new("Account deleted"))
}

// ============================================================================
// System switches
// ============================================================================

#[utoipa::path(
    get,
    path = "/v1/admin/system",
    tag = "Admin",
    responses(
        (status = 200, description = "Current switches", body = SystemConfig)
    ),
    security(("bearer_auth" = []))
)]
pub async fn system_config(
    SuperadminOnly(_admin): SuperadminOnly,
    State(state): State<AppState>,
) -> Result<Json<SystemConfig>, ApiError> {
    Ok(Json(AdminService::new(&state.store).system_config()?))
}

/// Toggle the global withdrawal pause.
#[utoipa::path(
    post,
    path = "/v1/admin/system/pause-withdrawals",
    tag = "Admin",
    responses(
        (status = 200, description = "Withdrawal pause toggled", body = SystemConfig)
    ),
    security(("bearer_auth" = []))
)]
pub async fn toggle_withdrawals(
    SuperadminOnly(admin): SuperadminOnly,
    State(state): State<AppState>,
) -> Result<Json<SystemConfig>, ApiError> {
    let config = AdminService::new(&state.store).toggle_withdrawals_paused(&admin)?;
    audit_log!(
        &state.store,
        AuditEvent::new(AuditEventType::WithdrawalsToggled)
            .with_user(&admin.user_id)
            .with_details(serde_json::json!({ "withdrawals_paused": config.withdrawals_paused }))
    );
    Ok(Json(config))
}

/// Halt every wallet mutation until trading is resumed.
#[utoipa::path(
    post,
    path = "/v1/admin/system/emergency-shutdown",
    tag = "Admin",
    responses(
        (status = 200, description = "Trading halted", body = SystemConfig)
    ),
    security(("bearer_auth" = []))
)]
pub async fn emergency_shutdown(
    SuperadminOnly(admin): SuperadminOnly,
    State(state): State<AppState>,
) -> Result<Json<SystemConfig>, ApiError> {
    let config = AdminService::new(&state.store).emergency_shutdown(&admin)?;
    audit_log!(&state.store, AuditEventType::EmergencyShutdown, &admin);
    Ok(Json(config))
}

#[utoipa::path(
    post,
    path = "/v1/admin/system/resume",
    tag = "Admin",
    responses(
        (status = 200, description = "Trading resumed", body = SystemConfig)
    ),
    security(("bearer_auth" = []))
)]
pub async fn resume_trading(
    SuperadminOnly(admin): SuperadminOnly,
    State(state): State<AppState>,
) -> Result<Json<SystemConfig>, ApiError> {
    let config = AdminService::new(&state.store).resume_trading(&admin)?;
    audit_log!(&state.store, AuditEventType::TradingResumed, &admin);
    Ok(Json(config))
}

// ============================================================================
// Audit
// ============================================================================

#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    tag = "Admin",
    params(AuditQueryParams),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 403, description = "Superadmin access required", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn query_audit_log(
    SuperadminOnly(_admin): SuperadminOnly,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<AuditQueryParams>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let events = AdminService::new(&state.store).audit_log(
        query.user_id.as_deref(),
        query.limit.unwrap_or(DEFAULT_AUDIT_PAGE),
        query.offset.unwrap_or(0),
    )?;
    let count = events.len();
    Ok(Json(AuditLogResponse { events, count }))
}
