// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    api::wallet::AmountRequest,
    audit_log,
    auth::{Auth, SuperadminOnly},
    error::{ApiError, ValidJson},
    services::{staking::StakeReceipt, StakingService},
    state::AppState,
    storage::{AuditEvent, AuditEventType, StakePosition},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct StakeListResponse {
    pub stakes: Vec<StakePosition>,
    pub total: usize,
}

/// Lock an amount for the fixed staking term.
#[utoipa::path(
    post,
    path = "/v1/staking",
    tag = "Staking",
    request_body = AmountRequest,
    responses(
        (status = 201, description = "Stake opened", body = StakeReceipt),
        (status = 400, description = "Invalid amount or insufficient funds", body = crate::error::ErrorBody),
        (status = 403, description = "Staking or wallet locked", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn stake(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<AmountRequest>,
) -> Result<(StatusCode, Json<StakeReceipt>), ApiError> {
    let currency = req.currency()?;
    let receipt = StakingService::new(&state.store).stake(&user.user_id, currency, req.amount)?;
    audit_log!(
        &state.store,
        AuditEvent::new(AuditEventType::StakeOpened)
            .with_user(&user.user_id)
            .with_resource("stake", &receipt.position.id)
            .with_details(serde_json::json!({
                "currency": receipt.position.currency,
                "amount": receipt.position.amount,
            }))
    );
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[utoipa::path(
    get,
    path = "/v1/staking",
    tag = "Staking",
    responses(
        (status = 200, description = "Staking positions of the caller", body = StakeListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<StakeListResponse>, ApiError> {
    let stakes = StakingService::new(&state.store).list_stakes(&user.user_id)?;
    let total = stakes.len();
    Ok(Json(StakeListResponse { stakes, total }))
}

/// Close an active position early, paying its current value in INR.
#[utoipa::path(
    patch,
    path = "/v1/admin/staking/{id}/foreclose",
    tag = "Admin",
    params(("id" = String, Path, description = "Staking position ID")),
    responses(
        (status = 200, description = "Position foreclosed", body = StakeReceipt),
        (status = 403, description = "Superadmin access required", body = crate::error::ErrorBody),
        (status = 404, description = "Position not found", body = crate::error::ErrorBody),
        (status = 409, description = "Position is not active", body = crate::error::ErrorBody),
        (status = 502, description = "Price unavailable", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn foreclose(
    SuperadminOnly(admin): SuperadminOnly,
    State(state): State<AppState>,
    Path(stake_id): Path<String>,
) -> Result<Json<StakeReceipt>, ApiError> {
    let receipt = StakingService::new(&state.store)
        .foreclose(&stake_id, state.price_feed.as_ref(), &admin.user_id)
        .await?;
    audit_log!(
        &state.store,
        AuditEvent::new(AuditEventType::StakeForeclosed)
            .with_user(&admin.user_id)
            .with_resource("stake", &stake_id)
            .with_details(serde_json::json!({
                "account_id": receipt.position.account_id,
                "price": receipt.position.foreclosure_price,
                "payout": receipt.position.payout,
            }))
    );
    Ok(Json(receipt))
}
