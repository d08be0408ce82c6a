// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Referral statistics for the caller, and the admin hook that reports
//! qualifying actions (trading fees, first trades) to the commission engine.

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::{AdminOnly, Auth},
    error::{ApiError, ValidJson, ValidQuery},
    services::{
        referral::{ReferralHistoryPage, ReferralStats},
        CommissionEvent, CommissionOutcome, ReferralEngine,
    },
    state::AppState,
    storage::{AuditEvent, AuditEventType, ReferralAction},
};

const DEFAULT_HISTORY_PAGE_SIZE: usize = 10;

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Page number, starting at 1.
    pub page: Option<usize>,
    /// Entries per page (default 10, max 100).
    pub limit: Option<usize>,
}

/// A qualifying action performed by a referred account.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CommissionRequest {
    /// The referred account that performed the action.
    pub account_id: String,
    pub action: ReferralAction,
    /// Base amount the commission rate applies to.
    #[schema(value_type = String, example = "250.00")]
    pub amount: Decimal,
    /// Idempotency key; a repeated key is not paid twice.
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/referrals/stats",
    tag = "Referrals",
    responses(
        (status = 200, description = "Referral summary", body = ReferralStats),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn stats(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<ReferralStats>, ApiError> {
    Ok(Json(ReferralEngine::new(&state.store).stats(&user.user_id)?))
}

/// Commissions earned by the caller, newest first.
#[utoipa::path(
    get,
    path = "/v1/referrals/history",
    tag = "Referrals",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Page of ledger entries", body = ReferralHistoryPage),
        (status = 400, description = "Invalid page", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn history(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<HistoryQuery>,
) -> Result<Json<ReferralHistoryPage>, ApiError> {
    let page = ReferralEngine::new(&state.store).history(
        &user.user_id,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(DEFAULT_HISTORY_PAGE_SIZE),
    )?;
    Ok(Json(page))
}

/// Report a qualifying action. Pays the referrer of `account_id`, if any.
#[utoipa::path(
    post,
    path = "/v1/admin/referrals/commissions",
    tag = "Admin",
    request_body = CommissionRequest,
    responses(
        (status = 200, description = "Commission processed", body = CommissionOutcome),
        (status = 400, description = "Invalid amount", body = crate::error::ErrorBody),
        (status = 403, description = "Admin access required", body = crate::error::ErrorBody),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn record_commission(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CommissionRequest>,
) -> Result<Json<CommissionOutcome>, ApiError> {
    let event = CommissionEvent {
        account_id: &req.account_id,
        action: req.action,
        amount: req.amount,
        event_id: req.event_id.as_deref(),
        transaction_id: req.transaction_id.as_deref(),
    };
    let outcome = ReferralEngine::new(&state.store).process_commission(&event)?;

    if let CommissionOutcome::Applied { entry } = &outcome {
        audit_log!(
            &state.store,
            AuditEvent::new(AuditEventType::CommissionRecorded)
                .with_user(&admin.user_id)
                .with_resource("referral_entry", &entry.id)
                .with_details(serde_json::json!({
                    "referrer_id": entry.referrer_id,
                    "referred_user_id": entry.referred_user_id,
                    "amount": entry.amount,
                }))
        );
    }

    Ok(Json(outcome))
}
