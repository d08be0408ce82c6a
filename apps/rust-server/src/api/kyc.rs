// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::{AdminOnly, Auth},
    error::{ApiError, ValidJson, ValidQuery},
    services::{
        kyc::{KycDecision, KycStatusView, KycSubmission},
        KycWorkflow,
    },
    state::AppState,
    storage::{AuditEvent, AuditEventType, KycRecord, KycStatus},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub decision: KycDecision,
    /// Superadmin only: review a record that is no longer pending.
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct KycListQuery {
    /// Only records in this status.
    pub status: Option<KycStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct KycListResponse {
    pub records: Vec<KycRecord>,
    pub total: usize,
}

/// Submit (or resubmit after rejection) identity details for review.
#[utoipa::path(
    post,
    path = "/v1/kyc",
    tag = "KYC",
    request_body = KycSubmission,
    responses(
        (status = 201, description = "Submission recorded", body = KycRecord),
        (status = 400, description = "Missing fields", body = crate::error::ErrorBody),
        (status = 409, description = "Already approved", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn submit(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<KycSubmission>,
) -> Result<(StatusCode, Json<KycRecord>), ApiError> {
    let record = KycWorkflow::new(&state.store).submit(&user.user_id, req)?;
    audit_log!(&state.store, AuditEventType::KycSubmitted, &user, "kyc", &record.id);
    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    get,
    path = "/v1/kyc/status",
    tag = "KYC",
    responses(
        (status = 200, description = "KYC status of the caller", body = KycStatusView)
    ),
    security(("bearer_auth" = []))
)]
pub async fn status(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<KycStatusView>, ApiError> {
    Ok(Json(KycWorkflow::new(&state.store).status(&user.user_id)?))
}

#[utoipa::path(
    get,
    path = "/v1/admin/kyc",
    tag = "Admin",
    params(KycListQuery),
    responses(
        (status = 200, description = "KYC records", body = KycListResponse),
        (status = 403, description = "Admin access required", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<KycListQuery>,
) -> Result<Json<KycListResponse>, ApiError> {
    let records = KycWorkflow::new(&state.store).list(query.status)?;
    let total = records.len();
    Ok(Json(KycListResponse { records, total }))
}

/// Approve or reject a pending submission.
#[utoipa::path(
    patch,
    path = "/v1/admin/kyc/{kyc_id}",
    tag = "Admin",
    params(("kyc_id" = String, Path, description = "KYC record ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Review recorded", body = KycRecord),
        (status = 403, description = "Admin access required", body = crate::error::ErrorBody),
        (status = 404, description = "Record not found", body = crate::error::ErrorBody),
        (status = 409, description = "Record is not pending", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn review(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(kyc_id): Path<String>,
    ValidJson(req): ValidJson<ReviewRequest>,
) -> Result<Json<KycRecord>, ApiError> {
    let record =
        KycWorkflow::new(&state.store).review(&kyc_id, req.decision, &admin, req.force, req.note)?;
    audit_log!(
        &state.store,
        AuditEvent::new(AuditEventType::KycReviewed)
            .with_user(&admin.user_id)
            .with_resource("kyc", &record.id)
            .with_details(serde_json::json!({
                "account_id": record.account_id,
                "decision": req.decision,
                "forced": req.force,
            }))
    );
    Ok(Json(record))
}
