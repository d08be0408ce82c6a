// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Probes for orchestrators. Liveness never touches the database; readiness
//! performs a write/read round trip through redb.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    /// `ok` or `degraded`.
    pub status: &'static str,
    pub version: &'static str,
    /// `ok` or `unavailable`; absent for liveness.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,
    pub checked_at: DateTime<Utc>,
}

fn check_components(state: &AppState) -> (StatusCode, Json<HealthStatus>) {
    let database_ok = match state.store.health_check() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            false
        }
    };
    let body = HealthStatus {
        status: if database_ok { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: Some(if database_ok { "ok" } else { "unavailable" }),
        checked_at: Utc::now(),
    };
    let code = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "All components healthy", body = HealthStatus),
        (status = 503, description = "Database unavailable", body = HealthStatus)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    check_components(&state)
}

#[utoipa::path(
    get,
    path = "/v1/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is running", body = HealthStatus)
    )
)]
pub async fn liveness() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database: None,
        checked_at: Utc::now(),
    })
}

#[utoipa::path(
    get,
    path = "/v1/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready to serve traffic", body = HealthStatus),
        (status = 503, description = "Database unavailable", body = HealthStatus)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    check_components(&state)
}
