// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod health;
pub mod kyc;
pub mod referrals;
pub mod staking;
pub mod users;
pub mod wallet;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        // Health
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        // Credentials
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-email", post(auth::verify_email))
        .route("/auth/resend-otp", post(auth::resend_otp))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        // Own account
        .route("/users/me", get(users::me).patch(users::update_profile))
        .route("/users/me/profile", get(users::profile))
        .route("/users/me/password", post(users::change_password))
        .route("/phone/send-otp", post(users::send_phone_otp))
        .route("/phone/verify", post(users::verify_phone))
        // Wallet
        .route("/wallet", get(wallet::get_wallet))
        .route("/wallet/deposit", post(wallet::deposit))
        .route("/wallet/withdraw", post(wallet::withdraw))
        .route("/wallet/transactions", get(wallet::list_transactions))
        // Referrals
        .route("/referrals/stats", get(referrals::stats))
        .route("/referrals/history", get(referrals::history))
        // KYC
        .route("/kyc", post(kyc::submit))
        .route("/kyc/status", get(kyc::status))
        // Staking
        .route("/staking", get(staking::list).post(staking::stake))
        // Admin
        .route("/admin/kyc", get(kyc::list))
        .route("/admin/kyc/{kyc_id}", patch(kyc::review))
        .route(
            "/admin/admins",
            get(admin::list_admins).post(admin::create_admin),
        )
        .route(
            "/admin/referrals/commissions",
            post(referrals::record_commission),
        )
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}", delete(admin::delete_account))
        .route("/admin/users/{id}/role", patch(admin::change_role))
        .route(
            "/admin/users/{id}/wallet-lock",
            post(admin::toggle_wallet_lock),
        )
        .route(
            "/admin/users/{id}/staking-lock",
            post(admin::toggle_staking_lock),
        )
        .route("/admin/users/{id}/suspend", post(admin::toggle_suspension))
        .route(
            "/admin/users/{id}/reset-password",
            post(admin::reset_user_password),
        )
        .route("/admin/users/{id}/force-logout", post(admin::force_logout))
        .route("/admin/system", get(admin::system_config))
        .route(
            "/admin/system/pause-withdrawals",
            post(admin::toggle_withdrawals),
        )
        .route(
            "/admin/system/emergency-shutdown",
            post(admin::emergency_shutdown),
        )
        .route("/admin/system/resume", post(admin::resume_trading))
        .route("/admin/staking/{id}/foreclose", patch(staking::foreclose))
        .route("/admin/audit", get(admin::query_audit_log))
        .with_state(state);

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::register,
        auth::login,
        auth::verify_email,
        auth::resend_otp,
        auth::forgot_password,
        auth::reset_password,
        users::me,
        users::profile,
        users::update_profile,
        users::change_password,
        users::send_phone_otp,
        users::verify_phone,
        wallet::get_wallet,
        wallet::deposit,
        wallet::withdraw,
        wallet::list_transactions,
        referrals::stats,
        referrals::history,
        referrals::record_commission,
        kyc::submit,
        kyc::status,
        kyc::list,
        kyc::review,
        staking::stake,
        staking::list,
        staking::foreclose,
        admin::list_admins,
        admin::create_admin,
        admin::list_users,
        admin::change_role,
        admin::toggle_wallet_lock,
        admin::toggle_staking_lock,
        admin::toggle_suspension,
        admin::reset_user_password,
        admin::force_logout,
        admin::delete_account,
        admin::system_config,
        admin::toggle_withdrawals,
        admin::emergency_shutdown,
        admin::resume_trading,
        admin::query_audit_log
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::auth::Role,
            crate::storage::Currency,
            crate::storage::AccountStatus,
            crate::storage::KycStatus,
            crate::storage::ReferralAction,
            crate::storage::TransactionKind,
            crate::storage::TxStatus,
            crate::storage::StakeStatus
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Auth", description = "Registration, login and password recovery"),
        (name = "Users", description = "The caller's own account"),
        (name = "Wallet", description = "Balances, deposits and withdrawals"),
        (name = "Referrals", description = "Referral statistics and commission history"),
        (name = "KYC", description = "Identity verification"),
        (name = "Staking", description = "Fixed-term staking positions"),
        (name = "Admin", description = "Back-office operations")
    )
)]
pub struct ApiDoc;
