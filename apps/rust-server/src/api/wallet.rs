// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::Auth,
    error::{ApiError, ValidJson, ValidQuery},
    services::{
        wallet::{WalletReceipt, WalletView, DEFAULT_TX_LIMIT},
        ServiceError, WalletService,
    },
    state::AppState,
    storage::{AuditEvent, AuditEventType, Currency, StoredTransaction},
};

/// Amount of one currency to move.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AmountRequest {
    /// Currency code: BTC, ETH, USDT or INR.
    pub currency: String,
    #[schema(value_type = String, example = "1000.50")]
    pub amount: Decimal,
}

impl AmountRequest {
    pub fn currency(&self) -> Result<Currency, ServiceError> {
        Currency::parse(&self.currency)
            .ok_or_else(|| ServiceError::validation(format!("Unsupported currency: {}", self.currency)))
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TransactionsQuery {
    /// Maximum number of transactions, newest first (default 50).
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    pub transactions: Vec<StoredTransaction>,
    pub total: usize,
}

fn movement_event(
    event_type: AuditEventType,
    user_id: &str,
    receipt: &WalletReceipt,
) -> AuditEvent {
    AuditEvent::new(event_type)
        .with_user(user_id)
        .with_resource("transaction", &receipt.transaction.id)
        .with_details(serde_json::json!({
            "currency": receipt.transaction.currency,
            "amount": receipt.transaction.amount,
        }))
}

/// Balances and lock flags of the caller's wallet.
#[utoipa::path(
    get,
    path = "/v1/wallet",
    tag = "Wallet",
    responses(
        (status = 200, description = "Wallet", body = WalletView),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_wallet(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<WalletView>, ApiError> {
    Ok(Json(WalletService::new(&state.store).get_wallet(&user.user_id)?))
}

/// Credit the caller's wallet. INR deposits pay the referrer a deposit bonus.
#[utoipa::path(
    post,
    path = "/v1/wallet/deposit",
    tag = "Wallet",
    request_body = AmountRequest,
    responses(
        (status = 200, description = "Deposit recorded", body = WalletReceipt),
        (status = 400, description = "Invalid amount or currency", body = crate::error::ErrorBody),
        (status = 403, description = "Wallet locked or trading halted", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn deposit(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<AmountRequest>,
) -> Result<Json<WalletReceipt>, ApiError> {
    let currency = req.currency()?;
    let receipt = WalletService::new(&state.store).deposit(&user.user_id, currency, req.amount)?;
    audit_log!(
        &state.store,
        movement_event(AuditEventType::Deposit, &user.user_id, &receipt)
    );
    Ok(Json(receipt))
}

#[utoipa::path(
    post,
    path = "/v1/wallet/withdraw",
    tag = "Wallet",
    request_body = AmountRequest,
    responses(
        (status = 200, description = "Withdrawal recorded", body = WalletReceipt),
        (status = 400, description = "Invalid amount or insufficient funds", body = crate::error::ErrorBody),
        (status = 403, description = "Wallet locked or withdrawals paused", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn withdraw(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<AmountRequest>,
) -> Result<Json<WalletReceipt>, ApiError> {
    let currency = req.currency()?;
    let receipt = WalletService::new(&state.store).withdraw(&user.user_id, currency, req.amount)?;
    audit_log!(
        &state.store,
        movement_event(AuditEventType::Withdrawal, &user.user_id, &receipt)
    );
    Ok(Json(receipt))
}

#[utoipa::path(
    get,
    path = "/v1/wallet/transactions",
    tag = "Wallet",
    params(TransactionsQuery),
    responses(
        (status = 200, description = "Transactions, newest first", body = TransactionListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_transactions(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<TransactionsQuery>,
) -> Result<Json<TransactionListResponse>, ApiError> {
    let transactions = WalletService::new(&state.store)
        .list_transactions(&user.user_id, query.limit.unwrap_or(DEFAULT_TX_LIMIT))?;
    let total = transactions.len();
    Ok(Json(TransactionListResponse {
        transactions,
        total,
    }))
}
