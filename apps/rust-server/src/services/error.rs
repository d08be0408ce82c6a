// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Domain error taxonomy shared by every service.

use rust_decimal::Decimal;

use crate::auth::{password::PasswordError, AuthError};
use crate::providers::price_feed::PriceFeedError;
use crate::storage::{LedgerError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    /// Authenticated but not allowed (role, suspension, system switch).
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("{0}")]
    WalletLocked(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "Storage failure");
        ServiceError::Internal("storage failure".to_string())
    }
}

impl From<LedgerError> for ServiceError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NonPositiveAmount => {
                ServiceError::Validation("Amount must be greater than zero".to_string())
            }
            LedgerError::AmountOutOfRange => {
                ServiceError::Validation("Amount exceeds the supported range".to_string())
            }
            LedgerError::InsufficientFunds {
                available,
                requested,
            } => ServiceError::InsufficientFunds {
                available,
                requested,
            },
            LedgerError::Store(e) => e.into(),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::TooShort => ServiceError::Validation(e.to_string()),
            PasswordError::Hashing(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InternalError(msg) => ServiceError::Internal(msg),
            other => ServiceError::Unauthenticated(other.to_string()),
        }
    }
}

impl From<PriceFeedError> for ServiceError {
    fn from(e: PriceFeedError) -> Self {
        ServiceError::PriceUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_map_to_taxonomy() {
        let err: ServiceError = LedgerError::InsufficientFunds {
            available: Decimal::ONE,
            requested: Decimal::TEN,
        }
        .into();
        assert!(matches!(err, ServiceError::InsufficientFunds { .. }));

        let err: ServiceError = LedgerError::NonPositiveAmount.into();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err: ServiceError = LedgerError::AmountOutOfRange.into();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn storage_details_are_not_exposed() {
        let err: ServiceError = StoreError::Corrupt("balance \"x\"".to_string()).into();
        assert_eq!(err.to_string(), "Internal error: storage failure");
    }
}
