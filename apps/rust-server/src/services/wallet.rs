// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet service: validated deposits and withdrawals over the ledger store.

use std::collections::BTreeMap;

use redb::WriteTransaction;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::referral::{CommissionEvent, CommissionOutcome, ReferralEngine};
use super::ServiceError;
use crate::storage::{
    AccountRepository, Currency, LedgerStore, ReferralAction, Store, StoredAccount,
    StoredTransaction, SystemRepository, TransactionKind, TransactionRepository,
};

/// Maximum fractional digits accepted on an amount.
pub const MAX_AMOUNT_SCALE: u32 = 8;

/// Default and maximum transaction listing sizes.
pub const DEFAULT_TX_LIMIT: usize = 50;
pub const MAX_TX_LIMIT: usize = 500;

/// Reject non-positive amounts and amounts finer than the ledger tracks.
pub fn validate_amount(amount: Decimal) -> Result<(), ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::validation("Amount must be greater than zero"));
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(ServiceError::validation(format!(
            "Amount supports at most {MAX_AMOUNT_SCALE} decimal places"
        )));
    }
    Ok(())
}

/// Wallet snapshot for one account.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletView {
    pub balances: BTreeMap<Currency, Decimal>,
    pub wallet_locked: bool,
    pub staking_locked: bool,
}

/// Outcome of a deposit or withdrawal.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletReceipt {
    pub transaction: StoredTransaction,
    pub balance: Decimal,
    /// Referral commission triggered by this movement, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission: Option<CommissionOutcome>,
}

pub struct WalletService<'a> {
    store: &'a Store,
}

impl<'a> WalletService<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn get_wallet(&self, account_id: &str) -> Result<WalletView, ServiceError> {
        let account = AccountRepository::new(self.store)
            .get(account_id)?
            .ok_or_else(|| ServiceError::not_found("Account not found"))?;
        Ok(WalletView {
            balances: LedgerStore::new(self.store).balances(account_id)?,
            wallet_locked: account.wallet_locked,
            staking_locked: account.staking_locked,
        })
    }

    pub fn list_transactions(
        &self,
        account_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredTransaction>, ServiceError> {
        let limit = limit.clamp(1, MAX_TX_LIMIT);
        Ok(TransactionRepository::new(self.store).list_for_account(account_id, limit)?)
    }

    /// Credit an account and record the deposit.
    ///
    /// A reference-currency deposit pays the depositor's referrer a
    /// `deposit_bonus` commission in the same write transaction, keyed by the
    /// deposit's transaction id.
    pub fn deposit(
        &self,
        account_id: &str,
        currency: Currency,
        amount: Decimal,
    ) -> Result<WalletReceipt, ServiceError> {
        validate_amount(amount)?;

        let receipt = self.store.write(|txn| {
            Self::ensure_mutable(txn, account_id)?;

            let balance = LedgerStore::credit_in(txn, account_id, currency, amount)?;
            let transaction = StoredTransaction::completed(
                account_id,
                TransactionKind::Deposit,
                currency,
                amount,
                balance,
            );
            TransactionRepository::append_in(txn, &transaction)?;

            let commission = if currency == Currency::REFERENCE {
                let event_id = format!("deposit:{}", transaction.id);
                Some(ReferralEngine::process_commission_in(
                    txn,
                    &CommissionEvent {
                        account_id,
                        action: ReferralAction::DepositBonus,
                        amount,
                        event_id: Some(&event_id),
                        transaction_id: Some(&transaction.id),
                    },
                )?)
            } else {
                None
            };

            Ok::<_, ServiceError>(WalletReceipt {
                transaction,
                balance,
                commission,
            })
        })?;

        tracing::info!(
            account_id = %account_id,
            currency = %currency,
            amount = %amount,
            balance = %receipt.balance,
            "Deposit applied"
        );
        Ok(receipt)
    }

    /// Debit an account and record the withdrawal. `InsufficientFunds`
    /// leaves the balance untouched.
    pub fn withdraw(
        &self,
        account_id: &str,
        currency: Currency,
        amount: Decimal,
    ) -> Result<WalletReceipt, ServiceError> {
        validate_amount(amount)?;

        let receipt = self.store.write(|txn| {
            Self::ensure_mutable(txn, account_id)?;
            if SystemRepository::get_in(txn)?.withdrawals_paused {
                return Err(ServiceError::forbidden("Withdrawals are temporarily paused"));
            }

            let balance = LedgerStore::debit_in(txn, account_id, currency, amount)?;
            let transaction = StoredTransaction::completed(
                account_id,
                TransactionKind::Withdraw,
                currency,
                amount,
                balance,
            );
            TransactionRepository::append_in(txn, &transaction)?;

            Ok::<_, ServiceError>(WalletReceipt {
                transaction,
                balance,
                commission: None,
            })
        })?;

        tracing::info!(
            account_id = %account_id,
            currency = %currency,
            amount = %amount,
            balance = %receipt.balance,
            "Withdrawal applied"
        );
        Ok(receipt)
    }

    /// Entry checks shared by every balance mutation: system not halted,
    /// account exists and its wallet is not locked.
    pub(crate) fn ensure_mutable(
        txn: &WriteTransaction,
        account_id: &str,
    ) -> Result<StoredAccount, ServiceError> {
        if SystemRepository::get_in(txn)?.trading_halted {
            return Err(ServiceError::forbidden(
                "Trading is halted by an emergency shutdown",
            ));
        }
        let account = AccountRepository::get_in(txn, account_id)?
            .ok_or_else(|| ServiceError::not_found("Account not found"))?;
        if account.wallet_locked {
            return Err(ServiceError::WalletLocked(
                "Wallet is locked by an administrator".to_string(),
            ));
        }
        Ok(account)
    }
}
