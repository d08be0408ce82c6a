// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Staking: lock funds for a fixed term, with superadmin foreclosure.

use chrono::{Months, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::wallet::{validate_amount, WalletService};
use super::ServiceError;
use crate::providers::PriceFeed;
use crate::storage::{
    Currency, LedgerStore, StakePosition, StakeStatus, StakingRepository, Store,
    StoredTransaction, TransactionKind, TransactionRepository,
};

/// Staking term.
pub const STAKE_TERM_MONTHS: u32 = 60;

/// Result of opening or foreclosing a position.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StakeReceipt {
    pub position: StakePosition,
    pub transaction: StoredTransaction,
    /// Balance of the currency moved by this operation.
    pub balance: Decimal,
}

pub struct StakingService<'a> {
    store: &'a Store,
}

impl<'a> StakingService<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Debit `amount` and open a position ending five years from now.
    pub fn stake(
        &self,
        account_id: &str,
        currency: Currency,
        amount: Decimal,
    ) -> Result<StakeReceipt, ServiceError> {
        validate_amount(amount)?;

        let receipt = self.store.write(|txn| {
            let account = WalletService::ensure_mutable(txn, account_id)?;
            if account.staking_locked {
                return Err(ServiceError::WalletLocked(
                    "Staking is locked by an administrator".to_string(),
                ));
            }

            let balance = LedgerStore::debit_in(txn, account_id, currency, amount)?;
            let start_date = Utc::now();
            let end_date = start_date
                .checked_add_months(Months::new(STAKE_TERM_MONTHS))
                .ok_or_else(|| ServiceError::Internal("stake end date overflow".to_string()))?;
            let position = StakePosition {
                id: uuid::Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                currency,
                amount,
                status: StakeStatus::Active,
                start_date,
                end_date,
                foreclosed_at: None,
                foreclosed_by: None,
                foreclosure_price: None,
                payout: None,
            };
            StakingRepository::put_in(txn, &position)?;

            let transaction = StoredTransaction::completed(
                account_id,
                TransactionKind::Stake,
                currency,
                amount,
                balance,
            );
            TransactionRepository::append_in(txn, &transaction)?;

            Ok::<_, ServiceError>(StakeReceipt {
                position,
                transaction,
                balance,
            })
        })?;

        tracing::info!(
            account_id = %account_id,
            currency = %currency,
            amount = %amount,
            stake_id = %receipt.position.id,
            "Stake opened"
        );
        Ok(receipt)
    }

    /// Close an active position early, paying `amount × price` in the
    /// reference currency.
    ///
    /// The price is fetched before any mutation; a feed failure leaves the
    /// position active.
    pub async fn foreclose(
        &self,
        stake_id: &str,
        price_feed: &dyn PriceFeed,
        actor_id: &str,
    ) -> Result<StakeReceipt, ServiceError> {
        let position = StakingRepository::new(self.store)
            .get(stake_id)?
            .ok_or_else(|| ServiceError::not_found("Staking position not found"))?;
        if position.status != StakeStatus::Active {
            return Err(ServiceError::conflict("Staking position is not active"));
        }

        let price = price_feed.price_of(position.currency).await?;

        let receipt = self.store.write(|txn| {
            // Re-read under the write lock; a concurrent foreclosure may have won.
            let mut position = StakingRepository::get_in(txn, stake_id)?
                .ok_or_else(|| ServiceError::not_found("Staking position not found"))?;
            if position.status != StakeStatus::Active {
                return Err(ServiceError::conflict("Staking position is not active"));
            }

            let payout = position
                .amount
                .checked_mul(price)
                .ok_or_else(|| ServiceError::validation("Foreclosure payout out of range"))?;
            let balance =
                LedgerStore::credit_in(txn, &position.account_id, Currency::REFERENCE, payout)?;

            position.status = StakeStatus::Foreclosed;
            position.foreclosed_at = Some(Utc::now());
            position.foreclosed_by = Some(actor_id.to_string());
            position.foreclosure_price = Some(price);
            position.payout = Some(payout);
            StakingRepository::put_in(txn, &position)?;

            let transaction = StoredTransaction::completed(
                &position.account_id,
                TransactionKind::StakePayout,
                Currency::REFERENCE,
                payout,
                balance,
            );
            TransactionRepository::append_in(txn, &transaction)?;

            Ok::<_, ServiceError>(StakeReceipt {
                position,
                transaction,
                balance,
            })
        })?;

        tracing::info!(
            account_id = %receipt.position.account_id,
            currency = %Currency::REFERENCE,
            amount = %receipt.transaction.amount,
            stake_id = %stake_id,
            "Stake foreclosed"
        );
        Ok(receipt)
    }

    pub fn list_stakes(&self, account_id: &str) -> Result<Vec<StakePosition>, ServiceError> {
        Ok(StakingRepository::new(self.store).list_for_account(account_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::providers::price_feed::FixedPriceFeed;
    use crate::storage::database::temp_store;
    use crate::storage::{AccountRepository, StoredAccount};
    use std::collections::HashMap;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn funded_account(store: &Store, currency: Currency, amount: &str) -> StoredAccount {
        let account = StoredAccount::new(
            "Staker".to_string(),
            "staker@example.com".to_string(),
            "hash".to_string(),
            "individual".to_string(),
            Role::User,
            "STAKER01".to_string(),
        );
        store
            .write(|txn| {
                AccountRepository::insert_in(txn, &account)?;
                LedgerStore::credit_in(txn, &account.id, currency, dec(amount))?;
                Ok::<_, ServiceError>(())
            })
            .unwrap();
        account
    }

    fn feed(btc: &str) -> FixedPriceFeed {
        FixedPriceFeed {
            quotes: HashMap::from([(Currency::Btc, dec(btc))]),
        }
    }

    #[test]
    fn stake_debits_and_opens_five_year_position() {
        let (store, _dir) = temp_store();
        let account = funded_account(&store, Currency::Btc, "2");
        let service = StakingService::new(&store);

        let receipt = service.stake(&account.id, Currency::Btc, dec("0.5")).unwrap();
        assert_eq!(receipt.balance, dec("1.5"));
        assert_eq!(receipt.position.status, StakeStatus::Active);
        let years = receipt.position.end_date.signed_duration_since(receipt.position.start_date);
        assert!(years.num_days() >= 5 * 365);

        let stakes = service.list_stakes(&account.id).unwrap();
        assert_eq!(stakes.len(), 1);
        assert_eq!(stakes[0].id, receipt.position.id);
    }

    #[test]
    fn stake_respects_staking_lock_and_funds() {
        let (store, _dir) = temp_store();
        let mut account = funded_account(&store, Currency::Eth, "1");
        let service = StakingService::new(&store);

        let err = service.stake(&account.id, Currency::Eth, dec("2")).unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientFunds { .. }));

        account.staking_locked = true;
        store
            .write(|txn| AccountRepository::update_in(txn, &account))
            .unwrap();
        let err = service.stake(&account.id, Currency::Eth, dec("0.1")).unwrap_err();
        assert!(matches!(err, ServiceError::WalletLocked(_)));
        assert_eq!(
            LedgerStore::new(&store).balance(&account.id, Currency::Eth).unwrap(),
            dec("1")
        );
    }

    #[tokio::test]
    async fn foreclosure_pays_reference_currency_once() {
        let (store, _dir) = temp_store();
        let account = funded_account(&store, Currency::Btc, "1");
        let service = StakingService::new(&store);
        let stake = service.stake(&account.id, Currency::Btc, dec("0.5")).unwrap();

        let receipt = service
            .foreclose(&stake.position.id, &feed("4000000"), "root")
            .await
            .unwrap();
        assert_eq!(receipt.position.status, StakeStatus::Foreclosed);
        assert_eq!(receipt.position.payout, Some(dec("2000000")));
        assert_eq!(receipt.balance, dec("2000000"));
        assert_eq!(receipt.position.foreclosed_by.as_deref(), Some("root"));

        let err = service
            .foreclose(&stake.position.id, &feed("4000000"), "root")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(
            LedgerStore::new(&store).balance(&account.id, Currency::Inr).unwrap(),
            dec("2000000")
        );
    }

    #[tokio::test]
    async fn price_failure_leaves_position_active() {
        let (store, _dir) = temp_store();
        let account = funded_account(&store, Currency::Eth, "1");
        let service = StakingService::new(&store);
        let stake = service.stake(&account.id, Currency::Eth, dec("1")).unwrap();

        // The fixed feed only quotes BTC.
        let err = service
            .foreclose(&stake.position.id, &feed("1"), "root")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PriceUnavailable(_)));

        let position = StakingRepository::new(&store)
            .get(&stake.position.id)
            .unwrap()
            .unwrap();
        assert_eq!(position.status, StakeStatus::Active);
        assert_eq!(
            LedgerStore::new(&store).balance(&account.id, Currency::Inr).unwrap(),
            Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn unknown_position_is_not_found() {
        let (store, _dir) = temp_store();
        let err = StakingService::new(&store)
            .foreclose("missing", &feed("1"), "root")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
