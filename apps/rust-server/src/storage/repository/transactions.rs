// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction repository: the append-only wallet audit trail.
//!
//! ## Storage Layout
//!
//! Records live in `transactions` keyed by id. `account_tx_index` holds
//! `account_id | !timestamp | tx_id` so a forward scan over an account's
//! prefix yields newest-first.

use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::balances::Currency;
use crate::storage::database::{
    get_json, make_time_index_key, owner_range, to_json, Store, StoreResult, ACCOUNT_TX_INDEX,
    TRANSACTIONS,
};

/// Transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

/// What moved the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    /// Funds moved into a staking position.
    Stake,
    /// Reference-currency payout from a foreclosed stake.
    StakePayout,
}

/// Stored transaction record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoredTransaction {
    pub id: String,
    pub account_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub currency: Currency,
    pub amount: Decimal,
    pub status: TxStatus,
    /// Balance of `currency` right after this transaction applied.
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl StoredTransaction {
    /// A record for a movement that has already been applied.
    pub fn completed(
        account_id: &str,
        kind: TransactionKind,
        currency: Currency,
        amount: Decimal,
        balance_after: Decimal,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            kind,
            currency,
            amount,
            status: TxStatus::Completed,
            balance_after,
            created_at: Utc::now(),
        }
    }
}

/// Repository for transaction records.
pub struct TransactionRepository<'a> {
    store: &'a Store,
}

impl<'a> TransactionRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Append a record. Records are never rewritten afterwards.
    pub fn append_in(txn: &WriteTransaction, tx: &StoredTransaction) -> StoreResult<()> {
        let json = to_json(tx)?;
        txn.open_table(TRANSACTIONS)?
            .insert(tx.id.as_str(), json.as_slice())?;

        let key = make_time_index_key(&tx.account_id, tx.created_at.timestamp_micros(), &tx.id);
        txn.open_table(ACCOUNT_TX_INDEX)?
            .insert(key.as_slice(), tx.id.as_str())?;
        Ok(())
    }

    pub fn get(&self, tx_id: &str) -> StoreResult<Option<StoredTransaction>> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(TRANSACTIONS)?;
        get_json(&table, tx_id)
    }

    /// Most recent transactions for an account, newest first.
    pub fn list_for_account(
        &self,
        account_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<StoredTransaction>> {
        let txn = self.store.begin_read()?;
        let index = txn.open_table(ACCOUNT_TX_INDEX)?;
        let table = txn.open_table(TRANSACTIONS)?;

        let (start, end) = owner_range(account_id);
        let mut results = Vec::with_capacity(limit.min(64));
        for entry in index.range(start.as_slice()..end.as_slice())? {
            if results.len() >= limit {
                break;
            }
            let (_, tx_id) = entry?;
            if let Some(tx) = get_json(&table, tx_id.value())? {
                results.push(tx);
            }
        }
        Ok(results)
    }

    /// Remove every record for an account.
    pub fn remove_account_in(txn: &WriteTransaction, account_id: &str) -> StoreResult<()> {
        let (start, end) = owner_range(account_id);
        let mut keys = Vec::new();
        let mut ids = Vec::new();
        {
            let index = txn.open_table(ACCOUNT_TX_INDEX)?;
            for entry in index.range(start.as_slice()..end.as_slice())? {
                let (key, id) = entry?;
                keys.push(key.value().to_vec());
                ids.push(id.value().to_string());
            }
        }
        let mut index = txn.open_table(ACCOUNT_TX_INDEX)?;
        for key in &keys {
            index.remove(key.as_slice())?;
        }
        let mut table = txn.open_table(TRANSACTIONS)?;
        for id in &ids {
            table.remove(id.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_store;

    fn record(account: &str, amount: i64, offset_secs: i64) -> StoredTransaction {
        let mut tx = StoredTransaction::completed(
            account,
            TransactionKind::Deposit,
            Currency::Inr,
            Decimal::from(amount),
            Decimal::from(amount),
        );
        tx.created_at += chrono::Duration::seconds(offset_secs);
        tx
    }

    #[test]
    fn lists_newest_first_and_respects_limit() {
        let (store, _dir) = temp_store();
        let first = record("acct", 1, 0);
        let second = record("acct", 2, 10);
        let third = record("acct", 3, 20);
        let other = record("other", 9, 30);

        store
            .write(|txn| {
                for tx in [&first, &second, &third, &other] {
                    TransactionRepository::append_in(txn, tx)?;
                }
                Ok::<_, crate::storage::StoreError>(())
            })
            .unwrap();

        let repo = TransactionRepository::new(&store);
        let all = repo.list_for_account("acct", 10).unwrap();
        let ids: Vec<_> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![third.id.as_str(), second.id.as_str(), first.id.as_str()]);

        assert_eq!(repo.list_for_account("acct", 2).unwrap().len(), 2);
        assert_eq!(repo.get(&other.id).unwrap().unwrap().account_id, "other");
    }

    #[test]
    fn remove_account_clears_records() {
        let (store, _dir) = temp_store();
        let tx = record("acct", 5, 0);
        store
            .write(|txn| TransactionRepository::append_in(txn, &tx))
            .unwrap();
        store
            .write(|txn| TransactionRepository::remove_account_in(txn, "acct"))
            .unwrap();

        let repo = TransactionRepository::new(&store);
        assert!(repo.list_for_account("acct", 10).unwrap().is_empty());
        assert!(repo.get(&tx.id).unwrap().is_none());
    }

    #[test]
    fn serializes_kind_as_type() {
        let tx = record("acct", 1, 0);
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "deposit");
        assert_eq!(json["currency"], "INR");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["amount"], "1");
    }
}
