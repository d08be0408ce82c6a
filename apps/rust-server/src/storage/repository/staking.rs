// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Staking position repository.

use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::balances::Currency;
use crate::storage::database::{
    get_json, to_json, Store, StoreResult, ACCOUNT_STAKE_INDEX, STAKES,
};

/// Staking position status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StakeStatus {
    Active,
    Foreclosed,
    Completed,
}

/// A locked staking position.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StakePosition {
    pub id: String,
    pub account_id: String,
    pub currency: Currency,
    pub amount: Decimal,
    pub status: StakeStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub foreclosed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub foreclosed_by: Option<String>,
    /// Reference-currency price per unit used for the foreclosure payout.
    #[serde(default)]
    pub foreclosure_price: Option<Decimal>,
    /// Reference-currency amount credited on foreclosure.
    #[serde(default)]
    pub payout: Option<Decimal>,
}

fn stake_index_key(account_id: &str, stake_id: &str) -> String {
    format!("{account_id}|{stake_id}")
}

/// Repository for staking positions.
pub struct StakingRepository<'a> {
    store: &'a Store,
}

impl<'a> StakingRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn get(&self, stake_id: &str) -> StoreResult<Option<StakePosition>> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(STAKES)?;
        get_json(&table, stake_id)
    }

    /// An account's positions, newest first.
    pub fn list_for_account(&self, account_id: &str) -> StoreResult<Vec<StakePosition>> {
        let txn = self.store.begin_read()?;
        let index = txn.open_table(ACCOUNT_STAKE_INDEX)?;
        let table = txn.open_table(STAKES)?;

        let start = format!("{account_id}|");
        let end = format!("{account_id}|\u{10FFFF}");
        let mut positions = Vec::new();
        for entry in index.range(start.as_str()..end.as_str())? {
            let (_, stake_id) = entry?;
            if let Some(position) = get_json::<StakePosition, _>(&table, stake_id.value())? {
                positions.push(position);
            }
        }
        positions.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(positions)
    }

    pub fn get_in(txn: &WriteTransaction, stake_id: &str) -> StoreResult<Option<StakePosition>> {
        let table = txn.open_table(STAKES)?;
        get_json(&table, stake_id)
    }

    pub fn put_in(txn: &WriteTransaction, position: &StakePosition) -> StoreResult<()> {
        let json = to_json(position)?;
        txn.open_table(STAKES)?
            .insert(position.id.as_str(), json.as_slice())?;
        let key = stake_index_key(&position.account_id, &position.id);
        txn.open_table(ACCOUNT_STAKE_INDEX)?
            .insert(key.as_str(), position.id.as_str())?;
        Ok(())
    }

    /// Remove every position owned by an account.
    pub fn remove_account_in(txn: &WriteTransaction, account_id: &str) -> StoreResult<()> {
        let start = format!("{account_id}|");
        let end = format!("{account_id}|\u{10FFFF}");
        let mut pairs = Vec::new();
        {
            let index = txn.open_table(ACCOUNT_STAKE_INDEX)?;
            for entry in index.range(start.as_str()..end.as_str())? {
                let (key, stake_id) = entry?;
                pairs.push((key.value().to_string(), stake_id.value().to_string()));
            }
        }
        let mut index = txn.open_table(ACCOUNT_STAKE_INDEX)?;
        let mut table = txn.open_table(STAKES)?;
        for (key, stake_id) in &pairs {
            index.remove(key.as_str())?;
            table.remove(stake_id.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_store;

    fn position(account: &str, days_ago: i64) -> StakePosition {
        let start = Utc::now() - chrono::Duration::days(days_ago);
        StakePosition {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account.to_string(),
            currency: Currency::Btc,
            amount: Decimal::ONE,
            status: StakeStatus::Active,
            start_date: start,
            end_date: start + chrono::Duration::days(365 * 5),
            foreclosed_at: None,
            foreclosed_by: None,
            foreclosure_price: None,
            payout: None,
        }
    }

    #[test]
    fn lists_only_own_positions_newest_first() {
        let (store, _dir) = temp_store();
        let older = position("acct", 10);
        let newer = position("acct", 1);
        let foreign = position("acct2", 0);
        store
            .write(|txn| {
                StakingRepository::put_in(txn, &older)?;
                StakingRepository::put_in(txn, &newer)?;
                StakingRepository::put_in(txn, &foreign)
            })
            .unwrap();

        let repo = StakingRepository::new(&store);
        let listed = repo.list_for_account("acct").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);

        store
            .write(|txn| StakingRepository::remove_account_in(txn, "acct"))
            .unwrap();
        assert!(repo.list_for_account("acct").unwrap().is_empty());
        assert!(repo.get(&foreign.id).unwrap().is_some());
    }
}
