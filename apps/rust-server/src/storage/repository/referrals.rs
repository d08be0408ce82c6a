// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Referral ledger repository.
//!
//! Ledger entries are immutable once written. `referrer_ledger_index` orders
//! a referrer's entries newest-first; `commission_events` maps a caller
//! supplied event id to the entry it produced.

use chrono::{DateTime, Utc};
use redb::WriteTransaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{
    get_json, get_str, make_time_index_key, owner_range, to_json, Store, StoreResult,
    COMMISSION_EVENTS, REFERRAL_LEDGER, REFERRER_LEDGER_INDEX,
};

/// Account action that earned the referrer a commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReferralAction {
    Registration,
    TradingFee,
    DepositBonus,
    Withdrawal,
    FirstTrade,
}

/// Ledger entry status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Completed,
    Failed,
}

/// Point-in-time snapshot of the inputs to a commission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommissionDetails {
    pub original_amount: Decimal,
    /// Percentage applied, e.g. `25` for 25%.
    pub commission_rate: u32,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Referral ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReferralLedgerEntry {
    pub id: String,
    pub referrer_id: String,
    pub referred_user_id: String,
    pub action: ReferralAction,
    /// Commission credited to the referrer.
    pub amount: Decimal,
    pub status: CommissionStatus,
    pub details: CommissionDetails,
    #[serde(default)]
    pub event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Repository for referral ledger entries.
pub struct ReferralRepository<'a> {
    store: &'a Store,
}

impl<'a> ReferralRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Append an entry and index it under its referrer.
    pub fn append_in(txn: &WriteTransaction, entry: &ReferralLedgerEntry) -> StoreResult<()> {
        let json = to_json(entry)?;
        txn.open_table(REFERRAL_LEDGER)?
            .insert(entry.id.as_str(), json.as_slice())?;

        let key = make_time_index_key(
            &entry.referrer_id,
            entry.created_at.timestamp_micros(),
            &entry.id,
        );
        txn.open_table(REFERRER_LEDGER_INDEX)?
            .insert(key.as_slice(), entry.id.as_str())?;

        if let Some(event_id) = &entry.event_id {
            txn.open_table(COMMISSION_EVENTS)?
                .insert(event_id.as_str(), entry.id.as_str())?;
        }
        Ok(())
    }

    /// Ledger entry previously produced by `event_id`, if any.
    pub fn entry_for_event_in(
        txn: &WriteTransaction,
        event_id: &str,
    ) -> StoreResult<Option<String>> {
        let table = txn.open_table(COMMISSION_EVENTS)?;
        get_str(&table, event_id)
    }

    pub fn get(&self, entry_id: &str) -> StoreResult<Option<ReferralLedgerEntry>> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(REFERRAL_LEDGER)?;
        get_json(&table, entry_id)
    }

    /// One page of a referrer's entries, newest first, plus the total count.
    pub fn page_for_referrer(
        &self,
        referrer_id: &str,
        offset: usize,
        limit: usize,
    ) -> StoreResult<(Vec<ReferralLedgerEntry>, usize)> {
        let txn = self.store.begin_read()?;
        let index = txn.open_table(REFERRER_LEDGER_INDEX)?;
        let table = txn.open_table(REFERRAL_LEDGER)?;

        let (start, end) = owner_range(referrer_id);
        let mut total = 0usize;
        let mut page = Vec::with_capacity(limit.min(64));
        for entry in index.range(start.as_slice()..end.as_slice())? {
            let (_, entry_id) = entry?;
            if total >= offset && page.len() < limit {
                if let Some(record) = get_json(&table, entry_id.value())? {
                    page.push(record);
                }
            }
            total += 1;
        }
        Ok((page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_store;

    fn entry(referrer: &str, amount: i64, event: Option<&str>, offset_secs: i64) -> ReferralLedgerEntry {
        ReferralLedgerEntry {
            id: uuid::Uuid::new_v4().to_string(),
            referrer_id: referrer.to_string(),
            referred_user_id: "referred".to_string(),
            action: ReferralAction::TradingFee,
            amount: Decimal::from(amount),
            status: CommissionStatus::Completed,
            details: CommissionDetails {
                original_amount: Decimal::from(amount * 10),
                commission_rate: 10,
                transaction_id: None,
            },
            event_id: event.map(str::to_string),
            created_at: Utc::now() + chrono::Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn pages_newest_first_with_total() {
        let (store, _dir) = temp_store();
        let entries: Vec<_> = (0..5).map(|i| entry("ref", i + 1, None, i)).collect();
        store
            .write(|txn| {
                for e in &entries {
                    ReferralRepository::append_in(txn, e)?;
                }
                ReferralRepository::append_in(txn, &entry("someone_else", 1, None, 0))
            })
            .unwrap();

        let repo = ReferralRepository::new(&store);
        let (first_page, total) = repo.page_for_referrer("ref", 0, 2).unwrap();
        assert_eq!(total, 5);
        assert_eq!(first_page[0].id, entries[4].id);
        assert_eq!(first_page[1].id, entries[3].id);

        let (last_page, _) = repo.page_for_referrer("ref", 4, 2).unwrap();
        assert_eq!(last_page.len(), 1);
        assert_eq!(last_page[0].id, entries[0].id);
    }

    #[test]
    fn event_ids_are_recorded() {
        let (store, _dir) = temp_store();
        let e = entry("ref", 3, Some("deposit:1"), 0);
        store
            .write(|txn| ReferralRepository::append_in(txn, &e))
            .unwrap();

        let found = store
            .write(|txn| ReferralRepository::entry_for_event_in(txn, "deposit:1"))
            .unwrap();
        assert_eq!(found.as_deref(), Some(e.id.as_str()));
        assert_eq!(
            ReferralRepository::new(&store).get(&e.id).unwrap().unwrap().amount,
            Decimal::from(3)
        );
    }
}
