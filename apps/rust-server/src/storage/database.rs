// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded exchange database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `accounts`: account_id → serialized StoredAccount
//! - `account_email_index`: normalized email → account_id
//! - `referral_code_index`: referral code → account_id
//! - `balances`: `account_id|CURRENCY` → decimal string
//! - `transactions`: tx_id → serialized StoredTransaction
//! - `account_tx_index`: `account_id|!timestamp|tx_id` → tx_id
//! - `referral_ledger`: entry_id → serialized ReferralLedgerEntry
//! - `referrer_ledger_index`: `referrer_id|!timestamp|entry_id` → entry_id
//! - `commission_events`: caller-supplied event id → entry_id
//! - `kyc_records`: kyc_id → serialized KycRecord
//! - `kyc_by_account`: account_id → kyc_id
//! - `stakes`: stake_id → serialized StakePosition
//! - `account_stake_index`: `account_id|stake_id` → stake_id
//! - `verifications`: purpose-scoped key → serialized VerificationCode
//! - `system_config`: key → serialized SystemConfig
//! - `audit_events`: `timestamp|event_id` → serialized AuditEvent
//!
//! redb admits one write transaction at a time. Every operation that must be
//! atomic runs inside a single write transaction; dropping the transaction
//! without committing discards all of its writes.

use std::path::Path;

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::{de::DeserializeOwned, Serialize};

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");
pub(crate) const ACCOUNT_EMAIL_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("account_email_index");
pub(crate) const REFERRAL_CODE_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("referral_code_index");
pub(crate) const BALANCES: TableDefinition<&str, &str> = TableDefinition::new("balances");
pub(crate) const TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("transactions");
pub(crate) const ACCOUNT_TX_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("account_tx_index");
pub(crate) const REFERRAL_LEDGER: TableDefinition<&str, &[u8]> =
    TableDefinition::new("referral_ledger");
pub(crate) const REFERRER_LEDGER_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("referrer_ledger_index");
pub(crate) const COMMISSION_EVENTS: TableDefinition<&str, &str> =
    TableDefinition::new("commission_events");
pub(crate) const KYC_RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("kyc_records");
pub(crate) const KYC_BY_ACCOUNT: TableDefinition<&str, &str> = TableDefinition::new("kyc_by_account");
pub(crate) const STAKES: TableDefinition<&str, &[u8]> = TableDefinition::new("stakes");
pub(crate) const ACCOUNT_STAKE_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("account_stake_index");
pub(crate) const VERIFICATIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("verifications");
pub(crate) const SYSTEM_CONFIG: TableDefinition<&str, &[u8]> =
    TableDefinition::new("system_config");
pub(crate) const AUDIT_EVENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("audit_events");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Store
// =============================================================================

/// Embedded ACID store holding every exchange entity.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(ACCOUNT_EMAIL_INDEX)?;
            let _ = write_txn.open_table(REFERRAL_CODE_INDEX)?;
            let _ = write_txn.open_table(BALANCES)?;
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(ACCOUNT_TX_INDEX)?;
            let _ = write_txn.open_table(REFERRAL_LEDGER)?;
            let _ = write_txn.open_table(REFERRER_LEDGER_INDEX)?;
            let _ = write_txn.open_table(COMMISSION_EVENTS)?;
            let _ = write_txn.open_table(KYC_RECORDS)?;
            let _ = write_txn.open_table(KYC_BY_ACCOUNT)?;
            let _ = write_txn.open_table(STAKES)?;
            let _ = write_txn.open_table(ACCOUNT_STAKE_INDEX)?;
            let _ = write_txn.open_table(VERIFICATIONS)?;
            let _ = write_txn.open_table(SYSTEM_CONFIG)?;
            let _ = write_txn.open_table(AUDIT_EVENTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Start a write transaction. Blocks while another writer is active.
    pub fn begin_write(&self) -> StoreResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Start a read transaction over a consistent snapshot.
    pub fn begin_read(&self) -> StoreResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    /// Run `f` inside a write transaction and commit only if it succeeds.
    ///
    /// Any error returned by `f` drops the transaction uncommitted, so none of
    /// its writes become visible.
    pub fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&WriteTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let txn = self.begin_write()?;
        let value = f(&txn)?;
        txn.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    /// Write-read-delete round trip used by health checks.
    pub fn health_check(&self) -> StoreResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(SYSTEM_CONFIG)?;
            table.insert(".health_check", b"ok".as_slice())?;
            let ok = table
                .get(".health_check")?
                .map(|v| v.value() == b"ok")
                .unwrap_or(false);
            table.remove(".health_check")?;
            if !ok {
                return Err(StoreError::Corrupt("health check mismatch".to_string()));
            }
        }
        txn.abort()?;
        Ok(())
    }
}

// =============================================================================
// JSON Record Helpers
// =============================================================================

/// Read and deserialize a JSON record.
pub(crate) fn get_json<T, Tbl>(table: &Tbl, key: &str) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

/// Serialize a record as JSON bytes.
pub(crate) fn to_json<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Read a string value from an index table.
pub(crate) fn get_str<Tbl>(table: &Tbl, key: &str) -> StoreResult<Option<String>>
where
    Tbl: ReadableTable<&'static str, &'static str>,
{
    Ok(table.get(key)?.map(|v| v.value().to_string()))
}

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key: `owner | inverted_timestamp_be_bytes | id`.
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
pub(crate) fn make_time_index_key(owner: &str, timestamp_micros: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(owner.len() + 1 + 8 + 1 + id.len());
    key.extend_from_slice(owner.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!timestamp_micros as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(id.as_bytes());
    key
}

/// Inclusive lower / exclusive upper bounds covering every key for `owner`.
pub(crate) fn owner_range(owner: &str) -> (Vec<u8>, Vec<u8>) {
    let mut start = Vec::with_capacity(owner.len() + 1);
    start.extend_from_slice(owner.as_bytes());
    start.push(b'|');

    let mut end = start.clone();
    end.extend_from_slice(&[0xFF; 20]);
    (start, end)
}

#[cfg(test)]
pub(crate) fn temp_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("test.redb")).unwrap();
    (store, dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_tables_and_passes_health_check() {
        let (store, _dir) = temp_store();
        store.health_check().unwrap();

        let read = store.begin_read().unwrap();
        let table = read.open_table(ACCOUNTS).unwrap();
        assert!(get_json::<serde_json::Value, _>(&table, "missing")
            .unwrap()
            .is_none());
    }

    #[test]
    fn write_rolls_back_on_error() {
        let (store, _dir) = temp_store();

        let result: Result<(), StoreError> = store.write(|txn| {
            let mut table = txn.open_table(BALANCES)?;
            table.insert("a|INR", "10")?;
            Err(StoreError::Corrupt("boom".to_string()))
        });
        assert!(result.is_err());

        let read = store.begin_read().unwrap();
        let table = read.open_table(BALANCES).unwrap();
        assert!(get_str(&table, "a|INR").unwrap().is_none());
    }

    #[test]
    fn time_index_orders_newest_first() {
        let old = make_time_index_key("acct", 1_000, "tx1");
        let new = make_time_index_key("acct", 2_000, "tx2");
        assert!(new < old);

        let (start, end) = owner_range("acct");
        assert!(start.as_slice() < new.as_slice() && old.as_slice() < end.as_slice());
    }
}
