// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account repository.
//!
//! One account record per user regardless of role. The email and referral
//! code indexes are maintained alongside the record in the same write
//! transaction.

use chrono::{DateTime, Utc};
use rand::Rng;
use redb::{ReadableTable, WriteTransaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::kyc::KycStatus;
use crate::auth::Role;
use crate::storage::database::{
    get_json, get_str, to_json, Store, StoreResult, ACCOUNTS, ACCOUNT_EMAIL_INDEX,
    REFERRAL_CODE_INDEX,
};

/// Referral code alphabet.
const REFERRAL_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Referral code length.
pub const REFERRAL_CODE_LEN: usize = 8;

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
}

/// Account as persisted.
///
/// `password_hash` never leaves the server; API views are built from this
/// type by the handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAccount {
    pub id: String,
    pub name: String,
    /// Normalized (NFKC, trimmed, lowercase) email.
    pub email: String,
    pub password_hash: String,
    pub user_type: String,
    pub role: Role,
    pub is_email_verified: bool,
    pub phone: Option<String>,
    pub is_phone_verified: bool,
    /// This account's own code, handed to people it refers.
    pub referral_code: String,
    /// Code of the account that referred this one. Set once at creation.
    pub referred_by: Option<String>,
    pub referral_count: u64,
    pub referral_earnings: Decimal,
    pub referred_users: Vec<String>,
    pub kyc_status: KycStatus,
    pub kyc_id: Option<String>,
    pub wallet_locked: bool,
    pub staking_locked: bool,
    pub status: AccountStatus,
    /// Bumped to revoke every token issued so far.
    pub token_version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredAccount {
    /// Fresh account with zeroed counters. The caller supplies the referral
    /// code, which must already be unique.
    pub fn new(
        name: String,
        email: String,
        password_hash: String,
        user_type: String,
        role: Role,
        referral_code: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            password_hash,
            user_type,
            role,
            is_email_verified: false,
            phone: None,
            is_phone_verified: false,
            referral_code,
            referred_by: None,
            referral_count: 0,
            referral_earnings: Decimal::ZERO,
            referred_users: Vec::new(),
            kyc_status: KycStatus::NotSubmitted,
            kyc_id: None,
            wallet_locked: false,
            staking_locked: false,
            status: AccountStatus::Active,
            token_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.status == AccountStatus::Suspended
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Random candidate referral code (not yet checked for uniqueness).
pub fn random_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| REFERRAL_CODE_CHARSET[rng.gen_range(0..REFERRAL_CODE_CHARSET.len())] as char)
        .collect()
}

/// Repository for account records.
pub struct AccountRepository<'a> {
    store: &'a Store,
}

impl<'a> AccountRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    // =========================================================================
    // Reads (snapshot)
    // =========================================================================

    pub fn get(&self, id: &str) -> StoreResult<Option<StoredAccount>> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(ACCOUNTS)?;
        get_json(&table, id)
    }

    pub fn find_by_email(&self, email: &str) -> StoreResult<Option<StoredAccount>> {
        let txn = self.store.begin_read()?;
        let index = txn.open_table(ACCOUNT_EMAIL_INDEX)?;
        let Some(id) = get_str(&index, email)? else {
            return Ok(None);
        };
        let table = txn.open_table(ACCOUNTS)?;
        get_json(&table, &id)
    }

    pub fn find_by_referral_code(&self, code: &str) -> StoreResult<Option<StoredAccount>> {
        let txn = self.store.begin_read()?;
        let index = txn.open_table(REFERRAL_CODE_INDEX)?;
        let Some(id) = get_str(&index, code)? else {
            return Ok(None);
        };
        let table = txn.open_table(ACCOUNTS)?;
        get_json(&table, &id)
    }

    /// Every account, oldest first.
    pub fn list(&self) -> StoreResult<Vec<StoredAccount>> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(ACCOUNTS)?;
        let mut accounts = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            accounts.push(serde_json::from_slice::<StoredAccount>(value.value())?);
        }
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(accounts)
    }

    // =========================================================================
    // Transactional access
    // =========================================================================

    pub fn get_in(txn: &WriteTransaction, id: &str) -> StoreResult<Option<StoredAccount>> {
        let table = txn.open_table(ACCOUNTS)?;
        get_json(&table, id)
    }

    pub fn id_for_email_in(txn: &WriteTransaction, email: &str) -> StoreResult<Option<String>> {
        let index = txn.open_table(ACCOUNT_EMAIL_INDEX)?;
        get_str(&index, email)
    }

    pub fn find_by_email_in(
        txn: &WriteTransaction,
        email: &str,
    ) -> StoreResult<Option<StoredAccount>> {
        match Self::id_for_email_in(txn, email)? {
            Some(id) => Self::get_in(txn, &id),
            None => Ok(None),
        }
    }

    pub fn find_by_referral_code_in(
        txn: &WriteTransaction,
        code: &str,
    ) -> StoreResult<Option<StoredAccount>> {
        let id = {
            let index = txn.open_table(REFERRAL_CODE_INDEX)?;
            get_str(&index, code)?
        };
        match id {
            Some(id) => Self::get_in(txn, &id),
            None => Ok(None),
        }
    }

    /// Generate a referral code that no account holds.
    ///
    /// Runs inside the creating write transaction. redb serializes writers,
    /// so a code checked free here cannot be claimed by a concurrent
    /// registration before this transaction commits.
    pub fn unique_referral_code_in(txn: &WriteTransaction) -> StoreResult<String> {
        let index = txn.open_table(REFERRAL_CODE_INDEX)?;
        loop {
            let candidate = random_referral_code();
            if index.get(candidate.as_str())?.is_none() {
                return Ok(candidate);
            }
        }
    }

    /// Insert a new account and its index entries.
    pub fn insert_in(txn: &WriteTransaction, account: &StoredAccount) -> StoreResult<()> {
        let json = to_json(account)?;
        txn.open_table(ACCOUNTS)?
            .insert(account.id.as_str(), json.as_slice())?;
        txn.open_table(ACCOUNT_EMAIL_INDEX)?
            .insert(account.email.as_str(), account.id.as_str())?;
        txn.open_table(REFERRAL_CODE_INDEX)?
            .insert(account.referral_code.as_str(), account.id.as_str())?;
        Ok(())
    }

    /// Overwrite an existing account record. Index entries are untouched.
    pub fn update_in(txn: &WriteTransaction, account: &StoredAccount) -> StoreResult<()> {
        let json = to_json(account)?;
        txn.open_table(ACCOUNTS)?
            .insert(account.id.as_str(), json.as_slice())?;
        Ok(())
    }

    /// Move the email index entry after an email change.
    pub fn reindex_email_in(
        txn: &WriteTransaction,
        old_email: &str,
        new_email: &str,
        account_id: &str,
    ) -> StoreResult<()> {
        let mut index = txn.open_table(ACCOUNT_EMAIL_INDEX)?;
        index.remove(old_email)?;
        index.insert(new_email, account_id)?;
        Ok(())
    }

    /// Remove the account record and its index entries.
    pub fn delete_in(txn: &WriteTransaction, account: &StoredAccount) -> StoreResult<()> {
        txn.open_table(ACCOUNTS)?.remove(account.id.as_str())?;
        txn.open_table(ACCOUNT_EMAIL_INDEX)?
            .remove(account.email.as_str())?;
        txn.open_table(REFERRAL_CODE_INDEX)?
            .remove(account.referral_code.as_str())?;
        Ok(())
    }
}
