// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One-time verification secrets (email OTP, phone OTP, password reset).
//!
//! Only keyed digests are stored, never the codes themselves. OTPs are keyed
//! by purpose and account; reset tokens are keyed by their digest so an
//! incoming token can be looked up directly.

use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};

use crate::storage::database::{get_json, to_json, Store, StoreResult, VERIFICATIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPurpose {
    EmailOtp,
    PhoneOtp,
    PasswordReset,
}

impl VerificationPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationPurpose::EmailOtp => "email_otp",
            VerificationPurpose::PhoneOtp => "phone_otp",
            VerificationPurpose::PasswordReset => "password_reset",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCode {
    pub account_id: String,
    pub purpose: VerificationPurpose,
    /// Keyed digest of the secret.
    pub digest: String,
    /// Phone number being verified (phone OTP only).
    #[serde(default)]
    pub target: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Storage key for this code.
    pub fn key(&self) -> String {
        match self.purpose {
            VerificationPurpose::PasswordReset => reset_key(&self.digest),
            purpose => otp_key(purpose, &self.account_id),
        }
    }
}

pub fn otp_key(purpose: VerificationPurpose, account_id: &str) -> String {
    format!("{}|{account_id}", purpose.as_str())
}

pub fn reset_key(digest: &str) -> String {
    format!("{}|{digest}", VerificationPurpose::PasswordReset.as_str())
}

pub struct VerificationRepository<'a> {
    store: &'a Store,
}

impl<'a> VerificationRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn get(&self, key: &str) -> StoreResult<Option<VerificationCode>> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(VERIFICATIONS)?;
        get_json(&table, key)
    }

    pub fn get_in(txn: &WriteTransaction, key: &str) -> StoreResult<Option<VerificationCode>> {
        let table = txn.open_table(VERIFICATIONS)?;
        get_json(&table, key)
    }

    /// Store a code, replacing any previous one under the same key.
    pub fn put_in(txn: &WriteTransaction, code: &VerificationCode) -> StoreResult<()> {
        let json = to_json(code)?;
        let key = code.key();
        txn.open_table(VERIFICATIONS)?
            .insert(key.as_str(), json.as_slice())?;
        Ok(())
    }

    pub fn remove_in(txn: &WriteTransaction, key: &str) -> StoreResult<()> {
        txn.open_table(VERIFICATIONS)?.remove(key)?;
        Ok(())
    }

    /// Remove every code belonging to an account.
    pub fn remove_account_in(txn: &WriteTransaction, account_id: &str) -> StoreResult<usize> {
        Self::remove_where(txn, |code| code.account_id == account_id)
    }

    /// Remove password reset tokens for an account.
    pub fn remove_resets_in(txn: &WriteTransaction, account_id: &str) -> StoreResult<usize> {
        Self::remove_where(txn, |code| {
            code.account_id == account_id && code.purpose == VerificationPurpose::PasswordReset
        })
    }

    /// Delete expired codes. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        self.store
            .write(|txn| Self::remove_where(txn, |code| code.is_expired(now)))
    }

    fn remove_where<F>(txn: &WriteTransaction, predicate: F) -> StoreResult<usize>
    where
        F: Fn(&VerificationCode) -> bool,
    {
        let mut doomed = Vec::new();
        {
            let table = txn.open_table(VERIFICATIONS)?;
            for entry in table.iter()? {
                let (key, value) = entry?;
                let code: VerificationCode = serde_json::from_slice(value.value())?;
                if predicate(&code) {
                    doomed.push(key.value().to_string());
                }
            }
        }
        let mut table = txn.open_table(VERIFICATIONS)?;
        for key in &doomed {
            table.remove(key.as_str())?;
        }
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_store;

    fn code(account: &str, purpose: VerificationPurpose, minutes: i64) -> VerificationCode {
        VerificationCode {
            account_id: account.to_string(),
            purpose,
            digest: format!("digest-{account}-{}", purpose.as_str()),
            target: None,
            expires_at: Utc::now() + chrono::Duration::minutes(minutes),
        }
    }

    #[test]
    fn keys_by_purpose() {
        let otp = code("acct", VerificationPurpose::EmailOtp, 10);
        assert_eq!(otp.key(), "email_otp|acct");
        let reset = code("acct", VerificationPurpose::PasswordReset, 30);
        assert_eq!(reset.key(), "password_reset|digest-acct-password_reset");
    }

    #[test]
    fn purge_removes_only_expired() {
        let (store, _dir) = temp_store();
        let fresh = code("a", VerificationPurpose::EmailOtp, 10);
        let stale = code("b", VerificationPurpose::PhoneOtp, -1);
        store
            .write(|txn| {
                VerificationRepository::put_in(txn, &fresh)?;
                VerificationRepository::put_in(txn, &stale)
            })
            .unwrap();

        let removed = VerificationRepository::new(&store)
            .purge_expired(Utc::now())
            .unwrap();
        assert_eq!(removed, 1);

        let remaining = store
            .write(|txn| {
                Ok::<_, crate::storage::StoreError>((
                    VerificationRepository::get_in(txn, &fresh.key())?,
                    VerificationRepository::get_in(txn, &stale.key())?,
                ))
            })
            .unwrap();
        assert!(remaining.0.is_some());
        assert!(remaining.1.is_none());
    }

    #[test]
    fn remove_account_drops_all_purposes() {
        let (store, _dir) = temp_store();
        store
            .write(|txn| {
                VerificationRepository::put_in(txn, &code("a", VerificationPurpose::EmailOtp, 10))?;
                VerificationRepository::put_in(
                    txn,
                    &code("a", VerificationPurpose::PasswordReset, 10),
                )?;
                VerificationRepository::put_in(txn, &code("b", VerificationPurpose::EmailOtp, 10))
            })
            .unwrap();

        let removed = store
            .write(|txn| VerificationRepository::remove_account_in(txn, "a"))
            .unwrap();
        assert_eq!(removed, 2);
    }
}
