// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! KYC record repository.

use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{
    get_json, get_str, to_json, Store, StoreResult, KYC_BY_ACCOUNT, KYC_RECORDS,
};

/// KYC lifecycle status. Mirrored onto the owning account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    NotSubmitted,
    Pending,
    Approved,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::NotSubmitted => "not_submitted",
            KycStatus::Pending => "pending",
            KycStatus::Approved => "approved",
            KycStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<KycStatus> {
        match s.trim().to_lowercase().as_str() {
            "not_submitted" => Some(KycStatus::NotSubmitted),
            "pending" => Some(KycStatus::Pending),
            "approved" => Some(KycStatus::Approved),
            "rejected" => Some(KycStatus::Rejected),
            _ => None,
        }
    }
}

/// Identity, address and bank fields. Opaque to the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct KycDetails {
    pub document_type: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// Date of birth as submitted (`YYYY-MM-DD`).
    pub dob: String,
    pub mobile_number: Option<String>,
    pub address_line1: Option<String>,
    pub locality: Option<String>,
    pub country: String,
    pub pin_code: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub pan: Option<String>,
    pub aadhar: Option<String>,
    pub account_type: Option<String>,
    pub account_number: Option<String>,
    pub account_status: Option<String>,
    pub date_of_opening: Option<String>,
    pub branch_code: Option<String>,
}

/// KYC record as persisted. One per account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KycRecord {
    pub id: String,
    pub account_id: String,
    #[serde(flatten)]
    pub details: KycDetails,
    /// Opaque reference to the uploaded selfie.
    pub selfie_ref: String,
    pub status: KycStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub review_note: Option<String>,
}

/// Repository for KYC records.
pub struct KycRepository<'a> {
    store: &'a Store,
}

impl<'a> KycRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn get(&self, kyc_id: &str) -> StoreResult<Option<KycRecord>> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(KYC_RECORDS)?;
        get_json(&table, kyc_id)
    }

    pub fn find_by_account(&self, account_id: &str) -> StoreResult<Option<KycRecord>> {
        let txn = self.store.begin_read()?;
        let index = txn.open_table(KYC_BY_ACCOUNT)?;
        let Some(kyc_id) = get_str(&index, account_id)? else {
            return Ok(None);
        };
        let table = txn.open_table(KYC_RECORDS)?;
        get_json(&table, &kyc_id)
    }

    /// All records, optionally filtered by status, newest submission first.
    pub fn list(&self, status: Option<KycStatus>) -> StoreResult<Vec<KycRecord>> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(KYC_RECORDS)?;
        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let record: KycRecord = serde_json::from_slice(value.value())?;
            if status.is_none_or(|s| s == record.status) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(records)
    }

    pub fn get_in(txn: &WriteTransaction, kyc_id: &str) -> StoreResult<Option<KycRecord>> {
        let table = txn.open_table(KYC_RECORDS)?;
        get_json(&table, kyc_id)
    }

    pub fn find_by_account_in(
        txn: &WriteTransaction,
        account_id: &str,
    ) -> StoreResult<Option<KycRecord>> {
        let kyc_id = {
            let index = txn.open_table(KYC_BY_ACCOUNT)?;
            get_str(&index, account_id)?
        };
        match kyc_id {
            Some(id) => Self::get_in(txn, &id),
            None => Ok(None),
        }
    }

    /// Write the record and its account index entry.
    pub fn put_in(txn: &WriteTransaction, record: &KycRecord) -> StoreResult<()> {
        let json = to_json(record)?;
        txn.open_table(KYC_RECORDS)?
            .insert(record.id.as_str(), json.as_slice())?;
        txn.open_table(KYC_BY_ACCOUNT)?
            .insert(record.account_id.as_str(), record.id.as_str())?;
        Ok(())
    }

    /// Remove an account's record, if any.
    pub fn remove_for_account_in(txn: &WriteTransaction, account_id: &str) -> StoreResult<()> {
        let kyc_id = txn
            .open_table(KYC_BY_ACCOUNT)?
            .remove(account_id)?
            .map(|v| v.value().to_string());
        if let Some(kyc_id) = kyc_id {
            txn.open_table(KYC_RECORDS)?.remove(kyc_id.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_store;

    fn record(account_id: &str, status: KycStatus) -> KycRecord {
        KycRecord {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            details: KycDetails {
                first_name: "Asha".to_string(),
                last_name: "Rao".to_string(),
                dob: "1990-01-01".to_string(),
                country: "IN".to_string(),
                ..Default::default()
            },
            selfie_ref: "selfie://1".to_string(),
            status,
            submitted_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            review_note: None,
        }
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            KycStatus::NotSubmitted,
            KycStatus::Pending,
            KycStatus::Approved,
            KycStatus::Rejected,
        ] {
            assert_eq!(KycStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(KycStatus::from_str("bogus"), None);
    }

    #[test]
    fn put_find_list_and_remove() {
        let (store, _dir) = temp_store();
        let a = record("acct_a", KycStatus::Pending);
        let b = record("acct_b", KycStatus::Approved);
        store
            .write(|txn| {
                KycRepository::put_in(txn, &a)?;
                KycRepository::put_in(txn, &b)
            })
            .unwrap();

        let repo = KycRepository::new(&store);
        assert_eq!(repo.find_by_account("acct_a").unwrap().unwrap().id, a.id);
        assert_eq!(repo.list(None).unwrap().len(), 2);
        let pending = repo.list(Some(KycStatus::Pending)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].account_id, "acct_a");

        store
            .write(|txn| KycRepository::remove_for_account_in(txn, "acct_a"))
            .unwrap();
        assert!(repo.get(&a.id).unwrap().is_none());
        assert!(repo.find_by_account("acct_a").unwrap().is_none());
    }
}
