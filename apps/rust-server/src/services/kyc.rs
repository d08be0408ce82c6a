// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! KYC workflow.
//!
//! ```text
//! not_submitted ──submit──▶ pending ──review──▶ approved
//!                              ▲        └─────▶ rejected
//!                              └────submit──────────┘
//! ```
//!
//! `approved` only moves again through a superadmin override. The record
//! status and the account's mirrored `kyc_status` are always written in the
//! same transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ServiceError;
use crate::auth::{AuthenticatedUser, Role};
use crate::storage::{
    AccountRepository, KycDetails, KycRecord, KycRepository, KycStatus, Store,
};

/// Reviewer decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum KycDecision {
    Approved,
    Rejected,
}

impl From<KycDecision> for KycStatus {
    fn from(decision: KycDecision) -> Self {
        match decision {
            KycDecision::Approved => KycStatus::Approved,
            KycDecision::Rejected => KycStatus::Rejected,
        }
    }
}

/// A KYC submission.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct KycSubmission {
    #[serde(flatten)]
    pub details: KycDetails,
    /// Opaque reference to the uploaded selfie.
    #[serde(default)]
    pub selfie_ref: String,
}

/// Caller-facing KYC status.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct KycStatusView {
    pub status: KycStatus,
    pub kyc_id: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
}

fn missing_fields(submission: &KycSubmission) -> Vec<&'static str> {
    let d = &submission.details;
    [
        ("first_name", d.first_name.as_str()),
        ("last_name", d.last_name.as_str()),
        ("dob", d.dob.as_str()),
        ("country", d.country.as_str()),
        ("selfie_ref", submission.selfie_ref.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect()
}

pub struct KycWorkflow<'a> {
    store: &'a Store,
}

impl<'a> KycWorkflow<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Create or overwrite the account's KYC record and set it pending.
    pub fn submit(
        &self,
        account_id: &str,
        submission: KycSubmission,
    ) -> Result<KycRecord, ServiceError> {
        let missing = missing_fields(&submission);
        if !missing.is_empty() {
            return Err(ServiceError::validation(format!(
                "Missing required KYC fields: {}",
                missing.join(", ")
            )));
        }

        let record = self.store.write(|txn| {
            let mut account = AccountRepository::get_in(txn, account_id)?
                .ok_or_else(|| ServiceError::not_found("Account not found"))?;

            let now = Utc::now();
            let record = match KycRepository::find_by_account_in(txn, account_id)? {
                Some(existing) if existing.status == KycStatus::Approved => {
                    return Err(ServiceError::conflict("KYC is already approved"));
                }
                Some(mut existing) => {
                    existing.details = submission.details;
                    existing.selfie_ref = submission.selfie_ref;
                    existing.status = KycStatus::Pending;
                    existing.submitted_at = now;
                    existing.reviewed_at = None;
                    existing.reviewed_by = None;
                    existing.review_note = None;
                    existing
                }
                None => KycRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    account_id: account_id.to_string(),
                    details: submission.details,
                    selfie_ref: submission.selfie_ref,
                    status: KycStatus::Pending,
                    submitted_at: now,
                    reviewed_at: None,
                    reviewed_by: None,
                    review_note: None,
                },
            };
            KycRepository::put_in(txn, &record)?;

            account.kyc_status = record.status;
            account.kyc_id = Some(record.id.clone());
            account.touch();
            AccountRepository::update_in(txn, &account)?;
            Ok::<_, ServiceError>(record)
        })?;

        tracing::info!(account_id = %account_id, kyc_id = %record.id, "KYC submitted");
        Ok(record)
    }

    /// Record an admin decision on a pending submission.
    ///
    /// `force` lets a superadmin override a record that was already decided.
    pub fn review(
        &self,
        kyc_id: &str,
        decision: KycDecision,
        reviewer: &AuthenticatedUser,
        force: bool,
        note: Option<String>,
    ) -> Result<KycRecord, ServiceError> {
        if force && reviewer.role != Role::Superadmin {
            return Err(ServiceError::forbidden(
                "Only a superadmin can override a KYC decision",
            ));
        }

        let record = self.store.write(|txn| {
            let mut record = KycRepository::get_in(txn, kyc_id)?
                .ok_or_else(|| ServiceError::not_found("KYC record not found"))?;
            if record.status != KycStatus::Pending && !force {
                return Err(ServiceError::conflict(format!(
                    "KYC is {}, not pending review",
                    record.status.as_str()
                )));
            }

            let mut account = AccountRepository::get_in(txn, &record.account_id)?
                .ok_or_else(|| ServiceError::not_found("Account not found"))?;

            record.status = decision.into();
            record.reviewed_at = Some(Utc::now());
            record.reviewed_by = Some(reviewer.user_id.clone());
            record.review_note = note;
            KycRepository::put_in(txn, &record)?;

            account.kyc_status = record.status;
            account.touch();
            AccountRepository::update_in(txn, &account)?;
            Ok::<_, ServiceError>(record)
        })?;

        tracing::info!(
            kyc_id = %kyc_id,
            reviewer = %reviewer.user_id,
            status = record.status.as_str(),
            forced = force,
            "KYC reviewed"
        );
        Ok(record)
    }

    pub fn status(&self, account_id: &str) -> Result<KycStatusView, ServiceError> {
        let account = AccountRepository::new(self.store)
            .get(account_id)?
            .ok_or_else(|| ServiceError::not_found("Account not found"))?;
        let record = KycRepository::new(self.store).find_by_account(account_id)?;
        Ok(KycStatusView {
            status: account.kyc_status,
            kyc_id: record.as_ref().map(|r| r.id.clone()),
            submitted_at: record.as_ref().map(|r| r.submitted_at),
            reviewed_at: record.as_ref().and_then(|r| r.reviewed_at),
            review_note: record.and_then(|r| r.review_note),
        })
    }

    pub fn list(&self, status: Option<KycStatus>) -> Result<Vec<KycRecord>, ServiceError> {
        Ok(KycRepository::new(self.store).list(status)?)
    }
}
