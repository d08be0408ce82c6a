// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Referral engine: commission tiers, referral registration and commission
//! application.
//!
//! ## Commission tiers
//!
//! The rate depends on the referrer's lifetime referral count at the moment
//! the commission is computed (inclusive lower bounds, highest tier wins):
//!
//! | referral count | rate |
//! |---|---|
//! | ≥ 100 | 35% |
//! | 51–99 | 25% |
//! | 11–50 | 15% |
//! | 0–10  | 10% |
//!
//! The applied rate is snapshotted into the ledger entry and never
//! recomputed. Commissions are truncated to the ledger's amount scale; one
//! that truncates to zero is not credited.

use chrono::{Datelike, Utc};
use redb::WriteTransaction;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;

use super::wallet::MAX_AMOUNT_SCALE;
use super::ServiceError;
use crate::storage::{
    AccountRepository, CommissionDetails, CommissionStatus, Currency, LedgerError, LedgerStore,
    ReferralAction, ReferralLedgerEntry, ReferralRepository, Store,
};

/// `(minimum referral count, rate percent)`, highest tier first.
const COMMISSION_TIERS: [(u64, u32); 4] = [(100, 35), (51, 25), (11, 15), (0, 10)];

/// Entries shown in the stats summary.
const RECENT_ENTRIES: usize = 5;

/// Largest history page.
pub const MAX_HISTORY_PAGE_SIZE: usize = 100;

/// Commission rate (percent) for a referrer with `referral_count` referrals.
pub fn commission_rate(referral_count: u64) -> u32 {
    COMMISSION_TIERS
        .iter()
        .find(|(min, _)| referral_count >= *min)
        .map(|(_, rate)| *rate)
        .unwrap_or(COMMISSION_TIERS[COMMISSION_TIERS.len() - 1].1)
}

/// `amount * rate / 100`, truncated to [`MAX_AMOUNT_SCALE`] places so the
/// credited balance stays withdrawable. `None` on overflow.
pub fn commission_for(amount: Decimal, rate: u32) -> Option<Decimal> {
    let scaled = amount.checked_mul(Decimal::from(rate))?;
    let commission = scaled.checked_div(Decimal::ONE_HUNDRED)?;
    Some(commission.round_dp_with_strategy(MAX_AMOUNT_SCALE, RoundingStrategy::ToZero))
}

/// A qualifying action to pay commission on.
#[derive(Debug, Clone)]
pub struct CommissionEvent<'r> {
    /// Account whose action earned the commission (the referred user).
    pub account_id: &'r str,
    pub action: ReferralAction,
    pub amount: Decimal,
    /// Idempotency key. A repeated key is reported, not re-applied.
    pub event_id: Option<&'r str>,
    /// Wallet transaction that triggered the event, if any.
    pub transaction_id: Option<&'r str>,
}

/// Result of processing a commission event.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommissionOutcome {
    /// Commission credited; the ledger entry records it.
    Applied { entry: ReferralLedgerEntry },
    /// The account has no (resolvable) referrer. Nothing changed.
    NoReferrer,
    /// The event id was seen before. Nothing changed.
    AlreadyProcessed { entry_id: String },
    /// The commission truncated to zero. Nothing changed.
    BelowMinimum,
}

/// Referral summary for one account.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReferralStats {
    pub referral_code: String,
    pub referral_count: u64,
    pub total_earnings: Decimal,
    /// Rate (percent) the next commission would be computed at.
    pub commission_rate: u32,
    pub referrals_this_month: usize,
    pub recent: Vec<ReferralLedgerEntry>,
}

/// Page position within a paginated listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Pagination {
    pub current: usize,
    pub pages: usize,
    pub total: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        let pages = total.div_ceil(limit.max(1));
        Self {
            current: page,
            pages,
            total,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReferralHistoryPage {
    pub entries: Vec<ReferralLedgerEntry>,
    pub pagination: Pagination,
}

pub struct ReferralEngine<'a> {
    store: &'a Store,
}

impl<'a> ReferralEngine<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Attach a new account to the referrer owning `referring_code`.
    ///
    /// A code that does not resolve is a silent no-op: registration never
    /// fails because a referral link went stale. Returns whether a referrer
    /// was found.
    pub fn register_referral_in(
        txn: &WriteTransaction,
        referring_code: &str,
        new_account_id: &str,
    ) -> Result<bool, ServiceError> {
        let Some(mut referrer) = AccountRepository::find_by_referral_code_in(txn, referring_code)?
        else {
            tracing::info!(code = %referring_code, "Referral code did not resolve, ignoring");
            return Ok(false);
        };
        if referrer.id == new_account_id {
            return Ok(false);
        }

        referrer.referral_count += 1;
        referrer.referred_users.push(new_account_id.to_string());
        referrer.touch();
        AccountRepository::update_in(txn, &referrer)?;

        tracing::info!(
            referrer_id = %referrer.id,
            referred_id = %new_account_id,
            referral_count = referrer.referral_count,
            "Referral registered"
        );
        Ok(true)
    }

    /// Apply a commission inside the caller's write transaction.
    ///
    /// Credits the referrer's reference-currency balance, bumps their
    /// earnings and appends the ledger entry. All three land in `txn`, so
    /// they commit together or not at all.
    pub fn process_commission_in(
        txn: &WriteTransaction,
        event: &CommissionEvent<'_>,
    ) -> Result<CommissionOutcome, ServiceError> {
        if event.amount <= Decimal::ZERO {
            return Err(ServiceError::validation("Amount must be greater than zero"));
        }

        if let Some(event_id) = event.event_id {
            if let Some(entry_id) = ReferralRepository::entry_for_event_in(txn, event_id)? {
                tracing::info!(event_id = %event_id, "Commission event already processed");
                return Ok(CommissionOutcome::AlreadyProcessed { entry_id });
            }
        }

        let account = AccountRepository::get_in(txn, event.account_id)?
            .ok_or_else(|| ServiceError::not_found("Account not found"))?;
        let Some(code) = account.referred_by.as_deref() else {
            return Ok(CommissionOutcome::NoReferrer);
        };
        let Some(mut referrer) = AccountRepository::find_by_referral_code_in(txn, code)? else {
            return Ok(CommissionOutcome::NoReferrer);
        };

        let rate = commission_rate(referrer.referral_count);
        let commission = commission_for(event.amount, rate)
            .ok_or_else(|| ServiceError::validation("Commission exceeds the supported range"))?;
        if commission.is_zero() {
            tracing::debug!(
                referrer_id = %referrer.id,
                amount = %event.amount,
                "Commission below ledger precision, skipped"
            );
            return Ok(CommissionOutcome::BelowMinimum);
        }

        LedgerStore::credit_in(txn, &referrer.id, Currency::REFERENCE, commission)?;

        referrer.referral_earnings = referrer
            .referral_earnings
            .checked_add(commission)
            .ok_or(LedgerError::AmountOutOfRange)?;
        referrer.touch();
        AccountRepository::update_in(txn, &referrer)?;

        let entry = ReferralLedgerEntry {
            id: uuid::Uuid::new_v4().to_string(),
            referrer_id: referrer.id.clone(),
            referred_user_id: account.id.clone(),
            action: event.action,
            amount: commission,
            status: CommissionStatus::Completed,
            details: CommissionDetails {
                original_amount: event.amount,
                commission_rate: rate,
                transaction_id: event.transaction_id.map(str::to_string),
            },
            event_id: event.event_id.map(str::to_string),
            created_at: Utc::now(),
        };
        ReferralRepository::append_in(txn, &entry)?;

        tracing::info!(
            referrer_id = %referrer.id,
            referred_id = %account.id,
            action = ?event.action,
            rate,
            amount = %commission,
            "Referral commission applied"
        );
        Ok(CommissionOutcome::Applied { entry })
    }

    /// Apply a commission in its own write transaction.
    pub fn process_commission(
        &self,
        event: &CommissionEvent<'_>,
    ) -> Result<CommissionOutcome, ServiceError> {
        self.store
            .write(|txn| Self::process_commission_in(txn, event))
    }

    pub fn stats(&self, account_id: &str) -> Result<ReferralStats, ServiceError> {
        let accounts = AccountRepository::new(self.store);
        let account = accounts
            .get(account_id)?
            .ok_or_else(|| ServiceError::not_found("Account not found"))?;

        let now = Utc::now();
        let mut referrals_this_month = 0;
        for referred_id in &account.referred_users {
            if let Some(referred) = accounts.get(referred_id)? {
                if referred.created_at.year() == now.year()
                    && referred.created_at.month() == now.month()
                {
                    referrals_this_month += 1;
                }
            }
        }

        let (recent, _) =
            ReferralRepository::new(self.store).page_for_referrer(account_id, 0, RECENT_ENTRIES)?;

        Ok(ReferralStats {
            referral_code: account.referral_code,
            referral_count: account.referral_count,
            total_earnings: account.referral_earnings,
            commission_rate: commission_rate(account.referral_count),
            referrals_this_month,
            recent,
        })
    }

    /// Paginated ledger entries where `account_id` is the referrer.
    /// `page` is 1-based.
    pub fn history(
        &self,
        account_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<ReferralHistoryPage, ServiceError> {
        if page == 0 {
            return Err(ServiceError::validation("page starts at 1"));
        }
        if limit == 0 || limit > MAX_HISTORY_PAGE_SIZE {
            return Err(ServiceError::validation(format!(
                "limit must be between 1 and {MAX_HISTORY_PAGE_SIZE}"
            )));
        }
        let offset = (page - 1) * limit;
        let (entries, total) =
            ReferralRepository::new(self.store).page_for_referrer(account_id, offset, limit)?;
        Ok(ReferralHistoryPage {
            entries,
            pagination: Pagination::new(page, limit, total),
        })
    }
}
