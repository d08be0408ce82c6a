// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent storage for accounts, balances, the referral ledger, KYC
//! records, staking positions, one-time codes, system switches and the audit
//! log, all in a single embedded redb database.
//!
//! ## Layout
//!
//! ```text
//! $DATA_DIR/
//!   exchange.redb    # every table, see database.rs
//! ```
//!
//! ## Atomicity
//!
//! Repositories expose `*_in(&WriteTransaction, ..)` functions that compose
//! into one write transaction. Services build multi-step mutations (credit +
//! earnings + ledger entry, KYC record + account mirror) out of them and
//! commit once; any error drops the transaction and nothing is applied.

pub mod audit;
pub mod database;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use database::{Store, StoreError, StoreResult};
pub use repository::{
    AccountRepository, AccountStatus, CommissionDetails, CommissionStatus, Currency, KycDetails,
    KycRecord, KycRepository, KycStatus, LedgerError, LedgerStore, ReferralAction,
    ReferralLedgerEntry, ReferralRepository, StakePosition, StakeStatus, StakingRepository,
    StoredAccount, StoredTransaction, SystemConfig, SystemRepository, TransactionKind,
    TransactionRepository, TxStatus, VerificationCode, VerificationPurpose,
    VerificationRepository,
};
