// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the redb store.
//!
//! Each repository offers snapshot reads through `&Store` and transactional
//! primitives taking a `&WriteTransaction`.

pub mod accounts;
pub mod balances;
pub mod kyc;
pub mod referrals;
pub mod staking;
pub mod system;
pub mod transactions;
pub mod verification;

pub use accounts::{AccountRepository, AccountStatus, StoredAccount};
pub use balances::{Currency, LedgerError, LedgerStore};
pub use kyc::{KycDetails, KycRecord, KycRepository, KycStatus};
pub use referrals::{
    CommissionDetails, CommissionStatus, ReferralAction, ReferralLedgerEntry, ReferralRepository,
};
pub use staking::{StakePosition, StakeStatus, StakingRepository};
pub use system::{SystemConfig, SystemRepository};
pub use transactions::{StoredTransaction, TransactionKind, TransactionRepository, TxStatus};
pub use verification::{VerificationCode, VerificationPurpose, VerificationRepository};
