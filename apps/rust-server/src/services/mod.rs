// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Services
//!
//! Business rules over the storage layer. Every multi-step mutation runs in
//! a single redb write transaction and either commits whole or not at all.
//!
//! - `wallet` - validated deposits and withdrawals
//! - `referral` - commission tiers and commission application
//! - `kyc` - submission and review state machine
//! - `staking` - fixed-term positions and foreclosure
//! - `accounts` - registration, verification, credentials, profile
//! - `admin` - staff accounts, account controls, system switches

pub mod accounts;
pub mod admin;
pub mod error;
pub mod kyc;
pub mod referral;
pub mod staking;
pub mod wallet;

pub use accounts::{AccountService, AccountView, ProfileView};
pub use admin::AdminService;
pub use error::ServiceError;
pub use kyc::KycWorkflow;
pub use referral::{CommissionEvent, CommissionOutcome, ReferralEngine};
pub use staking::StakingService;
pub use wallet::WalletService;
