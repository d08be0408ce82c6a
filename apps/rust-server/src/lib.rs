// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Exchange Server - Wallet Ledger, Referral Commissions and KYC
//!
//! Custodial bookkeeping backend for a crypto exchange. Balances, referral
//! commissions, KYC records and staking positions live in one embedded redb
//! database; every multi-step mutation commits in a single write transaction.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum) under `/v1`
//! - `auth` - Passwords, HS256 session tokens, OTP digests, role extractors
//! - `services` - Account, wallet, referral, KYC, staking and admin logic
//! - `providers` - Outbound email/SMS delivery and the market price feed
//! - `storage` - redb tables, repositories and the audit log
//! - `sweeper` - Background removal of expired verification codes

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod providers;
pub mod services;
pub mod state;
pub mod storage;
pub mod sweeper;
