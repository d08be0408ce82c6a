// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Password credentials, bearer tokens and role gating for the exchange API.
//!
//! ## Auth Flow
//!
//! 1. Client logs in (or verifies its email) and receives an HS256 token
//! 2. Client sends `Authorization: Bearer <token>`
//! 3. Server:
//!    - Verifies signature and expiry (60 s clock skew leeway)
//!    - Loads the account named by `sub`
//!    - Rejects the token if `ver` no longer matches the account's
//!      `token_version` (forced logout, admin password reset)
//!    - Rejects suspended accounts
//!    - Takes the role from the stored account
//!
//! ## Secrets at rest
//!
//! - Passwords: Argon2id PHC strings (`password`)
//! - OTPs and reset tokens: HMAC-SHA256 digests only (`verification`)

pub mod claims;
pub mod error;
pub mod extractor;
pub mod password;
pub mod roles;
pub mod tokens;
pub mod verification;

pub use claims::{AuthenticatedUser, Claims};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, SuperadminOnly};
pub use roles::Role;
pub use tokens::TokenIssuer;
pub use verification::VerificationKey;
