// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated account representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;
use crate::storage::StoredAccount;

/// Claims carried by the bearer tokens this server issues.
///
/// No role claim: the role is read from the stored account on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: String,
    /// Account token version at issue time
    pub ver: u64,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Authenticated account information resolved from a bearer token.
///
/// This is the primary type used throughout the application to represent
/// the account making a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical account ID
    pub user_id: String,

    /// Role from the stored account
    pub role: Role,

    /// Normalized email
    pub email: String,
}

impl AuthenticatedUser {
    /// Build from the stored account the token resolved to.
    pub fn from_account(account: &StoredAccount) -> Self {
        Self {
            user_id: account.id.clone(),
            role: account.role,
            email: account.email.clone(),
        }
    }

    /// Check if the account has the required role.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    /// Check if this account is an admin or superadmin.
    pub fn is_admin(&self) -> bool {
        self.role.is_staff()
    }

    pub fn is_superadmin(&self) -> bool {
        self.role == Role::Superadmin
    }
}
