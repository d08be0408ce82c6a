// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated accounts.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;
use crate::storage::AccountRepository;

/// Extractor for authenticated accounts.
///
/// Validates the bearer token, then resolves the account from the store. The
/// role comes from the stored account. A token issued before the account's
/// last forced logout is rejected, as is any token of a suspended account.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = state.tokens.verify(token)?;

        let account = AccountRepository::new(&state.store)
            .get(&claims.sub)
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .ok_or(AuthError::UnknownAccount)?;

        if claims.ver != account.token_version {
            return Err(AuthError::TokenRevoked);
        }
        if account.is_suspended() {
            return Err(AuthError::AccountSuspended);
        }

        let user = AuthenticatedUser::from_account(&account);
        parts.extensions.insert(user.clone());
        Ok(Auth(user))
    }
}

/// Extractor that requires admin or superadmin.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}

/// Extractor that requires superadmin.
pub struct SuperadminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for SuperadminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_superadmin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(SuperadminOnly(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::state::test_state;
    use crate::storage::{AccountStatus, StoredAccount};
    use axum::http::Request;

    fn seed(state: &AppState, email: &str, role: Role) -> StoredAccount {
        let account = StoredAccount::new(
            "Test".to_string(),
            email.to_string(),
            "hash".to_string(),
            "individual".to_string(),
            role,
            format!("CODE{}", email.len()),
        );
        state
            .store
            .write(|txn| AccountRepository::insert_in(txn, &account))
            .unwrap();
        account
    }

    fn parts_with_token(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (state, _dir) = test_state();
        let mut parts = parts_with_token(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_resolves_stored_account() {
        let (state, _dir) = test_state();
        let account = seed(&state, "user@example.com", Role::User);
        let token = state.tokens.issue(&account.id, account.token_version).unwrap();
        let mut parts = parts_with_token(Some(&token));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, account.id);
        assert_eq!(user.role, Role::User);
        assert_eq!(user.email, "user@example.com");
    }

    #[tokio::test]
    async fn bumped_token_version_revokes_token() {
        let (state, _dir) = test_state();
        let mut account = seed(&state, "user@example.com", Role::User);
        let token = state.tokens.issue(&account.id, account.token_version).unwrap();

        account.token_version += 1;
        state
            .store
            .write(|txn| AccountRepository::update_in(txn, &account))
            .unwrap();

        let mut parts = parts_with_token(Some(&token));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::TokenRevoked)));
    }

    #[tokio::test]
    async fn suspended_account_is_forbidden() {
        let (state, _dir) = test_state();
        let mut account = seed(&state, "user@example.com", Role::User);
        account.status = AccountStatus::Suspended;
        state
            .store
            .write(|txn| AccountRepository::update_in(txn, &account))
            .unwrap();
        let token = state.tokens.issue(&account.id, account.token_version).unwrap();

        let mut parts = parts_with_token(Some(&token));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::AccountSuspended)));
    }

    #[tokio::test]
    async fn token_for_deleted_account_is_rejected() {
        let (state, _dir) = test_state();
        let token = state.tokens.issue("missing", 0).unwrap();
        let mut parts = parts_with_token(Some(&token));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::UnknownAccount)));
    }

    #[tokio::test]
    async fn role_gates() {
        let (state, _dir) = test_state();
        let user = seed(&state, "user@example.com", Role::User);
        let admin = seed(&state, "admin@example.com", Role::Admin);
        let root = seed(&state, "root@x.io", Role::Superadmin);

        let token = state.tokens.issue(&user.id, 0).unwrap();
        let result = AdminOnly::from_request_parts(&mut parts_with_token(Some(&token)), &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));

        let token = state.tokens.issue(&admin.id, 0).unwrap();
        assert!(AdminOnly::from_request_parts(&mut parts_with_token(Some(&token)), &state)
            .await
            .is_ok());
        let result =
            SuperadminOnly::from_request_parts(&mut parts_with_token(Some(&token)), &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));

        let token = state.tokens.issue(&root.id, 0).unwrap();
        assert!(SuperadminOnly::from_request_parts(&mut parts_with_token(Some(&token)), &state)
            .await
            .is_ok());
    }
}
