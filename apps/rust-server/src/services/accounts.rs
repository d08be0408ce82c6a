// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account lifecycle: registration, login, email and phone verification,
//! password flows and profile updates.
//!
//! Notifications go out after the state change commits. A failed delivery
//! is logged and reported back (`otp_delivered: false`) but never undoes the
//! change it announces.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;

use super::referral::ReferralEngine;
use super::ServiceError;
use crate::auth::password::{set_password, verify_password, MIN_PASSWORD_LEN};
use crate::auth::verification::{
    generate_otp, generate_reset_token, EMAIL_OTP_TTL_MINUTES, PHONE_OTP_TTL_MINUTES,
    RESET_TOKEN_TTL_MINUTES,
};
use crate::auth::Role;
use crate::state::AppState;
use crate::storage::repository::verification::{otp_key, reset_key};
use crate::storage::{
    AccountRepository, AccountStatus, KycStatus, StoredAccount, VerificationCode,
    VerificationPurpose, VerificationRepository,
};

pub const DEFAULT_USER_TYPE: &str = "individual";

/// Normalize an email for storage and lookup: NFKC, trimmed, lowercase.
pub fn normalize_email(raw: &str) -> Result<String, ServiceError> {
    let email: String = raw.nfkc().collect::<String>().trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ServiceError::validation("Invalid email address"));
    }
    Ok(email)
}

/// `+` followed by 8 to 15 digits, or just the digits.
fn normalize_phone(raw: &str) -> Result<String, ServiceError> {
    let phone: String = raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    let digits = phone.strip_prefix('+').unwrap_or(&phone);
    if !(8..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::validation("Invalid phone number"));
    }
    Ok(phone)
}

/// `john.doe@x.com` → `j****e@x.com`.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return "****".to_string();
    };
    let chars: Vec<char> = local.chars().collect();
    match chars.as_slice() {
        [] => format!("****@{domain}"),
        [only] => format!("{only}****@{domain}"),
        [first, .., last] => format!("{first}****{last}@{domain}"),
    }
}

/// `+919876543321` → `+91****321`.
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() <= 6 {
        return "****".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}****{tail}")
}

/// Credentials checked against `snapshot` outside the write transaction are
/// only valid if the stored account still matches it.
fn ensure_unchanged(snapshot: &StoredAccount, current: &StoredAccount) -> Result<(), ServiceError> {
    if current.password_hash != snapshot.password_hash
        || current.token_version != snapshot.token_version
    {
        return Err(ServiceError::conflict(
            "Account was modified concurrently, please retry",
        ));
    }
    Ok(())
}

fn check_new_password(password: &str, confirm: &str) -> Result<(), ServiceError> {
    if password != confirm {
        return Err(ServiceError::validation("Passwords do not match"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn expiry(minutes: u32) -> DateTime<Utc> {
    Utc::now() + Duration::minutes(i64::from(minutes))
}

// =============================================================================
// Views
// =============================================================================

/// Account as returned to its owner and to administrators.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub user_type: String,
    pub role: Role,
    pub is_email_verified: bool,
    pub phone: Option<String>,
    pub is_phone_verified: bool,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub referral_count: u64,
    pub referral_earnings: Decimal,
    pub kyc_status: KycStatus,
    pub wallet_locked: bool,
    pub staking_locked: bool,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredAccount> for AccountView {
    fn from(account: &StoredAccount) -> Self {
        Self {
            id: account.id.clone(),
            name: account.name.clone(),
            email: account.email.clone(),
            user_type: account.user_type.clone(),
            role: account.role,
            is_email_verified: account.is_email_verified,
            phone: account.phone.clone(),
            is_phone_verified: account.is_phone_verified,
            referral_code: account.referral_code.clone(),
            referred_by: account.referred_by.clone(),
            referral_count: account.referral_count,
            referral_earnings: account.referral_earnings,
            kyc_status: account.kyc_status,
            wallet_locked: account.wallet_locked,
            staking_locked: account.staking_locked,
            status: account.status,
            created_at: account.created_at,
        }
    }
}

/// Profile with contact details masked.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfileView {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub user_type: String,
    pub role: Role,
    pub is_email_verified: bool,
    pub is_phone_verified: bool,
    pub kyc_status: KycStatus,
    pub referral_code: String,
}

impl From<&StoredAccount> for ProfileView {
    fn from(account: &StoredAccount) -> Self {
        Self {
            name: account.name.clone(),
            email: mask_email(&account.email),
            phone: account.phone.as_deref().map(mask_phone),
            user_type: account.user_type.clone(),
            role: account.role,
            is_email_verified: account.is_email_verified,
            is_phone_verified: account.is_phone_verified,
            kyc_status: account.kyc_status,
            referral_code: account.referral_code.clone(),
        }
    }
}

// =============================================================================
// Inputs and outcomes
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub user_type: Option<String>,
    /// Referral code of the referring account.
    #[serde(default)]
    pub referral_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegistrationOutcome {
    pub account: AccountView,
    pub otp_delivered: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Session {
    pub token: String,
    pub account: AccountView,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub user_type: Option<String>,
}

// =============================================================================
// Service
// =============================================================================

pub struct AccountService<'a> {
    state: &'a AppState,
}

impl<'a> AccountService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn accounts(&self) -> AccountRepository<'_> {
        AccountRepository::new(&self.state.store)
    }

    fn session(&self, account: &StoredAccount) -> Result<Session, ServiceError> {
        Ok(Session {
            token: self.state.tokens.issue(&account.id, account.token_version)?,
            account: account.into(),
        })
    }

    fn email_otp(&self, account_id: &str) -> (String, VerificationCode) {
        let otp = generate_otp();
        let code = VerificationCode {
            account_id: account_id.to_string(),
            purpose: VerificationPurpose::EmailOtp,
            digest: self
                .state
                .verifier
                .otp_digest(VerificationPurpose::EmailOtp, account_id, &otp),
            target: None,
            expires_at: expiry(EMAIL_OTP_TTL_MINUTES),
        };
        (otp, code)
    }

    async fn deliver_email_otp(&self, email: &str, otp: &str) -> bool {
        let delivered = self
            .state
            .notifier
            .send_otp(email, otp, EMAIL_OTP_TTL_MINUTES)
            .await;
        if !delivered {
            tracing::warn!(email = %email, "Email OTP was not delivered");
        }
        delivered
    }

    /// Create an account, attach it to its referrer and send an email OTP.
    pub async fn register(&self, input: Registration) -> Result<RegistrationOutcome, ServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::validation("Name is required"));
        }
        let email = normalize_email(&input.email)?;
        let password_hash = set_password(&input.password)?;
        let user_type = input
            .user_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_TYPE.to_string());
        let referring_code = input
            .referral_code
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        let (account, otp) = self.state.store.write(|txn| {
            if AccountRepository::id_for_email_in(txn, &email)?.is_some() {
                return Err(ServiceError::conflict("Email already registered"));
            }

            let code = AccountRepository::unique_referral_code_in(txn)?;
            let mut account = StoredAccount::new(
                name.clone(),
                email.clone(),
                password_hash.clone(),
                user_type.clone(),
                Role::User,
                code,
            );
            if let Some(referring) = referring_code.as_deref() {
                if ReferralEngine::register_referral_in(txn, referring, &account.id)? {
                    account.referred_by = Some(referring.to_string());
                }
            }
            AccountRepository::insert_in(txn, &account)?;

            let (otp, code) = self.email_otp(&account.id);
            VerificationRepository::put_in(txn, &code)?;
            Ok::<_, ServiceError>((account, otp))
        })?;

        tracing::info!(
            account_id = %account.id,
            referred = account.referred_by.is_some(),
            "Account registered"
        );

        let otp_delivered = self.deliver_email_otp(&account.email, &otp).await;
        Ok(RegistrationOutcome {
            account: (&account).into(),
            otp_delivered,
        })
    }

    pub fn login(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        let invalid = || ServiceError::Unauthenticated("Invalid email or password".to_string());

        let email = normalize_email(email).map_err(|_| invalid())?;
        let account = self.accounts().find_by_email(&email)?.ok_or_else(invalid)?;
        if !verify_password(password, &account.password_hash) {
            return Err(invalid());
        }
        if account.is_suspended() {
            return Err(ServiceError::forbidden("Account is suspended"));
        }
        self.session(&account)
    }

    /// Check an email OTP and mark the address verified.
    pub fn verify_email(&self, email: &str, otp: &str) -> Result<Session, ServiceError> {
        let email = normalize_email(email)?;
        let verifier = &self.state.verifier;

        let account = self.state.store.write(|txn| {
            let mut account = AccountRepository::find_by_email_in(txn, &email)?
                .ok_or_else(|| ServiceError::not_found("Account not found"))?;
            if account.is_email_verified {
                return Err(ServiceError::validation("Email already verified"));
            }

            let key = otp_key(VerificationPurpose::EmailOtp, &account.id);
            let code = VerificationRepository::get_in(txn, &key)?
                .filter(|code| !code.is_expired(Utc::now()))
                .ok_or_else(|| ServiceError::validation("OTP expired or not found"))?;
            if !verifier.verify_otp(VerificationPurpose::EmailOtp, &account.id, otp, &code.digest) {
                return Err(ServiceError::validation("Invalid OTP"));
            }

            VerificationRepository::remove_in(txn, &key)?;
            account.is_email_verified = true;
            account.touch();
            AccountRepository::update_in(txn, &account)?;
            Ok::<_, ServiceError>(account)
        })?;

        tracing::info!(account_id = %account.id, "Email verified");
        self.session(&account)
    }

    /// Replace the pending email OTP. Returns whether it was delivered.
    pub async fn resend_otp(&self, email: &str) -> Result<bool, ServiceError> {
        let email = normalize_email(email)?;

        let (account, otp) = self.state.store.write(|txn| {
            let account = AccountRepository::find_by_email_in(txn, &email)?
                .ok_or_else(|| ServiceError::not_found("Account not found"))?;
            if account.is_email_verified {
                return Err(ServiceError::validation("Email already verified"));
            }
            let (otp, code) = self.email_otp(&account.id);
            VerificationRepository::put_in(txn, &code)?;
            Ok::<_, ServiceError>((account, otp))
        })?;

        Ok(self.deliver_email_otp(&account.email, &otp).await)
    }

    /// Send a reset link when the account exists. The caller answers the same
    /// way either way.
    pub async fn forgot_password(&self, email: &str) -> Result<(), ServiceError> {
        let Ok(email) = normalize_email(email) else {
            return Ok(());
        };
        let token = generate_reset_token();
        let digest = self.state.verifier.reset_digest(&token);

        let account = self.state.store.write(|txn| {
            let Some(account) = AccountRepository::find_by_email_in(txn, &email)? else {
                return Ok::<_, ServiceError>(None);
            };
            VerificationRepository::remove_resets_in(txn, &account.id)?;
            VerificationRepository::put_in(
                txn,
                &VerificationCode {
                    account_id: account.id.clone(),
                    purpose: VerificationPurpose::PasswordReset,
                    digest: digest.clone(),
                    target: None,
                    expires_at: expiry(RESET_TOKEN_TTL_MINUTES),
                },
            )?;
            Ok(Some(account))
        })?;

        let Some(account) = account else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let link = format!(
            "{}/reset-password?token={token}",
            self.state.frontend_url.trim_end_matches('/')
        );
        let delivered = self
            .state
            .notifier
            .send_password_reset(&account.email, &link, RESET_TOKEN_TTL_MINUTES)
            .await;
        if !delivered {
            tracing::warn!(account_id = %account.id, "Password reset email was not delivered");
        }
        Ok(())
    }

    /// Consume a reset token and set a new password. Every outstanding token
    /// of the account is revoked.
    pub fn reset_password(
        &self,
        token: &str,
        password: &str,
        confirm: &str,
    ) -> Result<String, ServiceError> {
        check_new_password(password, confirm)?;
        let key = reset_key(&self.state.verifier.reset_digest(token));
        let invalid = || ServiceError::validation("Invalid or expired reset token");

        // Argon2 work stays outside the write transaction.
        let code = VerificationRepository::new(&self.state.store)
            .get(&key)?
            .filter(|code| !code.is_expired(Utc::now()))
            .ok_or_else(invalid)?;
        let snapshot = self.accounts().get(&code.account_id)?.ok_or_else(invalid)?;
        if verify_password(password, &snapshot.password_hash) {
            return Err(ServiceError::validation(
                "New password must differ from the current password",
            ));
        }
        let password_hash = set_password(password)?;

        let account = self.state.store.write(|txn| {
            VerificationRepository::get_in(txn, &key)?
                .filter(|code| !code.is_expired(Utc::now()))
                .ok_or_else(invalid)?;
            let mut account = AccountRepository::get_in(txn, &code.account_id)?
                .ok_or_else(invalid)?;
            ensure_unchanged(&snapshot, &account)?;

            account.password_hash = password_hash;
            account.token_version += 1;
            account.touch();
            AccountRepository::update_in(txn, &account)?;
            VerificationRepository::remove_account_in(txn, &account.id)?;
            Ok::<_, ServiceError>(account)
        })?;

        tracing::info!(account_id = %account.id, "Password reset");
        Ok(account.id)
    }

    pub fn change_password(
        &self,
        account_id: &str,
        current: &str,
        password: &str,
        confirm: &str,
    ) -> Result<(), ServiceError> {
        check_new_password(password, confirm)?;

        let snapshot = self
            .accounts()
            .get(account_id)?
            .ok_or_else(|| ServiceError::not_found("Account not found"))?;
        if !verify_password(current, &snapshot.password_hash) {
            return Err(ServiceError::validation("Current password is incorrect"));
        }
        let password_hash = set_password(password)?;

        self.state.store.write(|txn| {
            let mut account = AccountRepository::get_in(txn, account_id)?
                .ok_or_else(|| ServiceError::not_found("Account not found"))?;
            ensure_unchanged(&snapshot, &account)?;
            account.password_hash = password_hash;
            account.touch();
            AccountRepository::update_in(txn, &account)?;
            Ok::<_, ServiceError>(())
        })?;

        tracing::info!(account_id = %account_id, "Password changed");
        Ok(())
    }

    pub fn me(&self, account_id: &str) -> Result<AccountView, ServiceError> {
        self.accounts()
            .get(account_id)?
            .map(|account| (&account).into())
            .ok_or_else(|| ServiceError::not_found("Account not found"))
    }

    pub fn profile(&self, account_id: &str) -> Result<ProfileView, ServiceError> {
        self.accounts()
            .get(account_id)?
            .map(|account| (&account).into())
            .ok_or_else(|| ServiceError::not_found("Account not found"))
    }

    /// Apply the supplied fields. A new email must be free and resets
    /// verification.
    pub fn update_profile(
        &self,
        account_id: &str,
        update: ProfileUpdate,
    ) -> Result<AccountView, ServiceError> {
        let name = match update.name.map(|n| n.trim().to_string()) {
            Some(n) if n.is_empty() => return Err(ServiceError::validation("Name cannot be empty")),
            other => other,
        };
        let email = update.email.as_deref().map(normalize_email).transpose()?;
        let user_type = update
            .user_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let account = self.state.store.write(|txn| {
            let mut account = AccountRepository::get_in(txn, account_id)?
                .ok_or_else(|| ServiceError::not_found("Account not found"))?;

            if let Some(email) = email.as_deref().filter(|e| *e != account.email) {
                if AccountRepository::id_for_email_in(txn, email)?.is_some() {
                    return Err(ServiceError::conflict("Email already in use"));
                }
                AccountRepository::reindex_email_in(txn, &account.email, email, &account.id)?;
                account.email = email.to_string();
                account.is_email_verified = false;
            }
            if let Some(name) = &name {
                account.name = name.clone();
            }
            if let Some(user_type) = &user_type {
                account.user_type = user_type.clone();
            }
            account.touch();
            AccountRepository::update_in(txn, &account)?;
            Ok::<_, ServiceError>(account)
        })?;

        Ok((&account).into())
    }

    /// Store a phone OTP for `phone` and text it. Returns whether the SMS
    /// went out.
    pub async fn send_phone_otp(&self, account_id: &str, phone: &str) -> Result<bool, ServiceError> {
        let phone = normalize_phone(phone)?;
        let otp = generate_otp();
        let code = VerificationCode {
            account_id: account_id.to_string(),
            purpose: VerificationPurpose::PhoneOtp,
            digest: self
                .state
                .verifier
                .otp_digest(VerificationPurpose::PhoneOtp, account_id, &otp),
            target: Some(phone.clone()),
            expires_at: expiry(PHONE_OTP_TTL_MINUTES),
        };

        self.state.store.write(|txn| {
            AccountRepository::get_in(txn, account_id)?
                .ok_or_else(|| ServiceError::not_found("Account not found"))?;
            VerificationRepository::put_in(txn, &code)?;
            Ok::<_, ServiceError>(())
        })?;

        let delivered = self.state.notifier.send_sms(&phone, &otp).await;
        if !delivered {
            tracing::warn!(account_id = %account_id, "Phone OTP was not delivered");
        }
        Ok(delivered)
    }

    pub fn verify_phone(
        &self,
        account_id: &str,
        phone: &str,
        otp: &str,
    ) -> Result<AccountView, ServiceError> {
        let phone = normalize_phone(phone)?;
        let verifier = &self.state.verifier;

        let account = self.state.store.write(|txn| {
            let key = otp_key(VerificationPurpose::PhoneOtp, account_id);
            let code = VerificationRepository::get_in(txn, &key)?
                .filter(|code| !code.is_expired(Utc::now()))
                .filter(|code| code.target.as_deref() == Some(phone.as_str()))
                .ok_or_else(|| ServiceError::validation("OTP expired or not found"))?;
            if !verifier.verify_otp(VerificationPurpose::PhoneOtp, account_id, otp, &code.digest) {
                return Err(ServiceError::validation("Invalid OTP"));
            }

            let mut account = AccountRepository::get_in(txn, account_id)?
                .ok_or_else(|| ServiceError::not_found("Account not found"))?;
            VerificationRepository::remove_in(txn, &key)?;
            account.phone = Some(phone.clone());
            account.is_phone_verified = true;
            account.touch();
            AccountRepository::update_in(txn, &account)?;
            Ok::<_, ServiceError>(account)
        })?;

        tracing::info!(account_id = %account.id, "Phone verified");
        Ok((&account).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::notifier::RecordingNotifier;
    use crate::state::test_state_with;
    use std::sync::Arc;

    fn registration(email: &str, referral_code: Option<&str>) -> Registration {
        Registration {
            name: "Asha Rao".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
            user_type: None,
            referral_code: referral_code.map(str::to_string),
        }
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Alice@Example.COM ").unwrap(), "alice@example.com");
        // Fullwidth characters fold under NFKC.
        assert_eq!(normalize_email("ｂｏｂ@example.com").unwrap(), "bob@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("a@b").is_err());
        assert!(normalize_email("a b@example.com").is_err());
    }

    #[test]
    fn masking() {
        assert_eq!(mask_email("john.doe@x.com"), "j****e@x.com");
        assert_eq!(mask_email("a@x.com"), "a****@x.com");
        assert_eq!(mask_phone("+919876543321"), "+91****321");
        assert_eq!(mask_phone("12345"), "****");
    }

    #[tokio::test]
    async fn register_verify_and_login() {
        let notifier = Arc::new(RecordingNotifier::delivering());
        let (state, _dir) = test_state_with(notifier.clone());
        let service = AccountService::new(&state);

        let outcome = service
            .register(registration("Asha@Example.com", None))
            .await
            .unwrap();
        assert!(outcome.otp_delivered);
        assert_eq!(outcome.account.email, "asha@example.com");
        assert_eq!(outcome.account.referral_code.len(), 8);
        assert!(!outcome.account.is_email_verified);

        let err = service
            .register(registration("asha@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = service.verify_email("asha@example.com", "000000").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let otp = notifier.last_for("asha@example.com").unwrap();
        let session = service.verify_email("asha@example.com", &otp).unwrap();
        assert!(session.account.is_email_verified);
        assert!(state.tokens.verify(&session.token).is_ok());

        let err = service.verify_email("asha@example.com", &otp).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        assert!(service.login("ASHA@example.com", "secret123").is_ok());
        let err = service.login("asha@example.com", "wrong-password").unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
        let err = service.login("nobody@example.com", "secret123").unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn undelivered_otp_does_not_roll_back_registration() {
        let (state, _dir) = test_state_with(Arc::new(RecordingNotifier::default()));
        let service = AccountService::new(&state);

        let outcome = service
            .register(registration("quiet@example.com", None))
            .await
            .unwrap();
        assert!(!outcome.otp_delivered);
        assert!(service.me(&outcome.account.id).is_ok());
    }

    #[tokio::test]
    async fn registration_links_referrer_and_ignores_stale_codes() {
        let (state, _dir) = test_state_with(Arc::new(RecordingNotifier::delivering()));
        let service = AccountService::new(&state);

        let referrer = service
            .register(registration("ref@example.com", None))
            .await
            .unwrap()
            .account;
        let referred = service
            .register(registration(
                "new@example.com",
                Some(&referrer.referral_code.to_lowercase()),
            ))
            .await
            .unwrap()
            .account;
        assert_eq!(referred.referred_by.as_deref(), Some(referrer.referral_code.as_str()));

        let referrer = service.me(&referrer.id).unwrap();
        assert_eq!(referrer.referral_count, 1);

        let stale = service
            .register(registration("stale@example.com", Some("ZZZZZZZZ")))
            .await
            .unwrap()
            .account;
        assert_eq!(stale.referred_by, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_referred_registrations_keep_counts_consistent() {
        const SIGNUPS: usize = 12;
        let (state, _dir) = test_state_with(Arc::new(RecordingNotifier::delivering()));
        let referrer = AccountService::new(&state)
            .register(registration("hub@example.com", None))
            .await
            .unwrap()
            .account;

        let handles: Vec<_> = (0..SIGNUPS)
            .map(|i| {
                let state = state.clone();
                let code = referrer.referral_code.clone();
                tokio::spawn(async move {
                    AccountService::new(&state)
                        .register(registration(&format!("spoke{i}@example.com"), Some(&code)))
                        .await
                        .map(|outcome| outcome.account)
                })
            })
            .collect();

        let mut referred = Vec::new();
        for handle in handles {
            referred.push(handle.await.unwrap().unwrap());
        }

        let stored = AccountRepository::new(&state.store)
            .get(&referrer.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.referral_count, SIGNUPS as u64);
        assert_eq!(stored.referred_users.len(), SIGNUPS);
        let linked: std::collections::HashSet<&str> =
            stored.referred_users.iter().map(String::as_str).collect();
        for account in &referred {
            assert!(linked.contains(account.id.as_str()));
        }

        let mut codes: std::collections::HashSet<&str> =
            referred.iter().map(|a| a.referral_code.as_str()).collect();
        codes.insert(referrer.referral_code.as_str());
        assert_eq!(codes.len(), SIGNUPS + 1);
    }

    #[test]
    fn stale_credential_snapshot_is_a_conflict() {
        let snapshot = StoredAccount::new(
            "Asha Rao".to_string(),
            "asha@example.com".to_string(),
            "hash-a".to_string(),
            DEFAULT_USER_TYPE.to_string(),
            Role::User,
            "CODE0001".to_string(),
        );
        assert!(ensure_unchanged(&snapshot, &snapshot.clone()).is_ok());

        let mut logged_out = snapshot.clone();
        logged_out.token_version += 1;
        assert!(matches!(
            ensure_unchanged(&snapshot, &logged_out),
            Err(ServiceError::Conflict(_))
        ));

        let mut rehashed = snapshot.clone();
        rehashed.password_hash = "hash-b".to_string();
        assert!(matches!(
            ensure_unchanged(&snapshot, &rehashed),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let (state, _dir) = test_state_with(Arc::new(RecordingNotifier::delivering()));
        let mut input = registration("short@example.com", None);
        input.password = "abc".to_string();
        let err = AccountService::new(&state).register(input).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn password_reset_flow() {
        let notifier = Arc::new(RecordingNotifier::delivering());
        let (state, _dir) = test_state_with(notifier.clone());
        let service = AccountService::new(&state);
        let account = service
            .register(registration("reset@example.com", None))
            .await
            .unwrap()
            .account;

        // Unknown emails answer the same way and send nothing.
        service.forgot_password("ghost@example.com").await.unwrap();
        assert!(notifier.last_for("ghost@example.com").is_none());

        service.forgot_password("reset@example.com").await.unwrap();
        let link = notifier.last_for("reset@example.com").unwrap();
        let token = link.split("token=").nth(1).unwrap().to_string();
        assert!(link.starts_with("http://localhost:3000/reset-password?token="));

        let err = service.reset_password(&token, "newpass1", "different").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = service.reset_password(&token, "secret123", "secret123").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = service.reset_password("bogus", "newpass1", "newpass1").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let id = service.reset_password(&token, "newpass1", "newpass1").unwrap();
        assert_eq!(id, account.id);
        assert!(service.login("reset@example.com", "newpass1").is_ok());

        // Tokens are single-use.
        let err = service.reset_password(&token, "newpass2", "newpass2").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn change_password_and_profile() {
        let (state, _dir) = test_state_with(Arc::new(RecordingNotifier::delivering()));
        let service = AccountService::new(&state);
        let a = service
            .register(registration("a@example.com", None))
            .await
            .unwrap()
            .account;
        service
            .register(registration("b@example.com", None))
            .await
            .unwrap();

        let err = service
            .change_password(&a.id, "wrong", "another1", "another1")
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        service
            .change_password(&a.id, "secret123", "another1", "another1")
            .unwrap();
        assert!(service.login("a@example.com", "another1").is_ok());

        let err = service
            .update_profile(
                &a.id,
                ProfileUpdate {
                    email: Some("B@example.com".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let updated = service
            .update_profile(
                &a.id,
                ProfileUpdate {
                    name: Some("Renamed".to_string()),
                    email: Some("c@example.com".to_string()),
                    user_type: Some("corporate".to_string()),
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.email, "c@example.com");
        assert!(!updated.is_email_verified);
        assert!(service.login("c@example.com", "another1").is_ok());
        assert!(service.login("a@example.com", "another1").is_err());

        let profile = service.profile(&a.id).unwrap();
        assert_eq!(profile.email, "c****@example.com");
    }

    #[tokio::test]
    async fn phone_verification() {
        let notifier = Arc::new(RecordingNotifier::delivering());
        let (state, _dir) = test_state_with(notifier.clone());
        let service = AccountService::new(&state);
        let account = service
            .register(registration("phone@example.com", None))
            .await
            .unwrap()
            .account;

        assert!(service.send_phone_otp(&account.id, "12").await.is_err());
        assert!(service
            .send_phone_otp(&account.id, "+919876543321")
            .await
            .unwrap());
        let otp = notifier.last_for("+919876543321").unwrap();

        let err = service
            .verify_phone(&account.id, "+919876543322", &otp)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let view = service
            .verify_phone(&account.id, "+919876543321", &otp)
            .unwrap();
        assert!(view.is_phone_verified);
        assert_eq!(view.phone.as_deref(), Some("+919876543321"));
        assert_eq!(
            service.profile(&account.id).unwrap().phone.as_deref(),
            Some("+91****321")
        );
    }
}
