// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Administrative operations: staff accounts, account controls and the
//! persisted system switches.
//!
//! Role checks happen at the HTTP boundary (`AdminOnly` / `SuperadminOnly`);
//! the self-protection rules (no self-demotion, no self-deletion, no
//! self-suspension) are enforced here because they depend on the target.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::accounts::{normalize_email, AccountView};
use super::ServiceError;
use crate::auth::password::{generate_temporary_password, set_password};
use crate::auth::{AuthenticatedUser, Role};
use crate::storage::{
    AccountRepository, AccountStatus, AuditEvent, AuditRepository, KycRepository, KycStatus,
    LedgerStore, StakingRepository, Store, StoredAccount, SystemConfig, SystemRepository,
    TransactionRepository, VerificationRepository,
};

/// Length of passwords generated by an administrative reset.
pub const TEMPORARY_PASSWORD_LEN: usize = 12;

/// Largest audit page.
pub const MAX_AUDIT_PAGE: usize = 500;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewStaffAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Generated credential, shown once.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TemporaryPassword {
    pub account_id: String,
    pub temporary_password: String,
}

#[derive(Debug, Clone, Copy)]
enum AccountFlag {
    WalletLock,
    StakingLock,
    Suspension,
}

pub struct AdminService<'a> {
    store: &'a Store,
}

impl<'a> AdminService<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn create_admin(&self, input: NewStaffAccount) -> Result<AccountView, ServiceError> {
        if !input.role.is_staff() {
            return Err(ServiceError::validation("Role must be admin or superadmin"));
        }
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::validation("Name is required"));
        }
        let email = normalize_email(&input.email)?;
        let password_hash = set_password(&input.password)?;

        let account = self.store.write(|txn| {
            if AccountRepository::id_for_email_in(txn, &email)?.is_some() {
                return Err(ServiceError::conflict("Email already registered"));
            }
            let code = AccountRepository::unique_referral_code_in(txn)?;
            let mut account = StoredAccount::new(
                name,
                email,
                password_hash,
                "staff".to_string(),
                input.role,
                code,
            );
            account.is_email_verified = true;
            AccountRepository::insert_in(txn, &account)?;
            Ok::<_, ServiceError>(account)
        })?;

        tracing::info!(account_id = %account.id, role = %account.role, "Staff account created");
        Ok((&account).into())
    }

    /// Create the bootstrap superadmin unless that email is already taken.
    /// Returns whether an account was created.
    pub fn seed_superadmin(&self, email: &str, password: &str) -> Result<bool, ServiceError> {
        let normalized = normalize_email(email)?;
        if AccountRepository::new(self.store)
            .find_by_email(&normalized)?
            .is_some()
        {
            return Ok(false);
        }
        self.create_admin(NewStaffAccount {
            name: "Superadmin".to_string(),
            email: normalized,
            password: password.to_string(),
            role: Role::Superadmin,
        })?;
        Ok(true)
    }

    pub fn list_admins(&self) -> Result<Vec<AccountView>, ServiceError> {
        Ok(AccountRepository::new(self.store)
            .list()?
            .iter()
            .filter(|account| account.role.is_staff())
            .map(AccountView::from)
            .collect())
    }

    /// Customer accounts, optionally filtered by email substring and KYC
    /// status.
    pub fn list_users(
        &self,
        email: Option<&str>,
        kyc_status: Option<KycStatus>,
    ) -> Result<Vec<AccountView>, ServiceError> {
        let needle = email.map(|e| e.trim().to_lowercase());
        Ok(AccountRepository::new(self.store)
            .list()?
            .iter()
            .filter(|account| account.role == Role::User)
            .filter(|account| {
                needle
                    .as_deref()
                    .is_none_or(|needle| account.email.contains(needle))
            })
            .filter(|account| kyc_status.is_none_or(|status| account.kyc_status == status))
            .map(AccountView::from)
            .collect())
    }

    pub fn change_role(
        &self,
        actor: &AuthenticatedUser,
        account_id: &str,
        role: Role,
    ) -> Result<AccountView, ServiceError> {
        if actor.user_id == account_id && role != actor.role {
            return Err(ServiceError::forbidden("You cannot change your own role"));
        }
        self.update_account(account_id, |account| {
            account.role = role;
            Ok(())
        })
    }

    pub fn toggle_wallet_lock(&self, account_id: &str) -> Result<AccountView, ServiceError> {
        self.toggle(account_id, AccountFlag::WalletLock)
    }

    pub fn toggle_staking_lock(&self, account_id: &str) -> Result<AccountView, ServiceError> {
        self.toggle(account_id, AccountFlag::StakingLock)
    }

    pub fn toggle_suspension(
        &self,
        actor: &AuthenticatedUser,
        account_id: &str,
    ) -> Result<AccountView, ServiceError> {
        if actor.user_id == account_id {
            return Err(ServiceError::forbidden("You cannot suspend your own account"));
        }
        self.toggle(account_id, AccountFlag::Suspension)
    }

    fn toggle(&self, account_id: &str, flag: AccountFlag) -> Result<AccountView, ServiceError> {
        self.update_account(account_id, |account| {
            match flag {
                AccountFlag::WalletLock => account.wallet_locked = !account.wallet_locked,
                AccountFlag::StakingLock => account.staking_locked = !account.staking_locked,
                AccountFlag::Suspension => {
                    account.status = match account.status {
                        AccountStatus::Active => AccountStatus::Suspended,
                        AccountStatus::Suspended => AccountStatus::Active,
                    }
                }
            }
            Ok(())
        })
    }

    /// Replace the password with a random one and revoke outstanding tokens.
    pub fn reset_user_password(&self, account_id: &str) -> Result<TemporaryPassword, ServiceError> {
        let temporary_password = generate_temporary_password(TEMPORARY_PASSWORD_LEN);
        let password_hash = set_password(&temporary_password)?;

        self.update_account(account_id, |account| {
            account.password_hash = password_hash;
            account.token_version += 1;
            Ok(())
        })?;

        Ok(TemporaryPassword {
            account_id: account_id.to_string(),
            temporary_password,
        })
    }

    /// Invalidate every token issued to the account so far.
    pub fn force_logout(&self, account_id: &str) -> Result<AccountView, ServiceError> {
        self.update_account(account_id, |account| {
            account.token_version += 1;
            Ok(())
        })
    }

    /// Hard delete. Removes the account, its indexes, balances, transactions,
    /// KYC record, stakes and pending codes in one transaction.
    pub fn delete_account(
        &self,
        actor: &AuthenticatedUser,
        account_id: &str,
    ) -> Result<(), ServiceError> {
        if actor.user_id == account_id {
            return Err(ServiceError::forbidden("You cannot delete your own account"));
        }

        self.store.write(|txn| {
            let account = AccountRepository::get_in(txn, account_id)?
                .ok_or_else(|| ServiceError::not_found("Account not found"))?;
            AccountRepository::delete_in(txn, &account)?;
            LedgerStore::remove_account_in(txn, account_id)?;
            TransactionRepository::remove_account_in(txn, account_id)?;
            KycRepository::remove_for_account_in(txn, account_id)?;
            StakingRepository::remove_account_in(txn, account_id)?;
            VerificationRepository::remove_account_in(txn, account_id)?;
            Ok::<_, ServiceError>(())
        })?;

        tracing::warn!(account_id = %account_id, deleted_by = %actor.user_id, "Account deleted");
        Ok(())
    }

    pub fn system_config(&self) -> Result<SystemConfig, ServiceError> {
        Ok(SystemRepository::new(self.store).get()?)
    }

    pub fn toggle_withdrawals_paused(
        &self,
        actor: &AuthenticatedUser,
    ) -> Result<SystemConfig, ServiceError> {
        self.update_system(actor, |config| {
            config.withdrawals_paused = !config.withdrawals_paused;
        })
    }

    pub fn emergency_shutdown(&self, actor: &AuthenticatedUser) -> Result<SystemConfig, ServiceError> {
        self.update_system(actor, |config| config.trading_halted = true)
    }

    pub fn resume_trading(&self, actor: &AuthenticatedUser) -> Result<SystemConfig, ServiceError> {
        self.update_system(actor, |config| config.trading_halted = false)
    }

    pub fn audit_log(
        &self,
        user_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditEvent>, ServiceError> {
        let limit = limit.clamp(1, MAX_AUDIT_PAGE);
        Ok(AuditRepository::new(self.store).query(user_id, offset, limit)?)
    }

    fn update_account<F>(&self, account_id: &str, apply: F) -> Result<AccountView, ServiceError>
    where
        F: FnOnce(&mut StoredAccount) -> Result<(), ServiceError>,
    {
        let account = self.store.write(|txn| {
            let mut account = AccountRepository::get_in(txn, account_id)?
                .ok_or_else(|| ServiceError::not_found("Account not found"))?;
            apply(&mut account)?;
            account.touch();
            AccountRepository::update_in(txn, &account)?;
            Ok::<_, ServiceError>(account)
        })?;
        Ok((&account).into())
    }

    fn update_system<F>(&self, actor: &AuthenticatedUser, apply: F) -> Result<SystemConfig, ServiceError>
    where
        F: FnOnce(&mut SystemConfig),
    {
        let config = self.store.write(|txn| {
            let mut config = SystemRepository::get_in(txn)?;
            apply(&mut config);
            config.updated_at = Some(Utc::now());
            config.updated_by = Some(actor.user_id.clone());
            SystemRepository::put_in(txn, &config)?;
            Ok::<_, ServiceError>(config)
        })?;

        tracing::warn!(
            withdrawals_paused = config.withdrawals_paused,
            trading_halted = config.trading_halted,
            updated_by = %actor.user_id,
            "System switches updated"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use crate::storage::database::temp_store;
    use crate::storage::{AuditEventType, Currency};
    use rust_decimal::Decimal;

    fn staff(service: &AdminService<'_>, email: &str, role: Role) -> AuthenticatedUser {
        let view = service
            .create_admin(NewStaffAccount {
                name: "Staff".to_string(),
                email: email.to_string(),
                password: "staffpass".to_string(),
                role,
            })
            .unwrap();
        AuthenticatedUser {
            user_id: view.id,
            role,
            email: view.email,
        }
    }

    fn customer(store: &Store, email: &str) -> StoredAccount {
        store
            .write(|txn| {
                let code = AccountRepository::unique_referral_code_in(txn)?;
                let account = StoredAccount::new(
                    "Customer".to_string(),
                    email.to_string(),
                    set_password("customer1").unwrap(),
                    "individual".to_string(),
                    Role::User,
                    code,
                );
                AccountRepository::insert_in(txn, &account)?;
                Ok::<_, ServiceError>(account)
            })
            .unwrap()
    }

    #[test]
    fn seed_superadmin_runs_once() {
        let (store, _dir) = temp_store();
        let service = AdminService::new(&store);
        assert!(service.seed_superadmin("Root@Example.com", "rootpass").unwrap());
        assert!(!service.seed_superadmin("root@example.com", "other").unwrap());

        let admins = service.list_admins().unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].role, Role::Superadmin);
        assert!(admins[0].is_email_verified);
    }

    #[test]
    fn create_admin_requires_staff_role_and_unique_email() {
        let (store, _dir) = temp_store();
        let service = AdminService::new(&store);
        let root = staff(&service, "root@example.com", Role::Superadmin);
        assert!(root.is_superadmin());

        let err = service
            .create_admin(NewStaffAccount {
                name: "X".to_string(),
                email: "x@example.com".to_string(),
                password: "staffpass".to_string(),
                role: Role::User,
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = service
            .create_admin(NewStaffAccount {
                name: "Dup".to_string(),
                email: "ROOT@example.com".to_string(),
                password: "staffpass".to_string(),
                role: Role::Admin,
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        staff(&service, "admin@example.com", Role::Admin);
        customer(&store, "user@example.com");
        assert_eq!(service.list_admins().unwrap().len(), 2);
        assert_eq!(service.list_users(None, None).unwrap().len(), 1);
    }

    #[test]
    fn list_users_filters() {
        let (store, _dir) = temp_store();
        let service = AdminService::new(&store);
        let mut approved = customer(&store, "alice@example.com");
        customer(&store, "bob@example.com");
        approved.kyc_status = KycStatus::Approved;
        store
            .write(|txn| AccountRepository::update_in(txn, &approved))
            .unwrap();

        assert_eq!(service.list_users(Some("ALICE"), None).unwrap().len(), 1);
        let filtered = service.list_users(None, Some(KycStatus::Approved)).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].email, "alice@example.com");
        assert!(service
            .list_users(Some("bob"), Some(KycStatus::Approved))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn self_protection_rules() {
        let (store, _dir) = temp_store();
        let service = AdminService::new(&store);
        let root = staff(&service, "root@example.com", Role::Superadmin);

        assert!(matches!(
            service.change_role(&root, &root.user_id, Role::Admin),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete_account(&root, &root.user_id),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.toggle_suspension(&root, &root.user_id),
            Err(ServiceError::Forbidden(_))
        ));

        let user = customer(&store, "user@example.com");
        let promoted = service.change_role(&root, &user.id, Role::Admin).unwrap();
        assert_eq!(promoted.role, Role::Admin);
        assert!(matches!(
            service.change_role(&root, "missing", Role::Admin),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn toggles_flip_flags() {
        let (store, _dir) = temp_store();
        let service = AdminService::new(&store);
        let root = staff(&service, "root@example.com", Role::Superadmin);
        let user = customer(&store, "user@example.com");

        assert!(service.toggle_wallet_lock(&user.id).unwrap().wallet_locked);
        assert!(!service.toggle_wallet_lock(&user.id).unwrap().wallet_locked);
        assert!(service.toggle_staking_lock(&user.id).unwrap().staking_locked);
        assert_eq!(
            service.toggle_suspension(&root, &user.id).unwrap().status,
            AccountStatus::Suspended
        );
        assert_eq!(
            service.toggle_suspension(&root, &user.id).unwrap().status,
            AccountStatus::Active
        );
    }

    #[test]
    fn reset_password_and_force_logout_bump_token_version() {
        let (store, _dir) = temp_store();
        let service = AdminService::new(&store);
        let user = customer(&store, "user@example.com");

        let reset = service.reset_user_password(&user.id).unwrap();
        assert_eq!(reset.temporary_password.len(), TEMPORARY_PASSWORD_LEN);
        let stored = AccountRepository::new(&store).get(&user.id).unwrap().unwrap();
        assert!(verify_password(&reset.temporary_password, &stored.password_hash));
        assert_eq!(stored.token_version, 1);

        service.force_logout(&user.id).unwrap();
        let stored = AccountRepository::new(&store).get(&user.id).unwrap().unwrap();
        assert_eq!(stored.token_version, 2);
    }

    #[test]
    fn delete_removes_account_and_balances() {
        let (store, _dir) = temp_store();
        let service = AdminService::new(&store);
        let root = staff(&service, "root@example.com", Role::Superadmin);
        let user = customer(&store, "user@example.com");
        LedgerStore::new(&store)
            .credit(&user.id, Currency::Btc, Decimal::ONE)
            .unwrap();

        service.delete_account(&root, &user.id).unwrap();

        let accounts = AccountRepository::new(&store);
        assert!(accounts.get(&user.id).unwrap().is_none());
        assert!(accounts.find_by_email("user@example.com").unwrap().is_none());
        assert!(accounts
            .find_by_referral_code(&user.referral_code)
            .unwrap()
            .is_none());
        assert_eq!(
            LedgerStore::new(&store).balance(&user.id, Currency::Btc).unwrap(),
            Decimal::ZERO
        );
        assert!(matches!(
            service.delete_account(&root, &user.id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn system_switches_persist() {
        let (store, _dir) = temp_store();
        let service = AdminService::new(&store);
        let root = staff(&service, "root@example.com", Role::Superadmin);

        assert!(service.toggle_withdrawals_paused(&root).unwrap().withdrawals_paused);
        let halted = service.emergency_shutdown(&root).unwrap();
        assert!(halted.trading_halted);
        assert_eq!(halted.updated_by.as_deref(), Some(root.user_id.as_str()));

        let config = service.system_config().unwrap();
        assert!(config.withdrawals_paused);
        assert!(config.trading_halted);

        assert!(!service.resume_trading(&root).unwrap().trading_halted);
        assert!(!service.toggle_withdrawals_paused(&root).unwrap().withdrawals_paused);
    }

    #[test]
    fn audit_log_pages() {
        let (store, _dir) = temp_store();
        let service = AdminService::new(&store);
        let repo = AuditRepository::new(&store);
        for _ in 0..3 {
            repo.log(&AuditEvent::new(AuditEventType::ForcedLogout).with_user("admin"))
                .unwrap();
        }
        repo.log(&AuditEvent::new(AuditEventType::Deposit).with_user("someone"))
            .unwrap();

        assert_eq!(service.audit_log(None, 10, 0).unwrap().len(), 4);
        assert_eq!(service.audit_log(Some("admin"), 2, 0).unwrap().len(), 2);
        assert_eq!(service.audit_log(Some("admin"), 10, 2).unwrap().len(), 1);
    }
}
