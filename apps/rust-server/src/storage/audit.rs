// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Authentication events, ledger movements, KYC decisions and every
//! administrative action are appended to the `audit_events` table, keyed by
//! timestamp so the log reads back in order.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::database::{to_json, Store, StoreResult, AUDIT_EVENTS};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Account events
    AccountRegistered,
    EmailVerified,
    PhoneVerified,
    ProfileUpdated,
    PasswordChanged,
    PasswordResetRequested,
    PasswordReset,

    // Auth events
    AuthSuccess,
    AuthFailure,

    // Ledger events
    Deposit,
    Withdrawal,
    CommissionRecorded,
    StakeOpened,
    StakeForeclosed,

    // KYC events
    KycSubmitted,
    KycReviewed,

    // Admin events
    AdminCreated,
    RoleChanged,
    WalletLockToggled,
    StakingLockToggled,
    SuspensionToggled,
    AdminPasswordReset,
    ForcedLogout,
    AccountDeleted,
    WithdrawalsToggled,
    EmergencyShutdown,
    TradingResumed,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Account that triggered the event (if known).
    pub user_id: Option<String>,
    /// Resource affected (account id, kyc id, stake id, ...).
    pub resource_id: Option<String>,
    /// Resource type (account, kyc, stake, ...).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the user ID.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

fn event_key(event: &AuditEvent) -> Vec<u8> {
    let micros = event.timestamp.timestamp_micros().max(0) as u64;
    let mut key = Vec::with_capacity(8 + 1 + event.event_id.len());
    key.extend_from_slice(&micros.to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(event.event_id.as_bytes());
    key
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    store: &'a Store,
}

impl<'a> AuditRepository<'a> {
    /// Create a new audit repository.
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Log an audit event.
    pub fn log(&self, event: &AuditEvent) -> StoreResult<()> {
        let json = to_json(event)?;
        let key = event_key(event);
        self.store.write(|txn| {
            txn.open_table(AUDIT_EVENTS)?
                .insert(key.as_slice(), json.as_slice())?;
            Ok(())
        })
    }

    /// Newest-first page of events, optionally restricted to one account
    /// (as actor or as affected resource).
    pub fn query(
        &self,
        user_id: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<AuditEvent>> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(AUDIT_EVENTS)?;

        let mut skipped = 0usize;
        let mut events = Vec::with_capacity(limit.min(256));
        for entry in table.iter()?.rev() {
            if events.len() >= limit {
                break;
            }
            let (_, value) = entry?;
            let event: AuditEvent = serde_json::from_slice(value.value())?;
            let matches = user_id.is_none_or(|id| {
                event.user_id.as_deref() == Some(id) || event.resource_id.as_deref() == Some(id)
            });
            if !matches {
                continue;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }
            events.push(event);
        }
        Ok(events)
    }
}

/// Helper macro for logging audit events.
///
/// Audit failures are logged and never fail the request that triggered them.
#[macro_export]
macro_rules! audit_log {
    ($store:expr, $event:expr) => {{
        let repo = $crate::storage::AuditRepository::new($store);
        if let Err(e) = repo.log(&$event) {
            tracing::warn!(error = %e, "Failed to write audit event");
        }
    }};
    ($store:expr, $event_type:expr, $user:expr) => {{
        $crate::audit_log!(
            $store,
            $crate::storage::AuditEvent::new($event_type).with_user(&$user.user_id)
        )
    }};
    ($store:expr, $event_type:expr, $user:expr, $resource_type:expr, $resource_id:expr) => {{
        $crate::audit_log!(
            $store,
            $crate::storage::AuditEvent::new($event_type)
                .with_user(&$user.user_id)
                .with_resource($resource_type, $resource_id)
        )
    }};
}
