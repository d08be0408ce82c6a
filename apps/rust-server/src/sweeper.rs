// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Verification Code Sweeper
//!
//! Background task that deletes expired email OTPs, phone OTPs and password
//! reset digests. Expired codes are already rejected on use; the sweep only
//! keeps the table from growing.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`; `main` cancels it when the
//! server begins graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::storage::{Store, VerificationRepository};

/// Default interval between sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct CodeSweeper {
    store: Arc<Store>,
    interval: Duration,
}

impl CodeSweeper {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Verification code sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Verification code sweeper shutting down");
                return;
            }

            self.sweep();

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Verification code sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// One pass. Returns how many codes were removed.
    fn sweep(&self) -> usize {
        match VerificationRepository::new(&self.store).purge_expired(Utc::now()) {
            Ok(0) => 0,
            Ok(removed) => {
                debug!(removed, "Purged expired verification codes");
                removed
            }
            Err(e) => {
                warn!(error = %e, "Verification code sweep failed");
                0
            }
        }
    }
}
