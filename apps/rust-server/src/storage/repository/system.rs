// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted system-wide switches.
//!
//! Read at the start of every mutating wallet operation inside the same
//! write transaction, so a switch flipped by an administrator is seen by
//! every later operation, across restarts.

use chrono::{DateTime, Utc};
use redb::WriteTransaction;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{get_json, to_json, Store, StoreResult, SYSTEM_CONFIG};

const SYSTEM_CONFIG_KEY: &str = "global";

/// Global operational switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SystemConfig {
    /// Withdrawals rejected while set.
    pub withdrawals_paused: bool,
    /// Every wallet mutation rejected while set (emergency shutdown).
    pub trading_halted: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

pub struct SystemRepository<'a> {
    store: &'a Store,
}

impl<'a> SystemRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn get(&self) -> StoreResult<SystemConfig> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(SYSTEM_CONFIG)?;
        Ok(get_json(&table, SYSTEM_CONFIG_KEY)?.unwrap_or_default())
    }

    pub fn get_in(txn: &WriteTransaction) -> StoreResult<SystemConfig> {
        let table = txn.open_table(SYSTEM_CONFIG)?;
        Ok(get_json(&table, SYSTEM_CONFIG_KEY)?.unwrap_or_default())
    }

    pub fn put_in(txn: &WriteTransaction, config: &SystemConfig) -> StoreResult<()> {
        let json = to_json(config)?;
        txn.open_table(SYSTEM_CONFIG)?
            .insert(SYSTEM_CONFIG_KEY, json.as_slice())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_store;

    #[test]
    fn defaults_to_everything_open() {
        let (store, _dir) = temp_store();
        let config = SystemRepository::new(&store).get().unwrap();
        assert!(!config.withdrawals_paused);
        assert!(!config.trading_halted);
    }

    #[test]
    fn persists_switches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sys.redb");
        {
            let store = Store::open(&path).unwrap();
            store
                .write(|txn| {
                    let mut config = SystemRepository::get_in(txn)?;
                    config.withdrawals_paused = true;
                    SystemRepository::put_in(txn, &config)
                })
                .unwrap();
        }

        let reopened = Store::open(&path).unwrap();
        let config = SystemRepository::new(&reopened).get().unwrap();
        assert!(config.withdrawals_paused);
        assert!(!config.trading_halted);
    }
}
