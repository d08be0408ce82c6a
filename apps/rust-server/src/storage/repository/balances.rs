// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger store: per-account, per-currency balances.
//!
//! Balances live in the `balances` table keyed by `account_id|CURRENCY` with
//! the amount as a decimal string. A missing key is a zero balance.
//!
//! Every credit and debit is a read-modify-write inside a redb write
//! transaction. redb admits one writer at a time, so two debits against the
//! same balance are serialized and the second one sees the first one's
//! result.

use std::collections::BTreeMap;
use std::str::FromStr;

use redb::WriteTransaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{get_str, Store, StoreError, StoreResult, BALANCES};

/// Currencies the wallet holds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Btc,
    Eth,
    Usdt,
    /// Fiat reference currency. Commissions are paid in it.
    Inr,
}

impl Currency {
    /// Every supported currency, in display order.
    pub const ALL: [Currency; 4] = [Currency::Btc, Currency::Eth, Currency::Usdt, Currency::Inr];

    /// The fiat currency commissions and foreclosure payouts are credited in.
    pub const REFERENCE: Currency = Currency::Inr;

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Btc => "BTC",
            Currency::Eth => "ETH",
            Currency::Usdt => "USDT",
            Currency::Inr => "INR",
        }
    }

    /// Parse a currency code (case-insensitive).
    pub fn parse(s: &str) -> Option<Currency> {
        match s.trim().to_uppercase().as_str() {
            "BTC" => Some(Currency::Btc),
            "ETH" => Some(Currency::Eth),
            "USDT" => Some(Currency::Usdt),
            "INR" => Some(Currency::Inr),
            _ => None,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Ledger failures.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    /// The result would not fit in a `Decimal`.
    #[error("amount out of range")]
    AmountOutOfRange,

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn balance_key(account_id: &str, currency: Currency) -> String {
    format!("{account_id}|{}", currency.code())
}

fn parse_amount(raw: &str) -> StoreResult<Decimal> {
    Decimal::from_str(raw).map_err(|e| StoreError::Corrupt(format!("balance {raw:?}: {e}")))
}

/// Ledger store over the shared database.
pub struct LedgerStore<'a> {
    store: &'a Store,
}

impl<'a> LedgerStore<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Add `amount` to a balance. Returns the new balance.
    pub fn credit(
        &self,
        account_id: &str,
        currency: Currency,
        amount: Decimal,
    ) -> Result<Decimal, LedgerError> {
        self.store
            .write(|txn| Self::credit_in(txn, account_id, currency, amount))
    }

    /// Subtract `amount` from a balance, failing if it would go negative.
    /// Returns the new balance.
    pub fn debit(
        &self,
        account_id: &str,
        currency: Currency,
        amount: Decimal,
    ) -> Result<Decimal, LedgerError> {
        self.store
            .write(|txn| Self::debit_in(txn, account_id, currency, amount))
    }

    /// Current balance (zero if never credited).
    pub fn balance(&self, account_id: &str, currency: Currency) -> StoreResult<Decimal> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(BALANCES)?;
        match get_str(&table, &balance_key(account_id, currency))? {
            Some(raw) => parse_amount(&raw),
            None => Ok(Decimal::ZERO),
        }
    }

    /// Every supported currency with its balance, zero-filled.
    pub fn balances(&self, account_id: &str) -> StoreResult<BTreeMap<Currency, Decimal>> {
        let txn = self.store.begin_read()?;
        let table = txn.open_table(BALANCES)?;
        let mut out = BTreeMap::new();
        for currency in Currency::ALL {
            let amount = match get_str(&table, &balance_key(account_id, currency))? {
                Some(raw) => parse_amount(&raw)?,
                None => Decimal::ZERO,
            };
            out.insert(currency, amount);
        }
        Ok(out)
    }

    // =========================================================================
    // Transactional primitives
    // =========================================================================

    pub fn balance_in(
        txn: &WriteTransaction,
        account_id: &str,
        currency: Currency,
    ) -> StoreResult<Decimal> {
        let table = txn.open_table(BALANCES)?;
        match get_str(&table, &balance_key(account_id, currency))? {
            Some(raw) => parse_amount(&raw),
            None => Ok(Decimal::ZERO),
        }
    }

    pub fn credit_in(
        txn: &WriteTransaction,
        account_id: &str,
        currency: Currency,
        amount: Decimal,
    ) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount);
        }
        let current = Self::balance_in(txn, account_id, currency)?;
        let updated = current
            .checked_add(amount)
            .ok_or(LedgerError::AmountOutOfRange)?;
        Self::set_in(txn, account_id, currency, updated)?;
        Ok(updated)
    }

    pub fn debit_in(
        txn: &WriteTransaction,
        account_id: &str,
        currency: Currency,
        amount: Decimal,
    ) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount);
        }
        let current = Self::balance_in(txn, account_id, currency)?;
        if current < amount {
            return Err(LedgerError::InsufficientFunds {
                available: current,
                requested: amount,
            });
        }
        let updated = current - amount;
        Self::set_in(txn, account_id, currency, updated)?;
        Ok(updated)
    }

    fn set_in(
        txn: &WriteTransaction,
        account_id: &str,
        currency: Currency,
        amount: Decimal,
    ) -> StoreResult<()> {
        let key = balance_key(account_id, currency);
        let value = amount.normalize().to_string();
        txn.open_table(BALANCES)?
            .insert(key.as_str(), value.as_str())?;
        Ok(())
    }

    /// Drop every balance row for an account.
    pub fn remove_account_in(txn: &WriteTransaction, account_id: &str) -> StoreResult<()> {
        let mut table = txn.open_table(BALANCES)?;
        for currency in Currency::ALL {
            table.remove(balance_key(account_id, currency).as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_store;
    use std::sync::{Arc, Barrier};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn currency_parsing() {
        assert_eq!(Currency::parse("btc"), Some(Currency::Btc));
        assert_eq!(Currency::parse(" USDT "), Some(Currency::Usdt));
        assert_eq!(Currency::parse("doge"), None);
        assert_eq!(Currency::REFERENCE.code(), "INR");
    }

    #[test]
    fn credit_then_debit() {
        let (store, _dir) = temp_store();
        let ledger = LedgerStore::new(&store);

        assert_eq!(ledger.balance("acct", Currency::Btc).unwrap(), Decimal::ZERO);
        assert_eq!(ledger.credit("acct", Currency::Btc, dec("1.5")).unwrap(), dec("1.5"));
        assert_eq!(ledger.debit("acct", Currency::Btc, dec("0.25")).unwrap(), dec("1.25"));
        assert_eq!(ledger.balance("acct", Currency::Btc).unwrap(), dec("1.25"));

        let all = ledger.balances("acct").unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[&Currency::Eth], Decimal::ZERO);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let (store, _dir) = temp_store();
        let ledger = LedgerStore::new(&store);
        assert!(matches!(
            ledger.credit("acct", Currency::Inr, Decimal::ZERO),
            Err(LedgerError::NonPositiveAmount)
        ));
        assert!(matches!(
            ledger.debit("acct", Currency::Inr, dec("-1")),
            Err(LedgerError::NonPositiveAmount)
        ));
    }

    #[test]
    fn credit_past_decimal_max_is_rejected() {
        let (store, _dir) = temp_store();
        let ledger = LedgerStore::new(&store);
        ledger.credit("acct", Currency::Btc, Decimal::MAX).unwrap();

        assert!(matches!(
            ledger.credit("acct", Currency::Btc, Decimal::ONE),
            Err(LedgerError::AmountOutOfRange)
        ));
        assert_eq!(ledger.balance("acct", Currency::Btc).unwrap(), Decimal::MAX);
    }

    #[test]
    fn overdraft_fails_and_leaves_balance_unchanged() {
        let (store, _dir) = temp_store();
        let ledger = LedgerStore::new(&store);
        ledger.credit("acct", Currency::Usdt, dec("10")).unwrap();

        let err = ledger.debit("acct", Currency::Usdt, dec("10.01")).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(ledger.balance("acct", Currency::Usdt).unwrap(), dec("10"));
    }

    #[test]
    fn concurrent_debits_never_double_spend() {
        let (store, _dir) = temp_store();
        let store = Arc::new(store);
        LedgerStore::new(&store)
            .credit("acct", Currency::Eth, dec("100"))
            .unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [dec("60"), dec("70")]
            .into_iter()
            .map(|amount| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    LedgerStore::new(&store).debit("acct", Currency::Eth, amount)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let overdrafts = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::InsufficientFunds { .. })))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(overdrafts, 1);

        let remaining = LedgerStore::new(&store).balance("acct", Currency::Eth).unwrap();
        assert!(remaining == dec("40") || remaining == dec("30"));
    }

    #[test]
    fn many_concurrent_small_debits_stop_at_zero() {
        let (store, _dir) = temp_store();
        let store = Arc::new(store);
        LedgerStore::new(&store)
            .credit("acct", Currency::Inr, dec("10"))
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    LedgerStore::new(&store)
                        .debit("acct", Currency::Inr, dec("1"))
                        .is_ok()
                })
            })
            .collect();
        let ok = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(ok, 10);
        assert_eq!(
            LedgerStore::new(&store).balance("acct", Currency::Inr).unwrap(),
            Decimal::ZERO
        );
    }
}
