// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{TokenIssuer, VerificationKey};
use crate::providers::{Notifier, PriceFeed};
use crate::storage::Store;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub tokens: Arc<TokenIssuer>,
    pub verifier: Arc<VerificationKey>,
    pub notifier: Arc<dyn Notifier>,
    pub price_feed: Arc<dyn PriceFeed>,
    /// Base URL of the web client, used in emailed links.
    pub frontend_url: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Store,
        tokens: TokenIssuer,
        verifier: VerificationKey,
        notifier: Arc<dyn Notifier>,
        price_feed: Arc<dyn PriceFeed>,
        frontend_url: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            store: Arc::new(store),
            tokens: Arc::new(tokens),
            verifier: Arc::new(verifier),
            notifier,
            price_feed,
            frontend_url: frontend_url.into(),
        }
    }
}

/// State over a throw-away database with the given notifier and a fixed
/// price feed quoting BTC at 5,000,000 and ETH at 250,000.
#[cfg(test)]
pub(crate) fn test_state_with(notifier: Arc<dyn Notifier>) -> (AppState, tempfile::TempDir) {
    use crate::providers::price_feed::FixedPriceFeed;
    use crate::storage::Currency;
    use rust_decimal::Decimal;

    let (store, dir) = crate::storage::database::temp_store();
    let price_feed = FixedPriceFeed {
        quotes: std::collections::HashMap::from([
            (Currency::Btc, Decimal::from(5_000_000)),
            (Currency::Eth, Decimal::from(250_000)),
        ]),
    };
    let state = AppState::new(
        store,
        TokenIssuer::new("test-jwt-secret", chrono::Duration::hours(1)),
        VerificationKey::new(b"test-verification-secret").unwrap(),
        notifier,
        Arc::new(price_feed),
        crate::config::DEFAULT_FRONTEND_URL,
    );
    (state, dir)
}

#[cfg(test)]
pub(crate) fn test_state() -> (AppState, tempfile::TempDir) {
    test_state_with(Arc::new(
        crate::providers::notifier::RecordingNotifier::delivering(),
    ))
}
