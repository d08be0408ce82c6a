// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External collaborators reached over HTTP.

pub mod notifier;
pub mod price_feed;

pub use notifier::{EmailSettings, HttpNotifier, Notifier, SmsSettings};
pub use price_feed::{CoinGeckoFeed, PriceFeed, PriceFeedError, DEFAULT_PRICE_FEED_URL};
