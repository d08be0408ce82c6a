// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Reference-currency price feed (CoinGecko `simple/price`).
//!
//! Quotes are cached per currency in an LRU with a short TTL so a burst of
//! foreclosures does not hammer the upstream API.

use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::storage::Currency;

pub const DEFAULT_PRICE_FEED_URL: &str = "https://api.coingecko.com/api/v3";

/// Quote lifetime in the cache.
const QUOTE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum PriceFeedError {
    #[error("price request failed: {0}")]
    Request(String),

    #[error("price response was invalid: {0}")]
    InvalidResponse(String),

    #[error("no price quoted for {0}")]
    Missing(Currency),
}

/// Source of reference-currency prices.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Price of one unit of `currency` in the reference currency.
    async fn price_of(&self, currency: Currency) -> Result<Decimal, PriceFeedError>;
}

fn coingecko_id(currency: Currency) -> Option<&'static str> {
    match currency {
        Currency::Btc => Some("bitcoin"),
        Currency::Eth => Some("ethereum"),
        Currency::Usdt => Some("tether"),
        Currency::Inr => None,
    }
}

struct CachedQuote {
    price: Decimal,
    inserted_at: Instant,
}

/// CoinGecko-compatible price feed.
pub struct CoinGeckoFeed {
    base_url: String,
    http: Client,
    cache: Mutex<LruCache<Currency, CachedQuote>>,
}

impl CoinGeckoFeed {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PriceFeedError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PriceFeedError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            cache: Mutex::new(LruCache::new(NonZeroUsize::MIN.saturating_add(7))),
        })
    }

    fn cached(&self, currency: Currency) -> Option<Decimal> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(&currency) {
            if entry.inserted_at.elapsed() < QUOTE_TTL {
                return Some(entry.price);
            }
            cache.pop(&currency);
        }
        None
    }

    fn remember(&self, currency: Currency, price: Decimal) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                currency,
                CachedQuote {
                    price,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    async fn fetch(&self, currency: Currency, coin_id: &str) -> Result<Decimal, PriceFeedError> {
        let url = format!("{}/simple/price", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("ids", coin_id), ("vs_currencies", "inr")])
            .send()
            .await
            .map_err(|e| PriceFeedError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PriceFeedError::Request(format!(
                "upstream returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PriceFeedError::InvalidResponse(e.to_string()))?;
        parse_quote(&body, coin_id).ok_or(PriceFeedError::Missing(currency))
    }
}

/// Extract `body[coin_id]["inr"]` as an exact decimal.
fn parse_quote(body: &Value, coin_id: &str) -> Option<Decimal> {
    let number = body.get(coin_id)?.get("inr")?.as_number()?;
    Decimal::from_str(&number.to_string())
        .or_else(|_| Decimal::from_scientific(&number.to_string()))
        .ok()
        .filter(|price| *price > Decimal::ZERO)
}

#[async_trait]
impl PriceFeed for CoinGeckoFeed {
    async fn price_of(&self, currency: Currency) -> Result<Decimal, PriceFeedError> {
        let Some(coin_id) = coingecko_id(currency) else {
            return Ok(Decimal::ONE);
        };
        if let Some(price) = self.cached(currency) {
            return Ok(price);
        }

        let price = self.fetch(currency, coin_id).await.inspect_err(|e| {
            tracing::warn!(currency = %currency, error = %e, "Price lookup failed");
        })?;
        self.remember(currency, price);
        Ok(price)
    }
}

/// Fixed quotes for tests.
#[cfg(test)]
pub(crate) struct FixedPriceFeed {
    pub quotes: std::collections::HashMap<Currency, Decimal>,
}

#[cfg(test)]
#[async_trait]
impl PriceFeed for FixedPriceFeed {
    async fn price_of(&self, currency: Currency) -> Result<Decimal, PriceFeedError> {
        if currency == Currency::REFERENCE {
            return Ok(Decimal::ONE);
        }
        self.quotes
            .get(&currency)
            .copied()
            .ok_or(PriceFeedError::Missing(currency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_coingecko_shape() {
        let body = serde_json::json!({"bitcoin": {"inr": 5234567.25}});
        assert_eq!(parse_quote(&body, "bitcoin"), Decimal::from_str("5234567.25").ok());
        assert_eq!(parse_quote(&body, "ethereum"), None);

        let zero = serde_json::json!({"tether": {"inr": 0}});
        assert_eq!(parse_quote(&zero, "tether"), None);
    }

    #[tokio::test]
    async fn reference_currency_is_unity_without_network() {
        let feed = CoinGeckoFeed::new("http://127.0.0.1:9").unwrap();
        assert_eq!(feed.price_of(Currency::Inr).await.unwrap(), Decimal::ONE);
    }

    #[tokio::test]
    async fn cached_quotes_skip_the_network() {
        let feed = CoinGeckoFeed::new("http://127.0.0.1:9").unwrap();
        feed.remember(Currency::Btc, Decimal::from(100));
        assert_eq!(feed.price_of(Currency::Btc).await.unwrap(), Decimal::from(100));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_an_error() {
        let feed = CoinGeckoFeed::new("http://127.0.0.1:9").unwrap();
        assert!(feed.price_of(Currency::Eth).await.is_err());
    }
}
