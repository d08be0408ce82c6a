// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults and the loader that turns them into
//! an [`AppConfig`] at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding `exchange.redb` | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HS256 signing secret for bearer tokens | Required |
//! | `JWT_TTL_HOURS` | Bearer token lifetime | `168` |
//! | `VERIFICATION_SECRET` | HMAC key for stored OTP/reset digests | `JWT_SECRET` |
//! | `FRONTEND_URL` | Base URL for password reset links | `http://localhost:3000` |
//! | `BREVO_API_KEY` / `BREVO_SENDER_EMAIL` | Transactional email | Optional |
//! | `TWILIO_ACCOUNT_SID` / `TWILIO_AUTH_TOKEN` / `TWILIO_PHONE_NUMBER` | SMS | Optional |
//! | `PRICE_FEED_URL` | CoinGecko-compatible API base | CoinGecko public API |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | Serve HTTPS when both are set | Plain HTTP |
//! | `SEED_SUPERADMIN_EMAIL` / `SEED_SUPERADMIN_PASSWORD` | Bootstrap superadmin | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! Withdrawal pauses and emergency shutdowns are not configuration; they are
//! persisted in the database and toggled through the admin API.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::providers::{EmailSettings, SmsSettings, DEFAULT_PRICE_FEED_URL};

/// Directory holding the database file.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// HS256 secret for bearer tokens. Required.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_TTL_HOURS_ENV: &str = "JWT_TTL_HOURS";

/// HMAC key for OTP and reset-token digests. Falls back to `JWT_SECRET`.
pub const VERIFICATION_SECRET_ENV: &str = "VERIFICATION_SECRET";

pub const FRONTEND_URL_ENV: &str = "FRONTEND_URL";

pub const BREVO_API_KEY_ENV: &str = "BREVO_API_KEY";
pub const BREVO_SENDER_EMAIL_ENV: &str = "BREVO_SENDER_EMAIL";

pub const TWILIO_ACCOUNT_SID_ENV: &str = "TWILIO_ACCOUNT_SID";
pub const TWILIO_AUTH_TOKEN_ENV: &str = "TWILIO_AUTH_TOKEN";
pub const TWILIO_PHONE_NUMBER_ENV: &str = "TWILIO_PHONE_NUMBER";

pub const PRICE_FEED_URL_ENV: &str = "PRICE_FEED_URL";

pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

pub const SEED_SUPERADMIN_EMAIL_ENV: &str = "SEED_SUPERADMIN_EMAIL";
pub const SEED_SUPERADMIN_PASSWORD_ENV: &str = "SEED_SUPERADMIN_PASSWORD";

/// Logging output format (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_JWT_TTL_HOURS: i64 = 168;
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "exchange.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Logging output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// TLS certificate and key locations.
#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Bootstrap superadmin credentials.
#[derive(Debug, Clone)]
pub struct SeedSuperadmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_ttl: chrono::Duration,
    pub verification_secret: String,
    pub frontend_url: String,
    pub email: Option<EmailSettings>,
    pub sms: Option<SmsSettings>,
    pub price_feed_url: String,
    pub tls: Option<TlsPaths>,
    pub seed_superadmin: Option<SeedSuperadmin>,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: e.to_string(),
                })?;

        let jwt_secret = get(JWT_SECRET_ENV).ok_or(ConfigError::Missing(JWT_SECRET_ENV))?;
        let ttl_hours = match get(JWT_TTL_HOURS_ENV) {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|h| *h > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: JWT_TTL_HOURS_ENV,
                    reason: "expected a positive number of hours".to_string(),
                })?,
            None => DEFAULT_JWT_TTL_HOURS,
        };
        let verification_secret = get(VERIFICATION_SECRET_ENV).unwrap_or_else(|| jwt_secret.clone());

        let email = match (get(BREVO_API_KEY_ENV), get(BREVO_SENDER_EMAIL_ENV)) {
            (Some(api_key), Some(sender_email)) => Some(EmailSettings {
                api_key,
                sender_email,
            }),
            _ => None,
        };
        let sms = match (
            get(TWILIO_ACCOUNT_SID_ENV),
            get(TWILIO_AUTH_TOKEN_ENV),
            get(TWILIO_PHONE_NUMBER_ENV),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(SmsSettings {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    name: TLS_CERT_PATH_ENV,
                    reason: format!("{TLS_CERT_PATH_ENV} and {TLS_KEY_PATH_ENV} must be set together"),
                })
            }
        };

        let seed_superadmin = match (get(SEED_SUPERADMIN_EMAIL_ENV), get(SEED_SUPERADMIN_PASSWORD_ENV)) {
            (Some(email), Some(password)) => Some(SeedSuperadmin { email, password }),
            _ => None,
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            data_dir: get(DATA_DIR_ENV)
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                .into(),
            bind_addr,
            jwt_secret,
            jwt_ttl: chrono::Duration::hours(ttl_hours),
            verification_secret,
            frontend_url: http_url(FRONTEND_URL_ENV, get(FRONTEND_URL_ENV), DEFAULT_FRONTEND_URL)?,
            email,
            sms,
            price_feed_url: http_url(
                PRICE_FEED_URL_ENV,
                get(PRICE_FEED_URL_ENV),
                DEFAULT_PRICE_FEED_URL,
            )?,
            tls,
            seed_superadmin,
            log_format,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

/// Validate an http(s) base URL and drop any trailing slash.
fn http_url(name: &'static str, value: Option<String>, default: &str) -> Result<String, ConfigError> {
    let raw = value.unwrap_or_else(|| default.to_string());
    let parsed = url::Url::parse(&raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = load(&[(JWT_SECRET_ENV, "s3cret")]).unwrap();
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.verification_secret, "s3cret");
        assert_eq!(config.jwt_ttl, chrono::Duration::hours(168));
        assert_eq!(config.frontend_url, DEFAULT_FRONTEND_URL);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.email.is_none());
        assert!(config.sms.is_none());
        assert!(config.tls.is_none());
        assert!(config.database_path().ends_with(DATABASE_FILE));
    }

    #[test]
    fn jwt_secret_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing(JWT_SECRET_ENV))));
        assert!(matches!(
            load(&[(JWT_SECRET_ENV, "   ")]),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(load(&[(JWT_SECRET_ENV, "s"), (PORT_ENV, "http")]).is_err());
        assert!(load(&[(JWT_SECRET_ENV, "s"), (JWT_TTL_HOURS_ENV, "0")]).is_err());
        assert!(load(&[(JWT_SECRET_ENV, "s"), (TLS_CERT_PATH_ENV, "/cert.pem")]).is_err());
        assert!(load(&[(JWT_SECRET_ENV, "s"), (FRONTEND_URL_ENV, "not a url")]).is_err());
        assert!(load(&[(JWT_SECRET_ENV, "s"), (PRICE_FEED_URL_ENV, "ftp://prices")]).is_err());
    }

    #[test]
    fn base_urls_lose_trailing_slash() {
        let config = load(&[
            (JWT_SECRET_ENV, "s"),
            (FRONTEND_URL_ENV, "https://app.example.com/"),
        ])
        .unwrap();
        assert_eq!(config.frontend_url, "https://app.example.com");
    }

    #[test]
    fn optional_channels_need_every_credential() {
        let config = load(&[
            (JWT_SECRET_ENV, "s"),
            (BREVO_API_KEY_ENV, "key"),
            (BREVO_SENDER_EMAIL_ENV, "no-reply@example.com"),
            (TWILIO_ACCOUNT_SID_ENV, "AC123"),
            (TWILIO_AUTH_TOKEN_ENV, "token"),
            (LOG_FORMAT_ENV, "json"),
        ])
        .unwrap();
        assert!(config.email.is_some());
        assert!(config.sms.is_none());
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
