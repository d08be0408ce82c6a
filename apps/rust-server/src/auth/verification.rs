// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One-time codes and reset tokens.
//!
//! Secrets are handed to the user once and only an HMAC-SHA256 digest is
//! persisted. OTP digests are bound to the account and purpose, so the same
//! six digits never collide across accounts.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore};
use sha2::Sha256;

use crate::storage::VerificationPurpose;

type HmacSha256 = Hmac<Sha256>;

/// Email OTP lifetime.
pub const EMAIL_OTP_TTL_MINUTES: u32 = 10;
/// Phone OTP lifetime.
pub const PHONE_OTP_TTL_MINUTES: u32 = 5;
/// Password reset link lifetime.
pub const RESET_TOKEN_TTL_MINUTES: u32 = 30;

const RESET_TOKEN_BYTES: usize = 32;

/// Keyed digester for verification secrets.
#[derive(Clone)]
pub struct VerificationKey {
    mac: HmacSha256,
}

impl VerificationKey {
    pub fn new(secret: &[u8]) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret)?,
        })
    }

    fn tag(&self, parts: &[&str]) -> HmacSha256 {
        let mut mac = self.mac.clone();
        for part in parts {
            mac.update(part.as_bytes());
            mac.update(b"|");
        }
        mac
    }

    /// Digest of an OTP for one account and purpose.
    pub fn otp_digest(&self, purpose: VerificationPurpose, account_id: &str, code: &str) -> String {
        let tag = self.tag(&[purpose.as_str(), account_id, code]);
        Base64UrlUnpadded::encode_string(&tag.finalize().into_bytes())
    }

    /// Constant-time check of an OTP against a stored digest.
    pub fn verify_otp(
        &self,
        purpose: VerificationPurpose,
        account_id: &str,
        code: &str,
        stored_digest: &str,
    ) -> bool {
        let Ok(expected) = Base64UrlUnpadded::decode_vec(stored_digest) else {
            return false;
        };
        self.tag(&[purpose.as_str(), account_id, code])
            .verify_slice(&expected)
            .is_ok()
    }

    /// Digest of a reset token. Used directly as the lookup key.
    pub fn reset_digest(&self, token: &str) -> String {
        let tag = self.tag(&[VerificationPurpose::PasswordReset.as_str(), token]);
        Base64UrlUnpadded::encode_string(&tag.finalize().into_bytes())
    }
}

/// Six decimal digits.
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}

/// 32 random bytes, base64url without padding.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}
