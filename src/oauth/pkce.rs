// ABOUTME: PKCE verifier and challenge generation per RFC 7636
// ABOUTME: Unreserved-charset verifier with S256 base64url challenge, never persisted
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// RFC 7636 unreserved character set for code verifiers
const VERIFIER_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Minimum verifier length allowed by RFC 7636
pub const MIN_VERIFIER_LENGTH: usize = 43;
/// Maximum verifier length allowed by RFC 7636
pub const MAX_VERIFIER_LENGTH: usize = 128;

/// PKCE code challenge method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkceMethod {
    /// SHA-256 transformation (RFC 7636 required method)
    S256,
}

impl PkceMethod {
    /// Returns the string representation for OAuth requests
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S256 => "S256",
        }
    }
}

impl Display for PkceMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// One attempt's PKCE material: generated at initiation, consumed at token
/// exchange, then discarded. Never persisted.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// The randomly generated code verifier, kept secret until exchange
    pub code_verifier: String,
    /// base64url(SHA-256(verifier)), sent in the authorization request
    pub code_challenge: String,
    /// Challenge method (always S256)
    pub method: PkceMethod,
}

impl PkceChallenge {
    /// Generate a challenge pair with the default 128-character verifier.
    ///
    /// The only failure mode is CSPRNG unavailability, which panics inside
    /// the rand crate and is treated as fatal.
    #[must_use]
    pub fn generate() -> Self {
        Self::with_length(MAX_VERIFIER_LENGTH)
    }

    /// Generate a challenge pair with a verifier of the given length,
    /// clamped into the RFC 7636 range.
    #[must_use]
    pub fn with_length(length: usize) -> Self {
        let length = length.clamp(MIN_VERIFIER_LENGTH, MAX_VERIFIER_LENGTH);
        let mut rng = rand::thread_rng();
        let code_verifier: String = (0..length)
            .map(|_| VERIFIER_CHARS[rng.gen_range(0..VERIFIER_CHARS.len())] as char)
            .collect();

        let code_challenge = challenge_for(&code_verifier);

        Self {
            code_verifier,
            code_challenge,
            method: PkceMethod::S256,
        }
    }
}

/// Compute the S256 challenge for a verifier: base64url, no padding
#[must_use]
pub fn challenge_for(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
