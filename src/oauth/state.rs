// ABOUTME: OAuth state envelope codec with TTL validation
// ABOUTME: base64url-encoded JSON carrying the PKCE verifier binding; fails closed on bad input
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::errors::EngineResult;

/// State envelope TTL: 10 minutes, matching the authorization code lifetime
pub const STATE_TTL_SECS: i64 = 600;

/// Nonce length in characters
const NONCE_LENGTH: usize = 32;

const NONCE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Why a state token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateDecodeError {
    /// Not base64url, not JSON, or missing required fields
    #[error("state token is malformed or missing required fields")]
    Malformed,
    /// Envelope aged out of the allowed window
    #[error("state token expired")]
    Expired,
}

/// The state parameter carried through the provider redirect.
///
/// Opaque to the provider but **not** integrity-protected: the token is
/// base64url(JSON) with no MAC. Tampering cannot forge a valid
/// `code_verifier`, so the PKCE binding still holds; a hardened deployment
/// would add a server-held-key MAC over the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthStateEnvelope {
    /// Integration this attempt belongs to
    pub integration_id: Uuid,
    /// Owning tenant
    pub tenant_id: Uuid,
    /// Random per-attempt nonce
    pub nonce: String,
    /// PKCE code verifier bound to this attempt
    pub code_verifier: String,
    /// Creation time; TTL is re-validated at decode
    pub timestamp: DateTime<Utc>,
    /// Initiating user, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl OAuthStateEnvelope {
    /// Create an envelope for a new attempt, stamping nonce and timestamp
    #[must_use]
    pub fn create(
        integration_id: Uuid,
        tenant_id: Uuid,
        code_verifier: impl Into<String>,
        user_id: Option<Uuid>,
    ) -> Self {
        Self {
            integration_id,
            tenant_id,
            nonce: generate_nonce(),
            code_verifier: code_verifier.into(),
            timestamp: Utc::now(),
            user_id,
        }
    }

    /// Encode as an opaque base64url token for the `state` query parameter
    pub fn encode(&self) -> EngineResult<String> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode and validate a state token against the default TTL
    pub fn decode(token: &str) -> Result<Self, StateDecodeError> {
        Self::decode_with_ttl(token, STATE_TTL_SECS, Utc::now())
    }

    /// Decode and validate against an explicit TTL and reference instant.
    ///
    /// Never panics on malformed input; anything that fails to parse or is
    /// missing a required field reports [`StateDecodeError::Malformed`]
    /// rather than resolving to partial data.
    pub fn decode_with_ttl(
        token: &str,
        ttl_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, StateDecodeError> {
        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|e| {
            warn!("state token is not valid base64url: {e}");
            StateDecodeError::Malformed
        })?;

        let envelope: Self = serde_json::from_slice(&bytes).map_err(|e| {
            warn!("state token failed to deserialize: {e}");
            StateDecodeError::Malformed
        })?;

        if envelope.nonce.is_empty() || envelope.code_verifier.is_empty() {
            warn!("state token carries empty nonce or verifier");
            return Err(StateDecodeError::Malformed);
        }

        let ttl = Duration::try_seconds(ttl_secs).unwrap_or(Duration::MAX);
        if now - envelope.timestamp > ttl {
            warn!(
                "state token for integration {} expired ({}s TTL)",
                envelope.integration_id, ttl_secs
            );
            return Err(StateDecodeError::Expired);
        }

        Ok(envelope)
    }
}

/// Random alphanumeric nonce for one attempt
fn generate_nonce() -> String {
    let mut rng = rand::thread_rng();
    (0..NONCE_LENGTH)
        .map(|_| NONCE_CHARS[rng.gen_range(0..NONCE_CHARS.len())] as char)
        .collect()
}
