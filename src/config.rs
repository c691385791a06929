// ABOUTME: Environment-driven engine configuration with typed defaults
// ABOUTME: TTLs, thresholds, and concurrency bounds for the lifecycle engine
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use std::env;
use std::str::FromStr;
use tracing::warn;

/// Default state envelope TTL: 10 minutes, matching the authorization code
/// lifetime recommended by RFC 6749
pub const DEFAULT_STATE_TTL_SECS: u64 = 600;
/// Default token expiry warning threshold: 5 minutes
pub const DEFAULT_TOKEN_WARNING_SECS: u64 = 300;
/// Default PKCE verifier length (RFC 7636 allows 43-128)
pub const DEFAULT_VERIFIER_LENGTH: usize = 128;
/// Default bulk window size
pub const DEFAULT_BULK_WINDOW_SIZE: usize = 3;
/// Default bulk selection cap
pub const DEFAULT_MAX_BULK_SELECTION: usize = 50;
/// Default health monitor polling interval
pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 30_000;

/// Tunable parameters for the lifecycle engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// OAuth state envelope time-to-live in seconds
    pub state_ttl_secs: u64,
    /// Token expiry warning threshold in seconds
    pub token_warning_secs: u64,
    /// PKCE code verifier length (clamped to 43-128)
    pub verifier_length: usize,
    /// Items dispatched concurrently per bulk window
    pub bulk_window_size: usize,
    /// Maximum ids accepted by one bulk selection
    pub max_bulk_selection: usize,
    /// Health monitor polling interval in milliseconds
    pub monitor_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_ttl_secs: DEFAULT_STATE_TTL_SECS,
            token_warning_secs: DEFAULT_TOKEN_WARNING_SECS,
            verifier_length: DEFAULT_VERIFIER_LENGTH,
            bulk_window_size: DEFAULT_BULK_WINDOW_SIZE,
            max_bulk_selection: DEFAULT_MAX_BULK_SELECTION,
            monitor_interval_ms: DEFAULT_MONITOR_INTERVAL_MS,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults (with a warning) on missing or unparseable values.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self {
            state_ttl_secs: env_parse("STRATUS_STATE_TTL_SECS", DEFAULT_STATE_TTL_SECS),
            token_warning_secs: env_parse("STRATUS_TOKEN_WARNING_SECS", DEFAULT_TOKEN_WARNING_SECS),
            verifier_length: env_parse("STRATUS_VERIFIER_LENGTH", DEFAULT_VERIFIER_LENGTH),
            bulk_window_size: env_parse("STRATUS_BULK_WINDOW_SIZE", DEFAULT_BULK_WINDOW_SIZE),
            max_bulk_selection: env_parse("STRATUS_MAX_BULK_SELECTION", DEFAULT_MAX_BULK_SELECTION),
            monitor_interval_ms: env_parse("STRATUS_MONITOR_INTERVAL_MS", DEFAULT_MONITOR_INTERVAL_MS),
        };
        config.clamp_verifier_length();
        config
    }

    /// Clamp the verifier length into the RFC 7636 range
    fn clamp_verifier_length(&mut self) {
        let clamped = self.verifier_length.clamp(
            crate::oauth::pkce::MIN_VERIFIER_LENGTH,
            crate::oauth::pkce::MAX_VERIFIER_LENGTH,
        );
        if clamped != self.verifier_length {
            warn!(
                "verifier length {} outside RFC 7636 range, clamping to {}",
                self.verifier_length, clamped
            );
            self.verifier_length = clamped;
        }
    }
}

/// Parse an environment variable, warning and falling back on failure
fn env_parse<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("invalid value for {key}: {raw:?}, using default {default}");
            default
        }),
        Err(_) => default,
    }
}
