// ABOUTME: Pure token health evaluation from an integration snapshot
// ABOUTME: Derives status, expiry warnings, and refresh need; never stores state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use chrono::{DateTime, Duration, Utc};

use crate::config::DEFAULT_TOKEN_WARNING_SECS;
use crate::models::{Integration, IntegrationStatus, TokenHealth, TokenHealthStatus};

/// Evaluate token health against the current clock and the default
/// 5-minute warning threshold.
#[must_use]
pub fn evaluate(integration: &Integration) -> TokenHealth {
    evaluate_at(integration, Utc::now(), DEFAULT_TOKEN_WARNING_SECS)
}

/// Evaluate token health against an explicit reference instant and warning
/// threshold. Pure: same inputs, same output.
///
/// Status precedence, highest first: revoked, error, expired, active (with
/// `expiring_soon` as a refinement of active when the token is inside the
/// warning window), unknown.
#[must_use]
pub fn evaluate_at(
    integration: &Integration,
    now: DateTime<Utc>,
    warning_secs: u64,
) -> TokenHealth {
    let warning = i64::try_from(warning_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX);

    let is_expired = integration
        .token_expires_at
        .is_some_and(|expires_at| now >= expires_at);

    let is_expiring_soon = integration.token_expires_at.is_some_and(|expires_at| {
        let remaining = expires_at - now;
        remaining > Duration::zero() && remaining <= warning
    });

    let status = match integration.status {
        IntegrationStatus::Revoked => TokenHealthStatus::Revoked,
        IntegrationStatus::Error => TokenHealthStatus::Error,
        _ if is_expired => TokenHealthStatus::Expired,
        _ if integration.has_access_token() => {
            if is_expiring_soon {
                TokenHealthStatus::ExpiringSoon
            } else {
                TokenHealthStatus::Active
            }
        }
        _ => TokenHealthStatus::Unknown,
    };

    TokenHealth {
        status,
        expires_at: integration.token_expires_at,
        is_expiring_soon,
        needs_refresh: is_expired || is_expiring_soon,
        last_refreshed: Some(integration.updated_at),
    }
}

/// Whether the integration's token should be refreshed now
#[must_use]
pub fn needs_refresh(integration: &Integration) -> bool {
    evaluate(integration).needs_refresh
}
