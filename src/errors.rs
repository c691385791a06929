// ABOUTME: Unified error types for the integration lifecycle engine
// ABOUTME: Canonical OAuth 2.0 error taxonomy plus engine-level failure variants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Canonical OAuth 2.0 error codes (RFC 6749 Section 4.1.2.1 and 5.2) plus
/// the engine-local additions surfaced by state validation and PKCE checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    AccessDenied,
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,
    ServerError,
    TemporarilyUnavailable,
    /// Local addition: callback state token failed validation
    StateMismatch,
    /// Local addition: callback state token aged out of the allowed window
    CodeExpired,
    /// Local addition: verifier did not match the challenge bound to the code
    PkceVerificationFailed,
}

impl OAuthErrorCode {
    /// Wire representation of the error code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessDenied => "access_denied",
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::StateMismatch => "state_mismatch",
            Self::CodeExpired => "code_expired",
            Self::PkceVerificationFailed => "pkce_verification_failed",
        }
    }

    /// Parse a callback `error` query parameter into the canonical taxonomy.
    ///
    /// Unknown values map to `ServerError`; callers preserve the verbatim
    /// provider string in the error description so nothing is lost.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "access_denied" => Self::AccessDenied,
            "invalid_request" => Self::InvalidRequest,
            "invalid_client" => Self::InvalidClient,
            "invalid_grant" => Self::InvalidGrant,
            "unauthorized_client" => Self::UnauthorizedClient,
            "unsupported_grant_type" => Self::UnsupportedGrantType,
            "invalid_scope" => Self::InvalidScope,
            "temporarily_unavailable" => Self::TemporarilyUnavailable,
            "state_mismatch" => Self::StateMismatch,
            "code_expired" => Self::CodeExpired,
            "pkce_verification_failed" => Self::PkceVerificationFailed,
            _ => Self::ServerError,
        }
    }
}

impl fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed OAuth protocol error carried through the flow state machine and
/// surfaced verbatim to the caller for display.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {}", .description.as_deref().unwrap_or("no description"))]
pub struct OAuthFlowError {
    /// Canonical error code
    pub code: OAuthErrorCode,
    /// Human-readable description for display
    pub description: Option<String>,
}

impl OAuthFlowError {
    /// Create an error with the given code and description
    #[must_use]
    pub fn new(code: OAuthErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: Some(description.into()),
        }
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidRequest, description)
    }

    /// Create a `server_error` error
    #[must_use]
    pub fn server_error(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::ServerError, description)
    }

    /// Create a `state_mismatch` error
    #[must_use]
    pub fn state_mismatch(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::StateMismatch, description)
    }

    /// Create a `code_expired` error
    #[must_use]
    pub fn code_expired(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::CodeExpired, description)
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidGrant, description)
    }

    /// Build from a provider-reported callback `error` parameter, keeping the
    /// verbatim value in the description when it falls outside the taxonomy.
    #[must_use]
    pub fn from_callback(error: &str, description: Option<&str>) -> Self {
        let code = OAuthErrorCode::parse(error);
        let description = match description {
            Some(text) => Some(text.to_owned()),
            None if code == OAuthErrorCode::ServerError && error != "server_error" => {
                Some(format!("provider reported: {error}"))
            }
            None => None,
        };
        Self { code, description }
    }
}

/// Engine-level errors for store, collaborator, and validation failures
#[derive(Debug, Error)]
pub enum EngineError {
    /// OAuth protocol failure surfaced from the flow or a collaborator
    #[error("oauth protocol error: {0}")]
    OAuth(#[from] OAuthFlowError),

    /// Caller supplied invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No integration record exists for the given id
    #[error("integration not found: {0}")]
    NotFound(Uuid),

    /// Compare-and-replace lost the race; the record changed underneath
    #[error("conflicting update for integration {0}; reload and retry")]
    Conflict(Uuid),

    /// Integration store failure
    #[error("integration store error: {0}")]
    Store(String),

    /// External collaborator (refresh/health endpoint) failure
    #[error("external service error: {0}")]
    External(String),

    /// Operation observed its cancellation signal
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Flow state machine invariant violated by the caller
    #[error("flow state violation: {0}")]
    FlowState(String),

    /// Serialization failure while encoding an envelope
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Create an invalid-input error
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a store error
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Create an external-service error
    #[must_use]
    pub fn external(message: impl Into<String>) -> Self {
        Self::External(message.into())
    }
}

/// Convenience alias used throughout the engine
pub type EngineResult<T> = Result<T, EngineError>;
