// ABOUTME: Collaborator traits for token exchange, refresh, and health endpoints
// ABOUTME: Transport lives outside the engine; these seams carry only typed requests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{EngineResult, OAuthFlowError};
use crate::models::HealthSnapshot;

/// Parameters for the authorization-code exchange, including the PKCE
/// verifier bound to this attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenExchangeRequest {
    /// Authorization code from the callback
    pub code: String,
    /// PKCE code verifier generated at initiation
    pub code_verifier: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
}

/// Token material returned by the exchange or refresh endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    /// Opaque provider access token
    pub access_token: String,
    /// Expiry, when the provider reports one
    pub expires_at: Option<DateTime<Utc>>,
    /// Scopes granted
    pub scopes: Vec<String>,
}

/// Authorization-code exchange endpoint
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange a callback code (plus PKCE verifier) for token material.
    /// Failures come back as typed OAuth errors for verbatim display.
    async fn exchange_code(
        &self,
        integration_id: Uuid,
        request: TokenExchangeRequest,
    ) -> Result<TokenGrant, OAuthFlowError>;
}

/// Token refresh endpoint
#[async_trait]
pub trait TokenRefresh: Send + Sync {
    /// Obtain fresh token material for an integration
    async fn refresh(&self, integration_id: Uuid) -> EngineResult<TokenGrant>;
}

/// Integration health endpoint
#[async_trait]
pub trait HealthEndpoint: Send + Sync {
    /// Fetch the provider-side health snapshot for an integration
    async fn fetch_health(&self, integration_id: Uuid) -> EngineResult<HealthSnapshot>;
}
