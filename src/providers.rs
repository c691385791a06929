// ABOUTME: Provider configuration, directory seam, and authorization URL builder
// ABOUTME: Maps provider ids to OAuth endpoints and assembles the redirect URL with PKCE
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use url::Url;

use crate::errors::{EngineError, EngineResult};
use crate::oauth::pkce::PkceChallenge;

/// OAuth endpoints and client settings for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// OAuth client id registered with the provider
    pub client_id: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
    /// Scopes to request
    pub scopes: Vec<String>,
    /// Provider-specific extra query parameters for the authorization URL
    #[serde(default)]
    pub extra_params: Vec<(String, String)>,
}

/// Resolves provider ids to their OAuth configuration
pub trait ProviderDirectory: Send + Sync {
    /// Look up a provider's configuration
    fn resolve(&self, provider_id: &str) -> Option<ProviderConfig>;

    /// Known provider ids
    fn list_providers(&self) -> Vec<String>;
}

/// Directory backed by a fixed registration map
#[derive(Debug, Default)]
pub struct StaticProviderDirectory {
    providers: HashMap<String, ProviderConfig>,
}

impl StaticProviderDirectory {
    /// Create an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider configuration
    pub fn register(&mut self, provider_id: impl Into<String>, config: ProviderConfig) {
        let provider_id = provider_id.into();
        info!("Registering provider: {provider_id}");
        self.providers.insert(provider_id, config);
    }
}

impl ProviderDirectory for StaticProviderDirectory {
    fn resolve(&self, provider_id: &str) -> Option<ProviderConfig> {
        self.providers.get(provider_id).cloned()
    }

    fn list_providers(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

/// Build the provider authorization URL for one attempt, embedding the
/// encoded state token and the PKCE challenge.
///
/// # Errors
///
/// Returns an error if the configured authorization URL is malformed.
pub fn build_authorization_url(
    config: &ProviderConfig,
    state: &str,
    pkce: &PkceChallenge,
) -> EngineResult<String> {
    let mut url = Url::parse(&config.auth_url)
        .map_err(|e| EngineError::invalid_input(format!("invalid auth URL: {e}")))?;

    let mut query_pairs = url.query_pairs_mut();
    query_pairs
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &config.scopes.join(" "))
        .append_pair("state", state)
        .append_pair("code_challenge", &pkce.code_challenge)
        .append_pair("code_challenge_method", pkce.method.as_str());

    for (key, value) in &config.extra_params {
        query_pairs.append_pair(key, value);
    }

    drop(query_pairs);
    Ok(url.to_string())
}
