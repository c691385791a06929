// ABOUTME: Per-attempt OAuth authorization flow state machine
// ABOUTME: Drives initiation, callback validation, token exchange, and compensation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult, OAuthFlowError};
use crate::external::{TokenExchange, TokenExchangeRequest};
use crate::models::{Integration, IntegrationStatus};
use crate::oauth::pkce::PkceChallenge;
use crate::oauth::state::{OAuthStateEnvelope, StateDecodeError};
use crate::providers::{build_authorization_url, ProviderConfig, ProviderDirectory};
use crate::store::IntegrationStore;

/// Step of one authorization attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    Initialization,
    Authorization,
    Callback,
    TokenExchange,
    Completion,
    Error,
}

impl FlowStep {
    /// Completion and Error end the attempt; everything else can still move
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completion | Self::Error)
    }

    /// Nominal progress percentage for this step
    #[must_use]
    pub const fn progress(self) -> u8 {
        match self {
            Self::Initialization => 0,
            Self::Authorization => 25,
            Self::Callback => 50,
            Self::TokenExchange => 75,
            Self::Completion => 100,
            // Error keeps the progress reached before failing; callers read
            // it from OAuthFlowState, not from here
            Self::Error => 0,
        }
    }
}

/// Readable snapshot of one authorization attempt.
///
/// Owned exclusively by the caller that started the attempt; never shared
/// across concurrent attempts for different integrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuthFlowState {
    /// Current step
    pub step: FlowStep,
    /// Placeholder integration created at initiation
    pub integration_id: Option<Uuid>,
    /// Terminal error, when the attempt failed
    pub error: Option<OAuthFlowError>,
    /// Progress percentage (0-100)
    pub progress: u8,
}

impl Default for OAuthFlowState {
    fn default() -> Self {
        Self {
            step: FlowStep::Initialization,
            integration_id: None,
            error: None,
            progress: 0,
        }
    }
}

/// Query parameters delivered by the provider redirect
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// Encoded state envelope
    pub state: Option<String>,
    /// Provider-reported error code
    pub error: Option<String>,
    /// Provider-reported error description
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parse from a raw redirect query string
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// Validate callback parameters without touching any collaborator.
///
/// A provider-reported `error` wins over everything else; otherwise both
/// `code` and `state` are required. Returns the pair on success.
pub fn validate_callback(params: &CallbackParams) -> Result<(String, String), OAuthFlowError> {
    if let Some(error) = &params.error {
        return Err(OAuthFlowError::from_callback(
            error,
            params.error_description.as_deref(),
        ));
    }

    match (&params.code, &params.state) {
        (Some(code), Some(state)) => Ok((code.clone(), state.clone())),
        (None, _) => Err(OAuthFlowError::invalid_request(
            "callback is missing the code parameter",
        )),
        (_, None) => Err(OAuthFlowError::invalid_request(
            "callback is missing the state parameter",
        )),
    }
}

/// Request to start an authorization attempt
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    /// Provider to connect
    pub provider_id: String,
    /// Owning tenant
    pub tenant_id: Uuid,
    /// Initiating user, when known
    pub user_id: Option<Uuid>,
    /// Metadata stored on the placeholder integration
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Result of a successful initiation
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationResponse {
    /// URL the end user must be redirected to
    pub authorization_url: String,
    /// Placeholder integration created for this attempt
    pub integration_id: Uuid,
    /// Encoded state token embedded in the URL
    pub state: String,
}

/// Drives one authorization attempt end to end:
/// `initialization -> authorization -> callback -> token_exchange ->
/// completion`, with `error` reachable from any non-terminal step.
///
/// One orchestrator instance drives at most one attempt. Starting another
/// attempt requires [`reset`](Self::reset) (or a fresh instance); two
/// overlapping attempts on the same instance are rejected.
pub struct OAuthFlowOrchestrator {
    store: Arc<dyn IntegrationStore>,
    directory: Arc<dyn ProviderDirectory>,
    exchanger: Arc<dyn TokenExchange>,
    config: EngineConfig,
    state: OAuthFlowState,
    provider: Option<ProviderConfig>,
}

impl OAuthFlowOrchestrator {
    /// Create an orchestrator in the initialization step
    #[must_use]
    pub fn new(
        store: Arc<dyn IntegrationStore>,
        directory: Arc<dyn ProviderDirectory>,
        exchanger: Arc<dyn TokenExchange>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            directory,
            exchanger,
            config,
            state: OAuthFlowState::default(),
            provider: None,
        }
    }

    /// Current flow state, readable at any time
    #[must_use]
    pub const fn state(&self) -> &OAuthFlowState {
        &self.state
    }

    /// Start an authorization attempt: resolve the provider, create the
    /// placeholder integration, generate PKCE material, and build the
    /// authorization URL with the encoded state envelope.
    ///
    /// On any collaborator failure the flow transitions to `error` with a
    /// `server_error` cause and no URL is returned.
    pub async fn initiate(&mut self, request: InitiateRequest) -> EngineResult<AuthorizationResponse> {
        if self.state.step != FlowStep::Initialization {
            return Err(EngineError::FlowState(format!(
                "attempt already in step {:?}; call reset() before starting another",
                self.state.step
            )));
        }

        let Some(provider) = self.directory.resolve(&request.provider_id) else {
            let error =
                OAuthFlowError::server_error(format!("unknown provider: {}", request.provider_id));
            self.fail(error.clone());
            return Err(error.into());
        };

        let placeholder =
            Integration::new(request.tenant_id, &request.provider_id, request.metadata);
        let integration = match self.store.create(placeholder).await {
            Ok(integration) => integration,
            Err(e) => {
                let error =
                    OAuthFlowError::server_error(format!("failed to create integration: {e}"));
                self.fail(error);
                return Err(e);
            }
        };
        self.state.integration_id = Some(integration.id);

        let pkce = PkceChallenge::with_length(self.config.verifier_length);
        let envelope = OAuthStateEnvelope::create(
            integration.id,
            request.tenant_id,
            pkce.code_verifier.clone(),
            request.user_id,
        );

        let state_token = match envelope.encode() {
            Ok(token) => token,
            Err(e) => {
                self.fail(OAuthFlowError::server_error("failed to encode state envelope"));
                return Err(e);
            }
        };

        let authorization_url = match build_authorization_url(&provider, &state_token, &pkce) {
            Ok(url) => url,
            Err(e) => {
                self.fail(OAuthFlowError::server_error(format!(
                    "failed to build authorization URL: {e}"
                )));
                return Err(e);
            }
        };

        self.provider = Some(provider);
        self.advance(FlowStep::Authorization);
        info!(
            "authorization URL issued for integration {} provider {}",
            integration.id, request.provider_id
        );

        Ok(AuthorizationResponse {
            authorization_url,
            integration_id: integration.id,
            state: state_token,
        })
    }

    /// Handle the provider redirect: validate parameters, decode the state
    /// envelope, and exchange the code for tokens.
    ///
    /// A provider-reported `error` parameter, missing `code`/`state`, or an
    /// invalid/expired state envelope each transition to `error` without any
    /// collaborator call being made.
    pub async fn handle_callback(&mut self, params: &CallbackParams) -> EngineResult<Integration> {
        if self.state.step != FlowStep::Authorization {
            return Err(EngineError::FlowState(format!(
                "callback received in step {:?}; expected authorization",
                self.state.step
            )));
        }
        self.advance(FlowStep::Callback);

        let (code, state_token) = match validate_callback(params) {
            Ok(pair) => pair,
            Err(error) => {
                self.fail(error.clone());
                return Err(error.into());
            }
        };

        let ttl = i64::try_from(self.config.state_ttl_secs).unwrap_or(i64::MAX);
        let envelope =
            match OAuthStateEnvelope::decode_with_ttl(&state_token, ttl, chrono::Utc::now()) {
                Ok(envelope) => envelope,
                Err(StateDecodeError::Malformed) => {
                    let error =
                        OAuthFlowError::state_mismatch("state token failed validation");
                    self.fail(error.clone());
                    return Err(error.into());
                }
                Err(StateDecodeError::Expired) => {
                    let error = OAuthFlowError::code_expired(
                        "state token aged past the authorization window",
                    );
                    self.fail(error.clone());
                    return Err(error.into());
                }
            };

        // The envelope must belong to the attempt this instance started
        if self.state.integration_id != Some(envelope.integration_id) {
            let error =
                OAuthFlowError::state_mismatch("state token belongs to a different attempt");
            self.fail(error.clone());
            return Err(error.into());
        }

        let redirect_uri = self
            .provider
            .as_ref()
            .map(|p| p.redirect_uri.clone())
            .unwrap_or_default();

        self.advance(FlowStep::TokenExchange);
        let grant = match self
            .exchanger
            .exchange_code(
                envelope.integration_id,
                TokenExchangeRequest {
                    code,
                    code_verifier: envelope.code_verifier,
                    redirect_uri,
                },
            )
            .await
        {
            Ok(grant) => grant,
            Err(error) => {
                self.fail(error.clone());
                return Err(error.into());
            }
        };

        let current = self
            .store
            .get(envelope.integration_id)
            .await?
            .ok_or(EngineError::NotFound(envelope.integration_id))?;

        let mut updated = current.clone();
        updated.status = IntegrationStatus::Active;
        updated.access_token = Some(grant.access_token);
        updated.token_expires_at = grant.expires_at;
        updated.scopes = grant.scopes;

        let saved = self
            .store
            .compare_and_replace(current.updated_at, updated)
            .await?;

        self.advance(FlowStep::Completion);
        info!(
            "OAuth flow completed for integration {} tenant {}",
            saved.id, saved.tenant_id
        );
        Ok(saved)
    }

    /// Abandon a non-terminal attempt: best-effort delete of the placeholder
    /// integration, then return to the initialization step.
    pub async fn cancel(&mut self) {
        if !self.state.step.is_terminal() {
            if let Some(id) = self.state.integration_id {
                if let Err(e) = self.store.delete(id).await {
                    warn!("failed to delete placeholder integration {id} on cancel: {e}");
                } else {
                    info!("deleted placeholder integration {id} on cancel");
                }
            }
        }
        self.reset();
    }

    /// Discard all in-memory flow state unconditionally. Idempotent.
    pub fn reset(&mut self) {
        self.state = OAuthFlowState::default();
        self.provider = None;
    }

    fn advance(&mut self, step: FlowStep) {
        self.state.step = step;
        self.state.progress = step.progress();
    }

    fn fail(&mut self, error: OAuthFlowError) {
        warn!("OAuth flow failed at step {:?}: {error}", self.state.step);
        self.state.error = Some(error);
        self.state.step = FlowStep::Error;
    }
}
