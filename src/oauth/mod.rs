// ABOUTME: OAuth 2.0 + PKCE authorization flow building blocks
// ABOUTME: PKCE generation, state envelope codec, and the per-attempt orchestrator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

pub mod flow;
pub mod pkce;
pub mod state;

pub use flow::{
    validate_callback, AuthorizationResponse, CallbackParams, FlowStep, InitiateRequest,
    OAuthFlowOrchestrator, OAuthFlowState,
};
pub use pkce::{PkceChallenge, PkceMethod};
pub use state::{OAuthStateEnvelope, StateDecodeError};
