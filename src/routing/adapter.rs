//! Provider-facing routing surface.
//!
//! Provider webhook code depends only on [`InboundRouter`]. The result it
//! receives carries an action and a dial target, never a reason, so an
//! override-driven connect looks exactly like any other connect.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{RouteInput, RoutingEngine};
use crate::error::{BoxError, RoutingError};
use crate::models::{Action, InboundCallRequest, RequestContext, Role, is_blank};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboundCallAction {
    Reject,
    Connect,
    Hangup,
}

/// What the provider adapter should do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundCallResult {
    pub workspace_id: String,
    /// Internal call id, when one was created.
    #[serde(default)]
    pub call_id: Option<String>,
    pub action: InboundCallAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_to: Option<String>,
}

/// Routes an inbound provider call.
#[async_trait]
pub trait InboundRouter: Send + Sync {
    async fn route_inbound_call(
        &self,
        request: &InboundCallRequest,
        context: &RequestContext,
    ) -> Result<InboundCallResult, RoutingError>;
}

/// Wallet context for the balance gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletContext {
    pub wallet_id: String,
    pub estimated_cost_minor: i64,
    pub currency: String,
}

/// Resolves routing inputs the provider payload does not carry directly.
///
/// Every hook is optional; the defaults resolve nothing.
#[async_trait]
pub trait RouteResolver: Send + Sync {
    /// Maps the call (typically the dialed number) to a campaign.
    async fn campaign_id(&self, _request: &InboundCallRequest) -> Result<Option<String>, BoxError> {
        Ok(None)
    }

    async fn wallet_context(
        &self,
        _request: &InboundCallRequest,
    ) -> Result<Option<WalletContext>, BoxError> {
        Ok(None)
    }

    /// Returns the raw role name of the acting user, if any.
    async fn actor_role(
        &self,
        _request: &InboundCallRequest,
        _context: &RequestContext,
    ) -> Result<Option<String>, BoxError> {
        Ok(None)
    }
}

/// Resolver that supplies no campaign, wallet or role.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl RouteResolver for NoResolver {}

/// Adapts [`RoutingEngine`] to [`InboundRouter`].
pub struct EngineAdapter {
    engine: Arc<RoutingEngine>,
    resolver: Arc<dyn RouteResolver>,
}

impl EngineAdapter {
    pub fn new(engine: Arc<RoutingEngine>, resolver: Arc<dyn RouteResolver>) -> Self {
        Self { engine, resolver }
    }

    async fn build_input(
        &self,
        request: &InboundCallRequest,
        context: &RequestContext,
    ) -> Result<RouteInput, RoutingError> {
        let campaign_id = self
            .resolver
            .campaign_id(request)
            .await
            .map_err(RoutingError::Resolver)?;
        let wallet = self
            .resolver
            .wallet_context(request)
            .await
            .map_err(RoutingError::Resolver)?;
        let actor_role = match self
            .resolver
            .actor_role(request, context)
            .await
            .map_err(RoutingError::Resolver)?
        {
            Some(name) if !is_blank(&name) => Some(name.parse::<Role>()?),
            _ => None,
        };

        let (wallet_id, estimated_cost_minor, currency) = match wallet {
            Some(w) => (Some(w.wallet_id), Some(w.estimated_cost_minor), Some(w.currency)),
            None => (None, None, None),
        };

        Ok(RouteInput {
            workspace_id: request.workspace_id.clone(),
            campaign_id,
            actor_role,
            wallet_id,
            estimated_cost_minor,
            currency,
            inbound: request.clone(),
            context: context.clone(),
        })
    }
}

#[async_trait]
impl InboundRouter for EngineAdapter {
    async fn route_inbound_call(
        &self,
        request: &InboundCallRequest,
        context: &RequestContext,
    ) -> Result<InboundCallResult, RoutingError> {
        let input = self.build_input(request, context).await?;
        let decision = self.engine.route(&input).await?;

        let (action, connect_to) = match decision.action {
            Action::Reject => (InboundCallAction::Reject, None),
            Action::Hangup => (InboundCallAction::Hangup, None),
            Action::Connect { connect_to } => (InboundCallAction::Connect, Some(connect_to)),
        };
        Ok(InboundCallResult {
            workspace_id: decision.workspace_id,
            call_id: None,
            action,
            connect_to,
        })
    }
}

/// Router that rejects every call. Useful before routing is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAllRouter;

#[async_trait]
impl InboundRouter for RejectAllRouter {
    async fn route_inbound_call(
        &self,
        request: &InboundCallRequest,
        _context: &RequestContext,
    ) -> Result<InboundCallResult, RoutingError> {
        if is_blank(&request.workspace_id) {
            return Err(RoutingError::MissingWorkspace);
        }
        Ok(InboundCallResult {
            workspace_id: request.workspace_id.clone(),
            call_id: None,
            action: InboundCallAction::Reject,
            connect_to: None,
        })
    }
}
