//! Routing decision engine.
//!
//! [`RoutingEngine::route`] walks an ordered chain and stops at the first
//! stage that produces a decision:
//!
//! 1. Silent admin override ([`overrides::AdminOverrideEngine`])
//! 2. Privileged-role bypass
//! 3. Wallet balance gate
//! 4. Campaign id requirement
//! 5. Campaign evaluation
//! 6. Weighted destination selection
//!
//! Policy outcomes are ordinary [`Decision`] values. Errors are reserved
//! for missing identifiers, unwired collaborators and upstream failures.

pub mod adapter;
pub mod overrides;
pub mod selection;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{BoxError, RoutingError, WalletError};
use crate::models::{
    Balance, CampaignEvaluation, Decision, InboundCallRequest, Reason, RequestContext, Role,
    is_blank,
};
use crate::random::RandomSource;

pub use adapter::{
    EngineAdapter, InboundCallAction, InboundCallResult, InboundRouter, NoResolver,
    RejectAllRouter, RouteResolver, WalletContext,
};
pub use overrides::{AdminOverrideEngine, MemoryOverrideStore, OverrideStore};
pub use selection::pick_weighted;

/// Read access to wallet balances, as needed by the balance gate.
#[async_trait]
pub trait BalanceReader: Send + Sync {
    async fn get_balance(&self, workspace_id: &str, wallet_id: &str)
    -> Result<Balance, WalletError>;
}

/// Evaluates campaign rules for an inbound call.
#[async_trait]
pub trait CampaignEvaluator: Send + Sync {
    async fn evaluate_inbound(
        &self,
        workspace_id: &str,
        campaign_id: &str,
        request: &InboundCallRequest,
    ) -> Result<CampaignEvaluation, BoxError>;
}

/// Everything the engine needs to route one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteInput {
    pub workspace_id: String,
    pub campaign_id: Option<String>,
    /// Resolved acting role, if the call is made on someone's behalf.
    pub actor_role: Option<Role>,
    pub wallet_id: Option<String>,
    /// Estimated call cost in minor units; the balance gate only runs when
    /// this is positive.
    pub estimated_cost_minor: Option<i64>,
    pub currency: Option<String>,
    pub inbound: InboundCallRequest,
    pub context: RequestContext,
}

/// Stateless routing orchestrator.
pub struct RoutingEngine {
    overrides: Option<AdminOverrideEngine>,
    wallet: Option<Arc<dyn BalanceReader>>,
    campaigns: Option<Arc<dyn CampaignEvaluator>>,
    rng: Arc<dyn RandomSource>,
}

impl RoutingEngine {
    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        Self {
            overrides: None,
            wallet: None,
            campaigns: None,
            rng,
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: AdminOverrideEngine) -> Self {
        self.overrides = Some(overrides);
        self
    }

    #[must_use]
    pub fn with_wallet(mut self, wallet: Arc<dyn BalanceReader>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    #[must_use]
    pub fn with_campaigns(mut self, campaigns: Arc<dyn CampaignEvaluator>) -> Self {
        self.campaigns = Some(campaigns);
        self
    }

    /// Produces the routing decision for one inbound call.
    pub async fn route(&self, input: &RouteInput) -> Result<Decision, RoutingError> {
        let decision = self.decide(input).await?;
        debug!(
            workspace_id = %decision.workspace_id,
            action = decision.action.as_str(),
            "Routed inbound call"
        );
        Ok(decision)
    }

    async fn decide(&self, input: &RouteInput) -> Result<Decision, RoutingError> {
        if is_blank(&input.workspace_id) {
            return Err(RoutingError::MissingWorkspace);
        }
        let workspace_id = input.workspace_id.as_str();
        let campaign_id = input.campaign_id.as_deref().filter(|c| !is_blank(c));
        let owned_campaign = || campaign_id.map(str::to_string);

        // 1. Override
        if let Some(overrides) = &self.overrides
            && let Some(decision) = overrides
                .decide(workspace_id, campaign_id, &input.inbound, &input.context)
                .await?
        {
            return Ok(decision);
        }

        // 2. Privileged bypass
        if input
            .actor_role
            .is_some_and(|role| role.capabilities().privileged_bypass)
        {
            return Ok(self.privileged(workspace_id, campaign_id, &input.inbound).await);
        }

        // 3. Balance gate
        if let Some(cost) = input.estimated_cost_minor.filter(|c| *c > 0)
            && let Some(reason) = self.balance_gate(input, cost).await?
        {
            return Ok(Decision::reject(workspace_id, owned_campaign(), reason));
        }

        // 4. Campaign requirement
        let Some(campaign) = campaign_id else {
            return Ok(Decision::reject(workspace_id, None, Reason::CampaignIdRequired));
        };
        let campaigns = self
            .campaigns
            .as_ref()
            .ok_or(RoutingError::NotConfigured("campaign evaluator"))?;

        // 5. Campaign rules
        let evaluation = campaigns
            .evaluate_inbound(workspace_id, campaign, &input.inbound)
            .await
            .map_err(RoutingError::Campaign)?;
        if !evaluation.allowed {
            return Ok(Decision::reject(
                workspace_id,
                owned_campaign(),
                Reason::campaign_denied(evaluation.reason.as_deref()),
            ));
        }

        // 6. Weighted pick
        Ok(
            match pick_weighted(&evaluation.destinations, self.rng.as_ref()) {
                Some(dest) => Decision::connect(workspace_id, owned_campaign(), &dest.target_uri)
                    .with_reason(Reason::Selected),
                None => Decision::reject(
                    workspace_id,
                    owned_campaign(),
                    Reason::NoEligibleDestination,
                ),
            },
        )
    }

    /// Campaign destinations are honoured when available, but neither
    /// campaign denial nor evaluation failure may block the call.
    async fn privileged(
        &self,
        workspace_id: &str,
        campaign_id: Option<&str>,
        request: &InboundCallRequest,
    ) -> Decision {
        let campaign = campaign_id.map(str::to_string);
        if let (Some(id), Some(campaigns)) = (campaign_id, &self.campaigns)
            && let Ok(evaluation) = campaigns.evaluate_inbound(workspace_id, id, request).await
            && let Some(dest) = pick_weighted(&evaluation.destinations, self.rng.as_ref())
        {
            return Decision::connect(workspace_id, campaign, &dest.target_uri)
                .with_reason(Reason::AdminOverride);
        }
        Decision::reject(workspace_id, campaign, Reason::AdminOverrideNoDestination)
    }

    /// Returns a rejection reason when the wallet cannot cover `cost`.
    async fn balance_gate(
        &self,
        input: &RouteInput,
        cost: i64,
    ) -> Result<Option<Reason>, RoutingError> {
        let wallet = self
            .wallet
            .as_ref()
            .ok_or(RoutingError::NotConfigured("wallet service"))?;
        let wallet_id = input
            .wallet_id
            .as_deref()
            .filter(|w| !is_blank(w))
            .ok_or(RoutingError::MissingWalletContext("wallet_id"))?;
        let currency = input
            .currency
            .as_deref()
            .filter(|c| !is_blank(c))
            .ok_or(RoutingError::MissingWalletContext("currency"))?;

        let balance = wallet.get_balance(&input.workspace_id, wallet_id).await?;
        if balance.currency != currency {
            return Ok(Some(Reason::WalletCurrencyMismatch));
        }
        if balance.balance_minor < cost {
            return Ok(Some(Reason::InsufficientBalance));
        }
        Ok(None)
    }
}
