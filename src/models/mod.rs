//! Shared models for routing and wallet settlement.
//!
//! Contains the provider-agnostic inbound call request, the explicit
//! per-request context, and re-exports of the domain records.

pub mod campaign;
pub mod decision;
pub mod overrides;
pub mod role;
pub mod wallet;

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use campaign::{CampaignEvaluation, WeightedDestination};
pub use decision::{Action, Decision, Reason};
pub use overrides::{Override, OverrideAuditEvent};
pub use role::{Capabilities, Role};
pub use wallet::{
    AdminActor, AdminCreditRequest, AdminWalletAction, AdminWalletActionType, Balance,
    CreditRequest, DebitRequest, LedgerEntry, LedgerEntryType, PostingRequest, Wallet,
    WalletStatus,
};

/// An inbound call event received from a telephony provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundCallRequest {
    pub workspace_id: String,
    /// The provider's unique identifier for this call.
    pub provider_call_id: String,
    /// Caller number, E.164 where possible.
    pub from: String,
    /// Dialed number, E.164 where possible.
    pub to: String,
    /// Provider event time.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    /// Raw provider payload kept for debugging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<String>,
}

/// Request-scoped facts resolved by the transport layer.
///
/// Passed explicitly through the call chain instead of being carried in an
/// ambient key/value bag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Originating client address, when the edge could resolve it.
    pub client_ip: Option<IpAddr>,
    /// Authenticated user behind the request, if any.
    pub actor_user_id: Option<String>,
}

impl RequestContext {
    #[must_use]
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    #[must_use]
    pub fn with_actor_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.actor_user_id = Some(user_id.into());
        self
    }
}

/// Returns `true` if `value` is absent or blank.
pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
