//! Routing decision model.
//!
//! A [`Decision`] is the only artifact handed to provider adapter code. It
//! carries no provider identity and no provider-specific fields.

use std::fmt;

use serde::{Serialize, Serializer};

/// What should happen to the call at the provider boundary.
///
/// A connect target exists if and only if the action is `connect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Reject,
    Connect { connect_to: String },
    Hangup,
}

impl Action {
    /// Returns the wire-format action name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Connect { .. } => "connect",
            Self::Hangup => "hangup",
        }
    }
}

/// Machine-readable outcome reason, intended for internal logs and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    AdminOverride,
    AdminOverrideNoDestination,
    WalletCurrencyMismatch,
    InsufficientBalance,
    CampaignIdRequired,
    /// The campaign evaluator refused the call with this reason.
    CampaignDenied(String),
    Selected,
    NoEligibleDestination,
}

impl Reason {
    /// Builds a campaign denial, defaulting to `campaign_blocked`.
    pub fn campaign_denied(reason: Option<&str>) -> Self {
        match reason.map(str::trim) {
            Some(r) if !r.is_empty() => Self::CampaignDenied(r.to_string()),
            _ => Self::CampaignDenied("campaign_blocked".to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::AdminOverride => "admin_override",
            Self::AdminOverrideNoDestination => "admin_override_no_destination",
            Self::WalletCurrencyMismatch => "wallet_currency_mismatch",
            Self::InsufficientBalance => "insufficient_balance",
            Self::CampaignIdRequired => "campaign_id_required",
            Self::CampaignDenied(reason) => reason,
            Self::Selected => "selected",
            Self::NoEligibleDestination => "no_eligible_destination",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Provider-agnostic outcome of routing one inbound call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(flatten)]
    pub action: Action,
    /// Never set when an override produced the decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
}

impl Decision {
    /// A connect decision with no reason attached.
    pub fn connect(
        workspace_id: impl Into<String>,
        campaign_id: Option<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            campaign_id,
            action: Action::Connect {
                connect_to: target.into(),
            },
            reason: None,
        }
    }

    pub fn reject(
        workspace_id: impl Into<String>,
        campaign_id: Option<String>,
        reason: Reason,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            campaign_id,
            action: Action::Reject,
            reason: Some(reason),
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: Reason) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Returns the dial target for connect decisions.
    pub fn connect_to(&self) -> Option<&str> {
        match &self.action {
            Action::Connect { connect_to } => Some(connect_to),
            _ => None,
        }
    }

    pub fn is_reject(&self) -> bool {
        matches!(self.action, Action::Reject)
    }
}
