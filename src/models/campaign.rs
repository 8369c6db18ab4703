//! Campaign evaluation results.

use serde::{Deserialize, Serialize};

/// A candidate dial target with a relative selection weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedDestination {
    /// Provider-agnostic target, e.g. `sip:agent-123@pbx.example.com` or `+15551234567`.
    pub target_uri: String,
    /// Only positive weights are eligible.
    pub weight: i32,
}

impl WeightedDestination {
    pub fn new(target_uri: impl Into<String>, weight: i32) -> Self {
        Self {
            target_uri: target_uri.into(),
            weight,
        }
    }
}

/// Outcome of evaluating campaign rules for one inbound call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignEvaluation {
    pub allowed: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub destinations: Vec<WeightedDestination>,
}

impl CampaignEvaluation {
    /// An allowing evaluation with the given destinations.
    pub fn allow(destinations: Vec<WeightedDestination>) -> Self {
        Self {
            allowed: true,
            reason: None,
            destinations,
        }
    }

    pub fn deny(reason: Option<&str>) -> Self {
        Self {
            allowed: false,
            reason: reason.map(str::to_string),
            destinations: Vec::new(),
        }
    }
}
