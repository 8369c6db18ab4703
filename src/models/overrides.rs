//! Silent routing override records.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A time-bounded forced-routing rule.
///
/// Created and expired by an external management plane; read-only here.
/// An override at or past its expiry is treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub workspace_id: String,
    /// `None` applies the override to every campaign in the workspace.
    #[serde(default)]
    pub campaign_id: Option<String>,
    /// Correlates audit records.
    #[serde(default)]
    pub override_id: Option<String>,
    /// Forced dial target.
    pub connect_to: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Override {
    /// Returns `true` while `now` is strictly before the expiry.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Returns `true` if this override may apply to the given scope.
    pub fn covers(&self, workspace_id: &str, campaign_id: Option<&str>) -> bool {
        if self.workspace_id != workspace_id {
            return false;
        }
        match self.campaign_id.as_deref() {
            None => true,
            Some(scoped) => campaign_id == Some(scoped),
        }
    }
}

/// Internal-only record of an applied override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideAuditEvent {
    pub workspace_id: String,
    pub campaign_id: Option<String>,
    pub override_id: Option<String>,
    pub provider_call_id: String,
    pub from: String,
    pub to: String,
    pub client_ip: Option<IpAddr>,
    /// Authenticated user behind the call, when the edge knows one.
    pub actor_user_id: Option<String>,
    pub connect_to: String,
    pub applied_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample(campaign_id: Option<&str>) -> Override {
        Override {
            workspace_id: "w".into(),
            campaign_id: campaign_id.map(str::to_string),
            override_id: Some("ov-1".into()),
            connect_to: "sip:forced".into(),
            expires_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            metadata: None,
        }
    }

    #[test]
    fn expiry_is_exclusive() {
        let o = sample(None);
        assert!(o.is_active_at(o.expires_at - Duration::seconds(1)));
        assert!(!o.is_active_at(o.expires_at));
        assert!(!o.is_active_at(o.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn scope_matching() {
        let wide = sample(None);
        assert!(wide.covers("w", None));
        assert!(wide.covers("w", Some("c")));
        assert!(!wide.covers("other", Some("c")));

        let scoped = sample(Some("c"));
        assert!(scoped.covers("w", Some("c")));
        assert!(!scoped.covers("w", Some("d")));
        assert!(!scoped.covers("w", None));
    }
}
