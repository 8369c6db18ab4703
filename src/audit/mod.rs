//! Internal-only audit trail.
//!
//! Routing overrides and privileged wallet actions are recorded here and
//! nowhere else. Records never flow to tenant-facing reporting. Emitting an
//! event is best-effort: callers log a failed [`AuditSink::record`] and carry
//! on with their own result unchanged.

pub mod worker;

use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AuditError;
use crate::models::{AdminWalletActionType, OverrideAuditEvent, Role};

pub use worker::{ChannelAuditSink, spawn_audit_worker};

/// A privileged wallet mutation, reported after it committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminActionAuditEvent {
    pub workspace_id: String,
    pub wallet_id: String,
    pub admin_user_id: String,
    pub admin_role: Role,
    pub action: AdminWalletActionType,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub reason: String,
    pub ledger_entry_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

/// Events accepted by an [`AuditSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    OverrideApplied(OverrideAuditEvent),
    AdminAction(AdminActionAuditEvent),
}

impl AuditEvent {
    pub fn workspace_id(&self) -> &str {
        match self {
            Self::OverrideApplied(e) => &e.workspace_id,
            Self::AdminAction(e) => &e.workspace_id,
        }
    }
}

/// Non-blocking audit dispatch.
///
/// Implementations must return promptly; persistence happens elsewhere.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;

    fn log_override_applied(&self, event: OverrideAuditEvent) -> Result<(), AuditError> {
        self.record(AuditEvent::OverrideApplied(event))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    AdminAction,
    RoutingOverride,
}

/// An immutable, append-only audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub workspace_id: String,
    pub kind: AuditKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_user_id: Option<String>,
    /// May be a hidden role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_id: Option<String>,
    pub message: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Flattens an event into a storable record.
    pub fn from_event(event: &AuditEvent, id: Uuid, created_at: DateTime<Utc>) -> Self {
        match event {
            AuditEvent::OverrideApplied(e) => Self {
                id,
                workspace_id: e.workspace_id.clone(),
                kind: AuditKind::RoutingOverride,
                actor_user_id: e.actor_user_id.clone(),
                actor_role: None,
                ip_address: e.client_ip,
                wallet_id: None,
                campaign_id: e.campaign_id.clone(),
                call_id: Some(e.provider_call_id.clone()).filter(|c| !c.is_empty()),
                override_id: e.override_id.clone(),
                message: "routing override applied".to_string(),
                metadata: json!({
                    "from": e.from,
                    "to": e.to,
                    "connect_to": e.connect_to,
                    "applied_at": e.applied_at,
                    "expires_at": e.expires_at,
                    "override": e.metadata,
                }),
                created_at,
            },
            AuditEvent::AdminAction(e) => Self {
                id,
                workspace_id: e.workspace_id.clone(),
                kind: AuditKind::AdminAction,
                actor_user_id: Some(e.admin_user_id.clone()),
                actor_role: Some(e.admin_role),
                ip_address: None,
                wallet_id: Some(e.wallet_id.clone()),
                campaign_id: None,
                call_id: None,
                override_id: None,
                message: e.reason.clone(),
                metadata: json!({
                    "action": e.action,
                    "amount_minor": e.amount_minor,
                    "currency": e.currency,
                    "ledger_entry_id": e.ledger_entry_id,
                    "occurred_at": e.occurred_at,
                }),
                created_at,
            },
        }
    }
}

/// Append-only persistence for audit records. No update or delete.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// Process-local audit repository.
#[derive(Debug, Default)]
pub struct MemoryAuditRepository {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all records for a workspace in append order.
    pub async fn records(&self, workspace_id: &str) -> Vec<AuditRecord> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.workspace_id == workspace_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditRepository for MemoryAuditRepository {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        if record.workspace_id.trim().is_empty() {
            return Err(AuditError::Invalid("workspace_id required".to_string()));
        }
        self.records.lock().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn override_event() -> OverrideAuditEvent {
        OverrideAuditEvent {
            workspace_id: "w".into(),
            campaign_id: Some("c".into()),
            override_id: Some("ov-1".into()),
            provider_call_id: "pc-1".into(),
            from: "+15550001".into(),
            to: "+15550002".into(),
            client_ip: "10.0.0.9".parse().ok(),
            actor_user_id: Some("usr-ops-3".into()),
            connect_to: "sip:forced".into(),
            applied_at: at(),
            expires_at: at() + chrono::Duration::minutes(5),
            metadata: Some(json!({"ticket": "OPS-1"})),
        }
    }

    #[test]
    fn override_record_carries_call_details() {
        let event = AuditEvent::OverrideApplied(override_event());
        assert_eq!(event.workspace_id(), "w");
        let record = AuditRecord::from_event(&event, Uuid::nil(), at());
        assert_eq!(record.kind, AuditKind::RoutingOverride);
        assert_eq!(record.call_id.as_deref(), Some("pc-1"));
        assert_eq!(record.override_id.as_deref(), Some("ov-1"));
        assert_eq!(record.ip_address, "10.0.0.9".parse().ok());
        assert_eq!(record.actor_user_id.as_deref(), Some("usr-ops-3"));
        assert_eq!(record.actor_role, None);
        assert_eq!(record.metadata["connect_to"], "sip:forced");
        assert_eq!(record.metadata["override"]["ticket"], "OPS-1");
    }

    #[test]
    fn admin_record_keeps_hidden_role() {
        let event = AuditEvent::AdminAction(AdminActionAuditEvent {
            workspace_id: "w".into(),
            wallet_id: "wal".into(),
            admin_user_id: "ops-7".into(),
            admin_role: Role::NetworkOperator,
            action: AdminWalletActionType::AdjustBalance,
            amount_minor: Some(500),
            currency: Some("USD".into()),
            reason: "goodwill credit".into(),
            ledger_entry_id: None,
            occurred_at: at(),
        });
        assert_eq!(event.workspace_id(), "w");
        let record = AuditRecord::from_event(&event, Uuid::nil(), at());
        assert_eq!(record.kind, AuditKind::AdminAction);
        assert_eq!(record.actor_role, Some(Role::NetworkOperator));
        assert_eq!(record.message, "goodwill credit");
        assert_eq!(record.metadata["action"], "adjust_balance");
    }

    #[tokio::test]
    async fn repository_rejects_blank_workspace() {
        let repo = MemoryAuditRepository::new();
        let mut record = AuditRecord::from_event(
            &AuditEvent::OverrideApplied(override_event()),
            Uuid::nil(),
            at(),
        );
        record.workspace_id = " ".into();
        assert!(matches!(
            repo.append(record).await,
            Err(AuditError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn repository_scopes_by_workspace() {
        let repo = MemoryAuditRepository::new();
        let mut event = override_event();
        repo.append(AuditRecord::from_event(
            &AuditEvent::OverrideApplied(event.clone()),
            Uuid::new_v4(),
            at(),
        ))
        .await
        .unwrap();
        event.workspace_id = "other".into();
        repo.append(AuditRecord::from_event(
            &AuditEvent::OverrideApplied(event),
            Uuid::new_v4(),
            at(),
        ))
        .await
        .unwrap();

        assert_eq!(repo.records("w").await.len(), 1);
        assert_eq!(repo.records("other").await.len(), 1);
        assert!(repo.records("nobody").await.is_empty());
    }
}
