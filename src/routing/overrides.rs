//! Silent admin overrides.
//!
//! An active override forces a connect before any other routing rule runs.
//! The resulting [`Decision`] is indistinguishable from an ordinary connect:
//! it carries no reason, and nothing about it is logged. The only trace is
//! one internal audit event.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::audit::AuditSink;
use crate::clock::Clock;
use crate::error::{BoxError, RoutingError};
use crate::models::{
    Decision, InboundCallRequest, Override, OverrideAuditEvent, RequestContext, is_blank,
};

/// Read-only source of active overrides.
#[async_trait]
pub trait OverrideStore: Send + Sync {
    /// Returns the override in force for the workspace/campaign/call at
    /// `now`, if any.
    async fn get_active_override(
        &self,
        workspace_id: &str,
        campaign_id: Option<&str>,
        request: &InboundCallRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<Override>, BoxError>;
}

/// Resolves and applies overrides.
pub struct AdminOverrideEngine {
    store: Arc<dyn OverrideStore>,
    audit: Option<Arc<dyn AuditSink>>,
    clock: Arc<dyn Clock>,
}

impl AdminOverrideEngine {
    pub fn new(store: Arc<dyn OverrideStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            audit: None,
            clock,
        }
    }

    #[must_use]
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Returns a connect decision if an override applies, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Fails on a blank workspace id, on store failures, and when the
    /// override found is misconfigured (empty target, foreign scope).
    /// Expired overrides are not errors.
    pub async fn decide(
        &self,
        workspace_id: &str,
        campaign_id: Option<&str>,
        request: &InboundCallRequest,
        context: &RequestContext,
    ) -> Result<Option<Decision>, RoutingError> {
        if is_blank(workspace_id) {
            return Err(RoutingError::MissingWorkspace);
        }

        let now = self.clock.now();
        let Some(found) = self
            .store
            .get_active_override(workspace_id, campaign_id, request, now)
            .await
            .map_err(RoutingError::OverrideStore)?
        else {
            return Ok(None);
        };

        if !found.is_active_at(now) {
            return Ok(None);
        }
        if !found.covers(workspace_id, campaign_id) {
            return Err(RoutingError::OverrideScopeMismatch {
                override_id: found.override_id,
            });
        }
        if is_blank(&found.connect_to) {
            return Err(RoutingError::EmptyOverrideTarget {
                override_id: found.override_id,
            });
        }

        let decision = Decision::connect(
            workspace_id,
            campaign_id.map(str::to_string),
            found.connect_to.clone(),
        );
        self.emit(workspace_id, campaign_id, request, context, found, now);
        Ok(Some(decision))
    }

    fn emit(
        &self,
        workspace_id: &str,
        campaign_id: Option<&str>,
        request: &InboundCallRequest,
        context: &RequestContext,
        applied: Override,
        now: DateTime<Utc>,
    ) {
        let Some(audit) = &self.audit else {
            return;
        };
        let event = OverrideAuditEvent {
            workspace_id: workspace_id.to_string(),
            campaign_id: campaign_id.map(str::to_string),
            override_id: applied.override_id,
            provider_call_id: request.provider_call_id.clone(),
            from: request.from.clone(),
            to: request.to.clone(),
            client_ip: context.client_ip,
            actor_user_id: context.actor_user_id.clone(),
            connect_to: applied.connect_to,
            applied_at: now,
            expires_at: applied.expires_at,
            metadata: applied.metadata,
        };
        if let Err(e) = audit.log_override_applied(event) {
            warn!(error = %e, "Audit dispatch failed");
        }
    }
}

/// Process-local override store.
///
/// Returns the first unexpired override covering the request, preferring
/// campaign-scoped overrides over workspace-wide ones.
#[derive(Debug, Default)]
pub struct MemoryOverrideStore {
    overrides: RwLock<Vec<Override>>,
}

impl MemoryOverrideStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: Override) {
        self.overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Drops every override that has expired by `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut overrides = self.overrides.write().unwrap_or_else(PoisonError::into_inner);
        let before = overrides.len();
        overrides.retain(|o| o.is_active_at(now));
        before - overrides.len()
    }
}

#[async_trait]
impl OverrideStore for MemoryOverrideStore {
    async fn get_active_override(
        &self,
        workspace_id: &str,
        campaign_id: Option<&str>,
        _request: &InboundCallRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<Override>, BoxError> {
        let overrides = self.overrides.read().unwrap_or_else(PoisonError::into_inner);
        let candidates: Vec<&Override> = overrides
            .iter()
            .filter(|o| o.is_active_at(now) && o.covers(workspace_id, campaign_id))
            .collect();
        let chosen = candidates
            .iter()
            .find(|o| o.campaign_id.is_some())
            .or(candidates.first());
        Ok(chosen.map(|o| (*o).clone()))
    }
}
