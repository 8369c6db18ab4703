//! Shared test utilities: fixed clock, stub collaborators, ledger setup.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use switchboard::audit::{AuditEvent, AuditSink};
use switchboard::clock::FixedClock;
use switchboard::error::{AuditError, BoxError};
use switchboard::ledger::{MemoryLedgerStore, WalletLedgerService};
use switchboard::models::{CampaignEvaluation, InboundCallRequest, Wallet, WalletStatus};
use switchboard::routing::CampaignEvaluator;

pub const WORKSPACE: &str = "ws-acme";
pub const WALLET: &str = "wal-main";

/// 2023-11-14T22:13:20Z; every test clock is frozen here.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(fixed_now()))
}

pub fn inbound(workspace_id: &str) -> InboundCallRequest {
    InboundCallRequest {
        workspace_id: workspace_id.to_string(),
        provider_call_id: "CA-0001".to_string(),
        from: "+15550100".to_string(),
        to: "+15550199".to_string(),
        occurred_at: Some(fixed_now()),
        raw_payload: None,
    }
}

/// Campaign evaluator answering from a fixed table and counting calls.
#[derive(Default)]
pub struct StubCampaigns {
    answers: HashMap<String, Result<CampaignEvaluation, String>>,
    calls: AtomicUsize,
}

impl StubCampaigns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, campaign_id: &str, evaluation: CampaignEvaluation) -> Self {
        self.answers.insert(campaign_id.to_string(), Ok(evaluation));
        self
    }

    pub fn failing(mut self, campaign_id: &str, message: &str) -> Self {
        self.answers
            .insert(campaign_id.to_string(), Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CampaignEvaluator for StubCampaigns {
    async fn evaluate_inbound(
        &self,
        _workspace_id: &str,
        campaign_id: &str,
        _request: &InboundCallRequest,
    ) -> Result<CampaignEvaluation, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.get(campaign_id) {
            Some(Ok(evaluation)) => Ok(evaluation.clone()),
            Some(Err(message)) => Err(message.clone().into()),
            None => Ok(CampaignEvaluation::deny(Some("campaign_not_found"))),
        }
    }
}

/// Audit sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Audit sink whose queue is always full.
pub struct FullSink;

impl AuditSink for FullSink {
    fn record(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Err(AuditError::QueueFull)
    }
}

/// A store holding one wallet in `currency`, and a service over it.
pub fn ledger(currency: &str) -> (Arc<MemoryLedgerStore>, Arc<WalletLedgerService>) {
    let store = Arc::new(MemoryLedgerStore::new());
    store
        .create_wallet(Wallet::new(
            WORKSPACE,
            WALLET,
            currency,
            WalletStatus::Active,
            fixed_now(),
        ))
        .unwrap();
    let service = Arc::new(WalletLedgerService::new(store.clone(), clock()));
    (store, service)
}

/// Asserts the projection equals the ledger sum.
pub async fn assert_consistent(service: &WalletLedgerService, workspace_id: &str, wallet_id: &str) {
    let reconciliation = service.reconcile(workspace_id, wallet_id).await.unwrap();
    assert!(
        reconciliation.is_consistent(),
        "projection drifted: {reconciliation:?}"
    );
}
