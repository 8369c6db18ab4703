//! Wallet ledger service.
//!
//! Maintains prepaid wallet balances as an append-only ledger of signed
//! entries plus a current-balance projection. Every mutation runs inside one
//! [`LedgerTransaction`] that holds the exclusive wallet lock, so the
//! projection always equals the sum of the wallet's entries.
//!
//! Idempotency keys make every posting at-most-once: resubmitting a key
//! returns the stored entry and the current balance without writing.

pub mod memory;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AdminActionAuditEvent, AuditEvent, AuditSink};
use crate::clock::Clock;
use crate::error::WalletError;
use crate::models::{
    AdminActor, AdminCreditRequest, AdminWalletAction, AdminWalletActionType, Balance,
    CreditRequest, DebitRequest, LedgerEntry, LedgerEntryType, is_blank,
};
use crate::routing::BalanceReader;

pub use memory::{FailPoint, MemoryLedgerStore};
pub use store::{LedgerStore, LedgerTransaction};

/// External reference stamped on entries produced by admin credits, so
/// reporting can tell manual adjustments apart from usage.
pub const ADMIN_CREDIT_EXTERNAL_REF: &str = "admin_manual_credit";

/// Result of a credit or debit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub entry: LedgerEntry,
    pub balance: Balance,
    /// `true` if the idempotency key had already been used and nothing was
    /// written.
    pub replayed: bool,
}

/// Result of an admin credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPosting {
    /// The admin action linked to the entry. Always present for fresh
    /// postings; on replay, present when the original posting recorded one.
    pub action: Option<AdminWalletAction>,
    pub entry: LedgerEntry,
    pub balance: Balance,
    pub replayed: bool,
}

/// Ledger-versus-projection comparison for one wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub ledger_sum_minor: i64,
    /// `None` when no projection row exists yet.
    pub projected_minor: Option<i64>,
    pub entry_count: usize,
}

impl Reconciliation {
    /// A wallet without entries and without a projection is consistent.
    pub fn is_consistent(&self) -> bool {
        match self.projected_minor {
            Some(projected) => projected == self.ledger_sum_minor,
            None => self.entry_count == 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PostingKind<'a> {
    Credit,
    Debit,
    AdminCredit { actor: &'a AdminActor, reason: &'a str },
}

impl PostingKind<'_> {
    fn entry_type(self) -> LedgerEntryType {
        match self {
            Self::Credit | Self::AdminCredit { .. } => LedgerEntryType::Credit,
            Self::Debit => LedgerEntryType::Debit,
        }
    }

    fn signed(self, amount_minor: i64) -> i64 {
        match self {
            Self::Debit => -amount_minor,
            Self::Credit | Self::AdminCredit { .. } => amount_minor,
        }
    }
}

struct PostingInput<'a> {
    kind: PostingKind<'a>,
    amount_minor: i64,
    currency: &'a str,
    idempotency_key: &'a str,
    external_ref: Option<&'a str>,
    metadata: Option<&'a serde_json::Value>,
}

struct Outcome {
    entry: LedgerEntry,
    balance: Balance,
    action: Option<AdminWalletAction>,
    replayed: bool,
}

/// Service over a [`LedgerStore`].
pub struct WalletLedgerService {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl WalletLedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            audit: None,
        }
    }

    /// Reports committed admin actions to `sink`.
    #[must_use]
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Returns the balance projection of a wallet.
    ///
    /// # Errors
    ///
    /// [`WalletError::InvalidArgument`] on blank ids,
    /// [`WalletError::NotFound`] if no projection row exists.
    pub async fn get_balance(
        &self,
        workspace_id: &str,
        wallet_id: &str,
    ) -> Result<Balance, WalletError> {
        require_ids(workspace_id, wallet_id)?;
        self.store
            .balance(workspace_id, wallet_id)
            .await?
            .ok_or_else(|| WalletError::NotFound(format!("balance for wallet {wallet_id}")))
    }

    /// Adds funds to a wallet.
    pub async fn credit(
        &self,
        workspace_id: &str,
        wallet_id: &str,
        req: &CreditRequest,
    ) -> Result<Posting, WalletError> {
        let outcome = self
            .post(
                workspace_id,
                wallet_id,
                PostingInput {
                    kind: PostingKind::Credit,
                    amount_minor: req.amount_minor,
                    currency: &req.currency,
                    idempotency_key: &req.idempotency_key,
                    external_ref: req.external_ref.as_deref(),
                    metadata: req.metadata.as_ref(),
                },
            )
            .await?;
        Ok(Posting {
            entry: outcome.entry,
            balance: outcome.balance,
            replayed: outcome.replayed,
        })
    }

    /// Charges a wallet.
    ///
    /// # Errors
    ///
    /// [`WalletError::InsufficientFunds`] if the balance observed under the
    /// wallet lock is below the amount. A wallet that has never been
    /// credited has a balance of zero.
    pub async fn debit(
        &self,
        workspace_id: &str,
        wallet_id: &str,
        req: &DebitRequest,
    ) -> Result<Posting, WalletError> {
        let outcome = self
            .post(
                workspace_id,
                wallet_id,
                PostingInput {
                    kind: PostingKind::Debit,
                    amount_minor: req.amount_minor,
                    currency: &req.currency,
                    idempotency_key: &req.idempotency_key,
                    external_ref: req.external_ref.as_deref(),
                    metadata: req.metadata.as_ref(),
                },
            )
            .await?;
        Ok(Posting {
            entry: outcome.entry,
            balance: outcome.balance,
            replayed: outcome.replayed,
        })
    }

    /// Credits a wallet on behalf of an administrator and records the
    /// matching [`AdminWalletAction`] in the same transaction.
    pub async fn admin_credit(
        &self,
        workspace_id: &str,
        wallet_id: &str,
        actor: &AdminActor,
        req: &AdminCreditRequest,
    ) -> Result<AdminPosting, WalletError> {
        if is_blank(&actor.user_id) {
            return Err(WalletError::invalid("admin user_id required"));
        }
        if is_blank(&req.reason) {
            return Err(WalletError::invalid("reason required"));
        }

        let outcome = self
            .post(
                workspace_id,
                wallet_id,
                PostingInput {
                    kind: PostingKind::AdminCredit {
                        actor,
                        reason: &req.reason,
                    },
                    amount_minor: req.amount_minor,
                    currency: &req.currency,
                    idempotency_key: &req.idempotency_key,
                    external_ref: Some(ADMIN_CREDIT_EXTERNAL_REF),
                    metadata: req.metadata.as_ref(),
                },
            )
            .await?;

        if !outcome.replayed
            && let Some(action) = &outcome.action
        {
            self.emit_admin_action(action);
        }

        Ok(AdminPosting {
            action: outcome.action,
            entry: outcome.entry,
            balance: outcome.balance,
            replayed: outcome.replayed,
        })
    }

    /// Every ledger entry of a wallet, oldest first.
    pub async fn entries(
        &self,
        workspace_id: &str,
        wallet_id: &str,
    ) -> Result<Vec<LedgerEntry>, WalletError> {
        require_ids(workspace_id, wallet_id)?;
        let mut tx = self.store.begin(workspace_id, wallet_id).await?;
        tx.entries().await
    }

    /// Replays a wallet's ledger under the wallet lock and compares the sum
    /// with the projection.
    pub async fn reconcile(
        &self,
        workspace_id: &str,
        wallet_id: &str,
    ) -> Result<Reconciliation, WalletError> {
        require_ids(workspace_id, wallet_id)?;
        let mut tx = self.store.begin(workspace_id, wallet_id).await?;
        let entries = tx.entries().await?;
        let projected = tx.balance_for_update().await?;

        let ledger_sum_minor = entries
            .iter()
            .try_fold(0i64, |acc, e| acc.checked_add(e.amount_minor))
            .ok_or_else(|| WalletError::Persistence("ledger sum overflow".to_string()))?;

        let reconciliation = Reconciliation {
            ledger_sum_minor,
            projected_minor: projected.map(|b| b.balance_minor),
            entry_count: entries.len(),
        };
        if !reconciliation.is_consistent() {
            warn!(
                workspace_id,
                wallet_id,
                ledger_sum_minor,
                projected_minor = ?reconciliation.projected_minor,
                "Wallet projection drifted from ledger"
            );
        }
        Ok(reconciliation)
    }

    async fn post(
        &self,
        workspace_id: &str,
        wallet_id: &str,
        input: PostingInput<'_>,
    ) -> Result<Outcome, WalletError> {
        require_ids(workspace_id, wallet_id)?;
        if input.amount_minor <= 0 {
            return Err(WalletError::invalid("amount_minor must be positive"));
        }
        if is_blank(input.currency) {
            return Err(WalletError::invalid("currency required"));
        }
        if is_blank(input.idempotency_key) {
            return Err(WalletError::invalid("idempotency_key required"));
        }

        // 1. Exclusive wallet lock for the whole unit
        let mut tx = self.store.begin(workspace_id, wallet_id).await?;

        // 2. Currency must match the wallet
        if tx.wallet().currency != input.currency {
            return Err(WalletError::invalid(format!(
                "currency {} does not match wallet currency {}",
                input.currency,
                tx.wallet().currency
            )));
        }

        // 3. Idempotency gate
        if let Some(existing) = tx.find_entry_by_idempotency_key(input.idempotency_key).await? {
            let signed = input.kind.signed(input.amount_minor);
            if existing.amount_minor != signed || existing.entry_type != input.kind.entry_type() {
                warn!(
                    workspace_id,
                    wallet_id,
                    idempotency_key = input.idempotency_key,
                    stored_amount_minor = existing.amount_minor,
                    requested_amount_minor = signed,
                    "Idempotency key reused with different parameters"
                );
            }
            let action = match input.kind {
                PostingKind::AdminCredit { .. } => {
                    tx.find_admin_action_by_entry(existing.id).await?
                }
                PostingKind::Credit | PostingKind::Debit => None,
            };
            let balance = tx.balance_for_update().await?.ok_or_else(|| {
                WalletError::NotFound(format!("balance for wallet {wallet_id}"))
            })?;
            debug!(
                workspace_id,
                wallet_id,
                entry_id = %existing.id,
                "Replayed idempotent posting"
            );
            return Ok(Outcome {
                entry: existing,
                balance,
                action,
                replayed: true,
            });
        }

        // 4. Funds check under the lock
        if matches!(input.kind, PostingKind::Debit) {
            let available = match tx.balance_for_update().await? {
                Some(balance) if balance.currency != input.currency => {
                    return Err(WalletError::invalid(format!(
                        "currency {} does not match balance currency {}",
                        input.currency, balance.currency
                    )));
                }
                Some(balance) => balance.balance_minor,
                None => 0,
            };
            if available < input.amount_minor {
                return Err(WalletError::InsufficientFunds {
                    available,
                    requested: input.amount_minor,
                });
            }
        }

        // 5. Append the entry
        let now = self.clock.now();
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            workspace_id: workspace_id.to_string(),
            wallet_id: wallet_id.to_string(),
            entry_type: input.kind.entry_type(),
            amount_minor: input.kind.signed(input.amount_minor),
            currency: input.currency.to_string(),
            external_ref: input.external_ref.map(str::to_string),
            idempotency_key: input.idempotency_key.to_string(),
            metadata: input.metadata.cloned(),
            created_at: now,
        };
        tx.insert_entry(&entry).await?;

        // 6. Move the projection
        let balance = tx
            .apply_delta(input.currency, entry.amount_minor, now)
            .await?;

        // 7. Admin action row in the same unit
        let action = match input.kind {
            PostingKind::AdminCredit { actor, reason } => {
                let action = AdminWalletAction {
                    id: Uuid::new_v4(),
                    workspace_id: workspace_id.to_string(),
                    wallet_id: wallet_id.to_string(),
                    admin_user_id: actor.user_id.clone(),
                    admin_role: actor.role,
                    action: AdminWalletActionType::AdjustBalance,
                    reason: reason.to_string(),
                    amount_minor: Some(input.amount_minor),
                    currency: Some(input.currency.to_string()),
                    related_ledger_id: Some(entry.id),
                    metadata: input.metadata.cloned(),
                    created_at: now,
                };
                tx.insert_admin_action(&action).await?;
                Some(action)
            }
            PostingKind::Credit | PostingKind::Debit => None,
        };

        // 8. Publish
        tx.commit().await?;

        info!(
            workspace_id,
            wallet_id,
            entry_id = %entry.id,
            entry_type = ?entry.entry_type,
            amount_minor = entry.amount_minor,
            balance_minor = balance.balance_minor,
            "Posted ledger entry"
        );

        Ok(Outcome {
            entry,
            balance,
            action,
            replayed: false,
        })
    }

    fn emit_admin_action(&self, action: &AdminWalletAction) {
        let Some(audit) = &self.audit else {
            return;
        };
        let event = AuditEvent::AdminAction(AdminActionAuditEvent {
            workspace_id: action.workspace_id.clone(),
            wallet_id: action.wallet_id.clone(),
            admin_user_id: action.admin_user_id.clone(),
            admin_role: action.admin_role,
            action: action.action,
            amount_minor: action.amount_minor,
            currency: action.currency.clone(),
            reason: action.reason.clone(),
            ledger_entry_id: action.related_ledger_id,
            occurred_at: action.created_at,
        });
        if let Err(e) = audit.record(event) {
            warn!(
                workspace_id = %action.workspace_id,
                action_id = %action.id,
                error = %e,
                "Failed to record admin action audit event"
            );
        }
    }
}

#[async_trait]
impl BalanceReader for WalletLedgerService {
    async fn get_balance(
        &self,
        workspace_id: &str,
        wallet_id: &str,
    ) -> Result<Balance, WalletError> {
        WalletLedgerService::get_balance(self, workspace_id, wallet_id).await
    }
}

fn require_ids(workspace_id: &str, wallet_id: &str) -> Result<(), WalletError> {
    if is_blank(workspace_id) {
        return Err(WalletError::invalid("workspace_id required"));
    }
    if is_blank(wallet_id) {
        return Err(WalletError::invalid("wallet_id required"));
    }
    Ok(())
}
