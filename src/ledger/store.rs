//! Access contract for the transactional store behind the wallet ledger.
//!
//! The store is an external relational database with row-level locking.
//! A [`LedgerTransaction`] is one atomic unit scoped to a single wallet:
//! opening it takes the exclusive wallet lock, [`LedgerTransaction::commit`]
//! publishes every staged write at once, and dropping it without committing
//! rolls everything back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::WalletError;
use crate::models::{AdminWalletAction, Balance, LedgerEntry, Wallet};

/// Backing store for wallets, ledger entries, balance projections and
/// admin wallet actions. Every key is scoped by workspace id.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens a transaction holding the exclusive lock on one wallet row.
    ///
    /// # Errors
    ///
    /// [`WalletError::NotFound`] if the wallet does not exist in the workspace.
    async fn begin(
        &self,
        workspace_id: &str,
        wallet_id: &str,
    ) -> Result<Box<dyn LedgerTransaction>, WalletError>;

    /// Reads the balance projection outside of any transaction.
    async fn balance(
        &self,
        workspace_id: &str,
        wallet_id: &str,
    ) -> Result<Option<Balance>, WalletError>;
}

/// Operations available inside one atomic unit.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// The locked wallet row.
    fn wallet(&self) -> &Wallet;

    /// Every ledger entry of the wallet in insertion order, staged ones last.
    async fn entries(&mut self) -> Result<Vec<LedgerEntry>, WalletError>;

    async fn find_entry_by_idempotency_key(
        &mut self,
        key: &str,
    ) -> Result<Option<LedgerEntry>, WalletError>;

    /// Reads the balance projection and locks it for update.
    async fn balance_for_update(&mut self) -> Result<Option<Balance>, WalletError>;

    /// Appends a ledger entry. Fails if the idempotency key is taken.
    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<(), WalletError>;

    /// Adds `delta_minor` to the projection, creating the row if absent,
    /// and returns the updated projection.
    async fn apply_delta(
        &mut self,
        currency: &str,
        delta_minor: i64,
        at: DateTime<Utc>,
    ) -> Result<Balance, WalletError>;

    async fn insert_admin_action(&mut self, action: &AdminWalletAction) -> Result<(), WalletError>;

    async fn find_admin_action_by_entry(
        &mut self,
        entry_id: Uuid,
    ) -> Result<Option<AdminWalletAction>, WalletError>;

    /// Publishes all staged writes and releases the wallet lock.
    async fn commit(self: Box<Self>) -> Result<(), WalletError>;
}
