//! In-memory reference implementation of [`LedgerStore`].
//!
//! Each wallet lives behind its own async mutex, which plays the part of the
//! `SELECT ... FOR UPDATE` row lock: transactions on one wallet run one at a
//! time, transactions on different wallets never contend. Writes are staged
//! on the transaction and only become visible on commit.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use super::store::{LedgerStore, LedgerTransaction};
use crate::error::WalletError;
use crate::models::{AdminWalletAction, Balance, LedgerEntry, Wallet};

type WalletKey = (String, String);

/// Committed rows of a single wallet.
#[derive(Debug)]
struct WalletBook {
    wallet: Wallet,
    balance: Option<Balance>,
    entries: Vec<LedgerEntry>,
    admin_actions: Vec<AdminWalletAction>,
}

/// Points at which a transaction can be made to fail, for exercising
/// rollback paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    InsertEntry,
    ApplyDelta,
    InsertAdminAction,
    Commit,
}

/// Process-local ledger store.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    books: RwLock<HashMap<WalletKey, Arc<AsyncMutex<WalletBook>>>>,
    faults: Arc<Mutex<HashSet<FailPoint>>>,
}

impl MemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a wallet.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidArgument`] if the wallet already exists.
    pub fn create_wallet(&self, wallet: Wallet) -> Result<(), WalletError> {
        let key = (wallet.workspace_id.clone(), wallet.id.clone());
        let mut books = self.books.write().unwrap_or_else(PoisonError::into_inner);
        if books.contains_key(&key) {
            return Err(WalletError::invalid(format!(
                "wallet {} already exists",
                wallet.id
            )));
        }
        books.insert(
            key,
            Arc::new(AsyncMutex::new(WalletBook {
                wallet,
                balance: None,
                entries: Vec::new(),
                admin_actions: Vec::new(),
            })),
        );
        Ok(())
    }

    /// Makes the next transaction that reaches `point` fail with a
    /// persistence error.
    pub fn fail_next(&self, point: FailPoint) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point);
    }

    /// Returns every admin action recorded for a wallet.
    pub async fn admin_actions(
        &self,
        workspace_id: &str,
        wallet_id: &str,
    ) -> Vec<AdminWalletAction> {
        match self.book(workspace_id, wallet_id) {
            Some(book) => book.lock().await.admin_actions.clone(),
            None => Vec::new(),
        }
    }

    fn book(&self, workspace_id: &str, wallet_id: &str) -> Option<Arc<AsyncMutex<WalletBook>>> {
        let key = (workspace_id.to_string(), wallet_id.to_string());
        self.books
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(
        &self,
        workspace_id: &str,
        wallet_id: &str,
    ) -> Result<Box<dyn LedgerTransaction>, WalletError> {
        let book = self
            .book(workspace_id, wallet_id)
            .ok_or_else(|| WalletError::NotFound(format!("wallet {wallet_id}")))?;
        let book = book.lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            book,
            staged_entries: Vec::new(),
            staged_balance: None,
            staged_actions: Vec::new(),
            faults: Arc::clone(&self.faults),
        }))
    }

    async fn balance(
        &self,
        workspace_id: &str,
        wallet_id: &str,
    ) -> Result<Option<Balance>, WalletError> {
        match self.book(workspace_id, wallet_id) {
            Some(book) => Ok(book.lock().await.balance.clone()),
            None => Ok(None),
        }
    }
}

struct MemoryTransaction {
    book: OwnedMutexGuard<WalletBook>,
    staged_entries: Vec<LedgerEntry>,
    staged_balance: Option<Balance>,
    staged_actions: Vec<AdminWalletAction>,
    faults: Arc<Mutex<HashSet<FailPoint>>>,
}

impl MemoryTransaction {
    fn trip(&self, point: FailPoint) -> Result<(), WalletError> {
        let tripped = self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&point);
        if tripped {
            return Err(WalletError::Persistence(format!(
                "injected failure at {point:?}"
            )));
        }
        Ok(())
    }

    fn current_balance(&self) -> Option<&Balance> {
        self.staged_balance.as_ref().or(self.book.balance.as_ref())
    }
}

#[async_trait]
impl LedgerTransaction for MemoryTransaction {
    fn wallet(&self) -> &Wallet {
        &self.book.wallet
    }

    async fn entries(&mut self) -> Result<Vec<LedgerEntry>, WalletError> {
        Ok(self
            .book
            .entries
            .iter()
            .chain(self.staged_entries.iter())
            .cloned()
            .collect())
    }

    async fn find_entry_by_idempotency_key(
        &mut self,
        key: &str,
    ) -> Result<Option<LedgerEntry>, WalletError> {
        Ok(self
            .book
            .entries
            .iter()
            .chain(self.staged_entries.iter())
            .find(|e| e.idempotency_key == key)
            .cloned())
    }

    async fn balance_for_update(&mut self) -> Result<Option<Balance>, WalletError> {
        Ok(self.current_balance().cloned())
    }

    async fn insert_entry(&mut self, entry: &LedgerEntry) -> Result<(), WalletError> {
        self.trip(FailPoint::InsertEntry)?;
        if self
            .find_entry_by_idempotency_key(&entry.idempotency_key)
            .await?
            .is_some()
        {
            return Err(WalletError::Persistence(format!(
                "duplicate idempotency key {}",
                entry.idempotency_key
            )));
        }
        self.staged_entries.push(entry.clone());
        Ok(())
    }

    async fn apply_delta(
        &mut self,
        currency: &str,
        delta_minor: i64,
        at: DateTime<Utc>,
    ) -> Result<Balance, WalletError> {
        self.trip(FailPoint::ApplyDelta)?;
        let next = match self.current_balance() {
            Some(current) => {
                let balance_minor = current
                    .balance_minor
                    .checked_add(delta_minor)
                    .ok_or_else(|| WalletError::Persistence("balance overflow".to_string()))?;
                Balance {
                    balance_minor,
                    updated_at: at,
                    ..current.clone()
                }
            }
            None => Balance {
                workspace_id: self.book.wallet.workspace_id.clone(),
                wallet_id: self.book.wallet.id.clone(),
                currency: currency.to_string(),
                balance_minor: delta_minor,
                updated_at: at,
            },
        };
        self.staged_balance = Some(next.clone());
        Ok(next)
    }

    async fn insert_admin_action(&mut self, action: &AdminWalletAction) -> Result<(), WalletError> {
        self.trip(FailPoint::InsertAdminAction)?;
        self.staged_actions.push(action.clone());
        Ok(())
    }

    async fn find_admin_action_by_entry(
        &mut self,
        entry_id: Uuid,
    ) -> Result<Option<AdminWalletAction>, WalletError> {
        Ok(self
            .book
            .admin_actions
            .iter()
            .chain(self.staged_actions.iter())
            .find(|a| a.related_ledger_id == Some(entry_id))
            .cloned())
    }

    async fn commit(self: Box<Self>) -> Result<(), WalletError> {
        self.trip(FailPoint::Commit)?;
        let MemoryTransaction {
            mut book,
            staged_entries,
            staged_balance,
            staged_actions,
            ..
        } = *self;
        book.entries.extend(staged_entries);
        if let Some(balance) = staged_balance {
            book.balance = Some(balance);
        }
        book.admin_actions.extend(staged_actions);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LedgerEntryType, WalletStatus};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn store_with_wallet() -> MemoryLedgerStore {
        let store = MemoryLedgerStore::new();
        store
            .create_wallet(Wallet::new("ws", "wal", "USD", WalletStatus::Active, at()))
            .unwrap();
        store
    }

    fn entry(key: &str, amount: i64) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            workspace_id: "ws".into(),
            wallet_id: "wal".into(),
            entry_type: LedgerEntryType::Credit,
            amount_minor: amount,
            currency: "USD".into(),
            external_ref: None,
            idempotency_key: key.into(),
            metadata: None,
            created_at: at(),
        }
    }

    #[tokio::test]
    async fn duplicate_wallet_rejected() {
        let store = store_with_wallet();
        let err = store
            .create_wallet(Wallet::new("ws", "wal", "EUR", WalletStatus::Active, at()))
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn unknown_wallet_not_found() {
        let store = store_with_wallet();
        assert!(matches!(
            store.begin("ws", "nope").await.err(),
            Some(WalletError::NotFound(_))
        ));
        assert!(matches!(
            store.begin("other-ws", "wal").await.err(),
            Some(WalletError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn writes_invisible_until_commit() {
        let store = store_with_wallet();
        let mut tx = store.begin("ws", "wal").await.unwrap();
        tx.insert_entry(&entry("k1", 50)).await.unwrap();
        let staged = tx.apply_delta("USD", 50, at()).await.unwrap();
        assert_eq!(staged.balance_minor, 50);
        assert!(tx.find_entry_by_idempotency_key("k1").await.unwrap().is_some());
        assert_eq!(tx.entries().await.unwrap().len(), 1);
        drop(tx);

        assert_eq!(store.balance("ws", "wal").await.unwrap(), None);
        let mut tx = store.begin("ws", "wal").await.unwrap();
        assert!(tx.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_publishes_everything() {
        let store = store_with_wallet();
        let mut tx = store.begin("ws", "wal").await.unwrap();
        tx.insert_entry(&entry("k1", 50)).await.unwrap();
        tx.apply_delta("USD", 50, at()).await.unwrap();
        tx.commit().await.unwrap();

        let balance = store.balance("ws", "wal").await.unwrap().unwrap();
        assert_eq!(balance.balance_minor, 50);
        assert_eq!(balance.currency, "USD");
        let mut tx = store.begin("ws", "wal").await.unwrap();
        assert_eq!(tx.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_key_in_transaction_fails() {
        let store = store_with_wallet();
        let mut tx = store.begin("ws", "wal").await.unwrap();
        tx.insert_entry(&entry("k1", 1)).await.unwrap();
        let err = tx.insert_entry(&entry("k1", 2)).await.unwrap_err();
        assert!(matches!(err, WalletError::Persistence(_)));
    }

    #[tokio::test]
    async fn fail_point_fires_once() {
        let store = store_with_wallet();
        store.fail_next(FailPoint::Commit);

        let tx = store.begin("ws", "wal").await.unwrap();
        assert!(tx.commit().await.unwrap_err().is_retryable());

        let tx = store.begin("ws", "wal").await.unwrap();
        assert!(tx.commit().await.is_ok());
    }
}
