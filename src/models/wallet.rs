//! Wallet, ledger, and balance records.
//!
//! Amounts are integers in minor currency units (e.g. cents). Credits are
//! positive, debits negative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// A tenant-scoped prepaid wallet.
///
/// Money state never lives here; the balance is derived from ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub workspace_id: String,
    /// Settlement currency; every posting must use it.
    pub currency: String,
    pub status: WalletStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(
        workspace_id: impl Into<String>,
        id: impl Into<String>,
        currency: impl Into<String>,
        status: WalletStatus,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
            currency: currency.into(),
            status,
            created_at: at,
            updated_at: at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    Active,
    Disabled,
}

/// Ledger entry category. Wire names are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerEntryType {
    /// Top-up or adjustment.
    Credit,
    /// Usage charge or fee.
    Debit,
    Hold,
    Release,
}

/// An immutable, append-only ledger fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub workspace_id: String,
    pub wallet_id: String,
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    /// Signed amount in minor units.
    pub amount_minor: i64,
    pub currency: String,
    /// Call id, invoice id, provider event id, and so on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    /// Unique per workspace + wallet.
    pub idempotency_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Current-balance projection for one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub workspace_id: String,
    pub wallet_id: String,
    pub currency: String,
    pub balance_minor: i64,
    pub updated_at: DateTime<Utc>,
}

/// Record of a privileged manual wallet action.
///
/// Written only in the same transaction as the ledger entry it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminWalletAction {
    pub id: Uuid,
    pub workspace_id: String,
    pub wallet_id: String,
    pub admin_user_id: String,
    /// Role at the time of the action; may be a hidden role.
    pub admin_role: Role,
    pub action: AdminWalletActionType,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_minor: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_ledger_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminWalletActionType {
    AdjustBalance,
    Freeze,
    Unfreeze,
}

/// The administrator performing a privileged wallet action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminActor {
    pub user_id: String,
    pub role: Role,
}

/// Parameters shared by ordinary credits and debits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingRequest {
    /// Strictly positive amount in minor units.
    pub amount_minor: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    pub idempotency_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

pub type CreditRequest = PostingRequest;
pub type DebitRequest = PostingRequest;

/// Parameters for an administrator's manual credit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCreditRequest {
    pub amount_minor: i64,
    pub currency: String,
    /// Human justification; required.
    pub reason: String,
    pub idempotency_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl PostingRequest {
    pub fn new(
        amount_minor: i64,
        currency: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            amount_minor,
            currency: currency.into(),
            idempotency_key: idempotency_key.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }
}
