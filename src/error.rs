//! Crate-level error types.
//!
//! [`SwitchboardError`] unifies every error source (configuration, ledger,
//! routing, audit, JSON) behind a single enum so callers can match on the
//! variant they care about while still using the `?` operator. The ledger
//! and routing subsystems each keep their own narrower error type so their
//! callers can tell policy-relevant failures apart.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SwitchboardError>;

/// Opaque error returned by external collaborators (override store,
/// campaign evaluator, audit repository).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum SwitchboardError {
    /// Configuration could not be read, parsed, or validated.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem access failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Failures of the wallet ledger service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// Caller-supplied data failed a precondition (empty ids, non-positive
    /// amount, currency mismatch). Detected before any write.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced wallet or balance projection does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A debit exceeds the balance observed under the wallet lock.
    #[error("insufficient funds: balance {available} is below requested {requested}")]
    InsufficientFunds { available: i64, requested: i64 },

    /// Opaque infrastructure failure from the backing store.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl WalletError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Returns `true` if resubmitting the same request may succeed.
    ///
    /// Retrying is always safe with the same idempotency key.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

/// Failures of the routing decision engine.
///
/// Policy rejections are never errors; they are ordinary
/// [`Decision`](crate::models::Decision) values.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("workspace_id required")]
    MissingWorkspace,

    /// The caller supplied a role name outside the known set.
    #[error("invalid argument: {0}")]
    InvalidRole(#[from] crate::models::role::UnknownRole),

    /// A collaborator needed for this request was not wired.
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    /// The caller estimated a cost but omitted part of the wallet context.
    #[error("{0} required when estimated cost is provided")]
    MissingWalletContext(&'static str),

    /// An active override has no connect target.
    #[error("override {override_id:?} has an empty connect target")]
    EmptyOverrideTarget { override_id: Option<String> },

    /// The override store returned an override scoped to another
    /// workspace or campaign.
    #[error("override {override_id:?} does not match the requested workspace/campaign")]
    OverrideScopeMismatch { override_id: Option<String> },

    #[error("override store failed: {0}")]
    OverrideStore(#[source] BoxError),

    #[error("campaign evaluation failed: {0}")]
    Campaign(#[source] BoxError),

    /// Campaign, wallet or role resolution for an inbound call failed.
    #[error("route resolution failed: {0}")]
    Resolver(#[source] BoxError),

    #[error("balance lookup failed: {0}")]
    Wallet(#[from] WalletError),
}

impl RoutingError {
    /// Returns `true` for wiring/configuration mistakes of the embedding
    /// application, as opposed to data or infrastructure failures.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured(_)
                | Self::MissingWalletContext(_)
                | Self::EmptyOverrideTarget { .. }
                | Self::OverrideScopeMismatch { .. }
        )
    }
}

/// Failures of the internal audit side channel.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit queue is full")]
    QueueFull,

    #[error("audit worker has shut down")]
    Closed,

    #[error("invalid audit event: {0}")]
    Invalid(String),

    #[error("audit repository failed: {0}")]
    Repository(#[source] BoxError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_persistence_is_retryable() {
        assert!(WalletError::Persistence("timeout".into()).is_retryable());
        assert!(!WalletError::invalid("amount").is_retryable());
        assert!(
            !WalletError::InsufficientFunds {
                available: 1,
                requested: 2
            }
            .is_retryable()
        );
    }

    #[test]
    fn configuration_classification() {
        assert!(RoutingError::NotConfigured("campaign evaluator").is_configuration());
        assert!(RoutingError::MissingWalletContext("currency").is_configuration());
        assert!(!RoutingError::MissingWorkspace.is_configuration());
        assert!(!RoutingError::Wallet(WalletError::NotFound("w".into())).is_configuration());
    }

    #[test]
    fn display_errors() {
        let err = WalletError::InsufficientFunds {
            available: 1,
            requested: 10,
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: balance 1 is below requested 10"
        );

        let err = RoutingError::MissingWalletContext("wallet_id");
        assert_eq!(
            err.to_string(),
            "wallet_id required when estimated cost is provided"
        );
    }
}
