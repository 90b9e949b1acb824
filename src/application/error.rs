use thiserror::Error;

use crate::domain::{Cents, TransactionId, WalletId};

/// Which spending cap a rejected request ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPeriod {
    Daily,
    Monthly,
}

impl std::fmt::Display for LimitPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitPeriod::Daily => write!(f, "daily"),
            LimitPeriod::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("wallet not found: {0}")]
    WalletNotFound(WalletId),

    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("wallet {0} is inactive")]
    WalletInactive(WalletId),

    #[error("wallet {wallet} still holds {balance} cents and cannot be deactivated")]
    NonZeroBalance { wallet: WalletId, balance: Cents },

    #[error("insufficient funds in wallet {wallet}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        wallet: WalletId,
        balance: Cents,
        requested: Cents,
    },

    #[error("invalid amount: {0} (amounts are positive cents)")]
    InvalidAmount(Cents),

    #[error("source and destination wallets must differ")]
    SelfTransfer,

    #[error("transaction {0} is already finalized")]
    TransactionFinalized(TransactionId),

    #[error("invalid limit: {0}")]
    InvalidLimit(&'static str),

    #[error("{period} limit exceeded: spent {spent} + requested {requested} > cap {cap} (cents)")]
    LimitExceeded {
        period: LimitPeriod,
        cap: Cents,
        spent: Cents,
        requested: Cents,
    },

    /// A transfer debited the source, failed to credit the destination, and the
    /// compensating re-credit failed too. Money is in flight and only manual
    /// reconciliation can recover it; callers must not retry.
    #[error(
        "fatal inconsistency in transaction {transaction}: {amount_cents} cents debited from \
         wallet {wallet} could not be restored; manual reconciliation required"
    )]
    FatalInconsistency {
        transaction: TransactionId,
        wallet: WalletId,
        amount_cents: Cents,
        #[source]
        source: anyhow::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// Errors a caller may safely retry after the underlying condition clears.
    /// `FatalInconsistency` is the one error that must never be retried:
    /// replaying the transfer risks moving the funds twice.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AppError::FatalInconsistency { .. })
    }
}
