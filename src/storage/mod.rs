use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::AppError;
use crate::domain::{
    Cents, Page, Transaction, TransactionId, TransactionLimit, TransactionStatus,
    TransactionType, UserId, Wallet, WalletId,
};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// SQL migration for the initial schema.
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// Persistence of wallet rows and the atomic balance adjustment.
///
/// `adjust_balance` is the single serialization point of the whole system:
/// the existence/status/funds checks and the write happen inside one
/// per-wallet critical section, so no other adjustment on the same wallet
/// can observe an intermediate value. Balances are never assigned directly.
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn create(&self, wallet: &Wallet) -> Result<(), AppError>;

    async fn get(&self, id: WalletId) -> Result<Wallet, AppError>;

    /// A user's wallets, newest first.
    async fn get_by_user(&self, user_id: UserId) -> Result<Vec<Wallet>, AppError>;

    /// Apply `delta` (positive or negative) to the wallet balance and return
    /// the new balance. Rejects with `WalletNotFound`, `WalletInactive`, or
    /// `InsufficientFunds` when `balance + delta < 0`.
    async fn adjust_balance(&self, id: WalletId, delta: Cents) -> Result<Cents, AppError>;

    /// Mark the wallet inactive. Only a wallet with a zero balance can be
    /// deactivated (`NonZeroBalance` otherwise).
    async fn deactivate(&self, id: WalletId) -> Result<(), AppError>;
}

/// Append-only record of money movements with a one-way status lifecycle.
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// Insert a pending movement with its pre-assigned identity and reference.
    async fn create(&self, tx: &Transaction) -> Result<(), AppError>;

    /// Finalize a pending movement. Transitioning a non-pending record fails
    /// with `TransactionFinalized`; this is the guard against a double
    /// completion racing a failure.
    async fn update_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<(), AppError>;

    async fn get(&self, id: TransactionId) -> Result<Transaction, AppError>;

    /// Movements touching the wallet as source or destination, newest first.
    async fn get_by_wallet(
        &self,
        wallet_id: WalletId,
        page: Page,
    ) -> Result<Vec<Transaction>, AppError>;

    /// Movements touching any wallet of the user, newest first.
    async fn get_by_user(&self, user_id: UserId, page: Page)
    -> Result<Vec<Transaction>, AppError>;

    /// Sum of the user's outgoing movement amounts of `kind` created at or
    /// after `since`. Failed movements are excluded; pending ones count, so
    /// concurrent requests cannot slip past a spending cap together.
    async fn sum_amounts_since(
        &self,
        user_id: UserId,
        kind: TransactionType,
        since: DateTime<Utc>,
    ) -> Result<Cents, AppError>;
}

/// Per-user spending cap records.
#[async_trait]
pub trait LimitStore: Send + Sync {
    /// Create the limit, or update the caps in place when a row for the
    /// (user, kind) pair already exists. Identity and creation time of an
    /// existing row are preserved. Returns the stored row.
    async fn upsert(&self, limit: &TransactionLimit) -> Result<TransactionLimit, AppError>;

    async fn get(
        &self,
        user_id: UserId,
        kind: TransactionType,
    ) -> Result<Option<TransactionLimit>, AppError>;

    /// All limits of a user, newest first.
    async fn get_by_user(&self, user_id: UserId) -> Result<Vec<TransactionLimit>, AppError>;
}
