use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::{
    Cents, Page, Transaction, TransactionId, TransactionLimit, TransactionStatus,
    TransactionType, UserId, Wallet, WalletId,
};
use crate::storage::{LimitStore, MemoryStore, SqliteStore, TransactionLedger, WalletStore};

use super::AppError;
use super::limits::LimitPolicy;

/// High-level money-movement operations: wallet lifecycle, deposits,
/// withdrawals and transfers. This is the primary interface for any client
/// (API, CLI, test harness).
///
/// There is no in-process global lock: the only serialization point is the
/// per-wallet critical section inside `WalletStore::adjust_balance`, so
/// operations on disjoint wallets run fully in parallel.
pub struct WalletService {
    wallets: Arc<dyn WalletStore>,
    ledger: Arc<dyn TransactionLedger>,
    limits: LimitPolicy,
}

impl WalletService {
    pub fn new(
        wallets: Arc<dyn WalletStore>,
        ledger: Arc<dyn TransactionLedger>,
        limits: LimitPolicy,
    ) -> Self {
        Self {
            wallets,
            ledger,
            limits,
        }
    }

    /// Build a service over any store implementing all three ports.
    pub fn with_store<S>(store: Arc<S>) -> Self
    where
        S: WalletStore + TransactionLedger + LimitStore + 'static,
    {
        let wallets: Arc<dyn WalletStore> = store.clone();
        let ledger: Arc<dyn TransactionLedger> = store.clone();
        let limit_store: Arc<dyn LimitStore> = store;
        let limits = LimitPolicy::new(ledger.clone(), limit_store);
        Self::new(wallets, ledger, limits)
    }

    /// Initialize a new SQLite-backed service at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        Ok(Self::with_store(Arc::new(SqliteStore::init(database_path).await?)))
    }

    /// Connect to an existing SQLite database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        Ok(Self::with_store(Arc::new(
            SqliteStore::connect(database_path).await?,
        )))
    }

    /// Service over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    // ========================
    // Wallet operations
    // ========================

    /// Create a wallet for the user: zero balance, active, fresh number.
    pub async fn create_wallet(&self, user_id: UserId) -> Result<Wallet, AppError> {
        let wallet = Wallet::new(user_id);
        self.wallets.create(&wallet).await?;
        info!(wallet = %wallet.id, user = %user_id, "wallet created");
        Ok(wallet)
    }

    pub async fn get_wallet(&self, id: WalletId) -> Result<Wallet, AppError> {
        self.wallets.get(id).await
    }

    pub async fn get_user_wallets(&self, user_id: UserId) -> Result<Vec<Wallet>, AppError> {
        self.wallets.get_by_user(user_id).await
    }

    /// Deactivate a wallet. Rejected unless the balance is exactly zero.
    pub async fn deactivate_wallet(&self, id: WalletId) -> Result<(), AppError> {
        self.wallets.deactivate(id).await?;
        info!(wallet = %id, "wallet deactivated");
        Ok(())
    }

    // ========================
    // Money movement
    // ========================

    /// Credit `amount_cents` to the wallet.
    pub async fn deposit(
        &self,
        wallet_id: WalletId,
        amount_cents: Cents,
        description: Option<String>,
    ) -> Result<Transaction, AppError> {
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(amount_cents));
        }

        let wallet = self.wallets.get(wallet_id).await?;
        if !wallet.is_active() {
            return Err(AppError::WalletInactive(wallet_id));
        }
        self.limits
            .check(wallet.user_id, TransactionType::Deposit, amount_cents)
            .await?;

        let mut tx = Transaction::new(wallet_id, TransactionType::Deposit, amount_cents);
        if let Some(description) = description {
            tx = tx.with_description(description);
        }
        self.ledger.create(&tx).await?;

        match self.wallets.adjust_balance(wallet_id, amount_cents).await {
            Ok(balance) => {
                self.ledger
                    .update_status(tx.id, TransactionStatus::Completed)
                    .await?;
                tx.status = TransactionStatus::Completed;
                info!(transaction = %tx.id, wallet = %wallet_id, amount_cents, balance, "deposit completed");
                Ok(tx)
            }
            Err(err) => {
                self.mark_failed(&tx).await;
                Err(err)
            }
        }
    }

    /// Debit `amount_cents` from the wallet.
    pub async fn withdraw(
        &self,
        wallet_id: WalletId,
        amount_cents: Cents,
        description: Option<String>,
    ) -> Result<Transaction, AppError> {
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(amount_cents));
        }

        let wallet = self.wallets.get(wallet_id).await?;
        if !wallet.is_active() {
            return Err(AppError::WalletInactive(wallet_id));
        }
        // Fail fast on an unlocked read so the common rejection never creates
        // a ledger row. The locked check inside adjust_balance stays
        // authoritative.
        if wallet.balance_cents < amount_cents {
            return Err(AppError::InsufficientFunds {
                wallet: wallet_id,
                balance: wallet.balance_cents,
                requested: amount_cents,
            });
        }
        self.limits
            .check(wallet.user_id, TransactionType::Withdraw, amount_cents)
            .await?;

        let mut tx = Transaction::new(wallet_id, TransactionType::Withdraw, amount_cents);
        if let Some(description) = description {
            tx = tx.with_description(description);
        }
        self.ledger.create(&tx).await?;

        match self.wallets.adjust_balance(wallet_id, -amount_cents).await {
            Ok(balance) => {
                self.ledger
                    .update_status(tx.id, TransactionStatus::Completed)
                    .await?;
                tx.status = TransactionStatus::Completed;
                info!(transaction = %tx.id, wallet = %wallet_id, amount_cents, balance, "withdrawal completed");
                Ok(tx)
            }
            Err(err) => {
                self.mark_failed(&tx).await;
                Err(err)
            }
        }
    }

    /// Move `amount_cents` between two wallets.
    ///
    /// The two legs cannot be committed as one atomic unit across wallet
    /// rows, so this runs as a saga: debit the source, credit the
    /// destination, and on a credit failure re-credit the source. Each leg
    /// holds only its own wallet's lock and releases it before the next leg
    /// acquires one, so concurrent transfers in opposite directions cannot
    /// deadlock.
    pub async fn transfer(
        &self,
        source_id: WalletId,
        destination_id: WalletId,
        amount_cents: Cents,
        description: Option<String>,
    ) -> Result<Transaction, AppError> {
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(amount_cents));
        }
        if source_id == destination_id {
            return Err(AppError::SelfTransfer);
        }

        let source = self.wallets.get(source_id).await?;
        if !source.is_active() {
            return Err(AppError::WalletInactive(source_id));
        }
        let destination = self.wallets.get(destination_id).await?;
        if !destination.is_active() {
            return Err(AppError::WalletInactive(destination_id));
        }
        if source.balance_cents < amount_cents {
            return Err(AppError::InsufficientFunds {
                wallet: source_id,
                balance: source.balance_cents,
                requested: amount_cents,
            });
        }
        self.limits
            .check(source.user_id, TransactionType::Transfer, amount_cents)
            .await?;

        let mut tx = Transaction::new(source_id, TransactionType::Transfer, amount_cents)
            .with_destination(destination_id);
        if let Some(description) = description {
            tx = tx.with_description(description);
        }
        self.ledger.create(&tx).await?;

        // Leg 1: debit. A failure here means no money has moved.
        if let Err(debit_err) = self.wallets.adjust_balance(source_id, -amount_cents).await {
            self.mark_failed(&tx).await;
            return Err(debit_err);
        }

        // Leg 2: credit, compensating the debit when it fails.
        if let Err(credit_err) = self
            .wallets
            .adjust_balance(destination_id, amount_cents)
            .await
        {
            warn!(transaction = %tx.id, destination = %destination_id, error = %credit_err, "credit leg failed, compensating source");
            if let Err(undo_err) = self.wallets.adjust_balance(source_id, amount_cents).await {
                // The debited amount is in flight: not in either wallet. The
                // row stays pending as the reconciliation marker; retrying
                // could credit the source twice.
                error!(
                    transaction = %tx.id,
                    wallet = %source_id,
                    amount_cents,
                    credit_error = %credit_err,
                    undo_error = %undo_err,
                    "compensating credit failed; manual reconciliation required"
                );
                return Err(AppError::FatalInconsistency {
                    transaction: tx.id,
                    wallet: source_id,
                    amount_cents,
                    source: anyhow::Error::new(undo_err),
                });
            }
            self.mark_failed(&tx).await;
            return Err(credit_err);
        }

        self.ledger
            .update_status(tx.id, TransactionStatus::Completed)
            .await?;
        tx.status = TransactionStatus::Completed;
        info!(transaction = %tx.id, source = %source_id, destination = %destination_id, amount_cents, "transfer completed");
        Ok(tx)
    }

    // ========================
    // Ledger reads
    // ========================

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.ledger.get(id).await
    }

    pub async fn wallet_transactions(
        &self,
        wallet_id: WalletId,
        page: Page,
    ) -> Result<Vec<Transaction>, AppError> {
        self.ledger.get_by_wallet(wallet_id, page).await
    }

    pub async fn user_transactions(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Transaction>, AppError> {
        self.ledger.get_by_user(user_id, page).await
    }

    // ========================
    // Limits
    // ========================

    pub async fn set_limit(
        &self,
        user_id: UserId,
        kind: TransactionType,
        daily_cents: Cents,
        monthly_cents: Cents,
    ) -> Result<TransactionLimit, AppError> {
        self.limits.set(user_id, kind, daily_cents, monthly_cents).await
    }

    pub async fn get_limit(
        &self,
        user_id: UserId,
        kind: TransactionType,
    ) -> Result<Option<TransactionLimit>, AppError> {
        self.limits.get(user_id, kind).await
    }

    pub async fn user_limits(&self, user_id: UserId) -> Result<Vec<TransactionLimit>, AppError> {
        self.limits.get_for_user(user_id).await
    }

    /// Record the failed status on a movement whose leg was rejected. A
    /// failure of this bookkeeping write must not mask the original error.
    async fn mark_failed(&self, tx: &Transaction) {
        if let Err(status_err) = self
            .ledger
            .update_status(tx.id, TransactionStatus::Failed)
            .await
        {
            warn!(transaction = %tx.id, error = %status_err, "could not record failed status");
        }
    }
}
