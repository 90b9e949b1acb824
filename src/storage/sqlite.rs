use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::application::AppError;
use crate::domain::{
    Cents, Page, Transaction, TransactionId, TransactionLimit, TransactionStatus,
    TransactionType, UserId, Wallet, WalletId, WalletStatus,
};

use super::{LimitStore, MIGRATION_001_INITIAL, TransactionLedger, WalletStore};

/// SQLite-backed store implementing all three persistence ports.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a store over an existing SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let url = format!("sqlite:{}", database_path);
        let pool = SqlitePool::connect(&url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (create file if absent, connect, migrate).
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let url = format!("sqlite:{}?mode=rwc", database_path);
        let pool = SqlitePool::connect(&url)
            .await
            .context("Failed to create database")?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    fn row_to_wallet(row: &sqlx::sqlite::SqliteRow) -> Result<Wallet> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");

        Ok(Wallet {
            id: Uuid::parse_str(&id_str).context("Invalid wallet ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            wallet_number: row.get("wallet_number"),
            balance_cents: row.get("balance_cents"),
            status: WalletStatus::from_str(&status_str)
                .ok_or_else(|| anyhow!("Invalid wallet status: {}", status_str))?,
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let source_str: String = row.get("source_wallet_id");
        let destination_str: Option<String> = row.get("destination_wallet_id");
        let kind_str: String = row.get("kind");
        let reference_str: String = row.get("reference");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            source_wallet: Uuid::parse_str(&source_str).context("Invalid source wallet ID")?,
            destination_wallet: destination_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid destination wallet ID")?,
            kind: TransactionType::from_str(&kind_str)
                .ok_or_else(|| anyhow!("Invalid transaction kind: {}", kind_str))?,
            amount_cents: row.get("amount_cents"),
            reference: Uuid::parse_str(&reference_str).context("Invalid reference")?,
            status: TransactionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow!("Invalid transaction status: {}", status_str))?,
            description: row.get("description"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    fn row_to_limit(row: &sqlx::sqlite::SqliteRow) -> Result<TransactionLimit> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");
        let kind_str: String = row.get("kind");
        let created_at_str: String = row.get("created_at");

        Ok(TransactionLimit {
            id: Uuid::parse_str(&id_str).context("Invalid limit ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            kind: TransactionType::from_str(&kind_str)
                .ok_or_else(|| anyhow!("Invalid transaction kind: {}", kind_str))?,
            daily_cents: row.get("daily_cents"),
            monthly_cents: row.get("monthly_cents"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .context("Invalid timestamp")?
        .with_timezone(&Utc))
}

#[async_trait]
impl WalletStore for SqliteStore {
    async fn create(&self, wallet: &Wallet) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id, wallet_number, balance_cents, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(wallet.id.to_string())
        .bind(wallet.user_id.to_string())
        .bind(&wallet.wallet_number)
        .bind(wallet.balance_cents)
        .bind(wallet.status.as_str())
        .bind(wallet.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save wallet")?;
        Ok(())
    }

    async fn get(&self, id: WalletId) -> Result<Wallet, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, wallet_number, balance_cents, status, created_at
            FROM wallets
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch wallet")?;

        match row {
            Some(row) => Ok(Self::row_to_wallet(&row)?),
            None => Err(AppError::WalletNotFound(id)),
        }
    }

    async fn get_by_user(&self, user_id: UserId) -> Result<Vec<Wallet>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, wallet_number, balance_cents, status, created_at
            FROM wallets
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list wallets")?;

        Ok(rows
            .iter()
            .map(Self::row_to_wallet)
            .collect::<Result<Vec<_>>>()?)
    }

    async fn adjust_balance(&self, id: WalletId, delta: Cents) -> Result<Cents, AppError> {
        // One guarded statement: SQLite serializes writers, so the status and
        // funds checks commit atomically with the new balance. A transaction
        // wrapping SELECT-then-UPDATE would not give us that on this engine.
        let row = sqlx::query(
            r#"
            UPDATE wallets
            SET balance_cents = balance_cents + ?1
            WHERE id = ?2 AND status = 'active' AND balance_cents + ?1 >= 0
            RETURNING balance_cents
            "#,
        )
        .bind(delta)
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to adjust wallet balance")?;

        match row {
            Some(row) => Ok(row.get("balance_cents")),
            None => {
                // The guard refused; a follow-up read names the reason.
                let wallet = WalletStore::get(self, id).await?;
                if !wallet.is_active() {
                    Err(AppError::WalletInactive(id))
                } else {
                    Err(AppError::InsufficientFunds {
                        wallet: id,
                        balance: wallet.balance_cents,
                        requested: -delta,
                    })
                }
            }
        }
    }

    async fn deactivate(&self, id: WalletId) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE wallets
            SET status = 'inactive'
            WHERE id = ? AND status = 'active' AND balance_cents = 0
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to deactivate wallet")?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let wallet = WalletStore::get(self, id).await?;
        if !wallet.is_active() {
            Err(AppError::WalletInactive(id))
        } else {
            Err(AppError::NonZeroBalance {
                wallet: id,
                balance: wallet.balance_cents,
            })
        }
    }
}

#[async_trait]
impl TransactionLedger for SqliteStore {
    async fn create(&self, tx: &Transaction) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO transactions
            (id, source_wallet_id, destination_wallet_id, kind, amount_cents, reference, status, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tx.id.to_string())
        .bind(tx.source_wallet.to_string())
        .bind(tx.destination_wallet.map(|id| id.to_string()))
        .bind(tx.kind.as_str())
        .bind(tx.amount_cents)
        .bind(tx.reference.to_string())
        .bind(tx.status.as_str())
        .bind(&tx.description)
        .bind(tx.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save transaction")?;
        Ok(())
    }

    async fn update_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<(), AppError> {
        debug_assert!(TransactionStatus::Pending.can_transition_to(status));

        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = ?1
            WHERE id = ?2 AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update transaction status")?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Either the row is missing or it was finalized by someone else.
        TransactionLedger::get(self, id).await?;
        Err(AppError::TransactionFinalized(id))
    }

    async fn get(&self, id: TransactionId) -> Result<Transaction, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, source_wallet_id, destination_wallet_id, kind, amount_cents,
                   reference, status, description, created_at
            FROM transactions
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        match row {
            Some(row) => Ok(Self::row_to_transaction(&row)?),
            None => Err(AppError::TransactionNotFound(id)),
        }
    }

    async fn get_by_wallet(
        &self,
        wallet_id: WalletId,
        page: Page,
    ) -> Result<Vec<Transaction>, AppError> {
        let wallet_id_str = wallet_id.to_string();
        let rows = sqlx::query(
            r#"
            SELECT id, source_wallet_id, destination_wallet_id, kind, amount_cents,
                   reference, status, description, created_at
            FROM transactions
            WHERE source_wallet_id = ?1 OR destination_wallet_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(&wallet_id_str)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list wallet transactions")?;

        Ok(rows
            .iter()
            .map(Self::row_to_transaction)
            .collect::<Result<Vec<_>>>()?)
    }

    async fn get_by_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Transaction>, AppError> {
        // DISTINCT: a transfer between two wallets of the same user would
        // otherwise match the join twice.
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT t.id, t.source_wallet_id, t.destination_wallet_id, t.kind,
                   t.amount_cents, t.reference, t.status, t.description, t.created_at
            FROM transactions t
            INNER JOIN wallets w
                ON t.source_wallet_id = w.id OR t.destination_wallet_id = w.id
            WHERE w.user_id = ?1
            ORDER BY t.created_at DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(user_id.to_string())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list user transactions")?;

        Ok(rows
            .iter()
            .map(Self::row_to_transaction)
            .collect::<Result<Vec<_>>>()?)
    }

    async fn sum_amounts_since(
        &self,
        user_id: UserId,
        kind: TransactionType,
        since: DateTime<Utc>,
    ) -> Result<Cents, AppError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0) AS total
            FROM transactions
            WHERE source_wallet_id IN (SELECT id FROM wallets WHERE user_id = ?)
              AND kind = ?
              AND status != 'failed'
              AND created_at >= ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(kind.as_str())
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum transaction amounts")?;

        Ok(row.get("total"))
    }
}

#[async_trait]
impl LimitStore for SqliteStore {
    async fn upsert(&self, limit: &TransactionLimit) -> Result<TransactionLimit, AppError> {
        // ON CONFLICT keeps the existing row's identity and creation time.
        sqlx::query(
            r#"
            INSERT INTO transaction_limits (id, user_id, kind, daily_cents, monthly_cents, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, kind) DO UPDATE SET
                daily_cents = excluded.daily_cents,
                monthly_cents = excluded.monthly_cents
            "#,
        )
        .bind(limit.id.to_string())
        .bind(limit.user_id.to_string())
        .bind(limit.kind.as_str())
        .bind(limit.daily_cents)
        .bind(limit.monthly_cents)
        .bind(limit.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to upsert transaction limit")?;

        LimitStore::get(self, limit.user_id, limit.kind)
            .await?
            .ok_or_else(|| AppError::Database(anyhow!("Upserted limit disappeared")))
    }

    async fn get(
        &self,
        user_id: UserId,
        kind: TransactionType,
    ) -> Result<Option<TransactionLimit>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, kind, daily_cents, monthly_cents, created_at
            FROM transaction_limits
            WHERE user_id = ? AND kind = ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction limit")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_limit(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_by_user(&self, user_id: UserId) -> Result<Vec<TransactionLimit>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, kind, daily_cents, monthly_cents, created_at
            FROM transaction_limits
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transaction limits")?;

        Ok(rows
            .iter()
            .map(Self::row_to_limit)
            .collect::<Result<Vec<_>>>()?)
    }
}
