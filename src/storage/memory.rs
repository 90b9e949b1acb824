use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::application::AppError;
use crate::domain::{
    Cents, Page, Transaction, TransactionId, TransactionLimit, TransactionStatus,
    TransactionType, UserId, Wallet, WalletId, WalletStatus,
};

use super::{LimitStore, TransactionLedger, WalletStore};

/// In-memory store implementing the same three ports as the SQLite backend.
///
/// Wallet rows are individually locked: `adjust_balance` holds exactly one
/// per-wallet mutex across its check-and-write, so adjustments on the same
/// wallet serialize while disjoint wallets proceed in parallel. Clones share
/// the underlying tables.
#[derive(Default, Clone)]
pub struct MemoryStore {
    wallets: Arc<RwLock<HashMap<WalletId, Arc<Mutex<Wallet>>>>>,
    transactions: Arc<RwLock<HashMap<TransactionId, Transaction>>>,
    limits: Arc<RwLock<HashMap<(UserId, TransactionType), TransactionLimit>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of the user's wallets. Row locks are taken briefly, one at a time.
    async fn wallet_ids_of(&self, user_id: UserId) -> Vec<WalletId> {
        let wallets = self.wallets.read().await;
        let mut ids = Vec::new();
        for (id, cell) in wallets.iter() {
            if cell.lock().await.user_id == user_id {
                ids.push(*id);
            }
        }
        ids
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn create(&self, wallet: &Wallet) -> Result<(), AppError> {
        let mut wallets = self.wallets.write().await;
        wallets.insert(wallet.id, Arc::new(Mutex::new(wallet.clone())));
        Ok(())
    }

    async fn get(&self, id: WalletId) -> Result<Wallet, AppError> {
        let cell = {
            let wallets = self.wallets.read().await;
            wallets.get(&id).cloned()
        };
        match cell {
            Some(cell) => Ok(cell.lock().await.clone()),
            None => Err(AppError::WalletNotFound(id)),
        }
    }

    async fn get_by_user(&self, user_id: UserId) -> Result<Vec<Wallet>, AppError> {
        let cells: Vec<Arc<Mutex<Wallet>>> = {
            let wallets = self.wallets.read().await;
            wallets.values().cloned().collect()
        };
        let mut result = Vec::new();
        for cell in cells {
            let wallet = cell.lock().await;
            if wallet.user_id == user_id {
                result.push(wallet.clone());
            }
        }
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn adjust_balance(&self, id: WalletId, delta: Cents) -> Result<Cents, AppError> {
        let cell = {
            let wallets = self.wallets.read().await;
            wallets.get(&id).cloned()
        }
        .ok_or(AppError::WalletNotFound(id))?;

        // The whole check-and-write happens under this wallet's lock.
        let mut wallet = cell.lock().await;
        if !wallet.is_active() {
            return Err(AppError::WalletInactive(id));
        }
        let next = wallet.balance_cents + delta;
        if next < 0 {
            return Err(AppError::InsufficientFunds {
                wallet: id,
                balance: wallet.balance_cents,
                requested: -delta,
            });
        }
        wallet.balance_cents = next;
        Ok(next)
    }

    async fn deactivate(&self, id: WalletId) -> Result<(), AppError> {
        let cell = {
            let wallets = self.wallets.read().await;
            wallets.get(&id).cloned()
        }
        .ok_or(AppError::WalletNotFound(id))?;

        let mut wallet = cell.lock().await;
        if !wallet.is_active() {
            return Err(AppError::WalletInactive(id));
        }
        if wallet.balance_cents != 0 {
            return Err(AppError::NonZeroBalance {
                wallet: id,
                balance: wallet.balance_cents,
            });
        }
        wallet.status = WalletStatus::Inactive;
        Ok(())
    }
}

#[async_trait]
impl TransactionLedger for MemoryStore {
    async fn create(&self, tx: &Transaction) -> Result<(), AppError> {
        let mut transactions = self.transactions.write().await;
        transactions.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<(), AppError> {
        debug_assert!(TransactionStatus::Pending.can_transition_to(status));

        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .get_mut(&id)
            .ok_or(AppError::TransactionNotFound(id))?;
        if tx.is_finalized() {
            return Err(AppError::TransactionFinalized(id));
        }
        tx.status = status;
        Ok(())
    }

    async fn get(&self, id: TransactionId) -> Result<Transaction, AppError> {
        let transactions = self.transactions.read().await;
        transactions
            .get(&id)
            .cloned()
            .ok_or(AppError::TransactionNotFound(id))
    }

    async fn get_by_wallet(
        &self,
        wallet_id: WalletId,
        page: Page,
    ) -> Result<Vec<Transaction>, AppError> {
        let transactions = self.transactions.read().await;
        let mut matching: Vec<Transaction> = transactions
            .values()
            .filter(|tx| {
                tx.source_wallet == wallet_id || tx.destination_wallet == Some(wallet_id)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(matching, page))
    }

    async fn get_by_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Transaction>, AppError> {
        let wallet_ids = self.wallet_ids_of(user_id).await;
        let transactions = self.transactions.read().await;
        let mut matching: Vec<Transaction> = transactions
            .values()
            .filter(|tx| {
                wallet_ids.contains(&tx.source_wallet)
                    || tx
                        .destination_wallet
                        .is_some_and(|dest| wallet_ids.contains(&dest))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(matching, page))
    }

    async fn sum_amounts_since(
        &self,
        user_id: UserId,
        kind: TransactionType,
        since: DateTime<Utc>,
    ) -> Result<Cents, AppError> {
        let wallet_ids = self.wallet_ids_of(user_id).await;
        let transactions = self.transactions.read().await;
        Ok(transactions
            .values()
            .filter(|tx| {
                tx.kind == kind
                    && tx.status != TransactionStatus::Failed
                    && tx.created_at >= since
                    && wallet_ids.contains(&tx.source_wallet)
            })
            .map(|tx| tx.amount_cents)
            .sum())
    }
}

#[async_trait]
impl LimitStore for MemoryStore {
    async fn upsert(&self, limit: &TransactionLimit) -> Result<TransactionLimit, AppError> {
        let mut limits = self.limits.write().await;
        let stored = limits
            .entry((limit.user_id, limit.kind))
            .and_modify(|existing| {
                // Caps change; identity and creation time stay.
                existing.daily_cents = limit.daily_cents;
                existing.monthly_cents = limit.monthly_cents;
            })
            .or_insert_with(|| limit.clone());
        Ok(stored.clone())
    }

    async fn get(
        &self,
        user_id: UserId,
        kind: TransactionType,
    ) -> Result<Option<TransactionLimit>, AppError> {
        let limits = self.limits.read().await;
        Ok(limits.get(&(user_id, kind)).cloned())
    }

    async fn get_by_user(&self, user_id: UserId) -> Result<Vec<TransactionLimit>, AppError> {
        let limits = self.limits.read().await;
        let mut result: Vec<TransactionLimit> = limits
            .values()
            .filter(|limit| limit.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}

fn paginate(items: Vec<Transaction>, page: Page) -> Vec<Transaction> {
    items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_wallet_roundtrip() {
        let store = MemoryStore::new();
        let wallet = Wallet::new(Uuid::new_v4());
        WalletStore::create(&store, &wallet).await.unwrap();

        let fetched = WalletStore::get(&store, wallet.id).await.unwrap();
        assert_eq!(fetched.id, wallet.id);
        assert_eq!(fetched.balance_cents, 0);

        let missing = WalletStore::get(&store, Uuid::new_v4()).await;
        assert!(matches!(missing, Err(AppError::WalletNotFound(_))));
    }

    #[tokio::test]
    async fn test_adjust_balance_guards() {
        let store = MemoryStore::new();
        let wallet = Wallet::new(Uuid::new_v4());
        WalletStore::create(&store, &wallet).await.unwrap();

        assert_eq!(store.adjust_balance(wallet.id, 500).await.unwrap(), 500);
        assert_eq!(store.adjust_balance(wallet.id, -200).await.unwrap(), 300);

        let overdraw = store.adjust_balance(wallet.id, -400).await;
        assert!(matches!(
            overdraw,
            Err(AppError::InsufficientFunds {
                balance: 300,
                requested: 400,
                ..
            })
        ));
        // The failed attempt left the balance untouched.
        assert_eq!(
            WalletStore::get(&store, wallet.id).await.unwrap().balance_cents,
            300
        );
    }

    #[tokio::test]
    async fn test_deactivate_requires_zero_balance() {
        let store = MemoryStore::new();
        let wallet = Wallet::new(Uuid::new_v4());
        WalletStore::create(&store, &wallet).await.unwrap();
        store.adjust_balance(wallet.id, 100).await.unwrap();

        let rejected = store.deactivate(wallet.id).await;
        assert!(matches!(rejected, Err(AppError::NonZeroBalance { .. })));

        store.adjust_balance(wallet.id, -100).await.unwrap();
        store.deactivate(wallet.id).await.unwrap();

        // Inactive wallets refuse further adjustments.
        let frozen = store.adjust_balance(wallet.id, 10).await;
        assert!(matches!(frozen, Err(AppError::WalletInactive(_))));
    }

    #[tokio::test]
    async fn test_update_status_only_from_pending() {
        let store = MemoryStore::new();
        let tx = Transaction::new(Uuid::new_v4(), TransactionType::Deposit, 100);
        TransactionLedger::create(&store, &tx).await.unwrap();

        store
            .update_status(tx.id, TransactionStatus::Completed)
            .await
            .unwrap();

        let double = store.update_status(tx.id, TransactionStatus::Failed).await;
        assert!(matches!(double, Err(AppError::TransactionFinalized(_))));
        assert_eq!(
            TransactionLedger::get(&store, tx.id).await.unwrap().status,
            TransactionStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_upsert_preserves_identity() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let first = TransactionLimit::new(user, TransactionType::Withdraw, 10_000, 100_000);
        let stored = store.upsert(&first).await.unwrap();

        let replacement = TransactionLimit::new(user, TransactionType::Withdraw, 5_000, 50_000);
        let updated = store.upsert(&replacement).await.unwrap();

        assert_eq!(updated.id, stored.id);
        assert_eq!(updated.daily_cents, 5_000);
        assert_eq!(updated.monthly_cents, 50_000);
    }
}
