use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type WalletId = Uuid;
pub type UserId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    Active,
    Inactive,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Active => "active",
            WalletStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(WalletStatus::Active),
            "inactive" => Some(WalletStatus::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A balance-holding account owned by a user.
///
/// Invariant: `balance_cents >= 0` whenever the wallet is active. The balance
/// is mutated only through the store's atomic adjustment, never assigned
/// directly by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    /// Human-facing unique account number, assigned at creation.
    pub wallet_number: String,
    pub balance_cents: Cents,
    pub status: WalletStatus,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a fresh wallet for `user_id`: zero balance, active status,
    /// unique wallet number.
    pub fn new(user_id: UserId) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            user_id,
            wallet_number: format!("W{}", id.simple()),
            balance_cents: 0,
            status: WalletStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == WalletStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_status_roundtrip() {
        for status in [WalletStatus::Active, WalletStatus::Inactive] {
            assert_eq!(WalletStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(WalletStatus::from_str("archived"), None);
    }

    #[test]
    fn test_new_wallet_starts_empty_and_active() {
        let wallet = Wallet::new(Uuid::new_v4());
        assert_eq!(wallet.balance_cents, 0);
        assert!(wallet.is_active());
    }

    #[test]
    fn test_wallet_numbers_are_unique() {
        let user = Uuid::new_v4();
        let a = Wallet::new(user);
        let b = Wallet::new(user);
        assert_ne!(a.wallet_number, b.wallet_number);
        assert!(a.wallet_number.starts_with('W'));
    }
}
