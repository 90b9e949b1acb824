use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, WalletId};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
            TransactionType::Transfer => "transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Some(TransactionType::Deposit),
            "withdraw" => Some(TransactionType::Withdraw),
            "transfer" => Some(TransactionType::Transfer),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    /// The lifecycle is one-way: pending -> completed or pending -> failed.
    /// Completed and failed records are immutable.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (
                TransactionStatus::Pending,
                TransactionStatus::Completed | TransactionStatus::Failed
            )
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable record of one money movement. Corrections never edit a
/// finalized record; they are new movements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Wallet the money leaves (or, for deposits, the wallet credited).
    pub source_wallet: WalletId,
    /// Present only for transfers.
    pub destination_wallet: Option<WalletId>,
    pub kind: TransactionType,
    /// Always positive; direction is carried by `kind`.
    pub amount_cents: Cents,
    /// Unique external reference for reconciliation.
    pub reference: Uuid,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a pending movement. Identity, reference and creation time are
    /// assigned here; the ledger persists them as-is.
    pub fn new(source_wallet: WalletId, kind: TransactionType, amount_cents: Cents) -> Self {
        assert!(amount_cents > 0, "transaction amount must be positive");
        Self {
            id: Uuid::new_v4(),
            source_wallet,
            destination_wallet: None,
            kind,
            amount_cents,
            reference: Uuid::new_v4(),
            status: TransactionStatus::Pending,
            description: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_destination(mut self, destination: WalletId) -> Self {
        self.destination_wallet = Some(destination);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_finalized(&self) -> bool {
        self.status != TransactionStatus::Pending
    }
}

/// Pagination for ledger reads. Page numbers start at 1; sizes outside
/// 1..=100 fall back to the default of 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: u32,
    size: u32,
}

impl Page {
    pub const DEFAULT_SIZE: u32 = 10;
    pub const MAX_SIZE: u32 = 100;

    pub fn new(number: u32, size: u32) -> Option<Self> {
        if number < 1 {
            return None;
        }
        let size = if (1..=Self::MAX_SIZE).contains(&size) {
            size
        } else {
            Self::DEFAULT_SIZE
        };
        Some(Self { number, size })
    }

    pub fn first() -> Self {
        Self {
            number: 1,
            size: Self::DEFAULT_SIZE,
        }
    }

    pub fn limit(&self) -> i64 {
        self.size as i64
    }

    pub fn offset(&self) -> i64 {
        ((self.number - 1) as i64) * self.size as i64
    }
}
