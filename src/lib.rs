pub mod application;
pub mod domain;
pub mod storage;
pub mod telemetry;

pub use application::{AppError, LimitPolicy, WalletService};
pub use domain::*;
pub use storage::{LimitStore, MemoryStore, SqliteStore, TransactionLedger, WalletStore};
