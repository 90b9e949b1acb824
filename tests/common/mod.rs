// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use moneta::application::WalletService;
use moneta::domain::{Cents, UserId, Wallet};
use tempfile::TempDir;
use uuid::Uuid;

/// Helper to create a SQLite-backed service over a temporary database
pub async fn test_service() -> Result<(WalletService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = WalletService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Fresh user identity for a test scenario
pub fn new_user() -> UserId {
    Uuid::new_v4()
}

/// Create a wallet for `user` and seed it with an initial deposit
pub async fn funded_wallet(
    service: &WalletService,
    user: UserId,
    cents: Cents,
) -> Result<Wallet> {
    let wallet = service.create_wallet(user).await?;
    if cents > 0 {
        service.deposit(wallet.id, cents, None).await?;
    }
    Ok(service.get_wallet(wallet.id).await?)
}
