mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{funded_wallet, new_user, test_service};
use moneta::application::AppError;
use moneta::domain::{Page, TransactionStatus, TransactionType};
use uuid::Uuid;

#[tokio::test]
async fn test_transfer_moves_funds_atomically() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let source = funded_wallet(&service, new_user(), 3_000).await?;
    let destination = service.create_wallet(new_user()).await?;

    let tx = service
        .transfer(source.id, destination.id, 3_000, Some("rent".into()))
        .await?;
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(tx.kind, TransactionType::Transfer);
    assert_eq!(tx.source_wallet, source.id);
    assert_eq!(tx.destination_wallet, Some(destination.id));

    // Debit and credit are visible together.
    assert_eq!(service.get_wallet(source.id).await?.balance_cents, 0);
    assert_eq!(service.get_wallet(destination.id).await?.balance_cents, 3_000);

    // A follow-up transfer over the now-empty source fails and moves nothing.
    let result = service.transfer(source.id, destination.id, 3_100, None).await;
    assert!(matches!(result, Err(AppError::InsufficientFunds { .. })));
    assert_eq!(service.get_wallet(source.id).await?.balance_cents, 0);
    assert_eq!(service.get_wallet(destination.id).await?.balance_cents, 3_000);

    Ok(())
}

#[tokio::test]
async fn test_transfer_rejects_self_transfer() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let wallet = funded_wallet(&service, new_user(), 1_000).await?;

    let result = service.transfer(wallet.id, wallet.id, 100, None).await;
    assert!(matches!(result, Err(AppError::SelfTransfer)));
    assert_eq!(service.get_wallet(wallet.id).await?.balance_cents, 1_000);

    Ok(())
}

#[tokio::test]
async fn test_transfer_rejects_non_positive_amounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let source = funded_wallet(&service, new_user(), 1_000).await?;
    let destination = service.create_wallet(new_user()).await?;

    for amount in [0, -250] {
        let result = service.transfer(source.id, destination.id, amount, None).await;
        assert!(matches!(result, Err(AppError::InvalidAmount(_))));
    }

    Ok(())
}

#[tokio::test]
async fn test_transfer_to_missing_destination() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let source = funded_wallet(&service, new_user(), 1_000).await?;

    let result = service.transfer(source.id, Uuid::new_v4(), 100, None).await;
    assert!(matches!(result, Err(AppError::WalletNotFound(_))));

    // Rejected before any ledger row or balance change.
    assert_eq!(service.get_wallet(source.id).await?.balance_cents, 1_000);
    let movements = service.wallet_transactions(source.id, Page::first()).await?;
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].kind, TransactionType::Deposit);

    Ok(())
}

#[tokio::test]
async fn test_transfer_to_inactive_destination() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let source = funded_wallet(&service, new_user(), 1_000).await?;
    let destination = service.create_wallet(new_user()).await?;
    service.deactivate_wallet(destination.id).await?;

    let result = service.transfer(source.id, destination.id, 100, None).await;
    assert!(matches!(result, Err(AppError::WalletInactive(_))));
    assert_eq!(service.get_wallet(source.id).await?.balance_cents, 1_000);

    Ok(())
}

#[tokio::test]
async fn test_transfer_from_inactive_source() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let source = service.create_wallet(new_user()).await?;
    service.deactivate_wallet(source.id).await?;
    let destination = service.create_wallet(new_user()).await?;

    let result = service.transfer(source.id, destination.id, 100, None).await;
    assert!(matches!(result, Err(AppError::WalletInactive(_))));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_transfers_conserve_money() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = Arc::new(service);
    let a = funded_wallet(&service, new_user(), 5_000).await?;
    let b = funded_wallet(&service, new_user(), 5_000).await?;

    // Transfers racing in both directions between the same pair of wallets:
    // no deadlock, no negative balance, and the total is conserved.
    let mut handles = Vec::new();
    for i in 0..20 {
        let service = Arc::clone(&service);
        let (from, to) = if i % 2 == 0 { (a.id, b.id) } else { (b.id, a.id) };
        handles.push(tokio::spawn(async move {
            service.transfer(from, to, 700, None).await
        }));
    }

    for handle in handles {
        match handle.await? {
            Ok(_) | Err(AppError::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let a_final = service.get_wallet(a.id).await?.balance_cents;
    let b_final = service.get_wallet(b.id).await?.balance_cents;
    assert!(a_final >= 0);
    assert!(b_final >= 0);
    assert_eq!(a_final + b_final, 10_000);

    Ok(())
}

#[tokio::test]
async fn test_user_transactions_are_paginated_newest_first() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let user = new_user();
    let wallet = funded_wallet(&service, user, 100_000).await?;

    for _ in 0..14 {
        service.withdraw(wallet.id, 100, None).await?;
    }

    // 15 movements in total (the funding deposit plus 14 withdrawals).
    let first_page = service.user_transactions(user, Page::new(1, 10).unwrap()).await?;
    let second_page = service.user_transactions(user, Page::new(2, 10).unwrap()).await?;
    assert_eq!(first_page.len(), 10);
    assert_eq!(second_page.len(), 5);

    let all: Vec<_> = first_page.iter().chain(second_page.iter()).collect();
    assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    // The oldest movement is the funding deposit.
    assert_eq!(all.last().unwrap().kind, TransactionType::Deposit);

    Ok(())
}

#[tokio::test]
async fn test_transfer_between_own_wallets_listed_once() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let user = new_user();
    let checking = funded_wallet(&service, user, 5_000).await?;
    let savings = service.create_wallet(user).await?;

    let tx = service.transfer(checking.id, savings.id, 2_000, None).await?;

    // Both wallets belong to the same user; the movement still appears once.
    let movements = service.user_transactions(user, Page::new(1, 100).unwrap()).await?;
    let transfer_rows: Vec<_> = movements.iter().filter(|m| m.id == tx.id).collect();
    assert_eq!(transfer_rows.len(), 1);

    Ok(())
}
