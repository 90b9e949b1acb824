use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::domain::{Cents, TransactionLimit, TransactionType, UserId, day_start, month_start};
use crate::storage::{LimitStore, TransactionLedger};

use super::error::{AppError, LimitPeriod};

/// Enforces per-user, per-period spending caps by aggregating the ledger.
/// A user without a limit row for a given transaction kind is unlimited for
/// it; absence never means zero.
#[derive(Clone)]
pub struct LimitPolicy {
    ledger: Arc<dyn TransactionLedger>,
    limits: Arc<dyn LimitStore>,
}

impl LimitPolicy {
    pub fn new(ledger: Arc<dyn TransactionLedger>, limits: Arc<dyn LimitStore>) -> Self {
        Self { ledger, limits }
    }

    /// Reject the request when adding `amount_cents` to what the user already
    /// moved today (or this month) would exceed the corresponding cap.
    pub async fn check(
        &self,
        user_id: UserId,
        kind: TransactionType,
        amount_cents: Cents,
    ) -> Result<(), AppError> {
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(amount_cents));
        }

        let Some(limit) = self.limits.get(user_id, kind).await? else {
            return Ok(());
        };

        let now = Utc::now();
        let daily_spent = self
            .ledger
            .sum_amounts_since(user_id, kind, day_start(now))
            .await?;
        if daily_spent + amount_cents > limit.daily_cents {
            debug!(user = %user_id, %kind, daily_spent, amount_cents, cap = limit.daily_cents, "daily limit exceeded");
            return Err(AppError::LimitExceeded {
                period: LimitPeriod::Daily,
                cap: limit.daily_cents,
                spent: daily_spent,
                requested: amount_cents,
            });
        }

        let monthly_spent = self
            .ledger
            .sum_amounts_since(user_id, kind, month_start(now))
            .await?;
        if monthly_spent + amount_cents > limit.monthly_cents {
            debug!(user = %user_id, %kind, monthly_spent, amount_cents, cap = limit.monthly_cents, "monthly limit exceeded");
            return Err(AppError::LimitExceeded {
                period: LimitPeriod::Monthly,
                cap: limit.monthly_cents,
                spent: monthly_spent,
                requested: amount_cents,
            });
        }

        Ok(())
    }

    /// Set the caps for (user, kind), creating the limit or updating an
    /// existing one in place.
    pub async fn set(
        &self,
        user_id: UserId,
        kind: TransactionType,
        daily_cents: Cents,
        monthly_cents: Cents,
    ) -> Result<TransactionLimit, AppError> {
        if daily_cents <= 0 || monthly_cents <= 0 {
            return Err(AppError::InvalidLimit("limits must be greater than zero"));
        }
        if daily_cents > monthly_cents {
            return Err(AppError::InvalidLimit(
                "daily limit cannot exceed monthly limit",
            ));
        }

        self.limits
            .upsert(&TransactionLimit::new(
                user_id,
                kind,
                daily_cents,
                monthly_cents,
            ))
            .await
    }

    pub async fn get(
        &self,
        user_id: UserId,
        kind: TransactionType,
    ) -> Result<Option<TransactionLimit>, AppError> {
        self.limits.get(user_id, kind).await
    }

    pub async fn get_for_user(&self, user_id: UserId) -> Result<Vec<TransactionLimit>, AppError> {
        self.limits.get_by_user(user_id).await
    }
}
