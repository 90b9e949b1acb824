use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, TransactionType, UserId};

pub type LimitId = Uuid;

/// Per-user, per-transaction-type spending caps. Daily and monthly caps are
/// independent; a user without a row for a given type is unlimited for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLimit {
    pub id: LimitId,
    pub user_id: UserId,
    pub kind: TransactionType,
    pub daily_cents: Cents,
    pub monthly_cents: Cents,
    pub created_at: DateTime<Utc>,
}

impl TransactionLimit {
    pub fn new(user_id: UserId, kind: TransactionType, daily_cents: Cents, monthly_cents: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            daily_cents,
            monthly_cents,
            created_at: Utc::now(),
        }
    }
}

/// Start of the current UTC day for `now`.
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let start = now.date_naive().and_hms_opt(0, 0, 0).unwrap();
    DateTime::from_naive_utc_and_offset(start, Utc)
}

/// Start of the current UTC month for `now`.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let start = now
        .date_naive()
        .with_day(1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    DateTime::from_naive_utc_and_offset(start, Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_day_start() {
        let now = at("2024-03-15T17:42:09Z");
        assert_eq!(day_start(now), at("2024-03-15T00:00:00Z"));
    }

    #[test]
    fn test_month_start() {
        let now = at("2024-03-15T17:42:09Z");
        assert_eq!(month_start(now), at("2024-03-01T00:00:00Z"));
        // First of the month is its own start.
        let first = at("2024-12-01T00:00:00Z");
        assert_eq!(month_start(first), first);
    }
}
