use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Materialized counter; the ledger below is the audit trail.
    pub wallet_balance: Decimal,
    pub ai_credits: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only ledger row. Amounts are signed: credits positive,
/// debits negative. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Result of the periodic ledger-vs-counter consistency check.
#[derive(Debug, Clone, Serialize)]
pub struct WalletAudit {
    pub user_id: Uuid,
    pub balance: Decimal,
    pub ledger_sum: Decimal,
    pub drift: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}
