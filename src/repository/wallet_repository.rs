use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::WalletTransaction,
    error::{AppError, Result},
    repository::{parse_money, parse_uuid, WalletRepository},
};

#[derive(FromRow)]
struct WalletTransactionRow {
    id: String,
    user_id: String,
    amount: String,
    description: String,
    created_at: NaiveDateTime,
}

pub struct SqliteWalletRepository {
    pool: SqlitePool,
}

impl SqliteWalletRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_transaction(row: WalletTransactionRow) -> Result<WalletTransaction> {
        Ok(WalletTransaction {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            amount: parse_money(&row.amount)?,
            description: row.description,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl WalletRepository for SqliteWalletRepository {
    async fn apply(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: &str,
    ) -> Result<WalletTransaction> {
        let id = Uuid::new_v4();
        let user_id_str = user_id.to_string();
        let now = Utc::now().naive_utc();

        // Balance lives as a decimal string, so the counter move is a
        // read-modify-write; the transaction keeps ledger and counter
        // in step.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let balance_str = sqlx::query_scalar::<_, String>(
            "SELECT wallet_balance FROM users WHERE id = ?",
        )
        .bind(&user_id_str)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let new_balance = parse_money(&balance_str)? + amount;
        if new_balance < Decimal::ZERO {
            return Err(AppError::Validation(
                "Wallet balance cannot go negative".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (id, user_id, amount, description, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&user_id_str)
        .bind(amount.to_string())
        .bind(description)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query("UPDATE users SET wallet_balance = ?, updated_at = ? WHERE id = ?")
            .bind(new_balance.to_string())
            .bind(now)
            .bind(&user_id_str)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(WalletTransaction {
            id,
            user_id,
            amount,
            description: description.to_string(),
            created_at: DateTime::from_naive_utc_and_offset(now, Utc),
        })
    }

    async fn balance_of(&self, user_id: Uuid) -> Result<Decimal> {
        let balance_str = sqlx::query_scalar::<_, String>(
            "SELECT wallet_balance FROM users WHERE id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        parse_money(&balance_str)
    }

    async fn ledger_sum(&self, user_id: Uuid) -> Result<Decimal> {
        let amounts = sqlx::query_scalar::<_, String>(
            "SELECT amount FROM wallet_transactions WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let mut sum = Decimal::ZERO;
        for amount in amounts {
            sum += parse_money(&amount)?;
        }
        Ok(sum)
    }

    async fn history(&self, user_id: Uuid) -> Result<Vec<WalletTransaction>> {
        let rows = sqlx::query_as::<_, WalletTransactionRow>(
            r#"
            SELECT id, user_id, amount, description, created_at
            FROM wallet_transactions
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_transaction).collect()
    }
}
