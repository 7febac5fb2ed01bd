use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    domain::{WalletAudit, WalletTransaction},
    error::{AppError, Result},
    repository::WalletRepository,
};

/// Wallet business rules over the append-only ledger. The repository
/// keeps the materialized balance and the ledger row in one
/// transaction; this layer adds sign conventions and the periodic
/// ledger-vs-counter audit.
pub struct WalletService {
    repo: Arc<dyn WalletRepository>,
}

impl WalletService {
    pub fn new(repo: Arc<dyn WalletRepository>) -> Self {
        Self { repo }
    }

    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: &str,
    ) -> Result<WalletTransaction> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Credit amount must be positive".to_string(),
            ));
        }
        self.repo.apply(user_id, amount, description).await
    }

    pub async fn debit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: &str,
    ) -> Result<WalletTransaction> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Debit amount must be positive".to_string(),
            ));
        }
        self.repo.apply(user_id, -amount, description).await
    }

    pub async fn history(&self, user_id: Uuid) -> Result<Vec<WalletTransaction>> {
        self.repo.history(user_id).await
    }

    /// Compare the materialized balance against the ledger sum. Drift
    /// should always be zero; a non-zero value means a write bypassed
    /// the ledger transaction and needs investigation.
    pub async fn reconcile(&self, user_id: Uuid) -> Result<WalletAudit> {
        let balance = self.repo.balance_of(user_id).await?;
        let ledger_sum = self.repo.ledger_sum(user_id).await?;
        let drift = balance - ledger_sum;

        if drift != Decimal::ZERO {
            tracing::warn!(
                "Wallet drift for user {}: balance {} vs ledger {}",
                user_id,
                balance,
                ledger_sum
            );
        }

        Ok(WalletAudit {
            user_id,
            balance,
            ledger_sum,
            drift,
        })
    }
}
