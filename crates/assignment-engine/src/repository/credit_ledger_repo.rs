//! 积分流水仓储
//!
//! 流水只追加，不提供更新与删除

use sqlx::{PgConnection, PgPool};

use crate::error::Result;
use crate::models::{CreditTransaction, NewCreditTransaction};

/// 积分流水仓储
pub struct CreditLedgerRepository {
    pool: PgPool,
}

impl CreditLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按时间顺序列出活动的积分流水
    pub async fn list_by_campaign(&self, campaign_id: i64) -> Result<Vec<CreditTransaction>> {
        let rows = sqlx::query_as::<_, CreditTransaction>(
            r#"
            SELECT id, campaign_id, amount, transaction_type, balance_after,
                   assignment_id, description, created_at
            FROM credit_transactions
            WHERE campaign_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// 在事务中追加流水
    pub async fn append_in_tx(conn: &mut PgConnection, tx: &NewCreditTransaction) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO credit_transactions (
                campaign_id, amount, transaction_type, balance_after,
                assignment_id, description, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(tx.campaign_id)
        .bind(tx.amount)
        .bind(tx.transaction_type)
        .bind(tx.balance_after)
        .bind(tx.assignment_id)
        .bind(&tx.description)
        .bind(tx.created_at)
        .fetch_one(conn)
        .await?;

        Ok(id)
    }
}
