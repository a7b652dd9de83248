//! 活动仓储
//!
//! 活动行上的计数器（积分、已分配读者数、过期数、排队序号）只通过
//! 原子的增减语句修改，并与引起变化的状态变更放在同一事务中。

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::error::Result;
use crate::models::{Campaign, PauseReason};

const CAMPAIGN_COLUMNS: &str = r#"
    id, author_id, book_title, target_reviews, reviews_per_week,
    credits_allocated, credits_used, credits_remaining, status,
    start_date, expected_end_date, current_week, total_assigned_readers,
    reviews_expired, next_queue_position, paused_at, pause_reason,
    created_at, updated_at
"#;

/// 活动仓储
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Campaign>> {
        let sql = format!("SELECT {} FROM campaigns WHERE id = $1", CAMPAIGN_COLUMNS);
        let campaign = sqlx::query_as::<_, Campaign>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(campaign)
    }

    /// 列出进行中的活动
    pub async fn list_active(&self) -> Result<Vec<Campaign>> {
        let sql = format!(
            "SELECT {} FROM campaigns WHERE status = 'ACTIVE' ORDER BY id",
            CAMPAIGN_COLUMNS
        );
        let campaigns = sqlx::query_as::<_, Campaign>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(campaigns)
    }

    /// 在事务中锁定活动行
    pub async fn get_for_update_in_tx(conn: &mut PgConnection, id: i64) -> Result<Option<Campaign>> {
        let sql = format!(
            "SELECT {} FROM campaigns WHERE id = $1 FOR UPDATE",
            CAMPAIGN_COLUMNS
        );
        let campaign = sqlx::query_as::<_, Campaign>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(campaign)
    }

    /// 领取下一个排队序号（序号只增不减）
    pub async fn take_queue_position_in_tx(
        conn: &mut PgConnection,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<i32>> {
        let position = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE campaigns
            SET next_queue_position = next_queue_position + 1, updated_at = $2
            WHERE id = $1
            RETURNING next_queue_position - 1
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(conn)
        .await?;

        Ok(position)
    }

    /// 记录一次周分配：已分配读者数增加，周计数推进
    pub async fn record_distribution_in_tx(
        conn: &mut PgConnection,
        id: i64,
        scheduled: i32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET total_assigned_readers = total_assigned_readers + $2,
                current_week = current_week + 1,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(scheduled)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// 补位时已分配读者数加一
    pub async fn increment_assigned_in_tx(
        conn: &mut PgConnection,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET total_assigned_readers = total_assigned_readers + 1, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// 扣除积分
    ///
    /// 余额不足时不做任何修改并返回 None，否则返回扣除后的余额
    pub async fn debit_credits_in_tx(
        conn: &mut PgConnection,
        id: i64,
        cost: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<i32>> {
        let balance = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE campaigns
            SET credits_used = credits_used + $2,
                credits_remaining = credits_remaining - $2,
                updated_at = $3
            WHERE id = $1 AND credits_remaining >= $2
            RETURNING credits_remaining
            "#,
        )
        .bind(id)
        .bind(cost)
        .bind(now)
        .fetch_optional(conn)
        .await?;

        Ok(balance)
    }

    pub async fn increment_expired_in_tx(
        conn: &mut PgConnection,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET reviews_expired = reviews_expired + 1, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// 暂停进行中的活动，返回是否发生变更
    pub async fn pause_in_tx(
        conn: &mut PgConnection,
        id: i64,
        reason: PauseReason,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'PAUSED', paused_at = $2, pause_reason = $3, updated_at = $2
            WHERE id = $1 AND status = 'ACTIVE'
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(reason)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 充值积分
    ///
    /// 因积分不足被自动暂停的活动同时恢复为 ACTIVE
    pub async fn allocate_in_tx(
        conn: &mut PgConnection,
        id: i64,
        amount: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>> {
        let sql = format!(
            r#"
            UPDATE campaigns
            SET credits_allocated = credits_allocated + $2,
                credits_remaining = credits_remaining + $2,
                status = CASE WHEN status = 'PAUSED' AND pause_reason = 'INSUFFICIENT_CREDITS'
                              THEN 'ACTIVE' ELSE status END,
                paused_at = CASE WHEN status = 'PAUSED' AND pause_reason = 'INSUFFICIENT_CREDITS'
                                 THEN NULL ELSE paused_at END,
                pause_reason = CASE WHEN status = 'PAUSED' AND pause_reason = 'INSUFFICIENT_CREDITS'
                                    THEN NULL ELSE pause_reason END,
                updated_at = $3
            WHERE id = $1
            RETURNING {}
            "#,
            CAMPAIGN_COLUMNS
        );
        let campaign = sqlx::query_as::<_, Campaign>(&sql)
            .bind(id)
            .bind(amount)
            .bind(now)
            .fetch_optional(conn)
            .await?;

        Ok(campaign)
    }

    /// 作废剩余积分：剩余额度同时从已分配中扣除
    pub async fn expire_remaining_in_tx(
        conn: &mut PgConnection,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>> {
        let sql = format!(
            r#"
            UPDATE campaigns
            SET credits_allocated = credits_allocated - credits_remaining,
                credits_remaining = 0,
                updated_at = $2
            WHERE id = $1
            RETURNING {}
            "#,
            CAMPAIGN_COLUMNS
        );
        let campaign = sqlx::query_as::<_, Campaign>(&sql)
            .bind(id)
            .bind(now)
            .fetch_optional(conn)
            .await?;

        Ok(campaign)
    }
}
