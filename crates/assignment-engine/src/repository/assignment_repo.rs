//! 任务仓储
//!
//! 所有状态变更语句都在 WHERE 中校验来源状态，重复执行或并发执行
//! 时只有一方能生效。

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};

use super::commands::{MaterialRelease, PageCursor};
use crate::error::Result;
use crate::models::{Assignment, BookFormat};

const ASSIGNMENT_COLUMNS: &str = r#"
    id, campaign_id, reader_id, status, queue_position, is_buffer_assignment,
    format_assigned, scheduled_week, scheduled_date, materials_released_at,
    materials_expires_at, deadline_at, access_token, expired_at,
    created_at, updated_at
"#;

/// 任务仓储
pub struct AssignmentRepository {
    pool: PgPool,
}

impl AssignmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Assignment>> {
        let sql = format!("SELECT {} FROM assignments WHERE id = $1", ASSIGNMENT_COLUMNS);
        let assignment = sqlx::query_as::<_, Assignment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(assignment)
    }

    /// 按排队序号升序列出排队中的任务
    pub async fn list_waiting(&self, campaign_id: i64, limit: i64) -> Result<Vec<Assignment>> {
        let sql = format!(
            r#"
            SELECT {} FROM assignments
            WHERE campaign_id = $1 AND status = 'WAITING'
            ORDER BY queue_position ASC
            LIMIT $2
            "#,
            ASSIGNMENT_COLUMNS
        );
        let assignments = sqlx::query_as::<_, Assignment>(&sql)
            .bind(campaign_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(assignments)
    }

    /// 待发放资料的任务
    pub async fn list_releasable(&self, today: NaiveDate) -> Result<Vec<Assignment>> {
        let sql = format!(
            r#"
            SELECT {} FROM assignments
            WHERE status = 'SCHEDULED' AND scheduled_date <= $1
            ORDER BY scheduled_date ASC, campaign_id ASC, queue_position ASC
            "#,
            ASSIGNMENT_COLUMNS
        );
        let assignments = sqlx::query_as::<_, Assignment>(&sql)
            .bind(today)
            .fetch_all(&self.pool)
            .await?;

        Ok(assignments)
    }

    /// 已超过截止时间仍持有访问权的任务，`after` 之后的下一页
    pub async fn list_overdue(
        &self,
        now: DateTime<Utc>,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<Assignment>> {
        let sql = format!(
            r#"
            SELECT {} FROM assignments
            WHERE status IN ('APPROVED', 'IN_PROGRESS') AND deadline_at < $1
              AND ($2::timestamptz IS NULL OR (deadline_at, id) > ($2, $3))
            ORDER BY deadline_at ASC, id ASC
            LIMIT $4
            "#,
            ASSIGNMENT_COLUMNS
        );
        let assignments = sqlx::query_as::<_, Assignment>(&sql)
            .bind(now)
            .bind(after.map(|c| c.at))
            .bind(after.map(|c| c.id))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(assignments)
    }

    pub async fn get_for_update_in_tx(
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<Option<Assignment>> {
        let sql = format!(
            "SELECT {} FROM assignments WHERE id = $1 FOR UPDATE",
            ASSIGNMENT_COLUMNS
        );
        let assignment = sqlx::query_as::<_, Assignment>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(assignment)
    }

    /// 读者在活动中是否已有未结束的任务
    pub async fn has_active_in_tx(
        conn: &mut PgConnection,
        campaign_id: i64,
        reader_id: i64,
    ) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM assignments
                WHERE campaign_id = $1 AND reader_id = $2
                  AND status IN ('WAITING', 'SCHEDULED', 'APPROVED', 'IN_PROGRESS')
            )
            "#,
        )
        .bind(campaign_id)
        .bind(reader_id)
        .fetch_one(conn)
        .await?;

        Ok(exists)
    }

    pub async fn insert_waiting_in_tx(
        conn: &mut PgConnection,
        campaign_id: i64,
        reader_id: i64,
        queue_position: i32,
        format: BookFormat,
        now: DateTime<Utc>,
    ) -> Result<Assignment> {
        let sql = format!(
            r#"
            INSERT INTO assignments (
                campaign_id, reader_id, status, queue_position, is_buffer_assignment,
                format_assigned, created_at, updated_at
            )
            VALUES ($1, $2, 'WAITING', $3, false, $4, $5, $5)
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        );
        let assignment = sqlx::query_as::<_, Assignment>(&sql)
            .bind(campaign_id)
            .bind(reader_id)
            .bind(queue_position)
            .bind(format)
            .bind(now)
            .fetch_one(conn)
            .await?;

        Ok(assignment)
    }

    /// 锁定排队中的前 N 个任务
    ///
    /// 严格按排队序号，使用 SKIP LOCKED 避免与补位并发时互相等待
    pub async fn claim_waiting_in_tx(
        conn: &mut PgConnection,
        campaign_id: i64,
        limit: i64,
    ) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM assignments
            WHERE campaign_id = $1 AND status = 'WAITING'
            ORDER BY queue_position ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(conn)
        .await?;

        Ok(ids)
    }

    /// WAITING -> SCHEDULED
    pub async fn mark_scheduled_in_tx(
        conn: &mut PgConnection,
        ids: &[i64],
        is_buffer: bool,
        scheduled_week: i32,
        scheduled_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE assignments
            SET status = 'SCHEDULED',
                is_buffer_assignment = $2,
                scheduled_week = $3,
                scheduled_date = $4,
                updated_at = $5
            WHERE id = ANY($1) AND status = 'WAITING'
            "#,
        )
        .bind(ids)
        .bind(is_buffer)
        .bind(scheduled_week)
        .bind(scheduled_date)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// SCHEDULED -> APPROVED，写入发放时间、截止时间和访问令牌
    pub async fn approve_in_tx(
        conn: &mut PgConnection,
        release: &MaterialRelease,
    ) -> Result<Option<Assignment>> {
        let sql = format!(
            r#"
            UPDATE assignments
            SET status = 'APPROVED',
                materials_released_at = $2,
                deadline_at = $3,
                materials_expires_at = $4,
                access_token = $5,
                updated_at = $2
            WHERE id = $1 AND status = 'SCHEDULED'
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        );
        let assignment = sqlx::query_as::<_, Assignment>(&sql)
            .bind(release.assignment_id)
            .bind(release.released_at)
            .bind(release.deadline_at)
            .bind(release.materials_expires_at)
            .bind(release.access_token)
            .fetch_optional(conn)
            .await?;

        Ok(assignment)
    }

    /// APPROVED / IN_PROGRESS -> EXPIRED，同时撤销访问权
    pub async fn expire_in_tx(
        conn: &mut PgConnection,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE assignments
            SET status = 'EXPIRED',
                expired_at = $2,
                access_token = NULL,
                materials_expires_at = NULL,
                updated_at = $2
            WHERE id = $1 AND status IN ('APPROVED', 'IN_PROGRESS')
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 锁定排队序号最小的任务（补位用）
    pub async fn claim_next_waiting_in_tx(
        conn: &mut PgConnection,
        campaign_id: i64,
    ) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM assignments
            WHERE campaign_id = $1 AND status = 'WAITING'
            ORDER BY queue_position ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(campaign_id)
        .fetch_optional(conn)
        .await?;

        Ok(id)
    }
}
