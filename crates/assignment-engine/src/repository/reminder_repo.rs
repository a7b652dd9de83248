//! 截止提醒仓储

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::commands::{NewReminders, PageCursor};
use crate::error::Result;
use crate::models::{DueReminder, Reminder};

/// 提醒仓储
pub struct ReminderRepository {
    pool: PgPool,
}

impl ReminderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 到期未发送的提醒，按计划时间升序，`after` 之后的下一页
    ///
    /// 只取任务仍持有资料的提醒，已提交或已过期的任务不再催促
    pub async fn list_due(
        &self,
        now: DateTime<Utc>,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<DueReminder>> {
        let reminders = sqlx::query_as::<_, DueReminder>(
            r#"
            SELECT r.id, r.assignment_id, r.reminder_type, r.scheduled_for,
                   a.reader_id, a.campaign_id, a.deadline_at
            FROM reminders r
            JOIN assignments a ON a.id = r.assignment_id
            WHERE r.email_sent = false AND r.scheduled_for <= $1
              AND a.status IN ('APPROVED', 'IN_PROGRESS')
              AND ($2::timestamptz IS NULL OR (r.scheduled_for, r.id) > ($2, $3))
            ORDER BY r.scheduled_for ASC, r.id ASC
            LIMIT $4
            "#,
        )
        .bind(now)
        .bind(after.map(|c| c.at))
        .bind(after.map(|c| c.id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(reminders)
    }

    pub async fn list_by_assignment(&self, assignment_id: i64) -> Result<Vec<Reminder>> {
        let reminders = sqlx::query_as::<_, Reminder>(
            r#"
            SELECT id, assignment_id, reminder_type, scheduled_for, email_sent, sent_at, created_at
            FROM reminders
            WHERE assignment_id = $1
            ORDER BY scheduled_for ASC
            "#,
        )
        .bind(assignment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reminders)
    }

    /// 标记为已发送，已发送过的不会被覆盖
    pub async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET email_sent = true, sent_at = $2
            WHERE id = $1 AND email_sent = false
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 批量创建提醒
    ///
    /// 依赖 (assignment_id, reminder_type) 唯一索引跳过已存在的提醒
    pub async fn create_ladder_in_tx(conn: &mut PgConnection, cmd: &NewReminders) -> Result<u64> {
        let mut created = 0;
        for (reminder_type, scheduled_for) in &cmd.ladder {
            let result = sqlx::query(
                r#"
                INSERT INTO reminders (assignment_id, reminder_type, scheduled_for, email_sent, created_at)
                VALUES ($1, $2, $3, false, $4)
                ON CONFLICT (assignment_id, reminder_type) DO NOTHING
                "#,
            )
            .bind(cmd.assignment_id)
            .bind(reminder_type)
            .bind(scheduled_for)
            .bind(cmd.now)
            .execute(&mut *conn)
            .await?;

            created += result.rows_affected();
        }

        Ok(created)
    }
}
