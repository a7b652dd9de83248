//! PostgreSQL 调度存储
//!
//! 每个工作单元对应一个数据库事务，涉及的行先用 `FOR UPDATE` 锁定

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::assignment_repo::AssignmentRepository;
use super::campaign_repo::CampaignRepository;
use super::commands::{
    EnqueueReader, Expiration, ExpirationOutcome, MaterialRelease, NewReminders, PageCursor,
    ReleaseOutcome, ScheduleBatch, ScheduleOutcome,
};
use super::credit_ledger_repo::CreditLedgerRepository;
use super::reader_repo::ReaderProfileRepository;
use super::reminder_repo::ReminderRepository;
use super::traits::SchedulingStore;
use crate::error::{EngineError, Result};
use crate::models::{
    Assignment, AssignmentStatus, Campaign, CampaignStatus, CreditTransaction, DueReminder,
    NewCreditTransaction, PauseReason, ReaderProfile, Reminder,
};

/// 唯一约束冲突
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL 调度存储
pub struct PgSchedulingStore {
    pool: PgPool,
    campaigns: CampaignRepository,
    assignments: AssignmentRepository,
    reminders: ReminderRepository,
    ledger: CreditLedgerRepository,
    readers: ReaderProfileRepository,
}

impl PgSchedulingStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            campaigns: CampaignRepository::new(pool.clone()),
            assignments: AssignmentRepository::new(pool.clone()),
            reminders: ReminderRepository::new(pool.clone()),
            ledger: CreditLedgerRepository::new(pool.clone()),
            readers: ReaderProfileRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

#[async_trait]
impl SchedulingStore for PgSchedulingStore {
    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>> {
        self.campaigns.get(id).await
    }

    async fn list_active_campaigns(&self) -> Result<Vec<Campaign>> {
        self.campaigns.list_active().await
    }

    async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>> {
        self.assignments.get(id).await
    }

    async fn list_waiting(&self, campaign_id: i64, limit: i64) -> Result<Vec<Assignment>> {
        self.assignments.list_waiting(campaign_id, limit).await
    }

    async fn list_releasable(&self, today: NaiveDate) -> Result<Vec<Assignment>> {
        self.assignments.list_releasable(today).await
    }

    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<Assignment>> {
        self.assignments.list_overdue(now, after, limit).await
    }

    async fn list_due_reminders(
        &self,
        now: DateTime<Utc>,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<DueReminder>> {
        self.reminders.list_due(now, after, limit).await
    }

    async fn list_reminders(&self, assignment_id: i64) -> Result<Vec<Reminder>> {
        self.reminders.list_by_assignment(assignment_id).await
    }

    async fn list_credit_transactions(&self, campaign_id: i64) -> Result<Vec<CreditTransaction>> {
        self.ledger.list_by_campaign(campaign_id).await
    }

    async fn get_reader_profile(&self, reader_id: i64) -> Result<Option<ReaderProfile>> {
        self.readers.get(reader_id).await
    }

    #[instrument(skip(self), fields(campaign_id = cmd.campaign_id, reader_id = cmd.reader_id))]
    async fn enqueue_reader(&self, cmd: &EnqueueReader) -> Result<Assignment> {
        let mut tx = self.pool.begin().await?;

        // 锁定活动行，串行化同一活动的排队序号分配
        CampaignRepository::get_for_update_in_tx(&mut tx, cmd.campaign_id)
            .await?
            .ok_or(EngineError::CampaignNotFound(cmd.campaign_id))?;

        if AssignmentRepository::has_active_in_tx(&mut tx, cmd.campaign_id, cmd.reader_id).await? {
            return Err(EngineError::DuplicateActiveAssignment {
                reader_id: cmd.reader_id,
                campaign_id: cmd.campaign_id,
            });
        }

        let position = CampaignRepository::take_queue_position_in_tx(&mut tx, cmd.campaign_id, cmd.now)
            .await?
            .ok_or(EngineError::CampaignNotFound(cmd.campaign_id))?;

        let assignment = AssignmentRepository::insert_waiting_in_tx(
            &mut tx,
            cmd.campaign_id,
            cmd.reader_id,
            position,
            cmd.format,
            cmd.now,
        )
        .await
        .map_err(|e| match e {
            // 部分唯一索引兜底
            EngineError::Database(ref db) if is_unique_violation(db) => {
                EngineError::DuplicateActiveAssignment {
                    reader_id: cmd.reader_id,
                    campaign_id: cmd.campaign_id,
                }
            }
            other => other,
        })?;

        ReaderProfileRepository::ensure_in_tx(&mut tx, cmd.reader_id, cmd.now).await?;

        tx.commit().await?;

        Ok(assignment)
    }

    #[instrument(skip(self), fields(campaign_id = cmd.campaign_id))]
    async fn schedule_assignments(&self, cmd: &ScheduleBatch) -> Result<ScheduleOutcome> {
        let mut tx = self.pool.begin().await?;

        let campaign = CampaignRepository::get_for_update_in_tx(&mut tx, cmd.campaign_id)
            .await?
            .ok_or(EngineError::CampaignNotFound(cmd.campaign_id))?;

        if campaign.status != CampaignStatus::Active {
            tx.rollback().await?;
            return Ok(ScheduleOutcome::default());
        }

        let total = i64::from(cmd.base_slots.max(0) + cmd.buffer_slots.max(0));
        let claimed = AssignmentRepository::claim_waiting_in_tx(&mut tx, cmd.campaign_id, total).await?;

        if claimed.is_empty() {
            tx.rollback().await?;
            return Ok(ScheduleOutcome::default());
        }

        let split = claimed.len().min(cmd.base_slots.max(0) as usize);
        let (base, buffer) = claimed.split_at(split);

        AssignmentRepository::mark_scheduled_in_tx(
            &mut tx,
            base,
            false,
            cmd.scheduled_week,
            cmd.scheduled_date,
            cmd.now,
        )
        .await?;
        AssignmentRepository::mark_scheduled_in_tx(
            &mut tx,
            buffer,
            true,
            cmd.scheduled_week,
            cmd.scheduled_date,
            cmd.now,
        )
        .await?;

        CampaignRepository::record_distribution_in_tx(
            &mut tx,
            cmd.campaign_id,
            claimed.len() as i32,
            cmd.now,
        )
        .await?;

        tx.commit().await?;

        Ok(ScheduleOutcome {
            base_ids: base.to_vec(),
            buffer_ids: buffer.to_vec(),
        })
    }

    #[instrument(skip(self), fields(assignment_id = cmd.assignment_id))]
    async fn release_materials(&self, cmd: &MaterialRelease) -> Result<ReleaseOutcome> {
        let mut tx = self.pool.begin().await?;

        let assignment = AssignmentRepository::get_for_update_in_tx(&mut tx, cmd.assignment_id)
            .await?
            .ok_or(EngineError::AssignmentNotFound(cmd.assignment_id))?;

        if assignment.status != AssignmentStatus::Scheduled {
            tx.rollback().await?;
            return Ok(ReleaseOutcome::NotScheduled {
                status: assignment.status,
            });
        }

        let campaign = CampaignRepository::get_for_update_in_tx(&mut tx, assignment.campaign_id)
            .await?
            .ok_or(EngineError::CampaignNotFound(assignment.campaign_id))?;

        if campaign.status != CampaignStatus::Active {
            tx.rollback().await?;
            return Ok(ReleaseOutcome::CampaignInactive {
                campaign_id: campaign.id,
                status: campaign.status,
            });
        }

        let cost = assignment.format_assigned.credit_cost();
        let Some(balance_after) =
            CampaignRepository::debit_credits_in_tx(&mut tx, campaign.id, cost, cmd.released_at)
                .await?
        else {
            tx.rollback().await?;
            return Ok(ReleaseOutcome::InsufficientCredits {
                campaign_id: campaign.id,
                required: cost,
                available: campaign.credits_remaining,
            });
        };

        let released = AssignmentRepository::approve_in_tx(&mut tx, cmd)
            .await?
            .ok_or(EngineError::InvalidTransition {
                from: assignment.status,
                to: AssignmentStatus::Approved,
            })?;

        let ledger = NewCreditTransaction::deduction(
            campaign.id,
            released.id,
            cost,
            balance_after,
            cmd.released_at,
        );
        CreditLedgerRepository::append_in_tx(&mut tx, &ledger).await?;

        tx.commit().await?;

        debug!(balance_after, cost, "资料发放事务已提交");

        Ok(ReleaseOutcome::Released {
            assignment: released,
            credits_debited: cost,
            balance_after,
        })
    }

    async fn create_reminders(&self, cmd: &NewReminders) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let created = ReminderRepository::create_ladder_in_tx(&mut tx, cmd).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn mark_reminder_sent(&self, reminder_id: i64, sent_at: DateTime<Utc>) -> Result<bool> {
        self.reminders.mark_sent(reminder_id, sent_at).await
    }

    #[instrument(skip(self), fields(assignment_id = cmd.assignment_id))]
    async fn expire_assignment(&self, cmd: &Expiration) -> Result<ExpirationOutcome> {
        let mut tx = self.pool.begin().await?;

        let assignment = AssignmentRepository::get_for_update_in_tx(&mut tx, cmd.assignment_id)
            .await?
            .ok_or(EngineError::AssignmentNotFound(cmd.assignment_id))?;

        if !assignment.is_overdue(cmd.now) {
            tx.rollback().await?;
            return Ok(ExpirationOutcome::Skipped {
                assignment_id: assignment.id,
                status: assignment.status,
            });
        }

        AssignmentRepository::expire_in_tx(&mut tx, assignment.id, cmd.now).await?;
        CampaignRepository::increment_expired_in_tx(&mut tx, assignment.campaign_id, cmd.now).await?;
        let profile = ReaderProfileRepository::apply_expiration_in_tx(
            &mut tx,
            assignment.reader_id,
            cmd.reliability_penalty,
            cmd.now,
        )
        .await?;

        let promoted =
            AssignmentRepository::claim_next_waiting_in_tx(&mut tx, assignment.campaign_id).await?;
        if let Some(next_id) = promoted {
            AssignmentRepository::mark_scheduled_in_tx(
                &mut tx,
                &[next_id],
                false,
                cmd.promote_week,
                cmd.promote_date,
                cmd.now,
            )
            .await?;
            CampaignRepository::increment_assigned_in_tx(&mut tx, assignment.campaign_id, cmd.now)
                .await?;
        }

        tx.commit().await?;

        Ok(ExpirationOutcome::Expired {
            assignment_id: assignment.id,
            campaign_id: assignment.campaign_id,
            reader_id: assignment.reader_id,
            reliability_score: profile.reliability_score,
            promoted_assignment_id: promoted,
        })
    }

    async fn pause_campaign(
        &self,
        campaign_id: i64,
        reason: PauseReason,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let paused = CampaignRepository::pause_in_tx(&mut tx, campaign_id, reason, now).await?;
        tx.commit().await?;
        Ok(paused)
    }

    #[instrument(skip(self, description))]
    async fn allocate_credits(
        &self,
        campaign_id: i64,
        amount: i32,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        let mut tx = self.pool.begin().await?;

        CampaignRepository::get_for_update_in_tx(&mut tx, campaign_id)
            .await?
            .ok_or(EngineError::CampaignNotFound(campaign_id))?;

        let campaign = CampaignRepository::allocate_in_tx(&mut tx, campaign_id, amount, now)
            .await?
            .ok_or(EngineError::CampaignNotFound(campaign_id))?;

        let ledger = NewCreditTransaction::allocation(
            campaign_id,
            amount,
            campaign.credits_remaining,
            description,
            now,
        );
        CreditLedgerRepository::append_in_tx(&mut tx, &ledger).await?;

        tx.commit().await?;

        Ok(campaign)
    }

    #[instrument(skip(self))]
    async fn expire_remaining_credits(
        &self,
        campaign_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        let mut tx = self.pool.begin().await?;

        let before = CampaignRepository::get_for_update_in_tx(&mut tx, campaign_id)
            .await?
            .ok_or(EngineError::CampaignNotFound(campaign_id))?;

        if before.credits_remaining == 0 {
            tx.rollback().await?;
            return Ok(before);
        }

        let campaign = CampaignRepository::expire_remaining_in_tx(&mut tx, campaign_id, now)
            .await?
            .ok_or(EngineError::CampaignNotFound(campaign_id))?;

        let ledger = NewCreditTransaction::expiration(campaign_id, before.credits_remaining, now);
        CreditLedgerRepository::append_in_tx(&mut tx, &ledger).await?;

        tx.commit().await?;

        Ok(campaign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_creation() {
        let pool = PgPool::connect_lazy("postgres://localhost/test").unwrap();
        let store = PgSchedulingStore::new(pool);
        assert!(!store.pool().is_closed());
    }
}
