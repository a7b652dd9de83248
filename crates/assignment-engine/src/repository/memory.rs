//! 内存调度存储
//!
//! 与 PostgreSQL 实现遵守同一契约：每个写方法在一把锁内先完成全部校验，
//! 再一次性写入，失败时不留下任何修改。用于测试和本地演示。

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;

use super::commands::{
    EnqueueReader, Expiration, ExpirationOutcome, MaterialRelease, NewReminders, PageCursor,
    ReleaseOutcome, ScheduleBatch, ScheduleOutcome,
};
use super::traits::SchedulingStore;
use crate::error::{EngineError, Result};
use crate::models::{
    Assignment, AssignmentStatus, Campaign, CampaignStatus, CreditTransaction, DueReminder,
    NewCreditTransaction, PauseReason, ReaderProfile, Reminder,
};

#[derive(Default)]
struct State {
    campaigns: BTreeMap<i64, Campaign>,
    assignments: BTreeMap<i64, Assignment>,
    reminders: BTreeMap<i64, Reminder>,
    ledger: Vec<CreditTransaction>,
    readers: HashMap<i64, ReaderProfile>,
    next_campaign_id: i64,
    next_assignment_id: i64,
    next_reminder_id: i64,
    next_ledger_id: i64,
    /// 注入故障的活动与任务
    failing_campaigns: HashSet<i64>,
    failing_assignments: HashSet<i64>,
    failing_reminders: HashSet<i64>,
}

impl State {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn append_ledger(&mut self, tx: NewCreditTransaction) {
        let id = Self::next_id(&mut self.next_ledger_id);
        self.ledger.push(CreditTransaction {
            id,
            campaign_id: tx.campaign_id,
            amount: tx.amount,
            transaction_type: tx.transaction_type,
            balance_after: tx.balance_after,
            assignment_id: tx.assignment_id,
            description: tx.description,
            created_at: tx.created_at,
        });
    }

    fn check_assignment_fault(&self, id: i64) -> Result<()> {
        if self.failing_assignments.contains(&id) {
            return Err(EngineError::Internal(format!("注入故障: assignment_id={}", id)));
        }
        Ok(())
    }
}

/// 内存调度存储
#[derive(Default)]
pub struct InMemorySchedulingStore {
    state: Mutex<State>,
}

impl InMemorySchedulingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一个活动，`id` 为 0 时自动分配
    pub fn insert_campaign(&self, mut campaign: Campaign) -> Campaign {
        let mut state = self.state.lock();
        if campaign.id == 0 {
            campaign.id = State::next_id(&mut state.next_campaign_id);
        } else {
            state.next_campaign_id = state.next_campaign_id.max(campaign.id);
        }
        state.campaigns.insert(campaign.id, campaign.clone());
        campaign
    }

    /// 创建一个进行中的活动，并记一笔初始充值流水
    pub fn create_active_campaign(
        &self,
        author_id: i64,
        book_title: &str,
        reviews_per_week: i32,
        credits: i32,
        now: DateTime<Utc>,
    ) -> Campaign {
        let campaign = self.insert_campaign(Campaign {
            id: 0,
            author_id,
            book_title: book_title.to_string(),
            target_reviews: reviews_per_week * 4,
            reviews_per_week,
            credits_allocated: credits,
            credits_used: 0,
            credits_remaining: credits,
            status: CampaignStatus::Active,
            start_date: Some(now.date_naive()),
            expected_end_date: None,
            current_week: 0,
            total_assigned_readers: 0,
            reviews_expired: 0,
            next_queue_position: 1,
            paused_at: None,
            pause_reason: None,
            created_at: now,
            updated_at: now,
        });
        if credits > 0 {
            self.state.lock().append_ledger(NewCreditTransaction::allocation(
                campaign.id,
                credits,
                credits,
                Some("初始充值".to_string()),
                now,
            ));
        }
        campaign
    }

    /// 直接覆盖一条任务记录
    pub fn put_assignment(&self, assignment: Assignment) {
        let mut state = self.state.lock();
        state.next_assignment_id = state.next_assignment_id.max(assignment.id);
        state.assignments.insert(assignment.id, assignment);
    }

    pub fn put_reader_profile(&self, profile: ReaderProfile) {
        self.state.lock().readers.insert(profile.reader_id, profile);
    }

    /// 活动下的全部任务，按排队序号排序
    pub fn assignments_of(&self, campaign_id: i64) -> Vec<Assignment> {
        let state = self.state.lock();
        let mut list: Vec<Assignment> = state
            .assignments
            .values()
            .filter(|a| a.campaign_id == campaign_id)
            .cloned()
            .collect();
        list.sort_by_key(|a| a.queue_position);
        list
    }

    pub fn campaigns(&self) -> Vec<Campaign> {
        self.state.lock().campaigns.values().cloned().collect()
    }

    pub fn fail_campaign(&self, campaign_id: i64) {
        self.state.lock().failing_campaigns.insert(campaign_id);
    }

    pub fn fail_assignment(&self, assignment_id: i64) {
        self.state.lock().failing_assignments.insert(assignment_id);
    }

    pub fn fail_reminder(&self, reminder_id: i64) {
        self.state.lock().failing_reminders.insert(reminder_id);
    }

    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.failing_campaigns.clear();
        state.failing_assignments.clear();
        state.failing_reminders.clear();
    }
}

#[async_trait]
impl SchedulingStore for InMemorySchedulingStore {
    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>> {
        Ok(self.state.lock().campaigns.get(&id).cloned())
    }

    async fn list_active_campaigns(&self) -> Result<Vec<Campaign>> {
        Ok(self
            .state
            .lock()
            .campaigns
            .values()
            .filter(|c| c.status == CampaignStatus::Active)
            .cloned()
            .collect())
    }

    async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>> {
        Ok(self.state.lock().assignments.get(&id).cloned())
    }

    async fn list_waiting(&self, campaign_id: i64, limit: i64) -> Result<Vec<Assignment>> {
        let mut waiting: Vec<Assignment> = self
            .assignments_of(campaign_id)
            .into_iter()
            .filter(|a| a.status == AssignmentStatus::Waiting)
            .collect();
        waiting.truncate(limit.max(0) as usize);
        Ok(waiting)
    }

    async fn list_releasable(&self, today: NaiveDate) -> Result<Vec<Assignment>> {
        let state = self.state.lock();
        let mut list: Vec<Assignment> = state
            .assignments
            .values()
            .filter(|a| {
                a.status == AssignmentStatus::Scheduled
                    && a.scheduled_date.is_some_and(|d| d <= today)
            })
            .cloned()
            .collect();
        list.sort_by_key(|a| (a.scheduled_date, a.campaign_id, a.queue_position));
        Ok(list)
    }

    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<Assignment>> {
        let state = self.state.lock();
        let mut list: Vec<Assignment> = state
            .assignments
            .values()
            .filter(|a| a.is_overdue(now))
            .filter(|a| match (after, a.deadline_at) {
                (Some(c), Some(deadline)) => (deadline, a.id) > (c.at, c.id),
                _ => true,
            })
            .cloned()
            .collect();
        list.sort_by_key(|a| (a.deadline_at, a.id));
        list.truncate(limit.max(0) as usize);
        Ok(list)
    }

    async fn list_due_reminders(
        &self,
        now: DateTime<Utc>,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<DueReminder>> {
        let state = self.state.lock();
        let mut due: Vec<DueReminder> = state
            .reminders
            .values()
            .filter(|r| !r.email_sent && r.scheduled_for <= now)
            .filter(|r| after.is_none_or(|c| (r.scheduled_for, r.id) > (c.at, c.id)))
            .filter_map(|r| {
                let assignment = state.assignments.get(&r.assignment_id)?;
                if !assignment.status.holds_access() {
                    return None;
                }
                Some(DueReminder {
                    id: r.id,
                    assignment_id: r.assignment_id,
                    reminder_type: r.reminder_type,
                    scheduled_for: r.scheduled_for,
                    reader_id: assignment.reader_id,
                    campaign_id: assignment.campaign_id,
                    deadline_at: assignment.deadline_at,
                })
            })
            .collect();
        due.sort_by_key(|r| (r.scheduled_for, r.id));
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn list_reminders(&self, assignment_id: i64) -> Result<Vec<Reminder>> {
        let state = self.state.lock();
        let mut list: Vec<Reminder> = state
            .reminders
            .values()
            .filter(|r| r.assignment_id == assignment_id)
            .cloned()
            .collect();
        list.sort_by_key(|r| r.scheduled_for);
        Ok(list)
    }

    async fn list_credit_transactions(&self, campaign_id: i64) -> Result<Vec<CreditTransaction>> {
        Ok(self
            .state
            .lock()
            .ledger
            .iter()
            .filter(|t| t.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn get_reader_profile(&self, reader_id: i64) -> Result<Option<ReaderProfile>> {
        Ok(self.state.lock().readers.get(&reader_id).cloned())
    }

    async fn enqueue_reader(&self, cmd: &EnqueueReader) -> Result<Assignment> {
        let mut state = self.state.lock();

        if !state.campaigns.contains_key(&cmd.campaign_id) {
            return Err(EngineError::CampaignNotFound(cmd.campaign_id));
        }

        let duplicate = state.assignments.values().any(|a| {
            a.campaign_id == cmd.campaign_id && a.reader_id == cmd.reader_id && a.status.is_active()
        });
        if duplicate {
            return Err(EngineError::DuplicateActiveAssignment {
                reader_id: cmd.reader_id,
                campaign_id: cmd.campaign_id,
            });
        }

        let id = State::next_id(&mut state.next_assignment_id);
        let Some(campaign) = state.campaigns.get_mut(&cmd.campaign_id) else {
            return Err(EngineError::CampaignNotFound(cmd.campaign_id));
        };
        let queue_position = campaign.next_queue_position;
        campaign.next_queue_position += 1;
        campaign.updated_at = cmd.now;

        let assignment = Assignment {
            id,
            campaign_id: cmd.campaign_id,
            reader_id: cmd.reader_id,
            status: AssignmentStatus::Waiting,
            queue_position,
            is_buffer_assignment: false,
            format_assigned: cmd.format,
            scheduled_week: None,
            scheduled_date: None,
            materials_released_at: None,
            materials_expires_at: None,
            deadline_at: None,
            access_token: None,
            expired_at: None,
            created_at: cmd.now,
            updated_at: cmd.now,
        };
        state.assignments.insert(id, assignment.clone());
        state
            .readers
            .entry(cmd.reader_id)
            .or_insert_with(|| ReaderProfile::new(cmd.reader_id, cmd.now));

        Ok(assignment)
    }

    async fn schedule_assignments(&self, cmd: &ScheduleBatch) -> Result<ScheduleOutcome> {
        let mut state = self.state.lock();

        if state.failing_campaigns.contains(&cmd.campaign_id) {
            return Err(EngineError::Internal(format!(
                "注入故障: campaign_id={}",
                cmd.campaign_id
            )));
        }

        let campaign = state
            .campaigns
            .get(&cmd.campaign_id)
            .ok_or(EngineError::CampaignNotFound(cmd.campaign_id))?;
        if campaign.status != CampaignStatus::Active {
            return Ok(ScheduleOutcome::default());
        }

        let total = (cmd.base_slots.max(0) + cmd.buffer_slots.max(0)) as usize;
        let mut waiting: Vec<&Assignment> = state
            .assignments
            .values()
            .filter(|a| a.campaign_id == cmd.campaign_id && a.status == AssignmentStatus::Waiting)
            .collect();
        waiting.sort_by_key(|a| a.queue_position);
        let claimed: Vec<i64> = waiting.iter().take(total).map(|a| a.id).collect();

        if claimed.is_empty() {
            return Ok(ScheduleOutcome::default());
        }

        let split = claimed.len().min(cmd.base_slots.max(0) as usize);
        let (base, buffer) = claimed.split_at(split);

        for (ids, is_buffer) in [(base, false), (buffer, true)] {
            for id in ids {
                if let Some(a) = state.assignments.get_mut(id) {
                    a.status = AssignmentStatus::Scheduled;
                    a.is_buffer_assignment = is_buffer;
                    a.scheduled_week = Some(cmd.scheduled_week);
                    a.scheduled_date = Some(cmd.scheduled_date);
                    a.updated_at = cmd.now;
                }
            }
        }

        if let Some(campaign) = state.campaigns.get_mut(&cmd.campaign_id) {
            campaign.total_assigned_readers += claimed.len() as i32;
            campaign.current_week += 1;
            campaign.updated_at = cmd.now;
        }

        Ok(ScheduleOutcome {
            base_ids: base.to_vec(),
            buffer_ids: buffer.to_vec(),
        })
    }

    async fn release_materials(&self, cmd: &MaterialRelease) -> Result<ReleaseOutcome> {
        let mut state = self.state.lock();
        state.check_assignment_fault(cmd.assignment_id)?;

        let assignment = state
            .assignments
            .get(&cmd.assignment_id)
            .cloned()
            .ok_or(EngineError::AssignmentNotFound(cmd.assignment_id))?;

        if assignment.status != AssignmentStatus::Scheduled {
            return Ok(ReleaseOutcome::NotScheduled {
                status: assignment.status,
            });
        }

        let campaign = state
            .campaigns
            .get(&assignment.campaign_id)
            .cloned()
            .ok_or(EngineError::CampaignNotFound(assignment.campaign_id))?;

        if campaign.status != CampaignStatus::Active {
            return Ok(ReleaseOutcome::CampaignInactive {
                campaign_id: campaign.id,
                status: campaign.status,
            });
        }

        let cost = assignment.format_assigned.credit_cost();
        if !campaign.can_afford(cost) {
            return Ok(ReleaseOutcome::InsufficientCredits {
                campaign_id: campaign.id,
                required: cost,
                available: campaign.credits_remaining,
            });
        }

        let balance_after = campaign.credits_remaining - cost;
        if let Some(c) = state.campaigns.get_mut(&campaign.id) {
            c.credits_used += cost;
            c.credits_remaining = balance_after;
            c.updated_at = cmd.released_at;
        }

        let mut released = assignment;
        released.status = AssignmentStatus::Approved;
        released.materials_released_at = Some(cmd.released_at);
        released.deadline_at = Some(cmd.deadline_at);
        released.materials_expires_at = cmd.materials_expires_at;
        released.access_token = Some(cmd.access_token);
        released.updated_at = cmd.released_at;
        state.assignments.insert(released.id, released.clone());

        state.append_ledger(NewCreditTransaction::deduction(
            campaign.id,
            released.id,
            cost,
            balance_after,
            cmd.released_at,
        ));

        Ok(ReleaseOutcome::Released {
            assignment: released,
            credits_debited: cost,
            balance_after,
        })
    }

    async fn create_reminders(&self, cmd: &NewReminders) -> Result<u64> {
        let mut state = self.state.lock();

        let existing: HashSet<_> = state
            .reminders
            .values()
            .filter(|r| r.assignment_id == cmd.assignment_id)
            .map(|r| r.reminder_type)
            .collect();

        let mut created = 0;
        for (reminder_type, scheduled_for) in &cmd.ladder {
            if existing.contains(reminder_type) {
                continue;
            }
            let id = State::next_id(&mut state.next_reminder_id);
            state.reminders.insert(
                id,
                Reminder {
                    id,
                    assignment_id: cmd.assignment_id,
                    reminder_type: *reminder_type,
                    scheduled_for: *scheduled_for,
                    email_sent: false,
                    sent_at: None,
                    created_at: cmd.now,
                },
            );
            created += 1;
        }

        Ok(created)
    }

    async fn mark_reminder_sent(&self, reminder_id: i64, sent_at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock();
        if state.failing_reminders.contains(&reminder_id) {
            return Err(EngineError::Internal(format!(
                "注入故障: reminder_id={}",
                reminder_id
            )));
        }
        match state.reminders.get_mut(&reminder_id) {
            Some(r) if !r.email_sent => {
                r.email_sent = true;
                r.sent_at = Some(sent_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_assignment(&self, cmd: &Expiration) -> Result<ExpirationOutcome> {
        let mut state = self.state.lock();
        state.check_assignment_fault(cmd.assignment_id)?;

        let assignment = state
            .assignments
            .get(&cmd.assignment_id)
            .cloned()
            .ok_or(EngineError::AssignmentNotFound(cmd.assignment_id))?;

        if !assignment.is_overdue(cmd.now) {
            return Ok(ExpirationOutcome::Skipped {
                assignment_id: assignment.id,
                status: assignment.status,
            });
        }
        if !state.campaigns.contains_key(&assignment.campaign_id) {
            return Err(EngineError::CampaignNotFound(assignment.campaign_id));
        }

        let promoted = state
            .assignments
            .values()
            .filter(|a| {
                a.campaign_id == assignment.campaign_id && a.status == AssignmentStatus::Waiting
            })
            .min_by_key(|a| a.queue_position)
            .map(|a| a.id);

        if let Some(a) = state.assignments.get_mut(&assignment.id) {
            a.status = AssignmentStatus::Expired;
            a.expired_at = Some(cmd.now);
            a.access_token = None;
            a.materials_expires_at = None;
            a.updated_at = cmd.now;
        }

        if let Some(next_id) = promoted
            && let Some(a) = state.assignments.get_mut(&next_id)
        {
            a.status = AssignmentStatus::Scheduled;
            a.is_buffer_assignment = false;
            a.scheduled_date = Some(cmd.promote_date);
            a.scheduled_week = Some(cmd.promote_week);
            a.updated_at = cmd.now;
        }

        if let Some(c) = state.campaigns.get_mut(&assignment.campaign_id) {
            c.reviews_expired += 1;
            if promoted.is_some() {
                c.total_assigned_readers += 1;
            }
            c.updated_at = cmd.now;
        }

        let profile = state
            .readers
            .entry(assignment.reader_id)
            .or_insert_with(|| ReaderProfile::new(assignment.reader_id, cmd.now));
        profile.apply_expiration(cmd.reliability_penalty, cmd.now);
        let reliability_score = profile.reliability_score;

        Ok(ExpirationOutcome::Expired {
            assignment_id: assignment.id,
            campaign_id: assignment.campaign_id,
            reader_id: assignment.reader_id,
            reliability_score,
            promoted_assignment_id: promoted,
        })
    }

    async fn pause_campaign(
        &self,
        campaign_id: i64,
        reason: PauseReason,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        let campaign = state
            .campaigns
            .get_mut(&campaign_id)
            .ok_or(EngineError::CampaignNotFound(campaign_id))?;

        if campaign.status != CampaignStatus::Active {
            return Ok(false);
        }
        campaign.status = CampaignStatus::Paused;
        campaign.paused_at = Some(now);
        campaign.pause_reason = Some(reason);
        campaign.updated_at = now;
        Ok(true)
    }

    async fn allocate_credits(
        &self,
        campaign_id: i64,
        amount: i32,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        let mut state = self.state.lock();
        let campaign = state
            .campaigns
            .get_mut(&campaign_id)
            .ok_or(EngineError::CampaignNotFound(campaign_id))?;

        campaign.credits_allocated += amount;
        campaign.credits_remaining += amount;
        if campaign.is_paused_for_credits() {
            campaign.status = CampaignStatus::Active;
            campaign.paused_at = None;
            campaign.pause_reason = None;
        }
        campaign.updated_at = now;
        let updated = campaign.clone();

        state.append_ledger(NewCreditTransaction::allocation(
            campaign_id,
            amount,
            updated.credits_remaining,
            description,
            now,
        ));

        Ok(updated)
    }

    async fn expire_remaining_credits(
        &self,
        campaign_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        let mut state = self.state.lock();
        let campaign = state
            .campaigns
            .get_mut(&campaign_id)
            .ok_or(EngineError::CampaignNotFound(campaign_id))?;

        let remaining = campaign.credits_remaining;
        if remaining == 0 {
            return Ok(campaign.clone());
        }
        campaign.credits_allocated -= remaining;
        campaign.credits_remaining = 0;
        campaign.updated_at = now;
        let updated = campaign.clone();

        state.append_ledger(NewCreditTransaction::expiration(campaign_id, remaining, now));

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookFormat;
    use chrono::Duration;

    fn enqueue(campaign_id: i64, reader_id: i64, now: DateTime<Utc>) -> EnqueueReader {
        EnqueueReader {
            campaign_id,
            reader_id,
            format: BookFormat::Ebook,
            now,
        }
    }

    #[tokio::test]
    async fn test_enqueue_assigns_increasing_queue_positions() {
        let store = InMemorySchedulingStore::new();
        let now = Utc::now();
        let campaign = store.create_active_campaign(1, "书", 10, 100, now);

        let a = store.enqueue_reader(&enqueue(campaign.id, 100, now)).await.unwrap();
        let b = store.enqueue_reader(&enqueue(campaign.id, 101, now)).await.unwrap();

        assert_eq!(a.queue_position, 1);
        assert_eq!(b.queue_position, 2);
        assert_eq!(a.status, AssignmentStatus::Waiting);
        let profile = store.get_reader_profile(100).await.unwrap().unwrap();
        assert_eq!(profile.reliability_score, ReaderProfile::INITIAL_SCORE);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_second_active_assignment() {
        let store = InMemorySchedulingStore::new();
        let now = Utc::now();
        let campaign = store.create_active_campaign(1, "书", 10, 100, now);

        store.enqueue_reader(&enqueue(campaign.id, 100, now)).await.unwrap();
        let err = store
            .enqueue_reader(&enqueue(campaign.id, 100, now))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateActiveAssignment { .. }));

        // 排队序号不因失败而被占用
        let next = store.enqueue_reader(&enqueue(campaign.id, 200, now)).await.unwrap();
        assert_eq!(next.queue_position, 2);
    }

    #[tokio::test]
    async fn test_release_with_insufficient_credits_leaves_no_trace() {
        let store = InMemorySchedulingStore::new();
        let now = Utc::now();
        let campaign = store.create_active_campaign(1, "书", 10, 1, now);
        let mut assignment = store
            .enqueue_reader(&EnqueueReader {
                campaign_id: campaign.id,
                reader_id: 7,
                format: BookFormat::Audiobook,
                now,
            })
            .await
            .unwrap();
        assignment.status = AssignmentStatus::Scheduled;
        assignment.scheduled_date = Some(now.date_naive());
        store.put_assignment(assignment.clone());

        let outcome = store
            .release_materials(&MaterialRelease {
                assignment_id: assignment.id,
                released_at: now,
                deadline_at: now + Duration::hours(72),
                materials_expires_at: Some(now + Duration::days(7)),
                access_token: uuid::Uuid::new_v4(),
            })
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ReleaseOutcome::InsufficientCredits {
                required: 2,
                available: 1,
                ..
            }
        ));
        let after = store.get_campaign(campaign.id).await.unwrap().unwrap();
        assert_eq!(after.credits_remaining, 1);
        assert_eq!(after.credits_used, 0);
        let unchanged = store.get_assignment(assignment.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, AssignmentStatus::Scheduled);
        assert_eq!(store.list_credit_transactions(campaign.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_reminders_is_idempotent() {
        let store = InMemorySchedulingStore::new();
        let now = Utc::now();
        let cmd = NewReminders {
            assignment_id: 1,
            ladder: crate::settings::EngineSettings::default().reminder_ladder(now),
            now,
        };

        assert_eq!(store.create_reminders(&cmd).await.unwrap(), 5);
        assert_eq!(store.create_reminders(&cmd).await.unwrap(), 0);
        assert_eq!(store.list_reminders(1).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_allocate_resumes_campaign_paused_for_credits() {
        let store = InMemorySchedulingStore::new();
        let now = Utc::now();
        let campaign = store.create_active_campaign(1, "书", 10, 0, now);

        assert!(
            store
                .pause_campaign(campaign.id, PauseReason::InsufficientCredits, now)
                .await
                .unwrap()
        );
        // 已暂停的活动不会被重复暂停
        assert!(
            !store
                .pause_campaign(campaign.id, PauseReason::InsufficientCredits, now)
                .await
                .unwrap()
        );

        let resumed = store
            .allocate_credits(campaign.id, 20, None, now)
            .await
            .unwrap();
        assert_eq!(resumed.status, CampaignStatus::Active);
        assert_eq!(resumed.pause_reason, None);
        assert_eq!(resumed.credits_remaining, 20);
        assert!(resumed.credits_balanced());
    }
}
