//! 每小时截止检查
//!
//! 两个阶段，先提醒后过期：
//! - 提醒：分页发送全部到期未发的提醒，成功后标记已发送，失败的留到下一小时重试
//! - 过期：分页取出全部超过截止时间的 APPROVED / IN_PROGRESS 任务逐条过期，
//!   同一事务内更新活动与读者计数，并把排队最前的读者补位到今天的排期

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use campaign_shared::observability::metrics;

use super::dto::{DeadlineReport, ItemFailure};
use crate::clock::{Clock, iso_week};
use crate::error::Result;
use crate::notification::NotificationSender;
use crate::models::DueReminder;
use crate::repository::{
    Expiration, ExpirationOutcome, PageCursor, PgSchedulingStore, SchedulingStore,
};
use crate::settings::EngineSettings;

/// 截止检查器
pub struct DeadlineMonitor<S = PgSchedulingStore>
where
    S: SchedulingStore,
{
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    sender: NotificationSender,
}

impl<S> DeadlineMonitor<S>
where
    S: SchedulingStore,
{
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
        sender: NotificationSender,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
            sender,
        }
    }

    /// 执行一次截止检查
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<DeadlineReport> {
        let now = self.clock.now();
        let mut report = DeadlineReport::new(now);

        self.process_reminders(now, &mut report).await?;
        self.process_expirations(now, &mut report).await?;

        info!(
            reminders_sent = report.reminders_sent,
            reminders_failed = report.reminders_failed.len(),
            expired = report.expired_count(),
            promoted = report.promoted_count(),
            failed = report.failures.len(),
            "截止检查完成"
        );

        Ok(report)
    }

    async fn process_reminders(&self, now: DateTime<Utc>, report: &mut DeadlineReport) -> Result<()> {
        let batch_size = self.settings.reminder_batch_size;
        let mut cursor = None;

        loop {
            let due = self
                .store
                .list_due_reminders(now, cursor, batch_size)
                .await?;
            let Some(last) = due.last() else {
                break;
            };
            cursor = Some(PageCursor {
                at: last.scheduled_for,
                id: last.id,
            });
            info!(count = due.len(), "发现到期提醒");

            for reminder in &due {
                self.send_reminder(reminder, now, report).await;
            }

            if (due.len() as i64) < batch_size {
                break;
            }
        }

        Ok(())
    }

    async fn send_reminder(&self, reminder: &DueReminder, now: DateTime<Utc>, report: &mut DeadlineReport) {
        let reminder_type = reminder.reminder_type.as_str();

        if let Err(e) = self.sender.dispatch_reminder(reminder, now).await {
            warn!(
                reminder_id = reminder.id,
                assignment_id = reminder.assignment_id,
                reminder_type,
                error = %e,
                "提醒发送失败，下次重试"
            );
            metrics::record_reminder(reminder_type, "failed");
            report.reminders_failed.push(ItemFailure::new(reminder.id, &e));
            return;
        }

        match self.store.mark_reminder_sent(reminder.id, now).await {
            Ok(_) => {
                metrics::record_reminder(reminder_type, "sent");
                report.reminders_sent += 1;
            }
            Err(e) => {
                error!(reminder_id = reminder.id, error = %e, "标记提醒已发送失败");
                report.reminders_failed.push(ItemFailure::new(reminder.id, &e));
            }
        }
    }

    async fn process_expirations(
        &self,
        now: DateTime<Utc>,
        report: &mut DeadlineReport,
    ) -> Result<()> {
        let batch_size = self.settings.expiration_batch_size;
        let mut cursor = None;

        loop {
            let overdue = self.store.list_overdue(now, cursor, batch_size).await?;
            let Some(last) = overdue.last() else {
                break;
            };
            cursor = last.deadline_at.map(|at| PageCursor { at, id: last.id });
            info!(count = overdue.len(), "发现已超过截止时间的任务");

            for assignment in &overdue {
                self.expire(assignment.id, now, report).await;
            }

            if cursor.is_none() || (overdue.len() as i64) < batch_size {
                break;
            }
        }

        Ok(())
    }

    async fn expire(&self, assignment_id: i64, now: DateTime<Utc>, report: &mut DeadlineReport) {
        let cmd = Expiration {
            assignment_id,
            now,
            promote_date: now.date_naive(),
            promote_week: iso_week(now),
            reliability_penalty: self.settings.reliability_penalty,
        };

        match self.store.expire_assignment(&cmd).await {
            Ok(outcome) => {
                if let ExpirationOutcome::Expired {
                    assignment_id,
                    campaign_id,
                    reader_id,
                    reliability_score,
                    promoted_assignment_id,
                } = &outcome
                {
                    info!(
                        assignment_id,
                        campaign_id,
                        reader_id,
                        reliability_score,
                        promoted_assignment_id = ?promoted_assignment_id,
                        "任务已过期"
                    );
                    metrics::record_assignment_expired(promoted_assignment_id.is_some());
                }
                report.expirations.push(outcome);
            }
            Err(e) => {
                error!(assignment_id, error = %e, "任务过期处理失败");
                report.failures.push(ItemFailure::new(assignment_id, &e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{AssignmentStatus, BookFormat, ReaderProfile};
    use crate::notification::{DispatchMode, NotificationKind, RecordingNotifier};
    use crate::repository::{EnqueueReader, InMemorySchedulingStore, NewReminders};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    struct Fixture {
        store: Arc<InMemorySchedulingStore>,
        clock: Arc<FixedClock>,
        notifier: Arc<RecordingNotifier>,
        monitor: DeadlineMonitor<InMemorySchedulingStore>,
    }

    fn fixture() -> Fixture {
        fixture_with(EngineSettings::default())
    }

    fn fixture_with(settings: EngineSettings) -> Fixture {
        let store = Arc::new(InMemorySchedulingStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 8, 10, 0, 0).unwrap(),
        ));
        let notifier = Arc::new(RecordingNotifier::new());
        let monitor = DeadlineMonitor::new(
            store.clone(),
            clock.clone(),
            settings,
            NotificationSender::new(notifier.clone()).with_mode(DispatchMode::Inline),
        );
        Fixture {
            store,
            clock,
            notifier,
            monitor,
        }
    }

    /// 造一条已发放的任务，发放时间为 `released_at`
    async fn approved(f: &Fixture, campaign_id: i64, reader_id: i64, released_at: DateTime<Utc>) -> i64 {
        let mut a = f
            .store
            .enqueue_reader(&EnqueueReader {
                campaign_id,
                reader_id,
                format: BookFormat::Ebook,
                now: released_at,
            })
            .await
            .unwrap();
        a.status = AssignmentStatus::Approved;
        a.materials_released_at = Some(released_at);
        a.deadline_at = Some(released_at + Duration::hours(72));
        a.access_token = Some(Uuid::new_v4());
        f.store.put_assignment(a.clone());
        f.store
            .create_reminders(&NewReminders {
                assignment_id: a.id,
                ladder: EngineSettings::default().reminder_ladder(released_at),
                now: released_at,
            })
            .await
            .unwrap();
        a.id
    }

    #[tokio::test]
    async fn test_failed_reminder_stays_unsent_and_is_retried() {
        let f = fixture();
        let campaign = f.store.create_active_campaign(1, "书", 10, 10, f.clock.now());
        // 发放于 50 小时前：24H 与 48H 到期
        let id = approved(&f, campaign.id, 3, f.clock.now() - Duration::hours(50)).await;

        f.notifier.fail_kind(NotificationKind::DeadlineReminder);
        let report = f.monitor.run().await.unwrap();
        assert_eq!(report.reminders_sent, 0);
        assert_eq!(report.reminders_failed.len(), 2);
        let reminders = f.store.list_reminders(id).await.unwrap();
        assert!(reminders.iter().all(|r| !r.email_sent));

        f.notifier.recover();
        f.clock.advance(Duration::hours(1));
        let retry = f.monitor.run().await.unwrap();
        assert_eq!(retry.reminders_sent, 2);
        let sent: Vec<_> = f
            .store
            .list_reminders(id)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.email_sent)
            .map(|r| r.reminder_type.as_str())
            .collect();
        assert_eq!(sent, vec!["24H", "48H"]);
    }

    #[tokio::test]
    async fn test_expiration_without_waiting_reader_leaves_slot_empty() {
        let f = fixture();
        let campaign = f.store.create_active_campaign(1, "书", 10, 10, f.clock.now());
        let id = approved(&f, campaign.id, 3, f.clock.now() - Duration::hours(80)).await;
        f.store.put_reader_profile(ReaderProfile {
            reader_id: 3,
            reliability_score: 2,
            reviews_expired: 4,
            updated_at: f.clock.now(),
        });

        let report = f.monitor.run().await.unwrap();

        assert_eq!(report.expired_count(), 1);
        assert_eq!(report.promoted_count(), 0);
        let expired = f.store.get_assignment(id).await.unwrap().unwrap();
        assert_eq!(expired.status, AssignmentStatus::Expired);
        assert!(expired.access_token.is_none());
        let profile = f.store.get_reader_profile(3).await.unwrap().unwrap();
        assert_eq!(profile.reliability_score, 0);
        assert_eq!(profile.reviews_expired, 5);
    }

    #[tokio::test]
    async fn test_deadline_not_yet_passed_is_untouched() {
        let f = fixture();
        let campaign = f.store.create_active_campaign(1, "书", 10, 10, f.clock.now());
        // 截止恰好在当前时刻，不算过期
        let id = approved(&f, campaign.id, 3, f.clock.now() - Duration::hours(72)).await;

        let report = f.monitor.run().await.unwrap();

        assert_eq!(report.expired_count(), 0);
        let a = f.store.get_assignment(id).await.unwrap().unwrap();
        assert_eq!(a.status, AssignmentStatus::Approved);
        // 72H 提醒已到期并发送
        assert_eq!(report.reminders_sent, 5);
    }

    #[tokio::test]
    async fn test_expirations_drain_every_page() {
        let f = fixture_with(EngineSettings {
            expiration_batch_size: 2,
            ..EngineSettings::default()
        });
        let campaign = f.store.create_active_campaign(1, "书", 10, 10, f.clock.now());
        let mut ids = Vec::new();
        for reader_id in 1..=5 {
            ids.push(approved(&f, campaign.id, reader_id, f.clock.now() - Duration::hours(80)).await);
        }
        // 第一页中失败的任务不影响后续页
        f.store.fail_assignment(ids[0]);

        let report = f.monitor.run().await.unwrap();

        assert_eq!(report.expired_count(), 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].item_id, ids[0]);
        for id in &ids[1..] {
            let a = f.store.get_assignment(*id).await.unwrap().unwrap();
            assert_eq!(a.status, AssignmentStatus::Expired);
        }
    }

    #[tokio::test]
    async fn test_failing_reminders_do_not_starve_later_ones() {
        let f = fixture_with(EngineSettings {
            reminder_batch_size: 2,
            ..EngineSettings::default()
        });
        let campaign = f.store.create_active_campaign(1, "书", 10, 10, f.clock.now());
        let mut ids = Vec::new();
        for reader_id in 1..=3 {
            ids.push(approved(&f, campaign.id, reader_id, f.clock.now() - Duration::hours(50)).await);
        }
        // 第一个任务的两条提醒持续标记失败，仍为未发送
        for reminder in f.store.list_reminders(ids[0]).await.unwrap().iter().take(2) {
            f.store.fail_reminder(reminder.id);
        }

        let report = f.monitor.run().await.unwrap();

        assert_eq!(report.reminders_failed.len(), 2);
        assert_eq!(report.reminders_sent, 4);
        for id in &ids[1..] {
            let sent = f
                .store
                .list_reminders(*id)
                .await
                .unwrap()
                .into_iter()
                .filter(|r| r.email_sent)
                .count();
            assert_eq!(sent, 2);
        }
    }

    #[tokio::test]
    async fn test_no_reminder_after_review_submitted() {
        let f = fixture();
        let campaign = f.store.create_active_campaign(1, "书", 10, 10, f.clock.now());
        let id = approved(&f, campaign.id, 3, f.clock.now() - Duration::hours(50)).await;
        let mut a = f.store.get_assignment(id).await.unwrap().unwrap();
        a.status = AssignmentStatus::Submitted;
        f.store.put_assignment(a);

        let report = f.monitor.run().await.unwrap();

        assert_eq!(report.reminders_sent, 0);
        assert!(report.reminders_failed.is_empty());
        assert!(f.notifier.sent_of(NotificationKind::DeadlineReminder).is_empty());
    }
}
