//! 集成测试公共设施
//!
//! 内存存储 + 固定时钟 + 记录型通知器，三个作业经同一个 `JobRunner` 执行

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio::sync::Semaphore;

use assignment_engine::repository::{
    EnqueueReader, Expiration, ExpirationOutcome, MaterialRelease, NewReminders, PageCursor,
    ReleaseOutcome, ScheduleBatch, ScheduleOutcome,
};
use assignment_engine::service::{DeadlineReport, DistributionReport, JobReport, ReleaseReport};
use assignment_engine::{
    ApplicationService, Assignment, BookFormat, Campaign, Clock, CreditService, CreditTransaction,
    DeadlineMonitor, DispatchMode, DistributionScheduler, DueReminder, EngineSettings,
    FixedClock, InMemorySchedulingStore, JobKind, JobRunner, MaterialReleaseRunner,
    NotificationSender, PauseReason, ReaderProfile, RecordingNotifier, Reminder, Result,
    SchedulingStore,
};

/// 2024-03-04 是周一
pub fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()
}

pub struct Harness<S: SchedulingStore + 'static = InMemorySchedulingStore> {
    pub store: Arc<S>,
    pub memory: Arc<InMemorySchedulingStore>,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub runner: Arc<JobRunner<S>>,
    pub credits: Arc<CreditService<S>>,
    pub applications: ApplicationService<S>,
}

impl Harness<InMemorySchedulingStore> {
    pub fn new() -> Self {
        let memory = Arc::new(InMemorySchedulingStore::new());
        Self::with_store(memory.clone(), memory)
    }
}

impl<S: SchedulingStore + 'static> Harness<S> {
    pub fn with_store(store: Arc<S>, memory: Arc<InMemorySchedulingStore>) -> Self {
        let clock = Arc::new(FixedClock::new(monday()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let notifier = Arc::new(RecordingNotifier::new());
        let sender = NotificationSender::new(notifier.clone()).with_mode(DispatchMode::Inline);
        let settings = EngineSettings::default();

        let runner = Arc::new(JobRunner::new(
            DistributionScheduler::new(
                store.clone(),
                dyn_clock.clone(),
                settings.clone(),
                sender.clone(),
            ),
            MaterialReleaseRunner::new(
                store.clone(),
                dyn_clock.clone(),
                settings.clone(),
                sender.clone(),
            ),
            DeadlineMonitor::new(store.clone(), dyn_clock.clone(), settings, sender),
            dyn_clock.clone(),
        ));

        Self {
            credits: Arc::new(CreditService::new(store.clone(), dyn_clock.clone())),
            applications: ApplicationService::new(store.clone(), dyn_clock),
            store,
            memory,
            clock,
            notifier,
            runner,
        }
    }

    pub fn campaign(&self, reviews_per_week: i32, credits: i32) -> Campaign {
        self.memory
            .create_active_campaign(100, "测试图书", reviews_per_week, credits, self.clock.now())
    }

    pub async fn apply(&self, campaign_id: i64, reader_id: i64, format: BookFormat) -> Assignment {
        self.applications
            .enqueue_reader(campaign_id, reader_id, format)
            .await
            .unwrap()
    }

    pub async fn distribute(&self) -> DistributionReport {
        match self.runner.trigger(JobKind::WeeklyDistribution).await.unwrap() {
            JobReport::WeeklyDistribution(report) => report,
            other => panic!("unexpected report: {:?}", other),
        }
    }

    pub async fn release(&self) -> ReleaseReport {
        match self.runner.trigger(JobKind::DailyRelease).await.unwrap() {
            JobReport::DailyRelease(report) => report,
            other => panic!("unexpected report: {:?}", other),
        }
    }

    pub async fn hourly(&self) -> DeadlineReport {
        match self.runner.trigger(JobKind::HourlyDeadline).await.unwrap() {
            JobReport::HourlyDeadline(report) => report,
            other => panic!("unexpected report: {:?}", other),
        }
    }

    pub async fn assignment(&self, id: i64) -> Assignment {
        self.memory.get_assignment(id).await.unwrap().unwrap()
    }

    pub async fn campaign_state(&self, id: i64) -> Campaign {
        self.memory.get_campaign(id).await.unwrap().unwrap()
    }
}

/// 在 `list_releasable` 处阻塞的存储，用于制造“作业执行中”的状态
pub struct GatedStore {
    inner: Arc<InMemorySchedulingStore>,
    gate: Semaphore,
}

impl GatedStore {
    pub fn new(inner: Arc<InMemorySchedulingStore>) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(64);
    }
}

#[async_trait]
impl SchedulingStore for GatedStore {
    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>> {
        self.inner.get_campaign(id).await
    }
    async fn list_active_campaigns(&self) -> Result<Vec<Campaign>> {
        self.inner.list_active_campaigns().await
    }
    async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>> {
        self.inner.get_assignment(id).await
    }
    async fn list_waiting(&self, campaign_id: i64, limit: i64) -> Result<Vec<Assignment>> {
        self.inner.list_waiting(campaign_id, limit).await
    }
    async fn list_releasable(&self, today: NaiveDate) -> Result<Vec<Assignment>> {
        let _permit = self.gate.acquire().await;
        self.inner.list_releasable(today).await
    }
    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<Assignment>> {
        self.inner.list_overdue(now, after, limit).await
    }
    async fn list_due_reminders(
        &self,
        now: DateTime<Utc>,
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<DueReminder>> {
        self.inner.list_due_reminders(now, after, limit).await
    }
    async fn list_reminders(&self, assignment_id: i64) -> Result<Vec<Reminder>> {
        self.inner.list_reminders(assignment_id).await
    }
    async fn list_credit_transactions(&self, campaign_id: i64) -> Result<Vec<CreditTransaction>> {
        self.inner.list_credit_transactions(campaign_id).await
    }
    async fn get_reader_profile(&self, reader_id: i64) -> Result<Option<ReaderProfile>> {
        self.inner.get_reader_profile(reader_id).await
    }
    async fn enqueue_reader(&self, cmd: &EnqueueReader) -> Result<Assignment> {
        self.inner.enqueue_reader(cmd).await
    }
    async fn schedule_assignments(&self, cmd: &ScheduleBatch) -> Result<ScheduleOutcome> {
        self.inner.schedule_assignments(cmd).await
    }
    async fn release_materials(&self, cmd: &MaterialRelease) -> Result<ReleaseOutcome> {
        self.inner.release_materials(cmd).await
    }
    async fn create_reminders(&self, cmd: &NewReminders) -> Result<u64> {
        self.inner.create_reminders(cmd).await
    }
    async fn mark_reminder_sent(&self, reminder_id: i64, sent_at: DateTime<Utc>) -> Result<bool> {
        self.inner.mark_reminder_sent(reminder_id, sent_at).await
    }
    async fn expire_assignment(&self, cmd: &Expiration) -> Result<ExpirationOutcome> {
        self.inner.expire_assignment(cmd).await
    }
    async fn pause_campaign(
        &self,
        campaign_id: i64,
        reason: PauseReason,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner.pause_campaign(campaign_id, reason, now).await
    }
    async fn allocate_credits(
        &self,
        campaign_id: i64,
        amount: i32,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        self.inner
            .allocate_credits(campaign_id, amount, description, now)
            .await
    }
    async fn expire_remaining_credits(
        &self,
        campaign_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        self.inner.expire_remaining_credits(campaign_id, now).await
    }
}
