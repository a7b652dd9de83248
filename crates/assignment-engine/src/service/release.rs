//! 每日资料发放
//!
//! ## 发放流程
//!
//! 1. 取出排期日期不晚于今天的 SCHEDULED 任务
//! 2. 按格式计算积分（电子书 1，有声书 2）
//! 3. 积分不足：暂停活动并通知作者，任务保持 SCHEDULED 等待下次
//! 4. 积分充足：扣积分、改 APPROVED、写截止时间与流水，一个事务完成
//! 5. 创建五条截止提醒（已存在则跳过）
//! 6. 通知读者资料已就绪
//!
//! 单个任务失败只记录日志，不影响其他任务。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use campaign_shared::observability::metrics;

use super::dto::{ItemFailure, ReleaseReport, SkippedRelease};
use crate::clock::Clock;
use crate::error::Result;
use crate::models::{Assignment, PauseReason};
use crate::notification::NotificationSender;
use crate::repository::{
    MaterialRelease, NewReminders, PgSchedulingStore, ReleaseOutcome, SchedulingStore,
};
use crate::settings::EngineSettings;

/// 每日资料发放执行器
pub struct MaterialReleaseRunner<S = PgSchedulingStore>
where
    S: SchedulingStore,
{
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    sender: NotificationSender,
}

impl<S> MaterialReleaseRunner<S>
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

    /// 执行一次资料发放
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<ReleaseReport> {
        let now = self.clock.now();
        let candidates = self.store.list_releasable(now.date_naive()).await?;
        let mut report = ReleaseReport::new(now, candidates.len());

        info!(candidates = candidates.len(), "开始资料发放");

        for assignment in &candidates {
            if let Err(e) = self.release_one(assignment, now, &mut report).await {
                error!(
                    assignment_id = assignment.id,
                    campaign_id = assignment.campaign_id,
                    error = %e,
                    "资料发放失败"
                );
                report.failures.push(ItemFailure::new(assignment.id, &e));
            }
        }

        info!(
            released = report.released.len(),
            credits_debited = report.credits_debited,
            insufficient_credits = report.insufficient_credits.len(),
            paused = report.campaigns_paused.len(),
            failed = report.failures.len(),
            "资料发放完成"
        );

        Ok(report)
    }

    #[instrument(
        skip(self, assignment, report),
        fields(assignment_id = assignment.id, campaign_id = assignment.campaign_id)
    )]
    async fn release_one(
        &self,
        assignment: &Assignment,
        now: DateTime<Utc>,
        report: &mut ReleaseReport,
    ) -> Result<()> {
        let format = assignment.format_assigned;
        let cmd = MaterialRelease {
            assignment_id: assignment.id,
            released_at: now,
            deadline_at: self.settings.deadline(now),
            materials_expires_at: self.settings.materials_expiry(format, now),
            access_token: Uuid::new_v4(),
        };

        match self.store.release_materials(&cmd).await? {
            ReleaseOutcome::Released {
                assignment: released,
                credits_debited,
                balance_after,
            } => {
                info!(
                    format = format.as_str(),
                    credits_debited, balance_after, "资料已发放"
                );
                report.released.push(released.id);
                report.credits_debited += i64::from(credits_debited);
                metrics::record_materials_released(format.as_str(), credits_debited as u64);

                // 提醒在发放事务之外创建，失败不回滚发放
                match self
                    .store
                    .create_reminders(&NewReminders {
                        assignment_id: released.id,
                        ladder: self.settings.reminder_ladder(now),
                        now,
                    })
                    .await
                {
                    Ok(created) => report.reminders_created += created,
                    Err(e) => {
                        error!(error = %e, "创建截止提醒失败");
                    }
                }

                self.sender.send_materials_ready(&released, now).await;
            }
            ReleaseOutcome::InsufficientCredits {
                campaign_id,
                required,
                available,
            } => {
                warn!(required, available, "活动积分不足，跳过发放");
                report.insufficient_credits.push(SkippedRelease {
                    assignment_id: assignment.id,
                    campaign_id,
                    required,
                    available,
                });
                self.pause_for_credits(campaign_id, now, report).await?;
            }
            ReleaseOutcome::CampaignInactive {
                campaign_id,
                status,
            } => {
                info!(campaign_id, status = ?status, "活动未在进行中，保持排期");
                report.campaign_inactive.push(assignment.id);
            }
            ReleaseOutcome::NotScheduled { status } => {
                // 重复执行时已发放的任务会走到这里
                info!(status = ?status, "任务已不在排期状态，跳过");
            }
        }

        Ok(())
    }

    /// 自动暂停活动，只有真正发生状态变更时才通知作者
    async fn pause_for_credits(
        &self,
        campaign_id: i64,
        now: DateTime<Utc>,
        report: &mut ReleaseReport,
    ) -> Result<()> {
        let reason = PauseReason::InsufficientCredits;
        if !self.store.pause_campaign(campaign_id, reason, now).await? {
            return Ok(());
        }

        warn!(campaign_id, reason = reason.as_str(), "活动已自动暂停");
        report.campaigns_paused.push(campaign_id);
        metrics::record_campaign_paused(reason.as_str());

        if let Some(campaign) = self.store.get_campaign(campaign_id).await? {
            self.sender.send_campaign_paused(&campaign, reason, now).await;
        }

        Ok(())
    }
}
