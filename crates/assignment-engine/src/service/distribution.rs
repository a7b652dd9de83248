//! 每周分配
//!
//! 对每个进行中的活动：
//! 1. 名额 = 每周配额 + ceil(配额 × 缓冲比例)
//! 2. 按排队序号取出至多该数量的 WAITING 任务
//! 3. 前 `配额` 个为基础名额，其余标记为超额缓冲，全部改为 SCHEDULED
//! 4. 排期数低于配额的活动记为落后，仅作提示
//!
//! 各活动独立处理，单个活动失败不影响其他活动。

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info, instrument, warn};

use campaign_shared::observability::metrics;

use super::dto::{BehindSchedule, CampaignDistribution, DistributionReport, ItemFailure};
use crate::clock::{Clock, iso_week};
use crate::error::Result;
use crate::models::Campaign;
use crate::notification::NotificationSender;
use crate::repository::{PgSchedulingStore, ScheduleBatch, SchedulingStore};
use crate::settings::EngineSettings;

/// 每周分配调度器
pub struct DistributionScheduler<S = PgSchedulingStore>
where
    S: SchedulingStore,
{
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    sender: NotificationSender,
}

impl<S> DistributionScheduler<S>
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

    /// 执行一次每周分配
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<DistributionReport> {
        let now = self.clock.now();
        let week = iso_week(now);
        let today = now.date_naive();
        let mut report = DistributionReport::new(now, week, today);

        let campaigns = self.store.list_active_campaigns().await?;
        info!(campaigns = campaigns.len(), week, "开始每周分配");

        for campaign in &campaigns {
            match self.distribute_campaign(campaign, week, today, now).await {
                Ok(result) => {
                    let filled = result.scheduled();
                    if self.settings.slot_plan(campaign.reviews_per_week).is_behind(filled) {
                        warn!(
                            campaign_id = campaign.id,
                            base_slots = result.base_slots,
                            filled,
                            "活动未能填满本周配额"
                        );
                        report.behind_schedule.push(BehindSchedule {
                            campaign_id: campaign.id,
                            base_slots: result.base_slots,
                            filled,
                        });
                        self.sender
                            .send_behind_schedule(campaign.id, result.base_slots, filled, week, now)
                            .await;
                    }
                    report.campaigns.push(result);
                }
                Err(e) => {
                    error!(campaign_id = campaign.id, error = %e, "活动分配失败");
                    report.failures.push(ItemFailure::new(campaign.id, &e));
                }
            }
        }

        let (base, buffer) = report.campaigns.iter().fold((0u64, 0u64), |(b, f), c| {
            (b + c.base_scheduled as u64, f + c.buffer_scheduled as u64)
        });
        metrics::record_assignments_scheduled(base, buffer);
        metrics::record_behind_schedule(report.behind_schedule.len() as u64);

        info!(
            scheduled = report.total_scheduled(),
            behind = report.behind_schedule.len(),
            failed = report.failures.len(),
            "每周分配完成"
        );

        Ok(report)
    }

    /// 单个活动的分配，一个工作单元
    #[instrument(skip(self, campaign), fields(campaign_id = campaign.id))]
    async fn distribute_campaign(
        &self,
        campaign: &Campaign,
        week: i32,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<CampaignDistribution> {
        let plan = self.settings.slot_plan(campaign.reviews_per_week);

        let outcome = self
            .store
            .schedule_assignments(&ScheduleBatch {
                campaign_id: campaign.id,
                base_slots: plan.base,
                buffer_slots: plan.buffer,
                scheduled_week: week,
                scheduled_date: today,
                now,
            })
            .await?;

        info!(
            base = outcome.base_ids.len(),
            buffer = outcome.buffer_ids.len(),
            "活动分配完成"
        );

        Ok(CampaignDistribution {
            campaign_id: campaign.id,
            base_slots: plan.base,
            buffer_slots: plan.buffer,
            base_scheduled: outcome.base_ids.len(),
            buffer_scheduled: outcome.buffer_ids.len(),
        })
    }
}
