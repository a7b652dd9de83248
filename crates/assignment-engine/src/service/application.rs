//! 读者申请入队
//!
//! 申请成功后任务进入 WAITING，等待每周分配。同一读者在同一活动中
//! 只能持有一个未结束的任务。

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::models::{Assignment, BookFormat, CampaignStatus};
use crate::repository::{EnqueueReader, PgSchedulingStore, SchedulingStore};

/// 读者申请服务
pub struct ApplicationService<S = PgSchedulingStore>
where
    S: SchedulingStore,
{
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> ApplicationService<S>
where
    S: SchedulingStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// 读者申请加入活动排队
    #[instrument(skip(self))]
    pub async fn enqueue_reader(
        &self,
        campaign_id: i64,
        reader_id: i64,
        format: BookFormat,
    ) -> Result<Assignment> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or(EngineError::CampaignNotFound(campaign_id))?;

        if campaign.status == CampaignStatus::Completed {
            warn!(campaign_id, "活动已完成，拒绝申请");
            return Err(EngineError::Validation(format!(
                "活动已完成，不再接受申请: campaign_id={}",
                campaign_id
            )));
        }

        let assignment = self
            .store
            .enqueue_reader(&EnqueueReader {
                campaign_id,
                reader_id,
                format,
                now: self.clock.now(),
            })
            .await?;

        info!(
            assignment_id = assignment.id,
            queue_position = assignment.queue_position,
            "读者已加入排队"
        );
        Ok(assignment)
    }
}
