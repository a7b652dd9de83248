//! 活动积分管理
//!
//! 积分账户恒等式：`credits_used + credits_remaining == credits_allocated`，
//! 且 `credits_remaining >= 0`。流水金额之和等于剩余积分。

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::models::{Campaign, CreditTransaction};
use crate::repository::{PgSchedulingStore, SchedulingStore};

/// 积分服务
pub struct CreditService<S = PgSchedulingStore>
where
    S: SchedulingStore,
{
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> CreditService<S>
where
    S: SchedulingStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// 为活动充值
    ///
    /// 因积分不足而暂停的活动在充值后自动恢复，其他原因的暂停保持不变。
    #[instrument(skip(self, description))]
    pub async fn allocate_credits(
        &self,
        campaign_id: i64,
        amount: i32,
        description: Option<String>,
    ) -> Result<Campaign> {
        if amount <= 0 {
            return Err(EngineError::InvalidAmount(amount));
        }

        let was_paused = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or(EngineError::CampaignNotFound(campaign_id))?
            .is_paused_for_credits();

        let campaign = self
            .store
            .allocate_credits(campaign_id, amount, description, self.clock.now())
            .await?;

        info!(
            amount,
            credits_remaining = campaign.credits_remaining,
            resumed = was_paused && !campaign.is_paused_for_credits(),
            "活动积分已充值"
        );
        Ok(campaign)
    }

    /// 活动结束时作废剩余积分
    #[instrument(skip(self))]
    pub async fn expire_remaining_credits(&self, campaign_id: i64) -> Result<Campaign> {
        let campaign = self
            .store
            .expire_remaining_credits(campaign_id, self.clock.now())
            .await?;
        info!(credits_allocated = campaign.credits_allocated, "剩余积分已作废");
        Ok(campaign)
    }

    /// 校验活动账户与流水是否一致
    pub async fn verify_invariant(&self, campaign_id: i64) -> Result<()> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or(EngineError::CampaignNotFound(campaign_id))?;
        let ledger = self.store.list_credit_transactions(campaign_id).await?;

        check_ledger(&campaign, &ledger).inspect_err(|e| {
            error!(campaign_id, error = %e, "积分账户不一致");
        })
    }
}

/// 账户恒等式与流水合计校验
pub fn check_ledger(campaign: &Campaign, ledger: &[CreditTransaction]) -> Result<()> {
    if !campaign.credits_balanced() {
        return Err(EngineError::Internal(format!(
            "积分账户不平衡: allocated={}, used={}, remaining={}",
            campaign.credits_allocated, campaign.credits_used, campaign.credits_remaining
        )));
    }

    let total: i64 = ledger.iter().map(|t| i64::from(t.amount)).sum();
    if total != i64::from(campaign.credits_remaining) {
        return Err(EngineError::Internal(format!(
            "流水合计 {} 与剩余积分 {} 不一致",
            total, campaign.credits_remaining
        )));
    }

    if let Some(last) = ledger.iter().max_by_key(|t| t.id)
        && last.balance_after != campaign.credits_remaining
    {
        return Err(EngineError::Internal(format!(
            "最后一笔流水余额 {} 与剩余积分 {} 不一致",
            last.balance_after, campaign.credits_remaining
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{CampaignStatus, CreditTransactionType, PauseReason};
    use crate::repository::InMemorySchedulingStore;
    use chrono::{TimeZone, Utc};

    fn service() -> (Arc<InMemorySchedulingStore>, CreditService<InMemorySchedulingStore>) {
        let store = Arc::new(InMemorySchedulingStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap(),
        ));
        (store.clone(), CreditService::new(store, clock))
    }

    #[tokio::test]
    async fn test_non_positive_amount_is_rejected() {
        let (store, service) = service();
        let campaign = store.create_active_campaign(1, "书", 10, 5, Utc::now());

        for amount in [0, -3] {
            let err = service
                .allocate_credits(campaign.id, amount, None)
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidAmount(a) if a == amount));
        }
        // 账户未变
        let after = store.get_campaign(campaign.id).await.unwrap().unwrap();
        assert_eq!(after.credits_allocated, 5);
    }

    #[tokio::test]
    async fn test_allocate_unknown_campaign() {
        let (_, service) = service();
        let err = service.allocate_credits(404, 10, None).await.unwrap_err();
        assert!(matches!(err, EngineError::CampaignNotFound(404)));
    }

    #[tokio::test]
    async fn test_author_pause_survives_allocation() {
        let (store, service) = service();
        let campaign = store.create_active_campaign(1, "书", 10, 0, Utc::now());
        store
            .pause_campaign(campaign.id, PauseReason::AuthorRequest, Utc::now())
            .await
            .unwrap();

        let after = service
            .allocate_credits(campaign.id, 10, Some("补充".to_string()))
            .await
            .unwrap();

        assert_eq!(after.status, CampaignStatus::Paused);
        assert_eq!(after.pause_reason, Some(PauseReason::AuthorRequest));
        assert_eq!(after.credits_remaining, 10);
    }

    #[tokio::test]
    async fn test_expire_remaining_keeps_ledger_consistent() {
        let (store, service) = service();
        let campaign = store.create_active_campaign(1, "书", 10, 12, Utc::now());
        service.allocate_credits(campaign.id, 3, None).await.unwrap();

        let expired = service.expire_remaining_credits(campaign.id).await.unwrap();

        assert_eq!(expired.credits_remaining, 0);
        assert_eq!(expired.credits_allocated, expired.credits_used);
        service.verify_invariant(campaign.id).await.unwrap();

        let ledger = store.list_credit_transactions(campaign.id).await.unwrap();
        let last = ledger.last().unwrap();
        assert_eq!(last.transaction_type, CreditTransactionType::Expiration);
        assert_eq!(last.amount, -15);
    }

    #[test]
    fn test_check_ledger_detects_drift() {
        let now = Utc::now();
        let store = InMemorySchedulingStore::new();
        let mut campaign = store.create_active_campaign(1, "书", 10, 8, now);
        campaign.credits_remaining = 7;

        assert!(check_ledger(&campaign, &[]).is_err());

        campaign.credits_used = 1;
        // 账户平衡但没有对应流水
        assert!(check_ledger(&campaign, &[]).is_err());
    }
}
