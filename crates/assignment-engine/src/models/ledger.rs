//! 积分流水实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::CreditTransactionType;

/// 活动积分流水
///
/// 只追加、不修改。`amount` 带符号，`balance_after` 为变动后的剩余积分
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CreditTransaction {
    pub id: i64,
    pub campaign_id: i64,
    pub amount: i32,
    pub transaction_type: CreditTransactionType,
    pub balance_after: i32,
    /// 关联任务（资料发放扣除时）
    #[sqlx(default)]
    pub assignment_id: Option<i64>,
    #[sqlx(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 待写入的积分流水
#[derive(Debug, Clone)]
pub struct NewCreditTransaction {
    pub campaign_id: i64,
    pub amount: i32,
    pub transaction_type: CreditTransactionType,
    pub balance_after: i32,
    pub assignment_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewCreditTransaction {
    /// 发放资料扣除
    pub fn deduction(
        campaign_id: i64,
        assignment_id: i64,
        cost: i32,
        balance_after: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            campaign_id,
            amount: CreditTransactionType::Deduction.sign() * cost,
            transaction_type: CreditTransactionType::Deduction,
            balance_after,
            assignment_id: Some(assignment_id),
            description: Some(format!("资料发放扣除: assignment_id={}", assignment_id)),
            created_at: now,
        }
    }

    /// 充值
    pub fn allocation(
        campaign_id: i64,
        amount: i32,
        balance_after: i32,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            campaign_id,
            amount: CreditTransactionType::Allocation.sign() * amount,
            transaction_type: CreditTransactionType::Allocation,
            balance_after,
            assignment_id: None,
            description,
            created_at: now,
        }
    }

    /// 剩余积分作废
    pub fn expiration(campaign_id: i64, amount: i32, now: DateTime<Utc>) -> Self {
        Self {
            campaign_id,
            amount: CreditTransactionType::Expiration.sign() * amount,
            transaction_type: CreditTransactionType::Expiration,
            balance_after: 0,
            assignment_id: None,
            description: Some("活动结束，剩余积分作废".to_string()),
            created_at: now,
        }
    }
}
