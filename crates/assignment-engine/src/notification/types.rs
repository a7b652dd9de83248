//! 通知类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::models::{Assignment, Campaign, DueReminder, PauseReason};

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// 资料已发放
    MaterialsReady,
    /// 书评截止提醒
    DeadlineReminder,
    /// 活动已暂停
    CampaignPaused,
    /// 活动未能填满周配额
    BehindSchedule,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaterialsReady => "materials_ready",
            Self::DeadlineReminder => "deadline_reminder",
            Self::CampaignPaused => "campaign_paused",
            Self::BehindSchedule => "behind_schedule",
        }
    }
}

/// 通知接收方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum Recipient {
    Reader(i64),
    Author(i64),
    /// 运营管理员
    Admin,
}

impl Recipient {
    /// 外部通知系统使用的接收方标识
    pub fn address(&self) -> String {
        match self {
            Self::Reader(id) => format!("reader:{}", id),
            Self::Author(id) => format!("author:{}", id),
            Self::Admin => "admin".to_string(),
        }
    }
}

/// 通知
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: String,
    pub kind: NotificationKind,
    pub recipient: Recipient,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        recipient: Recipient,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            notification_id: Uuid::now_v7().to_string(),
            kind,
            recipient,
            payload,
            created_at: now,
        }
    }

    /// 资料已发放，通知读者
    pub fn materials_ready(assignment: &Assignment, now: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::MaterialsReady,
            Recipient::Reader(assignment.reader_id),
            json!({
                "assignmentId": assignment.id,
                "campaignId": assignment.campaign_id,
                "format": assignment.format_assigned.as_str(),
                "accessToken": assignment.access_token,
                "deadlineAt": assignment.deadline_at,
                "materialsExpiresAt": assignment.materials_expires_at,
            }),
            now,
        )
    }

    /// 截止提醒，通知读者
    pub fn deadline_reminder(reminder: &DueReminder, now: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::DeadlineReminder,
            Recipient::Reader(reminder.reader_id),
            json!({
                "reminderId": reminder.id,
                "assignmentId": reminder.assignment_id,
                "campaignId": reminder.campaign_id,
                "reminderType": reminder.reminder_type.as_str(),
                "deadlineAt": reminder.deadline_at,
            }),
            now,
        )
    }

    /// 活动暂停，通知作者
    pub fn campaign_paused(campaign: &Campaign, reason: PauseReason, now: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::CampaignPaused,
            Recipient::Author(campaign.author_id),
            json!({
                "campaignId": campaign.id,
                "bookTitle": campaign.book_title,
                "reason": reason.as_str(),
                "creditsRemaining": campaign.credits_remaining,
            }),
            now,
        )
    }

    /// 活动落后于排期，通知管理员
    pub fn behind_schedule(
        campaign_id: i64,
        base_slots: i32,
        filled: usize,
        scheduled_week: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            NotificationKind::BehindSchedule,
            Recipient::Admin,
            json!({
                "campaignId": campaign_id,
                "baseSlots": base_slots,
                "filled": filled,
                "scheduledWeek": scheduled_week,
            }),
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReminderType;

    #[test]
    fn test_recipient_address() {
        assert_eq!(Recipient::Reader(5).address(), "reader:5");
        assert_eq!(Recipient::Author(9).address(), "author:9");
        assert_eq!(Recipient::Admin.address(), "admin");
    }

    #[test]
    fn test_deadline_reminder_payload() {
        let now = Utc::now();
        let reminder = DueReminder {
            id: 3,
            assignment_id: 11,
            reminder_type: ReminderType::H60,
            scheduled_for: now,
            reader_id: 42,
            campaign_id: 7,
            deadline_at: Some(now),
        };
        let n = Notification::deadline_reminder(&reminder, now);
        assert_eq!(n.kind, NotificationKind::DeadlineReminder);
        assert_eq!(n.recipient, Recipient::Reader(42));
        assert_eq!(n.payload["reminderType"], "60H");
        assert_eq!(n.payload["assignmentId"], 11);
    }
}
