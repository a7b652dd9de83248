//! 调度引擎领域模型
//!
//! 包含活动、任务、提醒、积分流水和读者信誉的实体定义

pub mod assignment;
pub mod campaign;
pub mod enums;
pub mod ledger;

pub use assignment::{Assignment, DueReminder, ReaderProfile, Reminder};
pub use campaign::Campaign;
pub use enums::{
    AssignmentStatus, BookFormat, CampaignStatus, CreditTransactionType, PauseReason,
    ReminderType,
};
pub use ledger::{CreditTransaction, NewCreditTransaction};
