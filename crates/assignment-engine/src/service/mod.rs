//! 业务服务层
//!
//! 三个定时作业（每周分配、每日发放、每小时截止检查）以及
//! 积分与申请两类命令式操作

pub mod application;
pub mod credit;
pub mod deadline;
pub mod distribution;
pub mod dto;
pub mod release;

pub use application::ApplicationService;
pub use credit::{CreditService, check_ledger};
pub use deadline::DeadlineMonitor;
pub use distribution::DistributionScheduler;
pub use dto::*;
pub use release::MaterialReleaseRunner;
