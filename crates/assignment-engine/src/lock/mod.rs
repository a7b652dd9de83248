//! 作业锁
//!
//! 多实例部署时保证同一作业同一时刻只在一个实例上执行

mod lock_manager;

pub use lock_manager::{LockGuard, LockManager};
