//! 存储层
//!
//! - 各实体仓储负责 SQL 细节，写操作以 `*_in_tx` 形式接受调用方的事务连接
//! - `SchedulingStore` 把分配、发放、过期等每个原子操作组表达为一个工作单元
//! - `PgSchedulingStore` 用数据库事务实现，`InMemorySchedulingStore` 用单把互斥锁实现

mod assignment_repo;
mod campaign_repo;
pub mod commands;
mod credit_ledger_repo;
mod memory;
mod pg_store;
mod reader_repo;
mod reminder_repo;
mod traits;

pub use assignment_repo::AssignmentRepository;
pub use campaign_repo::CampaignRepository;
pub use commands::*;
pub use credit_ledger_repo::CreditLedgerRepository;
pub use memory::InMemorySchedulingStore;
pub use pg_store::PgSchedulingStore;
pub use reader_repo::ReaderProfileRepository;
pub use reminder_repo::ReminderRepository;
pub use traits::*;
