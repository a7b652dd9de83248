//! PostgreSQL 连接池
//!
//! 引擎的三个作业与管理入口共用一个连接池。连接建立后立即做一次连通性校验，
//! 启动阶段就暴露数据库不可用的问题，而不是拖到第一次作业执行。
//!
//! 迁移目录属于引擎 crate，由其通过 `sqlx::migrate!` 嵌入后交给
//! [`Database::run_migrations`] 执行。

use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

use crate::config::DatabaseConfig;
use crate::error::Result;

/// 连接池快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

/// 数据库连接池包装
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 创建连接池并校验连通性
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        let db = Self { pool };
        db.health_check().await?;

        let stats = db.stats();
        info!(size = stats.size, idle = stats.idle, "数据库连接池已就绪");
        Ok(db)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 连通性检查
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// 执行嵌入的迁移，已执行过的版本会被跳过
    #[instrument(skip_all)]
    pub async fn run_migrations(&self, migrator: &Migrator) -> Result<()> {
        let latest = migrator.iter().map(|m| m.version).max();
        migrator.run(&self.pool).await?;
        info!(migrations = migrator.iter().count(), latest = ?latest, "数据库迁移完成");
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }

    /// 关闭连接池，等待进行中的工作单元归还连接
    pub async fn close(&self) {
        self.pool.close().await;
        info!("数据库连接池已关闭");
    }
}
