//! 任务调度引擎
//!
//! 启动三个定时作业的 Worker，并提供管理入口用于手动触发。

use std::sync::Arc;
use std::time::Duration;

use assignment_engine::{
    Clock, CreditService, CronWorker, DeadlineMonitor, DistributionScheduler, EngineSettings,
    JobKind, JobRunner, LockManager, MaterialReleaseRunner, NotificationSender, PgOutboxNotifier,
    PgSchedulingStore, SystemClock,
    admin::{self, AdminState},
};
use campaign_shared::{config::AppConfig, database::Database, observability};
use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "assignment-engine";

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_default();

    let obs_config = config
        .observability
        .clone()
        .with_service_name(SERVICE_NAME);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    let db = Database::connect(&config.database).await?;

    if config.scheduler.run_migrations {
        db.run_migrations(&MIGRATOR).await?;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let settings = EngineSettings::from_scheduler_config(&config.scheduler);
    let store = Arc::new(PgSchedulingStore::new(db.pool().clone()));
    let sender = NotificationSender::new(Arc::new(PgOutboxNotifier::new(db.pool().clone())));

    let mut runner = JobRunner::new(
        DistributionScheduler::new(store.clone(), clock.clone(), settings.clone(), sender.clone()),
        MaterialReleaseRunner::new(store.clone(), clock.clone(), settings.clone(), sender.clone()),
        DeadlineMonitor::new(store.clone(), clock.clone(), settings, sender),
        clock.clone(),
    );

    // 多实例部署时启用跨实例作业锁
    if config.scheduler.distributed_lock {
        let redis_client = if config.redis.enabled {
            match redis::Client::open(config.redis.url.as_str()) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!(error = %e, "Redis 客户端创建失败，作业锁降级到数据库");
                    None
                }
            }
        } else {
            None
        };
        let ttl = Duration::from_secs(config.scheduler.job_lock_ttl_seconds);
        let lock_manager = Arc::new(LockManager::new(redis_client, db.pool().clone(), ttl));
        info!(instance_id = lock_manager.instance_id(), "跨实例作业锁已启用");
        runner = runner.with_lock_manager(lock_manager, ttl);
    }

    let runner = Arc::new(runner);

    if config.scheduler.enabled {
        for kind in JobKind::ALL {
            let worker = CronWorker::new(
                kind,
                kind.cron_expression(&config.scheduler),
                runner.clone(),
                clock.clone(),
            )?;
            tokio::spawn(async move {
                worker.run().await;
            });
        }
    } else {
        warn!("定时触发已关闭，作业只能通过管理入口手动触发");
    }

    let app = admin::router(AdminState {
        runner,
        credits: Arc::new(CreditService::new(store, clock)),
    });

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
