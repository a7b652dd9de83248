//! 分布式锁管理器
//!
//! Redis 优先，Redis 不可用时降级到 PostgreSQL 的 distributed_locks 表。
//! 作业锁只做一次尝试：拿不到说明另一实例正在执行，本次直接跳过。

use std::time::Duration;

use redis::Client as RedisClient;
use sqlx::PgPool;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// 释放锁的 Lua 脚本：只有 owner 匹配时才删除
const RELEASE_SCRIPT: &str = r#"
    if redis.call("get", KEYS[1]) == ARGV[1] then
        return redis.call("del", KEYS[1])
    else
        return 0
    end
"#;

/// 分布式锁管理器
pub struct LockManager {
    redis_client: Option<RedisClient>,
    pool: PgPool,
    default_ttl: Duration,
    /// 实例唯一标识，用于区分不同实例持有的锁
    instance_id: String,
}

impl LockManager {
    pub fn new(redis_client: Option<RedisClient>, pool: PgPool, default_ttl: Duration) -> Self {
        Self {
            redis_client,
            pool,
            default_ttl,
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// 尝试获取锁，不重试
    ///
    /// 锁被占用时返回 None
    #[instrument(skip(self), fields(instance_id = %self.instance_id))]
    pub async fn try_acquire(&self, key: &str, ttl: Option<Duration>) -> Result<Option<LockGuard>> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        // owner 格式: instance_id:uuid
        let owner = format!("{}:{}", self.instance_id, Uuid::new_v4());

        if let Some(ref client) = self.redis_client {
            match self.try_redis_lock(client, key, &owner, ttl).await {
                Ok(true) => {
                    debug!(key = %key, owner = %owner, "Redis lock acquired");
                    return Ok(Some(LockGuard::new_redis(
                        key.to_string(),
                        owner,
                        client.clone(),
                    )));
                }
                Ok(false) => return Ok(None),
                Err(e) => {
                    warn!(key = %key, error = %e, "Redis lock failed, falling back to database");
                }
            }
        }

        self.try_db_lock(key, owner, ttl).await
    }

    /// SET NX PX
    async fn try_redis_lock(
        &self,
        client: &RedisClient,
        key: &str,
        owner: &str,
        ttl: Duration,
    ) -> std::result::Result<bool, redis::RedisError> {
        let lock_key = format!("lock:{}", key);
        let mut conn = client.get_multiplexed_async_connection().await?;

        let result: Option<String> = redis::cmd("SET")
            .arg(&lock_key)
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    /// INSERT ON CONFLICT DO NOTHING，先清理过期锁
    async fn try_db_lock(&self, key: &str, owner: String, ttl: Duration) -> Result<Option<LockGuard>> {
        let expires_at = chrono::Utc::now()
            + chrono::Duration::from_std(ttl).map_err(|e| EngineError::Internal(e.to_string()))?;

        let deleted =
            sqlx::query(r#"DELETE FROM distributed_locks WHERE lock_key = $1 AND expires_at < NOW()"#)
                .bind(key)
                .execute(&self.pool)
                .await?;
        if deleted.rows_affected() > 0 {
            debug!(key = %key, "Cleaned up expired database lock");
        }

        let result = sqlx::query(
            r#"
            INSERT INTO distributed_locks (lock_key, owner_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (lock_key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(owner.as_str())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!(key = %key, owner = %owner, "Database lock acquired");
            Ok(Some(LockGuard::new_db(
                key.to_string(),
                owner,
                self.pool.clone(),
            )))
        } else {
            Ok(None)
        }
    }
}

/// 锁守卫
///
/// Drop 无法执行异步操作，应显式调用 `release()`；未释放的锁依赖 TTL 过期。
pub struct LockGuard {
    key: String,
    owner: String,
    backend: LockBackend,
    released: bool,
}

enum LockBackend {
    Redis(RedisClient),
    Database(PgPool),
}

impl LockGuard {
    fn new_redis(key: String, owner: String, client: RedisClient) -> Self {
        Self {
            key,
            owner,
            backend: LockBackend::Redis(client),
            released: false,
        }
    }

    fn new_db(key: String, owner: String, pool: PgPool) -> Self {
        Self {
            key,
            owner,
            backend: LockBackend::Database(pool),
            released: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// 显式释放锁
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        let removed = match &self.backend {
            LockBackend::Redis(client) => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let result: i32 = redis::Script::new(RELEASE_SCRIPT)
                    .key(format!("lock:{}", self.key))
                    .arg(&self.owner)
                    .invoke_async(&mut conn)
                    .await?;
                result > 0
            }
            LockBackend::Database(pool) => {
                sqlx::query(
                    r#"DELETE FROM distributed_locks WHERE lock_key = $1 AND owner_id = $2"#,
                )
                .bind(&self.key)
                .bind(&self.owner)
                .execute(pool)
                .await?
                .rows_affected()
                    > 0
            }
        };

        if removed {
            debug!(key = %self.key, "Lock released");
        } else {
            // 锁已过期或被其他实例持有
            warn!(
                key = %self.key,
                owner = %self.owner,
                "Lock was already released or owned by another client"
            );
        }

        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                lock_key = %self.key,
                owner = %self.owner,
                "LockGuard dropped without explicit release - lock will expire via TTL"
            );
        }
    }
}
