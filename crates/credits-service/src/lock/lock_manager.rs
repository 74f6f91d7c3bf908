//! 任务锁管理器
//!
//! 配置了 Redis 时只用 Redis `SET NX PX`，否则使用 `distributed_locks` 表。
//! 运行中 Redis 出错时直接返回错误，不切换到数据库，避免两个后端各发出一把锁。

use std::time::Duration;

use redis::Client as RedisClient;
use sqlx::PgPool;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use credits_shared::cache::CacheKey;
use credits_shared::config::JobsConfig;

use crate::error::{CreditsError, Result};

/// 锁配置
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// 锁自动过期时间，防止持有者崩溃后锁永不释放
    pub ttl: Duration,
    /// 获取锁的最长等待时间
    pub wait: Duration,
    /// 两次尝试之间的间隔
    pub retry_delay: Duration,
    /// Redis key 前缀
    pub key_prefix: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            wait: Duration::from_secs(5),
            retry_delay: Duration::from_millis(200),
            key_prefix: "credits".to_string(),
        }
    }
}

impl LockConfig {
    pub fn from_jobs(jobs: &JobsConfig, key_prefix: &str) -> Self {
        Self {
            ttl: jobs.lock_ttl(),
            wait: jobs.lock_wait(),
            key_prefix: key_prefix.to_string(),
            ..Default::default()
        }
    }
}

/// 分布式锁管理器
///
/// 同一个锁名在整个集群内同一时刻只会被一个持有者拿到
pub struct LockManager {
    redis_client: Option<RedisClient>,
    pool: PgPool,
    config: LockConfig,
    /// 进程实例标识，写入 owner 便于排查锁由谁持有
    instance_id: String,
}

impl LockManager {
    pub fn new(redis_client: Option<RedisClient>, pool: PgPool, config: LockConfig) -> Self {
        Self {
            redis_client,
            pool,
            config,
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// 使用配置中的 TTL 和等待时间获取锁
    pub async fn acquire(&self, name: &str) -> Result<LockGuard> {
        self.acquire_with_wait(name, self.config.ttl, self.config.wait)
            .await
    }

    /// 在等待时间内反复尝试获取锁
    ///
    /// 超过等待时间仍未获取到时返回 `LockUnavailable`
    #[instrument(skip(self), fields(instance_id = %self.instance_id))]
    pub async fn acquire_with_wait(
        &self,
        name: &str,
        ttl: Duration,
        wait: Duration,
    ) -> Result<LockGuard> {
        let deadline = Instant::now() + wait;
        let mut attempt: u32 = 0;

        loop {
            if let Some(guard) = self.try_acquire_with_ttl(name, ttl).await? {
                debug!(lock = %name, attempt, "Lock acquired");
                return Ok(guard);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(CreditsError::LockUnavailable {
                    resource: name.to_string(),
                });
            }

            attempt += 1;
            tokio::time::sleep(self.config.retry_delay.min(deadline - now)).await;
        }
    }

    /// 尝试一次，不等待
    pub async fn try_acquire(&self, name: &str) -> Result<Option<LockGuard>> {
        self.try_acquire_with_ttl(name, self.config.ttl).await
    }

    async fn try_acquire_with_ttl(&self, name: &str, ttl: Duration) -> Result<Option<LockGuard>> {
        let owner = format!("{}:{}", self.instance_id, Uuid::new_v4());

        if let Some(ref client) = self.redis_client {
            let redis_key = CacheKey::lock(&self.config.key_prefix, name);
            match try_redis_lock(client, &redis_key, &owner, ttl).await {
                Ok(true) => {
                    return Ok(Some(LockGuard {
                        name: name.to_string(),
                        owner,
                        backend: LockBackend::Redis {
                            client: client.clone(),
                            key: redis_key,
                        },
                        released: false,
                    }));
                }
                Ok(false) => return Ok(None),
                Err(e) => {
                    warn!(lock = %name, error = %e, "Redis lock failed");
                    return Err(CreditsError::Redis(e.to_string()));
                }
            }
        }

        if try_db_lock(&self.pool, name, &owner, ttl).await? {
            Ok(Some(LockGuard {
                name: name.to_string(),
                owner,
                backend: LockBackend::Database(self.pool.clone()),
                released: false,
            }))
        } else {
            Ok(None)
        }
    }
}

async fn try_redis_lock(
    client: &RedisClient,
    key: &str,
    owner: &str,
    ttl: Duration,
) -> std::result::Result<bool, redis::RedisError> {
    let mut conn = client.get_multiplexed_async_connection().await?;

    // SET 成功返回 "OK"，key 已存在时返回 nil
    let result: Option<String> = redis::cmd("SET")
        .arg(key)
        .arg(owner)
        .arg("NX")
        .arg("PX")
        .arg(ttl.as_millis() as u64)
        .query_async(&mut conn)
        .await?;

    Ok(result.is_some())
}

async fn try_db_lock(pool: &PgPool, name: &str, owner: &str, ttl: Duration) -> Result<bool> {
    let expires_at = chrono::Utc::now()
        + chrono::Duration::from_std(ttl).map_err(|e| CreditsError::Internal(e.to_string()))?;

    // 先清掉已过期的锁
    sqlx::query("DELETE FROM distributed_locks WHERE lock_key = $1 AND expires_at < NOW()")
        .bind(name)
        .execute(pool)
        .await?;

    let result = sqlx::query(
        r#"
        INSERT INTO distributed_locks (lock_key, owner_id, expires_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (lock_key) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(owner)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// 锁守卫
///
/// Drop 中无法执行异步释放，应当显式调用 `release()`；未释放的锁依赖 TTL 过期
pub struct LockGuard {
    name: String,
    owner: String,
    backend: LockBackend,
    released: bool,
}

enum LockBackend {
    Redis { client: RedisClient, key: String },
    Database(PgPool),
}

/// 只删除自己持有的锁
const RELEASE_SCRIPT: &str = r#"
    if redis.call("get", KEYS[1]) == ARGV[1] then
        return redis.call("del", KEYS[1])
    else
        return 0
    end
"#;

impl LockGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[instrument(skip(self), fields(lock = %self.name))]
    pub async fn release(mut self) -> Result<()> {
        self.released = true;

        let removed = match &self.backend {
            LockBackend::Redis { client, key } => {
                let mut conn = client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| CreditsError::Redis(e.to_string()))?;
                let deleted: i32 = redis::Script::new(RELEASE_SCRIPT)
                    .key(key)
                    .arg(&self.owner)
                    .invoke_async(&mut conn)
                    .await
                    .map_err(|e| CreditsError::Redis(e.to_string()))?;
                deleted > 0
            }
            LockBackend::Database(pool) => {
                sqlx::query("DELETE FROM distributed_locks WHERE lock_key = $1 AND owner_id = $2")
                    .bind(&self.name)
                    .bind(&self.owner)
                    .execute(pool)
                    .await?
                    .rows_affected()
                    > 0
            }
        };

        if removed {
            debug!("Lock released");
        } else {
            // 锁已过期，可能已被其他实例拿走
            warn!(owner = %self.owner, "Lock expired before release");
        }

        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                lock = %self.name,
                owner = %self.owner,
                "LockGuard dropped without explicit release - lock will expire via TTL"
            );
        }
    }
}
