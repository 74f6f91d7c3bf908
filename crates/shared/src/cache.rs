//! Redis 缓存
//!
//! 值统一以 JSON 字符串存放，key 均带配置中的前缀。

use crate::config::RedisConfig;
use crate::error::{Result, SharedError};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{info, instrument};

/// Redis 缓存客户端
#[derive(Clone)]
pub struct Cache {
    client: Client,
    key_prefix: String,
}

impl Cache {
    /// 只解析地址，不建立连接
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!(key_prefix = %config.key_prefix, "Redis client created");
        Ok(Self {
            client,
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// 底层 Redis 客户端，供分布式锁复用
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// 统一 key 前缀
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(SharedError::from)
    }

    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// 读取并反序列化，key 不存在时返回 None
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.get_conn().await?;
        let raw: Option<String> = conn.get(key).await?;

        raw.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| SharedError::Internal(format!("cache decode failed for {key}: {e}")))
        })
        .transpose()
    }

    /// 写入并设置过期时间（秒级，不足 1 秒按 1 秒）
    #[instrument(skip(self, value), fields(ttl_secs = ttl.as_secs()))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| SharedError::Internal(format!("cache encode failed for {key}: {e}")))?;
        let mut conn = self.get_conn().await?;
        let _: () = conn.set_ex(key, json, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

/// 缓存键生成器
pub struct CacheKey;

impl CacheKey {
    /// 积分排行榜
    pub fn credits_ranking(prefix: &str) -> String {
        format!("{}:credits:ranking", prefix)
    }

    /// 全站最新订单滚动列表
    pub fn recent_orders(prefix: &str) -> String {
        format!("{}:order:recent", prefix)
    }

    /// 分布式锁
    pub fn lock(prefix: &str, name: &str) -> String {
        format!("{}:lock:{}", prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_generation() {
        assert_eq!(CacheKey::credits_ranking("credits"), "credits:credits:ranking");
        assert_eq!(CacheKey::recent_orders("mall"), "mall:order:recent");
        assert_eq!(CacheKey::lock("credits", "do_rebate"), "credits:lock:do_rebate");
    }
}
