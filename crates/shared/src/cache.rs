//! Redis 缓存管理模块
//!
//! 提供 Redis 连接管理和常用缓存操作封装，包括约束扁平化记录的
//! 键值读写、集合操作和发布订阅。

use crate::config::RedisConfig;
use crate::error::{FreightError, Result};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{info, instrument};

/// Redis 缓存客户端
#[derive(Clone)]
pub struct Cache {
    client: Client,
}

impl Cache {
    /// 创建 Redis 客户端
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!("Redis client created");
        Ok(Self { client })
    }

    /// 获取连接
    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(FreightError::from)
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(FreightError::from)
    }

    /// 获取值
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(v) => {
                let parsed: T = serde_json::from_str(&v).map_err(|e| {
                    FreightError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// 设置值，指定 TTL
    #[instrument(skip(self, value))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let serialized = serde_json::to_string(value)
            .map_err(|e| FreightError::Internal(format!("Cache serialization error: {}", e)))?;

        let _: () = conn.set_ex(key, serialized, ttl.as_secs()).await?;
        Ok(())
    }

    /// 设置值，不过期
    #[instrument(skip(self, value))]
    pub async fn set_persistent<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let serialized = serde_json::to_string(value)
            .map_err(|e| FreightError::Internal(format!("Cache serialization error: {}", e)))?;

        let _: () = conn.set(key, serialized).await?;
        Ok(())
    }

    /// 删除值
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    /// 按模式列出键
    #[instrument(skip(self))]
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.get_conn().await?;
        let keys: Vec<String> = conn.keys(pattern).await?;
        Ok(keys)
    }

    /// 批量删除（按模式）
    #[instrument(skip(self))]
    pub async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.get_conn().await?;
        let keys: Vec<String> = conn.keys(pattern).await?;

        if keys.is_empty() {
            return Ok(0);
        }

        let count: u64 = conn.del(keys).await?;
        Ok(count)
    }

    /// 检查键是否存在
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    /// 向集合添加成员
    #[instrument(skip(self, members))]
    pub async fn sadd(&self, key: &str, members: &[String]) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn().await?;
        let added: u64 = conn.sadd(key, members).await?;
        Ok(added)
    }

    /// 读取集合全部成员
    #[instrument(skip(self))]
    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.get_conn().await?;
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    /// 向频道发布消息
    #[instrument(skip(self, message))]
    pub async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let _: () = conn.publish(channel, message).await?;
        Ok(())
    }
}

/// 缓存键生成器
///
/// 键的形状与路由优化侧的读取端约定一致，修改前需要双方对齐。
pub struct CacheKey;

impl CacheKey {
    /// 各国最低工资记录（分/小时）
    pub fn min_wage(country: &str) -> String {
        format!("constraint:min_wage:{}", country)
    }

    /// 各区域每周工时上限
    pub fn max_hours(region: &str) -> String {
        format!("constraint:max_hours:{}", region)
    }

    /// 路线碳排放预算
    pub fn carbon_budget() -> String {
        "constraint:carbon:budget".to_string()
    }

    /// 受制裁承运商集合
    pub fn sanctioned_carriers() -> String {
        "constraint:sanctioned:carriers".to_string()
    }

    /// 自定义约束（按约束 ID 原样序列化）
    pub fn custom_constraint(constraint_id: &str) -> String {
        format!("constraint:custom:{}", constraint_id)
    }
}
