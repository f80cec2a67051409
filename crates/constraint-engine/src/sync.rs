//! 缓存同步 worker
//!
//! 周期性把激活约束从存储扁平化到缓存，供路由优化侧低延迟读取。
//! 每个周期按类别先清后写：同一类别内原子，跨类别不保证原子，
//! 读取端必须把缺失的键当作"约束暂不可知"，绝不能当作"通过"。
//! 某个周期失败只记录日志，下一周期会完整清空重写全部类别，
//! 局部残留状态因此可以自愈。

use crate::error::{ConstraintError, Result};
use crate::models::{ConstraintType, ConstraintVersion};
use crate::store::ConstraintStore;
use async_trait::async_trait;
use chrono::Utc;
use freight_shared::cache::{Cache, CacheKey};
use freight_shared::config::SyncConfig;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

/// 各类别的键前缀，与 `CacheKey` 的键形状保持一致
pub(crate) const NS_MIN_WAGE: &str = "constraint:min_wage:";
pub(crate) const NS_MAX_HOURS: &str = "constraint:max_hours:";
pub(crate) const NS_CARBON: &str = "constraint:carbon:";
pub(crate) const NS_SANCTIONED: &str = "constraint:sanctioned:";
pub(crate) const NS_CUSTOM: &str = "constraint:custom:";

/// 缓存写入边界
///
/// 同步 worker 只依赖这四个操作，Redis 实现之外还有内存实现
/// 供测试使用。
#[async_trait]
pub trait SyncTarget: Send + Sync {
    /// 写入单条记录
    async fn set(&self, key: &str, value: &Value) -> Result<()>;

    /// 按前缀清空一个类别
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64>;

    /// 向集合追加成员
    async fn add_to_set(&self, key: &str, members: &[String]) -> Result<()>;

    /// 发布同步完成通知
    async fn publish(&self, channel: &str, message: &str) -> Result<()>;
}

#[async_trait]
impl SyncTarget for Cache {
    async fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.set_persistent(key, value).await?;
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        let count = self.delete_pattern(&format!("{}*", prefix)).await?;
        Ok(count)
    }

    async fn add_to_set(&self, key: &str, members: &[String]) -> Result<()> {
        self.sadd(key, members).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        Cache::publish(self, channel, message).await?;
        Ok(())
    }
}

/// 一个同步周期扁平化出的全部记录
#[derive(Debug, Default)]
struct FlattenedBatch {
    /// 国家代码 -> 最低工资（分/小时）
    min_wages: Vec<(String, f64)>,
    /// 区域代码 -> 周工时上限
    max_hours: Vec<(String, f64)>,
    /// 路线碳排放预算（千克），多条并存时取最严格的一条
    carbon_budget_kg: Option<f64>,
    /// 受制裁承运商并集
    sanctioned_carriers: Vec<String>,
    /// 其余约束按 ID 原样序列化
    customs: Vec<(String, Value)>,
}

/// 把激活约束扁平化为类别记录
///
/// 工资、工时、碳排放、制裁四类按参数展开；参数不完整的约束
/// 不丢弃，降级为自定义记录整体下发。
fn flatten(versions: &[ConstraintVersion]) -> FlattenedBatch {
    let mut batch = FlattenedBatch::default();

    for version in versions {
        let document = &version.document;
        let params = &document.params;

        match document.constraint_type {
            ConstraintType::Wage => {
                let country = params.get("country").and_then(Value::as_str);
                let cents = params.get("min_wage_cents").and_then(Value::as_f64);
                if let (Some(country), Some(cents)) = (country, cents) {
                    batch.min_wages.push((country.to_string(), cents));
                    continue;
                }
            }
            ConstraintType::Hours => {
                let region = params.get("region").and_then(Value::as_str);
                let hours = params.get("max_hours").and_then(Value::as_f64);
                if let (Some(region), Some(hours)) = (region, hours) {
                    batch.max_hours.push((region.to_string(), hours));
                    continue;
                }
            }
            ConstraintType::Carbon => {
                if let Some(kg) = params.get("max_carbon_kg").and_then(Value::as_f64) {
                    batch.carbon_budget_kg = Some(match batch.carbon_budget_kg {
                        Some(existing) => existing.min(kg),
                        None => kg,
                    });
                    continue;
                }
            }
            ConstraintType::Sanction => {
                if let Some(carriers) = params.get("carriers").and_then(Value::as_array) {
                    for carrier in carriers.iter().filter_map(Value::as_str) {
                        batch
                            .sanctioned_carriers
                            .push(carrier.to_string());
                    }
                    continue;
                }
            }
            _ => {}
        }

        match serde_json::to_value(document) {
            Ok(value) => batch.customs.push((document.constraint_id.clone(), value)),
            Err(e) => warn!(
                constraint_id = %document.constraint_id,
                error = %e,
                "约束文档序列化失败，本周期跳过"
            ),
        }
    }

    batch.sanctioned_carriers.sort();
    batch.sanctioned_carriers.dedup();
    batch
}

/// 缓存同步 worker
///
/// 启动后立即执行一次同步，之后按固定间隔循环。停止信号只在
/// 循环空闲时生效，正在执行的周期不会被打断。
pub struct CacheSyncWorker {
    store: ConstraintStore,
    target: Arc<dyn SyncTarget>,
    interval: Duration,
    channel: String,
}

/// 同步任务句柄，持有后台任务与停止信号
pub struct SyncHandle {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl SyncHandle {
    /// 优雅停止：发出停止信号并等待任务退出
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "同步任务退出异常");
        }
    }
}

impl CacheSyncWorker {
    pub fn new(store: ConstraintStore, target: Arc<dyn SyncTarget>, config: &SyncConfig) -> Self {
        Self {
            store,
            target,
            interval: Duration::from_secs(config.interval_seconds),
            channel: config.channel.clone(),
        }
    }

    /// 启动后台同步循环
    pub fn start(self) -> SyncHandle {
        let (shutdown, mut rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(interval = ?self.interval, channel = %self.channel, "缓存同步 worker 已启动");

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.sync_once().await {
                            Ok(count) => info!(count, "约束缓存同步完成"),
                            Err(e) => {
                                let e = ConstraintError::SyncCycleFailed(e.to_string());
                                error!(error = %e, "同步周期失败，等待下一周期重建");
                            }
                        }
                    }
                    _ = rx.changed() => break,
                }
            }

            info!("缓存同步 worker 已停止");
        });

        SyncHandle { handle, shutdown }
    }

    /// 执行一次完整同步，返回本周期处理的激活约束数
    #[instrument(skip(self))]
    pub async fn sync_once(&self) -> Result<usize> {
        let active = self.store.list_active().await?;
        let batch = flatten(&active);

        self.target.delete_by_prefix(NS_MIN_WAGE).await?;
        for (country, cents) in &batch.min_wages {
            self.target
                .set(&CacheKey::min_wage(country), &json!(cents))
                .await?;
        }

        self.target.delete_by_prefix(NS_MAX_HOURS).await?;
        for (region, hours) in &batch.max_hours {
            self.target
                .set(&CacheKey::max_hours(region), &json!(hours))
                .await?;
        }

        self.target.delete_by_prefix(NS_CARBON).await?;
        if let Some(kg) = batch.carbon_budget_kg {
            self.target
                .set(&CacheKey::carbon_budget(), &json!(kg))
                .await?;
        }

        self.target.delete_by_prefix(NS_SANCTIONED).await?;
        if !batch.sanctioned_carriers.is_empty() {
            self.target
                .add_to_set(&CacheKey::sanctioned_carriers(), &batch.sanctioned_carriers)
                .await?;
        }

        self.target.delete_by_prefix(NS_CUSTOM).await?;
        for (id, document) in &batch.customs {
            self.target
                .set(&CacheKey::custom_constraint(id), document)
                .await?;
        }

        self.target
            .publish(&self.channel, &Utc::now().to_rfc3339())
            .await?;

        Ok(active.len())
    }
}

/// 内存同步目标
///
/// 记录全部写入和发布，`set_failing` 可以模拟缓存故障以验证
/// 同步周期的自愈行为。
#[derive(Default)]
pub struct MemorySyncTarget {
    entries: parking_lot::Mutex<std::collections::HashMap<String, Value>>,
    sets: parking_lot::Mutex<std::collections::HashMap<String, Vec<String>>>,
    published: parking_lot::Mutex<Vec<(String, String)>>,
    failing: std::sync::atomic::AtomicBool,
}

impl MemorySyncTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开或关闭写入故障注入
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ConstraintError::CacheUnavailable(
                "injected failure".to_string(),
            ));
        }
        Ok(())
    }

    pub fn entry(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    pub fn set_members(&self, key: &str) -> Vec<String> {
        self.sets.lock().get(key).cloned().unwrap_or_default()
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }

    pub fn key_count(&self) -> usize {
        self.entries.lock().len()
    }
}

#[async_trait]
impl SyncTarget for MemorySyncTarget {
    async fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.check_failing()?;
        self.entries.lock().insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        self.check_failing()?;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        let removed = (before - entries.len()) as u64;

        let mut sets = self.sets.lock();
        sets.retain(|k, _| !k.starts_with(prefix));
        Ok(removed)
    }

    async fn add_to_set(&self, key: &str, members: &[String]) -> Result<()> {
        self.check_failing()?;
        let mut sets = self.sets.lock();
        let set = sets.entry(key.to_string()).or_default();
        for member in members {
            if !set.contains(member) {
                set.push(member.clone());
            }
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        self.check_failing()?;
        self.published
            .lock()
            .push((channel.to_string(), message.to_string()));
        Ok(())
    }
}
