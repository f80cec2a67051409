//! 约束热快照
//!
//! 从缓存一次性加载扁平化约束记录，供延迟敏感的评估路径使用，
//! 避免每次评估都往返存储。快照是某个同步代次的只读切面；
//! 键缺失表示该约束暂不可知，读取端不得据此判定通过。

use crate::error::Result;
use crate::models::Constraint;
use crate::sync::{NS_CUSTOM, NS_MAX_HOURS, NS_MIN_WAGE};
use freight_shared::cache::{Cache, CacheKey};
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument, warn};

/// 扁平化约束的内存快照
#[derive(Debug, Clone, Default)]
pub struct ConstraintSnapshot {
    /// 国家代码 -> 最低工资（分/小时）
    pub min_wages: HashMap<String, f64>,
    /// 区域代码 -> 周工时上限
    pub max_hours: HashMap<String, f64>,
    /// 路线碳排放预算（千克）
    pub carbon_budget_kg: Option<f64>,
    /// 受制裁承运商集合
    pub sanctioned_carriers: HashSet<String>,
    /// 自定义约束文档
    pub customs: Vec<Constraint>,
}

impl ConstraintSnapshot {
    /// 从缓存加载完整快照
    ///
    /// 反序列化失败的单条记录记日志后跳过，不让一条坏记录
    /// 拖垮整个快照。
    #[instrument(skip(cache))]
    pub async fn load(cache: &Cache) -> Result<Self> {
        let mut snapshot = Self::default();

        for key in cache.keys(&format!("{}*", NS_MIN_WAGE)).await? {
            if let Some(country) = key.strip_prefix(NS_MIN_WAGE) {
                match cache.get::<f64>(&key).await {
                    Ok(Some(cents)) => {
                        snapshot.min_wages.insert(country.to_string(), cents);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(key = %key, error = %e, "工资记录读取失败，跳过"),
                }
            }
        }

        for key in cache.keys(&format!("{}*", NS_MAX_HOURS)).await? {
            if let Some(region) = key.strip_prefix(NS_MAX_HOURS) {
                match cache.get::<f64>(&key).await {
                    Ok(Some(hours)) => {
                        snapshot.max_hours.insert(region.to_string(), hours);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(key = %key, error = %e, "工时记录读取失败，跳过"),
                }
            }
        }

        snapshot.carbon_budget_kg = cache.get::<f64>(&CacheKey::carbon_budget()).await?;

        snapshot.sanctioned_carriers = cache
            .smembers(&CacheKey::sanctioned_carriers())
            .await?
            .into_iter()
            .collect();

        for key in cache.keys(&format!("{}*", NS_CUSTOM)).await? {
            match cache.get::<Constraint>(&key).await {
                Ok(Some(document)) => snapshot.customs.push(document),
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "自定义约束反序列化失败，跳过"),
            }
        }

        info!(
            min_wages = snapshot.min_wages.len(),
            max_hours = snapshot.max_hours.len(),
            sanctioned = snapshot.sanctioned_carriers.len(),
            customs = snapshot.customs.len(),
            "约束快照已加载"
        );
        Ok(snapshot)
    }

    /// 目的国最低工资（分/小时），无记录返回 None
    pub fn min_wage_for(&self, country: &str) -> Option<f64> {
        self.min_wages.get(country).copied()
    }

    /// 区域周工时上限，无记录返回 None
    pub fn hours_cap_for(&self, region: &str) -> Option<f64> {
        self.max_hours.get(region).copied()
    }

    /// 承运商是否在制裁名单中
    pub fn is_sanctioned(&self, carrier_code: &str) -> bool {
        self.sanctioned_carriers.contains(carrier_code)
    }

    /// 快照是否不含任何约束记录
    pub fn is_empty(&self) -> bool {
        self.min_wages.is_empty()
            && self.max_hours.is_empty()
            && self.carbon_budget_kg.is_none()
            && self.sanctioned_carriers.is_empty()
            && self.customs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let snapshot = ConstraintSnapshot::default();
        assert!(snapshot.is_empty());
        assert!(snapshot.min_wage_for("DE").is_none());
        assert!(!snapshot.is_sanctioned("BADCO"));
    }

    #[test]
    fn test_accessors() {
        let mut snapshot = ConstraintSnapshot::default();
        snapshot.min_wages.insert("DE".to_string(), 1260.0);
        snapshot.max_hours.insert("EU".to_string(), 48.0);
        snapshot.sanctioned_carriers.insert("BADCO".to_string());
        snapshot.carbon_budget_kg = Some(5000.0);

        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.min_wage_for("DE"), Some(1260.0));
        assert_eq!(snapshot.min_wage_for("FR"), None);
        assert_eq!(snapshot.hours_cap_for("EU"), Some(48.0));
        assert!(snapshot.is_sanctioned("BADCO"));
        assert!(!snapshot.is_sanctioned("GOODCO"));
    }
}
