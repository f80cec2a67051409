//! 内存存储后端
//!
//! 无外部依赖的 `DocumentStore` 实现，主要用于单元测试和本地开发。
//! 与 Postgres 后端遵守同一套追加约定：同键重复追加返回版本冲突。

use super::DocumentStore;
use crate::error::{ConstraintError, Result};
use crate::models::ConstraintVersion;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// 内存文档存储
///
/// 每条约束持有一个按版本号升序排列的记录向量。
#[derive(Default)]
pub struct MemoryDocumentStore {
    records: RwLock<HashMap<String, Vec<ConstraintVersion>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn append(&self, record: ConstraintVersion) -> Result<()> {
        let mut records = self.records.write();
        let versions = records.entry(record.constraint_id.clone()).or_default();

        if versions.iter().any(|v| v.version == record.version) {
            return Err(ConstraintError::VersionConflict {
                constraint_id: record.constraint_id,
                version: record.version,
            });
        }

        versions.push(record);
        versions.sort_by_key(|v| v.version);
        Ok(())
    }

    async fn current(&self, constraint_id: &str) -> Result<Option<ConstraintVersion>> {
        let records = self.records.read();
        Ok(records
            .get(constraint_id)
            .and_then(|versions| versions.last().cloned()))
    }

    async fn as_of(
        &self,
        constraint_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<ConstraintVersion>> {
        let records = self.records.read();
        Ok(records.get(constraint_id).and_then(|versions| {
            versions
                .iter()
                .rev()
                .find(|v| v.recorded_at <= at)
                .cloned()
        }))
    }

    async fn list_active(&self) -> Result<Vec<ConstraintVersion>> {
        let now = Utc::now();
        let records = self.records.read();
        let mut active: Vec<ConstraintVersion> = records
            .values()
            .filter_map(|versions| versions.last())
            .filter(|v| v.document.active && v.document.is_effective_at(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| a.constraint_id.cmp(&b.constraint_id));
        Ok(active)
    }
}
