//! 约束存储层
//!
//! 双时态追加式版本日志：每条约束的每次变更都以 `(constraint_id,
//! version)` 为键追加一条不可变记录，历史版本永不改写。
//! `DocumentStore` 是后端边界，`ConstraintStore` 在任意后端之上
//! 实现版本编排逻辑。

pub mod memory;
pub mod postgres;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

use crate::compiler::ConstraintCompiler;
use crate::error::{ConstraintError, Result};
use crate::models::{Constraint, ConstraintDefinition, ConstraintPatch, ConstraintVersion};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// 存储后端边界
///
/// 任何双时态文档存储只需要这四个操作。并发追加撞键时后端必须
/// 返回版本冲突而不是覆盖，乐观并发由调用方重读重试。
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 追加一条版本记录，键冲突返回 `VersionConflict`
    async fn append(&self, record: ConstraintVersion) -> Result<()>;

    /// 读取约束的当前（最高版本）记录
    async fn current(&self, constraint_id: &str) -> Result<Option<ConstraintVersion>>;

    /// 按事务时间回溯：返回给定时刻已落库的最高版本
    async fn as_of(
        &self,
        constraint_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<ConstraintVersion>>;

    /// 列出当前处于激活状态且业务有效期覆盖当下的约束
    async fn list_active(&self) -> Result<Vec<ConstraintVersion>>;
}

/// 约束存储适配器
///
/// 在后端之上提供创建、读取、更新（追加新版本）、软删除的编排。
#[derive(Clone)]
pub struct ConstraintStore {
    backend: Arc<dyn DocumentStore>,
}

impl ConstraintStore {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self { backend }
    }

    /// 创建约束：校验定义，必要时分配 UUID，落第 1 版
    #[instrument(skip(self, definition), fields(name = %definition.name))]
    pub async fn create(&self, definition: ConstraintDefinition) -> Result<ConstraintVersion> {
        ConstraintCompiler::validate_definition(&definition)?;

        let constraint_id = definition
            .constraint_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let document = Constraint {
            constraint_id: constraint_id.clone(),
            name: definition.name,
            description: definition.description,
            constraint_type: definition.constraint_type,
            is_hard: definition.is_hard,
            priority: definition.priority,
            scope: definition.scope,
            params: definition.params,
            expression: definition.expression,
            effective_from: definition.effective_from,
            effective_until: definition.effective_until,
            active: true,
        };

        let record = ConstraintVersion {
            constraint_id: constraint_id.clone(),
            version: 1,
            recorded_at: Utc::now(),
            document,
        };

        self.backend.append(record.clone()).await?;
        info!(constraint_id = %constraint_id, "约束已创建");
        Ok(record)
    }

    /// 读取当前版本
    pub async fn get(&self, constraint_id: &str) -> Result<ConstraintVersion> {
        self.backend
            .current(constraint_id)
            .await?
            .ok_or_else(|| ConstraintError::NotFound {
                constraint_id: constraint_id.to_string(),
            })
    }

    /// 按事务时间回溯读取
    pub async fn get_as_of(
        &self,
        constraint_id: &str,
        at: DateTime<Utc>,
    ) -> Result<ConstraintVersion> {
        self.backend
            .as_of(constraint_id, at)
            .await?
            .ok_or_else(|| ConstraintError::NotFound {
                constraint_id: constraint_id.to_string(),
            })
    }

    /// 列出当前激活的约束
    pub async fn list_active(&self) -> Result<Vec<ConstraintVersion>> {
        self.backend.list_active().await
    }

    /// 更新约束：读当前版本、合并补丁、以 n+1 版追加
    ///
    /// 并发更新在 `(constraint_id, version)` 键上竞争，落败方收到
    /// `VersionConflict`，需要重读当前版本后重试。
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        constraint_id: &str,
        patch: ConstraintPatch,
    ) -> Result<ConstraintVersion> {
        let current = self.get(constraint_id).await?;
        let next_document = current.document.merged_with(patch);
        ConstraintCompiler::validate_expr(&next_document.expression)?;

        let record = ConstraintVersion {
            constraint_id: constraint_id.to_string(),
            version: current.version + 1,
            recorded_at: Utc::now(),
            document: next_document,
        };

        self.backend.append(record.clone()).await?;
        info!(constraint_id, version = record.version, "约束已更新");
        Ok(record)
    }

    /// 软删除：以新版本记录 active=false，历史完整保留，可逆
    pub async fn deactivate(&self, constraint_id: &str) -> Result<ConstraintVersion> {
        self.update(
            constraint_id,
            ConstraintPatch {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expr, FieldRef};
    use crate::models::{ConstraintScope, ConstraintType};
    use crate::operators::CompareOp;
    use std::collections::HashMap;

    fn definition(name: &str) -> ConstraintDefinition {
        ConstraintDefinition {
            constraint_id: None,
            name: name.to_string(),
            description: String::new(),
            constraint_type: ConstraintType::Cost,
            is_hard: false,
            priority: 0,
            scope: ConstraintScope::Global,
            params: HashMap::new(),
            expression: Expr::compare(
                FieldRef::Route("total_cost_usd".to_string()),
                CompareOp::Lte,
                5000,
            ),
            effective_from: None,
            effective_until: None,
        }
    }

    fn store() -> ConstraintStore {
        ConstraintStore::new(Arc::new(MemoryDocumentStore::new()))
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_version_one() {
        let store = store();
        let created = store.create(definition("cost cap")).await.unwrap();

        assert_eq!(created.version, 1);
        assert!(!created.constraint_id.is_empty());
        assert!(created.document.active);
    }

    #[tokio::test]
    async fn test_update_appends_new_version() {
        let store = store();
        let created = store.create(definition("cost cap")).await.unwrap();

        let updated = store
            .update(
                &created.constraint_id,
                ConstraintPatch {
                    priority: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.version, 2);
        assert_eq!(updated.document.priority, 5);

        // 旧版本未被改写
        let v1 = store
            .get_as_of(&created.constraint_id, created.recorded_at)
            .await
            .unwrap();
        assert_eq!(v1.version, 1);
        assert_eq!(v1.document.priority, 0);
    }

    #[tokio::test]
    async fn test_deactivate_then_reactivate_preserves_history() {
        let store = store();
        let created = store.create(definition("cost cap")).await.unwrap();
        let id = created.constraint_id.clone();

        let v2 = store.deactivate(&id).await.unwrap();
        assert!(!v2.document.active);
        assert!(store.list_active().await.unwrap().is_empty());

        let v3 = store
            .update(
                &id,
                ConstraintPatch {
                    active: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(v3.document.active);
        assert_eq!(v3.version, 3);

        // 全部三个版本都可回溯
        assert_eq!(store.get_as_of(&id, created.recorded_at).await.unwrap().version, 1);
        assert_eq!(store.get_as_of(&id, v2.recorded_at).await.unwrap().version, 2);
        assert_eq!(store.get(&id).await.unwrap().version, 3);
    }

    #[tokio::test]
    async fn test_get_missing_returns_not_found() {
        let store = store();
        let err = store.get("no-such-id").await.unwrap_err();
        assert!(matches!(err, ConstraintError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_definition() {
        let store = store();
        let mut def = definition("");
        def.name = String::new();
        let err = store.create(def).await.unwrap_err();
        assert!(matches!(err, ConstraintError::ValidationFailed(_)));
    }
}
