//! 约束服务门面
//!
//! 面向外层接入的统一入口：约束的增删改查走存储适配器，路线评估
//! 可以选择数据新鲜度（直读存储或走缓存快照）。服务维护一份
//! 已编译约束索引，暴露每条约束引用的字段集合。

use crate::compiler::{CompiledConstraint, ConstraintCompiler};
use crate::engine::ConstraintEngine;
use crate::error::{ConstraintError, Result};
use crate::models::{
    Constraint, ConstraintDefinition, ConstraintPatch, ConstraintVersion, EvaluationReport, Route,
    Shipment,
};
use crate::models::ConstraintScope;
use crate::snapshot::ConstraintSnapshot;
use crate::store::ConstraintStore;
use crate::template::{TemplateCompiler, TemplateLibrary};
use dashmap::DashMap;
use freight_shared::cache::Cache;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, instrument, warn};

/// 评估数据新鲜度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// 直读存储，强一致但有存储往返开销
    Store,
    /// 走缓存快照，低延迟但落后至多一个同步周期
    Cache,
}

/// 约束服务
#[derive(Clone)]
pub struct ConstraintService {
    store: ConstraintStore,
    cache: Option<Cache>,
    compiled: std::sync::Arc<DashMap<String, CompiledConstraint>>,
}

impl ConstraintService {
    pub fn new(store: ConstraintStore, cache: Option<Cache>) -> Self {
        Self {
            store,
            cache,
            compiled: std::sync::Arc::new(DashMap::new()),
        }
    }

    /// 预热已编译索引：编译全部激活约束
    ///
    /// 编译失败的约束记日志后跳过，评估路径会对其降级处理。
    #[instrument(skip(self))]
    pub async fn warm_index(&self) -> Result<usize> {
        let active = self.store.list_active().await?;
        self.compiled.clear();

        for version in &active {
            self.index_document(&version.document);
        }

        info!(count = self.compiled.len(), "已编译索引预热完成");
        Ok(self.compiled.len())
    }

    fn index_document(&self, document: &Constraint) {
        match ConstraintCompiler::compile(document.clone()) {
            Ok(compiled) => {
                self.compiled
                    .insert(document.constraint_id.clone(), compiled);
            }
            Err(e) => warn!(
                constraint_id = %document.constraint_id,
                error = %e,
                "约束编译失败，不进入索引"
            ),
        }
    }

    /// 列出当前激活的约束
    pub async fn list_constraints(&self) -> Result<Vec<ConstraintVersion>> {
        self.store.list_active().await
    }

    /// 创建约束
    pub async fn create_constraint(
        &self,
        definition: ConstraintDefinition,
    ) -> Result<ConstraintVersion> {
        let created = self.store.create(definition).await?;
        self.index_document(&created.document);
        Ok(created)
    }

    /// 从内置模板创建约束
    ///
    /// 模板提供表达式骨架、类别和软硬属性；参数同时进入表达式
    /// 和约束的 params，缓存同步侧按 params 做类别扁平化。
    pub async fn create_from_template(
        &self,
        code: &str,
        params: HashMap<String, Value>,
    ) -> Result<ConstraintVersion> {
        let library = TemplateLibrary::builtin();
        let template = library
            .get(code)
            .ok_or_else(|| ConstraintError::TemplateNotFound {
                code: code.to_string(),
            })?;
        let expression = TemplateCompiler::new().compile(template, &params)?;

        self.create_constraint(ConstraintDefinition {
            constraint_id: None,
            name: template.name.clone(),
            description: template.description.clone().unwrap_or_default(),
            constraint_type: template.constraint_type,
            is_hard: template.is_hard,
            priority: 0,
            scope: ConstraintScope::Global,
            params,
            expression,
            effective_from: None,
            effective_until: None,
        })
        .await
    }

    /// 读取约束当前版本
    pub async fn get_constraint(&self, constraint_id: &str) -> Result<ConstraintVersion> {
        self.store.get(constraint_id).await
    }

    /// 更新约束（追加新版本）
    pub async fn update_constraint(
        &self,
        constraint_id: &str,
        patch: ConstraintPatch,
    ) -> Result<ConstraintVersion> {
        let updated = self.store.update(constraint_id, patch).await?;
        if updated.document.active {
            self.index_document(&updated.document);
        } else {
            self.compiled.remove(constraint_id);
        }
        Ok(updated)
    }

    /// 软删除约束
    pub async fn deactivate_constraint(&self, constraint_id: &str) -> Result<ConstraintVersion> {
        let deactivated = self.store.deactivate(constraint_id).await?;
        self.compiled.remove(constraint_id);
        Ok(deactivated)
    }

    /// 约束表达式引用的字段集合（索引未命中返回 None）
    pub fn required_fields(&self, constraint_id: &str) -> Option<BTreeSet<String>> {
        self.compiled
            .get(constraint_id)
            .map(|entry| entry.required_fields.clone())
    }

    /// 评估一条候选路线
    ///
    /// `Freshness::Store` 直接读取激活约束全集；`Freshness::Cache`
    /// 加载扁平化快照。约束集合读不出来时整个调用以类型化错误
    /// 失败，绝不返回一份空的成功报告。
    #[instrument(skip(self, route, shipment), fields(route_id = %route.route_id))]
    pub async fn evaluate_route(
        &self,
        route: &Route,
        shipment: Option<&Shipment>,
        freshness: Freshness,
    ) -> Result<EvaluationReport> {
        match freshness {
            Freshness::Store => {
                let active = self.store.list_active().await?;
                let documents: Vec<Constraint> =
                    active.into_iter().map(|v| v.document).collect();
                Ok(ConstraintEngine::evaluate(&documents, route, shipment))
            }
            Freshness::Cache => {
                let cache = self.cache.as_ref().ok_or_else(|| {
                    ConstraintError::CacheUnavailable("服务未配置缓存".to_string())
                })?;
                let snapshot = ConstraintSnapshot::load(cache).await?;
                Ok(ConstraintEngine::evaluate_snapshot(&snapshot, route, shipment))
            }
        }
    }
}
