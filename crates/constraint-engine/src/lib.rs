//! 货运合规约束引擎
//!
//! 面向多式联运平台的约束管理与路线评估：表达式树建模合规规则，
//! 双时态追加式存储保留完整变更历史，后台 worker 把激活约束
//! 扁平化同步到缓存供路由优化侧低延迟读取。

pub mod compiler;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod models;
pub mod operators;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod template;

pub use compiler::{CompiledConstraint, ConstraintCompiler};
pub use engine::ConstraintEngine;
pub use error::{ConstraintError, Result};
pub use evaluator::{EvaluationContext, ExpressionEvaluator};
pub use expr::{Expr, FieldRef};
pub use models::{
    Constraint, ConstraintDefinition, ConstraintPatch, ConstraintResult, ConstraintScope,
    ConstraintType, ConstraintVersion, EvaluationReport, Route, RouteSegment, Shipment,
};
pub use operators::{AggregateScope, CompareOp};
pub use service::{ConstraintService, Freshness};
pub use snapshot::ConstraintSnapshot;
pub use store::{ConstraintStore, DocumentStore, MemoryDocumentStore, PgDocumentStore};
pub use sync::{CacheSyncWorker, MemorySyncTarget, SyncHandle, SyncTarget};
pub use template::{RuleTemplate, TemplateCompiler, TemplateLibrary, TemplateMatcher};
