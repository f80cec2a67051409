//! 约束引擎错误类型

use freight_shared::error::FreightError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConstraintError {
    #[error("约束定义校验失败: {0}")]
    ValidationFailed(String),

    #[error("约束未找到: {constraint_id}")]
    NotFound { constraint_id: String },

    #[error("版本冲突: {constraint_id} version={version}，请重读后重试")]
    VersionConflict {
        constraint_id: String,
        version: i32,
    },

    #[error("存储不可用: {0}")]
    StoreUnavailable(String),

    #[error("缓存不可用: {0}")]
    CacheUnavailable(String),

    #[error("同步周期失败: {0}")]
    SyncCycleFailed(String),

    #[error("模板未找到: {code}")]
    TemplateNotFound { code: String },

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Infra(#[from] FreightError),
}

pub type Result<T> = std::result::Result<T, ConstraintError>;

impl ConstraintError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            Self::SyncCycleFailed(_) => "SYNC_CYCLE_FAILED",
            Self::TemplateNotFound { .. } => "TEMPLATE_NOT_FOUND",
            Self::JsonError(_) => "JSON_ERROR",
            Self::Infra(e) => e.code(),
        }
    }

    /// 是否为可重试错误
    ///
    /// 版本冲突也算可重试，调用方需要先重读当前版本再发起更新。
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreUnavailable(_)
            | Self::CacheUnavailable(_)
            | Self::SyncCycleFailed(_)
            | Self::VersionConflict { .. } => true,
            Self::Infra(e) => e.is_retryable(),
            _ => false,
        }
    }
}
