//! 约束表达式 AST
//!
//! 表达式树一旦随约束版本落库即不可变，序列化采用 tagged JSON，
//! 与持久层的 JSONB 文档列一一对应。

use crate::operators::{AggregateScope, CompareOp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 字段引用
///
/// 封闭枚举，区分四个取值来源。承运商字段经由当前绑定的段解析。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "name", rename_all = "snake_case")]
pub enum FieldRef {
    Route(String),
    Segment(String),
    Carrier(String),
    Shipment(String),
}

impl FieldRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Route(n) | Self::Segment(n) | Self::Carrier(n) | Self::Shipment(n) => n,
        }
    }

    /// 是否依赖当前段绑定
    pub fn needs_segment(&self) -> bool {
        matches!(self, Self::Segment(_) | Self::Carrier(_))
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Route(n) => write!(f, "route.{}", n),
            Self::Segment(n) => write!(f, "segment.{}", n),
            Self::Carrier(n) => write!(f, "carrier.{}", n),
            Self::Shipment(n) => write!(f, "shipment.{}", n),
        }
    }
}

/// 表达式节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: bool,
    },
    Compare {
        field: FieldRef,
        op: CompareOp,
        value: Value,
    },
    And {
        children: Vec<Expr>,
    },
    Or {
        children: Vec<Expr>,
    },
    Not {
        child: Box<Expr>,
    },
    /// 全称量化：路线的每个段都满足内层表达式，空段序列恒真
    All {
        scope: AggregateScope,
        inner: Box<Expr>,
    },
    /// 存在量化：至少一个段满足内层表达式，空段序列恒假
    Any {
        scope: AggregateScope,
        inner: Box<Expr>,
    },
    /// 对段字段求和后比较，无法解析为数值的段按零计入
    Sum {
        scope: AggregateScope,
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// 对段字段求平均后比较，空段序列按 0.0 参与比较
    Avg {
        scope: AggregateScope,
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// 统计满足谓词的段数后比较
    Count {
        scope: AggregateScope,
        predicate: Box<Expr>,
        op: CompareOp,
        value: Value,
    },
    InSet {
        field: FieldRef,
        set: Vec<Value>,
    },
    NotInSet {
        field: FieldRef,
        set: Vec<Value>,
    },
    /// field >= low AND field <= high 的语法糖
    Between {
        field: FieldRef,
        low: Value,
        high: Value,
    },
    Exists {
        field: FieldRef,
    },
}

impl Expr {
    pub fn literal(value: bool) -> Self {
        Self::Literal { value }
    }

    pub fn compare(field: FieldRef, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            field,
            op,
            value: value.into(),
        }
    }

    pub fn and(children: Vec<Expr>) -> Self {
        Self::And { children }
    }

    pub fn or(children: Vec<Expr>) -> Self {
        Self::Or { children }
    }

    pub fn not(child: Expr) -> Self {
        Self::Not {
            child: Box::new(child),
        }
    }

    pub fn all_segments(inner: Expr) -> Self {
        Self::All {
            scope: AggregateScope::Segments,
            inner: Box::new(inner),
        }
    }

    pub fn any_segment(inner: Expr) -> Self {
        Self::Any {
            scope: AggregateScope::Segments,
            inner: Box::new(inner),
        }
    }

    pub fn sum_segments(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Sum {
            scope: AggregateScope::Segments,
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn avg_segments(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Avg {
            scope: AggregateScope::Segments,
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn count_segments(predicate: Expr, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Count {
            scope: AggregateScope::Segments,
            predicate: Box::new(predicate),
            op,
            value: value.into(),
        }
    }

    pub fn in_set(field: FieldRef, set: Vec<Value>) -> Self {
        Self::InSet { field, set }
    }

    pub fn not_in_set(field: FieldRef, set: Vec<Value>) -> Self {
        Self::NotInSet { field, set }
    }

    pub fn between(field: FieldRef, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::Between {
            field,
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn exists(field: FieldRef) -> Self {
        Self::Exists { field }
    }
}
