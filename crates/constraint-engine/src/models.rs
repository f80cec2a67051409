//! 约束引擎领域模型

use crate::expr::Expr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// 约束类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConstraintType {
    Wage,
    Carbon,
    Time,
    Cost,
    Sanction,
    Hours,
    Safety,
    Mode,
    Custom,
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wage => write!(f, "WAGE"),
            Self::Carbon => write!(f, "CARBON"),
            Self::Time => write!(f, "TIME"),
            Self::Cost => write!(f, "COST"),
            Self::Sanction => write!(f, "SANCTION"),
            Self::Hours => write!(f, "HOURS"),
            Self::Safety => write!(f, "SAFETY"),
            Self::Mode => write!(f, "MODE"),
            Self::Custom => write!(f, "CUSTOM"),
        }
    }
}

/// 约束作用域
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "id", rename_all = "snake_case")]
pub enum ConstraintScope {
    Global,
    Customer(String),
    Shipment(String),
    Route(String),
}

impl ConstraintScope {
    /// 当前评估对象是否落在该作用域内
    pub fn matches(&self, route: &Route, shipment: Option<&Shipment>) -> bool {
        match self {
            Self::Global => true,
            Self::Customer(id) => shipment.map(|s| s.customer_id == *id).unwrap_or(false),
            Self::Shipment(id) => shipment.map(|s| s.shipment_id == *id).unwrap_or(false),
            Self::Route(id) => route.route_id == *id,
        }
    }
}

/// 约束文档
///
/// 随版本落库后不可变，更新永远以新版本追加。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub constraint_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub constraint_type: ConstraintType,
    pub is_hard: bool,
    /// 数值越大越先评估
    #[serde(default)]
    pub priority: i32,
    pub scope: ConstraintScope,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    pub expression: Expr,
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub effective_until: Option<DateTime<Utc>>,
    pub active: bool,
}

impl Constraint {
    /// 业务有效期窗口在给定时刻是否生效
    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        if let Some(from) = self.effective_from {
            if at < from {
                return false;
            }
        }
        if let Some(until) = self.effective_until {
            if at >= until {
                return false;
            }
        }
        true
    }

    /// 合并补丁，产生下一版本的文档内容
    pub fn merged_with(&self, patch: ConstraintPatch) -> Constraint {
        let mut next = self.clone();
        if let Some(name) = patch.name {
            next.name = name;
        }
        if let Some(description) = patch.description {
            next.description = description;
        }
        if let Some(constraint_type) = patch.constraint_type {
            next.constraint_type = constraint_type;
        }
        if let Some(is_hard) = patch.is_hard {
            next.is_hard = is_hard;
        }
        if let Some(priority) = patch.priority {
            next.priority = priority;
        }
        if let Some(scope) = patch.scope {
            next.scope = scope;
        }
        if let Some(params) = patch.params {
            next.params = params;
        }
        if let Some(expression) = patch.expression {
            next.expression = expression;
        }
        if let Some(effective_from) = patch.effective_from {
            next.effective_from = effective_from;
        }
        if let Some(effective_until) = patch.effective_until {
            next.effective_until = effective_until;
        }
        if let Some(active) = patch.active {
            next.active = active;
        }
        next
    }
}

/// 约束创建请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintDefinition {
    /// 缺省时由存储层分配 UUID
    #[serde(default)]
    pub constraint_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub constraint_type: ConstraintType,
    pub is_hard: bool,
    #[serde(default)]
    pub priority: i32,
    pub scope: ConstraintScope,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    pub expression: Expr,
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub effective_until: Option<DateTime<Utc>>,
}

/// 约束更新补丁
///
/// `effective_from` / `effective_until` 使用双层 Option，
/// 外层表示是否修改，内层表示修改后的值（None 即清除窗口边界）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub constraint_type: Option<ConstraintType>,
    #[serde(default)]
    pub is_hard: Option<bool>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub scope: Option<ConstraintScope>,
    #[serde(default)]
    pub params: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub expression: Option<Expr>,
    #[serde(default, with = "double_option")]
    pub effective_from: Option<Option<DateTime<Utc>>>,
    #[serde(default, with = "double_option")]
    pub effective_until: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub active: Option<bool>,
}

mod double_option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Option<DateTime<Utc>>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<DateTime<Utc>>>, D::Error> {
        Option::<DateTime<Utc>>::deserialize(deserializer).map(Some)
    }
}

/// 带版本号的约束记录（存储层的追加单元）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintVersion {
    pub constraint_id: String,
    pub version: i32,
    /// 事务时间戳，由存储适配层在落库时盖戳
    pub recorded_at: DateTime<Utc>,
    pub document: Constraint,
}

/// 候选路线
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub segments: Vec<RouteSegment>,
    pub total_cost_usd: f64,
    pub total_time_hours: f64,
    pub total_carbon_kg: f64,
    pub total_distance_km: f64,
}

/// 路线段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSegment {
    pub segment_id: String,
    pub sequence: i32,
    pub from_node: String,
    pub to_node: String,
    pub mode: String,
    pub carrier_code: String,
    pub distance_km: f64,
    pub cost_usd: f64,
    pub transit_hours: f64,
    pub carbon_kg: f64,
    pub carrier_wage_cents: i64,
    pub labor_score: f64,
    pub safety_rating: f64,
}

/// 待运货件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub shipment_id: String,
    pub customer_id: String,
    pub weight_kg: f64,
    pub volume_m3: f64,
}

/// 单条约束的评估结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintResult {
    pub constraint_id: String,
    pub constraint_type: ConstraintType,
    pub passed: bool,
    pub is_hard: bool,
    /// 软约束得分，基线策略为二值 1.0 / 0.0
    pub score: f64,
    /// 尽力而为推导的违规对象标识（段 ID 或路线 ID）
    pub violations: Vec<String>,
    pub message: String,
}

/// 整条路线的评估报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub results: Vec<ConstraintResult>,
    pub all_hard_passed: bool,
    /// 所有结果得分的算术平均，空集合约定为 1.0
    pub overall_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::FieldRef;
    use crate::operators::CompareOp;

    fn sample_constraint() -> Constraint {
        Constraint {
            constraint_id: "c-1".to_string(),
            name: "cost budget".to_string(),
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
            active: true,
        }
    }

    #[test]
    fn test_constraint_type_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ConstraintType::Sanction).unwrap(),
            "\"SANCTION\""
        );
        assert_eq!(ConstraintType::Hours.to_string(), "HOURS");
    }

    #[test]
    fn test_effective_window() {
        let mut c = sample_constraint();
        let now = Utc::now();
        assert!(c.is_effective_at(now));

        c.effective_from = Some(now + chrono::Duration::hours(1));
        assert!(!c.is_effective_at(now));

        c.effective_from = None;
        c.effective_until = Some(now);
        assert!(!c.is_effective_at(now));
    }

    #[test]
    fn test_scope_matches() {
        let route = Route {
            route_id: "r-1".to_string(),
            ..Default::default()
        };
        let shipment = Shipment {
            shipment_id: "s-1".to_string(),
            customer_id: "cust-9".to_string(),
            weight_kg: 10.0,
            volume_m3: 1.0,
        };

        assert!(ConstraintScope::Global.matches(&route, None));
        assert!(ConstraintScope::Route("r-1".to_string()).matches(&route, None));
        assert!(!ConstraintScope::Route("r-2".to_string()).matches(&route, None));
        assert!(
            ConstraintScope::Customer("cust-9".to_string()).matches(&route, Some(&shipment))
        );
        // 缺少货件上下文时客户作用域不命中
        assert!(!ConstraintScope::Customer("cust-9".to_string()).matches(&route, None));
    }

    #[test]
    fn test_merged_with_keeps_unpatched_fields() {
        let base = sample_constraint();
        let next = base.merged_with(ConstraintPatch {
            priority: Some(10),
            active: Some(false),
            ..Default::default()
        });

        assert_eq!(next.priority, 10);
        assert!(!next.active);
        assert_eq!(next.name, base.name);
        assert_eq!(next.expression, base.expression);
    }
}
