//! 表达式评估器
//!
//! 纯同步求值，不做任何 I/O，也从不返回错误：字段无法解析时所在的
//! 比较节点按 false 处理（失败关闭）。数值比较统一转为 f64，
//! 字符串和布尔值只支持相等类操作符。

use crate::expr::{Expr, FieldRef};
use crate::models::{Route, RouteSegment, Shipment};
use crate::operators::CompareOp;
use serde_json::Value;

/// 评估上下文
///
/// 借用一条路线、可选的货件，以及可选的当前段绑定。
/// 段和承运商字段在没有段绑定时不可解析。
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    route: &'a Route,
    shipment: Option<&'a Shipment>,
    segment: Option<&'a RouteSegment>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(route: &'a Route, shipment: Option<&'a Shipment>) -> Self {
        Self {
            route,
            shipment,
            segment: None,
        }
    }

    /// 绑定一个段，返回新的上下文（原上下文不变）
    pub fn with_segment(&self, segment: &'a RouteSegment) -> Self {
        Self {
            segment: Some(segment),
            ..*self
        }
    }

    pub fn route(&self) -> &'a Route {
        self.route
    }

    /// 解析字段引用
    pub fn resolve(&self, field: &FieldRef) -> Option<Value> {
        match field {
            FieldRef::Route(name) => self.resolve_route_field(name),
            FieldRef::Segment(name) => self.segment.and_then(|s| segment_field(s, name)),
            FieldRef::Carrier(name) => self.segment.and_then(|s| carrier_field(s, name)),
            FieldRef::Shipment(name) => self.shipment.and_then(|s| shipment_field(s, name)),
        }
    }

    fn resolve_route_field(&self, name: &str) -> Option<Value> {
        let route = self.route;
        match name {
            "total_cost_usd" => Some(json_f64(route.total_cost_usd)),
            "total_time_hours" => Some(json_f64(route.total_time_hours)),
            "total_carbon_kg" => Some(json_f64(route.total_carbon_kg)),
            "total_distance_km" => Some(json_f64(route.total_distance_km)),
            "segment_count" => Some(Value::from(route.segments.len() as i64)),
            "route_id" => Some(Value::from(route.route_id.clone())),
            _ => None,
        }
    }
}

/// 路线段字段目录
pub fn segment_field(segment: &RouteSegment, name: &str) -> Option<Value> {
    match name {
        "cost_usd" => Some(json_f64(segment.cost_usd)),
        "transit_hours" => Some(json_f64(segment.transit_hours)),
        "carbon_kg" => Some(json_f64(segment.carbon_kg)),
        "distance_km" => Some(json_f64(segment.distance_km)),
        "wage_cents" => Some(Value::from(segment.carrier_wage_cents)),
        "labor_score" => Some(json_f64(segment.labor_score)),
        "safety_rating" => Some(json_f64(segment.safety_rating)),
        "sequence" => Some(Value::from(segment.sequence)),
        "mode" => Some(Value::from(segment.mode.clone())),
        "from_node" => Some(Value::from(segment.from_node.clone())),
        "to_node" => Some(Value::from(segment.to_node.clone())),
        "carrier_code" => Some(Value::from(segment.carrier_code.clone())),
        _ => None,
    }
}

fn carrier_field(segment: &RouteSegment, name: &str) -> Option<Value> {
    match name {
        "carrier_code" => Some(Value::from(segment.carrier_code.clone())),
        "wage_cents" => Some(Value::from(segment.carrier_wage_cents)),
        _ => None,
    }
}

fn shipment_field(shipment: &Shipment, name: &str) -> Option<Value> {
    match name {
        "shipment_id" => Some(Value::from(shipment.shipment_id.clone())),
        "customer_id" => Some(Value::from(shipment.customer_id.clone())),
        "weight_kg" => Some(json_f64(shipment.weight_kg)),
        "volume_m3" => Some(json_f64(shipment.volume_m3)),
        _ => None,
    }
}

fn json_f64(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// 表达式评估器
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    /// 评估表达式
    pub fn evaluate(expr: &Expr, ctx: &EvaluationContext<'_>) -> bool {
        match expr {
            Expr::Literal { value } => *value,
            Expr::Compare { field, op, value } => Self::compare(ctx.resolve(field), *op, value),
            Expr::And { children } => children.iter().all(|c| Self::evaluate(c, ctx)),
            Expr::Or { children } => children.iter().any(|c| Self::evaluate(c, ctx)),
            Expr::Not { child } => !Self::evaluate(child, ctx),
            Expr::All { inner, .. } => ctx
                .route()
                .segments
                .iter()
                .all(|s| Self::evaluate(inner, &ctx.with_segment(s))),
            Expr::Any { inner, .. } => ctx
                .route()
                .segments
                .iter()
                .any(|s| Self::evaluate(inner, &ctx.with_segment(s))),
            Expr::Sum {
                field, op, value, ..
            } => {
                let total = Self::fold_segments(ctx, field);
                Self::compare_f64(total, *op, value)
            }
            Expr::Avg {
                field, op, value, ..
            } => {
                let count = ctx.route().segments.len();
                let avg = if count == 0 {
                    0.0
                } else {
                    Self::fold_segments(ctx, field) / count as f64
                };
                Self::compare_f64(avg, *op, value)
            }
            Expr::Count {
                predicate,
                op,
                value,
                ..
            } => {
                let count = ctx
                    .route()
                    .segments
                    .iter()
                    .filter(|s| Self::evaluate(predicate, &ctx.with_segment(s)))
                    .count();
                Self::compare_f64(count as f64, *op, value)
            }
            Expr::InSet { field, set } => match ctx.resolve(field) {
                Some(v) => set.iter().any(|member| value_eq(&v, member)),
                None => false,
            },
            Expr::NotInSet { field, set } => match ctx.resolve(field) {
                Some(v) => !set.iter().any(|member| value_eq(&v, member)),
                None => false,
            },
            Expr::Between { field, low, high } => {
                let (Some(v), Some(lo), Some(hi)) = (
                    ctx.resolve(field).as_ref().and_then(as_f64),
                    as_f64(low),
                    as_f64(high),
                ) else {
                    return false;
                };
                v >= lo && v <= hi
            }
            Expr::Exists { field } => ctx.resolve(field).is_some(),
        }
    }

    /// 推导违规对象标识
    ///
    /// 顶层全称量化失败时逐段重新绑定，收集不满足内层表达式的段 ID；
    /// 其余失败的表达式只能定位到路线本身。仅在整体评估为 false 时调用。
    pub fn derive_violations(expr: &Expr, ctx: &EvaluationContext<'_>) -> Vec<String> {
        if let Expr::All { inner, .. } = expr {
            let failing: Vec<String> = ctx
                .route()
                .segments
                .iter()
                .filter(|s| !Self::evaluate(inner, &ctx.with_segment(s)))
                .map(|s| s.segment_id.clone())
                .collect();
            if !failing.is_empty() {
                return failing;
            }
        }
        vec![ctx.route().route_id.clone()]
    }

    /// 对段字段求和，无法解析为数值的段按零计入
    fn fold_segments(ctx: &EvaluationContext<'_>, field: &str) -> f64 {
        ctx.route()
            .segments
            .iter()
            .map(|s| {
                segment_field(s, field)
                    .as_ref()
                    .and_then(as_f64)
                    .unwrap_or(0.0)
            })
            .sum()
    }

    fn compare(field_value: Option<Value>, op: CompareOp, expected: &Value) -> bool {
        let Some(field_value) = field_value else {
            return false;
        };

        if let (Some(lhs), Some(rhs)) = (as_f64(&field_value), as_f64(expected)) {
            return op.apply_f64(lhs, rhs);
        }

        match (&field_value, expected) {
            (Value::String(a), Value::String(b)) if op.is_equality() => {
                (a == b) == matches!(op, CompareOp::Eq)
            }
            (Value::Bool(a), Value::Bool(b)) if op.is_equality() => {
                (a == b) == matches!(op, CompareOp::Eq)
            }
            _ => false,
        }
    }

    fn compare_f64(lhs: f64, op: CompareOp, expected: &Value) -> bool {
        match as_f64(expected) {
            Some(rhs) => op.apply_f64(lhs, rhs),
            None => false,
        }
    }
}

/// 集合成员相等检查，数值统一转 f64 后比较
fn value_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return (x - y).abs() < f64::EPSILON;
    }
    a == b
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
