//! 约束编译器
//!
//! 在持久化之前校验约束定义的结构，并预提取表达式引用的字段集合，
//! 供服务层的已编译索引和调试输出使用。

use crate::error::{ConstraintError, Result};
use crate::expr::{Expr, FieldRef};
use crate::models::{Constraint, ConstraintDefinition};
use serde_json::Value;
use std::collections::BTreeSet;

/// 已编译约束
#[derive(Debug, Clone)]
pub struct CompiledConstraint {
    pub constraint: Constraint,
    /// 表达式引用的字段全集，形如 "segment.wage_cents"
    pub required_fields: BTreeSet<String>,
}

/// 约束编译器
pub struct ConstraintCompiler;

impl ConstraintCompiler {
    /// 校验约束创建请求
    pub fn validate_definition(definition: &ConstraintDefinition) -> Result<()> {
        if definition.name.trim().is_empty() {
            return Err(ConstraintError::ValidationFailed(
                "约束名称不能为空".to_string(),
            ));
        }
        Self::validate_expr(&definition.expression)
    }

    /// 校验表达式结构
    pub fn validate_expr(expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal { .. } | Expr::Exists { .. } => Ok(()),
            Expr::Compare { op, value, .. } => {
                if matches!(value, Value::Bool(_)) && !op.is_equality() {
                    return Err(ConstraintError::ValidationFailed(format!(
                        "布尔操作数不支持排序比较: {}",
                        op
                    )));
                }
                if matches!(value, Value::String(_)) && !op.is_equality() {
                    return Err(ConstraintError::ValidationFailed(format!(
                        "字符串操作数不支持排序比较: {}",
                        op
                    )));
                }
                Ok(())
            }
            Expr::And { children } | Expr::Or { children } => {
                if children.is_empty() {
                    return Err(ConstraintError::ValidationFailed(
                        "逻辑组不能为空".to_string(),
                    ));
                }
                children.iter().try_for_each(Self::validate_expr)
            }
            Expr::Not { child } => Self::validate_expr(child),
            Expr::All { inner, .. } | Expr::Any { inner, .. } => Self::validate_expr(inner),
            Expr::Sum { field, value, .. } | Expr::Avg { field, value, .. } => {
                if field.trim().is_empty() {
                    return Err(ConstraintError::ValidationFailed(
                        "聚合字段名不能为空".to_string(),
                    ));
                }
                Self::require_numeric(value, "聚合比较值")
            }
            Expr::Count {
                predicate, value, ..
            } => {
                Self::validate_expr(predicate)?;
                Self::require_numeric(value, "计数比较值")
            }
            Expr::InSet { set, .. } | Expr::NotInSet { set, .. } => {
                if set.is_empty() {
                    return Err(ConstraintError::ValidationFailed(
                        "集合成员不能为空".to_string(),
                    ));
                }
                Ok(())
            }
            Expr::Between { low, high, .. } => {
                Self::require_numeric(low, "between 下界")?;
                Self::require_numeric(high, "between 上界")
            }
        }
    }

    /// 编译约束文档，提取引用字段
    pub fn compile(constraint: Constraint) -> Result<CompiledConstraint> {
        Self::validate_expr(&constraint.expression)?;

        let mut required_fields = BTreeSet::new();
        Self::extract_fields(&constraint.expression, &mut required_fields);

        Ok(CompiledConstraint {
            constraint,
            required_fields,
        })
    }

    fn require_numeric(value: &Value, what: &str) -> Result<()> {
        if value.as_f64().is_none() {
            return Err(ConstraintError::ValidationFailed(format!(
                "{}必须是数值: {}",
                what, value
            )));
        }
        Ok(())
    }

    fn extract_fields(expr: &Expr, fields: &mut BTreeSet<String>) {
        match expr {
            Expr::Literal { .. } => {}
            Expr::Compare { field, .. }
            | Expr::InSet { field, .. }
            | Expr::NotInSet { field, .. }
            | Expr::Between { field, .. }
            | Expr::Exists { field } => {
                fields.insert(field.to_string());
            }
            Expr::And { children } | Expr::Or { children } => {
                for child in children {
                    Self::extract_fields(child, fields);
                }
            }
            Expr::Not { child } => Self::extract_fields(child, fields),
            Expr::All { inner, .. } | Expr::Any { inner, .. } => {
                Self::extract_fields(inner, fields)
            }
            Expr::Sum { field, .. } | Expr::Avg { field, .. } => {
                fields.insert(FieldRef::Segment(field.clone()).to_string());
            }
            Expr::Count { predicate, .. } => Self::extract_fields(predicate, fields),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConstraintScope, ConstraintType};
    use crate::operators::CompareOp;
    use serde_json::json;
    use std::collections::HashMap;

    fn definition(name: &str, expression: Expr) -> ConstraintDefinition {
        ConstraintDefinition {
            constraint_id: None,
            name: name.to_string(),
            description: String::new(),
            constraint_type: ConstraintType::Custom,
            is_hard: true,
            priority: 0,
            scope: ConstraintScope::Global,
            params: HashMap::new(),
            expression,
            effective_from: None,
            effective_until: None,
        }
    }

    #[test]
    fn test_rejects_empty_name() {
        let def = definition("  ", Expr::literal(true));
        assert!(matches!(
            ConstraintCompiler::validate_definition(&def),
            Err(ConstraintError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_rejects_empty_logical_group() {
        let def = definition("empty group", Expr::and(vec![]));
        assert!(ConstraintCompiler::validate_definition(&def).is_err());
    }

    #[test]
    fn test_rejects_non_numeric_between_bounds() {
        let expr = Expr::Between {
            field: FieldRef::Route("total_cost_usd".to_string()),
            low: json!("cheap"),
            high: json!(100),
        };
        assert!(ConstraintCompiler::validate_expr(&expr).is_err());
    }

    #[test]
    fn test_rejects_empty_set() {
        let expr = Expr::in_set(FieldRef::Segment("mode".to_string()), vec![]);
        assert!(ConstraintCompiler::validate_expr(&expr).is_err());
    }

    #[test]
    fn test_rejects_bool_ordering() {
        let expr = Expr::Compare {
            field: FieldRef::Route("route_id".to_string()),
            op: CompareOp::Gt,
            value: json!(true),
        };
        assert!(ConstraintCompiler::validate_expr(&expr).is_err());
    }

    #[test]
    fn test_extracts_required_fields() {
        let expr = Expr::and(vec![
            Expr::all_segments(Expr::compare(
                FieldRef::Segment("wage_cents".to_string()),
                CompareOp::Gte,
                1260,
            )),
            Expr::sum_segments("carbon_kg", CompareOp::Lte, 5000),
            Expr::compare(
                FieldRef::Route("total_cost_usd".to_string()),
                CompareOp::Lte,
                10000,
            ),
        ]);
        let def = definition("mixed", expr.clone());
        ConstraintCompiler::validate_definition(&def).unwrap();

        let compiled = ConstraintCompiler::compile(Constraint {
            constraint_id: "c-1".to_string(),
            name: def.name,
            description: def.description,
            constraint_type: def.constraint_type,
            is_hard: def.is_hard,
            priority: def.priority,
            scope: def.scope,
            params: def.params,
            expression: expr,
            effective_from: None,
            effective_until: None,
            active: true,
        })
        .unwrap();

        let fields: Vec<&str> = compiled
            .required_fields
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(
            fields,
            vec![
                "route.total_cost_usd",
                "segment.carbon_kg",
                "segment.wage_cents"
            ]
        );
    }
}
