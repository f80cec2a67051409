//! 路线评估编排器
//!
//! 对一组约束文档评估一条候选路线，产出完整报告。单条约束
//! 评估出问题只降级该条（passed=false、得分 0.0），不影响
//! 报告的完整性。得分采用二值策略：通过 1.0，未通过 0.0。

use crate::compiler::ConstraintCompiler;
use crate::evaluator::{EvaluationContext, ExpressionEvaluator};
use crate::models::{
    Constraint, ConstraintResult, ConstraintType, EvaluationReport, Route, Shipment,
};
use crate::snapshot::ConstraintSnapshot;
use chrono::Utc;
use tracing::{debug, warn};

/// 路线评估编排器
pub struct ConstraintEngine;

impl ConstraintEngine {
    /// 用约束文档集合评估一条路线
    ///
    /// 过滤不适用的约束（作用域不命中、业务有效期外、未激活），
    /// 按优先级从高到低逐条独立评估。
    pub fn evaluate(
        constraints: &[Constraint],
        route: &Route,
        shipment: Option<&Shipment>,
    ) -> EvaluationReport {
        let now = Utc::now();
        let mut applicable: Vec<&Constraint> = constraints
            .iter()
            .filter(|c| c.active && c.is_effective_at(now) && c.scope.matches(route, shipment))
            .collect();
        applicable.sort_by(|a, b| b.priority.cmp(&a.priority));

        let ctx = EvaluationContext::new(route, shipment);
        let results = applicable
            .iter()
            .map(|constraint| Self::evaluate_one(constraint, &ctx))
            .collect();

        Self::build_report(results)
    }

    /// 用缓存快照评估一条路线
    ///
    /// 扁平化类别逐项检查，缺失的类别表示约束暂不可知，直接跳过，
    /// 不产生结果项。自定义约束走常规表达式树评估。
    pub fn evaluate_snapshot(
        snapshot: &ConstraintSnapshot,
        route: &Route,
        shipment: Option<&Shipment>,
    ) -> EvaluationReport {
        let mut results = Vec::new();

        if !snapshot.min_wages.is_empty() {
            results.push(Self::check_min_wages(snapshot, route));
        }
        if !snapshot.max_hours.is_empty() {
            results.push(Self::check_max_hours(snapshot, route));
        }
        if let Some(budget) = snapshot.carbon_budget_kg {
            results.push(Self::check_carbon_budget(budget, route));
        }
        if !snapshot.sanctioned_carriers.is_empty() {
            results.push(Self::check_sanctioned(snapshot, route));
        }

        let now = Utc::now();
        let ctx = EvaluationContext::new(route, shipment);
        for custom in &snapshot.customs {
            if !custom.active
                || !custom.is_effective_at(now)
                || !custom.scope.matches(route, shipment)
            {
                continue;
            }
            results.push(Self::evaluate_one(custom, &ctx));
        }

        Self::build_report(results)
    }

    /// 评估单条约束，异常降级为未通过
    fn evaluate_one(constraint: &Constraint, ctx: &EvaluationContext<'_>) -> ConstraintResult {
        if let Err(e) = ConstraintCompiler::validate_expr(&constraint.expression) {
            warn!(
                constraint_id = %constraint.constraint_id,
                error = %e,
                "约束表达式不可评估，按未通过降级"
            );
            return ConstraintResult {
                constraint_id: constraint.constraint_id.clone(),
                constraint_type: constraint.constraint_type,
                passed: false,
                is_hard: constraint.is_hard,
                score: 0.0,
                violations: vec![ctx.route().route_id.clone()],
                message: format!("约束不可评估: {}", e),
            };
        }

        let passed = ExpressionEvaluator::evaluate(&constraint.expression, ctx);
        let violations = if passed {
            Vec::new()
        } else {
            ExpressionEvaluator::derive_violations(&constraint.expression, ctx)
        };

        debug!(
            constraint_id = %constraint.constraint_id,
            passed,
            "constraint evaluated"
        );

        ConstraintResult {
            constraint_id: constraint.constraint_id.clone(),
            constraint_type: constraint.constraint_type,
            passed,
            is_hard: constraint.is_hard,
            score: if passed { 1.0 } else { 0.0 },
            violations,
            message: if passed {
                format!("{} 满足", constraint.name)
            } else {
                format!("{} 未满足", constraint.name)
            },
        }
    }

    /// 逐段检查目的国最低工资
    fn check_min_wages(snapshot: &ConstraintSnapshot, route: &Route) -> ConstraintResult {
        let violations: Vec<String> = route
            .segments
            .iter()
            .filter(|s| {
                snapshot
                    .min_wage_for(&s.to_node)
                    .is_some_and(|min| (s.carrier_wage_cents as f64) < min)
            })
            .map(|s| s.segment_id.clone())
            .collect();

        Self::flattened_result(
            "snapshot:min_wage",
            ConstraintType::Wage,
            true,
            violations,
            "目的国最低工资",
        )
    }

    /// 检查全程在途工时之和，多条区域上限并存时取最严格的一条
    fn check_max_hours(snapshot: &ConstraintSnapshot, route: &Route) -> ConstraintResult {
        let total: f64 = route.segments.iter().map(|s| s.transit_hours).sum();
        let cap = snapshot
            .max_hours
            .values()
            .copied()
            .fold(f64::INFINITY, f64::min);

        let violations = if total > cap {
            vec![route.route_id.clone()]
        } else {
            Vec::new()
        };

        Self::flattened_result(
            "snapshot:max_hours",
            ConstraintType::Hours,
            true,
            violations,
            "区域周工时上限",
        )
    }

    fn check_carbon_budget(budget_kg: f64, route: &Route) -> ConstraintResult {
        let violations = if route.total_carbon_kg > budget_kg {
            vec![route.route_id.clone()]
        } else {
            Vec::new()
        };

        Self::flattened_result(
            "snapshot:carbon_budget",
            ConstraintType::Carbon,
            false,
            violations,
            "路线碳排放预算",
        )
    }

    fn check_sanctioned(snapshot: &ConstraintSnapshot, route: &Route) -> ConstraintResult {
        let violations: Vec<String> = route
            .segments
            .iter()
            .filter(|s| snapshot.is_sanctioned(&s.carrier_code))
            .map(|s| s.segment_id.clone())
            .collect();

        Self::flattened_result(
            "snapshot:sanctioned_carriers",
            ConstraintType::Sanction,
            true,
            violations,
            "受制裁承运商排除",
        )
    }

    fn flattened_result(
        id: &str,
        constraint_type: ConstraintType,
        is_hard: bool,
        violations: Vec<String>,
        name: &str,
    ) -> ConstraintResult {
        let passed = violations.is_empty();
        ConstraintResult {
            constraint_id: id.to_string(),
            constraint_type,
            passed,
            is_hard,
            score: if passed { 1.0 } else { 0.0 },
            violations,
            message: if passed {
                format!("{} 满足", name)
            } else {
                format!("{} 未满足", name)
            },
        }
    }

    /// 汇总报告：硬约束全部通过才算通过，总分为各结果得分均值
    fn build_report(results: Vec<ConstraintResult>) -> EvaluationReport {
        let all_hard_passed = results.iter().filter(|r| r.is_hard).all(|r| r.passed);
        let overall_score = if results.is_empty() {
            1.0
        } else {
            results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64
        };

        EvaluationReport {
            results,
            all_hard_passed,
            overall_score,
        }
    }
}
