//! 表达式评估器性能基准测试
//!
//! 覆盖单字段比较、量化与聚合表达式随段数的伸缩，以及整条
//! 路线的报告生成开销。

use constraint_engine::{
    CompareOp, Constraint, ConstraintEngine, ConstraintScope, ConstraintType, EvaluationContext,
    Expr, ExpressionEvaluator, FieldRef, Route, RouteSegment,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use std::collections::HashMap;
use std::hint::black_box;

fn segment(i: usize) -> RouteSegment {
    RouteSegment {
        segment_id: format!("s{}", i),
        sequence: i as i32,
        from_node: "PT".to_string(),
        to_node: "DE".to_string(),
        mode: "road".to_string(),
        carrier_code: format!("CAR{}", i % 7),
        distance_km: 500.0,
        cost_usd: 420.0,
        transit_hours: 12.0,
        carbon_kg: 180.0,
        carrier_wage_cents: 1300 + (i as i64 % 200),
        labor_score: 0.8,
        safety_rating: 0.9,
    }
}

fn route(segments: usize) -> Route {
    Route {
        route_id: "r-bench".to_string(),
        segments: (0..segments).map(segment).collect(),
        total_cost_usd: 420.0 * segments as f64,
        total_time_hours: 12.0 * segments as f64,
        total_carbon_kg: 180.0 * segments as f64,
        total_distance_km: 500.0 * segments as f64,
    }
}

fn constraint(name: &str, is_hard: bool, expression: Expr) -> Constraint {
    Constraint {
        constraint_id: name.to_string(),
        name: name.to_string(),
        description: String::new(),
        constraint_type: ConstraintType::Custom,
        is_hard,
        priority: 0,
        scope: ConstraintScope::Global,
        params: HashMap::new(),
        expression,
        effective_from: None,
        effective_until: None,
        active: true,
    }
}

/// 单字段比较基准
fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");

    let r = route(1);
    let ctx = EvaluationContext::new(&r, None);
    let expr = Expr::compare(
        FieldRef::Route("total_cost_usd".to_string()),
        CompareOp::Lte,
        5000,
    );

    group.bench_function("route_field_lte", |b| {
        b.iter(|| ExpressionEvaluator::evaluate(black_box(&expr), black_box(&ctx)))
    });

    let missing = Expr::compare(
        FieldRef::Route("no_such_field".to_string()),
        CompareOp::Eq,
        0,
    );
    group.bench_function("unresolved_field", |b| {
        b.iter(|| ExpressionEvaluator::evaluate(black_box(&missing), black_box(&ctx)))
    });

    group.finish();
}

/// 量化表达式随段数的伸缩
fn bench_quantifier_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("all_segments_scaling");

    let expr = Expr::all_segments(Expr::compare(
        FieldRef::Segment("wage_cents".to_string()),
        CompareOp::Gte,
        1260,
    ));

    for size in [2, 8, 32, 128].iter() {
        let r = route(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let ctx = EvaluationContext::new(&r, None);
            b.iter(|| ExpressionEvaluator::evaluate(black_box(&expr), black_box(&ctx)))
        });
    }

    group.finish();
}

/// 聚合表达式基准
fn bench_aggregates(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregates");

    let r = route(32);
    let ctx = EvaluationContext::new(&r, None);

    let sum = Expr::sum_segments("transit_hours", CompareOp::Lte, 480);
    group.bench_function("sum_32_segments", |b| {
        b.iter(|| ExpressionEvaluator::evaluate(black_box(&sum), black_box(&ctx)))
    });

    let avg = Expr::avg_segments("labor_score", CompareOp::Gte, 0.5);
    group.bench_function("avg_32_segments", |b| {
        b.iter(|| ExpressionEvaluator::evaluate(black_box(&avg), black_box(&ctx)))
    });

    let count = Expr::count_segments(
        Expr::compare(
            FieldRef::Segment("carrier_code".to_string()),
            CompareOp::Eq,
            "CAR1",
        ),
        CompareOp::Gte,
        1,
    );
    group.bench_function("count_32_segments", |b| {
        b.iter(|| ExpressionEvaluator::evaluate(black_box(&count), black_box(&ctx)))
    });

    group.finish();
}

/// 集合成员检查基准
fn bench_set_membership(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_membership");

    let r = route(8);

    for size in [5, 50, 500].iter() {
        let set: Vec<serde_json::Value> =
            (0..*size).map(|i| json!(format!("BAD{}", i))).collect();
        let expr = Expr::all_segments(Expr::not_in_set(
            FieldRef::Segment("carrier_code".to_string()),
            set,
        ));

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let ctx = EvaluationContext::new(&r, None);
            b.iter(|| ExpressionEvaluator::evaluate(black_box(&expr), black_box(&ctx)))
        });
    }

    group.finish();
}

/// 整条路线的报告生成基准
fn bench_full_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_report");

    let constraints = vec![
        constraint(
            "wage",
            true,
            Expr::all_segments(Expr::compare(
                FieldRef::Segment("wage_cents".to_string()),
                CompareOp::Gte,
                1260,
            )),
        ),
        constraint(
            "hours",
            true,
            Expr::sum_segments("transit_hours", CompareOp::Lte, 480),
        ),
        constraint(
            "carbon",
            false,
            Expr::compare(
                FieldRef::Route("total_carbon_kg".to_string()),
                CompareOp::Lte,
                10000,
            ),
        ),
        constraint(
            "sanction",
            true,
            Expr::all_segments(Expr::not_in_set(
                FieldRef::Segment("carrier_code".to_string()),
                vec![json!("BADCO"), json!("EVILCO")],
            )),
        ),
    ];

    for size in [2, 16, 64].iter() {
        let r = route(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                ConstraintEngine::evaluate(black_box(&constraints), black_box(&r), black_box(None))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compare,
    bench_quantifier_scaling,
    bench_aggregates,
    bench_set_membership,
    bench_full_report,
);

criterion_main!(benches);
