//! 内置模板库
//!
//! 覆盖货运合规域的常用约束：最低工资、工时上限、碳排放预算、
//! 成本预算、承运商制裁名单、劳工与安全评分、运输方式白名单、
//! 送达时间窗。模板按声明顺序排列，自由文本匹配依赖该顺序。

use super::models::{ParameterDef, ParameterType, RuleTemplate};
use crate::models::ConstraintType;
use serde_json::json;

/// 模板库
pub struct TemplateLibrary {
    templates: Vec<RuleTemplate>,
}

impl TemplateLibrary {
    /// 构建内置模板库
    pub fn builtin() -> Self {
        Self {
            templates: vec![
                min_wage_country(),
                max_hours_region(),
                carbon_budget(),
                cost_budget(),
                sanctioned_carriers(),
                min_labor_score(),
                allowed_modes(),
                delivery_time_window(),
            ],
        }
    }

    /// 按代码查找模板
    pub fn get(&self, code: &str) -> Option<&RuleTemplate> {
        self.templates.iter().find(|t| t.code == code)
    }

    /// 按声明顺序遍历
    pub fn templates(&self) -> &[RuleTemplate] {
        &self.templates
    }
}

fn number_param(name: &str, label: &str, min: Option<f64>) -> ParameterDef {
    ParameterDef {
        name: name.to_string(),
        param_type: ParameterType::Number,
        label: label.to_string(),
        description: None,
        required: true,
        min,
        max: None,
    }
}

fn string_param(name: &str, label: &str) -> ParameterDef {
    ParameterDef {
        name: name.to_string(),
        param_type: ParameterType::String,
        label: label.to_string(),
        description: None,
        required: true,
        min: None,
        max: None,
    }
}

fn array_param(name: &str, label: &str) -> ParameterDef {
    ParameterDef {
        name: name.to_string(),
        param_type: ParameterType::Array,
        label: label.to_string(),
        description: None,
        required: true,
        min: None,
        max: None,
    }
}

/// 目的国最低工资：落在该国的段必须满足工资下限
fn min_wage_country() -> RuleTemplate {
    RuleTemplate {
        code: "min_wage_country".to_string(),
        name: "目的国最低工资".to_string(),
        description: Some("到达指定国家的段，承运工资不得低于当地最低标准".to_string()),
        constraint_type: ConstraintType::Wage,
        is_hard: true,
        skeleton: json!({
            "type": "all",
            "scope": "segments",
            "inner": {
                "type": "or",
                "children": [
                    {
                        "type": "not",
                        "child": {
                            "type": "compare",
                            "field": { "source": "segment", "name": "to_node" },
                            "op": "eq",
                            "value": "?country"
                        }
                    },
                    {
                        "type": "compare",
                        "field": { "source": "segment", "name": "wage_cents" },
                        "op": "gte",
                        "value": "?min_wage_cents"
                    }
                ]
            }
        }),
        parameters: vec![
            string_param("country", "国家代码"),
            number_param("min_wage_cents", "最低工资（分/小时）", Some(0.0)),
        ],
    }
}

/// 区域每周工时上限：全程在途工时之和不得超限
fn max_hours_region() -> RuleTemplate {
    RuleTemplate {
        code: "max_hours_region".to_string(),
        name: "区域每周工时上限".to_string(),
        description: Some("路线各段在途工时之和不得超过区域周工时上限".to_string()),
        constraint_type: ConstraintType::Hours,
        is_hard: true,
        skeleton: json!({
            "type": "sum",
            "scope": "segments",
            "field": "transit_hours",
            "op": "lte",
            "value": "?max_hours"
        }),
        parameters: vec![
            string_param("region", "区域代码"),
            number_param("max_hours", "周工时上限", Some(0.0)),
        ],
    }
}

/// 路线碳排放预算
fn carbon_budget() -> RuleTemplate {
    RuleTemplate {
        code: "carbon_budget".to_string(),
        name: "路线碳排放预算".to_string(),
        description: None,
        constraint_type: ConstraintType::Carbon,
        is_hard: false,
        skeleton: json!({
            "type": "compare",
            "field": { "source": "route", "name": "total_carbon_kg" },
            "op": "lte",
            "value": "?max_carbon_kg"
        }),
        parameters: vec![number_param("max_carbon_kg", "碳排放上限（千克）", Some(0.0))],
    }
}

/// 路线成本预算
fn cost_budget() -> RuleTemplate {
    RuleTemplate {
        code: "cost_budget".to_string(),
        name: "路线成本预算".to_string(),
        description: None,
        constraint_type: ConstraintType::Cost,
        is_hard: false,
        skeleton: json!({
            "type": "compare",
            "field": { "source": "route", "name": "total_cost_usd" },
            "op": "lte",
            "value": "?max_cost_usd"
        }),
        parameters: vec![number_param("max_cost_usd", "成本上限（美元）", Some(0.0))],
    }
}

/// 受制裁承运商排除
fn sanctioned_carriers() -> RuleTemplate {
    RuleTemplate {
        code: "sanctioned_carriers".to_string(),
        name: "受制裁承运商排除".to_string(),
        description: Some("任何段都不得使用名单内的承运商".to_string()),
        constraint_type: ConstraintType::Sanction,
        is_hard: true,
        skeleton: json!({
            "type": "all",
            "scope": "segments",
            "inner": {
                "type": "not_in_set",
                "field": { "source": "segment", "name": "carrier_code" },
                "set": "?carriers"
            }
        }),
        parameters: vec![array_param("carriers", "承运商代码列表")],
    }
}

/// 劳工评分下限
fn min_labor_score() -> RuleTemplate {
    RuleTemplate {
        code: "min_labor_score".to_string(),
        name: "劳工评分下限".to_string(),
        description: Some("每个段的承运劳工评分均不得低于下限".to_string()),
        constraint_type: ConstraintType::Safety,
        is_hard: false,
        skeleton: json!({
            "type": "all",
            "scope": "segments",
            "inner": {
                "type": "compare",
                "field": { "source": "segment", "name": "labor_score" },
                "op": "gte",
                "value": "?min_score"
            }
        }),
        parameters: vec![number_param("min_score", "评分下限", Some(0.0))],
    }
}

/// 运输方式白名单
fn allowed_modes() -> RuleTemplate {
    RuleTemplate {
        code: "allowed_modes".to_string(),
        name: "运输方式白名单".to_string(),
        description: None,
        constraint_type: ConstraintType::Mode,
        is_hard: true,
        skeleton: json!({
            "type": "all",
            "scope": "segments",
            "inner": {
                "type": "in_set",
                "field": { "source": "segment", "name": "mode" },
                "set": "?modes"
            }
        }),
        parameters: vec![array_param("modes", "允许的运输方式")],
    }
}

/// 送达时间窗
fn delivery_time_window() -> RuleTemplate {
    RuleTemplate {
        code: "delivery_time_window".to_string(),
        name: "送达时间窗".to_string(),
        description: Some("路线总时长必须落在时间窗内".to_string()),
        constraint_type: ConstraintType::Time,
        is_hard: true,
        skeleton: json!({
            "type": "between",
            "field": { "source": "route", "name": "total_time_hours" },
            "low": "?min_hours",
            "high": "?max_hours"
        }),
        parameters: vec![
            number_param("min_hours", "最短时长", Some(0.0)),
            number_param("max_hours", "最长时长", Some(0.0)),
        ],
    }
}
