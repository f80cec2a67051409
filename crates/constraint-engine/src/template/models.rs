//! 模板领域模型

use crate::models::ConstraintType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 参数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Array,
}

/// 参数定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub param_type: ParameterType,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    pub required: bool,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

/// 规则模板
///
/// `skeleton` 是一棵含 `?param` 占位符的表达式 JSON，模板本身不可变，
/// 编译只读取不修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTemplate {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub constraint_type: ConstraintType,
    pub is_hard: bool,
    pub skeleton: Value,
    pub parameters: Vec<ParameterDef>,
}

impl RuleTemplate {
    /// 按名称查找参数定义
    pub fn parameter(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_serialization() {
        let template = RuleTemplate {
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
            parameters: vec![ParameterDef {
                name: "max_carbon_kg".to_string(),
                param_type: ParameterType::Number,
                label: "碳排放上限（千克）".to_string(),
                description: None,
                required: true,
                min: Some(0.0),
                max: None,
            }],
        };

        let text = serde_json::to_string(&template).unwrap();
        let parsed: RuleTemplate = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.code, "carbon_budget");
        assert!(parsed.parameter("max_carbon_kg").is_some());
        assert!(parsed.parameter("missing").is_none());
    }
}
