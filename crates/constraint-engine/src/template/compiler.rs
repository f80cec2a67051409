//! 模板编译器
//!
//! 将模板骨架与参数值结合，生成完整的表达式树。
//! 核心功能是替换骨架中的 `?param` 占位符，同时保留参数的原始类型。
//! 未匹配到参数的占位符原样保留，缺参问题留给下游暴露，
//! 绝不静默填充默认值。

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

use super::models::{ParameterDef, ParameterType, RuleTemplate};
use crate::error::ConstraintError;
use crate::expr::Expr;

/// 模板编译错误
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("参数 {name} 超出范围: 期望 [{min:?}, {max:?}]")]
    ParamOutOfRange {
        name: String,
        min: Option<f64>,
        max: Option<f64>,
    },

    #[error("参数类型错误: {name} 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("无效的模板骨架: {0}")]
    InvalidSkeleton(#[from] serde_json::Error),
}

impl From<CompileError> for ConstraintError {
    fn from(err: CompileError) -> Self {
        ConstraintError::ValidationFailed(err.to_string())
    }
}

/// 模板编译器
///
/// 纯函数式：模板和参数都不会被修改，相同输入总是产出相同的表达式树。
pub struct TemplateCompiler {
    /// 匹配 ?paramName 格式的占位符
    placeholder_regex: Regex,
}

impl TemplateCompiler {
    pub fn new() -> Self {
        Self {
            // 固定模式，构造失败只可能是代码本身的缺陷
            placeholder_regex: Regex::new(r#"\?([a-zA-Z_][a-zA-Z0-9_]*)"#)
                .unwrap_or_else(|e| panic!("placeholder regex: {}", e)),
        }
    }

    /// 从模板和参数编译出表达式树
    ///
    /// 编译过程：
    /// 1. 校验提供的参数是否满足定义的类型和范围约束
    /// 2. 递归替换骨架中的占位符（未匹配的占位符原样保留）
    /// 3. 将替换结果反序列化为表达式树
    pub fn compile(
        &self,
        template: &RuleTemplate,
        params: &HashMap<String, Value>,
    ) -> Result<Expr, CompileError> {
        self.validate_params(&template.parameters, params)?;
        let substituted = self.replace_placeholders(&template.skeleton, params);
        let expr: Expr = serde_json::from_value(substituted)?;
        Ok(expr)
    }

    /// 只做占位符替换，返回 JSON（供调试和自由文本匹配器复用）
    pub fn substitute(&self, skeleton: &Value, params: &HashMap<String, Value>) -> Value {
        self.replace_placeholders(skeleton, params)
    }

    /// 校验所有提供的参数是否满足定义的约束
    fn validate_params(
        &self,
        definitions: &[ParameterDef],
        params: &HashMap<String, Value>,
    ) -> Result<(), CompileError> {
        for def in definitions {
            if let Some(value) = params.get(&def.name) {
                self.validate_param_value(def, value)?;
            }
        }
        Ok(())
    }

    /// 校验单个参数值是否符合定义的类型和范围约束
    fn validate_param_value(&self, def: &ParameterDef, value: &Value) -> Result<(), CompileError> {
        let type_ok = match def.param_type {
            ParameterType::String => value.is_string(),
            ParameterType::Number => value.is_number(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Array => value.is_array(),
        };

        if !type_ok {
            return Err(CompileError::TypeMismatch {
                name: def.name.clone(),
                expected: format!("{:?}", def.param_type),
                actual: value_type_name(value),
            });
        }

        // 数值范围检查
        if let Some(v) = value.as_f64() {
            if let Some(min) = def.min
                && v < min
            {
                return Err(CompileError::ParamOutOfRange {
                    name: def.name.clone(),
                    min: Some(min),
                    max: def.max,
                });
            }
            if let Some(max) = def.max
                && v > max
            {
                return Err(CompileError::ParamOutOfRange {
                    name: def.name.clone(),
                    min: def.min,
                    max: Some(max),
                });
            }
        }

        Ok(())
    }

    /// 递归替换骨架中的占位符
    ///
    /// 对于纯占位符字符串（如 "?amount"），直接返回参数值以保留原始类型；
    /// 对于包含占位符的混合字符串（如 "budget: ?amount"），进行文本替换；
    /// 参数表中没有的占位符原样保留。
    fn replace_placeholders(&self, skeleton: &Value, params: &HashMap<String, Value>) -> Value {
        match skeleton {
            Value::String(s) => {
                // 纯占位符字符串取参数的原始类型值
                if let Some(caps) = self.placeholder_regex.captures(s)
                    && caps.get(0).map(|m| m.as_str()) == Some(s.as_str())
                {
                    let param_name = &caps[1];
                    if let Some(value) = params.get(param_name) {
                        return value.clone();
                    }
                    return skeleton.clone();
                }

                // 混合字符串中的占位符做文本替换
                let result = self
                    .placeholder_regex
                    .replace_all(s, |caps: &regex::Captures| {
                        let param_name = &caps[1];
                        params
                            .get(param_name)
                            .map(|v| match v {
                                Value::String(s) => s.clone(),
                                _ => v.to_string(),
                            })
                            .unwrap_or_else(|| caps[0].to_string())
                    });
                Value::String(result.into_owned())
            }
            Value::Array(arr) => Value::Array(
                arr.iter()
                    .map(|v| self.replace_placeholders(v, params))
                    .collect(),
            ),
            Value::Object(obj) => {
                let mut compiled = serde_json::Map::new();
                for (k, v) in obj {
                    compiled.insert(k.clone(), self.replace_placeholders(v, params));
                }
                Value::Object(compiled)
            }
            _ => skeleton.clone(),
        }
    }
}

impl Default for TemplateCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn value_type_name(v: &Value) -> String {
    match v {
        Value::Null => "null".into(),
        Value::Bool(_) => "boolean".into(),
        Value::Number(_) => "number".into(),
        Value::String(_) => "string".into(),
        Value::Array(_) => "array".into(),
        Value::Object(_) => "object".into(),
    }
}
