//! 自由文本匹配器
//!
//! 尽力而为的触发识别：对运营人员输入的一句话描述做关键词匹配，
//! 命中模板后用正则抽取数值和代码类参数，再走常规模板编译。
//! 触发词有歧义时按模板库声明顺序取第一个命中，这是已知局限；
//! 匹配结果只是编译输入，绝不反向影响表达式树本身的语义。

use super::builtin::TemplateLibrary;
use super::compiler::{CompileError, TemplateCompiler};
use super::models::{ParameterType, RuleTemplate};
use crate::expr::Expr;
use regex::Regex;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::debug;

/// 匹配结果
#[derive(Debug, Clone)]
pub struct MatchedTemplate {
    pub code: String,
    pub params: HashMap<String, Value>,
}

/// 自由文本匹配器
pub struct TemplateMatcher {
    number_regex: Regex,
    code_token_regex: Regex,
}

/// 模板代码到触发关键词的映射，全部小写比较
fn trigger_keywords(code: &str) -> &'static [&'static str] {
    match code {
        "min_wage_country" => &["wage", "salary", "工资"],
        "max_hours_region" => &["hours cap", "working hours", "max hours", "工时"],
        "carbon_budget" => &["carbon", "co2", "emission", "碳排放"],
        "cost_budget" => &["cost", "budget", "成本"],
        "sanctioned_carriers" => &["sanction", "blacklist", "制裁"],
        "min_labor_score" => &["labor score", "labour score", "劳工评分"],
        "allowed_modes" => &["transport mode", "allowed modes", "运输方式"],
        "delivery_time_window" => &["time window", "deliver within", "时间窗"],
        _ => &[],
    }
}

impl TemplateMatcher {
    pub fn new() -> Self {
        Self {
            // 固定模式，构造失败只可能是代码本身的缺陷
            number_regex: Regex::new(r"\d+(?:\.\d+)?")
                .unwrap_or_else(|e| panic!("number regex: {}", e)),
            code_token_regex: Regex::new(r"\b[A-Z]{2,5}\b")
                .unwrap_or_else(|e| panic!("code token regex: {}", e)),
        }
    }

    /// 在模板库中匹配自由文本，返回第一个命中的模板及抽取出的参数
    pub fn match_text(
        &self,
        library: &TemplateLibrary,
        text: &str,
    ) -> Option<MatchedTemplate> {
        let lowered = text.to_lowercase();

        for template in library.templates() {
            let hit = trigger_keywords(&template.code)
                .iter()
                .any(|kw| lowered.contains(kw));
            if !hit {
                continue;
            }

            let params = self.extract_params(template, text);
            debug!(code = %template.code, ?params, "free-text matched template");
            return Some(MatchedTemplate {
                code: template.code.clone(),
                params,
            });
        }

        None
    }

    /// 匹配并编译为表达式树
    pub fn compile_text(
        &self,
        library: &TemplateLibrary,
        compiler: &TemplateCompiler,
        text: &str,
    ) -> Option<Result<Expr, CompileError>> {
        let matched = self.match_text(library, text)?;
        let template = library.get(&matched.code)?;
        Some(compiler.compile(template, &matched.params))
    }

    /// 按参数定义的声明顺序抽取参数
    ///
    /// 数值参数依次吃掉文本中出现的数字；字符串参数取第一个大写代码
    /// 词；数组参数收集全部大写代码词。抽不到就不填，占位符留给编译
    /// 结果原样暴露。
    fn extract_params(&self, template: &RuleTemplate, text: &str) -> HashMap<String, Value> {
        let mut params = HashMap::new();

        let mut numbers = self
            .number_regex
            .find_iter(text)
            .filter_map(|m| m.as_str().parse::<f64>().ok());
        let code_tokens: Vec<String> = self
            .code_token_regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();

        for def in &template.parameters {
            match def.param_type {
                ParameterType::Number => {
                    if let Some(n) = numbers.next() {
                        params.insert(def.name.clone(), json!(n));
                    }
                }
                ParameterType::String => {
                    if let Some(token) = code_tokens.first() {
                        params.insert(def.name.clone(), json!(token));
                    }
                }
                ParameterType::Array => {
                    if !code_tokens.is_empty() {
                        params.insert(def.name.clone(), json!(code_tokens));
                    }
                }
                ParameterType::Boolean => {}
            }
        }

        params
    }
}

impl Default for TemplateMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_wage_text() {
        let library = TemplateLibrary::builtin();
        let matcher = TemplateMatcher::new();

        let matched = matcher
            .match_text(&library, "minimum wage in DE must be at least 1260 cents")
            .unwrap();
        assert_eq!(matched.code, "min_wage_country");
        assert_eq!(matched.params.get("country"), Some(&json!("DE")));
        assert_eq!(matched.params.get("min_wage_cents"), Some(&json!(1260.0)));
    }

    #[test]
    fn test_matches_carbon_and_compiles() {
        let library = TemplateLibrary::builtin();
        let matcher = TemplateMatcher::new();
        let compiler = TemplateCompiler::new();

        let expr = matcher
            .compile_text(&library, &compiler, "keep route carbon under 5000 kg")
            .unwrap()
            .unwrap();
        match expr {
            Expr::Compare { value, .. } => assert_eq!(value, json!(5000.0)),
            _ => panic!("expected compare"),
        }
    }

    #[test]
    fn test_matches_sanction_list() {
        let library = TemplateLibrary::builtin();
        let matcher = TemplateMatcher::new();

        let matched = matcher
            .match_text(&library, "sanction carriers BADCO and EVILCO")
            .unwrap();
        assert_eq!(matched.code, "sanctioned_carriers");
        assert_eq!(
            matched.params.get("carriers"),
            Some(&json!(["BADCO", "EVILCO"]))
        );
    }

    #[test]
    fn test_ambiguous_text_resolves_by_declaration_order() {
        let library = TemplateLibrary::builtin();
        let matcher = TemplateMatcher::new();

        // 同时提到 wage 和 cost，min_wage_country 在库中声明更早
        let matched = matcher
            .match_text(&library, "wage floor 1000 and cost cap 2000")
            .unwrap();
        assert_eq!(matched.code, "min_wage_country");
    }

    #[test]
    fn test_no_trigger_returns_none() {
        let library = TemplateLibrary::builtin();
        let matcher = TemplateMatcher::new();
        assert!(matcher.match_text(&library, "hello world").is_none());
    }
}
