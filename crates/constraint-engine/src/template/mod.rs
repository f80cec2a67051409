//! 规则模板子系统
//!
//! 模板是带 `?param` 占位符的表达式骨架，编译后得到可持久化的
//! 表达式树；自由文本匹配器在模板库之上做尽力而为的触发识别。

pub mod builtin;
pub mod compiler;
pub mod matcher;
pub mod models;

pub use builtin::TemplateLibrary;
pub use compiler::{CompileError, TemplateCompiler};
pub use matcher::{MatchedTemplate, TemplateMatcher};
pub use models::{ParameterDef, ParameterType, RuleTemplate};
