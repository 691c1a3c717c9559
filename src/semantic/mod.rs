//! Decaf 语义分析
//!
//! 作用域按节点惰性构建，表达式类型按节点缓存；分析过程不会因错误中止，
//! 出错节点的类型记为 `error`。

mod analyzer;
mod scope;
mod class_analysis;
mod expressions;
mod statements;

pub use analyzer::SemanticAnalyzer;
pub use scope::{LookupMode, Scope};
