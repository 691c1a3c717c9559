pub mod error;
pub mod types;
pub mod ast;
pub mod config;
pub mod semantic;

use ast::{Ast, NodeId};
use config::SemaConfig;
use error::{DecafResult, rejected};
use semantic::SemanticAnalyzer;

pub use semantic::{LookupMode, Scope};

/// 语义检查入口
pub struct Compiler {
    config: SemaConfig,
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_config(SemaConfig::default())
    }

    pub fn with_config(config: SemaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SemaConfig {
        &self.config
    }

    /// 检查程序；有任何诊断时返回 `DecafError::Rejected`
    pub fn check(&self, ast: &Ast, program: NodeId) -> DecafResult<()> {
        let analyzer = self.analyze(ast, program)?;
        if analyzer.error_count() > 0 {
            return Err(rejected(analyzer.diagnostics()));
        }
        Ok(())
    }

    /// 运行分析并返回分析器，调用方可以查询类型、作用域与诊断
    pub fn analyze<'a>(&self, ast: &'a Ast, program: NodeId) -> DecafResult<SemanticAnalyzer<'a>> {
        let mut analyzer = SemanticAnalyzer::with_config(ast, self.config.clone());
        analyzer.analyze(program)?;
        Ok(analyzer)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
