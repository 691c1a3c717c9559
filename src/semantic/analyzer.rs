//! 语义分析器核心实现

use std::collections::HashSet;

use tracing::debug;

use crate::ast::{Ast, NodeId, NodeKind};
use crate::config::SemaConfig;
use crate::error::{DecafError, DecafResult, Diagnostics, SemanticError, SourceLocation};
use crate::types::Type;
use super::scope::Scope;

/// 语义分析器
///
/// 每个节点的作用域、表达式类型和检查状态都按 `NodeId` 缓存，
/// 同一节点的诊断最多报告一次。
pub struct SemanticAnalyzer<'a> {
    pub(super) ast: &'a Ast,
    pub(super) config: SemaConfig,
    pub(super) scopes: Vec<Option<Scope>>,
    pub(super) types: Vec<Option<Type>>,
    pub(super) checked: Vec<bool>,
    /// 正在准备作用域的节点，用于发现循环继承
    pub(super) preparing: HashSet<NodeId>,
    pub(super) diagnostics: Diagnostics,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self::with_config(ast, SemaConfig::default())
    }

    pub fn with_config(ast: &'a Ast, config: SemaConfig) -> Self {
        let len = ast.len();
        Self {
            ast,
            diagnostics: Diagnostics::with_limit(config.error_limit),
            config,
            scopes: vec![None; len],
            types: vec![None; len],
            checked: vec![false; len],
            preparing: HashSet::new(),
        }
    }

    /// 检查以 `program` 为根的整棵树
    pub fn analyze(&mut self, program: NodeId) -> DecafResult<()> {
        if !matches!(self.ast.kind(program), NodeKind::Program(_)) {
            return Err(DecafError::NotAProgram(program.index()));
        }

        debug!(nodes = self.ast.len(), "semantic analysis started");
        self.check(program);
        debug!(errors = self.diagnostics.error_count(), "semantic analysis finished");

        Ok(())
    }

    pub(super) fn report(&mut self, loc: SourceLocation, error: SemanticError) {
        debug!(%loc, %error, "semantic error");
        self.diagnostics.report(loc, error);
    }

    pub fn ast(&self) -> &'a Ast {
        self.ast
    }

    pub fn config(&self) -> &SemaConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.error_count()
    }

    /// 已计算过的表达式类型
    pub fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.types[node.index()].as_ref()
    }

    /// 已准备好的作用域
    pub fn scope(&self, node: NodeId) -> Option<&Scope> {
        self.scopes[node.index()].as_ref()
    }
}
