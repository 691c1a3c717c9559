//! 作用域与名字解析
//!
//! 名字沿语法父链逐层查找；继承来的成员在类作用域准备时已合并进子类作用域，
//! 因此同一条父链就能同时覆盖局部遮蔽和继承可见性。

use std::collections::HashMap;

use tracing::trace;

use crate::ast::{Ast, Decl, NodeId, NodeKind, Stmt};
use crate::error::SemanticError;
use super::analyzer::SemanticAnalyzer;

/// 查找模式：只查当前作用域，或逐层向外
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    Shallow,
    Deep,
}

/// 名字到声明节点的映射
#[derive(Debug, Clone, Default)]
pub struct Scope {
    table: HashMap<String, NodeId>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册声明；名字已存在时保留先前的声明并返回它
    pub fn declare(&mut self, name: &str, decl: NodeId) -> Result<(), NodeId> {
        if let Some(existing) = self.table.get(name) {
            return Err(*existing);
        }
        self.table.insert(name.to_string(), decl);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.table.get(name).copied()
    }

    /// 把 `other` 中本作用域尚未绑定的名字并入，返回并入的数量
    pub fn copy_from_scope(&mut self, other: &Scope, owning_class: &str) -> usize {
        let mut merged = 0;
        for (name, decl) in &other.table {
            if !self.table.contains_key(name) {
                self.table.insert(name.clone(), *decl);
                merged += 1;
            }
        }
        trace!(class = owning_class, merged, "inherited members merged");
        merged
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// 按名字排序的绑定
    pub fn bindings(&self) -> Vec<(&str, NodeId)> {
        let mut bindings: Vec<_> = self.table.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        bindings.sort_by(|a, b| a.0.cmp(b.0));
        bindings
    }
}

/// 拥有作用域的节点直接声明的名字
fn declared_in(ast: &Ast, node: NodeId) -> Option<&[NodeId]> {
    match ast.kind(node) {
        NodeKind::Program(p) => Some(p.decls.as_slice()),
        NodeKind::Decl(Decl::Function(f)) => Some(f.formals.as_slice()),
        NodeKind::Decl(Decl::Class(c)) => Some(c.members.as_slice()),
        NodeKind::Decl(Decl::Interface(i)) => Some(i.members.as_slice()),
        NodeKind::Stmt(Stmt::Block { decls, .. }) => Some(decls.as_slice()),
        _ => None,
    }
}

impl<'a> SemanticAnalyzer<'a> {
    /// 惰性构建节点的作用域，每个节点最多构建一次
    pub fn prepare_scope(&mut self, node: NodeId) {
        if self.scopes[node.index()].is_some() {
            return;
        }
        let ast = self.ast;
        let Some(decls) = declared_in(ast, node) else {
            return;
        };
        if !self.preparing.insert(node) {
            return;
        }

        let mut scope = Scope::new();
        for &decl in decls {
            let Some(d) = ast.decl(decl) else { continue };
            let name = d.name();
            if let Err(previous) = scope.declare(&name.name, decl) {
                let previous = ast.loc(previous);
                self.report(
                    name.loc,
                    SemanticError::DeclConflict { name: name.name.clone(), previous },
                );
            }
        }

        if ast.as_class(node).is_some() {
            self.merge_superclass(node, &mut scope);
        }

        trace!(node = %node, bindings = scope.len(), "scope prepared");
        self.preparing.remove(&node);
        self.scopes[node.index()] = Some(scope);
    }

    /// 从 `node` 开始查找名字；`Deep` 模式下沿父链向外查找
    pub fn find_decl(&mut self, node: NodeId, name: &str, mode: LookupMode) -> Option<NodeId> {
        let mut current = node;
        loop {
            self.prepare_scope(current);
            let found = self.scopes[current.index()]
                .as_ref()
                .and_then(|scope| scope.lookup(name));
            if found.is_some() {
                return found;
            }
            match (mode, self.ast.parent(current)) {
                (LookupMode::Deep, Some(parent)) => current = parent,
                _ => return None,
            }
        }
    }

    /// 节点是否位于类体内
    pub fn is_class_scope(&mut self, node: NodeId, mode: LookupMode) -> bool {
        let mut current = node;
        loop {
            self.prepare_scope(current);
            let parent = self.ast.parent(current);
            if parent.is_some_and(|p| self.ast.as_class(p).is_some()) {
                return true;
            }
            match (mode, parent) {
                (LookupMode::Deep, Some(parent)) => current = parent,
                _ => return false,
            }
        }
    }

    /// 最近的外层类声明
    pub fn enclosing_class(&self, node: NodeId) -> Option<NodeId> {
        let ast = self.ast;
        ast.ancestors(node).find(|&n| ast.as_class(n).is_some())
    }

    /// 最近的外层函数声明
    pub fn enclosing_function(&self, node: NodeId) -> Option<NodeId> {
        let ast = self.ast;
        ast.ancestors(node).find(|&n| ast.as_function(n).is_some())
    }
}
