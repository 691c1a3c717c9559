//! 声明与语句检查

use crate::ast::{Decl, NodeId, NodeKind, Stmt};
use crate::error::SemanticError;
use crate::types::Type;
use super::analyzer::SemanticAnalyzer;

impl<'a> SemanticAnalyzer<'a> {
    /// 检查节点及其子树；每个节点只检查一次
    pub fn check(&mut self, node: NodeId) {
        if self.checked[node.index()] {
            return;
        }
        self.checked[node.index()] = true;

        let ast = self.ast;
        match ast.kind(node) {
            NodeKind::Program(program) => {
                self.prepare_scope(node);
                for &decl in &program.decls {
                    self.check(decl);
                }
            }
            NodeKind::Decl(decl) => self.check_decl(node, decl),
            NodeKind::Stmt(stmt) => self.check_stmt(node, stmt),
            NodeKind::Expr(_) => {
                self.get_type(node);
            }
        }
    }

    fn check_decl(&mut self, node: NodeId, decl: &Decl) {
        match decl {
            Decl::Variable(var) => {
                self.check_type(&var.ty, node);
            }
            Decl::Function(func) => {
                self.prepare_scope(node);
                self.check_type(&func.return_type, node);
                for &formal in &func.formals {
                    self.check(formal);
                }
                if let Some(body) = func.body {
                    self.check(body);
                }
                self.check_override_methods(node);
            }
            Decl::Class(class) => {
                self.prepare_scope(node);
                self.check_inheritance(node);
                for &member in &class.members {
                    self.check(member);
                }
            }
            Decl::Interface(iface) => {
                self.prepare_scope(node);
                for &member in &iface.members {
                    self.check(member);
                }
            }
        }
    }

    fn check_stmt(&mut self, node: NodeId, stmt: &Stmt) {
        match stmt {
            Stmt::Block { decls, stmts } => {
                self.prepare_scope(node);
                for &decl in decls {
                    self.check(decl);
                }
                for &stmt in stmts {
                    self.check(stmt);
                }
            }
            Stmt::If { test, then_branch, else_branch } => {
                self.check_test(*test);
                self.check(*then_branch);
                if let Some(else_branch) = else_branch {
                    self.check(*else_branch);
                }
            }
            Stmt::While { test, body } => {
                self.check_test(*test);
                self.check(*body);
            }
            Stmt::For { init, test, step, body } => {
                self.check(*init);
                self.check_test(*test);
                self.check(*step);
                self.check(*body);
            }
            Stmt::Return { expr } => self.check_return(node, *expr),
            Stmt::Break => {
                if !self.inside_loop(node) {
                    self.report(self.ast.loc(node), SemanticError::BreakOutsideLoop);
                }
            }
            Stmt::Print { args } => {
                for (index, &arg) in args.iter().enumerate() {
                    let given = self.get_type(arg);
                    if !given.is_error() && !given.is_printable() {
                        self.report(
                            self.ast.loc(arg),
                            SemanticError::PrintArgMismatch { index: index + 1, given },
                        );
                    }
                }
            }
        }
    }

    /// 条件表达式必须是 bool
    fn check_test(&mut self, test: NodeId) {
        let ty = self.get_type(test);
        if !ty.is_error() && ty != Type::Bool {
            self.report(self.ast.loc(test), SemanticError::TestNotBoolean);
        }
    }

    fn check_return(&mut self, node: NodeId, expr: NodeId) {
        let given = self.get_type(expr);
        let ast = self.ast;
        let Some(func) = self.enclosing_function(node).and_then(|f| ast.as_function(f)) else {
            return;
        };
        let expected = func.return_type.clone();
        if !self.compatible(&given, &expected, node) {
            self.report(ast.loc(node), SemanticError::ReturnMismatch { given, expected });
        }
    }

    /// 在到达所在函数之前是否遇到循环
    fn inside_loop(&self, node: NodeId) -> bool {
        let ast = self.ast;
        for ancestor in ast.ancestors(node) {
            match ast.kind(ancestor) {
                NodeKind::Stmt(Stmt::While { .. }) | NodeKind::Stmt(Stmt::For { .. }) => return true,
                NodeKind::Decl(Decl::Function(_)) => return false,
                _ => {}
            }
        }
        false
    }
}
