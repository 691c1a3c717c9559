//! 类继承关系分析：类作用域合并、循环继承、子类型关系、方法重写检查

use std::collections::HashSet;

use tracing::trace;

use crate::ast::{Decl, Identifier, NodeId};
use crate::config::FieldAccessRule;
use crate::error::{LookingFor, SemanticError};
use crate::types::Type;
use super::analyzer::SemanticAnalyzer;
use super::scope::{LookupMode, Scope};

impl<'a> SemanticAnalyzer<'a> {
    /// 准备类作用域时并入父类（及其祖先）的成员；本类声明优先
    pub(super) fn merge_superclass(&mut self, class_node: NodeId, scope: &mut Scope) {
        let ast = self.ast;
        let Some(class) = ast.as_class(class_node) else {
            return;
        };
        let Some(super_node) = self.superclass_of(class_node) else {
            return;
        };

        self.prepare_scope(super_node);
        let merged = self.scopes[super_node.index()]
            .as_ref()
            .map(|super_scope| scope.copy_from_scope(super_scope, &class.name.name));

        match merged {
            Some(count) => trace!(class = %class.name, superclass = %super_node, count, "class scope flattened"),
            // 父类作用域仍在构建中：继承链回到了自身
            None => self.report(
                class.name.loc,
                SemanticError::CyclicInheritance { class: class.name.name.clone() },
            ),
        }
    }

    /// 解析 `extends` 指向的类声明
    pub fn superclass_of(&mut self, class_node: NodeId) -> Option<NodeId> {
        let ast = self.ast;
        let extends = ast.as_class(class_node)?.extends.as_ref()?;
        let parent = ast.parent(class_node)?;
        self.find_decl(parent, &extends.name, LookupMode::Deep)
            .filter(|&d| ast.as_class(d).is_some())
    }

    /// 类自身及其全部祖先，由近及远；遇到循环时停止
    pub(super) fn class_chain(&mut self, class_node: NodeId) -> Vec<NodeId> {
        let mut chain = vec![class_node];
        let mut visited = HashSet::from([class_node]);
        let mut current = class_node;
        while let Some(next) = self.superclass_of(current) {
            if !visited.insert(next) {
                break;
            }
            chain.push(next);
            current = next;
        }
        chain
    }

    /// `sub` 是否为 `sup` 本身或其子类
    pub fn is_subclass_of(&mut self, sub: NodeId, sup: NodeId) -> bool {
        self.class_chain(sub).contains(&sup)
    }

    /// 类或其祖先是否声明实现了接口 `interface`
    pub fn implements_interface(&mut self, class_node: NodeId, interface: NodeId) -> bool {
        let ast = self.ast;
        for class in self.class_chain(class_node) {
            let Some(decl) = ast.as_class(class) else { continue };
            let Some(parent) = ast.parent(class) else { continue };
            for id in &decl.implements {
                if self.find_decl(parent, &id.name, LookupMode::Deep) == Some(interface) {
                    return true;
                }
            }
        }
        false
    }

    /// 把命名类型解析为类或接口声明
    pub fn resolve_named(&mut self, at: NodeId, id: &Identifier) -> Option<NodeId> {
        let ast = self.ast;
        self.find_decl(at, &id.name, LookupMode::Deep)
            .filter(|&d| matches!(ast.decl(d), Some(Decl::Class(_)) | Some(Decl::Interface(_))))
    }

    /// 类型等价：命名类型按解析到的声明比较，无法解析时退回按名字比较
    pub fn equivalent(&mut self, a: &Type, b: &Type, at: NodeId) -> bool {
        match (a, b) {
            (Type::Named(x), Type::Named(y)) => {
                match (self.resolve_named(at, x), self.resolve_named(at, y)) {
                    (Some(dx), Some(dy)) => dx == dy,
                    _ => x.name == y.name,
                }
            }
            (Type::Array(x), Type::Array(y)) => self.equivalent(x, y, at),
            _ => a.is_equivalent_to(b),
        }
    }

    /// `from` 类型的值能否用在需要 `to` 类型的地方
    pub fn compatible(&mut self, from: &Type, to: &Type, at: NodeId) -> bool {
        if from.is_error() || to.is_error() {
            return true;
        }
        if from.is_null() {
            return to.is_null() || to.is_reference_type();
        }
        if self.equivalent(from, to, at) {
            return true;
        }
        let (Type::Named(sub), Type::Named(sup)) = (from, to) else {
            return false;
        };
        let ast = self.ast;
        let (Some(sub_decl), Some(sup_decl)) = (self.resolve_named(at, sub), self.resolve_named(at, sup)) else {
            return false;
        };
        if ast.as_class(sub_decl).is_none() {
            return false;
        }
        match ast.decl(sup_decl) {
            Some(Decl::Class(_)) => self.is_subclass_of(sub_decl, sup_decl),
            Some(Decl::Interface(_)) => self.implements_interface(sub_decl, sup_decl),
            _ => false,
        }
    }

    /// 声明中的类型是否有效；命名类型必须能解析到类或接口
    pub(super) fn check_type(&mut self, ty: &Type, at: NodeId) -> bool {
        match ty {
            Type::Named(id) => {
                if self.resolve_named(at, id).is_some() {
                    true
                } else {
                    self.report(
                        id.loc,
                        SemanticError::IdentifierNotDeclared { name: id.name.clone(), kind: LookingFor::Type },
                    );
                    false
                }
            }
            Type::Array(elem) => self.check_type(elem, at),
            _ => true,
        }
    }

    /// 检查 `extends` 与 `implements` 引用
    pub(super) fn check_inheritance(&mut self, class_node: NodeId) {
        let ast = self.ast;
        let Some(class) = ast.as_class(class_node) else {
            return;
        };
        let Some(parent) = ast.parent(class_node) else {
            return;
        };

        if let Some(extends) = &class.extends {
            let found = self.find_decl(parent, &extends.name, LookupMode::Deep);
            if !found.is_some_and(|d| ast.as_class(d).is_some()) {
                self.report(
                    extends.loc,
                    SemanticError::IdentifierNotDeclared { name: extends.name.clone(), kind: LookingFor::Class },
                );
            }
        }

        for id in &class.implements {
            let found = self.find_decl(parent, &id.name, LookupMode::Deep);
            if !matches!(found.and_then(|d| ast.decl(d)), Some(Decl::Interface(_))) {
                self.report(
                    id.loc,
                    SemanticError::IdentifierNotDeclared { name: id.name.clone(), kind: LookingFor::Interface },
                );
            }
        }
    }

    /// 方法与继承来的同名方法签名必须一致
    pub(super) fn check_override_methods(&mut self, method_node: NodeId) {
        if !self.config.check_overrides {
            return;
        }
        let ast = self.ast;
        let Some(method) = ast.as_function(method_node) else {
            return;
        };
        let Some(class_node) = ast.parent(method_node).filter(|&p| ast.as_class(p).is_some()) else {
            return;
        };
        let Some(super_node) = self.superclass_of(class_node) else {
            return;
        };

        self.prepare_scope(super_node);
        let inherited = self.scopes[super_node.index()]
            .as_ref()
            .and_then(|scope| scope.lookup(&method.name.name));
        let Some(inherited) = inherited.filter(|&d| d != method_node) else {
            return;
        };
        let Some(inherited_fn) = ast.as_function(inherited) else {
            return;
        };

        let mut matches = self.equivalent(&method.return_type, &inherited_fn.return_type, method_node)
            && method.formals.len() == inherited_fn.formals.len();
        if matches {
            for (mine, theirs) in method.formals.iter().zip(&inherited_fn.formals) {
                let (Some(mine), Some(theirs)) = (ast.as_variable(*mine), ast.as_variable(*theirs)) else {
                    continue;
                };
                if !self.equivalent(&mine.ty, &theirs.ty, method_node) {
                    matches = false;
                    break;
                }
            }
        }

        if !matches {
            self.report(
                method.name.loc,
                SemanticError::OverrideMismatch { method: method.name.name.clone() },
            );
        }
    }

    /// 通过对象访问字段时的可见性
    pub(super) fn field_accessible(&mut self, at: NodeId, base_class: NodeId) -> bool {
        match self.config.field_access {
            FieldAccessRule::Public => true,
            FieldAccessRule::AnyClassScope => self.is_class_scope(at, LookupMode::Deep),
            FieldAccessRule::Protected => {
                if !self.is_class_scope(at, LookupMode::Deep) {
                    return false;
                }
                match self.enclosing_class(at) {
                    Some(current) => self.is_subclass_of(base_class, current),
                    None => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Ast;
    use crate::error::SourceLocation;

    fn id(name: &str, line: usize) -> Identifier {
        Identifier::new(name, SourceLocation::new(line, 1))
    }

    /// class Animal implements Named {}  class Dog extends Animal {}  interface Named {}
    fn hierarchy() -> (Ast, NodeId, NodeId, NodeId, NodeId) {
        let mut ast = Ast::new();
        let iface = ast.interface_decl(id("Named", 1), vec![]);
        let animal = ast.class_decl(id("Animal", 2), None, vec![id("Named", 2)], vec![]);
        let dog = ast.class_decl(id("Dog", 3), Some(id("Animal", 3)), vec![], vec![]);
        let program = ast.program(vec![iface, animal, dog]);
        (ast, program, iface, animal, dog)
    }

    #[test]
    fn test_subclass_compatible_with_ancestor_and_interface() {
        let (ast, program, _, _, _) = hierarchy();
        let mut analyzer = SemanticAnalyzer::new(&ast);
        let dog = Type::named(id("Dog", 9));
        let animal = Type::named(id("Animal", 9));
        let named = Type::named(id("Named", 9));

        assert!(analyzer.compatible(&dog, &animal, program));
        assert!(analyzer.compatible(&dog, &named, program));
        assert!(!analyzer.compatible(&animal, &dog, program));
        assert!(!analyzer.compatible(&named, &animal, program));
    }

    #[test]
    fn test_null_only_compatible_with_references() {
        let (ast, program, _, _, _) = hierarchy();
        let mut analyzer = SemanticAnalyzer::new(&ast);
        assert!(analyzer.compatible(&Type::Null, &Type::named(id("Dog", 1)), program));
        assert!(analyzer.compatible(&Type::Null, &Type::array_of(Type::Int), program));
        for prim in [Type::Int, Type::Bool, Type::Double, Type::String] {
            assert!(!analyzer.compatible(&Type::Null, &prim, program), "null -> {}", prim);
        }
    }

    #[test]
    fn test_error_compatible_with_everything() {
        let (ast, program, _, _, _) = hierarchy();
        let mut analyzer = SemanticAnalyzer::new(&ast);
        assert!(analyzer.compatible(&Type::Error, &Type::Int, program));
        assert!(analyzer.compatible(&Type::String, &Type::Error, program));
    }

    #[test]
    fn test_inherited_members_are_flattened() {
        let mut ast = Ast::new();
        let x = ast.var_decl(id("x", 1), Type::Int);
        let a = ast.class_decl(id("A", 1), None, vec![], vec![x]);
        let y = ast.var_decl(id("y", 2), Type::Int);
        let b = ast.class_decl(id("B", 2), Some(id("A", 2)), vec![], vec![y]);
        let c = ast.class_decl(id("C", 3), Some(id("B", 3)), vec![], vec![]);
        ast.program(vec![a, b, c]);

        let mut analyzer = SemanticAnalyzer::new(&ast);
        assert_eq!(analyzer.find_decl(c, "x", LookupMode::Shallow), Some(x));
        assert_eq!(analyzer.find_decl(c, "y", LookupMode::Shallow), Some(y));
        assert_eq!(analyzer.error_count(), 0);
    }

    #[test]
    fn test_cycle_reported_once() {
        let mut ast = Ast::new();
        let a = ast.class_decl(id("A", 1), Some(id("B", 1)), vec![], vec![]);
        let b = ast.class_decl(id("B", 2), Some(id("A", 2)), vec![], vec![]);
        ast.program(vec![a, b]);

        let mut analyzer = SemanticAnalyzer::new(&ast);
        analyzer.prepare_scope(a);
        analyzer.prepare_scope(b);
        assert_eq!(analyzer.error_count(), 1);
        assert!(matches!(
            analyzer.diagnostics().as_slice()[0].error,
            SemanticError::CyclicInheritance { .. }
        ));
        assert!(analyzer.is_subclass_of(a, b));
        assert!(analyzer.is_subclass_of(b, a));
    }
}
