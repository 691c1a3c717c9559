//! 表达式类型推导
//!
//! 先求子表达式的类型，再检查本节点。任何子表达式为 `error` 时本节点直接得到
//! `error`，不再报告新的错误。

use crate::ast::{CompoundExpr, Decl, Expr, Identifier, NodeId, NodeKind};
use crate::error::{LookingFor, SemanticError};
use crate::types::Type;
use super::analyzer::SemanticAnalyzer;
use super::scope::LookupMode;

impl<'a> SemanticAnalyzer<'a> {
    /// 求节点的类型；结果按节点缓存，重复调用不会重复报告错误
    pub fn get_type(&mut self, node: NodeId) -> Type {
        if let Some(ty) = &self.types[node.index()] {
            return ty.clone();
        }
        let ty = self.infer_type(node);
        self.types[node.index()] = Some(ty.clone());
        ty
    }

    fn infer_type(&mut self, node: NodeId) -> Type {
        let ast = self.ast;
        let expr = match ast.kind(node) {
            NodeKind::Expr(expr) => expr,
            NodeKind::Decl(Decl::Variable(var)) => {
                self.check(node);
                return var.ty.clone();
            }
            _ => {
                self.check(node);
                return Type::Void;
            }
        };

        match expr {
            Expr::IntConstant(_) => Type::Int,
            Expr::DoubleConstant(_) => Type::Double,
            Expr::BoolConstant(_) => Type::Bool,
            Expr::StringConstant(_) => Type::String,
            Expr::NullConstant => Type::Null,
            Expr::Empty => Type::Void,
            Expr::ReadInteger => Type::Int,
            Expr::ReadLine => Type::String,
            Expr::Arithmetic(c) => self.arithmetic_type(node, c),
            Expr::Relational(c) => self.relational_type(node, c),
            Expr::Equality(c) => self.equality_type(node, c),
            Expr::Logical(c) => self.logical_type(c),
            Expr::Assign(c) => self.assign_type(node, c),
            Expr::This => self.this_type(node),
            Expr::ArrayAccess { base, subscript } => self.array_access_type(*base, *subscript),
            Expr::FieldAccess { base, field } => self.field_access_type(node, *base, field),
            Expr::Call { base, field, actuals } => self.call_type(node, *base, field, actuals),
            Expr::New { class } => self.new_type(node, class),
            Expr::NewArray { size, elem_type } => self.new_array_type(node, *size, elem_type),
        }
    }

    fn operand_types(&mut self, c: &CompoundExpr) -> (Option<Type>, Option<Type>) {
        let left = c.left.map(|l| self.get_type(l));
        let right = c.right.map(|r| self.get_type(r));
        (left, right)
    }

    fn any_error(left: &Option<Type>, right: &Option<Type>) -> bool {
        left.as_ref().is_some_and(Type::is_error) || right.as_ref().is_some_and(Type::is_error)
    }

    fn incompatible(&mut self, c: &CompoundExpr, left: Type, right: Type) -> Type {
        self.report(
            c.op.loc,
            SemanticError::IncompatibleOperands { op: c.op.token.clone(), left, right },
        );
        Type::Error
    }

    fn incompatible_operand(&mut self, c: &CompoundExpr, operand: Type) -> Type {
        self.report(
            c.op.loc,
            SemanticError::IncompatibleOperand { op: c.op.token.clone(), operand },
        );
        Type::Error
    }

    /// `+ - * / %`、一元 `-` 与 `++ --`：左操作数可缺省，结果取右操作数类型
    fn arithmetic_type(&mut self, node: NodeId, c: &CompoundExpr) -> Type {
        let (left, right) = self.operand_types(c);
        if Self::any_error(&left, &right) {
            return Type::Error;
        }
        match (left, right) {
            (Some(l), Some(r)) => {
                if self.equivalent(&l, &r, node) && r.is_numeric() {
                    r
                } else {
                    self.incompatible(c, l, r)
                }
            }
            (None, Some(t)) | (Some(t), None) => {
                if t.is_numeric() {
                    t
                } else {
                    self.incompatible_operand(c, t)
                }
            }
            (None, None) => Type::Error,
        }
    }

    fn relational_type(&mut self, node: NodeId, c: &CompoundExpr) -> Type {
        let (left, right) = self.operand_types(c);
        if Self::any_error(&left, &right) {
            return Type::Error;
        }
        let (Some(l), Some(r)) = (left, right) else {
            return Type::Error;
        };
        if l.is_numeric() && self.equivalent(&l, &r, node) {
            Type::Bool
        } else {
            self.incompatible(c, l, r)
        }
    }

    fn equality_type(&mut self, node: NodeId, c: &CompoundExpr) -> Type {
        let (left, right) = self.operand_types(c);
        if Self::any_error(&left, &right) {
            return Type::Error;
        }
        let (Some(l), Some(r)) = (left, right) else {
            return Type::Error;
        };
        if l == Type::Void || r == Type::Void {
            return self.incompatible(c, l, r);
        }
        if self.compatible(&l, &r, node) || self.compatible(&r, &l, node) {
            Type::Bool
        } else {
            self.incompatible(c, l, r)
        }
    }

    /// `&& ||` 与一元 `!`
    fn logical_type(&mut self, c: &CompoundExpr) -> Type {
        let (left, right) = self.operand_types(c);
        if Self::any_error(&left, &right) {
            return Type::Error;
        }
        match (left, right) {
            (Some(l), Some(r)) => {
                if l == Type::Bool && r == Type::Bool {
                    Type::Bool
                } else {
                    self.incompatible(c, l, r)
                }
            }
            (None, Some(t)) | (Some(t), None) => {
                if t == Type::Bool {
                    Type::Bool
                } else {
                    self.incompatible_operand(c, t)
                }
            }
            (None, None) => Type::Error,
        }
    }

    /// 赋值：值必须与目标兼容，结果为目标类型
    fn assign_type(&mut self, node: NodeId, c: &CompoundExpr) -> Type {
        let (left, right) = self.operand_types(c);
        if Self::any_error(&left, &right) {
            return Type::Error;
        }
        let (Some(target), Some(value)) = (left, right) else {
            return Type::Error;
        };
        if self.compatible(&value, &target, node) {
            target
        } else {
            self.incompatible(c, target, value)
        }
    }

    fn this_type(&mut self, node: NodeId) -> Type {
        if self.is_class_scope(node, LookupMode::Deep) {
            if let Some(class) = self.enclosing_class(node).and_then(|c| self.ast.as_class(c)) {
                return Type::Named(class.name.clone());
            }
        }
        self.report(self.ast.loc(node), SemanticError::ThisOutsideClassScope);
        Type::Error
    }

    fn array_access_type(&mut self, base: NodeId, subscript: NodeId) -> Type {
        let base_type = self.get_type(base);
        let subscript_type = self.get_type(subscript);

        if base_type.is_error() || subscript_type.is_error() {
            return Type::Error;
        }

        let elem = match base_type {
            Type::Array(elem) => Some(*elem),
            _ => {
                self.report(self.ast.loc(base), SemanticError::BracketsOnNonArray);
                None
            }
        };
        if subscript_type != Type::Int {
            self.report(self.ast.loc(subscript), SemanticError::SubscriptNotInteger);
            return Type::Error;
        }
        elem.unwrap_or(Type::Error)
    }

    fn field_access_type(&mut self, node: NodeId, base: Option<NodeId>, field: &Identifier) -> Type {
        let ast = self.ast;
        let Some(base) = base else {
            let found = self.find_decl(node, &field.name, LookupMode::Deep);
            return match found.and_then(|d| ast.as_variable(d)) {
                Some(var) => var.ty.clone(),
                None => {
                    self.report(
                        field.loc,
                        SemanticError::IdentifierNotDeclared { name: field.name.clone(), kind: LookingFor::Variable },
                    );
                    Type::Error
                }
            };
        };

        let base_type = self.get_type(base);
        let class_id = match &base_type {
            Type::Error => return Type::Error,
            Type::Named(id) => id.clone(),
            other => return self.field_not_found(field, other.clone()),
        };

        let class_node = match self.resolve_named(node, &class_id) {
            Some(decl) if ast.as_class(decl).is_some() => decl,
            Some(_) => return self.field_not_found(field, base_type),
            None => {
                self.report(
                    class_id.loc,
                    SemanticError::IdentifierNotDeclared { name: class_id.name.clone(), kind: LookingFor::Class },
                );
                return Type::Error;
            }
        };

        let member = self.find_decl(class_node, &field.name, LookupMode::Shallow);
        let Some(var) = member.and_then(|d| ast.as_variable(d)) else {
            return self.field_not_found(field, base_type);
        };

        if !self.field_accessible(node, class_node) {
            self.report(
                field.loc,
                SemanticError::InaccessibleField { field: field.name.clone(), base: base_type },
            );
            return Type::Error;
        }
        var.ty.clone()
    }

    fn field_not_found(&mut self, field: &Identifier, base: Type) -> Type {
        self.report(
            field.loc,
            SemanticError::FieldNotFoundInBase { field: field.name.clone(), base },
        );
        Type::Error
    }

    fn call_type(&mut self, node: NodeId, base: Option<NodeId>, field: &Identifier, actuals: &[NodeId]) -> Type {
        let ast = self.ast;
        let base_type = base.map(|b| self.get_type(b));
        let arg_types: Vec<Type> = actuals.iter().map(|&a| self.get_type(a)).collect();
        if base_type.as_ref().is_some_and(Type::is_error) || arg_types.iter().any(Type::is_error) {
            return Type::Error;
        }

        let function = match base_type {
            None => {
                let found = self.find_decl(node, &field.name, LookupMode::Deep);
                match found.filter(|&d| ast.as_function(d).is_some()) {
                    Some(f) => f,
                    None => {
                        self.report(
                            field.loc,
                            SemanticError::IdentifierNotDeclared { name: field.name.clone(), kind: LookingFor::Function },
                        );
                        return Type::Error;
                    }
                }
            }
            Some(Type::Array(_)) if field.name == "length" => {
                if !actuals.is_empty() {
                    self.report(
                        field.loc,
                        SemanticError::NumArgsMismatch { function: field.name.clone(), expected: 0, given: actuals.len() },
                    );
                    return Type::Error;
                }
                return Type::Int;
            }
            Some(Type::Named(id)) => {
                let Some(decl) = self.resolve_named(node, &id) else {
                    self.report(
                        id.loc,
                        SemanticError::IdentifierNotDeclared { name: id.name.clone(), kind: LookingFor::Class },
                    );
                    return Type::Error;
                };
                let member = self.find_decl(decl, &field.name, LookupMode::Shallow);
                match member.filter(|&d| ast.as_function(d).is_some()) {
                    Some(f) => f,
                    None => return self.field_not_found(field, Type::Named(id)),
                }
            }
            Some(other) => return self.field_not_found(field, other),
        };

        let Some(decl) = ast.as_function(function) else {
            return Type::Error;
        };
        if !self.check_actuals(node, field, &decl.formals, actuals, &arg_types) {
            return Type::Error;
        }
        decl.return_type.clone()
    }

    /// 实参个数与类型必须和形参一致；有不一致时返回 `false`
    fn check_actuals(
        &mut self,
        node: NodeId,
        field: &Identifier,
        formals: &[NodeId],
        actuals: &[NodeId],
        arg_types: &[Type],
    ) -> bool {
        let ast = self.ast;
        if formals.len() != actuals.len() {
            self.report(
                field.loc,
                SemanticError::NumArgsMismatch {
                    function: field.name.clone(),
                    expected: formals.len(),
                    given: actuals.len(),
                },
            );
            return false;
        }

        let mut ok = true;
        for (index, ((&formal, &actual), given)) in formals.iter().zip(actuals).zip(arg_types).enumerate() {
            let Some(expected) = ast.as_variable(formal).map(|v| &v.ty) else {
                continue;
            };
            if !self.compatible(given, expected, node) {
                self.report(
                    ast.loc(actual),
                    SemanticError::ArgMismatch {
                        function: field.name.clone(),
                        index: index + 1,
                        given: given.clone(),
                        expected: expected.clone(),
                    },
                );
                ok = false;
            }
        }
        ok
    }

    fn new_type(&mut self, node: NodeId, class: &Identifier) -> Type {
        let ast = self.ast;
        let found = self.find_decl(node, &class.name, LookupMode::Deep);
        if found.is_some_and(|d| ast.as_class(d).is_some()) {
            Type::Named(class.clone())
        } else {
            self.report(
                class.loc,
                SemanticError::IdentifierNotDeclared { name: class.name.clone(), kind: LookingFor::Class },
            );
            Type::Error
        }
    }

    fn new_array_type(&mut self, node: NodeId, size: NodeId, elem_type: &Type) -> Type {
        let size_type = self.get_type(size);
        if size_type.is_error() {
            return Type::Error;
        }
        if size_type != Type::Int {
            self.report(self.ast.loc(size), SemanticError::NewArraySizeNotInteger);
            return Type::Error;
        }
        if !self.check_type(elem_type, node) {
            return Type::Error;
        }
        Type::array_of(elem_type.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Ast, Operator};
    use crate::error::SourceLocation;

    fn at(line: usize) -> SourceLocation {
        SourceLocation::new(line, 1)
    }

    fn id(name: &str, line: usize) -> Identifier {
        Identifier::new(name, at(line))
    }

    /// 把表达式放进 `void main() { <decls> <expr>; }`
    fn in_main(ast: &mut Ast, decls: Vec<NodeId>, exprs: Vec<NodeId>) -> NodeId {
        let body = ast.block(at(1), decls, exprs);
        let main = ast.fn_decl(id("main", 1), Type::Void, vec![], Some(body));
        ast.program(vec![main])
    }

    #[test]
    fn test_unary_minus_takes_operand_type() {
        let mut ast = Ast::new();
        let d = ast.double_constant(at(2), 1.5);
        let neg = ast.arithmetic(None, Operator::new("-", at(2)), Some(d));
        in_main(&mut ast, vec![], vec![neg]);

        let mut analyzer = SemanticAnalyzer::new(&ast);
        assert_eq!(analyzer.get_type(neg), Type::Double);
        assert_eq!(analyzer.error_count(), 0);
    }

    #[test]
    fn test_arithmetic_on_strings_rejected() {
        let mut ast = Ast::new();
        let a = ast.string_constant(at(2), "a");
        let b = ast.string_constant(at(2), "b");
        let plus = ast.arithmetic(Some(a), Operator::new("+", at(2)), Some(b));
        in_main(&mut ast, vec![], vec![plus]);

        let mut analyzer = SemanticAnalyzer::new(&ast);
        assert_eq!(analyzer.get_type(plus), Type::Error);
        assert_eq!(analyzer.error_count(), 1);
    }

    #[test]
    fn test_error_operand_suppresses_diagnostic() {
        let mut ast = Ast::new();
        let undefined = ast.field_access(None, id("nope", 2));
        let one = ast.int_constant(at(2), 1);
        let plus = ast.arithmetic(Some(undefined), Operator::new("+", at(2)), Some(one));
        let three = ast.int_constant(at(2), 3);
        let lt = ast.relational(plus, Operator::new("<", at(2)), three);
        in_main(&mut ast, vec![], vec![lt]);

        let mut analyzer = SemanticAnalyzer::new(&ast);
        assert_eq!(analyzer.get_type(lt), Type::Error);
        assert_eq!(analyzer.get_type(plus), Type::Error);
        // 只有未声明变量这一条
        assert_eq!(analyzer.error_count(), 1);
    }

    #[test]
    fn test_equality_and_logical() {
        let mut ast = Ast::new();
        let one = ast.int_constant(at(2), 1);
        let two = ast.int_constant(at(2), 2);
        let eq = ast.equality(one, Operator::new("==", at(2)), two);
        let t = ast.bool_constant(at(2), true);
        let and = ast.logical(Some(eq), Operator::new("&&", at(2)), t);
        let not = ast.logical(None, Operator::new("!", at(2)), and);
        let s = ast.string_constant(at(3), "x");
        let bad_not = ast.logical(None, Operator::new("!", at(3)), s);
        in_main(&mut ast, vec![], vec![not, bad_not]);

        let mut analyzer = SemanticAnalyzer::new(&ast);
        assert_eq!(analyzer.get_type(not), Type::Bool);
        assert_eq!(analyzer.get_type(bad_not), Type::Error);
        assert!(matches!(
            analyzer.diagnostics().as_slice(),
            [d] if matches!(d.error, SemanticError::IncompatibleOperand { .. })
        ));
    }

    #[test]
    fn test_new_array_size_must_be_int() {
        let mut ast = Ast::new();
        let size = ast.bool_constant(at(2), true);
        let arr = ast.new_array(at(2), size, Type::Int);
        in_main(&mut ast, vec![], vec![arr]);

        let mut analyzer = SemanticAnalyzer::new(&ast);
        assert_eq!(analyzer.get_type(arr), Type::Error);
        assert_eq!(
            analyzer.diagnostics().as_slice()[0].error,
            SemanticError::NewArraySizeNotInteger
        );
    }

    #[test]
    fn test_read_builtins() {
        let mut ast = Ast::new();
        let int = ast.read_integer(at(2));
        let line = ast.read_line(at(3));
        in_main(&mut ast, vec![], vec![int, line]);

        let mut analyzer = SemanticAnalyzer::new(&ast);
        assert_eq!(analyzer.get_type(int), Type::Int);
        assert_eq!(analyzer.get_type(line), Type::String);
    }

    #[test]
    fn test_repeated_get_type_is_memoized() {
        let mut ast = Ast::new();
        let this = ast.this(at(2));
        in_main(&mut ast, vec![], vec![this]);

        let mut analyzer = SemanticAnalyzer::new(&ast);
        assert_eq!(analyzer.get_type(this), Type::Error);
        assert_eq!(analyzer.get_type(this), Type::Error);
        assert_eq!(analyzer.error_count(), 1);
        assert_eq!(analyzer.type_of(this), Some(&Type::Error));
    }
}
