//! Decaf 抽象语法树
//!
//! 所有节点存放在 [`Ast`] 竞技场中，以 [`NodeId`] 互相引用。
//! 父节点链接在节点被挂到其拥有者上时设置一次，之后不再改变。

use std::fmt;

use crate::error::SourceLocation;
use crate::types::Type;

/// 竞技场中节点的句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 标识符：名字加位置，相等性只看名字（区分大小写）
#[derive(Debug, Clone)]
pub struct Identifier {
    pub name: String,
    pub loc: SourceLocation,
}

impl Identifier {
    pub fn new(name: impl Into<String>, loc: SourceLocation) -> Self {
        Self { name: name.into(), loc }
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Identifier {}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// 运算符叶子节点
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub token: String,
    pub loc: SourceLocation,
}

impl Operator {
    pub fn new(token: impl Into<String>, loc: SourceLocation) -> Self {
        Self { token: token.into(), loc }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub loc: SourceLocation,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Program(Program),
    Decl(Decl),
    Stmt(Stmt),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct Program {
    pub decls: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Variable(VariableDecl),
    Function(FunctionDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
}

#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: Identifier,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Identifier,
    pub return_type: Type,
    /// 形参，均为 `Decl::Variable` 节点
    pub formals: Vec<NodeId>,
    /// 接口中的原型没有函数体
    pub body: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Identifier,
    pub extends: Option<Identifier>,
    pub implements: Vec<Identifier>,
    pub members: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: Identifier,
    pub members: Vec<NodeId>,
}

impl Decl {
    pub fn name(&self) -> &Identifier {
        match self {
            Decl::Variable(v) => &v.name,
            Decl::Function(f) => &f.name,
            Decl::Class(c) => &c.name,
            Decl::Interface(i) => &i.name,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block { decls: Vec<NodeId>, stmts: Vec<NodeId> },
    If { test: NodeId, then_branch: NodeId, else_branch: Option<NodeId> },
    While { test: NodeId, body: NodeId },
    /// `init` 与 `step` 可以是 `Expr::Empty`
    For { init: NodeId, test: NodeId, step: NodeId, body: NodeId },
    /// 无返回值时 `expr` 为 `Expr::Empty`
    Return { expr: NodeId },
    Break,
    Print { args: Vec<NodeId> },
}

/// 二元/一元复合表达式，缺省的一侧为 `None`
#[derive(Debug, Clone)]
pub struct CompoundExpr {
    pub left: Option<NodeId>,
    pub op: Operator,
    pub right: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    IntConstant(i64),
    DoubleConstant(f64),
    BoolConstant(bool),
    StringConstant(String),
    NullConstant,
    Empty,
    Arithmetic(CompoundExpr),
    Relational(CompoundExpr),
    Equality(CompoundExpr),
    Logical(CompoundExpr),
    Assign(CompoundExpr),
    This,
    ArrayAccess { base: NodeId, subscript: NodeId },
    FieldAccess { base: Option<NodeId>, field: Identifier },
    Call { base: Option<NodeId>, field: Identifier, actuals: Vec<NodeId> },
    New { class: Identifier },
    NewArray { size: NodeId, elem_type: Type },
    ReadInteger,
    ReadLine,
}

impl NodeKind {
    /// 直接子节点，按源代码顺序
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Program(p) => p.decls.clone(),
            NodeKind::Decl(decl) => match decl {
                Decl::Variable(_) => Vec::new(),
                Decl::Function(f) => f.formals.iter().copied().chain(f.body).collect(),
                Decl::Class(c) => c.members.clone(),
                Decl::Interface(i) => i.members.clone(),
            },
            NodeKind::Stmt(stmt) => match stmt {
                Stmt::Block { decls, stmts } => decls.iter().chain(stmts).copied().collect(),
                Stmt::If { test, then_branch, else_branch } => {
                    [*test, *then_branch].into_iter().chain(*else_branch).collect()
                }
                Stmt::While { test, body } => vec![*test, *body],
                Stmt::For { init, test, step, body } => vec![*init, *test, *step, *body],
                Stmt::Return { expr } => vec![*expr],
                Stmt::Break => Vec::new(),
                Stmt::Print { args } => args.clone(),
            },
            NodeKind::Expr(expr) => match expr {
                Expr::Arithmetic(c)
                | Expr::Relational(c)
                | Expr::Equality(c)
                | Expr::Logical(c)
                | Expr::Assign(c) => c.left.into_iter().chain(c.right).collect(),
                Expr::ArrayAccess { base, subscript } => vec![*base, *subscript],
                Expr::FieldAccess { base, .. } => base.iter().copied().collect(),
                Expr::Call { base, actuals, .. } => {
                    base.iter().chain(actuals).copied().collect()
                }
                Expr::NewArray { size, .. } => vec![*size],
                Expr::IntConstant(_)
                | Expr::DoubleConstant(_)
                | Expr::BoolConstant(_)
                | Expr::StringConstant(_)
                | Expr::NullConstant
                | Expr::Empty
                | Expr::This
                | Expr::New { .. }
                | Expr::ReadInteger
                | Expr::ReadLine => Vec::new(),
            },
        }
    }
}

/// 节点竞技场，一次编译内有效
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn loc(&self, id: NodeId) -> SourceLocation {
        self.nodes[id.0].loc
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn decl(&self, id: NodeId) -> Option<&Decl> {
        match self.kind(id) {
            NodeKind::Decl(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn stmt(&self, id: NodeId) -> Option<&Stmt> {
        match self.kind(id) {
            NodeKind::Stmt(stmt) => Some(stmt),
            _ => None,
        }
    }

    pub fn expr(&self, id: NodeId) -> Option<&Expr> {
        match self.kind(id) {
            NodeKind::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn as_class(&self, id: NodeId) -> Option<&ClassDecl> {
        match self.decl(id) {
            Some(Decl::Class(c)) => Some(c),
            _ => None,
        }
    }

    pub fn as_function(&self, id: NodeId) -> Option<&FunctionDecl> {
        match self.decl(id) {
            Some(Decl::Function(f)) => Some(f),
            _ => None,
        }
    }

    pub fn as_variable(&self, id: NodeId) -> Option<&VariableDecl> {
        match self.decl(id) {
            Some(Decl::Variable(v)) => Some(v),
            _ => None,
        }
    }

    /// 严格祖先，由近及远
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// 分配节点，并把它设为所有子节点的父节点
    ///
    /// # Panics
    ///
    /// 某个子节点已经挂在别的节点下时 panic。
    pub fn alloc(&mut self, loc: SourceLocation, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        let children = kind.children();
        self.nodes.push(Node { loc, parent: None, kind });
        for child in children {
            self.set_parent(child, id);
        }
        id
    }

    fn set_parent(&mut self, child: NodeId, parent: NodeId) {
        let node = &mut self.nodes[child.0];
        assert!(
            node.parent.is_none(),
            "node {} already attached to {:?}",
            child,
            node.parent
        );
        node.parent = Some(parent);
    }

    // ---- 声明 ----

    pub fn program(&mut self, decls: Vec<NodeId>) -> NodeId {
        let loc = self.span_of(&decls).unwrap_or_default();
        self.alloc(loc, NodeKind::Program(Program { decls }))
    }

    pub fn var_decl(&mut self, name: Identifier, ty: Type) -> NodeId {
        let loc = name.loc;
        self.alloc(loc, NodeKind::Decl(Decl::Variable(VariableDecl { name, ty })))
    }

    pub fn fn_decl(
        &mut self,
        name: Identifier,
        return_type: Type,
        formals: Vec<NodeId>,
        body: Option<NodeId>,
    ) -> NodeId {
        let loc = name.loc;
        self.alloc(
            loc,
            NodeKind::Decl(Decl::Function(FunctionDecl { name, return_type, formals, body })),
        )
    }

    pub fn class_decl(
        &mut self,
        name: Identifier,
        extends: Option<Identifier>,
        implements: Vec<Identifier>,
        members: Vec<NodeId>,
    ) -> NodeId {
        let loc = name.loc;
        self.alloc(
            loc,
            NodeKind::Decl(Decl::Class(ClassDecl { name, extends, implements, members })),
        )
    }

    pub fn interface_decl(&mut self, name: Identifier, members: Vec<NodeId>) -> NodeId {
        let loc = name.loc;
        self.alloc(loc, NodeKind::Decl(Decl::Interface(InterfaceDecl { name, members })))
    }

    // ---- 语句 ----

    pub fn block(&mut self, loc: SourceLocation, decls: Vec<NodeId>, stmts: Vec<NodeId>) -> NodeId {
        self.alloc(loc, NodeKind::Stmt(Stmt::Block { decls, stmts }))
    }

    pub fn if_stmt(&mut self, test: NodeId, then_branch: NodeId, else_branch: Option<NodeId>) -> NodeId {
        let loc = self.loc(test);
        self.alloc(loc, NodeKind::Stmt(Stmt::If { test, then_branch, else_branch }))
    }

    pub fn while_stmt(&mut self, test: NodeId, body: NodeId) -> NodeId {
        let loc = self.loc(test);
        self.alloc(loc, NodeKind::Stmt(Stmt::While { test, body }))
    }

    pub fn for_stmt(&mut self, init: NodeId, test: NodeId, step: NodeId, body: NodeId) -> NodeId {
        let loc = self.loc(test);
        self.alloc(loc, NodeKind::Stmt(Stmt::For { init, test, step, body }))
    }

    pub fn return_stmt(&mut self, loc: SourceLocation, expr: Option<NodeId>) -> NodeId {
        let expr = match expr {
            Some(e) => e,
            None => self.empty_expr(),
        };
        self.alloc(loc, NodeKind::Stmt(Stmt::Return { expr }))
    }

    pub fn break_stmt(&mut self, loc: SourceLocation) -> NodeId {
        self.alloc(loc, NodeKind::Stmt(Stmt::Break))
    }

    pub fn print_stmt(&mut self, loc: SourceLocation, args: Vec<NodeId>) -> NodeId {
        self.alloc(loc, NodeKind::Stmt(Stmt::Print { args }))
    }

    // ---- 表达式 ----

    pub fn int_constant(&mut self, loc: SourceLocation, value: i64) -> NodeId {
        self.alloc(loc, NodeKind::Expr(Expr::IntConstant(value)))
    }

    pub fn double_constant(&mut self, loc: SourceLocation, value: f64) -> NodeId {
        self.alloc(loc, NodeKind::Expr(Expr::DoubleConstant(value)))
    }

    pub fn bool_constant(&mut self, loc: SourceLocation, value: bool) -> NodeId {
        self.alloc(loc, NodeKind::Expr(Expr::BoolConstant(value)))
    }

    pub fn string_constant(&mut self, loc: SourceLocation, value: impl Into<String>) -> NodeId {
        self.alloc(loc, NodeKind::Expr(Expr::StringConstant(value.into())))
    }

    pub fn null_constant(&mut self, loc: SourceLocation) -> NodeId {
        self.alloc(loc, NodeKind::Expr(Expr::NullConstant))
    }

    pub fn empty_expr(&mut self) -> NodeId {
        self.alloc(SourceLocation::default(), NodeKind::Expr(Expr::Empty))
    }

    pub fn arithmetic(&mut self, left: Option<NodeId>, op: Operator, right: Option<NodeId>) -> NodeId {
        let compound = self.compound(left, op, right);
        self.alloc_compound(compound, Expr::Arithmetic)
    }

    pub fn relational(&mut self, left: NodeId, op: Operator, right: NodeId) -> NodeId {
        let compound = self.compound(Some(left), op, Some(right));
        self.alloc_compound(compound, Expr::Relational)
    }

    pub fn equality(&mut self, left: NodeId, op: Operator, right: NodeId) -> NodeId {
        let compound = self.compound(Some(left), op, Some(right));
        self.alloc_compound(compound, Expr::Equality)
    }

    pub fn logical(&mut self, left: Option<NodeId>, op: Operator, right: NodeId) -> NodeId {
        let compound = self.compound(left, op, Some(right));
        self.alloc_compound(compound, Expr::Logical)
    }

    pub fn assign(&mut self, target: NodeId, op: Operator, value: NodeId) -> NodeId {
        let compound = self.compound(Some(target), op, Some(value));
        self.alloc_compound(compound, Expr::Assign)
    }

    pub fn this(&mut self, loc: SourceLocation) -> NodeId {
        self.alloc(loc, NodeKind::Expr(Expr::This))
    }

    pub fn array_access(&mut self, loc: SourceLocation, base: NodeId, subscript: NodeId) -> NodeId {
        self.alloc(loc, NodeKind::Expr(Expr::ArrayAccess { base, subscript }))
    }

    pub fn field_access(&mut self, base: Option<NodeId>, field: Identifier) -> NodeId {
        let loc = match base {
            Some(b) => self.loc(b).join(&field.loc),
            None => field.loc,
        };
        self.alloc(loc, NodeKind::Expr(Expr::FieldAccess { base, field }))
    }

    pub fn call(
        &mut self,
        loc: SourceLocation,
        base: Option<NodeId>,
        field: Identifier,
        actuals: Vec<NodeId>,
    ) -> NodeId {
        self.alloc(loc, NodeKind::Expr(Expr::Call { base, field, actuals }))
    }

    pub fn new_object(&mut self, loc: SourceLocation, class: Identifier) -> NodeId {
        self.alloc(loc, NodeKind::Expr(Expr::New { class }))
    }

    pub fn new_array(&mut self, loc: SourceLocation, size: NodeId, elem_type: Type) -> NodeId {
        self.alloc(loc, NodeKind::Expr(Expr::NewArray { size, elem_type }))
    }

    pub fn read_integer(&mut self, loc: SourceLocation) -> NodeId {
        self.alloc(loc, NodeKind::Expr(Expr::ReadInteger))
    }

    pub fn read_line(&mut self, loc: SourceLocation) -> NodeId {
        self.alloc(loc, NodeKind::Expr(Expr::ReadLine))
    }

    fn compound(&self, left: Option<NodeId>, op: Operator, right: Option<NodeId>) -> (SourceLocation, CompoundExpr) {
        let mut loc = op.loc;
        for side in left.iter().chain(right.iter()) {
            loc = loc.join(&self.loc(*side));
        }
        (loc, CompoundExpr { left, op, right })
    }

    fn alloc_compound(
        &mut self,
        (loc, compound): (SourceLocation, CompoundExpr),
        wrap: fn(CompoundExpr) -> Expr,
    ) -> NodeId {
        self.alloc(loc, NodeKind::Expr(wrap(compound)))
    }

    fn span_of(&self, ids: &[NodeId]) -> Option<SourceLocation> {
        let first = self.loc(*ids.first()?);
        let last = self.loc(*ids.last()?);
        Some(first.join(&last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: usize) -> SourceLocation {
        SourceLocation::new(line, 1)
    }

    #[test]
    fn test_parents_are_attached_on_construction() {
        let mut ast = Ast::new();
        let x = ast.var_decl(Identifier::new("x", at(2)), Type::Int);
        let lhs = ast.field_access(None, Identifier::new("x", at(3)));
        let rhs = ast.int_constant(at(3), 4);
        let assign = ast.assign(lhs, Operator::new("=", at(3)), rhs);
        let body = ast.block(at(2), vec![x], vec![assign]);
        let main = ast.fn_decl(Identifier::new("main", at(1)), Type::Void, vec![], Some(body));
        let program = ast.program(vec![main]);

        assert_eq!(ast.parent(lhs), Some(assign));
        assert_eq!(ast.parent(rhs), Some(assign));
        assert_eq!(ast.parent(assign), Some(body));
        assert_eq!(ast.parent(x), Some(body));
        assert_eq!(ast.parent(body), Some(main));
        assert_eq!(ast.parent(main), Some(program));
        assert_eq!(ast.parent(program), None);
    }

    #[test]
    fn test_bare_return_gets_empty_expr() {
        let mut ast = Ast::new();
        let ret = ast.return_stmt(at(5), None);
        match ast.stmt(ret) {
            Some(Stmt::Return { expr }) => {
                assert!(matches!(ast.expr(*expr), Some(Expr::Empty)));
                assert_eq!(ast.parent(*expr), Some(ret));
            }
            other => panic!("expected return, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_minus_has_no_left_child() {
        let mut ast = Ast::new();
        let seven = ast.int_constant(at(1), 7);
        let neg = ast.arithmetic(None, Operator::new("-", at(1)), Some(seven));
        assert_eq!(ast.kind(neg).children(), vec![seven]);
    }

    #[test]
    #[should_panic(expected = "already attached")]
    fn test_node_cannot_be_attached_twice() {
        let mut ast = Ast::new();
        let shared = ast.int_constant(at(1), 1);
        ast.print_stmt(at(1), vec![shared]);
        ast.print_stmt(at(2), vec![shared]);
    }
}
