use std::fmt;

use crate::ast::Identifier;

/// Decaf 类型
///
/// 基本类型是无数据的单元变体，天然共享且不可变；`Named` 按名字引用类或接口，
/// 在使用处才解析；`Array` 拥有其元素类型。
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Double,
    Bool,
    String,
    Void,
    Null,
    Error,
    Named(Identifier),
    Array(Box<Type>),
}

impl Type {
    pub const INT: Type = Type::Int;
    pub const DOUBLE: Type = Type::Double;
    pub const BOOL: Type = Type::Bool;
    pub const STRING: Type = Type::String;
    pub const VOID: Type = Type::Void;
    pub const NULL: Type = Type::Null;
    pub const ERROR: Type = Type::Error;

    pub fn named(id: Identifier) -> Self {
        Type::Named(id)
    }

    pub fn array_of(elem: Type) -> Self {
        Type::Array(Box::new(elem))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Type::Int | Type::Double | Type::Bool | Type::String | Type::Void | Type::Null | Type::Error
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Double)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Type::Null)
    }

    /// 类、接口或数组类型可以持有 null
    pub fn is_reference_type(&self) -> bool {
        matches!(self, Type::Named(_) | Type::Array(_))
    }

    pub fn is_printable(&self) -> bool {
        matches!(self, Type::Int | Type::Bool | Type::String)
    }

    pub fn named_id(&self) -> Option<&Identifier> {
        match self {
            Type::Named(id) => Some(id),
            _ => None,
        }
    }

    pub fn elem_type(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// 结构等价：只比较名字，不解析声明。
    /// 需要按声明身份比较时使用 `SemanticAnalyzer::equivalent`。
    pub fn is_equivalent_to(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Named(a), Type::Named(b)) => a.name == b.name,
            (Type::Array(a), Type::Array(b)) => a.is_equivalent_to(b),
            (Type::Named(_), _) | (Type::Array(_), _) => false,
            _ => self == other,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Double => write!(f, "double"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "string"),
            Type::Void => write!(f, "void"),
            Type::Null => write!(f, "null"),
            Type::Error => write!(f, "error"),
            Type::Named(id) => write!(f, "{}", id.name),
            Type::Array(inner) => write!(f, "{}[]", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceLocation;

    const PRIMITIVES: [Type; 7] = [
        Type::INT,
        Type::DOUBLE,
        Type::BOOL,
        Type::STRING,
        Type::VOID,
        Type::NULL,
        Type::ERROR,
    ];

    #[test]
    fn test_primitive_equivalence() {
        for (i, a) in PRIMITIVES.iter().enumerate() {
            for (j, b) in PRIMITIVES.iter().enumerate() {
                assert_eq!(a.is_equivalent_to(b), i == j, "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_named_equivalence_ignores_location() {
        let a = Type::named(Identifier::new("Shape", SourceLocation::new(1, 1)));
        let b = Type::named(Identifier::new("Shape", SourceLocation::new(7, 3)));
        let c = Type::named(Identifier::new("shape", SourceLocation::new(7, 3)));
        assert!(a.is_equivalent_to(&b));
        assert!(!a.is_equivalent_to(&c));
        assert!(!a.is_equivalent_to(&Type::Null));
    }

    #[test]
    fn test_array_display_and_equivalence() {
        let ints = Type::array_of(Type::array_of(Type::Int));
        assert_eq!(ints.to_string(), "int[][]");
        assert!(ints.is_equivalent_to(&Type::array_of(Type::array_of(Type::Int))));
        assert!(!ints.is_equivalent_to(&Type::array_of(Type::Int)));
        assert_eq!(ints.elem_type(), Some(&Type::array_of(Type::Int)));
    }

    #[test]
    fn test_primitive_and_named_predicates() {
        assert!(PRIMITIVES.iter().all(Type::is_primitive));
        assert!(PRIMITIVES.iter().all(|t| t.named_id().is_none()));

        let shape = Type::named(Identifier::new("Shape", SourceLocation::new(1, 1)));
        assert!(!shape.is_primitive());
        assert!(shape.is_reference_type());
        assert_eq!(shape.named_id().map(|id| id.name.as_str()), Some("Shape"));
        assert!(!Type::array_of(Type::Int).is_primitive());
        assert_eq!(Type::array_of(shape.clone()).named_id(), None);
    }
}
