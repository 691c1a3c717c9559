use thiserror::Error;
use std::fmt;

use crate::types::Type;

/// 源代码中的位置区间
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub last_line: usize,
    pub last_column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line,
            column,
            last_line: line,
            last_column: column,
        }
    }

    pub fn span(line: usize, column: usize, last_line: usize, last_column: usize) -> Self {
        Self { line, column, last_line, last_column }
    }

    /// 合并两个位置，得到覆盖两者的区间
    pub fn join(&self, other: &SourceLocation) -> SourceLocation {
        let (first, last) = if (self.line, self.column) <= (other.line, other.column) {
            (self, other)
        } else {
            (other, self)
        };
        SourceLocation {
            line: first.line,
            column: first.column,
            last_line: last.last_line.max(first.last_line),
            last_column: if last.last_line >= first.last_line {
                last.last_column
            } else {
                first.last_column
            },
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// 未声明标识符时正在查找的声明种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookingFor {
    Variable,
    Function,
    Class,
    Interface,
    Type,
}

impl fmt::Display for LookingFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LookingFor::Variable => "variable",
            LookingFor::Function => "function",
            LookingFor::Class => "class",
            LookingFor::Interface => "interface",
            LookingFor::Type => "type",
        };
        write!(f, "{}", s)
    }
}

/// 语义错误种类
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("No declaration found for {kind} '{name}'")]
    IdentifierNotDeclared { name: String, kind: LookingFor },

    #[error("Incompatible operands: {left} {op} {right}")]
    IncompatibleOperands { op: String, left: Type, right: Type },

    #[error("Incompatible operand: {op} {operand}")]
    IncompatibleOperand { op: String, operand: Type },

    #[error("[] can only be applied to arrays")]
    BracketsOnNonArray,

    #[error("Array subscript must be an integer")]
    SubscriptNotInteger,

    #[error("Size for NewArray must be an integer")]
    NewArraySizeNotInteger,

    #[error("{base} has no such field '{field}'")]
    FieldNotFoundInBase { field: String, base: Type },

    #[error("{base} field '{field}' only accessible within class scope")]
    InaccessibleField { field: String, base: Type },

    #[error("Function '{function}' expects {expected} arguments but {given} given")]
    NumArgsMismatch { function: String, expected: usize, given: usize },

    #[error("Incompatible argument {index} of '{function}': {given} given, {expected} expected")]
    ArgMismatch { function: String, index: usize, given: Type, expected: Type },

    #[error("'this' is only valid within class scope")]
    ThisOutsideClassScope,

    #[error("Declaration of '{name}' here conflicts with declaration on line {}", .previous.line)]
    DeclConflict { name: String, previous: SourceLocation },

    #[error("Class '{class}' is part of an inheritance cycle")]
    CyclicInheritance { class: String },

    #[error("Method '{method}' must match inherited type signature")]
    OverrideMismatch { method: String },

    #[error("Test expression must have boolean type")]
    TestNotBoolean,

    #[error("break is only allowed inside a loop")]
    BreakOutsideLoop,

    #[error("Incompatible return: {given} given, {expected} expected")]
    ReturnMismatch { given: Type, expected: Type },

    #[error("Incompatible argument {index}: {given} given, int/bool/string expected")]
    PrintArgMismatch { index: usize, given: Type },
}

/// 带位置的一条诊断
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub loc: SourceLocation,
    pub error: SemanticError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*** Error line {}.\n*** {}", self.loc.line, self.error)
    }
}

/// 诊断收集器：有序记录所有语义错误，并维护错误计数
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
    count: usize,
    limit: Option<usize>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 超过上限后只计数，不再保存记录
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self { records: Vec::new(), count: 0, limit }
    }

    pub fn report(&mut self, loc: SourceLocation, error: SemanticError) {
        self.count += 1;
        if self.limit.is_some_and(|limit| self.records.len() >= limit) {
            return;
        }
        self.records.push(Diagnostic { loc, error });
    }

    /// 已报告的错误总数（包括超出上限未保存的）
    pub fn error_count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.records
    }
}

/// 面向驱动程序的错误
#[derive(Error, Debug, Clone)]
pub enum DecafError {
    #[error("Semantic analysis failed with {count} error(s):\n{report}")]
    Rejected { count: usize, report: String },

    #[error("Node {0} is not a program")]
    NotAProgram(usize),
}

pub type DecafResult<T> = Result<T, DecafError>;

pub fn rejected(diagnostics: &Diagnostics) -> DecafError {
    let report = diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    DecafError::Rejected {
        count: diagnostics.error_count(),
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_locations() {
        let a = SourceLocation::span(1, 5, 1, 9);
        let b = SourceLocation::span(3, 2, 3, 7);
        let joined = a.join(&b);
        assert_eq!(joined, SourceLocation::span(1, 5, 3, 7));
        assert_eq!(b.join(&a), joined);
    }

    #[test]
    fn test_diagnostics_limit_keeps_counting() {
        let mut diags = Diagnostics::with_limit(Some(1));
        diags.report(SourceLocation::new(1, 1), SemanticError::BracketsOnNonArray);
        diags.report(SourceLocation::new(2, 1), SemanticError::SubscriptNotInteger);
        assert_eq!(diags.error_count(), 2);
        assert_eq!(diags.as_slice().len(), 1);

        let records = diags.into_vec();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error, SemanticError::BracketsOnNonArray);
        assert_eq!(records[0].loc.line, 1);
    }

    #[test]
    fn test_error_messages() {
        let err = SemanticError::NumArgsMismatch {
            function: "f".to_string(),
            expected: 1,
            given: 2,
        };
        assert_eq!(err.to_string(), "Function 'f' expects 1 arguments but 2 given");

        let err = SemanticError::IncompatibleOperands {
            op: "=".to_string(),
            left: Type::Int,
            right: Type::String,
        };
        assert_eq!(err.to_string(), "Incompatible operands: int = string");
    }

    #[test]
    fn test_rejected_report() {
        let mut diags = Diagnostics::new();
        diags.report(SourceLocation::new(4, 2), SemanticError::ThisOutsideClassScope);
        match rejected(&diags) {
            DecafError::Rejected { count, report } => {
                assert_eq!(count, 1);
                assert!(report.contains("line 4"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
