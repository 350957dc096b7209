//! Error types surfaced by the optimizer library.

use crate::utils::Located;

/// Failures of call-site to signature matching.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverloadError {
    /// Several inexact candidates match and none is better than all others.
    #[error("call to `{name}` is ambiguous")]
    AmbiguousCall { name: String },

    /// Growing the inexact candidate list failed.
    #[error("out of memory while resolving call to `{name}`")]
    OutOfMemory { name: String },
}

/// Namespace a symbol table entry was rejected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Type,
    Function,
    Interface,
}
impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Variable => "variable",
            Self::Type => "type",
            Self::Function => "function",
            Self::Interface => "interface block",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    #[error("{kind} `{name}` conflicts with a declaration in the same scope")]
    AlreadyDeclared { name: String, kind: SymbolKind },
}

/// Reasons the IR reader rejects its input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadErrorKind {
    #[error("unexpected character `{0}`")]
    InvalidCharacter(char),
    #[error("unterminated list")]
    UnclosedList,
    #[error("unexpected `)`")]
    UnbalancedClose,
    #[error("expected {0}")]
    Expected(&'static str),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),
    #[error("unknown qualifier `{0}`")]
    UnknownQualifier(String),
    #[error("undeclared identifier `{0}`")]
    UndeclaredIdentifier(String),
    #[error("no function `{0}` matches the call arguments")]
    NoMatchingSignature(String),
    #[error("argument {index} of `{function}` is written back but is not an l-value")]
    NotAnLvalue { function: String, index: usize },
    #[error("`{op}` takes {expected} operands, got {found}")]
    OperandCount {
        op: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("malformed constant: {0}")]
    BadConstant(String),
    #[error("invalid swizzle or write mask `{0}`")]
    BadSwizzle(String),
    #[error(transparent)]
    Symbol(#[from] SymbolError),
    #[error(transparent)]
    Overload(#[from] OverloadError),
}
impl ReadErrorKind {
    #[inline(always)]
    pub const fn at(self, line: usize, col: usize) -> ReadError {
        Located { t: self, line, col }
    }
}

pub type ReadError = Located<ReadErrorKind>;

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line + 1, self.col + 1, self.t)
    }
}
impl std::error::Error for ReadError {}
