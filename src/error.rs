// ABOUTME: Error types for every subsystem, namespaced with the stable codes from the error taxonomy

use crate::token::{Position, TokenKind};
use thiserror::Error;

/// Lexical errors (spec §4.1). Code namespace `LEX0..`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at {position}")]
    UnexpectedChar { ch: char, position: Position },

    #[error("unterminated numeric literal at {position}")]
    UnterminatedNumber { position: Position },

    #[error("identifier exceeds maximum length of {max} at {position}")]
    IdentifierTooLong { position: Position, max: usize },

    #[error("lexeme exceeds maximum length of {max} at {position}")]
    LexemeTooLong { position: Position, max: usize },

    #[error("character '{ch}' is outside the allowed character set at {position}")]
    CharOutsideAllowedSet { ch: char, position: Position },
}

impl LexError {
    pub fn code(&self) -> &'static str {
        match self {
            LexError::UnexpectedChar { .. } => "LEX001",
            LexError::UnterminatedNumber { .. } => "LEX002",
            LexError::IdentifierTooLong { .. } => "LEX003",
            LexError::LexemeTooLong { .. } => "LEX004",
            LexError::CharOutsideAllowedSet { .. } => "LEX005",
        }
    }

    pub fn position(&self) -> Position {
        match self {
            LexError::UnexpectedChar { position, .. }
            | LexError::UnterminatedNumber { position }
            | LexError::IdentifierTooLong { position, .. }
            | LexError::LexemeTooLong { position, .. }
            | LexError::CharOutsideAllowedSet { position, .. } => *position,
        }
    }
}

/// Syntactic errors (spec §4.3). Code namespace `PARSE0..`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token {kind} at {position}")]
    UnexpectedToken { kind: TokenKind, position: Position },

    #[error("unexpected end of input at {position}")]
    UnexpectedEndOfInput { position: Position },

    #[error("parser stack overflow at {position}")]
    StackOverflow { position: Position },

    #[error("exceeded maximum parsing steps at {position}")]
    TooManySteps { position: Position },

    #[error("exceeded maximum error-recovery attempts at {position}")]
    RecoveryLimitExceeded { position: Position },
}

impl ParseError {
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::UnexpectedToken { .. } => "PARSE001",
            ParseError::UnexpectedEndOfInput { .. } => "PARSE002",
            ParseError::StackOverflow { .. } => "PARSE003",
            ParseError::TooManySteps { .. } => "PARSE004",
            ParseError::RecoveryLimitExceeded { .. } => "PARSE005",
        }
    }

    pub fn position(&self) -> Position {
        match self {
            ParseError::UnexpectedToken { position, .. }
            | ParseError::UnexpectedEndOfInput { position }
            | ParseError::StackOverflow { position }
            | ParseError::TooManySteps { position }
            | ParseError::RecoveryLimitExceeded { position } => *position,
        }
    }
}

/// Defensive, should-never-happen AST consistency errors. Code namespace `AST0..`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AstError {
    #[error("unexpected node encountered during {context}: {description}")]
    UnexpectedNode {
        context: String,
        description: String,
    },
}

impl AstError {
    pub fn code(&self) -> &'static str {
        match self {
            AstError::UnexpectedNode { .. } => "AST001",
        }
    }
}

/// Semantic, resource, and security errors raised during evaluation (spec §4.6).
/// Code namespace `EVAL0..`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("{name}: expected {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("type mismatch for '{op}': {kinds}")]
    TypeMismatch { op: String, kinds: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("{function}: value {value} is outside the function's domain")]
    DomainError { function: String, value: f64 },

    #[error("numeric overflow")]
    Overflow,

    #[error("recursion depth exceeded")]
    DepthExceeded,

    #[error("AST node count exceeded")]
    NodeLimitExceeded,

    #[error("security violation: {reason}")]
    SecurityViolation { reason: String },

    #[error("evaluation timed out")]
    Timeout,

    #[error("evaluation cancelled")]
    Cancelled,
}

impl EvalError {
    pub fn code(&self) -> &'static str {
        match self {
            EvalError::UndefinedVariable { .. } => "EVAL001",
            EvalError::UnknownFunction { .. } => "EVAL002",
            EvalError::ArityMismatch { .. } => "EVAL003",
            EvalError::TypeMismatch { .. } => "EVAL004",
            EvalError::DivisionByZero => "EVAL005",
            EvalError::DomainError { .. } => "EVAL006",
            EvalError::Overflow => "EVAL007",
            EvalError::DepthExceeded => "EVAL008",
            EvalError::NodeLimitExceeded => "EVAL009",
            EvalError::SecurityViolation { .. } => "EVAL010",
            EvalError::Timeout => "EVAL011",
            EvalError::Cancelled => "EVAL012",
        }
    }
}

/// Validation errors for a `FormulaSet` itself. Code namespace `FORMULA0..`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("duplicate step order: {order}")]
    DuplicateOrder { order: i64 },

    #[error("step orders are not densely numbered 1..N: expected {expected}, found {found}")]
    NonDenseOrder { expected: i64, found: i64 },

    #[error("formula set has no steps")]
    EmptyFormulaSet,
}

impl FormulaError {
    pub fn code(&self) -> &'static str {
        match self {
            FormulaError::DuplicateOrder { .. } => "FORMULA001",
            FormulaError::NonDenseOrder { .. } => "FORMULA002",
            FormulaError::EmptyFormulaSet => "FORMULA003",
        }
    }
}

/// Top-level error surfaced across the orchestrator boundary. Wraps every
/// subsystem error and an `Internal` catch-all so that no host fault crosses
/// that boundary un-typed (spec §7).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Ast(#[from] AstError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Formula(#[from] FormulaError),
    #[error("internal error ({kind}): {message}")]
    Internal { kind: String, message: String },
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Lex(e) => e.code(),
            EngineError::Parse(e) => e.code(),
            EngineError::Ast(e) => e.code(),
            EngineError::Eval(e) => e.code(),
            EngineError::Formula(e) => e.code(),
            EngineError::Internal { .. } => "INTERNAL000",
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            EngineError::Lex(e) => Some(e.position()),
            EngineError::Parse(e) => Some(e.position()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_codes_are_stable() {
        let e = LexError::UnexpectedChar {
            ch: '@',
            position: Position::start(),
        };
        assert_eq!(e.code(), "LEX001");
    }

    #[test]
    fn engine_error_wraps_eval_error_code() {
        let e: EngineError = EvalError::UndefinedVariable {
            name: "x".into(),
        }
        .into();
        assert_eq!(e.code(), "EVAL001");
    }

    #[test]
    fn engine_error_position_is_none_for_eval_errors() {
        let e: EngineError = EvalError::DivisionByZero.into();
        assert_eq!(e.position(), None);
    }
}
