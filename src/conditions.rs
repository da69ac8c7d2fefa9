// CLCore Conditions - Error Taxonomy
//
// Every failure raised by the reader, the lambda-list compiler and the binder.

use crate::types::Value;
use std::fmt;
use thiserror::Error;

pub type LispResult<T> = Result<T, LispError>;

/// Coarse classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    EndOfFile,
    Syntax,
    Lookup,
    Type,
    Program,
    Stream,
}

/// Location in a character stream. `line` is zero based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, offset {}", self.line + 1, self.offset)
    }
}

#[derive(Debug, Error)]
pub enum LispError {
    #[error("end of file")]
    EndOfFile,

    #[error("unmatched right parenthesis at {position}")]
    UnmatchedParen { position: Position },

    #[error("nothing appears before . in list at {position}")]
    NothingBeforeDot { position: Position },

    #[error("nothing appears after . in list at {position}")]
    NothingAfterDot { position: Position },

    #[error("more than one object follows . in list at {position}")]
    ExtraObjectAfterDot { position: Position },

    #[error("dotted list in vector literal at {position}")]
    DottedVector { position: Position },

    #[error("unsupported '#' macro character '{character}' at {position}")]
    UnknownDispatch { character: char, position: Position },

    #[error("read-time evaluation is disabled")]
    ReadEvalDisabled,

    #[error("read-time evaluation has no evaluator")]
    ReadEvalUnavailable,

    #[error("{parameter} may not be used as a variable in a lambda list")]
    InvalidParameter { parameter: String },

    #[error("malformed lambda list: {message}")]
    MalformedLambdaList { message: String },

    #[error("package \"{package}\" not found")]
    PackageNotFound { package: String },

    #[error("symbol \"{symbol}\" not found in package {package}")]
    SymbolNotFound { symbol: String, package: String },

    #[error("symbol \"{symbol}\" is not external in package {package}")]
    SymbolNotExternal { symbol: String, package: String },

    #[error("unbound variable {name}")]
    UnboundVariable { name: String },

    #[error("undefined function {name}")]
    UndefinedFunction { name: String },

    #[error("{}", type_error_message(.rendered, .expected))]
    TypeError {
        datum: Value,
        rendered: String,
        expected: String,
    },

    #[error("wrong number of arguments for {function}: {got}")]
    WrongNumberOfArguments { function: String, got: usize },

    #[error("odd number of keyword arguments")]
    OddKeywordArguments,

    #[error("unrecognized keyword argument {rendered}")]
    UnrecognizedKeyword { keyword: Value, rendered: String },

    #[error("cannot assign to constant {name}")]
    ConstantAssignment { name: String },

    #[error("malformed form: {message}")]
    MalformedForm { message: String },

    #[error("stream error: {0}")]
    Stream(#[from] std::io::Error),
}

impl LispError {
    pub fn kind(&self) -> ConditionKind {
        use LispError::*;
        match self {
            EndOfFile => ConditionKind::EndOfFile,
            UnmatchedParen { .. }
            | NothingBeforeDot { .. }
            | NothingAfterDot { .. }
            | ExtraObjectAfterDot { .. }
            | DottedVector { .. }
            | UnknownDispatch { .. }
            | InvalidParameter { .. }
            | MalformedLambdaList { .. }
            | MalformedForm { .. } => ConditionKind::Syntax,
            PackageNotFound { .. }
            | SymbolNotFound { .. }
            | SymbolNotExternal { .. }
            | UnboundVariable { .. }
            | UndefinedFunction { .. } => ConditionKind::Lookup,
            TypeError { .. } => ConditionKind::Type,
            ReadEvalDisabled
            | ReadEvalUnavailable
            | WrongNumberOfArguments { .. }
            | OddKeywordArguments
            | UnrecognizedKeyword { .. }
            | ConstantAssignment { .. } => ConditionKind::Program,
            Stream(_) => ConditionKind::Stream,
        }
    }

    pub fn type_error(datum: Value, rendered: String, expected: &str) -> Self {
        LispError::TypeError {
            datum,
            rendered,
            expected: expected.to_string(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        LispError::MalformedForm {
            message: message.into(),
        }
    }
}

/// "wrong type: FOO is not an integer"
fn type_error_message(rendered: &str, expected: &str) -> String {
    let article = match expected.chars().next() {
        Some(c) if "aeiouAEIOU".contains(c) => "an",
        _ => "a",
    };
    format!("wrong type: {} is not {} {}", rendered, article, expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_error_article() {
        let e = LispError::type_error(Value::T, "T".into(), "integer");
        assert_eq!(e.to_string(), "wrong type: T is not an integer");
        let e = LispError::type_error(Value::Nil, "NIL".into(), "cons");
        assert_eq!(e.to_string(), "wrong type: NIL is not a cons");
        assert_eq!(e.kind(), ConditionKind::Type);
    }

    #[test]
    fn test_position_display() {
        let e = LispError::UnmatchedParen {
            position: Position { offset: 4, line: 0 },
        };
        assert_eq!(e.to_string(), "unmatched right parenthesis at line 1, offset 4");
        assert_eq!(e.kind(), ConditionKind::Syntax);
    }

    #[test]
    fn test_program_errors() {
        assert_eq!(LispError::OddKeywordArguments.kind(), ConditionKind::Program);
        let e = LispError::WrongNumberOfArguments {
            function: "FOO".into(),
            got: 3,
        };
        assert_eq!(e.kind(), ConditionKind::Program);
        assert!(e.to_string().contains("FOO"));
    }
}
