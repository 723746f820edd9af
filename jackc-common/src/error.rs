//! Error handling for the Jack compiler
//!
//! This module defines the error type shared by the tokenizer and the
//! syntax-directed compiler. Grammar violations are fatal: an invalid
//! program produces no partial output and there is no recovery.

use thiserror::Error;

/// Main compiler error type covering lexing and compilation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilerError {
    #[error("Lexical error at line {line}: {message}")]
    LexError { line: u32, message: String },

    #[error("Parse error: {message}")]
    ParseError { message: String },

    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("Internal compiler error: {message}")]
    InternalError { message: String },
}

impl CompilerError {
    /// Create a lexer error
    pub fn lex_error(message: String, line: u32) -> Self {
        CompilerError::LexError { line, message }
    }

    /// Create a parse error
    pub fn parse_error(message: String) -> Self {
        CompilerError::ParseError { message }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for CompilerError {
    fn from(err: std::io::Error) -> Self {
        CompilerError::IoError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CompilerError::lex_error("unterminated string".to_string(), 7);
        assert_eq!(err.to_string(), "Lexical error at line 7: unterminated string");

        let err = CompilerError::parse_error("expected '{', found ';'".to_string());
        assert_eq!(err.to_string(), "Parse error: expected '{', found ';'");
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: CompilerError = io.into();
        assert!(matches!(err, CompilerError::IoError { .. }));
    }
}
