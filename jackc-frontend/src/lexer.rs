//! Jack Tokenizer
//!
//! Turns Jack source text into a stream of classified lexemes: keywords,
//! symbols, identifiers, integer constants and string constants. Comments
//! (`//` and `/* */`) and whitespace are skipped. Lexical errors are fatal.

use crate::token::{Keyword, Token};
use jackc_common::CompilerError;

/// Largest integer constant the 16-bit architecture can load directly.
const MAX_INT_CONST: u32 = 32767;

const SYMBOLS: &[char] = &[
    '{', '}', '(', ')', '[', ']', '.', ',', ';', '+', '-', '*', '/', '&', '|', '<', '>', '=', '~',
];

/// Jack tokenizer
pub struct Tokenizer {
    input: Vec<char>,
    position: usize,
    line: u32,
}

impl Tokenizer {
    /// Create a new tokenizer over source text
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
        }
    }

    /// Get current character
    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek ahead n characters
    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    /// Advance to next character
    fn advance(&mut self) -> Option<char> {
        let ch = self.current_char();
        if let Some(c) = ch {
            self.position += 1;
            if c == '\n' {
                self.line += 1;
            }
        }
        ch
    }

    /// Skip whitespace and comments; errors on an unterminated block comment.
    fn skip_trivia(&mut self) -> Result<(), CompilerError> {
        loop {
            match self.current_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_char(1) == Some('/') => {
                    while let Some(c) = self.current_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_char(1) == Some('*') => {
                    let start = self.line;
                    self.advance();
                    self.advance();
                    loop {
                        match self.current_char() {
                            Some('*') if self.peek_char(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                            None => {
                                return Err(CompilerError::lex_error(
                                    "unterminated block comment".to_string(),
                                    start,
                                ));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_int(&mut self) -> Result<Token, CompilerError> {
        let start = self.line;
        let mut value: u32 = 0;
        while let Some(c) = self.current_char() {
            if let Some(d) = c.to_digit(10) {
                value = value * 10 + d;
                if value > MAX_INT_CONST {
                    return Err(CompilerError::lex_error(
                        format!("integer constant exceeds {MAX_INT_CONST}"),
                        start,
                    ));
                }
                self.advance();
            } else {
                break;
            }
        }
        Ok(Token::IntConst(value as u16))
    }

    fn read_string(&mut self) -> Result<Token, CompilerError> {
        let start = self.line;
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.current_char() {
                Some('"') => {
                    self.advance();
                    return Ok(Token::StringConst(value));
                }
                Some('\n') | None => {
                    return Err(CompilerError::lex_error(
                        "unterminated string constant".to_string(),
                        start,
                    ));
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(c) = self.current_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match Keyword::from_str(&word) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Identifier(word),
        }
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, CompilerError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let Some(c) = self.current_char() else {
                break;
            };
            if SYMBOLS.contains(&c) {
                self.advance();
                tokens.push(Token::Symbol(c));
            } else if c.is_ascii_digit() {
                tokens.push(self.read_int()?);
            } else if c == '"' {
                tokens.push(self.read_string()?);
            } else if c.is_ascii_alphabetic() || c == '_' {
                tokens.push(self.read_word());
            } else {
                return Err(CompilerError::lex_error(
                    format!("unexpected character '{c}'"),
                    self.line,
                ));
            }
        }
        log::debug!("tokenized {} lexemes", tokens.len());
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        Tokenizer::new(source).tokenize().unwrap()
    }

    #[test]
    fn test_classifies_all_five_lexeme_kinds() {
        let toks = tokens("let x = \"hi\" ; 42");
        assert_eq!(
            toks,
            vec![
                Token::Keyword(Keyword::Let),
                Token::Identifier("x".to_string()),
                Token::Symbol('='),
                Token::StringConst("hi".to_string()),
                Token::Symbol(';'),
                Token::IntConst(42),
            ]
        );
    }

    #[test]
    fn test_skips_comments() {
        let toks = tokens("// line comment\nclass /* block\ncomment */ Main {}");
        assert_eq!(
            toks,
            vec![
                Token::Keyword(Keyword::Class),
                Token::Identifier("Main".to_string()),
                Token::Symbol('{'),
                Token::Symbol('}'),
            ]
        );
    }

    #[test]
    fn test_int_constant_bound() {
        assert_eq!(tokens("32767"), vec![Token::IntConst(32767)]);
        let err = Tokenizer::new("32768").tokenize().unwrap_err();
        assert!(matches!(err, CompilerError::LexError { line: 1, .. }));
    }

    #[test]
    fn test_unterminated_string_is_fatal() {
        let err = Tokenizer::new("\"no closing quote").tokenize().unwrap_err();
        assert!(matches!(err, CompilerError::LexError { .. }));
    }

    #[test]
    fn test_identifier_with_underscore_and_digits() {
        assert_eq!(
            tokens("x_1 y2"),
            vec![
                Token::Identifier("x_1".to_string()),
                Token::Identifier("y2".to_string()),
            ]
        );
    }
}
