//! Jack Compiler Frontend
//!
//! Turns Jack source text into stack-machine (VM) instructions in a single
//! syntax-directed pass: the tokenizer classifies lexemes, the grammar
//! walker populates the symbol table while it recognizes tokens, and VM
//! code is emitted at the earliest point all operands are known. There is
//! no separate AST.

pub mod compiler;
pub mod lexer;
pub mod symbols;
pub mod token;
pub mod vm_writer;

pub use compiler::Compiler;
pub use lexer::Tokenizer;
pub use symbols::{SubroutineKind, SymbolTable};
pub use token::{Keyword, Token, TokenSource, TokenStream};
pub use vm_writer::VmWriter;

use jackc_common::CompilerError;

/// Compile one Jack class from source text to VM instruction text.
pub fn compile_source(source: &str) -> Result<String, CompilerError> {
    let tokens = Tokenizer::new(source).tokenize()?;
    Compiler::new(TokenStream::new(tokens)).compile_class()
}
