//! Syntax-directed code generator
//!
//! Single pass, one-token lookahead, no AST: each grammar nonterminal
//! recognizes tokens, populates the symbol table, and emits VM code at the
//! earliest point all operands are known. Expressions evaluate strictly
//! left-to-right with no operator precedence (`a + b * c` is `(a + b) * c`);
//! this is a property of the Jack grammar, not an oversight.

use crate::symbols::{SubroutineKind, SymbolTable};
use crate::token::{Keyword, Token, TokenSource};
use crate::vm_writer::VmWriter;
use jackc_common::{ArithOp, CompilerError, Segment, VarKind};

/// Resolved target of a subroutine call.
///
/// Call resolution is a three-way dispatch: a qualified call on a name the
/// symbol table knows is a method call bound to that variable; a bare call
/// is a method call on the current receiver; a qualified call on an unknown
/// name is a plain class-qualified function call with no receiver.
#[derive(Debug)]
enum CallTarget {
    BoundMethod {
        target: String,
        receiver: (Segment, u16),
    },
    ReceiverMethod {
        target: String,
    },
    QualifiedFunction {
        target: String,
    },
}

/// The syntax-directed Jack-to-VM compiler.
pub struct Compiler<T: TokenSource> {
    tokens: T,
    table: SymbolTable,
    writer: VmWriter,
    class_name: String,
    if_index: u32,
    while_index: u32,
}

impl<T: TokenSource> Compiler<T> {
    pub fn new(tokens: T) -> Self {
        Self {
            tokens,
            table: SymbolTable::new(),
            writer: VmWriter::new(),
            class_name: String::new(),
            if_index: 0,
            while_index: 0,
        }
    }

    // --- token helpers ---

    fn next_token(&mut self) -> Result<Token, CompilerError> {
        self.tokens
            .next()
            .ok_or_else(|| CompilerError::parse_error("unexpected end of input".to_string()))
    }

    fn unexpected(expected: &str, found: &Token) -> CompilerError {
        CompilerError::parse_error(format!("expected {expected}, found '{found}'"))
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<(), CompilerError> {
        match self.next_token()? {
            Token::Symbol(c) if c == symbol => Ok(()),
            other => Err(Self::unexpected(&format!("'{symbol}'"), &other)),
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), CompilerError> {
        match self.next_token()? {
            Token::Keyword(k) if k == keyword => Ok(()),
            other => Err(Self::unexpected(&format!("'{keyword}'"), &other)),
        }
    }

    fn expect_identifier(&mut self) -> Result<String, CompilerError> {
        match self.next_token()? {
            Token::Identifier(name) => Ok(name),
            other => Err(Self::unexpected("an identifier", &other)),
        }
    }

    fn peek_symbol(&self, symbol: char) -> bool {
        matches!(self.tokens.peek(), Some(Token::Symbol(c)) if *c == symbol)
    }

    fn peek_keyword(&self) -> Option<Keyword> {
        match self.tokens.peek() {
            Some(Token::Keyword(k)) => Some(*k),
            _ => None,
        }
    }

    fn resolve_variable(&self, name: &str) -> Result<(Segment, u16), CompilerError> {
        match (self.table.kind_of(name), self.table.index_of(name)) {
            (Some(kind), Some(index)) => Ok((kind.segment(), index)),
            _ => Err(CompilerError::UndefinedVariable {
                name: name.to_string(),
            }),
        }
    }

    // --- grammar nonterminals ---

    /// `class` className `{` classVarDec* subroutineDec* `}`
    ///
    /// Consumes the whole token source and returns the VM instruction text.
    pub fn compile_class(mut self) -> Result<String, CompilerError> {
        self.expect_keyword(Keyword::Class)?;
        self.class_name = self.expect_identifier()?;
        self.expect_symbol('{')?;
        while matches!(self.peek_keyword(), Some(Keyword::Static | Keyword::Field)) {
            self.compile_class_var_dec()?;
        }
        while matches!(
            self.peek_keyword(),
            Some(Keyword::Constructor | Keyword::Function | Keyword::Method)
        ) {
            self.compile_subroutine()?;
        }
        self.expect_symbol('}')?;
        if let Some(extra) = self.tokens.peek() {
            return Err(Self::unexpected("end of input", extra));
        }
        log::debug!("compiled class {}", self.class_name);
        Ok(self.writer.into_output())
    }

    /// (`static` | `field`) type varName (`,` varName)* `;`
    fn compile_class_var_dec(&mut self) -> Result<(), CompilerError> {
        let kind = match self.next_token()? {
            Token::Keyword(Keyword::Static) => VarKind::Static,
            Token::Keyword(Keyword::Field) => VarKind::Field,
            other => return Err(Self::unexpected("'static' or 'field'", &other)),
        };
        let ty = self.compile_type()?;
        loop {
            let name = self.expect_identifier()?;
            self.table.define(&name, &ty, kind);
            if self.peek_symbol(',') {
                self.next_token()?;
            } else {
                break;
            }
        }
        self.expect_symbol(';')
    }

    /// `int` | `char` | `boolean` | className
    fn compile_type(&mut self) -> Result<String, CompilerError> {
        match self.next_token()? {
            Token::Keyword(k @ (Keyword::Int | Keyword::Char | Keyword::Boolean)) => {
                Ok(k.to_string())
            }
            Token::Identifier(name) => Ok(name),
            other => Err(Self::unexpected("a type", &other)),
        }
    }

    /// (`constructor` | `function` | `method`) (`void` | type) subroutineName
    /// `(` parameterList `)` subroutineBody
    fn compile_subroutine(&mut self) -> Result<(), CompilerError> {
        let kind = match self.next_token()? {
            Token::Keyword(Keyword::Constructor) => SubroutineKind::Constructor,
            Token::Keyword(Keyword::Function) => SubroutineKind::Function,
            Token::Keyword(Keyword::Method) => SubroutineKind::Method,
            other => {
                return Err(Self::unexpected(
                    "'constructor', 'function' or 'method'",
                    &other,
                ))
            }
        };
        // return type drives nothing here; void returns are normalized at
        // the return statement
        if self.peek_keyword() == Some(Keyword::Void) {
            self.next_token()?;
        } else {
            self.compile_type()?;
        }
        let name = self.expect_identifier()?;

        // scope opens before the parameter list so a method's receiver
        // takes arg index 0 ahead of the explicit parameters
        let class_name = self.class_name.clone();
        self.table.start_subroutine(kind, &class_name);
        self.if_index = 0;
        self.while_index = 0;

        self.expect_symbol('(')?;
        self.compile_parameter_list()?;
        self.expect_symbol(')')?;

        self.expect_symbol('{')?;
        while self.peek_keyword() == Some(Keyword::Var) {
            self.compile_var_dec()?;
        }
        // the entry instruction needs the local count, which is only known
        // once every var declaration has been scanned
        let n_locals = self.table.var_count(VarKind::Var);
        self.writer.function(&class_name, &name, n_locals);
        match kind {
            SubroutineKind::Constructor => {
                // allocate the receiver, sized by the class's field count
                self.writer
                    .push(Segment::Constant, self.table.var_count(VarKind::Field));
                self.writer.call("Memory.alloc", 1);
                self.writer.pop(Segment::Pointer, 0);
            }
            SubroutineKind::Method => {
                // bind the receiver passed as argument 0
                self.writer.push(Segment::Argument, 0);
                self.writer.pop(Segment::Pointer, 0);
            }
            SubroutineKind::Function => {}
        }
        self.compile_statements()?;
        self.expect_symbol('}')?;
        log::debug!("compiled subroutine {}.{}", class_name, name);
        Ok(())
    }

    /// ((type varName) (`,` type varName)*)?
    fn compile_parameter_list(&mut self) -> Result<(), CompilerError> {
        if self.peek_symbol(')') {
            return Ok(());
        }
        loop {
            let ty = self.compile_type()?;
            let name = self.expect_identifier()?;
            self.table.define(&name, &ty, VarKind::Arg);
            if self.peek_symbol(',') {
                self.next_token()?;
            } else {
                return Ok(());
            }
        }
    }

    /// `var` type varName (`,` varName)* `;`
    fn compile_var_dec(&mut self) -> Result<(), CompilerError> {
        self.expect_keyword(Keyword::Var)?;
        let ty = self.compile_type()?;
        loop {
            let name = self.expect_identifier()?;
            self.table.define(&name, &ty, VarKind::Var);
            if self.peek_symbol(',') {
                self.next_token()?;
            } else {
                break;
            }
        }
        self.expect_symbol(';')
    }

    fn compile_statements(&mut self) -> Result<(), CompilerError> {
        loop {
            match self.peek_keyword() {
                Some(Keyword::Let) => self.compile_let()?,
                Some(Keyword::If) => self.compile_if()?,
                Some(Keyword::While) => self.compile_while()?,
                Some(Keyword::Do) => self.compile_do()?,
                Some(Keyword::Return) => self.compile_return()?,
                _ => return Ok(()),
            }
        }
    }

    /// `let` varName (`[` expression `]`)? `=` expression `;`
    fn compile_let(&mut self) -> Result<(), CompilerError> {
        self.expect_keyword(Keyword::Let)?;
        let name = self.expect_identifier()?;
        let (segment, index) = self.resolve_variable(&name)?;
        if self.peek_symbol('[') {
            // destination address = base + offset
            self.next_token()?;
            self.writer.push(segment, index);
            self.compile_expression()?;
            self.expect_symbol(']')?;
            self.writer.arith(ArithOp::Add);
            self.expect_symbol('=')?;
            self.compile_expression()?;
            self.expect_symbol(';')?;
            // stash the value before repointing `that`: repointing destroys
            // the means of locating the destination
            self.writer.pop(Segment::Temp, 0);
            self.writer.pop(Segment::Pointer, 1);
            self.writer.push(Segment::Temp, 0);
            self.writer.pop(Segment::That, 0);
        } else {
            self.expect_symbol('=')?;
            self.compile_expression()?;
            self.expect_symbol(';')?;
            self.writer.pop(segment, index);
        }
        Ok(())
    }

    /// `if` `(` expression `)` `{` statements `}` (`else` `{` statements `}`)?
    fn compile_if(&mut self) -> Result<(), CompilerError> {
        self.expect_keyword(Keyword::If)?;
        let n = self.if_index;
        self.if_index += 1;
        let true_label = format!("IF_TRUE{n}");
        let false_label = format!("IF_FALSE{n}");

        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;
        self.writer.if_goto(&true_label);
        self.writer.goto(&false_label);
        self.writer.label(&true_label);
        self.expect_symbol('{')?;
        self.compile_statements()?;
        self.expect_symbol('}')?;

        if self.peek_keyword() == Some(Keyword::Else) {
            let end_label = format!("IF_END{n}");
            self.writer.goto(&end_label);
            self.writer.label(&false_label);
            self.next_token()?;
            self.expect_symbol('{')?;
            self.compile_statements()?;
            self.expect_symbol('}')?;
            self.writer.label(&end_label);
        } else {
            self.writer.label(&false_label);
        }
        Ok(())
    }

    /// `while` `(` expression `)` `{` statements `}`
    ///
    /// Tests the negated condition to exit early.
    fn compile_while(&mut self) -> Result<(), CompilerError> {
        self.expect_keyword(Keyword::While)?;
        let n = self.while_index;
        self.while_index += 1;
        let exp_label = format!("WHILE_EXP{n}");
        let end_label = format!("WHILE_END{n}");

        self.writer.label(&exp_label);
        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;
        self.writer.arith(ArithOp::Not);
        self.writer.if_goto(&end_label);
        self.expect_symbol('{')?;
        self.compile_statements()?;
        self.expect_symbol('}')?;
        self.writer.goto(&exp_label);
        self.writer.label(&end_label);
        Ok(())
    }

    /// `do` subroutineCall `;`
    fn compile_do(&mut self) -> Result<(), CompilerError> {
        self.expect_keyword(Keyword::Do)?;
        let name = self.expect_identifier()?;
        self.compile_subroutine_call(name)?;
        self.expect_symbol(';')?;
        // every call pushes a return value by convention; discard it
        self.writer.pop(Segment::Temp, 0);
        Ok(())
    }

    /// `return` expression? `;`
    fn compile_return(&mut self) -> Result<(), CompilerError> {
        self.expect_keyword(Keyword::Return)?;
        if self.peek_symbol(';') {
            // a void return still pushes a value by convention
            self.writer.push(Segment::Constant, 0);
        } else {
            self.compile_expression()?;
        }
        self.expect_symbol(';')?;
        self.writer.ret();
        Ok(())
    }

    /// term (op term)*
    ///
    /// No precedence: each operator applies to everything to its left.
    fn compile_expression(&mut self) -> Result<(), CompilerError> {
        self.compile_term()?;
        loop {
            let op = match self.tokens.peek() {
                Some(Token::Symbol(
                    c @ ('+' | '-' | '*' | '/' | '&' | '|' | '<' | '>' | '='),
                )) => *c,
                _ => return Ok(()),
            };
            self.next_token()?;
            self.compile_term()?;
            match op {
                '+' => self.writer.arith(ArithOp::Add),
                '-' => self.writer.arith(ArithOp::Sub),
                '&' => self.writer.arith(ArithOp::And),
                '|' => self.writer.arith(ArithOp::Or),
                '<' => self.writer.arith(ArithOp::Lt),
                '>' => self.writer.arith(ArithOp::Gt),
                '=' => self.writer.arith(ArithOp::Eq),
                // multiplication and division are library calls, not
                // primitive ops
                '*' => self.writer.call("Math.multiply", 2),
                '/' => self.writer.call("Math.divide", 2),
                _ => unreachable!(),
            }
        }
    }

    fn compile_term(&mut self) -> Result<(), CompilerError> {
        match self.next_token()? {
            Token::IntConst(value) => {
                self.writer.push(Segment::Constant, value);
                Ok(())
            }
            Token::StringConst(text) => {
                // sized constructor, then one append per character code
                self.writer
                    .push(Segment::Constant, text.chars().count() as u16);
                self.writer.call("String.new", 1);
                for c in text.chars() {
                    self.writer.push(Segment::Constant, c as u16);
                    self.writer.call("String.appendChar", 2);
                }
                Ok(())
            }
            Token::Keyword(Keyword::True) => {
                self.writer.push(Segment::Constant, 0);
                self.writer.arith(ArithOp::Not);
                Ok(())
            }
            Token::Keyword(Keyword::False | Keyword::Null) => {
                self.writer.push(Segment::Constant, 0);
                Ok(())
            }
            Token::Keyword(Keyword::This) => {
                self.writer.push(Segment::Pointer, 0);
                Ok(())
            }
            Token::Symbol('(') => {
                self.compile_expression()?;
                self.expect_symbol(')')
            }
            Token::Symbol('-') => {
                self.compile_term()?;
                self.writer.arith(ArithOp::Neg);
                Ok(())
            }
            Token::Symbol('~') => {
                self.compile_term()?;
                self.writer.arith(ArithOp::Not);
                Ok(())
            }
            Token::Identifier(name) => {
                if self.peek_symbol('[') {
                    // element address = base + offset, read through `that`
                    let (segment, index) = self.resolve_variable(&name)?;
                    self.next_token()?;
                    self.writer.push(segment, index);
                    self.compile_expression()?;
                    self.expect_symbol(']')?;
                    self.writer.arith(ArithOp::Add);
                    self.writer.pop(Segment::Pointer, 1);
                    self.writer.push(Segment::That, 0);
                    Ok(())
                } else if self.peek_symbol('(') || self.peek_symbol('.') {
                    self.compile_subroutine_call(name)
                } else {
                    // a bare unknown identifier in value position is an
                    // explicit error, never a silent fall-through
                    let (segment, index) = self.resolve_variable(&name)?;
                    self.writer.push(segment, index);
                    Ok(())
                }
            }
            other => Err(Self::unexpected("a term", &other)),
        }
    }

    fn resolve_call(&mut self, first: String) -> Result<CallTarget, CompilerError> {
        if self.peek_symbol('.') {
            self.next_token()?;
            let method = self.expect_identifier()?;
            match (self.table.type_of(&first), self.table.kind_of(&first)) {
                (Some(ty), Some(kind)) => {
                    let index = self.table.index_of(&first).ok_or_else(|| {
                        CompilerError::InternalError {
                            message: format!("symbol '{first}' has a kind but no index"),
                        }
                    })?;
                    Ok(CallTarget::BoundMethod {
                        target: format!("{ty}.{method}"),
                        receiver: (kind.segment(), index),
                    })
                }
                // unknown qualifier: a class reference, by longstanding
                // convention
                _ => Ok(CallTarget::QualifiedFunction {
                    target: format!("{first}.{method}"),
                }),
            }
        } else {
            Ok(CallTarget::ReceiverMethod {
                target: format!("{}.{}", self.class_name, first),
            })
        }
    }

    /// subroutineName `(` expressionList `)`
    /// | (className | varName) `.` subroutineName `(` expressionList `)`
    fn compile_subroutine_call(&mut self, first: String) -> Result<(), CompilerError> {
        let call = self.resolve_call(first)?;
        // the receiver, when there is one, is pushed as implicit argument 0
        let has_receiver = match &call {
            CallTarget::BoundMethod { receiver, .. } => {
                self.writer.push(receiver.0, receiver.1);
                true
            }
            CallTarget::ReceiverMethod { .. } => {
                self.writer.push(Segment::Pointer, 0);
                true
            }
            CallTarget::QualifiedFunction { .. } => false,
        };
        self.expect_symbol('(')?;
        let n_args = self.compile_expression_list()?;
        self.expect_symbol(')')?;
        let target = match call {
            CallTarget::BoundMethod { target, .. }
            | CallTarget::ReceiverMethod { target }
            | CallTarget::QualifiedFunction { target } => target,
        };
        self.writer
            .call(&target, n_args + if has_receiver { 1 } else { 0 });
        Ok(())
    }

    /// (expression (`,` expression)*)?
    fn compile_expression_list(&mut self) -> Result<u16, CompilerError> {
        if self.peek_symbol(')') {
            return Ok(0);
        }
        let mut count = 1;
        self.compile_expression()?;
        while self.peek_symbol(',') {
            self.next_token()?;
            self.compile_expression()?;
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::compile_source;
    use jackc_common::CompilerError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_one_field_constructor_class() {
        let vm = compile_source(
            "class Foo { field int x; constructor Foo new() { let x = 1; return this; } }",
        )
        .unwrap();
        assert_eq!(
            vm,
            "function Foo.new 0\n\
             push constant 1\n\
             call Memory.alloc 1\n\
             pop pointer 0\n\
             push constant 1\n\
             pop this 0\n\
             push pointer 0\n\
             return\n"
        );
    }

    #[test]
    fn test_expressions_have_no_precedence() {
        let vm = compile_source(
            "class Main { function int f() { var int x; let x = 1 + 2 * 3; return x; } }",
        )
        .unwrap();
        assert_eq!(
            vm,
            "function Main.f 1\n\
             push constant 1\n\
             push constant 2\n\
             add\n\
             push constant 3\n\
             call Math.multiply 2\n\
             pop local 0\n\
             push local 0\n\
             return\n"
        );
    }

    #[test]
    fn test_method_binds_receiver_and_offsets_parameters() {
        let vm = compile_source(
            "class Point { field int x; method int shift(int dx) { let x = x + dx; return x; } }",
        )
        .unwrap();
        assert_eq!(
            vm,
            "function Point.shift 0\n\
             push argument 0\n\
             pop pointer 0\n\
             push this 0\n\
             push argument 1\n\
             add\n\
             pop this 0\n\
             push this 0\n\
             return\n"
        );
    }

    #[test]
    fn test_do_discards_and_void_return_pushes_zero() {
        let vm = compile_source(
            "class Main { function void main() { do Output.printInt(3); return; } }",
        )
        .unwrap();
        assert_eq!(
            vm,
            "function Main.main 0\n\
             push constant 3\n\
             call Output.printInt 1\n\
             pop temp 0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn test_call_dispatch_three_ways() {
        let vm = compile_source(
            "class Game { field Ball ball; \
             method void run() { \
               do ball.bounce(); \
               do step(); \
               do Screen.clearScreen(); \
               return; \
             } }",
        )
        .unwrap();
        // bound method: receiver pushed from the variable, target by type
        assert!(vm.contains("push this 0\ncall Ball.bounce 1\n"));
        // bare call: implicit receiver is the current object
        assert!(vm.contains("push pointer 0\ncall Game.step 1\n"));
        // qualified call on an unknown name: no receiver
        assert!(vm.contains("call Screen.clearScreen 0\n"));
    }

    #[test]
    fn test_array_assignment_stashes_value_before_repointing() {
        let vm = compile_source(
            "class Main { function void main(Array a, int i) { let a[i] = a[i + 1]; return; } }",
        )
        .unwrap();
        assert_eq!(
            vm,
            "function Main.main 0\n\
             push argument 0\n\
             push argument 1\n\
             add\n\
             push argument 0\n\
             push argument 1\n\
             push constant 1\n\
             add\n\
             add\n\
             pop pointer 1\n\
             push that 0\n\
             pop temp 0\n\
             pop pointer 1\n\
             push temp 0\n\
             pop that 0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn test_if_else_and_while_label_shapes() {
        let vm = compile_source(
            "class Main { function int f(int n) { \
               while (n > 0) { let n = n - 1; } \
               if (n = 0) { return 1; } else { return 2; } \
             } }",
        )
        .unwrap();
        assert_eq!(
            vm,
            "function Main.f 0\n\
             label WHILE_EXP0\n\
             push argument 0\n\
             push constant 0\n\
             gt\n\
             not\n\
             if-goto WHILE_END0\n\
             push argument 0\n\
             push constant 1\n\
             sub\n\
             pop argument 0\n\
             goto WHILE_EXP0\n\
             label WHILE_END0\n\
             push argument 0\n\
             push constant 0\n\
             eq\n\
             if-goto IF_TRUE0\n\
             goto IF_FALSE0\n\
             label IF_TRUE0\n\
             push constant 1\n\
             return\n\
             goto IF_END0\n\
             label IF_FALSE0\n\
             push constant 2\n\
             return\n\
             label IF_END0\n"
        );
    }

    #[test]
    fn test_if_without_else_has_no_end_label() {
        let vm = compile_source(
            "class Main { function void f(int n) { if (n) { do Sys.halt(); } return; } }",
        )
        .unwrap();
        assert!(vm.contains("label IF_FALSE0\n"));
        assert!(!vm.contains("IF_END"));
    }

    #[test]
    fn test_string_literal_lowers_to_sized_constructor_and_appends() {
        let vm =
            compile_source("class Main { function String s() { return \"Hi\"; } }").unwrap();
        assert_eq!(
            vm,
            "function Main.s 0\n\
             push constant 2\n\
             call String.new 1\n\
             push constant 72\n\
             call String.appendChar 2\n\
             push constant 105\n\
             call String.appendChar 2\n\
             return\n"
        );
    }

    #[test]
    fn test_keyword_constants() {
        let vm = compile_source(
            "class Main { function int f() { var boolean b; let b = true; let b = false; return null; } }",
        )
        .unwrap();
        assert_eq!(
            vm,
            "function Main.f 1\n\
             push constant 0\n\
             not\n\
             pop local 0\n\
             push constant 0\n\
             pop local 0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn test_undefined_bare_identifier_in_value_position_is_fatal() {
        let err = compile_source("class Main { function int f() { return mystery; } }")
            .unwrap_err();
        assert_eq!(
            err,
            CompilerError::UndefinedVariable {
                name: "mystery".to_string()
            }
        );
    }

    #[test]
    fn test_grammar_violation_is_fatal() {
        let err = compile_source("class Main { function void f() { let ; } }").unwrap_err();
        assert!(matches!(err, CompilerError::ParseError { .. }));
    }

    #[test]
    fn test_unary_ops_bind_to_a_single_term() {
        let vm = compile_source(
            "class Main { function int f(int x) { return -x + 1; } }",
        )
        .unwrap();
        assert_eq!(
            vm,
            "function Main.f 0\n\
             push argument 0\n\
             neg\n\
             push constant 1\n\
             add\n\
             return\n"
        );
    }
}
