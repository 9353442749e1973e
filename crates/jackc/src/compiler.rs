//! Recursive-descent Jack parser with interleaved code generation. No AST
//! is ever materialized: each grammar routine emits VM commands directly
//! as it recognizes the construct it is parsing.

use std::path::Path;

use n2t_diagnostics::{Error, Result};

use crate::emitter::{Segment, VmEmitter};
use crate::symbol_table::{Kind, SymbolTable, VarType};
use crate::token::{tokenize, Keyword, Token};

/// Drives a single class's worth of tokens through the grammar, emitting
/// VM code as it goes.
pub struct JackCompiler {
    tokens: Vec<Token>,
    pos: usize,
    class_name: String,
    table: SymbolTable,
    emitter: VmEmitter,
    if_count: u32,
    while_count: u32,
}

impl JackCompiler {
    fn new(tokens: Vec<Token>) -> Self {
        JackCompiler {
            tokens,
            pos: 0,
            class_name: String::new(),
            table: SymbolTable::new(),
            emitter: VmEmitter::new(),
            if_count: 0,
            while_count: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Result<Token> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| Error::parse("unexpected end of input"))?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect_symbol(&mut self, c: char) -> Result<()> {
        match self.advance()? {
            Token::Symbol(s) if s == c => Ok(()),
            other => Err(Error::parse(format!("expected symbol '{c}', found {other:?}"))),
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<()> {
        match self.advance()? {
            Token::Keyword(k) if k == kw => Ok(()),
            other => Err(Error::parse(format!(
                "expected keyword '{}', found {other:?}",
                kw.as_str()
            ))),
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.advance()? {
            Token::Identifier(name) => Ok(name),
            other => Err(Error::parse(format!("expected identifier, found {other:?}"))),
        }
    }

    fn is_symbol(&self, c: char) -> bool {
        matches!(self.peek(), Some(Token::Symbol(s)) if *s == c)
    }

    fn is_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek(), Some(Token::Keyword(k)) if *k == kw)
    }

    fn peek_is_symbol_at(&self, offset: usize, c: char) -> bool {
        matches!(self.peek_at(offset), Some(Token::Symbol(s)) if *s == c)
    }

    // --- class ---------------------------------------------------------

    fn compile_class(&mut self) -> Result<()> {
        self.expect_keyword(Keyword::Class)?;
        self.class_name = self.expect_identifier()?;
        self.expect_symbol('{')?;
        while self.is_keyword(Keyword::Static) || self.is_keyword(Keyword::Field) {
            self.compile_class_var_dec()?;
        }
        while self.is_keyword(Keyword::Constructor)
            || self.is_keyword(Keyword::Function)
            || self.is_keyword(Keyword::Method)
        {
            self.compile_subroutine()?;
        }
        self.expect_symbol('}')?;
        Ok(())
    }

    fn compile_class_var_dec(&mut self) -> Result<()> {
        let kind = match self.advance()? {
            Token::Keyword(Keyword::Static) => Kind::Static,
            Token::Keyword(Keyword::Field) => Kind::Field,
            other => return Err(Error::parse(format!("expected 'static' or 'field', found {other:?}"))),
        };
        let var_type = self.compile_type()?;
        loop {
            let name = self.expect_identifier()?;
            self.table.define(&name, var_type.clone(), kind);
            if self.is_symbol(',') {
                self.advance()?;
                continue;
            }
            break;
        }
        self.expect_symbol(';')?;
        Ok(())
    }

    fn compile_type(&mut self) -> Result<VarType> {
        match self.advance()? {
            Token::Keyword(Keyword::Int) => Ok(VarType::Int),
            Token::Keyword(Keyword::Char) => Ok(VarType::Char),
            Token::Keyword(Keyword::Boolean) => Ok(VarType::Boolean),
            Token::Identifier(name) => Ok(VarType::Class(name)),
            other => Err(Error::parse(format!("expected a type, found {other:?}"))),
        }
    }

    // --- subroutine ------------------------------------------------------

    fn compile_subroutine(&mut self) -> Result<()> {
        let sub_kind = match self.advance()? {
            Token::Keyword(k @ (Keyword::Constructor | Keyword::Function | Keyword::Method)) => k,
            other => return Err(Error::parse(format!("expected subroutine kind, found {other:?}"))),
        };

        // return type: void or a real type
        match self.peek() {
            Some(Token::Keyword(Keyword::Void)) => {
                self.advance()?;
            }
            _ => {
                self.compile_type()?;
            }
        }

        let name = self.expect_identifier()?;

        self.table.start_subroutine();
        self.if_count = 0;
        self.while_count = 0;

        if sub_kind == Keyword::Method {
            self.table
                .define("this", VarType::Class(self.class_name.clone()), Kind::Arg);
        }

        self.expect_symbol('(')?;
        self.compile_parameter_list()?;
        self.expect_symbol(')')?;

        self.expect_symbol('{')?;
        while self.is_keyword(Keyword::Var) {
            self.compile_var_dec()?;
        }

        let n_locals = self.table.var_count(Kind::Var);
        self.emitter
            .write_function(&format!("{}.{}", self.class_name, name), n_locals);

        match sub_kind {
            Keyword::Constructor => {
                let n_fields = self.table.var_count(Kind::Field);
                self.emitter.write_push(Segment::Constant, n_fields);
                self.emitter.write_call("Memory.alloc", 1);
                self.emitter.write_pop(Segment::Pointer, 0);
            }
            Keyword::Method => {
                self.emitter.write_push(Segment::Argument, 0);
                self.emitter.write_pop(Segment::Pointer, 0);
            }
            _ => {}
        }

        self.compile_statements()?;
        self.expect_symbol('}')?;
        Ok(())
    }

    fn compile_parameter_list(&mut self) -> Result<()> {
        if self.is_symbol(')') {
            return Ok(());
        }
        loop {
            let var_type = self.compile_type()?;
            let name = self.expect_identifier()?;
            self.table.define(&name, var_type, Kind::Arg);
            if self.is_symbol(',') {
                self.advance()?;
                continue;
            }
            break;
        }
        Ok(())
    }

    fn compile_var_dec(&mut self) -> Result<()> {
        self.expect_keyword(Keyword::Var)?;
        let var_type = self.compile_type()?;
        loop {
            let name = self.expect_identifier()?;
            self.table.define(&name, var_type.clone(), Kind::Var);
            if self.is_symbol(',') {
                self.advance()?;
                continue;
            }
            break;
        }
        self.expect_symbol(';')?;
        Ok(())
    }

    // --- statements -----------------------------------------------------

    fn compile_statements(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(Token::Keyword(Keyword::Let)) => self.compile_let()?,
                Some(Token::Keyword(Keyword::If)) => self.compile_if()?,
                Some(Token::Keyword(Keyword::While)) => self.compile_while()?,
                Some(Token::Keyword(Keyword::Do)) => self.compile_do()?,
                Some(Token::Keyword(Keyword::Return)) => self.compile_return()?,
                _ => break,
            }
        }
        Ok(())
    }

    fn compile_let(&mut self) -> Result<()> {
        self.expect_keyword(Keyword::Let)?;
        let name = self.expect_identifier()?;
        let var = self
            .table
            .lookup(&name)
            .cloned()
            .ok_or_else(|| Error::semantic(format!("unresolved identifier '{name}'")))?;

        if self.is_symbol('[') {
            self.advance()?;
            self.emitter.write_push(var.kind.segment(), var.index);
            self.compile_expression()?;
            self.emitter.write_arithmetic("add");
            self.expect_symbol(']')?;
            self.expect_symbol('=')?;
            self.compile_expression()?;
            self.expect_symbol(';')?;
            self.emitter.write_pop(Segment::Temp, 0);
            self.emitter.write_pop(Segment::Pointer, 1);
            self.emitter.write_push(Segment::Temp, 0);
            self.emitter.write_pop(Segment::That, 0);
        } else {
            self.expect_symbol('=')?;
            self.compile_expression()?;
            self.expect_symbol(';')?;
            self.emitter.write_pop(var.kind.segment(), var.index);
        }
        Ok(())
    }

    fn compile_if(&mut self) -> Result<()> {
        self.expect_keyword(Keyword::If)?;
        let n = self.if_count;
        self.if_count += 1;
        let true_label = format!("IF_TRUE{n}");
        let false_label = format!("IF_FALSE{n}");
        let end_label = format!("IF_END{n}");

        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;

        self.emitter.write_if(&true_label);
        self.emitter.write_goto(&false_label);
        self.emitter.write_label(&true_label);

        self.expect_symbol('{')?;
        self.compile_statements()?;
        self.expect_symbol('}')?;

        if self.is_keyword(Keyword::Else) {
            self.advance()?;
            self.emitter.write_goto(&end_label);
            self.emitter.write_label(&false_label);
            self.expect_symbol('{')?;
            self.compile_statements()?;
            self.expect_symbol('}')?;
            self.emitter.write_label(&end_label);
        } else {
            self.emitter.write_label(&false_label);
        }
        Ok(())
    }

    fn compile_while(&mut self) -> Result<()> {
        self.expect_keyword(Keyword::While)?;
        let n = self.while_count;
        self.while_count += 1;
        let exp_label = format!("WHILE_EXP{n}");
        let end_label = format!("WHILE_END{n}");

        self.emitter.write_label(&exp_label);
        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;
        self.emitter.write_arithmetic("not");
        self.emitter.write_if(&end_label);

        self.expect_symbol('{')?;
        self.compile_statements()?;
        self.expect_symbol('}')?;
        self.emitter.write_goto(&exp_label);
        self.emitter.write_label(&end_label);
        Ok(())
    }

    fn compile_do(&mut self) -> Result<()> {
        self.expect_keyword(Keyword::Do)?;
        self.compile_subroutine_call()?;
        self.expect_symbol(';')?;
        self.emitter.write_pop(Segment::Temp, 0);
        Ok(())
    }

    fn compile_return(&mut self) -> Result<()> {
        self.expect_keyword(Keyword::Return)?;
        if self.is_symbol(';') {
            self.emitter.write_push(Segment::Constant, 0);
        } else {
            self.compile_expression()?;
        }
        self.expect_symbol(';')?;
        self.emitter.write_return();
        Ok(())
    }

    // --- subroutine calls -------------------------------------------------

    /// `name.member(args)`, `name(args)` (implicit self), or
    /// `name[...]`-free identifier followed by `(`/`.`.
    fn compile_subroutine_call(&mut self) -> Result<()> {
        let name = self.expect_identifier()?;

        if self.is_symbol('.') {
            self.advance()?;
            let member = self.expect_identifier()?;
            let (callee_class, mut n_args) = match self.table.lookup(&name).cloned() {
                Some(var) => {
                    self.emitter.write_push(var.kind.segment(), var.index);
                    (var.var_type.class_name().to_string(), 1u16)
                }
                None => (name, 0u16),
            };
            self.expect_symbol('(')?;
            n_args += self.compile_expression_list()?;
            self.expect_symbol(')')?;
            self.emitter
                .write_call(&format!("{callee_class}.{member}"), n_args);
        } else {
            // implicit method call on self
            self.emitter.write_push(Segment::Pointer, 0);
            self.expect_symbol('(')?;
            let n_args = 1 + self.compile_expression_list()?;
            self.expect_symbol(')')?;
            self.emitter
                .write_call(&format!("{}.{}", self.class_name, name), n_args);
        }
        Ok(())
    }

    fn compile_expression_list(&mut self) -> Result<u16> {
        if self.is_symbol(')') {
            return Ok(0);
        }
        let mut count = 0u16;
        loop {
            self.compile_expression()?;
            count += 1;
            if self.is_symbol(',') {
                self.advance()?;
                continue;
            }
            break;
        }
        Ok(count)
    }

    // --- expressions ------------------------------------------------------

    fn compile_expression(&mut self) -> Result<()> {
        self.compile_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(c @ ('+' | '-' | '*' | '/' | '&' | '|' | '<' | '>' | '='))) => *c,
                _ => break,
            };
            self.advance()?;
            self.compile_term()?;
            match op {
                '+' => self.emitter.write_arithmetic("add"),
                '-' => self.emitter.write_arithmetic("sub"),
                '*' => self.emitter.write_call("Math.multiply", 2),
                '/' => self.emitter.write_call("Math.divide", 2),
                '&' => self.emitter.write_arithmetic("and"),
                '|' => self.emitter.write_arithmetic("or"),
                '<' => self.emitter.write_arithmetic("lt"),
                '>' => self.emitter.write_arithmetic("gt"),
                '=' => self.emitter.write_arithmetic("eq"),
                _ => unreachable!(),
            }
        }
        Ok(())
    }

    fn compile_term(&mut self) -> Result<()> {
        match self.peek().cloned() {
            Some(Token::IntConst(value)) => {
                self.advance()?;
                self.emitter.write_push(Segment::Constant, value);
            }
            Some(Token::StringConst(s)) => {
                self.advance()?;
                self.emitter.write_push(Segment::Constant, s.len() as u16);
                self.emitter.write_call("String.new", 1);
                for c in s.chars() {
                    self.emitter.write_push(Segment::Constant, c as u16);
                    self.emitter.write_call("String.appendChar", 2);
                }
            }
            Some(Token::Keyword(Keyword::True)) => {
                self.advance()?;
                self.emitter.write_push(Segment::Constant, 0);
                self.emitter.write_arithmetic("not");
            }
            Some(Token::Keyword(Keyword::False)) | Some(Token::Keyword(Keyword::Null)) => {
                self.advance()?;
                self.emitter.write_push(Segment::Constant, 0);
            }
            Some(Token::Keyword(Keyword::This)) => {
                self.advance()?;
                self.emitter.write_push(Segment::Pointer, 0);
            }
            Some(Token::Symbol('(')) => {
                self.advance()?;
                self.compile_expression()?;
                self.expect_symbol(')')?;
            }
            Some(Token::Symbol('-')) => {
                self.advance()?;
                self.compile_term()?;
                self.emitter.write_arithmetic("neg");
            }
            Some(Token::Symbol('~')) => {
                self.advance()?;
                self.compile_term()?;
                self.emitter.write_arithmetic("not");
            }
            Some(Token::Identifier(_)) => {
                if self.peek_is_symbol_at(1, '.') || self.peek_is_symbol_at(1, '(') {
                    self.compile_subroutine_call()?;
                } else if self.peek_is_symbol_at(1, '[') {
                    let name = self.expect_identifier()?;
                    let var = self
                        .table
                        .lookup(&name)
                        .cloned()
                        .ok_or_else(|| Error::semantic(format!("unresolved identifier '{name}'")))?;
                    self.advance()?; // '['
                    self.compile_expression()?;
                    self.expect_symbol(']')?;
                    self.emitter.write_push(var.kind.segment(), var.index);
                    self.emitter.write_arithmetic("add");
                    self.emitter.write_pop(Segment::Pointer, 1);
                    self.emitter.write_push(Segment::That, 0);
                } else {
                    let name = self.expect_identifier()?;
                    let var = self
                        .table
                        .lookup(&name)
                        .cloned()
                        .ok_or_else(|| Error::semantic(format!("unresolved identifier '{name}'")))?;
                    self.emitter.write_push(var.kind.segment(), var.index);
                }
            }
            other => return Err(Error::parse(format!("expected a term, found {other:?}"))),
        }
        Ok(())
    }
}

/// Compile one Jack source file into a VM command listing. `file` anchors
/// any lexical error raised while tokenizing to a `SourceLocation`.
pub fn compile(source: &str, file: &Path) -> Result<String> {
    let tokens = tokenize(source, file)?;
    let mut compiler = JackCompiler::new(tokens);
    compiler.compile_class()?;
    Ok(compiler.emitter.into_output())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_src(source: &str) -> Result<String> {
        compile(source, Path::new("Test.jack"))
    }

    #[test]
    fn compiles_constructor_with_field_initialization() {
        let src = r#"
            class Point {
                field int x, y;
                constructor Point new(int ax, int ay) {
                    let x = ax;
                    let y = ay;
                    return this;
                }
            }
        "#;
        let vm = compile_src(src).unwrap();
        assert!(vm.contains("function Point.new 0"));
        assert!(vm.contains("push constant 2"));
        assert!(vm.contains("call Memory.alloc 1"));
        assert!(vm.contains("pop pointer 0"));
        assert!(vm.contains("push argument 0"));
        assert!(vm.contains("pop this 0"));
        assert!(vm.contains("push argument 1"));
        assert!(vm.contains("pop this 1"));
        assert!(vm.contains("push pointer 0"));
        assert!(vm.contains("return"));
    }

    #[test]
    fn compiles_method_call_on_variable_as_method_dispatch() {
        let src = r#"
            class Main {
                function void main() {
                    var Point p;
                    do p.dispose();
                    return;
                }
            }
        "#;
        let vm = compile_src(src).unwrap();
        assert!(vm.contains("push local 0"));
        assert!(vm.contains("call Point.dispose 1"));
        assert!(vm.contains("pop temp 0"));
    }

    #[test]
    fn compiles_while_loop_with_unique_labels() {
        let src = r#"
            class Main {
                function void loop() {
                    var int i;
                    let i = 0;
                    while (i < 10) {
                        let i = i + 1;
                    }
                    return;
                }
            }
        "#;
        let vm = compile_src(src).unwrap();
        assert!(vm.contains("label WHILE_EXP0"));
        assert!(vm.contains("not"));
        assert!(vm.contains("if-goto WHILE_END0"));
        assert!(vm.contains("goto WHILE_EXP0"));
        assert!(vm.contains("label WHILE_END0"));
    }

    #[test]
    fn implicit_self_method_call_pushes_pointer_zero() {
        let src = r#"
            class Main {
                method void helper() {
                    do run();
                    return;
                }
            }
        "#;
        let vm = compile_src(src).unwrap();
        assert!(vm.contains("push argument 0"));
        assert!(vm.contains("pop pointer 0"));
        assert!(vm.contains("push pointer 0"));
        assert!(vm.contains("call Main.run 1"));
    }

    #[test]
    fn unresolved_identifier_is_semantic_error() {
        let src = r#"
            class Main {
                function void main() {
                    let x = 1;
                    return;
                }
            }
        "#;
        assert!(compile_src(src).is_err());
    }

    #[test]
    fn string_constant_lowers_to_new_and_append_char_calls() {
        let src = r#"
            class Main {
                function void main() {
                    do Output.printString("hi");
                    return;
                }
            }
        "#;
        let vm = compile_src(src).unwrap();
        assert!(vm.contains("push constant 2"));
        assert!(vm.contains("call String.new 1"));
        assert!(vm.contains(&format!("push constant {}", 'h' as u16)));
        assert!(vm.contains(&format!("push constant {}", 'i' as u16)));
        assert!(vm.contains("call String.appendChar 2"));
    }
}
