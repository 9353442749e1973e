//! Hack assembly code generator.
//!
//! Targets a symbolic assembly where `SP` lives at address 0, `LCL`/`ARG`/
//! `THIS`/`THAT` at 1..4, `R13..R15` are general-purpose scratch registers,
//! and the stack grows upward from address 256.

use std::collections::HashMap;
use std::fmt::Write as _;

use n2t_diagnostics::{Error, Result};

use crate::command::{ArithOp, Command, Segment};

struct Line {
    text: String,
    /// Comments and label declarations don't consume a slot in the
    /// line-count suffix applied to "real" instructions.
    counts: bool,
}

/// Emits Hack assembly for a sequence of VM commands. One instance spans
/// the whole translated program, so label counters and the current
/// function stay consistent across files combined from a directory.
pub struct AsmEmitter {
    lines: Vec<Line>,
    bool_label_counter: u32,
    current_function: String,
    return_counts: HashMap<String, u32>,
    current_file: String,
}

impl AsmEmitter {
    pub fn new() -> Self {
        AsmEmitter {
            lines: Vec::new(),
            bool_label_counter: 0,
            current_function: String::new(),
            return_counts: HashMap::new(),
            current_file: String::new(),
        }
    }

    pub fn set_current_file(&mut self, stem: &str) {
        self.current_file = stem.to_string();
    }

    fn emit_comment(&mut self, text: impl Into<String>) {
        self.lines.push(Line {
            text: format!("// {}", text.into()),
            counts: false,
        });
    }

    fn emit_label_decl(&mut self, label: &str) {
        self.lines.push(Line {
            text: format!("({label})"),
            counts: false,
        });
    }

    fn emit(&mut self, instr: impl Into<String>) {
        self.lines.push(Line {
            text: instr.into(),
            counts: true,
        });
    }

    fn push_d(&mut self) {
        self.emit("@SP");
        self.emit("AM=M+1");
        self.emit("A=A-1");
        self.emit("M=D");
    }

    fn new_bool_labels(&mut self) -> (String, String) {
        let n = self.bool_label_counter;
        self.bool_label_counter += 1;
        (format!("bool_label{n}_is_true"), format!("bool_label{n}_all_done"))
    }

    fn scoped_label(&self, label: &str) -> String {
        format!("{}${}", self.current_function, label)
    }

    // --- push / pop -------------------------------------------------------

    pub fn write_push(&mut self, segment: Segment, index: u16) -> Result<()> {
        self.emit_comment(format!("push {} {}", segment_name(segment), index));
        match segment {
            Segment::Constant => {
                self.emit(format!("@{index}"));
                self.emit("D=A");
            }
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                self.emit(format!("@{}", base_symbol(segment)));
                self.emit("D=M");
                self.emit(format!("@{index}"));
                self.emit("A=D+A");
                self.emit("D=M");
            }
            Segment::Pointer => {
                self.emit(format!("@R{}", 3 + index));
                self.emit("D=M");
            }
            Segment::Temp => {
                self.emit(format!("@R{}", 5 + index));
                self.emit("D=M");
            }
            Segment::Static => {
                self.emit(format!("@{}.{index}", self.current_file));
                self.emit("D=M");
            }
        }
        self.push_d();
        Ok(())
    }

    pub fn write_pop(&mut self, segment: Segment, index: u16) -> Result<()> {
        self.emit_comment(format!("pop {} {}", segment_name(segment), index));
        match segment {
            Segment::Constant => {
                return Err(Error::semantic("cannot pop into the constant segment"));
            }
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                self.emit(format!("@{}", base_symbol(segment)));
                self.emit("D=M");
                self.emit(format!("@{index}"));
                self.emit("D=D+A");
                self.emit("@R15");
                self.emit("M=D");
                self.emit("@SP");
                self.emit("AM=M-1");
                self.emit("D=M");
                self.emit("@R15");
                self.emit("A=M");
                self.emit("M=D");
            }
            Segment::Pointer => {
                self.emit("@SP");
                self.emit("AM=M-1");
                self.emit("D=M");
                self.emit(format!("@R{}", 3 + index));
                self.emit("M=D");
            }
            Segment::Temp => {
                self.emit("@SP");
                self.emit("AM=M-1");
                self.emit("D=M");
                self.emit(format!("@R{}", 5 + index));
                self.emit("M=D");
            }
            Segment::Static => {
                self.emit("@SP");
                self.emit("AM=M-1");
                self.emit("D=M");
                self.emit(format!("@{}.{index}", self.current_file));
                self.emit("M=D");
            }
        }
        Ok(())
    }

    // --- arithmetic ---------------------------------------------------------

    pub fn write_arithmetic(&mut self, op: ArithOp) {
        self.emit_comment(format!("{op:?}").to_lowercase());
        if op.is_unary() {
            self.emit("@SP");
            self.emit("AM=M-1");
            self.emit("D=M");
            self.emit("@R14");
            self.emit("M=D");
            match op {
                ArithOp::Neg => {
                    self.emit("@R14");
                    self.emit("M=-M");
                }
                ArithOp::Not => {
                    self.emit("@R14");
                    self.emit("M=!M");
                }
                _ => unreachable!(),
            }
            self.emit("@R14");
            self.emit("D=M");
            self.push_d();
            return;
        }

        // pop second operand into R13, first into R14
        self.emit("@SP");
        self.emit("AM=M-1");
        self.emit("D=M");
        self.emit("@R13");
        self.emit("M=D");
        self.emit("@SP");
        self.emit("AM=M-1");
        self.emit("D=M");
        self.emit("@R14");
        self.emit("M=D");
        self.emit("@R13");
        self.emit("D=M");

        match op {
            ArithOp::Add => {
                self.emit("@R14");
                self.emit("M=M+D");
            }
            ArithOp::Sub => {
                self.emit("@R14");
                self.emit("M=M-D");
            }
            ArithOp::And => {
                self.emit("@R14");
                self.emit("M=M&D");
            }
            ArithOp::Or => {
                self.emit("@R14");
                self.emit("M=M|D");
            }
            ArithOp::Eq | ArithOp::Gt | ArithOp::Lt => {
                let (is_true, all_done) = self.new_bool_labels();
                self.emit("@R14");
                self.emit("D=M-D");
                self.emit(format!("@{is_true}"));
                let jump = match op {
                    ArithOp::Eq => "D;JEQ",
                    ArithOp::Gt => "D;JGT",
                    ArithOp::Lt => "D;JLT",
                    _ => unreachable!(),
                };
                self.emit(jump);
                self.emit("@R14");
                self.emit("M=0");
                self.emit(format!("@{all_done}"));
                self.emit("0;JMP");
                self.emit_label_decl(&is_true);
                self.emit("@R14");
                self.emit("M=-1");
                self.emit_label_decl(&all_done);
            }
            ArithOp::Neg | ArithOp::Not => unreachable!(),
        }

        self.emit("@R14");
        self.emit("D=M");
        self.push_d();
    }

    // --- control flow -------------------------------------------------------

    pub fn write_label(&mut self, label: &str) {
        self.emit_label_decl(&self.scoped_label(label));
    }

    pub fn write_goto(&mut self, label: &str) {
        self.emit_comment(format!("goto {label}"));
        self.emit(format!("@{}", self.scoped_label(label)));
        self.emit("0;JMP");
    }

    pub fn write_if_goto(&mut self, label: &str) {
        self.emit_comment(format!("if-goto {label}"));
        self.emit("@SP");
        self.emit("AM=M-1");
        self.emit("D=M");
        self.emit(format!("@{}", self.scoped_label(label)));
        self.emit("D;JNE");
    }

    // --- function / call / return --------------------------------------------

    pub fn write_function(&mut self, name: &str, n_locals: u16) {
        self.emit_comment(format!("function {name} {n_locals}"));
        self.emit_label_decl(name);
        self.current_function = name.to_string();
        self.return_counts.insert(name.to_string(), 0);
        for _ in 0..n_locals {
            self.emit("@0");
            self.emit("D=A");
            self.push_d();
        }
    }

    pub fn write_call(&mut self, name: &str, n_args: u16) {
        self.emit_comment(format!("call {name} {n_args}"));
        let r = *self.return_counts.get(&self.current_function).unwrap_or(&0);
        self.return_counts.insert(self.current_function.clone(), r + 1);
        let return_label = format!("{}$return_{r}", self.current_function);

        self.emit(format!("@{return_label}"));
        self.emit("D=A");
        self.push_d();

        for reg in ["LCL", "ARG", "THIS", "THAT"] {
            self.emit(format!("@{reg}"));
            self.emit("D=M");
            self.push_d();
        }

        self.emit("@SP");
        self.emit("D=M");
        self.emit(format!("@{}", n_args as u32 + 5));
        self.emit("D=D-A");
        self.emit("@ARG");
        self.emit("M=D");

        self.emit("@SP");
        self.emit("D=M");
        self.emit("@LCL");
        self.emit("M=D");

        self.emit(format!("@{name}"));
        self.emit("0;JMP");

        self.emit_label_decl(&return_label);
    }

    pub fn write_return(&mut self) {
        self.emit_comment("return");
        // frame pointer -> R13
        self.emit("@LCL");
        self.emit("D=M");
        self.emit("@R13");
        self.emit("M=D");

        // return address -> R14
        self.emit("@R13");
        self.emit("D=M");
        self.emit("@5");
        self.emit("A=D-A");
        self.emit("D=M");
        self.emit("@R14");
        self.emit("M=D");

        // *ARG = pop()
        self.emit("@SP");
        self.emit("AM=M-1");
        self.emit("D=M");
        self.emit("@ARG");
        self.emit("A=M");
        self.emit("M=D");

        // SP = ARG + 1
        self.emit("@ARG");
        self.emit("D=M+1");
        self.emit("@SP");
        self.emit("M=D");

        for reg in ["THAT", "THIS", "ARG", "LCL"] {
            self.emit("@R13");
            self.emit("AM=M-1");
            self.emit("D=M");
            self.emit(format!("@{reg}"));
            self.emit("M=D");
        }

        self.emit("@R14");
        self.emit("A=M");
        self.emit("0;JMP");
    }

    pub fn write_bootstrap(&mut self) {
        self.emit_comment("bootstrap");
        self.emit("@256");
        self.emit("D=A");
        self.emit("@SP");
        self.emit("M=D");
        self.write_call("Sys.init", 0);
    }

    pub fn render(self) -> String {
        let mut out = String::new();
        let mut idx = 0usize;
        for line in self.lines {
            if line.counts {
                let _ = writeln!(out, "{} //{}", line.text, idx);
                idx += 1;
            } else {
                let _ = writeln!(out, "{}", line.text);
            }
        }
        out
    }
}

fn base_symbol(segment: Segment) -> &'static str {
    match segment {
        Segment::Local => "LCL",
        Segment::Argument => "ARG",
        Segment::This => "THIS",
        Segment::That => "THAT",
        _ => unreachable!(),
    }
}

fn segment_name(segment: Segment) -> &'static str {
    match segment {
        Segment::Constant => "constant",
        Segment::Local => "local",
        Segment::Argument => "argument",
        Segment::This => "this",
        Segment::That => "that",
        Segment::Pointer => "pointer",
        Segment::Temp => "temp",
        Segment::Static => "static",
    }
}

/// Translate one file's commands, running against a shared emitter so
/// label counters and the call-return counters stay global across a
/// whole directory's worth of files.
pub fn translate_commands(emitter: &mut AsmEmitter, commands: &[Command]) -> Result<()> {
    for command in commands {
        match command {
            Command::Push(seg, idx) => emitter.write_push(*seg, *idx)?,
            Command::Pop(seg, idx) => emitter.write_pop(*seg, *idx)?,
            Command::Arithmetic(op) => emitter.write_arithmetic(*op),
            Command::Label(name) => emitter.write_label(name),
            Command::Goto(name) => emitter.write_goto(name),
            Command::IfGoto(name) => emitter.write_if_goto(name),
            Command::Function(name, n_locals) => emitter.write_function(name, *n_locals),
            Command::Call(name, n_args) => emitter.write_call(name, *n_args),
            Command::Return => emitter.write_return(),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_constant_emits_at_instruction_then_stack_push() {
        let mut emitter = AsmEmitter::new();
        emitter.write_push(Segment::Constant, 7).unwrap();
        let asm = emitter.render();
        assert!(asm.contains("@7"));
        assert!(asm.contains("D=A"));
        assert!(asm.contains("AM=M+1"));
    }

    #[test]
    fn push_local_dereferences_through_base_register() {
        let mut emitter = AsmEmitter::new();
        emitter.write_push(Segment::Local, 2).unwrap();
        let asm = emitter.render();
        assert!(asm.contains("@LCL"));
        assert!(asm.contains("A=D+A"));
    }

    #[test]
    fn pop_into_constant_segment_is_rejected() {
        let mut emitter = AsmEmitter::new();
        assert!(emitter.write_pop(Segment::Constant, 0).is_err());
    }

    #[test]
    fn relational_arithmetic_mints_unique_bool_labels() {
        let mut emitter = AsmEmitter::new();
        emitter.write_arithmetic(ArithOp::Eq);
        emitter.write_arithmetic(ArithOp::Lt);
        let asm = emitter.render();
        assert!(asm.contains("(bool_label0_is_true)"));
        assert!(asm.contains("(bool_label0_all_done)"));
        assert!(asm.contains("(bool_label1_is_true)"));
        assert!(asm.contains("D;JEQ"));
        assert!(asm.contains("D;JLT"));
    }

    #[test]
    fn labels_are_scoped_under_the_current_function() {
        let mut emitter = AsmEmitter::new();
        emitter.write_function("Main.loop", 0);
        emitter.write_label("WHILE_EXP0");
        let asm = emitter.render();
        assert!(asm.contains("(Main.loop$WHILE_EXP0)"));
    }

    #[test]
    fn call_return_label_is_scoped_and_monotonic() {
        let mut emitter = AsmEmitter::new();
        emitter.write_function("Main.main", 0);
        emitter.write_call("Math.multiply", 2);
        emitter.write_call("Math.divide", 2);
        let asm = emitter.render();
        assert!(asm.contains("(Main.main$return_0)"));
        assert!(asm.contains("(Main.main$return_1)"));
    }

    #[test]
    fn bootstrap_sets_sp_then_calls_sys_init() {
        let mut emitter = AsmEmitter::new();
        emitter.write_bootstrap();
        let asm = emitter.render();
        assert!(asm.contains("@256"));
        assert!(asm.contains("@Sys.init"));
        assert!(asm.contains("($return_0)"));
    }

    #[test]
    fn real_instructions_get_a_monotonic_line_count_suffix() {
        let mut emitter = AsmEmitter::new();
        emitter.write_push(Segment::Constant, 1).unwrap();
        let asm = emitter.render();
        let first_real_line = asm.lines().find(|l| !l.starts_with("//")).unwrap();
        assert!(first_real_line.ends_with("//0"));
    }
}
