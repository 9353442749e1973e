//! VM command vocabulary and line-oriented parser.

use n2t_diagnostics::{Error, Result};

/// The eight VM memory segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Local,
    Argument,
    This,
    That,
    Pointer,
    Temp,
    Static,
}

impl Segment {
    fn from_str(s: &str) -> Option<Segment> {
        Some(match s {
            "constant" => Segment::Constant,
            "local" => Segment::Local,
            "argument" => Segment::Argument,
            "this" => Segment::This,
            "that" => Segment::That,
            "pointer" => Segment::Pointer,
            "temp" => Segment::Temp,
            "static" => Segment::Static,
            _ => return None,
        })
    }
}

/// The nine arithmetic/logical commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl ArithOp {
    fn from_str(s: &str) -> Option<ArithOp> {
        Some(match s {
            "add" => ArithOp::Add,
            "sub" => ArithOp::Sub,
            "neg" => ArithOp::Neg,
            "eq" => ArithOp::Eq,
            "gt" => ArithOp::Gt,
            "lt" => ArithOp::Lt,
            "and" => ArithOp::And,
            "or" => ArithOp::Or,
            "not" => ArithOp::Not,
            _ => return None,
        })
    }

    /// True for the two commands that take a single operand.
    pub fn is_unary(&self) -> bool {
        matches!(self, ArithOp::Neg | ArithOp::Not)
    }
}

/// One parsed VM command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Push(Segment, u16),
    Pop(Segment, u16),
    Arithmetic(ArithOp),
    Label(String),
    Goto(String),
    IfGoto(String),
    Function(String, u16),
    Call(String, u16),
    Return,
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_u16(s: &str) -> Result<u16> {
    s.parse()
        .map_err(|_| Error::parse(format!("expected a non-negative integer, found '{s}'")))
}

/// Parse one line of VM source, returning `None` for blank/comment-only
/// lines.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let trimmed = strip_comment(line).trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let mut parts = trimmed.split_whitespace();
    let head = parts.next().expect("non-empty after trim");

    let command = if let Some(op) = ArithOp::from_str(head) {
        Command::Arithmetic(op)
    } else {
        match head {
            "push" | "pop" => {
                let segment_str = parts
                    .next()
                    .ok_or_else(|| Error::parse(format!("'{head}' missing a segment")))?;
                let segment = Segment::from_str(segment_str)
                    .ok_or_else(|| Error::parse(format!("unknown segment '{segment_str}'")))?;
                let index_str = parts
                    .next()
                    .ok_or_else(|| Error::parse(format!("'{head}' missing an index")))?;
                let index = parse_u16(index_str)?;
                if head == "push" {
                    Command::Push(segment, index)
                } else {
                    Command::Pop(segment, index)
                }
            }
            "label" => Command::Label(expect_name(&mut parts, "label")?),
            "goto" => Command::Goto(expect_name(&mut parts, "goto")?),
            "if-goto" => Command::IfGoto(expect_name(&mut parts, "if-goto")?),
            "function" | "call" => {
                let name = parts
                    .next()
                    .ok_or_else(|| Error::parse(format!("'{head}' missing a name")))?
                    .to_string();
                let count_str = parts
                    .next()
                    .ok_or_else(|| Error::parse(format!("'{head}' missing a count")))?;
                let count = parse_u16(count_str)?;
                if head == "function" {
                    Command::Function(name, count)
                } else {
                    Command::Call(name, count)
                }
            }
            "return" => Command::Return,
            other => return Err(Error::parse(format!("unknown VM command '{other}'"))),
        }
    };

    Ok(Some(command))
}

fn expect_name(parts: &mut std::str::SplitWhitespace<'_>, command: &str) -> Result<String> {
    parts
        .next()
        .map(|s| s.to_string())
        .ok_or_else(|| Error::parse(format!("'{command}' missing a label name")))
}

/// Parse a complete VM file's worth of source lines.
pub fn parse(source: &str) -> Result<Vec<Command>> {
    source.lines().filter_map(|line| parse_line(line).transpose()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_push_and_pop_with_segment_and_index() {
        assert_eq!(
            parse_line("push constant 17").unwrap(),
            Some(Command::Push(Segment::Constant, 17))
        );
        assert_eq!(
            parse_line("pop local 2").unwrap(),
            Some(Command::Pop(Segment::Local, 2))
        );
    }

    #[test]
    fn blank_and_comment_only_lines_yield_none() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("// just a comment").unwrap(), None);
    }

    #[test]
    fn strips_trailing_comment_on_a_real_command() {
        assert_eq!(
            parse_line("add // sum the top two").unwrap(),
            Some(Command::Arithmetic(ArithOp::Add))
        );
    }

    #[test]
    fn parses_function_and_call_headers() {
        assert_eq!(
            parse_line("function Main.main 2").unwrap(),
            Some(Command::Function("Main.main".into(), 2))
        );
        assert_eq!(
            parse_line("call Math.multiply 2").unwrap(),
            Some(Command::Call("Math.multiply".into(), 2))
        );
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(parse_line("frobnicate").is_err());
    }

    #[test]
    fn parses_a_multi_line_program_skipping_blanks() {
        let program = "push constant 1\n\n// comment\npush constant 2\nadd\n";
        let commands = parse(program).unwrap();
        assert_eq!(
            commands,
            vec![
                Command::Push(Segment::Constant, 1),
                Command::Push(Segment::Constant, 2),
                Command::Arithmetic(ArithOp::Add),
            ]
        );
    }
}
