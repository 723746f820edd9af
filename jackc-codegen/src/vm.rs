//! VM command model
//!
//! Parses one line of textual stack-machine instruction into a tagged
//! variant. This model is independent of the code generator: it operates on
//! already-emitted text, not tokens. An unrecognized or malformed line
//! produces an explicit [`VmCommand::Unknown`] carrier that the lowering
//! caller must reject as fatal — it is never silently dropped.

use jackc_common::{ArithOp, Segment};
use std::fmt;

/// One parsed stack-machine instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmCommand {
    Arithmetic(ArithOp),
    Push { segment: Segment, index: u16 },
    Pop { segment: Segment, index: u16 },
    Label(String),
    Goto(String),
    IfGoto(String),
    Function { name: String, n_locals: u16 },
    Call { name: String, n_args: u16 },
    Return,
    /// Anything outside the fixed instruction vocabulary, carrying the raw
    /// line for the error report downstream.
    Unknown { line: String },
}

impl VmCommand {
    /// Parse one instruction line, split on whitespace. The first token
    /// selects the variant; remaining tokens become typed arguments. A bad
    /// segment word, a missing argument, or a non-numeric index all
    /// classify as `Unknown`.
    pub fn parse(line: &str) -> VmCommand {
        let unknown = || VmCommand::Unknown {
            line: line.trim().to_string(),
        };
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else {
            return unknown();
        };
        let command = if let Some(op) = ArithOp::from_str(first) {
            VmCommand::Arithmetic(op)
        } else {
            match first {
                "push" | "pop" => {
                    let Some(segment) = tokens.next().and_then(Segment::from_str) else {
                        return unknown();
                    };
                    let Some(index) = tokens.next().and_then(|t| t.parse::<u16>().ok()) else {
                        return unknown();
                    };
                    if first == "push" {
                        VmCommand::Push { segment, index }
                    } else {
                        VmCommand::Pop { segment, index }
                    }
                }
                "label" | "goto" | "if-goto" => {
                    let Some(name) = tokens.next() else {
                        return unknown();
                    };
                    let name = name.to_string();
                    match first {
                        "label" => VmCommand::Label(name),
                        "goto" => VmCommand::Goto(name),
                        _ => VmCommand::IfGoto(name),
                    }
                }
                "function" | "call" => {
                    let Some(name) = tokens.next() else {
                        return unknown();
                    };
                    let Some(count) = tokens.next().and_then(|t| t.parse::<u16>().ok()) else {
                        return unknown();
                    };
                    if first == "function" {
                        VmCommand::Function {
                            name: name.to_string(),
                            n_locals: count,
                        }
                    } else {
                        VmCommand::Call {
                            name: name.to_string(),
                            n_args: count,
                        }
                    }
                }
                "return" => VmCommand::Return,
                _ => return unknown(),
            }
        };
        if tokens.next().is_some() {
            return unknown();
        }
        command
    }
}

impl fmt::Display for VmCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmCommand::Arithmetic(op) => write!(f, "{op}"),
            VmCommand::Push { segment, index } => write!(f, "push {segment} {index}"),
            VmCommand::Pop { segment, index } => write!(f, "pop {segment} {index}"),
            VmCommand::Label(name) => write!(f, "label {name}"),
            VmCommand::Goto(name) => write!(f, "goto {name}"),
            VmCommand::IfGoto(name) => write!(f, "if-goto {name}"),
            VmCommand::Function { name, n_locals } => write!(f, "function {name} {n_locals}"),
            VmCommand::Call { name, n_args } => write!(f, "call {name} {n_args}"),
            VmCommand::Return => write!(f, "return"),
            VmCommand::Unknown { line } => write!(f, "{line}"),
        }
    }
}

/// Parse a whole VM source text: strips `//` comments and blank lines,
/// yielding each remaining instruction with its 1-based line number.
pub fn parse_source(source: &str) -> Vec<(usize, VmCommand)> {
    let mut commands = Vec::new();
    for (i, raw) in source.lines().enumerate() {
        let line = match raw.find("//") {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        commands.push((i + 1, VmCommand::parse(line)));
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_push_pop() {
        assert_eq!(
            VmCommand::parse("push constant 17"),
            VmCommand::Push {
                segment: Segment::Constant,
                index: 17
            }
        );
        assert_eq!(
            VmCommand::parse("pop static 3"),
            VmCommand::Pop {
                segment: Segment::Static,
                index: 3
            }
        );
    }

    #[test]
    fn test_parse_branching_and_calls() {
        assert_eq!(
            VmCommand::parse("if-goto WHILE_END0"),
            VmCommand::IfGoto("WHILE_END0".to_string())
        );
        assert_eq!(
            VmCommand::parse("function Main.main 2"),
            VmCommand::Function {
                name: "Main.main".to_string(),
                n_locals: 2
            }
        );
        assert_eq!(
            VmCommand::parse("call Math.multiply 2"),
            VmCommand::Call {
                name: "Math.multiply".to_string(),
                n_args: 2
            }
        );
        assert_eq!(VmCommand::parse("return"), VmCommand::Return);
        assert_eq!(VmCommand::parse("add"), VmCommand::Arithmetic(ArithOp::Add));
    }

    #[test]
    fn test_unrecognized_first_token_is_explicit_unknown() {
        assert_eq!(
            VmCommand::parse("flurb local 1"),
            VmCommand::Unknown {
                line: "flurb local 1".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_arguments_are_unknown() {
        // bad segment word
        assert!(matches!(
            VmCommand::parse("push heap 0"),
            VmCommand::Unknown { .. }
        ));
        // missing index
        assert!(matches!(
            VmCommand::parse("push constant"),
            VmCommand::Unknown { .. }
        ));
        // non-numeric index
        assert!(matches!(
            VmCommand::parse("pop local x"),
            VmCommand::Unknown { .. }
        ));
        // trailing junk
        assert!(matches!(
            VmCommand::parse("return 0"),
            VmCommand::Unknown { .. }
        ));
        assert!(matches!(
            VmCommand::parse("add 5"),
            VmCommand::Unknown { .. }
        ));
    }

    #[test]
    fn test_parse_source_strips_comments_and_blanks() {
        let source = "// header\n\npush constant 1 // trailing\n  add\n";
        let commands = parse_source(source);
        assert_eq!(
            commands,
            vec![
                (
                    3,
                    VmCommand::Push {
                        segment: Segment::Constant,
                        index: 1
                    }
                ),
                (4, VmCommand::Arithmetic(ArithOp::Add)),
            ]
        );
    }
}
