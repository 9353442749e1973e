//! Shared diagnostic vocabulary for the Jack compiler and VM translator.
//!
//! Both pipelines are fatal-on-first-error (no recovery, no multi-error
//! reporting): a single [`Error`] aborts the current translation unit. This
//! crate exists so both `jackc` and `vmc` report failures through the same
//! closed set of kinds instead of each growing its own ad-hoc string error.

use std::fmt;
use std::path::PathBuf;

/// A position within a source file, used to anchor diagnostics that can
/// name one (e.g. lexer failures, which scan the file line by line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    /// 1-indexed line number.
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        SourceLocation {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// Everything that can go wrong translating a single source file.
///
/// There are exactly four kinds, matching the reference toolchain's error
/// taxonomy: lexical, syntactic, semantic, and I/O. No variant carries a
/// recovery hint — the caller's only valid response is to abort.
#[derive(Debug)]
pub enum Error {
    /// Invalid identifier, malformed/overflowing integer literal,
    /// unterminated string or block comment.
    Lex {
        message: String,
        location: Option<SourceLocation>,
    },
    /// Expected token kind/value mismatch, or unexpected end of input.
    Parse {
        message: String,
        location: Option<SourceLocation>,
    },
    /// `let` target not a known variable, or an unresolved identifier
    /// reference inside an expression.
    Semantic {
        message: String,
        location: Option<SourceLocation>,
    },
    /// File open, read, or write failure.
    Io(String),
}

impl Error {
    pub fn lex(message: impl Into<String>) -> Self {
        Error::Lex {
            message: message.into(),
            location: None,
        }
    }

    pub fn lex_at(message: impl Into<String>, location: SourceLocation) -> Self {
        Error::Lex {
            message: message.into(),
            location: Some(location),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
            location: None,
        }
    }

    pub fn parse_at(message: impl Into<String>, location: SourceLocation) -> Self {
        Error::Parse {
            message: message.into(),
            location: Some(location),
        }
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Error::Semantic {
            message: message.into(),
            location: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Lex { message, location } => write_kind(f, "lex error", message, location),
            Error::Parse { message, location } => write_kind(f, "parse error", message, location),
            Error::Semantic { message, location } => {
                write_kind(f, "semantic error", message, location)
            }
            Error::Io(message) => write!(f, "I/O error: {message}"),
        }
    }
}

fn write_kind(
    f: &mut fmt::Formatter<'_>,
    kind: &str,
    message: &str,
    location: &Option<SourceLocation>,
) -> fmt::Result {
    match location {
        Some(loc) => write!(f, "{kind} at {loc}: {message}"),
        None => write!(f, "{kind}: {message}"),
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

/// Result alias used throughout both pipelines.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_when_present() {
        let err = Error::parse_at("expected ')'", SourceLocation::new("Foo.jack", 12));
        assert_eq!(err.to_string(), "parse error at Foo.jack:12: expected ')'");
    }

    #[test]
    fn display_without_location() {
        let err = Error::semantic("unresolved identifier 'x'");
        assert_eq!(err.to_string(), "semantic error: unresolved identifier 'x'");
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
