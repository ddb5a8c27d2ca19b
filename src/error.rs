//! Typed error taxonomy.
//!
//! The pipeline this crate is built from gets away with `Result<T, String>`
//! everywhere. Altar's callers need to recover an error kind and a source
//! position programmatically (to print a caret under a column, to tell a
//! missing include apart from a malformed one), so each failure mode below
//! is its own struct rather than a formatted string.

use std::fmt;

/// A position inside a named template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    pub template: Option<String>,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(template: Option<&str>, line: usize, column: usize) -> Self {
        Position {
            template: template.map(|s| s.to_string()),
            line,
            column,
        }
    }

    pub fn unknown() -> Self {
        Position::default()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.template, self.line, self.column) {
            (Some(t), 0, 0) => write!(f, "{t}"),
            (Some(t), line, col) => write!(f, "{t}:{line}:{col}"),
            (None, 0, 0) => Ok(()),
            (None, line, col) => write!(f, "line {line}, column {col}"),
        }
    }
}

macro_rules! positioned_error {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub message: String,
            pub position: Position,
        }

        impl $name {
            pub fn new(message: impl Into<String>, position: Position) -> Self {
                $name {
                    message: message.into(),
                    position,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.position.template.is_some() || self.position.line != 0 {
                    write!(f, "{} at {}", self.message, self.position)
                } else {
                    write!(f, "{}", self.message)
                }
            }
        }

        impl std::error::Error for $name {}
    };
}

positioned_error!(LexError);
positioned_error!(ParseError);
positioned_error!(RenderError);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateNotFoundError {
    pub name: String,
}

impl TemplateNotFoundError {
    pub fn new(name: impl Into<String>) -> Self {
        TemplateNotFoundError { name: name.into() }
    }
}

impl fmt::Display for TemplateNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template not found: {}", self.name)
    }
}

impl std::error::Error for TemplateNotFoundError {}

/// The four error kinds a caller can observe, per the failure-policy
/// contract: lex/parse errors are fatal for the template being compiled,
/// render errors are fatal for the current render, and a missing template
/// only matters where the caller didn't ask for `ignore missing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Lex(LexError),
    Parse(ParseError),
    Render(RenderError),
    TemplateNotFound(TemplateNotFoundError),
}

impl Error {
    pub fn lex(message: impl Into<String>, position: Position) -> Self {
        Error::Lex(LexError::new(message, position))
    }

    pub fn parse(message: impl Into<String>, position: Position) -> Self {
        Error::Parse(ParseError::new(message, position))
    }

    pub fn render(message: impl Into<String>, position: Position) -> Self {
        Error::Render(RenderError::new(message, position))
    }

    pub fn template_not_found(name: impl Into<String>) -> Self {
        Error::TemplateNotFound(TemplateNotFoundError::new(name))
    }

    /// True for `TemplateNotFound`, used by `include ... ignore missing`
    /// to decide whether to swallow the error into an empty string.
    pub fn is_template_not_found(&self) -> bool {
        matches!(self, Error::TemplateNotFound(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Lex(e) => write!(f, "{e}"),
            Error::Parse(e) => write!(f, "{e}"),
            Error::Render(e) => write!(f, "{e}"),
            Error::TemplateNotFound(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Lex(e) => Some(e),
            Error::Parse(e) => Some(e),
            Error::Render(e) => Some(e),
            Error::TemplateNotFound(e) => Some(e),
        }
    }
}

pub type AltarResult<T> = Result<T, Error>;
