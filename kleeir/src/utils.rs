use std::ops::Range;

use strum::EnumIs;
use thiserror::Error;

use crate::metadata::MetaId;

/// A single diagnostic produced while lexing or parsing a module.
///
/// `span` is a byte range into the text that was handed to the parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseError {
    pub message: String,
    pub span: Range<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Move the span by `offset` bytes.
    pub fn shifted(mut self, offset: usize) -> Self {
        self.span = (self.span.start + offset)..(self.span.end + offset);
        self
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}: {}", self.span.start, self.span.end, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs, Error)]
pub enum Error {
    /// The text of module `module` could not be parsed.
    #[error(
        "Module #{module} is not valid textual IR: {} error(s), first: {}",
        .errors.len(),
        .errors.first().map(|e| e.message.as_str()).unwrap_or("<unknown>")
    )]
    ParserErrors {
        module: usize,
        errors: Vec<ParseError>,
    },

    /// The container does not hold a single module.
    #[error("The input container does not hold any module.")]
    EmptyContainer,

    /// Two functions of the same module share a name.
    #[error("Function `@{name}` is defined more than once within the same module.")]
    DuplicateFunction { name: String },

    /// Two metadata nodes of the same module share an id.
    #[error("Metadata node `{id}` is defined more than once within the same module.")]
    DuplicateMetadata { id: MetaId },

    /// A metadata reference does not resolve within the module.
    #[error("{context} refers to metadata node `{id}`, which is not defined within the module.")]
    UndefinedMetadata { id: MetaId, context: String },
}
