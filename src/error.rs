//! Error taxonomy for schema parsing, reference resolution and type
//! resolution.
//!
//! Parse and identifier errors abort processing of the offending document.
//! Reference and type-resolution errors are accumulated across the whole
//! walk and returned together (see [`TypegenFailure`]), so a schema author
//! gets the full list in one pass.

use thiserror::Error;

use crate::typegen::TypeModel;

/// Errors raised while parsing a single schema document.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The root schema lacks the `$schema` version marker and the caller
    /// required one.
    #[error("JSON schema must have a $schema key")]
    MissingSchemaVersion,

    /// The root's resolved identifier is not an absolute URI.
    #[error("$id of document \"{document}\" is not an absolute URI: \"{id}\"")]
    InvalidRootIdentifier { document: String, id: String },

    /// Malformed JSON, with the position serde_json reported.
    #[error("cannot parse JSON schema due to a syntax error at line {line}, character {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
}

/// Errors raised while building or querying the reference index.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Two distinct nodes claimed the same URI during index construction,
    /// almost always a self-referential or malformed schema.
    #[error("attempted to add duplicate schema URI \"{uri}\" in document \"{document}\"")]
    DuplicateSchemaUri { uri: String, document: String },

    /// A `$ref` could not be matched in the reference index. Carries both
    /// the raw ref string and the enclosing document id so the message is
    /// actionable.
    #[error("reference \"{reference}\" not found in document \"{document}\"")]
    UnresolvedReference { reference: String, document: String },
}

/// A single accumulated problem from the type resolution walk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypegenError {
    #[error("reference \"{reference}\" not found in document \"{document}\"")]
    UnresolvedReference { reference: String, document: String },

    /// The schema `type` keyword held something other than the seven JSON
    /// Schema primitive kinds.
    #[error("unknown JSON Schema type \"{type_value}\" at {pointer}")]
    PrimitiveTypeResolutionFailure { type_value: String, pointer: String },
}

/// Aggregate failure from [`crate::typegen::create_types`]: every problem
/// found during the walk, alongside the partial model that was produced.
#[derive(Debug, Error)]
#[error("{}", join_errors(.errors))]
pub struct TypegenFailure {
    /// Whatever was successfully resolved before/around the errors.
    pub model: TypeModel,
    pub errors: Vec<TypegenError>,
}

fn join_errors(errors: &[TypegenError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<String>>()
        .join(", ")
}

/// Top-level error for the end-to-end generation entry points.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Typegen(#[from] TypegenFailure),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Translates a byte offset into a (line, character) pair by scanning the
/// raw input and counting line-feed bytes. Both are 1-based. Returns `None`
/// when the offset lies beyond the input.
#[must_use]
pub fn line_and_character(bytes: &[u8], offset: usize) -> Option<(usize, usize)> {
    if offset > bytes.len() {
        return None;
    }

    let mut line: usize = 1;
    let mut character: usize = 0;

    for (i, b) in bytes.iter().enumerate() {
        if *b == b'\n' {
            line += 1;
            character = 0;
        }
        character += 1;
        if i == offset {
            return Some((line, character));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_and_character_newline_byte_belongs_to_next_line() {
        assert_eq!(line_and_character(b"Line 1\nLine 2", 6), Some((2, 1)));
    }

    #[test]
    fn line_and_character_crlf_input() {
        assert_eq!(line_and_character(b"Line 1\r\nLine 2", 7), Some((2, 1)));
    }

    #[test]
    fn line_and_character_offset_zero_is_line_one() {
        assert_eq!(line_and_character(b"Line 1\nLine 2", 0), Some((1, 1)));
    }

    #[test]
    fn line_and_character_offset_beyond_input_fails() {
        assert_eq!(line_and_character(b"Line 1\nLine 2", 200), None);
    }

    #[test]
    fn typegen_failure_joins_all_errors() {
        let failure = TypegenFailure {
            model: TypeModel::default(),
            errors: vec![
                TypegenError::UnresolvedReference {
                    reference: "#/definitions/a".to_string(),
                    document: "file:///s.json".to_string(),
                },
                TypegenError::PrimitiveTypeResolutionFailure {
                    type_value: "file".to_string(),
                    pointer: "#/properties/x".to_string(),
                },
            ],
        };
        let message: String = failure.to_string();
        assert!(message.contains("#/definitions/a"));
        assert!(message.contains("unknown JSON Schema type \"file\""));
        assert!(message.contains(", "), "errors must be joined in one message");
    }
}
