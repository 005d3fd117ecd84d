//! Generate Go struct definitions from JSON Schema documents.
//!
//! The pipeline has three stages: [`schema::parse`] turns each JSON
//! document into an arena-backed [`Document`], [`resolver::RefResolver`]
//! indexes every node by absolute URI so `$ref`s resolve across the whole
//! document set, and [`typegen::create_types`] walks the documents into a
//! flat [`TypeModel`] of named struct and alias declarations that
//! [`output::output`] writes out as a Go source file.
//!
//! ```
//! use url::Url;
//! use go_schema_gen::{generate_to_writer, SchemaInput};
//!
//! let input = SchemaInput {
//!     text: r##"{
//!         "title": "Example",
//!         "type": "object",
//!         "required": ["name"],
//!         "properties": { "name": { "type": "string" } }
//!     }"##
//!     .to_string(),
//!     source_uri: Url::parse("file:///example.json").unwrap(),
//! };
//!
//! let mut generated: Vec<u8> = Vec::new();
//! generate_to_writer(&[input], "models", false, &mut generated).unwrap();
//! assert!(String::from_utf8(generated)
//!     .unwrap()
//!     .contains("Name string `json:\"name\"`"));
//! ```

use std::io::Write;

use url::Url;

pub mod error;
pub mod json_pointer;
pub mod output;
pub mod resolver;
pub mod schema;
pub mod typegen;

pub use error::{GenerateError, ResolveError, SchemaError, TypegenError, TypegenFailure};
pub use resolver::RefResolver;
pub use schema::{Document, SchemaNode, SchemaRef};
pub use typegen::{create_types, TypeModel};

/// One schema document to generate from: its raw JSON text and the URI it
/// was loaded from, used as the base for relative `$ref`s and as the
/// document identity when no `$id` is declared.
#[derive(Debug, Clone)]
pub struct SchemaInput {
    pub text: String,
    pub source_uri: Url,
}

/// Runs the whole pipeline over a set of schema documents and writes the
/// generated Go file to `writer`. Nothing is written unless every stage
/// succeeds.
///
/// # Errors
///
/// Returns the first parse failure, or the aggregated resolution failure,
/// or any I/O error from the writer.
pub fn generate_to_writer<W: Write>(
    inputs: &[SchemaInput],
    package: &str,
    schema_key_required: bool,
    writer: &mut W,
) -> Result<(), GenerateError> {
    let mut docs: Vec<Document> = Vec::with_capacity(inputs.len());
    for input in inputs {
        docs.push(schema::parse(
            &input.text,
            &input.source_uri,
            schema_key_required,
        )?);
    }
    let model: TypeModel = typegen::create_types(&docs)?;
    output::output(writer, &model, package)?;
    Ok(())
}
