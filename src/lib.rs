//! A hand-written recursive-descent parser for proto3 `.proto` source
//! files.
//!
//! [`parse`] turns the text of a single `.proto` file into a [`FileNode`],
//! the crate's passive AST, or a [`ParserError`] naming the first rule
//! violated and the source position it was found at. Parsing and semantic
//! validation (duplicate field numbers, reserved-range collisions, the
//! enum first-value rule, and so on) happen in the same pass — there is no
//! separate validation stage to run afterwards.
//!
//! ```
//! let file = protoparse::parse(r#"
//!     syntax = "proto3";
//!     message Greeting {
//!         string text = 1;
//!     }
//! "#).unwrap();
//! assert_eq!(file.messages[0].name, "Greeting");
//! ```

mod ast;
mod error;
mod lexer;
mod parser;

pub use ast::{
    Enum, EnumValue, Field, FieldType, FileNode, Import, ImportModifier, Message, Oneof, Opt,
    Reserved, Rpc, ScalarKind, Service, TypeRef, Value,
};
pub use error::{FieldNumberReason, LexError, NameKind, ParserError, ParserErrorKind};
pub use lexer::Loc;

/// Parses a single `.proto` source file.
pub fn parse(input: &str) -> Result<FileNode, ParserError> {
    parser::parse(input)
}
