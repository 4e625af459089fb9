//! The closed error taxonomy returned by [`crate::parse`].
//!
//! Modeled by hand, with manual `Display`/`Error` impls, the way
//! `protobuf/src/json/parse.rs`'s `ParseErrorWithoutLoc` is implemented,
//! rather than via a derive-macro crate such as `thiserror`.

use std::fmt;

use crate::lexer::Loc;

/// Reason a field number was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldNumberReason {
    Zero,
    ReservedRange,
    TooLarge,
}

impl fmt::Display for FieldNumberReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldNumberReason::Zero => write!(f, "field numbers must start at 1"),
            FieldNumberReason::ReservedRange => {
                write!(f, "field numbers 19000 to 19999 are reserved for protobuf implementation internals")
            }
            FieldNumberReason::TooLarge => write!(f, "field number is larger than 536870911"),
        }
    }
}

/// The position-independent kind of a lexical error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    UnexpectedCharacter(char),
    UnterminatedString,
    InvalidEscape,
    UnterminatedComment,
    InvalidNumber,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LexError::UnexpectedCharacter(c) => write!(f, "unexpected character '{}'", c),
            LexError::UnterminatedString => write!(f, "unterminated string literal"),
            LexError::InvalidEscape => write!(f, "invalid escape sequence in string literal"),
            LexError::UnterminatedComment => write!(f, "unterminated block comment"),
            LexError::InvalidNumber => write!(f, "invalid numeric literal"),
        }
    }
}

/// What kind of production a rejected name belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Message,
    Enum,
    Service,
    Rpc,
    Field,
    OneofName,
    PackageSegment,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            NameKind::Message => "message name",
            NameKind::Enum => "enum name",
            NameKind::Service => "service name",
            NameKind::Rpc => "rpc name",
            NameKind::Field => "field name",
            NameKind::OneofName => "oneof name",
            NameKind::PackageSegment => "package name segment",
        };
        write!(f, "{}", s)
    }
}

/// The closed taxonomy of errors `protoparse` can raise.
///
/// Every variant corresponds 1:1 to a rule named in the grammar or a
/// semantic invariant on the AST; none of them are produced by a catch-all
/// branch.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserErrorKind {
    // Lex errors.
    Lex(LexError),

    // Shape errors.
    InvalidName(NameKind, String),
    InvalidFieldNumber(i64, FieldNumberReason),
    InvalidOptionName,
    InvalidOptionValue,
    InvalidStream,
    InvalidMapKey,
    InvalidMapValue,

    // Structural errors.
    UnexpectedToken { got: String, expected: String },
    UnexpectedEof { expected: String },
    MissingSemicolon,
    MissingType,
    EmptyEnum,
    EmptyOneof,
    EmptyBlockWhereRequired,

    // Semantic errors.
    DuplicateFieldNumber(i64),
    DuplicateFieldName(String),
    DuplicateEnumValue(String),
    EnumFirstValueNotZero,
    ReservedFieldCollision,
    ReservedNameCollision(String),
    DuplicateTypeName(String),
    DuplicatePackage,
    DuplicateOption(String),
    RequiredNotAllowed,
    SyntaxNotFirst,
    InvalidSyntaxValue(String),
    MaxNestingDepthExceeded,
}

impl fmt::Display for ParserErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParserErrorKind::Lex(e) => write!(f, "{}", e),
            ParserErrorKind::InvalidName(kind, text) => {
                write!(f, "invalid {}: `{}`", kind, text)
            }
            ParserErrorKind::InvalidFieldNumber(n, reason) => {
                write!(f, "invalid field number {}: {}", n, reason)
            }
            ParserErrorKind::InvalidOptionName => write!(f, "invalid option name"),
            ParserErrorKind::InvalidOptionValue => write!(f, "invalid option value"),
            ParserErrorKind::InvalidStream => write!(f, "invalid use of `stream`"),
            ParserErrorKind::InvalidMapKey => write!(f, "invalid map key type"),
            ParserErrorKind::InvalidMapValue => write!(f, "invalid map value type"),
            ParserErrorKind::UnexpectedToken { got, expected } => {
                write!(f, "expected {}, found {}", expected, got)
            }
            ParserErrorKind::UnexpectedEof { expected } => {
                write!(f, "expected {}, found end of file", expected)
            }
            ParserErrorKind::MissingSemicolon => write!(f, "missing `;`"),
            ParserErrorKind::MissingType => write!(f, "missing type"),
            ParserErrorKind::EmptyEnum => write!(f, "enum must have at least one value"),
            ParserErrorKind::EmptyOneof => write!(f, "oneof must have at least one field"),
            ParserErrorKind::EmptyBlockWhereRequired => write!(f, "block must not be empty"),
            ParserErrorKind::DuplicateFieldNumber(n) => {
                write!(f, "field number {} is already in use", n)
            }
            ParserErrorKind::DuplicateFieldName(name) => {
                write!(f, "field name `{}` is already in use", name)
            }
            ParserErrorKind::DuplicateEnumValue(name) => {
                write!(f, "enum value `{}` is already in use", name)
            }
            ParserErrorKind::EnumFirstValueNotZero => {
                write!(f, "the first value in an enum must have number 0")
            }
            ParserErrorKind::ReservedFieldCollision => {
                write!(f, "field number collides with a reserved range")
            }
            ParserErrorKind::ReservedNameCollision(name) => {
                write!(f, "field name `{}` collides with a reserved name", name)
            }
            ParserErrorKind::DuplicateTypeName(name) => {
                write!(f, "type name `{}` is already declared in this scope", name)
            }
            ParserErrorKind::DuplicatePackage => write!(f, "duplicate package declaration"),
            ParserErrorKind::DuplicateOption(name) => {
                write!(f, "duplicate option `{}`", name)
            }
            ParserErrorKind::RequiredNotAllowed => {
                write!(f, "required fields are not allowed in proto3")
            }
            ParserErrorKind::SyntaxNotFirst => {
                write!(f, "syntax declaration must be the first statement in the file")
            }
            ParserErrorKind::InvalidSyntaxValue(s) => {
                write!(f, "unknown syntax `{}`, only \"proto3\" is supported", s)
            }
            ParserErrorKind::MaxNestingDepthExceeded => {
                write!(f, "message nesting depth exceeds the maximum of 100")
            }
        }
    }
}

/// An error produced while parsing a `.proto` source file.
///
/// Carries the location the offending rule fired at, so that consumers can
/// render a `file:line:col: message` diagnostic without re-scanning the
/// source.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub kind: ParserErrorKind,
    pub loc: Loc,
}

impl ParserError {
    pub(crate) fn new(kind: ParserErrorKind, loc: Loc) -> ParserError {
        ParserError { kind, loc }
    }
}

impl fmt::Display for ParserError {
    #[cfg(not(feature = "pretty-errors"))]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at line {}, column {}", self.kind, self.loc.line, self.loc.col)
    }

    #[cfg(feature = "pretty-errors")]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.loc, self.kind)
    }
}

impl std::error::Error for ParserError {}
