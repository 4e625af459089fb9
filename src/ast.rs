//! The passive AST data model produced by [`crate::parse`].
//!
//! These types carry no behavior beyond construction and equality — they
//! are the compatibility contract between the parser and downstream code
//! generators/validators, the same role `protobuf-codegen-pure`'s `model.rs`
//! types play for its own codegen. Every ordered list here preserves
//! source order.

/// Top-level AST root for a single parsed `.proto` file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileNode {
    pub syntax: String,
    pub package: Option<String>,
    pub imports: Vec<Import>,
    pub options: Vec<Opt>,
    pub messages: Vec<Message>,
    pub enums: Vec<Enum>,
    pub services: Vec<Service>,
}

/// How an `import` statement affects transitive visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportModifier {
    None,
    Public,
    Weak,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub path: String,
    pub modifier: ImportModifier,
}

/// One of the fifteen proto3 built-in primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarKind {
    /// The set of scalar kinds proto3 permits as a map key (invariant 5).
    pub fn is_valid_map_key(self) -> bool {
        !matches!(self, ScalarKind::Double | ScalarKind::Float | ScalarKind::Bytes)
    }

    pub fn keyword(name: &str) -> Option<ScalarKind> {
        Some(match name {
            "double" => ScalarKind::Double,
            "float" => ScalarKind::Float,
            "int32" => ScalarKind::Int32,
            "int64" => ScalarKind::Int64,
            "uint32" => ScalarKind::Uint32,
            "uint64" => ScalarKind::Uint64,
            "sint32" => ScalarKind::Sint32,
            "sint64" => ScalarKind::Sint64,
            "fixed32" => ScalarKind::Fixed32,
            "fixed64" => ScalarKind::Fixed64,
            "sfixed32" => ScalarKind::Sfixed32,
            "sfixed64" => ScalarKind::Sfixed64,
            "bool" => ScalarKind::Bool,
            "string" => ScalarKind::String,
            "bytes" => ScalarKind::Bytes,
            _ => return None,
        })
    }
}

/// A dotted type name, e.g. `foo.Bar` or `.foo.Bar` (fully qualified).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub leading_dot: bool,
    pub parts: Vec<String>,
}

impl TypeRef {
    pub fn to_display_string(&self) -> String {
        let mut s = String::new();
        if self.leading_dot {
            s.push('.');
        }
        s.push_str(&self.parts.join("."));
        s
    }
}

/// The type a field's value holds.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Scalar(ScalarKind),
    Named(TypeRef),
    Map(ScalarKind, Box<FieldType>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub number: i64,
    pub ty: FieldType,
    pub is_repeated: bool,
    pub is_optional: bool,
    pub options: Vec<Opt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Oneof {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub name: String,
    pub fields: Vec<Field>,
    pub oneofs: Vec<Oneof>,
    pub messages: Vec<Message>,
    pub enums: Vec<Enum>,
    pub options: Vec<Opt>,
    pub reserved: Vec<Reserved>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
    pub options: Vec<Opt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub name: String,
    pub values: Vec<EnumValue>,
    pub options: Vec<Opt>,
    pub reserved: Vec<Reserved>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rpc {
    pub name: String,
    pub input_type: TypeRef,
    pub output_type: TypeRef,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub options: Vec<Opt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub name: String,
    pub rpcs: Vec<Rpc>,
    pub options: Vec<Opt>,
}

/// The value side of an option assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    Identifier(String),
    Array(Vec<Value>),
    Map(Vec<(String, Value)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Opt {
    pub name: String,
    pub value: Value,
}

/// One entry of a `reserved` statement: either a closed number range or a
/// reserved field name. A single message/enum may accumulate both kinds
/// across separate `reserved` statements (never within one statement).
#[derive(Debug, Clone, PartialEq)]
pub enum Reserved {
    NumberRange(i64, i64),
    Name(String),
}

impl Reserved {
    pub fn contains_number(&self, n: i64) -> bool {
        match self {
            Reserved::NumberRange(lo, hi) => n >= *lo && n <= *hi,
            Reserved::Name(_) => false,
        }
    }

    pub fn contains_name(&self, name: &str) -> bool {
        match self {
            Reserved::Name(n) => n == name,
            Reserved::NumberRange(_, _) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_double_and_bytes_are_not_valid_map_keys() {
        assert!(!ScalarKind::Float.is_valid_map_key());
        assert!(!ScalarKind::Double.is_valid_map_key());
        assert!(!ScalarKind::Bytes.is_valid_map_key());
        assert!(ScalarKind::String.is_valid_map_key());
        assert!(ScalarKind::Int64.is_valid_map_key());
    }

    #[test]
    fn keyword_roundtrips_every_scalar() {
        for (text, kind) in [
            ("double", ScalarKind::Double),
            ("float", ScalarKind::Float),
            ("int32", ScalarKind::Int32),
            ("int64", ScalarKind::Int64),
            ("uint32", ScalarKind::Uint32),
            ("uint64", ScalarKind::Uint64),
            ("sint32", ScalarKind::Sint32),
            ("sint64", ScalarKind::Sint64),
            ("fixed32", ScalarKind::Fixed32),
            ("fixed64", ScalarKind::Fixed64),
            ("sfixed32", ScalarKind::Sfixed32),
            ("sfixed64", ScalarKind::Sfixed64),
            ("bool", ScalarKind::Bool),
            ("string", ScalarKind::String),
            ("bytes", ScalarKind::Bytes),
        ] {
            assert_eq!(ScalarKind::keyword(text), Some(kind));
        }
        assert_eq!(ScalarKind::keyword("Foo"), None);
    }

    #[test]
    fn type_ref_display_string_includes_leading_dot() {
        let qualified = TypeRef {
            leading_dot: true,
            parts: vec!["pkg".to_string(), "Msg".to_string()],
        };
        assert_eq!(qualified.to_display_string(), ".pkg.Msg");

        let relative = TypeRef {
            leading_dot: false,
            parts: vec!["Msg".to_string()],
        };
        assert_eq!(relative.to_display_string(), "Msg");
    }

    #[test]
    fn reserved_number_range_and_name_containment() {
        let range = Reserved::NumberRange(9, 11);
        assert!(range.contains_number(9));
        assert!(range.contains_number(11));
        assert!(!range.contains_number(12));
        assert!(!range.contains_name("foo"));

        let name = Reserved::Name("foo".to_string());
        assert!(name.contains_name("foo"));
        assert!(!name.contains_name("bar"));
        assert!(!name.contains_number(1));
    }
}
