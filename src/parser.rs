//! Hand-written recursive-descent parser for proto3 source files.
//!
//! The parser holds a single token of lookahead (`self.current`) and is
//! built from a small set of primitive operations — `peek`/`bump`/
//! `expect_kind`/`expect_ident` — the same shape of engine
//! `protobuf-codegen-pure/src/model.rs`'s hand-rolled parser is built
//! from. Semantic validation (field-number ranges,
//! reserved collisions, the enum first-value rule, duplicate detection) is
//! interleaved directly into the grammar productions below rather than
//! run as a separate pass.

use std::collections::HashSet;

use crate::ast::*;
use crate::error::{FieldNumberReason, LexError, NameKind, ParserError, ParserErrorKind};
use crate::lexer::{IntRadix, Lexer, Loc, Token, TokenKind};

pub const MAX_FIELD_NUMBER: i64 = 536_870_911;
const RESERVED_SYSTEM_RANGE: std::ops::RangeInclusive<i64> = 19000..=19999;
const MAX_NESTING_DEPTH: u32 = 100;

/// Parses a single `.proto` source file into a validated [`FileNode`].
pub fn parse(input: &str) -> Result<FileNode, ParserError> {
    let mut parser = Parser::new(input)?;
    parser.parse_file()
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    depth: u32,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Result<Parser<'a>, ParserError> {
        let mut lexer = Lexer::new(src);
        let current = lexer
            .next_token()
            .map_err(|(e, loc)| ParserError::new(ParserErrorKind::Lex(e), loc))?;
        Ok(Parser {
            lexer,
            current,
            depth: 0,
        })
    }

    fn loc(&self) -> Loc {
        self.current.loc
    }

    fn bump(&mut self) -> Result<Token, ParserError> {
        let next = self
            .lexer
            .next_token()
            .map_err(|(e, loc)| ParserError::new(ParserErrorKind::Lex(e), loc))?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn expect_kind(&mut self, kind: TokenKind) -> Result<(), ParserError> {
        if self.current.kind == kind {
            self.bump()?;
            Ok(())
        } else {
            Err(self.unexpected(format!("{}", kind)))
        }
    }

    /// Consumes a statement-terminating `;`, raising the dedicated
    /// `MissingSemicolon` variant rather than the generic `UnexpectedToken`/
    /// `UnexpectedEof` `expect_kind` would produce.
    fn expect_semi(&mut self) -> Result<(), ParserError> {
        if self.current.kind == TokenKind::Semi {
            self.bump()?;
            Ok(())
        } else {
            Err(ParserError::new(ParserErrorKind::MissingSemicolon, self.loc()))
        }
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParserError {
        let expected = expected.into();
        if self.current.kind == TokenKind::Eof {
            ParserError::new(ParserErrorKind::UnexpectedEof { expected }, self.loc())
        } else {
            ParserError::new(
                ParserErrorKind::UnexpectedToken {
                    got: format!("{}", self.current.kind),
                    expected,
                },
                self.loc(),
            )
        }
    }

    fn is_ident(&self, text: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Ident(s) if s == text)
    }

    fn ident_text(&self) -> Option<&str> {
        match &self.current.kind {
            TokenKind::Ident(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Consumes the current token as an identifier, regardless of text.
    fn expect_any_ident(&mut self) -> Result<String, ParserError> {
        match &self.current.kind {
            TokenKind::Ident(s) => {
                let s = s.clone();
                self.bump()?;
                Ok(s)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Consumes the current token, which must be the exact keyword `text`.
    fn expect_keyword(&mut self, text: &str) -> Result<Loc, ParserError> {
        if self.is_ident(text) {
            let loc = self.loc();
            self.bump()?;
            Ok(loc)
        } else {
            Err(self.unexpected(format!("`{}`", text)))
        }
    }

    /// Consumes the keyword `text` and then a name of `kind`. Because the
    /// parser always has the *next* token already lexed, a lexical failure
    /// on a non-ASCII name (e.g. `message 测试 {}`) surfaces while bumping
    /// past the keyword, before `parse_name` ever runs — so a lex error
    /// encountered here is reported as an invalid name of `kind` rather than
    /// as a raw lex error.
    fn expect_keyword_then_name(&mut self, text: &str, kind: NameKind) -> Result<String, ParserError> {
        if !self.is_ident(text) {
            return Err(self.unexpected(format!("`{}`", text)));
        }
        if let Err(e) = self.bump() {
            return Err(match e.kind {
                ParserErrorKind::Lex(_) => {
                    ParserError::new(ParserErrorKind::InvalidName(kind, String::new()), e.loc)
                }
                _ => e,
            });
        }
        self.parse_name(kind)
    }

    fn check_name_shape(kind: NameKind, text: &str) -> bool {
        let mut chars = text.chars();
        let first = match chars.next() {
            Some(c) => c,
            None => return false,
        };
        match kind {
            NameKind::Message | NameKind::Enum | NameKind::Service | NameKind::Rpc => {
                first.is_ascii_uppercase()
            }
            NameKind::Field | NameKind::OneofName | NameKind::PackageSegment => {
                first.is_ascii_lowercase() || first == '_'
            }
        }
    }

    /// Consumes an identifier token, enforcing the name-shape rule for `kind`.
    fn parse_name(&mut self, kind: NameKind) -> Result<String, ParserError> {
        let loc = self.loc();
        let text = self.expect_any_ident()?;
        if !Self::check_name_shape(kind, &text) {
            return Err(ParserError::new(
                ParserErrorKind::InvalidName(kind, text),
                loc,
            ));
        }
        Ok(text)
    }

    fn parse_int_text(text: &str, radix: IntRadix, loc: Loc) -> Result<i64, ParserError> {
        let r = match radix {
            IntRadix::Decimal => i64::from_str_radix(text, 10),
            IntRadix::Hex => i64::from_str_radix(text, 16),
            IntRadix::Octal => i64::from_str_radix(text, 8),
        };
        r.map_err(|_| ParserError::new(ParserErrorKind::Lex(LexError::InvalidNumber), loc))
    }

    fn parse_integer_literal(&mut self) -> Result<i64, ParserError> {
        let loc = self.loc();
        match self.current.kind.clone() {
            TokenKind::Integer { text, radix } => {
                self.bump()?;
                Self::parse_int_text(&text, radix, loc)
            }
            _ => Err(self.unexpected("integer")),
        }
    }

    // ---- top-level file production -------------------------------------

    fn parse_file(&mut self) -> Result<FileNode, ParserError> {
        let mut file = FileNode {
            syntax: "proto3".to_string(),
            ..FileNode::default()
        };
        let mut header_closed = false;
        let mut package_set = false;
        let mut seen_option_names: HashSet<String> = HashSet::new();
        let mut type_names: HashSet<String> = HashSet::new();

        loop {
            match &self.current.kind {
                TokenKind::Eof => break,
                TokenKind::Semi => {
                    self.bump()?;
                }
                TokenKind::Ident(name) => {
                    let name = name.clone();
                    match name.as_str() {
                        "syntax" => {
                            if header_closed {
                                return Err(ParserError::new(
                                    ParserErrorKind::SyntaxNotFirst,
                                    self.loc(),
                                ));
                            }
                            self.parse_syntax(&mut file)?;
                            header_closed = true;
                        }
                        "package" => {
                            if package_set {
                                return Err(ParserError::new(
                                    ParserErrorKind::DuplicatePackage,
                                    self.loc(),
                                ));
                            }
                            file.package = Some(self.parse_package()?);
                            package_set = true;
                            header_closed = true;
                        }
                        "import" => {
                            file.imports.push(self.parse_import()?);
                            header_closed = true;
                        }
                        "option" => {
                            let loc = self.loc();
                            let (name, value) = self.parse_option_statement()?;
                            if !seen_option_names.insert(name.clone()) {
                                return Err(ParserError::new(
                                    ParserErrorKind::DuplicateOption(name),
                                    loc,
                                ));
                            }
                            file.options.push(Opt { name, value });
                            header_closed = true;
                        }
                        "message" => {
                            let loc = self.loc();
                            let msg = self.parse_message()?;
                            if !type_names.insert(msg.name.clone()) {
                                return Err(ParserError::new(
                                    ParserErrorKind::DuplicateTypeName(msg.name),
                                    loc,
                                ));
                            }
                            file.messages.push(msg);
                            header_closed = true;
                        }
                        "enum" => {
                            let loc = self.loc();
                            let e = self.parse_enum()?;
                            if !type_names.insert(e.name.clone()) {
                                return Err(ParserError::new(
                                    ParserErrorKind::DuplicateTypeName(e.name),
                                    loc,
                                ));
                            }
                            file.enums.push(e);
                            header_closed = true;
                        }
                        "service" => {
                            file.services.push(self.parse_service()?);
                            header_closed = true;
                        }
                        _ => return Err(self.unexpected("a top-level declaration")),
                    }
                }
                _ => return Err(self.unexpected("a top-level declaration")),
            }
        }

        Ok(file)
    }

    fn parse_syntax(&mut self, file: &mut FileNode) -> Result<(), ParserError> {
        self.expect_keyword("syntax")?;
        self.expect_kind(TokenKind::Eq)?;
        let loc = self.loc();
        let value = match self.current.kind.clone() {
            TokenKind::Str(s) => {
                self.bump()?;
                s
            }
            _ => return Err(self.unexpected("a quoted syntax value")),
        };
        if value != "proto3" {
            return Err(ParserError::new(
                ParserErrorKind::InvalidSyntaxValue(value),
                loc,
            ));
        }
        file.syntax = value;
        self.expect_semi()?;
        Ok(())
    }

    fn parse_package(&mut self) -> Result<String, ParserError> {
        self.expect_keyword("package")?;
        let mut segments = vec![self.parse_name(NameKind::PackageSegment)?];
        while self.current.kind == TokenKind::Dot {
            self.bump()?;
            segments.push(self.parse_name(NameKind::PackageSegment)?);
        }
        self.expect_semi()?;
        Ok(segments.join("."))
    }

    fn parse_import(&mut self) -> Result<Import, ParserError> {
        self.expect_keyword("import")?;
        let modifier = if self.is_ident("public") {
            self.bump()?;
            ImportModifier::Public
        } else if self.is_ident("weak") {
            self.bump()?;
            ImportModifier::Weak
        } else {
            ImportModifier::None
        };
        let path = match self.current.kind.clone() {
            TokenKind::Str(s) => {
                self.bump()?;
                s
            }
            _ => return Err(self.unexpected("an import path string")),
        };
        self.expect_semi()?;
        Ok(Import { path, modifier })
    }

    // ---- options ---------------------------------------------------------

    fn parse_option_statement(&mut self) -> Result<(String, Value), ParserError> {
        self.expect_keyword("option")?;
        let name = self.parse_option_name()?;
        self.expect_kind(TokenKind::Eq)?;
        let value_loc = self.loc();
        let value = self.parse_value()?;
        Self::check_known_option_value(&name, &value, value_loc)?;
        self.expect_semi()?;
        Ok((name, value))
    }

    /// A handful of well-known option names are conventionally boolean
    /// (`allow_alias`, `deprecated`, `packed`, `lazy`, `map_entry`); the
    /// parser has no descriptor to type-check custom/extension options
    /// against, so only these are checked.
    fn check_known_option_value(name: &str, value: &Value, loc: Loc) -> Result<(), ParserError> {
        const KNOWN_BOOL_OPTIONS: &[&str] =
            &["allow_alias", "deprecated", "packed", "lazy", "map_entry"];
        let last_segment = name.trim_end_matches(')').rsplit('.').next().unwrap_or(name);
        if KNOWN_BOOL_OPTIONS.contains(&last_segment) && !matches!(value, Value::Bool(_)) {
            return Err(ParserError::new(ParserErrorKind::InvalidOptionValue, loc));
        }
        Ok(())
    }

    fn parse_dotted_ident_path(&mut self) -> Result<Vec<String>, ParserError> {
        let loc = self.loc();
        let first = match &self.current.kind {
            TokenKind::Ident(_) => self.expect_any_ident()?,
            _ => return Err(ParserError::new(ParserErrorKind::InvalidOptionName, loc)),
        };
        let mut out = vec![first];
        while self.current.kind == TokenKind::Dot {
            self.bump()?;
            match &self.current.kind {
                TokenKind::Ident(_) => out.push(self.expect_any_ident()?),
                _ => return Err(ParserError::new(ParserErrorKind::InvalidOptionName, loc)),
            }
        }
        Ok(out)
    }

    fn parse_option_name(&mut self) -> Result<String, ParserError> {
        if self.current.kind == TokenKind::LParen {
            self.bump()?;
            let ext = self.parse_dotted_ident_path()?;
            self.expect_kind(TokenKind::RParen)?;
            let mut out = format!("({})", ext.join("."));
            while self.current.kind == TokenKind::Dot {
                self.bump()?;
                let loc = self.loc();
                match &self.current.kind {
                    TokenKind::Ident(_) => {
                        let seg = self.expect_any_ident()?;
                        out.push('.');
                        out.push_str(&seg);
                    }
                    _ => return Err(ParserError::new(ParserErrorKind::InvalidOptionName, loc)),
                }
            }
            Ok(out)
        } else {
            Ok(self.parse_dotted_ident_path()?.join("."))
        }
    }

    fn parse_value(&mut self) -> Result<Value, ParserError> {
        match self.current.kind.clone() {
            TokenKind::Str(s) => {
                self.bump()?;
                Ok(Value::String(s))
            }
            TokenKind::Ident(id) => {
                self.bump()?;
                match id.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Ok(Value::Identifier(id)),
                }
            }
            TokenKind::Integer { text, radix } => {
                let loc = self.loc();
                self.bump()?;
                let n = Self::parse_int_text(&text, radix, loc)?;
                Ok(Value::Number(n as f64))
            }
            TokenKind::Float(text) => {
                let loc = self.loc();
                self.bump()?;
                let n: f64 = text
                    .parse()
                    .map_err(|_| ParserError::new(ParserErrorKind::Lex(LexError::InvalidNumber), loc))?;
                Ok(Value::Number(n))
            }
            TokenKind::Minus => {
                self.bump()?;
                let loc = self.loc();
                match self.current.kind.clone() {
                    TokenKind::Integer { text, radix } => {
                        self.bump()?;
                        let n = Self::parse_int_text(&text, radix, loc)?;
                        Ok(Value::Number(-(n as f64)))
                    }
                    TokenKind::Float(text) => {
                        self.bump()?;
                        let n: f64 = text.parse().map_err(|_| {
                            ParserError::new(ParserErrorKind::Lex(LexError::InvalidNumber), loc)
                        })?;
                        Ok(Value::Number(-n))
                    }
                    _ => Err(self.unexpected("a number after `-`")),
                }
            }
            TokenKind::LBracket => {
                self.bump()?;
                let mut items = vec![];
                while self.current.kind != TokenKind::RBracket {
                    items.push(self.parse_value()?);
                    if self.current.kind == TokenKind::Comma {
                        self.bump()?;
                    } else {
                        break;
                    }
                }
                self.expect_kind(TokenKind::RBracket)?;
                Ok(Value::Array(items))
            }
            TokenKind::LBrace => {
                self.bump()?;
                let mut entries = vec![];
                while self.current.kind != TokenKind::RBrace {
                    let name = match self.current.kind.clone() {
                        TokenKind::Ident(s) => {
                            self.bump()?;
                            s
                        }
                        TokenKind::LBracket => {
                            self.bump()?;
                            let path = self.parse_dotted_ident_path()?;
                            self.expect_kind(TokenKind::RBracket)?;
                            format!("[{}]", path.join("."))
                        }
                        _ => return Err(self.unexpected("a message literal field name")),
                    };
                    self.expect_kind(TokenKind::Colon)?;
                    let value = self.parse_value()?;
                    entries.push((name, value));
                    if self.current.kind == TokenKind::Comma || self.current.kind == TokenKind::Semi
                    {
                        self.bump()?;
                    }
                }
                self.expect_kind(TokenKind::RBrace)?;
                Ok(Value::Map(entries))
            }
            _ => Err(self.unexpected("an option value")),
        }
    }

    fn parse_bracketed_options(&mut self) -> Result<Vec<Opt>, ParserError> {
        let open_loc = self.loc();
        self.expect_kind(TokenKind::LBracket)?;
        if self.current.kind == TokenKind::RBracket {
            return Err(ParserError::new(
                ParserErrorKind::EmptyBlockWhereRequired,
                open_loc,
            ));
        }
        let mut opts = vec![];
        loop {
            let name = self.parse_option_name()?;
            self.expect_kind(TokenKind::Eq)?;
            let value_loc = self.loc();
            let value = self.parse_value()?;
            Self::check_known_option_value(&name, &value, value_loc)?;
            opts.push(Opt { name, value });
            if self.current.kind == TokenKind::Comma {
                self.bump()?;
                continue;
            }
            break;
        }
        self.expect_kind(TokenKind::RBracket)?;
        Ok(opts)
    }

    // ---- reserved ----------------------------------------------------

    fn parse_reserved_number(&mut self) -> Result<i64, ParserError> {
        self.parse_integer_literal()
    }

    fn parse_reserved(&mut self) -> Result<Vec<Reserved>, ParserError> {
        self.expect_keyword("reserved")?;
        let list_loc = self.loc();
        if self.current.kind == TokenKind::Semi {
            return Err(ParserError::new(
                ParserErrorKind::EmptyBlockWhereRequired,
                list_loc,
            ));
        }
        let mut out = vec![];
        match self.current.kind.clone() {
            TokenKind::Str(_) => loop {
                match self.current.kind.clone() {
                    TokenKind::Str(s) => {
                        self.bump()?;
                        out.push(Reserved::Name(s));
                    }
                    _ => return Err(self.unexpected("a reserved name")),
                }
                if self.current.kind == TokenKind::Comma {
                    self.bump()?;
                    continue;
                }
                break;
            },
            TokenKind::Integer { .. } => loop {
                let lo = self.parse_reserved_number()?;
                let hi = if self.is_ident("to") {
                    self.bump()?;
                    if self.is_ident("max") {
                        self.bump()?;
                        MAX_FIELD_NUMBER
                    } else {
                        self.parse_reserved_number()?
                    }
                } else {
                    lo
                };
                out.push(Reserved::NumberRange(lo, hi));
                if self.current.kind == TokenKind::Comma {
                    self.bump()?;
                    continue;
                }
                break;
            },
            _ => return Err(self.unexpected("a reserved range or name list")),
        }
        self.expect_semi()?;
        Ok(out)
    }

    // ---- field & type parsing -----------------------------------------

    fn parse_type_ref(&mut self) -> Result<TypeRef, ParserError> {
        let leading_dot = if self.current.kind == TokenKind::Dot {
            self.bump()?;
            true
        } else {
            false
        };
        let mut parts = vec![self.expect_any_ident()?];
        while self.current.kind == TokenKind::Dot {
            self.bump()?;
            parts.push(self.expect_any_ident()?);
        }
        Ok(TypeRef { leading_dot, parts })
    }

    fn parse_field_type(&mut self) -> Result<FieldType, ParserError> {
        if self.is_ident("map") {
            return self.parse_map_type();
        }
        if let Some(text) = self.ident_text() {
            if let Some(scalar) = ScalarKind::keyword(text) {
                self.bump()?;
                return Ok(FieldType::Scalar(scalar));
            }
        }
        Ok(FieldType::Named(self.parse_type_ref()?))
    }

    fn parse_map_type(&mut self) -> Result<FieldType, ParserError> {
        self.expect_keyword("map")?;
        self.expect_kind(TokenKind::LAngle)?;
        let key_loc = self.loc();
        let key_text = self.expect_any_ident()?;
        let key = match ScalarKind::keyword(&key_text) {
            Some(k) if k.is_valid_map_key() => k,
            _ => return Err(ParserError::new(ParserErrorKind::InvalidMapKey, key_loc)),
        };
        self.expect_kind(TokenKind::Comma)?;
        let value_loc = self.loc();
        let value = self.parse_field_type()?;
        if matches!(value, FieldType::Map(..)) {
            return Err(ParserError::new(ParserErrorKind::InvalidMapValue, value_loc));
        }
        self.expect_kind(TokenKind::RAngle)?;
        Ok(FieldType::Map(key, Box::new(value)))
    }

    fn parse_field(&mut self, in_oneof: bool) -> Result<Field, ParserError> {
        let label_loc = self.loc();
        let mut is_repeated = false;
        let mut is_optional = false;
        if let Some(text) = self.ident_text() {
            match text {
                "repeated" => {
                    if in_oneof {
                        return Err(self.unexpected("a oneof field (labels are not allowed here)"));
                    }
                    is_repeated = true;
                    self.bump()?;
                }
                "optional" => {
                    if in_oneof {
                        return Err(self.unexpected("a oneof field (labels are not allowed here)"));
                    }
                    is_optional = true;
                    self.bump()?;
                }
                "required" => {
                    return Err(ParserError::new(ParserErrorKind::RequiredNotAllowed, label_loc));
                }
                _ => {}
            }
        }

        let type_loc = self.loc();
        let ty = self.parse_field_type()?;
        if is_repeated && matches!(ty, FieldType::Map(..)) {
            return Err(ParserError::new(
                ParserErrorKind::UnexpectedToken {
                    got: "repeated".to_string(),
                    expected: "a map field without `repeated`".to_string(),
                },
                type_loc,
            ));
        }
        if in_oneof && matches!(ty, FieldType::Map(..)) {
            return Err(ParserError::new(ParserErrorKind::InvalidMapValue, type_loc));
        }

        let name = self.parse_name(NameKind::Field)?;
        self.expect_kind(TokenKind::Eq)?;
        let number_loc = self.loc();
        let number = self.parse_integer_literal()?;
        self.validate_field_number(number, number_loc)?;

        let options = if self.current.kind == TokenKind::LBracket {
            self.parse_bracketed_options()?
        } else {
            vec![]
        };
        self.expect_semi()?;

        Ok(Field {
            name,
            number,
            ty,
            is_repeated,
            is_optional,
            options,
        })
    }

    fn validate_field_number(&self, n: i64, loc: Loc) -> Result<(), ParserError> {
        if n == 0 {
            Err(ParserError::new(
                ParserErrorKind::InvalidFieldNumber(n, FieldNumberReason::Zero),
                loc,
            ))
        } else if n > MAX_FIELD_NUMBER {
            Err(ParserError::new(
                ParserErrorKind::InvalidFieldNumber(n, FieldNumberReason::TooLarge),
                loc,
            ))
        } else if RESERVED_SYSTEM_RANGE.contains(&n) {
            Err(ParserError::new(
                ParserErrorKind::InvalidFieldNumber(n, FieldNumberReason::ReservedRange),
                loc,
            ))
        } else {
            Ok(())
        }
    }

    // ---- message -------------------------------------------------------

    fn parse_message(&mut self) -> Result<Message, ParserError> {
        let name = self.expect_keyword_then_name("message", NameKind::Message)?;

        self.depth += 1;
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParserError::new(
                ParserErrorKind::MaxNestingDepthExceeded,
                self.loc(),
            ));
        }

        self.expect_kind(TokenKind::LBrace)?;

        let mut msg = Message {
            name,
            fields: vec![],
            oneofs: vec![],
            messages: vec![],
            enums: vec![],
            options: vec![],
            reserved: vec![],
        };
        let mut field_numbers: HashSet<i64> = HashSet::new();
        let mut field_names: HashSet<String> = HashSet::new();
        let mut type_names: HashSet<String> = HashSet::new();

        while self.current.kind != TokenKind::RBrace {
            if self.current.kind == TokenKind::Eof {
                return Err(self.unexpected("`}`"));
            }
            if self.current.kind == TokenKind::Semi {
                self.bump()?;
                continue;
            }
            if self.is_ident("message") {
                let loc = self.loc();
                let nested = self.parse_message()?;
                if !type_names.insert(nested.name.clone()) {
                    return Err(ParserError::new(
                        ParserErrorKind::DuplicateTypeName(nested.name),
                        loc,
                    ));
                }
                msg.messages.push(nested);
                continue;
            }
            if self.is_ident("enum") {
                let loc = self.loc();
                let nested = self.parse_enum()?;
                if !type_names.insert(nested.name.clone()) {
                    return Err(ParserError::new(
                        ParserErrorKind::DuplicateTypeName(nested.name),
                        loc,
                    ));
                }
                msg.enums.push(nested);
                continue;
            }
            if self.is_ident("option") {
                let (name, value) = self.parse_option_statement()?;
                msg.options.push(Opt { name, value });
                continue;
            }
            if self.is_ident("reserved") {
                let loc = self.loc();
                let entries = self.parse_reserved()?;
                Self::check_reserved_against_fields(&entries, &msg, loc)?;
                msg.reserved.extend(entries);
                continue;
            }
            if self.is_ident("oneof") {
                let loc = self.loc();
                let oneof = self.parse_oneof()?;
                for f in &oneof.fields {
                    Self::register_field(f, &msg.reserved, &mut field_numbers, &mut field_names, loc)?;
                }
                msg.oneofs.push(oneof);
                continue;
            }

            let loc = self.loc();
            let field = self.parse_field(false)?;
            Self::register_field(&field, &msg.reserved, &mut field_numbers, &mut field_names, loc)?;
            msg.fields.push(field);
        }

        self.expect_kind(TokenKind::RBrace)?;
        self.depth -= 1;
        Ok(msg)
    }

    fn register_field(
        field: &Field,
        reserved: &[Reserved],
        field_numbers: &mut HashSet<i64>,
        field_names: &mut HashSet<String>,
        loc: Loc,
    ) -> Result<(), ParserError> {
        if !field_numbers.insert(field.number) {
            return Err(ParserError::new(
                ParserErrorKind::DuplicateFieldNumber(field.number),
                loc,
            ));
        }
        if !field_names.insert(field.name.clone()) {
            return Err(ParserError::new(
                ParserErrorKind::DuplicateFieldName(field.name.clone()),
                loc,
            ));
        }
        for r in reserved {
            if r.contains_number(field.number) {
                return Err(ParserError::new(ParserErrorKind::ReservedFieldCollision, loc));
            }
            if r.contains_name(&field.name) {
                return Err(ParserError::new(
                    ParserErrorKind::ReservedNameCollision(field.name.clone()),
                    loc,
                ));
            }
        }
        Ok(())
    }

    fn check_reserved_against_fields(
        entries: &[Reserved],
        msg: &Message,
        loc: Loc,
    ) -> Result<(), ParserError> {
        let all_fields = msg
            .fields
            .iter()
            .chain(msg.oneofs.iter().flat_map(|o| o.fields.iter()));
        for f in all_fields {
            for e in entries {
                if e.contains_number(f.number) {
                    return Err(ParserError::new(ParserErrorKind::ReservedFieldCollision, loc));
                }
                if e.contains_name(&f.name) {
                    return Err(ParserError::new(
                        ParserErrorKind::ReservedNameCollision(f.name.clone()),
                        loc,
                    ));
                }
            }
        }
        Ok(())
    }

    fn parse_oneof(&mut self) -> Result<Oneof, ParserError> {
        let name = self.expect_keyword_then_name("oneof", NameKind::OneofName)?;
        self.expect_kind(TokenKind::LBrace)?;
        let open_loc = self.loc();

        let mut fields = vec![];
        while self.current.kind != TokenKind::RBrace {
            if self.current.kind == TokenKind::Eof {
                return Err(self.unexpected("`}`"));
            }
            if self.current.kind == TokenKind::Semi {
                self.bump()?;
                continue;
            }
            fields.push(self.parse_field(true)?);
        }
        self.expect_kind(TokenKind::RBrace)?;

        if fields.is_empty() {
            return Err(ParserError::new(ParserErrorKind::EmptyOneof, open_loc));
        }

        Ok(Oneof { name, fields })
    }

    // ---- enum ------------------------------------------------------------

    fn parse_enum(&mut self) -> Result<Enum, ParserError> {
        let name = self.expect_keyword_then_name("enum", NameKind::Enum)?;
        self.expect_kind(TokenKind::LBrace)?;
        let open_loc = self.loc();

        let mut values: Vec<EnumValue> = vec![];
        let mut options: Vec<Opt> = vec![];
        let mut reserved: Vec<Reserved> = vec![];
        let mut names: HashSet<String> = HashSet::new();
        let mut allow_alias = false;
        let mut first_value: Option<i32> = None;

        while self.current.kind != TokenKind::RBrace {
            if self.current.kind == TokenKind::Eof {
                return Err(self.unexpected("`}`"));
            }
            if self.current.kind == TokenKind::Semi {
                self.bump()?;
                continue;
            }
            if self.is_ident("option") {
                let (opt_name, value) = self.parse_option_statement()?;
                if opt_name == "allow_alias" && value == Value::Bool(true) {
                    allow_alias = true;
                }
                options.push(Opt {
                    name: opt_name,
                    value,
                });
                continue;
            }
            if self.is_ident("reserved") {
                let loc = self.loc();
                let entries = self.parse_reserved()?;
                for v in &values {
                    for e in &entries {
                        if e.contains_number(v.number as i64) {
                            return Err(ParserError::new(
                                ParserErrorKind::ReservedFieldCollision,
                                loc,
                            ));
                        }
                        if e.contains_name(&v.name) {
                            return Err(ParserError::new(
                                ParserErrorKind::ReservedNameCollision(v.name.clone()),
                                loc,
                            ));
                        }
                    }
                }
                reserved.extend(entries);
                continue;
            }

            let value_loc = self.loc();
            let value = self.parse_enum_value()?;
            if !names.insert(value.name.clone()) {
                return Err(ParserError::new(
                    ParserErrorKind::DuplicateEnumValue(value.name),
                    value_loc,
                ));
            }
            for r in &reserved {
                if r.contains_number(value.number as i64) {
                    return Err(ParserError::new(
                        ParserErrorKind::ReservedFieldCollision,
                        value_loc,
                    ));
                }
                if r.contains_name(&value.name) {
                    return Err(ParserError::new(
                        ParserErrorKind::ReservedNameCollision(value.name.clone()),
                        value_loc,
                    ));
                }
            }
            if first_value.is_none() {
                first_value = Some(value.number);
            }
            values.push(value);
        }

        if values.is_empty() {
            return Err(ParserError::new(ParserErrorKind::EmptyEnum, open_loc));
        }

        if first_value != Some(0) {
            let has_zero_alias = allow_alias && values.iter().any(|v| v.number == 0);
            if !has_zero_alias {
                return Err(ParserError::new(
                    ParserErrorKind::EnumFirstValueNotZero,
                    open_loc,
                ));
            }
        }

        if !allow_alias {
            let mut seen_numbers: HashSet<i32> = HashSet::new();
            for v in &values {
                if !seen_numbers.insert(v.number) {
                    return Err(ParserError::new(
                        ParserErrorKind::DuplicateEnumValue(v.name.clone()),
                        open_loc,
                    ));
                }
            }
        }

        self.expect_kind(TokenKind::RBrace)?;

        Ok(Enum {
            name,
            values,
            options,
            reserved,
        })
    }

    fn parse_enum_value(&mut self) -> Result<EnumValue, ParserError> {
        let name = self.expect_any_ident()?;
        self.expect_kind(TokenKind::Eq)?;
        let negative = if self.current.kind == TokenKind::Minus {
            self.bump()?;
            true
        } else {
            false
        };
        let n = self.parse_integer_literal()?;
        let n = if negative { -n } else { n };
        let number = n as i32;

        let options = if self.current.kind == TokenKind::LBracket {
            self.parse_bracketed_options()?
        } else {
            vec![]
        };
        self.expect_semi()?;
        Ok(EnumValue {
            name,
            number,
            options,
        })
    }

    // ---- service -----------------------------------------------------

    fn parse_service(&mut self) -> Result<Service, ParserError> {
        let name = self.expect_keyword_then_name("service", NameKind::Service)?;
        self.expect_kind(TokenKind::LBrace)?;

        let mut rpcs = vec![];
        let mut options = vec![];
        while self.current.kind != TokenKind::RBrace {
            if self.current.kind == TokenKind::Eof {
                return Err(self.unexpected("`}`"));
            }
            if self.current.kind == TokenKind::Semi {
                self.bump()?;
                continue;
            }
            if self.is_ident("option") {
                let (name, value) = self.parse_option_statement()?;
                options.push(Opt { name, value });
                continue;
            }
            if self.is_ident("rpc") {
                rpcs.push(self.parse_rpc()?);
                continue;
            }
            return Err(self.unexpected("`option` or `rpc`"));
        }
        self.expect_kind(TokenKind::RBrace)?;
        Ok(Service {
            name,
            rpcs,
            options,
        })
    }

    fn parse_rpc_side(&mut self) -> Result<(bool, TypeRef), ParserError> {
        self.expect_kind(TokenKind::LParen)?;
        let mut streaming = false;
        if self.is_ident("stream") {
            self.bump()?;
            streaming = true;
            if self.is_ident("stream") {
                return Err(ParserError::new(ParserErrorKind::InvalidStream, self.loc()));
            }
        }
        if self.current.kind == TokenKind::RParen {
            return Err(ParserError::new(ParserErrorKind::MissingType, self.loc()));
        }
        let ty = self.parse_type_ref()?;
        self.expect_kind(TokenKind::RParen)?;
        Ok((streaming, ty))
    }

    fn parse_rpc(&mut self) -> Result<Rpc, ParserError> {
        let name = self.expect_keyword_then_name("rpc", NameKind::Rpc)?;
        let (client_streaming, input_type) = self.parse_rpc_side()?;
        self.expect_keyword("returns")?;
        let (server_streaming, output_type) = self.parse_rpc_side()?;

        let mut options = vec![];
        if self.current.kind == TokenKind::LBrace {
            self.bump()?;
            while self.current.kind != TokenKind::RBrace {
                if self.current.kind == TokenKind::Eof {
                    return Err(self.unexpected("`}`"));
                }
                if self.current.kind == TokenKind::Semi {
                    self.bump()?;
                    continue;
                }
                if self.is_ident("option") {
                    let (name, value) = self.parse_option_statement()?;
                    options.push(Opt { name, value });
                    continue;
                }
                return Err(self.unexpected("`option`"));
            }
            self.expect_kind(TokenKind::RBrace)?;
        } else {
            self.expect_semi()?;
        }

        Ok(Rpc {
            name,
            input_type,
            output_type,
            client_streaming,
            server_streaming,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_syntax_is_proto3() {
        let file = parse("message Foo { int32 x = 1; }").unwrap();
        assert_eq!(file.syntax, "proto3");
    }

    #[test]
    fn explicit_proto3_syntax() {
        let file = parse(r#"syntax = "proto3";"#).unwrap();
        assert_eq!(file.syntax, "proto3");
        assert!(file.package.is_none());
        assert!(file.imports.is_empty());
    }

    #[test]
    fn rejects_proto2_syntax() {
        let err = parse(r#"syntax = "proto2";"#).unwrap_err();
        assert!(format!("{}", err).contains("syntax"));
    }

    #[test]
    fn imports_with_modifiers_preserve_order() {
        let file = parse(
            r#"
            syntax = "proto3";
            import public "a.proto";
            import weak "b.proto";
            import "c.proto";
            "#,
        )
        .unwrap();
        assert_eq!(
            file.imports,
            vec![
                Import {
                    path: "a.proto".into(),
                    modifier: ImportModifier::Public
                },
                Import {
                    path: "b.proto".into(),
                    modifier: ImportModifier::Weak
                },
                Import {
                    path: "c.proto".into(),
                    modifier: ImportModifier::None
                },
            ]
        );
    }

    #[test]
    fn duplicate_field_number_is_rejected() {
        let err = parse("message Test { string name = 1; int32 id = 1; }").unwrap_err();
        assert_eq!(
            err.kind,
            ParserErrorKind::DuplicateFieldNumber(1)
        );
    }

    #[test]
    fn reserved_field_collision_is_rejected() {
        let err = parse("message Test { reserved 2, 15, 9 to 11; string name = 2; }")
            .unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::ReservedFieldCollision);
    }

    #[test]
    fn reserved_name_collision_is_rejected() {
        let err = parse(r#"message Test { reserved "foo"; string foo = 1; }"#).unwrap_err();
        assert_eq!(
            err.kind,
            ParserErrorKind::ReservedNameCollision("foo".to_string())
        );
    }

    #[test]
    fn enum_reserved_name_collision_is_rejected() {
        let err = parse(r#"enum E { reserved "FOO"; ZERO = 0; FOO = 1; }"#).unwrap_err();
        assert_eq!(
            err.kind,
            ParserErrorKind::ReservedNameCollision("FOO".to_string())
        );
    }

    #[test]
    fn enum_reserved_number_collision_is_rejected() {
        let err = parse(r#"enum E { reserved 1; ZERO = 0; ONE = 1; }"#).unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::ReservedFieldCollision);
    }

    #[test]
    fn enum_first_value_must_be_zero() {
        let err = parse("enum E { FIRST = 1; }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::EnumFirstValueNotZero);
    }

    #[test]
    fn allow_alias_permits_duplicate_numbers() {
        let file =
            parse("enum E { option allow_alias = true; U = 0; A = 1; B = 1; }").unwrap();
        assert_eq!(file.enums[0].values.len(), 3);
    }

    #[test]
    fn float_map_key_is_rejected() {
        let err = parse("message Test { map<float, string> m = 1; }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::InvalidMapKey);
    }

    #[test]
    fn repeated_map_field_is_rejected() {
        let err = parse("message Test { repeated map<string, string> m = 1; }").unwrap_err();
        assert!(matches!(
            err.kind,
            ParserErrorKind::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn bidirectional_streaming_rpc() {
        let file = parse(
            "service S { rpc M (stream Req) returns (stream Resp); }",
        )
        .unwrap();
        let rpc = &file.services[0].rpcs[0];
        assert!(rpc.client_streaming);
        assert!(rpc.server_streaming);
    }

    #[test]
    fn deeply_nested_messages_exceed_ceiling() {
        let mut src = String::new();
        for i in 0..150 {
            src.push_str(&format!("message M{} {{ ", i));
        }
        for _ in 0..150 {
            src.push_str("} ");
        }
        let err = parse(&src).unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::MaxNestingDepthExceeded);
    }

    #[test]
    fn syntax_after_package_is_rejected() {
        let err = parse(r#"package test; syntax = "proto3";"#).unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::SyntaxNotFirst);
    }

    #[test]
    fn non_ascii_message_name_is_rejected() {
        let err = parse("message \u{6d4b}\u{8bd5} {}").unwrap_err();
        assert!(matches!(
            err.kind,
            ParserErrorKind::InvalidName(NameKind::Message, _)
        ));
    }

    #[test]
    fn empty_oneof_is_rejected() {
        let err = parse("message Test { oneof test {} }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::EmptyOneof);
    }

    #[test]
    fn required_label_is_rejected() {
        let err = parse("message Test { required string name = 1; }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::RequiredNotAllowed);
    }

    #[test]
    fn duplicate_file_option_is_rejected() {
        let err = parse(
            r#"option java_package = "a"; option java_package = "b";"#,
        )
        .unwrap_err();
        assert!(matches!(err.kind, ParserErrorKind::DuplicateOption(_)));
    }

    #[test]
    fn duplicate_type_name_across_message_and_enum() {
        let err = parse("message Test {} enum Test { A = 0; }").unwrap_err();
        assert!(matches!(err.kind, ParserErrorKind::DuplicateTypeName(_)));
    }

    #[test]
    fn negative_enum_value_numbers() {
        let file = parse("enum E { ZERO = 0; NEG = -1; }").unwrap();
        assert_eq!(file.enums[0].values[1].number, -1);
    }

    #[test]
    fn option_message_literal_value() {
        let file = parse(
            r#"message Test {
                string name = 1 [(custom.opt) = { name: "x" count: 1 }];
            }"#,
        )
        .unwrap();
        let opt = &file.messages[0].fields[0].options[0];
        assert_eq!(opt.name, "(custom.opt)");
        assert!(matches!(opt.value, Value::Map(_)));
    }

    #[test]
    fn field_number_zero_is_rejected() {
        let err = parse("message Test { int32 x = 0; }").unwrap_err();
        assert_eq!(
            err.kind,
            ParserErrorKind::InvalidFieldNumber(0, FieldNumberReason::Zero)
        );
    }

    #[test]
    fn field_number_in_reserved_system_range_is_rejected() {
        let err = parse("message Test { int32 x = 19500; }").unwrap_err();
        assert_eq!(
            err.kind,
            ParserErrorKind::InvalidFieldNumber(19500, FieldNumberReason::ReservedRange)
        );
    }

    #[test]
    fn non_bool_value_for_allow_alias_is_rejected() {
        let err = parse(r#"enum E { option allow_alias = 1; A = 0; }"#).unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::InvalidOptionValue);
    }

    #[test]
    fn custom_option_values_are_not_type_checked() {
        let file = parse(
            r#"message Test {
                string name = 1 [(my.custom_option) = 42];
            }"#,
        )
        .unwrap();
        assert_eq!(
            file.messages[0].fields[0].options[0].value,
            Value::Number(42.0)
        );
    }

    #[test]
    fn whitespace_variation_does_not_change_result() {
        let a = parse("message Test{int32 x=1;}").unwrap();
        let b = parse("message   Test  {  int32   x   =   1  ;  }").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_field_name_across_oneof_and_direct_field() {
        let err = parse("message Test { string a = 1; oneof o { int32 a = 2; } }").unwrap_err();
        assert_eq!(
            err.kind,
            ParserErrorKind::DuplicateFieldName("a".to_string())
        );
    }

    #[test]
    fn nested_map_value_is_rejected() {
        let err = parse("message Test { map<string, map<string, string>> m = 1; }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::InvalidMapValue);
    }

    #[test]
    fn double_stream_is_rejected() {
        let err = parse("service S { rpc M (stream stream Req) returns (Resp); }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::InvalidStream);
    }

    #[test]
    fn empty_rpc_argument_list_is_rejected() {
        let err = parse("service S { rpc M () returns (Resp); }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::MissingType);
    }

    #[test]
    fn duplicate_package_declaration_is_rejected() {
        let err = parse("package a; package b;").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::DuplicatePackage);
    }

    #[test]
    fn dotted_package_name_is_accepted() {
        let file = parse("package foo.bar.baz;").unwrap();
        assert_eq!(file.package, Some("foo.bar.baz".to_string()));
    }

    #[test]
    fn invalid_field_name_shape_is_rejected() {
        let err = parse("message Test { string Name = 1; }").unwrap_err();
        assert!(matches!(
            err.kind,
            ParserErrorKind::InvalidName(NameKind::Field, _)
        ));
    }

    #[test]
    fn optional_label_is_accepted() {
        let file = parse("message Test { optional string name = 1; }").unwrap();
        assert!(file.messages[0].fields[0].is_optional);
    }

    #[test]
    fn reserved_to_max_covers_top_of_range() {
        let err =
            parse("message Test { reserved 100 to max; int32 x = 536870911; }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::ReservedFieldCollision);
    }

    #[test]
    fn map_field_in_oneof_is_rejected() {
        let err = parse("message Test { oneof o { map<string, string> m = 1; } }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::InvalidMapValue);
    }

    #[test]
    fn missing_semicolon_after_field_is_rejected() {
        let err = parse("message Test { string name = 1 }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::MissingSemicolon);
    }

    #[test]
    fn missing_semicolon_after_syntax_is_rejected() {
        let err = parse(r#"syntax = "proto3""#).unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::MissingSemicolon);
    }

    #[test]
    fn missing_semicolon_after_package_is_rejected() {
        let err = parse("package foo").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::MissingSemicolon);
    }

    #[test]
    fn missing_semicolon_after_import_is_rejected() {
        let err = parse(r#"import "a.proto""#).unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::MissingSemicolon);
    }

    #[test]
    fn missing_semicolon_after_option_statement_is_rejected() {
        let err = parse(r#"option java_package = "x""#).unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::MissingSemicolon);
    }

    #[test]
    fn missing_semicolon_after_reserved_is_rejected() {
        let err = parse("message Test { reserved 1, 2 }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::MissingSemicolon);
    }

    #[test]
    fn missing_semicolon_after_rpc_is_rejected() {
        let err = parse("service S { rpc M (Req) returns (Resp) }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::MissingSemicolon);
    }

    #[test]
    fn empty_reserved_statement_is_rejected() {
        let err = parse("message Test { reserved; }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::EmptyBlockWhereRequired);
    }

    #[test]
    fn empty_bracketed_options_is_rejected() {
        let err = parse("message Test { string name = 1 []; }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::EmptyBlockWhereRequired);
    }
}
