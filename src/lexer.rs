//! Tokenizer for proto3 source files.
//!
//! The lexer is a hand-rolled character scanner; it does not distinguish
//! keywords from identifiers, since which identifiers are contextual
//! keywords (`stream`, `map`, `reserved`, ...) depends on grammar position.
//! That recognition happens in [`crate::parser`].

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::LexError;

/// A 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Loc {
    pub line: u32,
    pub col: u32,
}

impl Loc {
    pub fn start() -> Loc {
        Loc { line: 1, col: 1 }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Integer literal radix as written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntRadix {
    Decimal,
    Hex,
    Octal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Integer { text: String, radix: IntRadix },
    Float(String),
    Str(String),
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LAngle,
    RAngle,
    Semi,
    Comma,
    Eq,
    Dot,
    Minus,
    Colon,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "identifier `{}`", s),
            TokenKind::Integer { text, .. } => write!(f, "integer `{}`", text),
            TokenKind::Float(s) => write!(f, "float `{}`", s),
            TokenKind::Str(s) => write!(f, "string {:?}", s),
            TokenKind::LBrace => write!(f, "`{{`"),
            TokenKind::RBrace => write!(f, "`}}`"),
            TokenKind::LParen => write!(f, "`(`"),
            TokenKind::RParen => write!(f, "`)`"),
            TokenKind::LBracket => write!(f, "`[`"),
            TokenKind::RBracket => write!(f, "`]`"),
            TokenKind::LAngle => write!(f, "`<`"),
            TokenKind::RAngle => write!(f, "`>`"),
            TokenKind::Semi => write!(f, "`;`"),
            TokenKind::Comma => write!(f, "`,`"),
            TokenKind::Eq => write!(f, "`=`"),
            TokenKind::Dot => write!(f, "`.`"),
            TokenKind::Minus => write!(f, "`-`"),
            TokenKind::Colon => write!(f, "`:`"),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Loc,
}

/// Hand-rolled scanner over the input source text.
///
/// Holds no lookahead of its own; [`crate::parser::Parser`] buffers the one
/// token of lookahead it needs.
pub struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Lexer<'a> {
        Lexer {
            src,
            chars: src.char_indices().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn loc(&self) -> Loc {
        Loc {
            line: self.line,
            col: self.col,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_at(&self, offset_from_current: usize) -> Option<char> {
        // Only used to look one extra character ahead (e.g. `//`, `/*`).
        let mut it = self.chars.clone();
        for _ in 0..offset_from_current {
            it.next();
        }
        it.next().map(|(_, c)| c)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), (LexError, Loc)> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    if self.peek_at(1) == Some('/') {
                        while let Some(c) = self.peek_char() {
                            if c == '\n' {
                                break;
                            }
                            self.bump();
                        }
                    } else if self.peek_at(1) == Some('*') {
                        let start = self.loc();
                        self.bump(); // '/'
                        self.bump(); // '*'
                        let mut closed = false;
                        while let Some(c) = self.peek_char() {
                            if c == '*' && self.peek_at(1) == Some('/') {
                                self.bump();
                                self.bump();
                                closed = true;
                                break;
                            }
                            self.bump();
                        }
                        if !closed {
                            return Err((LexError::UnterminatedComment, start));
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn lex_string(&mut self, quote: char) -> Result<String, (LexError, Loc)> {
        let start = self.loc();
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err((LexError::UnterminatedString, start)),
                Some(c) if c == quote => break,
                Some('\n') => return Err((LexError::UnterminatedString, start)),
                Some('\\') => {
                    let esc_loc = self.loc();
                    match self.bump() {
                        Some('n') => out.push('\n'),
                        Some('r') => out.push('\r'),
                        Some('t') => out.push('\t'),
                        Some('\\') => out.push('\\'),
                        Some('"') => out.push('"'),
                        Some('\'') => out.push('\''),
                        Some('0') => out.push('\0'),
                        Some('x') => {
                            let mut hex = String::new();
                            for _ in 0..2 {
                                match self.peek_char() {
                                    Some(h) if h.is_ascii_hexdigit() => {
                                        hex.push(h);
                                        self.bump();
                                    }
                                    _ => break,
                                }
                            }
                            if hex.is_empty() {
                                return Err((LexError::InvalidEscape, esc_loc));
                            }
                            let byte = u32::from_str_radix(&hex, 16)
                                .map_err(|_| (LexError::InvalidEscape, esc_loc))?;
                            out.push(
                                char::from_u32(byte).ok_or((LexError::InvalidEscape, esc_loc))?,
                            );
                        }
                        Some('u') => {
                            let mut hex = String::new();
                            for _ in 0..4 {
                                match self.peek_char() {
                                    Some(h) if h.is_ascii_hexdigit() => {
                                        hex.push(h);
                                        self.bump();
                                    }
                                    _ => return Err((LexError::InvalidEscape, esc_loc)),
                                }
                            }
                            let code = u32::from_str_radix(&hex, 16)
                                .map_err(|_| (LexError::InvalidEscape, esc_loc))?;
                            out.push(
                                char::from_u32(code).ok_or((LexError::InvalidEscape, esc_loc))?,
                            );
                        }
                        _ => return Err((LexError::InvalidEscape, esc_loc)),
                    }
                }
                Some(c) => out.push(c),
            }
        }
        Ok(out)
    }

    fn lex_number(&mut self) -> Result<TokenKind, (LexError, Loc)> {
        let start = self.loc();
        let mut text = String::new();

        if self.peek_char() == Some('0')
            && (self.peek_at(1) == Some('x') || self.peek_at(1) == Some('X'))
        {
            self.bump(); // '0'
            self.bump(); // 'x'
            let mut digits = String::new();
            while let Some(c) = self.peek_char() {
                if c.is_ascii_hexdigit() {
                    digits.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            if digits.is_empty() {
                return Err((LexError::InvalidNumber, start));
            }
            return Ok(TokenKind::Integer {
                text: digits,
                radix: IntRadix::Hex,
            });
        }

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }

        let mut is_float = false;
        if self.peek_char() == Some('.') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit())
        {
            is_float = true;
            text.push('.');
            self.bump();
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
        }

        if matches!(self.peek_char(), Some('e') | Some('E')) {
            // Look ahead past `e`/`E` and an optional sign for at least one
            // digit before committing to consuming an exponent.
            let mut lookahead = self.chars.clone();
            lookahead.next();
            let sign = match lookahead.peek() {
                Some(&(_, c)) if c == '+' || c == '-' => {
                    lookahead.next();
                    Some(c)
                }
                _ => None,
            };
            let exponent_has_digits = matches!(lookahead.peek(), Some(&(_, c)) if c.is_ascii_digit());

            if exponent_has_digits {
                is_float = true;
                text.push(self.bump().unwrap()); // e/E
                if sign.is_some() {
                    text.push(self.bump().unwrap());
                }
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }

        if text.is_empty() {
            return Err((LexError::InvalidNumber, start));
        }

        if is_float {
            Ok(TokenKind::Float(text))
        } else if text.starts_with('0') && text.len() > 1 {
            Ok(TokenKind::Integer {
                text,
                radix: IntRadix::Octal,
            })
        } else {
            Ok(TokenKind::Integer {
                text,
                radix: IntRadix::Decimal,
            })
        }
    }

    /// Produces the next token, or the terminal [`TokenKind::Eof`].
    pub fn next_token(&mut self) -> Result<Token, (LexError, Loc)> {
        self.skip_whitespace_and_comments()?;
        let loc = self.loc();

        let c = match self.peek_char() {
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    loc,
                })
            }
            Some(c) => c,
        };

        let kind = match c {
            '{' => {
                self.bump();
                TokenKind::LBrace
            }
            '}' => {
                self.bump();
                TokenKind::RBrace
            }
            '(' => {
                self.bump();
                TokenKind::LParen
            }
            ')' => {
                self.bump();
                TokenKind::RParen
            }
            '[' => {
                self.bump();
                TokenKind::LBracket
            }
            ']' => {
                self.bump();
                TokenKind::RBracket
            }
            '<' => {
                self.bump();
                TokenKind::LAngle
            }
            '>' => {
                self.bump();
                TokenKind::RAngle
            }
            ';' => {
                self.bump();
                TokenKind::Semi
            }
            ',' => {
                self.bump();
                TokenKind::Comma
            }
            '=' => {
                self.bump();
                TokenKind::Eq
            }
            '-' => {
                self.bump();
                TokenKind::Minus
            }
            ':' => {
                self.bump();
                TokenKind::Colon
            }
            '.' if !self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) => {
                self.bump();
                TokenKind::Dot
            }
            '"' => TokenKind::Str(self.lex_string('"')?),
            '\'' => TokenKind::Str(self.lex_string('\'')?),
            c if c.is_ascii_digit() || c == '.' => self.lex_number()?,
            c if c == '_' || c.is_ascii_alphabetic() => {
                let mut ident = String::new();
                while let Some(c) = self.peek_char() {
                    if c == '_' || c.is_ascii_alphanumeric() {
                        ident.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                TokenKind::Ident(ident)
            }
            other => {
                self.bump();
                return Err((LexError::UnexpectedCharacter(other), loc));
            }
        };

        log::trace!("lexed {} at {}", kind, loc);
        Ok(Token { kind, loc })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn lexes_punctuation_and_idents() {
        let ks = kinds("message Foo { int32 x = 1; }");
        assert_eq!(
            ks,
            vec![
                TokenKind::Ident("message".into()),
                TokenKind::Ident("Foo".into()),
                TokenKind::LBrace,
                TokenKind::Ident("int32".into()),
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Integer {
                    text: "1".into(),
                    radix: IntRadix::Decimal
                },
                TokenKind::Semi,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_and_block_comments() {
        let ks = kinds("// hello\n/* block \n comment */ x");
        assert_eq!(ks, vec![TokenKind::Ident("x".into()), TokenKind::Eof]);
    }

    #[test]
    fn unterminated_block_comment_fails() {
        let mut lexer = Lexer::new("/* never closed");
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.0, LexError::UnterminatedComment);
    }

    #[test]
    fn unterminated_string_fails() {
        let mut lexer = Lexer::new("\"abc");
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.0, LexError::UnterminatedString);
    }

    #[test]
    fn invalid_escape_fails() {
        let mut lexer = Lexer::new("\"\\q\"");
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.0, LexError::InvalidEscape);
    }

    #[test]
    fn decodes_escapes() {
        let mut lexer = Lexer::new("\"a\\nb\\tc\"");
        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Str("a\nb\tc".into()));
    }

    #[test]
    fn hex_and_octal_integers() {
        assert_eq!(
            kinds("0x1F"),
            vec![
                TokenKind::Integer {
                    text: "1F".into(),
                    radix: IntRadix::Hex
                },
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("0755"),
            vec![
                TokenKind::Integer {
                    text: "0755".into(),
                    radix: IntRadix::Octal
                },
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn floating_point_with_exponent() {
        assert_eq!(
            kinds("1.5e10"),
            vec![TokenKind::Float("1.5e10".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn non_ascii_identifier_is_a_lex_error() {
        let mut lexer = Lexer::new("测试");
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.0, LexError::UnexpectedCharacter('测'));
    }

    #[test]
    fn whitespace_between_tokens_does_not_matter() {
        assert_eq!(kinds("a.b.c"), kinds(" a . b . c "));
    }

    #[test]
    fn minus_and_colon_are_distinct_tokens() {
        assert_eq!(
            kinds("-1 a:1"),
            vec![
                TokenKind::Minus,
                TokenKind::Integer {
                    text: "1".into(),
                    radix: IntRadix::Decimal
                },
                TokenKind::Ident("a".into()),
                TokenKind::Colon,
                TokenKind::Integer {
                    text: "1".into(),
                    radix: IntRadix::Decimal
                },
                TokenKind::Eof,
            ]
        );
    }
}
