//! Hand-written parser for C-flavoured type strings.
//!
//! Metadata documents spell types the way a C header would, with a few
//! extensions for things C cannot say directly:
//!
//! - `const char*`, `HANDLE*`, `char* const*`: pointers and const placement
//! - `WCHAR[260]`, `BYTE[]`: inline and open arrays
//! - `Windows.Win32.Foundation.HWND`, `wdk:Ns.Name`: qualified and scoped names
//! - `fn(int32_t, void*) -> BOOL`: function pointers
//!
//! Rust primitive spellings (`u32`, `isize`, ...) are accepted as aliases.

use crate::descriptor::{PrimitiveCode, TypeDescriptor, TypeRef};
use crate::error::{MetaError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Star,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Arrow,
}

fn invalid(input: &str, detail: impl Into<String>) -> MetaError {
    MetaError::InvalidTypeString {
        input: input.to_string(),
        detail: detail.into(),
    }
}

/// Split a type string into tokens, keeping punctuation as separate tokens.
fn tokenize(input: &str) -> Result<Vec<Token<'_>>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let c = bytes[pos];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => pos += 1,
            b'*' => {
                tokens.push(Token::Star);
                pos += 1;
            }
            b'(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            b'[' => {
                tokens.push(Token::LBracket);
                pos += 1;
            }
            b']' => {
                tokens.push(Token::RBracket);
                pos += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                pos += 1;
            }
            b'-' if bytes.get(pos + 1) == Some(&b'>') => {
                tokens.push(Token::Arrow);
                pos += 2;
            }
            _ if is_word_byte(c) => {
                let start = pos;
                while pos < bytes.len() && is_word_byte(bytes[pos]) {
                    // `-` belongs to a word (scope names) unless it starts `->`
                    if bytes[pos] == b'-' && bytes.get(pos + 1) == Some(&b'>') {
                        break;
                    }
                    pos += 1;
                }
                tokens.push(Token::Word(&input[start..pos]));
            }
            other => {
                return Err(invalid(input, format!("unexpected character '{}'", other as char)));
            }
        }
    }
    Ok(tokens)
}

fn is_word_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'.' | b':' | b'-')
}

/// Parse a complete type string.
pub fn parse_type(input: &str) -> Result<TypeDescriptor> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(invalid(input, "empty type"));
    }
    let mut parser = Parser {
        input,
        tokens: &tokens,
        pos: 0,
    };
    let ty = parser.parse_type()?;
    if parser.pos != tokens.len() {
        return Err(invalid(input, "trailing tokens after type"));
    }
    Ok(ty)
}

struct Parser<'t, 'a> {
    input: &'a str,
    tokens: &'t [Token<'a>],
    pos: usize,
}

impl<'t, 'a> Parser<'t, 'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_word(&self) -> Option<&'a str> {
        match self.peek() {
            Some(Token::Word(w)) => Some(*w),
            _ => None,
        }
    }

    fn expect(&mut self, token: Token<'a>) -> Result<()> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(invalid(self.input, format!("expected {token:?}")))
        }
    }

    /// type := ['const'] base ('*' | 'const')* ['[' [N] ']']
    fn parse_type(&mut self) -> Result<TypeDescriptor> {
        let mut pending_const = false;
        if self.peek_word() == Some("const") {
            pending_const = true;
            self.pos += 1;
        }

        let mut ty = self.parse_base()?;

        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    ty = TypeDescriptor::Pointer {
                        element: Box::new(ty),
                        is_const: pending_const,
                    };
                    pending_const = false;
                }
                Some(Token::Word("const")) => {
                    // `T* const*`: const applies to the pointee of the next star
                    self.pos += 1;
                    pending_const = true;
                }
                _ => break,
            }
        }

        if self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            let length = match self.peek() {
                Some(Token::Word(n)) => {
                    let n: u32 = n
                        .parse()
                        .map_err(|_| invalid(self.input, format!("invalid array length '{n}'")))?;
                    self.pos += 1;
                    Some(n)
                }
                _ => None,
            };
            self.expect(Token::RBracket)?;
            ty = TypeDescriptor::Array {
                element: Box::new(ty),
                length,
            };
        }

        Ok(ty)
    }

    fn parse_base(&mut self) -> Result<TypeDescriptor> {
        let word = match self.peek() {
            Some(Token::Word(w)) => *w,
            _ => return Err(invalid(self.input, "expected type name")),
        };

        if word == "fn" {
            self.pos += 1;
            return self.parse_function_pointer();
        }

        // `struct X` / `enum X` prefixes are tolerated and ignored
        if word == "struct" || word == "enum" || word == "union" {
            self.pos += 1;
            return match self.peek_word() {
                Some(name) => {
                    self.pos += 1;
                    Ok(TypeDescriptor::Handle(TypeRef::parse(name)))
                }
                None => Err(invalid(self.input, format!("expected name after '{word}'"))),
            };
        }

        let is_unsigned = word == "unsigned";
        let is_signed = word == "signed";
        if is_unsigned || is_signed {
            self.pos += 1;
            let code = match self.peek_word() {
                Some("char") => {
                    self.pos += 1;
                    if is_unsigned { PrimitiveCode::U8 } else { PrimitiveCode::I8 }
                }
                Some("short") => {
                    self.pos += 1;
                    if is_unsigned { PrimitiveCode::U16 } else { PrimitiveCode::I16 }
                }
                Some("int") => {
                    self.pos += 1;
                    if is_unsigned { PrimitiveCode::U32 } else { PrimitiveCode::I32 }
                }
                Some("long") => {
                    self.pos += 1;
                    if self.peek_word() == Some("long") {
                        self.pos += 1;
                        if is_unsigned { PrimitiveCode::U64 } else { PrimitiveCode::I64 }
                    } else if is_unsigned {
                        PrimitiveCode::U32
                    } else {
                        PrimitiveCode::I32
                    }
                }
                // bare `unsigned` / `signed` means int
                _ => {
                    if is_unsigned { PrimitiveCode::U32 } else { PrimitiveCode::I32 }
                }
            };
            return Ok(TypeDescriptor::Primitive(code));
        }

        self.pos += 1;
        if word == "long" {
            return Ok(TypeDescriptor::Primitive(match self.peek_word() {
                Some("long") => {
                    self.pos += 1;
                    PrimitiveCode::I64
                }
                Some("double") => {
                    self.pos += 1;
                    PrimitiveCode::F64
                }
                _ => PrimitiveCode::I32,
            }));
        }

        Ok(match primitive_keyword(word) {
            Some(code) => TypeDescriptor::Primitive(code),
            None => TypeDescriptor::Handle(TypeRef::parse(word)),
        })
    }

    /// fn-pointer := 'fn' '(' [type (',' type)*] ')' ['->' type]
    fn parse_function_pointer(&mut self) -> Result<TypeDescriptor> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                params.push(self.parse_type()?);
                match self.peek() {
                    Some(Token::Comma) => self.pos += 1,
                    _ => break,
                }
            }
        }
        self.expect(Token::RParen)?;
        let ret = if self.peek() == Some(&Token::Arrow) {
            self.pos += 1;
            self.parse_type()?
        } else {
            TypeDescriptor::void()
        };
        Ok(TypeDescriptor::FunctionPointer {
            params,
            ret: Box::new(ret),
        })
    }
}

fn primitive_keyword(word: &str) -> Option<PrimitiveCode> {
    Some(match word {
        "void" => PrimitiveCode::Void,
        "bool" | "_Bool" => PrimitiveCode::Bool,
        "wchar_t" | "char16_t" | "char16" => PrimitiveCode::Char,
        "char" | "int8_t" | "i8" => PrimitiveCode::I8,
        "uint8_t" | "u8" => PrimitiveCode::U8,
        "short" | "int16_t" | "i16" => PrimitiveCode::I16,
        "uint16_t" | "u16" => PrimitiveCode::U16,
        "int" | "int32_t" | "i32" => PrimitiveCode::I32,
        "uint32_t" | "u32" => PrimitiveCode::U32,
        "int64_t" | "i64" => PrimitiveCode::I64,
        "uint64_t" | "u64" => PrimitiveCode::U64,
        "float" | "f32" => PrimitiveCode::F32,
        "double" | "f64" => PrimitiveCode::F64,
        "intptr_t" | "ssize_t" | "isize" => PrimitiveCode::IntPtr,
        "uintptr_t" | "size_t" | "usize" => PrimitiveCode::UIntPtr,
        _ => return None,
    })
}
