//! Parser for the structured-literal text the analysis tool returns.
//!
//! The tool replies with the printed form of a mapping, which may use either
//! Python literal syntax (`{'a': True, 'b': None, 'c': (1, 2)}`) or JSON.
//! Both are accepted and converted into a [`serde_json::Value`].

use serde_json::{Map, Number, Value};
use std::fmt;

/// Parse failure with the byte offset where it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for LiteralError {}

/// Nesting limit for dicts and lists
const MAX_DEPTH: usize = 64;

/// Parse a complete literal; trailing non-whitespace is an error
pub fn parse_literal(input: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser {
        input,
        bytes: input.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos != parser.bytes.len() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(value)
}

/// Parse a literal that must be a mapping at the top level
pub fn parse_mapping(input: &str) -> Result<Map<String, Value>, LiteralError> {
    match parse_literal(input)? {
        Value::Object(map) => Ok(map),
        other => Err(LiteralError {
            offset: 0,
            message: format!("expected a mapping, found {}", type_name(&other)),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: &str) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), LiteralError> {
        self.skip_whitespace();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'{') => self.nested(|p| p.parse_dict()),
            Some(b'[') => self.nested(|p| p.parse_sequence(b'[', b']')),
            Some(b'(') => self.nested(|p| p.parse_sequence(b'(', b')')),
            Some(b'\'') | Some(b'"') => self.parse_string().map(Value::String),
            Some(b) if b == b'-' || b == b'+' || b == b'.' || b.is_ascii_digit() => {
                self.parse_number()
            }
            Some(b) if b.is_ascii_alphabetic() => self.parse_keyword(),
            Some(_) => Err(self.error("unexpected character")),
        }
    }

    fn nested<F>(&mut self, parse: F) -> Result<Value, LiteralError>
    where
        F: FnOnce(&mut Self) -> Result<Value, LiteralError>,
    {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn parse_dict(&mut self) -> Result<Value, LiteralError> {
        self.expect(b'{')?;
        let mut map = Map::new();

        loop {
            self.skip_whitespace();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }

            let key = match self.parse_value()? {
                Value::String(s) => s,
                Value::Null => "None".to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(self.error("unhashable mapping key"));
                }
                other => other.to_string(),
            };

            self.expect(b':')?;
            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_sequence(&mut self, open: u8, close: u8) -> Result<Value, LiteralError> {
        self.expect(open)?;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }

            items.push(self.parse_value()?);

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b) if b == close => {}
                _ => return Err(self.error(&format!("expected ',' or '{}'", close as char))),
            }
        }
    }

    fn parse_keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }

        match &self.input[start..self.pos] {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            _ => {
                self.pos = start;
                Err(self.error("unknown identifier"))
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let mut is_float = false;

        if matches!(self.peek(), Some(b'-') | Some(b'+')) {
            self.pos += 1;
        }
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' | b'_' => self.pos += 1,
                b'.' => {
                    is_float = true;
                    self.pos += 1;
                }
                b'e' | b'E' => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some(b'-') | Some(b'+')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }

        let text: String = self.input[start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        let text = text.strip_prefix('+').unwrap_or(&text);

        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::Number(n.into()));
            }
            if let Ok(n) = text.parse::<u64>() {
                return Ok(Value::Number(n.into()));
            }
        }

        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError {
                offset: start,
                message: format!("invalid number '{}'", text),
            })
    }

    fn parse_string(&mut self) -> Result<String, LiteralError> {
        let quote = self.peek().ok_or_else(|| self.error("expected string"))?;
        self.pos += 1;
        let mut out = String::new();

        loop {
            let rest = &self.input[self.pos..];
            let mut chars = rest.chars();
            let c = chars
                .next()
                .ok_or_else(|| self.error("unterminated string"))?;

            if c as u32 == quote as u32 {
                self.pos += 1;
                return Ok(out);
            }

            if c != '\\' {
                out.push(c);
                self.pos += c.len_utf8();
                continue;
            }

            self.pos += 1;
            let escaped = self
                .peek()
                .ok_or_else(|| self.error("unterminated escape"))?;
            self.pos += 1;

            match escaped {
                b'n' => out.push('\n'),
                b't' => out.push('\t'),
                b'r' => out.push('\r'),
                b'0' => out.push('\0'),
                b'b' => out.push('\u{08}'),
                b'f' => out.push('\u{0C}'),
                b'\\' => out.push('\\'),
                b'\'' => out.push('\''),
                b'"' => out.push('"'),
                b'/' => out.push('/'),
                b'\n' => {}
                b'x' => out.push(self.parse_hex_escape(2)?),
                b'u' => {
                    let c = self.parse_unicode_escape()?;
                    out.push(c);
                }
                b'U' => out.push(self.parse_hex_escape(8)?),
                _ => {
                    // Unknown escapes keep the backslash, as Python does
                    out.push('\\');
                    self.pos -= 1;
                }
            }
        }
    }

    fn read_hex(&mut self, digits: usize) -> Result<u32, LiteralError> {
        let end = self.pos + digits;
        let hex = self
            .input
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated escape"))?;
        let value = u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid hex escape"))?;
        self.pos = end;
        Ok(value)
    }

    fn parse_hex_escape(&mut self, digits: usize) -> Result<char, LiteralError> {
        let code = self.read_hex(digits)?;
        char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }

    /// `\uXXXX`, joining UTF-16 surrogate pairs as JSON encoders emit them
    fn parse_unicode_escape(&mut self) -> Result<char, LiteralError> {
        let high = self.read_hex(4)?;
        if (0xD800..0xDC00).contains(&high) && self.input[self.pos..].starts_with("\\u") {
            let save = self.pos;
            self.pos += 2;
            let low = self.read_hex(4)?;
            if (0xDC00..0xE000).contains(&low) {
                let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                return char::from_u32(code).ok_or_else(|| self.error("invalid code point"));
            }
            self.pos = save;
        }
        char::from_u32(high).ok_or_else(|| self.error("invalid code point"))
    }
}
