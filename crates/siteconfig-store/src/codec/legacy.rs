//! Read-only decoder for rows written in the legacy serialize format.
//!
//! Supported forms:
//!
//! ```text
//! N;                       null
//! b:0;  b:1;               bool
//! i:42;                    int
//! d:30.5;  d:INF;  d:NAN;  float
//! s:5:"hello";             string, length in bytes
//! a:2:{i:0;s:1:"a";i:1;b:1;}   array
//! ```
//!
//! Arrays keyed exactly `0..n` in order become [`ConfigValue::List`], all
//! others become [`ConfigValue::Map`] with integer keys rendered as strings.
//! Objects, references, anything trailing the value and arrays nested deeper
//! than [`MAX_DEPTH`] are rejected.

use std::collections::BTreeMap;

use crate::value::ConfigValue;

/// Deepest array nesting accepted before the input is treated as malformed.
pub const MAX_DEPTH: usize = 128;

/// Parse `input` as one legacy-serialized value.
///
/// Returns `None` when the input is not a complete, well-formed value, which
/// keeps "parsed to `false`" distinct from "did not parse".
pub fn parse(input: &str) -> Option<ConfigValue> {
    let mut parser = Parser {
        input: input.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    (parser.pos == parser.input.len()).then_some(value)
}

enum ArrayKey {
    Index(i64),
    Name(String),
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn value(&mut self) -> Option<ConfigValue> {
        match self.next()? {
            b'N' => {
                self.expect(b';')?;
                Some(ConfigValue::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let flag = match self.next()? {
                    b'0' => false,
                    b'1' => true,
                    _ => return None,
                };
                self.expect(b';')?;
                Some(ConfigValue::Bool(flag))
            }
            b'i' => {
                self.expect(b':')?;
                Some(ConfigValue::Int(self.int_until(b';')?))
            }
            b'd' => {
                self.expect(b':')?;
                Some(ConfigValue::Float(self.float_until(b';')?))
            }
            b's' => Some(ConfigValue::String(self.string_body()?)),
            b'a' => {
                if self.depth == MAX_DEPTH {
                    return None;
                }
                self.depth += 1;
                let array = self.array_body();
                self.depth -= 1;
                array
            }
            _ => None,
        }
    }

    fn array_body(&mut self) -> Option<ConfigValue> {
        self.expect(b':')?;
        let len = usize::try_from(self.int_until(b':')?).ok()?;
        self.expect(b'{')?;

        let mut entries = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            let key = match self.next()? {
                b'i' => {
                    self.expect(b':')?;
                    ArrayKey::Index(self.int_until(b';')?)
                }
                b's' => ArrayKey::Name(self.string_body()?),
                _ => return None,
            };
            entries.push((key, self.value()?));
        }
        self.expect(b'}')?;

        let sequential = entries.iter().enumerate().all(|(i, (key, _))| {
            matches!(key, ArrayKey::Index(n) if usize::try_from(*n).ok() == Some(i))
        });

        if sequential {
            return Some(ConfigValue::List(
                entries.into_iter().map(|(_, value)| value).collect(),
            ));
        }

        let map: BTreeMap<String, ConfigValue> = entries
            .into_iter()
            .map(|(key, value)| {
                let key = match key {
                    ArrayKey::Index(n) => n.to_string(),
                    ArrayKey::Name(s) => s,
                };
                (key, value)
            })
            .collect();
        Some(ConfigValue::Map(map))
    }

    /// `:<len>:"<bytes>";` following an `s`.
    fn string_body(&mut self) -> Option<String> {
        self.expect(b':')?;
        let len = usize::try_from(self.int_until(b':')?).ok()?;
        self.expect(b'"')?;
        let end = self.pos.checked_add(len)?;
        let bytes = self.input.get(self.pos..end)?;
        let text = std::str::from_utf8(bytes).ok()?.to_string();
        self.pos = end;
        self.expect(b'"')?;
        self.expect(b';')?;
        Some(text)
    }

    fn int_until(&mut self, terminator: u8) -> Option<i64> {
        self.token_until(terminator)?.parse().ok()
    }

    fn float_until(&mut self, terminator: u8) -> Option<f64> {
        match self.token_until(terminator)? {
            "INF" => Some(f64::INFINITY),
            "-INF" => Some(f64::NEG_INFINITY),
            "NAN" => Some(f64::NAN),
            other => other.parse().ok(),
        }
    }

    /// Read up to (and consume) `terminator`, returning the text before it.
    fn token_until(&mut self, terminator: u8) -> Option<&'a str> {
        let input = self.input;
        let rest = input.get(self.pos..)?;
        let offset = rest.iter().position(|&b| b == terminator)?;
        let token = std::str::from_utf8(&rest[..offset]).ok()?;
        self.pos += offset + 1;
        (!token.is_empty()).then_some(token)
    }

    fn next(&mut self) -> Option<u8> {
        let byte = *self.input.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn expect(&mut self, byte: u8) -> Option<()> {
        (self.next()? == byte).then_some(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
