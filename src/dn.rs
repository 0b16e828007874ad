//! Distinguished names
//!
//! RFC 4514 string representation, parsed into RDN sequences so that
//! base-DN containment can be checked without string tricks.
//! Comparison is case-insensitive on attribute types and values.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, ConsoleResult};

/// One `type=value` pair of an RDN
#[derive(Debug, Clone)]
struct Ava {
    attribute: String,
    value: String,
}

impl Ava {
    fn normalized(&self) -> String {
        format!(
            "{}={}",
            self.attribute.to_ascii_lowercase(),
            self.value.trim().to_lowercase()
        )
    }
}

/// Relative distinguished name (one or more AVAs joined by `+`)
#[derive(Debug, Clone)]
pub struct Rdn {
    avas: Vec<Ava>,
}

impl Rdn {
    /// Normalized form, AVAs sorted so `a=1+b=2` equals `b=2+a=1`
    pub fn normalized(&self) -> String {
        let mut parts: Vec<String> = self.avas.iter().map(Ava::normalized).collect();
        parts.sort();
        parts.join("+")
    }

    /// Attribute type of the first AVA
    pub fn attribute(&self) -> &str {
        &self.avas[0].attribute
    }

    /// Unescaped value of the first AVA
    pub fn value(&self) -> &str {
        &self.avas[0].value
    }
}

impl PartialEq for Rdn {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for Rdn {}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ava) in self.avas.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}={}", ava.attribute, escape_value(&ava.value))?;
        }
        Ok(())
    }
}

/// A parsed distinguished name. The empty DN is the root DSE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dn {
    rdns: Vec<Rdn>,
}

impl Dn {
    /// The root DN
    pub fn root() -> Self {
        Self { rdns: Vec::new() }
    }

    /// Parse an RFC 4514 string
    pub fn parse(input: &str) -> ConsoleResult<Self> {
        Parser::new(input).parse()
    }

    pub fn is_root(&self) -> bool {
        self.rdns.is_empty()
    }

    /// RDNs, leaf first
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// Number of RDNs
    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Parent DN, `None` for the root
    pub fn parent(&self) -> Option<Dn> {
        if self.rdns.is_empty() {
            return None;
        }
        Some(Dn {
            rdns: self.rdns[1..].to_vec(),
        })
    }

    /// True when `self` is strictly below `ancestor`
    pub fn is_descendant_of(&self, ancestor: &Dn) -> bool {
        self.rdns.len() > ancestor.rdns.len() && self.ends_with(ancestor)
    }

    /// True when `self` equals `base` or is below it
    pub fn is_under(&self, base: &Dn) -> bool {
        self.ends_with(base)
    }

    fn ends_with(&self, suffix: &Dn) -> bool {
        if suffix.rdns.len() > self.rdns.len() {
            return false;
        }
        let offset = self.rdns.len() - suffix.rdns.len();
        self.rdns[offset..]
            .iter()
            .zip(suffix.rdns.iter())
            .all(|(a, b)| a == b)
    }

    /// Normalized string, suitable as a map key
    pub fn normalized(&self) -> String {
        self.rdns
            .iter()
            .map(Rdn::normalized)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", rdn)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Dn {
    type Error = ConsoleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Dn::parse(&value)
    }
}

impl From<Dn> for String {
    fn from(dn: Dn) -> Self {
        dn.to_string()
    }
}

impl std::str::FromStr for Dn {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dn::parse(s)
    }
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == last => out.push_str("\\ "),
            '\0' => out.push_str("\\00"),
            c => out.push(c),
        }
    }
    out
}

/// Keystring or numeric OID
pub(crate) fn is_valid_attribute_type(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        Some(c) if c.is_ascii_digit() => {
            !name.ends_with('.')
                && !name.contains("..")
                && name.chars().all(|c| c.is_ascii_digit() || c == '.')
        }
        _ => false,
    }
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, reason: &str) -> ConsoleError {
        ConsoleError::validation(format!(
            "invalid DN '{}' at position {}: {}",
            self.input, self.pos, reason
        ))
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn parse(mut self) -> ConsoleResult<Dn> {
        if self.input.trim().is_empty() {
            return Ok(Dn::root());
        }

        let mut rdns = Vec::new();
        loop {
            let mut avas = vec![self.parse_ava()?];
            let mut separated = false;
            loop {
                match self.peek() {
                    Some(b'+') => {
                        self.pos += 1;
                        avas.push(self.parse_ava()?);
                    }
                    Some(b',') | Some(b';') => {
                        self.pos += 1;
                        separated = true;
                        break;
                    }
                    None => break,
                    Some(_) => return Err(self.error("unexpected character after value")),
                }
            }
            rdns.push(Rdn { avas });
            if self.peek().is_none() {
                if separated {
                    return Err(self.error("empty RDN"));
                }
                break;
            }
        }
        Ok(Dn { rdns })
    }

    fn parse_ava(&mut self) -> ConsoleResult<Ava> {
        self.skip_spaces();
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'=' || b == b',' || b == b'+' || b == b';' {
                break;
            }
            self.pos += 1;
        }
        let attribute = self.input[start..self.pos].trim();
        if attribute.is_empty() {
            return Err(self.error("missing attribute type"));
        }
        if self.peek() != Some(b'=') {
            return Err(self.error("expected '='"));
        }
        let attribute = attribute
            .strip_prefix("oid.")
            .or_else(|| attribute.strip_prefix("OID."))
            .unwrap_or(attribute);
        if !is_valid_attribute_type(attribute) {
            return Err(self.error("invalid attribute type"));
        }
        self.pos += 1;
        self.skip_spaces();

        let value = match self.peek() {
            Some(b'#') => self.parse_hex_value()?,
            Some(b'"') => self.parse_quoted_value()?,
            _ => self.parse_string_value()?,
        };

        Ok(Ava {
            attribute: attribute.to_string(),
            value,
        })
    }

    fn parse_hex_value(&mut self) -> ConsoleResult<String> {
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek() {
            if !b.is_ascii_hexdigit() {
                break;
            }
            self.pos += 1;
        }
        let digits = self.pos - start - 1;
        if digits == 0 || digits % 2 != 0 {
            return Err(self.error("malformed hex string value"));
        }
        let value = self.input[start..self.pos].to_string();
        self.skip_spaces();
        Ok(value)
    }

    fn parse_quoted_value(&mut self) -> ConsoleResult<String> {
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted value")),
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    self.parse_escape(&mut out)?;
                }
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
        self.skip_spaces();
        String::from_utf8(out).map_err(|_| self.error("value is not valid UTF-8"))
    }

    fn parse_string_value(&mut self) -> ConsoleResult<String> {
        let mut out = Vec::new();
        // length of `out` up to the last escaped or non-space byte
        let mut significant = 0;
        while let Some(b) = self.peek() {
            match b {
                b',' | b'+' | b';' => break,
                b'\\' => {
                    self.pos += 1;
                    self.parse_escape(&mut out)?;
                    significant = out.len();
                }
                b'"' | b'<' | b'>' => {
                    return Err(self.error("special character must be escaped"));
                }
                b' ' => {
                    out.push(b);
                    self.pos += 1;
                }
                _ => {
                    out.push(b);
                    self.pos += 1;
                    significant = out.len();
                }
            }
        }
        out.truncate(significant);
        String::from_utf8(out).map_err(|_| self.error("value is not valid UTF-8"))
    }

    fn parse_escape(&mut self, out: &mut Vec<u8>) -> ConsoleResult<()> {
        match self.peek() {
            None => Err(self.error("trailing backslash")),
            Some(b) if b.is_ascii_hexdigit() => {
                let hi = b;
                let lo = self
                    .bytes
                    .get(self.pos + 1)
                    .copied()
                    .filter(u8::is_ascii_hexdigit)
                    .ok_or_else(|| self.error("invalid hex escape"))?;
                out.push(hex_value(hi) << 4 | hex_value(lo));
                self.pos += 2;
                Ok(())
            }
            Some(b) => {
                out.push(b);
                self.pos += 1;
                Ok(())
            }
        }
    }
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}
