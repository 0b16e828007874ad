//! RFC 4515 string filter parser

use super::ast::FilterExpr;
use crate::dn::is_valid_attribute_type;
use crate::error::{ConsoleError, ConsoleResult};

/// Deepest accepted nesting of `&`, `|` and `!` operators
pub const MAX_FILTER_DEPTH: usize = 256;

impl FilterExpr {
    /// Parse a string filter. A missing outer parenthesis pair is tolerated.
    pub fn parse(input: &str) -> ConsoleResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ConsoleError::validation("empty search filter"));
        }
        let wrapped;
        let text = if trimmed.starts_with('(') {
            trimmed
        } else {
            wrapped = format!("({})", trimmed);
            &wrapped
        };

        let mut parser = Parser {
            input: text,
            bytes: text.as_bytes(),
            pos: 0,
            depth: 0,
        };
        let filter = parser.parse_filter()?;
        parser.skip_spaces();
        if parser.pos != parser.bytes.len() {
            return Err(parser.error("unexpected trailing characters"));
        }
        Ok(filter)
    }
}

/// True for a valid attribute description (`cn`, `cn;lang-fr`, `2.5.4.3`)
pub fn is_valid_attribute_description(description: &str) -> bool {
    let mut parts = description.split(';');
    let base = parts.next().unwrap_or_default();
    is_valid_attribute_type(base)
        && parts.all(|opt| !opt.is_empty() && opt.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
}

/// Attribute description without options, `cn;lang-fr` becomes `cn`
pub fn base_attribute(description: &str) -> &str {
    description.split(';').next().unwrap_or(description)
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: &str) -> ConsoleError {
        ConsoleError::validation(format!(
            "invalid search filter '{}' at position {}: {}",
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

    fn expect(&mut self, byte: u8) -> ConsoleResult<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn parse_filter(&mut self) -> ConsoleResult<FilterExpr> {
        self.skip_spaces();
        self.expect(b'(')?;
        if self.depth >= MAX_FILTER_DEPTH {
            return Err(self.error("filter nesting too deep"));
        }
        self.depth += 1;
        let filter = self.parse_component();
        self.depth -= 1;
        let filter = filter?;
        self.expect(b')')?;
        Ok(filter)
    }

    fn parse_component(&mut self) -> ConsoleResult<FilterExpr> {
        let filter = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                FilterExpr::And(self.parse_list()?)
            }
            Some(b'|') => {
                self.pos += 1;
                FilterExpr::Or(self.parse_list()?)
            }
            Some(b'!') => {
                self.pos += 1;
                let child = self.parse_filter()?;
                self.skip_spaces();
                FilterExpr::Not(Box::new(child))
            }
            Some(_) => self.parse_item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        Ok(filter)
    }

    fn parse_list(&mut self) -> ConsoleResult<Vec<FilterExpr>> {
        let mut children = Vec::new();
        loop {
            self.skip_spaces();
            match self.peek() {
                Some(b'(') => children.push(self.parse_filter()?),
                Some(b')') => return Ok(children),
                _ => return Err(self.error("expected '(' or ')' in filter set")),
            }
        }
    }

    /// Leaf item up to the closing parenthesis
    fn parse_item(&mut self) -> ConsoleResult<FilterExpr> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b')' => break,
                b'(' => return Err(self.error("unescaped '(' in filter value")),
                _ => self.pos += 1,
            }
        }
        if self.peek().is_none() {
            return Err(self.error("missing ')'"));
        }
        let item = &self.input[start..self.pos];

        let eq = item
            .find('=')
            .ok_or_else(|| self.error("missing comparison operator"))?;
        let raw_value = &item[eq + 1..];
        let (lhs, op) = match item[..eq].chars().last() {
            Some('~') => (&item[..eq - 1], '~'),
            Some('>') => (&item[..eq - 1], '>'),
            Some('<') => (&item[..eq - 1], '<'),
            Some(':') => (&item[..eq - 1], ':'),
            _ => (&item[..eq], '='),
        };

        if op == ':' {
            return self.parse_extensible(lhs, raw_value);
        }

        let attribute = lhs.trim();
        if !is_valid_attribute_description(attribute) {
            return Err(self.error(&format!("invalid attribute description '{}'", attribute)));
        }
        let attribute = attribute.to_string();

        let filter = match op {
            '~' => FilterExpr::ApproximateMatch {
                attribute,
                value: self.decode(raw_value)?,
            },
            '>' => FilterExpr::GreaterOrEqual {
                attribute,
                value: self.decode(raw_value)?,
            },
            '<' => FilterExpr::LessOrEqual {
                attribute,
                value: self.decode(raw_value)?,
            },
            _ if raw_value == "*" => FilterExpr::Present { attribute },
            _ if raw_value.contains('*') => self.parse_substring(attribute, raw_value)?,
            _ => FilterExpr::Equality {
                attribute,
                value: self.decode(raw_value)?,
            },
        };
        Ok(filter)
    }

    fn parse_substring(&self, attribute: String, raw_value: &str) -> ConsoleResult<FilterExpr> {
        let pieces: Vec<&str> = raw_value.split('*').collect();
        let last = pieces.len() - 1;
        let mut initial = None;
        let mut any = Vec::new();
        let mut final_ = None;
        for (i, piece) in pieces.iter().enumerate() {
            if piece.is_empty() {
                // only the first and last pieces may be omitted
                if i != 0 && i != last {
                    return Err(self.error("consecutive '*' in substring filter"));
                }
                continue;
            }
            let decoded = self.decode(piece)?;
            if i == 0 {
                initial = Some(decoded);
            } else if i == last {
                final_ = Some(decoded);
            } else {
                any.push(decoded);
            }
        }
        Ok(FilterExpr::Substring {
            attribute,
            initial,
            any,
            final_,
        })
    }

    fn parse_extensible(&self, lhs: &str, raw_value: &str) -> ConsoleResult<FilterExpr> {
        let mut parts = lhs.split(':');
        let attribute = parts.next().unwrap_or_default().trim();
        let mut dn_attributes = false;
        let mut matching_rule = None;
        for part in parts {
            if part.eq_ignore_ascii_case("dn") && !dn_attributes && matching_rule.is_none() {
                dn_attributes = true;
            } else if matching_rule.is_none() && is_valid_attribute_type(part) {
                matching_rule = Some(part.to_string());
            } else {
                return Err(self.error(&format!("invalid extensible match component '{}'", part)));
            }
        }

        let attribute = if attribute.is_empty() {
            if matching_rule.is_none() {
                return Err(self.error("extensible match needs an attribute or a matching rule"));
            }
            None
        } else {
            if !is_valid_attribute_description(attribute) {
                return Err(self.error(&format!("invalid attribute description '{}'", attribute)));
            }
            Some(attribute.to_string())
        };

        Ok(FilterExpr::ExtensibleMatch {
            attribute,
            matching_rule,
            dn_attributes,
            value: self.decode(raw_value)?,
        })
    }

    /// Decode `\XX` escapes
    fn decode(&self, raw: &str) -> ConsoleResult<String> {
        let bytes = raw.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\\' {
                let hex = raw
                    .get(i + 1..i + 3)
                    .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
                    .ok_or_else(|| self.error("invalid escape sequence in value"))?;
                let byte =
                    u8::from_str_radix(hex, 16).map_err(|_| self.error("invalid escape sequence"))?;
                out.push(byte);
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }
        String::from_utf8(out).map_err(|_| self.error("value is not valid UTF-8"))
    }
}
