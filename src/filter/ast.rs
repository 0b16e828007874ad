//! Search filter expression tree (RFC 4515)

use std::fmt;

use crate::index::IndexType;

/// Comparison kinds of leaf filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonKind {
    Equality,
    Substring,
    GreaterOrEqual,
    LessOrEqual,
    Present,
    ApproximateMatch,
    ExtensibleMatch,
}

impl ComparisonKind {
    /// Index type a server needs to evaluate this comparison from an index.
    /// Extensible matches do not map to a specific type.
    pub fn required_index_type(&self) -> Option<IndexType> {
        match self {
            ComparisonKind::Equality => Some(IndexType::Equality),
            ComparisonKind::Substring => Some(IndexType::Substring),
            ComparisonKind::GreaterOrEqual | ComparisonKind::LessOrEqual => Some(IndexType::Ordering),
            ComparisonKind::Present => Some(IndexType::Presence),
            ComparisonKind::ApproximateMatch => Some(IndexType::Approximate),
            ComparisonKind::ExtensibleMatch => None,
        }
    }
}

/// Parsed search filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    Equality {
        attribute: String,
        value: String,
    },
    Substring {
        attribute: String,
        initial: Option<String>,
        any: Vec<String>,
        final_: Option<String>,
    },
    GreaterOrEqual {
        attribute: String,
        value: String,
    },
    LessOrEqual {
        attribute: String,
        value: String,
    },
    Present {
        attribute: String,
    },
    ApproximateMatch {
        attribute: String,
        value: String,
    },
    ExtensibleMatch {
        attribute: Option<String>,
        matching_rule: Option<String>,
        dn_attributes: bool,
        value: String,
    },
}

impl FilterExpr {
    pub fn equality(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equality {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn present(attribute: impl Into<String>) -> Self {
        Self::Present {
            attribute: attribute.into(),
        }
    }

    pub fn approximate(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ApproximateMatch {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Comparison kind for leaves, `None` for `&`, `|` and `!`
    pub fn comparison(&self) -> Option<ComparisonKind> {
        let kind = match self {
            Self::And(_) | Self::Or(_) | Self::Not(_) => return None,
            Self::Equality { .. } => ComparisonKind::Equality,
            Self::Substring { .. } => ComparisonKind::Substring,
            Self::GreaterOrEqual { .. } => ComparisonKind::GreaterOrEqual,
            Self::LessOrEqual { .. } => ComparisonKind::LessOrEqual,
            Self::Present { .. } => ComparisonKind::Present,
            Self::ApproximateMatch { .. } => ComparisonKind::ApproximateMatch,
            Self::ExtensibleMatch { .. } => ComparisonKind::ExtensibleMatch,
        };
        Some(kind)
    }

    /// Attribute description of a leaf, options included
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::Equality { attribute, .. }
            | Self::Substring { attribute, .. }
            | Self::GreaterOrEqual { attribute, .. }
            | Self::LessOrEqual { attribute, .. }
            | Self::Present { attribute }
            | Self::ApproximateMatch { attribute, .. } => Some(attribute),
            Self::ExtensibleMatch { attribute, .. } => attribute.as_deref(),
            Self::And(_) | Self::Or(_) | Self::Not(_) => None,
        }
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => out.push_str("\\2a"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\\' => out.push_str("\\5c"),
            '\0' => out.push_str("\\00"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(children) | Self::Or(children) => {
                let op = if matches!(self, Self::And(_)) { '&' } else { '|' };
                write!(f, "({}", op)?;
                for child in children {
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
            Self::Not(child) => write!(f, "(!{})", child),
            Self::Equality { attribute, value } => write!(f, "({}={})", attribute, escape(value)),
            Self::Substring {
                attribute,
                initial,
                any,
                final_,
            } => {
                write!(f, "({}=", attribute)?;
                if let Some(initial) = initial {
                    f.write_str(&escape(initial))?;
                }
                f.write_str("*")?;
                for part in any {
                    write!(f, "{}*", escape(part))?;
                }
                if let Some(final_) = final_ {
                    f.write_str(&escape(final_))?;
                }
                f.write_str(")")
            }
            Self::GreaterOrEqual { attribute, value } => {
                write!(f, "({}>={})", attribute, escape(value))
            }
            Self::LessOrEqual { attribute, value } => write!(f, "({}<={})", attribute, escape(value)),
            Self::Present { attribute } => write!(f, "({}=*)", attribute),
            Self::ApproximateMatch { attribute, value } => {
                write!(f, "({}~={})", attribute, escape(value))
            }
            Self::ExtensibleMatch {
                attribute,
                matching_rule,
                dn_attributes,
                value,
            } => {
                f.write_str("(")?;
                if let Some(attribute) = attribute {
                    f.write_str(attribute)?;
                }
                if *dn_attributes {
                    f.write_str(":dn")?;
                }
                if let Some(rule) = matching_rule {
                    write!(f, ":{}", rule)?;
                }
                write!(f, ":={})", escape(value))
            }
        }
    }
}
