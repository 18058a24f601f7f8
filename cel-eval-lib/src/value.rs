//! Dynamically typed values exchanged with CEL expressions
//!
//! Variables arrive as YAML or JSON documents and results leave as text, so the
//! crate carries its own small value model rather than exposing the engine's.

use chrono::{DateTime, FixedOffset, SecondsFormat, TimeDelta};
use core::fmt;
use std::collections::BTreeMap;

/// Named values supplied to one evaluation, keyed by variable name.
pub type Bindings = BTreeMap<String, Value>;

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Self>),
    Map(BTreeMap<String, Self>),

    /// Only produced by expressions, never decoded from input documents.
    Duration(TimeDelta),

    /// Only produced by expressions, never decoded from input documents.
    Timestamp(DateTime<FixedOffset>),
}

/// Failure to convert a decoded document into a [`Value`].
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("unsupported mapping key {key}: keys must be scalars")]
    UnsupportedKey { key: String },
}

impl Value {
    /// Renders the value the way results are shown to users.
    ///
    /// A top-level string is written as-is, everything else uses CEL literal syntax.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// The CEL type name of this value.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null_type",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "double",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Duration(_) => "google.protobuf.Duration",
            Self::Timestamp(_) => "google.protobuf.Timestamp",
        }
    }
}

impl TryFrom<serde_yaml::Value> for Value {
    type Error = ValueError;

    fn try_from(value: serde_yaml::Value) -> Result<Self, Self::Error> {
        use serde_yaml::Value as Yaml;

        Ok(match value {
            Yaml::Null => Self::Null,
            Yaml::Bool(b) => Self::Bool(b),
            Yaml::Number(n) => from_number(&n),
            Yaml::String(s) => Self::String(s),
            Yaml::Sequence(items) => Self::List(items.into_iter().map(Self::try_from).collect::<Result<_, _>>()?),
            Yaml::Mapping(mapping) => {
                let mut map = BTreeMap::new();
                for (key, value) in mapping {
                    let _ = map.insert(map_key(key)?, Self::try_from(value)?);
                }
                Self::Map(map)
            }
            Yaml::Tagged(tagged) => Self::try_from(tagged.value)?,
        })
    }
}

fn from_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Int(i)
    } else if let Some(u) = n.as_u64() {
        Value::Uint(u)
    } else {
        Value::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn map_key(key: serde_yaml::Value) -> Result<String, ValueError> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => map_key(tagged.value),
        other @ (Yaml::Sequence(_) | Yaml::Mapping(_)) => Err(ValueError::UnsupportedKey {
            key: serde_yaml::to_string(&other).map_or_else(|_| format!("{other:?}"), |s| s.trim_end().to_string()),
        }),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Uint(u) => write!(f, "{u}u"),
            Self::Float(x) => write_float(f, *x),
            Self::String(s) => write_quoted(f, s),
            Self::Bytes(bytes) => write_bytes(f, bytes),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, key)?;
                    write!(f, ": {value}")?;
                }
                f.write_str("}")
            }
            Self::Duration(d) => write_duration(f, *d),
            Self::Timestamp(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_nan() {
        f.write_str("NaN")
    } else if x.is_infinite() {
        f.write_str(if x > 0.0 { "+infinity" } else { "-infinity" })
    } else if x != 0.0 && !(1e-6..1e21).contains(&x.abs()) {
        let text = format!("{x:e}");
        match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => write!(f, "{mantissa}e+{exponent}"),
            _ => f.write_str(&text),
        }
    } else if x.fract() == 0.0 {
        write!(f, "{x:.1}")
    } else {
        write!(f, "{x}")
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{:04x}", u32::from(c))?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

fn write_bytes(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_str("b\"")?;
    for &b in bytes {
        match b {
            b'"' => f.write_str("\\\"")?,
            b'\\' => f.write_str("\\\\")?,
            0x20..=0x7e => write!(f, "{}", char::from(b))?,
            _ => write!(f, "\\x{b:02x}")?,
        }
    }
    f.write_str("\"")
}

fn write_duration(f: &mut fmt::Formatter<'_>, d: TimeDelta) -> fmt::Result {
    if d < TimeDelta::zero() {
        f.write_str("-")?;
    }

    let d = d.abs();
    let secs = d.num_seconds();
    let nanos = d.subsec_nanos();
    if nanos == 0 {
        write!(f, "{secs}s")
    } else {
        let fraction = format!("{nanos:09}");
        write!(f, "{secs}.{}s", fraction.trim_end_matches('0'))
    }
}
