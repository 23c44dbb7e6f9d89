use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Type discriminator stored alongside every settings row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    String,
    Bool,
    Int,
}

impl SettingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKind::String => "string",
            SettingKind::Bool => "bool",
            SettingKind::Int => "int",
        }
    }
}

impl FromStr for SettingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(SettingKind::String),
            "bool" => Ok(SettingKind::Bool),
            "int" => Ok(SettingKind::Int),
            other => Err(format!("unknown setting kind: {other}")),
        }
    }
}

/// A typed settings value. Values are persisted as strings and converted at
/// the repository boundary according to the stored kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    String(String),
    Bool(bool),
    Int(i64),
}

impl SettingValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::String(_) => SettingKind::String,
            SettingValue::Bool(_) => SettingKind::Bool,
            SettingValue::Int(_) => SettingKind::Int,
        }
    }

    /// Parse a stored string back into a typed value. Malformed bools and
    /// ints fall back to the raw string rather than failing the read.
    pub fn parse(kind: SettingKind, raw: &str) -> Self {
        match kind {
            SettingKind::String => SettingValue::String(raw.to_string()),
            SettingKind::Bool => SettingValue::Bool(matches!(
                raw.to_ascii_lowercase().as_str(),
                "true" | "1" | "yes"
            )),
            SettingKind::Int => raw
                .parse::<i64>()
                .map(SettingValue::Int)
                .unwrap_or_else(|_| SettingValue::String(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::String(s) => f.write_str(s),
            SettingValue::Bool(b) => write!(f, "{b}"),
            SettingValue::Int(i) => write!(f, "{i}"),
        }
    }
}

/// A key/value settings row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: SettingValue,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_typed_values() {
        let v = SettingValue::parse(SettingKind::Bool, "true");
        assert_eq!(v, SettingValue::Bool(true));
        let v = SettingValue::parse(SettingKind::Int, "42");
        assert_eq!(v, SettingValue::Int(42));
        let v = SettingValue::parse(SettingKind::String, "hello");
        assert_eq!(v.to_string(), "hello");
    }

    #[test]
    fn malformed_int_degrades_to_string() {
        let v = SettingValue::parse(SettingKind::Int, "not-a-number");
        assert_eq!(v, SettingValue::String("not-a-number".into()));
    }
}
