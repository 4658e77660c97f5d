//! Typed values and the conversions between raw argv text and Rust types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declared value type of an option or operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Int,
    #[serde(alias = "unsigned")]
    UInt,
    #[serde(alias = "double")]
    Float,
    Char,
    String,
    Path,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Char => "char",
            Self::String => "string",
            Self::Path => "path",
        }
    }

    /// Convert `raw` into a value of this type.
    pub fn parse(self, raw: &str) -> Result<Value, String> {
        match self {
            Self::Bool => parse_bool(raw).map(Value::Bool),
            Self::Int => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| e.to_string()),
            Self::UInt => raw
                .trim()
                .parse::<u64>()
                .map(Value::UInt)
                .map_err(|e| e.to_string()),
            Self::Float => {
                let v = raw.trim().parse::<f64>().map_err(|e| e.to_string())?;
                if v.is_nan() {
                    return Err("NaN is not a number".to_string());
                }
                Ok(Value::Float(v))
            }
            Self::Char => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    (None, _) => Err("expected a single character, got nothing".to_string()),
                    _ => Err("expected a single character".to_string()),
                }
            }
            Self::String => Ok(Value::Str(raw.to_string())),
            Self::Path => {
                if raw.is_empty() {
                    Err("empty path".to_string())
                } else {
                    Ok(Value::Path(PathBuf::from(raw)))
                }
            }
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Bool),
            "int" | "integer" => Ok(Self::Int),
            "uint" | "unsigned" => Ok(Self::UInt),
            "float" | "double" => Ok(Self::Float),
            "char" => Ok(Self::Char),
            "string" | "str" => Ok(Self::String),
            "path" => Ok(Self::Path),
            other => Err(format!("unknown value type '{other}'")),
        }
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err("expected true/false, yes/no, on/off or 1/0".to_string()),
    }
}

/// A converted argument value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    Path(PathBuf),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::UInt(_) => ValueType::UInt,
            Self::Float(_) => ValueType::Float,
            Self::Char(_) => ValueType::Char,
            Self::Str(_) => ValueType::String,
            Self::Path(_) => ValueType::Path,
        }
    }
}

/// Text that parses back to the same value under its own type.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
            Self::Path(v) => write!(f, "{}", v.display()),
        }
    }
}

/// Current binding of one option or operand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Bound {
    Scalar(Option<Value>),
    Vector(Vec<Value>),
}

impl Bound {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(v) => v.is_none(),
            Self::Vector(v) => v.is_empty(),
        }
    }

    /// The last bound value, if any.
    pub fn last(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => v.as_ref(),
            Self::Vector(v) => v.last(),
        }
    }

    pub fn values(&self) -> &[Value] {
        match self {
            Self::Scalar(Some(v)) => std::slice::from_ref(v),
            Self::Scalar(None) => &[],
            Self::Vector(v) => v.as_slice(),
        }
    }
}

/// Scalar Rust types a [`Value`] converts into.
pub trait FromValue: Sized + Clone + 'static {
    const TYPE: ValueType;

    fn from_value(value: &Value) -> Option<Self>;
    fn into_value(self) -> Value;
}

macro_rules! from_value {
    ($ty:ty, $tag:ident, $variant:ident) => {
        impl FromValue for $ty {
            const TYPE: ValueType = ValueType::$tag;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

from_value!(bool, Bool, Bool);
from_value!(i64, Int, Int);
from_value!(u64, UInt, UInt);
from_value!(f64, Float, Float);
from_value!(char, Char, Char);
from_value!(String, String, Str);
from_value!(PathBuf, Path, Path);

/// Rust types that can receive a whole [`Bound`]: scalars, `Option<T>` and `Vec<T>`.
pub trait Bindable: Sized + Clone + 'static {
    const TYPE: ValueType;
    const VECTOR: bool;

    fn from_bound(bound: &Bound) -> Option<Self>;
    fn to_bound(&self) -> Bound;
}

macro_rules! bindable {
    ($($ty:ty),*) => {$(
        impl Bindable for $ty {
            const TYPE: ValueType = <$ty as FromValue>::TYPE;
            const VECTOR: bool = false;

            fn from_bound(bound: &Bound) -> Option<Self> {
                match bound {
                    Bound::Scalar(Some(v)) => <$ty>::from_value(v),
                    _ => None,
                }
            }

            fn to_bound(&self) -> Bound {
                Bound::Scalar(Some(self.clone().into_value()))
            }
        }

        impl Bindable for Option<$ty> {
            const TYPE: ValueType = <$ty as FromValue>::TYPE;
            const VECTOR: bool = false;

            fn from_bound(bound: &Bound) -> Option<Self> {
                match bound {
                    Bound::Scalar(Some(v)) => <$ty>::from_value(v).map(Some),
                    Bound::Scalar(None) => Some(None),
                    Bound::Vector(_) => None,
                }
            }

            fn to_bound(&self) -> Bound {
                Bound::Scalar(self.clone().map(FromValue::into_value))
            }
        }

        impl Bindable for Vec<$ty> {
            const TYPE: ValueType = <$ty as FromValue>::TYPE;
            const VECTOR: bool = true;

            fn from_bound(bound: &Bound) -> Option<Self> {
                match bound {
                    Bound::Vector(values) => values.iter().map(<$ty>::from_value).collect(),
                    Bound::Scalar(_) => None,
                }
            }

            fn to_bound(&self) -> Bound {
                Bound::Vector(self.iter().cloned().map(FromValue::into_value).collect())
            }
        }
    )*};
}

bindable!(bool, i64, u64, f64, char, String, PathBuf);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_type() {
        assert_eq!(ValueType::Int.parse("-7"), Ok(Value::Int(-7)));
        assert_eq!(ValueType::UInt.parse("7"), Ok(Value::UInt(7)));
        assert_eq!(ValueType::Float.parse("2.7"), Ok(Value::Float(2.7)));
        assert_eq!(ValueType::Char.parse("a"), Ok(Value::Char('a')));
        assert_eq!(ValueType::Bool.parse("Off"), Ok(Value::Bool(false)));
        assert_eq!(
            ValueType::Path.parse("out/x.txt"),
            Ok(Value::Path(PathBuf::from("out/x.txt")))
        );
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(ValueType::Int.parse("7x").is_err());
        assert!(ValueType::UInt.parse("-1").is_err());
        assert!(ValueType::Char.parse("ab").is_err());
        assert!(ValueType::Char.parse("").is_err());
        assert!(ValueType::Float.parse("NaN").is_err());
        assert!(ValueType::Bool.parse("maybe").is_err());
    }

    #[test]
    fn display_parses_back() {
        for (ty, raw) in [
            (ValueType::Float, "0.1"),
            (ValueType::Float, "-1e-300"),
            (ValueType::Int, "-42"),
            (ValueType::Char, "é"),
        ] {
            let v = ty.parse(raw).unwrap();
            assert_eq!(ty.parse(&v.to_string()).unwrap(), v);
        }
    }

    #[test]
    fn bindable_extracts_typed_values() {
        let b = Bound::Vector(vec![Value::Char('a'), Value::Char('b')]);
        assert_eq!(Vec::<char>::from_bound(&b), Some(vec!['a', 'b']));
        assert_eq!(<i64 as Bindable>::from_bound(&b), None);

        let none = Bound::Scalar(None);
        assert_eq!(Option::<String>::from_bound(&none), Some(None));
        assert_eq!(<String as Bindable>::from_bound(&none), None);
        assert_eq!(7i64.to_bound(), Bound::Scalar(Some(Value::Int(7))));
    }

    #[test]
    fn value_type_names() {
        assert_eq!("double".parse::<ValueType>(), Ok(ValueType::Float));
        assert!("complex".parse::<ValueType>().is_err());
        assert_eq!(ValueType::UInt.to_string(), "uint");
    }
}
