use std::fmt;

use serde_json::{Map, Number};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    String,
    Vec2,
    Vec3,
    Vec4,
    AssetRef,
    Enum,
}

impl FieldKind {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::AssetRef => "asset",
            Self::Enum => "enum",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        let kind = match token {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "string" => Self::String,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "asset" => Self::AssetRef,
            "enum" => Self::Enum,
            _ => return None,
        };
        Some(kind)
    }

    fn vector_len(self) -> Option<usize> {
        match self {
            Self::Vec2 => Some(2),
            Self::Vec3 => Some(3),
            Self::Vec4 => Some(4),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Vec2([f64; 2]),
    Vec3([f64; 3]),
    Vec4([f64; 4]),
    AssetRef(String),
    Enum(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("expected {expected}, got {actual}")]
    KindMismatch { expected: FieldKind, actual: String },
    #[error("unsupported value shape: {0}")]
    Unsupported(String),
    #[error("non-finite number {0} cannot be written as JSON")]
    NonFinite(String),
}

impl Value {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Bool(_) => FieldKind::Bool,
            Self::Int(_) => FieldKind::Int,
            Self::Float(_) => FieldKind::Float,
            Self::String(_) => FieldKind::String,
            Self::Vec2(_) => FieldKind::Vec2,
            Self::Vec3(_) => FieldKind::Vec3,
            Self::Vec4(_) => FieldKind::Vec4,
            Self::AssetRef(_) => FieldKind::AssetRef,
            Self::Enum(_) => FieldKind::Enum,
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, ConversionError> {
        let encoded = match self {
            Self::Bool(value) => serde_json::Value::Bool(*value),
            Self::Int(value) => serde_json::Value::Number((*value).into()),
            Self::Float(value) => float_json(*value)?,
            Self::String(value) => serde_json::Value::String(value.clone()),
            Self::Vec2(values) => vector_json(values)?,
            Self::Vec3(values) => vector_json(values)?,
            Self::Vec4(values) => vector_json(values)?,
            Self::AssetRef(path) => tagged_json("asset", path),
            Self::Enum(variant) => tagged_json("enum", variant),
        };
        Ok(encoded)
    }

    pub fn from_json(
        raw: &serde_json::Value,
        declared: Option<FieldKind>,
    ) -> Result<Self, ConversionError> {
        match declared {
            Some(kind) => convert_declared(raw, kind),
            None => infer(raw),
        }
    }

    pub fn parse_text(kind: FieldKind, text: &str) -> Result<Self, ConversionError> {
        let mismatch = || ConversionError::KindMismatch {
            expected: kind,
            actual: format!("'{text}'"),
        };
        let value = match kind {
            FieldKind::Bool => match text {
                "true" => Self::Bool(true),
                "false" => Self::Bool(false),
                _ => return Err(mismatch()),
            },
            FieldKind::Int => Self::Int(text.parse::<i64>().map_err(|_| mismatch())?),
            FieldKind::Float => Self::Float(parse_finite(text).ok_or_else(mismatch)?),
            FieldKind::String => Self::String(text.to_string()),
            FieldKind::AssetRef => Self::AssetRef(text.to_string()),
            FieldKind::Enum => {
                if text.is_empty() {
                    return Err(mismatch());
                }
                Self::Enum(text.to_string())
            }
            FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Vec4 => {
                let components = text
                    .split(|ch: char| ch == ',' || ch.is_whitespace())
                    .filter(|part| !part.is_empty())
                    .map(parse_finite)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(mismatch)?;
                vector_value(kind, &components).ok_or_else(mismatch)?
            }
        };
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value:?}"),
            Self::String(value) => write!(f, "{value:?}"),
            Self::Vec2(values) => write_vector(f, values),
            Self::Vec3(values) => write_vector(f, values),
            Self::Vec4(values) => write_vector(f, values),
            Self::AssetRef(path) => write!(f, "asset:{path}"),
            Self::Enum(variant) => write!(f, "enum:{variant}"),
        }
    }
}

fn write_vector(f: &mut fmt::Formatter<'_>, values: &[f64]) -> fmt::Result {
    f.write_str("(")?;
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{value:?}")?;
    }
    f.write_str(")")
}

fn float_json(value: f64) -> Result<serde_json::Value, ConversionError> {
    Number::from_f64(value)
        .map(serde_json::Value::Number)
        .ok_or_else(|| ConversionError::NonFinite(format!("{value:?}")))
}

fn vector_json(values: &[f64]) -> Result<serde_json::Value, ConversionError> {
    let items = values
        .iter()
        .copied()
        .map(float_json)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::Value::Array(items))
}

fn tagged_json(tag: &str, text: &str) -> serde_json::Value {
    let mut map = Map::new();
    map.insert(tag.to_string(), serde_json::Value::String(text.to_string()));
    serde_json::Value::Object(map)
}

fn parse_finite(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn describe(raw: &serde_json::Value) -> String {
    match raw {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(_) => "bool".to_string(),
        serde_json::Value::Number(number) if number.is_f64() => "float".to_string(),
        serde_json::Value::Number(_) => "integer".to_string(),
        serde_json::Value::String(_) => "string".to_string(),
        serde_json::Value::Array(items) => format!("array of {}", items.len()),
        serde_json::Value::Object(_) => "object".to_string(),
    }
}

fn numbers(items: &[serde_json::Value]) -> Option<Vec<f64>> {
    items.iter().map(serde_json::Value::as_f64).collect()
}

fn vector_value(kind: FieldKind, components: &[f64]) -> Option<Value> {
    if kind.vector_len()? != components.len() {
        return None;
    }
    let value = match kind {
        FieldKind::Vec2 => Value::Vec2([components[0], components[1]]),
        FieldKind::Vec3 => Value::Vec3([components[0], components[1], components[2]]),
        FieldKind::Vec4 => Value::Vec4([
            components[0],
            components[1],
            components[2],
            components[3],
        ]),
        _ => return None,
    };
    Some(value)
}

fn tagged_text<'a>(raw: &'a serde_json::Value, tag: &str) -> Option<&'a str> {
    let map = raw.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get(tag)?.as_str()
}

fn convert_declared(raw: &serde_json::Value, kind: FieldKind) -> Result<Value, ConversionError> {
    let mismatch = || ConversionError::KindMismatch {
        expected: kind,
        actual: describe(raw),
    };
    let value = match kind {
        FieldKind::Bool => Value::Bool(raw.as_bool().ok_or_else(mismatch)?),
        FieldKind::Int => {
            if let Some(value) = raw.as_i64() {
                Value::Int(value)
            } else {
                // Integral floats such as `3.0` are accepted, fractions are not.
                let value = raw.as_f64().ok_or_else(mismatch)?;
                if value.fract() != 0.0 || value < i64::MIN as f64 || value > i64::MAX as f64 {
                    return Err(mismatch());
                }
                Value::Int(value as i64)
            }
        }
        FieldKind::Float => Value::Float(raw.as_f64().ok_or_else(mismatch)?),
        FieldKind::String => Value::String(raw.as_str().ok_or_else(mismatch)?.to_string()),
        FieldKind::AssetRef => {
            let text = raw
                .as_str()
                .or_else(|| tagged_text(raw, "asset"))
                .ok_or_else(mismatch)?;
            Value::AssetRef(text.to_string())
        }
        FieldKind::Enum => {
            let text = raw
                .as_str()
                .or_else(|| tagged_text(raw, "enum"))
                .ok_or_else(mismatch)?;
            Value::Enum(text.to_string())
        }
        FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Vec4 => {
            let items = raw.as_array().ok_or_else(mismatch)?;
            let components = numbers(items).ok_or_else(mismatch)?;
            vector_value(kind, &components).ok_or_else(mismatch)?
        }
    };
    Ok(value)
}

fn infer(raw: &serde_json::Value) -> Result<Value, ConversionError> {
    match raw {
        serde_json::Value::Bool(value) => Ok(Value::Bool(*value)),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(value) => Ok(Value::Int(value)),
            None => number
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| ConversionError::Unsupported(number.to_string())),
        },
        serde_json::Value::String(text) => Ok(Value::String(text.clone())),
        serde_json::Value::Array(items) => {
            let kind = match items.len() {
                2 => FieldKind::Vec2,
                3 => FieldKind::Vec3,
                4 => FieldKind::Vec4,
                _ => return Err(ConversionError::Unsupported(describe(raw))),
            };
            convert_declared(raw, kind)
        }
        serde_json::Value::Object(_) => {
            if let Some(path) = tagged_text(raw, "asset") {
                Ok(Value::AssetRef(path.to_string()))
            } else if let Some(variant) = tagged_text(raw, "enum") {
                Ok(Value::Enum(variant.to_string()))
            } else {
                Err(ConversionError::Unsupported(describe(raw)))
            }
        }
        serde_json::Value::Null => Err(ConversionError::Unsupported(describe(raw))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn inference_follows_json_shape() {
        assert_eq!(Value::from_json(&json!(3), None), Ok(Value::Int(3)));
        assert_eq!(Value::from_json(&json!(3.5), None), Ok(Value::Float(3.5)));
        assert_eq!(
            Value::from_json(&json!([1, 2, 3]), None),
            Ok(Value::Vec3([1.0, 2.0, 3.0]))
        );
        assert_eq!(
            Value::from_json(&json!({"asset": "sprites/torch.png"}), None),
            Ok(Value::AssetRef("sprites/torch.png".to_string()))
        );
        assert_eq!(
            Value::from_json(&json!({"enum": "Hostile"}), None),
            Ok(Value::Enum("Hostile".to_string()))
        );
    }

    #[test]
    fn declared_kind_widens_integers_and_accepts_plain_strings() {
        assert_eq!(
            Value::from_json(&json!(0), Some(FieldKind::Float)),
            Ok(Value::Float(0.0))
        );
        assert_eq!(
            Value::from_json(&json!([0, 1]), Some(FieldKind::Vec2)),
            Ok(Value::Vec2([0.0, 1.0]))
        );
        assert_eq!(
            Value::from_json(&json!("Idle"), Some(FieldKind::Enum)),
            Ok(Value::Enum("Idle".to_string()))
        );
        assert_eq!(
            Value::from_json(&json!(4.0), Some(FieldKind::Int)),
            Ok(Value::Int(4))
        );
    }

    #[test]
    fn declared_kind_rejects_mismatched_shapes() {
        assert!(matches!(
            Value::from_json(&json!("ten"), Some(FieldKind::Int)),
            Err(ConversionError::KindMismatch {
                expected: FieldKind::Int,
                ..
            })
        ));
        assert!(Value::from_json(&json!(1.5), Some(FieldKind::Int)).is_err());
        assert!(Value::from_json(&json!([1, 2]), Some(FieldKind::Vec3)).is_err());
        assert!(Value::from_json(&json!(null), None).is_err());
        assert!(Value::from_json(&json!({"nested": {"x": 1}}), None).is_err());
    }

    #[test]
    fn json_encoding_is_self_describing() {
        let values = [
            Value::Bool(true),
            Value::Int(-7),
            Value::Float(1.0),
            Value::Vec4([0.0, 0.5, 1.0, 1.0]),
            Value::AssetRef("fonts/mono.ttf".to_string()),
            Value::Enum("Closed".to_string()),
            Value::String("plain".to_string()),
        ];
        for value in values {
            let encoded = value.to_json().expect("encode");
            assert_eq!(Value::from_json(&encoded, None), Ok(value));
        }
    }

    #[test]
    fn non_finite_numbers_are_not_encoded() {
        assert!(matches!(
            Value::Float(f64::INFINITY).to_json(),
            Err(ConversionError::NonFinite(_))
        ));
        assert!(matches!(
            Value::Vec3([0.0, f64::NAN, 1.0]).to_json(),
            Err(ConversionError::NonFinite(_))
        ));
    }

    #[test]
    fn int_and_float_are_never_equal() {
        assert_ne!(Value::Int(10), Value::Float(10.0));
    }

    #[test]
    fn parse_text_handles_vectors_and_rejects_bad_numbers() {
        assert_eq!(
            Value::parse_text(FieldKind::Vec3, "1, 2 3"),
            Ok(Value::Vec3([1.0, 2.0, 3.0]))
        );
        assert!(Value::parse_text(FieldKind::Vec2, "1 2 3").is_err());
        assert!(Value::parse_text(FieldKind::Float, "NaN").is_err());
        assert!(Value::parse_text(FieldKind::Bool, "yes").is_err());
    }
}
