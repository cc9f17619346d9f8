//! JSON → protobuf message conversion.
//!
//! # Strategy
//! 1. Strict decode with canonical protobuf-JSON rules. Done if it succeeds.
//! 2. Otherwise walk the target's descriptor field by field over a generic
//!    JSON tree, looking up each field by its camelCase JSON name (then its
//!    proto name). Unknown keys are ignored, absent fields keep their zero
//!    value, type mismatches are skipped, enums resolve by symbolic name.
//!
//! The fallback trades strictness for robustness against clients that do
//! not emit canonical field names or types.

use std::collections::HashMap;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use bytes::Bytes;
use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MapKey, ReflectMessage, Value};
use serde_json::{Map, Value as Json};

use crate::error::{GatewayError, GatewayResult};

/// Populate `target` from a JSON document.
///
/// An empty (or whitespace-only) body leaves every field at its zero value.
pub fn json_to_message(json: &[u8], target: &mut DynamicMessage) -> GatewayResult<()> {
    if json.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }

    let descriptor = target.descriptor();
    let mut deserializer = serde_json::Deserializer::from_slice(json);
    if let Ok(message) = DynamicMessage::deserialize(descriptor, &mut deserializer) {
        if deserializer.end().is_ok() {
            *target = message;
            return Ok(());
        }
    }

    let tree: Json = serde_json::from_slice(json).map_err(|e| GatewayError::Conversion(e.to_string()))?;
    match tree {
        Json::Object(object) => {
            tracing::trace!(message = %target.descriptor().full_name(), "Using field-by-field JSON conversion");
            assign_fields(target, &object);
            Ok(())
        }
        other => Err(GatewayError::Conversion(format!(
            "expected a JSON object for {}, got {}",
            target.descriptor().full_name(),
            json_kind(&other)
        ))),
    }
}

/// Field-by-field assignment against the message descriptor.
pub fn assign_fields(message: &mut DynamicMessage, object: &Map<String, Json>) {
    for field in message.descriptor().fields() {
        let Some(raw) = object.get(field.json_name()).or_else(|| object.get(field.name())) else {
            continue;
        };
        if raw.is_null() {
            continue;
        }

        let value = if field.is_map() {
            convert_map(&field, raw)
        } else if field.is_list() {
            raw.as_array().map(|items| {
                Value::List(items.iter().filter_map(|item| convert_single(&field.kind(), item)).collect())
            })
        } else {
            convert_single(&field.kind(), raw)
        };

        if let Some(value) = value {
            message.set_field(&field, value);
        }
    }
}

fn convert_map(field: &FieldDescriptor, raw: &Json) -> Option<Value> {
    let object = raw.as_object()?;
    let Kind::Message(entry) = field.kind() else { return None };
    let key_kind = entry.map_entry_key_field().kind();
    let value_kind = entry.map_entry_value_field().kind();

    let map: HashMap<MapKey, Value> = object
        .iter()
        .filter_map(|(key, value)| Some((convert_key(&key_kind, key)?, convert_single(&value_kind, value)?)))
        .collect();
    Some(Value::Map(map))
}

fn convert_key(kind: &Kind, key: &str) -> Option<MapKey> {
    match kind {
        Kind::String => Some(MapKey::String(key.to_string())),
        Kind::Bool => key.parse().ok().map(MapKey::Bool),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => key.parse().ok().map(MapKey::I32),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => key.parse().ok().map(MapKey::I64),
        Kind::Uint32 | Kind::Fixed32 => key.parse().ok().map(MapKey::U32),
        Kind::Uint64 | Kind::Fixed64 => key.parse().ok().map(MapKey::U64),
        _ => None,
    }
}

/// Standard or URL-safe alphabet, padding optional.
fn decode_base64(encoded: &str) -> Option<Bytes> {
    let unpadded = encoded.trim_end_matches('=');
    STANDARD_NO_PAD
        .decode(unpadded)
        .or_else(|_| URL_SAFE_NO_PAD.decode(unpadded))
        .ok()
        .map(Bytes::from)
}

fn convert_single(kind: &Kind, raw: &Json) -> Option<Value> {
    match kind {
        Kind::Bool => raw.as_bool().map(Value::Bool),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            as_i64(raw).and_then(|n| i32::try_from(n).ok()).map(Value::I32)
        }
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => as_i64(raw).map(Value::I64),
        Kind::Uint32 | Kind::Fixed32 => {
            as_u64(raw).and_then(|n| u32::try_from(n).ok()).map(Value::U32)
        }
        Kind::Uint64 | Kind::Fixed64 => as_u64(raw).map(Value::U64),
        Kind::Float => as_f64(raw).map(|n| Value::F32(n as f32)),
        Kind::Double => as_f64(raw).map(Value::F64),
        Kind::String => raw.as_str().map(|s| Value::String(s.to_string())),
        Kind::Bytes => raw.as_str().and_then(decode_base64).map(Value::Bytes),
        Kind::Enum(descriptor) => raw
            .as_str()
            .and_then(|name| descriptor.get_value_by_name(name))
            .map(|value| Value::EnumNumber(value.number())),
        Kind::Message(descriptor) => raw.as_object().map(|object| {
            let mut nested = DynamicMessage::new(descriptor.clone());
            assign_fields(&mut nested, object);
            Value::Message(nested)
        }),
    }
}

fn as_i64(raw: &Json) -> Option<i64> {
    match raw {
        Json::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_u64(raw: &Json) -> Option<u64> {
    match raw {
        Json::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(raw: &Json) -> Option<f64> {
    match raw {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
