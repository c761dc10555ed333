use std::collections::HashMap;

use qdrant_client::qdrant::{ListValue, PointId, Struct, Value, point_id::PointIdOptions, value::Kind};
use serde_json::{Map, Number, Value as JsonValue};

pub fn payload_to_json(payload: HashMap<String, Value>) -> Map<String, JsonValue> {
	payload.into_iter().map(|(key, value)| (key, value_to_json(value))).collect()
}

pub fn value_to_json(value: Value) -> JsonValue {
	match value.kind {
		None | Some(Kind::NullValue(_)) => JsonValue::Null,
		Some(Kind::BoolValue(flag)) => JsonValue::Bool(flag),
		Some(Kind::IntegerValue(number)) => JsonValue::from(number),
		Some(Kind::DoubleValue(number)) =>
			Number::from_f64(number).map(JsonValue::Number).unwrap_or(JsonValue::Null),
		Some(Kind::StringValue(text)) => JsonValue::String(text),
		Some(Kind::ListValue(ListValue { values })) =>
			JsonValue::Array(values.into_iter().map(value_to_json).collect()),
		Some(Kind::StructValue(Struct { fields })) => JsonValue::Object(payload_to_json(fields)),
	}
}

pub fn point_id_to_string(point_id: Option<PointId>) -> Option<String> {
	match point_id?.point_id_options? {
		PointIdOptions::Uuid(id) => Some(id),
		PointIdOptions::Num(id) => Some(id.to_string()),
	}
}

/// Numeric ids stay numeric; everything else must be a UUID string.
pub fn string_to_point_id(id: &str) -> PointId {
	match id.parse::<u64>() {
		Ok(number) => PointId::from(number),
		Err(_) => PointId::from(id.to_string()),
	}
}
