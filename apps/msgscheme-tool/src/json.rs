//! JSON form of records.
//!
//! Scalars go through the field's text parser, so JSON strings accept the
//! same literals as `from_string` (enum names, `a | b` bit sets, `1.5s`).
//! Raw byte blobs are hex strings, unions are single-key objects.

use anyhow::{anyhow, bail, Context, Result};
use msgscheme_core::codec::{from_string, to_string, Record, UnionValue, Value};
use msgscheme_core::scheme::{Field, FieldType, Message, Scheme, SubType};
use serde_json::{Map, Number, Value as Json};

/// Builds a record for `message` from a JSON object.
pub fn record_from_json(scheme: &Scheme, message: &Message, json: &Json) -> Result<Record> {
    let object = json
        .as_object()
        .ok_or_else(|| anyhow!("message '{}' expects a JSON object", message.name))?;

    let mut record = Record::new();
    for (name, item) in object {
        let field = message
            .field(name)
            .ok_or_else(|| anyhow!("unknown field '{}' in message '{}'", name, message.name))?;
        record.set(name, value_from_json(scheme, field, item)?);
    }
    Ok(record)
}

/// Renders a record of `message` as a JSON object.
pub fn record_to_json(scheme: &Scheme, message: &Message, record: &Record) -> Json {
    let mut object = Map::new();
    for (name, value) in record.iter() {
        let item = match message.field(name) {
            Some(field) => value_to_json(scheme, field, value),
            None => Json::Null,
        };
        object.insert(name.to_string(), item);
    }
    Json::Object(object)
}

fn value_from_json(scheme: &Scheme, field: &Field, json: &Json) -> Result<Value> {
    if field.is_string_pointer() {
        return match json {
            Json::String(text) => Ok(Value::String(text.clone())),
            _ => bail!("field '{}' expects a string", field.name),
        };
    }

    match &field.ty {
        FieldType::Message(id) => {
            let record = record_from_json(scheme, scheme.message_at(*id), json)
                .with_context(|| format!("field '{}'", field.name))?;
            Ok(Value::Message(record))
        }
        FieldType::Array(array) => list_from_json(scheme, field, &array.element, json),
        FieldType::Pointer(ptr) => list_from_json(scheme, field, &ptr.element, json),
        FieldType::Union(id) => {
            let Some((name, item)) = json.as_object().filter(|o| o.len() == 1).and_then(|o| o.iter().next())
            else {
                bail!("union field '{}' expects an object with one member", field.name);
            };
            let (_, member) = scheme.union_at(*id).member(name).ok_or_else(|| {
                anyhow!("field '{}': unknown union member '{}'", field.name, name)
            })?;
            let value = value_from_json(scheme, member, item)?;
            Ok(Value::Union(UnionValue::new(name, value)))
        }
        FieldType::Bytes(_) if field.sub_type == SubType::None => {
            let text = json
                .as_str()
                .ok_or_else(|| anyhow!("field '{}' expects a hex string", field.name))?;
            let bytes = hex::decode(text)
                .with_context(|| format!("field '{}': invalid hex '{}'", field.name, text))?;
            Ok(Value::Bytes(bytes))
        }
        _ => {
            let text = match json {
                Json::String(text) => text.clone(),
                Json::Number(number) => number.to_string(),
                other => bail!("field '{}' does not accept {}", field.name, other),
            };
            from_string(scheme, field, &text).with_context(|| format!("field '{}'", field.name))
        }
    }
}

fn list_from_json(scheme: &Scheme, field: &Field, element: &Field, json: &Json) -> Result<Value> {
    let items = json
        .as_array()
        .ok_or_else(|| anyhow!("list field '{}' expects a JSON array", field.name))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            value_from_json(scheme, element, item)
                .with_context(|| format!("element {} of '{}'", i, field.name))
        })
        .collect::<Result<Vec<_>>>()
        .map(Value::List)
}

fn value_to_json(scheme: &Scheme, field: &Field, value: &Value) -> Json {
    match (value, &field.ty) {
        (Value::Message(record), FieldType::Message(id)) => {
            record_to_json(scheme, scheme.message_at(*id), record)
        }
        (Value::List(items), FieldType::Array(array)) => list_to_json(scheme, &array.element, items),
        (Value::List(items), FieldType::Pointer(ptr)) => list_to_json(scheme, &ptr.element, items),
        (Value::Union(member), FieldType::Union(id)) => {
            let item = match scheme.union_at(*id).member(&member.name) {
                Some((_, f)) => value_to_json(scheme, f, &member.value),
                None => Json::Null,
            };
            let mut object = Map::new();
            object.insert(member.name.clone(), item);
            Json::Object(object)
        }
        (Value::Int(v), _) => Json::from(*v),
        (Value::UInt(v), _) => Json::from(*v),
        (Value::Double(v), _) => Number::from_f64(*v)
            .map(Json::Number)
            .unwrap_or_else(|| Json::String(v.to_string())),
        (Value::Bytes(bytes), _) => Json::String(hex::encode(bytes)),
        _ => Json::String(to_string(scheme, field, value)),
    }
}

fn list_to_json(scheme: &Scheme, element: &Field, items: &[Value]) -> Json {
    Json::Array(
        items
            .iter()
            .map(|item| value_to_json(scheme, element, item))
            .collect(),
    )
}
