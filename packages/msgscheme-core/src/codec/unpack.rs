//! Bytes to record.

use crate::error::CodecError;
use crate::scheme::{Field, FieldType, Message, Scheme, SubType, UnionId};

use super::decimal::Decimal;
use super::pointer::{self, ListRegion};
use super::time;
use super::value::{Record, UnionValue, Value};
use super::wire::{bit_is_set, read_count, read_f64, read_int, read_u128, read_uint, slice};

/// Unpacks a whole message.
///
/// # Arguments
/// * `scheme` - Scheme owning `message`
/// * `message` - Message layout
/// * `data` - Buffer starting with the message header
///
/// # Returns
/// `Result<Record, CodecError>` with every present field. Absent optional
/// fields and the pmap field are not part of the record.
pub fn unpack(scheme: &Scheme, message: &Message, data: &[u8]) -> Result<Record, CodecError> {
    check_header(message, data)?;
    read_message(scheme, message, data, 0)
}

pub(crate) fn check_header(message: &Message, data: &[u8]) -> Result<(), CodecError> {
    if data.len() < message.size {
        return Err(CodecError::Truncated {
            field: message.name.clone(),
            need: message.size,
            have: data.len(),
        });
    }
    Ok(())
}

/// Returns false for optional fields whose presence bit is clear.
pub(crate) fn is_present(
    message: &Message,
    field: &Field,
    data: &[u8],
    base: usize,
) -> Result<bool, CodecError> {
    let (Some(bit), Some(pmap)) = (field.optional, message.pmap_field()) else {
        return Ok(true);
    };
    let map = slice(data, base + pmap.offset, pmap.size, &pmap.name)?;
    Ok(bit_is_set(map, bit))
}

pub(crate) fn read_message(
    scheme: &Scheme,
    message: &Message,
    data: &[u8],
    base: usize,
) -> Result<Record, CodecError> {
    let mut record = Record::new();
    for field in &message.fields {
        if field.pmap || !is_present(message, field, data, base)? {
            continue;
        }
        let value = read_value(scheme, field, data, base + field.offset)?;
        record.set(&field.name, value);
    }
    Ok(record)
}

/// Reads the list location of an array or pointer field at `pos`.
///
/// # Returns
/// The region and the element layout; `TypeMismatch` for non-list fields.
pub(crate) fn list_region<'f>(
    field: &'f Field,
    data: &[u8],
    pos: usize,
) -> Result<(ListRegion, &'f Field), CodecError> {
    match &field.ty {
        FieldType::Array(array) => {
            let count = read_count(data, pos, &array.count.ty, &field.name)?;
            if count < 0 || count > array.capacity as i128 {
                return Err(CodecError::Malformed {
                    field: field.name.clone(),
                    reason: format!("array count {} outside 0..={}", count, array.capacity),
                });
            }
            let region = ListRegion {
                start: pos + array.element.offset,
                count: count as usize,
                stride: array.element.size,
            };
            Ok((region, &array.element))
        }
        FieldType::Pointer(ptr) => {
            let region = pointer::read(data, ptr.version, pos, ptr.element.size, &field.name)?;
            Ok((region, &ptr.element))
        }
        other => Err(CodecError::TypeMismatch {
            field: field.name.clone(),
            expected: "list".to_string(),
            got: other.kind_name(),
        }),
    }
}

/// Reads the active member of a union field at `pos`.
pub(crate) fn union_member<'s>(
    scheme: &'s Scheme,
    id: UnionId,
    field: &Field,
    data: &[u8],
    pos: usize,
) -> Result<&'s Field, CodecError> {
    let union = scheme.union_at(id);
    let tag = read_count(data, pos, &union.tag, &field.name)?;
    usize::try_from(tag)
        .ok()
        .and_then(|i| union.members.get(i))
        .ok_or_else(|| CodecError::Malformed {
            field: field.name.clone(),
            reason: format!("union tag {} outside 0..{}", tag, union.members.len()),
        })
}

/// Reads the text stored in a string pointer or ByteString blob.
///
/// Content up to the first NUL that is not valid UTF-8 is returned as raw bytes.
fn read_text(bytes: &[u8]) -> Value {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    match std::str::from_utf8(&bytes[..end]) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::Bytes(bytes[..end].to_vec()),
    }
}

/// Reads the value of `field` stored at absolute position `pos`.
pub(crate) fn read_value(
    scheme: &Scheme,
    field: &Field,
    data: &[u8],
    pos: usize,
) -> Result<Value, CodecError> {
    let name = field.name.as_str();
    match &field.ty {
        FieldType::Message(id) => {
            read_message(scheme, scheme.message_at(*id), data, pos).map(Value::Message)
        }
        FieldType::Array(_) | FieldType::Pointer(_) => {
            let (region, element) = list_region(field, data, pos)?;
            if field.is_string_pointer() {
                let bytes = slice(data, region.start, region.count, name)?;
                return Ok(read_text(bytes));
            }
            (0..region.count)
                .map(|i| read_value(scheme, element, data, region.element(i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        }
        FieldType::Union(id) => {
            let member = union_member(scheme, *id, field, data, pos)?;
            let value = read_value(scheme, member, data, pos + member.offset)?;
            Ok(Value::Union(UnionValue {
                name: member.name.clone(),
                value: Box::new(value),
            }))
        }
        FieldType::Bytes(size) => {
            let bytes = slice(data, pos, *size, name)?;
            Ok(match field.sub_type {
                SubType::ByteString => read_text(bytes),
                _ => Value::Bytes(bytes.to_vec()),
            })
        }
        FieldType::Double => {
            let v = read_f64(data, pos, name)?;
            Ok(match field.sub_type {
                SubType::Duration(res) => time::ticks_to_nanos_f64(v, res)
                    .and_then(time::delta_from_nanos)
                    .map_or(Value::Double(v), Value::Duration),
                SubType::TimePoint(res) => time::ticks_to_nanos_f64(v, res)
                    .and_then(time::point_from_nanos)
                    .map_or(Value::Double(v), Value::TimePoint),
                _ => Value::Double(v),
            })
        }
        FieldType::Decimal128 => Ok(Value::Decimal(Decimal::from_bid(read_u128(data, pos, name)?))),
        ty => {
            let raw: i128 = if ty.is_unsigned() {
                read_uint(data, pos, field.size, name)? as i128
            } else {
                read_int(data, pos, field.size, name)? as i128
            };
            let plain = || {
                if ty.is_unsigned() {
                    Value::UInt(raw as u64)
                } else {
                    Value::Int(raw as i64)
                }
            };
            Ok(match field.sub_type {
                SubType::Enum(id) => {
                    let en = scheme.enum_at(id);
                    let known = i64::try_from(raw).ok().and_then(|v| en.name_of(v));
                    match known.or(en.fallback.as_deref()) {
                        Some(entry) => Value::Enum(entry.to_string()),
                        None => plain(),
                    }
                }
                SubType::Bits(_) => Value::Bits(read_uint(data, pos, field.size, name)?),
                SubType::FixedPoint(precision) => Value::Decimal(Decimal::from_scaled(raw, precision)),
                SubType::Duration(res) => time::ticks_to_nanos(raw, res)
                    .and_then(time::delta_from_nanos)
                    .map_or_else(plain, Value::Duration),
                SubType::TimePoint(res) => time::ticks_to_nanos(raw, res)
                    .and_then(time::point_from_nanos)
                    .map_or_else(plain, Value::TimePoint),
                _ => plain(),
            })
        }
    }
}

/// Walks every pointer, array count and union tag without materializing values.
pub(crate) fn validate_message(
    scheme: &Scheme,
    message: &Message,
    data: &[u8],
    base: usize,
) -> Result<(), CodecError> {
    for field in &message.fields {
        if !is_present(message, field, data, base)? {
            continue;
        }
        validate_field(scheme, field, data, base + field.offset)?;
    }
    Ok(())
}

fn validate_field(scheme: &Scheme, field: &Field, data: &[u8], pos: usize) -> Result<(), CodecError> {
    match &field.ty {
        FieldType::Message(id) => validate_message(scheme, scheme.message_at(*id), data, pos),
        FieldType::Array(_) | FieldType::Pointer(_) => {
            let (region, element) = list_region(field, data, pos)?;
            if needs_walk(&element.ty) {
                for i in 0..region.count {
                    validate_field(scheme, element, data, region.element(i))?;
                }
            }
            Ok(())
        }
        FieldType::Union(id) => {
            let member = union_member(scheme, *id, field, data, pos)?;
            validate_field(scheme, member, data, pos + member.offset)
        }
        _ => Ok(()),
    }
}

fn needs_walk(ty: &FieldType) -> bool {
    matches!(
        ty,
        FieldType::Message(_) | FieldType::Array(_) | FieldType::Pointer(_) | FieldType::Union(_)
    )
}
