//! Record to bytes.

use crate::error::CodecError;
use crate::scheme::{Field, FieldType, Message, Scheme, SubType};

use super::decimal::Decimal;
use super::pointer;
use super::time;
use super::value::{Record, Value};
use super::wire::{set_bit, write_u128, write_uint};

/// Packs a record into a new buffer.
///
/// # Arguments
/// * `scheme` - Scheme owning `message`
/// * `message` - Message layout
/// * `record` - Field values, missing non-optional fields are written as zero
///
/// # Returns
/// `Result<Vec<u8>, CodecError>` holding the fixed header followed by all
/// variable length regions.
pub fn pack(scheme: &Scheme, message: &Message, record: &Record) -> Result<Vec<u8>, CodecError> {
    let mut packer = Packer {
        scheme,
        buf: vec![0u8; message.size],
    };
    packer.message(message, record, 0)?;
    Ok(packer.buf)
}

struct Packer<'a> {
    scheme: &'a Scheme,
    buf: Vec<u8>,
}

fn mismatch(field: &Field, expected: &str, value: &Value) -> CodecError {
    CodecError::TypeMismatch {
        field: field.name.clone(),
        expected: expected.to_string(),
        got: value.kind().to_string(),
    }
}

fn overflow(field: &Field, value: impl ToString, target: impl ToString) -> CodecError {
    CodecError::Overflow {
        field: field.name.clone(),
        value: value.to_string(),
        target: target.to_string(),
    }
}

impl Packer<'_> {
    fn message(&mut self, message: &Message, record: &Record, base: usize) -> Result<(), CodecError> {
        for name in record.names() {
            if message.field(name).is_none() {
                return Err(CodecError::UnknownField {
                    message: message.name.clone(),
                    field: name.to_string(),
                });
            }
        }

        let mut pmap = message
            .pmap_field()
            .map(|f| vec![0u8; f.size])
            .unwrap_or_default();
        for field in &message.fields {
            if field.pmap {
                continue;
            }
            let Some(value) = record.get(&field.name) else {
                continue;
            };
            if let Some(bit) = field.optional {
                set_bit(&mut pmap, bit);
            }
            self.value(field, value, base + field.offset)?;
        }
        if let Some(field) = message.pmap_field() {
            let pos = base + field.offset;
            self.buf[pos..pos + field.size].copy_from_slice(&pmap);
        }
        Ok(())
    }

    /// Writes `value` for `field` at absolute position `pos`.
    fn value(&mut self, field: &Field, value: &Value, pos: usize) -> Result<(), CodecError> {
        let scheme = self.scheme;
        match &field.ty {
            FieldType::Message(id) => {
                let Value::Message(record) = value else {
                    return Err(mismatch(field, "message", value));
                };
                let message = scheme.message_at(*id);
                self.message(message, record, pos)
            }
            FieldType::Array(array) => {
                let Value::List(items) = value else {
                    return Err(mismatch(field, "list", value));
                };
                if items.len() > array.capacity {
                    return Err(overflow(
                        field,
                        format!("{} elements", items.len()),
                        format!("array capacity {}", array.capacity),
                    ));
                }
                write_uint(&mut self.buf, pos, array.count.size, items.len() as u64);
                let start = pos + array.element.offset;
                for (i, item) in items.iter().enumerate() {
                    self.value(&array.element, item, start + i * array.element.size)?;
                }
                Ok(())
            }
            FieldType::Pointer(ptr) => {
                if field.is_string_pointer() {
                    let bytes = match value {
                        Value::String(s) => s.as_bytes(),
                        Value::Bytes(b) => b.as_slice(),
                        other => return Err(mismatch(field, "string", other)),
                    };
                    if bytes.is_empty() {
                        return pointer::write(&mut self.buf, ptr.version, pos, 0, 0, 1, &field.name);
                    }
                    let data = self.buf.len();
                    self.buf.extend_from_slice(bytes);
                    self.buf.push(0);
                    return pointer::write(
                        &mut self.buf,
                        ptr.version,
                        pos,
                        data,
                        bytes.len() + 1,
                        1,
                        &field.name,
                    );
                }

                let Value::List(items) = value else {
                    return Err(mismatch(field, "list", value));
                };
                let entity = ptr.element.size;
                if items.is_empty() {
                    return pointer::write(&mut self.buf, ptr.version, pos, 0, 0, entity, &field.name);
                }
                let data = self.buf.len();
                let start = data + pointer::prefix_size(ptr.version, entity);
                let end = items
                    .len()
                    .checked_mul(entity)
                    .and_then(|len| len.checked_add(start))
                    .ok_or_else(|| overflow(field, format!("{} elements", items.len()), "buffer"))?;
                self.buf.resize(end, 0);
                pointer::write(
                    &mut self.buf,
                    ptr.version,
                    pos,
                    data,
                    items.len(),
                    entity,
                    &field.name,
                )?;
                for (i, item) in items.iter().enumerate() {
                    self.value(&ptr.element, item, start + i * entity)?;
                }
                Ok(())
            }
            FieldType::Union(id) => {
                let Value::Union(member) = value else {
                    return Err(mismatch(field, "union", value));
                };
                let union = scheme.union_at(*id);
                let (index, member_field) =
                    union
                        .member(&member.name)
                        .ok_or_else(|| CodecError::UnknownName {
                            field: field.name.clone(),
                            name: member.name.clone(),
                        })?;
                write_uint(&mut self.buf, pos, union.tag_size(), index as u64);
                self.value(member_field, &member.value, pos + member_field.offset)
            }
            FieldType::Bytes(size) => {
                let bytes = match value {
                    Value::String(s) => s.as_bytes(),
                    Value::Bytes(b) => b.as_slice(),
                    other => return Err(mismatch(field, "bytes", other)),
                };
                let needed = match field.sub_type {
                    SubType::ByteString => bytes.len() + 1,
                    _ => bytes.len(),
                };
                if needed > *size {
                    return Err(overflow(
                        field,
                        format!("{} bytes", needed),
                        format!("byte{}", size),
                    ));
                }
                self.buf[pos..pos + bytes.len()].copy_from_slice(bytes);
                Ok(())
            }
            FieldType::Double => {
                let v = self.double_value(field, value)?;
                write_uint(&mut self.buf, pos, 8, v.to_bits());
                Ok(())
            }
            FieldType::Decimal128 => {
                let d = match value {
                    Value::Decimal(d) => *d,
                    Value::Int(v) => Decimal::from(*v),
                    Value::UInt(v) => Decimal::from(*v),
                    Value::Double(v) => Decimal::from_f64(*v),
                    other => return Err(mismatch(field, "decimal", other)),
                };
                let bits = d.to_bid().ok_or_else(|| overflow(field, d, "decimal128"))?;
                write_u128(&mut self.buf, pos, bits);
                Ok(())
            }
            ty => {
                let raw = self.integer_value(field, value)?;
                let (min, max) = ty.int_range().unwrap_or((0, 0));
                if raw < min || raw > max {
                    return Err(overflow(field, raw, ty.kind_name()));
                }
                write_uint(&mut self.buf, pos, field.size, raw as u64);
                Ok(())
            }
        }
    }

    fn double_value(&self, field: &Field, value: &Value) -> Result<f64, CodecError> {
        Ok(match (field.sub_type, value) {
            (SubType::Duration(res), Value::Duration(d)) => {
                time::nanos_to_ticks_f64(time::delta_nanos(d), res)
            }
            (SubType::TimePoint(res), Value::TimePoint(p)) => {
                time::nanos_to_ticks_f64(time::point_nanos(p), res)
            }
            (_, Value::Double(v)) => *v,
            (_, Value::Int(v)) => *v as f64,
            (_, Value::UInt(v)) => *v as f64,
            (_, Value::Decimal(d)) => d.to_f64(),
            (_, other) => return Err(mismatch(field, "double", other)),
        })
    }

    /// Integer to store for integer typed fields, before the range check.
    fn integer_value(&self, field: &Field, value: &Value) -> Result<i128, CodecError> {
        let plain = |v: &Value| -> Option<i128> {
            match v {
                Value::Int(v) => Some(*v as i128),
                Value::UInt(v) => Some(*v as i128),
                _ => None,
            }
        };
        match field.sub_type {
            SubType::Enum(id) => {
                let en = self.scheme.enum_at(id);
                match value {
                    Value::Enum(name) | Value::String(name) => en
                        .value_of(name)
                        .map(i128::from)
                        .ok_or_else(|| CodecError::UnknownName {
                            field: field.name.clone(),
                            name: name.clone(),
                        }),
                    other => plain(other).ok_or_else(|| mismatch(field, "enum", other)),
                }
            }
            SubType::Bits(_) => {
                let raw = match value {
                    Value::Bits(v) => *v as i128,
                    other => plain(other).ok_or_else(|| mismatch(field, "bits", other))?,
                };
                // Bit sets are stored by pattern, signed storage accepts the unsigned range
                if field.ty.int_range().is_some_and(|(min, _)| min < 0) && raw >= 0 {
                    let bits = field.size as u32 * 8;
                    if raw >> bits == 0 {
                        let shift = 128 - bits;
                        return Ok((raw << shift) >> shift);
                    }
                }
                Ok(raw)
            }
            SubType::FixedPoint(precision) => {
                let d = match value {
                    Value::Decimal(d) => *d,
                    Value::Double(v) => Decimal::from_f64(*v),
                    other => plain(other)
                        .map(|v| Decimal::new(v, 0))
                        .ok_or_else(|| mismatch(field, "decimal", other))?,
                };
                d.rescale(precision, true)
                    .ok_or_else(|| overflow(field, d, field.ty.kind_name()))
            }
            SubType::Duration(res) => match value {
                Value::Duration(d) => time::nanos_to_ticks(time::delta_nanos(d), res)
                    .ok_or_else(|| overflow(field, format!("{:?}", d), field.ty.kind_name())),
                other => plain(other).ok_or_else(|| mismatch(field, "duration", other)),
            },
            SubType::TimePoint(res) => match value {
                Value::TimePoint(p) => time::nanos_to_ticks(time::point_nanos(p), res)
                    .ok_or_else(|| overflow(field, p, field.ty.kind_name())),
                other => plain(other).ok_or_else(|| mismatch(field, "time_point", other)),
            },
            _ => match value {
                Value::Decimal(d) => d
                    .to_i128()
                    .ok_or_else(|| overflow(field, d, field.ty.kind_name())),
                other => plain(other).ok_or_else(|| mismatch(field, "integer", other)),
            },
        }
    }
}
