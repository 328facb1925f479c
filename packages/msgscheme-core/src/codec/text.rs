//! Textual field values.
//!
//! `from_string` parses the textual form of a single field value, the way
//! configuration files and command lines supply them; `to_string` renders
//! values back into text it accepts.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::error::ParseError;
use crate::scheme::{Bits, Field, FieldType, Resolution, Scheme, SubType};

use super::decimal::Decimal;
use super::time;
use super::value::Value;

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses text into a value for `field`.
///
/// # Arguments
/// * `scheme` - Scheme owning `field` (enum and bits lookups)
/// * `field` - Target field
/// * `text` - Input text, surrounding whitespace is ignored
///
/// # Returns
/// `ParseError::Overflow` for literals outside the field range,
/// `ParseError::Syntax` for malformed input and `ParseError::Unsupported`
/// for lists, messages and unions.
pub fn from_string(scheme: &Scheme, field: &Field, text: &str) -> Result<Value, ParseError> {
    let input = text.trim();
    match (&field.ty, field.sub_type) {
        (FieldType::Pointer(_), _) if field.is_string_pointer() => Ok(Value::String(input.to_string())),
        (FieldType::Bytes(size), sub) => {
            let needed = match sub {
                SubType::ByteString => input.len() + 1,
                _ => input.len(),
            };
            if needed > *size {
                return Err(ParseError::overflow(input, format!("byte{}", size)));
            }
            Ok(match sub {
                SubType::ByteString => Value::String(input.to_string()),
                _ => Value::Bytes(input.as_bytes().to_vec()),
            })
        }
        (_, SubType::Enum(id)) => {
            let en = scheme.enum_at(id);
            if en.value_of(input).is_some() {
                return Ok(Value::Enum(input.to_string()));
            }
            let raw = match parse_int(input) {
                Ok(raw) => raw,
                Err(ParseError::Syntax { .. }) => {
                    return Err(ParseError::UnknownName {
                        input: input.to_string(),
                        name: input.to_string(),
                    })
                }
                Err(e) => return Err(e),
            };
            check_range(input, &field.ty, raw)?;
            Ok(match i64::try_from(raw).ok().and_then(|v| en.name_of(v)) {
                Some(name) => Value::Enum(name.to_string()),
                None => int_value(&field.ty, raw),
            })
        }
        (_, SubType::Bits(id)) => {
            let raw = parse_bits(scheme.bits_at(id), input)?;
            let bits = field.size as u32 * 8;
            if bits < 64 && raw >> bits != 0 {
                return Err(ParseError::overflow(input, field.ty.kind_name()));
            }
            Ok(Value::Bits(raw))
        }
        (_, SubType::FixedPoint(precision)) => {
            let d: Decimal = input.parse()?;
            let scaled = d
                .rescale(precision, true)
                .ok_or_else(|| ParseError::overflow(input, field.ty.kind_name()))?;
            check_range(input, &field.ty, scaled)?;
            Ok(Value::Decimal(d))
        }
        (_, SubType::Duration(res)) => {
            let nanos = parse_nanos(input, res)?;
            check_ticks(input, &field.ty, nanos, res)?;
            time::delta_from_nanos(nanos)
                .map(Value::Duration)
                .ok_or_else(|| ParseError::overflow(input, "duration"))
        }
        (_, SubType::TimePoint(res)) => {
            let point = parse_time_point(input, res)?;
            check_ticks(input, &field.ty, time::point_nanos(&point), res)?;
            Ok(Value::TimePoint(point))
        }
        (FieldType::Double, _) => input
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|e| ParseError::syntax(input, e.to_string())),
        (FieldType::Decimal128, _) => {
            let d: Decimal = input.parse()?;
            if d.to_bid().is_none() {
                return Err(ParseError::overflow(input, "decimal128"));
            }
            Ok(Value::Decimal(d))
        }
        (ty, _) if ty.is_integer() => {
            let raw = parse_int(input)?;
            check_range(input, ty, raw)?;
            Ok(int_value(ty, raw))
        }
        (ty, _) => Err(ParseError::Unsupported {
            field: field.name.clone(),
            kind: ty.kind_name(),
        }),
    }
}

/// Renders a value of `field` as text accepted by [`from_string`].
///
/// Values that do not match the field kind are rendered generically.
pub fn to_string(scheme: &Scheme, field: &Field, value: &Value) -> String {
    match (value, field.sub_type) {
        (Value::Int(raw), SubType::Enum(id)) => scheme
            .enum_at(id)
            .name_of(*raw)
            .map_or_else(|| raw.to_string(), str::to_string),
        (Value::UInt(raw), SubType::Enum(id)) => i64::try_from(*raw)
            .ok()
            .and_then(|v| scheme.enum_at(id).name_of(v))
            .map_or_else(|| raw.to_string(), str::to_string),
        (Value::Bits(raw), SubType::Bits(id)) => render_bits(scheme.bits_at(id), *raw),
        (Value::Duration(d), SubType::Duration(res)) => render_nanos(time::delta_nanos(d), res),
        (Value::List(items), _) => {
            let element = match &field.ty {
                FieldType::Array(a) => Some(&a.element),
                FieldType::Pointer(p) => Some(&p.element),
                _ => None,
            };
            let parts: Vec<String> = items
                .iter()
                .map(|v| match element {
                    Some(element) => to_string(scheme, element, v),
                    None => render_plain(v),
                })
                .collect();
            format!("[{}]", parts.join(", "))
        }
        (Value::Message(record), _) => {
            let message = match field.ty {
                FieldType::Message(id) => Some(scheme.message_at(id)),
                _ => None,
            };
            let parts: Vec<String> = record
                .iter()
                .map(|(name, v)| match message.and_then(|m| m.field(name)) {
                    Some(f) => format!("{}: {}", name, to_string(scheme, f, v)),
                    None => format!("{}: {}", name, render_plain(v)),
                })
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        (Value::Union(member), _) => {
            let member_field = match field.ty {
                FieldType::Union(id) => scheme.union_at(id).member(&member.name).map(|(_, f)| f),
                _ => None,
            };
            let inner = match member_field {
                Some(f) => to_string(scheme, f, &member.value),
                None => render_plain(&member.value),
            };
            format!("{{{}: {}}}", member.name, inner)
        }
        (v, _) => render_plain(v),
    }
}

fn render_plain(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Bytes(b) => {
            let end = b.iter().rposition(|c| *c != 0).map_or(0, |i| i + 1);
            String::from_utf8_lossy(&b[..end]).into_owned()
        }
        Value::String(s) | Value::Enum(s) => s.clone(),
        Value::Bits(v) => format!("0x{:x}", v),
        Value::Duration(d) => render_nanos(time::delta_nanos(d), Resolution::NS),
        Value::TimePoint(p) => p.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(render_plain).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Message(record) => {
            let parts: Vec<String> = record
                .iter()
                .map(|(name, v)| format!("{}: {}", name, render_plain(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        Value::Union(member) => format!("{{{}: {}}}", member.name, render_plain(&member.value)),
    }
}

/// Renders nanoseconds in the field unit when exact, in nanoseconds otherwise.
fn render_nanos(nanos: i128, resolution: Resolution) -> String {
    let unit = resolution.suffix().unwrap_or("ns");
    match time::nanos_to_ticks(nanos, resolution) {
        Some(ticks) if time::ticks_to_nanos(ticks, resolution) == Some(nanos) => {
            format!("{}{}", ticks, unit)
        }
        _ => format!("{}ns", nanos),
    }
}

fn render_bits(bits: &Bits, raw: u64) -> String {
    let mut parts: Vec<String> = bits
        .decode(raw)
        .into_iter()
        .map(|(name, v)| {
            if v == 1 {
                name.to_string()
            } else {
                format!("{}={}", name, v)
            }
        })
        .collect();
    let unknown = bits.unknown_bits(raw);
    if unknown != 0 {
        parts.push(format!("0x{:x}", unknown));
    }
    if parts.is_empty() {
        return "0".to_string();
    }
    parts.join(" | ")
}

fn int_value(ty: &FieldType, raw: i128) -> Value {
    if ty.is_unsigned() {
        Value::UInt(raw as u64)
    } else {
        Value::Int(raw as i64)
    }
}

fn check_range(input: &str, ty: &FieldType, raw: i128) -> Result<(), ParseError> {
    match ty.int_range() {
        Some((min, max)) if raw < min || raw > max => Err(ParseError::overflow(input, ty.kind_name())),
        _ => Ok(()),
    }
}

/// Checks that `nanos` is storable as a tick count of integer type `ty`.
fn check_ticks(input: &str, ty: &FieldType, nanos: i128, resolution: Resolution) -> Result<(), ParseError> {
    if !ty.is_integer() {
        return Ok(());
    }
    let ticks = time::nanos_to_ticks(nanos, resolution)
        .ok_or_else(|| ParseError::overflow(input, ty.kind_name()))?;
    check_range(input, ty, ticks)
}

/// Parses an integer literal: decimal, `0x`, `0o`, `0b` or C style leading zero octal.
pub(crate) fn parse_int(input: &str) -> Result<i128, ParseError> {
    let (negative, body) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };
    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };
    if digits.is_empty() {
        return Err(ParseError::syntax(input, "no digits"));
    }

    let mut value: i128 = 0;
    for ch in digits.chars().filter(|c| *c != '_') {
        let digit = ch
            .to_digit(radix)
            .ok_or_else(|| ParseError::syntax(input, format!("unexpected '{}'", ch)))?;
        value = value
            .checked_mul(radix as i128)
            .and_then(|v| v.checked_add(digit as i128))
            .ok_or_else(|| ParseError::overflow(input, "integer"))?;
    }
    Ok(if negative { -value } else { value })
}

/// Parses `{a, b}`, `a | b=2 | 0x10` or a plain integer.
fn parse_bits(bits: &Bits, input: &str) -> Result<u64, ParseError> {
    let body = match input.strip_prefix('{') {
        Some(rest) => rest
            .strip_suffix('}')
            .ok_or_else(|| ParseError::syntax(input, "unterminated '{'"))?,
        None => input,
    };
    let mut raw = 0u64;
    for part in body.split(|c: char| c == ',' || c == '|').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, value) = match part.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value.trim())),
            None => (part, None),
        };
        if let Some(entry) = bits.entry(name) {
            let value = match value {
                Some(v) => u64::try_from(parse_int(v)?)
                    .map_err(|_| ParseError::overflow(input, format!("bits entry '{}'", name)))?,
                None => 1,
            };
            raw = entry
                .set(raw, value)
                .ok_or_else(|| ParseError::overflow(input, format!("bits entry '{}'", name)))?;
            continue;
        }
        match parse_int(part) {
            Ok(v) => {
                raw |= u64::try_from(v).map_err(|_| ParseError::overflow(input, "bits"))?;
            }
            Err(ParseError::Syntax { .. }) => {
                return Err(ParseError::UnknownName {
                    input: input.to_string(),
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e),
        }
    }
    Ok(raw)
}

/// Splits `1.5ms` into the number and the resolution of its suffix.
fn split_suffix(input: &str) -> Option<(&str, Resolution)> {
    let pos = input.find(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E')?;
    let resolution = Resolution::from_suffix(&input[pos..])?;
    Some((&input[..pos], resolution))
}

/// Parses a suffixed or plain tick count into nanoseconds.
fn parse_nanos(input: &str, default: Resolution) -> Result<i128, ParseError> {
    let (number, resolution) = split_suffix(input).unwrap_or((input, default));
    let d: Decimal = number.trim().parse()?;
    // Nine fractional digits cover every resolution down to nanoseconds
    let scaled = d
        .rescale(9, true)
        .ok_or_else(|| ParseError::overflow(input, "duration"))?;
    let (num, den) = resolution.nanos_ratio();
    scaled
        .checked_mul(num)
        .map(|v| v / den / 1_000_000_000)
        .ok_or_else(|| ParseError::overflow(input, "duration"))
}

fn parse_time_point(input: &str, resolution: Resolution) -> Result<DateTime<Utc>, ParseError> {
    if let Ok(point) = DateTime::parse_from_rfc3339(input) {
        return Ok(point.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    let looks_numeric = input
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+' || c == '.');
    if !looks_numeric {
        return Err(ParseError::syntax(input, "not a date-time or tick count"));
    }
    let nanos = parse_nanos(input, resolution)?;
    time::point_from_nanos(nanos).ok_or_else(|| ParseError::overflow(input, "time point"))
}
