//! Value transformation along a conversion plan.

use crate::codec::{from_string, to_string, Decimal, Record, UnionValue, Value};
use crate::error::ConversionError;

use super::plan::{NumTarget, Rule};
use super::Converter;

fn incompatible(field: &str, value: &Value, to: &str) -> ConversionError {
    ConversionError::IncompatibleKind {
        field: field.to_string(),
        from: value.kind().to_string(),
        to: to.to_string(),
    }
}

fn overflow(field: &str, value: impl ToString, target: impl ToString) -> ConversionError {
    ConversionError::Overflow {
        field: field.to_string(),
        value: value.to_string(),
        target: target.to_string(),
    }
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Int(v) => Some(Decimal::from(*v)),
        Value::UInt(v) => Some(Decimal::from(*v)),
        Value::Double(v) => Some(Decimal::from_f64(*v)),
        Value::Decimal(d) => Some(*d),
        _ => None,
    }
}

/// Converts a numeric value into the destination representation.
///
/// # Returns
/// `ConversionError::Overflow` when the value is outside the destination
/// range or needs more fractional digits than the destination keeps.
pub(crate) fn number(target: NumTarget, field: &str, value: &Value) -> Result<Value, ConversionError> {
    let d = to_decimal(value).ok_or_else(|| incompatible(field, value, "number"))?;
    match target {
        NumTarget::Int { min, max, unsigned } => {
            let v = d
                .to_i128()
                .filter(|v| (min..=max).contains(v))
                .ok_or_else(|| overflow(field, d, target.describe()))?;
            Ok(if unsigned {
                Value::UInt(v as u64)
            } else {
                Value::Int(v as i64)
            })
        }
        NumTarget::Double => {
            let v = d.to_f64();
            if d.is_finite() && !v.is_finite() {
                return Err(overflow(field, d, "double"));
            }
            Ok(Value::Double(v))
        }
        NumTarget::Decimal128 => match d.to_bid() {
            Some(_) => Ok(Value::Decimal(d)),
            None => Err(overflow(field, d, "decimal128")),
        },
        NumTarget::Fixed { precision, min, max } => match d.rescale(precision, false) {
            Some(scaled) if (min..=max).contains(&scaled) => Ok(Value::Decimal(d)),
            _ => Err(overflow(field, d, target.describe())),
        },
    }
}

impl Converter {
    /// Applies the plan at `index` to a source record.
    pub(super) fn apply_message(&self, index: usize, record: &Record) -> Result<Record, ConversionError> {
        let plan = &self.plans[index];
        let mut out = Record::new();
        for (name, rule) in &plan.fields {
            if let Some(value) = record.get(name) {
                out.set(name, self.apply(rule, name, value)?);
            }
        }
        Ok(out)
    }

    fn apply(&self, rule: &Rule, field: &str, value: &Value) -> Result<Value, ConversionError> {
        match rule {
            Rule::Identity => Ok(value.clone()),
            Rule::Fail(error) => Err(error.clone()),
            Rule::Number(target) => number(*target, field, value),
            Rule::Enum { names, fallback } => {
                let mapped = match value {
                    Value::Enum(name) | Value::String(name) => names.get(name),
                    Value::Int(_) | Value::UInt(_) => None,
                    other => return Err(incompatible(field, other, "enum")),
                };
                mapped
                    .or(fallback.as_ref())
                    .map(|name| Value::Enum(name.clone()))
                    .ok_or_else(|| ConversionError::EnumFallbackMissing {
                        field: field.to_string(),
                        name: match value {
                            Value::Int(v) => v.to_string(),
                            Value::UInt(v) => v.to_string(),
                            other => other.as_str().unwrap_or_default().to_string(),
                        },
                    })
            }
            Rule::EnumToNumber { values, target } => {
                let raw = match value {
                    Value::Enum(name) | Value::String(name) => values
                        .get(name)
                        .map(|v| Value::Int(*v))
                        .ok_or_else(|| ConversionError::Unmatched {
                            what: "enum entry",
                            name: name.clone(),
                        })?,
                    other => other.clone(),
                };
                number(*target, field, &raw)
            }
            Rule::NumberToEnum { names } => {
                let d = to_decimal(value).ok_or_else(|| incompatible(field, value, "enum"))?;
                let raw = d
                    .to_i128()
                    .and_then(|v| i64::try_from(v).ok())
                    .ok_or_else(|| overflow(field, d, "enum"))?;
                Ok(match names.get(&raw) {
                    Some(name) => Value::Enum(name.clone()),
                    None => Value::Int(raw),
                })
            }
            Rule::Bits {
                entries,
                unknown_mask,
            } => {
                let raw = match value {
                    Value::Bits(raw) | Value::UInt(raw) => *raw,
                    other => return Err(incompatible(field, other, "bits")),
                };
                if raw & unknown_mask != 0 {
                    return Err(overflow(field, format!("0x{:x}", raw & unknown_mask), "bits"));
                }
                let mut out = 0u64;
                for (src, dst) in entries {
                    let v = src.get(raw);
                    if v == 0 {
                        continue;
                    }
                    out = dst
                        .as_ref()
                        .and_then(|dst| dst.set(out, v))
                        .ok_or_else(|| overflow(field, format!("{}={}", src.name, v), "bits"))?;
                }
                Ok(Value::Bits(out))
            }
            Rule::BitsToNumber(target) => match value {
                Value::Bits(raw) => number(*target, field, &Value::UInt(*raw)),
                other => number(*target, field, other),
            },
            Rule::NumberToBits => {
                let d = to_decimal(value).ok_or_else(|| incompatible(field, value, "bits"))?;
                d.to_i128()
                    .and_then(|v| u64::try_from(v).ok())
                    .map(Value::Bits)
                    .ok_or_else(|| overflow(field, d, "bits"))
            }
            Rule::ToText(src) => Ok(Value::String(to_string(&self.from, src, value))),
            Rule::FromText(dst) => {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
                    other => return Err(incompatible(field, other, "string")),
                };
                from_string(&self.to, dst, &text).map_err(|source| ConversionError::Parse {
                    field: field.to_string(),
                    source,
                })
            }
            Rule::List(element) => match value {
                Value::List(items) => items
                    .iter()
                    .map(|item| self.apply(element, field, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List),
                other => Err(incompatible(field, other, "list")),
            },
            Rule::Message(index) => match value {
                Value::Message(record) => self.apply_message(*index, record).map(Value::Message),
                other => Err(incompatible(field, other, "message")),
            },
            Rule::Union(members) => {
                let Value::Union(member) = value else {
                    return Err(incompatible(field, value, "union"));
                };
                let (name, rule) =
                    members
                        .get(&member.name)
                        .ok_or_else(|| ConversionError::Unmatched {
                            what: "union member",
                            name: format!("{}.{}", field, member.name),
                        })?;
                let inner = self.apply(rule, field, &member.value)?;
                Ok(Value::Union(UnionValue {
                    name: name.clone(),
                    value: Box::new(inner),
                }))
            }
        }
    }
}
