//! Conversion plan building.
//!
//! A plan is computed once per converter: every matched message pair gets a
//! list of per-field rules chosen from the source and destination field
//! kinds. Incompatibilities either fail the build or become deferred
//! [`Rule::Fail`] entries, depending on [`FailOn`].

use std::collections::HashMap;

use tracing::warn;

use crate::config::FailOn;
use crate::error::ConversionError;
use crate::scheme::{BitEntry, BitsId, EnumId, Field, FieldType, MessageId, Scheme, SubType, UnionId};

/// Destination numeric representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NumTarget {
    Int { min: i128, max: i128, unsigned: bool },
    Double,
    Decimal128,
    Fixed { precision: u32, min: i128, max: i128 },
}

impl NumTarget {
    pub fn describe(&self) -> String {
        match self {
            NumTarget::Int { min, max, .. } => format!("integer {}..={}", min, max),
            NumTarget::Double => "double".to_string(),
            NumTarget::Decimal128 => "decimal128".to_string(),
            NumTarget::Fixed { precision, .. } => format!("fixed{}", precision),
        }
    }
}

/// How one field value is carried from source to destination.
#[derive(Debug, Clone)]
pub(crate) enum Rule {
    Identity,
    Number(NumTarget),
    /// Source entry name to destination entry name
    Enum {
        names: HashMap<String, String>,
        fallback: Option<String>,
    },
    EnumToNumber {
        values: HashMap<String, i64>,
        target: NumTarget,
    },
    NumberToEnum {
        names: HashMap<i64, String>,
    },
    /// Source entries paired with the destination entry of the same name
    Bits {
        entries: Vec<(BitEntry, Option<BitEntry>)>,
        unknown_mask: u64,
    },
    BitsToNumber(NumTarget),
    NumberToBits,
    /// Render with the source field
    ToText(Box<Field>),
    /// Parse with the destination field
    FromText(Box<Field>),
    List(Box<Rule>),
    Message(usize),
    /// Source member name to destination member name and rule
    Union(HashMap<String, (String, Rule)>),
    Fail(ConversionError),
}

/// Field rules for one message pair.
#[derive(Debug, Clone)]
pub(crate) struct MessagePlan {
    pub dst: MessageId,
    pub fields: Vec<(String, Rule)>,
}

#[derive(Debug, Clone, Copy)]
enum Kind<'f> {
    Number,
    Enum(EnumId),
    Bits(BitsId),
    Duration,
    TimePoint,
    Text,
    Bytes,
    List(&'f Field),
    Message(MessageId),
    Union(UnionId),
}

impl Kind<'_> {
    fn name(&self) -> &'static str {
        match self {
            Kind::Number => "number",
            Kind::Enum(_) => "enum",
            Kind::Bits(_) => "bits",
            Kind::Duration => "duration",
            Kind::TimePoint => "time_point",
            Kind::Text => "string",
            Kind::Bytes => "bytes",
            Kind::List(_) => "list",
            Kind::Message(_) => "message",
            Kind::Union(_) => "union",
        }
    }

    fn is_scalar(&self) -> bool {
        matches!(
            self,
            Kind::Number | Kind::Enum(_) | Kind::Bits(_) | Kind::Duration | Kind::TimePoint | Kind::Bytes
        )
    }
}

fn kind(field: &Field) -> Kind<'_> {
    if field.is_string_pointer() {
        return Kind::Text;
    }
    match (&field.ty, field.sub_type) {
        (FieldType::Message(id), _) => Kind::Message(*id),
        (FieldType::Union(id), _) => Kind::Union(*id),
        (FieldType::Array(array), _) => Kind::List(&array.element),
        (FieldType::Pointer(ptr), _) => Kind::List(&ptr.element),
        (FieldType::Bytes(_), SubType::ByteString) => Kind::Text,
        (FieldType::Bytes(_), _) => Kind::Bytes,
        (_, SubType::Enum(id)) => Kind::Enum(id),
        (_, SubType::Bits(id)) => Kind::Bits(id),
        (_, SubType::Duration(_)) => Kind::Duration,
        (_, SubType::TimePoint(_)) => Kind::TimePoint,
        _ => Kind::Number,
    }
}

fn num_target(field: &Field) -> NumTarget {
    let (min, max) = field.ty.int_range().unwrap_or((0, 0));
    match (&field.ty, field.sub_type) {
        (_, SubType::FixedPoint(precision)) => NumTarget::Fixed { precision, min, max },
        (FieldType::Double, _) => NumTarget::Double,
        (FieldType::Decimal128, _) => NumTarget::Decimal128,
        (ty, _) => NumTarget::Int {
            min,
            max,
            unsigned: ty.is_unsigned(),
        },
    }
}

/// Builds message plans for one scheme pair.
pub(crate) struct Planner<'a> {
    from: &'a Scheme,
    to: &'a Scheme,
    policy: FailOn,
    pub plans: Vec<MessagePlan>,
    cache: HashMap<(MessageId, MessageId), usize>,
    pub deferred: usize,
}

impl<'a> Planner<'a> {
    pub fn new(from: &'a Scheme, to: &'a Scheme, policy: FailOn) -> Self {
        Self {
            from,
            to,
            policy,
            plans: Vec::new(),
            cache: HashMap::new(),
            deferred: 0,
        }
    }

    /// Reports an incompatibility according to the failure policy.
    pub fn defer(&mut self, error: ConversionError) -> Result<Rule, ConversionError> {
        match self.policy {
            FailOn::Init => Err(error),
            FailOn::Data => {
                warn!(error = %error, "conversion deferred until data");
                self.deferred += 1;
                Ok(Rule::Fail(error))
            }
        }
    }

    /// Returns the plan index for a message pair, building it on first use.
    pub fn message(&mut self, src: MessageId, dst: MessageId) -> Result<usize, ConversionError> {
        if let Some(&index) = self.cache.get(&(src, dst)) {
            return Ok(index);
        }
        let (from, to) = (self.from, self.to);
        let src_msg = from.message_at(src);
        let dst_msg = to.message_at(dst);

        let mut fields = Vec::new();
        for field in &src_msg.fields {
            if field.pmap {
                continue;
            }
            let Some(dst_field) = dst_msg.field(&field.name) else {
                continue;
            };
            if dst_field.pmap {
                continue;
            }
            let path = format!("{}.{}", src_msg.name, field.name);
            let rule = self.field(&path, field, dst_field)?;
            fields.push((field.name.clone(), rule));
        }

        let index = self.plans.len();
        self.plans.push(MessagePlan { dst, fields });
        self.cache.insert((src, dst), index);
        Ok(index)
    }

    /// Chooses the rule for a field pair.
    pub fn field(&mut self, path: &str, src: &Field, dst: &Field) -> Result<Rule, ConversionError> {
        let (from, to) = (self.from, self.to);
        let (sk, dk) = (kind(src), kind(dst));
        let rule = match (sk, dk) {
            (Kind::Number, Kind::Number) => Rule::Number(num_target(dst)),
            (Kind::Enum(s), Kind::Enum(d)) => return self.enum_rule(path, s, d),
            (Kind::Enum(s), Kind::Number) => Rule::EnumToNumber {
                values: from.enum_at(s).values.iter().cloned().collect(),
                target: num_target(dst),
            },
            (Kind::Number, Kind::Enum(d)) => Rule::NumberToEnum {
                names: to
                    .enum_at(d)
                    .values
                    .iter()
                    .rev()
                    .map(|(n, v)| (*v, n.clone()))
                    .collect(),
            },
            (Kind::Bits(s), Kind::Bits(d)) => {
                let (src_bits, dst_bits) = (from.bits_at(s), to.bits_at(d));
                Rule::Bits {
                    entries: src_bits
                        .entries
                        .iter()
                        .map(|e| (e.clone(), dst_bits.entry(&e.name).cloned()))
                        .collect(),
                    unknown_mask: src_bits.unknown_bits(u64::MAX),
                }
            }
            (Kind::Bits(_), Kind::Number) => Rule::BitsToNumber(num_target(dst)),
            (Kind::Number, Kind::Bits(_)) => Rule::NumberToBits,
            (Kind::Duration, Kind::Duration)
            | (Kind::TimePoint, Kind::TimePoint)
            | (Kind::Text, Kind::Text)
            | (Kind::Bytes, Kind::Bytes) => Rule::Identity,
            (s, Kind::Text) if s.is_scalar() => Rule::ToText(Box::new(src.clone())),
            (Kind::Text, d) if d.is_scalar() => Rule::FromText(Box::new(dst.clone())),
            (Kind::List(se), Kind::List(de)) => {
                let element = self.field(path, se, de)?;
                Rule::List(Box::new(element))
            }
            (Kind::Message(s), Kind::Message(d)) => {
                if from.message_at(s).fingerprint == to.message_at(d).fingerprint {
                    Rule::Identity
                } else {
                    Rule::Message(self.message(s, d)?)
                }
            }
            (Kind::Union(s), Kind::Union(d)) => return self.union_rule(path, s, d),
            (s, d) => {
                return self.defer(ConversionError::IncompatibleKind {
                    field: path.to_string(),
                    from: s.name().to_string(),
                    to: d.name().to_string(),
                })
            }
        };
        Ok(rule)
    }

    fn enum_rule(&mut self, path: &str, src: EnumId, dst: EnumId) -> Result<Rule, ConversionError> {
        let (from, to) = (self.from, self.to);
        let (src_enum, dst_enum) = (from.enum_at(src), to.enum_at(dst));
        let fallback = dst_enum.fallback_entry().map(|(name, _)| name.to_string());

        let mut names = HashMap::new();
        for (name, _) in &src_enum.values {
            if dst_enum.value_of(name).is_some() {
                names.insert(name.clone(), name.clone());
                continue;
            }
            match &fallback {
                Some(fb) => {
                    names.insert(name.clone(), fb.clone());
                }
                None if self.policy == FailOn::Init => {
                    return Err(ConversionError::EnumFallbackMissing {
                        field: path.to_string(),
                        name: name.clone(),
                    })
                }
                None => {
                    warn!(field = path, entry = %name, "enum entry has no destination, deferred");
                    self.deferred += 1;
                }
            }
        }
        Ok(Rule::Enum { names, fallback })
    }

    fn union_rule(&mut self, path: &str, src: UnionId, dst: UnionId) -> Result<Rule, ConversionError> {
        let (from, to) = (self.from, self.to);
        let (src_union, dst_union) = (from.union_at(src), to.union_at(dst));

        let mut members = HashMap::new();
        for member in &src_union.members {
            let member_path = format!("{}.{}", path, member.name);
            let rule = match dst_union.member(&member.name) {
                Some((_, dst_member)) => self.field(&member_path, member, dst_member)?,
                None => self.defer(ConversionError::Unmatched {
                    what: "union member",
                    name: member_path,
                })?,
            };
            members.insert(member.name.clone(), (member.name.clone(), rule));
        }
        Ok(Rule::Union(members))
    }
}
