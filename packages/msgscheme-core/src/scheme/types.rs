//! Compiled scheme types.
//!
//! Everything here is produced by the layout compiler and never mutated
//! afterwards. Enums, bit sets and unions live in per-scheme arenas and
//! fields refer to them by index.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Free-form string options attached to schemes, messages and fields.
pub type Options = BTreeMap<String, String>;

/// Index of a message in [`Scheme::messages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MessageId(pub(crate) usize);

/// Index of an enum in the scheme enum arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EnumId(pub(crate) usize);

/// Index of a bit set in the scheme bits arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BitsId(pub(crate) usize);

/// Index of a union in the scheme union arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UnionId(pub(crate) usize);

/// Offset pointer wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum PtrVersion {
    /// 8 bytes: u32 offset, 24 bit count, 8 bit entity size
    #[default]
    Default,
    /// 4 bytes: u16 offset, u16 count
    LegacyShort,
    /// 8 bytes: u32 offset, u32 count
    LegacyLong,
}

impl PtrVersion {
    /// Size of the pointer word in bytes.
    pub fn size(self) -> usize {
        match self {
            PtrVersion::Default | PtrVersion::LegacyLong => 8,
            PtrVersion::LegacyShort => 4,
        }
    }
}

impl FromStr for PtrVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(PtrVersion::Default),
            "legacy-short" | "legacy_short" => Ok(PtrVersion::LegacyShort),
            "legacy-long" | "legacy_long" => Ok(PtrVersion::LegacyLong),
            other => Err(format!("unknown offset pointer type '{}'", other)),
        }
    }
}

impl fmt::Display for PtrVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PtrVersion::Default => "default",
            PtrVersion::LegacyShort => "legacy-short",
            PtrVersion::LegacyLong => "legacy-long",
        })
    }
}

/// Time resolution as a ratio of seconds (`num / den`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Resolution {
    pub num: u64,
    pub den: u64,
}

impl Resolution {
    pub const NS: Resolution = Resolution { num: 1, den: 1_000_000_000 };
    pub const US: Resolution = Resolution { num: 1, den: 1_000_000 };
    pub const MS: Resolution = Resolution { num: 1, den: 1_000 };
    pub const SECOND: Resolution = Resolution { num: 1, den: 1 };
    pub const MINUTE: Resolution = Resolution { num: 60, den: 1 };
    pub const HOUR: Resolution = Resolution { num: 3600, den: 1 };
    pub const DAY: Resolution = Resolution { num: 86400, den: 1 };

    /// Looks up a resolution by its unit suffix.
    pub fn from_suffix(suffix: &str) -> Option<Resolution> {
        Some(match suffix {
            "ns" => Self::NS,
            "us" => Self::US,
            "ms" => Self::MS,
            "s" => Self::SECOND,
            "m" => Self::MINUTE,
            "h" => Self::HOUR,
            "d" => Self::DAY,
            _ => return None,
        })
    }

    /// Unit suffix for well known resolutions.
    pub fn suffix(&self) -> Option<&'static str> {
        Some(match *self {
            Self::NS => "ns",
            Self::US => "us",
            Self::MS => "ms",
            Self::SECOND => "s",
            Self::MINUTE => "m",
            Self::HOUR => "h",
            Self::DAY => "d",
            _ => return None,
        })
    }

    /// Nanoseconds in one tick, as `(numerator, denominator)`.
    pub(crate) fn nanos_ratio(&self) -> (i128, i128) {
        (self.num as i128 * 1_000_000_000, self.den as i128)
    }
}

/// Primitive wire type of a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Double,
    Decimal128,
    /// Fixed size byte blob
    Bytes(usize),
    /// Nested message stored inline
    Message(MessageId),
    /// Bounded array with inline count prefix
    Array(Box<ArrayType>),
    /// Offset pointer to a variable length list
    Pointer(Box<PointerType>),
    Union(UnionId),
}

impl FieldType {
    /// Returns true for signed and unsigned integer types.
    pub fn is_integer(&self) -> bool {
        self.int_range().is_some()
    }

    /// Returns true for unsigned integer types.
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            FieldType::UInt8 | FieldType::UInt16 | FieldType::UInt32 | FieldType::UInt64
        )
    }

    /// Inclusive value range of integer types.
    pub fn int_range(&self) -> Option<(i128, i128)> {
        Some(match self {
            FieldType::Int8 => (i8::MIN as i128, i8::MAX as i128),
            FieldType::Int16 => (i16::MIN as i128, i16::MAX as i128),
            FieldType::Int32 => (i32::MIN as i128, i32::MAX as i128),
            FieldType::Int64 => (i64::MIN as i128, i64::MAX as i128),
            FieldType::UInt8 => (0, u8::MAX as i128),
            FieldType::UInt16 => (0, u16::MAX as i128),
            FieldType::UInt32 => (0, u32::MAX as i128),
            FieldType::UInt64 => (0, u64::MAX as i128),
            _ => return None,
        })
    }

    /// Size of scalar types in bytes.
    pub fn scalar_size(&self) -> Option<usize> {
        Some(match self {
            FieldType::Int8 | FieldType::UInt8 => 1,
            FieldType::Int16 | FieldType::UInt16 => 2,
            FieldType::Int32 | FieldType::UInt32 => 4,
            FieldType::Int64 | FieldType::UInt64 | FieldType::Double => 8,
            FieldType::Decimal128 => 16,
            FieldType::Bytes(n) => *n,
            _ => return None,
        })
    }

    /// Short type name used in error messages and layout dumps.
    pub fn kind_name(&self) -> String {
        match self {
            FieldType::Int8 => "int8".into(),
            FieldType::Int16 => "int16".into(),
            FieldType::Int32 => "int32".into(),
            FieldType::Int64 => "int64".into(),
            FieldType::UInt8 => "uint8".into(),
            FieldType::UInt16 => "uint16".into(),
            FieldType::UInt32 => "uint32".into(),
            FieldType::UInt64 => "uint64".into(),
            FieldType::Double => "double".into(),
            FieldType::Decimal128 => "decimal128".into(),
            FieldType::Bytes(n) => format!("byte{}", n),
            FieldType::Message(_) => "message".into(),
            FieldType::Array(a) => format!("{}[{}]", a.element.ty.kind_name(), a.capacity),
            FieldType::Pointer(p) => format!("*{}", p.element.ty.kind_name()),
            FieldType::Union(_) => "union".into(),
        }
    }
}

/// Bounded array layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayType {
    /// Maximum number of elements
    pub capacity: usize,
    /// Count prefix field at offset 0
    pub count: Field,
    /// Element field, offset is the start of the first slot
    pub element: Field,
}

/// Offset pointer layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointerType {
    pub version: PtrVersion,
    /// Element field with offset 0, size is the entity size
    pub element: Field,
}

/// Refinement of the primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SubType {
    #[default]
    None,
    ByteString,
    Enum(EnumId),
    Bits(BitsId),
    FixedPoint(u32),
    Duration(Resolution),
    TimePoint(Resolution),
}

/// Compiled field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Byte offset within the owning message (or union/array/pointer)
    pub offset: usize,
    /// Size of the fixed footprint in bytes
    pub size: usize,
    #[serde(rename = "type")]
    pub ty: FieldType,
    pub sub_type: SubType,
    /// Presence bit index for optional fields
    pub optional: Option<u32>,
    /// Marks the presence map field
    pub pmap: bool,
    pub options: Options,
}

impl Field {
    /// Returns the end offset of this field (offset + size).
    pub fn end_offset(&self) -> usize {
        self.offset + self.size
    }

    /// Returns true for `string` fields: pointer of int8 with ByteString sub-type.
    pub fn is_string_pointer(&self) -> bool {
        match &self.ty {
            FieldType::Pointer(ptr) => {
                ptr.element.ty == FieldType::Int8 && ptr.element.sub_type == SubType::ByteString
            }
            _ => false,
        }
    }
}

/// Compiled message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub name: String,
    /// Wire selector
    pub msgid: Option<i32>,
    /// Size of the fixed header in bytes
    pub size: usize,
    /// Fields in declaration order, inline fields already expanded
    pub fields: Vec<Field>,
    pub options: Options,
    /// Index of the pmap field in `fields`
    pub pmap: Option<usize>,
    /// CRC-32 of the canonical layout description
    pub fingerprint: u32,
    #[serde(skip)]
    pub(crate) index: HashMap<String, usize>,
}

impl Message {
    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Returns the position of a field in declaration order.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Returns the pmap field, if the message has one.
    pub fn pmap_field(&self) -> Option<&Field> {
        self.pmap.map(|i| &self.fields[i])
    }
}

/// Compiled enum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enum {
    pub name: String,
    /// Underlying integer type
    #[serde(rename = "type")]
    pub ty: FieldType,
    /// Name/value pairs in declaration order
    pub values: Vec<(String, i64)>,
    /// Name of the fallback entry
    pub fallback: Option<String>,
    pub options: Options,
}

impl Enum {
    /// Returns the name of the first entry with the given value.
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    /// Returns the value of the entry with the given name.
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// Returns the fallback entry as `(name, value)`.
    pub fn fallback_entry(&self) -> Option<(&str, i64)> {
        let name = self.fallback.as_deref()?;
        self.value_of(name).map(|v| (name, v))
    }
}

/// Single entry of a bit set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitEntry {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

impl BitEntry {
    /// Mask of the entry bits before shifting.
    pub fn mask(&self) -> u64 {
        if self.size >= 64 {
            u64::MAX
        } else {
            (1u64 << self.size) - 1
        }
    }

    /// Extracts the entry value from a raw bit set.
    pub fn get(&self, raw: u64) -> u64 {
        (raw >> self.offset) & self.mask()
    }

    /// Stores an entry value into a raw bit set, returns None if it does not fit.
    pub fn set(&self, raw: u64, value: u64) -> Option<u64> {
        if value & !self.mask() != 0 {
            return None;
        }
        let cleared = raw & !(self.mask() << self.offset);
        Some(cleared | (value << self.offset))
    }
}

/// Compiled bit set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bits {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    pub entries: Vec<BitEntry>,
    pub options: Options,
}

impl Bits {
    pub fn entry(&self, name: &str) -> Option<&BitEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Splits a raw value into `(entry name, entry value)` pairs for all non-zero entries.
    pub fn decode(&self, raw: u64) -> Vec<(&str, u64)> {
        self.entries
            .iter()
            .filter_map(|e| {
                let v = e.get(raw);
                (v != 0).then_some((e.name.as_str(), v))
            })
            .collect()
    }

    /// Builds a raw value from `(entry name, entry value)` pairs.
    ///
    /// # Returns
    /// `None` if a name is unknown or a value does not fit its entry.
    pub fn encode(&self, values: &[(&str, u64)]) -> Option<u64> {
        values
            .iter()
            .try_fold(0u64, |raw, (name, value)| self.entry(name)?.set(raw, *value))
    }

    /// Bits of `raw` not covered by any entry.
    pub fn unknown_bits(&self, raw: u64) -> u64 {
        let known = self
            .entries
            .iter()
            .fold(0u64, |acc, e| acc | (e.mask() << e.offset));
        raw & !known
    }
}

/// Compiled union.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Union {
    pub name: String,
    /// Discriminant type
    pub tag: FieldType,
    /// Largest member size
    pub union_size: usize,
    /// Members, offsets are relative to the union start and follow the tag
    pub members: Vec<Field>,
    pub options: Options,
}

impl Union {
    pub fn tag_size(&self) -> usize {
        self.tag.scalar_size().unwrap_or(0)
    }

    pub fn member(&self, name: &str) -> Option<(usize, &Field)> {
        self.members.iter().enumerate().find(|(_, f)| f.name == name)
    }
}

/// Compiled, immutable scheme.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Scheme {
    pub messages: Vec<Message>,
    pub enums: Vec<Enum>,
    pub bits: Vec<Bits>,
    pub unions: Vec<Union>,
    pub options: Options,
    #[serde(skip)]
    pub(crate) by_name: HashMap<String, MessageId>,
    #[serde(skip)]
    pub(crate) by_msgid: HashMap<i32, MessageId>,
}

impl Scheme {
    /// Looks up a message by name.
    pub fn message(&self, name: &str) -> Option<&Message> {
        self.by_name.get(name).map(|id| &self.messages[id.0])
    }

    /// Looks up a message by wire id.
    pub fn message_by_id(&self, msgid: i32) -> Option<&Message> {
        self.by_msgid.get(&msgid).map(|id| &self.messages[id.0])
    }

    /// Returns the arena id of a message by name.
    pub fn message_id(&self, name: &str) -> Option<MessageId> {
        self.by_name.get(name).copied()
    }

    pub fn message_at(&self, id: MessageId) -> &Message {
        &self.messages[id.0]
    }

    pub fn enum_at(&self, id: EnumId) -> &Enum {
        &self.enums[id.0]
    }

    pub fn bits_at(&self, id: BitsId) -> &Bits {
        &self.bits[id.0]
    }

    pub fn union_at(&self, id: UnionId) -> &Union {
        &self.unions[id.0]
    }

    /// CRC-32 over all message fingerprints in declaration order.
    pub fn fingerprint(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        for msg in &self.messages {
            hasher.update(msg.name.as_bytes());
            hasher.update(&msg.fingerprint.to_le_bytes());
        }
        hasher.finalize()
    }
}
