//! Layout compiler.
//!
//! Walks a merged [`SchemeSource`] once and produces an immutable [`Scheme`]:
//! aliases are substituted, inline fields expanded, offsets assigned in
//! declaration order and presence bits allocated to optional fields.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use tracing::debug;

use crate::config::SchemeConfig;

use super::error::LayoutError;
use super::source::{BitsDef, EnumDef, FieldDef, MessageDef, SchemeSource, TypeRef, UnionDef};
use super::types::{
    ArrayType, BitEntry, Bits, BitsId, Enum, EnumId, Field, FieldType, Message, MessageId,
    Options, PointerType, PtrVersion, Resolution, Scheme, SubType, Union, UnionId,
};
use super::validation;

/// Compiles a scheme source with the default configuration.
pub fn compile(source: &SchemeSource) -> Result<Scheme, LayoutError> {
    compile_with_config(source, &SchemeConfig::default())
}

/// Compiles a scheme source.
///
/// # Arguments
/// * `source` - Scheme source, imports must be inline (see [`SchemeSource::load`])
/// * `config` - Compilation settings
///
/// # Returns
/// `Result<Scheme, LayoutError>` containing the compiled scheme or the first
/// structural problem found.
pub fn compile_with_config(
    source: &SchemeSource,
    config: &SchemeConfig,
) -> Result<Scheme, LayoutError> {
    let merged = source.merged()?;
    let mut compiler = Compiler::new(&merged, config);
    compiler.run(&merged)?;
    debug!(
        messages = compiler.scheme.messages.len(),
        enums = compiler.scheme.enums.len(),
        unions = compiler.scheme.unions.len(),
        "scheme compiled"
    );
    Ok(compiler.scheme)
}

/// Enum, bits and union names visible from a message.
#[derive(Debug, Default)]
struct Scope {
    enums: HashMap<String, EnumId>,
    bits: HashMap<String, BitsId>,
    unions: HashMap<String, UnionId>,
}

enum Resolved<'s> {
    Alias(&'s FieldDef),
    Enum(EnumId),
    Bits(BitsId),
    Union(UnionId),
    Message(MessageId),
}

struct Compiler<'s> {
    config: &'s SchemeConfig,
    aliases: HashMap<&'s str, &'s FieldDef>,
    union_defs: HashMap<&'s str, &'s UnionDef>,
    global: Scope,
    unions_in_progress: HashSet<String>,
    scheme: Scheme,
}

impl<'s> Compiler<'s> {
    fn new(source: &'s SchemeSource, config: &'s SchemeConfig) -> Self {
        Self {
            config,
            aliases: source.aliases.iter().map(|a| (a.name.as_str(), a)).collect(),
            union_defs: source.unions.iter().map(|u| (u.name.as_str(), u)).collect(),
            global: Scope::default(),
            unions_in_progress: HashSet::new(),
            scheme: Scheme::default(),
        }
    }

    fn run(&mut self, source: &'s SchemeSource) -> Result<(), LayoutError> {
        self.scheme.options = source.options.clone();

        for def in &source.enums {
            let id = self.add_enum(def, "scheme")?;
            self.global.enums.insert(def.name.clone(), id);
        }
        for def in &source.bits {
            let id = self.add_bits(def, "scheme")?;
            self.global.bits.insert(def.name.clone(), id);
        }
        for def in &source.messages {
            self.compile_message(def)?;
        }
        // Unions nobody referenced still have to be valid
        for def in &source.unions {
            if !self.global.unions.contains_key(&def.name) {
                self.compile_global_union(def)?;
            }
        }
        Ok(())
    }

    fn resolve(&mut self, local: &Scope, name: &str) -> Result<Option<Resolved<'s>>, LayoutError> {
        if let Some(&id) = local.enums.get(name) {
            return Ok(Some(Resolved::Enum(id)));
        }
        if let Some(&id) = local.bits.get(name) {
            return Ok(Some(Resolved::Bits(id)));
        }
        if let Some(&id) = local.unions.get(name) {
            return Ok(Some(Resolved::Union(id)));
        }
        if let Some(&id) = self.global.enums.get(name) {
            return Ok(Some(Resolved::Enum(id)));
        }
        if let Some(&id) = self.global.bits.get(name) {
            return Ok(Some(Resolved::Bits(id)));
        }
        if let Some(&id) = self.global.unions.get(name) {
            return Ok(Some(Resolved::Union(id)));
        }
        if let Some(def) = self.union_defs.get(name).copied() {
            let id = self.compile_global_union(def)?;
            return Ok(Some(Resolved::Union(id)));
        }
        if let Some(def) = self.aliases.get(name).copied() {
            return Ok(Some(Resolved::Alias(def)));
        }
        Ok(self.scheme.by_name.get(name).map(|&id| Resolved::Message(id)))
    }

    fn add_enum(&mut self, def: &EnumDef, scope: &str) -> Result<EnumId, LayoutError> {
        let context = format!("{}.{}", scope, def.name);
        let ty = int_type(&def.ty).ok_or_else(|| LayoutError::InvalidType {
            context: context.clone(),
            message: format!("enum type must be an integer, got '{}'", def.ty),
        })?;

        let mut seen = HashSet::new();
        let mut values = Vec::with_capacity(def.values.len());
        for entry in &def.values {
            if !seen.insert(entry.name.as_str()) {
                return Err(LayoutError::DuplicateName {
                    kind: "enum entry",
                    name: format!("{}.{}", def.name, entry.name),
                });
            }
            // uint64 enums are limited to the non-negative i64 range
            let value = i64::try_from(entry.value)
                .ok()
                .filter(|v| validation::fits_integer(&ty, i128::from(*v)))
                .ok_or_else(|| LayoutError::EnumValueRange {
                    name: def.name.clone(),
                    entry: entry.name.clone(),
                    value: entry.value,
                })?;
            values.push((entry.name.clone(), value));
        }

        let fallback = def
            .fallback
            .clone()
            .or_else(|| def.options.get("fallback-value").cloned());
        if let Some(name) = &fallback {
            if !seen.contains(name.as_str()) {
                return Err(LayoutError::InvalidOption {
                    context,
                    key: "fallback-value".to_string(),
                    value: name.clone(),
                });
            }
        }

        let id = EnumId(self.scheme.enums.len());
        self.scheme.enums.push(Enum {
            name: def.name.clone(),
            ty,
            values,
            fallback,
            options: def.options.clone(),
        });
        Ok(id)
    }

    fn add_bits(&mut self, def: &BitsDef, scope: &str) -> Result<BitsId, LayoutError> {
        let ty = int_type(&def.ty).ok_or_else(|| LayoutError::InvalidType {
            context: format!("{}.{}", scope, def.name),
            message: format!("bits type must be an integer, got '{}'", def.ty),
        })?;
        let width = ty.scalar_size().unwrap_or(0) as u32 * 8;

        let mut seen = HashSet::new();
        let mut next = 0u32;
        let mut entries = Vec::with_capacity(def.entries.len());
        for entry in &def.entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(LayoutError::DuplicateName {
                    kind: "bits entry",
                    name: format!("{}.{}", def.name, entry.name),
                });
            }
            let offset = entry.offset.unwrap_or(next);
            if entry.size == 0 || offset.saturating_add(entry.size) > width {
                return Err(LayoutError::BitsRange {
                    name: def.name.clone(),
                    entry: entry.name.clone(),
                    offset,
                    size: entry.size,
                    width,
                });
            }
            next = offset + entry.size;
            entries.push(BitEntry {
                name: entry.name.clone(),
                offset,
                size: entry.size,
            });
        }

        let id = BitsId(self.scheme.bits.len());
        self.scheme.bits.push(Bits {
            name: def.name.clone(),
            ty,
            entries,
            options: def.options.clone(),
        });
        Ok(id)
    }

    fn compile_global_union(&mut self, def: &'s UnionDef) -> Result<UnionId, LayoutError> {
        if !self.unions_in_progress.insert(def.name.clone()) {
            return Err(LayoutError::UnknownType {
                context: def.name.clone(),
                name: def.name.clone(),
            });
        }
        let result = self.compile_union(def, &Scope::default());
        self.unions_in_progress.remove(&def.name);
        let id = result?;
        self.global.unions.insert(def.name.clone(), id);
        Ok(id)
    }

    fn compile_union(&mut self, def: &'s UnionDef, local: &Scope) -> Result<UnionId, LayoutError> {
        if def.fields.is_empty() {
            return Err(LayoutError::InvalidType {
                context: def.name.clone(),
                message: "union has no members".to_string(),
            });
        }

        let tag = match def.options.get("tag-type") {
            Some(text) => text
                .parse::<TypeRef>()
                .ok()
                .and_then(|t| int_type(&t))
                .ok_or_else(|| LayoutError::InvalidOption {
                    context: def.name.clone(),
                    key: "tag-type".to_string(),
                    value: text.clone(),
                })?,
            None => validation::tag_type_for(def.fields.len()),
        };
        if !validation::fits_integer(&tag, def.fields.len() as i128 - 1) {
            return Err(LayoutError::UnionTagRange {
                name: def.name.clone(),
                members: def.fields.len(),
                tag: tag.kind_name(),
            });
        }
        let tag_size = tag.scalar_size().unwrap_or(0);

        let mut members = Vec::with_capacity(def.fields.len());
        for fd in &def.fields {
            if fd.optional || fd.inline {
                return Err(LayoutError::InvalidType {
                    context: format!("{}.{}", def.name, fd.name),
                    message: "union members can not be optional or inline".to_string(),
                });
            }
            let mut member =
                self.build_field(local, &def.name, &fd.name, &fd.ty, &fd.options, &mut Vec::new())?;
            member.offset = tag_size;
            members.push(member);
        }
        validation::validate_unique_fields(&def.name, &members, &HashSet::new())?;

        let union_size = members.iter().map(|m| m.size).max().unwrap_or(0);
        let id = UnionId(self.scheme.unions.len());
        self.scheme.unions.push(Union {
            name: def.name.clone(),
            tag,
            union_size,
            members,
            options: def.options.clone(),
        });
        Ok(id)
    }

    /// Builds a field with offset 0 from a type expression.
    fn build_field(
        &mut self,
        local: &Scope,
        scope: &str,
        name: &str,
        ty: &TypeRef,
        options: &Options,
        chain: &mut Vec<String>,
    ) -> Result<Field, LayoutError> {
        let context = format!("{}.{}", scope, name);
        let (ty, sub_type, size) = match ty {
            TypeRef::String => {
                let version = ptr_version(&context, options, self.config)?;
                let element = Field {
                    name: name.to_string(),
                    offset: 0,
                    size: 1,
                    ty: FieldType::Int8,
                    sub_type: SubType::ByteString,
                    optional: None,
                    pmap: false,
                    options: Options::new(),
                };
                (
                    FieldType::Pointer(Box::new(PointerType { version, element })),
                    SubType::None,
                    version.size(),
                )
            }
            TypeRef::Pointer(inner) => {
                let version = ptr_version(&context, options, self.config)?;
                let element = self.build_field(local, scope, name, inner, options, chain)?;
                (
                    FieldType::Pointer(Box::new(PointerType { version, element })),
                    SubType::None,
                    version.size(),
                )
            }
            TypeRef::Array(inner, capacity) => {
                let capacity = *capacity;
                if capacity == 0 {
                    return Err(LayoutError::InvalidType {
                        context,
                        message: "array capacity must be positive".to_string(),
                    });
                }
                let count_ty = match options.get("count-type") {
                    Some(text) => text
                        .parse::<TypeRef>()
                        .ok()
                        .and_then(|t| int_type(&t))
                        .filter(|t| validation::fits_integer(t, capacity as i128))
                        .ok_or_else(|| LayoutError::InvalidOption {
                            context: context.clone(),
                            key: "count-type".to_string(),
                            value: text.clone(),
                        })?,
                    None => validation::count_type_for(capacity),
                };
                let count_size = count_ty.scalar_size().unwrap_or(0);
                let mut element = self.build_field(local, scope, name, inner, options, chain)?;
                element.offset = count_size;
                let size = element
                    .size
                    .checked_mul(capacity)
                    .and_then(|s| s.checked_add(count_size))
                    .ok_or_else(|| LayoutError::InvalidType {
                        context: context.clone(),
                        message: "array size overflow".to_string(),
                    })?;
                let count = Field {
                    name: name.to_string(),
                    offset: 0,
                    size: count_size,
                    ty: count_ty,
                    sub_type: SubType::None,
                    optional: None,
                    pmap: false,
                    options: Options::new(),
                };
                (
                    FieldType::Array(Box::new(ArrayType {
                        capacity,
                        count,
                        element,
                    })),
                    SubType::None,
                    size,
                )
            }
            TypeRef::Named(type_name) => match self.resolve(local, type_name)? {
                Some(Resolved::Alias(def)) => {
                    if chain.iter().any(|c| c == type_name) {
                        let mut cycle = chain.clone();
                        cycle.push(type_name.clone());
                        return Err(LayoutError::AliasCycle { chain: cycle });
                    }
                    chain.push(type_name.clone());
                    let mut merged = def.options.clone();
                    merged.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
                    let field = self.build_field(local, scope, name, &def.ty, &merged, chain);
                    chain.pop();
                    return field;
                }
                Some(Resolved::Enum(id)) => {
                    let ty = self.scheme.enum_at(id).ty.clone();
                    let size = ty.scalar_size().unwrap_or(0);
                    (ty, SubType::Enum(id), size)
                }
                Some(Resolved::Bits(id)) => {
                    let ty = self.scheme.bits_at(id).ty.clone();
                    let size = ty.scalar_size().unwrap_or(0);
                    (ty, SubType::Bits(id), size)
                }
                Some(Resolved::Union(id)) => {
                    let u = self.scheme.union_at(id);
                    let size = u.tag_size() + u.union_size;
                    (FieldType::Union(id), SubType::None, size)
                }
                Some(Resolved::Message(id)) => {
                    let size = self.scheme.message_at(id).size;
                    (FieldType::Message(id), SubType::None, size)
                }
                None => {
                    return Err(LayoutError::UnknownType {
                        context,
                        name: type_name.clone(),
                    })
                }
            },
            scalar => {
                let ty = scalar_type(scalar).ok_or_else(|| LayoutError::InvalidType {
                    context: context.clone(),
                    message: format!("unsupported type '{}'", scalar),
                })?;
                let sub_type = sub_type_from_options(&context, &ty, options)?;
                let size = ty.scalar_size().unwrap_or(0);
                (ty, sub_type, size)
            }
        };

        Ok(Field {
            name: name.to_string(),
            offset: 0,
            size,
            ty,
            sub_type,
            optional: None,
            pmap: false,
            options: options.clone(),
        })
    }

    /// Resolves the message referenced by an inline field.
    fn inline_target(
        &mut self,
        local: &Scope,
        message: &str,
        fd: &'s FieldDef,
    ) -> Result<MessageId, LayoutError> {
        let invalid = |reason: &str| LayoutError::InvalidInline {
            message: message.to_string(),
            field: fd.name.clone(),
            reason: reason.to_string(),
        };
        if fd.optional {
            return Err(invalid("inline fields can not be optional"));
        }

        let mut ty = &fd.ty;
        let mut chain: Vec<String> = Vec::new();
        loop {
            let TypeRef::Named(name) = ty else {
                return Err(invalid("inline target must be a message"));
            };
            match self.resolve(local, name)? {
                Some(Resolved::Alias(def)) => {
                    if chain.contains(name) {
                        chain.push(name.clone());
                        return Err(LayoutError::AliasCycle { chain });
                    }
                    chain.push(name.clone());
                    ty = &def.ty;
                }
                Some(Resolved::Message(id)) => {
                    let target = self.scheme.message_at(id);
                    if target.pmap.is_some() || target.fields.iter().any(|f| f.optional.is_some()) {
                        return Err(invalid("inlined message has optional fields"));
                    }
                    return Ok(id);
                }
                Some(_) => return Err(invalid("inline target must be a message")),
                None => {
                    return Err(LayoutError::UnknownType {
                        context: format!("{}.{}", message, fd.name),
                        name: name.clone(),
                    })
                }
            }
        }
    }

    fn compile_message(&mut self, def: &'s MessageDef) -> Result<MessageId, LayoutError> {
        let mut local = Scope::default();
        for e in &def.enums {
            if local.enums.contains_key(&e.name) {
                return Err(LayoutError::DuplicateName {
                    kind: "enum",
                    name: format!("{}.{}", def.name, e.name),
                });
            }
            let id = self.add_enum(e, &def.name)?;
            local.enums.insert(e.name.clone(), id);
        }
        for b in &def.bits {
            if local.bits.contains_key(&b.name) {
                return Err(LayoutError::DuplicateName {
                    kind: "bits",
                    name: format!("{}.{}", def.name, b.name),
                });
            }
            let id = self.add_bits(b, &def.name)?;
            local.bits.insert(b.name.clone(), id);
        }
        for u in &def.unions {
            if local.unions.contains_key(&u.name) {
                return Err(LayoutError::DuplicateName {
                    kind: "union",
                    name: format!("{}.{}", def.name, u.name),
                });
            }
            let id = self.compile_union(u, &local)?;
            local.unions.insert(u.name.clone(), id);
        }

        let mut fields: Vec<Field> = Vec::with_capacity(def.fields.len());
        let mut inlined = HashSet::new();
        let mut options = def.options.clone();
        let mut offset = 0usize;

        for fd in &def.fields {
            if fd.inline {
                let id = self.inline_target(&local, &def.name, fd)?;
                let target = self.scheme.message_at(id);
                for sub in &target.fields {
                    let mut field = sub.clone();
                    field.offset += offset;
                    inlined.insert(field.name.clone());
                    fields.push(field);
                }
                offset += target.size;
                for (k, v) in &target.options {
                    options.entry(k.clone()).or_insert_with(|| v.clone());
                }
                continue;
            }

            let mut field =
                self.build_field(&local, &def.name, &fd.name, &fd.ty, &fd.options, &mut Vec::new())?;
            field.offset = offset;
            field.pmap = is_yes(fd.options.get("pmap"));
            if fd.optional {
                field.optional = Some(0);
            }
            offset = offset
                .checked_add(field.size)
                .ok_or_else(|| LayoutError::InvalidType {
                    context: def.name.clone(),
                    message: "message size overflow".to_string(),
                })?;
            fields.push(field);
        }

        validation::validate_unique_fields(&def.name, &fields, &inlined)?;
        let pmap = assign_presence_bits(&def.name, &mut fields)?;
        validation::validate_field_layout(&def.name, &fields)?;
        let size = validation::calculate_message_size(&fields);

        if let Some(msgid) = def.id {
            if let Some(prev) = self.scheme.by_msgid.get(&msgid) {
                return Err(LayoutError::DuplicateMessageId {
                    msgid,
                    first: self.scheme.message_at(*prev).name.clone(),
                    second: def.name.clone(),
                });
            }
        }
        if self.scheme.by_name.contains_key(&def.name) {
            return Err(LayoutError::DuplicateName {
                kind: "message",
                name: def.name.clone(),
            });
        }

        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        let mut message = Message {
            name: def.name.clone(),
            msgid: def.id,
            size,
            fields,
            options,
            pmap,
            fingerprint: 0,
            index,
        };
        message.fingerprint = message_fingerprint(&self.scheme, &message);

        debug!(
            message = %message.name,
            msgid = ?message.msgid,
            size = message.size,
            fields = message.fields.len(),
            "compiled message"
        );

        let id = MessageId(self.scheme.messages.len());
        if let Some(msgid) = message.msgid {
            self.scheme.by_msgid.insert(msgid, id);
        }
        self.scheme.by_name.insert(message.name.clone(), id);
        self.scheme.messages.push(message);
        Ok(id)
    }
}

/// Validates the pmap field and numbers optional fields in declaration order.
fn assign_presence_bits(message: &str, fields: &mut [Field]) -> Result<Option<usize>, LayoutError> {
    let mut pmap = None;
    for (i, field) in fields.iter().enumerate() {
        if !field.pmap {
            continue;
        }
        if pmap.is_some() {
            return Err(LayoutError::MultiplePmap {
                message: message.to_string(),
            });
        }
        if field.optional.is_some() {
            return Err(LayoutError::OptionalPmap {
                message: message.to_string(),
                field: field.name.clone(),
            });
        }
        let valid_type = field.ty.is_unsigned() || matches!(field.ty, FieldType::Bytes(_));
        if !valid_type || field.sub_type != SubType::None {
            return Err(LayoutError::InvalidPmap {
                message: message.to_string(),
                field: field.name.clone(),
            });
        }
        pmap = Some(i);
    }

    let mut bit = 0u32;
    for field in fields.iter_mut() {
        if field.optional.is_some() {
            field.optional = Some(bit);
            bit += 1;
        }
    }
    if bit == 0 {
        return Ok(pmap);
    }

    let Some(index) = pmap else {
        return Err(LayoutError::MissingPmap {
            message: message.to_string(),
        });
    };
    let bits = fields[index].size * 8;
    if bit as usize > bits {
        return Err(LayoutError::PmapOverflow {
            message: message.to_string(),
            pmap: fields[index].name.clone(),
            optional: bit as usize,
            bits,
        });
    }
    Ok(pmap)
}

fn is_yes(value: Option<&String>) -> bool {
    matches!(value.map(String::as_str), Some("yes" | "true" | "1"))
}

fn int_type(ty: &TypeRef) -> Option<FieldType> {
    scalar_type(ty).filter(FieldType::is_integer)
}

fn scalar_type(ty: &TypeRef) -> Option<FieldType> {
    Some(match ty {
        TypeRef::Int8 => FieldType::Int8,
        TypeRef::Int16 => FieldType::Int16,
        TypeRef::Int32 => FieldType::Int32,
        TypeRef::Int64 => FieldType::Int64,
        TypeRef::UInt8 => FieldType::UInt8,
        TypeRef::UInt16 => FieldType::UInt16,
        TypeRef::UInt32 => FieldType::UInt32,
        TypeRef::UInt64 => FieldType::UInt64,
        TypeRef::Double => FieldType::Double,
        TypeRef::Decimal128 => FieldType::Decimal128,
        TypeRef::Bytes(n) => FieldType::Bytes(*n),
        _ => return None,
    })
}

fn ptr_version(
    context: &str,
    options: &Options,
    config: &SchemeConfig,
) -> Result<PtrVersion, LayoutError> {
    match options.get("offset-ptr-type") {
        Some(text) => text.parse().map_err(|_| LayoutError::InvalidOption {
            context: context.to_string(),
            key: "offset-ptr-type".to_string(),
            value: text.clone(),
        }),
        None => Ok(config.default_ptr_version),
    }
}

/// Derives the sub-type of a scalar field from its `type` option.
fn sub_type_from_options(
    context: &str,
    ty: &FieldType,
    options: &Options,
) -> Result<SubType, LayoutError> {
    let Some(kind) = options.get("type") else {
        return Ok(SubType::None);
    };
    let invalid = |key: &str, value: &str| LayoutError::InvalidOption {
        context: context.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    };

    match kind.as_str() {
        "string" if matches!(ty, FieldType::Bytes(_)) => Ok(SubType::ByteString),
        "duration" | "time_point" if ty.is_integer() || *ty == FieldType::Double => {
            let suffix = options
                .get("resolution")
                .ok_or_else(|| invalid("resolution", ""))?;
            let resolution =
                Resolution::from_suffix(suffix).ok_or_else(|| invalid("resolution", suffix))?;
            Ok(if kind == "duration" {
                SubType::Duration(resolution)
            } else {
                SubType::TimePoint(resolution)
            })
        }
        k if k.starts_with("fixed") && ty.is_integer() => {
            let precision: u32 = k[5..].parse().map_err(|_| invalid("type", k))?;
            if precision > 18 {
                return Err(invalid("type", k));
            }
            Ok(SubType::FixedPoint(precision))
        }
        other => Err(invalid("type", other)),
    }
}

/// CRC-32 over a canonical layout description of a message.
fn message_fingerprint(scheme: &Scheme, message: &Message) -> u32 {
    let mut out = String::new();
    let _ = write!(
        out,
        "{}#{:?}+{}{{",
        message.name, message.msgid, message.size
    );
    for field in &message.fields {
        describe_field(scheme, field, &mut out);
    }
    out.push('}');
    crc32fast::hash(out.as_bytes())
}

fn describe_field(scheme: &Scheme, field: &Field, out: &mut String) {
    let _ = write!(out, "{}@{}+{}:", field.name, field.offset, field.size);
    match &field.ty {
        FieldType::Message(id) => {
            let _ = write!(out, "msg:{:08x}", scheme.message_at(*id).fingerprint);
        }
        FieldType::Array(array) => {
            let _ = write!(out, "array[{}](", array.capacity);
            describe_field(scheme, &array.count, out);
            describe_field(scheme, &array.element, out);
            out.push(')');
        }
        FieldType::Pointer(ptr) => {
            let _ = write!(out, "ptr[{}](", ptr.version);
            describe_field(scheme, &ptr.element, out);
            out.push(')');
        }
        FieldType::Union(id) => {
            let u = scheme.union_at(*id);
            let _ = write!(out, "union[{}](", u.tag.kind_name());
            for member in &u.members {
                describe_field(scheme, member, out);
            }
            out.push(')');
        }
        other => out.push_str(&other.kind_name()),
    }
    match field.sub_type {
        SubType::None => {}
        SubType::ByteString => out.push_str("/string"),
        SubType::Enum(id) => {
            out.push_str("/enum(");
            for (name, value) in &scheme.enum_at(id).values {
                let _ = write!(out, "{}={},", name, value);
            }
            out.push(')');
        }
        SubType::Bits(id) => {
            out.push_str("/bits(");
            for e in &scheme.bits_at(id).entries {
                let _ = write!(out, "{}@{}+{},", e.name, e.offset, e.size);
            }
            out.push(')');
        }
        SubType::FixedPoint(p) => {
            let _ = write!(out, "/fixed{}", p);
        }
        SubType::Duration(r) => {
            let _ = write!(out, "/duration{}:{}", r.num, r.den);
        }
        SubType::TimePoint(r) => {
            let _ = write!(out, "/time_point{}:{}", r.num, r.den);
        }
    }
    if let Some(bit) = field.optional {
        let _ = write!(out, "?{}", bit);
    }
    if field.pmap {
        out.push_str("!pmap");
    }
    out.push(';');
}
