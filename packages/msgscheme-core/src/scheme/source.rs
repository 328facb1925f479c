//! Scheme source structs.
//!
//! A source is the uncompiled, serde-friendly description of a scheme. It is
//! what an external schema-text parser (or a JSON file) hands to the layout
//! compiler.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::LayoutError;
use super::types::Options;

/// Type expression used by field, alias and enum definitions.
///
/// Textual form: `int8`..`uint64`, `double`, `decimal128`, `string`, `byteN`,
/// `*T` (offset pointer list), `T[N]` (bounded array) or a type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
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
    String,
    Bytes(usize),
    Pointer(Box<TypeRef>),
    Array(Box<TypeRef>, usize),
    Named(String),
}

impl FromStr for TypeRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty type".to_string());
        }
        if let Some(inner) = s.strip_prefix('*') {
            return Ok(TypeRef::Pointer(Box::new(inner.parse()?)));
        }
        if let Some(body) = s.strip_suffix(']') {
            let open = body
                .rfind('[')
                .ok_or_else(|| format!("unbalanced array brackets in '{}'", s))?;
            let capacity: usize = body[open + 1..]
                .trim()
                .parse()
                .map_err(|_| format!("invalid array size in '{}'", s))?;
            return Ok(TypeRef::Array(Box::new(body[..open].parse()?), capacity));
        }
        Ok(match s {
            "int8" => TypeRef::Int8,
            "int16" => TypeRef::Int16,
            "int32" => TypeRef::Int32,
            "int64" => TypeRef::Int64,
            "uint8" => TypeRef::UInt8,
            "uint16" => TypeRef::UInt16,
            "uint32" => TypeRef::UInt32,
            "uint64" => TypeRef::UInt64,
            "double" => TypeRef::Double,
            "decimal128" => TypeRef::Decimal128,
            "string" => TypeRef::String,
            _ => {
                if let Some(n) = s.strip_prefix("byte") {
                    if let Ok(n) = n.parse::<usize>() {
                        if n == 0 {
                            return Err("byte blob size must be positive".to_string());
                        }
                        return Ok(TypeRef::Bytes(n));
                    }
                }
                if !s
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
                {
                    return Err(format!("invalid type name '{}'", s));
                }
                TypeRef::Named(s.to_string())
            }
        })
    }
}

impl TryFrom<String> for TypeRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Int8 => f.write_str("int8"),
            TypeRef::Int16 => f.write_str("int16"),
            TypeRef::Int32 => f.write_str("int32"),
            TypeRef::Int64 => f.write_str("int64"),
            TypeRef::UInt8 => f.write_str("uint8"),
            TypeRef::UInt16 => f.write_str("uint16"),
            TypeRef::UInt32 => f.write_str("uint32"),
            TypeRef::UInt64 => f.write_str("uint64"),
            TypeRef::Double => f.write_str("double"),
            TypeRef::Decimal128 => f.write_str("decimal128"),
            TypeRef::String => f.write_str("string"),
            TypeRef::Bytes(n) => write!(f, "byte{}", n),
            TypeRef::Pointer(inner) => write!(f, "*{}", inner),
            TypeRef::Array(inner, n) => write!(f, "{}[{}]", inner, n),
            TypeRef::Named(name) => f.write_str(name),
        }
    }
}

/// Field definition. Aliases use the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub optional: bool,
    /// Merge the referenced message fields into the parent
    #[serde(default)]
    pub inline: bool,
    #[serde(default)]
    pub options: Options,
}

impl FieldDef {
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            ty,
            optional: false,
            inline: false,
            options: Options::new(),
        }
    }

    /// Adds an option (builder style).
    pub fn option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }
}

/// Enum entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumEntryDef {
    pub name: String,
    /// Values outside `i64` are rejected at compile time
    pub value: i128,
}

/// Enum definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    pub values: Vec<EnumEntryDef>,
    #[serde(default, rename = "fallback-value")]
    pub fallback: Option<String>,
    #[serde(default)]
    pub options: Options,
}

impl EnumDef {
    pub fn new(name: &str, ty: TypeRef, values: &[(&str, i64)]) -> Self {
        Self {
            name: name.to_string(),
            ty,
            values: values
                .iter()
                .map(|(n, v)| EnumEntryDef {
                    name: n.to_string(),
                    value: i128::from(*v),
                })
                .collect(),
            fallback: None,
            options: Options::new(),
        }
    }

    pub fn fallback(mut self, name: &str) -> Self {
        self.fallback = Some(name.to_string());
        self
    }
}

/// Bit set entry. A missing offset continues after the previous entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitDef {
    pub name: String,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default = "default_bit_size")]
    pub size: u32,
}

fn default_bit_size() -> u32 {
    1
}

/// Bit set definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitsDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    pub entries: Vec<BitDef>,
    #[serde(default)]
    pub options: Options,
}

impl BitsDef {
    /// Creates a bit set from `(name, offset, size)` triples.
    pub fn new(name: &str, ty: TypeRef, entries: &[(&str, u32, u32)]) -> Self {
        Self {
            name: name.to_string(),
            ty,
            entries: entries
                .iter()
                .map(|(n, o, s)| BitDef {
                    name: n.to_string(),
                    offset: Some(*o),
                    size: *s,
                })
                .collect(),
            options: Options::new(),
        }
    }
}

/// Union definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub options: Options,
}

impl UnionDef {
    pub fn new(name: &str, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.to_string(),
            fields,
            options: Options::new(),
        }
    }
}

/// Message definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDef {
    pub name: String,
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
    #[serde(default)]
    pub bits: Vec<BitsDef>,
    #[serde(default)]
    pub unions: Vec<UnionDef>,
}

impl MessageDef {
    pub fn new(name: &str, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.to_string(),
            id: None,
            fields,
            options: Options::new(),
            enums: Vec::new(),
            bits: Vec::new(),
            unions: Vec::new(),
        }
    }

    pub fn id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }
}

/// Imported scheme: inline source or path relative to the importing file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Import {
    Path(PathBuf),
    Inline(Box<SchemeSource>),
}

/// Uncompiled scheme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemeSource {
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub aliases: Vec<FieldDef>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
    #[serde(default)]
    pub bits: Vec<BitsDef>,
    #[serde(default)]
    pub unions: Vec<UnionDef>,
    #[serde(default)]
    pub messages: Vec<MessageDef>,
}

impl SchemeSource {
    /// Parses a source from JSON. Path imports are kept unresolved.
    pub fn from_json(text: &str) -> Result<Self, LayoutError> {
        serde_json::from_str(text).map_err(|e| LayoutError::Load(e.to_string()))
    }

    /// Loads a source file and inlines all path imports recursively.
    ///
    /// # Arguments
    /// * `path` - JSON scheme file
    ///
    /// # Returns
    /// `Result<SchemeSource, LayoutError>` with every import inlined.
    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        let mut stack = Vec::new();
        Self::load_nested(path, &mut stack)
    }

    fn load_nested(path: &Path, stack: &mut Vec<PathBuf>) -> Result<Self, LayoutError> {
        let canonical = path
            .canonicalize()
            .map_err(|e| LayoutError::Load(format!("{}: {}", path.display(), e)))?;
        if stack.contains(&canonical) {
            return Err(LayoutError::Load(format!(
                "recursive import of {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(&canonical)
            .map_err(|e| LayoutError::Load(format!("{}: {}", path.display(), e)))?;
        let mut source = Self::from_json(&text)?;

        stack.push(canonical.clone());
        let base = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut imports = Vec::with_capacity(source.imports.len());
        for import in source.imports.drain(..) {
            imports.push(match import {
                Import::Path(p) => {
                    let nested = Self::load_nested(&base.join(p), stack)?;
                    Import::Inline(Box::new(nested))
                }
                inline => inline,
            });
        }
        stack.pop();

        source.imports = imports;
        Ok(source)
    }

    /// Flattens imports into a single source.
    ///
    /// Imports are merged depth-first in the order they are listed, then the
    /// local declarations. A later definition replaces an earlier one with the
    /// same name, keeping the earlier position. Path imports must be resolved
    /// with [`SchemeSource::load`] first.
    pub fn merged(&self) -> Result<SchemeSource, LayoutError> {
        let mut out = SchemeSource::default();
        self.merge_into(&mut out)?;
        Ok(out)
    }

    fn merge_into(&self, out: &mut SchemeSource) -> Result<(), LayoutError> {
        for import in &self.imports {
            match import {
                Import::Inline(source) => source.merge_into(out)?,
                Import::Path(p) => {
                    return Err(LayoutError::Load(format!(
                        "unresolved import '{}'",
                        p.display()
                    )))
                }
            }
        }

        check_unique("alias", self.aliases.iter().map(|a| a.name.as_str()))?;
        check_unique("enum", self.enums.iter().map(|e| e.name.as_str()))?;
        check_unique("bits", self.bits.iter().map(|b| b.name.as_str()))?;
        check_unique("union", self.unions.iter().map(|u| u.name.as_str()))?;
        check_unique("message", self.messages.iter().map(|m| m.name.as_str()))?;

        for (k, v) in &self.options {
            out.options.insert(k.clone(), v.clone());
        }
        override_by_name(&mut out.aliases, &self.aliases, |a| &a.name);
        override_by_name(&mut out.enums, &self.enums, |e| &e.name);
        override_by_name(&mut out.bits, &self.bits, |b| &b.name);
        override_by_name(&mut out.unions, &self.unions, |u| &u.name);
        override_by_name(&mut out.messages, &self.messages, |m| &m.name);
        Ok(())
    }
}

fn check_unique<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), LayoutError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(LayoutError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

fn override_by_name<T: Clone>(target: &mut Vec<T>, items: &[T], name: impl Fn(&T) -> &String) {
    for item in items {
        match target.iter().position(|t| name(t) == name(item)) {
            Some(pos) => target[pos] = item.clone(),
            None => target.push(item.clone()),
        }
    }
}
