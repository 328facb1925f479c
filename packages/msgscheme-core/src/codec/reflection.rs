//! Lazy, buffer-backed access to packed messages.
//!
//! A [`View`] is validated once on construction: every pointer, array count
//! and union tag reachable from the header is checked against the buffer.
//! Accessors afterwards only decode what they are asked for.

use crate::error::CodecError;
use crate::scheme::{Field, FieldType, Message, Scheme};

use super::pointer::ListRegion;
use super::unpack::{self, check_header, is_present, list_region, read_value, union_member};
use super::value::{Record, Value};

/// Builds a validated view over a packed message.
///
/// # Arguments
/// * `scheme` - Scheme owning `message`
/// * `message` - Message layout
/// * `data` - Buffer starting with the message header
///
/// # Returns
/// `Truncated` or `Malformed` errors for buffers `unpack` would reject.
pub fn reflection<'a>(
    scheme: &'a Scheme,
    message: &'a Message,
    data: &'a [u8],
) -> Result<View<'a>, CodecError> {
    View::new(scheme, message, data)
}

/// View of one message inside a buffer.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    scheme: &'a Scheme,
    message: &'a Message,
    data: &'a [u8],
    base: usize,
}

impl<'a> View<'a> {
    pub fn new(scheme: &'a Scheme, message: &'a Message, data: &'a [u8]) -> Result<Self, CodecError> {
        check_header(message, data)?;
        unpack::validate_message(scheme, message, data, 0)?;
        Ok(Self {
            scheme,
            message,
            data,
            base: 0,
        })
    }

    pub fn message(&self) -> &'a Message {
        self.message
    }

    /// Returns the field accessor, `None` for unknown or absent fields.
    pub fn get(&self, name: &str) -> Option<FieldView<'a>> {
        let field = self.message.field(name)?;
        self.present(field).then(|| self.field_view(field))
    }

    /// Returns true if the field exists and is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Present fields in declaration order, the pmap field excluded.
    pub fn fields(&self) -> impl Iterator<Item = FieldView<'a>> + '_ {
        self.message
            .fields
            .iter()
            .filter(|f| !f.pmap && self.present(f))
            .map(|f| self.field_view(f))
    }

    /// Materializes the whole message, same result as `unpack`.
    pub fn to_record(&self) -> Result<Record, CodecError> {
        unpack::read_message(self.scheme, self.message, self.data, self.base)
    }

    fn present(&self, field: &Field) -> bool {
        // Presence bits are inside the validated header
        is_present(self.message, field, self.data, self.base).unwrap_or(false)
    }

    fn field_view(&self, field: &'a Field) -> FieldView<'a> {
        FieldView {
            scheme: self.scheme,
            field,
            data: self.data,
            pos: self.base + field.offset,
        }
    }
}

/// Accessor for a single field, list element or union member.
#[derive(Debug, Clone, Copy)]
pub struct FieldView<'a> {
    scheme: &'a Scheme,
    field: &'a Field,
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldView<'a> {
    pub fn name(&self) -> &'a str {
        &self.field.name
    }

    pub fn field(&self) -> &'a Field {
        self.field
    }

    /// Decodes the field value, nested containers included.
    pub fn value(&self) -> Result<Value, CodecError> {
        read_value(self.scheme, self.field, self.data, self.pos)
    }

    /// Nested message view.
    pub fn as_message(&self) -> Result<View<'a>, CodecError> {
        match self.field.ty {
            FieldType::Message(id) => Ok(View {
                scheme: self.scheme,
                message: self.scheme.message_at(id),
                data: self.data,
                base: self.pos,
            }),
            _ => Err(self.mismatch("message")),
        }
    }

    /// List view for pointer and array fields.
    pub fn as_list(&self) -> Result<ListView<'a>, CodecError> {
        let (region, element) = list_region(self.field, self.data, self.pos)?;
        Ok(ListView {
            scheme: self.scheme,
            element,
            data: self.data,
            region,
        })
    }

    /// Active union member.
    pub fn as_union(&self) -> Result<FieldView<'a>, CodecError> {
        let FieldType::Union(id) = self.field.ty else {
            return Err(self.mismatch("union"));
        };
        let member = union_member(self.scheme, id, self.field, self.data, self.pos)?;
        Ok(FieldView {
            scheme: self.scheme,
            field: member,
            data: self.data,
            pos: self.pos + member.offset,
        })
    }

    fn mismatch(&self, expected: &str) -> CodecError {
        CodecError::TypeMismatch {
            field: self.field.name.clone(),
            expected: expected.to_string(),
            got: self.field.ty.kind_name(),
        }
    }
}

/// Elements of a pointer or array field.
#[derive(Debug, Clone, Copy)]
pub struct ListView<'a> {
    scheme: &'a Scheme,
    element: &'a Field,
    data: &'a [u8],
    region: ListRegion,
}

impl<'a> ListView<'a> {
    pub fn len(&self) -> usize {
        self.region.count
    }

    pub fn is_empty(&self) -> bool {
        self.region.count == 0
    }

    pub fn get(&self, index: usize) -> Option<FieldView<'a>> {
        (index < self.region.count).then(|| FieldView {
            scheme: self.scheme,
            field: self.element,
            data: self.data,
            pos: self.region.element(index),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = FieldView<'a>> + '_ {
        (0..self.region.count).filter_map(|i| self.get(i))
    }
}
