//! Validation helpers for compiled message layouts.

use std::collections::HashSet;

use super::error::LayoutError;
use super::types::{Field, FieldType};

/// Validates that field names are unique within a message.
///
/// Inlined fields colliding with anything are reported as
/// [`LayoutError::InlineCollision`], other duplicates as
/// [`LayoutError::DuplicateField`].
///
/// # Arguments
/// * `message` - Owning message (or union) name
/// * `fields` - Field definitions in declaration order
/// * `inlined` - Names of fields contributed by inline expansion
pub(crate) fn validate_unique_fields(
    message: &str,
    fields: &[Field],
    inlined: &HashSet<String>,
) -> Result<(), LayoutError> {
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.name.as_str()) {
            if inlined.contains(&field.name) {
                return Err(LayoutError::InlineCollision {
                    message: message.to_string(),
                    field: field.name.clone(),
                });
            }
            return Err(LayoutError::DuplicateField {
                message: message.to_string(),
                field: field.name.clone(),
            });
        }
    }
    Ok(())
}

/// Calculates message size from field definitions.
///
/// Message size is the maximum of (field offset + field size) across all fields.
pub(crate) fn calculate_message_size(fields: &[Field]) -> usize {
    fields.iter().map(Field::end_offset).max().unwrap_or(0)
}

/// Validates that fields are laid out back to back without overlap.
pub(crate) fn validate_field_layout(message: &str, fields: &[Field]) -> Result<(), LayoutError> {
    let mut expected = 0;
    for field in fields {
        if field.offset != expected {
            return Err(LayoutError::InvalidType {
                context: format!("{}.{}", message, field.name),
                message: format!(
                    "field offset {} does not follow previous field end {}",
                    field.offset, expected
                ),
            });
        }
        expected = field.end_offset();
    }
    Ok(())
}

/// Smallest signed count type holding `capacity`.
pub(crate) fn count_type_for(capacity: usize) -> FieldType {
    if capacity < 128 {
        FieldType::Int8
    } else if capacity < 32768 {
        FieldType::Int16
    } else {
        FieldType::Int32
    }
}

/// Smallest signed tag type for a union with `members` members.
pub(crate) fn tag_type_for(members: usize) -> FieldType {
    count_type_for(members)
}

/// Checks that `value` is representable by the integer type `ty`.
pub(crate) fn fits_integer(ty: &FieldType, value: i128) -> bool {
    match ty.int_range() {
        Some((min, max)) => value >= min && value <= max,
        None => false,
    }
}
