//! Offset pointer words.
//!
//! An offset pointer locates a list in the variable length tail of a
//! buffer. Offsets are relative to the position of the pointer word, the
//! empty list is the all-zero word.

use crate::error::CodecError;
use crate::scheme::PtrVersion;

use super::wire::{read_uint, slice, write_uint};

/// Entity byte marking an entity size stored in front of the data.
const ENTITY_EXTERNAL: u64 = 0xff;
const DEFAULT_COUNT_MAX: usize = 0x00ff_ffff;

/// Decoded list location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ListRegion {
    /// Absolute position of the first element
    pub start: usize,
    /// Number of elements
    pub count: usize,
    /// Distance between elements, at least the compiled element size
    pub stride: usize,
}

impl ListRegion {
    pub const EMPTY: ListRegion = ListRegion {
        start: 0,
        count: 0,
        stride: 0,
    };

    pub fn element(&self, index: usize) -> usize {
        self.start + index * self.stride
    }
}

/// Number of bytes reserved in front of the elements for this version and entity size.
pub(crate) fn prefix_size(version: PtrVersion, entity: usize) -> usize {
    match version {
        PtrVersion::Default if entity as u64 >= ENTITY_EXTERNAL => 4,
        _ => 0,
    }
}

/// Writes a pointer word.
///
/// # Arguments
/// * `buf` - Output buffer, already holding the pointer word and the data region
/// * `pos` - Absolute position of the pointer word
/// * `data` - Absolute position of the data region (including any entity prefix)
/// * `count` - Number of elements
/// * `entity` - Element size in bytes
/// * `field` - Field name for error reporting
pub(crate) fn write(
    buf: &mut [u8],
    version: PtrVersion,
    pos: usize,
    data: usize,
    count: usize,
    entity: usize,
    field: &str,
) -> Result<(), CodecError> {
    if count == 0 {
        write_uint(buf, pos, version.size(), 0);
        return Ok(());
    }
    let offset = data - pos;
    let overflow = |what: &str, value: usize| CodecError::Overflow {
        field: field.to_string(),
        value: value.to_string(),
        target: format!("{} pointer {}", version, what),
    };
    match version {
        PtrVersion::Default => {
            let offset = u32::try_from(offset).map_err(|_| overflow("offset", offset))?;
            if count > DEFAULT_COUNT_MAX {
                return Err(overflow("count", count));
            }
            let entity_byte = (entity as u64).min(ENTITY_EXTERNAL);
            if entity_byte == ENTITY_EXTERNAL {
                let entity = u32::try_from(entity).map_err(|_| overflow("entity", entity))?;
                write_uint(buf, data, 4, entity as u64);
            }
            write_uint(buf, pos, 4, offset as u64);
            write_uint(buf, pos + 4, 4, count as u64 | entity_byte << 24);
        }
        PtrVersion::LegacyShort => {
            let offset = u16::try_from(offset).map_err(|_| overflow("offset", offset))?;
            let count = u16::try_from(count).map_err(|_| overflow("count", count))?;
            write_uint(buf, pos, 2, offset as u64);
            write_uint(buf, pos + 2, 2, count as u64);
        }
        PtrVersion::LegacyLong => {
            let offset = u32::try_from(offset).map_err(|_| overflow("offset", offset))?;
            let count = u32::try_from(count).map_err(|_| overflow("count", count))?;
            write_uint(buf, pos, 4, offset as u64);
            write_uint(buf, pos + 4, 4, count as u64);
        }
    }
    Ok(())
}

/// Reads a pointer word and checks that the whole region lies inside `data`.
///
/// # Arguments
/// * `data` - Whole message buffer
/// * `pos` - Absolute position of the pointer word
/// * `element_size` - Compiled size of one element
/// * `field` - Field name for error reporting
///
/// # Returns
/// `Truncated` when the word or the region ends past the buffer, `Malformed`
/// for inconsistent words (zero offset with elements, entity smaller than
/// the element, arithmetic overflow).
pub(crate) fn read(
    data: &[u8],
    version: PtrVersion,
    pos: usize,
    element_size: usize,
    field: &str,
) -> Result<ListRegion, CodecError> {
    let malformed = |reason: &str| CodecError::Malformed {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let (offset, count, entity) = match version {
        PtrVersion::Default => {
            let offset = read_uint(data, pos, 4, field)?;
            let word = read_uint(data, pos + 4, 4, field)?;
            (offset, word & DEFAULT_COUNT_MAX as u64, Some(word >> 24))
        }
        PtrVersion::LegacyShort => (
            read_uint(data, pos, 2, field)?,
            read_uint(data, pos + 2, 2, field)?,
            None,
        ),
        PtrVersion::LegacyLong => (
            read_uint(data, pos, 4, field)?,
            read_uint(data, pos + 4, 4, field)?,
            None,
        ),
    };
    if count == 0 {
        return Ok(ListRegion::EMPTY);
    }
    if offset == 0 {
        return Err(malformed("zero offset for non-empty list"));
    }

    let mut start = pos
        .checked_add(offset as usize)
        .ok_or_else(|| malformed("offset overflow"))?;
    let stride = match entity {
        Some(ENTITY_EXTERNAL) => {
            let entity = read_uint(data, start, 4, field)? as usize;
            start += 4;
            entity
        }
        Some(entity) => entity as usize,
        None => element_size,
    };
    if stride < element_size {
        return Err(malformed(&format!(
            "entity size {} smaller than element size {}",
            stride, element_size
        )));
    }

    let count = count as usize;
    let len = stride
        .checked_mul(count)
        .ok_or_else(|| malformed("list size overflow"))?;
    slice(data, start, len, field)?;
    Ok(ListRegion {
        start,
        count,
        stride,
    })
}
