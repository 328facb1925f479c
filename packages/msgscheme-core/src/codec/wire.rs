//! Little-endian scalar access on raw buffers.

use crate::error::CodecError;
use crate::scheme::FieldType;

/// Returns `data[pos..pos + len]` or a `Truncated` error naming `field`.
pub(crate) fn slice<'a>(
    data: &'a [u8],
    pos: usize,
    len: usize,
    field: &str,
) -> Result<&'a [u8], CodecError> {
    let end = pos.checked_add(len).ok_or_else(|| CodecError::Malformed {
        field: field.to_string(),
        reason: "position overflow".to_string(),
    })?;
    data.get(pos..end).ok_or_else(|| CodecError::Truncated {
        field: field.to_string(),
        need: end,
        have: data.len(),
    })
}

/// Reads an unsigned little-endian integer of `size` bytes (at most 8).
pub(crate) fn read_uint(data: &[u8], pos: usize, size: usize, field: &str) -> Result<u64, CodecError> {
    let bytes = slice(data, pos, size, field)?;
    let mut raw = [0u8; 8];
    raw[..size].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(raw))
}

/// Reads a signed little-endian integer of `size` bytes, sign extended.
pub(crate) fn read_int(data: &[u8], pos: usize, size: usize, field: &str) -> Result<i64, CodecError> {
    let raw = read_uint(data, pos, size, field)?;
    if size >= 8 {
        return Ok(raw as i64);
    }
    let shift = 64 - size * 8;
    Ok(((raw << shift) as i64) >> shift)
}

/// Reads an array count prefix or union tag of integer type `ty`.
pub(crate) fn read_count(data: &[u8], pos: usize, ty: &FieldType, field: &str) -> Result<i128, CodecError> {
    let size = ty.scalar_size().unwrap_or(0);
    if ty.is_unsigned() {
        read_uint(data, pos, size, field).map(i128::from)
    } else {
        read_int(data, pos, size, field).map(i128::from)
    }
}

pub(crate) fn read_u128(data: &[u8], pos: usize, field: &str) -> Result<u128, CodecError> {
    let bytes = slice(data, pos, 16, field)?;
    let mut raw = [0u8; 16];
    raw.copy_from_slice(bytes);
    Ok(u128::from_le_bytes(raw))
}

pub(crate) fn read_f64(data: &[u8], pos: usize, field: &str) -> Result<f64, CodecError> {
    read_uint(data, pos, 8, field).map(f64::from_bits)
}

/// Writes the low `size` bytes of `value` in little-endian order.
///
/// The caller guarantees that the buffer holds `pos + size` bytes.
pub(crate) fn write_uint(buf: &mut [u8], pos: usize, size: usize, value: u64) {
    buf[pos..pos + size].copy_from_slice(&value.to_le_bytes()[..size]);
}

pub(crate) fn write_u128(buf: &mut [u8], pos: usize, value: u128) {
    buf[pos..pos + 16].copy_from_slice(&value.to_le_bytes());
}

/// Tests bit `bit` of a little-endian bit map.
pub(crate) fn bit_is_set(map: &[u8], bit: u32) -> bool {
    map.get(bit as usize / 8)
        .is_some_and(|byte| (byte >> (bit % 8)) & 1 == 1)
}

/// Sets bit `bit` of a little-endian bit map.
pub(crate) fn set_bit(map: &mut [u8], bit: u32) {
    if let Some(byte) = map.get_mut(bit as usize / 8) {
        *byte |= 1 << (bit % 8);
    }
}
