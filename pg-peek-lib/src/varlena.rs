//! 1-byte and 4-byte inline varlena headers.
//!
//! External (TOAST) and compressed varlena are detected and rejected;
//! decoding them is out of scope.

use crate::error::{PgPeekError, Result};

const VARLENA_1B_HEADER_SIZE: usize = 1;
const VARLENA_1B_MAX_DATA_SIZE: usize = 126;
const VARLENA_4B_HEADER_SIZE: usize = 4;
const VARLENA_4B_MAX_TOTAL_SIZE: u32 = 0x3FFF_FFFF;

/// A decoded varlena value: `size` is the total structure size (header
/// included); `value` is the payload slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varlena {
    pub size: usize,
    pub value: Vec<u8>,
}

/// Examine the first byte of `bytes` and decode the inline varlena value
/// found there.
pub fn decode(bytes: &[u8]) -> Result<Varlena> {
    let va_header = *bytes.first().ok_or(PgPeekError::InvalidVarlenaHeader)?;

    if va_header == 0x01 {
        // VARATT_IS_1B_E
        return Err(PgPeekError::UnsupportedVarlenaKind("external"));
    }
    if va_header & 0x01 == 0x01 {
        // VARATT_IS_1B
        let size = ((va_header >> 1) & 0x7F) as usize;
        if size < VARLENA_1B_HEADER_SIZE || bytes.len() < size {
            return Err(PgPeekError::InvalidVarlenaHeader);
        }
        return Ok(Varlena {
            size,
            value: bytes[VARLENA_1B_HEADER_SIZE..size].to_vec(),
        });
    }
    if va_header & 0x03 == 0x02 {
        // VARATT_IS_4B_C
        return Err(PgPeekError::UnsupportedVarlenaKind("compressed"));
    }
    // va_header & 0x03 == 0x00, VARATT_IS_4B_U
    if bytes.len() < VARLENA_4B_HEADER_SIZE {
        return Err(PgPeekError::InvalidVarlenaHeader);
    }
    let raw = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let size = ((raw >> 2) & 0x3FFF_FFFF) as usize;
    if size < VARLENA_4B_HEADER_SIZE || bytes.len() < size {
        return Err(PgPeekError::InvalidVarlenaHeader);
    }
    Ok(Varlena {
        size,
        value: bytes[VARLENA_4B_HEADER_SIZE..size].to_vec(),
    })
}

/// Encode `payload` as an inline varlena, choosing the 1-byte variant when
/// it fits and the 4-byte variant otherwise.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() < VARLENA_1B_MAX_DATA_SIZE {
        let size = VARLENA_1B_HEADER_SIZE + payload.len();
        let header = ((size as u8) << 1) | 0x01;
        let mut out = Vec::with_capacity(size);
        out.push(header);
        out.extend_from_slice(payload);
        return Ok(out);
    }

    let size = VARLENA_4B_HEADER_SIZE + payload.len();
    if size as u64 > VARLENA_4B_MAX_TOTAL_SIZE as u64 {
        return Err(PgPeekError::VarlenaTooLarge(payload.len()));
    }
    let header = (size as u32) << 2;
    let mut out = Vec::with_capacity(size);
    out.extend_from_slice(&header.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Whether an already-encoded varlena buffer used the 1-byte header
/// variant, needed by the row (de)serializer's alignment-correction rule.
pub fn is_1byte_header(first_byte: u8) -> bool {
    first_byte != 0x01 && first_byte & 0x01 == 0x01
}
