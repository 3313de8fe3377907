//! Row (de)serializer: walks a tuple's payload against a schema, honoring
//! the null bitmap and the varlena alignment-correction rule.

use crate::bitmap::NullBitmap;
use crate::error::{PgPeekError, Result};
use crate::infomask::InfomaskFlags;
use crate::schema::{Column, Schema};
use crate::tuple::TupleHeader;
use crate::varlena;

/// A single decoded (or to-be-encoded) column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Null,
    Int(i64),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedField {
    pub name: String,
    pub type_tag: String,
    pub value: Field,
    pub is_null: bool,
}

/// Per-attribute null flags derived from the tuple header's bitmap (or
/// all-present, when `HEAP_HASNULL` isn't set).
fn attribute_nulls(header: &TupleHeader, natts: usize) -> Vec<bool> {
    if header.has_nulls() {
        (0..natts).map(|i| header.nullmap.is_null(i)).collect()
    } else {
        vec![false; natts]
    }
}

fn decode_fixed(column: &Column, bytes: &[u8]) -> Field {
    if bytes.is_empty() {
        return Field::Bytes(Vec::new());
    }
    if column.is_parseable() && bytes.len() == column.alignment.width() {
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        let raw = i64::from_le_bytes(buf);
        // sign-extend from the narrower width
        let shift = 64 - bytes.len() * 8;
        let value = (raw << shift) >> shift;
        Field::Int(value)
    } else {
        Field::Bytes(bytes.to_vec())
    }
}

/// Deserialize `payload` into one decoded field per schema column (or a
/// single `raw_data` field in Raw mode).
pub fn deserialize(payload: &[u8], header: &TupleHeader, schema: &Schema) -> Result<Vec<DecodedField>> {
    let columns = match schema {
        Schema::Raw => {
            return Ok(vec![DecodedField {
                name: "raw_data".to_string(),
                type_tag: String::new(),
                value: Field::Bytes(payload.to_vec()),
                is_null: false,
            }])
        }
        Schema::Typed(columns) => columns,
    };

    let is_null = attribute_nulls(header, columns.len());
    let mut out = Vec::with_capacity(columns.len());
    let mut offset = 0usize;

    for i in 0..columns.len() {
        let column = &columns[i];

        let (length, value) = if is_null[i] {
            (0usize, Field::Null)
        } else if column.length > 0 {
            let length = column.length as usize;
            let end = (offset + length).min(payload.len());
            let field_bytes = &payload[offset.min(payload.len())..end];
            (length, decode_fixed(column, field_bytes))
        } else if column.is_varlena() {
            let varlena_field = varlena::decode(&payload[offset..])?;
            let mut length = varlena_field.size;

            if i + 1 < columns.len() {
                let next = &columns[i + 1];
                if varlena::is_1byte_header(payload[offset]) && next.length != -1 && !is_null[i + 1] {
                    let aligned = ((offset + length) + 3) / 4 * 4;
                    length = aligned - offset;
                }
            }

            (length, Field::Bytes(varlena_field.value))
        } else {
            return Err(PgPeekError::UnsupportedFieldType(column.name.clone()));
        };

        out.push(DecodedField {
            name: column.name.clone(),
            type_tag: column.type_tag.clone(),
            value,
            is_null: is_null[i],
        });

        offset += length;
    }

    Ok(out)
}

/// Serialize user-supplied string values (the literal `"NULL"` marks a
/// null field) into a new payload plus an updated tuple header.
pub fn serialize(values: &[String], schema: &Schema, header: &TupleHeader) -> Result<(Vec<u8>, TupleHeader)> {
    let columns = match schema {
        Schema::Typed(columns) => columns,
        Schema::Raw => {
            return Err(PgPeekError::UnsupportedFieldType(
                "raw schema does not support typed updates".to_string(),
            ))
        }
    };

    if values.len() != columns.len() {
        return Err(PgPeekError::SchemaArityMismatch {
            expected: columns.len(),
            actual: values.len(),
        });
    }

    let is_null: Vec<bool> = values.iter().map(|v| v == "NULL").collect();
    let mut payload = Vec::new();

    for i in 0..columns.len() {
        if is_null[i] {
            continue;
        }
        let column = &columns[i];
        let value = &values[i];

        if column.length > 0 {
            let bytes = serialize_fixed(column, value)?;
            payload.extend(bytes);
        } else if column.is_varlena() {
            let varlena_bytes = varlena::encode(value.as_bytes())?;
            let is_1byte = varlena::is_1byte_header(varlena_bytes[0]);
            payload.extend(&varlena_bytes);

            if is_1byte && i + 1 < columns.len() {
                let next = &columns[i + 1];
                if next.length != -1 && !is_null[i + 1] {
                    let aligned = (payload.len() + 3) / 4 * 4;
                    payload.extend(std::iter::repeat(0u8).take(aligned - payload.len()));
                }
            }
        } else {
            return Err(PgPeekError::UnsupportedFieldType(column.name.clone()));
        }
    }

    let mut new_header = header.clone();
    new_header.t_infomask2.natts = columns.len() as u16;

    if is_null.iter().any(|&n| n) {
        new_header.t_infomask |= InfomaskFlags::HEAP_HASNULL;
        new_header.nullmap = NullBitmap::from_null_flags(&is_null);
    } else {
        new_header.t_infomask.remove(InfomaskFlags::HEAP_HASNULL);
        new_header.nullmap = NullBitmap::default();
    }
    new_header.recompute_t_hoff();

    Ok((payload, new_header))
}

fn serialize_fixed(column: &Column, value: &str) -> Result<Vec<u8>> {
    if column.is_parseable() {
        let parsed: i64 = value
            .parse()
            .map_err(|_| PgPeekError::InvalidFieldValue(column.name.clone()))?;
        let width = column.alignment.width();
        let le = parsed.to_le_bytes();
        Ok(le[..width].to_vec())
    } else {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD
            .decode(value)
            .map_err(|_| PgPeekError::UnsupportedFieldType(column.name.clone()))
    }
}
