//! Column-definition schema, parsed from a semicolon-separated list of
//! comma-separated `name,type,length,alignment` quadruples.

use crate::error::{PgPeekError, Result};

/// Internal system attributes dropped when a schema is parsed.
const INTERNAL_ATTRS: [&str; 6] = ["tableoid", "ctid", "xmin", "xmax", "cmin", "cmax"];

/// Column type tags eligible for little-endian integer decoding in the
/// row (de)serializer; anything else is treated as an opaque byte string.
pub const PARSEABLE_TYPES: [&str; 15] = [
    "oid",
    "int",
    "int2",
    "int4",
    "int8",
    "bool",
    "date",
    "timetz",
    "timestamptz",
    "time",
    "timestamp",
    "serial",
    "serial2",
    "serial4",
    "serial8",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Char,
    Short,
    Int,
    Double,
}

impl Alignment {
    pub fn width(self) -> usize {
        match self {
            Alignment::Char => 1,
            Alignment::Short => 2,
            Alignment::Int => 4,
            Alignment::Double => 8,
        }
    }

    fn from_code(code: &str) -> Result<Self> {
        match code {
            "c" => Ok(Alignment::Char),
            "s" => Ok(Alignment::Short),
            "i" => Ok(Alignment::Int),
            "d" => Ok(Alignment::Double),
            other => Err(PgPeekError::InvalidAlignmentCode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub type_tag: String,
    /// Positive: fixed width in bytes. -1: varlena.
    pub length: i32,
    pub alignment: Alignment,
}

impl Column {
    pub fn is_varlena(&self) -> bool {
        self.length == -1
    }

    pub fn is_parseable(&self) -> bool {
        PARSEABLE_TYPES.contains(&self.type_tag.as_str())
    }
}

/// Whether the editor knows a column schema for the relation (`Typed`) or
/// treats every tuple payload as an opaque byte string (`Raw`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    Typed(Vec<Column>),
    Raw,
}

impl Schema {
    pub fn raw() -> Self {
        Schema::Raw
    }

    /// Parse a `name,type,length,alignment` quadruple list separated by
    /// `;`, dropping internal attribute columns.
    pub fn parse_csv(csv_str: &str) -> Result<Self> {
        let mut columns = Vec::new();
        for record in csv_str.split(';') {
            if record.trim().is_empty() {
                continue;
            }
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .from_reader(record.as_bytes());
            let row = reader
                .records()
                .next()
                .ok_or_else(|| PgPeekError::InvalidSchemaCsv(record.to_string()))?
                .map_err(|e| PgPeekError::InvalidSchemaCsv(e.to_string()))?;

            if row.len() != 4 {
                return Err(PgPeekError::InvalidSchemaCsv(format!(
                    "expected 4 fields, got {}: {record}",
                    row.len()
                )));
            }
            let name = row[0].to_string();
            let type_tag = row[1].to_string();
            let length: i32 = row[2]
                .parse()
                .map_err(|_| PgPeekError::InvalidSchemaCsv(format!("bad length in {record}")))?;
            let alignment = Alignment::from_code(&row[3])?;

            if INTERNAL_ATTRS.contains(&name.as_str()) {
                continue;
            }

            columns.push(Column {
                name,
                type_tag,
                length,
                alignment,
            });
        }
        Ok(Schema::Typed(columns))
    }

    pub fn column_count(&self) -> usize {
        match self {
            Schema::Typed(columns) => columns.len(),
            Schema::Raw => 1,
        }
    }

    pub fn columns(&self) -> &[Column] {
        match self {
            Schema::Typed(columns) => columns,
            Schema::Raw => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quadruples_and_drops_internal_attrs() {
        let csv = "tableoid,oid,4,i;id,int4,4,i;name,varchar,-1,i";
        let schema = Schema::parse_csv(csv).unwrap();
        match schema {
            Schema::Typed(columns) => {
                assert_eq!(columns.len(), 2);
                assert_eq!(columns[0].name, "id");
                assert_eq!(columns[1].name, "name");
                assert!(columns[1].is_varlena());
            }
            Schema::Raw => panic!("expected typed schema"),
        }
    }

    #[test]
    fn four_column_schema_with_varlenas_parses() {
        let csv = "id,int4,4,i;name,varchar,-1,i;age,int4,4,i;city,varchar,-1,i";
        let schema = Schema::parse_csv(csv).unwrap();
        assert_eq!(schema.column_count(), 4);
    }
}
