use thiserror::Error;

/// Every failure mode the core format engine can report.
#[derive(Debug, Error)]
pub enum PgPeekError {
    #[error("supplied path is invalid: {0}")]
    InvalidPath(String),

    #[error("i/o error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("page declared length {declared} does not match produced length {produced}")]
    PageLengthMismatch { declared: usize, produced: usize },

    #[error("page geometry invariant violated: {0}")]
    PageGeometryInvariantViolated(String),

    #[error("invalid line pointer flag bits: {0:#x}")]
    InvalidLinePointerFlag(u8),

    #[error("invalid page version byte: {0:#x}")]
    InvalidPdVersion(u8),

    #[error("unsupported varlena kind: {0}")]
    UnsupportedVarlenaKind(&'static str),

    #[error("invalid varlena header")]
    InvalidVarlenaHeader,

    #[error("schema expects {expected} column(s), got {actual}")]
    SchemaArityMismatch { expected: usize, actual: usize },

    #[error("invalid schema CSV record: {0}")]
    InvalidSchemaCsv(String),

    #[error("invalid alignment code: {0:?}")]
    InvalidAlignmentCode(String),

    #[error("field {0:?} has an unsupported type and its value is not valid Base64")]
    UnsupportedFieldType(String),

    #[error("field {0:?} value could not be parsed as the expected type")]
    InvalidFieldValue(String),

    #[error("varlena value of {0} bytes exceeds the largest supported variant")]
    VarlenaTooLarge(usize),

    #[error("no such page: {0}")]
    NoSuchPage(usize),

    #[error("no such item: page {page}, item {item}")]
    NoSuchItem { page: usize, item: usize },
}

pub type Result<T> = std::result::Result<T, PgPeekError>;
