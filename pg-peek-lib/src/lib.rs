//! On-disk format engine for a single heap relation segment: bit-packed
//! line pointers, the MVCC tuple header, 8 KiB slotted pages, a
//! caller-supplied column schema, and the in-place/HOT-style update
//! algorithm that rewrites a tuple without disturbing the rest of the
//! page.
//!
//! Everything outside this crate (argument parsing, CSV/Base64 I/O,
//! pretty-printing, logging) is a thin collaborator living in the
//! `pg-peek` binary.

pub mod bitmap;
pub mod error;
pub mod infomask;
pub mod itemid;
pub mod itemptr;
pub mod page;
pub mod row;
pub mod schema;
pub mod segment;
pub mod tuple;
pub mod varlena;

pub use error::{PgPeekError, Result};
pub use page::{Page, PageHeader};
pub use row::{DecodedField, Field};
pub use schema::Schema;
pub use segment::{ItemView, Segment, UpdateValue};
