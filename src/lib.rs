#![deny(missing_docs)]
//! Stream PostgreSQL binary result sets into Arrow IPC files.
//!
//! This crate bridges a row-oriented wire protocol and a column-oriented
//! on-disk format. Rows arrive as per-column binary values in network byte
//! order; per-column accumulators transcode them into typed Arrow buffers
//! (null bitmap, fixed-width values, or offsets plus heap) and a batch
//! manager flushes a record batch to disk whenever the accumulated
//! columnar size crosses a threshold. The Arrow IPC metadata — `Schema`,
//! `RecordBatch`, `Footer` — is produced by a small built-in FlatBuffer
//! table builder, and a companion decoder reads schemas and batch metadata
//! back from existing files.
//!
//! Query transport is out of scope: a collaborator issues the query, looks
//! up catalog metadata, and hands over [`SourceColumn`] descriptors plus
//! per-row cells.
//!
//! # Quick start
//!
//! ```
//! use pg_arrow::{FileWriter, Schema, SourceColumn, WriterOptions};
//!
//! let schema = Schema::from_source(&[
//!     SourceColumn::base("id", "int4", 4),
//!     SourceColumn::base("name", "text", -1),
//! ])?;
//!
//! let mut writer = FileWriter::new(Vec::new(), schema, WriterOptions::default())?;
//! writer.append_row(&[Some(7i32.to_be_bytes().as_slice()), Some(b"seven".as_slice())])?;
//! writer.append_row(&[Some(8i32.to_be_bytes().as_slice()), None])?;
//! writer.finish()?;
//!
//! let bytes = writer.into_inner();
//! assert!(bytes.starts_with(b"ARROW1\0\0"));
//! assert!(bytes.ends_with(b"ARROW1"));
//! # Ok::<(), pg_arrow::Error>(())
//! ```
//!
//! Use [`FileWriter::create`] to write straight to a path, and
//! [`FileReader::open`] to introspect an existing file's schema and batch
//! metadata (bodies are never read).

mod buffer;
mod column;
mod error;
mod flatbuf;
mod message;
mod reader;
mod schema;
mod source;
mod types;
mod writer;

pub use buffer::GrowableBuffer;
pub use column::{ColumnBuilder, ColumnStats};
pub use error::Error;
pub use flatbuf::{Table, TableBuilder, Vector};
pub use message::{
    Block, BufferRef, DictionaryBatchMeta, FieldNode, FooterMeta, MessageHeader, MessageMeta,
    RecordBatchMeta, decode_footer, decode_message, encode_dictionary_batch, encode_field,
    encode_footer, encode_message, encode_record_batch, encode_schema, encode_type, finish_root,
    frame_message, header_type, FILE_MAGIC, METADATA_VERSION, TAIL_MAGIC,
};
pub use reader::{FileReader, Messages};
pub use schema::{Field, Schema};
pub use source::{SourceColumn, TypeKind};
pub use types::{ArrowType, DateUnit, IntervalUnit, Precision, TimeUnit, UnionMode};
pub use writer::{DEFAULT_SEGMENT_SIZE, FileWriter, MIN_SEGMENT_SIZE, WriterOptions};
