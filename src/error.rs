//! Error types for schema derivation, row ingestion, and file decoding.

use thiserror::Error;

/// Errors reported while deriving schemas, accumulating rows, or decoding
/// Arrow files.
///
/// The writer has no partial-commit story: callers are expected to treat any
/// error as fatal for the whole run. A file left behind after an error is
/// detectably truncated (no footer, no trailing signature).
#[derive(Debug, Error)]
pub enum Error {
    /// The number of cells in a row did not match the schema width.
    #[error("row length {got} does not match schema width {expected}")]
    ArityMismatch {
        /// Expected number of columns (schema width).
        expected: usize,
        /// Actual number of cells present in the provided row.
        got: usize,
    },

    /// A source column's type has no Arrow mapping.
    #[error("column {column}: no Arrow mapping for source type {namespace}.{typename}")]
    UnsupportedType {
        /// Name of the offending column.
        column: String,
        /// Source type namespace (e.g. `pg_catalog`).
        namespace: String,
        /// Source type name.
        typename: String,
    },

    /// A mapped type is recognized but its values cannot be accumulated yet.
    #[error("column {column}: {what} are not supported yet")]
    Unsupported {
        /// Name of the offending column.
        column: String,
        /// What exactly is unsupported (e.g. "list values").
        what: String,
    },

    /// A fixed-width value arrived with the wrong number of bytes.
    ///
    /// This indicates data corruption on the wire, not a recoverable
    /// condition.
    #[error("column {column}: value length {got} does not match fixed width {expected}")]
    ValueSizeMismatch {
        /// Name of the offending column.
        column: String,
        /// Width the column's type dictates.
        expected: usize,
        /// Bytes actually received.
        got: usize,
    },

    /// A numeric value is NaN; Arrow `Decimal` has no NaN representation.
    #[error("column {column}: numeric NaN has no Decimal representation")]
    DecimalNan {
        /// Name of the offending column.
        column: String,
    },

    /// A numeric value does not fit into a 128-bit decimal.
    #[error("column {column}: numeric value does not fit in a 128-bit decimal")]
    DecimalOverflow {
        /// Name of the offending column.
        column: String,
    },

    /// A value payload is internally inconsistent (composite field count or
    /// length disagreement, out-of-range base-10000 digit, short header).
    #[error("column {column}: corrupt value: {message}")]
    CorruptValue {
        /// Name of the offending column.
        column: String,
        /// What disagreed with the wire format.
        message: String,
    },

    /// A single batch accumulated more variable-length bytes than a 32-bit
    /// offset can address.
    #[error("column {column}: variable-length heap exceeds 2 GiB in a single batch")]
    HeapOverflow {
        /// Name of the offending column.
        column: String,
    },

    /// A single row's accumulated size exceeds the record batch threshold.
    #[error("row of {size} bytes is larger than the record batch limit of {limit} bytes")]
    RowTooLarge {
        /// 64-byte-aligned size the row occupies across all column buffers.
        size: usize,
        /// Configured `segment_size`.
        limit: usize,
    },

    /// The configured segment size is below the supported minimum.
    #[error("segment size {got} is below the minimum of {min} bytes")]
    SegmentTooSmall {
        /// Configured value.
        got: usize,
        /// Smallest accepted value.
        min: usize,
    },

    /// The input is not an Arrow file (bad signature, missing tail, or an
    /// impossible footer length).
    #[error("not an Arrow file: {message}")]
    InvalidFile {
        /// What failed to verify.
        message: String,
    },

    /// FlatBuffer metadata could not be resolved (offset outside the buffer,
    /// malformed vtable, non-UTF-8 string).
    #[error("corrupt flatbuffer metadata: {message}")]
    Corrupt {
        /// What failed to resolve.
        message: String,
    },

    /// A message carries a header this crate refuses to read
    /// (`Tensor`/`SparseTensor`) or an unknown header tag.
    #[error("unsupported message header type {0}")]
    UnsupportedHeader(u8),

    /// An I/O error from the underlying sink or mapping.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
