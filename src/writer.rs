//! Arrow IPC file writer: row ingestion, batch flushing, footer.

use std::{fs::File, io::Write, path::Path};

use tracing::{debug, info};

use crate::{
    column::{ColumnBuilder, ColumnStats},
    error::Error,
    message::{
        Block, FILE_MAGIC, TAIL_MAGIC, encode_footer, encode_message, encode_record_batch,
        encode_schema, finish_root, frame_message, header_type,
    },
    schema::Schema,
};

/// Batch flush threshold used when none is configured: 256 MiB.
pub const DEFAULT_SEGMENT_SIZE: usize = 256 * 1024 * 1024;

/// Smallest accepted flush threshold.
pub const MIN_SEGMENT_SIZE: usize = 64 * 1024;

/// Emit an ingestion progress event every this many rows.
const PROGRESS_ROWS: u64 = 100_000;

/// Writer configuration.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Byte threshold that triggers a record batch flush. Defaults to
    /// [`DEFAULT_SEGMENT_SIZE`]; values below [`MIN_SEGMENT_SIZE`] are
    /// rejected. A single row exceeding the threshold fails the run.
    pub segment_size: usize,
    /// Emit periodic `tracing` progress events (`info` level). Has no
    /// effect on the output bytes.
    pub show_progress: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            show_progress: false,
        }
    }
}

/// Streams rows into an Arrow IPC file.
///
/// The writer is single-threaded and cooperative: rows are appended in
/// arrival order, each batch flush is a synchronous write, and the flush
/// boundary is deterministic given the threshold and the row sequence.
/// The signature and schema message are written up front; [`finish`] emits
/// the footer and trailing signature. A file abandoned before [`finish`]
/// has neither and is detectably truncated.
///
/// [`finish`]: FileWriter::finish
#[derive(Debug)]
pub struct FileWriter<W: Write> {
    sink: W,
    pos: u64,
    schema: Schema,
    columns: Vec<ColumnBuilder>,
    record_batches: Vec<Block>,
    dictionaries: Vec<Block>,
    batch_rows: i64,
    total_rows: u64,
    options: WriterOptions,
    finished: bool,
}

impl FileWriter<File> {
    /// Create (or truncate) `path` and write the file prologue.
    ///
    /// # Errors
    /// Fails on I/O errors, a too-small segment size, or a schema the
    /// accumulator has no strategy for.
    pub fn create<P: AsRef<Path>>(
        path: P,
        schema: Schema,
        options: WriterOptions,
    ) -> Result<Self, Error> {
        Self::new(File::create(path)?, schema, options)
    }
}

impl<W: Write> FileWriter<W> {
    /// Wrap `sink` and write the file prologue (signature and schema
    /// message).
    ///
    /// # Errors
    /// Fails on I/O errors, a too-small segment size, or a schema the
    /// accumulator has no strategy for.
    pub fn new(sink: W, schema: Schema, options: WriterOptions) -> Result<Self, Error> {
        if options.segment_size < MIN_SEGMENT_SIZE {
            return Err(Error::SegmentTooSmall {
                got: options.segment_size,
                min: MIN_SEGMENT_SIZE,
            });
        }
        let columns = schema
            .fields
            .iter()
            .map(ColumnBuilder::new)
            .collect::<Result<Vec<_>, _>>()?;
        let mut writer = Self {
            sink,
            pos: 0,
            schema,
            columns,
            record_batches: Vec::new(),
            dictionaries: Vec::new(),
            batch_rows: 0,
            total_rows: 0,
            options,
            finished: false,
        };
        writer.write(&FILE_MAGIC)?;
        let schema_msg = frame_message(encode_message(
            header_type::SCHEMA,
            encode_schema(&writer.schema),
            0,
        ));
        writer.write(&schema_msg)?;
        Ok(writer)
    }

    /// The schema this writer was built from.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Rows appended so far, across all batches.
    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.total_rows
    }

    /// Batch-local min/max statistics for top-level column `i`.
    ///
    /// # Panics
    /// Panics if `i` is out of range.
    #[must_use]
    pub fn column_stats(&self, i: usize) -> &ColumnStats {
        self.columns[i].stats()
    }

    /// Append one row. Cells are per-column binary values in network byte
    /// order; `None` is null. When the accumulated columnar size crosses
    /// the threshold, the current batch is flushed and the row becomes row
    /// zero of the next batch.
    ///
    /// # Errors
    /// Fails on arity mismatches, value transcoding errors, rows larger
    /// than the batch threshold, and I/O errors.
    pub fn append_row(&mut self, cells: &[Option<&[u8]>]) -> Result<(), Error> {
        if cells.len() != self.columns.len() {
            return Err(Error::ArityMismatch {
                expected: self.columns.len(),
                got: cells.len(),
            });
        }
        let size = self.stage_row(cells)?;
        if size > self.options.segment_size {
            if self.batch_rows == 0 {
                return Err(Error::RowTooLarge {
                    size,
                    limit: self.options.segment_size,
                });
            }
            for column in &mut self.columns {
                column.unwind();
            }
            self.flush()?;
            let size = self.stage_row(cells)?;
            if size > self.options.segment_size {
                return Err(Error::RowTooLarge {
                    size,
                    limit: self.options.segment_size,
                });
            }
        }
        for column in &mut self.columns {
            column.commit();
        }
        self.batch_rows += 1;
        self.total_rows += 1;
        if self.options.show_progress && self.total_rows % PROGRESS_ROWS == 0 {
            info!(rows = self.total_rows, "ingesting rows");
        }
        Ok(())
    }

    fn stage_row(&mut self, cells: &[Option<&[u8]>]) -> Result<usize, Error> {
        let mut size = 0usize;
        for (column, cell) in self.columns.iter_mut().zip(cells) {
            size += column.append(*cell)?;
        }
        Ok(size)
    }

    /// Emit the pending rows as a record batch. A no-op when the batch is
    /// empty; called automatically at the threshold and from [`finish`].
    ///
    /// [`finish`]: FileWriter::finish
    ///
    /// # Errors
    /// Fails on I/O errors.
    pub fn flush(&mut self) -> Result<(), Error> {
        if self.batch_rows == 0 {
            return Ok(());
        }
        let rows = self.batch_rows;
        let mut nodes = Vec::new();
        let mut buffers = Vec::new();
        let mut body_length = 0i64;
        for column in &self.columns {
            column.field_nodes(rows, &mut nodes);
        }
        for column in &self.columns {
            column.buffers(rows, &mut body_length, &mut buffers);
        }
        let message = frame_message(encode_message(
            header_type::RECORD_BATCH,
            encode_record_batch(rows, &nodes, &buffers),
            body_length,
        ));
        let offset = self.pos as i64;
        self.write(&message)?;
        let mut written = 0u64;
        for column in &self.columns {
            written += column.write_body(rows, &mut self.sink)?;
        }
        self.pos += written;
        debug_assert_eq!(written as i64, body_length);
        self.record_batches.push(Block {
            offset,
            meta_data_length: message.len() as i32,
            body_length,
        });
        for column in &mut self.columns {
            column.clear();
        }
        self.batch_rows = 0;
        debug!(
            rows,
            body = body_length,
            offset,
            "flushed record batch"
        );
        if self.options.show_progress {
            info!(
                batches = self.record_batches.len(),
                rows = self.total_rows,
                "wrote record batch"
            );
        }
        Ok(())
    }

    /// Flush pending rows, then write the footer listing every block, the
    /// footer metadata length, and the trailing signature.
    ///
    /// # Errors
    /// Fails on I/O errors. Calling `finish` twice is a no-op.
    pub fn finish(&mut self) -> Result<(), Error> {
        if self.finished {
            return Ok(());
        }
        self.flush()?;
        let footer = finish_root(encode_footer(
            &self.schema,
            &self.dictionaries,
            &self.record_batches,
        ));
        self.write(&footer)?;
        self.write(&(footer.len() as i32).to_le_bytes())?;
        self.write(&TAIL_MAGIC)?;
        self.sink.flush()?;
        self.finished = true;
        debug!(
            batches = self.record_batches.len(),
            rows = self.total_rows,
            bytes = self.pos,
            "finished arrow file"
        );
        Ok(())
    }

    /// Consume the writer and return the sink.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.sink.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }
}
