//! Read path: schema and batch metadata of existing Arrow files.

use std::{fs::File, path::Path};

use memmap2::Mmap;

use crate::{
    error::Error,
    flatbuf::read_i32,
    message::{
        Block, FILE_MAGIC, FooterMeta, MessageHeader, MessageMeta, RecordBatchMeta, TAIL_MAGIC,
        decode_footer, decode_message,
    },
    schema::Schema,
};

/// A memory-mapped Arrow file opened for metadata introspection.
///
/// Only the schema and the `RecordBatch`/`DictionaryBatch` metadata are
/// decoded; batch bodies are never read. Truncated files (no footer, no
/// trailing signature) are rejected at open time.
pub struct FileReader {
    map: Mmap,
    footer: FooterMeta,
    footer_pos: usize,
}

impl FileReader {
    /// Map `path` read-only and decode its footer.
    ///
    /// # Errors
    /// Fails on I/O errors, a missing or truncated signature, or corrupt
    /// footer metadata.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and the producer never mutates a
        // finished file in place.
        let map = unsafe { Mmap::map(&file)? };
        let invalid = |message: &str| Error::InvalidFile {
            message: message.to_string(),
        };
        let buf: &[u8] = &map;
        if buf.len() < FILE_MAGIC.len() + TAIL_MAGIC.len() + 4 {
            return Err(invalid("file too short for signatures"));
        }
        if buf[..FILE_MAGIC.len()] != FILE_MAGIC {
            return Err(invalid("missing leading signature"));
        }
        if buf[buf.len() - TAIL_MAGIC.len()..] != TAIL_MAGIC {
            return Err(invalid("missing trailing signature (truncated file?)"));
        }
        let tail = buf.len() - TAIL_MAGIC.len() - 4;
        let footer_len = read_i32(buf, tail)?;
        if footer_len <= 0 {
            return Err(invalid("implausible footer length"));
        }
        let footer_pos = tail
            .checked_sub(footer_len as usize)
            .ok_or_else(|| invalid("footer length exceeds file size"))?;
        let footer = decode_footer(buf, footer_pos)?;
        Ok(Self {
            map,
            footer,
            footer_pos,
        })
    }

    /// The schema recorded in the footer.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.footer.schema
    }

    /// The decoded footer.
    #[must_use]
    pub fn footer(&self) -> &FooterMeta {
        &self.footer
    }

    /// Record batch blocks in emission order.
    #[must_use]
    pub fn record_batches(&self) -> &[Block] {
        &self.footer.record_batches
    }

    /// Dictionary batch blocks (empty for files this crate produces).
    #[must_use]
    pub fn dictionaries(&self) -> &[Block] {
        &self.footer.dictionaries
    }

    /// Decode the `RecordBatch` metadata behind block `index`.
    ///
    /// # Errors
    /// Fails on out-of-range indices, corrupt metadata, or a block that
    /// does not frame a record batch.
    pub fn batch_meta(&self, index: usize) -> Result<RecordBatchMeta, Error> {
        let block = self
            .footer
            .record_batches
            .get(index)
            .ok_or_else(|| Error::Corrupt {
                message: format!(
                    "record batch index {index} out of range ({} blocks)",
                    self.footer.record_batches.len()
                ),
            })?;
        let meta = decode_message(&self.map, block.offset as usize)?;
        match meta.header {
            MessageHeader::RecordBatch(batch) => Ok(batch),
            _ => Err(Error::Corrupt {
                message: format!("block {index} does not frame a record batch"),
            }),
        }
    }

    /// Human-readable rendering of the file: the schema dump followed by
    /// one line per record batch block.
    #[must_use]
    pub fn describe(&self) -> String {
        use std::fmt::Write as _;

        let mut out = self.footer.schema.to_string();
        for (i, block) in self.footer.record_batches.iter().enumerate() {
            let _ = writeln!(
                out,
                "batch {i}: offset {}, metadata {}, body {}",
                block.offset, block.meta_data_length, block.body_length
            );
        }
        out
    }

    /// Iterate the framed messages from the start of the file in order,
    /// using each prelude's metadata and body lengths to advance.
    #[must_use]
    pub fn messages(&self) -> Messages<'_> {
        Messages {
            buf: &self.map[..],
            pos: FILE_MAGIC.len(),
            end: self.footer_pos,
        }
    }
}

/// Iterator over the framed messages of an open file.
///
/// Yields decoded metadata in file order; stops after the first error
/// (a corrupt prelude leaves no way to find the next message).
pub struct Messages<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
}

impl Iterator for Messages<'_> {
    type Item = Result<MessageMeta, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end {
            return None;
        }
        let meta_length = match read_i32(self.buf, self.pos) {
            Ok(v) if v >= 4 => v as usize,
            Ok(v) => {
                self.pos = self.end;
                return Some(Err(Error::Corrupt {
                    message: format!("message prelude claims {v} metadata bytes"),
                }));
            }
            Err(e) => {
                self.pos = self.end;
                return Some(Err(e));
            }
        };
        match decode_message(self.buf, self.pos) {
            Ok(meta) => {
                self.pos += 4 + meta_length + meta.body_length.max(0) as usize;
                Some(Ok(meta))
            }
            Err(e) => {
                self.pos = self.end;
                Some(Err(e))
            }
        }
    }
}
