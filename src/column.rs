//! Per-column accumulators: wire values in, Arrow buffers out.
//!
//! Values arrive in network byte order and are transcoded at append time
//! (byteswap, epoch rebase, base-10000 decimal assembly); the body writer
//! only ever streams finished little-endian buffers.
//!
//! Appends are speculative: [`ColumnBuilder::append`] stages the row and
//! returns a size estimate, and the batch manager either [`commit`]s it
//! (null count and statistics become visible) or [`unwind`]s it back to the
//! pre-append buffer marks when the row has to move to the next batch.
//!
//! [`commit`]: ColumnBuilder::commit
//! [`unwind`]: ColumnBuilder::unwind

use std::io::Write;

use crate::{
    buffer::GrowableBuffer,
    error::Error,
    flatbuf::align_up,
    message::{BufferRef, FieldNode},
    schema::Field,
    types::{ArrowType, Precision},
};

/// Days between the UNIX epoch (1970-01-01) and the source epoch
/// (2000-01-01): `POSTGRES_EPOCH_JDATE - UNIX_EPOCH_JDATE`.
const EPOCH_OFFSET_DAYS: i64 = 10_957;

/// Microseconds per day, for rebasing timestamps.
const MICROS_PER_DAY: i64 = 86_400_000_000;

const NUMERIC_SIGN_POS: u16 = 0x0000;
const NUMERIC_SIGN_NEG: u16 = 0x4000;
const NUMERIC_SIGN_NAN: u16 = 0xC000;

const ZEROS: [u8; 64] = [0; 64];

/// Physical append strategy for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    /// Fixed-width value of 1, 2, 4, or 8 bytes, byteswapped to host order.
    Fixed { width: usize },
    /// 32-bit day count rebased from the source epoch.
    Date,
    /// 64-bit microsecond count rebased from the source epoch.
    Timestamp,
    /// Base-10000 numeric assembled into a 128-bit scaled integer.
    Decimal { scale: i32 },
    /// Offsets + heap pair for Utf8/Binary.
    Varlena,
    /// Null bitmap only; members live in child columns.
    Struct,
    /// Recognized at schema time; values cannot be accumulated yet.
    List,
}

/// Running min/max over committed non-null values.
///
/// Maintained per batch and reset at flush; not yet serialized into the
/// file (reserved for per-field custom metadata).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnStats {
    /// No ordering is tracked for this column's type.
    None,
    /// Signed-integer-valued columns, including date/time/timestamp.
    Int {
        /// Smallest committed value; meaningless until `seen`.
        min: i64,
        /// Largest committed value; meaningless until `seen`.
        max: i64,
        /// Whether any non-null value has been committed this batch.
        seen: bool,
    },
    /// Floating-point columns.
    Float {
        /// Smallest committed value; meaningless until `seen`.
        min: f64,
        /// Largest committed value; meaningless until `seen`.
        max: f64,
        /// Whether any non-null value has been committed this batch.
        seen: bool,
    },
}

impl ColumnStats {
    fn reset(&mut self) {
        match self {
            ColumnStats::None => {}
            ColumnStats::Int { seen, .. } | ColumnStats::Float { seen, .. } => *seen = false,
        }
    }

    fn update(&mut self, sample: StatSample) {
        match (self, sample) {
            (ColumnStats::Int { min, max, seen }, StatSample::Int(v)) => {
                if !*seen || v < *min {
                    *min = v;
                }
                if !*seen || v > *max {
                    *max = v;
                }
                *seen = true;
            }
            (ColumnStats::Float { min, max, seen }, StatSample::Float(v)) => {
                if !*seen || v < *min {
                    *min = v;
                }
                if !*seen || v > *max {
                    *max = v;
                }
                *seen = true;
            }
            _ => unreachable!("stat sample kind always matches the column stats kind"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StatSample {
    Int(i64),
    Float(f64),
}

/// Pre-append marks for the staged row.
#[derive(Debug, Clone, Copy)]
struct Staged {
    values_len: usize,
    extra_len: usize,
    is_null: bool,
    stat: Option<StatSample>,
}

/// Accumulates one column's rows into Arrow buffers.
#[derive(Debug)]
pub struct ColumnBuilder {
    name: String,
    kind: ColumnKind,
    nullmap: GrowableBuffer,
    values: GrowableBuffer,
    extra: GrowableBuffer,
    /// Committed rows this batch.
    rows: i64,
    /// Nulls among the committed rows.
    null_count: i64,
    stats: ColumnStats,
    staged: Option<Staged>,
    children: Vec<ColumnBuilder>,
}

impl ColumnBuilder {
    /// Create an accumulator for `field`, recursing into struct members.
    ///
    /// # Errors
    /// Returns [`Error::Unsupported`] for logical types the accumulator has
    /// no strategy for (unions, maps, fixed-size shapes).
    pub fn new(field: &Field) -> Result<ColumnBuilder, Error> {
        let (kind, stats) = match &field.data_type {
            ArrowType::Bool => (ColumnKind::Fixed { width: 1 }, ColumnStats::None),
            ArrowType::Int { bit_width, signed } => (
                ColumnKind::Fixed {
                    width: *bit_width as usize / 8,
                },
                if *signed {
                    ColumnStats::Int {
                        min: 0,
                        max: 0,
                        seen: false,
                    }
                } else {
                    ColumnStats::None
                },
            ),
            ArrowType::FloatingPoint { precision } => (
                ColumnKind::Fixed {
                    width: match precision {
                        Precision::Half => 2,
                        Precision::Single => 4,
                        Precision::Double => 8,
                    },
                },
                match precision {
                    // No f16 arithmetic; half floats go untracked.
                    Precision::Half => ColumnStats::None,
                    _ => ColumnStats::Float {
                        min: 0.0,
                        max: 0.0,
                        seen: false,
                    },
                },
            ),
            ArrowType::Decimal { scale, .. } => {
                (ColumnKind::Decimal { scale: *scale }, ColumnStats::None)
            }
            ArrowType::Date { .. } | ArrowType::Time { .. } | ArrowType::Timestamp { .. } => {
                let kind = match &field.data_type {
                    ArrowType::Date { .. } => ColumnKind::Date,
                    ArrowType::Timestamp { .. } => ColumnKind::Timestamp,
                    _ => ColumnKind::Fixed { width: 8 },
                };
                (
                    kind,
                    ColumnStats::Int {
                        min: 0,
                        max: 0,
                        seen: false,
                    },
                )
            }
            ArrowType::Utf8 | ArrowType::Binary => (ColumnKind::Varlena, ColumnStats::None),
            ArrowType::Struct => (ColumnKind::Struct, ColumnStats::None),
            ArrowType::List => (ColumnKind::List, ColumnStats::None),
            other => {
                return Err(Error::Unsupported {
                    column: field.name.clone(),
                    what: format!("{other} columns"),
                });
            }
        };
        let children = field
            .children
            .iter()
            .map(ColumnBuilder::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ColumnBuilder {
            name: field.name.clone(),
            kind,
            nullmap: GrowableBuffer::new(),
            values: GrowableBuffer::new(),
            extra: GrowableBuffer::new(),
            rows: 0,
            null_count: 0,
            stats,
            staged: None,
            children,
        })
    }

    /// Column name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Batch-local min/max statistics over committed rows.
    #[must_use]
    pub fn stats(&self) -> &ColumnStats {
        &self.stats
    }

    /// Stage a value (`None` = null) for the next row slot and return the
    /// column's 64-byte-aligned size estimate including the staged bytes.
    ///
    /// The row is not part of the batch until [`ColumnBuilder::commit`];
    /// [`ColumnBuilder::unwind`] takes it back out.
    ///
    /// # Errors
    /// Fails on width disagreements, malformed composite or numeric
    /// payloads, NaN decimals, and list values.
    pub fn append(&mut self, value: Option<&[u8]>) -> Result<usize, Error> {
        debug_assert!(self.staged.is_none(), "append while a row is staged");
        let slot = self.rows as usize;
        let mut staged = Staged {
            values_len: self.values.len(),
            extra_len: self.extra.len(),
            is_null: value.is_none(),
            stat: None,
        };
        match value {
            None => {
                self.nullmap.clear_bit(slot);
                self.append_null()?;
            }
            Some(bytes) => {
                self.nullmap.set_bit(slot);
                staged.stat = self.append_value(bytes)?;
            }
        }
        self.staged = Some(staged);
        Ok(self.size_estimate())
    }

    /// Make the staged row part of the batch: fold in the null count and
    /// statistics, advance the committed row count.
    pub fn commit(&mut self) {
        let Some(staged) = self.staged.take() else {
            return;
        };
        if staged.is_null {
            self.null_count += 1;
        } else if let Some(sample) = staged.stat {
            self.stats.update(sample);
        }
        self.rows += 1;
        for child in &mut self.children {
            child.commit();
        }
    }

    /// Take the staged row back out: truncate `values`/`extra` to their
    /// pre-append marks (rewinding the trailing varlena offset) and clear
    /// the staged null bit. `null_count` was never touched.
    pub fn unwind(&mut self) {
        let Some(staged) = self.staged.take() else {
            return;
        };
        self.values.truncate(staged.values_len);
        self.extra.truncate(staged.extra_len);
        self.nullmap.clear_bit(self.rows as usize);
        for child in &mut self.children {
            child.unwind();
        }
    }

    /// Reset for the next batch, retaining buffer capacity.
    pub fn clear(&mut self) {
        self.nullmap.clear();
        self.values.clear();
        self.extra.clear();
        self.rows = 0;
        self.null_count = 0;
        self.stats.reset();
        self.staged = None;
        for child in &mut self.children {
            child.clear();
        }
    }

    /// Sum of 64-byte-aligned buffer sizes currently in use, including any
    /// staged bytes and recursing into children. The nullmap contributes
    /// only once the column has committed nulls.
    #[must_use]
    pub fn size_estimate(&self) -> usize {
        let rows = self.rows + i64::from(self.staged.is_some());
        let mut total = align_up(self.values.len(), 64) + align_up(self.extra.len(), 64);
        if self.null_count > 0 {
            total += align_up(((rows + 7) / 8) as usize, 64);
        }
        for child in &self.children {
            total += child.size_estimate();
        }
        total
    }

    fn append_null(&mut self) -> Result<(), Error> {
        match self.kind {
            ColumnKind::Fixed { width } => self.values.append_zero(width),
            ColumnKind::Date => self.values.append_zero(4),
            ColumnKind::Timestamp => self.values.append_zero(8),
            ColumnKind::Decimal { .. } => self.values.append_zero(16),
            ColumnKind::Varlena => self.append_varlena_offset()?,
            ColumnKind::Struct => {
                for child in &mut self.children {
                    child.append(None)?;
                }
            }
            ColumnKind::List => {
                return Err(Error::Unsupported {
                    column: self.name.clone(),
                    what: "list values".to_string(),
                });
            }
        }
        Ok(())
    }

    fn append_value(&mut self, bytes: &[u8]) -> Result<Option<StatSample>, Error> {
        let sample = match self.kind {
            ColumnKind::Fixed { width } => {
                self.check_width(bytes, width)?;
                match width {
                    1 => {
                        self.values.append(bytes);
                        StatSample::Int(i64::from(bytes[0] as i8))
                    }
                    2 => {
                        let v = i16::from_be_bytes([bytes[0], bytes[1]]);
                        self.values.append(&v.to_le_bytes());
                        StatSample::Int(i64::from(v))
                    }
                    4 => {
                        let v = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                        self.values.append(&v.to_le_bytes());
                        if matches!(self.stats, ColumnStats::Float { .. }) {
                            StatSample::Float(f64::from(f32::from_bits(v as u32)))
                        } else {
                            StatSample::Int(i64::from(v))
                        }
                    }
                    8 => {
                        let v = be_i64(bytes);
                        self.values.append(&v.to_le_bytes());
                        if matches!(self.stats, ColumnStats::Float { .. }) {
                            StatSample::Float(f64::from_bits(v as u64))
                        } else {
                            StatSample::Int(v)
                        }
                    }
                    _ => unreachable!("fixed widths are 1, 2, 4, or 8"),
                }
            }
            ColumnKind::Date => {
                self.check_width(bytes, 4)?;
                let days = i64::from(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
                    + EPOCH_OFFSET_DAYS;
                self.values.append(&(days as i32).to_le_bytes());
                StatSample::Int(days)
            }
            ColumnKind::Timestamp => {
                self.check_width(bytes, 8)?;
                let micros = be_i64(bytes) + EPOCH_OFFSET_DAYS * MICROS_PER_DAY;
                self.values.append(&micros.to_le_bytes());
                StatSample::Int(micros)
            }
            ColumnKind::Decimal { scale } => {
                let v = parse_numeric(&self.name, bytes, scale)?;
                self.values.append(&v.to_le_bytes());
                StatSample::Int(0)
            }
            ColumnKind::Varlena => {
                self.extra.append(bytes);
                self.append_varlena_offset()?;
                StatSample::Int(0)
            }
            ColumnKind::Struct => {
                self.append_composite(bytes)?;
                StatSample::Int(0)
            }
            ColumnKind::List => {
                return Err(Error::Unsupported {
                    column: self.name.clone(),
                    what: "list values".to_string(),
                });
            }
        };
        Ok(match self.stats {
            ColumnStats::None => None,
            _ => Some(sample),
        })
    }

    /// Push the current heap end into the offsets buffer, seeding the
    /// sentinel offset 0 on a batch's first row.
    fn append_varlena_offset(&mut self) -> Result<(), Error> {
        if self.values.is_empty() {
            self.values.append(&0i32.to_le_bytes());
        }
        let end = i32::try_from(self.extra.len()).map_err(|_| Error::HeapOverflow {
            column: self.name.clone(),
        })?;
        self.values.append(&end.to_le_bytes());
        Ok(())
    }

    /// Parse one composite payload: `{int32 nfields, nfields × {u32 oid,
    /// int32 len | -1, bytes}}`. Members past the payload's field count are
    /// appended as null; a field count or length disagreeing with the
    /// payload is data corruption.
    fn append_composite(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut pos = 0usize;
        let nfields = self.read_composite_i32(bytes, &mut pos)?;
        if nfields < 0 || nfields as usize > self.children.len() {
            return Err(Error::CorruptValue {
                column: self.name.clone(),
                message: format!(
                    "composite carries {nfields} fields, schema has {}",
                    self.children.len()
                ),
            });
        }
        let name = &self.name;
        let nfields = nfields as usize;
        for (i, child) in self.children.iter_mut().enumerate() {
            if i >= nfields {
                child.append(None)?;
                continue;
            }
            // Member type oid; the descriptor already fixed the mapping.
            if pos + 8 > bytes.len() {
                return Err(Error::CorruptValue {
                    column: name.clone(),
                    message: format!("composite member {i} header overruns payload"),
                });
            }
            let len = i32::from_be_bytes([
                bytes[pos + 4],
                bytes[pos + 5],
                bytes[pos + 6],
                bytes[pos + 7],
            ]);
            pos += 8;
            if len < 0 {
                child.append(None)?;
                continue;
            }
            let len = len as usize;
            if pos + len > bytes.len() {
                return Err(Error::CorruptValue {
                    column: name.clone(),
                    message: format!("composite member {i} length {len} overruns payload"),
                });
            }
            child.append(Some(&bytes[pos..pos + len]))?;
            pos += len;
        }
        Ok(())
    }

    fn read_composite_i32(&self, bytes: &[u8], pos: &mut usize) -> Result<i32, Error> {
        if *pos + 4 > bytes.len() {
            return Err(Error::CorruptValue {
                column: self.name.clone(),
                message: "composite header overruns payload".to_string(),
            });
        }
        let v = i32::from_be_bytes([
            bytes[*pos],
            bytes[*pos + 1],
            bytes[*pos + 2],
            bytes[*pos + 3],
        ]);
        *pos += 4;
        Ok(v)
    }

    fn check_width(&self, bytes: &[u8], width: usize) -> Result<(), Error> {
        if bytes.len() != width {
            return Err(Error::ValueSizeMismatch {
                column: self.name.clone(),
                expected: width,
                got: bytes.len(),
            });
        }
        Ok(())
    }

    /// Push this column's `FieldNode` followed by its children's, in
    /// depth-first schema order.
    pub(crate) fn field_nodes(&self, rows: i64, out: &mut Vec<FieldNode>) {
        out.push(FieldNode {
            length: rows,
            null_count: self.null_count,
        });
        for child in &self.children {
            child.field_nodes(rows, out);
        }
    }

    /// Push this column's buffer entries, advancing `offset` by each
    /// buffer's 64-byte-aligned length. A column with no committed nulls
    /// emits a zero-length nullmap entry without advancing.
    pub(crate) fn buffers(&self, rows: i64, offset: &mut i64, out: &mut Vec<BufferRef>) {
        fn push(out: &mut Vec<BufferRef>, offset: &mut i64, length: i64) {
            out.push(BufferRef {
                offset: *offset,
                length,
            });
            *offset += align_up(length as usize, 64) as i64;
        }
        let nullmap_len = if self.null_count > 0 { (rows + 7) / 8 } else { 0 };
        push(out, offset, nullmap_len);
        match self.kind {
            ColumnKind::Struct => {}
            // List bodies never materialize: append refuses their values.
            ColumnKind::List => push(out, offset, 0),
            ColumnKind::Varlena => {
                debug_assert_eq!(self.values.len(), 4 * (rows as usize + 1));
                push(out, offset, self.values.len() as i64);
                push(out, offset, self.extra.len() as i64);
            }
            _ => push(out, offset, self.values.len() as i64),
        }
        for child in &self.children {
            child.buffers(rows, offset, out);
        }
    }

    /// Stream this column's buffers (then its children's) to `sink`, each
    /// zero-padded to 64 bytes. Returns the bytes written.
    pub(crate) fn write_body<W: Write>(&self, rows: i64, sink: &mut W) -> Result<u64, Error> {
        let mut written = 0u64;
        if self.null_count > 0 {
            let len = ((rows + 7) / 8) as usize;
            written += write_padded(sink, &self.nullmap.as_slice()[..len])?;
        }
        match self.kind {
            ColumnKind::Struct | ColumnKind::List => {}
            _ => {
                written += write_padded(sink, self.values.as_slice())?;
                if self.kind == ColumnKind::Varlena {
                    written += write_padded(sink, self.extra.as_slice())?;
                }
            }
        }
        for child in &self.children {
            written += child.write_body(rows, sink)?;
        }
        Ok(written)
    }
}

fn write_padded<W: Write>(sink: &mut W, bytes: &[u8]) -> Result<u64, Error> {
    sink.write_all(bytes)?;
    let pad = align_up(bytes.len(), 64) - bytes.len();
    sink.write_all(&ZEROS[..pad])?;
    Ok((bytes.len() + pad) as u64)
}

fn be_i64(bytes: &[u8]) -> i64 {
    i64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// Assemble a source numeric into a 128-bit scaled integer.
///
/// The wire value carries base-10000 digits, a weight (position of the
/// first digit group relative to the decimal point), and a sign. Integer
/// groups multiply the running value by 10000 each; fractional groups
/// continue until the target scale is consumed, with a partial final group
/// contributing only its high 1–3 decimal places. The sign applies last.
fn parse_numeric(column: &str, bytes: &[u8], scale: i32) -> Result<i128, Error> {
    let corrupt = |message: String| Error::CorruptValue {
        column: column.to_string(),
        message,
    };
    if bytes.len() < 8 {
        return Err(corrupt(format!("numeric header needs 8 bytes, got {}", bytes.len())));
    }
    let ndigits = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let weight = i64::from(i16::from_be_bytes([bytes[2], bytes[3]]));
    let sign = u16::from_be_bytes([bytes[4], bytes[5]]);
    if bytes.len() < 8 + 2 * ndigits {
        return Err(corrupt(format!(
            "numeric claims {ndigits} digits but carries {} bytes",
            bytes.len()
        )));
    }
    let negative = match sign {
        NUMERIC_SIGN_POS => false,
        NUMERIC_SIGN_NEG => true,
        NUMERIC_SIGN_NAN => {
            return Err(Error::DecimalNan {
                column: column.to_string(),
            });
        }
        other => return Err(corrupt(format!("invalid numeric sign {other:#06x}"))),
    };
    let digit = |d: usize| -> Result<i128, Error> {
        let v = u16::from_be_bytes([bytes[8 + 2 * d], bytes[9 + 2 * d]]);
        if v >= 10_000 {
            return Err(corrupt(format!("base-10000 digit {v} out of range")));
        }
        Ok(i128::from(v))
    };
    let overflow = || Error::DecimalOverflow {
        column: column.to_string(),
    };

    let mut value: i128 = 0;
    if weight >= 0 {
        for d in 0..=weight {
            let dig = if (d as usize) < ndigits {
                digit(d as usize)?
            } else {
                0
            };
            value = value
                .checked_mul(10_000)
                .and_then(|v| v.checked_add(dig))
                .ok_or_else(overflow)?;
        }
    }
    let mut remaining = scale;
    let mut d = weight + 1;
    while remaining > 0 {
        let dig = if d >= 0 && (d as usize) < ndigits {
            digit(d as usize)?
        } else {
            0
        };
        if remaining >= 4 {
            value = value
                .checked_mul(10_000)
                .and_then(|v| v.checked_add(dig))
                .ok_or_else(overflow)?;
            remaining -= 4;
        } else {
            let (mul, div) = match remaining {
                1 => (10, 1_000),
                2 => (100, 100),
                _ => (1_000, 10),
            };
            value = value
                .checked_mul(mul)
                .and_then(|v| v.checked_add(dig / div))
                .ok_or_else(overflow)?;
            remaining = 0;
        }
        d += 1;
    }
    Ok(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DateUnit, TimeUnit};

    fn field(name: &str, data_type: ArrowType) -> Field {
        Field {
            name: name.into(),
            nullable: true,
            data_type,
            children: Vec::new(),
        }
    }

    fn int32_field(name: &str) -> Field {
        field(
            name,
            ArrowType::Int {
                bit_width: 32,
                signed: true,
            },
        )
    }

    /// Encode a numeric wire value from its parts.
    fn numeric(ndigits: &[u16], weight: i16, sign: u16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(ndigits.len() as u16).to_be_bytes());
        out.extend_from_slice(&weight.to_be_bytes());
        out.extend_from_slice(&sign.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        for d in ndigits {
            out.extend_from_slice(&d.to_be_bytes());
        }
        out
    }

    #[test]
    fn fixed_values_are_byteswapped() {
        let mut col = ColumnBuilder::new(&int32_field("n")).unwrap();
        col.append(Some(&7i32.to_be_bytes())).unwrap();
        col.commit();
        assert_eq!(&col.values.as_slice()[..4], &7i32.to_le_bytes());
        assert!(col.nullmap.get_bit(0));
    }

    #[test]
    fn wrong_width_is_corruption() {
        let mut col = ColumnBuilder::new(&int32_field("n")).unwrap();
        match col.append(Some(&[1, 2, 3])) {
            Err(Error::ValueSizeMismatch { expected, got, .. }) => {
                assert_eq!((expected, got), (4, 3));
            }
            other => panic!("expected ValueSizeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn date_and_timestamp_rebase_epochs() {
        let mut date = ColumnBuilder::new(&field(
            "d",
            ArrowType::Date {
                unit: DateUnit::Day,
            },
        ))
        .unwrap();
        // 2000-01-01 in source days is zero.
        date.append(Some(&0i32.to_be_bytes())).unwrap();
        date.commit();
        assert_eq!(&date.values.as_slice()[..4], &10_957i32.to_le_bytes());

        let mut ts = ColumnBuilder::new(&field(
            "t",
            ArrowType::Timestamp {
                unit: TimeUnit::Microsecond,
                timezone: None,
            },
        ))
        .unwrap();
        ts.append(Some(&0i64.to_be_bytes())).unwrap();
        ts.commit();
        assert_eq!(
            &ts.values.as_slice()[..8],
            &(10_957i64 * 86_400_000_000).to_le_bytes()
        );
    }

    #[test]
    fn varlena_offsets_track_heap_ends() {
        let mut col = ColumnBuilder::new(&field("s", ArrowType::Utf8)).unwrap();
        for cell in [Some("a"), Some("bb"), None, Some("cccc")] {
            col.append(cell.map(str::as_bytes)).unwrap();
            col.commit();
        }
        let offsets: Vec<i32> = col
            .values
            .as_slice()
            .chunks(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(offsets, [0, 1, 3, 3, 7]);
        assert_eq!(col.extra.as_slice(), b"abbcccc");
        assert_eq!(col.null_count, 1);
        assert_eq!(col.nullmap.as_slice()[0], 0b0000_1011);
    }

    #[test]
    fn unwind_rewinds_buffers_and_null_accounting() {
        let mut col = ColumnBuilder::new(&field("s", ArrowType::Utf8)).unwrap();
        col.append(Some(b"keep")).unwrap();
        col.commit();
        col.append(Some(b"drop")).unwrap();
        col.unwind();
        assert_eq!(col.extra.as_slice(), b"keep");
        assert_eq!(col.values.len(), 8);
        assert_eq!(col.rows, 1);

        // A null row unwinds without ever touching null_count.
        col.append(None).unwrap();
        col.unwind();
        assert_eq!(col.null_count, 0);
        assert_eq!(col.values.len(), 8);
    }

    #[test]
    fn unwinding_the_first_row_removes_the_sentinel() {
        let mut col = ColumnBuilder::new(&field("s", ArrowType::Utf8)).unwrap();
        col.append(Some(b"x")).unwrap();
        col.unwind();
        assert!(col.values.is_empty());
        assert!(col.extra.is_empty());
        col.append(Some(b"y")).unwrap();
        col.commit();
        assert_eq!(col.extra.as_slice(), b"y");
        assert_eq!(col.values.len(), 8);
    }

    #[test]
    fn integer_decimals_scale_up() {
        // 7 at scale 2 becomes 700.
        let v = parse_numeric("n", &numeric(&[7], 0, NUMERIC_SIGN_POS), 2).unwrap();
        assert_eq!(v, 700);
        // Sign applies last.
        let v = parse_numeric("n", &numeric(&[7], 0, NUMERIC_SIGN_NEG), 2).unwrap();
        assert_eq!(v, -700);
    }

    #[test]
    fn fractional_decimals_consume_scale() {
        // 12345.6789 = digits [1, 2345, 6789], weight 1.
        let wire = numeric(&[1, 2345, 6789], 1, NUMERIC_SIGN_POS);
        assert_eq!(parse_numeric("n", &wire, 6).unwrap(), 12_345_678_900);
        // Partial final group keeps only its high decimal places.
        assert_eq!(parse_numeric("n", &wire, 2).unwrap(), 1_234_567);
        // 0.0001 = digit [1] at weight -1.
        let wire = numeric(&[1], -1, NUMERIC_SIGN_POS);
        assert_eq!(parse_numeric("n", &wire, 6).unwrap(), 100);
    }

    #[test]
    fn numeric_nan_is_refused() {
        let wire = numeric(&[], 0, NUMERIC_SIGN_NAN);
        match parse_numeric("n", &wire, 2) {
            Err(Error::DecimalNan { column }) => assert_eq!(column, "n"),
            other => panic!("expected DecimalNan, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_digit_is_corruption() {
        let wire = numeric(&[10_000], 0, NUMERIC_SIGN_POS);
        assert!(matches!(
            parse_numeric("n", &wire, 0),
            Err(Error::CorruptValue { .. })
        ));
    }

    #[test]
    fn composite_members_recurse_and_null_fill() {
        let parent = Field {
            name: "rec".into(),
            nullable: true,
            data_type: ArrowType::Struct,
            children: vec![int32_field("a"), field("b", ArrowType::Utf8)],
        };
        let mut col = ColumnBuilder::new(&parent).unwrap();

        // {a: 5, b: "hi"}
        let mut payload = Vec::new();
        payload.extend_from_slice(&2i32.to_be_bytes());
        payload.extend_from_slice(&23u32.to_be_bytes());
        payload.extend_from_slice(&4i32.to_be_bytes());
        payload.extend_from_slice(&5i32.to_be_bytes());
        payload.extend_from_slice(&25u32.to_be_bytes());
        payload.extend_from_slice(&2i32.to_be_bytes());
        payload.extend_from_slice(b"hi");
        col.append(Some(&payload)).unwrap();
        col.commit();
        assert_eq!(&col.children[0].values.as_slice()[..4], &5i32.to_le_bytes());
        assert_eq!(col.children[1].extra.as_slice(), b"hi");

        // A truncated payload null-fills the remaining members.
        let mut short = Vec::new();
        short.extend_from_slice(&1i32.to_be_bytes());
        short.extend_from_slice(&23u32.to_be_bytes());
        short.extend_from_slice(&4i32.to_be_bytes());
        short.extend_from_slice(&6i32.to_be_bytes());
        col.append(Some(&short)).unwrap();
        col.commit();
        assert_eq!(col.children[1].null_count, 1);

        // More members than the schema knows is corruption.
        let mut over = Vec::new();
        over.extend_from_slice(&3i32.to_be_bytes());
        assert!(matches!(
            col.append(Some(&over)),
            Err(Error::CorruptValue { .. })
        ));
    }

    #[test]
    fn stats_track_committed_extremes_only() {
        let mut col = ColumnBuilder::new(&int32_field("n")).unwrap();
        for v in [5i32, -3, 9] {
            col.append(Some(&v.to_be_bytes())).unwrap();
            col.commit();
        }
        col.append(Some(&100i32.to_be_bytes())).unwrap();
        col.unwind();
        match col.stats() {
            ColumnStats::Int { min, max, seen } => {
                assert!(*seen);
                assert_eq!((*min, *max), (-3, 9));
            }
            other => panic!("expected int stats, got {other:?}"),
        }
    }
}
