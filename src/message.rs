//! Arrow IPC metadata: table encodings, packed struct vectors, framing.
//!
//! The field indices in this module are the cross-version wire contract;
//! readers and writers must agree on them bit-exactly:
//!
//! | table | fields |
//! |---|---|
//! | `Message` | 0 version, 1 header type, 2 header, 3 bodyLength |
//! | `Schema` | 0 endianness, 1 fields, 2 custom_metadata |
//! | `Field` | 0 name, 1 nullable, 2 type tag, 3 type, 4 dictionary, 5 children, 6 custom_metadata |
//! | `RecordBatch` | 0 length, 1 nodes, 2 buffers |
//! | `DictionaryBatch` | 0 id, 1 data, 2 isDelta |
//! | `Footer` | 0 version, 1 schema, 2 dictionaries, 3 recordBatches |
//!
//! `FieldNode`, `Buffer`, and `Block` vectors are packed little-endian
//! structs (no vtable): an item count followed by fixed-stride elements.

use crate::{
    error::Error,
    flatbuf::{Table, TableBuilder, align_up, read_i32, read_i64},
    schema::{Field, Schema},
    types::{ArrowType, DateUnit, IntervalUnit, Precision, TimeUnit, UnionMode},
};

/// Leading file signature: the magic padded to 8 bytes.
pub const FILE_MAGIC: [u8; 8] = *b"ARROW1\0\0";

/// Trailing file signature (no padding).
pub const TAIL_MAGIC: [u8; 6] = *b"ARROW1";

/// Metadata version V4.
pub const METADATA_VERSION: i16 = 3;

/// `MessageHeader` union tags.
pub mod header_type {
    /// No header (invalid on the wire).
    pub const NONE: u8 = 0;
    /// The message frames a `Schema`.
    pub const SCHEMA: u8 = 1;
    /// The message frames a `DictionaryBatch`.
    pub const DICTIONARY_BATCH: u8 = 2;
    /// The message frames a `RecordBatch`.
    pub const RECORD_BATCH: u8 = 3;
    /// Present in the enum; never written, refused on read.
    pub const TENSOR: u8 = 4;
    /// Present in the enum; never written, refused on read.
    pub const SPARSE_TENSOR: u8 = 5;
}

/// Per-field row accounting inside a `RecordBatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldNode {
    /// Row count of the batch.
    pub length: i64,
    /// Nulls appended to this field within the batch.
    pub null_count: i64,
}

/// One body buffer's position within a record batch body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRef {
    /// Offset from the body start; always a multiple of 64.
    pub offset: i64,
    /// Raw (unpadded) byte length.
    pub length: i64,
}

/// Position of one framed message within the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// File offset of the message's length prefix; 8-byte aligned.
    pub offset: i64,
    /// Metadata bytes including the length prefix and padding.
    pub meta_data_length: i32,
    /// Body bytes following the metadata; a multiple of 64.
    pub body_length: i64,
}

/// Decoded `RecordBatch` metadata (bodies are never read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBatchMeta {
    /// Row count.
    pub length: i64,
    /// Field nodes in schema depth-first order.
    pub nodes: Vec<FieldNode>,
    /// Body buffers in schema depth-first order.
    pub buffers: Vec<BufferRef>,
}

/// Decoded `DictionaryBatch` metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryBatchMeta {
    /// Dictionary id referenced from field metadata.
    pub id: i64,
    /// The wrapped record batch.
    pub data: RecordBatchMeta,
    /// Whether the batch extends an earlier dictionary.
    pub is_delta: bool,
}

/// The header carried by one framed message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageHeader {
    /// A schema message.
    Schema(Schema),
    /// A record batch (metadata only).
    RecordBatch(RecordBatchMeta),
    /// A dictionary batch (metadata only).
    DictionaryBatch(DictionaryBatchMeta),
}

/// One decoded message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageMeta {
    /// Metadata version.
    pub version: i16,
    /// The decoded header.
    pub header: MessageHeader,
    /// Bytes of body following the metadata.
    pub body_length: i64,
}

/// The decoded trailing footer.
#[derive(Debug, Clone, PartialEq)]
pub struct FooterMeta {
    /// Metadata version.
    pub version: i16,
    /// The file's schema.
    pub schema: Schema,
    /// Dictionary batch blocks (empty; dictionaries are never produced).
    pub dictionaries: Vec<Block>,
    /// Record batch blocks in emission order.
    pub record_batches: Vec<Block>,
}

// ---------------------------------------------------------------------------
// Encoding

/// Encode a logical type as its FlatBuffer table (without the union tag).
#[must_use]
pub fn encode_type(ty: &ArrowType) -> TableBuilder {
    let mut b = TableBuilder::new();
    match ty {
        ArrowType::Null
        | ArrowType::Binary
        | ArrowType::Utf8
        | ArrowType::Bool
        | ArrowType::List
        | ArrowType::Struct => {}
        ArrowType::Int { bit_width, signed } => {
            b.put_i32(0, *bit_width);
            b.put_bool(1, *signed);
        }
        ArrowType::FloatingPoint { precision } => b.put_i16(0, *precision as i16),
        ArrowType::Decimal { precision, scale } => {
            b.put_i32(0, *precision);
            b.put_i32(1, *scale);
        }
        ArrowType::Date { unit } => b.put_i16(0, *unit as i16),
        ArrowType::Time { unit, bit_width } => {
            b.put_i16(0, *unit as i16);
            b.put_i32(1, *bit_width);
        }
        ArrowType::Timestamp { unit, timezone } => {
            b.put_i16(0, *unit as i16);
            if let Some(tz) = timezone {
                b.put_string(1, tz);
            }
        }
        ArrowType::Interval { unit } => b.put_i16(0, *unit as i16),
        ArrowType::Union { mode, type_ids } => {
            b.put_i16(0, *mode as i16);
            b.put_i32_vector(1, type_ids);
        }
        ArrowType::FixedSizeBinary { byte_width } => b.put_i32(0, *byte_width),
        ArrowType::FixedSizeList { list_size } => b.put_i32(0, *list_size),
        ArrowType::Map { keys_sorted } => b.put_bool(0, *keys_sorted),
    }
    b
}

/// Encode a field with its type union and children. The dictionary slot
/// (field 4) stays absent: dictionaries are never produced.
#[must_use]
pub fn encode_field(field: &Field) -> TableBuilder {
    let mut b = TableBuilder::new();
    b.put_string(0, &field.name);
    b.put_bool(1, field.nullable);
    b.put_u8(2, field.data_type.tag());
    b.put_offset(3, encode_type(&field.data_type));
    if !field.children.is_empty() {
        b.put_vector(5, field.children.iter().map(encode_field).collect());
    }
    b
}

/// Encode a schema. Endianness is always little (the implicit default).
#[must_use]
pub fn encode_schema(schema: &Schema) -> TableBuilder {
    let mut b = TableBuilder::new();
    b.put_vector(1, schema.fields.iter().map(encode_field).collect());
    b
}

/// Encode `RecordBatch` metadata; buffers live at field index 2.
#[must_use]
pub fn encode_record_batch(length: i64, nodes: &[FieldNode], buffers: &[BufferRef]) -> TableBuilder {
    let mut b = TableBuilder::new();
    b.put_i64(0, length);
    b.put_binary(1, field_node_vector(nodes), 0);
    b.put_binary(2, buffer_vector(buffers), 0);
    b
}

/// Encode a `DictionaryBatch` wrapping already-encoded batch metadata.
#[must_use]
pub fn encode_dictionary_batch(id: i64, data: TableBuilder, is_delta: bool) -> TableBuilder {
    let mut b = TableBuilder::new();
    b.put_i64(0, id);
    b.put_offset(1, data);
    b.put_bool(2, is_delta);
    b
}

/// Wrap a header table into a `Message` envelope.
#[must_use]
pub fn encode_message(tag: u8, header: TableBuilder, body_length: i64) -> TableBuilder {
    let mut b = TableBuilder::new();
    b.put_i16(0, METADATA_VERSION);
    b.put_u8(1, tag);
    b.put_offset(2, header);
    b.put_i64(3, body_length);
    b
}

/// Encode the trailing footer listing every emitted block.
#[must_use]
pub fn encode_footer(
    schema: &Schema,
    dictionaries: &[Block],
    record_batches: &[Block],
) -> TableBuilder {
    let mut b = TableBuilder::new();
    b.put_i16(0, METADATA_VERSION);
    b.put_offset(1, encode_schema(schema));
    b.put_binary(2, block_vector(dictionaries), 0);
    b.put_binary(3, block_vector(record_batches), 0);
    b
}

fn field_node_vector(nodes: &[FieldNode]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(4 + 16 * nodes.len());
    blob.extend_from_slice(&(nodes.len() as i32).to_le_bytes());
    for n in nodes {
        blob.extend_from_slice(&n.length.to_le_bytes());
        blob.extend_from_slice(&n.null_count.to_le_bytes());
    }
    blob
}

fn buffer_vector(buffers: &[BufferRef]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(4 + 16 * buffers.len());
    blob.extend_from_slice(&(buffers.len() as i32).to_le_bytes());
    for b in buffers {
        blob.extend_from_slice(&b.offset.to_le_bytes());
        blob.extend_from_slice(&b.length.to_le_bytes());
    }
    blob
}

fn block_vector(blocks: &[Block]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(4 + 24 * blocks.len());
    blob.extend_from_slice(&(blocks.len() as i32).to_le_bytes());
    for b in blocks {
        blob.extend_from_slice(&b.offset.to_le_bytes());
        blob.extend_from_slice(&b.meta_data_length.to_le_bytes());
        blob.extend_from_slice(&0i32.to_le_bytes());
        blob.extend_from_slice(&b.body_length.to_le_bytes());
    }
    blob
}

/// Flatten a builder behind a 32-bit root offset, with a leading gap so the
/// table root lands 4-byte aligned. This is the footer's on-disk shape and
/// the payload of every framed message.
#[must_use]
pub fn finish_root(builder: TableBuilder) -> Vec<u8> {
    let (vlen, image) = builder.flatten();
    let gap = align_up(vlen, 4) - vlen;
    let mut out = Vec::with_capacity(4 + gap + image.len());
    out.extend_from_slice(&((4 + gap + vlen) as u32).to_le_bytes());
    out.resize(4 + gap, 0);
    out.extend_from_slice(&image);
    out
}

/// Frame a message for disk: an int32 metadata length (covering the root
/// offset, flatbuffer, and padding) sized so the whole message is a
/// multiple of 8 bytes.
#[must_use]
pub fn frame_message(builder: TableBuilder) -> Vec<u8> {
    let root = finish_root(builder);
    let total = align_up(4 + root.len(), 8);
    let meta_length = (total - 4) as i32;
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&meta_length.to_le_bytes());
    out.extend_from_slice(&root);
    out.resize(total, 0);
    out
}

// ---------------------------------------------------------------------------
// Decoding

fn corrupt(message: String) -> Error {
    Error::Corrupt { message }
}

/// Decode the framed message whose length prefix lives at `pos`.
///
/// # Errors
/// Returns [`Error::Corrupt`] on malformed metadata or
/// [`Error::UnsupportedHeader`] for `Tensor`/`SparseTensor` headers.
pub fn decode_message(buf: &[u8], pos: usize) -> Result<MessageMeta, Error> {
    let meta_length = read_i32(buf, pos)?;
    if meta_length < 4 {
        return Err(corrupt(format!(
            "message at {pos} claims {meta_length} metadata bytes"
        )));
    }
    decode_message_table(Table::root(buf, pos + 4)?)
}

/// Decode a `Message` table.
///
/// # Errors
/// Returns [`Error::Corrupt`] on malformed metadata or
/// [`Error::UnsupportedHeader`] for headers this crate refuses.
pub fn decode_message_table(t: Table<'_>) -> Result<MessageMeta, Error> {
    let version = t.i16_field(0, 0)?;
    let tag = t.u8_field(1, header_type::NONE)?;
    let body_length = t.i64_field(3, 0)?;
    let header_table = t.table_field(2)?;
    let header = match tag {
        header_type::SCHEMA => {
            let t = header_table.ok_or_else(|| corrupt("schema message without header".into()))?;
            MessageHeader::Schema(decode_schema(t)?)
        }
        header_type::RECORD_BATCH => {
            let t = header_table.ok_or_else(|| corrupt("batch message without header".into()))?;
            MessageHeader::RecordBatch(decode_record_batch(t)?)
        }
        header_type::DICTIONARY_BATCH => {
            let t =
                header_table.ok_or_else(|| corrupt("dictionary message without header".into()))?;
            MessageHeader::DictionaryBatch(decode_dictionary_batch(t)?)
        }
        other => return Err(Error::UnsupportedHeader(other)),
    };
    Ok(MessageMeta {
        version,
        header,
        body_length,
    })
}

/// Decode a `Schema` table.
///
/// # Errors
/// Returns [`Error::Corrupt`] on malformed metadata.
pub fn decode_schema(t: Table<'_>) -> Result<Schema, Error> {
    let mut fields = Vec::new();
    if let Some(v) = t.vector_field(1)? {
        fields.reserve(v.len());
        for j in 0..v.len() {
            fields.push(decode_field(v.table(j)?)?);
        }
    }
    Ok(Schema { fields })
}

fn decode_field(t: Table<'_>) -> Result<Field, Error> {
    let name = t.string_field(0)?.unwrap_or_default().to_string();
    let nullable = t.bool_field(1, false)?;
    let tag = t.u8_field(2, 0)?;
    let data_type = decode_type(tag, t.table_field(3)?)?;
    let mut children = Vec::new();
    if let Some(v) = t.vector_field(5)? {
        children.reserve(v.len());
        for j in 0..v.len() {
            children.push(decode_field(v.table(j)?)?);
        }
    }
    Ok(Field {
        name,
        nullable,
        data_type,
        children,
    })
}

fn decode_type(tag: u8, t: Option<Table<'_>>) -> Result<ArrowType, Error> {
    fn i16f(t: &Option<Table<'_>>, i: usize) -> Result<i16, Error> {
        t.as_ref().map_or(Ok(0), |t| t.i16_field(i, 0))
    }
    fn i32f(t: &Option<Table<'_>>, i: usize) -> Result<i32, Error> {
        t.as_ref().map_or(Ok(0), |t| t.i32_field(i, 0))
    }
    fn boolf(t: &Option<Table<'_>>, i: usize) -> Result<bool, Error> {
        t.as_ref().map_or(Ok(false), |t| t.bool_field(i, false))
    }
    let bad_unit = |what: &str, v: i16| corrupt(format!("invalid {what} unit {v}"));

    Ok(match tag {
        1 => ArrowType::Null,
        2 => ArrowType::Int {
            bit_width: i32f(&t, 0)?,
            signed: boolf(&t, 1)?,
        },
        3 => {
            let v = i16f(&t, 0)?;
            ArrowType::FloatingPoint {
                precision: Precision::from_i16(v).ok_or_else(|| bad_unit("precision", v))?,
            }
        }
        4 => ArrowType::Binary,
        5 => ArrowType::Utf8,
        6 => ArrowType::Bool,
        7 => ArrowType::Decimal {
            precision: i32f(&t, 0)?,
            scale: i32f(&t, 1)?,
        },
        8 => {
            let v = i16f(&t, 0)?;
            ArrowType::Date {
                unit: DateUnit::from_i16(v).ok_or_else(|| bad_unit("date", v))?,
            }
        }
        9 => {
            let v = i16f(&t, 0)?;
            ArrowType::Time {
                unit: TimeUnit::from_i16(v).ok_or_else(|| bad_unit("time", v))?,
                bit_width: i32f(&t, 1)?,
            }
        }
        10 => {
            let v = i16f(&t, 0)?;
            let timezone = match &t {
                None => None,
                Some(t) => t.string_field(1)?.map(str::to_string),
            };
            ArrowType::Timestamp {
                unit: TimeUnit::from_i16(v).ok_or_else(|| bad_unit("timestamp", v))?,
                timezone,
            }
        }
        11 => {
            let v = i16f(&t, 0)?;
            ArrowType::Interval {
                unit: IntervalUnit::from_i16(v).ok_or_else(|| bad_unit("interval", v))?,
            }
        }
        12 => ArrowType::List,
        13 => ArrowType::Struct,
        14 => {
            let v = i16f(&t, 0)?;
            let mode = UnionMode::from_i16(v).ok_or_else(|| bad_unit("union mode", v))?;
            let mut type_ids = Vec::new();
            if let Some(t) = &t
                && let Some(ids) = t.vector_field(1)?
            {
                type_ids.reserve(ids.len());
                for j in 0..ids.len() {
                    type_ids.push(ids.i32_at(j)?);
                }
            }
            ArrowType::Union { mode, type_ids }
        }
        15 => ArrowType::FixedSizeBinary {
            byte_width: i32f(&t, 0)?,
        },
        16 => ArrowType::FixedSizeList {
            list_size: i32f(&t, 0)?,
        },
        17 => ArrowType::Map {
            keys_sorted: boolf(&t, 0)?,
        },
        other => return Err(corrupt(format!("unknown type tag {other}"))),
    })
}

/// Decode `RecordBatch` metadata.
///
/// # Errors
/// Returns [`Error::Corrupt`] on malformed metadata.
pub fn decode_record_batch(t: Table<'_>) -> Result<RecordBatchMeta, Error> {
    let length = t.i64_field(0, 0)?;
    let nodes = decode_packed(&t, 1, 16, |buf, p| {
        Ok(FieldNode {
            length: read_i64(buf, p)?,
            null_count: read_i64(buf, p + 8)?,
        })
    })?;
    let buffers = decode_packed(&t, 2, 16, |buf, p| {
        Ok(BufferRef {
            offset: read_i64(buf, p)?,
            length: read_i64(buf, p + 8)?,
        })
    })?;
    Ok(RecordBatchMeta {
        length,
        nodes,
        buffers,
    })
}

/// Decode `DictionaryBatch` metadata.
///
/// # Errors
/// Returns [`Error::Corrupt`] on malformed metadata.
pub fn decode_dictionary_batch(t: Table<'_>) -> Result<DictionaryBatchMeta, Error> {
    let id = t.i64_field(0, 0)?;
    let data = t
        .table_field(1)?
        .ok_or_else(|| corrupt("dictionary batch without data".into()))?;
    Ok(DictionaryBatchMeta {
        id,
        data: decode_record_batch(data)?,
        is_delta: t.bool_field(2, false)?,
    })
}

/// Decode the footer whose root offset lives at `pos`.
///
/// # Errors
/// Returns [`Error::Corrupt`] on malformed metadata.
pub fn decode_footer(buf: &[u8], pos: usize) -> Result<FooterMeta, Error> {
    let t = Table::root(buf, pos)?;
    let version = t.i16_field(0, 0)?;
    let schema = t
        .table_field(1)?
        .ok_or_else(|| corrupt("footer without schema".into()))?;
    let schema = decode_schema(schema)?;
    let dictionaries = decode_blocks(&t, 2)?;
    let record_batches = decode_blocks(&t, 3)?;
    Ok(FooterMeta {
        version,
        schema,
        dictionaries,
        record_batches,
    })
}

fn decode_blocks(t: &Table<'_>, field: usize) -> Result<Vec<Block>, Error> {
    decode_packed(t, field, 24, |buf, p| {
        Ok(Block {
            offset: read_i64(buf, p)?,
            meta_data_length: read_i32(buf, p + 8)?,
            body_length: read_i64(buf, p + 16)?,
        })
    })
}

fn decode_packed<T>(
    t: &Table<'_>,
    field: usize,
    stride: usize,
    parse: impl Fn(&[u8], usize) -> Result<T, Error>,
) -> Result<Vec<T>, Error> {
    let Some(p) = t.indirect(field)? else {
        return Ok(Vec::new());
    };
    let buf = t.buffer();
    let n = read_i32(buf, p)?;
    if n < 0 {
        return Err(corrupt(format!("negative vector length {n} at {p}")));
    }
    let mut out = Vec::with_capacity(n as usize);
    for j in 0..n as usize {
        out.push(parse(buf, p + 4 + j * stride)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_union_round_trips_every_variant() {
        let types = [
            ArrowType::Null,
            ArrowType::Int {
                bit_width: 64,
                signed: true,
            },
            ArrowType::FloatingPoint {
                precision: Precision::Double,
            },
            ArrowType::Binary,
            ArrowType::Utf8,
            ArrowType::Bool,
            ArrowType::Decimal {
                precision: 30,
                scale: 11,
            },
            ArrowType::Date {
                unit: DateUnit::Day,
            },
            ArrowType::Time {
                unit: TimeUnit::Microsecond,
                bit_width: 64,
            },
            ArrowType::Timestamp {
                unit: TimeUnit::Microsecond,
                timezone: Some("UTC".to_string()),
            },
            ArrowType::Interval {
                unit: IntervalUnit::DayTime,
            },
            ArrowType::List,
            ArrowType::Struct,
            ArrowType::Union {
                mode: UnionMode::Dense,
                type_ids: vec![0, 1, 7],
            },
            ArrowType::FixedSizeBinary { byte_width: 16 },
            ArrowType::FixedSizeList { list_size: 3 },
            ArrowType::Map { keys_sorted: true },
        ];
        for ty in types {
            let field = Field {
                name: "c".into(),
                nullable: true,
                data_type: ty.clone(),
                children: Vec::new(),
            };
            let image = finish_root(encode_field(&field));
            let t = Table::root(&image, 0).unwrap();
            let back = decode_field(t).unwrap();
            assert_eq!(back.data_type, ty);
        }
    }

    #[test]
    fn dictionary_batch_round_trips() {
        let nodes = [FieldNode {
            length: 4,
            null_count: 0,
        }];
        let buffers = [
            BufferRef {
                offset: 0,
                length: 0,
            },
            BufferRef {
                offset: 0,
                length: 20,
            },
            BufferRef {
                offset: 64,
                length: 9,
            },
        ];
        let batch = encode_record_batch(4, &nodes, &buffers);
        let msg = frame_message(encode_message(
            header_type::DICTIONARY_BATCH,
            encode_dictionary_batch(7, batch, true),
            128,
        ));
        assert_eq!(msg.len() % 8, 0);
        let meta = decode_message(&msg, 0).unwrap();
        assert_eq!(meta.version, METADATA_VERSION);
        assert_eq!(meta.body_length, 128);
        let MessageHeader::DictionaryBatch(d) = meta.header else {
            panic!("expected dictionary header");
        };
        assert_eq!(d.id, 7);
        assert!(d.is_delta);
        assert_eq!(d.data.length, 4);
        assert_eq!(d.data.nodes, nodes);
        assert_eq!(d.data.buffers, buffers);
    }

    #[test]
    fn tensor_headers_are_refused() {
        let msg = frame_message(encode_message(
            header_type::TENSOR,
            TableBuilder::new(),
            0,
        ));
        match decode_message(&msg, 0) {
            Err(Error::UnsupportedHeader(tag)) => assert_eq!(tag, header_type::TENSOR),
            other => panic!("expected UnsupportedHeader, got {other:?}"),
        }
    }
}
