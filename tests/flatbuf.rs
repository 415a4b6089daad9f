//! Wire-layout properties of the FlatBuffer builder and decoder.

use pg_arrow::{
    ArrowType, Field, Schema, Table, TableBuilder, encode_field, encode_schema, finish_root,
};

fn u16_at(buf: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([buf[pos], buf[pos + 1]])
}

fn u32_at(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

fn i32_at(buf: &[u8], pos: usize) -> i32 {
    u32_at(buf, pos) as i32
}

fn int_field(name: &str) -> Field {
    Field {
        name: name.into(),
        nullable: true,
        data_type: ArrowType::Int {
            bit_width: 32,
            signed: true,
        },
        children: Vec::new(),
    }
}

#[test]
fn table_root_points_back_to_its_vtable() {
    let mut b = TableBuilder::new();
    b.put_i32(0, 11);
    b.put_i64(3, -9);
    b.put_string(4, "name");
    let buf = finish_root(b);

    let table_pos = u32_at(&buf, 0) as usize;
    let soffset = i32_at(&buf, table_pos);
    assert!(soffset > 0);
    let vtable_pos = table_pos - soffset as usize;
    let vlen = u16_at(&buf, vtable_pos);
    // The table's first int32 equals the vtable length.
    assert_eq!(i32::from(vlen), soffset);
    // vtable covers fields 0..=4 and stays 16-bit sized.
    assert_eq!(vlen, 4 + 2 * 5);

    let tlen = u16_at(&buf, vtable_pos + 2) as usize;
    assert!(tlen >= 4);
    for field in 0..5 {
        let off = u16_at(&buf, vtable_pos + 4 + 2 * field) as usize;
        // Populated fields point inside the table; gaps are absent.
        if field == 1 || field == 2 {
            assert_eq!(off, 0);
        } else {
            assert!(off > 0 && off < tlen, "field {field} offset {off} vs tlen {tlen}");
        }
    }
}

#[test]
fn absent_fields_decode_to_defaults() {
    let buf = finish_root(TableBuilder::new());
    let t = Table::root(&buf, 0).unwrap();
    assert_eq!(t.u8_field(0, 9).unwrap(), 9);
    assert!(!t.bool_field(1, false).unwrap());
    assert_eq!(t.i16_field(2, -2).unwrap(), -2);
    assert_eq!(t.i32_field(3, 41).unwrap(), 41);
    assert_eq!(t.i64_field(4, i64::MIN).unwrap(), i64::MIN);
    assert_eq!(t.string_field(5).unwrap(), None);
    assert!(t.table_field(6).unwrap().is_none());
    assert!(t.vector_field(7).unwrap().is_none());
}

#[test]
fn zero_scalars_are_omitted_and_read_back_as_defaults() {
    let mut b = TableBuilder::new();
    b.put_i32(0, 0);
    b.put_bool(1, false);
    b.put_i64(2, 0);
    let buf = finish_root(b);

    let table_pos = u32_at(&buf, 0) as usize;
    let vtable_pos = table_pos - i32_at(&buf, table_pos) as usize;
    for field in 0..3 {
        assert_eq!(u16_at(&buf, vtable_pos + 4 + 2 * field), 0);
    }
    let t = Table::root(&buf, 0).unwrap();
    assert_eq!(t.i32_field(0, 0).unwrap(), 0);
    assert!(!t.bool_field(1, false).unwrap());
    assert_eq!(t.i64_field(2, 0).unwrap(), 0);
}

#[test]
fn strings_are_length_prefixed_and_nul_terminated() {
    let mut b = TableBuilder::new();
    b.put_string(0, "id");
    let buf = finish_root(b);
    let t = Table::root(&buf, 0).unwrap();
    assert_eq!(t.string_field(0).unwrap(), Some("id"));

    // Locate the payload and verify the raw shape.
    let table_pos = u32_at(&buf, 0) as usize;
    let slot = {
        let vtable_pos = table_pos - i32_at(&buf, table_pos) as usize;
        table_pos + u16_at(&buf, vtable_pos + 4) as usize
    };
    let payload = slot + u32_at(&buf, slot) as usize;
    assert_eq!(i32_at(&buf, payload), 2);
    assert_eq!(&buf[payload + 4..payload + 6], b"id");
    assert_eq!(buf[payload + 6], 0);
}

#[test]
fn field_vectors_resolve_each_element_to_its_table_root() {
    let schema = Schema {
        fields: vec![int_field("a"), int_field("b"), int_field("c")],
    };
    let buf = finish_root(encode_schema(&schema));
    let t = Table::root(&buf, 0).unwrap();
    let fields = t.vector_field(1).unwrap().expect("fields vector present");
    assert_eq!(fields.len(), 3);
    for (j, name) in ["a", "b", "c"].iter().enumerate() {
        let f = fields.table(j).unwrap();
        assert_eq!(f.string_field(0).unwrap(), Some(*name));
    }
}

#[test]
fn nested_field_encodes_children_recursively() {
    let parent = Field {
        name: "rec".into(),
        nullable: true,
        data_type: ArrowType::Struct,
        children: vec![int_field("x"), int_field("y")],
    };
    let buf = finish_root(encode_field(&parent));
    let t = Table::root(&buf, 0).unwrap();
    assert_eq!(t.string_field(0).unwrap(), Some("rec"));
    assert_eq!(t.u8_field(2, 0).unwrap(), ArrowType::Struct.tag());
    // The dictionary slot stays absent.
    assert!(t.table_field(4).unwrap().is_none());
    let children = t.vector_field(5).unwrap().expect("children present");
    assert_eq!(children.len(), 2);
    assert_eq!(children.table(1).unwrap().string_field(0).unwrap(), Some("y"));
}
