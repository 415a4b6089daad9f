//! Source-system column descriptors.
//!
//! The transport collaborator (out of scope here) runs the query and looks
//! up type metadata in the source catalog; what crosses the boundary is one
//! `SourceColumn` per result column plus per-row binary cells in network
//! byte order. Schema derivation consumes these descriptors — see
//! [`Schema::from_source`](crate::Schema::from_source).

/// How the source catalog classifies a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Ordinary scalar type.
    Base,
    /// Row type; `children` describe its members.
    Composite,
    /// Enumerated type; labels travel as text on the binary wire.
    Enum,
    /// User-defined constraint over a base representation.
    Domain,
}

/// Catalog metadata for one result column.
#[derive(Debug, Clone)]
pub struct SourceColumn {
    /// Column name in the result set.
    pub name: String,
    /// Namespace the type lives in (e.g. `pg_catalog`).
    pub namespace: String,
    /// Type name within the namespace.
    pub typename: String,
    /// Fixed byte length (> 0) or -1 for variable-length values.
    pub len: i16,
    /// Whether the source passes values of this type by value.
    pub by_value: bool,
    /// Alignment of the type in the source system: 1, 2, 4, or 8.
    pub align: u8,
    /// Catalog classification.
    pub kind: TypeKind,
    /// Member columns of a composite type, in declaration order.
    pub children: Vec<SourceColumn>,
    /// Element type when the column is an array.
    pub element: Option<Box<SourceColumn>>,
    /// Type modifier bits (-1 when absent). For `numeric`, carries
    /// precision and scale.
    pub type_mod: i32,
}

impl SourceColumn {
    /// A `pg_catalog` base-type column. `len` > 0 is the fixed width,
    /// -1 marks a variable-length type; alignment and by-value follow the
    /// width.
    #[must_use]
    pub fn base(name: &str, typename: &str, len: i16) -> Self {
        Self {
            name: name.to_string(),
            namespace: "pg_catalog".to_string(),
            typename: typename.to_string(),
            len,
            by_value: (1..=8).contains(&len),
            align: match len {
                1 => 1,
                2 => 2,
                8 => 8,
                _ => 4,
            },
            kind: TypeKind::Base,
            children: Vec::new(),
            element: None,
            type_mod: -1,
        }
    }

    /// A composite (row-typed) column with the given member columns.
    #[must_use]
    pub fn composite(name: &str, typename: &str, children: Vec<SourceColumn>) -> Self {
        Self {
            name: name.to_string(),
            namespace: "public".to_string(),
            typename: typename.to_string(),
            len: -1,
            by_value: false,
            align: 8,
            kind: TypeKind::Composite,
            children,
            element: None,
            type_mod: -1,
        }
    }

    /// Attach type modifier bits (e.g. numeric precision/scale).
    #[must_use]
    pub fn with_type_mod(mut self, type_mod: i32) -> Self {
        self.type_mod = type_mod;
        self
    }
}
