//! Arrow schema model and source-type mapping.

use std::fmt;

use crate::{
    error::Error,
    source::{SourceColumn, TypeKind},
    types::{ArrowType, DateUnit, Precision, TimeUnit},
};

/// Precision/scale used for `numeric` columns without a type modifier.
const NUMERIC_DEFAULT: (i32, i32) = (30, 11);

/// One column (or nested member) of an Arrow schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Whether slots may be null.
    pub nullable: bool,
    /// Logical Arrow type.
    pub data_type: ArrowType,
    /// Nested members: struct children or the list element.
    pub children: Vec<Field>,
}

/// An ordered set of fields describing one result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// Top-level fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Derive an Arrow schema from source catalog descriptors.
    ///
    /// Every result column is nullable: the source cannot promise
    /// non-nullness for arbitrary query output.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedType`] when a column's source type has no
    /// Arrow mapping.
    pub fn from_source(columns: &[SourceColumn]) -> Result<Schema, Error> {
        let fields = columns
            .iter()
            .map(Field::from_source)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Schema { fields })
    }

    /// Number of field nodes in a depth-first traversal of the schema tree.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        fn walk(f: &Field) -> usize {
            1 + f.children.iter().map(walk).sum::<usize>()
        }
        self.fields.iter().map(walk).sum()
    }
}

impl Field {
    /// Derive one field (recursing into composite members) from a source
    /// descriptor.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedType`] when the source type has no Arrow
    /// mapping.
    pub fn from_source(column: &SourceColumn) -> Result<Field, Error> {
        let (data_type, children) = map_source_type(column)?;
        Ok(Field {
            name: column.name.clone(),
            nullable: true,
            data_type,
            children,
        })
    }

    /// Number of wire buffers this field contributes, excluding children:
    /// 1 for struct (null bitmap only), 3 for variable-length types
    /// (bitmap, offsets, heap), 2 otherwise (bitmap, values).
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        match self.data_type {
            ArrowType::Struct => 1,
            ArrowType::Binary | ArrowType::Utf8 => 3,
            _ => 2,
        }
    }
}

/// The source → Arrow mapping table. Composites recurse; arrays map to
/// `List` (recognized, but their values cannot be accumulated yet); types
/// outside the known set fall back by physical shape: fixed 1/2/4/8 bytes
/// become unsigned integers, variable-length becomes `Binary`.
fn map_source_type(column: &SourceColumn) -> Result<(ArrowType, Vec<Field>), Error> {
    if column.kind == TypeKind::Composite {
        let children = column
            .children
            .iter()
            .map(Field::from_source)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok((ArrowType::Struct, children));
    }
    if let Some(element) = &column.element {
        let child = Field::from_source(element)?;
        return Ok((ArrowType::List, vec![child]));
    }
    if column.kind == TypeKind::Enum {
        return Ok((ArrowType::Utf8, Vec::new()));
    }

    let ty = if column.namespace == "pg_catalog" {
        match column.typename.as_str() {
            "bool" => Some(ArrowType::Bool),
            "int2" => Some(ArrowType::Int {
                bit_width: 16,
                signed: true,
            }),
            "int4" => Some(ArrowType::Int {
                bit_width: 32,
                signed: true,
            }),
            "int8" => Some(ArrowType::Int {
                bit_width: 64,
                signed: true,
            }),
            "float4" => Some(ArrowType::FloatingPoint {
                precision: Precision::Single,
            }),
            "float8" => Some(ArrowType::FloatingPoint {
                precision: Precision::Double,
            }),
            "date" => Some(ArrowType::Date {
                unit: DateUnit::Day,
            }),
            "time" => Some(ArrowType::Time {
                unit: TimeUnit::Microsecond,
                bit_width: 64,
            }),
            "timestamp" | "timestamptz" => Some(ArrowType::Timestamp {
                unit: TimeUnit::Microsecond,
                timezone: None,
            }),
            "text" | "varchar" | "bpchar" => Some(ArrowType::Utf8),
            "numeric" => {
                let (precision, scale) = numeric_typmod(column.type_mod);
                Some(ArrowType::Decimal { precision, scale })
            }
            _ => None,
        }
    } else {
        None
    };

    let ty = match ty {
        Some(ty) => ty,
        None => match column.len {
            1 | 2 | 4 | 8 => ArrowType::Int {
                bit_width: i32::from(column.len) * 8,
                signed: false,
            },
            -1 => ArrowType::Binary,
            _ => {
                return Err(Error::UnsupportedType {
                    column: column.name.clone(),
                    namespace: column.namespace.clone(),
                    typename: column.typename.clone(),
                });
            }
        },
    };
    Ok((ty, Vec::new()))
}

/// Unpack numeric precision/scale from the type modifier:
/// `(type_mod - 4)` carries precision in the high 16 bits and scale in the
/// low 16. Columns without a modifier get (30, 11).
fn numeric_typmod(type_mod: i32) -> (i32, i32) {
    if type_mod < 4 {
        return NUMERIC_DEFAULT;
    }
    let m = type_mod - 4;
    ((m >> 16) & 0xffff, m & 0xffff)
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn render(field: &Field, indent: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{:indent$}{}: {}{}",
                "",
                field.name,
                field.data_type,
                if field.nullable { "" } else { " not null" },
            )?;
            for child in &field.children {
                writeln!(f)?;
                render(child, indent + 2, f)?;
            }
            Ok(())
        }
        render(self, 0, f)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.fields {
            writeln!(f, "{field}")?;
        }
        Ok(())
    }
}
