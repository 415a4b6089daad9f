//! Arrow logical type model.
//!
//! A hand-rolled mirror of the Arrow schema type union. The discriminants
//! double as the FlatBuffers `Type` union tags (`NONE` = 0, then the
//! variants in declaration order), which is the cross-version wire
//! contract shared by the encoder and decoder.

use std::fmt;

/// Floating point width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// 16-bit floats.
    Half = 0,
    /// 32-bit floats.
    Single = 1,
    /// 64-bit floats.
    Double = 2,
}

/// Granularity of a `Date` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    /// Days since the UNIX epoch, 32 bits.
    Day = 0,
    /// Milliseconds since the UNIX epoch, 64 bits.
    Millisecond = 1,
}

/// Granularity of a `Time` or `Timestamp` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    /// Whole seconds.
    Second = 0,
    /// Milliseconds.
    Millisecond = 1,
    /// Microseconds.
    Microsecond = 2,
    /// Nanoseconds.
    Nanosecond = 3,
}

/// Granularity of an `Interval` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    /// Whole months.
    YearMonth = 0,
    /// Days and milliseconds.
    DayTime = 1,
}

/// Physical layout of a `Union`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionMode {
    /// Every child has one slot per row.
    Sparse = 0,
    /// Children are packed; an offsets buffer selects slots.
    Dense = 1,
}

/// An Arrow logical type with its parameters.
///
/// Payloads are immutable after schema derivation; the discriminant and the
/// active payload always agree by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrowType {
    /// No physical storage.
    Null,
    /// Fixed-width integer.
    Int {
        /// Width in bits: 8, 16, 32, or 64.
        bit_width: i32,
        /// Whether the integer is signed.
        signed: bool,
    },
    /// IEEE 754 floating point.
    FloatingPoint {
        /// Half, single, or double width.
        precision: Precision,
    },
    /// Variable-length bytes.
    Binary,
    /// Variable-length UTF-8 text.
    Utf8,
    /// Boolean.
    Bool,
    /// Fixed-precision decimal stored as a 128-bit scaled integer.
    Decimal {
        /// Total number of decimal digits.
        precision: i32,
        /// Digits after the decimal point.
        scale: i32,
    },
    /// Calendar date.
    Date {
        /// Day or millisecond granularity.
        unit: DateUnit,
    },
    /// Time of day.
    Time {
        /// Sub-day granularity.
        unit: TimeUnit,
        /// Width in bits: 32 or 64.
        bit_width: i32,
    },
    /// Instant since the UNIX epoch.
    Timestamp {
        /// Sub-second granularity.
        unit: TimeUnit,
        /// Optional Olson timezone name.
        timezone: Option<String>,
    },
    /// Calendar interval.
    Interval {
        /// Month or day/time granularity.
        unit: IntervalUnit,
    },
    /// Variable-length list; the element type lives in the field's child.
    List,
    /// Nested record; the member types live in the field's children.
    Struct,
    /// Tagged union of the field's children.
    Union {
        /// Sparse or dense layout.
        mode: UnionMode,
        /// Type id per child.
        type_ids: Vec<i32>,
    },
    /// Fixed-width bytes.
    FixedSizeBinary {
        /// Width of every value in bytes.
        byte_width: i32,
    },
    /// List with a fixed number of elements per slot.
    FixedSizeList {
        /// Elements per slot.
        list_size: i32,
    },
    /// Key/value pairs.
    Map {
        /// Whether keys are sorted within each slot.
        keys_sorted: bool,
    },
}

impl ArrowType {
    /// The FlatBuffers `Type` union tag for this variant (`NONE` = 0).
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            ArrowType::Null => 1,
            ArrowType::Int { .. } => 2,
            ArrowType::FloatingPoint { .. } => 3,
            ArrowType::Binary => 4,
            ArrowType::Utf8 => 5,
            ArrowType::Bool => 6,
            ArrowType::Decimal { .. } => 7,
            ArrowType::Date { .. } => 8,
            ArrowType::Time { .. } => 9,
            ArrowType::Timestamp { .. } => 10,
            ArrowType::Interval { .. } => 11,
            ArrowType::List => 12,
            ArrowType::Struct => 13,
            ArrowType::Union { .. } => 14,
            ArrowType::FixedSizeBinary { .. } => 15,
            ArrowType::FixedSizeList { .. } => 16,
            ArrowType::Map { .. } => 17,
        }
    }
}

impl TimeUnit {
    /// Decode a wire value, if valid.
    #[must_use]
    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            0 => Some(TimeUnit::Second),
            1 => Some(TimeUnit::Millisecond),
            2 => Some(TimeUnit::Microsecond),
            3 => Some(TimeUnit::Nanosecond),
            _ => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Second => "s",
            TimeUnit::Millisecond => "ms",
            TimeUnit::Microsecond => "us",
            TimeUnit::Nanosecond => "ns",
        }
    }
}

impl DateUnit {
    /// Decode a wire value, if valid.
    #[must_use]
    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            0 => Some(DateUnit::Day),
            1 => Some(DateUnit::Millisecond),
            _ => None,
        }
    }
}

impl Precision {
    /// Decode a wire value, if valid.
    #[must_use]
    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            0 => Some(Precision::Half),
            1 => Some(Precision::Single),
            2 => Some(Precision::Double),
            _ => None,
        }
    }
}

impl IntervalUnit {
    /// Decode a wire value, if valid.
    #[must_use]
    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            0 => Some(IntervalUnit::YearMonth),
            1 => Some(IntervalUnit::DayTime),
            _ => None,
        }
    }
}

impl UnionMode {
    /// Decode a wire value, if valid.
    #[must_use]
    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            0 => Some(UnionMode::Sparse),
            1 => Some(UnionMode::Dense),
            _ => None,
        }
    }
}

impl fmt::Display for ArrowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrowType::Null => write!(f, "Null"),
            ArrowType::Int { bit_width, signed } => {
                write!(f, "{}Int{bit_width}", if *signed { "" } else { "U" })
            }
            ArrowType::FloatingPoint { precision } => match precision {
                Precision::Half => write!(f, "Float16"),
                Precision::Single => write!(f, "Float32"),
                Precision::Double => write!(f, "Float64"),
            },
            ArrowType::Binary => write!(f, "Binary"),
            ArrowType::Utf8 => write!(f, "Utf8"),
            ArrowType::Bool => write!(f, "Bool"),
            ArrowType::Decimal { precision, scale } => {
                write!(f, "Decimal({precision}, {scale})")
            }
            ArrowType::Date { unit } => match unit {
                DateUnit::Day => write!(f, "Date[day]"),
                DateUnit::Millisecond => write!(f, "Date[ms]"),
            },
            ArrowType::Time { unit, bit_width } => {
                write!(f, "Time{bit_width}[{}]", unit.suffix())
            }
            ArrowType::Timestamp { unit, timezone } => match timezone {
                Some(tz) => write!(f, "Timestamp[{}, {tz}]", unit.suffix()),
                None => write!(f, "Timestamp[{}]", unit.suffix()),
            },
            ArrowType::Interval { unit } => match unit {
                IntervalUnit::YearMonth => write!(f, "Interval[ym]"),
                IntervalUnit::DayTime => write!(f, "Interval[dt]"),
            },
            ArrowType::List => write!(f, "List"),
            ArrowType::Struct => write!(f, "Struct"),
            ArrowType::Union { mode, type_ids } => {
                let mode = match mode {
                    UnionMode::Sparse => "sparse",
                    UnionMode::Dense => "dense",
                };
                write!(f, "Union[{mode}; {type_ids:?}]")
            }
            ArrowType::FixedSizeBinary { byte_width } => {
                write!(f, "FixedSizeBinary({byte_width})")
            }
            ArrowType::FixedSizeList { list_size } => {
                write!(f, "FixedSizeList({list_size})")
            }
            ArrowType::Map { keys_sorted } => {
                if *keys_sorted {
                    write!(f, "Map[sorted]")
                } else {
                    write!(f, "Map")
                }
            }
        }
    }
}
