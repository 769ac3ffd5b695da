//! Spatial range of a fragment
//!
//! The catalog stores the range as opaque bytes: `[low, high]` pairs, one per
//! dimension, in the array's coordinate type (little-endian). The array schema
//! knows the coordinate type and dimension count; [`DomainLayout`] carries that
//! knowledge so callers can validate a range before handing it to the catalog
//! and decode it again at query time.

use crate::error::{FragmentError, Result};

/// Coordinate datatype of an array domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Datatype {
    Int8 = 0,
    UInt8 = 1,
    Int16 = 2,
    UInt16 = 3,
    Int32 = 4,
    UInt32 = 5,
    Int64 = 6,
    UInt64 = 7,
    Float32 = 8,
    Float64 = 9,
}

impl Datatype {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Datatype::Int8),
            1 => Some(Datatype::UInt8),
            2 => Some(Datatype::Int16),
            3 => Some(Datatype::UInt16),
            4 => Some(Datatype::Int32),
            5 => Some(Datatype::UInt32),
            6 => Some(Datatype::Int64),
            7 => Some(Datatype::UInt64),
            8 => Some(Datatype::Float32),
            9 => Some(Datatype::Float64),
            _ => None,
        }
    }

    /// Size of one coordinate in bytes
    pub fn size(&self) -> usize {
        match self {
            Datatype::Int8 | Datatype::UInt8 => 1,
            Datatype::Int16 | Datatype::UInt16 => 2,
            Datatype::Int32 | Datatype::UInt32 | Datatype::Float32 => 4,
            Datatype::Int64 | Datatype::UInt64 | Datatype::Float64 => 8,
        }
    }
}

/// Rust types usable as range coordinates
pub trait Coordinate: Copy + PartialOrd {
    const DATATYPE: Datatype;

    fn write_le(&self, out: &mut Vec<u8>);

    /// `bytes` is exactly `DATATYPE.size()` long
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_coordinate {
    ($($ty:ty => $dt:ident),* $(,)?) => {
        $(
            impl Coordinate for $ty {
                const DATATYPE: Datatype = Datatype::$dt;

                fn write_le(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_coordinate!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
);

/// The hyper-rectangle a fragment covers, as raw bytes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpatialRange(Vec<u8>);

impl SpatialRange {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        SpatialRange(bytes.into())
    }

    /// Encode typed `(low, high)` pairs, one per dimension
    pub fn from_pairs<T: Coordinate>(pairs: &[(T, T)]) -> Self {
        let mut bytes = Vec::with_capacity(pairs.len() * 2 * T::DATATYPE.size());
        for (low, high) in pairs {
            low.write_le(&mut bytes);
            high.write_le(&mut bytes);
        }
        SpatialRange(bytes)
    }

    /// Decode as typed `(low, high)` pairs
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the byte length is not a whole number of pairs.
    pub fn to_pairs<T: Coordinate>(&self) -> Result<Vec<(T, T)>> {
        let size = T::DATATYPE.size();
        let pair_size = size * 2;
        if self.0.len() % pair_size != 0 {
            return Err(FragmentError::InvalidArgument(format!(
                "range of {} bytes is not a whole number of {:?} pairs",
                self.0.len(),
                T::DATATYPE
            )));
        }

        Ok(self
            .0
            .chunks_exact(pair_size)
            .map(|pair| (T::read_le(&pair[..size]), T::read_le(&pair[size..])))
            .collect())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for SpatialRange {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Schema-side description of how a range is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainLayout {
    pub datatype: Datatype,
    pub dim_num: usize,
}

impl DomainLayout {
    pub fn new(datatype: Datatype, dim_num: usize) -> Self {
        DomainLayout { datatype, dim_num }
    }

    /// Expected byte length of a range in this layout
    pub fn range_size(&self) -> usize {
        self.dim_num * 2 * self.datatype.size()
    }

    /// Check a range against the schema: byte length and `low <= high`
    pub fn validate(&self, range: &SpatialRange) -> Result<()> {
        if self.dim_num == 0 {
            return Err(FragmentError::InvalidArgument(
                "domain must have at least one dimension".to_string(),
            ));
        }

        if range.len() != self.range_size() {
            return Err(FragmentError::InvalidArgument(format!(
                "range has {} bytes, expected {} for {} {:?} dimensions",
                range.len(),
                self.range_size(),
                self.dim_num,
                self.datatype
            )));
        }

        let ordered = match self.datatype {
            Datatype::Int8 => pairs_ordered::<i8>(range)?,
            Datatype::UInt8 => pairs_ordered::<u8>(range)?,
            Datatype::Int16 => pairs_ordered::<i16>(range)?,
            Datatype::UInt16 => pairs_ordered::<u16>(range)?,
            Datatype::Int32 => pairs_ordered::<i32>(range)?,
            Datatype::UInt32 => pairs_ordered::<u32>(range)?,
            Datatype::Int64 => pairs_ordered::<i64>(range)?,
            Datatype::UInt64 => pairs_ordered::<u64>(range)?,
            Datatype::Float32 => pairs_ordered::<f32>(range)?,
            Datatype::Float64 => pairs_ordered::<f64>(range)?,
        };

        if !ordered {
            return Err(FragmentError::InvalidArgument(
                "range low bound exceeds high bound".to_string(),
            ));
        }

        Ok(())
    }
}

// NaN bounds compare false and are rejected here as well
fn pairs_ordered<T: Coordinate>(range: &SpatialRange) -> Result<bool> {
    Ok(range.to_pairs::<T>()?.iter().all(|(low, high)| low <= high))
}
