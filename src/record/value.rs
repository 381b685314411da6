//! Fixed-width column types. Every column has a statically known byte width,
//! which is what lets a table's `rec_size` be computed once from its schema
//! and reused for every slot on every page.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
}

impl DataType {
    pub fn size(&self) -> usize {
        match self {
            DataType::Bool | DataType::I8 | DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::I64 | DataType::U64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(DataType::Bool),
            Value::I8(_) => Some(DataType::I8),
            Value::I16(_) => Some(DataType::I16),
            Value::I32(_) => Some(DataType::I32),
            Value::I64(_) => Some(DataType::I64),
            Value::U8(_) => Some(DataType::U8),
            Value::U16(_) => Some(DataType::U16),
            Value::U32(_) => Some(DataType::U32),
            Value::U64(_) => Some(DataType::U64),
            Value::F32(_) => Some(DataType::F32),
        }
    }

    /// Encodes the value into exactly `ty.size()` bytes, native-endian. Used
    /// for null slots too (a zeroed placeholder still has to occupy the
    /// column's width so every other column's offset stays fixed).
    pub fn write_bytes(&self, ty: DataType, out: &mut [u8]) {
        debug_assert_eq!(out.len(), ty.size());
        match (*self, ty) {
            (Value::Null, _) => out.fill(0),
            (Value::Bool(v), DataType::Bool) => out[0] = v as u8,
            (Value::I8(v), DataType::I8) => out.copy_from_slice(&v.to_ne_bytes()),
            (Value::I16(v), DataType::I16) => out.copy_from_slice(&v.to_ne_bytes()),
            (Value::I32(v), DataType::I32) => out.copy_from_slice(&v.to_ne_bytes()),
            (Value::I64(v), DataType::I64) => out.copy_from_slice(&v.to_ne_bytes()),
            (Value::U8(v), DataType::U8) => out.copy_from_slice(&v.to_ne_bytes()),
            (Value::U16(v), DataType::U16) => out.copy_from_slice(&v.to_ne_bytes()),
            (Value::U32(v), DataType::U32) => out.copy_from_slice(&v.to_ne_bytes()),
            (Value::U64(v), DataType::U64) => out.copy_from_slice(&v.to_ne_bytes()),
            (Value::F32(v), DataType::F32) => out.copy_from_slice(&v.to_ne_bytes()),
            (value, ty) => panic!("value {value:?} does not match column type {ty:?}"),
        }
    }

    pub fn from_bytes(ty: DataType, bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), ty.size());
        match ty {
            DataType::Bool => Value::Bool(bytes[0] != 0),
            DataType::I8 => Value::I8(bytes[0] as i8),
            DataType::I16 => Value::I16(i16::from_ne_bytes(bytes.try_into().unwrap())),
            DataType::I32 => Value::I32(i32::from_ne_bytes(bytes.try_into().unwrap())),
            DataType::I64 => Value::I64(i64::from_ne_bytes(bytes.try_into().unwrap())),
            DataType::U8 => Value::U8(bytes[0]),
            DataType::U16 => Value::U16(u16::from_ne_bytes(bytes.try_into().unwrap())),
            DataType::U32 => Value::U32(u32::from_ne_bytes(bytes.try_into().unwrap())),
            DataType::U64 => Value::U64(u64::from_ne_bytes(bytes.try_into().unwrap())),
            DataType::F32 => Value::F32(f32::from_ne_bytes(bytes.try_into().unwrap())),
        }
    }

    /// Total order used by the sort operator. Descending order is handled by
    /// the caller negating the result, not by this comparison.
    pub fn cmp_value(&self, other: &Value) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::I8(a), Value::I8(b)) => a.cmp(b),
            (Value::I16(a), Value::I16(b)) => a.cmp(b),
            (Value::I32(a), Value::I32(b)) => a.cmp(b),
            (Value::I64(a), Value::I64(b)) => a.cmp(b),
            (Value::U8(a), Value::U8(b)) => a.cmp(b),
            (Value::U16(a), Value::U16(b)) => a.cmp(b),
            (Value::U32(a), Value::U32(b)) => a.cmp(b),
            (Value::U64(a), Value::U64(b)) => a.cmp(b),
            (Value::F32(a), Value::F32(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (a, b) => panic!("cannot compare values of different types: {a:?} vs {b:?}"),
        }
    }
}
