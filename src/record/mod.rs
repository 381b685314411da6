pub mod schema;
pub mod value;

pub use schema::{Field, Schema};
pub use value::{DataType, Value};

use crate::pages::{bitmap, Rid, INVALID_RID};

/// A materialized tuple: a schema-shaped body plus a null bitmap, both owned.
/// Records are value-copyable on purpose (§3: "Records are value-copyable";
/// projecting one materializes a new body) rather than zero-copy views into
/// a page, since a page is only pinned for the duration of the read.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub rid: Rid,
    body: Box<[u8]>,
    null_bitmap: Box<[u8]>,
}

impl Record {
    /// Encodes `values` (in schema order) into a fresh record body.
    pub fn new(schema: &Schema, values: &[Value], rid: Rid) -> Self {
        assert_eq!(values.len(), schema.fields.len());
        let mut body = vec![0u8; schema.rec_size()];
        let mut null_bitmap = vec![0u8; schema.nullmap_size()];

        let mut offset = 0;
        for (i, (value, field)) in values.iter().zip(schema.fields.iter()).enumerate() {
            let width = field.ty.size();
            if value.is_null() {
                bitmap::set_bit(&mut null_bitmap, i, true);
            } else {
                value.write_bytes(field.ty, &mut body[offset..offset + width]);
            }
            offset += width;
        }

        Self {
            rid,
            body: body.into_boxed_slice(),
            null_bitmap: null_bitmap.into_boxed_slice(),
        }
    }

    /// Reconstructs a record from the raw bytes a page handle returned.
    pub fn from_parts(body: &[u8], null_bitmap: &[u8], rid: Rid) -> Self {
        Self {
            rid,
            body: body.to_vec().into_boxed_slice(),
            null_bitmap: null_bitmap.to_vec().into_boxed_slice(),
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn null_bitmap(&self) -> &[u8] {
        &self.null_bitmap
    }

    pub fn is_null(&self, field_index: usize) -> bool {
        bitmap::get_bit(&self.null_bitmap, field_index)
    }

    pub fn get_value(&self, schema: &Schema, field_index: usize) -> Value {
        if self.is_null(field_index) {
            return Value::Null;
        }
        let field = &schema.fields[field_index];
        let offset = schema.field_offset(field_index);
        Value::from_bytes(field.ty, &self.body[offset..offset + field.ty.size()])
    }

    pub fn values(&self, schema: &Schema) -> Vec<Value> {
        (0..schema.fields.len())
            .map(|i| self.get_value(schema, i))
            .collect()
    }

    /// Materializes a new record shaped like `target`, looking each of its
    /// fields up by name in `source_schema`. Used by the projection executor
    /// and by the join operator's null-padded rows.
    pub fn project(&self, source_schema: &Schema, target: &Schema) -> Record {
        let values: Vec<Value> = target
            .fields
            .iter()
            .map(|f| {
                let idx = source_schema
                    .index_of(&f.name)
                    .unwrap_or_else(|| panic!("field {} not present in source schema", f.name));
                self.get_value(source_schema, idx)
            })
            .collect();
        Record::new(target, &values, self.rid)
    }

    /// An all-null record of `schema`'s shape, used by outer joins to pad
    /// the side that did not match.
    pub fn nulls(schema: &Schema, rid: Rid) -> Record {
        Record::new(schema, &vec![Value::Null; schema.fields.len()], rid)
    }
}

/// Tuple metadata plus the tuple itself, as produced by a table scan.
pub type Entry = (Rid, Record);

/// A columnar batch: one page's worth of live rows, projected to a given
/// schema. Returned by a page handle's `read_chunk`; the engine does not
/// otherwise operate on batches (executors are row-at-a-time).
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub schema: Schema,
    pub rows: Vec<Record>,
}

impl Chunk {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }
}

/// Builds a two-sided record by concatenating schemas and bodies; used by
/// the nested-loop join to combine a left and right record (or a record and
/// a null pad) into one output row.
pub fn concat(left: &Record, left_schema: &Schema, right: &Record, right_schema: &Schema) -> Record {
    let mut fields = left_schema.fields.clone();
    fields.extend(right_schema.fields.clone());
    let out_schema = Schema::new(fields);

    let mut values = left.values(left_schema);
    values.extend(right.values(right_schema));

    let rid = if left.rid != INVALID_RID {
        left.rid
    } else {
        right.rid
    };
    Record::new(&out_schema, &values, rid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::I32),
            Field::new("name_len", DataType::U8),
        ])
    }

    #[test]
    fn round_trips_values_through_bytes() {
        let schema = schema();
        let record = Record::new(&schema, &[Value::I32(42), Value::U8(7)], Rid::new(1, 0));
        assert_eq!(record.get_value(&schema, 0), Value::I32(42));
        assert_eq!(record.get_value(&schema, 1), Value::U8(7));
    }

    #[test]
    fn null_values_round_trip() {
        let schema = schema();
        let record = Record::new(&schema, &[Value::Null, Value::U8(1)], Rid::new(1, 0));
        assert!(record.is_null(0));
        assert_eq!(record.get_value(&schema, 0), Value::Null);
        assert_eq!(record.get_value(&schema, 1), Value::U8(1));
    }

    #[test]
    fn project_reshapes_to_target_schema() {
        let schema = schema();
        let record = Record::new(&schema, &[Value::I32(9), Value::U8(3)], Rid::new(2, 1));
        let target = Schema::new(vec![Field::new("name_len", DataType::U8)]);
        let projected = record.project(&schema, &target);
        assert_eq!(projected.get_value(&target, 0), Value::U8(3));
    }
}
