use super::value::DataType;
use crate::pages::bitmap;

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: DataType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// The shape of a record: an ordered list of fixed-width fields. A schema is
/// cheap to clone and is shared (via `Arc`) between a table handle and every
/// record it produces, and between executors and the schemas they project
/// records into.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Sum of every field's byte width: the constant size of a record body
    /// under this schema.
    pub fn rec_size(&self) -> usize {
        self.fields.iter().map(|f| f.ty.size()).sum()
    }

    /// One bit per field, rounded up to a whole byte.
    pub fn nullmap_size(&self) -> usize {
        bitmap::byte_size(self.fields.len())
    }

    /// Byte offset of field `i` within a record body.
    pub fn field_offset(&self, i: usize) -> usize {
        self.fields[..i].iter().map(|f| f.ty.size()).sum()
    }

    /// Builds the schema produced by projecting `self` onto the named
    /// columns, in the order given. Used by the projection executor and by
    /// the sort operator's key schema.
    pub fn project(&self, names: &[&str]) -> Schema {
        let fields = names
            .iter()
            .map(|name| {
                self.fields
                    .iter()
                    .find(|f| f.name == *name)
                    .unwrap_or_else(|| panic!("unknown field {name}"))
                    .clone()
            })
            .collect();
        Schema::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rec_size_and_offsets() {
        let schema = Schema::new(vec![
            Field::new("a", DataType::I32),
            Field::new("b", DataType::I64),
            Field::new("c", DataType::Bool),
        ]);
        assert_eq!(schema.rec_size(), 4 + 8 + 1);
        assert_eq!(schema.field_offset(0), 0);
        assert_eq!(schema.field_offset(1), 4);
        assert_eq!(schema.field_offset(2), 12);
        assert_eq!(schema.nullmap_size(), 1);
    }

    #[test]
    fn project_reorders_and_subsets_fields() {
        let schema = Schema::new(vec![
            Field::new("a", DataType::I32),
            Field::new("b", DataType::I64),
        ]);
        let projected = schema.project(&["b", "a"]);
        assert_eq!(projected.fields[0].name, "b");
        assert_eq!(projected.fields[1].name, "a");
    }
}
