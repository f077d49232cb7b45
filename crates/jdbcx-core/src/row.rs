use crate::field::Field;
use crate::value::Value;

/// Fixed-arity, ordered tuple of fields + values (spec §3). Equality is
/// structural.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Vec<Field>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(fields: Vec<Field>, values: Vec<Value>) -> Self {
        debug_assert_eq!(fields.len(), values.len(), "row arity mismatch");
        Self { fields, values }
    }

    /// Builds a row whose fields are all synthetically named.
    pub fn synthetic(type_name: &str, values: Vec<Value>) -> Self {
        let arity = values.len();
        let fields = (0..arity)
            .map(|i| Field::synthetic(i, arity, type_name))
            .collect();
        Self { fields, values }
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn value(&self, i: usize) -> &Value {
        &self.values[i]
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}
