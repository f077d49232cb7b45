use typed_builder::TypedBuilder;

/// Immutable column descriptor (spec §3). Two fields are equal iff every
/// attribute matches.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    pub type_code: i32,
    pub type_name: String,
    pub nullable: bool,
    #[builder(default = 0)]
    pub precision: i32,
    #[builder(default = 0)]
    pub scale: i32,
    #[builder(default = true)]
    pub signed: bool,
}

impl Field {
    /// Synthetic field name for a row whose producer didn't supply one:
    /// `results` at arity 1, `field1…fieldN` otherwise (spec §3).
    pub fn synthetic_name(index: usize, arity: usize) -> String {
        if arity == 1 {
            "results".to_string()
        } else {
            format!("field{}", index + 1)
        }
    }

    pub fn synthetic(index: usize, arity: usize, type_name: impl Into<String>) -> Self {
        Field::builder()
            .name(Self::synthetic_name(index, arity))
            .type_code(0)
            .type_name(type_name.into())
            .nullable(true)
            .build()
    }
}
