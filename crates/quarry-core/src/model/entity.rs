use crate::model::field::FieldModel;

///
/// EntityModel
/// Minimal runtime model for one queryable entity.
///

#[derive(Debug)]
pub struct EntityModel {
    /// Stable external name used in rendered query text.
    pub name: &'static str,
    /// Ordered field list (authoritative for accessor resolution).
    pub fields: &'static [FieldModel],
}

impl EntityModel {
    #[must_use]
    pub const fn new(name: &'static str, fields: &'static [FieldModel]) -> Self {
        Self { name, fields }
    }

    /// Find the field exposed through a getter-style accessor, or by its bare name.
    #[must_use]
    pub fn field_by_accessor(&self, accessor: &str) -> Option<&'static FieldModel> {
        self.fields
            .iter()
            .find(|field| field.accessor == accessor)
            .or_else(|| self.fields.iter().find(|field| field.name == accessor))
    }
}
