use crate::value::ValueType;

///
/// FieldModel
/// Runtime field metadata used by path resolution.
///

#[derive(Debug)]
pub struct FieldModel {
    /// Field name as rendered in path expressions.
    pub name: &'static str,
    /// Accessor method a closure calls to read the field.
    pub accessor: &'static str,
    pub kind: FieldKind,
}

impl FieldModel {
    #[must_use]
    pub const fn new(name: &'static str, accessor: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            accessor,
            kind,
        }
    }
}

///
/// FieldKind
///
/// Minimal type surface needed by the translator.
/// This is a lossy projection of whatever the persistence layer stores.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    Bool,
    Int,
    Long,
    Double,
    Text,

    /// Single-valued association to another entity.
    Entity(&'static str),
    /// Collection-valued association; only usable as a join or sub-query source.
    Collection(&'static str),
}

impl FieldKind {
    #[must_use]
    pub fn value_type(self) -> ValueType {
        match self {
            Self::Bool => ValueType::Bool,
            Self::Int => ValueType::Int,
            Self::Long => ValueType::Long,
            Self::Double => ValueType::Double,
            Self::Text => ValueType::Text,
            Self::Entity(name) => ValueType::entity(name),
            Self::Collection(name) => ValueType::Collection(Box::new(ValueType::entity(name))),
        }
    }
}
