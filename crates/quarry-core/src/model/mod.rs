//! Entity metadata consumed by the translator.
//!
//! The translator never loads metadata itself; it only asks a
//! `MetadataProvider` whether a type is queryable and how an accessor maps
//! onto a stored field.

mod entity;
mod field;


pub use entity::EntityModel;
pub use field::{FieldKind, FieldModel};

use crate::value::ValueType;
use std::{collections::BTreeMap, fmt};

///
/// MetadataProvider
///
/// Read-only lookup surface. Implementations must be safe to share across
/// concurrent translations.
///

pub trait MetadataProvider: Send + Sync {
    /// Map an accessor call on `entity` to the field it reads.
    fn resolve_field(&self, entity: &str, accessor: &str) -> Option<FieldRef>;

    fn is_queryable_entity(&self, entity: &str) -> bool;
}

///
/// FieldRef
/// Resolved field reference embedded in `Path` expressions.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
    pub ty: ValueType,
}

impl FieldRef {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            ty,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

///
/// Metamodel
///
/// Registry of static entity models; the default `MetadataProvider`.
///

#[derive(Debug, Default)]
pub struct Metamodel {
    entities: BTreeMap<&'static str, &'static EntityModel>,
}

impl Metamodel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity model; a later registration under the same name wins.
    #[must_use]
    pub fn with(mut self, model: &'static EntityModel) -> Self {
        self.register(model);
        self
    }

    pub fn register(&mut self, model: &'static EntityModel) {
        self.entities.insert(model.name, model);
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&'static EntityModel> {
        self.entities.get(name).copied()
    }

    pub fn entities(&self) -> impl Iterator<Item = &'static EntityModel> + '_ {
        self.entities.values().copied()
    }
}

impl MetadataProvider for Metamodel {
    fn resolve_field(&self, entity: &str, accessor: &str) -> Option<FieldRef> {
        let model = self.entity(entity)?;
        let field = model.field_by_accessor(accessor)?;

        Some(FieldRef::new(model.name, field.name, field.kind.value_type()))
    }

    fn is_queryable_entity(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }
}
