//! Core compiler for Quarry: symbolic evaluation of compiled query closures,
//! the immutable query algebra they fold into, and the rewriter/renderer
//! that turn that algebra into query text.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod algebra;
pub mod closure;
pub mod config;
pub mod error;
pub mod expr;
pub mod handler;
pub mod model;
pub mod render;
pub mod rewrite;
pub mod symbolic;
pub mod translator;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No evaluator internals or rewriter passes are re-exported here.
///

pub mod prelude {
    pub use crate::{
        algebra::{QueryAlgebra, SortDirection, StreamOp},
        closure::{CaptureCell, Closure, ClosureBody, ClosureBuilder, ClosureId, Instruction},
        error::{ErrorClass, QueryError, TranslateError},
        model::{EntityModel, FieldKind, FieldModel, MetadataProvider, Metamodel},
        render::{Binding, RenderedQuery},
        translator::Translator,
        value::{Value, ValueType},
    };
}
