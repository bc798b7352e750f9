//! ## Crate layout
//! - `core`: the closure-to-query compiler (evaluator, algebra, rewriter, renderer).
//! - `entity`: the `Entity` trait and the `StreamProvider` that opens streams.
//! - `stream`: `QueryStream`, the typed fluent surface over the query algebra.
//! - `tuple`: `Pair` and `Tuple3` result rows.
//! - `error`: the public error type.
//!
//! The `prelude` module mirrors what host code needs to build and inspect
//! queries.

pub use quarry_core as core;

pub mod entity;
pub mod error;
pub mod stream;
pub mod tuple;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::Error;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        entity::{Entity, StreamProvider},
        error::{Error, ErrorKind, ErrorOrigin},
        stream::QueryStream,
        tuple::{Pair, Tuple3},
    };
    pub use quarry_core::prelude::*;
}
