//! Rewriter.
//!
//! Pure, idempotent passes over expressions and algebra values:
//! - constant folding of literal arithmetic and comparisons
//! - boolean normalization (De Morgan, negated comparisons, boolean
//!   conditionals into guarded disjunctions)
//! - tuple component folding and projection flattening
//! - element inlining, which composes chained operations
//!
//! Every pass rebuilds only the nodes it changes; untouched subtrees keep
//! their identity.

mod inline;
mod simplify;

#[cfg(test)]
mod tests;

pub use inline::{flatten_tuple, inline_element, map_expr};
pub use simplify::simplify;

use crate::{algebra::QueryAlgebra, expr::Expr};

/// Simplify every expression held by `query`, including nested queries.
#[must_use]
pub fn rewrite_query(query: &QueryAlgebra) -> QueryAlgebra {
    query.map_expressions(&mut simplify_deep)
}

/// `simplify` that also descends into nested queries.
#[must_use]
pub fn simplify_deep(expr: &Expr) -> Expr {
    let children = expr.children().into_iter().map(simplify_deep).collect();
    let mut node = expr.with_children(children);
    if let Some(query) = node.nested_query().map(rewrite_query) {
        node = node.with_query(query);
    }

    simplify::simplify_node(&node)
}
