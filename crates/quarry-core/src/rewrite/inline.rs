use super::simplify_deep;
use crate::expr::{ElementScope, Expr, ExprKind};

/// Rebuild `expr` top-down. Wherever `replace` answers `Some`, the node is
/// swapped for the answer without descending into it; otherwise children
/// and nested queries are mapped in turn.
pub fn map_expr(expr: &Expr, replace: &mut dyn FnMut(&Expr) -> Option<Expr>) -> Expr {
    if let Some(replacement) = replace(expr) {
        return replacement;
    }

    let children = expr
        .children()
        .into_iter()
        .map(|child| map_expr(child, &mut *replace))
        .collect();
    let node = expr.with_children(children);

    match node.nested_query() {
        Some(query) => {
            let mapped = query.map_expressions(&mut |inner| map_expr(inner, &mut *replace));
            node.with_query(mapped)
        }
        None => node,
    }
}

/// Substitute `row` for every element placeholder of `scope`, then simplify
/// so tuple components resolve back to the expressions they were built from.
#[must_use]
pub fn inline_element(expr: &Expr, scope: ElementScope, row: &Expr) -> Expr {
    let inlined = map_expr(expr, &mut |node| match node.kind() {
        ExprKind::Element(s) if *s == scope => Some(row.clone()),
        _ => None,
    });

    simplify_deep(&inlined)
}

/// Components of a projection, nested tuples flattened in construction order.
#[must_use]
pub fn flatten_tuple(expr: &Expr) -> Vec<Expr> {
    match expr.kind() {
        ExprKind::Tuple(items) => items.iter().flat_map(flatten_tuple).collect(),
        _ => vec![expr.clone()],
    }
}
