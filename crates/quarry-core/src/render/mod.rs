//! Renderer.
//!
//! Turns an algebra value into query text plus its ordered bindings. Every
//! compound sub-expression is parenthesized. Aliases are handed out in source
//! order (`A`, `B`, ...) and placeholders in first-use order, so rendering
//! the same value twice yields identical output.

#[cfg(test)]
mod tests;

use crate::{
    algebra::{QueryAlgebra, SourceKind},
    closure::{CaptureCell, ClosureId},
    config::TranslatorConfig,
    error::QueryError,
    expr::{ArithOp, BinaryOp, BindingRef, Expr, ExprKind, SourceId, UnaryOp},
    rewrite,
    value::{Value, ValueType},
};
use std::{collections::HashMap, fmt};

///
/// Binding
/// One external parameter of a rendered query.
///

#[derive(Clone, Debug)]
pub struct Binding {
    pub index: usize,
    pub name: String,
    pub ty: ValueType,
    pub closure: ClosureId,
    pub slot: usize,
    cell: CaptureCell,
}

impl Binding {
    /// Read the captured value now.
    #[must_use]
    pub fn value(&self) -> Value {
        self.cell.read()
    }
}

impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.name == other.name
            && self.ty == other.ty
            && self.closure == other.closure
            && self.slot == other.slot
    }
}

///
/// RenderedQuery
///

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedQuery {
    pub text: String,
    pub bindings: Vec<Binding>,
    pub first_result: Option<u64>,
    pub max_results: Option<u64>,
}

impl fmt::Display for RenderedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Render `query` after a final rewrite pass.
pub fn render(query: &QueryAlgebra, config: &TranslatorConfig) -> Result<RenderedQuery, QueryError> {
    let query = rewrite::rewrite_query(query);
    let mut renderer = Renderer::new(config);
    let text = renderer.select(&query)?;

    Ok(RenderedQuery {
        text,
        bindings: renderer.bindings,
        first_result: query.skip,
        max_results: query.limit,
    })
}

/// Bijective base-26 alias: `A`..`Z`, then `AA`, `AB`, ...
fn alias_name(mut n: usize) -> String {
    let mut name = Vec::new();
    loop {
        #[expect(clippy::cast_possible_truncation)]
        name.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    name.reverse();

    String::from_utf8_lossy(&name).into_owned()
}

///
/// Renderer
///

struct Renderer<'c> {
    config: &'c TranslatorConfig,
    aliases: HashMap<SourceId, String>,
    bindings: Vec<Binding>,
    scopes: Vec<QueryAlgebra>,
}

impl<'c> Renderer<'c> {
    fn new(config: &'c TranslatorConfig) -> Self {
        Self {
            config,
            aliases: HashMap::new(),
            bindings: Vec::new(),
            scopes: Vec::new(),
        }
    }

    fn select(&mut self, query: &QueryAlgebra) -> Result<String, QueryError> {
        for source in &query.sources {
            if !self.aliases.contains_key(&source.id) {
                let alias = alias_name(self.aliases.len());
                self.aliases.insert(source.id, alias);
            }
        }
        self.scopes.push(query.clone());

        let mut text = String::from("SELECT ");
        if query.distinct {
            text.push_str("DISTINCT ");
        }
        text.push_str(&self.projection(query)?);
        text.push_str(" FROM ");
        text.push_str(&self.sources(query)?);

        if !query.filters.is_empty() {
            text.push_str(" WHERE ");
            text.push_str(&self.conjunction(&query.filters)?);
        }
        if !query.group_by.is_empty() {
            text.push_str(" GROUP BY ");
            text.push_str(&self.list(&query.group_by)?);
        }
        if !query.having.is_empty() {
            text.push_str(" HAVING ");
            text.push_str(&self.conjunction(&query.having)?);
        }
        if !query.order_by.is_empty() {
            let keys = query
                .order_by
                .iter()
                .map(|key| Ok(format!("{} {}", self.expr(&key.expr)?, key.direction)))
                .collect::<Result<Vec<_>, QueryError>>()?;
            text.push_str(" ORDER BY ");
            text.push_str(&keys.join(", "));
        }

        self.scopes.pop();

        Ok(text)
    }

    fn projection(&mut self, query: &QueryAlgebra) -> Result<String, QueryError> {
        match &query.projection {
            Some(projection) => self.list(&rewrite::flatten_tuple(projection)),
            None => {
                let root = query
                    .root()
                    .ok_or_else(|| QueryError::render("query has no source"))?;
                self.alias(root.id)
            }
        }
    }

    fn sources(&mut self, query: &QueryAlgebra) -> Result<String, QueryError> {
        let mut text = String::new();

        for (i, source) in query.sources.iter().enumerate() {
            let alias = self.alias(source.id)?;
            match (&source.kind, i) {
                (SourceKind::Entity(name), 0) => text.push_str(&format!("{name} {alias}")),
                (SourceKind::Entity(name), _) => text.push_str(&format!(", {name} {alias}")),
                (SourceKind::Navigation(path), 0) => {
                    text.push_str(&format!("{} {alias}", self.path(path)?));
                }
                (SourceKind::Navigation(path), _) => {
                    text.push_str(&format!(" JOIN {} {alias}", self.path(path)?));
                }
            }
        }

        Ok(text)
    }

    fn list(&mut self, exprs: &[Expr]) -> Result<String, QueryError> {
        let rendered = exprs
            .iter()
            .map(|expr| self.expr(expr))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rendered.join(", "))
    }

    fn conjunction(&mut self, exprs: &[Expr]) -> Result<String, QueryError> {
        let mut text: Option<String> = None;
        for expr in exprs {
            let next = self.expr(expr)?;
            text = Some(match text {
                Some(prev) => format!("({prev} AND {next})"),
                None => next,
            });
        }

        Ok(text.unwrap_or_else(|| "TRUE".to_string()))
    }

    fn alias(&self, id: SourceId) -> Result<String, QueryError> {
        self.aliases
            .get(&id)
            .cloned()
            .ok_or_else(|| QueryError::render(format!("source {id} has no alias")))
    }

    fn param(&mut self, binding: &BindingRef) -> String {
        let existing = self
            .bindings
            .iter()
            .find(|b| b.slot == binding.slot && b.cell.same_cell(&binding.cell));
        if let Some(existing) = existing {
            return format!(":{}", existing.name);
        }

        let index = self.bindings.len();
        let name = format!("{}{index}", self.config.param_prefix);
        self.bindings.push(Binding {
            index,
            name: name.clone(),
            ty: binding.ty.clone(),
            closure: binding.closure,
            slot: binding.slot,
            cell: binding.cell.clone(),
        });

        format!(":{name}")
    }

    // `alias.field.field` without the surrounding parentheses.
    fn path(&self, expr: &Expr) -> Result<String, QueryError> {
        match expr.kind() {
            ExprKind::Row(id) => self.alias(*id),
            ExprKind::Path { base, field } => Ok(format!("{}.{}", self.path(base)?, field.name)),
            _ => Err(QueryError::render(format!(
                "path rooted at a {} value",
                expr.ty
            ))),
        }
    }

    fn in_scope(&self, over: &QueryAlgebra) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.ptr_eq(over) || scope.same_scope(over))
    }

    fn expr(&mut self, expr: &Expr) -> Result<String, QueryError> {
        let text = match expr.kind() {
            ExprKind::Constant(value) => value.to_literal(),
            ExprKind::Param(binding) => self.param(binding),
            ExprKind::Row(id) => self.alias(*id)?,
            ExprKind::Path { .. } => format!("({})", self.path(expr)?),

            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => format!("(NOT {})", self.expr(operand)?),
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } => format!("(-{})", self.expr(operand)?),

            ExprKind::Binary { op, left, right } => {
                let l = self.expr(left)?;
                let r = self.expr(right)?;
                match op {
                    BinaryOp::Arith(ArithOp::Rem) => format!("MOD({l}, {r})"),
                    BinaryOp::Arith(op) => format!("({l} {op} {r})"),
                    BinaryOp::Compare(op) => format!("({l} {op} {r})"),
                    BinaryOp::And => format!("({l} AND {r})"),
                    BinaryOp::Or => format!("({l} OR {r})"),
                    BinaryOp::Concat => format!("CONCAT({l}, {r})"),
                    BinaryOp::Like => format!("({l} LIKE {r})"),
                }
            }

            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                let c = self.expr(cond)?;
                let a = self.expr(then)?;
                let b = self.expr(otherwise)?;
                format!("(CASE WHEN {c} THEN {a} ELSE {b} END)")
            }

            ExprKind::Call { func, args } => format!("{func}({})", self.list(args)?),

            ExprKind::Aggregate { func, arg, over } => {
                if self.in_scope(over) {
                    let inner = match arg {
                        Some(arg) => self.expr(arg)?,
                        None => {
                            let root = over
                                .root()
                                .ok_or_else(|| QueryError::render("aggregate over no source"))?;
                            self.alias(root.id)?
                        }
                    };
                    format!("{func}({inner})")
                } else {
                    let scalar = over.scalar(expr.clone());
                    format!("({})", self.select(&scalar)?)
                }
            }

            ExprKind::SubQuery(query) => format!("({})", self.select(query)?),

            ExprKind::Element(scope) => {
                return Err(QueryError::render(format!(
                    "stream element {scope} was never inlined"
                )));
            }
            ExprKind::TupleGet { index, .. } => {
                return Err(QueryError::render(format!(
                    "tuple component {index} has no textual form"
                )));
            }
            ExprKind::Tuple(_) => {
                return Err(QueryError::render("tuple outside a projection"));
            }
        };

        Ok(text)
    }
}
