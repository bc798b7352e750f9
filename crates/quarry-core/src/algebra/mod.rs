//! Query Algebra.
//!
//! Every stream operation yields a new immutable `QueryAlgebra`. Values are
//! shared behind `Arc`, so branching a stream never mutates its ancestor and
//! a value may be folded from several threads at once. Each value keeps a
//! pointer to the value it was derived from.

mod fold;

#[cfg(test)]
mod tests;

pub(crate) use fold::fold;
pub use fold::StreamOp;

use crate::{
    error::QueryError,
    expr::{Expr, ExprKind, SourceId},
    rewrite,
    value::ValueType,
};
use derive_more::{Deref, Display};
use std::sync::Arc;

///
/// SourceKind
///

#[derive(Clone, Debug, PartialEq)]
pub enum SourceKind {
    /// Every row of a queryable entity.
    Entity(String),
    /// Elements of a collection reached through a navigation path.
    Navigation(Expr),
}

///
/// Source
/// One FROM source. The first source of a query is its root; later ones
/// come from joins.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Source {
    pub id: SourceId,
    pub kind: SourceKind,
    pub row_type: ValueType,
}

impl Source {
    #[must_use]
    pub fn entity(id: SourceId, name: impl Into<String>) -> Self {
        let name = name.into();

        Self {
            id,
            row_type: ValueType::entity(name.clone()),
            kind: SourceKind::Entity(name),
        }
    }

    /// Source over the elements of a collection-typed path.
    #[must_use]
    pub fn navigation(id: SourceId, path: Expr) -> Self {
        let row_type = match &path.ty {
            ValueType::Collection(element) => element.as_ref().clone(),
            other => other.clone(),
        };

        Self {
            id,
            kind: SourceKind::Navigation(path),
            row_type,
        }
    }

    #[must_use]
    pub fn row(&self) -> Expr {
        Expr::row(self.id, self.row_type.clone())
    }
}

///
/// QueryShape
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum QueryShape {
    #[display("rows")]
    Rows,
    #[display("grouped")]
    Grouped,
    #[display("aggregated")]
    Aggregated,
}

///
/// SortDirection
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum SortDirection {
    #[display("ASC")]
    Asc,
    #[display("DESC")]
    Desc,
}

///
/// SortKey
///

#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    pub expr: Expr,
    pub direction: SortDirection,
}

///
/// SelectQuery
///
/// One SELECT statement. Filters are an implicit conjunction; sort keys are
/// listed most significant first.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SelectQuery {
    pub sources: Vec<Source>,
    pub filters: Vec<Expr>,
    pub projection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Vec<Expr>,
    pub order_by: Vec<SortKey>,
    pub shape: QueryShape,
    pub distinct: bool,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub next_source: SourceId,
    pub upstream: Option<QueryAlgebra>,
}

///
/// QueryAlgebra
/// Shared handle to one immutable `SelectQuery`.
///

#[derive(Clone, Debug, Deref)]
#[deref(forward)]
pub struct QueryAlgebra(Arc<SelectQuery>);

impl PartialEq for QueryAlgebra {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0 == *other.0
    }
}

impl QueryAlgebra {
    /// All rows of `entity`, bound to the first source id.
    #[must_use]
    pub fn entity(name: impl Into<String>) -> Self {
        Self::rooted(Source::entity(SourceId(0), name))
    }

    /// Single-source algebra over `source`.
    #[must_use]
    pub fn rooted(source: Source) -> Self {
        let next_source = source.id.next();

        Self(Arc::new(SelectQuery {
            sources: vec![source],
            filters: Vec::new(),
            projection: None,
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            shape: QueryShape::Rows,
            distinct: false,
            skip: None,
            limit: None,
            next_source,
            upstream: None,
        }))
    }

    //
    // Inspection
    //

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[must_use]
    pub fn root(&self) -> Option<&Source> {
        self.sources.first()
    }

    /// Expression for what one emitted row currently is.
    #[must_use]
    pub fn current_row(&self) -> Expr {
        match (&self.projection, self.root()) {
            (Some(projection), _) => projection.clone(),
            (None, Some(root)) => root.row(),
            (None, None) => Expr::constant(crate::value::Value::Null),
        }
    }

    #[must_use]
    pub fn row_type(&self) -> ValueType {
        match (&self.projection, self.root()) {
            (Some(projection), _) => projection.ty.clone(),
            (None, Some(root)) => root.row_type.clone(),
            (None, None) => ValueType::Any,
        }
    }

    /// Whether `other` ranges over the same rows as `self`: identical sources
    /// and filters, whatever each one projects.
    #[must_use]
    pub fn same_scope(&self, other: &Self) -> bool {
        self.sources == other.sources && self.filters == other.filters
    }

    /// Number of values in the derivation chain, `self` included.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut cursor = self.upstream.as_ref();
        while let Some(parent) = cursor {
            depth += 1;
            cursor = parent.upstream.as_ref();
        }

        depth
    }

    //
    // Derivation
    //

    fn derive(&self, next_source: SourceId, edit: impl FnOnce(&mut SelectQuery)) -> Self {
        let mut query = self.0.as_ref().clone();
        query.upstream = Some(self.clone());
        query.next_source = query.next_source.max(next_source);
        edit(&mut query);

        Self(Arc::new(query))
    }

    fn ensure_unbounded(&self, operation: &'static str) -> Result<(), QueryError> {
        if self.skip.is_some() || self.limit.is_some() {
            return Err(QueryError::unsupported(
                operation,
                "stream is already bounded by skip or limit",
            ));
        }

        Ok(())
    }

    fn ensure_shape(&self, operation: &'static str, allowed: &[QueryShape]) -> Result<(), QueryError> {
        if allowed.contains(&self.shape) {
            Ok(())
        } else {
            Err(QueryError::unsupported(
                operation,
                format!("stream is {}", self.shape),
            ))
        }
    }

    /// Add a predicate; after grouping it constrains groups instead of rows.
    pub(crate) fn filtered(&self, predicate: Expr, next: SourceId) -> Result<Self, QueryError> {
        self.ensure_shape("where", &[QueryShape::Rows, QueryShape::Grouped])?;
        self.ensure_unbounded("where")?;
        if !predicate.ty.accepts(&ValueType::Bool) {
            return Err(QueryError::unsupported(
                "where",
                format!("predicate has type {}", predicate.ty),
            ));
        }

        let always = predicate.as_bool() == Some(true);
        let grouped = self.shape == QueryShape::Grouped;

        Ok(self.derive(next, |query| {
            if always {
                return;
            }
            if grouped {
                query.having.push(predicate);
            } else {
                query.filters.push(predicate);
            }
        }))
    }

    pub(crate) fn projected(&self, projection: Expr, next: SourceId) -> Result<Self, QueryError> {
        self.ensure_shape("select", &[QueryShape::Rows])?;
        if self.distinct {
            return Err(QueryError::unsupported(
                "select",
                "projection after distinct needs a sub-query",
            ));
        }

        Ok(self.derive(next, |query| query.projection = Some(projection)))
    }

    /// Pair every current row with every row of `other`.
    pub(crate) fn joined(&self, other: &Self, next: SourceId) -> Result<Self, QueryError> {
        self.ensure_shape("join", &[QueryShape::Rows])?;
        self.ensure_unbounded("join")?;
        if self.distinct {
            return Err(QueryError::unsupported("join", "stream is distinct"));
        }
        let joinable = other.sources.len() == 1
            && other.projection.is_none()
            && other.shape == QueryShape::Rows
            && other.order_by.is_empty()
            && !other.distinct
            && other.skip.is_none()
            && other.limit.is_none();
        if !joinable {
            return Err(QueryError::unsupported(
                "join",
                "joined stream must be a plain source with optional filters",
            ));
        }
        if self.sources.iter().any(|source| source.id == other.sources[0].id) {
            return Err(QueryError::unsupported("join", "joined stream reuses a source"));
        }

        let pair = Expr::tuple(vec![self.current_row(), other.current_row()]);

        Ok(self.derive(next.max(other.next_source), |query| {
            query.sources.extend(other.sources.iter().cloned());
            query.filters.extend(other.filters.iter().cloned());
            query.projection = Some(pair);
        }))
    }

    /// Group rows by `key`; each group emits `(key, value)`.
    pub(crate) fn grouped(&self, key: Expr, value: Expr, next: SourceId) -> Result<Self, QueryError> {
        self.ensure_shape("group", &[QueryShape::Rows])?;
        self.ensure_unbounded("group")?;
        if self.distinct {
            return Err(QueryError::unsupported("group", "stream is distinct"));
        }
        let keys = rewrite::flatten_tuple(&key);
        let mut allowed = keys.clone();
        allowed.push(key.clone());
        ensure_aggregate_only("group", &value, &self.sources, &allowed)?;

        let row = Expr::tuple(vec![key, value]);

        Ok(self.derive(next, |query| {
            query.group_by = keys;
            query.projection = Some(row);
            query.shape = QueryShape::Grouped;
        }))
    }

    /// Collapse the stream into one row of aggregate values. Row ordering
    /// has no meaning for a single row and is dropped.
    pub(crate) fn aggregated(&self, value: Expr, next: SourceId) -> Result<Self, QueryError> {
        self.ensure_shape("aggregate", &[QueryShape::Rows])?;
        self.ensure_unbounded("aggregate")?;
        if self.distinct {
            return Err(QueryError::unsupported(
                "aggregate",
                "aggregating distinct rows needs a sub-query",
            ));
        }
        ensure_aggregate_only("aggregate", &value, &self.sources, &[])?;

        Ok(self.derive(next, |query| {
            query.projection = Some(value);
            query.shape = QueryShape::Aggregated;
            query.order_by.clear();
        }))
    }

    /// Make `key` the most significant sort key.
    pub(crate) fn sorted(
        &self,
        key: Expr,
        direction: SortDirection,
        next: SourceId,
    ) -> Result<Self, QueryError> {
        self.ensure_shape("sorted_by", &[QueryShape::Rows, QueryShape::Grouped])?;
        self.ensure_unbounded("sorted_by")?;
        if !key.ty.is_orderable() {
            return Err(QueryError::unsupported(
                "sorted_by",
                format!("sort key has type {}", key.ty),
            ));
        }

        Ok(self.derive(next, |query| {
            query.order_by.insert(0, SortKey { expr: key, direction });
        }))
    }

    pub(crate) fn skipped(&self, count: u64) -> Result<Self, QueryError> {
        self.ensure_shape("skip", &[QueryShape::Rows, QueryShape::Grouped])?;
        if self.limit.is_some() {
            return Err(QueryError::unsupported("skip", "skip after limit needs a sub-query"));
        }

        Ok(self.derive(self.next_source, |query| {
            query.skip = Some(query.skip.unwrap_or(0).saturating_add(count));
        }))
    }

    pub(crate) fn limited(&self, count: u64) -> Result<Self, QueryError> {
        self.ensure_shape("limit", &[QueryShape::Rows, QueryShape::Grouped])?;

        Ok(self.derive(self.next_source, |query| {
            query.limit = Some(query.limit.map_or(count, |current| current.min(count)));
        }))
    }

    pub(crate) fn distinct_rows(&self) -> Result<Self, QueryError> {
        self.ensure_shape("distinct", &[QueryShape::Rows, QueryShape::Grouped])?;
        self.ensure_unbounded("distinct")?;

        Ok(self.derive(self.next_source, |query| query.distinct = true))
    }

    /// Same rows, projecting a single aggregate. Used to render a scalar
    /// sub-select over a scope that is not the enclosing one.
    #[must_use]
    pub(crate) fn scalar(&self, value: Expr) -> Self {
        let mut query = self.0.as_ref().clone();
        query.projection = Some(value);
        query.shape = QueryShape::Aggregated;
        query.order_by.clear();

        Self(Arc::new(query))
    }

    /// Apply `map` to every expression this query holds directly. Nested
    /// queries are left to `map` itself. Returns `self` when nothing changed.
    #[must_use]
    pub fn map_expressions(&self, map: &mut dyn FnMut(&Expr) -> Expr) -> Self {
        let mut changed = false;
        let mut apply = |expr: &Expr| {
            let mapped = map(expr);
            changed |= !mapped.ptr_eq(expr);
            mapped
        };

        let sources = self
            .sources
            .iter()
            .map(|source| match &source.kind {
                SourceKind::Navigation(path) => Source {
                    kind: SourceKind::Navigation(apply(path)),
                    ..source.clone()
                },
                SourceKind::Entity(_) => source.clone(),
            })
            .collect();
        let filters = self.filters.iter().map(&mut apply).collect();
        let projection = self.projection.as_ref().map(&mut apply);
        let group_by = self.group_by.iter().map(&mut apply).collect();
        let having = self.having.iter().map(&mut apply).collect();
        let order_by = self
            .order_by
            .iter()
            .map(|key| SortKey {
                expr: apply(&key.expr),
                direction: key.direction,
            })
            .collect();

        if !changed {
            return self.clone();
        }

        Self(Arc::new(SelectQuery {
            sources,
            filters,
            projection,
            group_by,
            having,
            order_by,
            ..self.0.as_ref().clone()
        }))
    }
}

// Grouped and aggregated projections may only read this query's rows
// through aggregates or group keys.
fn ensure_aggregate_only(
    operation: &'static str,
    value: &Expr,
    sources: &[Source],
    keys: &[Expr],
) -> Result<(), QueryError> {
    fn reads_rows(expr: &Expr, sources: &[Source], keys: &[Expr]) -> bool {
        if keys.contains(expr) {
            return false;
        }
        match expr.kind() {
            ExprKind::Row(id) => sources.iter().any(|source| source.id == *id),
            ExprKind::Aggregate { .. } | ExprKind::SubQuery(_) => false,
            _ => expr
                .children()
                .into_iter()
                .any(|child| reads_rows(child, sources, keys)),
        }
    }

    if reads_rows(value, sources, keys) {
        return Err(QueryError::unsupported(
            operation,
            "value reads stream rows outside an aggregate",
        ));
    }

    Ok(())
}
