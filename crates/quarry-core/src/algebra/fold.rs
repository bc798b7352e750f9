use crate::{
    algebra::{QueryAlgebra, SortDirection},
    closure::Closure,
    error::QueryError,
    expr::{AggregateFn, Expr, ExprKind, SourceId},
    handler::{ArgumentHandler, HandlerChain},
    rewrite,
    symbolic::{self, Environment},
    value::ValueType,
};

///
/// StreamOp
/// One stream operation, with the closures it was called with.
///

#[derive(Clone, Debug)]
pub enum StreamOp {
    Where(Closure),
    Select(Closure),
    /// Closure of `(row, source)` returning the stream to pair rows with.
    Join(Closure),
    /// Key closure, then a closure of `(key, stream)` producing each group's value.
    Group {
        key: Closure,
        value: Closure,
    },
    /// Closure of `(stream)` producing one aggregate value.
    Aggregate(Closure),
    Count,
    Sum(Closure),
    Min(Closure),
    Max(Closure),
    Avg(Closure),
    SortedBy {
        key: Closure,
        direction: SortDirection,
    },
    Skip(u64),
    Limit(u64),
    Distinct,
}

impl StreamOp {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Where(_) => "where",
            Self::Select(_) => "select",
            Self::Join(_) => "join",
            Self::Group { .. } => "group",
            Self::Aggregate(_) => "aggregate",
            Self::Count => "count",
            Self::Sum(_) => "sum",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Avg(_) => "avg",
            Self::SortedBy { .. } => "sorted_by",
            Self::Skip(_) => "skip",
            Self::Limit(_) => "limit",
            Self::Distinct => "distinct",
        }
    }
}

/// Fold one operation onto `query`. Closures are translated against the
/// query's current row; the input value is never touched.
pub(crate) fn fold(
    query: &QueryAlgebra,
    op: &StreamOp,
    env: Environment<'_>,
) -> Result<QueryAlgebra, QueryError> {
    let mut next = query.next_source;

    match op {
        StreamOp::Where(closure) => {
            let predicate = over_row(query, closure, env, &mut next)?;
            query.filtered(predicate, next)
        }

        StreamOp::Select(closure) => {
            let projection = over_row(query, closure, env, &mut next)?;
            query.projected(projection, next)
        }

        StreamOp::Join(closure) => {
            let joined = over_row(query, closure, env, &mut next)?;
            match joined.kind() {
                ExprKind::SubQuery(other) => query.joined(other, next),
                _ => Err(QueryError::unsupported(
                    "join",
                    format!("closure returned {}, not a stream", joined.ty),
                )),
            }
        }

        StreamOp::Group { key, value } => {
            let key = over_row(query, key, env, &mut next)?;
            let value = over_group(query, value, &key, env, &mut next)?;
            query.grouped(key, value, next)
        }

        StreamOp::Aggregate(closure) => {
            let value = over_stream(query, closure, env, &mut next)?;
            query.aggregated(value, next)
        }

        StreamOp::Count => {
            let count = Expr::aggregate(AggregateFn::Count, None, query.clone());
            query.aggregated(count, next)
        }
        StreamOp::Sum(closure) => aggregate(query, AggregateFn::Sum, closure, env, &mut next),
        StreamOp::Min(closure) => aggregate(query, AggregateFn::Min, closure, env, &mut next),
        StreamOp::Max(closure) => aggregate(query, AggregateFn::Max, closure, env, &mut next),
        StreamOp::Avg(closure) => aggregate(query, AggregateFn::Avg, closure, env, &mut next),

        StreamOp::SortedBy { key, direction } => {
            let key = over_row(query, key, env, &mut next)?;
            query.sorted(key, *direction, next)
        }

        StreamOp::Skip(count) => query.skipped(*count),
        StreamOp::Limit(count) => query.limited(*count),
        StreamOp::Distinct => query.distinct_rows(),
    }
}

fn aggregate(
    query: &QueryAlgebra,
    func: AggregateFn,
    closure: &Closure,
    env: Environment<'_>,
    next: &mut SourceId,
) -> Result<QueryAlgebra, QueryError> {
    let arg = over_row(query, closure, env, next)?;
    if matches!(func, AggregateFn::Sum | AggregateFn::Avg) && !arg.ty.is_numeric() {
        return Err(QueryError::unsupported(
            "aggregate",
            format!("{func} over {}", arg.ty),
        ));
    }

    query.aggregated(Expr::aggregate(func, Some(arg), query.clone()), *next)
}

// Closure of one parameter, the current row.
fn over_row(
    query: &QueryAlgebra,
    closure: &Closure,
    env: Environment<'_>,
    next: &mut SourceId,
) -> Result<Expr, QueryError> {
    let mut chain = HandlerChain::new();
    let params = chain.push(ArgumentHandler::parameters(closure), None);
    let head = chain.push_stream_element(query.row_type(), Some(params));

    let expr = symbolic::translate(closure, &mut chain, head, env, next)?;

    Ok(rewrite::inline_element(&expr, head.scope(), &query.current_row()))
}

// Closure of `(key, stream)`; the stream is the pre-group query.
fn over_group(
    query: &QueryAlgebra,
    closure: &Closure,
    key: &Expr,
    env: Environment<'_>,
    next: &mut SourceId,
) -> Result<Expr, QueryError> {
    let mut chain = HandlerChain::new();
    let params = chain.push(ArgumentHandler::parameters(closure), None);
    let stream = chain.push(
        ArgumentHandler::SubQuery {
            query: query.clone(),
        },
        Some(params),
    );
    let head = chain.push_stream_element(key.ty.clone(), Some(stream));

    let expr = symbolic::translate(closure, &mut chain, head, env, next)?;

    Ok(rewrite::inline_element(&expr, head.scope(), key))
}

// Closure of one stream parameter.
fn over_stream(
    query: &QueryAlgebra,
    closure: &Closure,
    env: Environment<'_>,
    next: &mut SourceId,
) -> Result<Expr, QueryError> {
    if !matches!(closure.body.params.first(), Some(ValueType::Stream(_))) {
        return Err(QueryError::unsupported(
            "aggregate",
            "closure parameter is not a stream",
        ));
    }

    let mut chain = HandlerChain::new();
    let params = chain.push(ArgumentHandler::parameters(closure), None);
    let head = chain.push(
        ArgumentHandler::SubQuery {
            query: query.clone(),
        },
        Some(params),
    );

    let expr = symbolic::translate(closure, &mut chain, head, env, next)?;

    Ok(rewrite::simplify(&expr))
}
