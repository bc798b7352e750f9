use crate::{Error, tuple::Pair};
use quarry_core::{
    algebra::{QueryAlgebra, SortDirection, StreamOp},
    closure::Closure,
    render::RenderedQuery,
    translator::Translator,
};
use std::{fmt, marker::PhantomData};

///
/// QueryStream
///
/// Typed view over one immutable algebra value. Every operation returns a
/// new stream and leaves `self` usable, so one stream can be branched into
/// several queries. `T` is the row type callers will get back; it is not
/// checked against the closures, which carry their own types.
///

pub struct QueryStream<T> {
    translator: Translator,
    algebra: QueryAlgebra,
    _row: PhantomData<fn() -> T>,
}

impl<T> QueryStream<T> {
    pub(crate) const fn new(translator: Translator, algebra: QueryAlgebra) -> Self {
        Self {
            translator,
            algebra,
            _row: PhantomData,
        }
    }

    fn apply<U>(&self, op: StreamOp) -> Result<QueryStream<U>, Error> {
        let algebra = self.translator.fold(&self.algebra, &op)?;

        Ok(QueryStream::new(self.translator.clone(), algebra))
    }

    //
    // Row operations
    //

    /// Keep rows the boolean closure accepts.
    pub fn filter(&self, predicate: Closure) -> Result<Self, Error> {
        self.apply(StreamOp::Where(predicate))
    }

    pub fn select<U>(&self, projection: Closure) -> Result<QueryStream<U>, Error> {
        self.apply(StreamOp::Select(projection))
    }

    /// Pair each row with the rows of the stream the closure returns.
    pub fn join<U>(&self, joined: Closure) -> Result<QueryStream<Pair<T, U>>, Error> {
        self.apply(StreamOp::Join(joined))
    }

    pub fn sorted_by(&self, key: Closure) -> Result<Self, Error> {
        self.apply(StreamOp::SortedBy {
            key,
            direction: SortDirection::Asc,
        })
    }

    pub fn sorted_descending_by(&self, key: Closure) -> Result<Self, Error> {
        self.apply(StreamOp::SortedBy {
            key,
            direction: SortDirection::Desc,
        })
    }

    pub fn skip(&self, count: u64) -> Result<Self, Error> {
        self.apply(StreamOp::Skip(count))
    }

    pub fn limit(&self, count: u64) -> Result<Self, Error> {
        self.apply(StreamOp::Limit(count))
    }

    pub fn distinct(&self) -> Result<Self, Error> {
        self.apply(StreamOp::Distinct)
    }

    //
    // Grouping and aggregation
    //

    /// Group rows by `key`; `value` receives each key and its group's stream.
    pub fn group<K, V>(&self, key: Closure, value: Closure) -> Result<QueryStream<Pair<K, V>>, Error> {
        self.apply(StreamOp::Group { key, value })
    }

    /// Collapse the stream with a closure over the whole stream.
    pub fn aggregate<U>(&self, closure: Closure) -> Result<QueryStream<U>, Error> {
        self.apply(StreamOp::Aggregate(closure))
    }

    pub fn count(&self) -> Result<QueryStream<i64>, Error> {
        self.apply(StreamOp::Count)
    }

    pub fn sum<U>(&self, value: Closure) -> Result<QueryStream<U>, Error> {
        self.apply(StreamOp::Sum(value))
    }

    pub fn min<U>(&self, value: Closure) -> Result<QueryStream<U>, Error> {
        self.apply(StreamOp::Min(value))
    }

    pub fn max<U>(&self, value: Closure) -> Result<QueryStream<U>, Error> {
        self.apply(StreamOp::Max(value))
    }

    pub fn avg(&self, value: Closure) -> Result<QueryStream<f64>, Error> {
        self.apply(StreamOp::Avg(value))
    }

    //
    // Inspection
    //

    /// Query text this stream would run, without running it.
    pub fn debug_query_string(&self) -> Result<String, Error> {
        Ok(self.translator.debug_query_string(&self.algebra)?)
    }

    /// Query text together with its bindings and paging.
    pub fn explain(&self) -> Result<RenderedQuery, Error> {
        Ok(self.translator.explain(&self.algebra)?)
    }

    #[must_use]
    pub const fn algebra(&self) -> &QueryAlgebra {
        &self.algebra
    }
}

impl<T> Clone for QueryStream<T> {
    fn clone(&self) -> Self {
        Self::new(self.translator.clone(), self.algebra.clone())
    }
}

impl<T> fmt::Debug for QueryStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryStream")
            .field("row", &std::any::type_name::<T>())
            .field("shape", &self.algebra.shape)
            .field("depth", &self.algebra.depth())
            .finish_non_exhaustive()
    }
}
