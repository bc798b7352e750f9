use crate::{
    algebra::{self, QueryAlgebra, StreamOp},
    closure::Closure,
    config::TranslatorConfig,
    error::{QueryError, TranslateError},
    expr::{Expr, SourceId},
    handler::{HandlerChain, HandlerId},
    model::MetadataProvider,
    render::{self, RenderedQuery},
    symbolic::{self, Environment},
};
use std::sync::Arc;

///
/// Translator
///
/// Entry point of the core: owns the metadata provider and configuration and
/// exposes translate, fold and render. Cheap to clone and safe to share;
/// every call is pure.
///

#[derive(Clone)]
pub struct Translator {
    metadata: Arc<dyn MetadataProvider>,
    config: Arc<TranslatorConfig>,
}

impl Translator {
    #[must_use]
    pub fn new(metadata: impl MetadataProvider + 'static) -> Self {
        Self::with_config(metadata, TranslatorConfig::default())
    }

    #[must_use]
    pub fn with_config(metadata: impl MetadataProvider + 'static, config: TranslatorConfig) -> Self {
        Self {
            metadata: Arc::new(metadata),
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    fn env(&self) -> Environment<'_> {
        Environment {
            metadata: self.metadata.as_ref(),
            config: &self.config,
        }
    }

    /// Root algebra streaming every row of `entity`.
    pub fn stream_all(&self, entity: &str) -> Result<QueryAlgebra, QueryError> {
        if !self.metadata.is_queryable_entity(entity) {
            return Err(QueryError::UnknownEntity(entity.to_string()));
        }

        Ok(QueryAlgebra::entity(entity))
    }

    /// Translate one closure against an explicit handler chain. Streams the
    /// closure opens take their source ids from `next_source`.
    pub fn translate(
        &self,
        closure: &Closure,
        chain: &mut HandlerChain,
        head: HandlerId,
        next_source: &mut SourceId,
    ) -> Result<Expr, TranslateError> {
        symbolic::translate(closure, chain, head, self.env(), next_source)
    }

    /// Fold one stream operation; `query` is left untouched.
    pub fn fold(&self, query: &QueryAlgebra, op: &StreamOp) -> Result<QueryAlgebra, QueryError> {
        match algebra::fold(query, op, self.env()) {
            Ok(folded) => {
                tracing::debug!(op = op.name(), shape = %folded.shape, depth = folded.depth(), "folded stream operation");
                Ok(folded)
            }
            Err(err) => {
                tracing::debug!(op = op.name(), class = %err.class(), error = %err, "stream operation not translatable");
                Err(err)
            }
        }
    }

    /// Render `query` into text, bindings and paging.
    pub fn explain(&self, query: &QueryAlgebra) -> Result<RenderedQuery, QueryError> {
        render::render(query, &self.config)
    }

    /// Rendered text only, without executing anything.
    pub fn debug_query_string(&self, query: &QueryAlgebra) -> Result<String, QueryError> {
        self.explain(query).map(|rendered| rendered.text)
    }
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
