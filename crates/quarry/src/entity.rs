use crate::{Error, stream::QueryStream};
use quarry_core::{
    config::TranslatorConfig,
    model::{EntityModel, Metamodel},
    translator::Translator,
};

///
/// Entity
///
/// A queryable row type. The model tells the translator which accessors
/// closures may call on it and which field each one reads.
///

pub trait Entity: 'static {
    const MODEL: &'static EntityModel;
}

///
/// StreamProvider
///
/// Hands out query streams over registered entities. Cheap to clone; every
/// stream it creates shares one translator.
///

#[derive(Clone, Debug)]
pub struct StreamProvider {
    translator: Translator,
}

impl StreamProvider {
    #[must_use]
    pub fn builder() -> StreamProviderBuilder {
        StreamProviderBuilder::default()
    }

    #[must_use]
    pub const fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Stream every row of `E`.
    pub fn stream_all<E: Entity>(&self) -> Result<QueryStream<E>, Error> {
        let algebra = self.translator.stream_all(E::MODEL.name)?;
        tracing::debug!(entity = E::MODEL.name, "opened query stream");

        Ok(QueryStream::new(self.translator.clone(), algebra))
    }
}

///
/// StreamProviderBuilder
///

#[derive(Debug, Default)]
pub struct StreamProviderBuilder {
    metamodel: Metamodel,
    config: TranslatorConfig,
}

impl StreamProviderBuilder {
    #[must_use]
    pub fn entity<E: Entity>(self) -> Self {
        self.model(E::MODEL)
    }

    #[must_use]
    pub fn model(mut self, model: &'static EntityModel) -> Self {
        self.metamodel.register(model);
        self
    }

    #[must_use]
    pub fn config(mut self, config: TranslatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the configuration with one parsed from TOML.
    pub fn config_toml(self, source: &str) -> Result<Self, Error> {
        let config = TranslatorConfig::from_toml_str(source)?;

        Ok(self.config(config))
    }

    #[must_use]
    pub fn build(self) -> StreamProvider {
        let entities = self.metamodel.entities().count();
        tracing::debug!(entities, max_branches = self.config.max_branches, "stream provider ready");

        StreamProvider {
            translator: Translator::with_config(self.metamodel, self.config),
        }
    }
}
