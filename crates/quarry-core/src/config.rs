use crate::error::QueryError;
use serde::Deserialize;

///
/// TranslatorConfig
///
/// Limits and naming used while translating and rendering. Every field has
/// a default so partial TOML tables are accepted.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TranslatorConfig {
    /// Conditional branches one closure may fork on.
    pub max_branches: usize,
    /// Instructions evaluated per closure, summed over every explored path.
    pub max_steps: usize,
    /// Local variable slots a closure may address.
    pub max_locals: usize,
    /// Stem of rendered placeholders (`:param0`, `:param1`, ...).
    pub param_prefix: String,
}

impl TranslatorConfig {
    pub const DEFAULT_MAX_BRANCHES: usize = 64;
    pub const DEFAULT_MAX_STEPS: usize = 4096;
    pub const DEFAULT_MAX_LOCALS: usize = 256;

    pub fn from_toml_str(source: &str) -> Result<Self, QueryError> {
        Ok(toml::from_str(source)?)
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            max_branches: Self::DEFAULT_MAX_BRANCHES,
            max_steps: Self::DEFAULT_MAX_STEPS,
            max_locals: Self::DEFAULT_MAX_LOCALS,
            param_prefix: "param".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn partial_table_keeps_defaults() {
        let config = TranslatorConfig::from_toml_str("max_branches = 8").unwrap();

        assert_eq!(config.max_branches, 8);
        assert_eq!(config.max_steps, TranslatorConfig::DEFAULT_MAX_STEPS);
        assert_eq!(config.max_locals, TranslatorConfig::DEFAULT_MAX_LOCALS);
        assert_eq!(config.param_prefix, "param");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = TranslatorConfig::from_toml_str("max_branch = 8").unwrap_err();

        assert!(matches!(err, QueryError::Config(_)));
        assert_eq!(err.class(), ErrorClass::Config);
        assert!(!err.class().is_fallback_candidate());
    }
}
