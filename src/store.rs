//! The installed configuration.
//!
//! A [`Configuration`] is immutable once built. The [`ConfigurationStore`]
//! holds the current one behind an `Arc` and replaces it wholesale on
//! reload. The lock is held only to clone or swap that `Arc`, never while
//! an expression runs, so an evaluation started before a reload finishes
//! on the configuration it began with.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::config::{ComposerConfig, ConfigError};
use crate::env::composer_environment;
use crate::error::{ComposerError, ComposerResult};
use crate::eval::EvaluationContext;
use crate::program::{compile_with_options, Program, ProgramOptions};
use crate::schema::ComposeWorkloadJwtSvidRequest;

#[derive(Debug)]
pub struct Configuration {
    trust_domain: String,
    spiffe_trust_domain: String,
    jwt_program: Program,
}

impl Configuration {
    /// Builds the environment and compiles the JWT expression for
    /// `trust_domain`. Nothing is installed.
    #[tracing::instrument(level = "debug", skip(config))]
    pub fn build(config: &ComposerConfig, trust_domain: &str) -> ComposerResult<Self> {
        if trust_domain.is_empty() {
            return Err(ConfigError::EmptyTrustDomain.into());
        }
        let source = config.resolve_expression()?;
        let env = Arc::new(composer_environment()?);
        let options = ProgramOptions {
            cost_limit: config.cost_limit,
        };
        let jwt_program = compile_with_options(env, &source, options)?;
        debug!(result_type = %jwt_program.result_type(), "jwt expression compiled");

        Ok(Self {
            trust_domain: trust_domain.to_string(),
            spiffe_trust_domain: format!("spiffe://{}", trust_domain),
            jwt_program,
        })
    }

    pub fn trust_domain(&self) -> &str {
        &self.trust_domain
    }

    pub fn spiffe_trust_domain(&self) -> &str {
        &self.spiffe_trust_domain
    }

    pub fn jwt_program(&self) -> &Program {
        &self.jwt_program
    }

    pub fn context(&self, request: &ComposeWorkloadJwtSvidRequest) -> EvaluationContext {
        EvaluationContext::new(
            self.trust_domain.as_str(),
            self.spiffe_trust_domain.as_str(),
            request,
        )
    }
}

#[derive(Debug, Default)]
pub struct ConfigurationStore {
    current: RwLock<Option<Arc<Configuration>>>,
}

impl ConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration and makes it current. On failure the
    /// previously installed configuration stays current.
    pub fn load(
        &self,
        config: &ComposerConfig,
        trust_domain: &str,
    ) -> ComposerResult<Arc<Configuration>> {
        match Configuration::build(config, trust_domain) {
            Ok(configuration) => Ok(self.install(configuration)),
            Err(e) => {
                warn!(
                    stage = e.stage(),
                    error = %e,
                    keeps_previous = self.is_configured(),
                    "configuration rejected"
                );
                Err(e)
            }
        }
    }

    pub fn install(&self, configuration: Configuration) -> Arc<Configuration> {
        let configuration = Arc::new(configuration);
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(configuration.clone());
        info!(
            trust_domain = configuration.trust_domain(),
            replaced = previous.is_some(),
            "configuration installed"
        );
        configuration
    }

    pub fn current(&self) -> ComposerResult<Arc<Configuration>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ComposerError::NotConfigured)
    }

    pub fn is_configured(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_before_load() {
        let store = ConfigurationStore::new();
        assert!(matches!(store.current(), Err(ComposerError::NotConfigured)));
        assert!(!store.is_configured());
    }

    #[test]
    fn test_load_derives_spiffe_trust_domain() {
        let store = ConfigurationStore::new();
        let configuration = store
            .load(&ComposerConfig::inline("request"), "example.org")
            .unwrap();
        assert_eq!(configuration.trust_domain(), "example.org");
        assert_eq!(configuration.spiffe_trust_domain(), "spiffe://example.org");
        assert!(Arc::ptr_eq(&configuration, &store.current().unwrap()));
    }

    #[test]
    fn test_failed_load_keeps_previous() {
        let store = ConfigurationStore::new();
        let first = store
            .load(&ComposerConfig::inline("request"), "example.org")
            .unwrap();

        let err = store
            .load(&ComposerConfig::inline("request +"), "other.org")
            .unwrap_err();
        assert!(matches!(err, ComposerError::Compile(_)));
        let err = store
            .load(&ComposerConfig::default(), "other.org")
            .unwrap_err();
        assert!(matches!(
            err,
            ComposerError::Config(ConfigError::MissingExpression)
        ));
        let err = store.load(&ComposerConfig::inline("request"), "").unwrap_err();
        assert!(matches!(
            err,
            ComposerError::Config(ConfigError::EmptyTrustDomain)
        ));

        assert!(Arc::ptr_eq(&first, &store.current().unwrap()));
    }

    #[test]
    fn test_old_snapshot_survives_reload() {
        let store = ConfigurationStore::new();
        let old = store
            .load(&ComposerConfig::inline("trust_domain"), "old.org")
            .unwrap();
        store
            .load(&ComposerConfig::inline("trust_domain"), "new.org")
            .unwrap();

        let request = ComposeWorkloadJwtSvidRequest::default();
        let value = old
            .jwt_program()
            .evaluate(&old.context(&request).activation())
            .unwrap();
        assert_eq!(value, crate::value::Value::string("old.org"));
        assert_eq!(store.current().unwrap().trust_domain(), "new.org");
    }
}
