use std::sync::Arc;

use tracing::debug;

use crate::config::ComposerConfig;
use crate::error::{ComposerError, ComposerResult};
use crate::schema::{ComposeWorkloadJwtSvidRequest, ComposeWorkloadJwtSvidResponse};
use crate::store::{Configuration, ConfigurationStore};

/// The credential composer service surface. Only the workload JWT-SVID path
/// rewrites credentials; every X.509 path answers `Unimplemented`.
pub trait CredentialComposerService: Send + Sync {
    fn compose_workload_jwt_svid(
        &self,
        request: &ComposeWorkloadJwtSvidRequest,
    ) -> ComposerResult<ComposeWorkloadJwtSvidResponse>;

    fn compose_server_x509_ca(&self) -> ComposerResult<()> {
        Err(ComposerError::Unimplemented {
            operation: "ComposeServerX509CA",
        })
    }

    fn compose_server_x509_svid(&self) -> ComposerResult<()> {
        Err(ComposerError::Unimplemented {
            operation: "ComposeServerX509SVID",
        })
    }

    fn compose_agent_x509_svid(&self) -> ComposerResult<()> {
        Err(ComposerError::Unimplemented {
            operation: "ComposeAgentX509SVID",
        })
    }

    fn compose_workload_x509_svid(&self) -> ComposerResult<()> {
        Err(ComposerError::Unimplemented {
            operation: "ComposeWorkloadX509SVID",
        })
    }
}

#[derive(Debug, Default)]
pub struct CredentialComposer {
    store: ConfigurationStore,
}

impl CredentialComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(
        &self,
        trust_domain: &str,
        config: &ComposerConfig,
    ) -> ComposerResult<Arc<Configuration>> {
        config.validate()?;
        self.store.load(config, trust_domain)
    }

    /// Decodes a JSON configuration document and configures from it.
    pub fn configure_json(
        &self,
        trust_domain: &str,
        document: &str,
    ) -> ComposerResult<Arc<Configuration>> {
        let config = ComposerConfig::from_json(document)?;
        self.configure(trust_domain, &config)
    }

    pub fn store(&self) -> &ConfigurationStore {
        &self.store
    }

    /// Evaluates the current JWT expression against `request` and converts
    /// the result into a typed response. A failure never yields a partial
    /// response.
    pub fn compose_workload_jwt(
        &self,
        request: &ComposeWorkloadJwtSvidRequest,
    ) -> ComposerResult<ComposeWorkloadJwtSvidResponse> {
        let configuration = self.store.current()?;
        let context = configuration.context(request);
        let value = configuration
            .jwt_program()
            .evaluate(&context.activation())?;
        Ok(ComposeWorkloadJwtSvidResponse::try_from(&value)?)
    }
}

impl CredentialComposerService for CredentialComposer {
    fn compose_workload_jwt_svid(
        &self,
        request: &ComposeWorkloadJwtSvidRequest,
    ) -> ComposerResult<ComposeWorkloadJwtSvidResponse> {
        debug!(?request, "JWT rewrite request");
        let response = self.compose_workload_jwt(request);
        match &response {
            Ok(response) => debug!(?response, "JWT rewrite response"),
            Err(e) => debug!(stage = e.stage(), error = %e, "JWT rewrite failed"),
        }
        response
    }
}
