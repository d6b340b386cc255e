use std::sync::Arc;

use rigfit_core::{Build, BuildValidation, ComponentId, IncompatiblePair};
use rigfit_rules::RuleEngine;
use rigfit_storage::CatalogStore;
use tracing::error;

pub const VALIDATION_ERROR_REASON: &str = "Error validating configuration";

/// Whole-build validation that always yields a result.
///
/// Engine failures are logged and reported as a single incompatible pair with empty ids.
pub struct ConfigurationValidator<S: ?Sized> {
    engine: Arc<RuleEngine<S>>,
}

impl<S: CatalogStore + ?Sized> ConfigurationValidator<S> {
    pub fn new(engine: Arc<RuleEngine<S>>) -> Self {
        Self { engine }
    }

    pub async fn validate(&self, ids: &[ComponentId]) -> BuildValidation {
        match self.engine.validate_configuration(ids).await {
            Ok(validation) => validation,
            Err(e) => {
                error!(error = %e, retryable = e.is_retryable(), "configuration validation failed");
                BuildValidation::from_pairs(
                    vec![IncompatiblePair {
                        component1_id: ComponentId::from_str(""),
                        component2_id: ComponentId::from_str(""),
                        reason: VALIDATION_ERROR_REASON.to_string(),
                    }],
                    None,
                )
            }
        }
    }

    pub async fn validate_build(&self, build: &Build) -> BuildValidation {
        self.validate(&build.component_ids()).await
    }
}
