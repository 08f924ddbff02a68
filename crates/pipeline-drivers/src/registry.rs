// crates/pipeline-drivers/src/registry.rs
// ============================================================================
// Module: Driver dispatch
// Description: Maps step names to their StepDriver implementation.
// ============================================================================

//! Generalizes `decision-gate-providers::registry::ProviderRegistry` (route
//! by string identifier, reject unknown/blocked identifiers) into a fixed
//! step-name → driver map. Unlike the provider registry, there is no
//! runtime registration or access policy: the set of drivers is exhaustive
//! and fixed at construction, matching `StepRegistry::standard()`.

use std::collections::BTreeMap;

use pipeline_core::StepName;
use pipeline_core::driver::StepDriver;
use pipeline_core::orchestrator::DriverDispatch;

use crate::expositor::ExpositorDriver;
use crate::fabricator::FabricatorDriver;
use crate::ingestion::IngestionDriver;
use crate::interpreter::InterpreterDriver;
use crate::overseer::OverseerDriver;
use crate::personas::PersonasDriver;
use crate::regression::RegressionDriver;
use crate::scanner::ScannerDriver;
use crate::sentry::SentryDriver;
use crate::time_series::TimeSeriesDriver;
use crate::trust_evaluation::TrustEvaluationDriver;
use crate::type_identifier::TypeIdentifierDriver;
use crate::validator::ValidatorDriver;

/// A fixed dispatch table from step name to driver implementation.
///
/// Built once at worker startup via [`StandardDrivers::new`] and held for
/// the worker's lifetime; drivers are stateless so one instance is shared
/// across every run.
pub struct StandardDrivers {
    drivers: BTreeMap<String, Box<dyn StepDriver>>,
}

impl StandardDrivers {
    /// Builds the dispatch table for `StepRegistry::standard()`.
    #[must_use]
    pub fn new() -> Self {
        let mut drivers: BTreeMap<String, Box<dyn StepDriver>> = BTreeMap::new();
        drivers.insert("ingestion".to_owned(), Box::new(IngestionDriver));
        drivers.insert("type_identifier".to_owned(), Box::new(TypeIdentifierDriver));
        drivers.insert("validator".to_owned(), Box::new(ValidatorDriver));
        drivers.insert("scanner".to_owned(), Box::new(ScannerDriver));
        drivers.insert("interpreter".to_owned(), Box::new(InterpreterDriver));
        drivers.insert("overseer".to_owned(), Box::new(OverseerDriver));
        drivers.insert("regression".to_owned(), Box::new(RegressionDriver));
        drivers.insert("time_series".to_owned(), Box::new(TimeSeriesDriver));
        drivers.insert("sentry".to_owned(), Box::new(SentryDriver));
        drivers.insert("personas".to_owned(), Box::new(PersonasDriver));
        drivers.insert("fabricator".to_owned(), Box::new(FabricatorDriver));
        drivers.insert("trust_evaluation".to_owned(), Box::new(TrustEvaluationDriver));
        drivers.insert("expositor".to_owned(), Box::new(ExpositorDriver));
        Self { drivers }
    }
}

impl Default for StandardDrivers {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverDispatch for StandardDrivers {
    fn driver_for(&self, step: &StepName) -> Option<&dyn StepDriver> {
        self.drivers.get(step.as_str()).map(AsRef::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use pipeline_core::StepRegistry;
    use pipeline_core::identifiers::StepName;
    use pipeline_core::orchestrator::DriverDispatch;

    use super::StandardDrivers;

    #[test]
    fn every_standard_step_has_a_driver() {
        let drivers = StandardDrivers::new();
        for step in StepRegistry::standard().steps() {
            assert!(
                drivers.driver_for(&step.name).is_some(),
                "missing driver for {}",
                step.name.as_str()
            );
        }
    }

    #[test]
    fn unknown_step_has_no_driver() {
        let drivers = StandardDrivers::new();
        let unknown = StepName::new("not_a_real_step").expect("valid token");
        assert!(drivers.driver_for(&unknown).is_none());
    }
}
