//! Detector trait and registry.
//!
//! RULE: Every detector implements Detector.
//! The engine runs registered detectors in registration order, one at a
//! time, each inside its own error boundary. Detectors never call each
//! other and never write: they read both ledgers through the store and
//! return findings.

use crate::{
    clock::ScanWindow,
    error::ReconResult,
    finding::{Category, Finding},
    store::ReconStore,
    types::ScanId,
};

/// What every detector sees for one scan.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub scan_id: ScanId,
    pub window: ScanWindow,
}

/// The contract every detector module must fulfill.
pub trait Detector: Send {
    /// Unique stable name, used in logs and failure summaries.
    fn name(&self) -> &'static str;

    /// The scope tag that enables this detector.
    fn category(&self) -> Category;

    /// Read both ledgers and return zero or more findings.
    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>>;
}

/// Ordered (category, detector) registry. Adding or removing a detector
/// never touches the engine.
#[derive(Default)]
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a detector. Call in the documented execution order.
    pub fn register(&mut self, detector: Box<dyn Detector>) {
        self.detectors.push(detector);
    }

    pub fn with(mut self, detector: Box<dyn Detector>) -> Self {
        self.register(detector);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Detector> {
        self.detectors.iter().map(|d| d.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|d| d.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}
