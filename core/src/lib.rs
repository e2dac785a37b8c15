//! Reconciliation engine for a P2P crypto desk: compares the exchange
//! terminal's ledgers with the ERP's books and records findings.

pub mod amount;
pub mod classify;
pub mod clock;
pub mod config;
pub mod demo_data;
pub mod detector;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod finding;
pub mod reasoning;
pub mod rng;
pub mod scope;
pub mod store;
pub mod summary;
pub mod trigger;
pub mod types;
