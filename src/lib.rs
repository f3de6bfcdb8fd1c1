//! Churn Workstation Library
//!
//! Session-scoped batch workflow around a pre-trained bank churn classifier:
//! customers are entered by hand or uploaded as CSV/Excel, accumulated in a
//! per-session working set, scored by the model, thresholded into CHURN/STAY
//! decisions, summarized and exported as CSV.
//!
//! # Modules
//!
//! - `api`: HTTP surface (handlers and routes).
//! - `core`: Session workflow, validation, models and errors.
//! - `integrations`: Model backends and file formats.
//! - `artifact`: Model artifact loading and SHA-256 fingerprinting.
//! - `circuit_breaker`: Circuit breaker for the remote model server.
//! - `config`: Configuration management.
//! - `decode`: CSV/XLSX upload decoding.
//! - `errors`: Error handling types.
//! - `export`: CSV export of scored results.
//! - `handlers`: HTTP request handlers.
//! - `models`: Domain and request/response models.
//! - `oracle`: Classifier trait and the local logistic model.
//! - `oracle_client`: Remote model server client.
//! - `routes`: Router construction.
//! - `session`: In-memory session store.
//! - `validation`: Manual-entry and batch row rules.
//! - `workstation`: Working set, prediction and summary.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and other binaries
pub mod artifact;
pub mod circuit_breaker;
pub mod config;
pub mod decode;
pub mod errors;
pub mod export;
pub mod handlers;
pub mod models;
pub mod oracle;
pub mod oracle_client;
pub mod routes;
pub mod session;
pub mod validation;
pub mod workstation;
