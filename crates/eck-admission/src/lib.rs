//! Admission validation for the custom resources of the Elastic Stack:
//! Elasticsearch, Kibana, APM Server, Beats, Elastic Agent, Enterprise
//! Search, Logstash, Elastic Maps Server, Elasticsearch configurations,
//! AutoOps agent policies and the Elastic Package Registry.
//!
//! The [`review`] module is the entry point for admission requests. It looks
//! up the kind in the [`registry`] and runs the checks the kind declares in
//! [`crd`] through the [`validation`] driver.
pub mod commons;
pub mod constants;
pub mod crd;
pub mod field;
pub mod names;
pub mod quantity;
pub mod registry;
pub mod review;
pub mod supported_versions;
pub mod utils;
pub mod validation;

pub use eck_version as version;
