//! The custom resource kinds admitted by the webhook, each one with the checks
//! it runs on create and update.
pub mod agent;
pub mod apm;
pub mod autoops;
pub mod beat;
pub mod elasticsearch;
pub mod elasticsearch_config;
pub mod enterprise_search;
pub mod kibana;
pub mod logstash;
pub mod maps;
pub mod package_registry;
