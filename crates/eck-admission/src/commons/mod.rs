pub mod association;
pub mod config;
pub mod http;
pub mod monitoring;
pub mod selector;
pub mod status;
pub mod workload;
