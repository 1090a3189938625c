//! Command line options of the webhook server.
use std::{net::SocketAddr, path::PathBuf};

use crate::constants::DEFAULT_SOCKET_ADDR;

/// Validating admission webhook for Elastic Stack custom resources.
#[derive(Debug, PartialEq, Eq, clap::Parser)]
#[command(version, about)]
pub struct Options {
    /// Socket address the HTTP server binds to.
    #[arg(long, env = "ECK_WEBHOOK_BIND_ADDRESS", default_value_t = DEFAULT_SOCKET_ADDR)]
    pub bind_address: SocketAddr,

    /// YAML FILE overriding the built-in supported version ranges.
    #[arg(long, env = "ECK_WEBHOOK_SUPPORTED_VERSIONS", value_name = "FILE")]
    pub supported_versions: Option<PathBuf>,

    /// Output format of the console logs.
    #[arg(long, env, value_enum, default_value_t)]
    pub console_log_format: ConsoleLogFormat,
}

/// Console log output formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConsoleLogFormat {
    /// Plain unstructured log lines.
    #[default]
    Plain,

    /// One JSON object per event.
    Json,
}
