use std::sync::Arc;

use clap::Parser;
use eck_admission::{
    supported_versions::{LoadSupportedVersionsError, SupportedVersions},
    validation::ValidationContext,
};
use eck_webhook::{Options, WebhookError, WebhookServer, logging};
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitLogging { source: logging::LoggingError },

    #[snafu(display("failed to load supported versions"))]
    LoadSupportedVersions { source: LoadSupportedVersionsError },

    #[snafu(display("failed to run webhook server"))]
    RunWebhookServer { source: WebhookError },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let options = Options::parse();
    logging::init(options.console_log_format).context(InitLoggingSnafu)?;

    let supported_versions = match &options.supported_versions {
        Some(path) => SupportedVersions::from_file(path).context(LoadSupportedVersionsSnafu)?,
        None => SupportedVersions::default(),
    };

    let ctx = Arc::new(ValidationContext::new(supported_versions));
    WebhookServer::new(options.bind_address, ctx)
        .run()
        .await
        .context(RunWebhookServerSnafu)
}
