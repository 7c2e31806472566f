use clap::Parser;
use monkeygen::config::{UpstreamConfig, setup_logging};
use tracing::error;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = monkeygen::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    let upstream = match UpstreamConfig::try_from(&cli) {
        Ok(upstream) => upstream,
        Err(err) => {
            error!("Configuration error: {}", err);
            return;
        }
    };

    if let Err(err) =
        monkeygen::web::setup_server(&cli.listen_address, cli.port, upstream, cli.seed).await
    {
        error!("Application error: {}", err);
    }
}
