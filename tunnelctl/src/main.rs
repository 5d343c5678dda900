mod cli;

use clap::Parser;
use tracing::{debug, error, info};
use tunnel_core::logging;

#[tokio::main]
async fn main() {
    let args = cli::Cli::parse();

    let settings = match args.load_settings() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("tunnelctl: {err}");
            std::process::exit(1);
        }
    };
    let _guard = logging::init_logging_from_settings(&settings);

    debug!("Using settings from {:?}", args.config_path());

    if let Err(err) = cli::run(args, settings).await {
        error!("tunnelctl error: {}", err);
        std::process::exit(1);
    }
    info!("tunnelctl command completed");
}
