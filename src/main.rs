use anyhow::Result;
use clap::Parser;

use imagectl::backend::{BackendConnection, HttpBackend};
use imagectl::cli::{Cli, Command};
use imagectl::{build, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_json, cli.debug)
        .map_err(|err| anyhow::anyhow!("failed to initialize logging: {}", err))?;

    let backend = HttpBackend::new(&cli.addr);

    match cli.command {
        Command::Build(args) => {
            let opts = args.into_options();
            let output = build::run(&backend, &opts).await?;
            if let Some(name) = output.exporter_response.get("image.name") {
                println!("Successfully built {}", name);
            }
        }
        Command::Tag(args) => {
            backend.tag(&args.source, &args.targets).await?;
        }
    }
    Ok(())
}
