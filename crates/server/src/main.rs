use clap::Parser;
use nationgrid_server::{Args, ServerConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let addr = args.bind;
    let config = ServerConfig::from(args);

    tracing::info!("nationgrid server on http://{addr}");
    nationgrid_server::serve(config, addr).await
}
