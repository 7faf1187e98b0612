use amp_vars::{Config, LogFormat};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("amp_vars=info"));

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = cli::Cli::parse();
    let config = cli.apply(Config::from_env());

    init_tracing(&config);
    tracing::debug!("cli: {cli:?}");

    cli.run(config).await
}
