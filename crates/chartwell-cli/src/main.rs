//! Chartwell CLI - Extract structured records from clinical documents.

use anyhow::Context;
use chartwell_cli::{app, commands, AppConfig, Cli, Command, Formatter};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(database) = &cli.database {
        config.database.path = database.clone();
    }

    init_logging(&config.logging.level);

    let format = cli.format.map(Into::into).unwrap_or(config.output.format);
    let color_enabled = !cli.no_color && config.output.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Command::Capabilities => {
            let registry = app::build_registry(&config)?;
            commands::execute_capabilities(&registry, &formatter)?;
        }
        Command::Show(args) => {
            let repositories = app::open_repositories(&config)?;
            commands::execute_show(args, &repositories, &formatter).await?;
        }
        Command::Process(args) => {
            let handler = app::build_handler(
                &config,
                app::build_registry(&config)?,
                app::open_repositories(&config)?,
            )?;
            commands::execute_process(args, &handler, &formatter).await?;
        }
        Command::Batch(args) => {
            let handler = app::build_handler(
                &config,
                app::build_registry(&config)?,
                app::open_repositories(&config)?,
            )?;
            commands::execute_batch(args, &handler, &formatter).await?;
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the configured level.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
