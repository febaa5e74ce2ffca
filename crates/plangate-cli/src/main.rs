mod config;
mod serve_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use plangate_core::pipeline::SolvePipeline;
use plangate_core::solution::PlanFileProcessor;

use config::PlangateConfig;

#[derive(Parser)]
#[command(
    name = "plangate",
    about = "HTTP gateway for solving and validating classical planning problems"
)]
struct Cli {
    /// Config file path (overrides ~/.config/plangate/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Run the HTTP gateway
    Serve {
        /// Address to bind
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Execute the `plangate init` command: write a default config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let written = config::save_config(&config::ConfigFile::default())?;

    println!("Config written to {}", written.display());
    println!("  server.port = {}", config::DEFAULT_PORT);
    println!("  solvers.bfws = {}", config::DEFAULT_BFWS);
    println!("  solvers.validator = {}", config::DEFAULT_VALIDATOR);
    println!();
    println!("Edit the [solvers] section to point at your installed binaries,");
    println!("then run `plangate serve`.");

    Ok(())
}

/// Execute the `plangate serve` command: resolve config and run the server.
async fn cmd_serve(
    config_file: Option<&std::path::Path>,
    bind: Option<&str>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let resolved = PlangateConfig::resolve(config_file, bind, port)?;

    let pipeline = Arc::new(SolvePipeline::new(
        resolved.pipeline,
        Arc::new(PlanFileProcessor),
    ));

    serve_cmd::run_serve(
        pipeline,
        &resolved.bind,
        resolved.port,
        &resolved.allowed_origin,
    )
    .await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            cmd_init(force)?;
        }
        Commands::Serve { bind, port } => {
            cmd_serve(cli.config.as_deref(), bind.as_deref(), port).await?;
        }
    }

    Ok(())
}
