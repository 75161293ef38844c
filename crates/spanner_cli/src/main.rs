use std::io::{IsTerminal, Read};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use spanner_cli::args::{Args, Settings};
use spanner_cli::config::CliConfig;
use spanner_cli::repl::{run_repl, ReplOptions};
use spanner_cli::runner::{run_batch, OutputOptions};
use spanner_cli::Session;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("ERROR: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file_config = match args.config.clone().or_else(CliConfig::default_path) {
        Some(path) => CliConfig::load(&path)
            .with_context(|| format!("Cannot load config file {}", path.display()))?,
        None => CliConfig::default(),
    };
    let settings = Settings::resolve(&args, &file_config)?;

    let batch_input = if let Some(sql) = args.execute.as_deref() {
        debug!("Mode: -e");
        Some(sql.to_string())
    } else if let Some(path) = args.file.as_deref() {
        debug!("Mode: -f {}", path.display());
        Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read file: {}", path.display()))?,
        )
    } else if !std::io::stdin().is_terminal() {
        debug!("Mode: stdin");
        let mut sql = String::new();
        std::io::stdin()
            .read_to_string(&mut sql)
            .context("Cannot read standard input")?;
        Some(sql)
    } else {
        None
    };

    let target = settings.path.clone();
    let mut session = Session::connect(settings.path, settings.client, settings.credentials)
        .await
        .with_context(|| format!("Could not connect to {}", target))?;

    let outcome = match batch_input {
        Some(input) => {
            let opts = OutputOptions {
                mode: args.batch_mode(),
                summary: args.verbose,
                interactive: false,
            };
            run_batch(&mut session, &input, &opts).await
        }
        None => {
            debug!("Mode: REPL");
            let opts = ReplOptions {
                prompt: settings.prompt,
                history: settings.history,
                output: OutputOptions {
                    mode: args.interactive_mode(),
                    summary: true,
                    interactive: true,
                },
            };
            run_repl(&mut session, &opts).await
        }
    };

    session.close().await;
    outcome
}
