use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{CliConfig, ClientConfig, Endpoint, DEFAULT_PROMPT};
use crate::credentials::Credentials;
use crate::error::{CliError, CliResult};
use crate::format::OutputMode;
use crate::path::DatabasePath;

/// Command-line flags. Coordinates also come from the environment.
#[derive(Debug, Default, Parser)]
#[command(
    name = "spanner-cli",
    about = "Interactive SQL client for a distributed relational database service",
    version
)]
pub struct Args {
    /// Project ID
    #[arg(short = 'p', long, env = "SPANNER_PROJECT_ID")]
    pub project: Option<String>,

    /// Instance ID
    #[arg(short = 'i', long, env = "SPANNER_INSTANCE_ID")]
    pub instance: Option<String>,

    /// Database ID
    #[arg(short = 'd', long, env = "SPANNER_DATABASE_ID")]
    pub database: Option<String>,

    /// Execute SQL statements and exit
    #[arg(short = 'e', long)]
    pub execute: Option<String>,

    /// Execute SQL statements from a file and exit
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Display output in table format for batch mode
    #[arg(short = 't', long)]
    pub table: bool,

    /// Display verbose output (summary line in batch mode)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// CSV output
    #[arg(long, conflicts_with = "json")]
    pub csv: bool,

    /// JSON output
    #[arg(long)]
    pub json: bool,

    /// Path to a JSON key file
    #[arg(long, env = "SPANNER_CLI_CREDENTIAL")]
    pub credential: Option<PathBuf>,

    /// PostgreSQL-wire endpoint (host:port)
    #[arg(long, env = "SPANNER_CLI_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Prompt template (%p project, %i instance, %d database, %t transaction)
    #[arg(long)]
    pub prompt: Option<String>,

    /// History file
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Config file (default ~/.spanner_cli.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Connect timeout in seconds
    #[arg(long)]
    pub connect_timeout: Option<u64>,
}

/// Effective settings after merging flags/env over the config file.
#[derive(Debug)]
pub struct Settings {
    pub path: DatabasePath,
    pub client: ClientConfig,
    pub credentials: Option<Credentials>,
    pub prompt: String,
    pub history: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(args: &Args, file: &CliConfig) -> CliResult<Self> {
        let section = &file.spanner;
        let project = args.project.clone().or_else(|| section.project.clone());
        let instance = args.instance.clone().or_else(|| section.instance.clone());
        let database = args.database.clone().or_else(|| section.database.clone());

        let (project, instance, database) = match (project, instance, database) {
            (Some(p), Some(i), Some(d)) if !p.is_empty() && !i.is_empty() && !d.is_empty() => {
                (p, i, d)
            }
            _ => {
                return Err(CliError::Config(
                    "missing parameters: -p, -i, -d are required".to_string(),
                ))
            }
        };

        let mut client = ClientConfig::default();
        if let Some(ep) = args.endpoint.as_deref().or(section.endpoint.as_deref()) {
            client.endpoint = ep.parse::<Endpoint>()?;
        }
        if let Some(secs) = args.connect_timeout.or(section.connect_timeout_secs) {
            client.connect_timeout = Duration::from_secs(secs);
        }

        let credentials = match args.credential.as_ref().or(section.credential.as_ref()) {
            Some(p) => Some(Credentials::from_file(p)?),
            None => None,
        };

        Ok(Self {
            path: DatabasePath::new(project, instance, database),
            client,
            credentials,
            prompt: args
                .prompt
                .clone()
                .or_else(|| section.prompt.clone())
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            history: args
                .history
                .clone()
                .or_else(|| section.history.clone())
                .or_else(crate::history::default_history_path),
        })
    }
}

impl Args {
    /// Output mode for batch execution (`-e`, `-f`, piped stdin).
    pub fn batch_mode(&self) -> OutputMode {
        if self.csv {
            OutputMode::Csv
        } else if self.json {
            OutputMode::Json
        } else if self.table {
            OutputMode::Table
        } else {
            OutputMode::Tab
        }
    }

    /// Output mode for statements terminated with `;` in the REPL.
    pub fn interactive_mode(&self) -> OutputMode {
        if self.csv {
            OutputMode::Csv
        } else if self.json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}
