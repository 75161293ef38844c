use anyhow::{Context, Result};
use tracing::debug;

use crate::format::{render, summary_line, OutputMode};
use crate::separator::{split_statements, Delimiter};
use crate::session::Session;
use crate::statement::{build_statement, Statement};

/// How results are printed.
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub mode: OutputMode,
    /// Print the `N rows in set` line after each statement.
    pub summary: bool,
    pub interactive: bool,
}

/// Whether the caller should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Execute one statement and print its result.
///
/// `USE` swaps `session` for a new one on the target database and `EXIT`
/// only reports [`Flow::Exit`]; everything else goes to the executor.
pub async fn run_statement(
    session: &mut Session,
    stmt: Statement,
    delimiter: Delimiter,
    opts: &OutputOptions,
) -> Result<Flow> {
    debug!("run_statement: {:?}", stmt);
    match stmt {
        Statement::Exit => Ok(Flow::Exit),
        Statement::Use { database } => {
            if session.in_transaction() {
                anyhow::bail!("USE is not allowed inside a transaction");
            }
            let next = session
                .reconnect_to(&database)
                .await
                .with_context(|| format!("Could not connect to database {}", database))?;
            let previous = std::mem::replace(session, next);
            previous.close().await;
            if opts.interactive {
                println!("Database changed");
            }
            Ok(Flow::Continue)
        }
        stmt => {
            let mode = if delimiter == Delimiter::Vertical {
                OutputMode::Vertical
            } else {
                opts.mode
            };
            let result = stmt.execute(session).await?;
            print!("{}", render(&result, mode));
            if opts.summary {
                println!("{}", summary_line(&result));
                if opts.interactive {
                    println!();
                }
            }
            Ok(Flow::Continue)
        }
    }
}

/// Run every statement in `input` in order, stopping at the first error.
pub async fn run_batch(session: &mut Session, input: &str, opts: &OutputOptions) -> Result<()> {
    for (idx, input_stmt) in split_statements(input).into_iter().enumerate() {
        debug!("batch statement {}: {}", idx + 1, input_stmt.text);
        let stmt = build_statement(&input_stmt.text)?;
        if run_statement(session, stmt, input_stmt.delimiter, opts).await? == Flow::Exit {
            break;
        }
    }
    Ok(())
}
