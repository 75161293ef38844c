use std::path::PathBuf;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::Editor;
use tracing::debug;

use crate::complete::SqlHelper;
use crate::history::{load_history, save_history};
use crate::path::DatabasePath;
use crate::runner::{run_statement, Flow, OutputOptions};
use crate::separator::{split_statements, Delimiter, InputStatement};
use crate::session::{Session, TransactionState};
use crate::statement::{build_statement, Statement};

const CONTINUATION_PROMPT: &str = "      -> ";

pub struct ReplOptions {
    /// Prompt template, see [`expand_prompt`].
    pub prompt: String,
    pub history: Option<PathBuf>,
    pub output: OutputOptions,
}

/// Expand `%p`, `%i`, `%d` and `%t` in a prompt template. `%%` is a literal
/// percent sign; unknown escapes are kept as typed.
pub fn expand_prompt(template: &str, path: &DatabasePath, txn: TransactionState) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('p') => out.push_str(&path.project),
            Some('i') => out.push_str(&path.instance),
            Some('d') => out.push_str(&path.database),
            Some('t') => out.push_str(&txn.to_string()),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

/// Cut the terminated statements off the buffer. The unterminated tail, if
/// any, is returned untrimmed as the new buffer content.
fn take_complete(buffer: &str) -> (Vec<InputStatement>, String) {
    let mut stmts = split_statements(buffer);
    let rest = match stmts.last() {
        Some(last) if last.delimiter == Delimiter::None => {
            stmts.pop().map(|s| s.text).unwrap_or_default()
        }
        _ => String::new(),
    };
    (stmts, rest)
}

fn confirm(rl: &mut Editor<SqlHelper, FileHistory>, message: &str) -> bool {
    println!("{}", message);
    loop {
        match rl.readline("Do you want to continue? [yes/no] ") {
            Ok(answer) => match answer.trim().to_ascii_lowercase().as_str() {
                "yes" => return true,
                "no" => return false,
                _ => println!("Please answer yes or no."),
            },
            Err(_) => return false,
        }
    }
}

pub async fn run_repl(session: &mut Session, opts: &ReplOptions) -> Result<()> {
    let mut rl: Editor<SqlHelper, FileHistory> = Editor::new()?;
    rl.set_helper(Some(SqlHelper));
    if let Some(path) = &opts.history {
        load_history(&mut rl, path);
    }

    println!(
        "spanner-cli v{} connected to {}",
        env!("CARGO_PKG_VERSION"),
        session.path()
    );
    println!("Type EXIT; or press Ctrl-D to quit.");

    let mut buffer = String::new();
    'input: loop {
        let prompt = if buffer.is_empty() {
            expand_prompt(&opts.prompt, session.path(), session.transaction_state())
        } else {
            CONTINUATION_PROMPT.to_string()
        };

        let line = match rl.readline(&prompt) {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        };

        if buffer.is_empty() && line.trim().is_empty() {
            continue;
        }
        buffer.push_str(&line);
        buffer.push('\n');

        let (complete, rest) = take_complete(&buffer);
        if complete.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(buffer.trim());
        buffer = rest;

        for input in complete {
            debug!("REPL execute: {}", input.text);
            let stmt = match build_statement(&input.text) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("ERROR: {}", e);
                    continue;
                }
            };
            if let Statement::DropDatabase { name } = &stmt {
                let message = format!("Database {:?} will be dropped.", name);
                if !confirm(&mut rl, &message) {
                    continue;
                }
            }
            match run_statement(session, stmt, input.delimiter, &opts.output).await {
                Ok(Flow::Exit) => break 'input,
                Ok(Flow::Continue) => {}
                Err(e) => eprintln!("ERROR: {:#}", e),
            }
        }
    }

    if let Some(path) = &opts.history {
        save_history(&mut rl, path);
    }
    println!("Bye");
    Ok(())
}
