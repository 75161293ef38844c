use std::time::Instant;

use tokio_postgres::types::ToSql;
use tracing::debug;

use crate::admin::UpdateDatabaseDdlRequest;
use crate::error::{CliError, CliResult};
use crate::result::{ResultSet, Row};
use crate::session::Session;

/// A classified statement, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Query { sql: String },
    /// `sql` is the explained query, without the `EXPLAIN` keyword.
    Explain { sql: String },
    Dml { sql: String },
    Ddl { sql: String },
    CreateDatabase { name: String },
    DropDatabase { name: String },
    ShowDatabases,
    ShowTables,
    ShowCreateTable { table: String },
    ShowColumns { table: String },
    ShowIndex { table: String },
    BeginReadWrite,
    BeginReadOnly,
    Commit,
    Rollback,
    Close,
    Use { database: String },
    Exit,
}

const SHOW_COLUMNS_SQL: &str = "\
SELECT c.column_name::text, c.data_type::text, c.is_nullable::text, \
       CASE WHEN k.column_name IS NULL THEN '' ELSE 'PRI' END, c.column_default::text \
FROM information_schema.columns c \
LEFT JOIN ( \
    SELECT kcu.column_name::text AS column_name \
    FROM information_schema.table_constraints tc \
    JOIN information_schema.key_column_usage kcu \
      ON tc.constraint_name = kcu.constraint_name \
     AND tc.table_schema = kcu.table_schema \
     AND tc.table_name = kcu.table_name \
    WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = 'public' \
      AND tc.table_name = $1::text \
) k ON k.column_name = c.column_name::text \
WHERE c.table_schema = 'public' AND c.table_name = $1::text \
ORDER BY c.ordinal_position";

const SHOW_TABLES_SQL: &str = "\
SELECT table_name::text FROM information_schema.tables \
WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
ORDER BY table_name";

const SHOW_INDEX_SQL: &str = "\
SELECT tablename::text, indexname::text, indexdef::text FROM pg_catalog.pg_indexes \
WHERE schemaname = 'public' AND tablename = $1::text \
ORDER BY indexname";

fn invalid(input: &str) -> CliError {
    CliError::InvalidStatement(input.trim().to_string())
}

/// Skip whitespace, `--` line comments and `/* */` block comments at the
/// start of `input`.
fn strip_leading_comments(input: &str) -> &str {
    let mut s = input;
    loop {
        s = s.trim_start();
        if let Some(rest) = s.strip_prefix("--") {
            s = rest.find('\n').map(|i| &rest[i + 1..]).unwrap_or("");
        } else if let Some(rest) = s.strip_prefix("/*") {
            s = rest.find("*/").map(|i| &rest[i + 2..]).unwrap_or("");
        } else {
            return s;
        }
    }
}

/// Strip one layer of backquotes or double quotes from an identifier.
fn unquote_ident(token: &str) -> String {
    for q in ['`', '"'] {
        if token.len() >= 2 && token.starts_with(q) && token.ends_with(q) {
            return token[1..token.len() - 1].to_string();
        }
    }
    token.to_string()
}

/// Unquoted table and database names fold to lower case, as the catalog
/// stores them.
fn object_name(token: &str) -> String {
    if token.starts_with('`') || token.starts_with('"') {
        unquote_ident(token)
    } else {
        token.to_ascii_lowercase()
    }
}

/// Classify statement text.
///
/// Only the leading keywords are inspected; the statement body is passed to
/// the server untouched. Fails with [`CliError::InvalidStatement`] for empty
/// or unrecognised text.
pub fn build_statement(input: &str) -> CliResult<Statement> {
    let body = strip_leading_comments(input).trim_end();
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();
    if body.is_empty() {
        return Err(invalid(input));
    }
    if body.starts_with('(') {
        return Ok(Statement::Query {
            sql: body.to_string(),
        });
    }

    let keyword: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    let tokens: Vec<&str> = body.split_whitespace().collect();
    let upper: Vec<String> = tokens.iter().map(|t| t.to_ascii_uppercase()).collect();
    let words: Vec<&str> = upper.iter().map(String::as_str).collect();
    let sql = body.to_string();

    let stmt = match keyword.as_str() {
        "SELECT" | "WITH" => Statement::Query { sql },
        "EXPLAIN" => {
            let rest = body[keyword.len()..].trim();
            if rest.is_empty() {
                return Err(invalid(input));
            }
            Statement::Explain {
                sql: rest.to_string(),
            }
        }
        "INSERT" | "UPDATE" | "DELETE" => Statement::Dml { sql },
        "CREATE" if words.get(1) == Some(&"DATABASE") => match tokens.as_slice() {
            [_, _, name] => Statement::CreateDatabase {
                name: object_name(name),
            },
            _ => return Err(invalid(input)),
        },
        "DROP" if words.get(1) == Some(&"DATABASE") => match tokens.as_slice() {
            [_, _, name] => Statement::DropDatabase {
                name: object_name(name),
            },
            _ => return Err(invalid(input)),
        },
        "CREATE" | "ALTER" | "DROP" | "GRANT" | "REVOKE" | "ANALYZE" => Statement::Ddl { sql },
        "SHOW" => parse_show(&tokens, &words).ok_or_else(|| invalid(input))?,
        "BEGIN" => match &words[1..] {
            [] | ["RW"] => Statement::BeginReadWrite,
            ["RO"] => Statement::BeginReadOnly,
            _ => return Err(invalid(input)),
        },
        "COMMIT" if matches!(&words[1..], [] | ["TRANSACTION"]) => Statement::Commit,
        "ROLLBACK" if matches!(&words[1..], [] | ["TRANSACTION"]) => Statement::Rollback,
        "CLOSE" if words.len() == 1 => Statement::Close,
        "USE" => match tokens.as_slice() {
            [_, db] => Statement::Use {
                database: object_name(db),
            },
            _ => return Err(invalid(input)),
        },
        "EXIT" if words.len() == 1 => Statement::Exit,
        _ => return Err(invalid(input)),
    };
    Ok(stmt)
}

fn parse_show(tokens: &[&str], words: &[&str]) -> Option<Statement> {
    let stmt = match words {
        ["SHOW", "DATABASES"] => Statement::ShowDatabases,
        ["SHOW", "TABLES"] => Statement::ShowTables,
        ["SHOW", "CREATE", "TABLE", _] => Statement::ShowCreateTable {
            table: object_name(tokens[3]),
        },
        ["SHOW", "COLUMNS", "FROM", _] => Statement::ShowColumns {
            table: object_name(tokens[3]),
        },
        ["SHOW", "INDEX" | "INDEXES" | "KEYS", "FROM", _] => Statement::ShowIndex {
            table: object_name(tokens[3]),
        },
        _ => return None,
    };
    Some(stmt)
}

impl Statement {
    /// Execute against `session` and time the call.
    pub async fn execute(&self, session: &mut Session) -> CliResult<ResultSet> {
        let start = Instant::now();
        let result = self.dispatch(session).await?;
        let elapsed = start.elapsed();
        debug!(
            "Executed {:?} in {:?} ({} rows)",
            self, elapsed, result.stats.affected_rows
        );
        Ok(result.with_elapsed(elapsed))
    }

    async fn dispatch(&self, session: &mut Session) -> CliResult<ResultSet> {
        match self {
            Statement::Query { sql } => {
                let out = session.query(sql, &[]).await?;
                Ok(ResultSet::query(out.column_names, out.rows))
            }
            Statement::Explain { sql } => {
                let out = session.query(&format!("EXPLAIN {}", sql), &[]).await?;
                Ok(ResultSet::query(
                    vec!["Query_Execution_Plan".to_string()],
                    out.rows,
                ))
            }
            Statement::Dml { sql } => {
                let count = session.update(sql).await?;
                Ok(ResultSet::mutation(count))
            }
            Statement::Ddl { sql } => {
                ensure_outside_transaction(session, "DDL")?;
                let op = session
                    .admin()
                    .update_database_ddl(UpdateDatabaseDdlRequest {
                        database: session.path().to_string(),
                        statements: vec![sql.clone()],
                    })
                    .await?;
                op.wait().await?;
                Ok(ResultSet::mutation(0))
            }
            Statement::CreateDatabase { name } => {
                ensure_outside_transaction(session, "CREATE DATABASE")?;
                session.admin().create_database(name).await?.wait().await?;
                Ok(ResultSet::mutation(0))
            }
            Statement::DropDatabase { name } => {
                ensure_outside_transaction(session, "DROP DATABASE")?;
                session.admin().drop_database(name).await?;
                Ok(ResultSet::mutation(0))
            }
            Statement::ShowDatabases => {
                let names = session.admin().list_databases().await?;
                Ok(ResultSet::query(
                    vec!["Database".to_string()],
                    names.into_iter().map(|n| Row::new(vec![n])).collect(),
                ))
            }
            Statement::ShowTables => {
                let column = format!("Tables_in_{}", session.path().database);
                catalog_query(session, SHOW_TABLES_SQL, &[], &[column.as_str()]).await
            }
            Statement::ShowCreateTable { table } => {
                let ddl = session
                    .admin()
                    .get_table_ddl(table)
                    .await?
                    .ok_or_else(|| CliError::Admin(format!("table {} not found", table)))?;
                Ok(ResultSet::query(
                    vec!["Table".to_string(), "Create Table".to_string()],
                    vec![Row::new(vec![table.clone(), ddl])],
                ))
            }
            Statement::ShowColumns { table } => {
                catalog_query(
                    session,
                    SHOW_COLUMNS_SQL,
                    &[table],
                    &["Field", "Type", "NULL", "Key", "Default"],
                )
                .await
            }
            Statement::ShowIndex { table } => {
                catalog_query(
                    session,
                    SHOW_INDEX_SQL,
                    &[table],
                    &["Table", "Key_name", "Index_definition"],
                )
                .await
            }
            Statement::BeginReadWrite => {
                session.begin_read_write().await?;
                Ok(ResultSet::mutation(0))
            }
            Statement::BeginReadOnly => {
                session.begin_read_only().await?;
                Ok(ResultSet::mutation(0))
            }
            Statement::Commit => {
                session.commit().await?;
                Ok(ResultSet::mutation(0))
            }
            Statement::Rollback => {
                session.rollback().await?;
                Ok(ResultSet::mutation(0))
            }
            Statement::Close => {
                session.close_read_only().await?;
                Ok(ResultSet::mutation(0))
            }
            Statement::Use { .. } => Err(CliError::InvalidStatement(
                "USE is handled by the command-line client".to_string(),
            )),
            Statement::Exit => Err(CliError::InvalidStatement(
                "EXIT is handled by the command-line client".to_string(),
            )),
        }
    }
}

fn ensure_outside_transaction(session: &Session, what: &str) -> CliResult<()> {
    if session.in_transaction() {
        return Err(CliError::Transaction(format!(
            "{} can not be executed in a transaction",
            what
        )));
    }
    Ok(())
}

/// Catalog query whose columns get display names.
async fn catalog_query(
    session: &Session,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
    columns: &[&str],
) -> CliResult<ResultSet> {
    let out = session.query(sql, params).await?;
    Ok(ResultSet::query(
        columns.iter().map(|c| c.to_string()).collect(),
        out.rows,
    ))
}
