//! Administrative (schema) client.
//!
//! Schema changes are modelled as long-running operations: the request is
//! accepted immediately, the statements run in order on the admin
//! connection in a background task, and the caller waits on the returned
//! [`Operation`], usually with a deadline.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_postgres::Client;
use tracing::{debug, info, warn};

use crate::error::{CliError, CliResult};
use crate::path::DatabasePath;

/// Request to apply DDL statements to one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDatabaseDdlRequest {
    /// Full database path, `projects/{p}/instances/{i}/databases/{d}`.
    pub database: String,
    pub statements: Vec<String>,
}

/// Handle to a schema change running in the background.
#[derive(Debug)]
pub struct Operation {
    name: String,
    handle: JoinHandle<CliResult<()>>,
}

impl Operation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the operation to finish.
    pub async fn wait(self) -> CliResult<()> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(CliError::Admin(format!(
                "operation {} aborted: {}",
                self.name, e
            ))),
        }
    }

    /// Wait until `deadline`. On expiry the wait is abandoned and a timeout
    /// error is returned; the remote change may still complete.
    pub async fn wait_until(self, deadline: Instant) -> CliResult<()> {
        let name = self.name.clone();
        let timeout = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout_at(deadline, self.wait()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Abandoned wait for operation {}", name);
                Err(CliError::OperationTimeout { name, timeout })
            }
        }
    }
}

/// One column as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub max_length: Option<i64>,
}

/// Schema client bound to one database.
#[derive(Clone)]
pub struct AdminClient {
    client: Arc<Client>,
    path: DatabasePath,
    next_op: Arc<AtomicU64>,
}

impl AdminClient {
    pub(crate) fn new(client: Client, path: DatabasePath) -> Self {
        Self {
            client: Arc::new(client),
            path,
            next_op: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn path(&self) -> &DatabasePath {
        &self.path
    }

    fn next_operation_name(&self, kind: &str) -> String {
        let n = self.next_op.fetch_add(1, Ordering::Relaxed);
        format!("{}/operations/{}_{}", self.path, kind, n)
    }

    /// Start applying `request.statements` in order.
    ///
    /// The request must target the database this client is bound to. The
    /// first failing statement stops the operation.
    pub async fn update_database_ddl(
        &self,
        request: UpdateDatabaseDdlRequest,
    ) -> CliResult<Operation> {
        let expected = self.path.to_string();
        if request.database != expected {
            return Err(CliError::Admin(format!(
                "database mismatch: request targets {}, client is bound to {}",
                request.database, expected
            )));
        }
        if request.statements.is_empty() {
            return Err(CliError::Admin("no DDL statements given".to_string()));
        }

        let name = self.next_operation_name("ddl");
        info!(
            "Starting {} with {} statement(s)",
            name,
            request.statements.len()
        );
        let client = Arc::clone(&self.client);
        let op_name = name.clone();
        let handle = tokio::spawn(async move {
            for (idx, stmt) in request.statements.iter().enumerate() {
                debug!("{}: applying statement {}", op_name, idx + 1);
                client.batch_execute(stmt).await.map_err(|e| {
                    CliError::Admin(format!("statement {} failed: {}", idx + 1, e))
                })?;
            }
            debug!("{} done", op_name);
            Ok::<(), CliError>(())
        });
        Ok(Operation { name, handle })
    }

    /// Start creating `database` in this instance.
    pub async fn create_database(&self, database: &str) -> CliResult<Operation> {
        let name = self.next_operation_name("create_database");
        info!("Starting {} for {}", name, database);
        let client = Arc::clone(&self.client);
        let stmt = create_database_statement(database);
        let handle = tokio::spawn(async move {
            client.batch_execute(&stmt).await?;
            Ok::<(), CliError>(())
        });
        Ok(Operation { name, handle })
    }

    pub async fn drop_database(&self, database: &str) -> CliResult<()> {
        if database == self.path.database {
            return Err(CliError::Admin(format!(
                "cannot drop the connected database {}",
                database
            )));
        }
        info!("Dropping database {}", database);
        self.client
            .batch_execute(&drop_database_statement(database))
            .await?;
        Ok(())
    }

    pub async fn list_databases(&self) -> CliResult<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT datname::text FROM pg_catalog.pg_database \
                 WHERE NOT datistemplate ORDER BY datname",
                &[],
            )
            .await?;
        rows.iter()
            .map(|r| r.try_get::<_, String>(0).map_err(CliError::from))
            .collect()
    }

    /// `CREATE TABLE` text for every table in the database.
    pub async fn get_database_ddl(&self) -> CliResult<Vec<String>> {
        let schema = self.load_schema(None).await?;
        Ok(schema
            .iter()
            .map(|(table, (cols, pk))| render_create_table(table, cols, pk))
            .collect())
    }

    /// `CREATE TABLE` text for one table, if it exists.
    pub async fn get_table_ddl(&self, table: &str) -> CliResult<Option<String>> {
        let schema = self.load_schema(Some(table)).await?;
        Ok(schema
            .iter()
            .next()
            .map(|(name, (cols, pk))| render_create_table(name, cols, pk)))
    }

    async fn load_schema(
        &self,
        table: Option<&str>,
    ) -> CliResult<BTreeMap<String, (Vec<ColumnInfo>, Vec<String>)>> {
        let filter = table.unwrap_or("");
        let columns = self
            .client
            .query(
                "SELECT c.table_name::text, c.column_name::text, c.data_type::text, \
                        c.is_nullable::text, c.character_maximum_length::bigint \
                 FROM information_schema.columns c \
                 WHERE c.table_schema = 'public' AND ($1::text = '' OR c.table_name = $1::text) \
                 ORDER BY c.table_name, c.ordinal_position",
                &[&filter],
            )
            .await?;
        let keys = self
            .client
            .query(
                "SELECT kcu.table_name::text, kcu.column_name::text \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name \
                  AND tc.table_schema = kcu.table_schema \
                  AND tc.table_name = kcu.table_name \
                 WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = 'public' \
                   AND ($1::text = '' OR kcu.table_name = $1::text) \
                 ORDER BY kcu.table_name, kcu.ordinal_position",
                &[&filter],
            )
            .await?;

        let mut schema: BTreeMap<String, (Vec<ColumnInfo>, Vec<String>)> = BTreeMap::new();
        for row in &columns {
            let table: String = row.try_get(0)?;
            let nullable: String = row.try_get(3)?;
            schema.entry(table).or_default().0.push(ColumnInfo {
                name: row.try_get(1)?,
                data_type: row.try_get(2)?,
                nullable: nullable.eq_ignore_ascii_case("YES"),
                max_length: row.try_get(4)?,
            });
        }
        for row in &keys {
            let table: String = row.try_get(0)?;
            if let Some(entry) = schema.get_mut(&table) {
                entry.1.push(row.try_get(1)?);
            }
        }
        Ok(schema)
    }
}

/// Double-quote an identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn create_database_statement(database: &str) -> String {
    format!("CREATE DATABASE {}", quote_ident(database))
}

pub fn drop_database_statement(database: &str) -> String {
    format!("DROP DATABASE {}", quote_ident(database))
}

/// Render a `CREATE TABLE` statement from catalog data.
pub fn render_create_table(table: &str, columns: &[ColumnInfo], primary_key: &[String]) -> String {
    let mut lines: Vec<String> = columns
        .iter()
        .map(|c| {
            let mut line = format!("  {} {}", c.name, c.data_type);
            if let Some(len) = c.max_length {
                line.push_str(&format!("({})", len));
            }
            if !c.nullable {
                line.push_str(" NOT NULL");
            }
            line
        })
        .collect();
    if !primary_key.is_empty() {
        lines.push(format!("  PRIMARY KEY({})", primary_key.join(", ")));
    }
    format!("CREATE TABLE {} (\n{}\n)", table, lines.join(",\n"))
}
