use std::fmt;

use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info, warn};

use crate::admin::AdminClient;
use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::decoder::decode_row;
use crate::error::{CliError, CliResult};
use crate::path::DatabasePath;
use crate::result::Row;

const ANONYMOUS_USER: &str = "spanner";

/// Transaction currently open on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    None,
    ReadWrite,
    ReadOnly,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::None => Ok(()),
            TransactionState::ReadWrite => write!(f, "(rw txn)"),
            TransactionState::ReadOnly => write!(f, "(ro txn)"),
        }
    }
}

/// Column names and decoded rows of one query.
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub column_names: Vec<String>,
    pub rows: Vec<Row>,
}

/// A live connection to one database: a data client for queries and DML,
/// an admin client for schema changes, and the open transaction (if any).
pub struct Session {
    path: DatabasePath,
    client: Client,
    admin: AdminClient,
    txn: TransactionState,
    config: ClientConfig,
    credentials: Option<Credentials>,
}

/// Open one wire connection and spawn its driver.
async fn open_connection(
    config: &ClientConfig,
    credentials: Option<&Credentials>,
    path: &DatabasePath,
) -> CliResult<Client> {
    let dbname = path.to_string();
    let mut pg = tokio_postgres::Config::new();
    pg.host(&config.endpoint.host)
        .port(config.endpoint.port)
        .dbname(&dbname)
        .application_name(&config.application_name)
        .connect_timeout(config.connect_timeout);
    match credentials {
        Some(c) => {
            pg.user(c.user()).password(c.secret());
        }
        None => {
            pg.user(ANONYMOUS_USER);
        }
    }
    debug!("Connecting: endpoint={} database={}", config.endpoint, dbname);

    let (client, connection) = pg.connect(NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            warn!("Connection error: {}", e);
        }
    });
    Ok(client)
}

impl Session {
    /// Connect the data and admin clients to `path`.
    pub async fn connect(
        path: DatabasePath,
        config: ClientConfig,
        credentials: Option<Credentials>,
    ) -> CliResult<Self> {
        let client = open_connection(&config, credentials.as_ref(), &path).await?;
        let admin_conn = open_connection(&config, credentials.as_ref(), &path).await?;
        info!("Session opened on {}", path);
        Ok(Self {
            admin: AdminClient::new(admin_conn, path.clone()),
            path,
            client,
            txn: TransactionState::None,
            config,
            credentials,
        })
    }

    /// New session on another database of the same instance.
    pub async fn reconnect_to(&self, database: &str) -> CliResult<Session> {
        Session::connect(
            self.path.with_database(database),
            self.config.clone(),
            self.credentials.clone(),
        )
        .await
    }

    pub fn path(&self) -> &DatabasePath {
        &self.path
    }

    /// Data-plane client, for reads outside the statement executor.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn admin(&self) -> &AdminClient {
        &self.admin
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.txn
    }

    pub fn in_read_write_transaction(&self) -> bool {
        self.txn == TransactionState::ReadWrite
    }

    pub fn in_read_only_transaction(&self) -> bool {
        self.txn == TransactionState::ReadOnly
    }

    pub fn in_transaction(&self) -> bool {
        self.txn != TransactionState::None
    }

    pub async fn begin_read_write(&mut self) -> CliResult<()> {
        self.ensure_no_transaction()?;
        self.client.batch_execute("BEGIN READ WRITE").await?;
        self.txn = TransactionState::ReadWrite;
        debug!("Began read-write transaction");
        Ok(())
    }

    pub async fn begin_read_only(&mut self) -> CliResult<()> {
        self.ensure_no_transaction()?;
        self.client.batch_execute("BEGIN READ ONLY").await?;
        self.txn = TransactionState::ReadOnly;
        debug!("Began read-only transaction");
        Ok(())
    }

    pub async fn commit(&mut self) -> CliResult<()> {
        if !self.in_read_write_transaction() {
            return Err(CliError::Transaction(
                "you're not in read-write transaction".to_string(),
            ));
        }
        // The transaction is over whether or not COMMIT succeeds.
        self.txn = TransactionState::None;
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    pub async fn rollback(&mut self) -> CliResult<()> {
        if !self.in_read_write_transaction() {
            return Err(CliError::Transaction(
                "you're not in read-write transaction".to_string(),
            ));
        }
        self.txn = TransactionState::None;
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    /// End a read-only transaction.
    pub async fn close_read_only(&mut self) -> CliResult<()> {
        if !self.in_read_only_transaction() {
            return Err(CliError::Transaction(
                "you're not in read-only transaction".to_string(),
            ));
        }
        self.txn = TransactionState::None;
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    fn ensure_no_transaction(&self) -> CliResult<()> {
        match self.txn {
            TransactionState::None => Ok(()),
            TransactionState::ReadWrite => Err(CliError::Transaction(
                "you're in read-write transaction. Please finish the transaction by 'COMMIT;' or 'ROLLBACK;'"
                    .to_string(),
            )),
            TransactionState::ReadOnly => Err(CliError::Transaction(
                "you're in read-only transaction. Please finish the transaction by 'CLOSE;'"
                    .to_string(),
            )),
        }
    }

    /// Run a query inside the open transaction, or as a single-use read.
    ///
    /// Column names come from the prepared statement, so they are known even
    /// when no row is returned.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> CliResult<QueryOutput> {
        debug!("query ({}): {}", self.txn_label(), sql);
        let stmt = self.client.prepare(sql).await?;
        let column_names = stmt
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let rows = self.client.query(&stmt, params).await?;
        let rows = rows.iter().map(decode_row).collect::<CliResult<Vec<_>>>()?;
        Ok(QueryOutput { column_names, rows })
    }

    /// Run a DML statement and return the number of rows written.
    ///
    /// Inside a read-write transaction the statement joins it; outside any
    /// transaction it gets its own read-write transaction.
    pub async fn update(&mut self, sql: &str) -> CliResult<u64> {
        match self.txn {
            TransactionState::ReadWrite => {
                debug!("update (rw txn): {}", sql);
                Ok(self.client.execute(sql, &[]).await?)
            }
            TransactionState::ReadOnly => Err(CliError::Transaction(
                "can not execute DML statement in read-only transaction".to_string(),
            )),
            TransactionState::None => self.run_in_read_write_transaction(sql).await,
        }
    }

    /// Apply one statement in its own read-write transaction.
    pub async fn run_in_read_write_transaction(&mut self, sql: &str) -> CliResult<u64> {
        self.ensure_no_transaction()?;
        debug!("update (single-statement txn): {}", sql);
        let txn = self.client.transaction().await?;
        let count = txn.execute(sql, &[]).await?;
        txn.commit().await?;
        Ok(count)
    }

    fn txn_label(&self) -> &'static str {
        match self.txn {
            TransactionState::None => "single use",
            TransactionState::ReadWrite => "rw txn",
            TransactionState::ReadOnly => "ro txn",
        }
    }

    /// Roll back anything still open and drop both connections.
    pub async fn close(mut self) {
        if self.in_transaction() {
            warn!("Closing session with an open {:?} transaction", self.txn);
            self.txn = TransactionState::None;
            if let Err(e) = self.client.batch_execute("ROLLBACK").await {
                warn!("Rollback on close failed: {}", e);
            }
        }
        debug!("Session on {} closed", self.path);
    }
}
