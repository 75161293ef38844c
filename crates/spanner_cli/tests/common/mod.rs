#![allow(dead_code, unused_imports)]

pub use std::future::Future;
pub use std::path::Path;
pub use std::sync::atomic::{AtomicU32, Ordering};
pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use tokio::task::JoinError;
pub use tokio::time::Instant;

pub use spanner_cli::{
    build_statement, AdminClient, CliError, CliResult, ClientConfig, Credentials, DatabasePath,
    ResultSet, Row, Session, Stats, Statement, TransactionState, UpdateDatabaseDdlRequest,
};

pub const ENV_PROJECT: &str = "SPANNER_CLI_INTEGRATION_TEST_PROJECT_ID";
pub const ENV_INSTANCE: &str = "SPANNER_CLI_INTEGRATION_TEST_INSTANCE_ID";
pub const ENV_DATABASE: &str = "SPANNER_CLI_INTEGRATION_TEST_DATABASE_ID";
pub const ENV_CREDENTIAL: &str = "SPANNER_CLI_INTEGRATION_TEST_CREDENTIAL";
pub const ENV_ENDPOINT: &str = "SPANNER_CLI_INTEGRATION_TEST_ENDPOINT";

/// Budget for one test: setup and body.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Time the table drop always gets, even after the test deadline passed.
pub const TEARDOWN_GRACE: Duration = Duration::from_secs(60);

pub const TABLE_PLACEHOLDER: &str = "[[TABLE]]";

/// Connection settings read from the environment.
pub struct TestEnv {
    pub path: DatabasePath,
    pub credentials: Credentials,
    pub client: ClientConfig,
}

impl TestEnv {
    /// `None` unless all four required variables are set and non-empty.
    ///
    /// The credential variable holds the JSON key itself; a value that does
    /// not start with `{` is read as a path to the key file.
    pub fn from_env() -> Option<TestEnv> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let project = var(ENV_PROJECT)?;
        let instance = var(ENV_INSTANCE)?;
        let database = var(ENV_DATABASE)?;
        let credential = var(ENV_CREDENTIAL)?;

        let credentials = if credential.trim_start().starts_with('{') {
            Credentials::from_json(&credential)
        } else {
            Credentials::from_file(Path::new(credential.trim()))
        }
        .unwrap_or_else(|e| panic!("invalid {}: {}", ENV_CREDENTIAL, e));

        let mut client = ClientConfig::default();
        if let Some(endpoint) = var(ENV_ENDPOINT) {
            client.endpoint = endpoint
                .parse()
                .unwrap_or_else(|e| panic!("invalid {}: {}", ENV_ENDPOINT, e));
        }

        Some(TestEnv {
            path: DatabasePath::new(project, instance, database),
            credentials,
            client,
        })
    }
}

/// Source of unique table names: `spanner_cli_test_{unix_nanos}_{count}`.
///
/// The counter keeps names distinct when two calls see the same timestamp.
pub struct TableIdGenerator {
    counter: AtomicU32,
}

impl TableIdGenerator {
    pub const fn new() -> Self {
        Self {
            counter: AtomicU32::new(0),
        }
    }

    pub fn next_id(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        self.id_at(nanos)
    }

    /// Id for an explicit timestamp.
    pub fn id_at(&self, unix_nanos: u128) -> String {
        let count = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        format!("spanner_cli_test_{}_{}", unix_nanos, count)
    }
}

impl Default for TableIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// One row of the fixture table, decoded field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestRecord {
    pub id: i64,
    pub active: bool,
}

impl TestRecord {
    pub fn from_row(row: &tokio_postgres::Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            active: row.try_get("active")?,
        })
    }
}

/// Read every row of `table` ordered by key, outside any transaction.
pub async fn read_records(session: &Session, table: &str) -> Vec<TestRecord> {
    let rows = session
        .client()
        .query(
            format!("SELECT id, active FROM {} ORDER BY id ASC", table).as_str(),
            &[],
        )
        .await
        .unwrap_or_else(|e| panic!("failed to read {}: {}", table, e));
    rows.iter()
        .map(|r| TestRecord::from_row(r).unwrap_or_else(|e| panic!("bad row: {}", e)))
        .collect()
}

pub fn create_table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE {} (id BIGINT NOT NULL, active BOOL NOT NULL, PRIMARY KEY (id))",
        table
    )
}

async fn apply_ddl(admin: &AdminClient, statement: String, deadline: Instant) -> CliResult<()> {
    admin
        .update_database_ddl(UpdateDatabaseDdlRequest {
            database: admin.path().to_string(),
            statements: vec![statement],
        })
        .await?
        .wait_until(deadline)
        .await
}

/// Drops the fixture table.
pub struct Teardown {
    admin: AdminClient,
    table: String,
    deadline: Instant,
}

impl Teardown {
    pub async fn run(self) -> CliResult<()> {
        let deadline = self.deadline.max(Instant::now() + TEARDOWN_GRACE);
        apply_ddl(&self.admin, format!("DROP TABLE {}", self.table), deadline).await
    }
}

pub struct Fixture {
    pub session: Session,
    pub table: String,
    pub teardown: Teardown,
}

/// Connect, create a fresh table and apply `dmls` to it, each in its own
/// read-write transaction. `[[TABLE]]` in a DML is replaced with the table
/// name. Any failure panics.
pub async fn setup(
    env: &TestEnv,
    ids: &TableIdGenerator,
    dmls: &[&str],
    deadline: Instant,
) -> Fixture {
    let mut session = Session::connect(
        env.path.clone(),
        env.client.clone(),
        Some(env.credentials.clone()),
    )
    .await
    .unwrap_or_else(|e| panic!("failed to create test session: {}", e));

    let table = ids.next_id();
    apply_ddl(session.admin(), create_table_ddl(&table), deadline)
        .await
        .unwrap_or_else(|e| panic!("failed to create table {}: {}", table, e));

    for dml in dmls {
        let dml = dml.replace(TABLE_PLACEHOLDER, &table);
        session
            .run_in_read_write_transaction(&dml)
            .await
            .unwrap_or_else(|e| panic!("failed to apply DML: dml={}, err={}", dml, e));
    }

    Fixture {
        teardown: Teardown {
            admin: session.admin().clone(),
            table: table.clone(),
            deadline,
        },
        session,
        table,
    }
}

/// Decide the test outcome once teardown has run.
///
/// A failed teardown fails the test even when the body passed. Otherwise a
/// panic from the body is resumed.
pub fn settle(body: Result<(), JoinError>, teardown: CliResult<()>) {
    if let Err(e) = teardown {
        if let Err(body_err) = &body {
            eprintln!("test body also failed: {}", body_err);
        }
        panic!("failed to drop table: {}", e);
    }
    match body {
        Ok(()) => {}
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => panic!("test body did not finish: {}", e),
    }
}

/// Set up a fixture, run `body` on it for at most `body_timeout` and then
/// drop the table whatever the body did.
///
/// Returns the body outcome and the teardown result for [`settle`].
pub async fn run_fixture<F, Fut>(
    env: &TestEnv,
    ids: &TableIdGenerator,
    dmls: &[&str],
    body_timeout: Duration,
    body: F,
) -> (Result<(), JoinError>, CliResult<()>)
where
    F: FnOnce(Session, String) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let deadline = Instant::now() + TEST_TIMEOUT;
    let fixture = setup(env, ids, dmls, deadline).await;

    let body_deadline = deadline.min(Instant::now() + body_timeout);
    let fut = body(fixture.session, fixture.table);
    let outcome = tokio::spawn(async move {
        if tokio::time::timeout_at(body_deadline, fut).await.is_err() {
            panic!("test body exceeded {:?}", body_timeout);
        }
    })
    .await;

    let teardown = fixture.teardown.run().await;
    (outcome, teardown)
}

/// Run `body` against a fresh fixture table, then always drop the table.
///
/// Table names come from `ids`; each test binary declares one shared
/// generator. Returns early, skipping the test, when the integration
/// environment is not configured.
pub async fn run_with_table<F, Fut>(ids: &'static TableIdGenerator, dmls: &[&str], body: F)
where
    F: FnOnce(Session, String) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let Some(env) = TestEnv::from_env() else {
        eprintln!("Integration tests skipped: {} etc. not set", ENV_PROJECT);
        return;
    };
    let (outcome, teardown) = run_fixture(&env, ids, dmls, TEST_TIMEOUT, body).await;
    settle(outcome, teardown);
}
