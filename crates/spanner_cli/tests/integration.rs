mod common;
use common::*;

use spanner_cli::runner::{run_statement, OutputOptions};
use spanner_cli::separator::Delimiter;
use tokio::sync::oneshot;

static TABLE_IDS: TableIdGenerator = TableIdGenerator::new();

async fn execute(session: &mut Session, sql: &str) -> ResultSet {
    let stmt = build_statement(sql).unwrap_or_else(|e| panic!("invalid statement: {}", e));
    stmt.execute(session)
        .await
        .unwrap_or_else(|e| panic!("unexpected error for {:?}: {}", sql, e))
}

#[tokio::test]
async fn test_select() {
    run_with_table(
        &TABLE_IDS,
        &["INSERT INTO [[TABLE]] (id, active) VALUES (1, true), (2, false)"],
        |mut session, table| async move {
            let result = execute(
                &mut session,
                &format!("SELECT id, active FROM {} ORDER BY id ASC", table),
            )
            .await;

            let expected = ResultSet {
                column_names: vec!["id".into(), "active".into()],
                rows: vec![Row::from(vec!["1", "true"]), Row::from(vec!["2", "false"])],
                stats: Stats {
                    affected_rows: 2,
                    ..Stats::default()
                },
                is_mutation: false,
            };
            assert_eq!(result.ignoring_timing(), expected);
            session.close().await;
        },
    )
    .await;
}

#[tokio::test]
async fn test_dml() {
    run_with_table(&TABLE_IDS, &[], |mut session, table| async move {
        let result = execute(
            &mut session,
            &format!(
                "INSERT INTO {} (id, active) VALUES (1, true), (2, false)",
                table
            ),
        )
        .await;

        let expected = ResultSet {
            column_names: vec![],
            rows: vec![],
            stats: Stats {
                affected_rows: 2,
                ..Stats::default()
            },
            is_mutation: true,
        };
        assert_eq!(result.ignoring_timing(), expected);

        assert_eq!(
            read_records(&session, &table).await,
            vec![
                TestRecord { id: 1, active: true },
                TestRecord {
                    id: 2,
                    active: false
                },
            ]
        );
        session.close().await;
    })
    .await;
}

#[tokio::test]
async fn test_select_empty_table_keeps_columns() {
    run_with_table(&TABLE_IDS, &[], |mut session, table| async move {
        let result = execute(&mut session, &format!("SELECT id, active FROM {}", table)).await;
        assert_eq!(
            result.ignoring_timing(),
            ResultSet::query(vec!["id".into(), "active".into()], vec![])
        );
        session.close().await;
    })
    .await;
}

#[tokio::test]
async fn test_read_write_transaction_commit_and_rollback() {
    run_with_table(&TABLE_IDS, &[], |mut session, table| async move {
        execute(&mut session, "BEGIN").await;
        assert_eq!(session.transaction_state(), TransactionState::ReadWrite);
        execute(
            &mut session,
            &format!("INSERT INTO {} (id, active) VALUES (1, true)", table),
        )
        .await;
        execute(&mut session, "COMMIT").await;
        assert_eq!(session.transaction_state(), TransactionState::None);

        execute(&mut session, "BEGIN RW").await;
        execute(&mut session, &format!("DELETE FROM {} WHERE true", table)).await;
        execute(&mut session, "ROLLBACK").await;

        assert_eq!(
            read_records(&session, &table).await,
            vec![TestRecord { id: 1, active: true }]
        );
        session.close().await;
    })
    .await;
}

#[tokio::test]
async fn test_read_only_transaction_rejects_dml() {
    run_with_table(
        &TABLE_IDS,
        &["INSERT INTO [[TABLE]] (id, active) VALUES (1, true)"],
        |mut session, table| async move {
            execute(&mut session, "BEGIN RO").await;
            let result = execute(&mut session, &format!("SELECT id FROM {}", table)).await;
            assert_eq!(result.rows, vec![Row::from(vec!["1"])]);

            let dml = build_statement(&format!("UPDATE {} SET active = false WHERE id = 1", table))
                .unwrap();
            let err = dml.execute(&mut session).await.unwrap_err();
            assert!(matches!(err, CliError::Transaction(_)));

            let commit = build_statement("COMMIT").unwrap();
            assert!(commit.execute(&mut session).await.is_err());

            execute(&mut session, "CLOSE").await;
            assert_eq!(session.transaction_state(), TransactionState::None);
            session.close().await;
        },
    )
    .await;
}

#[tokio::test]
async fn test_ddl_rejected_inside_transaction() {
    run_with_table(&TABLE_IDS, &[], |mut session, table| async move {
        execute(&mut session, "BEGIN").await;
        let ddl = build_statement(&format!("ALTER TABLE {} ADD COLUMN note TEXT", table)).unwrap();
        let err = ddl.execute(&mut session).await.unwrap_err();
        assert!(matches!(err, CliError::Transaction(_)));
        execute(&mut session, "ROLLBACK").await;
        session.close().await;
    })
    .await;
}

#[tokio::test]
async fn test_show_tables_and_columns() {
    run_with_table(&TABLE_IDS, &[], |mut session, table| async move {
        let tables = execute(&mut session, "SHOW TABLES").await;
        assert_eq!(
            tables.column_names,
            vec![format!("Tables_in_{}", session.path().database)]
        );
        assert!(tables.rows.iter().any(|r| r.columns == vec![table.clone()]));

        let columns = execute(&mut session, &format!("SHOW COLUMNS FROM {}", table)).await;
        assert_eq!(
            columns.column_names,
            vec!["Field", "Type", "NULL", "Key", "Default"]
        );
        let fields: Vec<&str> = columns.rows.iter().map(|r| r.columns[0].as_str()).collect();
        assert_eq!(fields, vec!["id", "active"]);
        assert_eq!(columns.rows[0].columns[3], "PRI");
        session.close().await;
    })
    .await;
}

#[tokio::test]
async fn test_show_create_table() {
    run_with_table(&TABLE_IDS, &[], |mut session, table| async move {
        let result = execute(&mut session, &format!("SHOW CREATE TABLE {}", table)).await;
        assert_eq!(result.column_names, vec!["Table", "Create Table"]);
        assert_eq!(result.rows.len(), 1);
        let ddl = &result.rows[0].columns[1];
        assert!(ddl.starts_with(&format!("CREATE TABLE {} (", table)));
        assert!(ddl.contains("PRIMARY KEY(id)"));
        session.close().await;
    })
    .await;
}

#[tokio::test]
async fn test_explain_select() {
    run_with_table(&TABLE_IDS, &[], |mut session, table| async move {
        let result = execute(&mut session, &format!("EXPLAIN SELECT id FROM {}", table)).await;
        assert_eq!(result.column_names, vec!["Query_Execution_Plan"]);
        assert!(!result.rows.is_empty());
        assert!(!result.is_mutation);
        session.close().await;
    })
    .await;
}

#[tokio::test]
async fn test_show_index() {
    run_with_table(&TABLE_IDS, &[], |mut session, table| async move {
        let index = format!("{}_by_active", table);
        execute(
            &mut session,
            &format!("CREATE INDEX {} ON {} (active)", index, table),
        )
        .await;

        let result = execute(&mut session, &format!("SHOW INDEX FROM {}", table)).await;
        assert_eq!(
            result.column_names,
            vec!["Table", "Key_name", "Index_definition"]
        );
        assert!(result.rows.iter().all(|r| r.columns[0] == table));
        assert!(result.rows.iter().any(|r| r.columns[1] == index));

        // the table cannot be dropped while an index still refers to it
        execute(&mut session, &format!("DROP INDEX {}", index)).await;
        session.close().await;
    })
    .await;
}

#[tokio::test]
async fn test_show_databases_lists_connected_database() {
    run_with_table(&TABLE_IDS, &[], |mut session, _table| async move {
        let result = execute(&mut session, "SHOW DATABASES").await;
        assert_eq!(result.column_names, vec!["Database"]);
        let database = session.path().database.clone();
        assert!(result.rows.iter().any(|r| r.columns == vec![database.clone()]));
        session.close().await;
    })
    .await;
}

#[tokio::test]
async fn test_use_switches_session() {
    run_with_table(&TABLE_IDS, &[], |mut session, table| async move {
        let opts = OutputOptions {
            mode: spanner_cli::format::OutputMode::Tab,
            summary: false,
            interactive: false,
        };
        let database = session.path().database.clone();
        let path_before = session.path().clone();

        execute(&mut session, "BEGIN").await;
        let refused = run_statement(
            &mut session,
            Statement::Use {
                database: database.clone(),
            },
            Delimiter::Horizontal,
            &opts,
        )
        .await;
        assert!(refused.is_err());
        execute(&mut session, "ROLLBACK").await;

        run_statement(
            &mut session,
            Statement::Use { database },
            Delimiter::Horizontal,
            &opts,
        )
        .await
        .unwrap_or_else(|e| panic!("USE failed: {:#}", e));
        assert_eq!(session.path(), &path_before);
        assert_eq!(session.transaction_state(), TransactionState::None);

        let tables = execute(&mut session, "SHOW TABLES").await;
        assert!(tables.rows.iter().any(|r| r.columns == vec![table.clone()]));
        session.close().await;
    })
    .await;
}

#[tokio::test]
async fn test_table_dropped_after_body_timeout() {
    let Some(env) = TestEnv::from_env() else {
        eprintln!("Integration tests skipped: {} etc. not set", ENV_PROJECT);
        return;
    };

    let (tx, rx) = oneshot::channel();
    let (outcome, teardown) = run_fixture(
        &env,
        &TABLE_IDS,
        &[],
        Duration::from_secs(2),
        |_session, table| async move {
            let _ = tx.send(table);
            std::future::pending::<()>().await;
        },
    )
    .await;

    let err = outcome.expect_err("body should have timed out");
    assert!(err.is_panic());
    teardown.unwrap_or_else(|e| panic!("teardown failed after timeout: {}", e));

    let table = rx.await.expect("body reported its table");
    let mut check = Session::connect(env.path.clone(), env.client.clone(), Some(env.credentials))
        .await
        .unwrap_or_else(|e| panic!("failed to create check session: {}", e));
    let tables = execute(&mut check, "SHOW TABLES").await;
    assert!(tables.rows.iter().all(|r| r.columns != vec![table.clone()]));
    check.close().await;
}
