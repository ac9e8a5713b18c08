//! Batch processing tests through the public gateway API.
//!
//! These run against the mock pool, so they exercise splitting,
//! classification, parameter routing, and release accounting without a
//! database.

use metagate::db::{MetastorePool, MockMetastorePool, Value};
use metagate::gateway::MetastoreGateway;
use std::sync::{Arc, Mutex};

fn gateway_over(pool: &MockMetastorePool) -> MetastoreGateway {
    MetastoreGateway::new(Arc::new(pool.clone()))
}

#[tokio::test]
async fn test_mixed_batch_returns_last_query_result() {
    let pool = MockMetastorePool::new();
    let gateway = gateway_over(&pool);

    let result = gateway
        .process_batch(
            "use metastore; \
             insert into TBLS (tbl_id) values (1); \
             select tbl_id from TBLS; \
             show tables",
            None,
        )
        .await
        .unwrap()
        .expect("batch contains queries");

    // The mock echoes the statement text, so the surviving result
    // identifies which query produced it.
    assert_eq!(result.rows[0][0], Value::String("show tables".to_string()));

    let executed = pool.executed();
    assert_eq!(executed.len(), 4);
    assert!(!executed[0].was_query); // use
    assert!(!executed[1].was_query); // insert
    assert!(executed[2].was_query); // select
    assert!(executed[3].was_query); // show
}

#[tokio::test]
async fn test_statements_execute_in_split_order() {
    let pool = MockMetastorePool::new();
    let gateway = gateway_over(&pool);

    gateway
        .process_batch("select 1; ;update t set x=1;\n desc t", None)
        .await
        .unwrap();

    let sqls: Vec<String> = pool.executed().into_iter().map(|s| s.sql).collect();
    assert_eq!(sqls, vec!["select 1", "update t set x=1", "desc t"]);
}

#[tokio::test]
async fn test_mutation_only_batch_has_no_result() {
    let pool = MockMetastorePool::new();
    let gateway = gateway_over(&pool);

    let result = gateway
        .process_batch("create table t (x int); insert into t values (1)", None)
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(pool.idle_sessions(), 1);
}

#[tokio::test]
async fn test_per_statement_params_are_routed_by_position() {
    let pool = MockMetastorePool::new();
    let gateway = gateway_over(&pool);

    gateway
        .process_batch(
            "update TBLS set owner = $1 where tbl_id = $2; \
             select * from TBLS where tbl_id = $1",
            Some(&[
                vec![Value::String("hive".to_string()), Value::Int(7)],
                vec![Value::Int(7)],
            ]),
        )
        .await
        .unwrap();

    let executed = pool.executed();
    assert_eq!(
        executed[0].params,
        vec![Value::String("hive".to_string()), Value::Int(7)]
    );
    assert_eq!(executed[1].params, vec![Value::Int(7)]);
}

#[tokio::test]
async fn test_failure_mid_batch_aborts_and_releases_session() {
    let pool = MockMetastorePool::new();
    pool.fail_on_statement("bad_table");
    let gateway = gateway_over(&pool);

    let available_before = pool.idle_sessions();

    let err = gateway
        .process_batch(
            "select 1; insert into bad_table values (1); select 2",
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        metagate::error::MetagateError::StatementExecution(_)
    ));
    assert_eq!(pool.executed().len(), 1);
    assert_eq!(pool.idle_sessions(), available_before);
}

#[tokio::test]
async fn test_acquire_failure_notifies_and_executes_nothing() {
    let pool = MockMetastorePool::new();
    pool.fail_acquires();

    let notified: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notified);
    let gateway = MetastoreGateway::new(Arc::new(pool.clone()))
        .with_acquire_notifier(move |msg| sink.lock().unwrap().push(msg.to_string()));

    let err = gateway
        .process_batch("select * from TBLS", None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        metagate::error::MetagateError::ConnectionAcquisition(_)
    ));
    assert!(pool.executed().is_empty());
    assert_eq!(notified.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_batches_use_distinct_sessions() {
    let pool = MockMetastorePool::with_capacity(2);
    let gateway = Arc::new(gateway_over(&pool));

    let a = {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move { gateway.process_batch("select 'a'", None).await })
    };
    let b = {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move { gateway.process_batch("select 'b'", None).await })
    };

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(pool.executed().len(), 2);
    assert_eq!(pool.idle_sessions(), 2);
}
