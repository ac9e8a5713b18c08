//! Live query execution tests.
//!
//! These run the full stack (config, postgres pool, gateway) against a real
//! database. Set the DATABASE_URL environment variable to run them.

use metagate::config::MetastoreConfig;
use metagate::db::{self, MetastorePool, Value};
use metagate::gateway::MetastoreGateway;
use std::sync::Arc;

/// Builds a pool config from DATABASE_URL, with the credentials moved out
/// of the URL the way the configuration surface expects them.
fn test_config() -> Option<MetastoreConfig> {
    let raw = std::env::var("DATABASE_URL").ok()?;
    let parsed = url::Url::parse(&raw).ok()?;

    let mut bare = parsed.clone();
    bare.set_username("").ok()?;
    bare.set_password(None).ok()?;

    Some(MetastoreConfig {
        url: bare.into(),
        user: Some(parsed.username().to_string()),
        password: Some(parsed.password().unwrap_or("").to_string()),
        max_active: 2,
        ..MetastoreConfig::default()
    })
}

async fn test_gateway() -> Option<(Arc<dyn MetastorePool>, MetastoreGateway)> {
    let config = test_config()?;
    let pool: Arc<dyn MetastorePool> = Arc::from(db::connect(&config).ok()?);
    let gateway = MetastoreGateway::new(Arc::clone(&pool));
    Some((pool, gateway))
}

#[tokio::test]
async fn test_simple_select_batch() {
    let Some((pool, gateway)) = test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = gateway
        .process_batch("SELECT 1 as num, 'meta' as label", None)
        .await
        .unwrap()
        .expect("select produces a result");

    assert_eq!(result.columns.len(), 2);
    assert_eq!(result.columns[0].name, "num");
    assert_eq!(result.columns[1].name, "label");
    assert_eq!(result.rows[0][0], Value::Int(1));
    assert_eq!(result.rows[0][1], Value::String("meta".to_string()));

    pool.shutdown().await;
}

#[tokio::test]
async fn test_mixed_batch_on_one_session() {
    let Some((pool, gateway)) = test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    // Temporary tables are session-scoped, so the later statements only
    // see the table if the whole batch ran on the same session.
    let result = gateway
        .process_batch(
            "create temporary table mg_tbls (tbl_id int8, tbl_name text); \
             insert into mg_tbls values (1, 'partitions'); \
             insert into mg_tbls values (2, 'columns_v2'); \
             select tbl_id, tbl_name from mg_tbls order by tbl_id",
            None,
        )
        .await
        .unwrap()
        .expect("batch ends in a select");

    assert_eq!(result.row_count, 2);
    assert_eq!(result.rows[0][0], Value::Int(1));
    assert_eq!(result.rows[1][1], Value::String("columns_v2".to_string()));

    pool.shutdown().await;
}

#[tokio::test]
async fn test_last_query_wins_live() {
    let Some((pool, gateway)) = test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = gateway
        .process_batch("select 1 as a; select 2 as b", None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.columns[0].name, "b");
    assert_eq!(result.rows[0][0], Value::Int(2));

    pool.shutdown().await;
}

#[tokio::test]
async fn test_bound_parameters_reach_driver() {
    let Some((pool, gateway)) = test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = gateway
        .process_batch(
            "select $1::int8 as id, $2::text as owner",
            Some(&[vec![Value::Int(42), Value::String("hive".to_string())]]),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.rows[0][0], Value::Int(42));
    assert_eq!(result.rows[0][1], Value::String("hive".to_string()));

    pool.shutdown().await;
}

#[tokio::test]
async fn test_scalar_type_conversion() {
    let Some((pool, gateway)) = test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = gateway
        .process_batch(
            "select true as flag, 2.5::float8 as ratio, null::text as missing, \
             '2024-03-01'::date as day",
            None,
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.rows[0][0], Value::Bool(true));
    assert_eq!(result.rows[0][1], Value::Float(2.5));
    assert!(result.rows[0][2].is_null());
    assert_eq!(
        result.rows[0][3],
        Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    );

    pool.shutdown().await;
}

#[tokio::test]
async fn test_failing_statement_aborts_batch() {
    let Some((pool, gateway)) = test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = gateway
        .process_batch(
            "select 1; select * from mg_no_such_table; select 3",
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        metagate::error::MetagateError::StatementExecution(_)
    ));

    // The session went back to the pool; the next batch still works.
    let result = gateway.process_batch("select 1 as n", None).await.unwrap();
    assert!(result.is_some());

    pool.shutdown().await;
}
