use std::time::Duration;

use liveagent_core::fakes::MemoryConnector;
use liveagent_core::{Connector, ExecutionSandbox, QueryParams};
use serde_json::json;

#[tokio::test]
async fn clean_query_returns_connector_rows() {
    let conn = MemoryConnector::new("pg").with_rows(json!([{"sku": "A", "quantity": 3}]));
    conn.connect().await.unwrap();
    let sandbox = ExecutionSandbox::new(true, 5.0);

    let mut params = QueryParams::new();
    params.insert("threshold".into(), json!(5));
    let r = sandbox
        .execute_query(
            &conn,
            "SELECT * FROM inventory WHERE quantity <= $threshold",
            Some(&params),
        )
        .await;

    assert!(r.success, "{r:?}");
    assert_eq!(r.result, Some(json!([{"sku": "A", "quantity": 3}])));
    assert!(r.error.is_none());
    assert!(r.execution_time_ms >= 0.0);
    assert_eq!(conn.received()[0].params, Some(params));
}

#[tokio::test]
async fn rejected_query_never_reaches_connector() {
    let conn = MemoryConnector::new("pg");
    let sandbox = ExecutionSandbox::new(true, 5.0);

    let r = sandbox.execute_query(&conn, "DROP TABLE inventory", None).await;

    assert!(!r.success);
    assert_eq!(
        r.error.as_deref(),
        Some("Dangerous keyword 'DROP' not allowed in read-only mode")
    );
    assert!(r.result.is_none());
    assert_eq!(conn.call_count(), 0);
}

#[tokio::test]
async fn suspicious_pattern_rejected_even_when_writable() {
    let conn = MemoryConnector::new("pg");
    let sandbox = ExecutionSandbox::new(false, 5.0);

    let r = sandbox
        .execute_query(&conn, "SELECT * FROM users WHERE name = 'x' --", None)
        .await;
    assert_eq!(r.error.as_deref(), Some("Suspicious pattern '--' detected"));

    let r = sandbox
        .execute_query(&conn, "UPDATE inventory SET quantity = 0", None)
        .await;
    assert!(r.success, "writable sandbox lets mutations through: {r:?}");
    assert_eq!(conn.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_connector_times_out() {
    let conn = MemoryConnector::new("pg").with_delay(Duration::from_secs(5));
    let sandbox = ExecutionSandbox::new(true, 0.05);

    let r = sandbox.execute_query(&conn, "SELECT 1", None).await;

    assert!(!r.success);
    let error = r.error.unwrap();
    assert!(error.contains("timed out"), "{error}");
    assert_eq!(error, "Query timed out after 0.05s");
    assert_eq!(conn.call_count(), 1);
}

#[tokio::test]
async fn connector_error_is_verbatim() {
    let conn = MemoryConnector::new("rest_api");
    conn.fail_with("HTTP 503: upstream down");
    let sandbox = ExecutionSandbox::default();

    let r = sandbox.execute_query(&conn, "/orders", None).await;
    assert_eq!(r.error.as_deref(), Some("HTTP 503: upstream down"));
}

#[test]
fn expressions_only_see_the_given_context() {
    let sandbox = ExecutionSandbox::default();
    let ctx = json!({"rows": [{"q": 4}, {"q": 6}, {"q": 1}]});
    let ctx = ctx.as_object().unwrap();

    let r = sandbox.execute_expression("sum([r['q'] for r in rows])", Some(ctx));
    assert!(!r.success, "comprehensions are not part of the grammar");
    assert!(r.error.unwrap().starts_with("Syntax error:"));

    let r = sandbox.execute_expression("rows[0]['q'] + rows[1].q", Some(ctx));
    assert_eq!(r.result, Some(json!(10)));

    let r = sandbox.execute_expression("max(1, 5, 3) == 5 and not False", None);
    assert_eq!(r.result, Some(json!(true)));

    let r = sandbox.execute_expression("len(rows)", None);
    assert_eq!(r.error.as_deref(), Some("name 'rows' is not defined"));
}

#[test]
fn long_operator_chain_is_a_failed_result() {
    let sandbox = ExecutionSandbox::default();

    let r = sandbox.execute_expression(&format!("1{}", "+1".repeat(200_000)), None);
    assert!(!r.success);
    let error = r.error.unwrap();
    assert!(error.starts_with("Syntax error:"), "{error}");
    assert!(error.contains("nested too deeply"), "{error}");

    let r = sandbox.execute_expression(&format!("1{}", " + 1".repeat(60)), None);
    assert_eq!(r.result, Some(json!(61)));
}

#[test]
fn nested_repetition_cannot_outgrow_the_build_budget() {
    let sandbox = ExecutionSandbox::default();

    let r = sandbox.execute_expression("len(str([[1] * 10000] * 1000))", None);
    assert!(!r.success);
    assert!(r.error.unwrap().contains("would build more than 1000000 values"));
}
