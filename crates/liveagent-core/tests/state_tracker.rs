use std::sync::Arc;

use liveagent_core::fakes::MemoryConnector;
use liveagent_core::{Connector, StateTracker};

#[tokio::test]
async fn health_check_reports_every_connector() {
    let tracker = StateTracker::default();
    let up = Arc::new(MemoryConnector::new("surrealdb"));
    let down = Arc::new(MemoryConnector::new("rest_api"));
    down.set_healthy(false);

    tracker.register_connector("surrealdb", up.clone());
    tracker.register_connector("rest_api", down.clone());

    let health = tracker.health_check_all().await;
    assert_eq!(health.len(), 2);
    assert_eq!(health.get("surrealdb"), Some(&true));
    assert_eq!(health.get("rest_api"), Some(&false));
    assert_eq!(tracker.connector_names(), ["rest_api", "surrealdb"]);
}

#[tokio::test]
async fn empty_registry_is_empty_report() {
    let tracker = StateTracker::default();
    assert!(tracker.health_check_all().await.is_empty());
    assert!(tracker.get_connector("surrealdb").is_none());
}

#[tokio::test]
async fn disconnect_all_keeps_registrations() {
    let tracker = StateTracker::default();
    let conn = Arc::new(MemoryConnector::new("surrealdb"));
    conn.connect().await.unwrap();
    tracker.register_connector("surrealdb", conn.clone());

    tracker.disconnect_all().await;

    assert!(!conn.is_connected());
    assert!(tracker.get_connector("surrealdb").is_some());
}

#[tokio::test]
async fn concurrent_marks_are_all_recorded() {
    let tracker = Arc::new(StateTracker::new(300.0));

    let mut handles = Vec::new();
    for i in 0..16 {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            tracker.mark_accessed("orders", &format!("o-{i}"), "rest_api");
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    for i in 0..16 {
        assert!(!tracker.is_stale("orders", &format!("o-{i}")));
    }
    assert!(tracker.is_stale("orders", "o-99"));
}

#[test]
fn registering_twice_replaces() {
    let tracker = StateTracker::default();
    let first = Arc::new(MemoryConnector::new("first"));
    let second = Arc::new(MemoryConnector::new("second"));
    tracker.register_connector("db", first);
    tracker.register_connector("db", second.clone());

    let got = tracker.get_connector("db").unwrap();
    let expected: Arc<dyn Connector> = second;
    assert!(Arc::ptr_eq(&got, &expected));
}
