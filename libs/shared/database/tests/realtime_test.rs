use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::realtime::TableWatcher;
use shared_database::supabase::SupabaseClient;

fn mock_config(base_url: &str) -> AppConfig {
    AppConfig {
        supabase_url: base_url.to_string(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_jwt_secret: "test-secret".to_string(),
        supabase_functions_url: format!("{}/functions/v1", base_url),
    }
}

fn watcher(mock_server: &MockServer) -> TableWatcher {
    let supabase = Arc::new(SupabaseClient::new(&mock_config(&mock_server.uri())));
    TableWatcher::with_poll_interval(supabase, Duration::from_millis(20))
}

#[tokio::test]
async fn revision_bumps_when_watched_rows_change() {
    let mock_server = MockServer::start().await;

    // First snapshot is empty; every later poll sees a booking appear.
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("doctor_id", "eq.doc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("doctor_id", "eq.doc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "b-1", "appointment_time": "09:00:00" }
        ])))
        .mount(&mock_server)
        .await;

    let mut subscription =
        watcher(&mock_server).subscribe("bookings", "doctor_id=eq.doc-1", "test-token");

    assert!(
        subscription.changed_within(Duration::from_secs(2)).await,
        "snapshot change never produced a revision bump"
    );
}

#[tokio::test]
async fn stable_rows_produce_no_revision() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "w-1", "day_of_week": 1 }
        ])))
        .mount(&mock_server)
        .await;

    let mut subscription =
        watcher(&mock_server).subscribe("doctor_schedules", "doctor_id=eq.doc-1", "test-token");

    assert!(
        !subscription.changed_within(Duration::from_millis(300)).await,
        "unchanged snapshot must not bump the revision"
    );
}

#[tokio::test]
async fn dropping_the_handle_stops_the_poll_task() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let subscription = watcher(&mock_server).subscribe("bookings", "doctor_id=eq.doc-1", "test-token");
    let mut changes = subscription.changes();
    drop(subscription);

    // Aborting the poll task drops the sender, so the receiver observes
    // the channel closing instead of hanging forever.
    let closed = tokio::time::timeout(Duration::from_secs(2), changes.changed()).await;
    assert!(
        matches!(closed, Ok(Err(_))),
        "poll task kept running after the handle was dropped"
    );
}
