use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use schedule_cell::router::schedule_routes;
use schedule_cell::services::schedule::ScheduleService;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn create_test_app(config: &TestConfig) -> Router {
    schedule_routes(config.to_arc())
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn save_schedule_replaces_and_returns_windows() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_mock_server(&mock_server.uri());

    let doctor = TestUser::doctor("doc@example.com");
    let doctor_id = doctor.id.clone();
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);

    // Sparse Monday selection collapses to one 08:00-10:00 window.
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::schedule_window_response(&doctor_id, 1, "08:00", "10:00")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctor_schedules"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&config);
    let request = Request::builder()
        .method("PUT")
        .uri(format!("/doctors/{}", doctor_id))
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({
                "selections": {
                    "1": ["08:00", "08:30", "09:30"]
                }
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["open_days"], 1);
    assert_eq!(body["windows"][0]["day_of_week"], 1);
    assert_eq!(body["windows"][0]["start_time"], "08:00");
    assert_eq!(body["windows"][0]["end_time"], "10:00");
}

#[tokio::test]
async fn save_schedule_rejects_other_users() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_mock_server(&mock_server.uri());

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let doctor_id = Uuid::new_v4();

    let app = create_test_app(&config);
    let request = Request::builder()
        .method("PUT")
        .uri(format!("/doctors/{}", doctor_id))
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({ "selections": { "1": ["08:00"] } }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn save_schedule_rejects_off_grid_times() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_mock_server(&mock_server.uri());

    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);

    let app = create_test_app(&config);
    let request = Request::builder()
        .method("PUT")
        .uri(format!("/doctors/{}", doctor.id))
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({ "selections": { "1": ["08:15"] } }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_schedule_returns_persisted_windows() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_mock_server(&mock_server.uri());

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::schedule_window_response(&doctor_id, 1, "08:00:00", "10:00:00"),
            MockSupabaseResponses::schedule_window_response(&doctor_id, 3, "14:00:00", "16:30:00"),
        ])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&config);
    let request = Request::builder()
        .method("GET")
        .uri(format!("/doctors/{}", doctor_id))
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Store-format HH:MM:SS times come back out as HH:MM.
    let body = read_json(response).await;
    assert_eq!(body["windows"].as_array().unwrap().len(), 2);
    assert_eq!(body["windows"][0]["start_time"], "08:00");
    assert_eq!(body["windows"][1]["end_time"], "16:30");
}

#[tokio::test]
async fn slots_for_closed_weekday_are_empty() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_mock_server(&mock_server.uri());

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&config);
    // 2026-08-30 is a Sunday.
    let request = Request::builder()
        .method("GET")
        .uri(format!("/doctors/{}/slots?date=2026-08-30", doctor_id))
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["total_slots"], 0);
    assert_eq!(body["slots"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn booked_times_show_as_unavailable_slots() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_mock_server(&mock_server.uri());

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let doctor_id = Uuid::new_v4().to_string();

    // 2026-08-31 is a Monday, day_of_week 1.
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("day_of_week", "eq.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::schedule_window_response(&doctor_id, 1, "08:00:00", "10:00:00")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("appointment_date", "eq.2026-08-31"))
        .and(query_param("status", "neq.cancelled"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "appointment_time": "09:00:00" }])),
        )
        .mount(&mock_server)
        .await;

    let app = create_test_app(&config);
    let request = Request::builder()
        .method("GET")
        .uri(format!("/doctors/{}/slots?date=2026-08-31", doctor_id))
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    let slots = body["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 4);

    for slot in slots {
        let expected = slot["time"] != "09:00";
        assert_eq!(slot["available"], expected, "slot {:?}", slot);
    }
}

#[tokio::test]
async fn malformed_booking_rows_do_not_break_derivation() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_mock_server(&mock_server.uri());

    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::schedule_window_response(&doctor_id, 1, "08:00:00", "10:00:00")
        ])))
        .mount(&mock_server)
        .await;

    // One corrupt row alongside a real booking; only the parseable time
    // must mark a slot taken.
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "appointment_time": "not a clock time" },
            { "appointment_time": null },
            { "appointment_time": "09:00:00" },
        ])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&config);
    let request = Request::builder()
        .method("GET")
        .uri(format!("/doctors/{}/slots?date=2026-08-31", doctor_id))
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    let slots = body["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 4);
    for slot in slots {
        let expected = slot["time"] != "09:00";
        assert_eq!(slot["available"], expected, "slot {:?}", slot);
    }
}

#[tokio::test]
async fn schedule_watch_handle_tears_down_on_drop() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_mock_server(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = ScheduleService::new(&config.to_app_config());
    let subscription = service.watch_schedule(Uuid::new_v4(), "test-token");
    let mut changes = subscription.changes();
    drop(subscription);

    let closed =
        tokio::time::timeout(std::time::Duration::from_secs(2), changes.changed()).await;
    assert!(matches!(closed, Ok(Err(_))));
}

#[tokio::test]
async fn missing_auth_header_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_mock_server(&mock_server.uri());

    let app = create_test_app(&config);
    let request = Request::builder()
        .method("GET")
        .uri(format!("/doctors/{}", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
