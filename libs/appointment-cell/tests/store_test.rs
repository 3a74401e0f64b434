use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    AppointmentChanges, AppointmentError, AppointmentStatus, NewAppointment,
};
use appointment_cell::services::store::{AppointmentStore, PostgrestAppointmentStore};
use shared_utils::test_utils::TestConfig;

fn appointment_row(status: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "patient_id": Uuid::new_v4(),
        "practitioner_id": Uuid::new_v4(),
        "therapy": "physiotherapy",
        "start_time": "2030-01-15T10:00:00Z",
        "end_time": "2030-01-15T11:00:00Z",
        "duration_minutes": 60,
        "status": status,
        "patient_notes": null,
        "practitioner_notes": null,
        "follow_up_required": false,
        "follow_up_date": null,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
    })
}

fn new_record() -> NewAppointment {
    NewAppointment {
        patient_id: Uuid::new_v4(),
        practitioner_id: Uuid::new_v4(),
        therapy: "physiotherapy".to_string(),
        start_time: Utc::now() + Duration::days(7),
        duration_minutes: 60,
        patient_notes: None,
    }
}

#[tokio::test]
async fn insert_posts_after_clean_overlap_preread() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([appointment_row("scheduled")])))
        .mount(&mock_server)
        .await;

    let store = PostgrestAppointmentStore::new(&TestConfig::with_store_url(&mock_server.uri()));

    let appointment = store.insert(new_record(), "token").await.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn insert_conflicts_when_preread_finds_overlap() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row("confirmed")])))
        .mount(&mock_server)
        .await;

    let store = PostgrestAppointmentStore::new(&TestConfig::with_store_url(&mock_server.uri()));

    let result = store.insert(new_record(), "token").await;
    assert_matches!(result, Err(AppointmentError::Conflict));
}

#[tokio::test]
async fn insert_maps_exclusion_constraint_violation_to_conflict() {
    let mock_server = MockServer::start().await;

    // The pre-read saw a clean window, but a racing insert won: the store's
    // exclusion constraint rejects the write with a 409.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "conflicting key value violates exclusion constraint \"appointments_no_overlap\""
        })))
        .mount(&mock_server)
        .await;

    let store = PostgrestAppointmentStore::new(&TestConfig::with_store_url(&mock_server.uri()));

    let result = store.insert(new_record(), "token").await;
    assert_matches!(result, Err(AppointmentError::Conflict));
}

#[tokio::test]
async fn insert_rejects_invalid_input_without_touching_the_store() {
    // No mocks mounted: a request would fail loudly.
    let mock_server = MockServer::start().await;
    let store = PostgrestAppointmentStore::new(&TestConfig::with_store_url(&mock_server.uri()));

    let mut record = new_record();
    record.duration_minutes = -15;

    let result = store.insert(record, "token").await;
    assert_matches!(result, Err(AppointmentError::Validation(_)));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn fetch_maps_empty_result_to_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let store = PostgrestAppointmentStore::new(&TestConfig::with_store_url(&mock_server.uri()));

    let result = store.fetch(Uuid::new_v4(), "token").await;
    assert_matches!(result, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn guarded_update_losing_the_race_surfaces_invalid_transition() {
    let mock_server = MockServer::start().await;

    // The conditional PATCH matches nothing...
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // ...and the re-read shows a concurrent transition already completed it.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row("completed")])))
        .mount(&mock_server)
        .await;

    let store = PostgrestAppointmentStore::new(&TestConfig::with_store_url(&mock_server.uri()));

    let changes = AppointmentChanges::transition(
        AppointmentStatus::Scheduled,
        AppointmentStatus::Cancelled,
    );
    let result = store.update(Uuid::new_v4(), changes, "token").await;

    match result {
        Err(AppointmentError::InvalidTransition { from, to }) => {
            assert_eq!(from, AppointmentStatus::Completed);
            assert_eq!(to, AppointmentStatus::Cancelled);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn guarded_update_on_missing_row_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let store = PostgrestAppointmentStore::new(&TestConfig::with_store_url(&mock_server.uri()));

    let changes = AppointmentChanges::transition(
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
    );
    let result = store.update(Uuid::new_v4(), changes, "token").await;
    assert_matches!(result, Err(AppointmentError::NotFound));
}
