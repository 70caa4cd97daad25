use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tower::ServiceExt;

use clinic_booking::config::AppConfig;
use clinic_booking::db;
use clinic_booking::db::queries::{self, NewAppointment};
use clinic_booking::handlers;
use clinic_booking::models::{ClockTime, VisitType};
use clinic_booking::services::ai::{LlmProvider, Message};
use clinic_booking::services::booking::DeclinePolicy;
use clinic_booking::services::session_store::SessionStore;
use clinic_booking::state::AppState;

// ── Mock Provider ──

/// Puts the latest user message into the field for the step named in the prompt.
///
/// Messages prefixed with `other:` are flagged as carrying another step's data;
/// messages containing `garble` produce unparseable output.
struct MockLlm;

fn step_from_prompt(prompt: &str) -> &str {
    prompt
        .split("parsing user input for the ")
        .nth(1)
        .and_then(|rest| rest.split(' ').next())
        .unwrap_or("")
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        // Give other requests a chance to run, like a real network call would.
        tokio::task::yield_now().await;
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        if last.contains("garble") {
            return Ok("Sorry, I can't help with that.".to_string());
        }

        let (other_step, value) = match last.strip_prefix("other:") {
            Some(rest) => (true, rest.trim()),
            None => (false, last.trim()),
        };

        let data = match step_from_prompt(system_prompt) {
            "PATIENT_ID" => serde_json::json!({ "patientNumber": value }),
            "VISIT_TYPE" => serde_json::json!({ "visitType": value }),
            "DEPARTMENT" => serde_json::json!({ "department": value }),
            "DOCTOR" => serde_json::json!({ "doctor": value }),
            "DATE" => serde_json::json!({ "date": value }),
            "TIME" => serde_json::json!({ "time": value }),
            "CONFIRMATION" => {
                let confirmed = match value {
                    "yes" => Some(true),
                    "no" => Some(false),
                    _ => None,
                };
                serde_json::json!({ "userConfirmed": confirmed })
            }
            other => anyhow::bail!("unexpected step in prompt: {other}"),
        };

        Ok(serde_json::json!({
            "extractedData": data,
            "containsOtherStepInfo": other_step,
            "confidence": 0.9,
        })
        .to_string())
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        llm_provider: "mock".to_string(),
        openai_api_key: "".to_string(),
        openai_model: "".to_string(),
        openai_base_url: "".to_string(),
        ollama_url: "http://localhost:11434".to_string(),
        ollama_model: "llama3.2".to_string(),
        session_idle_minutes: 30,
        session_sweep_secs: 1800,
        decline_policy: DeclinePolicy::Purge,
        seed_reference_data: true,
    }
}

fn test_state() -> Arc<AppState> {
    let config = test_config();
    let conn = db::init_db(":memory:").unwrap();
    db::seed::seed_reference_data(&conn).unwrap();
    Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        sessions: SessionStore::new(config.session_idle()),
        config,
        llm: Box::new(MockLlm),
    })
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

/// First Monday strictly after today. Dr. Sarah Johnson works Mondays.
fn next_monday() -> NaiveDate {
    let mut d = chrono::Local::now().date_naive() + Duration::days(1);
    while d.weekday() != Weekday::Mon {
        d += Duration::days(1);
    }
    d
}

async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = test_app(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn start_session(state: &Arc<AppState>) -> String {
    let (status, json) = send(
        state,
        json_request("POST", "/api/session/start", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["sessionId"].as_str().unwrap().to_string()
}

async fn say(state: &Arc<AppState>, id: &str, message: &str) -> (StatusCode, serde_json::Value) {
    send(
        state,
        json_request(
            "POST",
            &format!("/api/session/{id}/message"),
            serde_json::json!({ "message": message }),
        ),
    )
    .await
}

/// Walks a new session up to the TIME step with Dr. Sarah Johnson next Monday.
async fn session_at_time_step(state: &Arc<AppState>) -> String {
    let id = start_session(state).await;
    let monday = next_monday().format("%Y-%m-%d").to_string();
    for message in ["P001", "checkup", "Cardiology", "Sarah Johnson", monday.as_str()] {
        let (status, json) = say(state, &id, message).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["accepted"], true, "{message}: {}", json["message"]);
    }
    id
}

// ── Health & Reference Data ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let (status, json) = send(&state, empty_request("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_list_patients() {
    let state = test_state();
    let (status, json) = send(&state, empty_request("GET", "/api/patients")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 10);
    assert_eq!(json["patients"][0]["patientNumber"], "P001");
}

// ── Session Lifecycle ──

#[tokio::test]
async fn test_start_session_defaults_to_strict() {
    let state = test_state();
    let (status, json) = send(
        &state,
        json_request("POST", "/api/session/start", serde_json::json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["agentType"], "strict");
    assert_eq!(json["currentStep"], "PATIENT_ID");
    assert_eq!(json["options"]["component"], "Input");
    assert!(json["message"].as_str().unwrap().contains("patient number"));
}

#[tokio::test]
async fn test_start_session_accepts_baseline_alias() {
    let state = test_state();
    let (status, json) = send(
        &state,
        json_request(
            "POST",
            "/api/session/start",
            serde_json::json!({ "agentType": "baseline" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["agentType"], "strict");
}

#[tokio::test]
async fn test_permissive_mode_is_refused() {
    let state = test_state();
    for mode in ["permissive", "adaptive"] {
        let (status, json) = send(
            &state,
            json_request(
                "POST",
                "/api/session/start",
                serde_json::json!({ "agentType": mode }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"]
            .as_str()
            .unwrap()
            .contains("unsupported conversation mode"));
    }
    assert_eq!(state.sessions.count(), 0);
}

#[tokio::test]
async fn test_unknown_mode_is_bad_request() {
    let state = test_state();
    let (status, _) = send(
        &state,
        json_request(
            "POST",
            "/api/session/start",
            serde_json::json!({ "agentType": "freeform" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let state = test_state();

    let (status, _) = send(&state, empty_request("GET", "/api/session/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = say(&state, "nope", "P001").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&state, empty_request("DELETE", "/api/session/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_session() {
    let state = test_state();
    let id = start_session(&state).await;

    let (status, _) = send(&state, empty_request("DELETE", &format!("/api/session/{id}"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&state, empty_request("GET", &format!("/api/session/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_message_is_bad_request() {
    let state = test_state();
    let id = start_session(&state).await;
    let (status, _) = say(&state, &id, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Booking Flow ──

#[tokio::test]
async fn test_full_booking_flow() {
    let state = test_state();
    let id = session_at_time_step(&state).await;

    let (_, json) = say(&state, &id, "9:00").await;
    assert_eq!(json["accepted"], true);
    assert_eq!(json["currentStep"], "CONFIRMATION");
    assert_eq!(json["appointmentData"]["time"], "09:00");
    assert_eq!(json["options"]["component"], "ButtonGroup");

    let (status, json) = say(&state, &id, "yes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["accepted"], true);
    assert_eq!(json["status"], "booked");
    assert!(json["options"].is_null());

    let data = &json["appointmentData"];
    assert_eq!(data["patientId"], "P001");
    assert_eq!(data["visitType"], "checkup");
    assert_eq!(data["department"], "Cardiology");
    assert_eq!(data["doctor"], "Dr. Sarah Johnson");
    assert_eq!(data["confirmed"], true);

    // Greeting plus a user/assistant pair for each of the seven turns.
    assert_eq!(json["conversationHistory"].as_array().unwrap().len(), 15);

    let appointment_id = json["appointmentId"].as_i64().unwrap();
    let conn = state.db().unwrap();
    let appt = queries::get_appointment(&conn, appointment_id).unwrap().unwrap();
    assert_eq!(appt.doctor_name, "Dr. Sarah Johnson");
    assert_eq!(appt.date, next_monday());
    assert_eq!(appt.time.to_string(), "09:00");
    assert_eq!(appt.session_id.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn test_step_options_follow_known_fields() {
    let state = test_state();
    let id = start_session(&state).await;

    say(&state, &id, "P001").await;
    let (_, json) = say(&state, &id, "checkup").await;
    assert_eq!(json["options"]["component"], "Select");

    let (_, json) = say(&state, &id, "Cardiology").await;
    let doctors: Vec<&str> = json["options"]["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["value"].as_str().unwrap())
        .collect();
    assert_eq!(doctors, vec!["Dr. Sarah Johnson", "Dr. Amanda Lewis"]);

    let (_, json) = say(&state, &id, "Sarah Johnson").await;
    assert_eq!(json["options"]["component"], "Calendar");
    assert_eq!(
        json["options"]["calendarProps"]["disabledDaysOfWeek"],
        serde_json::json!([0, 2, 4, 6])
    );
}

#[tokio::test]
async fn test_out_of_step_data_rejected() {
    let state = test_state();
    let id = start_session(&state).await;

    let (status, json) = say(&state, &id, "other: P001").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["accepted"], false);
    assert_eq!(json["rejectionReason"], "OUT_OF_STEP_DATA");
    assert_eq!(json["currentStep"], "PATIENT_ID");
    assert!(json["appointmentData"].get("patientId").is_none());
}

#[tokio::test]
async fn test_unknown_patient_rejected() {
    let state = test_state();
    let id = start_session(&state).await;

    let (_, json) = say(&state, &id, "P404").await;
    assert_eq!(json["accepted"], false);
    assert_eq!(json["rejectionReason"], "NOT_FOUND");
    assert_eq!(json["currentStep"], "PATIENT_ID");
}

#[tokio::test]
async fn test_ineligible_doctor_rejected() {
    let state = test_state();
    let id = start_session(&state).await;
    for message in ["P001", "checkup", "Cardiology"] {
        say(&state, &id, message).await;
    }

    let (_, json) = say(&state, &id, "Robert Martinez").await;
    assert_eq!(json["accepted"], false);
    assert_eq!(json["rejectionReason"], "NOT_FOUND");
    assert_eq!(json["currentStep"], "DOCTOR");
}

#[tokio::test]
async fn test_slot_taken_rejected() {
    let state = test_state();
    {
        let conn = state.db().unwrap();
        queries::insert_appointment(
            &conn,
            &NewAppointment {
                patient_number: "P002",
                doctor_name: "Dr. Sarah Johnson",
                visit_type: VisitType::FollowUp,
                date: next_monday(),
                time: ClockTime::new(14, 0).unwrap(),
                session_id: "earlier-session",
                agent_type: "strict",
            },
        )
        .unwrap();
    }

    let id = session_at_time_step(&state).await;
    let (_, json) = say(&state, &id, "14:00").await;
    assert_eq!(json["accepted"], false);
    assert_eq!(json["rejectionReason"], "SLOT_TAKEN");
    assert_eq!(json["currentStep"], "TIME");

    let offered: Vec<&str> = json["options"]["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["value"].as_str().unwrap())
        .collect();
    assert!(!offered.contains(&"14:00"));
}

#[tokio::test]
async fn test_ambiguous_confirmation_rejected() {
    let state = test_state();
    let id = session_at_time_step(&state).await;
    say(&state, &id, "10:00").await;

    let (_, json) = say(&state, &id, "maybe later").await;
    assert_eq!(json["accepted"], false);
    assert_eq!(json["rejectionReason"], "AMBIGUOUS_CONFIRMATION");
    assert_eq!(json["currentStep"], "CONFIRMATION");
    assert_eq!(json["status"], "active");
}

#[tokio::test]
async fn test_declined_confirmation_cancels() {
    let state = test_state();
    let id = session_at_time_step(&state).await;
    say(&state, &id, "11:00").await;

    let (_, json) = say(&state, &id, "no").await;
    assert_eq!(json["accepted"], true);
    assert_eq!(json["status"], "cancelled");
    assert!(json["options"].is_null());
    assert_eq!(json["appointmentData"], serde_json::json!({}));

    let conn = state.db().unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_extraction_failure_is_bad_gateway() {
    let state = test_state();
    let id = start_session(&state).await;

    let (status, json) = say(&state, &id, "garble").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].as_str().is_some());

    let (_, session) = send(&state, empty_request("GET", &format!("/api/session/{id}"))).await;
    assert_eq!(session["conversationHistory"].as_array().unwrap().len(), 1);
    assert_eq!(session["currentStep"], "PATIENT_ID");
}

#[tokio::test]
async fn test_finished_session_conflicts_until_restart() {
    let state = test_state();
    let id = session_at_time_step(&state).await;
    say(&state, &id, "13:00").await;
    let (_, json) = say(&state, &id, "yes").await;
    assert_eq!(json["status"], "booked");

    let (status, _) = say(&state, &id, "P002").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = send(
        &state,
        empty_request("POST", &format!("/api/session/{id}/restart")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["currentStep"], "PATIENT_ID");
    assert_eq!(json["sessionId"], id.as_str());

    let (status, json) = say(&state, &id, "P002").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["accepted"], true);
    assert_eq!(json["appointmentData"]["patientId"], "P002");
    assert!(json["appointmentData"].get("doctor").is_none());
}

#[tokio::test]
async fn test_interaction_log_written_per_turn() {
    let state = test_state();
    let id = start_session(&state).await;
    say(&state, &id, "other: P001").await;
    say(&state, &id, "P001").await;

    let conn = state.db().unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM interaction_logs WHERE session_id = ?1",
            [&id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 2);
}

// ── Concurrent Turns ──

#[tokio::test]
async fn test_concurrent_confirmations_book_once() {
    let state = test_state();
    let id = session_at_time_step(&state).await;
    let (_, json) = say(&state, &id, "9:00").await;
    assert_eq!(json["currentStep"], "CONFIRMATION");

    let (a, b) = tokio::join!(say(&state, &id, "yes"), say(&state, &id, "yes"));
    let mut statuses = [a.0, b.0];
    statuses.sort_by_key(|s| s.as_u16());
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

    let booked = if a.0 == StatusCode::OK { &a.1 } else { &b.1 };
    assert_eq!(booked["status"], "booked");
    assert!(booked["appointmentId"].as_i64().is_some());

    let conn = state.db().unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_concurrent_messages_advance_one_step() {
    let state = test_state();
    let id = start_session(&state).await;

    let (a, b) = tokio::join!(say(&state, &id, "P001"), say(&state, &id, "P001"));
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);
    let accepted = [&a.1, &b.1]
        .iter()
        .filter(|json| json["accepted"] == true)
        .count();
    assert_eq!(accepted, 1);

    // The second turn ran against VISIT_TYPE, where a patient ID is not a visit type.
    let rejected = if a.1["accepted"] == true { &b.1 } else { &a.1 };
    assert_eq!(rejected["rejectionReason"], "INVALID_FORMAT");

    let (_, session) = send(&state, empty_request("GET", &format!("/api/session/{id}"))).await;
    assert_eq!(session["currentStep"], "VISIT_TYPE");
    assert_eq!(session["appointmentData"]["patientId"], "P001");
}
