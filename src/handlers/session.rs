use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{
    AgentMode, BookingFields, RejectionReason, Session, SessionPatch, SessionStatus, Step,
    StepOptions, Turn,
};
use crate::services::booking::{agent_for, today, BookingAgent};
use crate::services::presentation;
use crate::state::AppState;

fn agent(state: &AppState, mode: AgentMode) -> Result<Box<dyn BookingAgent>, AppError> {
    agent_for(mode, state.config.decline_policy)
        .ok_or_else(|| AppError::UnsupportedMode(mode.as_str().to_string()))
}

fn options_for(state: &AppState, session: &Session) -> Result<Option<StepOptions>, AppError> {
    if session.status.is_terminal() {
        return Ok(None);
    }
    let db = state.db()?;
    Ok(Some(presentation::step_options(
        &db,
        session.current_step,
        &session.appointment_data,
        today(),
    )?))
}

// POST /api/session/start
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub agent_type: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIntro {
    session_id: String,
    agent_type: AgentMode,
    current_step: Step,
    message: String,
    options: Option<StepOptions>,
}

pub async fn start_session(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<StartRequest>>,
) -> Result<Json<SessionIntro>, AppError> {
    let requested = payload.and_then(|Json(p)| p.agent_type);
    let mode = match requested.as_deref() {
        None => AgentMode::Strict,
        Some(raw) => AgentMode::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("unknown agentType: {raw}")))?,
    };
    let agent = agent(&state, mode)?;

    let message = agent.initial_message();
    let session = state.sessions.create(mode, &message);
    let options = options_for(&state, &session)?;

    Ok(Json(SessionIntro {
        session_id: session.session_id,
        agent_type: mode,
        current_step: session.current_step,
        message,
        options,
    }))
}

// GET /api/session/:id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>, AppError> {
    state
        .sessions
        .get(&id)
        .await
        .map(Json)
        .ok_or(AppError::SessionNotFound(id))
}

// POST /api/session/:id/message
#[derive(Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    accepted: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection_reason: Option<RejectionReason>,
    current_step: Step,
    status: SessionStatus,
    appointment_data: BookingFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    appointment_id: Option<i64>,
    conversation_history: Vec<Turn>,
    options: Option<StepOptions>,
}

pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<MessageRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let utterance = payload.message.trim();
    if utterance.is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_string()));
    }

    // Held for the whole turn so concurrent messages to this session queue up.
    let mut session = state
        .sessions
        .acquire(&id)
        .await
        .ok_or_else(|| AppError::SessionNotFound(id.clone()))?;

    let agent = agent(&state, session.agent_type)?;
    let result = agent.handle_turn(&state, &mut session, utterance).await?;
    let options = options_for(&state, &session)?;

    Ok(Json(TurnResponse {
        accepted: result.accepted,
        message: result.message,
        rejection_reason: result.rejection_reason,
        current_step: session.current_step,
        status: session.status,
        appointment_data: session.appointment_data.clone(),
        appointment_id: session.appointment_id,
        conversation_history: session.conversation_history.clone(),
        options,
    }))
}

// POST /api/session/:id/restart
pub async fn restart_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionIntro>, AppError> {
    let mode = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::SessionNotFound(id.clone()))?
        .agent_type;
    let message = agent(&state, mode)?.initial_message();

    if !state.sessions.update(&id, SessionPatch::restart(&message)).await {
        return Err(AppError::SessionNotFound(id));
    }
    tracing::info!(session_id = %id, "session restarted");

    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::SessionNotFound(id.clone()))?;
    let options = options_for(&state, &session)?;

    Ok(Json(SessionIntro {
        session_id: session.session_id,
        agent_type: session.agent_type,
        current_step: session.current_step,
        message,
        options,
    }))
}

// DELETE /api/session/:id
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if state.sessions.delete(&id) {
        Ok(Json(serde_json::json!({ "message": "Session deleted" })))
    } else {
        Err(AppError::SessionNotFound(id))
    }
}
