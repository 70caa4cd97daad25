use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries::{self, AppointmentInsertError, InteractionLog, NewAppointment};
use crate::errors::AppError;
use crate::models::booking::DATE_FORMAT;
use crate::models::{
    AgentMode, BookingFields, CandidateRecord, Rejection, RejectionReason, Session, SessionStatus,
    Step, StepValue, Turn,
};
use crate::services::ai::extraction::{extract_candidate, ExtractionRequest, StepContext};
use crate::services::presentation;
use crate::services::validation::validate_step;
use crate::state::AppState;

/// What happens to collected fields when the user declines at CONFIRMATION.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeclinePolicy {
    #[default]
    Purge,
    Retain,
}

impl DeclinePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "purge" => Some(DeclinePolicy::Purge),
            "retain" => Some(DeclinePolicy::Retain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnResult {
    pub accepted: bool,
    pub message: String,
    pub rejection_reason: Option<RejectionReason>,
    /// Step the session is on after this turn; `None` once the flow has ended.
    pub next_step: Option<Step>,
    pub field_update: Option<StepValue>,
    pub appointment_id: Option<i64>,
}

impl TurnResult {
    fn rejected(rejection: Rejection, step: Step) -> Self {
        Self {
            accepted: false,
            message: rejection.message,
            rejection_reason: Some(rejection.reason),
            next_step: Some(step),
            field_update: None,
            appointment_id: None,
        }
    }
}

/// One conversation mode. Chosen per session at creation.
#[async_trait]
pub trait BookingAgent: Send + Sync {
    fn mode(&self) -> AgentMode;

    fn initial_message(&self) -> String;

    fn step_prompt(&self, step: Step, known: &BookingFields) -> String;

    /// Processes one user utterance against the session, mutating it in place.
    ///
    /// Errors leave the session exactly as it was.
    async fn handle_turn(
        &self,
        state: &AppState,
        session: &mut Session,
        utterance: &str,
    ) -> Result<TurnResult, AppError>;
}

/// Returns the agent for a mode, or `None` if the mode has no implementation.
pub fn agent_for(mode: AgentMode, decline_policy: DeclinePolicy) -> Option<Box<dyn BookingAgent>> {
    match mode {
        AgentMode::Strict => Some(Box::new(StrictAgent::new(decline_policy))),
        AgentMode::Permissive => None,
    }
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Accepts only information for the current step and never revisits a step.
pub struct StrictAgent {
    decline_policy: DeclinePolicy,
}

impl StrictAgent {
    pub fn new(decline_policy: DeclinePolicy) -> Self {
        Self { decline_policy }
    }

    fn accept(
        &self,
        state: &AppState,
        session: &mut Session,
        value: StepValue,
    ) -> Result<TurnResult, AppError> {
        let step = session.current_step;
        match value {
            StepValue::Confirmed(true) => self.confirm(state, session, value),

            StepValue::Confirmed(false) => {
                session.status = SessionStatus::Cancelled;
                match self.decline_policy {
                    DeclinePolicy::Purge => session.appointment_data = BookingFields::default(),
                    DeclinePolicy::Retain => {
                        session.appointment_data.apply(&value);
                    }
                }
                tracing::info!(
                    session_id = %session.session_id,
                    policy = ?self.decline_policy,
                    "booking declined"
                );
                Ok(TurnResult {
                    accepted: true,
                    message: "Appointment cancelled. No booking was made.".to_string(),
                    rejection_reason: None,
                    next_step: None,
                    field_update: Some(value),
                    appointment_id: None,
                })
            }

            _ => {
                if !session.appointment_data.apply(&value) {
                    tracing::warn!(
                        session_id = %session.session_id,
                        field = step.field_key(),
                        "field already set, keeping earlier value"
                    );
                }
                // Only CONFIRMATION lacks a successor and it is handled above.
                let next = step.next().unwrap_or(step);
                session.current_step = next;
                Ok(TurnResult {
                    accepted: true,
                    message: format!(
                        "{}. {}",
                        value.describe(),
                        self.step_prompt(next, &session.appointment_data)
                    ),
                    rejection_reason: None,
                    next_step: Some(next),
                    field_update: Some(value),
                    appointment_id: None,
                })
            }
        }
    }

    fn confirm(
        &self,
        state: &AppState,
        session: &mut Session,
        value: StepValue,
    ) -> Result<TurnResult, AppError> {
        let fields = &session.appointment_data;
        let (Some(patient), Some(visit_type), Some(doctor), Some(date), Some(time)) = (
            fields.patient_id.as_deref(),
            fields.visit_type,
            fields.doctor.as_deref(),
            fields.date,
            fields.time,
        ) else {
            return Ok(TurnResult::rejected(
                Rejection::new(
                    RejectionReason::MissingPriorStep,
                    "Appointment details are incomplete. Please restart the booking process.",
                ),
                Step::Confirmation,
            ));
        };

        let inserted = {
            let conn = state.db()?;
            queries::insert_appointment(
                &conn,
                &NewAppointment {
                    patient_number: patient,
                    doctor_name: doctor,
                    visit_type,
                    date,
                    time,
                    session_id: &session.session_id,
                    agent_type: session.agent_type.as_str(),
                },
            )
        };

        let id = match inserted {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(session_id = %session.session_id, error = %e, "failed to save appointment");
                let message = match e {
                    AppointmentInsertError::SlotTaken => format!(
                        "Failed to save appointment: {doctor} was just booked by someone else at {time} on {}. \
                         Confirming again will not succeed; please restart the booking to choose another slot.",
                        date.format(DATE_FORMAT)
                    ),
                    _ => "Failed to save appointment. Please try confirming again.".to_string(),
                };
                return Ok(TurnResult::rejected(
                    Rejection::new(RejectionReason::PersistenceFailed, message),
                    Step::Confirmation,
                ));
            }
        };

        session.appointment_data.apply(&value);
        session.appointment_id = Some(id);
        session.status = SessionStatus::Booked;
        tracing::info!(session_id = %session.session_id, appointment_id = id, "appointment booked");

        Ok(TurnResult {
            accepted: true,
            message: format!(
                "Appointment confirmed. Your appointment number is {id}.\n{}",
                session.appointment_data.summary()
            ),
            rejection_reason: None,
            next_step: None,
            field_update: Some(value),
            appointment_id: Some(id),
        })
    }
}

fn step_context(
    conn: &Connection,
    step: Step,
    known: &BookingFields,
    today: NaiveDate,
) -> anyhow::Result<StepContext> {
    let mut ctx = StepContext::default();
    match step {
        Step::Doctor => {
            ctx.department = known.department.clone();
            ctx.visit_type = known.visit_type.map(|v| v.as_str().to_string());
        }
        Step::Date => ctx.doctor = known.doctor.clone(),
        Step::Time => {
            ctx.doctor = known.doctor.clone();
            ctx.date = known.date.map(|d| d.format(DATE_FORMAT).to_string());
        }
        _ => {}
    }

    if matches!(step, Step::Department | Step::Doctor | Step::Time) {
        ctx.options = presentation::step_options(conn, step, known, today)?
            .choices()
            .iter()
            .map(|c| c.value.clone())
            .collect();
    }
    Ok(ctx)
}

fn record_interaction(
    state: &AppState,
    session: &Session,
    step: Step,
    utterance: &str,
    candidate: &CandidateRecord,
    result: &TurnResult,
) {
    let log = InteractionLog {
        session_id: &session.session_id,
        agent_type: session.agent_type.as_str(),
        current_step: step.as_str(),
        user_utterance: utterance,
        extracted_data: serde_json::to_string(&candidate.extracted_data).ok(),
        accepted: result.accepted,
        rejection_reason: result.rejection_reason.map(|r| r.as_str()),
        system_response: &result.message,
    };
    let written = state
        .db()
        .and_then(|conn| queries::insert_interaction_log(&conn, &log));
    if let Err(e) = written {
        tracing::warn!(session_id = %session.session_id, error = %e, "failed to write interaction log");
    }
}

#[async_trait]
impl BookingAgent for StrictAgent {
    fn mode(&self) -> AgentMode {
        AgentMode::Strict
    }

    fn initial_message(&self) -> String {
        "Hello! I will help you book an appointment. Please provide your patient number (format: PXXX, e.g., P001).".to_string()
    }

    fn step_prompt(&self, step: Step, known: &BookingFields) -> String {
        match step {
            Step::PatientId => {
                "Please provide your patient number (format: PXXX, e.g., P001, P002, P003).".to_string()
            }
            Step::VisitType => "Please select visit type: New visit, Follow-up, or Checkup.".to_string(),
            Step::Department => "Which department would you like to visit?".to_string(),
            Step::Doctor => "Which doctor would you like to see?".to_string(),
            Step::Date => "What date would you prefer?".to_string(),
            Step::Time => "What time slot would you prefer?".to_string(),
            Step::Confirmation => format!(
                "Please confirm your appointment details.\n{}",
                known.summary()
            ),
        }
    }

    async fn handle_turn(
        &self,
        state: &AppState,
        session: &mut Session,
        utterance: &str,
    ) -> Result<TurnResult, AppError> {
        if session.status.is_terminal() {
            return Err(AppError::SessionClosed(session.session_id.clone()));
        }

        let step = session.current_step;
        let today = today();

        let context = {
            let conn = state.db()?;
            step_context(&conn, step, &session.appointment_data, today)?
        };

        let request = ExtractionRequest {
            step,
            history: &session.conversation_history,
            utterance,
            context,
            today,
        };
        let candidate = match extract_candidate(state.llm.as_ref(), &request).await {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::error!(session_id = %session.session_id, step = %step, error = %e, "extraction failed");
                return Err(e.into());
            }
        };

        let outcome = if candidate.contains_other_step_info {
            Err(Rejection::new(
                RejectionReason::OutOfStepData,
                format!(
                    "Please provide only information for the current step ({step}). \
                     Other information will be requested later."
                ),
            ))
        } else {
            let conn = state.db()?;
            validate_step(
                &conn,
                step,
                &candidate.extracted_data,
                &session.appointment_data,
                today,
            )?
        };

        let result = match outcome {
            Ok(value) => self.accept(state, session, value)?,
            Err(rejection) => TurnResult::rejected(rejection, step),
        };

        if let Some(reason) = result.rejection_reason {
            tracing::info!(session_id = %session.session_id, step = %step, reason = %reason, "turn rejected");
        } else {
            tracing::info!(session_id = %session.session_id, step = %step, accepted = true, "turn accepted");
        }

        session.conversation_history.push(Turn::user(
            utterance,
            step,
            result.accepted,
            result.rejection_reason,
        ));
        session
            .conversation_history
            .push(Turn::assistant(result.message.clone(), session.current_step));
        session.touch();

        record_interaction(state, session, step, utterance, &candidate, &result);

        Ok(result)
    }
}
