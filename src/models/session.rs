use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::booking::BookingFields;
use super::rejection::RejectionReason;
use super::step::Step;

/// Conversation mode chosen when the session is created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    #[serde(alias = "baseline")]
    Strict,
    #[serde(alias = "adaptive")]
    Permissive,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Strict => "strict",
            AgentMode::Permissive => "permissive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" | "baseline" => Some(AgentMode::Strict),
            "permissive" | "adaptive" => Some(AgentMode::Permissive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Booked,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: NaiveDateTime,
    pub step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<RejectionReason>,
}

impl Turn {
    pub fn assistant(content: impl Into<String>, step: Step) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: chrono::Utc::now().naive_utc(),
            step,
            accepted: None,
            rejection_reason: None,
        }
    }

    pub fn user(
        content: impl Into<String>,
        step: Step,
        accepted: bool,
        rejection_reason: Option<RejectionReason>,
    ) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: chrono::Utc::now().naive_utc(),
            step,
            accepted: Some(accepted),
            rejection_reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub agent_type: AgentMode,
    pub status: SessionStatus,
    pub current_step: Step,
    pub conversation_history: Vec<Turn>,
    pub appointment_data: BookingFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub last_activity: NaiveDateTime,
}

impl Session {
    pub fn new(mode: AgentMode, greeting: &str) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            agent_type: mode,
            status: SessionStatus::Active,
            current_step: Step::first(),
            conversation_history: vec![Turn::assistant(greeting, Step::first())],
            appointment_data: BookingFields::default(),
            appointment_id: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = chrono::Utc::now().naive_utc();
    }
}

/// Partial update applied by the session store.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub current_step: Option<Step>,
    pub appointment_data: Option<BookingFields>,
    pub clear_appointment: bool,
    pub append_turns: Vec<Turn>,
}

impl SessionPatch {
    /// Back to the first step with nothing collected.
    pub fn restart(greeting: &str) -> Self {
        Self {
            status: Some(SessionStatus::Active),
            current_step: Some(Step::first()),
            appointment_data: Some(BookingFields::default()),
            clear_appointment: true,
            append_turns: vec![Turn::assistant(greeting, Step::first())],
        }
    }

    pub fn apply_to(self, session: &mut Session) {
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(step) = self.current_step {
            session.current_step = step;
        }
        if let Some(data) = self.appointment_data {
            session.appointment_data = data;
        }
        if self.clear_appointment {
            session.appointment_id = None;
        }
        session.conversation_history.extend(self.append_turns);
        session.touch();
    }
}
