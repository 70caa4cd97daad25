use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    OutOfStepData,
    MissingValue,
    InvalidFormat,
    NotFound,
    MissingPriorStep,
    NoEligibleDoctor,
    PastDate,
    UnavailableWeekday,
    UnavailableTime,
    SlotTaken,
    AmbiguousConfirmation,
    PersistenceFailed,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::OutOfStepData => "OUT_OF_STEP_DATA",
            RejectionReason::MissingValue => "MISSING_VALUE",
            RejectionReason::InvalidFormat => "INVALID_FORMAT",
            RejectionReason::NotFound => "NOT_FOUND",
            RejectionReason::MissingPriorStep => "MISSING_PRIOR_STEP",
            RejectionReason::NoEligibleDoctor => "NO_ELIGIBLE_DOCTOR",
            RejectionReason::PastDate => "PAST_DATE",
            RejectionReason::UnavailableWeekday => "UNAVAILABLE_WEEKDAY",
            RejectionReason::UnavailableTime => "UNAVAILABLE_TIME",
            RejectionReason::SlotTaken => "SLOT_TAKEN",
            RejectionReason::AmbiguousConfirmation => "AMBIGUOUS_CONFIRMATION",
            RejectionReason::PersistenceFailed => "PERSISTENCE_FAILED",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-facing refusal of one turn's input. The session stays on its step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: RejectionReason,
    pub message: String,
}

impl Rejection {
    pub fn new(reason: RejectionReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}
