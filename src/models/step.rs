use serde::{Deserialize, Serialize};

/// One stage of the booking sequence. Declaration order is the booking order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    PatientId,
    VisitType,
    Department,
    Doctor,
    Date,
    Time,
    Confirmation,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::PatientId,
        Step::VisitType,
        Step::Department,
        Step::Doctor,
        Step::Date,
        Step::Time,
        Step::Confirmation,
    ];

    pub fn first() -> Self {
        Step::PatientId
    }

    /// The step that follows this one, or `None` after CONFIRMATION.
    pub fn next(self) -> Option<Step> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::PatientId => "PATIENT_ID",
            Step::VisitType => "VISIT_TYPE",
            Step::Department => "DEPARTMENT",
            Step::Doctor => "DOCTOR",
            Step::Date => "DATE",
            Step::Time => "TIME",
            Step::Confirmation => "CONFIRMATION",
        }
    }

    /// Key under which the accepted value is stored in the booking fields.
    pub fn field_key(&self) -> &'static str {
        match self {
            Step::PatientId => "patientId",
            Step::VisitType => "visitType",
            Step::Department => "department",
            Step::Doctor => "doctor",
            Step::Date => "date",
            Step::Time => "time",
            Step::Confirmation => "confirmed",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_advance_in_fixed_order() {
        let mut walked = vec![Step::first()];
        while let Some(next) = walked.last().and_then(|s| s.next()) {
            walked.push(next);
        }
        assert_eq!(walked, Step::ALL.to_vec());
        assert!(walked.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_confirmation_is_terminal() {
        assert_eq!(Step::Confirmation.next(), None);
    }

    #[test]
    fn test_wire_name_matches_as_str() {
        for step in Step::ALL {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(json, format!("\"{}\"", step.as_str()));
            assert_eq!(serde_json::from_str::<Step>(&json).unwrap(), step);
        }
        assert!(serde_json::from_str::<Step>("\"LUNCH\"").is_err());
    }
}
