use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VisitType {
    NewVisit,
    FollowUp,
    Checkup,
}

impl VisitType {
    pub const ALL: [VisitType; 3] = [VisitType::NewVisit, VisitType::FollowUp, VisitType::Checkup];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitType::NewVisit => "new_visit",
            VisitType::FollowUp => "follow_up",
            VisitType::Checkup => "checkup",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VisitType::NewVisit => "New Visit",
            VisitType::FollowUp => "Follow-up",
            VisitType::Checkup => "Checkup",
        }
    }

    /// Accepts the canonical value or its label, ignoring case and `-`/space separators.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        Self::ALL.into_iter().find(|v| v.as_str() == normalized)
    }
}

impl std::fmt::Display for VisitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str().replace('_', " "))
    }
}

/// A 24-hour wall-clock time, always rendered as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// Parses `H:MM` or `HH:MM`. Anything else is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.trim().split_once(':')?;
        let digits = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
        if !digits(h) || h.len() > 2 || !digits(m) || m.len() != 2 {
            return None;
        }
        Self::new(h.parse().ok()?, m.parse().ok()?)
    }
}

impl std::fmt::Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ClockTime::parse(&s).ok_or_else(|| format!("invalid time: {s}"))
    }
}

impl From<ClockTime> for String {
    fn from(t: ClockTime) -> Self {
        t.to_string()
    }
}

/// Canonical value accepted for a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum StepValue {
    PatientId(String),
    VisitType(VisitType),
    Department(String),
    Doctor(String),
    Date(NaiveDate),
    Time(ClockTime),
    Confirmed(bool),
}

impl StepValue {
    pub fn describe(&self) -> String {
        match self {
            StepValue::PatientId(id) => format!("Patient {id} confirmed"),
            StepValue::VisitType(v) => format!("Visit type: {v}"),
            StepValue::Department(d) => format!("Department: {d}"),
            StepValue::Doctor(d) => format!("Doctor: {d}"),
            StepValue::Date(d) => format!("Date: {}", d.format(DATE_FORMAT)),
            StepValue::Time(t) => format!("Time: {t}"),
            StepValue::Confirmed(true) => "Appointment confirmed".to_string(),
            StepValue::Confirmed(false) => "Appointment cancelled".to_string(),
        }
    }
}

/// Fields accumulated over the booking flow. Each is written at most once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_type: Option<VisitType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<ClockTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
}

impl BookingFields {
    /// Stores `value` in its slot. Returns false, leaving the slot untouched, if it was already set.
    pub fn apply(&mut self, value: &StepValue) -> bool {
        fn set<T: Clone>(slot: &mut Option<T>, v: &T) -> bool {
            if slot.is_some() {
                return false;
            }
            *slot = Some(v.clone());
            true
        }

        match value {
            StepValue::PatientId(v) => set(&mut self.patient_id, v),
            StepValue::VisitType(v) => set(&mut self.visit_type, v),
            StepValue::Department(v) => set(&mut self.department, v),
            StepValue::Doctor(v) => set(&mut self.doctor, v),
            StepValue::Date(v) => set(&mut self.date, v),
            StepValue::Time(v) => set(&mut self.time, v),
            StepValue::Confirmed(v) => set(&mut self.confirmed, v),
        }
    }

    pub fn summary(&self) -> String {
        let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        format!(
            "Patient: {}\nVisit type: {}\nDepartment: {}\nDoctor: {}\nDate: {}\nTime: {}",
            or_dash(self.patient_id.clone()),
            or_dash(self.visit_type.map(|v| v.to_string())),
            or_dash(self.department.clone()),
            or_dash(self.doctor.clone()),
            or_dash(self.date.map(|d| d.format(DATE_FORMAT).to_string())),
            or_dash(self.time.map(|t| t.to_string())),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub patient_number: String,
    pub doctor_name: String,
    pub visit_type: VisitType,
    pub date: NaiveDate,
    pub time: ClockTime,
    pub status: AppointmentStatus,
    pub session_id: Option<String>,
    pub agent_type: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => AppointmentStatus::Confirmed,
            "cancelled" => AppointmentStatus::Cancelled,
            _ => AppointmentStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_time_normalizes_single_digit_hour() {
        assert_eq!(ClockTime::parse("9:30").unwrap().to_string(), "09:30");
        assert_eq!(ClockTime::parse("14:00").unwrap().to_string(), "14:00");
    }

    #[test]
    fn test_clock_time_rejects_malformed() {
        for bad in ["24:00", "12:60", "2PM", "14", "14:0", "014:00", ":30", "1a:00"] {
            assert!(ClockTime::parse(bad).is_none(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_visit_type_accepts_labels() {
        assert_eq!(VisitType::parse("Follow-up"), Some(VisitType::FollowUp));
        assert_eq!(VisitType::parse("New Visit"), Some(VisitType::NewVisit));
        assert_eq!(VisitType::parse("checkup"), Some(VisitType::Checkup));
        assert_eq!(VisitType::parse("surgery"), None);
    }

    #[test]
    fn test_fields_are_write_once() {
        let mut fields = BookingFields::default();
        assert!(fields.apply(&StepValue::Doctor("Dr. Sarah Johnson".into())));
        assert!(!fields.apply(&StepValue::Doctor("Dr. Kevin Park".into())));
        assert_eq!(fields.doctor.as_deref(), Some("Dr. Sarah Johnson"));
    }

    #[test]
    fn test_fields_serialize_canonical_forms() {
        let mut fields = BookingFields::default();
        fields.apply(&StepValue::Date(NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()));
        fields.apply(&StepValue::Time(ClockTime::new(8, 0).unwrap()));
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json["date"], "2030-01-07");
        assert_eq!(json["time"], "08:00");
        assert!(json.get("doctor").is_none());
    }
}
