use serde::{Deserialize, Serialize};

use super::booking::{ClockTime, VisitType};

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Day-of-week index as stored in the schedule table: 0 = Sunday.
pub fn weekday_index(date: &chrono::NaiveDate) -> u8 {
    use chrono::Datelike;
    date.weekday().num_days_from_sunday() as u8
}

pub fn weekday_name(day: u8) -> &'static str {
    WEEKDAY_NAMES.get(day as usize).copied().unwrap_or("Unknown")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: i64,
    pub patient_number: String,
    pub name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

impl Department {
    pub fn matches(&self, input: &str) -> bool {
        let input = input.trim();
        self.name.eq_ignore_ascii_case(input) || self.code.eq_ignore_ascii_case(input)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub department_id: i64,
    pub doctor_number: String,
    pub name: String,
    pub specialization: Option<String>,
    pub accepts_new_patients: bool,
    pub accepts_follow_up: bool,
    pub accepts_checkup: bool,
}

impl Doctor {
    pub fn accepts(&self, visit_type: VisitType) -> bool {
        match visit_type {
            VisitType::NewVisit => self.accepts_new_patients,
            VisitType::FollowUp => self.accepts_follow_up,
            VisitType::Checkup => self.accepts_checkup,
        }
    }

    /// Case-insensitive containment in either direction, so "chen" and
    /// "michael chen please" both pick out "Dr. Michael Chen".
    pub fn name_matches(&self, input: &str) -> bool {
        let name = self.name.to_lowercase();
        let input = input.trim().to_lowercase();
        !input.is_empty() && (name.contains(&input) || input.contains(&name))
    }
}

/// One recurring weekly slot for a doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub id: i64,
    pub doctor_id: i64,
    pub day_of_week: u8,
    pub time_slot: ClockTime,
    pub is_available: bool,
}
