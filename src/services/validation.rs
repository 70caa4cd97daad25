//! Per-step validation of extracted candidates.
//!
//! Each validator reads the candidate value for its step plus the fields already
//! confirmed earlier in the session, and either returns the canonical value to
//! store or a [`Rejection`] explaining what the user must change. Store access
//! errors are propagated separately through the outer `anyhow::Result`.

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::booking::DATE_FORMAT;
use crate::models::reference::{weekday_index, weekday_name};
use crate::models::{
    BookingFields, ClockTime, ExtractedFields, Rejection, RejectionReason, Step, StepValue,
    VisitType,
};

pub type ValidationOutcome = Result<StepValue, Rejection>;

const RESTART_HINT: &str = "Please restart the booking process.";

pub fn validate_step(
    conn: &Connection,
    step: Step,
    candidate: &ExtractedFields,
    known: &BookingFields,
    today: NaiveDate,
) -> anyhow::Result<ValidationOutcome> {
    match step {
        Step::PatientId => validate_patient_id(conn, candidate.patient_number.as_deref()),
        Step::VisitType => Ok(validate_visit_type(candidate.visit_type.as_deref())),
        Step::Department => validate_department(conn, candidate.department.as_deref()),
        Step::Doctor => validate_doctor(conn, candidate.doctor.as_deref(), known),
        Step::Date => validate_date(conn, candidate.date.as_deref(), known, today),
        Step::Time => validate_time(conn, candidate.time.as_deref(), known),
        Step::Confirmation => Ok(validate_confirmation(candidate.user_confirmed)),
    }
}

fn missing(what: &str) -> Rejection {
    Rejection::new(RejectionReason::MissingValue, format!("No {what} provided."))
}

fn missing_prior(what: &str) -> Rejection {
    Rejection::new(
        RejectionReason::MissingPriorStep,
        format!("{what} information is missing. {RESTART_HINT}"),
    )
}

/// Uppercases `pNNN` and pads a bare number to `P` plus three digits.
pub fn normalize_patient_id(input: &str) -> Option<String> {
    let s = input.trim();
    if (1..=4).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit()) {
        return Some(format!("P{s:0>3}"));
    }

    let upper = s.to_uppercase();
    let digits = upper.strip_prefix('P')?;
    ((3..=4).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()))
        .then_some(upper)
}

pub fn validate_patient_id(
    conn: &Connection,
    input: Option<&str>,
) -> anyhow::Result<ValidationOutcome> {
    let Some(input) = input.filter(|s| !s.trim().is_empty()) else {
        return Ok(Err(missing("patient ID")));
    };

    let Some(patient_id) = normalize_patient_id(input) else {
        return Ok(Err(Rejection::new(
            RejectionReason::InvalidFormat,
            "Invalid patient ID format. Expected format: P001, P002, etc.",
        )));
    };

    if queries::get_patient_by_number(conn, &patient_id)?.is_none() {
        return Ok(Err(Rejection::new(
            RejectionReason::NotFound,
            format!("Patient ID {patient_id} not found in our system."),
        )));
    }

    Ok(Ok(StepValue::PatientId(patient_id)))
}

pub fn validate_visit_type(input: Option<&str>) -> ValidationOutcome {
    let Some(input) = input.filter(|s| !s.trim().is_empty()) else {
        return Err(missing("visit type"));
    };

    VisitType::parse(input).map(StepValue::VisitType).ok_or_else(|| {
        Rejection::new(
            RejectionReason::InvalidFormat,
            "Invalid visit type. Must be one of: new visit, follow up, checkup.",
        )
    })
}

pub fn validate_department(
    conn: &Connection,
    input: Option<&str>,
) -> anyhow::Result<ValidationOutcome> {
    let Some(input) = input.filter(|s| !s.trim().is_empty()) else {
        return Ok(Err(missing("department")));
    };

    let departments = queries::list_departments(conn)?;
    match departments.iter().find(|dept| dept.matches(input)) {
        Some(dept) => Ok(Ok(StepValue::Department(dept.name.clone()))),
        None => {
            let available = departments
                .iter()
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Ok(Err(Rejection::new(
                RejectionReason::NotFound,
                format!("Department \"{}\" not found. Available departments: {available}", input.trim()),
            )))
        }
    }
}

pub fn validate_doctor(
    conn: &Connection,
    input: Option<&str>,
    known: &BookingFields,
) -> anyhow::Result<ValidationOutcome> {
    let Some(input) = input.filter(|s| !s.trim().is_empty()) else {
        return Ok(Err(missing("doctor name")));
    };
    let Some(department_name) = known.department.as_deref() else {
        return Ok(Err(missing_prior("Department")));
    };
    let Some(visit_type) = known.visit_type else {
        return Ok(Err(missing_prior("Visit type")));
    };

    let Some(department) = queries::find_department(conn, department_name)? else {
        return Ok(Err(Rejection::new(
            RejectionReason::NotFound,
            format!("Department \"{department_name}\" not found in our system. {RESTART_HINT}"),
        )));
    };

    let eligible = queries::eligible_doctors(conn, department.id, visit_type)?;
    if eligible.is_empty() {
        return Ok(Err(Rejection::new(
            RejectionReason::NoEligibleDoctor,
            format!(
                "No doctors in {} accept {visit_type} appointments.",
                department.name
            ),
        )));
    }

    // An exact name wins over a partial overlap with a shorter or longer name.
    let picked = eligible
        .iter()
        .find(|doc| doc.name.eq_ignore_ascii_case(input.trim()))
        .or_else(|| eligible.iter().find(|doc| doc.name_matches(input)));
    match picked {
        Some(doctor) => Ok(Ok(StepValue::Doctor(doctor.name.clone()))),
        None => {
            let names = eligible
                .iter()
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Ok(Err(Rejection::new(
                RejectionReason::NotFound,
                format!(
                    "Doctor \"{}\" not found. Available doctors in {} for {visit_type}: {names}",
                    input.trim(),
                    department.name
                ),
            )))
        }
    }
}

pub fn validate_date(
    conn: &Connection,
    input: Option<&str>,
    known: &BookingFields,
    today: NaiveDate,
) -> anyhow::Result<ValidationOutcome> {
    let Some(input) = input.filter(|s| !s.trim().is_empty()) else {
        return Ok(Err(missing("date")));
    };
    let Some(doctor_name) = known.doctor.as_deref() else {
        return Ok(Err(missing_prior("Doctor")));
    };

    let Ok(date) = NaiveDate::parse_from_str(input.trim(), DATE_FORMAT) else {
        return Ok(Err(Rejection::new(
            RejectionReason::InvalidFormat,
            format!("Invalid date format: \"{}\". Expected format: YYYY-MM-DD", input.trim()),
        )));
    };

    if date < today {
        return Ok(Err(Rejection::new(
            RejectionReason::PastDate,
            "Appointment date must not be in the past.",
        )));
    }

    let Some(doctor) = queries::find_doctor_by_name(conn, doctor_name)? else {
        return Ok(Err(Rejection::new(
            RejectionReason::NotFound,
            format!("Doctor \"{doctor_name}\" not found in our system. {RESTART_HINT}"),
        )));
    };

    let weekdays = queries::available_weekdays(conn, doctor.id)?;
    let day = weekday_index(&date);
    if !weekdays.contains(&day) {
        let available = weekdays
            .iter()
            .map(|d| weekday_name(*d))
            .collect::<Vec<_>>()
            .join(", ");
        return Ok(Err(Rejection::new(
            RejectionReason::UnavailableWeekday,
            format!(
                "{} is not available on {}s. Available days: {available}",
                doctor.name,
                weekday_name(day)
            ),
        )));
    }

    Ok(Ok(StepValue::Date(date)))
}

pub fn validate_time(
    conn: &Connection,
    input: Option<&str>,
    known: &BookingFields,
) -> anyhow::Result<ValidationOutcome> {
    let Some(input) = input.filter(|s| !s.trim().is_empty()) else {
        return Ok(Err(missing("time")));
    };
    let Some(doctor_name) = known.doctor.as_deref() else {
        return Ok(Err(missing_prior("Doctor")));
    };
    let Some(date) = known.date else {
        return Ok(Err(missing_prior("Date")));
    };

    let Some(time) = ClockTime::parse(input) else {
        return Ok(Err(Rejection::new(
            RejectionReason::InvalidFormat,
            format!("Invalid time format: \"{}\". Expected format: HH:MM (e.g., 14:00)", input.trim()),
        )));
    };

    let Some(doctor) = queries::find_doctor_by_name(conn, doctor_name)? else {
        return Ok(Err(Rejection::new(
            RejectionReason::NotFound,
            format!("Doctor \"{doctor_name}\" not found in our system. {RESTART_HINT}"),
        )));
    };

    let day = weekday_index(&date);
    let slots = queries::available_slots(conn, doctor.id, Some(day))?;
    if !slots.iter().any(|s| s.time_slot == time) {
        let message = if slots.is_empty() {
            format!("{} has no available time slots on {}s.", doctor.name, weekday_name(day))
        } else {
            let times = slots
                .iter()
                .map(|s| s.time_slot.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "{} is not available at {time} on {}s. Available times: {times}",
                doctor.name,
                weekday_name(day)
            )
        };
        return Ok(Err(Rejection::new(RejectionReason::UnavailableTime, message)));
    }

    // Conflict gate runs last so "never offered" and "already taken" stay distinct.
    if queries::find_confirmed_appointment(conn, doctor.id, &date, &time)?.is_some() {
        return Ok(Err(Rejection::new(
            RejectionReason::SlotTaken,
            format!(
                "{} already has an appointment at {time} on {}. Please choose a different time.",
                doctor.name,
                date.format(DATE_FORMAT)
            ),
        )));
    }

    Ok(Ok(StepValue::Time(time)))
}

pub fn validate_confirmation(flag: Option<bool>) -> ValidationOutcome {
    match flag {
        Some(confirmed) => Ok(StepValue::Confirmed(confirmed)),
        None => Err(Rejection::new(
            RejectionReason::AmbiguousConfirmation,
            "Please confirm your appointment with \"yes\" or decline with \"no\".",
        )),
    }
}
