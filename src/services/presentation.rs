use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::booking::DATE_FORMAT;
use crate::models::reference::weekday_index;
use crate::models::{BookingFields, CalendarProps, ChoiceOption, Step, StepOptions, VisitType};

/// Builds the UI descriptor for `step` from what is already known.
///
/// Every choice offered here is accepted verbatim by the matching validator;
/// the doctor and time lists apply the same eligibility and availability filters.
pub fn step_options(
    conn: &Connection,
    step: Step,
    known: &BookingFields,
    today: NaiveDate,
) -> anyhow::Result<StepOptions> {
    let options = match step {
        Step::PatientId => StepOptions::input("PXXX (ex: P001, P002)"),

        Step::VisitType => StepOptions::ButtonGroup {
            options: VisitType::ALL
                .iter()
                .map(|v| ChoiceOption {
                    value: v.as_str().to_string(),
                    label: v.label().to_string(),
                })
                .collect(),
        },

        Step::Department => StepOptions::Select {
            options: queries::list_departments(conn)?
                .into_iter()
                .map(|d| ChoiceOption::same(d.name))
                .collect(),
        },

        Step::Doctor => doctor_options(conn, known)?,

        Step::Date => date_options(conn, known, today)?,

        Step::Time => time_options(conn, known)?,

        Step::Confirmation => StepOptions::ButtonGroup {
            options: vec![
                ChoiceOption {
                    value: "yes".to_string(),
                    label: "Yes, confirm".to_string(),
                },
                ChoiceOption {
                    value: "no".to_string(),
                    label: "No, cancel".to_string(),
                },
            ],
        },
    };
    Ok(options)
}

fn doctor_options(conn: &Connection, known: &BookingFields) -> anyhow::Result<StepOptions> {
    let (Some(department), Some(visit_type)) = (known.department.as_deref(), known.visit_type)
    else {
        return Ok(StepOptions::input("Doctor name"));
    };
    let Some(department) = queries::find_department(conn, department)? else {
        return Ok(StepOptions::input("Doctor name"));
    };

    let eligible = queries::eligible_doctors(conn, department.id, visit_type)?;
    if eligible.is_empty() {
        return Ok(StepOptions::input("No eligible doctors"));
    }

    Ok(StepOptions::Select {
        options: eligible
            .into_iter()
            .map(|d| ChoiceOption {
                label: match &d.specialization {
                    Some(spec) => format!("{} ({spec})", d.name),
                    None => d.name.clone(),
                },
                value: d.name,
            })
            .collect(),
    })
}

fn date_options(
    conn: &Connection,
    known: &BookingFields,
    today: NaiveDate,
) -> anyhow::Result<StepOptions> {
    let mut disabled_days_of_week = Vec::new();
    if let Some(doctor) = known
        .doctor
        .as_deref()
        .map(|name| queries::find_doctor_by_name(conn, name))
        .transpose()?
        .flatten()
    {
        let working = queries::available_weekdays(conn, doctor.id)?;
        disabled_days_of_week = (0..7u8).filter(|d| !working.contains(d)).collect();
    }

    Ok(StepOptions::Calendar {
        calendar_props: CalendarProps {
            min_date: today.format(DATE_FORMAT).to_string(),
            disabled_days_of_week,
        },
    })
}

fn time_options(conn: &Connection, known: &BookingFields) -> anyhow::Result<StepOptions> {
    let (Some(doctor_name), Some(date)) = (known.doctor.as_deref(), known.date) else {
        return Ok(StepOptions::input("HH:MM (e.g., 14:00)"));
    };
    let Some(doctor) = queries::find_doctor_by_name(conn, doctor_name)? else {
        return Ok(StepOptions::input("HH:MM (e.g., 14:00)"));
    };

    let booked = queries::booked_times(conn, doctor.id, &date)?;
    let options: Vec<ChoiceOption> = queries::available_slots(conn, doctor.id, Some(weekday_index(&date)))?
        .into_iter()
        .filter(|slot| !booked.contains(&slot.time_slot))
        .map(|slot| ChoiceOption::same(slot.time_slot.to_string()))
        .collect();

    if options.is_empty() {
        return Ok(StepOptions::input("No available slots"));
    }
    Ok(StepOptions::ButtonGroup { options })
}
