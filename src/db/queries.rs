use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, ToSql};

use crate::models::booking::DATE_FORMAT;
use crate::models::{
    Appointment, AppointmentStatus, ClockTime, Department, Doctor, Patient, ScheduleSlot,
    VisitType,
};

impl FromSql for ClockTime {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        ClockTime::parse(s).ok_or_else(|| FromSqlError::Other(format!("invalid time slot: {s}").into()))
    }
}

impl ToSql for ClockTime {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

// ── Patients ──

pub fn get_patient_by_number(conn: &Connection, number: &str) -> anyhow::Result<Option<Patient>> {
    let patient = conn
        .query_row(
            "SELECT id, patient_number, name, phone, date_of_birth FROM patients WHERE patient_number = ?1",
            params![number],
            parse_patient_row,
        )
        .optional()?;
    Ok(patient)
}

pub fn list_patients(conn: &Connection) -> anyhow::Result<Vec<Patient>> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_number, name, phone, date_of_birth FROM patients ORDER BY patient_number ASC",
    )?;
    let rows = stmt.query_map([], parse_patient_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn parse_patient_row(row: &rusqlite::Row) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        patient_number: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        date_of_birth: row.get(4)?,
    })
}

// ── Departments ──

pub fn list_departments(conn: &Connection) -> anyhow::Result<Vec<Department>> {
    let mut stmt =
        conn.prepare("SELECT id, code, name, description FROM departments ORDER BY id ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok(Department {
            id: row.get(0)?,
            code: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Resolves a department by exact name or short code, ignoring case.
pub fn find_department(conn: &Connection, input: &str) -> anyhow::Result<Option<Department>> {
    Ok(list_departments(conn)?
        .into_iter()
        .find(|dept| dept.matches(input)))
}

// ── Doctors ──

const DOCTOR_COLUMNS: &str = "id, department_id, doctor_number, name, specialization, \
     accepts_new_patients, accepts_follow_up, accepts_checkup";

pub fn doctors_in_department(conn: &Connection, department_id: i64) -> anyhow::Result<Vec<Doctor>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCTOR_COLUMNS} FROM doctors WHERE department_id = ?1 ORDER BY id ASC"
    ))?;
    let rows = stmt.query_map(params![department_id], parse_doctor_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Doctors in the department that accept the given visit type, in stored order.
pub fn eligible_doctors(
    conn: &Connection,
    department_id: i64,
    visit_type: VisitType,
) -> anyhow::Result<Vec<Doctor>> {
    Ok(doctors_in_department(conn, department_id)?
        .into_iter()
        .filter(|doc| doc.accepts(visit_type))
        .collect())
}

pub fn find_doctor_by_name(conn: &Connection, name: &str) -> anyhow::Result<Option<Doctor>> {
    let doctor = conn
        .query_row(
            &format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE lower(name) = lower(?1)"),
            params![name.trim()],
            parse_doctor_row,
        )
        .optional()?;
    Ok(doctor)
}

fn parse_doctor_row(row: &rusqlite::Row) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        id: row.get(0)?,
        department_id: row.get(1)?,
        doctor_number: row.get(2)?,
        name: row.get(3)?,
        specialization: row.get(4)?,
        accepts_new_patients: row.get(5)?,
        accepts_follow_up: row.get(6)?,
        accepts_checkup: row.get(7)?,
    })
}

// ── Schedules ──

/// Available weekly slots for a doctor, optionally limited to one weekday (0 = Sunday).
pub fn available_slots(
    conn: &Connection,
    doctor_id: i64,
    day_of_week: Option<u8>,
) -> anyhow::Result<Vec<ScheduleSlot>> {
    let mut stmt = conn.prepare(
        "SELECT id, doctor_id, day_of_week, time_slot, is_available FROM schedules
         WHERE doctor_id = ?1 AND is_available = 1 AND (?2 IS NULL OR day_of_week = ?2)
         ORDER BY day_of_week ASC, time_slot ASC",
    )?;
    let rows = stmt.query_map(params![doctor_id, day_of_week], |row| {
        Ok(ScheduleSlot {
            id: row.get(0)?,
            doctor_id: row.get(1)?,
            day_of_week: row.get(2)?,
            time_slot: row.get(3)?,
            is_available: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Distinct weekdays on which the doctor has at least one available slot.
pub fn available_weekdays(conn: &Connection, doctor_id: i64) -> anyhow::Result<Vec<u8>> {
    let mut days: Vec<u8> = available_slots(conn, doctor_id, None)?
        .into_iter()
        .map(|s| s.day_of_week)
        .collect();
    days.dedup();
    Ok(days)
}

// ── Appointments ──

pub fn find_confirmed_appointment(
    conn: &Connection,
    doctor_id: i64,
    date: &NaiveDate,
    time: &ClockTime,
) -> anyhow::Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM appointments
             WHERE doctor_id = ?1 AND appointment_date = ?2 AND appointment_time = ?3 AND status = 'confirmed'",
            params![doctor_id, date.format(DATE_FORMAT).to_string(), time],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(id)
}

/// Times already taken by confirmed appointments for the doctor on that date.
pub fn booked_times(
    conn: &Connection,
    doctor_id: i64,
    date: &NaiveDate,
) -> anyhow::Result<Vec<ClockTime>> {
    let mut stmt = conn.prepare(
        "SELECT appointment_time FROM appointments
         WHERE doctor_id = ?1 AND appointment_date = ?2 AND status = 'confirmed'",
    )?;
    let rows = stmt.query_map(
        params![doctor_id, date.format(DATE_FORMAT).to_string()],
        |row| row.get::<_, ClockTime>(0),
    )?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub struct NewAppointment<'a> {
    pub patient_number: &'a str,
    pub doctor_name: &'a str,
    pub visit_type: VisitType,
    pub date: NaiveDate,
    pub time: ClockTime,
    pub session_id: &'a str,
    pub agent_type: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum AppointmentInsertError {
    #[error("patient {0} not found")]
    UnknownPatient(String),

    #[error("doctor {0} not found")]
    UnknownDoctor(String),

    #[error("slot already has a confirmed appointment")]
    SlotTaken,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Inserts a confirmed appointment. The unique slot index makes a concurrent
/// double booking fail here with `SlotTaken`.
pub fn insert_appointment(
    conn: &Connection,
    appt: &NewAppointment<'_>,
) -> Result<i64, AppointmentInsertError> {
    let patient_id: i64 = conn
        .query_row(
            "SELECT id FROM patients WHERE patient_number = ?1",
            params![appt.patient_number],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| AppointmentInsertError::UnknownPatient(appt.patient_number.to_string()))?;

    let doctor_id: i64 = conn
        .query_row(
            "SELECT id FROM doctors WHERE name = ?1",
            params![appt.doctor_name],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| AppointmentInsertError::UnknownDoctor(appt.doctor_name.to_string()))?;

    let result = conn.execute(
        "INSERT INTO appointments (patient_id, doctor_id, visit_type, appointment_date, appointment_time,
            status, session_id, agent_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            patient_id,
            doctor_id,
            appt.visit_type.as_str(),
            appt.date.format(DATE_FORMAT).to_string(),
            appt.time,
            AppointmentStatus::Confirmed.as_str(),
            appt.session_id,
            appt.agent_type,
            now_string(),
        ],
    );

    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(AppointmentInsertError::SlotTaken)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_appointment(conn: &Connection, id: i64) -> anyhow::Result<Option<Appointment>> {
    let row = conn
        .query_row(
            "SELECT a.id, p.patient_number, d.name, a.visit_type, a.appointment_date, a.appointment_time,
                    a.status, a.session_id, a.agent_type, a.created_at
             FROM appointments a
             JOIN patients p ON p.id = a.patient_id
             JOIN doctors d ON d.id = a.doctor_id
             WHERE a.id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, ClockTime>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                    row.get::<_, String>(9)?,
                ))
            },
        )
        .optional()?;

    let Some((id, patient_number, doctor_name, visit_type, date, time, status, session_id, agent_type, created_at)) =
        row
    else {
        return Ok(None);
    };

    Ok(Some(Appointment {
        id,
        patient_number,
        doctor_name,
        visit_type: VisitType::parse(&visit_type)
            .ok_or_else(|| anyhow::anyhow!("invalid visit type in appointment {id}: {visit_type}"))?,
        date: NaiveDate::parse_from_str(&date, DATE_FORMAT)?,
        time,
        status: AppointmentStatus::parse(&status),
        session_id,
        agent_type,
        created_at: NaiveDateTime::parse_from_str(&created_at, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_else(|_| Utc::now().naive_utc()),
    }))
}

// ── Interaction log ──

pub struct InteractionLog<'a> {
    pub session_id: &'a str,
    pub agent_type: &'a str,
    pub current_step: &'a str,
    pub user_utterance: &'a str,
    pub extracted_data: Option<String>,
    pub accepted: bool,
    pub rejection_reason: Option<&'a str>,
    pub system_response: &'a str,
}

pub fn insert_interaction_log(conn: &Connection, log: &InteractionLog<'_>) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO interaction_logs (session_id, agent_type, current_step, user_utterance,
            extracted_data, accepted, rejection_reason, system_response, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            log.session_id,
            log.agent_type,
            log.current_step,
            log.user_utterance,
            log.extracted_data,
            log.accepted,
            log.rejection_reason,
            log.system_response,
            now_string(),
        ],
    )?;
    Ok(())
}

fn now_string() -> String {
    Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string()
}
