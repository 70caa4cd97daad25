use anyhow::Context;
use rusqlite::{params, Connection};

const DEPARTMENTS: &[(&str, &str, &str)] = &[
    ("CARDIO", "Cardiology", "Heart and cardiovascular system"),
    ("ORTHO", "Orthopedics", "Bones, joints, and muscles"),
    ("DERM", "Dermatology", "Skin, hair, and nails"),
    ("NEURO", "Neurology", "Brain and nervous system"),
    ("PEDS", "Pediatrics", "Healthcare for children"),
];

struct SeedDoctor {
    department: &'static str,
    number: &'static str,
    name: &'static str,
    specialization: &'static str,
    new_patients: bool,
    follow_up: bool,
    checkup: bool,
    days: &'static [u8],
    hours: &'static [u8],
}

const DOCTORS: &[SeedDoctor] = &[
    SeedDoctor {
        department: "CARDIO",
        number: "D001",
        name: "Dr. Sarah Johnson",
        specialization: "Interventional Cardiology",
        new_patients: true,
        follow_up: true,
        checkup: true,
        days: &[1, 3, 5],
        hours: &[8, 9, 10, 11, 13, 14, 15, 16, 17],
    },
    SeedDoctor {
        department: "CARDIO",
        number: "D002",
        name: "Dr. Robert Martinez",
        specialization: "Heart Failure",
        new_patients: true,
        follow_up: true,
        checkup: false,
        days: &[2, 4, 5],
        hours: &[9, 10, 11, 13, 14, 15, 16, 17, 18],
    },
    SeedDoctor {
        department: "CARDIO",
        number: "D003",
        name: "Dr. Amanda Lewis",
        specialization: "Preventive Cardiology",
        new_patients: false,
        follow_up: true,
        checkup: true,
        days: &[1, 2, 3],
        hours: &[13, 14, 15, 16, 17, 18],
    },
    SeedDoctor {
        department: "ORTHO",
        number: "D004",
        name: "Dr. Michael Chen",
        specialization: "Sports Medicine",
        new_patients: true,
        follow_up: true,
        checkup: true,
        days: &[2, 4],
        hours: &[9, 10, 11, 13, 14, 15, 16, 17, 18],
    },
    SeedDoctor {
        department: "ORTHO",
        number: "D005",
        name: "Dr. Lisa Thompson",
        specialization: "Joint Replacement",
        new_patients: true,
        follow_up: true,
        checkup: false,
        days: &[1, 3, 5],
        hours: &[8, 9, 10, 11, 13, 14, 15, 16, 17],
    },
    SeedDoctor {
        department: "ORTHO",
        number: "D006",
        name: "Dr. Kevin Park",
        specialization: "Spine Surgery",
        new_patients: false,
        follow_up: true,
        checkup: true,
        days: &[1, 2, 3, 4, 5],
        hours: &[9, 10, 11, 13, 14, 15],
    },
    SeedDoctor {
        department: "DERM",
        number: "D007",
        name: "Dr. Emily Williams",
        specialization: "Cosmetic Dermatology",
        new_patients: true,
        follow_up: true,
        checkup: true,
        days: &[1, 2, 3, 4, 5],
        hours: &[9, 10, 11, 13, 14, 15, 16, 17, 18],
    },
    SeedDoctor {
        department: "DERM",
        number: "D008",
        name: "Dr. Daniel Kim",
        specialization: "Skin Cancer",
        new_patients: true,
        follow_up: true,
        checkup: true,
        days: &[2, 3, 4],
        hours: &[10, 11, 13, 14, 15, 16, 17],
    },
    SeedDoctor {
        department: "NEURO",
        number: "D009",
        name: "Dr. James Rodriguez",
        specialization: "Epilepsy and Seizures",
        new_patients: true,
        follow_up: true,
        checkup: false,
        days: &[1, 2, 3],
        hours: &[8, 9, 10, 11, 12],
    },
    SeedDoctor {
        department: "NEURO",
        number: "D010",
        name: "Dr. Michelle Wong",
        specialization: "Stroke and Movement Disorders",
        new_patients: true,
        follow_up: true,
        checkup: true,
        days: &[4, 5],
        hours: &[13, 14, 15, 16, 17, 18, 19],
    },
    SeedDoctor {
        department: "PEDS",
        number: "D011",
        name: "Dr. Jennifer Lee",
        specialization: "General Pediatrics",
        new_patients: true,
        follow_up: true,
        checkup: true,
        days: &[1, 3, 5],
        hours: &[9, 10, 11, 13, 14, 15, 16],
    },
    SeedDoctor {
        department: "PEDS",
        number: "D012",
        name: "Dr. Christopher Davis",
        specialization: "Pediatric Cardiology",
        new_patients: true,
        follow_up: true,
        checkup: false,
        days: &[2, 4],
        hours: &[8, 9, 10, 11, 13, 14],
    },
];

const PATIENTS: &[(&str, &str, &str, &str)] = &[
    ("P001", "John Smith", "555-0101", "1985-03-15"),
    ("P002", "Maria Garcia", "555-0102", "1990-07-22"),
    ("P003", "David Kim", "555-0103", "1978-11-08"),
    ("P004", "Jessica Brown", "555-0104", "1995-02-14"),
    ("P005", "Robert Taylor", "555-0105", "1982-09-30"),
    ("P006", "Emily Anderson", "555-0106", "1988-05-19"),
    ("P007", "Michael Johnson", "555-0107", "1992-12-03"),
    ("P008", "Sarah Wilson", "555-0108", "1980-08-27"),
    ("P009", "James Martinez", "555-0109", "1975-01-11"),
    ("P010", "Linda Davis", "555-0110", "1998-04-08"),
];

/// Loads the reference hospital into an empty database. Returns false if data was already present.
pub fn seed_reference_data(conn: &Connection) -> anyhow::Result<bool> {
    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM departments", [], |row| row.get(0))
        .context("failed to count departments")?;
    if existing > 0 {
        return Ok(false);
    }

    let tx = conn.unchecked_transaction()?;

    for (code, name, description) in DEPARTMENTS {
        tx.execute(
            "INSERT INTO departments (code, name, description) VALUES (?1, ?2, ?3)",
            params![code, name, description],
        )?;
    }

    let mut slot_count = 0;
    for doc in DOCTORS {
        tx.execute(
            "INSERT INTO doctors (department_id, doctor_number, name, specialization,
                accepts_new_patients, accepts_follow_up, accepts_checkup)
             SELECT id, ?2, ?3, ?4, ?5, ?6, ?7 FROM departments WHERE code = ?1",
            params![
                doc.department,
                doc.number,
                doc.name,
                doc.specialization,
                doc.new_patients,
                doc.follow_up,
                doc.checkup,
            ],
        )?;
        let doctor_id = tx.last_insert_rowid();

        for day in doc.days {
            for hour in doc.hours {
                tx.execute(
                    "INSERT INTO schedules (doctor_id, day_of_week, time_slot, is_available)
                     VALUES (?1, ?2, ?3, 1)",
                    params![doctor_id, day, format!("{hour:02}:00")],
                )?;
                slot_count += 1;
            }
        }
    }

    for (number, name, phone, dob) in PATIENTS {
        tx.execute(
            "INSERT INTO patients (patient_number, name, phone, date_of_birth) VALUES (?1, ?2, ?3, ?4)",
            params![number, name, phone, dob],
        )?;
    }

    tx.commit().context("failed to commit reference data")?;

    tracing::info!(
        departments = DEPARTMENTS.len(),
        doctors = DOCTORS.len(),
        schedule_slots = slot_count,
        patients = PATIENTS.len(),
        "seeded reference data"
    );

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_seed_only_once() {
        let conn = db::init_db(":memory:").unwrap();
        assert!(seed_reference_data(&conn).unwrap());
        assert!(!seed_reference_data(&conn).unwrap());

        let doctors: i64 = conn
            .query_row("SELECT COUNT(*) FROM doctors", [], |row| row.get(0))
            .unwrap();
        assert_eq!(doctors, 12);
    }
}
