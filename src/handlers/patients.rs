use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Patient;
use crate::state::AppState;

#[derive(Serialize)]
pub struct PatientsResponse {
    patients: Vec<Patient>,
    count: usize,
}

// GET /api/patients
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PatientsResponse>, AppError> {
    let patients = {
        let db = state.db()?;
        queries::list_patients(&db)?
    };
    Ok(Json(PatientsResponse {
        count: patients.len(),
        patients,
    }))
}
