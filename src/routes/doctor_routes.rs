// src/routes/doctor_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::Session,
    models::{filter_by_specialty, ApiOk, AppState, Doctor},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_doctors))
        .route("/doctors/me/booked-slots", get(get_my_booked_slots))
        .route("/doctors/{doctor_id}/booked-slots", get(get_booked_slots))
}

#[derive(Debug, Deserialize)]
pub struct DoctorQuery {
    pub specialty: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookedSlots {
    pub doctor_id: i64,
    pub slots: Vec<NaiveDateTime>,
}

async fn booked_slots(state: &AppState, session: &Session, doctor_id: i64) -> Result<BookedSlots, ApiError> {
    let mut slots = state.api.doctor_booked_slots(session, doctor_id).await?;
    slots.sort();
    slots.dedup();
    Ok(BookedSlots { doctor_id, slots })
}

pub async fn list_doctors(
    State(state): State<AppState>,
    session: Session,
    Query(q): Query<DoctorQuery>,
) -> Result<Json<ApiOk<Vec<Doctor>>>, ApiError> {
    let doctors = state.api.list_doctors(&session).await?;
    Ok(Json(ApiOk {
        data: filter_by_specialty(&doctors, q.specialty.as_deref()),
    }))
}

/// The signed-in professional's own booked slots (doctor dashboard).
pub async fn get_my_booked_slots(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ApiOk<BookedSlots>>, ApiError> {
    let me = state.api.current_user(&session).await?;
    if !me.is_professional() {
        return Err(ApiError::Forbidden("FORBIDDEN", "Professional account required".into()));
    }
    Ok(Json(ApiOk {
        data: booked_slots(&state, &session, me.id).await?,
    }))
}

pub async fn get_booked_slots(
    State(state): State<AppState>,
    session: Session,
    Path(doctor_id): Path<i64>,
) -> Result<Json<ApiOk<BookedSlots>>, ApiError> {
    Ok(Json(ApiOk {
        data: booked_slots(&state, &session, doctor_id).await?,
    }))
}
