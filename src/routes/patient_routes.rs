// src/routes/patient_routes.rs

use std::cmp::Reverse;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::Session,
    models::{
        ApiOk, AppState, Appointment, AppointmentStatus, CurrentUser, HistoryEntry, OkData, OkResponse,
    },
};

const MAX_CANCEL_REASON_LEN: usize = 300;

/// Entry type the API uses for diagnoses.
const DIAGNOSES: &str = "Diagnósticos";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients/me/appointments", get(get_my_appointments))
        .route("/appointments/{appointment_id}/cancel", post(cancel_appointment))
        .route("/patients/me/medical-history", get(get_my_medical_history))
}

#[derive(Debug, Serialize)]
pub struct PatientAppointments {
    pub upcoming: Vec<Appointment>,
    pub past: Vec<Appointment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub record_id: i64,
    /// `all`, `last3`, `recentDiagnoses`, `critical`, or an entry type.
    pub filter: Option<String>,
    pub search: Option<String>,
}

async fn require_patient(state: &AppState, session: &Session) -> Result<CurrentUser, ApiError> {
    let me = state.api.current_user(session).await?;
    if !me.is_patient() {
        return Err(ApiError::Forbidden("FORBIDDEN", "Patient account required".into()));
    }
    Ok(me)
}

fn is_open(a: &Appointment) -> bool {
    !matches!(
        a.status,
        Some(AppointmentStatus::Cancelada | AppointmentStatus::Completada | AppointmentStatus::NoAsistio)
    )
}

/// Upcoming: open appointments at or after `now`, soonest first.
/// Past: everything else, most recent first. Undated entries count as past.
pub fn split_by_time(appointments: Vec<Appointment>, now: NaiveDateTime) -> PatientAppointments {
    let (mut upcoming, mut past): (Vec<_>, Vec<_>) = appointments
        .into_iter()
        .partition(|a| is_open(a) && a.starts_at().is_some_and(|t| t >= now));

    upcoming.sort_by_key(Appointment::starts_at);
    past.sort_by_key(|a| Reverse(a.starts_at()));

    PatientAppointments { upcoming, past }
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32)
}

/// Whether a history entry survives the chosen filter and search term.
/// Undated entries never match the time-based filters.
pub fn history_matches(entry: &HistoryEntry, filter: Option<&str>, search: Option<&str>, today: NaiveDate) -> bool {
    let months = entry.date.map(|d| months_between(d.date(), today));
    let kept = match filter.map(str::trim).unwrap_or_default() {
        "" | "all" | "search" => true,
        "last3" => months.is_some_and(|m| m <= 3),
        "recentDiagnoses" => entry.entry_type.as_deref() == Some(DIAGNOSES) && months.is_some_and(|m| m <= 1),
        "critical" => entry.severity == "high",
        other => entry
            .entry_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(other)),
    };

    let term = search.map(str::trim).unwrap_or_default().to_lowercase();
    kept && (term.is_empty()
        || entry.title.to_lowercase().contains(&term)
        || entry.description.to_lowercase().contains(&term))
}

/* ============================================================
   GET /patients/me/appointments
   ============================================================ */

pub async fn get_my_appointments(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ApiOk<PatientAppointments>>, ApiError> {
    let me = require_patient(&state, &session).await?;
    let appointments = state.api.patient_appointments(&session, me.id).await?;

    tracing::debug!(patient_id = me.id, count = appointments.len(), "patient appointments fetched");

    let now = chrono::Local::now().naive_local();
    Ok(Json(ApiOk {
        data: split_by_time(appointments, now),
    }))
}

/* ============================================================
   GET /patients/me/medical-history
   ============================================================ */

pub async fn get_my_medical_history(
    State(state): State<AppState>,
    session: Session,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<ApiOk<Vec<HistoryEntry>>>, ApiError> {
    let me = require_patient(&state, &session).await?;
    let entries = state.api.medical_entries(&session, q.record_id).await?;

    tracing::debug!(patient_id = me.id, record_id = q.record_id, count = entries.len(), "medical entries fetched");

    let today = chrono::Local::now().date_naive();
    let mut history: Vec<HistoryEntry> = entries
        .into_iter()
        .map(HistoryEntry::from)
        .filter(|e| history_matches(e, q.filter.as_deref(), q.search.as_deref(), today))
        .collect();
    history.sort_by_key(|e| Reverse(e.date));

    Ok(Json(ApiOk { data: history }))
}

/* ============================================================
   POST /appointments/{id}/cancel
   ============================================================ */

pub async fn cancel_appointment(
    State(state): State<AppState>,
    session: Session,
    Path(appointment_id): Path<i64>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<OkResponse>, ApiError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let reason = req
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    if reason.is_some_and(|r| r.chars().count() > MAX_CANCEL_REASON_LEN) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("reason cannot exceed {MAX_CANCEL_REASON_LEN} characters"),
        ));
    }

    let me = require_patient(&state, &session).await?;
    state
        .api
        .cancel_appointment(&session, appointment_id, reason)
        .await?;

    tracing::info!(patient_id = me.id, appointment_id, "appointment cancelled");
    Ok(Json(OkResponse {
        data: OkData { ok: true },
    }))
}
