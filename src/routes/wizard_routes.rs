// src/routes/wizard_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    booking::{
        submission,
        wizard::{DirectoryView, Wizard, WizardError, WizardView},
    },
    error::ApiError,
    middleware::auth_context::Session,
    models::{ApiOk, AppState, AppointmentType, OkData, OkResponse},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/wizards", post(start_wizard))
        .route("/wizards/{wizard_id}", get(get_wizard).delete(discard_wizard))
        .route("/wizards/{wizard_id}/type", put(put_type))
        .route("/wizards/{wizard_id}/doctors", get(get_doctors))
        .route("/wizards/{wizard_id}/doctor", put(put_doctor))
        .route("/wizards/{wizard_id}/schedule", put(put_schedule))
        .route("/wizards/{wizard_id}/reason", put(put_reason))
        .route("/wizards/{wizard_id}/next", post(next_step))
        .route("/wizards/{wizard_id}/back", post(previous_step))
        .route("/wizards/{wizard_id}/goto/{step}", post(goto_step))
        .route("/wizards/{wizard_id}/confirm", post(confirm))
}

/* ============================================================
   Request bodies
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct TypeRequest {
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRequest {
    pub doctor_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub appointment_date: Option<NaiveDate>,
    /// Display form, e.g. `"09:30 AM"`.
    pub appointment_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    /// The user's answer to "are you sure?".
    #[serde(default)]
    pub acknowledged: bool,
}

#[derive(Debug, Deserialize)]
pub struct DirectoryQuery {
    pub specialty: Option<String>,
}

/* ============================================================
   Helpers
   ============================================================ */

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Run one wizard operation for the calling session.
async fn apply<R>(
    state: &AppState,
    session: &Session,
    wizard_id: Uuid,
    op: impl FnOnce(&mut Wizard) -> Result<R, WizardError>,
) -> Result<R, ApiError> {
    state
        .wizards
        .with_wizard(&session.owner_key(), wizard_id, Utc::now(), op)
        .await
        .ok_or_else(ApiError::wizard_not_found)?
        .map_err(ApiError::from)
}

async fn view_of(state: &AppState, session: &Session, wizard_id: Uuid) -> Result<Json<ApiOk<WizardView>>, ApiError> {
    let today = today();
    let view = apply(state, session, wizard_id, |w| Ok(w.view(today))).await?;
    Ok(Json(ApiOk { data: view }))
}

/// Fetch the doctor directory when the doctor step is mounted without one.
/// A failed fetch becomes the step's error state, not an error response.
async fn ensure_directory(state: &AppState, session: &Session, wizard_id: Uuid) -> Result<(), ApiError> {
    let needed = apply(state, session, wizard_id, |w| Ok(w.needs_directory())).await?;
    if !needed {
        return Ok(());
    }

    let result = match state.api.list_doctors(session).await {
        Ok(doctors) => {
            tracing::debug!(%wizard_id, count = doctors.len(), "doctor directory loaded");
            Ok(doctors)
        }
        Err(e) => {
            tracing::warn!(%wizard_id, error = %e, "doctor directory fetch failed");
            Err(e.user_message("Could not load the doctor directory"))
        }
    };

    apply(state, session, wizard_id, |w| {
        w.set_directory(result);
        Ok(())
    })
    .await
}

/* ============================================================
   POST /wizards
   ============================================================ */

pub async fn start_wizard(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ApiOk<WizardView>>, ApiError> {
    let me = state.api.current_user(&session).await?;
    if !me.is_patient() {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only patients can book appointments".into(),
        ));
    }

    let today = today();
    let view = state
        .wizards
        .create(&session.owner_key(), me.id, Utc::now(), |w| w.view(today))
        .await;

    Ok(Json(ApiOk { data: view }))
}

/* ============================================================
   GET / DELETE /wizards/{id}
   ============================================================ */

pub async fn get_wizard(
    State(state): State<AppState>,
    session: Session,
    Path(wizard_id): Path<Uuid>,
) -> Result<Json<ApiOk<WizardView>>, ApiError> {
    view_of(&state, &session, wizard_id).await
}

pub async fn discard_wizard(
    State(state): State<AppState>,
    session: Session,
    Path(wizard_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .wizards
        .remove(&session.owner_key(), wizard_id)
        .await
        .ok_or_else(ApiError::wizard_not_found)??;
    tracing::info!(%wizard_id, "booking wizard discarded");
    Ok(Json(OkResponse {
        data: OkData { ok: true },
    }))
}

/* ============================================================
   Step edits
   ============================================================ */

pub async fn put_type(
    State(state): State<AppState>,
    session: Session,
    Path(wizard_id): Path<Uuid>,
    Json(req): Json<TypeRequest>,
) -> Result<Json<ApiOk<WizardView>>, ApiError> {
    let today = today();
    let view = apply(&state, &session, wizard_id, |w| {
        w.select_type(req.appointment_type)?;
        Ok(w.view(today))
    })
    .await?;
    Ok(Json(ApiOk { data: view }))
}

pub async fn get_doctors(
    State(state): State<AppState>,
    session: Session,
    Path(wizard_id): Path<Uuid>,
    Query(q): Query<DirectoryQuery>,
) -> Result<Json<ApiOk<DirectoryView>>, ApiError> {
    ensure_directory(&state, &session, wizard_id).await?;
    let view = apply(&state, &session, wizard_id, |w| {
        Ok(w.directory_view(q.specialty.as_deref()))
    })
    .await?;
    Ok(Json(ApiOk { data: view }))
}

pub async fn put_doctor(
    State(state): State<AppState>,
    session: Session,
    Path(wizard_id): Path<Uuid>,
    Json(req): Json<DoctorRequest>,
) -> Result<Json<ApiOk<WizardView>>, ApiError> {
    let today = today();
    let view = apply(&state, &session, wizard_id, |w| {
        w.select_doctor(req.doctor_id)?;
        Ok(w.view(today))
    })
    .await?;
    Ok(Json(ApiOk { data: view }))
}

pub async fn put_schedule(
    State(state): State<AppState>,
    session: Session,
    Path(wizard_id): Path<Uuid>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<ApiOk<WizardView>>, ApiError> {
    let today = today();
    let view = apply(&state, &session, wizard_id, |w| {
        w.set_schedule(req.appointment_date, req.appointment_time)?;
        Ok(w.view(today))
    })
    .await?;
    Ok(Json(ApiOk { data: view }))
}

pub async fn put_reason(
    State(state): State<AppState>,
    session: Session,
    Path(wizard_id): Path<Uuid>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<ApiOk<WizardView>>, ApiError> {
    let today = today();
    let view = apply(&state, &session, wizard_id, |w| {
        w.set_reason(req.reason, req.notes)?;
        Ok(w.view(today))
    })
    .await?;
    Ok(Json(ApiOk { data: view }))
}

/* ============================================================
   Navigation
   ============================================================ */

pub async fn next_step(
    State(state): State<AppState>,
    session: Session,
    Path(wizard_id): Path<Uuid>,
) -> Result<Json<ApiOk<WizardView>>, ApiError> {
    apply(&state, &session, wizard_id, |w| w.advance()).await?;
    ensure_directory(&state, &session, wizard_id).await?;
    view_of(&state, &session, wizard_id).await
}

pub async fn previous_step(
    State(state): State<AppState>,
    session: Session,
    Path(wizard_id): Path<Uuid>,
) -> Result<Json<ApiOk<WizardView>>, ApiError> {
    apply(&state, &session, wizard_id, |w| w.retreat()).await?;
    ensure_directory(&state, &session, wizard_id).await?;
    view_of(&state, &session, wizard_id).await
}

pub async fn goto_step(
    State(state): State<AppState>,
    session: Session,
    Path((wizard_id, step)): Path<(Uuid, usize)>,
) -> Result<Json<ApiOk<WizardView>>, ApiError> {
    apply(&state, &session, wizard_id, |w| w.go_to(step)).await?;
    ensure_directory(&state, &session, wizard_id).await?;
    view_of(&state, &session, wizard_id).await
}

/* ============================================================
   POST /wizards/{id}/confirm
   ============================================================ */

pub async fn confirm(
    State(state): State<AppState>,
    session: Session,
    Path(wizard_id): Path<Uuid>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ApiOk<WizardView>>, ApiError> {
    let today = today();
    let owner = session.owner_key();

    // Marks the wizard in flight; the store lock is released before the POST.
    let body = apply(&state, &session, wizard_id, |w| {
        w.begin_submission(req.acknowledged, today)
    })
    .await?;

    // The POST and its write-back run detached, so the outcome is recorded
    // even if this request is dropped mid-flight.
    let task = tokio::spawn(async move {
        let outcome = submission::send(state.api.as_ref(), &session, &body).await;
        state
            .wizards
            .with_wizard(&owner, wizard_id, Utc::now(), |w| {
                w.finish_submission(outcome);
                w.view(today)
            })
            .await
    });

    let view = task
        .await
        .map_err(|e| ApiError::Internal(format!("submission task failed: {e}")))?
        .ok_or_else(ApiError::wizard_not_found)?;
    Ok(Json(ApiOk { data: view }))
}
