// src/booking/submission.rs
//
// Turning a finished draft into the API's appointment-creation call.

use chrono::NaiveDate;

use crate::booking::draft::{BookingDraft, Field, FieldErrors};
use crate::booking::slots;
use crate::client::MedtechApi;
use crate::middleware::auth_context::Session;
use crate::models::{Appointment, CreateAppointmentRequest};

pub const GENERIC_FAILURE: &str = "Could not schedule the appointment";

/// Re-run every rule and build the request body.
///
/// On any failure every field is marked touched so the errors surface, and
/// no request is produced.
pub fn prepare(draft: &mut BookingDraft, today: NaiveDate) -> Result<CreateAppointmentRequest, FieldErrors> {
    let errors = draft.validate(today);
    if !errors.is_empty() {
        draft.touch_all();
        return Err(errors);
    }

    let missing = |field: Field| {
        let mut errors = FieldErrors::new();
        errors.insert(field, "missing".to_string());
        errors
    };

    let appointment_type = draft.appointment_type.ok_or_else(|| missing(Field::Type))?;
    let doctor_id = draft.doctor_id.ok_or_else(|| missing(Field::DoctorId))?;
    let patient_id = draft.patient_id().ok_or_else(|| missing(Field::PatientId))?;
    let date = draft.appointment_date.ok_or_else(|| missing(Field::AppointmentDate))?;
    let time = draft
        .appointment_time
        .as_deref()
        .and_then(slots::to_24_hour)
        .ok_or_else(|| missing(Field::AppointmentTime))?;

    Ok(CreateAppointmentRequest {
        appointment_type,
        doctor_id,
        patient_id,
        appointment_date: date.format("%Y-%m-%d").to_string(),
        appointment_time: time,
        reason: draft.trimmed_reason().to_string(),
        notes: draft.notes.clone(),
    })
}

/// POST the prepared request. The error is the text for the confirmation banner.
pub async fn send(
    api: &dyn MedtechApi,
    session: &Session,
    req: &CreateAppointmentRequest,
) -> Result<Appointment, String> {
    match api.create_appointment(session, req).await {
        Ok(created) => {
            tracing::info!(
                appointment_id = created.id,
                doctor_id = req.doctor_id,
                date = %req.appointment_date,
                "appointment created"
            );
            Ok(created)
        }
        Err(e) => {
            tracing::warn!(error = %e, doctor_id = req.doctor_id, "appointment creation failed");
            Err(e.user_message(GENERIC_FAILURE))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::client::fake::FakeApi;
    use crate::models::AppointmentType;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 20).unwrap()
    }

    fn filled() -> BookingDraft {
        let mut d = BookingDraft::for_patient(21);
        d.set_type(AppointmentType::Presencial);
        d.set_doctor(7);
        d.set_schedule(today().succ_opt(), Some("10:00 AM".into()));
        d.set_reason_notes("Chequeo".into(), None);
        d
    }

    #[test]
    fn prepare_shapes_the_request_body() {
        let mut d = filled();
        let req = prepare(&mut d, today()).unwrap();
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "type": "PRESENCIAL",
                "doctorId": 7,
                "patientId": 21,
                "appointmentDate": "2025-10-21",
                "appointmentTime": "10:00",
                "reason": "Chequeo",
                "notes": ""
            })
        );
    }

    #[test]
    fn prepare_touches_everything_on_failure() {
        let mut d = BookingDraft::for_patient(21);
        d.set_type(AppointmentType::Virtual);
        let errors = prepare(&mut d, today()).unwrap_err();
        assert!(errors.contains_key(&Field::DoctorId));
        assert!(!errors.contains_key(&Field::Type));
        for f in Field::ALL {
            assert!(d.is_touched(f), "{f:?} not touched");
        }
    }

    #[test]
    fn prepare_revalidates_the_date_against_today() {
        let mut d = filled();
        // wizard left open past the chosen day
        let later = today().succ_opt().and_then(|t| t.succ_opt()).unwrap();
        let errors = prepare(&mut d, later).unwrap_err();
        assert_eq!(errors.keys().copied().collect::<Vec<_>>(), vec![Field::AppointmentDate]);
    }

    #[tokio::test]
    async fn send_surfaces_server_detail_verbatim() {
        let api = FakeApi {
            create_result: Some(Err(ClientError::Rejected {
                status: 409,
                message: Some("Ya tienes una cita en ese horario".into()),
            })),
            ..FakeApi::patient(21)
        };
        let mut d = filled();
        let req = prepare(&mut d, today()).unwrap();
        let err = send(&api, &Session::new("t"), &req).await.unwrap_err();
        assert_eq!(err, "Ya tienes una cita en ese horario");
        assert_eq!(api.created_requests(), vec![req]);
    }

    #[tokio::test]
    async fn send_falls_back_to_generic_text() {
        let api = FakeApi::patient(21);
        let mut d = filled();
        let req = prepare(&mut d, today()).unwrap();
        let err = send(&api, &Session::new("t"), &req).await.unwrap_err();
        assert_eq!(err, GENERIC_FAILURE);
    }
}
