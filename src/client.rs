// src/client.rs
//
// Typed access to the external MedTech REST API. Every remote failure is
// normalized here into one `ClientError`; callers never look at raw payloads.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::middleware::auth_context::Session;
use crate::models::{
    Appointment, CreateAppointmentRequest, CurrentUser, DirectoryPayload, Doctor, MedicalEntry,
};

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The API answered with a non-2xx status. `message` is the server's own text, if it sent one.
    #[error("upstream rejected the request (HTTP {status})")]
    Rejected { status: u16, message: Option<String> },
    #[error("upstream unreachable: {0}")]
    Transport(String),
    #[error("unexpected upstream payload: {0}")]
    Decode(String),
}

impl ClientError {
    /// Text to show the user: the server's message when present, else `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ClientError::Rejected { message: Some(m), .. } => m.clone(),
            _ => fallback.to_string(),
        }
    }
}

/// Pull the human-readable message out of an error body.
///
/// The API answers `{message, details: [..]}`; the first detail is the most
/// specific, then `message`. Anything else yields `None`.
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    let value: JsonValue = serde_json::from_slice(body).ok()?;

    let first_detail = value
        .get("details")
        .and_then(JsonValue::as_array)
        .and_then(|d| d.first())
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(detail) = first_detail {
        return Some(detail.to_string());
    }

    value
        .get("message")
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Booked slots come back as ISO local date-times, with or without seconds.
pub fn parse_booked_slot(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
}

#[async_trait]
pub trait MedtechApi: Send + Sync {
    /// `GET /auth/me`
    async fn current_user(&self, session: &Session) -> Result<CurrentUser, ClientError>;

    /// `GET /professional`, flattened.
    async fn list_doctors(&self, session: &Session) -> Result<Vec<Doctor>, ClientError>;

    /// `POST /api/appointments`
    async fn create_appointment(
        &self,
        session: &Session,
        req: &CreateAppointmentRequest,
    ) -> Result<Appointment, ClientError>;

    /// `GET /api/appointments/patient/{patient_id}`
    async fn patient_appointments(
        &self,
        session: &Session,
        patient_id: i64,
    ) -> Result<Vec<Appointment>, ClientError>;

    /// `PATCH /api/appointments/{appointment_id}/cancel`
    async fn cancel_appointment(
        &self,
        session: &Session,
        appointment_id: i64,
        reason: Option<&str>,
    ) -> Result<(), ClientError>;

    /// `GET /api/appointments/doctor/{doctor_id}/availability` (slots already taken).
    async fn doctor_booked_slots(
        &self,
        session: &Session,
        doctor_id: i64,
    ) -> Result<Vec<NaiveDateTime>, ClientError>;

    /// `GET /medical-records/{record_id}/entries/details`
    async fn medical_entries(
        &self,
        session: &Session,
        record_id: i64,
    ) -> Result<Vec<MedicalEntry>, ClientError>;
}

pub struct HttpMedtechApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpMedtechApi {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(req: RequestBuilder) -> Result<Response, ClientError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.bytes().await.unwrap_or_default();
        let message = extract_error_message(&body);
        tracing::warn!(status = status.as_u16(), ?message, "medtech api rejected request");
        Err(ClientError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ClientError> {
        Self::send(req)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MedtechApi for HttpMedtechApi {
    async fn current_user(&self, session: &Session) -> Result<CurrentUser, ClientError> {
        let req = self.http.get(self.url("/auth/me")).bearer_auth(session.token());
        Self::send_json(req).await
    }

    async fn list_doctors(&self, session: &Session) -> Result<Vec<Doctor>, ClientError> {
        let req = self.http.get(self.url("/professional")).bearer_auth(session.token());
        let payload: DirectoryPayload = Self::send_json(req).await?;
        Ok(payload.into_doctors())
    }

    async fn create_appointment(
        &self,
        session: &Session,
        body: &CreateAppointmentRequest,
    ) -> Result<Appointment, ClientError> {
        let req = self
            .http
            .post(self.url("/api/appointments"))
            .bearer_auth(session.token())
            .json(body);
        Self::send_json(req).await
    }

    async fn patient_appointments(
        &self,
        session: &Session,
        patient_id: i64,
    ) -> Result<Vec<Appointment>, ClientError> {
        let req = self
            .http
            .get(self.url(&format!("/api/appointments/patient/{patient_id}")))
            .bearer_auth(session.token());
        Self::send_json(req).await
    }

    async fn cancel_appointment(
        &self,
        session: &Session,
        appointment_id: i64,
        reason: Option<&str>,
    ) -> Result<(), ClientError> {
        let mut req = self
            .http
            .patch(self.url(&format!("/api/appointments/{appointment_id}/cancel")))
            .bearer_auth(session.token());
        if let Some(reason) = reason {
            req = req.query(&[("reason", reason)]);
        }
        Self::send(req).await?;
        Ok(())
    }

    async fn doctor_booked_slots(
        &self,
        session: &Session,
        doctor_id: i64,
    ) -> Result<Vec<NaiveDateTime>, ClientError> {
        let req = self
            .http
            .get(self.url(&format!("/api/appointments/doctor/{doctor_id}/availability")))
            .bearer_auth(session.token());
        let raw: Vec<String> = Self::send_json(req).await?;
        raw.iter()
            .map(|s| {
                parse_booked_slot(s).ok_or_else(|| ClientError::Decode(format!("bad slot timestamp: {s}")))
            })
            .collect()
    }

    async fn medical_entries(
        &self,
        session: &Session,
        record_id: i64,
    ) -> Result<Vec<MedicalEntry>, ClientError> {
        let req = self
            .http
            .get(self.url(&format!("/medical-records/{record_id}/entries/details")))
            .bearer_auth(session.token());
        Self::send_json(req).await
    }
}

#[cfg(test)]
pub mod fake {
    //! In-memory stand-in for the MedTech API used across the test modules.

    use std::sync::{Arc, Mutex};

    use tokio::sync::Notify;

    use super::*;

    #[derive(Default)]
    pub struct FakeApi {
        pub user: Option<CurrentUser>,
        pub doctors: Option<Vec<Doctor>>,
        pub create_result: Option<Result<Appointment, ClientError>>,
        /// When set, each create waits for a permit after recording its body.
        pub create_gate: Option<Arc<Notify>>,
        pub appointments: Vec<Appointment>,
        pub booked: Vec<NaiveDateTime>,
        /// Medical entries keyed by record id.
        pub records: Vec<(i64, Vec<MedicalEntry>)>,
        pub created: Mutex<Vec<CreateAppointmentRequest>>,
        pub cancelled: Mutex<Vec<(i64, Option<String>)>>,
    }

    impl FakeApi {
        pub fn patient(id: i64) -> Self {
            FakeApi {
                user: Some(CurrentUser {
                    id,
                    email: Some("paciente@medtech.test".into()),
                    name: "Eva".into(),
                    last_name: "Sol".into(),
                    roles: vec!["PATIENT".into()],
                    specialty: None,
                }),
                ..Default::default()
            }
        }

        pub fn created_requests(&self) -> Vec<CreateAppointmentRequest> {
            self.created.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MedtechApi for FakeApi {
        async fn current_user(&self, _session: &Session) -> Result<CurrentUser, ClientError> {
            self.user.clone().ok_or(ClientError::Rejected { status: 401, message: None })
        }

        async fn list_doctors(&self, _session: &Session) -> Result<Vec<Doctor>, ClientError> {
            self.doctors
                .clone()
                .ok_or_else(|| ClientError::Transport("connection refused".into()))
        }

        async fn create_appointment(
            &self,
            _session: &Session,
            req: &CreateAppointmentRequest,
        ) -> Result<Appointment, ClientError> {
            self.created.lock().unwrap().push(req.clone());
            if let Some(gate) = &self.create_gate {
                gate.notified().await;
            }
            self.create_result
                .clone()
                .unwrap_or_else(|| Err(ClientError::Transport("no response configured".into())))
        }

        async fn patient_appointments(
            &self,
            _session: &Session,
            patient_id: i64,
        ) -> Result<Vec<Appointment>, ClientError> {
            Ok(self
                .appointments
                .iter()
                .filter(|a| a.patient_id == Some(patient_id))
                .cloned()
                .collect())
        }

        async fn cancel_appointment(
            &self,
            _session: &Session,
            appointment_id: i64,
            reason: Option<&str>,
        ) -> Result<(), ClientError> {
            if !self.appointments.iter().any(|a| a.id == appointment_id) {
                return Err(ClientError::Rejected {
                    status: 404,
                    message: Some("Cita no encontrada".into()),
                });
            }
            self.cancelled
                .lock()
                .unwrap()
                .push((appointment_id, reason.map(str::to_string)));
            Ok(())
        }

        async fn doctor_booked_slots(
            &self,
            _session: &Session,
            _doctor_id: i64,
        ) -> Result<Vec<NaiveDateTime>, ClientError> {
            Ok(self.booked.clone())
        }

        async fn medical_entries(
            &self,
            _session: &Session,
            record_id: i64,
        ) -> Result<Vec<MedicalEntry>, ClientError> {
            self.records
                .iter()
                .find(|(id, _)| *id == record_id)
                .map(|(_, entries)| entries.clone())
                .ok_or(ClientError::Rejected {
                    status: 404,
                    message: Some("Historia clínica no encontrada".into()),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_detail_wins_over_message() {
        let body = br#"{"errorCode":"CONFLICT","message":"Conflicto","details":["Ya tienes una cita en ese horario","otro"]}"#;
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("Ya tienes una cita en ese horario")
        );
    }

    #[test]
    fn message_used_when_details_missing_or_empty() {
        assert_eq!(
            extract_error_message(br#"{"message":"Doctor no disponible"}"#).as_deref(),
            Some("Doctor no disponible")
        );
        assert_eq!(
            extract_error_message(br#"{"message":"Doctor no disponible","details":[]}"#).as_deref(),
            Some("Doctor no disponible")
        );
    }

    #[test]
    fn unusable_bodies_yield_none() {
        assert_eq!(extract_error_message(b""), None);
        assert_eq!(extract_error_message(b"<html>502</html>"), None);
        assert_eq!(extract_error_message(br#"{"message":"   "}"#), None);
        assert_eq!(extract_error_message(br#"{"details":[42]}"#), None);
    }

    #[test]
    fn user_message_falls_back() {
        let rejected = ClientError::Rejected { status: 409, message: Some("ocupado".into()) };
        assert_eq!(rejected.user_message("generic"), "ocupado");

        let bare = ClientError::Rejected { status: 500, message: None };
        assert_eq!(bare.user_message("generic"), "generic");
        assert_eq!(ClientError::Transport("x".into()).user_message("generic"), "generic");
    }

    #[test]
    fn booked_slots_parse_with_or_without_seconds() {
        let a = parse_booked_slot("2025-10-20T09:30:00").unwrap();
        let b = parse_booked_slot("2025-10-20T09:30").unwrap();
        assert_eq!(a, b);
        assert!(parse_booked_slot("2025-10-20").is_none());
        assert!(parse_booked_slot("soon").is_none());
    }

    #[test]
    fn base_url_is_normalized() {
        let api = HttpMedtechApi::new("http://localhost:8080/", Duration::from_secs(5)).unwrap();
        assert_eq!(api.url("/auth/me"), "http://localhost:8080/auth/me");
    }
}
