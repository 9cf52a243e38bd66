use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use crate::booking::store::WizardStore;
use crate::client::MedtechApi;

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn MedtechApi>,
    pub wizards: WizardStore,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub data: OkData,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

/* -------------------------
   Upstream (MedTech API) shapes
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentType {
    Presencial,
    Virtual,
}

impl AppointmentType {
    pub fn label(self) -> &'static str {
        match self {
            AppointmentType::Presencial => "Presencial",
            AppointmentType::Virtual => "Virtual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pendiente,
    Confirmada,
    Cancelada,
    Completada,
    EnCurso,
    NoAsistio,
}

/// One entry of the doctor directory (`GET /professional`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub specialty: String,
}

impl Doctor {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.last_name).trim().to_string()
    }
}

/// The directory endpoint is paginated; older deployments return a bare list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DirectoryPayload {
    Page { content: Vec<Doctor> },
    List(Vec<Doctor>),
}

impl DirectoryPayload {
    pub fn into_doctors(self) -> Vec<Doctor> {
        match self {
            DirectoryPayload::Page { content } => content,
            DirectoryPayload::List(list) => list,
        }
    }
}

/// `GET /auth/me`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: Vec<String>,
    #[serde(default)]
    pub specialty: Option<String>,
}

impl CurrentUser {
    pub fn is_patient(&self) -> bool {
        self.has_role("PATIENT")
    }

    pub fn is_professional(&self) -> bool {
        self.has_role("PROFESSIONAL")
    }

    fn has_role(&self, role: &str) -> bool {
        self.roles
            .iter()
            .any(|r| r.trim_start_matches("ROLE_").eq_ignore_ascii_case(role))
    }
}

/// Body of `POST /api/appointments`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub doctor_id: i64,
    pub patient_id: i64,
    /// `YYYY-MM-DD`
    pub appointment_date: String,
    /// `HH:MM`, 24-hour
    pub appointment_time: String,
    pub reason: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    #[serde(default)]
    pub doctor_id: Option<i64>,
    #[serde(default)]
    pub patient_id: Option<i64>,
    #[serde(rename = "type", default)]
    pub appointment_type: Option<AppointmentType>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub appointment_date: Option<NaiveDate>,
    /// Kept as sent: the API emits both `HH:MM` and `HH:MM:SS`.
    #[serde(default)]
    pub appointment_time: Option<String>,
    #[serde(default)]
    pub duration: Option<i32>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Appointment {
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        let date = self.appointment_date?;
        let raw = self.appointment_time.as_deref()?.trim();
        let time = NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .ok()?;
        Some(date.and_time(time))
    }
}

/// One entry of `GET /medical-records/{id}/entries/details`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalEntry {
    pub id: i64,
    #[serde(default)]
    pub creation_date: Option<NaiveDateTime>,
    #[serde(rename = "type", default)]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub diagnoses: Vec<Diagnosis>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Diagnosis {
    #[serde(default)]
    pub severity: Option<String>,
}

/// A medical entry as the history view shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub title: String,
    pub date: Option<NaiveDateTime>,
    pub description: String,
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    /// Lowercased severity of the first diagnosis, `"normal"` without one.
    pub severity: String,
    pub details: String,
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl From<MedicalEntry> for HistoryEntry {
    fn from(e: MedicalEntry) -> Self {
        let severity = e
            .diagnoses
            .first()
            .and_then(|d| non_blank(d.severity.clone()))
            .map(|s| s.to_lowercase())
            .unwrap_or_else(|| "normal".to_string());

        HistoryEntry {
            id: e.id,
            title: non_blank(e.summary).unwrap_or_else(|| "Medical entry".to_string()),
            date: e.creation_date,
            description: non_blank(e.description).unwrap_or_else(|| "No description".to_string()),
            entry_type: non_blank(e.entry_type),
            severity,
            details: non_blank(e.observations).unwrap_or_else(|| "No observations".to_string()),
        }
    }
}

/* -------------------------
   Helpers
--------------------------*/

// Only called when the field is present; `null` becomes the default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Case-insensitive substring match on the specialty; an empty query keeps everyone.
pub fn filter_by_specialty(doctors: &[Doctor], query: Option<&str>) -> Vec<Doctor> {
    let needle = query.map(str::trim).unwrap_or_default().to_lowercase();
    if needle.is_empty() {
        return doctors.to_vec();
    }
    doctors
        .iter()
        .filter(|d| d.specialty.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
