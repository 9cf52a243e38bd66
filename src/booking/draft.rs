// src/booking/draft.rs
//
// The booking form: one draft per wizard, plus the field rules and the
// "touched" set that decides which errors the UI shows.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::booking::slots;
use crate::models::AppointmentType;

pub const MAX_TEXT_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    #[serde(rename = "type")]
    Type,
    DoctorId,
    PatientId,
    AppointmentDate,
    AppointmentTime,
    Reason,
    Notes,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Type,
        Field::DoctorId,
        Field::PatientId,
        Field::AppointmentDate,
        Field::AppointmentTime,
        Field::Reason,
        Field::Notes,
    ];
}

pub type FieldErrors = BTreeMap<Field, String>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    #[serde(rename = "type")]
    pub appointment_type: Option<AppointmentType>,
    pub doctor_id: Option<i64>,
    patient_id: Option<i64>,
    pub appointment_date: Option<NaiveDate>,
    /// 12-hour display form, e.g. `"09:30 AM"`.
    pub appointment_time: Option<String>,
    pub reason: String,
    pub notes: String,
    #[serde(skip)]
    touched: BTreeSet<Field>,
}

impl BookingDraft {
    /// Empty draft for the signed-in patient.
    pub fn for_patient(patient_id: i64) -> Self {
        Self {
            appointment_type: None,
            doctor_id: None,
            patient_id: Some(patient_id),
            appointment_date: None,
            appointment_time: None,
            reason: String::new(),
            notes: String::new(),
            touched: BTreeSet::new(),
        }
    }

    pub fn patient_id(&self) -> Option<i64> {
        self.patient_id
    }

    pub fn set_type(&mut self, t: AppointmentType) {
        self.appointment_type = Some(t);
        self.touch(Field::Type);
    }

    pub fn set_doctor(&mut self, doctor_id: i64) {
        self.doctor_id = Some(doctor_id);
        self.touch(Field::DoctorId);
    }

    pub fn set_schedule(&mut self, date: Option<NaiveDate>, time: Option<String>) {
        self.appointment_date = date;
        self.appointment_time = time.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        self.touch(Field::AppointmentDate);
        self.touch(Field::AppointmentTime);
    }

    pub fn set_reason_notes(&mut self, reason: String, notes: Option<String>) {
        self.reason = reason;
        self.notes = notes.unwrap_or_default();
        self.touch(Field::Reason);
        self.touch(Field::Notes);
    }

    pub fn touch(&mut self, field: Field) {
        self.touched.insert(field);
    }

    pub fn touch_all(&mut self) {
        self.touched.extend(Field::ALL);
    }

    pub fn is_touched(&self, field: Field) -> bool {
        self.touched.contains(&field)
    }

    /// Reason with surrounding whitespace removed; what gets sent.
    pub fn trimmed_reason(&self) -> &str {
        self.reason.trim()
    }

    pub fn validate_field(&self, field: Field, today: NaiveDate) -> Option<String> {
        match field {
            Field::Type => self
                .appointment_type
                .is_none()
                .then(|| "appointment type is required".to_string()),
            Field::DoctorId => self.doctor_id.is_none().then(|| "doctor is required".to_string()),
            Field::PatientId => self.patient_id.is_none().then(|| "patient is required".to_string()),
            Field::AppointmentDate => match self.appointment_date {
                None => Some("date is required".into()),
                Some(d) if d < today => Some("date cannot be in the past".into()),
                Some(_) => None,
            },
            Field::AppointmentTime => match self.appointment_time.as_deref() {
                None => Some("time is required".into()),
                Some(t) if !slots::is_offered(t) => Some("time must be one of the offered slots".into()),
                Some(_) => None,
            },
            Field::Reason => {
                let reason = self.trimmed_reason();
                if reason.is_empty() {
                    Some("reason is required".into())
                } else if reason.chars().count() > MAX_TEXT_LEN {
                    Some(format!("reason cannot exceed {MAX_TEXT_LEN} characters"))
                } else {
                    None
                }
            }
            Field::Notes => (self.notes.chars().count() > MAX_TEXT_LEN)
                .then(|| format!("notes cannot exceed {MAX_TEXT_LEN} characters")),
        }
    }

    /// Every rule, regardless of what the user has touched.
    pub fn validate(&self, today: NaiveDate) -> FieldErrors {
        Field::ALL
            .into_iter()
            .filter_map(|f| self.validate_field(f, today).map(|msg| (f, msg)))
            .collect()
    }

    /// Errors the UI should display: only for touched fields.
    pub fn visible_errors(&self, today: NaiveDate) -> FieldErrors {
        self.validate(today)
            .into_iter()
            .filter(|(f, _)| self.is_touched(*f))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 20).unwrap()
    }

    fn complete() -> BookingDraft {
        let mut d = BookingDraft::for_patient(21);
        d.set_type(AppointmentType::Presencial);
        d.set_doctor(7);
        d.set_schedule(today().succ_opt(), Some("10:00 AM".into()));
        d.set_reason_notes("Chequeo".into(), None);
        d
    }

    #[test]
    fn complete_draft_has_no_errors() {
        assert!(complete().validate(today()).is_empty());
    }

    #[test]
    fn empty_draft_reports_every_required_field() {
        let errors = BookingDraft::for_patient(21).validate(today());
        let fields: Vec<Field> = errors.keys().copied().collect();
        assert_eq!(
            fields,
            vec![
                Field::Type,
                Field::DoctorId,
                Field::AppointmentDate,
                Field::AppointmentTime,
                Field::Reason
            ]
        );
    }

    #[test]
    fn past_date_rejected_even_when_everything_else_is_valid() {
        let mut d = complete();
        d.appointment_date = today().pred_opt();
        let errors = d.validate(today());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[&Field::AppointmentDate], "date cannot be in the past");

        d.appointment_date = Some(today());
        assert!(d.validate(today()).is_empty());
    }

    #[test]
    fn reason_is_trimmed_and_bounded() {
        let mut d = complete();
        d.set_reason_notes("   ".into(), None);
        assert_eq!(d.validate(today())[&Field::Reason], "reason is required");

        d.set_reason_notes(format!("  {}  ", "a".repeat(MAX_TEXT_LEN)), None);
        assert!(d.validate(today()).is_empty());

        d.set_reason_notes("a".repeat(MAX_TEXT_LEN + 1), None);
        assert!(d.validate(today()).contains_key(&Field::Reason));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let mut d = complete();
        d.set_reason_notes("Chequeo".into(), Some("ñ".repeat(MAX_TEXT_LEN)));
        assert!(d.validate(today()).is_empty());

        d.set_reason_notes("Chequeo".into(), Some("ñ".repeat(MAX_TEXT_LEN + 1)));
        assert!(d.validate(today()).contains_key(&Field::Notes));
    }

    #[test]
    fn time_outside_offered_slots_is_invalid() {
        let mut d = complete();
        d.set_schedule(today().succ_opt(), Some("10:15 AM".into()));
        assert!(d.validate(today()).contains_key(&Field::AppointmentTime));

        d.set_schedule(today().succ_opt(), Some("   ".into()));
        assert_eq!(d.validate(today())[&Field::AppointmentTime], "time is required");
    }

    #[test]
    fn only_touched_errors_are_visible() {
        let mut d = BookingDraft::for_patient(21);
        assert!(d.visible_errors(today()).is_empty());

        d.touch(Field::Reason);
        assert_eq!(d.visible_errors(today()).len(), 1);

        d.touch_all();
        assert_eq!(d.visible_errors(today()), d.validate(today()));
    }
}
