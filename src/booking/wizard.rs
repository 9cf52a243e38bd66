// src/booking/wizard.rs
//
// The five-step booking wizard: which step is mounted, what each step may
// change, when "continue" is allowed, and the confirmation sub-states.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::booking::draft::{BookingDraft, FieldErrors};
use crate::booking::slots::{self, TIME_SLOTS};
use crate::booking::steps::StepController;
use crate::booking::submission;
use crate::error::ApiError;
use crate::models::{filter_by_specialty, Appointment, AppointmentType, CreateAppointmentRequest, Doctor};

pub const TOTAL_STEPS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    TypeSelection,
    DoctorSelection,
    DateTime,
    ReasonNotes,
    Confirmation,
}

impl Step {
    pub fn from_index(i: usize) -> Option<Step> {
        match i {
            1 => Some(Step::TypeSelection),
            2 => Some(Step::DoctorSelection),
            3 => Some(Step::DateTime),
            4 => Some(Step::ReasonNotes),
            5 => Some(Step::Confirmation),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Step::TypeSelection => 1,
            Step::DoctorSelection => 2,
            Step::DateTime => 3,
            Step::ReasonNotes => 4,
            Step::Confirmation => 5,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::TypeSelection => "Appointment type",
            Step::DoctorSelection => "Choose a doctor",
            Step::DateTime => "Date and time",
            Step::ReasonNotes => "Reason and notes",
            Step::Confirmation => "Confirmation",
        }
    }
}

#[derive(Debug, Clone)]
pub enum DirectoryState {
    NotLoaded,
    Loaded(Vec<Doctor>),
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum SubmissionState {
    Idle,
    InFlight,
    Succeeded(Appointment),
    Failed(String),
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("complete the {} step before continuing", .0.title())]
    StepIncomplete(Step),
    #[error("this change belongs to the {} step", .0.title())]
    WrongStep(Step),
    #[error("the doctor directory has not been loaded")]
    DirectoryUnavailable,
    #[error("doctor {0} is not in the directory")]
    UnknownDoctor(i64),
    #[error("{0} is not an offered time slot")]
    InvalidTime(String),
    #[error("the appointment is already booked")]
    Completed,
    #[error("a submission is already in progress")]
    InFlight,
    #[error("confirm the appointment to submit it")]
    NotAcknowledged,
    #[error("some booking fields are missing or invalid")]
    Invalid(FieldErrors),
}

impl From<WizardError> for ApiError {
    fn from(err: WizardError) -> Self {
        let msg = err.to_string();
        match err {
            WizardError::StepIncomplete(_) => ApiError::BadRequest("STEP_INCOMPLETE", msg),
            WizardError::WrongStep(_) => ApiError::Conflict("STEP_NOT_ACTIVE", msg),
            WizardError::DirectoryUnavailable => ApiError::Conflict("DIRECTORY_UNAVAILABLE", msg),
            WizardError::UnknownDoctor(_) => ApiError::BadRequest("UNKNOWN_DOCTOR", msg),
            WizardError::InvalidTime(_) => ApiError::BadRequest("VALIDATION_ERROR", msg),
            WizardError::Completed => ApiError::Conflict("BOOKING_COMPLETED", msg),
            WizardError::InFlight => ApiError::Conflict("SUBMISSION_IN_FLIGHT", msg),
            WizardError::NotAcknowledged => ApiError::BadRequest("CONFIRMATION_REQUIRED", msg),
            WizardError::Invalid(fields) => ApiError::Validation(fields),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Wizard {
    id: Uuid,
    owner: String,
    draft: BookingDraft,
    steps: StepController,
    directory: DirectoryState,
    selected_doctor: Option<Doctor>,
    submission: SubmissionState,
    last_seen_at: DateTime<Utc>,
}

impl Wizard {
    pub fn new(id: Uuid, owner: String, patient_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner,
            draft: BookingDraft::for_patient(patient_id),
            steps: StepController::new(TOTAL_STEPS),
            directory: DirectoryState::NotLoaded,
            selected_doctor: None,
            submission: SubmissionState::Idle,
            last_seen_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn submission(&self) -> &SubmissionState {
        &self.submission
    }

    pub fn last_seen_at(&self) -> DateTime<Utc> {
        self.last_seen_at
    }

    pub fn seen(&mut self, now: DateTime<Utc>) {
        self.last_seen_at = now;
    }

    pub fn current_step(&self) -> Step {
        Step::from_index(self.steps.current()).unwrap_or(Step::TypeSelection)
    }

    /// The doctor step fetches the directory on entry, and again after a failure.
    pub fn needs_directory(&self) -> bool {
        self.current_step() == Step::DoctorSelection
            && !matches!(self.directory, DirectoryState::Loaded(_))
    }

    fn step_ready(&self, step: Step) -> bool {
        let d = &self.draft;
        match step {
            Step::TypeSelection => d.appointment_type.is_some(),
            Step::DoctorSelection => d.doctor_id.is_some(),
            Step::DateTime => d.appointment_date.is_some() && d.appointment_time.is_some(),
            Step::ReasonNotes => !d.trimmed_reason().is_empty(),
            Step::Confirmation => false,
        }
    }

    /// Whether the mounted step's "continue" is enabled.
    pub fn can_continue(&self) -> bool {
        self.is_editable() && self.step_ready(self.current_step())
    }

    pub fn is_editable(&self) -> bool {
        matches!(self.submission, SubmissionState::Idle | SubmissionState::Failed(_))
    }

    fn ensure_editable(&self) -> Result<(), WizardError> {
        match self.submission {
            SubmissionState::Succeeded(_) => Err(WizardError::Completed),
            SubmissionState::InFlight => Err(WizardError::InFlight),
            _ => Ok(()),
        }
    }

    fn ensure_on(&self, step: Step) -> Result<(), WizardError> {
        self.ensure_editable()?;
        if self.current_step() != step {
            return Err(WizardError::WrongStep(step));
        }
        Ok(())
    }

    /* -------------------------
       Navigation
    --------------------------*/

    pub fn advance(&mut self) -> Result<Step, WizardError> {
        self.ensure_editable()?;
        let current = self.current_step();
        if !self.step_ready(current) {
            return Err(WizardError::StepIncomplete(current));
        }
        self.steps.advance();
        Ok(self.current_step())
    }

    /// Back one step. Nothing already entered is cleared.
    pub fn retreat(&mut self) -> Result<Step, WizardError> {
        self.ensure_editable()?;
        self.steps.retreat();
        Ok(self.current_step())
    }

    /// Jump to `index`. Out-of-range targets are ignored; forward jumps need
    /// every earlier step to be complete.
    pub fn go_to(&mut self, index: usize) -> Result<Step, WizardError> {
        self.ensure_editable()?;
        let Some(target) = Step::from_index(index) else {
            return Ok(self.current_step());
        };
        if let Some(blocking) = (1..index)
            .filter_map(Step::from_index)
            .find(|s| !self.step_ready(*s))
        {
            return Err(WizardError::StepIncomplete(blocking));
        }
        self.steps.go_to(target.index());
        Ok(self.current_step())
    }

    /* -------------------------
       Step 1: type
    --------------------------*/

    pub fn select_type(&mut self, t: AppointmentType) -> Result<(), WizardError> {
        self.ensure_on(Step::TypeSelection)?;
        self.draft.set_type(t);
        Ok(())
    }

    /* -------------------------
       Step 2: doctor
    --------------------------*/

    pub fn set_directory(&mut self, result: Result<Vec<Doctor>, String>) {
        self.directory = match result {
            Ok(doctors) => DirectoryState::Loaded(doctors),
            Err(msg) => DirectoryState::Failed(msg),
        };
    }

    pub fn select_doctor(&mut self, doctor_id: i64) -> Result<(), WizardError> {
        self.ensure_on(Step::DoctorSelection)?;
        let DirectoryState::Loaded(doctors) = &self.directory else {
            return Err(WizardError::DirectoryUnavailable);
        };
        let doctor = doctors
            .iter()
            .find(|d| d.id == doctor_id)
            .cloned()
            .ok_or(WizardError::UnknownDoctor(doctor_id))?;
        self.draft.set_doctor(doctor.id);
        self.selected_doctor = Some(doctor);
        Ok(())
    }

    pub fn directory_view(&self, specialty: Option<&str>) -> DirectoryView {
        let selected_id = self.draft.doctor_id;
        match &self.directory {
            DirectoryState::NotLoaded => DirectoryView {
                status: DirectoryStatus::NotLoaded,
                message: None,
                doctors: Vec::new(),
                selected_id,
            },
            DirectoryState::Failed(msg) => DirectoryView {
                status: DirectoryStatus::Failed,
                message: Some(msg.clone()),
                doctors: Vec::new(),
                selected_id,
            },
            DirectoryState::Loaded(all) if all.is_empty() => DirectoryView {
                status: DirectoryStatus::Empty,
                message: Some("No doctors are registered yet.".into()),
                doctors: Vec::new(),
                selected_id,
            },
            DirectoryState::Loaded(all) => {
                let doctors = filter_by_specialty(all, specialty);
                if doctors.is_empty() {
                    DirectoryView {
                        status: DirectoryStatus::NoMatches,
                        message: Some("No doctors match that specialty.".into()),
                        doctors,
                        selected_id,
                    }
                } else {
                    DirectoryView {
                        status: DirectoryStatus::Loaded,
                        message: None,
                        doctors,
                        selected_id,
                    }
                }
            }
        }
    }

    /* -------------------------
       Step 3: date & time
    --------------------------*/

    pub fn set_schedule(&mut self, date: Option<NaiveDate>, time: Option<String>) -> Result<(), WizardError> {
        self.ensure_on(Step::DateTime)?;
        if let Some(t) = time.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            if !slots::is_offered(t) {
                return Err(WizardError::InvalidTime(t.to_string()));
            }
        }
        self.draft.set_schedule(date, time);
        Ok(())
    }

    /* -------------------------
       Step 4: reason & notes
    --------------------------*/

    pub fn set_reason(&mut self, reason: String, notes: Option<String>) -> Result<(), WizardError> {
        self.ensure_on(Step::ReasonNotes)?;
        self.draft.set_reason_notes(reason, notes);
        Ok(())
    }

    /* -------------------------
       Step 5: confirmation
    --------------------------*/

    /// Validate, check the "are you sure" acknowledgement, and mark the
    /// submission in flight. The caller sends the returned request.
    pub fn begin_submission(
        &mut self,
        acknowledged: bool,
        today: NaiveDate,
    ) -> Result<CreateAppointmentRequest, WizardError> {
        self.ensure_on(Step::Confirmation)?;
        let req = submission::prepare(&mut self.draft, today).map_err(WizardError::Invalid)?;
        if !acknowledged {
            return Err(WizardError::NotAcknowledged);
        }
        self.submission = SubmissionState::InFlight;
        Ok(req)
    }

    pub fn finish_submission(&mut self, outcome: Result<Appointment, String>) {
        self.submission = match outcome {
            Ok(created) => SubmissionState::Succeeded(created),
            Err(msg) => SubmissionState::Failed(msg),
        };
    }

    /* -------------------------
       View
    --------------------------*/

    pub fn view(&self, today: NaiveDate) -> WizardView {
        let step = self.current_step();
        let d = &self.draft;

        let summary = (step == Step::Confirmation).then(|| Summary {
            appointment_type: d.appointment_type.map(AppointmentType::label),
            doctor: self.selected_doctor.as_ref().map(Doctor::display_name),
            date: d.appointment_date,
            date_label: d.appointment_date.map(|x| x.format("%A, %-d %B %Y").to_string()),
            time: d.appointment_time.clone(),
            reason: d.trimmed_reason().to_string(),
            notes: (!d.notes.trim().is_empty()).then(|| d.notes.clone()),
        });

        WizardView {
            wizard_id: self.id,
            step: StepView {
                current: step.index(),
                total: self.steps.total(),
                name: step,
                title: step.title(),
            },
            can_continue: self.can_continue(),
            can_go_back: self.is_editable() && !self.steps.is_first(),
            draft: d.clone(),
            errors: d.visible_errors(today),
            selected_doctor: self.selected_doctor.clone(),
            time_slots: (step == Step::DateTime).then(|| TIME_SLOTS.to_vec()),
            summary,
            submission: SubmissionView::from(&self.submission),
        }
    }
}

/* -------------------------
   View DTOs
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryStatus {
    NotLoaded,
    Loaded,
    Empty,
    NoMatches,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct DirectoryView {
    pub status: DirectoryStatus,
    pub message: Option<String>,
    pub doctors: Vec<Doctor>,
    pub selected_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct StepView {
    pub current: usize,
    pub total: usize,
    pub name: Step,
    pub title: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub appointment_type: Option<&'static str>,
    pub doctor: Option<String>,
    pub date: Option<NaiveDate>,
    pub date_label: Option<String>,
    pub time: Option<String>,
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionView {
    Idle,
    InFlight,
    Succeeded {
        appointment: Appointment,
        /// Booked time in display form, e.g. `"10:30 AM"`.
        time_label: Option<String>,
        message: &'static str,
    },
    Failed { error: String },
}

impl From<&SubmissionState> for SubmissionView {
    fn from(s: &SubmissionState) -> Self {
        match s {
            SubmissionState::Idle => SubmissionView::Idle,
            SubmissionState::InFlight => SubmissionView::InFlight,
            SubmissionState::Succeeded(a) => SubmissionView::Succeeded {
                appointment: a.clone(),
                time_label: a
                    .appointment_time
                    .as_deref()
                    .and_then(|t| slots::to_12_hour(t.get(..5)?)),
                message: "Your appointment has been booked. See your dashboard for details.",
            },
            SubmissionState::Failed(e) => SubmissionView::Failed { error: e.clone() },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WizardView {
    pub wizard_id: Uuid,
    pub step: StepView,
    pub can_continue: bool,
    pub can_go_back: bool,
    pub draft: BookingDraft,
    pub errors: FieldErrors,
    pub selected_doctor: Option<Doctor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_slots: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    pub submission: SubmissionView,
}
