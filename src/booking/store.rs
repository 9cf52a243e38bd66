use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::booking::wizard::{SubmissionState, Wizard, WizardError};

/// Longest an in-flight wizard is kept past its idle TTL.
const IN_FLIGHT_GRACE_MINUTES: i64 = 10;

/// Live wizards, keyed by id. Each belongs to the session that created it.
#[derive(Clone)]
pub struct WizardStore {
    inner: Arc<Mutex<HashMap<Uuid, Wizard>>>,
    ttl: Duration,
}

impl WizardStore {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::minutes(ttl_minutes.max(1)),
        }
    }

    fn expired(&self, w: &Wizard, now: DateTime<Utc>) -> bool {
        let limit = match w.submission() {
            SubmissionState::InFlight => self.ttl.max(Duration::minutes(IN_FLIGHT_GRACE_MINUTES)),
            _ => self.ttl,
        };
        now - w.last_seen_at() > limit
    }

    /// Start a fresh wizard and run `view` on it. Idle wizards are swept first.
    pub async fn create<R>(
        &self,
        owner: &str,
        patient_id: i64,
        now: DateTime<Utc>,
        view: impl FnOnce(&Wizard) -> R,
    ) -> R {
        let mut map = self.inner.lock().await;

        let before = map.len();
        map.retain(|_, w| !self.expired(w, now));
        let swept = before - map.len();
        if swept > 0 {
            tracing::debug!(swept, "expired booking wizards removed");
        }

        let id = Uuid::new_v4();
        let wizard = map
            .entry(id)
            .or_insert_with(|| Wizard::new(id, owner.to_string(), patient_id, now));
        tracing::info!(wizard_id = %id, patient_id, "booking wizard started");
        view(wizard)
    }

    /// Run `op` on the caller's wizard under the store lock.
    /// `None` when the wizard is unknown, expired, or owned by another session.
    pub async fn with_wizard<R>(
        &self,
        owner: &str,
        id: Uuid,
        now: DateTime<Utc>,
        op: impl FnOnce(&mut Wizard) -> R,
    ) -> Option<R> {
        let mut map = self.inner.lock().await;

        let expired = match map.get(&id) {
            Some(w) if w.owner() != owner => return None,
            Some(w) => self.expired(w, now),
            None => return None,
        };
        if expired {
            map.remove(&id);
            return None;
        }

        let wizard = map.get_mut(&id)?;
        wizard.seen(now);
        Some(op(wizard))
    }

    /// Drop the caller's wizard. `None` when it is not theirs or unknown.
    /// A wizard whose submission is on the wire stays put.
    pub async fn remove(&self, owner: &str, id: Uuid) -> Option<Result<(), WizardError>> {
        let mut map = self.inner.lock().await;
        match map.get(&id) {
            Some(w) if w.owner() == owner => {
                if matches!(w.submission(), SubmissionState::InFlight) {
                    return Some(Err(WizardError::InFlight));
                }
                map.remove(&id);
                Some(Ok(()))
            }
            _ => None,
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::wizard::Step;
    use crate::models::AppointmentType;

    #[tokio::test]
    async fn wizard_is_private_to_its_owner() {
        let store = WizardStore::new(60);
        let now = Utc::now();
        let id = store.create("alice", 21, now, |w| w.id()).await;

        assert!(store.with_wizard("bob", id, now, |_| ()).await.is_none());
        assert!(store.remove("bob", id).await.is_none());

        let patient = store.with_wizard("alice", id, now, |w| w.draft().patient_id()).await;
        assert_eq!(patient, Some(Some(21)));
        assert!(matches!(store.remove("alice", id).await, Some(Ok(()))));
        assert!(store.with_wizard("alice", id, now, |_| ()).await.is_none());
    }

    #[tokio::test]
    async fn idle_wizards_expire() {
        let store = WizardStore::new(30);
        let start = Utc::now();
        let old = store.create("alice", 21, start, |w| w.id()).await;

        let later = start + Duration::minutes(31);
        assert!(store.with_wizard("alice", old, later, |_| ()).await.is_none());

        store.create("alice", 21, start, |w| w.id()).await;
        store.create("alice", 21, later + Duration::minutes(31), |w| w.id()).await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn activity_keeps_a_wizard_alive() {
        let store = WizardStore::new(30);
        let start = Utc::now();
        let id = store.create("alice", 21, start, |w| w.id()).await;

        let mid = start + Duration::minutes(20);
        store
            .with_wizard("alice", id, mid, |w| w.select_type(AppointmentType::Virtual))
            .await
            .unwrap()
            .unwrap();

        let later = start + Duration::minutes(40);
        let step = store
            .with_wizard("alice", id, later, |w| w.advance())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(step, Step::DoctorSelection);
    }

    fn ready_to_submit(w: &mut Wizard) {
        use chrono::Days;

        let today = Utc::now().date_naive();
        w.select_type(AppointmentType::Presencial).unwrap();
        w.advance().unwrap();
        w.set_directory(Ok(vec![crate::models::Doctor {
            id: 7,
            name: "Luis".into(),
            last_name: "Paz".into(),
            specialty: "Cardiología".into(),
        }]));
        w.select_doctor(7).unwrap();
        w.advance().unwrap();
        w.set_schedule(today.checked_add_days(Days::new(1)), Some("10:00 AM".into()))
            .unwrap();
        w.advance().unwrap();
        w.set_reason("Chequeo".into(), None).unwrap();
        w.advance().unwrap();
        w.begin_submission(true, today).unwrap();
    }

    #[tokio::test]
    async fn in_flight_wizard_cannot_be_discarded() {
        let store = WizardStore::new(30);
        let now = Utc::now();
        let id = store.create("alice", 21, now, |w| w.id()).await;
        store.with_wizard("alice", id, now, ready_to_submit).await.unwrap();

        assert!(matches!(
            store.remove("alice", id).await,
            Some(Err(WizardError::InFlight))
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn stuck_submission_expires_after_grace() {
        let store = WizardStore::new(1);
        let start = Utc::now();
        let id = store.create("alice", 21, start, |w| w.id()).await;
        store.with_wizard("alice", id, start, ready_to_submit).await.unwrap();

        // outlives the idle TTL while the POST is pending
        let soon = start + Duration::minutes(5);
        assert!(store.with_wizard("alice", id, soon, |_| ()).await.is_some());

        let much_later = soon + Duration::days(30);
        assert!(store.with_wizard("alice", id, much_later, |_| ()).await.is_none());
        assert_eq!(store.len().await, 0);
    }
}
