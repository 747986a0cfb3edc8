use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use pillbox_core::{reminder::NotificationPayload, ReminderId};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    dispatcher::NotificationDispatcher,
    error::{Result, SchedulerError},
    schedule::resolve,
    store::KeyValueStore,
    types::{Frequency, PolicyPatch, ReminderPolicy, ScheduleState},
};

const POLICY_KEY: &str = "policy";
const NEXT_FIRE_KEY: &str = "next_fire_instant";
const LAST_ACK_KEY: &str = "last_acknowledged_instant";
const HISTORY_KEY: &str = "intake_history";

/// Owns what is currently scheduled for one reminder.
///
/// Every public operation runs under a single async mutex, so concurrent
/// calls for the same reminder are serialized and no update to the persisted
/// [`ScheduleState`] is lost. `Tz` is the zone the policy's wall-clock time
/// is interpreted in.
pub struct ReminderCoordinator<Tz: TimeZone> {
    reminder_id: ReminderId,
    payload: NotificationPayload,
    tz: Tz,
    store: Arc<dyn KeyValueStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    guard: Mutex<()>,
}

impl<Tz: TimeZone> ReminderCoordinator<Tz> {
    pub fn new(
        payload: NotificationPayload,
        tz: Tz,
        store: Arc<dyn KeyValueStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            reminder_id: payload.reminder_id.clone(),
            payload,
            tz,
            store,
            dispatcher,
            clock: Arc::new(SystemClock),
            guard: Mutex::new(()),
        }
    }

    /// Replace the time source (tests pin it to a fixed instant).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Cancel everything this reminder has armed, then arm `policy`.
    ///
    /// The policy is resolved before anything is touched: a `MissingField`
    /// or `InvalidField` error returns with no notification cancelled and no
    /// state written. Returns the next fire instant, or `None` when the
    /// policy is disabled.
    pub async fn apply_policy(&self, policy: ReminderPolicy) -> Result<Option<DateTime<Tz>>> {
        let _guard = self.guard.lock().await;
        self.apply_locked(&policy).await
    }

    /// Load the stored policy, apply `patch` to it, and arm the result.
    pub async fn update_policy(&self, patch: &PolicyPatch) -> Result<Option<DateTime<Tz>>> {
        let _guard = self.guard.lock().await;
        let policy = self.load_policy().await?.patched(patch);
        self.apply_locked(&policy).await
    }

    /// Record that the user confirmed an intake now.
    ///
    /// Adds today's local date to the history (once per day), stores the
    /// acknowledgment instant and, for an enabled biweekly policy, re-arms
    /// the next one-shot. Returns `false` when today was already recorded.
    ///
    /// The acknowledgment instant is written before the history, so a failed
    /// write never leaves a recorded day without its parity signal.
    pub async fn acknowledge(&self) -> Result<bool> {
        let _guard = self.guard.lock().await;
        let now = self.clock.now();
        let today = self.local_date(now);

        let mut state = self.load_state().await?;
        let recorded = state.record_intake(today);
        self.write_json(LAST_ACK_KEY, &now).await?;
        if recorded {
            self.write_json(HISTORY_KEY, &state.intake_history).await?;
        }
        info!(reminder_id = %self.reminder_id, %today, recorded, "intake acknowledged");

        let policy = self.load_policy().await?;
        if policy.enabled && policy.frequency == Frequency::Biweekly {
            self.apply_locked(&policy).await?;
        }
        Ok(recorded)
    }

    /// Re-arm a biweekly reminder whose one-shot has already fired or was
    /// never armed. Run whenever the host application regains focus.
    ///
    /// Returns `true` when a reschedule happened.
    pub async fn reconcile_on_resume(&self) -> Result<bool> {
        let _guard = self.guard.lock().await;
        let policy = self.load_policy().await?;
        if !policy.enabled || policy.frequency != Frequency::Biweekly {
            return Ok(false);
        }

        let now = self.clock.now();
        let next_fire: Option<DateTime<Utc>> = self.read_json(NEXT_FIRE_KEY).await?;
        match next_fire {
            Some(at) if at > now => {
                debug!(reminder_id = %self.reminder_id, next_fire = %at, "biweekly slot still armed");
                Ok(false)
            }
            stale => {
                warn!(
                    reminder_id = %self.reminder_id,
                    stale = ?stale,
                    "biweekly slot missing or past, re-arming"
                );
                self.apply_locked(&policy).await?;
                Ok(true)
            }
        }
    }

    /// The next instant the reminder would fire, without changing anything.
    ///
    /// `None` when the policy is disabled; resolver errors propagate.
    pub async fn next_occurrence(&self) -> Result<Option<DateTime<Tz>>> {
        let _guard = self.guard.lock().await;
        let policy = self.load_policy().await?;
        if !policy.enabled {
            return Ok(None);
        }
        let state = self.load_state().await?;
        let now = self.clock.now().with_timezone(&self.tz);
        let plan = resolve(&policy, &now, &state.parity())?;
        Ok(Some(plan.earliest()))
    }

    /// The stored policy, or the disabled default when none is stored.
    pub async fn policy(&self) -> Result<ReminderPolicy> {
        let _guard = self.guard.lock().await;
        self.load_policy().await
    }

    pub async fn state(&self) -> Result<ScheduleState> {
        let _guard = self.guard.lock().await;
        self.load_state().await
    }

    /// Whether an intake was recorded on today's local date.
    pub async fn taken_today(&self) -> Result<bool> {
        let _guard = self.guard.lock().await;
        let today = self.local_date(self.clock.now());
        Ok(self.load_history().await?.contains(&today))
    }

    // --- private helpers ---------------------------------------------------

    /// Body of `apply_policy`; the caller holds `guard`.
    async fn apply_locked(&self, policy: &ReminderPolicy) -> Result<Option<DateTime<Tz>>> {
        let plan = if policy.enabled {
            let state = self.load_state().await?;
            let now = self.clock.now().with_timezone(&self.tz);
            Some(resolve(policy, &now, &state.parity())?)
        } else {
            None
        };

        for slot in self.reminder_id.slots() {
            self.dispatcher.cancel(&slot).await?;
        }

        let Some(plan) = plan else {
            self.write_json(POLICY_KEY, policy).await?;
            info!(reminder_id = %self.reminder_id, "reminder disabled");
            return Ok(None);
        };

        for (slot, firing) in self.reminder_id.slots().iter().zip(plan.firings()) {
            self.dispatcher
                .schedule_at(
                    slot,
                    firing.instant.with_timezone(&Utc),
                    firing.repeat,
                    &self.payload,
                )
                .await?;
        }

        if plan.frequency == Frequency::Biweekly {
            let next_fire = plan.primary.instant.with_timezone(&Utc);
            self.write_json(NEXT_FIRE_KEY, &next_fire).await?;
        }
        self.write_json(POLICY_KEY, policy).await?;

        let earliest = plan.earliest();
        info!(
            reminder_id = %self.reminder_id,
            frequency = %plan.frequency,
            next_fire = %earliest.with_timezone(&Utc),
            "reminder scheduled"
        );
        Ok(Some(earliest))
    }

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    async fn load_policy(&self) -> Result<ReminderPolicy> {
        Ok(self.read_json(POLICY_KEY).await?.unwrap_or_default())
    }

    async fn load_history(&self) -> Result<std::collections::BTreeSet<NaiveDate>> {
        Ok(self.read_json(HISTORY_KEY).await?.unwrap_or_default())
    }

    async fn load_state(&self) -> Result<ScheduleState> {
        Ok(ScheduleState {
            next_fire_instant: self.read_json(NEXT_FIRE_KEY).await?,
            last_acknowledged_instant: self.read_json(LAST_ACK_KEY).await?,
            intake_history: self.load_history().await?,
        })
    }

    /// Read and decode one field. Undecodable bytes are logged and treated
    /// as absent; store failures propagate.
    async fn read_json<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>> {
        let key = self.reminder_id.key(field);
        let Some(bytes) = self.store.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                let err = SchedulerError::Parse(format!("{key}: {e}"));
                warn!(%key, "ignoring stored value: {err}");
                Ok(None)
            }
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, field: &str, value: &T) -> Result<()> {
        let key = self.reminder_id.key(field);
        let bytes = serde_json::to_vec(value)
            .map_err(|e| SchedulerError::Persistence(format!("{key}: {e}")))?;
        self.store.set(&key, &bytes).await
    }
}
