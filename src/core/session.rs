//! Monitoring session: position source -> geofence evaluator -> notifier.
//!
//! One session owns one background task. The task is the single consumer of
//! the position subscription, so samples are evaluated strictly one at a
//! time in arrival order; the arm-state table is never touched by two
//! samples at once. Collaborators are constructor-injected, which keeps
//! multiple independent sessions possible (and tests cheap).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::alarms::evaluator::{FireEvent, GeofenceEvaluator};
use super::alarms::model::{AlarmDefinition, AlarmId};
use super::alarms::store::AlarmStore;
use super::model::{PermissionStatus, PositionSample};
use super::notify::Notifier;
use super::position::{PositionError, PositionSource, PositionSubscription, SubscribeOptions};

pub const NOTIFICATION_TITLE: &str = "GeoClock Alarm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Active,
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Unmet precondition, not a fatal error: the caller may retry start
    /// after the user grants the missing permission.
    #[error("required permission denied (position: {position:?}, notifications: {notifications:?})")]
    PermissionDenied {
        position: PermissionStatus,
        notifications: PermissionStatus,
    },
    #[error("monitoring is already running")]
    AlreadyActive,
    #[error(transparent)]
    Position(#[from] PositionError),
}

enum SessionCommand {
    ResetArm(AlarmId),
    Stop,
}

/// Orchestrates position source, evaluator, store and notifier with a
/// start/stop lifecycle.
pub struct MonitorSession {
    store: Arc<dyn AlarmStore>,
    positions: Arc<dyn PositionSource>,
    notifier: Arc<dyn Notifier>,
    state: Arc<Mutex<SessionState>>,
    command_tx: Mutex<Option<mpsc::Sender<SessionCommand>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorSession {
    pub fn new(
        store: Arc<dyn AlarmStore>,
        positions: Arc<dyn PositionSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            positions,
            notifier,
            state: Arc::new(Mutex::new(SessionState::Stopped)),
            command_tx: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Start monitoring.
    ///
    /// Checks position and notification permissions, subscribes to position
    /// updates, and spawns the sample loop with all arm state reset. On any
    /// permission denial the session stays `Stopped` and the denial is
    /// reported for the caller to surface.
    pub async fn start(&self, options: SubscribeOptions) -> Result<(), SessionError> {
        {
            let mut state = self.state.lock().unwrap();
            if *state != SessionState::Stopped {
                return Err(SessionError::AlreadyActive);
            }
            *state = SessionState::Starting;
        }

        let position = self.positions.request_permission().await;
        let notifications = self.notifier.request_permission().await;
        if !position.is_granted() || !notifications.is_granted() {
            *self.state.lock().unwrap() = SessionState::Stopped;
            warn!("monitoring not started: permission denied");
            return Err(SessionError::PermissionDenied {
                position,
                notifications,
            });
        }

        let subscription = match self.positions.subscribe(options).await {
            Ok(subscription) => subscription,
            Err(e) => {
                *self.state.lock().unwrap() = SessionState::Stopped;
                return Err(e.into());
            }
        };

        let (tx, rx) = mpsc::channel(32);
        *self.command_tx.lock().unwrap() = Some(tx);

        let worker = SessionWorker {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            state: Arc::clone(&self.state),
            evaluator: GeofenceEvaluator::new(),
        };
        *self.task.lock().unwrap() = Some(tokio::spawn(worker.run(subscription, rx)));

        *self.state.lock().unwrap() = SessionState::Active;
        info!("geofence monitoring started");
        Ok(())
    }

    /// Stop monitoring promptly.
    ///
    /// An in-flight sample may finish evaluating, but no new sample is
    /// accepted afterwards. The position subscription is released and all
    /// arm state discarded. Notifications already dispatched are not
    /// retracted.
    pub async fn stop(&self) {
        let tx = self.command_tx.lock().unwrap().take();
        let Some(tx) = tx else {
            return;
        };
        let _ = tx.send(SessionCommand::Stop).await;

        let task = self.task.lock().unwrap().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!("geofence monitoring stopped");
    }

    /// Re-arm one alarm, e.g. after the user re-enables it in the UI.
    ///
    /// Idempotent; a no-op when the alarm has no arm-state entry or the
    /// session is stopped.
    pub fn reset_arm_state(&self, id: &str) {
        if let Some(tx) = self.command_tx.lock().unwrap().as_ref() {
            let _ = tx.try_send(SessionCommand::ResetArm(id.to_string()));
        }
    }
}

/// The background half of a session: owns the evaluator for its lifetime.
struct SessionWorker {
    store: Arc<dyn AlarmStore>,
    notifier: Arc<dyn Notifier>,
    state: Arc<Mutex<SessionState>>,
    evaluator: GeofenceEvaluator,
}

impl SessionWorker {
    async fn run(
        mut self,
        mut samples: PositionSubscription,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) {
        let mut stream_open = true;
        loop {
            tokio::select! {
                // Commands first, so a pending stop wins over a pending sample.
                biased;
                command = commands.recv() => match command {
                    Some(SessionCommand::ResetArm(id)) => {
                        debug!("re-arming alarm {id}");
                        self.evaluator.reset(&id);
                    }
                    Some(SessionCommand::Stop) | None => break,
                },
                sample = samples.next_sample(), if stream_open => match sample {
                    Some(sample) => self.handle_sample(sample).await,
                    None => {
                        // Source shut down on its own. Position loss is not
                        // fatal; hold state until an explicit stop.
                        warn!("position stream ended while session active");
                        stream_open = false;
                    }
                },
            }
        }
        // Arm state dies with the worker; it is never persisted.
        self.evaluator.clear();
        *self.state.lock().unwrap() = SessionState::Stopped;
    }

    async fn handle_sample(&mut self, sample: PositionSample) {
        // Re-read per sample so UI additions/edits/deletes are picked up at
        // the next fix; deliberately no caching.
        let alarms = match self.store.list() {
            Ok(alarms) => alarms,
            Err(e) => {
                warn!("alarm store unavailable, skipping sample: {e}");
                return;
            }
        };

        let live: HashSet<AlarmId> = alarms.iter().map(|a| a.id.clone()).collect();
        self.evaluator.prune(&live);

        let events = self.evaluator.evaluate(&sample, &alarms);
        debug!(
            "sample at ({:.5}, {:.5}): {} of {} alarms fired",
            sample.coordinate.latitude,
            sample.coordinate.longitude,
            events.len(),
            alarms.len()
        );

        for event in events {
            let Some(alarm) = alarms.iter().find(|a| a.id == event.alarm_id) else {
                continue;
            };
            self.deliver(alarm, &event).await;
            if alarm.disable_after_trigger {
                self.disable_fired(alarm);
            }
        }
    }

    async fn deliver(&self, alarm: &AlarmDefinition, event: &FireEvent) {
        let body = match &alarm.address {
            Some(address) => format!("{} - you've arrived at {address}", alarm.name),
            None => format!(
                "You've arrived at {}! ({:.0}m away)",
                alarm.name, event.distance_meters
            ),
        };
        info!("alarm fired: {} ({:.0}m away)", alarm.name, event.distance_meters);

        if let Err(e) = self.notifier.notify(NOTIFICATION_TITLE, &body).await {
            // The alarm stays disarmed: a failed delivery must not turn
            // into a re-notification storm on every following sample.
            warn!("notification for {} failed: {e}", alarm.name);
        }
    }

    fn disable_fired(&mut self, alarm: &AlarmDefinition) {
        let mut updated = alarm.clone();
        updated.enabled = false;
        match self.store.put(updated) {
            Ok(_) => {
                self.evaluator.remove(&alarm.id);
                info!("one-shot alarm {} disabled after firing", alarm.name);
            }
            Err(e) => warn!("failed to disable one-shot alarm {}: {e}", alarm.name),
        }
    }
}
