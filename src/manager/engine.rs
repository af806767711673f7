// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared core of one thermostat: session, state, queue and background tasks.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::command::Command;
use crate::error::Error;
use crate::protocol::{
    AdaptiveDelayTable, DeviceHandle, DeviceRef, DeviceResolver, GattConnector, OperationKind,
    Session, resolve_with_retry, uuids,
};
use crate::state::StateStore;
use crate::telemetry::try_decode_status;
use crate::types::ZoneId;

use super::executor::{CommandQueue, run_worker};
use super::health::run_health_monitor;
use super::poller::{PollStatus, run_poller};
use super::{Credentials, DeviceConfig, PollingConfig, TimingConfig};

/// Sleeps for `duration` unless a stop is requested first.
///
/// Returns `true` if the caller should stop.
pub(crate) async fn sleep_or_stop(stop: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *stop.borrow() {
        return true;
    }
    tokio::select! {
        () = sleep(duration) => false,
        _ = stop.changed() => true,
    }
}

/// A spawned background task and its stop signal.
struct TaskSlot {
    name: &'static str,
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

impl TaskSlot {
    fn spawn<F, Fut>(name: &'static str, task: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, stop_rx) = watch::channel(false);
        Self {
            name,
            handle: tokio::spawn(task(stop_rx)),
            stop,
        }
    }

    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Requests a stop and waits up to `grace` before aborting.
    async fn stop(self, grace: Duration) {
        let _ = self.stop.send(true);
        let abort = self.handle.abort_handle();
        match timeout(grace, self.handle).await {
            Ok(Ok(())) => tracing::debug!(task = self.name, "Task stopped"),
            Ok(Err(e)) if e.is_panic() => tracing::error!(task = self.name, "Task panicked"),
            Ok(Err(_)) => tracing::debug!(task = self.name, "Task cancelled"),
            Err(_) => {
                tracing::warn!(task = self.name, "Task did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}

#[derive(Default)]
struct Tasks {
    worker: Option<TaskSlot>,
    health: Option<TaskSlot>,
    poller: Option<TaskSlot>,
}

fn slot_running(slot: Option<&TaskSlot>) -> bool {
    slot.is_some_and(TaskSlot::is_running)
}

/// Everything one thermostat's background tasks share.
pub(crate) struct Engine<C: GattConnector> {
    address: String,
    credentials: Credentials,
    timing: TimingConfig,
    pub(crate) session: tokio::sync::Mutex<Session<C>>,
    pub(crate) store: StateStore,
    pub(crate) queue: CommandQueue,
    resolver: Arc<dyn DeviceResolver>,
    handle: RwLock<Option<DeviceHandle>>,
    pub(crate) poll_status: Mutex<PollStatus>,
    tasks: Mutex<Tasks>,
    shut_down: AtomicBool,
}

impl<C: GattConnector> Engine<C> {
    pub(crate) fn new(
        config: &DeviceConfig,
        connector: Arc<C>,
        delays: Arc<AdaptiveDelayTable>,
        resolver: Arc<dyn DeviceResolver>,
    ) -> Self {
        let session = Session::new(
            connector,
            config.credentials.clone(),
            config.timing.clone(),
            delays,
        );
        Self {
            address: config.address.clone(),
            credentials: config.credentials.clone(),
            timing: config.timing.clone(),
            session: tokio::sync::Mutex::new(session),
            store: StateStore::new(),
            queue: CommandQueue::new(),
            resolver,
            handle: RwLock::new(None),
            poll_status: Mutex::new(PollStatus::default()),
            tasks: Mutex::new(Tasks::default()),
            shut_down: AtomicBool::new(false),
        }
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    // ===== Device reference =====

    pub(crate) fn set_handle(&self, handle: DeviceHandle) {
        *self.handle.write() = Some(handle);
    }

    /// Stored handle, or the bare address.
    pub(crate) fn device_ref(&self) -> DeviceRef {
        self.handle
            .read()
            .clone()
            .map_or_else(|| DeviceRef::AddressOnly(self.address.clone()), DeviceRef::Resolved)
    }

    /// Stored handle, then the resolver, then the bare address.
    pub(crate) async fn resolve_device_ref(&self) -> DeviceRef {
        let stored = self.handle.read().clone();
        if let Some(handle) = stored {
            return DeviceRef::Resolved(handle);
        }
        match resolve_with_retry(self.resolver.as_ref(), &self.address, self.timing.resolve_attempts).await {
            Some(handle) => {
                self.set_handle(handle.clone());
                DeviceRef::Resolved(handle)
            }
            None => DeviceRef::AddressOnly(self.address.clone()),
        }
    }

    // ===== Background tasks =====

    /// Starts the queue worker and health monitor unless they are running.
    pub(crate) fn ensure_background(self: &Arc<Self>) {
        if self.is_shut_down() {
            return;
        }
        let mut tasks = self.tasks.lock();
        if !slot_running(tasks.worker.as_ref()) {
            tracing::debug!(address = %self.address, "Starting command worker");
            let engine = Arc::clone(self);
            tasks.worker = Some(TaskSlot::spawn("worker", move |stop| run_worker(engine, stop)));
        }
        if !slot_running(tasks.health.as_ref()) {
            let engine = Arc::clone(self);
            tasks.health = Some(TaskSlot::spawn("health", move |stop| {
                run_health_monitor(engine, stop)
            }));
        }
    }

    /// Starts the polling loop. Returns `false` if it was not started.
    pub(crate) fn start_polling(self: &Arc<Self>, polling: &PollingConfig) -> bool {
        if self.is_shut_down() {
            return false;
        }
        if !polling.enabled {
            tracing::debug!(address = %self.address, "Polling disabled");
            return false;
        }
        {
            let mut tasks = self.tasks.lock();
            if slot_running(tasks.poller.as_ref()) {
                tracing::debug!(address = %self.address, "Polling already running");
                return false;
            }
            let engine = Arc::clone(self);
            let polling = polling.clone();
            tasks.poller = Some(TaskSlot::spawn("poller", move |stop| {
                run_poller(engine, polling, stop)
            }));
        }
        self.ensure_background();
        true
    }

    pub(crate) fn is_polling(&self) -> bool {
        slot_running(self.tasks.lock().poller.as_ref())
    }

    pub(crate) async fn stop_polling(&self) {
        let slot = self.tasks.lock().poller.take();
        if let Some(slot) = slot {
            slot.stop(self.timing.task_shutdown_grace).await;
            tracing::info!(address = %self.address, "Polling stopped");
        }
    }

    /// Stops every task, fails queued commands and releases the link.
    pub(crate) async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(address = %self.address, "Shutting down");

        let (poller, worker, health) = {
            let mut tasks = self.tasks.lock();
            (tasks.poller.take(), tasks.worker.take(), tasks.health.take())
        };
        for slot in [poller, worker, health].into_iter().flatten() {
            slot.stop(self.timing.task_shutdown_grace).await;
        }

        let drained = self.queue.drain();
        if drained > 0 {
            tracing::debug!(address = %self.address, drained, "Failed queued commands");
        }
        self.session.lock().await.disconnect().await;
        self.poll_status.lock().in_progress = false;
    }

    /// Signals every task to stop without waiting for them.
    ///
    /// Tasks hold the engine alive, so this is what lets a dropped
    /// thermostat wind down.
    pub(crate) fn signal_stop(&self) {
        self.shut_down.store(true, Ordering::Release);
        let tasks = self.tasks.lock();
        for slot in [&tasks.poller, &tasks.worker, &tasks.health].into_iter().flatten() {
            let _ = slot.stop.send(true);
        }
    }

    // ===== Out-of-queue operations =====

    /// Sends the reset command on a fresh connection.
    ///
    /// A link drop carrying status 133 right after the write counts as
    /// success: the device restarts before acknowledging.
    pub(crate) async fn reboot(&self) -> bool {
        let device = self.device_ref();
        let payload = match Command::reboot().encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Could not encode reboot command");
                return false;
            }
        };

        let mut session = self.session.lock().await;
        let rebooted = match reboot_on(&mut session, &device, &payload).await {
            Ok(()) => {
                tracing::info!(address = %self.address, "Reboot command sent");
                true
            }
            Err(Error::Transport(e)) if e.is_reboot_drop() => {
                tracing::info!(address = %self.address, "Device dropped the link while rebooting");
                true
            }
            Err(e) => {
                session.delays().on_failure(&self.address, OperationKind::Write);
                tracing::error!(address = %self.address, error = %e, "Reboot failed");
                false
            }
        };
        session.disconnect().await;
        rebooted
    }

    /// Asks the device which zones it serves, over a dedicated link.
    ///
    /// Falls back to `[0]` when every attempt fails.
    pub(crate) async fn probe_zones(&self) -> Vec<ZoneId> {
        let device = self.resolve_device_ref().await;
        let attempts = self.timing.probe_attempts.max(1);

        let mut session = self.session.lock().await;
        session.disconnect().await;

        for attempt in 1..=attempts {
            match session.probe_status(&device).await {
                Ok(raw) => match try_decode_status(&raw) {
                    Ok(state) => {
                        tracing::info!(
                            address = %self.address,
                            zones = ?state.available_zones,
                            "Detected zones"
                        );
                        return state.available_zones;
                    }
                    Err(e) => {
                        tracing::warn!(address = %self.address, attempt, error = %e, "Unusable probe response");
                    }
                },
                Err(e) => {
                    tracing::debug!(address = %self.address, attempt, attempts, error = %e, "Zone probe failed");
                }
            }
            if attempt < attempts {
                sleep(self.timing.probe_settle).await;
            }
        }

        tracing::warn!(address = %self.address, "Zone probe failed, assuming zone 0 only");
        vec![0]
    }
}

async fn reboot_on<C: GattConnector>(
    session: &mut Session<C>,
    device: &DeviceRef,
    payload: &[u8],
) -> Result<(), Error> {
    session.connect(device).await?;
    session.authenticate(device).await?;
    session
        .wait_adaptive_delay(device.address(), OperationKind::Write)
        .await;
    session.write_once(uuids::COMMAND, payload).await?;
    Ok(())
}
