// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command queue and its single worker.
//!
//! Every command goes through one FIFO drained by one task, and the worker
//! holds the session lock for the whole write-then-read sequence. At most
//! one command is therefore in flight against the link at any time.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::time::{sleep, timeout};

use crate::command::Command;
use crate::error::Error;
use crate::protocol::{DeviceRef, GattConnector, Session, uuids};
use crate::telemetry::parse_zone_config;

use super::engine::{Engine, sleep_or_stop};

/// A command waiting for the worker.
pub(crate) struct QueuedCommand {
    command: Command,
    reply: oneshot::Sender<bool>,
}

/// Unbounded FIFO with a count of commands not yet picked up.
pub(crate) struct CommandQueue {
    sender: mpsc::UnboundedSender<QueuedCommand>,
    receiver: Mutex<mpsc::UnboundedReceiver<QueuedCommand>>,
    pending: AtomicUsize,
}

impl CommandQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            pending: AtomicUsize::new(0),
        }
    }

    /// Commands queued but not yet picked up by the worker.
    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn push(&self, queued: QueuedCommand) -> bool {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if let Err(mpsc::error::SendError(queued)) = self.sender.send(queued) {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            let _ = queued.reply.send(false);
            return false;
        }
        true
    }

    fn picked(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// Fails every queued command. Returns how many were drained.
    ///
    /// Skips the drain if the worker still holds the receiver.
    pub(crate) fn drain(&self) -> usize {
        let Ok(mut receiver) = self.receiver.try_lock() else {
            return 0;
        };
        drain_into_false(&mut receiver, self)
    }
}

fn drain_into_false(
    receiver: &mut mpsc::UnboundedReceiver<QueuedCommand>,
    queue: &CommandQueue,
) -> usize {
    let mut drained = 0;
    while let Ok(queued) = receiver.try_recv() {
        queue.picked();
        let _ = queued.reply.send(false);
        drained += 1;
    }
    drained
}

impl<C: GattConnector> Engine<C> {
    /// Queues `command` and waits for its outcome.
    ///
    /// Resolves to `false` on failure, on shutdown, and when no result
    /// arrives within `command_result_timeout`.
    pub(crate) async fn submit(self: &Arc<Self>, command: Command) -> bool {
        let kind = command.kind();
        if self.is_shut_down() {
            tracing::warn!(
                address = %self.address(),
                kind = %kind,
                error = %Error::ShutDown,
                "Command rejected"
            );
            return false;
        }
        self.ensure_background();

        let (reply, result) = oneshot::channel();
        if !self.queue.push(QueuedCommand { command, reply }) {
            return false;
        }
        tracing::debug!(
            address = %self.address(),
            kind = %kind,
            pending = self.queue.pending(),
            "Command queued"
        );

        let budget = self.timing().command_result_timeout;
        match timeout(budget, result).await {
            Ok(Ok(ok)) => ok,
            Ok(Err(_)) => {
                tracing::warn!(address = %self.address(), kind = %kind, "Command dropped before completing");
                false
            }
            Err(_) => {
                tracing::warn!(
                    address = %self.address(),
                    kind = %kind,
                    error = %Error::Timeout(budget),
                    "No command result"
                );
                false
            }
        }
    }

    /// Runs one command under the session lock.
    ///
    /// Any failure releases the link so the next command starts clean.
    pub(crate) async fn execute(&self, command: &Command) -> Result<(), Error> {
        let payload = command.encode()?;
        let device = self.device_ref();

        let mut session = self.session.lock().await;
        let result = self
            .execute_locked(&mut session, &device, command, &payload)
            .await;
        match &result {
            Ok(()) => session.touch(),
            Err(e) => {
                tracing::warn!(
                    address = %self.address(),
                    kind = %command.kind(),
                    zone = ?command.zone(),
                    error = %e,
                    "Command failed"
                );
                session.disconnect().await;
            }
        }
        result
    }

    async fn execute_locked(
        &self,
        session: &mut Session<C>,
        device: &DeviceRef,
        command: &Command,
        payload: &[u8],
    ) -> Result<(), Error> {
        session.ensure_ready(device).await?;
        session
            .write_with_retry(device, uuids::COMMAND, payload)
            .await?;
        tracing::debug!(
            address = %self.address(),
            kind = %command.kind(),
            zone = ?command.zone(),
            "Command written"
        );

        sleep(self.timing().command_settle).await;
        let response = session.read_with_retry(device, uuids::RESPONSE).await?;
        self.apply_response(command, &response)
    }

    fn apply_response(&self, command: &Command, response: &[u8]) -> Result<(), Error> {
        match command {
            Command::GetConfig { zone } => {
                let config = parse_zone_config(response)?;
                self.store.store_zone_config(*zone, config);
            }
            Command::GetStatus(_) => {
                self.store.apply_status(response)?;
            }
            // The write already landed; a garbled follow-up read only means
            // the state refresh waits for the next poll.
            Command::Change { .. } => {
                if let Err(e) = self.store.apply_status(response) {
                    tracing::debug!(address = %self.address(), error = %e, "No status after change");
                }
            }
        }
        Ok(())
    }
}

/// Drains the queue until stopped.
///
/// Each command runs in its own task so a panic inside one resolves that
/// command to `false` instead of killing the worker.
pub(crate) async fn run_worker<C: GattConnector>(engine: Arc<Engine<C>>, mut stop: watch::Receiver<bool>) {
    let timing = engine.timing().clone();
    let mut receiver = engine.queue.receiver.lock().await;

    loop {
        if *stop.borrow() {
            break;
        }
        let next = tokio::select! {
            _ = stop.changed() => break,
            next = timeout(timing.queue_idle_wait, receiver.recv()) => next,
        };

        let queued = match next {
            Ok(Some(queued)) => queued,
            Ok(None) => break,
            Err(_) => {
                let mut session = engine.session.lock().await;
                if session.is_connected() && session.idle_for() > timing.idle_timeout {
                    tracing::debug!(address = %engine.address(), "Queue idle, releasing connection");
                    session.disconnect().await;
                }
                continue;
            }
        };
        engine.queue.picked();

        let QueuedCommand { command, reply } = queued;
        let kind = command.kind();
        let task_engine = Arc::clone(&engine);
        let outcome = tokio::spawn(async move { task_engine.execute(&command).await }).await;

        let ok = match outcome {
            Ok(Ok(())) => true,
            Ok(Err(_)) => false,
            Err(e) => {
                tracing::error!(address = %engine.address(), kind = %kind, error = %e, "Command processing crashed");
                let _ = reply.send(false);
                if sleep_or_stop(&mut stop, timing.worker_error_recovery).await {
                    break;
                }
                continue;
            }
        };
        let _ = reply.send(ok);

        if sleep_or_stop(&mut stop, timing.inter_command_delay).await {
            break;
        }
    }

    let drained = drain_into_false(&mut receiver, &engine.queue);
    drop(receiver);
    if drained > 0 {
        tracing::debug!(address = %engine.address(), drained, "Failed queued commands on shutdown");
    }
    engine.session.lock().await.disconnect().await;
    tracing::debug!(address = %engine.address(), "Command worker stopped");
}
