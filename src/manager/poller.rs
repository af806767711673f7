// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Periodic status polling.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::command::{Command, StatusRequest};
use crate::error::Error;
use crate::protocol::{DeviceRef, GattConnector, Session, uuids};

use super::PollingConfig;
use super::engine::{Engine, sleep_or_stop};

/// Outcome of the most recent poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollStatus {
    /// Whether the last poll decoded a status.
    pub last_success: bool,
    /// When the last successful poll finished.
    pub last_poll_time: Option<DateTime<Utc>>,
    /// Whether a poll is running right now.
    pub in_progress: bool,
}

impl<C: GattConnector> Engine<C> {
    /// Requests and applies one status report. Never fails; the outcome is
    /// recorded in [`PollStatus`].
    pub(crate) async fn poll_once(&self) -> bool {
        self.poll_status.lock().in_progress = true;

        let device = self.resolve_device_ref().await;
        let outcome = {
            let mut session = self.session.lock().await;
            let outcome = self.poll_locked(&mut session, &device).await;
            if outcome.is_ok() {
                session.touch();
            }
            outcome
        };

        let success = outcome.is_ok();
        {
            let mut status = self.poll_status.lock();
            status.in_progress = false;
            status.last_success = success;
            if success {
                status.last_poll_time = Some(Utc::now());
            }
        }

        match outcome {
            Ok(()) => tracing::debug!(address = %self.address(), "Poll succeeded"),
            Err(e) => tracing::warn!(address = %self.address(), error = %e, "Poll failed"),
        }
        success
    }

    async fn poll_locked(&self, session: &mut Session<C>, device: &DeviceRef) -> Result<(), Error> {
        session.ensure_ready(device).await?;

        let mut request = StatusRequest::new(0);
        if let Some(email) = &self.credentials().email {
            request = request.with_email(email.clone());
        }
        let payload = Command::from(request).encode()?;

        session
            .write_with_retry(device, uuids::COMMAND, &payload)
            .await?;
        sleep(self.timing().command_settle).await;
        let response = session.read_with_retry(device, uuids::RESPONSE).await?;
        self.store.apply_status(&response)?;
        Ok(())
    }
}

/// Polls until stopped, yielding to queued commands.
pub(crate) async fn run_poller<C: GattConnector>(
    engine: Arc<Engine<C>>,
    polling: PollingConfig,
    mut stop: watch::Receiver<bool>,
) {
    if sleep_or_stop(&mut stop, polling.startup_delay).await {
        return;
    }
    tracing::info!(
        address = %engine.address(),
        interval_s = polling.interval.as_secs(),
        "Polling started"
    );

    loop {
        let pending = engine.queue.pending();
        if pending > 0 {
            tracing::debug!(address = %engine.address(), pending, "Commands queued, deferring poll");
            if sleep_or_stop(&mut stop, polling.interval / 4).await {
                break;
            }
            continue;
        }

        let cancelled = tokio::select! {
            _ = engine.poll_once() => false,
            _ = stop.changed() => true,
        };
        if cancelled || sleep_or_stop(&mut stop, polling.interval).await {
            break;
        }
    }

    // A poll cancelled mid-way may leave a half-used link behind.
    engine.poll_status.lock().in_progress = false;
    engine.session.lock().await.disconnect().await;
}
