// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection session: connect, authenticate, read and write with retries.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout};
use uuid::Uuid;

use super::backoff::{AdaptiveDelayTable, OperationKind};
use super::{DeviceRef, GattConnector, GattLink, uuids};
use crate::command::{Command, StatusRequest};
use crate::error::{AuthError, Error, TransportError};
use crate::manager::{Credentials, TimingConfig};

/// Lifecycle phase of a [`Session`].
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Authenticating -> Ready
///       ^                                                        |
///       +---------------- idle timeout / error ------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No link.
    Disconnected,
    /// A connection attempt is running.
    Connecting,
    /// Linked with services discovered, not yet authenticated.
    Connected,
    /// Writing the password.
    Authenticating,
    /// Authenticated and usable.
    Ready,
}

/// The single connection to one thermostat.
///
/// A session is not synchronized; the owner wraps it in a mutex spanning
/// each connect, write and read sequence.
pub struct Session<C: GattConnector> {
    connector: Arc<C>,
    link: Option<C::Link>,
    phase: SessionPhase,
    credentials: Credentials,
    timing: TimingConfig,
    delays: Arc<AdaptiveDelayTable>,
    last_activity: Instant,
}

impl<C: GattConnector> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.phase)
            .field("linked", &self.link.is_some())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl<C: GattConnector> Session<C> {
    /// Creates a disconnected session.
    #[must_use]
    pub fn new(
        connector: Arc<C>,
        credentials: Credentials,
        timing: TimingConfig,
        delays: Arc<AdaptiveDelayTable>,
    ) -> Self {
        Self {
            connector,
            link: None,
            phase: SessionPhase::Disconnected,
            credentials,
            timing,
            delays,
            last_activity: Instant::now(),
        }
    }

    // ===== State =====

    /// Returns the lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Returns `true` while a link is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(GattLink::is_connected)
    }

    /// Returns `true` if the session can carry commands right now.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Ready
            && self
                .link
                .as_ref()
                .is_some_and(|link| link.is_connected() && link.has_services())
    }

    /// Time since the last successful operation.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Marks the session as active now.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Returns the credentials.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns the timing configuration.
    #[must_use]
    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Returns the adaptive delay table.
    #[must_use]
    pub fn delays(&self) -> &AdaptiveDelayTable {
        &self.delays
    }

    /// Sleeps for the adaptive delay of `operation` on `address`.
    pub async fn wait_adaptive_delay(&self, address: &str, operation: OperationKind) {
        let delay = self.delays.delay(address, operation);
        if !delay.is_zero() {
            tracing::debug!(
                address,
                operation = %operation,
                delay_ms = delay.as_millis(),
                "Applying adaptive delay"
            );
            sleep(delay).await;
        }
    }

    // ===== Connection =====

    /// Opens the link, releasing any previous one first.
    ///
    /// Retries up to `connect_attempts` times. A link that comes up without
    /// services gets one grace period to discover them; if they are still
    /// missing the attempt fails hard with [`TransportError::NoServices`].
    ///
    /// # Errors
    ///
    /// Returns the last [`TransportError`] once every attempt failed.
    pub async fn connect(&mut self, device: &DeviceRef) -> Result<(), TransportError> {
        self.disconnect().await;
        self.phase = SessionPhase::Connecting;

        let connector = Arc::clone(&self.connector);
        let budget = self.timing.connect_timeout;
        let attempts = self.timing.connect_attempts.max(1);
        let mut last_error = TransportError::NotConnected;

        for attempt in 1..=attempts {
            let outcome = match timeout(budget, connector.connect(device, budget)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::Timeout {
                    operation: "connect",
                    after: budget,
                }),
            };

            match outcome {
                Ok(link) => return self.adopt(link, device.address()).await,
                Err(e) => {
                    tracing::debug!(
                        address = device.address(),
                        attempt,
                        attempts,
                        error = %e,
                        "Connection attempt failed"
                    );
                    last_error = e;
                }
            }
            if attempt < attempts {
                sleep(self.timing.connect_retry_delay).await;
            }
        }

        self.phase = SessionPhase::Disconnected;
        tracing::error!(address = device.address(), error = %last_error, "Connection failed");
        Err(last_error)
    }

    async fn adopt(&mut self, mut link: C::Link, address: &str) -> Result<(), TransportError> {
        if !link.has_services() {
            sleep(self.timing.service_discovery_wait).await;
        }
        if !link.has_services() {
            tracing::error!(address, "No services available after connecting");
            close_quietly(&mut link, self.timing.gatt_operation_timeout).await;
            self.phase = SessionPhase::Disconnected;
            return Err(TransportError::NoServices);
        }

        self.link = Some(link);
        self.phase = SessionPhase::Connected;
        self.touch();
        tracing::debug!(address, "Connected");
        Ok(())
    }

    /// Writes the password, reconnecting between attempts as needed.
    ///
    /// Every failed attempt drops the link so no half-authenticated
    /// connection is kept.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCredentials`] without touching the link
    /// beyond releasing it, or [`AuthError::Exhausted`] after
    /// `auth_attempts` failures.
    pub async fn authenticate(&mut self, device: &DeviceRef) -> Result<(), AuthError> {
        let Some(password) = self.credentials.password.clone() else {
            tracing::error!(address = device.address(), "No password configured");
            self.disconnect().await;
            return Err(AuthError::MissingCredentials);
        };

        let attempts = self.timing.auth_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.try_authenticate(device, password.as_bytes()).await {
                Ok(()) => {
                    self.phase = SessionPhase::Ready;
                    self.touch();
                    tracing::debug!(address = device.address(), attempt, "Authenticated");
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(
                        address = device.address(),
                        attempt,
                        attempts,
                        error = %e,
                        "Authentication attempt failed"
                    );
                    last_error = Some(e);
                    self.disconnect().await;
                }
            }
            if attempt < attempts {
                sleep(self.timing.auth_retry_delay).await;
            }
        }

        tracing::error!(address = device.address(), attempts, "Authentication failed");
        Err(AuthError::Exhausted {
            attempts,
            last_error,
        })
    }

    async fn try_authenticate(
        &mut self,
        device: &DeviceRef,
        password: &[u8],
    ) -> Result<(), TransportError> {
        if !self.is_connected() {
            self.connect(device).await?;
        }
        self.phase = SessionPhase::Authenticating;
        self.write_once(uuids::PASSWORD, password).await
    }

    /// Makes sure the session is connected and authenticated.
    ///
    /// Applies the adaptive connect and auth delays before each step and
    /// records the outcome in the delay table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] or [`Error::Auth`] if the session could
    /// not be made ready. The link is released in both cases.
    pub async fn ensure_ready(&mut self, device: &DeviceRef) -> Result<(), Error> {
        if self.is_ready() {
            return Ok(());
        }
        if self.link.is_some() {
            tracing::debug!(address = device.address(), "Connection unusable, reconnecting");
            self.disconnect().await;
        }

        let address = device.address().to_string();

        self.wait_adaptive_delay(&address, OperationKind::Connect).await;
        if let Err(e) = self.connect(device).await {
            self.delays.on_failure(&address, OperationKind::Connect);
            return Err(e.into());
        }

        self.wait_adaptive_delay(&address, OperationKind::Auth).await;
        if let Err(e) = self.authenticate(device).await {
            self.delays.on_failure(&address, OperationKind::Auth);
            self.disconnect().await;
            return Err(e.into());
        }

        self.delays.on_success(&address, OperationKind::Connect);
        self.delays.on_success(&address, OperationKind::Auth);
        tracing::info!(address = %address, "Connection established");
        Ok(())
    }

    /// Closes the link if any. Errors while closing are logged and dropped.
    pub async fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            close_quietly(&mut link, self.timing.gatt_operation_timeout).await;
        }
        self.phase = SessionPhase::Disconnected;
    }

    /// Drops the link if it has been idle too long or lost its services.
    ///
    /// Returns `true` if the link was dropped.
    pub async fn check_health(&mut self) -> bool {
        if self.link.is_none() {
            return false;
        }

        let idle = self.idle_for();
        if idle > self.timing.idle_timeout {
            tracing::debug!(idle_ms = idle.as_millis(), "Connection idle, disconnecting");
            self.disconnect().await;
            return true;
        }

        let lost_services = self
            .link
            .as_ref()
            .is_some_and(|link| link.is_connected() && !link.has_services());
        if lost_services {
            tracing::debug!("Health check found no services, disconnecting");
            self.disconnect().await;
            return true;
        }
        false
    }

    // ===== Characteristic access =====

    /// Writes once, bounded by the GATT operation timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] without a link, or the
    /// failure reported by the link.
    pub async fn write_once(&mut self, characteristic: Uuid, data: &[u8]) -> Result<(), TransportError> {
        let after = self.timing.gatt_operation_timeout;
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;
        timeout(after, link.write(characteristic, data))
            .await
            .unwrap_or(Err(TransportError::Timeout {
                operation: "write",
                after,
            }))
    }

    async fn read_once(&mut self, characteristic: Uuid) -> Result<Vec<u8>, TransportError> {
        let after = self.timing.gatt_operation_timeout;
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;
        timeout(after, link.read(characteristic))
            .await
            .unwrap_or(Err(TransportError::Timeout {
                operation: "read",
                after,
            }))
    }

    /// Writes with up to `gatt_retries` attempts.
    ///
    /// Reconnects and re-authenticates if the link dropped, and applies the
    /// adaptive write delay before each attempt.
    ///
    /// # Errors
    ///
    /// Returns the reconnection error, or the last write failure.
    pub async fn write_with_retry(
        &mut self,
        device: &DeviceRef,
        characteristic: Uuid,
        data: &[u8],
    ) -> Result<(), Error> {
        let address = device.address().to_string();
        let retries = self.timing.gatt_retries.max(1);
        let mut last_error = TransportError::NotConnected;

        for attempt in 1..=retries {
            if !self.is_connected() {
                self.ensure_ready(device).await?;
            }
            self.wait_adaptive_delay(&address, OperationKind::Write).await;

            match self.write_once(characteristic, data).await {
                Ok(()) => {
                    self.delays.on_success(&address, OperationKind::Write);
                    self.touch();
                    return Ok(());
                }
                Err(e) => {
                    if attempt < retries {
                        let delay = self.delays.on_failure(&address, OperationKind::Write);
                        tracing::debug!(
                            address = %address,
                            attempt,
                            retries,
                            delay_ms = delay.as_millis(),
                            error = %e,
                            "GATT write failed"
                        );
                    }
                    last_error = e;
                }
            }
        }

        tracing::error!(address = %address, retries, error = %last_error, "GATT write failed");
        Err(last_error.into())
    }

    /// Reads with up to `gatt_retries` attempts.
    ///
    /// # Errors
    ///
    /// Returns the reconnection error, or the last read failure.
    pub async fn read_with_retry(
        &mut self,
        device: &DeviceRef,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, Error> {
        let address = device.address().to_string();
        let retries = self.timing.gatt_retries.max(1);
        let mut last_error = TransportError::NotConnected;

        for attempt in 1..=retries {
            if !self.is_connected() {
                self.ensure_ready(device).await?;
            }
            self.wait_adaptive_delay(&address, OperationKind::Read).await;

            match self.read_once(characteristic).await {
                Ok(payload) => {
                    self.delays.on_success(&address, OperationKind::Read);
                    self.touch();
                    return Ok(payload);
                }
                Err(e) => {
                    if attempt < retries {
                        let delay = self.delays.on_failure(&address, OperationKind::Read);
                        tracing::debug!(
                            address = %address,
                            attempt,
                            retries,
                            delay_ms = delay.as_millis(),
                            error = %e,
                            "GATT read failed"
                        );
                    }
                    last_error = e;
                }
            }
        }

        tracing::error!(address = %address, retries, error = %last_error, "GATT read failed");
        Err(last_error.into())
    }

    // ===== Probe =====

    /// Requests one status payload over a dedicated short-lived link.
    ///
    /// The session's own link is not used or touched.
    ///
    /// # Errors
    ///
    /// Returns the connect, write or read failure of the probe link.
    pub async fn probe_status(&self, device: &DeviceRef) -> Result<Vec<u8>, Error> {
        let budget = self.timing.probe_connect_timeout;
        let mut link = timeout(budget, self.connector.connect(device, budget))
            .await
            .unwrap_or(Err(TransportError::Timeout {
                operation: "connect",
                after: budget,
            }))?;

        let result = self.probe_on(&mut link, device.address()).await;
        close_quietly(&mut link, self.timing.gatt_operation_timeout).await;
        result
    }

    async fn probe_on(&self, link: &mut C::Link, address: &str) -> Result<Vec<u8>, Error> {
        if !link.is_connected() {
            return Err(TransportError::NotConnected.into());
        }
        let after = self.timing.gatt_operation_timeout;

        if let Some(password) = &self.credentials.password {
            match timeout(after, link.write(uuids::PASSWORD, password.as_bytes())).await {
                Ok(Ok(())) => tracing::debug!(address, "Probe authentication sent"),
                Ok(Err(e)) => tracing::debug!(address, error = %e, "Probe authentication failed"),
                Err(_) => tracing::debug!(address, "Probe authentication timed out"),
            }
        }

        let mut request = StatusRequest::new(0);
        if let Some(email) = &self.credentials.email {
            request = request.with_email(email.clone());
        }
        let payload = Command::from(request).encode()?;

        timeout(after, link.write(uuids::COMMAND, &payload))
            .await
            .unwrap_or(Err(TransportError::Timeout {
                operation: "write",
                after,
            }))?;
        sleep(self.timing.probe_response_delay).await;
        let response = timeout(after, link.read(uuids::RESPONSE))
            .await
            .unwrap_or(Err(TransportError::Timeout {
                operation: "read",
                after,
            }))?;
        Ok(response)
    }
}

async fn close_quietly<L: GattLink>(link: &mut L, budget: Duration) {
    if !link.is_connected() {
        return;
    }
    match timeout(budget, link.disconnect()).await {
        Ok(Ok(())) => tracing::debug!("Disconnected"),
        Ok(Err(e)) => tracing::debug!(error = %e, "Error while disconnecting"),
        Err(_) => tracing::debug!("Disconnect timed out"),
    }
}
