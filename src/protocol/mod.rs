// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GATT transport abstraction and connection session.
//!
//! The library does not bind to a Bluetooth stack. Integrators implement
//! [`GattConnector`] and [`GattLink`] on top of their BLE client; the
//! [`Session`] layers connection management, authentication, retries and
//! adaptive delays on top.
//!
//! # Device References
//!
//! A thermostat in low-power mode may not show up in scans. [`DeviceRef`]
//! carries either a resolved scan result or just the address, and a
//! connector is expected to attempt a direct connection in the latter case
//! to wake the device.
//!
//! # Implementing a Transport
//!
//! ```
//! use std::time::Duration;
//! use easytouch_lib::protocol::{DeviceRef, GattConnector, GattLink};
//! use easytouch_lib::TransportError;
//! use uuid::Uuid;
//!
//! struct Offline;
//!
//! struct NoLink;
//!
//! impl GattLink for NoLink {
//!     fn is_connected(&self) -> bool { false }
//!     fn has_services(&self) -> bool { false }
//!     async fn write(&mut self, _: Uuid, _: &[u8]) -> Result<(), TransportError> {
//!         Err(TransportError::NotConnected)
//!     }
//!     async fn read(&mut self, _: Uuid) -> Result<Vec<u8>, TransportError> {
//!         Err(TransportError::NotConnected)
//!     }
//!     async fn disconnect(&mut self) -> Result<(), TransportError> { Ok(()) }
//! }
//!
//! impl GattConnector for Offline {
//!     type Link = NoLink;
//!
//!     async fn connect(&self, device: &DeviceRef, _: Duration) -> Result<NoLink, TransportError> {
//!         Err(TransportError::ConnectFailed(format!("{} unreachable", device.address())))
//!     }
//! }
//! ```

mod backoff;
mod session;
pub mod uuids;

pub use backoff::{AdaptiveDelayTable, OperationDelay, OperationKind};
pub use session::{Session, SessionPhase};

use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::error::TransportError;

/// A device found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Bluetooth address.
    pub address: String,
    /// Advertised name.
    pub name: Option<String>,
    /// Signal strength of the last sighting.
    pub rssi: Option<i16>,
}

impl DeviceHandle {
    /// Creates a handle for `address`.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            rssi: None,
        }
    }

    /// Sets the advertised name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the signal strength.
    #[must_use]
    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }
}

/// What to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRef {
    /// A device seen by a recent scan.
    Resolved(DeviceHandle),
    /// Only the address is known; the device may be asleep.
    AddressOnly(String),
}

impl DeviceRef {
    /// Returns the Bluetooth address.
    #[must_use]
    pub fn address(&self) -> &str {
        match self {
            Self::Resolved(handle) => &handle.address,
            Self::AddressOnly(address) => address,
        }
    }

    /// Returns `true` for a resolved scan result.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl From<DeviceHandle> for DeviceRef {
    fn from(handle: DeviceHandle) -> Self {
        Self::Resolved(handle)
    }
}

/// Opens connections to thermostats.
pub trait GattConnector: Send + Sync + 'static {
    /// The connection type.
    type Link: GattLink;

    /// Connects to `device`.
    ///
    /// A connector receiving [`DeviceRef::AddressOnly`] should still attempt
    /// a direct connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the connection cannot be established.
    fn connect(
        &self,
        device: &DeviceRef,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Link, TransportError>> + Send;
}

/// One open connection to a thermostat.
pub trait GattLink: Send + Sync + 'static {
    /// Returns `true` while the link is up.
    fn is_connected(&self) -> bool;

    /// Returns `true` if the service table is populated.
    fn has_services(&self) -> bool;

    /// Writes `data` to a characteristic, with response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the write fails.
    fn write(
        &mut self,
        characteristic: Uuid,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Reads a characteristic.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the read fails.
    fn read(
        &mut self,
        characteristic: Uuid,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Closes the link.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the stack reports a failure while
    /// closing.
    fn disconnect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Resolves an address to a recently seen device.
///
/// Closures `Fn(&str) -> Option<DeviceHandle>` implement this trait.
pub trait DeviceResolver: Send + Sync + 'static {
    /// Returns the device if it was seen recently.
    fn resolve(&self, address: &str) -> Option<DeviceHandle>;
}

impl<F> DeviceResolver for F
where
    F: Fn(&str) -> Option<DeviceHandle> + Send + Sync + 'static,
{
    fn resolve(&self, address: &str) -> Option<DeviceHandle> {
        self(address)
    }
}

/// Resolver that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl DeviceResolver for NoResolver {
    fn resolve(&self, _address: &str) -> Option<DeviceHandle> {
        None
    }
}

/// Asks `resolver` for `address` up to `attempts` times.
///
/// Waits 1s, 2s, 4s... between attempts.
pub async fn resolve_with_retry<R>(resolver: &R, address: &str, attempts: u32) -> Option<DeviceHandle>
where
    R: DeviceResolver + ?Sized,
{
    for attempt in 0..attempts {
        if let Some(handle) = resolver.resolve(address) {
            tracing::debug!(address, attempt = attempt + 1, "Resolved device");
            return Some(handle);
        }
        if attempt + 1 < attempts {
            let wait = Duration::from_secs(1u64 << attempt.min(6));
            tracing::debug!(
                address,
                attempt = attempt + 1,
                wait_ms = wait.as_millis(),
                "Device not found, retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }
    tracing::warn!(address, attempts, "Device not resolved, it may be in low-power mode");
    None
}
