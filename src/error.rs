// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `EasyTouch` library.
//!
//! Each layer owns a small error enum so retry policies can match on the
//! kind of failure instead of catching everything:
//!
//! - [`TransportError`] - the GATT link (connect, read, write, disconnect)
//! - [`AuthError`] - password exchange with the thermostat
//! - [`DecodeError`] - malformed status or configuration payloads
//! - [`CapabilityGap`] - a mode or fan speed the zone does not offer
//!
//! None of these escape the public [`Thermostat`](crate::Thermostat) API,
//! which reports failures as `false` / `None` plus a log line.

use std::time::Duration;

use thiserror::Error;

use crate::types::ZoneId;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The GATT transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication with the thermostat failed.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// A payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The requested setting is not offered by the zone configuration.
    #[error("capability gap: {0}")]
    Capability(#[from] CapabilityGap),

    /// A command could not be serialized.
    #[error("failed to encode command: {0}")]
    Encode(#[source] serde_json::Error),

    /// An operation exceeded its time budget.
    #[error("operation timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// The device engine has been shut down.
    #[error("device engine is shut down")]
    ShutDown,
}

/// Errors raised by the GATT transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Establishing the connection failed.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The connection came up but exposed no services.
    #[error("no services available after connecting")]
    NoServices,

    /// An operation was attempted without an active connection.
    #[error("not connected")]
    NotConnected,

    /// A characteristic write failed.
    #[error("GATT write failed: {0}")]
    WriteFailed(String),

    /// A characteristic read failed.
    #[error("GATT read failed: {0}")]
    ReadFailed(String),

    /// The link dropped unexpectedly.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// A GATT operation did not complete in time.
    #[error("{operation} timed out after {} ms", .after.as_millis())]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The budget that was exceeded.
        after: Duration,
    },
}

impl TransportError {
    /// Returns `true` if a write failure or a dropped link reports GATT
    /// status 133.
    ///
    /// The thermostat drops the link with this status when it reboots in the
    /// middle of acknowledging a reset command.
    #[must_use]
    pub fn is_reboot_drop(&self) -> bool {
        match self {
            Self::WriteFailed(message) | Self::Disconnected(message) => message
                .split(|c: char| !c.is_ascii_digit())
                .any(|number| number == "133"),
            _ => false,
        }
    }
}

/// Errors raised while authenticating.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No password is configured for the device.
    #[error("no password configured")]
    MissingCredentials,

    /// Every attempt failed.
    #[error("authentication failed after {attempts} attempts")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last transport failure, if any.
        last_error: Option<TransportError>,
    },
}

/// Errors raised while decoding device payloads.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The status payload has no `Z_sts` mapping.
    #[error("no zone status data in payload")]
    MissingZoneStatus,

    /// The payload is not a configuration response.
    #[error("not a config response: {0}")]
    NotConfig(String),

    /// A field has an unexpected shape.
    #[error("invalid {field}: {message}")]
    InvalidField {
        /// The offending field.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },
}

/// A requested setting is not offered by a zone's configuration.
///
/// These are rejected before anything is written to the device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapabilityGap {
    /// The device mode is not in the zone's mode-availability mask.
    #[error("mode {mode} is not available for zone {zone}")]
    Mode {
        /// The zone.
        zone: ZoneId,
        /// The device mode number.
        mode: u8,
    },

    /// The fan speed is not offered for the zone's current mode.
    #[error("fan speed {speed} is not available for zone {zone} in mode {mode}")]
    FanSpeed {
        /// The zone.
        zone: ZoneId,
        /// The device mode number.
        mode: u8,
        /// The raw fan speed.
        speed: u8,
    },

    /// The named fan mode has no matching speed.
    #[error("fan mode {name} is not available for zone {zone}")]
    FanMode {
        /// The zone.
        zone: ZoneId,
        /// The fan mode name.
        name: String,
    },

    /// The zone is in a mode without a matching setpoint.
    #[error("zone {zone} has no setpoint in its current mode")]
    Setpoint {
        /// The zone.
        zone: ZoneId,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
