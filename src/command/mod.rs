// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thermostat command definitions.
//!
//! Commands are JSON objects written to the command characteristic. Three
//! shapes exist, distinguished by the `Type` tag:
//!
//! | Type         | Purpose                         | Body                         |
//! |--------------|---------------------------------|------------------------------|
//! | `Change`     | Mutate zone or system settings  | `Changes` object             |
//! | `Get Status` | Request a status payload        | `Zone`, `EM`, `TM`, location |
//! | `Get Config` | Request a zone configuration    | `Zone`                       |
//!
//! # Examples
//!
//! ```
//! use easytouch_lib::command::{ChangeSet, Command, SetpointField};
//!
//! let cmd = Command::change(
//!     ChangeSet::zone(1)
//!         .with_power(true)
//!         .with_setpoint(SetpointField::Cool, 74),
//! );
//!
//! assert_eq!(
//!     String::from_utf8(cmd.encode().unwrap()).unwrap(),
//!     r#"{"Type":"Change","Changes":{"zone":1,"cool_sp":74,"power":1}}"#
//! );
//! ```

mod change;

pub use change::{ChangeSet, FanField, SetpointField};

use serde::Serialize;

use crate::error::Error;
use crate::types::ZoneId;

/// A command sent to the thermostat.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Type")]
pub enum Command {
    /// Apply field mutations to a zone, or system-wide when no zone is set.
    Change {
        /// The mutations.
        #[serde(rename = "Changes")]
        changes: ChangeSet,
    },

    /// Request a status payload.
    #[serde(rename = "Get Status")]
    GetStatus(StatusRequest),

    /// Request the configuration block of a zone.
    #[serde(rename = "Get Config")]
    GetConfig {
        /// The zone.
        #[serde(rename = "Zone")]
        zone: ZoneId,
    },
}

/// Kind of a [`Command`], for logging and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// `Change`.
    Change,
    /// `Get Status`.
    GetStatus,
    /// `Get Config`.
    GetConfig,
}

impl CommandKind {
    /// Returns the wire tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Change => "Change",
            Self::GetStatus => "Get Status",
            Self::GetConfig => "Get Config",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Command {
    /// Creates a `Change` command.
    #[must_use]
    pub const fn change(changes: ChangeSet) -> Self {
        Self::Change { changes }
    }

    /// Creates a `Get Status` command for `zone`, stamped with the current time.
    #[must_use]
    pub fn get_status(zone: ZoneId) -> Self {
        Self::GetStatus(StatusRequest::new(zone))
    }

    /// Creates a `Get Config` command for `zone`.
    #[must_use]
    pub const fn get_config(zone: ZoneId) -> Self {
        Self::GetConfig { zone }
    }

    /// Creates the reboot command.
    ///
    /// The device acknowledges `reset` on zone 0 by restarting.
    #[must_use]
    pub fn reboot() -> Self {
        Self::change(ChangeSet::zone(0).with_reset())
    }

    /// Creates the system-wide power-off command (every zone).
    #[must_use]
    pub fn all_zones_off() -> Self {
        Self::change(ChangeSet::system().with_power(false))
    }

    /// Returns the command kind.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Change { .. } => CommandKind::Change,
            Self::GetStatus(_) => CommandKind::GetStatus,
            Self::GetConfig { .. } => CommandKind::GetConfig,
        }
    }

    /// Returns the zone the command targets, if any.
    #[must_use]
    pub const fn zone(&self) -> Option<ZoneId> {
        match self {
            Self::Change { changes } => changes.target_zone(),
            Self::GetStatus(request) => Some(request.zone),
            Self::GetConfig { zone } => Some(*zone),
        }
    }

    /// Serializes the command to the bytes written to the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if a raw field value cannot be serialized.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(Error::Encode)
    }
}

/// Body of a `Get Status` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRequest {
    /// Zone to report on.
    #[serde(rename = "Zone")]
    pub zone: ZoneId,

    /// Account email, when configured.
    #[serde(rename = "EM", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Unix timestamp, used by the device to set its clock.
    #[serde(rename = "TM")]
    pub timestamp: i64,

    /// Latitude with five decimals.
    #[serde(rename = "LAT", skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,

    /// Longitude with five decimals.
    #[serde(rename = "LON", skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
}

impl StatusRequest {
    /// Creates a request for `zone`, stamped with the current time.
    #[must_use]
    pub fn new(zone: ZoneId) -> Self {
        Self {
            zone,
            email: None,
            timestamp: chrono::Utc::now().timestamp(),
            latitude: None,
            longitude: None,
        }
    }

    /// Attaches the account email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Attaches a location, formatted to five decimals.
    #[must_use]
    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(format!("{latitude:.5}"));
        self.longitude = Some(format!("{longitude:.5}"));
        self
    }

    /// Overrides the timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl From<StatusRequest> for Command {
    fn from(request: StatusRequest) -> Self {
        Self::GetStatus(request)
    }
}
