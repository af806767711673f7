// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsing of payloads read from the response characteristic.
//!
//! The device answers every command by updating its response
//! characteristic. Two payload kinds are read back:
//!
//! - status payloads (`Z_sts`, `PRM`, `SN`, `CI`, `hA`), decoded by
//!   [`decode_status`] into a [`DeviceState`](crate::DeviceState)
//! - configuration responses (`RT: "Config"`), parsed by
//!   [`parse_zone_config`] into a [`ZoneConfig`](crate::ZoneConfig)
//!
//! # Examples
//!
//! ```
//! use easytouch_lib::DeviceState;
//! use easytouch_lib::telemetry::decode_status;
//!
//! let raw = br#"{"Z_sts":{"1":[68,76,74,70,0,0,1,2,5,128,2,0,72,0,0,2]},"PRM":[0,11]}"#;
//! let state = decode_status(raw, &DeviceState::default());
//!
//! assert_eq!(state.available_zones, vec![1]);
//! assert_eq!(state.zone(1).unwrap().cool_sp, 74);
//! ```

mod config_parser;
mod preview;
mod status_parser;

pub use config_parser::parse_zone_config;
pub use preview::PayloadPreview;
pub use status_parser::{decode_status, try_decode_status};
