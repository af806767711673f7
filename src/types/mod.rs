// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for `EasyTouch` thermostat control.
//!
//! # Types
//!
//! - [`ZoneId`] - Zone number as reported in `Z_sts` keys
//! - [`DeviceMode`] - Raw device operating mode (0-15)
//! - [`HvacMode`] - Coarse climate mode used by front ends
//! - [`HeatPreset`] - Named heat source variants
//! - [`FanModeName`] - Named fan settings derived from raw speeds

mod fan;
mod mode;

pub use fan::{FULL_AUTO_SPEED, FanModeName, MANUAL_AUTO_SPEED};
pub use mode::{DeviceMode, HeatPreset, HvacMode};

/// Identifier of a climate zone served by one controller.
pub type ZoneId = u8;
