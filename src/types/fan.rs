// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fan speed naming.
//!
//! Raw fan values fall into these ranges:
//!
//! - `0` - off
//! - `1..=3` - manual speeds
//! - `64..=67` - manual auto (`64` plain, `65..=67` cycled at speed 1-3)
//! - `128` - full auto

use std::fmt;
use std::str::FromStr;

/// Raw value for the manual-auto fan regime.
pub const MANUAL_AUTO_SPEED: u8 = 64;

/// Raw value for the full-auto fan regime.
pub const FULL_AUTO_SPEED: u8 = 128;

/// Named fan setting shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanModeName {
    /// Fan off.
    Off,
    /// Lowest manual speed.
    Low,
    /// Middle manual speed (three-speed fans only).
    Medium,
    /// Highest manual speed.
    High,
    /// Automatic.
    Auto,
}

impl FanModeName {
    /// Names a raw fan speed given the fan's maximum manual speed.
    ///
    /// Auto-offset speeds (65-67) are normalized to their manual speed
    /// (1-3) before naming.
    ///
    /// # Examples
    ///
    /// ```
    /// use easytouch_lib::types::FanModeName;
    ///
    /// assert_eq!(FanModeName::for_speed(1, 1), FanModeName::High);
    /// assert_eq!(FanModeName::for_speed(66, 3), FanModeName::Medium);
    /// assert_eq!(FanModeName::for_speed(128, 3), FanModeName::Auto);
    /// ```
    #[must_use]
    pub const fn for_speed(speed: u8, max_speed: u8) -> Self {
        if speed == 0 {
            return Self::Off;
        }
        if speed == MANUAL_AUTO_SPEED || speed == FULL_AUTO_SPEED {
            return Self::Auto;
        }
        let base = if speed < MANUAL_AUTO_SPEED {
            speed
        } else {
            speed - MANUAL_AUTO_SPEED
        };
        match max_speed {
            1 => Self::High,
            2 => {
                if base == 1 {
                    Self::Low
                } else {
                    Self::High
                }
            }
            _ => match base {
                1 => Self::Low,
                2 => Self::Medium,
                _ => Self::High,
            },
        }
    }

    /// Returns the name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for FanModeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FanModeName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "auto" => Ok(Self::Auto),
            _ => Err(format!("unknown fan mode: {s}")),
        }
    }
}
