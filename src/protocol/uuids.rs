// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GATT identifiers of the thermostat.

use uuid::Uuid;

/// Primary service exposing the three characteristics.
pub const SERVICE: Uuid = Uuid::from_u128(0x0000_00FF_0000_1000_8000_0080_5F9B_34FB);

/// Password characteristic (write, plaintext UTF-8).
pub const PASSWORD: Uuid = Uuid::from_u128(0x0000_DD01_0000_1000_8000_0080_5F9B_34FB);

/// Command characteristic (write, JSON).
pub const COMMAND: Uuid = Uuid::from_u128(0x0000_EE01_0000_1000_8000_0080_5F9B_34FB);

/// Response characteristic (read, JSON).
pub const RESPONSE: Uuid = Uuid::from_u128(0x0000_FF01_0000_1000_8000_0080_5F9B_34FB);
