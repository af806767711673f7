// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state snapshots.
//!
//! [`DeviceState`] is an immutable snapshot rebuilt from every status
//! payload. [`StateStore`] holds the current snapshot, swaps in new ones and
//! notifies listeners.
//!
//! # Examples
//!
//! ```
//! use easytouch_lib::state::{CurrentMode, StateStore};
//!
//! let store = StateStore::new();
//! let raw = br#"{"Z_sts":{"0":[70,75,72,70,0,0,1,2,5,128,2,0,71,0,0,2]},"PRM":[0,8]}"#;
//! let state = store.apply_status(raw).unwrap();
//!
//! assert_eq!(state.zone(0).unwrap().current_mode, CurrentMode::Cool);
//! ```

mod device_state;
mod store;

pub use device_state::{CurrentMode, DeviceState, ZONE_STATUS_LEN, ZoneState};
pub use store::StateStore;
