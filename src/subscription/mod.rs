// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Update fan-out to local listeners.
//!
//! # Overview
//!
//! - [`CallbackRegistry`] - Stores listeners and dispatches snapshots
//! - [`Subscription`] - Token returned by subscribe calls, used to unsubscribe
//! - [`Subscribable`] - Trait for types that publish snapshots
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use easytouch_lib::DeviceState;
//! use easytouch_lib::subscription::CallbackRegistry;
//!
//! let registry = Arc::new(CallbackRegistry::new());
//! let subscription = registry.subscribe(|state| {
//!     println!("{} zone(s)", state.available_zones.len());
//! });
//!
//! registry.dispatch(&DeviceState::default());
//! assert!(subscription.unsubscribe());
//! ```

mod callback;
mod subscribable;

pub use callback::{CallbackRegistry, Subscription, SubscriptionId};
pub use subscribable::Subscribable;
