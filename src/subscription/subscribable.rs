// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscribable trait for types that publish state snapshots.

use crate::state::DeviceState;
use crate::subscription::Subscription;

/// Types that publish [`DeviceState`] snapshots to listeners.
///
/// Listeners run synchronously on the task that produced the snapshot, once
/// per successful status decode and once per advertisement sighting. Keep
/// them short; hand work off to a channel if it may block.
///
/// # Examples
///
/// ```ignore
/// let subscription = thermostat.subscribe_updates(|state| {
///     println!("zones: {:?}", state.available_zones);
/// });
///
/// // Later
/// subscription.unsubscribe();
/// ```
pub trait Subscribable {
    /// Subscribes to new snapshots.
    fn subscribe_updates<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&DeviceState) + Send + Sync + 'static;

    /// Subscribes to change notifications without the snapshot.
    ///
    /// Call [`device_data`](Self::device_data) from the listener to read the
    /// snapshot.
    fn on_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static;

    /// Returns the current snapshot.
    fn device_data(&self) -> std::sync::Arc<DeviceState>;
}
