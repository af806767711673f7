// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection health monitor.

use std::sync::Arc;

use tokio::sync::watch;

use crate::protocol::GattConnector;

use super::engine::{Engine, sleep_or_stop};

/// Periodically drops idle or silently broken links until stopped.
pub(crate) async fn run_health_monitor<C: GattConnector>(
    engine: Arc<Engine<C>>,
    mut stop: watch::Receiver<bool>,
) {
    let interval = engine.timing().health_check_interval;
    loop {
        if sleep_or_stop(&mut stop, interval).await {
            break;
        }
        let dropped = engine.session.lock().await.check_health().await;
        if dropped {
            tracing::info!(address = %engine.address(), "Health check released the connection");
        }
    }
    tracing::debug!(address = %engine.address(), "Health monitor stopped");
}
