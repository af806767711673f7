// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `EasyTouch` Lib - A Rust library to control Micro-Air `EasyTouch`
//! thermostats over Bluetooth Low Energy.
//!
//! One controller serves up to several climate zones. The library keeps a
//! single authenticated GATT connection per controller, serializes every
//! command through a FIFO queue and publishes decoded status snapshots to
//! local listeners.
//!
//! # Supported Features
//!
//! - **Zone control**: HVAC mode, setpoints, fan speed, heat source
//! - **Capability checks**: Modes and fan speeds validated against each
//!   zone's configuration before anything is sent
//! - **Status polling**: Periodic status requests with adaptive back-off
//! - **Zone discovery**: One-shot probe of the zones a controller serves
//! - **Maintenance**: Reboot, location update, all-zones-off
//!
//! # Transport
//!
//! No Bluetooth stack is bundled. Implement
//! [`GattConnector`](protocol::GattConnector) and
//! [`GattLink`](protocol::GattLink) on top of the BLE client of your choice.
//!
//! # Quick Start
//!
//! ```ignore
//! use easytouch_lib::manager::DeviceConfig;
//! use easytouch_lib::subscription::Subscribable;
//! use easytouch_lib::types::HvacMode;
//! use easytouch_lib::{SetpointRequest, Thermostat};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DeviceConfig::new("AA:BB:CC:DD:EE:FF")
//!         .with_credentials("1234", "me@example.com");
//!
//!     // Probes the zones the controller serves when none are configured.
//!     let thermostat = Thermostat::builder(config, MyConnector::new())
//!         .build_with_probe()
//!         .await;
//!
//!     let _subscription = thermostat.subscribe_updates(|state| {
//!         println!("zones: {:?}", state.available_zones);
//!     });
//!
//!     thermostat.refresh_zone_configs_if_missing().await;
//!     thermostat.start_polling();
//!
//!     let zone = thermostat.zone(1);
//!     zone.set_hvac_mode(HvacMode::Cool).await;
//!     zone.set_temperature(SetpointRequest::Single(72)).await;
//!
//!     thermostat.shutdown().await;
//! }
//! ```

mod capabilities;
pub mod command;
mod device;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod state;
pub mod subscription;
pub mod telemetry;
pub mod types;

pub use capabilities::{DEFAULT_SETPOINT_LIMITS, FanCapabilities, ZoneConfig};
pub use command::{ChangeSet, Command, CommandKind, FanField, SetpointField, StatusRequest};
pub use device::{SetpointRequest, Thermostat, ThermostatBuilder, ZoneController};
pub use error::{AuthError, CapabilityGap, DecodeError, Error, Result, TransportError};
pub use manager::{DeviceConfig, PollStatus};
pub use state::{CurrentMode, DeviceState, ZoneState};
pub use subscription::{CallbackRegistry, Subscribable, Subscription, SubscriptionId};
pub use types::{DeviceMode, FanModeName, HeatPreset, HvacMode, ZoneId};
