//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements   | Connects to                    |
//! |-----------------|--------------|--------------------------------|
//! | `sim_link`      | BleLink      | In-memory simulated device     |
//! | `btleplug_link` | BleLink      | Host BLE adapter (feature)     |
//! | `log_sink`      | EventSink    | `log` facade                   |
//! | `channel_sink`  | EventSink    | `embassy-sync` bounded channel |
//! | `time`          | TimePort     | `Instant` + `async-io-mini`    |

#[cfg(feature = "btleplug")]
pub mod btleplug_link;
pub mod channel_sink;
pub mod log_sink;
pub mod sim_link;
pub mod time;
