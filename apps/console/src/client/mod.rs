//! Client-side sync engine: per-map view contexts, connection-wide console
//! state, and the one-shot command senders.

pub mod commands;
pub mod console;
pub mod map_view;
pub mod poll;
pub mod poses;
pub mod tiles;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::protocol::VehicleInfo;

/// Shared vehicle metadata, written by the server-state handler and read when
/// indicators are created.
pub type VehicleDirectory = Arc<RwLock<HashMap<String, VehicleInfo>>>;

pub use console::Console;
pub use map_view::MapView;
