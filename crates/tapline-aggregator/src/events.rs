//! Events pushed to attached viewers.

use serde::{Deserialize, Serialize};

use tapline_core::DisplayState;
use tapline_state::{InventoryRecord, Order, UsageBucket};

use crate::session::KegRuntime;

/// One update for a viewer. Serialized with a `type` tag, e.g.
/// `{"type":"tap_deleted","tap_id":"tap-1"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerEvent {
    TapUpdate {
        tap_id: String,
        display: DisplayState,
        connected: bool,
    },
    KegUpdate {
        tap_id: String,
        beer_name: String,
        keg: KegRuntime,
    },
    InventoryData {
        inventory: Vec<InventoryRecord>,
    },
    HistoryData {
        history: Vec<UsageBucket>,
    },
    OrdersData {
        orders: Vec<Order>,
    },
    Alert {
        tap_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keg_id: Option<String>,
        message: String,
    },
    TapDeleted {
        tap_id: String,
    },
    TapStatusChanged {
        tap_id: String,
        connected: bool,
    },
}

impl ViewerEvent {
    /// Tap this event concerns, if it is about a single tap.
    pub fn tap_id(&self) -> Option<&str> {
        match self {
            Self::TapUpdate { tap_id, .. }
            | Self::KegUpdate { tap_id, .. }
            | Self::Alert { tap_id, .. }
            | Self::TapDeleted { tap_id }
            | Self::TapStatusChanged { tap_id, .. } => Some(tap_id),
            Self::InventoryData { .. } | Self::HistoryData { .. } | Self::OrdersData { .. } => None,
        }
    }
}
