//! redb table definitions for the Tapline store.

use redb::TableDefinition;

/// Inventory records keyed by `{tap_id}:{keg_id}`.
pub const INVENTORY: TableDefinition<&str, &[u8]> = TableDefinition::new("inventory");

/// Append-only telemetry samples keyed by sequence number.
pub const TELEMETRY: TableDefinition<u64, &[u8]> = TableDefinition::new("telemetry");

/// Hourly usage keyed by `{bucket_start:012}/{beer_name}`.
pub const USAGE: TableDefinition<&str, &[u8]> = TableDefinition::new("usage");

/// Orders keyed by auto-increment id.
pub const ORDERS: TableDefinition<u64, &[u8]> = TableDefinition::new("orders");

/// Free-form settings keyed by name.
pub const SETTINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");
