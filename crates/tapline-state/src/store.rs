//! StateStore — redb-backed persistence for Tapline.
//!
//! Provides typed operations over inventory, telemetry, usage, orders,
//! and settings. All values are JSON-serialized into redb's `&[u8]`
//! value columns. The store supports both on-disk and in-memory backends
//! (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Closure turning any `Display` error into a `StateError`: a literal names
/// the failed storage step, an ident names the variant.
macro_rules! map_err {
    ($op:literal) => {
        |e| StateError::Storage {
            op: $op,
            message: e.to_string(),
        }
    };
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(INVENTORY).map_err(map_err!("table"))?;
        txn.open_table(TELEMETRY).map_err(map_err!("table"))?;
        txn.open_table(USAGE).map_err(map_err!("table"))?;
        txn.open_table(ORDERS).map_err(map_err!("table"))?;
        txn.open_table(SETTINGS).map_err(map_err!("table"))?;
        txn.commit().map_err(map_err!("transaction"))?;
        Ok(())
    }

    // ── Inventory ──────────────────────────────────────────────────

    /// Insert or replace the inventory record for a keg.
    pub fn put_inventory(&self, record: &InventoryRecord) -> StateResult<()> {
        let key = record.table_key();
        let value = serde_json::to_vec(record).map_err(map_err!(Encode))?;
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        {
            let mut table = txn.open_table(INVENTORY).map_err(map_err!("table"))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!("write"))?;
        }
        txn.commit().map_err(map_err!("transaction"))?;
        Ok(())
    }

    /// Get the inventory record for a keg.
    pub fn get_inventory(&self, tap_id: &str, keg_id: &str) -> StateResult<Option<InventoryRecord>> {
        let key = inventory_key(tap_id, keg_id);
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(INVENTORY).map_err(map_err!("table"))?;
        match table.get(key.as_str()).map_err(map_err!("read"))? {
            Some(guard) => {
                let record: InventoryRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Corrupt))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List every inventory record.
    pub fn list_inventory(&self) -> StateResult<Vec<InventoryRecord>> {
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(INVENTORY).map_err(map_err!("table"))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!("read"))? {
            let (_, value) = entry.map_err(map_err!("read"))?;
            let record: InventoryRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Corrupt))?;
            results.push(record);
        }
        Ok(results)
    }

    /// List the inventory records of one tap.
    pub fn list_inventory_for_tap(&self, tap_id: &str) -> StateResult<Vec<InventoryRecord>> {
        let prefix = format!("{tap_id}:");
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(INVENTORY).map_err(map_err!("table"))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!("read"))? {
            let (key, value) = entry.map_err(map_err!("read"))?;
            if key.value().starts_with(&prefix) {
                let record: InventoryRecord =
                    serde_json::from_slice(value.value()).map_err(map_err!(Corrupt))?;
                results.push(record);
            }
        }
        Ok(results)
    }

    /// Force a keg's record to `(remaining = 0, status = EMPTY)`.
    ///
    /// Returns `KegNotFound` if the keg has never reported.
    pub fn mark_keg_empty(
        &self,
        tap_id: &str,
        keg_id: &str,
        now_ms: u64,
    ) -> StateResult<InventoryRecord> {
        let key = inventory_key(tap_id, keg_id);
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        let record = {
            let mut table = txn.open_table(INVENTORY).map_err(map_err!("table"))?;
            let existing: Option<InventoryRecord> =
                match table.get(key.as_str()).map_err(map_err!("read"))? {
                    Some(guard) => Some(
                        serde_json::from_slice(guard.value()).map_err(map_err!(Corrupt))?,
                    ),
                    None => None,
                };
            let mut record = existing.ok_or_else(|| StateError::KegNotFound {
                tap_id: tap_id.to_string(),
                keg_id: keg_id.to_string(),
            })?;
            record.remaining_volume_ml = 0.0;
            record.status = InventoryStatus::Empty;
            record.updated_at_ms = now_ms;
            let value = serde_json::to_vec(&record).map_err(map_err!(Encode))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!("write"))?;
            record
        };
        txn.commit().map_err(map_err!("transaction"))?;
        debug!(%key, "keg marked empty");
        Ok(record)
    }

    /// Delete all inventory records for a tap. Returns number deleted.
    pub fn delete_inventory_for_tap(&self, tap_id: &str) -> StateResult<u32> {
        let prefix = format!("{tap_id}:");
        // Collect keys in a read transaction first.
        let keys: Vec<String> = {
            let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
            let table = txn.open_table(INVENTORY).map_err(map_err!("table"))?;
            table
                .iter()
                .map_err(map_err!("read"))?
                .filter_map(|entry| {
                    let (key, _) = entry.ok()?;
                    let k = key.value().to_string();
                    k.starts_with(&prefix).then_some(k)
                })
                .collect()
        };
        // Delete in a write transaction.
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        let count = keys.len() as u32;
        {
            let mut table = txn.open_table(INVENTORY).map_err(map_err!("table"))?;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!("write"))?;
            }
        }
        txn.commit().map_err(map_err!("transaction"))?;
        debug!(%tap_id, count, "inventory deleted");
        Ok(count)
    }

    // ── Telemetry ──────────────────────────────────────────────────

    /// Append a telemetry sample. Returns its sequence number.
    pub fn append_telemetry(&self, sample: &TelemetrySample) -> StateResult<u64> {
        let value = serde_json::to_vec(sample).map_err(map_err!(Encode))?;
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        let seq;
        {
            let mut table = txn.open_table(TELEMETRY).map_err(map_err!("table"))?;
            seq = table
                .last()
                .map_err(map_err!("read"))?
                .map(|(key, _)| key.value() + 1)
                .unwrap_or(1);
            table.insert(seq, value.as_slice()).map_err(map_err!("write"))?;
        }
        txn.commit().map_err(map_err!("transaction"))?;
        Ok(seq)
    }

    /// Samples recorded at or after `since_ms`, oldest first.
    pub fn list_telemetry_since(&self, since_ms: u64) -> StateResult<Vec<TelemetrySample>> {
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(TELEMETRY).map_err(map_err!("table"))?;
        let mut results = Vec::new();
        // The log is appended in arrival order, so walk back from the tail.
        for entry in table.iter().map_err(map_err!("read"))?.rev() {
            let (_, value) = entry.map_err(map_err!("read"))?;
            let sample: TelemetrySample =
                serde_json::from_slice(value.value()).map_err(map_err!(Corrupt))?;
            if sample.timestamp_ms < since_ms {
                break;
            }
            results.push(sample);
        }
        results.reverse();
        Ok(results)
    }

    // ── Usage ──────────────────────────────────────────────────────

    /// Add `delta_ml` to the bucket for `(bucket_start, beer_name)`.
    ///
    /// Returns the bucket after the update. Non-positive deltas are
    /// ignored so buckets never shrink.
    pub fn add_usage(
        &self,
        bucket_start: u64,
        beer_name: &str,
        delta_ml: f64,
    ) -> StateResult<UsageBucket> {
        let key = usage_key(bucket_start, beer_name);
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        let bucket = {
            let mut table = txn.open_table(USAGE).map_err(map_err!("table"))?;
            let existing: Option<UsageBucket> =
                match table.get(key.as_str()).map_err(map_err!("read"))? {
                    Some(guard) => Some(
                        serde_json::from_slice(guard.value()).map_err(map_err!(Corrupt))?,
                    ),
                    None => None,
                };
            let mut bucket = existing.unwrap_or_else(|| UsageBucket {
                bucket_start,
                beer_name: beer_name.to_string(),
                volume_ml: 0.0,
            });
            if delta_ml > 0.0 {
                bucket.volume_ml += delta_ml;
            }
            let value = serde_json::to_vec(&bucket).map_err(map_err!(Encode))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!("write"))?;
            bucket
        };
        txn.commit().map_err(map_err!("transaction"))?;
        Ok(bucket)
    }

    /// Buckets starting at or after `since_secs`, oldest first.
    pub fn list_usage_since(&self, since_secs: u64) -> StateResult<Vec<UsageBucket>> {
        let start = usage_key(since_secs, "");
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(USAGE).map_err(map_err!("table"))?;
        let mut results = Vec::new();
        for entry in table.range(start.as_str()..).map_err(map_err!("read"))? {
            let (_, value) = entry.map_err(map_err!("read"))?;
            let bucket: UsageBucket =
                serde_json::from_slice(value.value()).map_err(map_err!(Corrupt))?;
            results.push(bucket);
        }
        Ok(results)
    }

    /// Total usage of one beer since `since_secs`.
    pub fn sum_usage_for_beer(&self, beer_name: &str, since_secs: u64) -> StateResult<f64> {
        Ok(self
            .list_usage_since(since_secs)?
            .iter()
            .filter(|b| b.beer_name == beer_name)
            .map(|b| b.volume_ml)
            .sum())
    }

    // ── Orders ─────────────────────────────────────────────────────

    /// Create a pending order for a keg unless one is already pending.
    ///
    /// The check and the insert share one write transaction. Returns the
    /// new order, or `None` if a pending order already existed.
    pub fn create_order_if_absent(
        &self,
        tap_id: &str,
        keg_id: &str,
        beer_name: &str,
        now_ms: u64,
    ) -> StateResult<Option<Order>> {
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        let created = {
            let mut table = txn.open_table(ORDERS).map_err(map_err!("table"))?;

            let mut already_pending = false;
            for entry in table.iter().map_err(map_err!("read"))? {
                let (_, value) = entry.map_err(map_err!("read"))?;
                let order: Order =
                    serde_json::from_slice(value.value()).map_err(map_err!(Corrupt))?;
                if order.status == OrderStatus::Pending
                    && order.tap_id == tap_id
                    && order.keg_id == keg_id
                {
                    already_pending = true;
                    break;
                }
            }

            if already_pending {
                None
            } else {
                let id = table
                    .last()
                    .map_err(map_err!("read"))?
                    .map(|(key, _)| key.value() + 1)
                    .unwrap_or(1);
                let order = Order {
                    id,
                    tap_id: tap_id.to_string(),
                    keg_id: keg_id.to_string(),
                    beer_name: beer_name.to_string(),
                    status: OrderStatus::Pending,
                    created_at_ms: now_ms,
                };
                let value = serde_json::to_vec(&order).map_err(map_err!(Encode))?;
                table.insert(id, value.as_slice()).map_err(map_err!("write"))?;
                Some(order)
            }
        };
        txn.commit().map_err(map_err!("transaction"))?;
        if let Some(order) = &created {
            debug!(order_id = order.id, %tap_id, %keg_id, "order created");
        }
        Ok(created)
    }

    /// List all orders, oldest first.
    pub fn list_orders(&self) -> StateResult<Vec<Order>> {
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(ORDERS).map_err(map_err!("table"))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!("read"))? {
            let (_, value) = entry.map_err(map_err!("read"))?;
            let order: Order =
                serde_json::from_slice(value.value()).map_err(map_err!(Corrupt))?;
            results.push(order);
        }
        Ok(results)
    }

    /// Mark an order as fulfilled.
    pub fn mark_order_fulfilled(&self, id: u64) -> StateResult<Order> {
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        let order = {
            let mut table = txn.open_table(ORDERS).map_err(map_err!("table"))?;
            let existing: Option<Order> = match table.get(id).map_err(map_err!("read"))? {
                Some(guard) => {
                    Some(serde_json::from_slice(guard.value()).map_err(map_err!(Corrupt))?)
                }
                None => None,
            };
            let mut order = existing.ok_or(StateError::OrderNotFound(id))?;
            order.status = OrderStatus::Fulfilled;
            let value = serde_json::to_vec(&order).map_err(map_err!(Encode))?;
            table.insert(id, value.as_slice()).map_err(map_err!("write"))?;
            order
        };
        txn.commit().map_err(map_err!("transaction"))?;
        Ok(order)
    }

    // ── Settings ───────────────────────────────────────────────────

    /// Store a setting under `key`.
    pub fn put_setting<T: Serialize>(&self, key: &str, value: &T) -> StateResult<()> {
        let value = serde_json::to_vec(value).map_err(map_err!(Encode))?;
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        {
            let mut table = txn.open_table(SETTINGS).map_err(map_err!("table"))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!("write"))?;
        }
        txn.commit().map_err(map_err!("transaction"))?;
        Ok(())
    }

    /// Read a setting.
    pub fn get_setting<T: DeserializeOwned>(&self, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(SETTINGS).map_err(map_err!("table"))?;
        match table.get(key).map_err(map_err!("read"))? {
            Some(guard) => {
                let value: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Corrupt))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record(tap_id: &str, keg_id: &str, remaining: f64) -> InventoryRecord {
        InventoryRecord {
            tap_id: tap_id.to_string(),
            keg_id: keg_id.to_string(),
            beer_name: "Stout".to_string(),
            total_volume_ml: 20_000.0,
            remaining_volume_ml: remaining,
            status: InventoryStatus::Standby,
            updated_at_ms: 1000,
        }
    }

    fn test_sample(timestamp_ms: u64, volume: f64) -> TelemetrySample {
        TelemetrySample {
            timestamp_ms,
            tap_id: "tap-1".to_string(),
            keg_id: "keg-a".to_string(),
            volume_remaining_ml: volume,
            flow_lpm: 6.0,
            temp_beer_c: 4.0,
        }
    }

    // ── Inventory ──────────────────────────────────────────────────

    #[test]
    fn inventory_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let record = test_record("tap-1", "keg-a", 15_000.0);

        store.put_inventory(&record).unwrap();
        let retrieved = store.get_inventory("tap-1", "keg-a").unwrap();

        assert_eq!(retrieved, Some(record));
    }

    #[test]
    fn inventory_upsert_replaces() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_inventory(&test_record("tap-1", "keg-a", 15_000.0)).unwrap();
        store.put_inventory(&test_record("tap-1", "keg-a", 14_000.0)).unwrap();

        let all = store.list_inventory().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].remaining_volume_ml, 14_000.0);
    }

    #[test]
    fn inventory_list_and_delete_for_tap() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_inventory(&test_record("tap-1", "keg-a", 1.0)).unwrap();
        store.put_inventory(&test_record("tap-1", "keg-b", 1.0)).unwrap();
        store.put_inventory(&test_record("tap-2", "keg-a", 1.0)).unwrap();

        assert_eq!(store.list_inventory_for_tap("tap-1").unwrap().len(), 2);

        let deleted = store.delete_inventory_for_tap("tap-1").unwrap();
        assert_eq!(deleted, 2);
        assert!(store.list_inventory_for_tap("tap-1").unwrap().is_empty());
        // tap-2 untouched
        assert_eq!(store.list_inventory_for_tap("tap-2").unwrap().len(), 1);
    }

    #[test]
    fn mark_keg_empty_zeroes_record() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_inventory(&test_record("tap-1", "keg-a", 300.0)).unwrap();

        let record = store.mark_keg_empty("tap-1", "keg-a", 5000).unwrap();
        assert_eq!(record.remaining_volume_ml, 0.0);
        assert_eq!(record.status, InventoryStatus::Empty);
        assert_eq!(record.updated_at_ms, 5000);

        let stored = store.get_inventory("tap-1", "keg-a").unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[test]
    fn mark_unknown_keg_empty_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store.mark_keg_empty("tap-1", "ghost", 1).unwrap_err();
        assert!(matches!(
            err,
            StateError::KegNotFound { ref keg_id, .. } if keg_id == "ghost"
        ));
        assert_eq!(err.to_string(), "no inventory record for keg ghost on tap tap-1");
    }

    // ── Telemetry ──────────────────────────────────────────────────

    #[test]
    fn telemetry_appends_in_order() {
        let store = StateStore::open_in_memory().unwrap();
        assert_eq!(store.append_telemetry(&test_sample(1000, 5000.0)).unwrap(), 1);
        assert_eq!(store.append_telemetry(&test_sample(2000, 4950.0)).unwrap(), 2);
        assert_eq!(store.append_telemetry(&test_sample(3000, 4900.0)).unwrap(), 3);

        let all = store.list_telemetry_since(0).unwrap();
        let stamps: Vec<u64> = all.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(stamps, vec![1000, 2000, 3000]);
    }

    #[test]
    fn telemetry_window_excludes_older_samples() {
        let store = StateStore::open_in_memory().unwrap();
        for ts in [1000u64, 2000, 3000, 4000] {
            store.append_telemetry(&test_sample(ts, 1.0)).unwrap();
        }

        let recent = store.list_telemetry_since(2500).unwrap();
        let stamps: Vec<u64> = recent.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(stamps, vec![3000, 4000]);
    }

    // ── Usage ──────────────────────────────────────────────────────

    #[test]
    fn usage_is_additive() {
        let store = StateStore::open_in_memory().unwrap();
        store.add_usage(3600, "Stout", 200.0).unwrap();
        let bucket = store.add_usage(3600, "Stout", 50.0).unwrap();
        assert_eq!(bucket.volume_ml, 250.0);

        let all = store.list_usage_since(0).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].volume_ml, 250.0);
    }

    #[test]
    fn usage_ignores_non_positive_deltas() {
        let store = StateStore::open_in_memory().unwrap();
        store.add_usage(3600, "Stout", 100.0).unwrap();
        let bucket = store.add_usage(3600, "Stout", -40.0).unwrap();
        assert_eq!(bucket.volume_ml, 100.0);
    }

    #[test]
    fn usage_is_keyed_by_hour_and_beer() {
        let store = StateStore::open_in_memory().unwrap();
        store.add_usage(3600, "Stout", 100.0).unwrap();
        store.add_usage(3600, "Pils", 10.0).unwrap();
        store.add_usage(7200, "Stout", 30.0).unwrap();

        assert_eq!(store.list_usage_since(0).unwrap().len(), 3);
        assert_eq!(store.list_usage_since(7200).unwrap().len(), 1);
        assert_eq!(store.sum_usage_for_beer("Stout", 0).unwrap(), 130.0);
        assert_eq!(store.sum_usage_for_beer("Stout", 7200).unwrap(), 30.0);
        assert_eq!(store.sum_usage_for_beer("Porter", 0).unwrap(), 0.0);
    }

    // ── Orders ─────────────────────────────────────────────────────

    #[test]
    fn orders_are_not_duplicated_while_pending() {
        let store = StateStore::open_in_memory().unwrap();

        let first = store
            .create_order_if_absent("tap-1", "keg-a", "Stout", 1000)
            .unwrap()
            .unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.status, OrderStatus::Pending);

        let dup = store
            .create_order_if_absent("tap-1", "keg-a", "Stout", 2000)
            .unwrap();
        assert!(dup.is_none());

        // A different keg gets its own order.
        let other = store
            .create_order_if_absent("tap-1", "keg-b", "Stout", 2000)
            .unwrap()
            .unwrap();
        assert_eq!(other.id, 2);
        assert_eq!(store.list_orders().unwrap().len(), 2);
    }

    #[test]
    fn fulfilled_order_allows_a_new_one() {
        let store = StateStore::open_in_memory().unwrap();
        let order = store
            .create_order_if_absent("tap-1", "keg-a", "Stout", 1000)
            .unwrap()
            .unwrap();

        let fulfilled = store.mark_order_fulfilled(order.id).unwrap();
        assert_eq!(fulfilled.status, OrderStatus::Fulfilled);

        let next = store
            .create_order_if_absent("tap-1", "keg-a", "Stout", 3000)
            .unwrap();
        assert_eq!(next.map(|o| o.id), Some(2));
    }

    #[test]
    fn fulfilling_unknown_order_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(matches!(
            store.mark_order_fulfilled(99),
            Err(StateError::OrderNotFound(99))
        ));
    }

    // ── Settings ───────────────────────────────────────────────────

    #[test]
    fn settings_round_trip() {
        let store = StateStore::open_in_memory().unwrap();
        assert_eq!(store.get_setting::<String>("broker").unwrap(), None);

        store.put_setting("broker", &"mqtt://pub:1883".to_string()).unwrap();
        assert_eq!(
            store.get_setting::<String>("broker").unwrap().as_deref(),
            Some("mqtt://pub:1883")
        );
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.put_inventory(&test_record("tap-1", "keg-a", 42.0)).unwrap();
            store.add_usage(3600, "Stout", 200.0).unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let record = store.get_inventory("tap-1", "keg-a").unwrap();
        assert_eq!(record.map(|r| r.remaining_volume_ml), Some(42.0));
        assert_eq!(store.sum_usage_for_beer("Stout", 0).unwrap(), 200.0);
    }

    // ── Edge cases ─────────────────────────────────────────────────

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_inventory().unwrap().is_empty());
        assert!(store.list_inventory_for_tap("any").unwrap().is_empty());
        assert!(store.list_telemetry_since(0).unwrap().is_empty());
        assert!(store.list_usage_since(0).unwrap().is_empty());
        assert!(store.list_orders().unwrap().is_empty());
        assert_eq!(store.delete_inventory_for_tap("nope").unwrap(), 0);
        assert!(store.get_inventory("nope", "nope").unwrap().is_none());
    }

    #[test]
    fn mistyped_setting_is_corrupt() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_setting("broker", &42u32).unwrap();
        let err = store.get_setting::<Vec<String>>("broker").unwrap_err();
        assert!(matches!(err, StateError::Corrupt(_)));
    }
}
