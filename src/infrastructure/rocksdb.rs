use crate::domain::offer::Offer;
use crate::domain::order::Order;
use crate::domain::ports::{OfferStore, OrderStore, UpdateFn};
use crate::error::{OrderError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for order rows.
pub const CF_ORDERS: &str = "orders";
/// Column Family for offer rows.
pub const CF_OFFERS: &str = "offers";

/// A persistent store implementation using RocksDB.
///
/// Orders and offers live in separate column families, JSON-encoded. The
/// store is thread-safe (`Clone` shares the underlying `Arc<DB>`); a write
/// mutex serializes `update` cycles so the read-check-write of a transition
/// stays indivisible, matching the in-memory store's contract.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_gate: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// both column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());
        let cf_offers = ColumnFamilyDescriptor::new(CF_OFFERS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_orders, cf_offers])?;

        Ok(Self {
            db: Arc::new(db),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| OrderError::Persistence(format!("{name} column family not found")))
    }

    fn put<T: serde::Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)
            .map_err(|e| OrderError::Persistence(format!("serialization error: {e}")))?;
        self.db.put_cf(&cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    fn read<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(&cf, key.as_bytes())? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| OrderError::Persistence(format!("deserialization error: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl OrderStore for RocksDbStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let _guard = self.write_gate.lock().await;
        self.put(CF_ORDERS, &order.id, &order)
    }

    async fn get(&self, id: &str) -> Result<Option<Order>> {
        self.read(CF_ORDERS, id)
    }

    async fn update(&self, id: &str, f: UpdateFn<Order>) -> Result<Order> {
        let _guard = self.write_gate.lock().await;
        let mut order: Order = self
            .read(CF_ORDERS, id)?
            .ok_or_else(|| OrderError::NotFound(format!("order {id}")))?;
        f(&mut order)?;
        self.put(CF_ORDERS, id, &order)?;
        Ok(order)
    }

    async fn all(&self) -> Result<Vec<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        let mut orders = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) =
                item.map_err(|e| OrderError::Persistence(format!("iteration error: {e}")))?;
            let order: Order = serde_json::from_slice(&value)
                .map_err(|e| OrderError::Persistence(format!("deserialization error: {e}")))?;
            orders.push(order);
        }
        Ok(orders)
    }
}

#[async_trait]
impl OfferStore for RocksDbStore {
    async fn insert(&self, offer: Offer) -> Result<()> {
        let _guard = self.write_gate.lock().await;
        self.put(CF_OFFERS, &offer.id, &offer)
    }

    async fn get(&self, id: &str) -> Result<Option<Offer>> {
        self.read(CF_OFFERS, id)
    }

    async fn update(&self, id: &str, f: UpdateFn<Offer>) -> Result<Offer> {
        let _guard = self.write_gate.lock().await;
        let mut offer: Offer = self
            .read(CF_OFFERS, id)?
            .ok_or_else(|| OrderError::NotFound(format!("offer {id}")))?;
        f(&mut offer)?;
        self.put(CF_OFFERS, id, &offer)?;
        Ok(offer)
    }

    async fn for_order(&self, order_id: &str) -> Result<Vec<Offer>> {
        let cf = self.cf(CF_OFFERS)?;
        let mut thread = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) =
                item.map_err(|e| OrderError::Persistence(format!("iteration error: {e}")))?;
            let offer: Offer = serde_json::from_slice(&value)
                .map_err(|e| OrderError::Persistence(format!("deserialization error: {e}")))?;
            if offer.order_id.as_deref() == Some(order_id) {
                thread.push(offer);
            }
        }
        thread.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(thread)
    }
}
