//! redb-based persistence boundary for the booking engine
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `tenants` | `tenant_id` | `Tenant` | Tenant records |
//! | `tenant_slugs` | `slug` | `tenant_id` | Global slug uniqueness |
//! | `services` | `service_id` | `Service` | Service records |
//! | `service_slugs` | `(tenant_id, slug)` | `service_id` | Per-tenant slug uniqueness |
//! | `resources` | `resource_id` | `Resource` | Resource records |
//! | `resource_slugs` | `(tenant_id, slug)` | `resource_id` | Per-tenant slug uniqueness |
//! | `bookings` | `booking_id` | `Booking` | Booking records |
//! | `occupancy` | `(resource_id, start_at, booking_id)` | `end_at` | 资源日历：仅 pending/confirmed |
//! | `idempotency_keys` | `(tenant_id, client_generated_id)` | `booking_id` | Replay detection |
//! | `payments` | `payment_id` | `Payment` | Payment records |
//!
//! Records are JSON-serialized. redb serializes write transactions, so any
//! check-then-insert performed inside one `WriteTransaction` is atomic.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::models::{Booking, Payment, Resource, Service, Tenant};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;
type ScopedSlugKey = (&'static str, &'static str);
type OccupancyKey = (&'static str, i64, &'static str);

const TENANTS_TABLE: RecordTable = TableDefinition::new("tenants");
const TENANT_SLUGS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("tenant_slugs");
const SERVICES_TABLE: RecordTable = TableDefinition::new("services");
const SERVICE_SLUGS_TABLE: TableDefinition<ScopedSlugKey, &str> =
    TableDefinition::new("service_slugs");
const RESOURCES_TABLE: RecordTable = TableDefinition::new("resources");
const RESOURCE_SLUGS_TABLE: TableDefinition<ScopedSlugKey, &str> =
    TableDefinition::new("resource_slugs");
const BOOKINGS_TABLE: RecordTable = TableDefinition::new("bookings");

/// Active calendar index: key = (resource_id, start_at, booking_id), value = end_at
const OCCUPANCY_TABLE: TableDefinition<OccupancyKey, i64> = TableDefinition::new("occupancy");

/// key = (tenant_id, client_generated_id), value = booking_id
const IDEMPOTENCY_TABLE: TableDefinition<ScopedSlugKey, &str> =
    TableDefinition::new("idempotency_keys");

const PAYMENTS_TABLE: RecordTable = TableDefinition::new("payments");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// One active booking on a resource calendar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyEntry {
    pub booking_id: String,
    pub start_at: i64,
    pub end_at: i64,
}

/// Booking storage backed by redb
#[derive(Clone)]
pub struct BookingStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for BookingStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingStorage").finish_non_exhaustive()
    }
}

impl BookingStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: a booking is
    /// persistent as soon as `commit()` returns.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests, ephemeral engines)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            // Create all tables if they don't exist
            let _ = write_txn.open_table(TENANTS_TABLE)?;
            let _ = write_txn.open_table(TENANT_SLUGS_TABLE)?;
            let _ = write_txn.open_table(SERVICES_TABLE)?;
            let _ = write_txn.open_table(SERVICE_SLUGS_TABLE)?;
            let _ = write_txn.open_table(RESOURCES_TABLE)?;
            let _ = write_txn.open_table(RESOURCE_SLUGS_TABLE)?;
            let _ = write_txn.open_table(BOOKINGS_TABLE)?;
            let _ = write_txn.open_table(OCCUPANCY_TABLE)?;
            let _ = write_txn.open_table(IDEMPOTENCY_TABLE)?;
            let _ = write_txn.open_table(PAYMENTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Commit a write transaction
    pub fn commit(&self, txn: WriteTransaction) -> StorageResult<()> {
        txn.commit()?;
        Ok(())
    }

    // ========== Record helpers ==========

    fn read_record<T: DeserializeOwned>(&self, def: RecordTable, id: &str) -> StorageResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(def)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn read_record_txn<T: DeserializeOwned>(
        txn: &WriteTransaction,
        def: RecordTable,
        id: &str,
    ) -> StorageResult<Option<T>> {
        let table = txn.open_table(def)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn write_record<T: Serialize>(
        txn: &WriteTransaction,
        def: RecordTable,
        id: &str,
        record: &T,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(def)?;
        let value = serde_json::to_vec(record)?;
        table.insert(id, value.as_slice())?;
        Ok(())
    }

    fn read_all<T: DeserializeOwned>(&self, def: RecordTable) -> StorageResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(def)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }

    /// Ids stored under a `(tenant_id, *)` key prefix
    fn scoped_ids(
        &self,
        def: TableDefinition<'static, ScopedSlugKey, &'static str>,
        tenant_id: &str,
    ) -> StorageResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(def)?;

        let mut ids = Vec::new();
        for result in table.range((tenant_id, "")..)? {
            let (key, value) = result?;
            if key.value().0 != tenant_id {
                break;
            }
            ids.push(value.value().to_string());
        }
        Ok(ids)
    }

    // ========== Tenants ==========

    pub fn get_tenant(&self, tenant_id: &str) -> StorageResult<Option<Tenant>> {
        self.read_record(TENANTS_TABLE, tenant_id)
    }

    pub fn get_tenant_txn(&self, txn: &WriteTransaction, tenant_id: &str) -> StorageResult<Option<Tenant>> {
        Self::read_record_txn(txn, TENANTS_TABLE, tenant_id)
    }

    pub fn put_tenant(&self, txn: &WriteTransaction, tenant: &Tenant) -> StorageResult<()> {
        Self::write_record(txn, TENANTS_TABLE, &tenant.id, tenant)
    }

    pub fn tenant_id_for_slug(&self, slug: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TENANT_SLUGS_TABLE)?;
        Ok(table.get(slug)?.map(|guard| guard.value().to_string()))
    }

    pub fn tenant_id_for_slug_txn(&self, txn: &WriteTransaction, slug: &str) -> StorageResult<Option<String>> {
        let table = txn.open_table(TENANT_SLUGS_TABLE)?;
        Ok(table.get(slug)?.map(|guard| guard.value().to_string()))
    }

    pub fn bind_tenant_slug(&self, txn: &WriteTransaction, slug: &str, tenant_id: &str) -> StorageResult<()> {
        let mut table = txn.open_table(TENANT_SLUGS_TABLE)?;
        table.insert(slug, tenant_id)?;
        Ok(())
    }

    pub fn unbind_tenant_slug(&self, txn: &WriteTransaction, slug: &str) -> StorageResult<()> {
        let mut table = txn.open_table(TENANT_SLUGS_TABLE)?;
        table.remove(slug)?;
        Ok(())
    }

    // ========== Services ==========

    pub fn get_service(&self, service_id: &str) -> StorageResult<Option<Service>> {
        self.read_record(SERVICES_TABLE, service_id)
    }

    pub fn get_service_txn(&self, txn: &WriteTransaction, service_id: &str) -> StorageResult<Option<Service>> {
        Self::read_record_txn(txn, SERVICES_TABLE, service_id)
    }

    pub fn put_service(&self, txn: &WriteTransaction, service: &Service) -> StorageResult<()> {
        Self::write_record(txn, SERVICES_TABLE, &service.id, service)
    }

    pub fn service_id_for_slug(&self, tenant_id: &str, slug: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SERVICE_SLUGS_TABLE)?;
        Ok(table.get((tenant_id, slug))?.map(|guard| guard.value().to_string()))
    }

    pub fn service_id_for_slug_txn(
        &self,
        txn: &WriteTransaction,
        tenant_id: &str,
        slug: &str,
    ) -> StorageResult<Option<String>> {
        let table = txn.open_table(SERVICE_SLUGS_TABLE)?;
        Ok(table.get((tenant_id, slug))?.map(|guard| guard.value().to_string()))
    }

    pub fn bind_service_slug(
        &self,
        txn: &WriteTransaction,
        tenant_id: &str,
        slug: &str,
        service_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(SERVICE_SLUGS_TABLE)?;
        table.insert((tenant_id, slug), service_id)?;
        Ok(())
    }

    pub fn service_ids_for_tenant(&self, tenant_id: &str) -> StorageResult<Vec<String>> {
        self.scoped_ids(SERVICE_SLUGS_TABLE, tenant_id)
    }

    // ========== Resources ==========

    pub fn get_resource(&self, resource_id: &str) -> StorageResult<Option<Resource>> {
        self.read_record(RESOURCES_TABLE, resource_id)
    }

    pub fn get_resource_txn(&self, txn: &WriteTransaction, resource_id: &str) -> StorageResult<Option<Resource>> {
        Self::read_record_txn(txn, RESOURCES_TABLE, resource_id)
    }

    pub fn put_resource(&self, txn: &WriteTransaction, resource: &Resource) -> StorageResult<()> {
        Self::write_record(txn, RESOURCES_TABLE, &resource.id, resource)
    }

    pub fn resource_id_for_slug(&self, tenant_id: &str, slug: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RESOURCE_SLUGS_TABLE)?;
        Ok(table.get((tenant_id, slug))?.map(|guard| guard.value().to_string()))
    }

    pub fn resource_id_for_slug_txn(
        &self,
        txn: &WriteTransaction,
        tenant_id: &str,
        slug: &str,
    ) -> StorageResult<Option<String>> {
        let table = txn.open_table(RESOURCE_SLUGS_TABLE)?;
        Ok(table.get((tenant_id, slug))?.map(|guard| guard.value().to_string()))
    }

    pub fn bind_resource_slug(
        &self,
        txn: &WriteTransaction,
        tenant_id: &str,
        slug: &str,
        resource_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(RESOURCE_SLUGS_TABLE)?;
        table.insert((tenant_id, slug), resource_id)?;
        Ok(())
    }

    pub fn resource_ids_for_tenant(&self, tenant_id: &str) -> StorageResult<Vec<String>> {
        self.scoped_ids(RESOURCE_SLUGS_TABLE, tenant_id)
    }

    // ========== Bookings ==========

    pub fn get_booking(&self, booking_id: &str) -> StorageResult<Option<Booking>> {
        self.read_record(BOOKINGS_TABLE, booking_id)
    }

    pub fn get_booking_txn(&self, txn: &WriteTransaction, booking_id: &str) -> StorageResult<Option<Booking>> {
        Self::read_record_txn(txn, BOOKINGS_TABLE, booking_id)
    }

    pub fn put_booking(&self, txn: &WriteTransaction, booking: &Booking) -> StorageResult<()> {
        Self::write_record(txn, BOOKINGS_TABLE, &booking.id, booking)
    }

    /// All bookings ever made on a resource, ordered by start time
    pub fn bookings_for_resource(&self, resource_id: &str) -> StorageResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .read_all::<Booking>(BOOKINGS_TABLE)?
            .into_iter()
            .filter(|b| b.resource_id == resource_id)
            .collect();
        bookings.sort_by_key(|b| b.start_at);
        Ok(bookings)
    }

    // ========== Idempotency ==========

    pub fn booking_id_for_client_key(&self, tenant_id: &str, client_generated_id: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(IDEMPOTENCY_TABLE)?;
        Ok(table
            .get((tenant_id, client_generated_id))?
            .map(|guard| guard.value().to_string()))
    }

    pub fn booking_id_for_client_key_txn(
        &self,
        txn: &WriteTransaction,
        tenant_id: &str,
        client_generated_id: &str,
    ) -> StorageResult<Option<String>> {
        let table = txn.open_table(IDEMPOTENCY_TABLE)?;
        Ok(table
            .get((tenant_id, client_generated_id))?
            .map(|guard| guard.value().to_string()))
    }

    pub fn bind_client_key(
        &self,
        txn: &WriteTransaction,
        tenant_id: &str,
        client_generated_id: &str,
        booking_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(IDEMPOTENCY_TABLE)?;
        table.insert((tenant_id, client_generated_id), booking_id)?;
        Ok(())
    }

    /// Whether any booking references the tenant (every booking carries a key)
    pub fn tenant_has_bookings_txn(&self, txn: &WriteTransaction, tenant_id: &str) -> StorageResult<bool> {
        let table = txn.open_table(IDEMPOTENCY_TABLE)?;
        let mut range = table.range((tenant_id, "")..)?;
        match range.next() {
            Some(result) => {
                let (key, _value) = result?;
                Ok(key.value().0 == tenant_id)
            }
            None => Ok(false),
        }
    }

    // ========== Occupancy (resource calendar) ==========

    /// Add a booking to its resource's active calendar
    pub fn occupy(&self, txn: &WriteTransaction, booking: &Booking) -> StorageResult<()> {
        let mut table = txn.open_table(OCCUPANCY_TABLE)?;
        table.insert(
            (booking.resource_id.as_str(), booking.start_at, booking.id.as_str()),
            booking.end_at,
        )?;
        Ok(())
    }

    /// Remove a booking from its resource's active calendar
    pub fn release(&self, txn: &WriteTransaction, booking: &Booking) -> StorageResult<()> {
        let mut table = txn.open_table(OCCUPANCY_TABLE)?;
        table.remove((booking.resource_id.as_str(), booking.start_at, booking.id.as_str()))?;
        Ok(())
    }

    /// Active bookings overlapping `[start, end)` (read-only snapshot)
    pub fn overlapping(&self, resource_id: &str, start: i64, end: i64) -> StorageResult<Vec<OccupancyEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OCCUPANCY_TABLE)?;
        scan_overlapping(&table, resource_id, start, end)
    }

    /// Active bookings overlapping `[start, end)` inside a write transaction
    pub fn overlapping_txn(
        &self,
        txn: &WriteTransaction,
        resource_id: &str,
        start: i64,
        end: i64,
    ) -> StorageResult<Vec<OccupancyEntry>> {
        let table = txn.open_table(OCCUPANCY_TABLE)?;
        scan_overlapping(&table, resource_id, start, end)
    }

    // ========== Payments ==========

    pub fn get_payment(&self, payment_id: &str) -> StorageResult<Option<Payment>> {
        self.read_record(PAYMENTS_TABLE, payment_id)
    }

    pub fn get_payment_txn(&self, txn: &WriteTransaction, payment_id: &str) -> StorageResult<Option<Payment>> {
        Self::read_record_txn(txn, PAYMENTS_TABLE, payment_id)
    }

    pub fn put_payment(&self, txn: &WriteTransaction, payment: &Payment) -> StorageResult<()> {
        Self::write_record(txn, PAYMENTS_TABLE, &payment.id, payment)
    }

    /// Write a single payment record in its own transaction
    pub fn save_payment(&self, payment: &Payment) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.put_payment(&txn, payment)?;
        txn.commit()?;
        Ok(())
    }

    // ========== Statistics ==========

    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        use redb::ReadableTableMetadata;

        let read_txn = self.db.begin_read()?;
        Ok(StorageStats {
            tenant_count: read_txn.open_table(TENANTS_TABLE)?.len()?,
            service_count: read_txn.open_table(SERVICES_TABLE)?.len()?,
            resource_count: read_txn.open_table(RESOURCES_TABLE)?.len()?,
            booking_count: read_txn.open_table(BOOKINGS_TABLE)?.len()?,
            active_booking_count: read_txn.open_table(OCCUPANCY_TABLE)?.len()?,
            payment_count: read_txn.open_table(PAYMENTS_TABLE)?.len()?,
        })
    }
}

/// Occupancy keys sort by (resource, start): every entry that could overlap
/// `[start, end)` has a start before `end`, so scan that prefix and keep the
/// ones ending after `start`.
fn scan_overlapping(
    table: &impl ReadableTable<OccupancyKey, i64>,
    resource_id: &str,
    start: i64,
    end: i64,
) -> StorageResult<Vec<OccupancyEntry>> {
    let mut entries = Vec::new();
    for result in table.range((resource_id, i64::MIN, "")..(resource_id, end, ""))? {
        let (key, value) = result?;
        let (_rid, entry_start, booking_id) = key.value();
        let entry_end = value.value();
        if entry_end > start {
            entries.push(OccupancyEntry {
                booking_id: booking_id.to_string(),
                start_at: entry_start,
                end_at: entry_end,
            });
        }
    }
    Ok(entries)
}

/// Storage statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    pub tenant_count: u64,
    pub service_count: u64,
    pub resource_count: u64,
    pub booking_count: u64,
    pub active_booking_count: u64,
    pub payment_count: u64,
}
