//! Tenant/Service Registry
//!
//! Owns tenant, service and resource records. Reads are served through a
//! read-mostly tenant cache. Tenant writes commit and publish the new record
//! to the cache under the cache's write lock; a reader that loaded an older
//! record from storage never replaces what a writer published.
//!
//! Slug uniqueness is checked inside the same redb write transaction that
//! binds the slug, so two concurrent creates with one slug cannot both win.

use crate::core::{BookingError, BookingResult};
use crate::storage::BookingStorage;
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_SERVICE_DURATION_MINUTES, validate_required_text, validate_slug,
    validate_timezone,
};
use chrono_tz::Tz;
use parking_lot::RwLock;
use redb::WriteTransaction;
use serde_json::{Map, Value};
use shared::models::{
    Resource, ResourceCreate, Service, ServiceCreate, Tenant, TenantCreate, WorkingHours,
};
use shared::util::{new_id, now_millis};
use std::collections::HashMap;

/// Tenant cache size warning threshold
const TENANT_CACHE_WARN_THRESHOLD: usize = 10_000;

pub struct Registry {
    storage: BookingStorage,
    tenant_cache: RwLock<HashMap<String, Tenant>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("cached_tenants", &self.tenant_cache.read().len())
            .finish_non_exhaustive()
    }
}

impl Registry {
    pub fn new(storage: BookingStorage) -> Self {
        Self {
            storage,
            tenant_cache: RwLock::new(HashMap::new()),
        }
    }

    // ========== Tenants ==========

    pub fn create_tenant(&self, input: TenantCreate) -> BookingResult<Tenant> {
        validate_slug(&input.slug, "tenant slug")?;
        validate_required_text(&input.name, "tenant name", MAX_NAME_LEN)?;
        validate_timezone(&input.timezone)?;

        let now = now_millis();
        let tenant = Tenant {
            id: new_id(),
            slug: input.slug,
            name: input.name,
            timezone: input.timezone,
            settings: input.settings,
            created_at: now,
            updated_at: now,
        };

        let txn = self.storage.begin_write()?;
        if self.storage.tenant_id_for_slug_txn(&txn, &tenant.slug)?.is_some() {
            return Err(BookingError::AlreadyExists {
                entity: "tenant",
                key: tenant.slug,
            });
        }
        self.storage.put_tenant(&txn, &tenant)?;
        self.storage.bind_tenant_slug(&txn, &tenant.slug, &tenant.id)?;
        self.commit_tenant(txn, &tenant)?;

        tracing::info!(tenant_id = %tenant.id, slug = %tenant.slug, "Tenant created");
        Ok(tenant)
    }

    pub fn tenant(&self, tenant_id: &str) -> BookingResult<Tenant> {
        if let Some(tenant) = self.tenant_cache.read().get(tenant_id) {
            return Ok(tenant.clone());
        }

        let tenant = self
            .storage
            .get_tenant(tenant_id)?
            .ok_or_else(|| BookingError::not_found("tenant", tenant_id))?;
        Ok(self.cache_loaded(tenant))
    }

    /// Cache a record read from storage unless a writer already published one
    fn cache_loaded(&self, tenant: Tenant) -> Tenant {
        let mut cache = self.tenant_cache.write();
        let cached = cache.entry(tenant.id.clone()).or_insert(tenant).clone();
        if cache.len() > TENANT_CACHE_WARN_THRESHOLD {
            tracing::warn!(cache_size = cache.len(), "Tenant cache exceeds threshold");
        }
        cached
    }

    /// Commit a tenant write and publish the record as one step
    ///
    /// Lock order is write transaction → cache, same as every other writer.
    fn commit_tenant(&self, txn: WriteTransaction, tenant: &Tenant) -> BookingResult<()> {
        let mut cache = self.tenant_cache.write();
        self.storage.commit(txn)?;
        cache.insert(tenant.id.clone(), tenant.clone());
        Ok(())
    }

    pub fn tenant_by_slug(&self, slug: &str) -> BookingResult<Tenant> {
        let tenant_id = self
            .storage
            .tenant_id_for_slug(slug)?
            .ok_or_else(|| BookingError::not_found("tenant", slug))?;
        self.tenant(&tenant_id)
    }

    /// Parsed timezone of a tenant
    pub fn tenant_timezone(&self, tenant_id: &str) -> BookingResult<Tz> {
        let tenant = self.tenant(tenant_id)?;
        validate_timezone(&tenant.timezone)
    }

    /// Replace the opaque settings payload
    pub fn update_tenant_settings(
        &self,
        tenant_id: &str,
        settings: Map<String, Value>,
    ) -> BookingResult<Tenant> {
        let txn = self.storage.begin_write()?;
        let mut tenant = self
            .storage
            .get_tenant_txn(&txn, tenant_id)?
            .ok_or_else(|| BookingError::not_found("tenant", tenant_id))?;
        tenant.settings = settings;
        tenant.updated_at = now_millis();
        self.storage.put_tenant(&txn, &tenant)?;
        self.commit_tenant(txn, &tenant)?;
        Ok(tenant)
    }

    /// Change a tenant's slug
    ///
    /// Fails with `SlugLocked` once any booking references the tenant.
    pub fn rename_tenant_slug(&self, tenant_id: &str, new_slug: &str) -> BookingResult<Tenant> {
        validate_slug(new_slug, "tenant slug")?;

        let txn = self.storage.begin_write()?;
        let mut tenant = self
            .storage
            .get_tenant_txn(&txn, tenant_id)?
            .ok_or_else(|| BookingError::not_found("tenant", tenant_id))?;
        if tenant.slug == new_slug {
            return Ok(tenant);
        }
        if self.storage.tenant_has_bookings_txn(&txn, tenant_id)? {
            return Err(BookingError::SlugLocked(tenant.slug));
        }
        if self.storage.tenant_id_for_slug_txn(&txn, new_slug)?.is_some() {
            return Err(BookingError::AlreadyExists {
                entity: "tenant",
                key: new_slug.to_string(),
            });
        }

        self.storage.unbind_tenant_slug(&txn, &tenant.slug)?;
        self.storage.bind_tenant_slug(&txn, new_slug, tenant_id)?;
        let old_slug = std::mem::replace(&mut tenant.slug, new_slug.to_string());
        tenant.updated_at = now_millis();
        self.storage.put_tenant(&txn, &tenant)?;
        self.commit_tenant(txn, &tenant)?;

        tracing::info!(tenant_id = %tenant_id, old_slug = %old_slug, new_slug = %new_slug, "Tenant slug renamed");
        Ok(tenant)
    }

    // ========== Services ==========

    pub fn create_service(&self, tenant_id: &str, input: ServiceCreate) -> BookingResult<Service> {
        validate_slug(&input.slug, "service slug")?;
        validate_required_text(&input.name, "service name", MAX_NAME_LEN)?;
        if input.duration_minutes == 0 || input.duration_minutes > MAX_SERVICE_DURATION_MINUTES {
            return Err(BookingError::validation(format!(
                "service duration must be between 1 and {MAX_SERVICE_DURATION_MINUTES} minutes"
            )));
        }
        if input.price_cents < 0 {
            return Err(BookingError::InvalidAmount(format!(
                "service price must be >= 0, got {}",
                input.price_cents
            )));
        }

        let now = now_millis();
        let service = Service {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            slug: input.slug,
            name: input.name,
            duration_minutes: input.duration_minutes,
            price_cents: input.price_cents,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let txn = self.storage.begin_write()?;
        if self.storage.get_tenant_txn(&txn, tenant_id)?.is_none() {
            return Err(BookingError::not_found("tenant", tenant_id));
        }
        if self
            .storage
            .service_id_for_slug_txn(&txn, tenant_id, &service.slug)?
            .is_some()
        {
            return Err(BookingError::AlreadyExists {
                entity: "service",
                key: service.slug,
            });
        }
        self.storage.put_service(&txn, &service)?;
        self.storage
            .bind_service_slug(&txn, tenant_id, &service.slug, &service.id)?;
        self.storage.commit(txn)?;

        tracing::info!(tenant_id = %tenant_id, service_id = %service.id, slug = %service.slug, "Service created");
        Ok(service)
    }

    pub fn service(&self, service_id: &str) -> BookingResult<Service> {
        self.storage
            .get_service(service_id)?
            .ok_or_else(|| BookingError::not_found("service", service_id))
    }

    pub fn service_by_slug(&self, tenant_id: &str, slug: &str) -> BookingResult<Service> {
        let service_id = self
            .storage
            .service_id_for_slug(tenant_id, slug)?
            .ok_or_else(|| BookingError::not_found("service", slug))?;
        self.service(&service_id)
    }

    /// Services of a tenant ordered by slug
    pub fn services_for_tenant(&self, tenant_id: &str) -> BookingResult<Vec<Service>> {
        self.tenant(tenant_id)?;
        let mut services = Vec::new();
        for id in self.storage.service_ids_for_tenant(tenant_id)? {
            if let Some(service) = self.storage.get_service(&id)? {
                services.push(service);
            }
        }
        Ok(services)
    }

    /// Deactivation only blocks new bookings
    pub fn set_service_active(&self, service_id: &str, is_active: bool) -> BookingResult<Service> {
        let txn = self.storage.begin_write()?;
        let mut service = self
            .storage
            .get_service_txn(&txn, service_id)?
            .ok_or_else(|| BookingError::not_found("service", service_id))?;
        service.is_active = is_active;
        service.updated_at = now_millis();
        self.storage.put_service(&txn, &service)?;
        self.storage.commit(txn)?;

        tracing::info!(service_id = %service_id, is_active, "Service activation changed");
        Ok(service)
    }

    // ========== Resources ==========

    pub fn create_resource(&self, tenant_id: &str, input: ResourceCreate) -> BookingResult<Resource> {
        validate_slug(&input.slug, "resource slug")?;
        validate_required_text(&input.name, "resource name", MAX_NAME_LEN)?;
        validate_working_hours(&input.working_hours)?;

        let now = now_millis();
        let resource = Resource {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            slug: input.slug,
            name: input.name,
            working_hours: input.working_hours,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let txn = self.storage.begin_write()?;
        if self.storage.get_tenant_txn(&txn, tenant_id)?.is_none() {
            return Err(BookingError::not_found("tenant", tenant_id));
        }
        if self
            .storage
            .resource_id_for_slug_txn(&txn, tenant_id, &resource.slug)?
            .is_some()
        {
            return Err(BookingError::AlreadyExists {
                entity: "resource",
                key: resource.slug,
            });
        }
        self.storage.put_resource(&txn, &resource)?;
        self.storage
            .bind_resource_slug(&txn, tenant_id, &resource.slug, &resource.id)?;
        self.storage.commit(txn)?;

        tracing::info!(tenant_id = %tenant_id, resource_id = %resource.id, slug = %resource.slug, "Resource created");
        Ok(resource)
    }

    pub fn resource(&self, resource_id: &str) -> BookingResult<Resource> {
        self.storage
            .get_resource(resource_id)?
            .ok_or_else(|| BookingError::ResourceNotFound(resource_id.to_string()))
    }

    pub fn resource_by_slug(&self, tenant_id: &str, slug: &str) -> BookingResult<Resource> {
        let resource_id = self
            .storage
            .resource_id_for_slug(tenant_id, slug)?
            .ok_or_else(|| BookingError::ResourceNotFound(slug.to_string()))?;
        self.resource(&resource_id)
    }

    /// Resources of a tenant ordered by slug
    pub fn resources_for_tenant(&self, tenant_id: &str) -> BookingResult<Vec<Resource>> {
        self.tenant(tenant_id)?;
        let mut resources = Vec::new();
        for id in self.storage.resource_ids_for_tenant(tenant_id)? {
            if let Some(resource) = self.storage.get_resource(&id)? {
                resources.push(resource);
            }
        }
        Ok(resources)
    }

    pub fn set_resource_active(&self, resource_id: &str, is_active: bool) -> BookingResult<Resource> {
        self.update_resource(resource_id, |resource| resource.is_active = is_active)
    }

    /// Replace the weekly schedule; existing bookings are left untouched
    pub fn set_resource_working_hours(
        &self,
        resource_id: &str,
        working_hours: Vec<WorkingHours>,
    ) -> BookingResult<Resource> {
        validate_working_hours(&working_hours)?;
        self.update_resource(resource_id, move |resource| {
            resource.working_hours = working_hours
        })
    }

    fn update_resource(
        &self,
        resource_id: &str,
        apply: impl FnOnce(&mut Resource),
    ) -> BookingResult<Resource> {
        let txn = self.storage.begin_write()?;
        let mut resource = self
            .storage
            .get_resource_txn(&txn, resource_id)?
            .ok_or_else(|| BookingError::ResourceNotFound(resource_id.to_string()))?;
        apply(&mut resource);
        resource.updated_at = now_millis();
        self.storage.put_resource(&txn, &resource)?;
        self.storage.commit(txn)?;

        tracing::info!(resource_id = %resource_id, is_active = resource.is_active, "Resource updated");
        Ok(resource)
    }
}

fn validate_working_hours(hours: &[WorkingHours]) -> BookingResult<()> {
    for wh in hours {
        if wh.open >= wh.close {
            return Err(BookingError::validation(format!(
                "working hours on {} must open before they close ({} >= {})",
                wh.weekday, wh.open, wh.close
            )));
        }
    }
    Ok(())
}
