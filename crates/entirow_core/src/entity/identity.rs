//! Identity map: one live record per `(type, id)`.

use crate::entity::{Entity, EntityRecord};
use crate::error::CoreResult;
use crate::schema::EntityType;
use entirow_codec::{ColumnMap, RowId};
use entirow_storage::Driver;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Per-type cache of loaded records.
///
/// Loading an id that is already cached returns the cached record without
/// any driver call. With a capacity set, the least recently used records
/// that nobody else holds are evicted once the map grows past it.
pub struct IdentityMap {
    ty: Arc<EntityType>,
    driver: Arc<dyn Driver>,
    capacity: Option<usize>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<RowId, Slot>,
    tick: u64,
}

struct Slot {
    entity: Entity,
    last_used: u64,
}

impl Inner {
    fn touch(&mut self, id: RowId) -> Option<Entity> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(&id).map(|slot| {
            slot.last_used = tick;
            Arc::clone(&slot.entity)
        })
    }
}

impl IdentityMap {
    pub(crate) fn new(ty: Arc<EntityType>, driver: Arc<dyn Driver>, capacity: Option<usize>) -> Self {
        Self {
            ty,
            driver,
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Returns the cached record for `id`, loading it on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::RecordNotFound`] if no row has this id.
    pub fn load(&self, id: RowId) -> CoreResult<Entity> {
        if let Some(entity) = self.inner.lock().touch(id) {
            tracing::trace!(table = self.ty.table(), %id, "identity map hit");
            return Ok(entity);
        }
        let record = EntityRecord::load(Arc::clone(&self.ty), Arc::clone(&self.driver), id)?;
        Ok(self.insert(id, record))
    }

    /// Returns the cached record for `id`, building it from `row` on a miss.
    ///
    /// A cached record wins over `row`, which may be stale.
    ///
    /// # Errors
    ///
    /// Returns an error if `row` lacks the blob column or the blob is invalid.
    pub fn load_from(&self, id: RowId, row: ColumnMap) -> CoreResult<Entity> {
        if let Some(entity) = self.inner.lock().touch(id) {
            return Ok(entity);
        }
        let record = EntityRecord::from_row(Arc::clone(&self.ty), Arc::clone(&self.driver), id, row)?;
        Ok(self.insert(id, record))
    }

    /// Returns the cached record without loading.
    pub fn get(&self, id: RowId) -> Option<Entity> {
        self.inner.lock().touch(id)
    }

    /// Returns true if `id` is cached.
    pub fn contains(&self, id: RowId) -> bool {
        self.inner.lock().entries.contains_key(&id)
    }

    /// Returns the number of cached records.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Drops `id` from the map. Holders keep their handle.
    pub fn remove(&self, id: RowId) -> Option<Entity> {
        self.inner.lock().entries.remove(&id).map(|slot| slot.entity)
    }

    /// Drops every cached record.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    fn insert(&self, id: RowId, record: EntityRecord) -> Entity {
        let mut inner = self.inner.lock();
        // Another caller may have loaded the same id while we were reading.
        if let Some(existing) = inner.touch(id) {
            return existing;
        }
        let entity = Arc::new(record);
        let tick = inner.tick;
        inner.entries.insert(
            id,
            Slot {
                entity: Arc::clone(&entity),
                last_used: tick,
            },
        );
        tracing::trace!(table = self.ty.table(), %id, "identity map insert");
        if let Some(capacity) = self.capacity {
            self.evict(&mut inner, capacity, id);
        }
        entity
    }

    fn evict(&self, inner: &mut Inner, capacity: usize, keep: RowId) {
        while inner.entries.len() > capacity {
            let victim = inner
                .entries
                .iter()
                .filter(|(id, slot)| **id != keep && Arc::strong_count(&slot.entity) == 1)
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(id, _)| *id);
            match victim {
                Some(id) => {
                    inner.entries.remove(&id);
                    tracing::trace!(table = self.ty.table(), %id, "identity map eviction");
                }
                None => {
                    tracing::warn!(
                        table = self.ty.table(),
                        cached = inner.entries.len(),
                        capacity,
                        "identity map over capacity, every record is still held"
                    );
                    break;
                }
            }
        }
    }
}

impl fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMap")
            .field("table", &self.ty.table())
            .field("cached", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
