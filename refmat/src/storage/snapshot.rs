use crate::entity::{EntityId, EntityRecord};
use crate::query::GraphView;
use crate::schema::Schema;
use crate::storage::{Storage, ENTITIES, EXTENTS, INBOUND};
use crate::AppError;
use redb::{ReadOnlyTable, ReadableDatabase, ReadableTable};
use std::sync::Arc;

/// Consistent read view over the committed graph. Records are served from the shared object
/// cache first and published back into it while the view is still current.
pub struct Snapshot<'s> {
    storage: &'s Storage,
    generation: u64,
    entities: ReadOnlyTable<u64, &'static [u8]>,
    extents: ReadOnlyTable<(&'static str, u64), ()>,
    inbound: ReadOnlyTable<(u64, u64), ()>,
}

impl<'s> Snapshot<'s> {
    pub(crate) fn open(storage: &'s Storage) -> Result<Self, AppError> {
        let generation = storage.cache.generation()?;
        let tx = storage.db.begin_read()?;
        Ok(Snapshot {
            storage,
            generation,
            entities: tx.open_table(ENTITIES)?,
            extents: tx.open_table(EXTENTS)?,
            inbound: tx.open_table(INBOUND)?,
        })
    }

    /// Once a later commit bumped the cache generation, cached records may be newer than this
    /// view, so it reads its own tables only.
    pub fn load(&self, id: EntityId) -> Result<Option<Arc<EntityRecord>>, AppError> {
        if self.storage.cache.generation()? == self.generation {
            if let Some(hit) = self.storage.cache.get(id)? {
                return Ok(Some(hit));
            }
        }
        let record = match self.entities.get(id.0)? {
            Some(guard) => Arc::new(bincode::deserialize::<EntityRecord>(guard.value())?),
            None => return Ok(None),
        };
        self.storage.cache.insert(self.generation, record.clone())?;
        Ok(Some(record))
    }

    /// Up to `limit` ids of the `class` extent greater than `after`, ascending.
    pub fn extent_after(&self, class: &str, after: Option<EntityId>, limit: usize) -> Result<Vec<EntityId>, AppError> {
        let start = match after {
            Some(EntityId(u64::MAX)) => return Ok(Vec::new()),
            Some(id) => id.0 + 1,
            None => 0,
        };
        let mut ids = Vec::with_capacity(limit.min(1024));
        for entry in self.extents.range((class, start)..=(class, u64::MAX))? {
            if ids.len() >= limit {
                break;
            }
            let (key, _) = entry?;
            ids.push(EntityId(key.value().1));
        }
        Ok(ids)
    }

    pub fn referrers_of(&self, id: EntityId) -> Result<Vec<EntityId>, AppError> {
        let mut out = Vec::new();
        for entry in self.inbound.range((id.0, 0)..=(id.0, u64::MAX))? {
            let (key, _) = entry?;
            out.push(EntityId(key.value().1));
        }
        Ok(out)
    }
}

impl GraphView for Snapshot<'_> {
    fn schema(&self) -> &Schema {
        &self.storage.schema
    }

    fn entity(&self, id: EntityId) -> Result<Option<Arc<EntityRecord>>, AppError> {
        self.load(id)
    }

    fn referrers(&self, id: EntityId) -> Result<Vec<EntityId>, AppError> {
        self.referrers_of(id)
    }
}
