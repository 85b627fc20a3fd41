use crate::entity::{EntityId, EntityRecord};
use crate::storage::{Storage, WriteTx, ENTITIES, EXTENTS, INBOUND, META, NEXT_ID};
use crate::{debug, AppError};
use redb::{ReadableTable, WriteTransaction};

/// One redb write transaction. Dropping it without commit discards every write.
pub struct StoreTx<'s> {
    storage: &'s Storage,
    tx: WriteTransaction,
    written: Vec<EntityId>,
}

impl<'s> StoreTx<'s> {
    pub(crate) fn begin(storage: &'s Storage) -> Result<Self, AppError> {
        Ok(StoreTx { storage, tx: storage.db.begin_write()?, written: Vec::new() })
    }

    pub fn written(&self) -> usize {
        self.written.len()
    }

    fn previous(&self, id: EntityId) -> Result<Option<EntityRecord>, AppError> {
        let entities = self.tx.open_table(ENTITIES)?;
        let previous = match entities.get(id.0)? {
            Some(guard) => Some(bincode::deserialize::<EntityRecord>(guard.value())?),
            None => None,
        };
        Ok(previous)
    }

    fn unindex(&self, record: &EntityRecord) -> Result<(), AppError> {
        let mut extents = self.tx.open_table(EXTENTS)?;
        for class in self.storage.schema.ancestors(&record.class) {
            extents.remove((class, record.id.0))?;
        }
        let mut inbound = self.tx.open_table(INBOUND)?;
        for target in record.all_targets() {
            inbound.remove((target.0, record.id.0))?;
        }
        Ok(())
    }

    fn index(&self, record: &EntityRecord) -> Result<(), AppError> {
        let mut extents = self.tx.open_table(EXTENTS)?;
        for class in self.storage.schema.ancestors(&record.class) {
            extents.insert((class, record.id.0), ())?;
        }
        let mut inbound = self.tx.open_table(INBOUND)?;
        for target in record.all_targets() {
            inbound.insert((target.0, record.id.0), ())?;
        }
        Ok(())
    }

    fn reserve_past(&self, id: EntityId) -> Result<(), AppError> {
        let mut meta = self.tx.open_table(META)?;
        let next = meta.get(NEXT_ID)?.map(|g| g.value()).unwrap_or(1);
        if id.0 >= next {
            meta.insert(NEXT_ID, id.0 + 1)?;
        }
        Ok(())
    }
}

impl WriteTx for StoreTx<'_> {
    fn next_id(&mut self) -> Result<EntityId, AppError> {
        let mut meta = self.tx.open_table(META)?;
        let next = meta.get(NEXT_ID)?.map(|g| g.value()).unwrap_or(1);
        meta.insert(NEXT_ID, next + 1)?;
        Ok(EntityId(next))
    }

    fn store(&mut self, entity: &EntityRecord) -> Result<(), AppError> {
        self.storage.schema.require_class(&entity.class)?;
        if let Some(previous) = self.previous(entity.id)? {
            self.unindex(&previous)?;
        }
        self.index(entity)?;
        {
            let bytes = bincode::serialize(entity)?;
            let mut entities = self.tx.open_table(ENTITIES)?;
            entities.insert(entity.id.0, bytes.as_slice())?;
        }
        self.reserve_past(entity.id)?;
        self.written.push(entity.id);
        Ok(())
    }

    fn commit(self) -> Result<(), AppError> {
        let StoreTx { storage, tx, written } = self;
        tx.commit()?;
        storage.cache.invalidate(&written)?;
        debug!("committed {} entity writes", written.len());
        Ok(())
    }

    fn abort(self) -> Result<(), AppError> {
        self.tx.abort()?;
        Ok(())
    }
}
