pub mod cache;
pub mod results;
pub mod snapshot;
pub mod stats;
pub mod write;

pub use cache::{CacheStats, ObjectCache};
pub use results::{Objects, Results};
pub use snapshot::Snapshot;
pub use stats::ClassStats;
pub use write::StoreTx;

use crate::entity::{EntityId, EntityRecord};
use crate::query::{JoinQuery, Row};
use crate::schema::{FieldDescriptor, Schema};
use crate::settings::StoreSettings;
use crate::{info, AppError};
use redb::{Database, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{env, fs};

pub(crate) const ENTITIES: TableDefinition<'static, u64, &'static [u8]> = TableDefinition::new("entities");
pub(crate) const EXTENTS: TableDefinition<'static, (&'static str, u64), ()> = TableDefinition::new("extents");
pub(crate) const INBOUND: TableDefinition<'static, (u64, u64), ()> = TableDefinition::new("inbound");
pub(crate) const STATISTICS: TableDefinition<'static, &'static str, &'static [u8]> = TableDefinition::new("statistics");
pub(crate) const META: TableDefinition<'static, &'static str, u64> = TableDefinition::new("meta");

pub(crate) const NEXT_ID: &str = "next_id";

/// Persisted entity graph the engine reads joins from and writes derived fields into.
pub trait EntityStore {
    type Rows<'s>: Iterator<Item = Result<Row, AppError>>
    where
        Self: 's;
    type Tx<'s>: WriteTx
    where
        Self: 's;

    fn schema(&self) -> &Schema;

    fn field_descriptor(&self, class: &str, field: &str) -> Option<&FieldDescriptor> {
        self.schema().field(class, field)
    }

    /// Lazily executed rows of `plan`, fetched `fetch_batch_size` rows at a time.
    fn query<'s>(&'s self, plan: &JoinQuery, fetch_batch_size: usize) -> Result<Self::Rows<'s>, AppError>;

    fn begin_transaction(&self) -> Result<Self::Tx<'_>, AppError>;

    /// Independent copy of a possibly shared record, same id.
    fn clone_entity(&self, entity: &EntityRecord) -> EntityRecord {
        entity.clone()
    }

    fn get(&self, id: EntityId) -> Result<Option<Arc<EntityRecord>>, AppError>;

    /// Every instance of `class` or of one of its subclasses, ascending by id.
    fn select_objects_of_class<'s>(
        &'s self,
        class: &str,
        fetch_batch_size: usize,
    ) -> Result<Box<dyn Iterator<Item = Result<Arc<EntityRecord>, AppError>> + 's>, AppError>;

    fn refresh_statistics(&self, class: &str) -> Result<ClassStats, AppError>;

    fn refresh_all_statistics(&self) -> Result<Vec<ClassStats>, AppError> {
        let classes: Vec<String> = self.schema().classes().map(|c| c.name.clone()).collect();
        classes.iter().map(|class| self.refresh_statistics(class)).collect()
    }

    fn statistics(&self, class: &str) -> Result<Option<ClassStats>, AppError>;
}

pub trait WriteTx {
    fn next_id(&mut self) -> Result<EntityId, AppError>;
    /// Upsert by id.
    fn store(&mut self, entity: &EntityRecord) -> Result<(), AppError>;
    fn commit(self) -> Result<(), AppError>;
    fn abort(self) -> Result<(), AppError>;
}

pub struct Storage {
    pub(crate) db: Database,
    pub(crate) schema: Arc<Schema>,
    pub(crate) cache: ObjectCache,
    path: PathBuf,
}

impl Storage {
    pub fn open(schema: Schema, path: &Path, db_cache_size_mb: usize, object_cache_size: usize) -> Result<Storage, AppError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let existed = path.exists();
        let db = Database::builder().set_cache_size(db_cache_size_mb * 1024 * 1024).create(path)?;
        let tx = db.begin_write()?;
        {
            tx.open_table(ENTITIES)?;
            tx.open_table(EXTENTS)?;
            tx.open_table(INBOUND)?;
            tx.open_table(STATISTICS)?;
            tx.open_table(META)?;
        }
        tx.commit()?;
        if existed {
            info!("Opened {} store at {:?}", schema.name, path);
        } else {
            info!("Created {} store at {:?} with {} MB db cache", schema.name, path, db_cache_size_mb);
        }
        Ok(Storage { db, schema: Arc::new(schema), cache: ObjectCache::new(object_cache_size), path: path.to_path_buf() })
    }

    pub fn from_settings(schema: Schema, settings: &StoreSettings, object_cache_size: usize) -> Result<Storage, AppError> {
        Self::open(schema, &settings.db_path, settings.db_cache_size_mb, object_cache_size)
    }

    /// Fresh store under the system temp dir, never reusing an existing file.
    pub fn temp(name: &str, schema: Schema) -> Result<Storage, AppError> {
        let path = env::temp_dir().join("refmat").join(format!("{}_{}.redb", name, rand::random::<u64>()));
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Self::open(schema, &path, 16, 10_000)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cache_stats(&self) -> Result<CacheStats, AppError> {
        self.cache.stats()
    }

    pub fn snapshot(&self) -> Result<Snapshot<'_>, AppError> {
        Snapshot::open(self)
    }
}

impl EntityStore for Storage {
    type Rows<'s> = Results<'s>;
    type Tx<'s> = StoreTx<'s>;

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn query<'s>(&'s self, plan: &JoinQuery, fetch_batch_size: usize) -> Result<Results<'s>, AppError> {
        Results::new(self.snapshot()?, plan.clone(), fetch_batch_size)
    }

    fn begin_transaction(&self) -> Result<StoreTx<'_>, AppError> {
        StoreTx::begin(self)
    }

    fn get(&self, id: EntityId) -> Result<Option<Arc<EntityRecord>>, AppError> {
        self.snapshot()?.load(id)
    }

    fn select_objects_of_class<'s>(
        &'s self,
        class: &str,
        fetch_batch_size: usize,
    ) -> Result<Box<dyn Iterator<Item = Result<Arc<EntityRecord>, AppError>> + 's>, AppError> {
        self.schema.require_class(class)?;
        Ok(Box::new(Objects::new(self.snapshot()?, class, fetch_batch_size)))
    }

    fn refresh_statistics(&self, class: &str) -> Result<ClassStats, AppError> {
        self.schema.require_class(class)?;
        let stats = ClassStats::collect(&self.snapshot()?, class)?;
        stats.persist(&self.db)?;
        Ok(stats)
    }

    fn statistics(&self, class: &str) -> Result<Option<ClassStats>, AppError> {
        ClassStats::load(&self.db, class)
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use crate::query::DerivedEdgeSpec;

    #[test]
    fn upsert_keeps_extents_and_inbound_in_sync() {
        let storage = seeded("upsert", gene_graph());
        let mut tx = storage.begin_transaction().unwrap();
        tx.store(&EntityRecord::new(EntityId(3), "Transcript")).unwrap();
        tx.commit().unwrap();

        let snapshot = storage.snapshot().unwrap();
        assert_eq!(snapshot.referrers_of(EntityId(11)).unwrap(), vec![EntityId(2), EntityId(21), EntityId(22)]);
        let bio: Vec<EntityId> = snapshot.extent_after("BioEntity", None, 100).unwrap();
        assert_eq!(bio, vec![EntityId(1), EntityId(2), EntityId(3), EntityId(10), EntityId(11)]);
    }

    #[test]
    fn unknown_class_is_a_schema_error() {
        let storage = seeded("unknown_class", vec![]);
        let mut tx = storage.begin_transaction().unwrap();
        let err = tx.store(&EntityRecord::new(EntityId(5), "Pseudogene")).unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn next_id_skips_stored_ids() {
        let storage = seeded("next_id", gene_graph());
        let mut tx = storage.begin_transaction().unwrap();
        assert_eq!(tx.next_id().unwrap(), EntityId(23));
        assert_eq!(tx.next_id().unwrap(), EntityId(24));
        tx.abort().unwrap();
    }

    #[test]
    fn commit_invalidates_cached_records() {
        let storage = seeded("invalidate", gene_graph());
        let before = storage.get(EntityId(10)).unwrap().unwrap();
        assert!(before.get_reference("gene").is_none());

        let mut tx = storage.begin_transaction().unwrap();
        tx.store(&before.as_ref().clone().reference("gene", EntityId(1))).unwrap();
        tx.commit().unwrap();

        let after = storage.get(EntityId(10)).unwrap().unwrap();
        assert_eq!(after.get_reference("gene"), Some(EntityId(1)));
        assert!(before.get_reference("gene").is_none());
    }

    #[test]
    fn snapshot_keeps_its_view_after_newer_records_are_cached() {
        let storage = seeded("stale_snapshot", gene_graph());
        let snapshot = storage.snapshot().unwrap();
        let before = snapshot.load(EntityId(10)).unwrap().unwrap();

        let mut tx = storage.begin_transaction().unwrap();
        tx.store(&before.as_ref().clone().reference("gene", EntityId(1))).unwrap();
        tx.commit().unwrap();
        assert_eq!(storage.get(EntityId(10)).unwrap().unwrap().get_reference("gene"), Some(EntityId(1)));

        let seen = snapshot.load(EntityId(10)).unwrap().unwrap();
        assert!(seen.get_reference("gene").is_none());
        assert_eq!(seen.version, before.version);
    }

    #[test]
    fn aborted_writes_are_invisible() {
        let storage = seeded("abort", gene_graph());
        let mut tx = storage.begin_transaction().unwrap();
        tx.store(&EntityRecord::new(EntityId(40), "Exon")).unwrap();
        tx.abort().unwrap();
        assert!(storage.get(EntityId(40)).unwrap().is_none());
    }

    #[test]
    fn select_objects_of_class_is_polymorphic() {
        let storage = seeded("extent", gene_graph());
        let relations: Vec<EntityId> =
            storage.select_objects_of_class("Relation", 2).unwrap().map(|r| r.unwrap().id).collect();
        assert_eq!(relations, vec![EntityId(20), EntityId(21), EntityId(22)]);
        assert!(storage.select_objects_of_class("Pseudogene", 2).is_err());
    }

    #[test]
    fn query_rows_arrive_in_lead_order_across_batches() {
        let storage = seeded("query", gene_graph());
        let spec = DerivedEdgeSpec::via_relation("Transcript", "SimpleRelation", "Exon", "exons");
        let plan = JoinQuery::plan(&spec, storage.schema()).unwrap();
        let rows: Vec<(u64, u64)> =
            storage.query(&plan, 1).unwrap().map(|r| r.unwrap()).map(|r| (r.lead.id.0, r.related.id.0)).collect();
        assert_eq!(rows, vec![(2, 10), (2, 11), (3, 11)]);
    }

    #[test]
    fn statistics_are_refreshed_and_persisted() {
        let storage = seeded("stats", gene_graph());
        assert!(storage.statistics("Transcript").unwrap().is_none());
        let stats = storage.refresh_statistics("Transcript").unwrap();
        assert_eq!((stats.entities, stats.references, stats.collection_entries), (2, 0, 3));
        assert_eq!(storage.statistics("Transcript").unwrap(), Some(stats));
        assert_eq!(storage.refresh_all_statistics().unwrap().len(), 6);
    }
}
