use crate::storage::{Snapshot, STATISTICS};
use crate::AppError;
use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};

/// Planner statistics of one class extent, subclasses included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassStats {
    pub class: String,
    pub entities: u64,
    pub references: u64,
    pub collection_entries: u64,
    /// Unix millis of the refresh.
    pub refreshed_at: i64,
}

impl ClassStats {
    pub(crate) fn collect(snapshot: &Snapshot<'_>, class: &str) -> Result<ClassStats, AppError> {
        let mut stats = ClassStats {
            class: class.to_string(),
            entities: 0,
            references: 0,
            collection_entries: 0,
            refreshed_at: Utc::now().timestamp_millis(),
        };
        let mut cursor = None;
        loop {
            let ids = snapshot.extent_after(class, cursor, 1000)?;
            if ids.is_empty() {
                break;
            }
            for id in ids {
                cursor = Some(id);
                if let Some(record) = snapshot.load(id)? {
                    stats.entities += 1;
                    stats.references += record.references.len() as u64;
                    stats.collection_entries += record.collections.values().map(|ids| ids.len() as u64).sum::<u64>();
                }
            }
        }
        Ok(stats)
    }

    pub(crate) fn persist(&self, db: &Database) -> Result<(), AppError> {
        let bytes = bincode::serialize(self)?;
        let tx = db.begin_write()?;
        {
            let mut table = tx.open_table(STATISTICS)?;
            table.insert(self.class.as_str(), bytes.as_slice())?;
        }
        tx.commit()?;
        Ok(())
    }

    pub(crate) fn load(db: &Database, class: &str) -> Result<Option<ClassStats>, AppError> {
        let tx = db.begin_read()?;
        let table = tx.open_table(STATISTICS)?;
        let found = match table.get(class)? {
            Some(guard) => Some(bincode::deserialize::<ClassStats>(guard.value())?),
            None => None,
        };
        Ok(found)
    }
}
