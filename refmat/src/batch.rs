use crate::entity::{EntityId, EntityRecord};
use crate::storage::{ClassStats, EntityStore, WriteTx};
use crate::{warn, AppError};

/// One materialization pass: a single open transaction, the number of records stored in it
/// and the class whose statistics are refreshed once it commits. Dropping an uncommitted
/// batch aborts its transaction.
pub struct Batch<'s, S: EntityStore + 's> {
    store: &'s S,
    tx: Option<S::Tx<'s>>,
    class: String,
    stored: usize,
}

impl<'s, S: EntityStore + 's> Batch<'s, S> {
    pub fn begin(store: &'s S, class: &str) -> Result<Self, AppError> {
        let tx = store.begin_transaction()?;
        Ok(Batch { store, tx: Some(tx), class: class.to_string(), stored: 0 })
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn stored(&self) -> usize {
        self.stored
    }

    pub fn store(&mut self, record: &EntityRecord) -> Result<(), AppError> {
        self.open_tx()?.store(record)?;
        self.stored += 1;
        Ok(())
    }

    pub fn next_id(&mut self) -> Result<EntityId, AppError> {
        self.open_tx()?.next_id()
    }

    /// Commits every stored record at once, then optionally refreshes statistics of the class.
    /// Once the commit went through the batch counts as done, a failed refresh only leaves the
    /// statistics out.
    pub fn commit(mut self, refresh_statistics: bool) -> Result<Option<ClassStats>, AppError> {
        let tx = self.tx.take().ok_or_else(|| AppError::Custom(format!("batch for {} already closed", self.class)))?;
        tx.commit()?;
        if !refresh_statistics {
            return Ok(None);
        }
        match self.store.refresh_statistics(&self.class) {
            Ok(stats) => Ok(Some(stats)),
            Err(err) => {
                warn!("Statistics refresh of {} failed after commit of {} records: {}", self.class, self.stored, err);
                Ok(None)
            }
        }
    }

    pub fn abort(mut self) -> Result<(), AppError> {
        match self.tx.take() {
            Some(tx) => tx.abort(),
            None => Ok(()),
        }
    }

    fn open_tx(&mut self) -> Result<&mut S::Tx<'s>, AppError> {
        let class = &self.class;
        self.tx.as_mut().ok_or_else(|| AppError::Custom(format!("batch for {} already closed", class)))
    }
}

impl<'s, S: EntityStore + 's> Drop for Batch<'s, S> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            warn!("Abandoning batch for {} with {} uncommitted records", self.class, self.stored);
            if let Err(err) = tx.abort() {
                warn!("Abort of batch for {} failed: {}", self.class, err);
            }
        }
    }
}
