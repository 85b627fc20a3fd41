use crate::entity::{EntityId, EntityRecord};
use crate::query::{JoinQuery, Row};
use crate::storage::Snapshot;
use crate::{debug, AppError};
use std::collections::VecDeque;
use std::sync::Arc;

/// Rows of one join plan, pulled lazily from a read snapshot. Each fetch expands leads in id
/// order until at least `batch_size` rows are buffered, so the full result is never held.
pub struct Results<'s> {
    snapshot: Snapshot<'s>,
    plan: JoinQuery,
    batch_size: usize,
    cursor: Option<EntityId>,
    buffer: VecDeque<Row>,
    exhausted: bool,
    batches: usize,
}

impl<'s> Results<'s> {
    pub fn new(snapshot: Snapshot<'s>, plan: JoinQuery, batch_size: usize) -> Result<Self, AppError> {
        Ok(Results {
            snapshot,
            plan,
            batch_size: batch_size.max(1),
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
            batches: 0,
        })
    }

    pub fn batches_fetched(&self) -> usize {
        self.batches
    }

    fn fetch_batch(&mut self) -> Result<(), AppError> {
        while self.buffer.len() < self.batch_size {
            let leads = self.snapshot.extent_after(&self.plan.lead_type, self.cursor, self.batch_size)?;
            if leads.is_empty() {
                self.exhausted = true;
                break;
            }
            for id in leads {
                self.cursor = Some(id);
                if let Some(lead) = self.snapshot.load(id)? {
                    self.buffer.extend(self.plan.rows_for(&self.snapshot, &lead)?);
                }
                if self.buffer.len() >= self.batch_size {
                    break;
                }
            }
        }
        self.batches += 1;
        debug!("{}: batch {} buffered {} rows", self.plan.name, self.batches, self.buffer.len());
        Ok(())
    }
}

impl Iterator for Results<'_> {
    type Item = Result<Row, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fetch_batch() {
                self.exhausted = true;
                self.buffer.clear();
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

/// Instances of one class and its subclasses, ascending by id, loaded in batches.
pub struct Objects<'s> {
    snapshot: Snapshot<'s>,
    class: String,
    batch_size: usize,
    cursor: Option<EntityId>,
    buffer: VecDeque<Arc<EntityRecord>>,
    exhausted: bool,
}

impl<'s> Objects<'s> {
    pub fn new(snapshot: Snapshot<'s>, class: &str, batch_size: usize) -> Self {
        Objects {
            snapshot,
            class: class.to_string(),
            batch_size: batch_size.max(1),
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fetch_batch(&mut self) -> Result<(), AppError> {
        let ids = self.snapshot.extent_after(&self.class, self.cursor, self.batch_size)?;
        if ids.is_empty() {
            self.exhausted = true;
        }
        for id in ids {
            self.cursor = Some(id);
            if let Some(record) = self.snapshot.load(id)? {
                self.buffer.push_back(record);
            }
        }
        Ok(())
    }
}

impl Iterator for Objects<'_> {
    type Item = Result<Arc<EntityRecord>, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fetch_batch() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
