use crate::entity::{EntityId, EntityRecord, FieldValue};
use crate::error::PartialFieldError;
use crate::field_registry::FieldRegistry;
use crate::query::{Cardinality, WriteMode};
use serde::Serialize;

/// Non-fatal condition recorded against one group of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Diagnostic {
    PartialField(PartialFieldError),
    /// A single-valued target received several candidates; the last delivered one was written.
    AmbiguousReference { id: EntityId, field: String, candidates: usize, chosen: EntityId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub record: EntityRecord,
    pub edges: usize,
    pub diagnostic: Option<Diagnostic>,
}

/// Writes derived fields onto copies of possibly shared records. The input record is never
/// touched, the returned copy keeps its id.
pub struct CopyOnWrite<'r> {
    registry: &'r FieldRegistry,
}

impl<'r> CopyOnWrite<'r> {
    pub fn new(registry: &'r FieldRegistry) -> Self {
        CopyOnWrite { registry }
    }

    pub fn apply(
        &self,
        lead: &EntityRecord,
        field: &str,
        related: Vec<EntityId>,
        cardinality: Cardinality,
        mode: WriteMode,
    ) -> Result<Update, PartialFieldError> {
        match cardinality {
            Cardinality::Single => self.set_reference(lead, field, &related),
            Cardinality::Collection => self.set_collection(lead, field, related, mode),
        }
    }

    /// Points `field` of `record` at `target`, used for owner references on fresh copies.
    pub fn point_at(&self, record: &EntityRecord, field: &str, target: EntityId) -> Result<EntityRecord, PartialFieldError> {
        self.registry.with_field(record, field, FieldValue::Reference(Some(target)))
    }

    fn set_reference(&self, lead: &EntityRecord, field: &str, related: &[EntityId]) -> Result<Update, PartialFieldError> {
        let chosen = related.last().copied();
        let record = self.registry.with_field(lead, field, FieldValue::Reference(chosen))?;
        let diagnostic = match chosen {
            Some(chosen) if related.len() > 1 => Some(Diagnostic::AmbiguousReference {
                id: lead.id,
                field: field.to_string(),
                candidates: related.len(),
                chosen,
            }),
            _ => None,
        };
        Ok(Update { record, edges: usize::from(chosen.is_some()), diagnostic })
    }

    fn set_collection(&self, lead: &EntityRecord, field: &str, related: Vec<EntityId>, mode: WriteMode) -> Result<Update, PartialFieldError> {
        let mut ids = Vec::with_capacity(related.len());
        for id in related {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if mode == WriteMode::Merge {
            if let FieldValue::Collection(existing) = self.registry.get(lead, field)? {
                for id in existing {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
        }
        let edges = ids.len();
        let record = self.registry.with_field(lead, field, FieldValue::Collection(ids))?;
        Ok(Update { record, edges, diagnostic: None })
    }
}
