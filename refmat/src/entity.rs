//! Stored graph nodes. An [`EntityRecord`] is a plain value: the store hands out shared
//! `Arc<EntityRecord>` views and every mutation goes through [`EntityRecord::with_field`]-style
//! copies, so a cached view is never changed underneath its readers.

use crate::schema::FieldKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// Tagged value of one field, the currency of the field accessor registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Scalar(Option<Scalar>),
    Reference(Option<EntityId>),
    Collection(Vec<EntityId>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Scalar(_) => FieldKind::Attribute,
            FieldValue::Reference(_) => FieldKind::Reference,
            FieldValue::Collection(_) => FieldKind::Collection,
        }
    }

    /// Number of graph edges this value represents.
    pub fn edge_count(&self) -> usize {
        match self {
            FieldValue::Scalar(_) => 0,
            FieldValue::Reference(r) => usize::from(r.is_some()),
            FieldValue::Collection(ids) => ids.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub class: String,
    pub version: u64,
    pub attributes: BTreeMap<String, Scalar>,
    pub references: BTreeMap<String, EntityId>,
    pub collections: BTreeMap<String, Vec<EntityId>>,
}

impl EntityRecord {
    pub fn new(id: EntityId, class: impl Into<String>) -> Self {
        EntityRecord {
            id,
            class: class.into(),
            version: 0,
            attributes: BTreeMap::new(),
            references: BTreeMap::new(),
            collections: BTreeMap::new(),
        }
    }

    pub fn attribute(mut self, name: &str, value: impl Into<Scalar>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn reference(mut self, name: &str, target: EntityId) -> Self {
        self.references.insert(name.to_string(), target);
        self
    }

    pub fn collection(mut self, name: &str, targets: Vec<EntityId>) -> Self {
        self.collections.insert(name.to_string(), targets);
        self
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Scalar> {
        self.attributes.get(name)
    }

    pub fn get_reference(&self, name: &str) -> Option<EntityId> {
        self.references.get(name).copied()
    }

    pub fn get_collection(&self, name: &str) -> &[EntityId] {
        self.collections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids a reference or collection field points at, in stored order.
    pub fn targets(&self, field: &str) -> Vec<EntityId> {
        if let Some(id) = self.references.get(field) {
            vec![*id]
        } else {
            self.get_collection(field).to_vec()
        }
    }

    /// Every outgoing edge of this entity, one id per edge.
    pub fn all_targets(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.references.values().copied().chain(self.collections.values().flat_map(|ids| ids.iter().copied()))
    }

    /// Independent copy with the same id and a bumped version.
    pub fn next_version(&self) -> Self {
        let mut copy = self.clone();
        copy.version += 1;
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_cover_references_and_collections() {
        let gene = EntityRecord::new(EntityId(1), "Gene")
            .attribute("identifier", "CG1234")
            .reference("chromosome", EntityId(7))
            .collection("transcripts", vec![EntityId(3), EntityId(2)]);

        assert_eq!(gene.targets("chromosome"), vec![EntityId(7)]);
        assert_eq!(gene.targets("transcripts"), vec![EntityId(3), EntityId(2)]);
        assert!(gene.targets("exons").is_empty());
        assert_eq!(gene.all_targets().count(), 3);
    }

    #[test]
    fn next_version_keeps_identity() {
        let gene = EntityRecord::new(EntityId(9), "Gene").attribute("symbol", "eve");
        let copy = gene.next_version();
        assert_eq!(copy.id, gene.id);
        assert_eq!(copy.version, 1);
        assert_eq!(copy.attributes, gene.attributes);
    }
}
