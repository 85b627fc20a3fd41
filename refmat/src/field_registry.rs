use crate::entity::{EntityRecord, FieldValue};
use crate::error::PartialFieldError;
use crate::schema::{FieldKind, Schema};
use std::collections::{BTreeMap, HashMap};

/// Describes how a single field reads and writes itself on a record, picked once by field kind.
#[derive(Clone)]
pub struct FieldAccessor {
    pub name: String,
    pub kind: FieldKind,
    pub get: fn(&EntityRecord, &str) -> FieldValue,
    pub set: fn(&mut EntityRecord, &str, FieldValue),
}

impl FieldAccessor {
    fn for_kind(name: &str, kind: FieldKind) -> Self {
        let (get, set): (fn(&EntityRecord, &str) -> FieldValue, fn(&mut EntityRecord, &str, FieldValue)) = match kind {
            FieldKind::Attribute => (get_attribute, set_attribute),
            FieldKind::Reference => (get_reference, set_reference),
            FieldKind::Collection => (get_collection, set_collection),
        };
        FieldAccessor { name: name.to_string(), kind, get, set }
    }
}

fn get_attribute(record: &EntityRecord, name: &str) -> FieldValue {
    FieldValue::Scalar(record.get_attribute(name).cloned())
}

fn set_attribute(record: &mut EntityRecord, name: &str, value: FieldValue) {
    if let FieldValue::Scalar(value) = value {
        match value {
            Some(scalar) => record.attributes.insert(name.to_string(), scalar),
            None => record.attributes.remove(name),
        };
    }
}

fn get_reference(record: &EntityRecord, name: &str) -> FieldValue {
    FieldValue::Reference(record.get_reference(name))
}

fn set_reference(record: &mut EntityRecord, name: &str, value: FieldValue) {
    if let FieldValue::Reference(value) = value {
        match value {
            Some(id) => record.references.insert(name.to_string(), id),
            None => record.references.remove(name),
        };
    }
}

fn get_collection(record: &EntityRecord, name: &str) -> FieldValue {
    FieldValue::Collection(record.get_collection(name).to_vec())
}

fn set_collection(record: &mut EntityRecord, name: &str, value: FieldValue) {
    if let FieldValue::Collection(ids) = value {
        if ids.is_empty() {
            record.collections.remove(name);
        } else {
            record.collections.insert(name.to_string(), ids);
        }
    }
}

/// Flattened (class, field) lookup built from schema metadata. Every class sees the accessors of
/// all of its ancestors, so no inheritance walk happens per row.
pub struct FieldRegistry {
    classes: HashMap<String, BTreeMap<String, FieldAccessor>>,
}

impl FieldRegistry {
    pub fn from_schema(schema: &Schema) -> Self {
        let classes = schema
            .classes()
            .map(|class| {
                let accessors = schema
                    .fields(&class.name)
                    .into_iter()
                    .map(|(name, field)| (name.to_string(), FieldAccessor::for_kind(name, field.kind)))
                    .collect();
                (class.name.clone(), accessors)
            })
            .collect();
        FieldRegistry { classes }
    }

    pub fn accessor(&self, class: &str, field: &str) -> Option<&FieldAccessor> {
        self.classes.get(class).and_then(|fields| fields.get(field))
    }

    pub fn fields_of(&self, class: &str) -> impl Iterator<Item = &FieldAccessor> {
        self.classes.get(class).into_iter().flat_map(|fields| fields.values())
    }

    pub fn get(&self, record: &EntityRecord, field: &str) -> Result<FieldValue, PartialFieldError> {
        let accessor = self.require(record, field)?;
        Ok((accessor.get)(record, field))
    }

    /// Independent copy of `record` with `field` set to `value`. The source record is left
    /// untouched, the copy keeps its id and carries the next version.
    pub fn with_field(&self, record: &EntityRecord, field: &str, value: FieldValue) -> Result<EntityRecord, PartialFieldError> {
        let accessor = self.require(record, field)?;
        if accessor.kind != value.kind() {
            return Err(PartialFieldError::KindMismatch {
                id: record.id,
                type_name: record.class.clone(),
                field: field.to_string(),
                declared: accessor.kind,
                given: value.kind(),
            });
        }
        let mut copy = record.next_version();
        (accessor.set)(&mut copy, field, value);
        Ok(copy)
    }

    fn require(&self, record: &EntityRecord, field: &str) -> Result<&FieldAccessor, PartialFieldError> {
        self.accessor(&record.class, field).ok_or_else(|| PartialFieldError::Undeclared {
            id: record.id,
            type_name: record.class.clone(),
            field: field.to_string(),
        })
    }
}
