//! Declarative derived-edge specifications and the join plans built from them.
//!
//! A plan yields rows of `(lead, related, connecting)` for one leading entity at a time. The
//! store drives the leads in ascending id order over the extent of the lead class, so every
//! join shape delivers the same ordering: lead id, then related id, then connecting id.

use crate::entity::{EntityId, EntityRecord};
use crate::error::AppError;
use crate::schema::{FieldDescriptor, FieldKind, Schema};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupBy {
    Source,
    Destination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    Single,
    Collection,
}

impl Cardinality {
    pub fn field_kind(self) -> FieldKind {
        match self {
            Cardinality::Single => FieldKind::Reference,
            Cardinality::Collection => FieldKind::Collection,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WriteMode {
    #[default]
    Replace,
    Merge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinPath {
    /// `source <-object- relation -subject-> destination`
    Relation { relation_type: String, object_field: String, subject_field: String },
    /// `source.source_field ∋ connecting`, `connecting.connecting_field ∋ destination`
    FieldPath { source_field: String, connecting_type: String, connecting_field: String },
    /// `source.source_field ∋ destination`, members filtered by the destination class
    Collection { source_field: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedEdgeSpec {
    pub name: String,
    pub source_type: String,
    pub destination_type: String,
    pub join: JoinPath,
    pub target_field: String,
    pub cardinality: Cardinality,
    pub group_by: GroupBy,
    #[serde(default)]
    pub write_mode: WriteMode,
}

impl DerivedEdgeSpec {
    /// Collects the subjects of every `relation_type` whose object is a `source_type` into
    /// `source_type.target_field`.
    pub fn via_relation(source_type: &str, relation_type: &str, destination_type: &str, target_field: &str) -> Self {
        DerivedEdgeSpec {
            name: format!("{}.{}", source_type, target_field),
            source_type: source_type.to_string(),
            destination_type: destination_type.to_string(),
            join: JoinPath::Relation {
                relation_type: relation_type.to_string(),
                object_field: "object".to_string(),
                subject_field: "subject".to_string(),
            },
            target_field: target_field.to_string(),
            cardinality: Cardinality::Collection,
            group_by: GroupBy::Source,
            write_mode: WriteMode::Replace,
        }
    }

    /// Points each destination at the source reached through the connecting class, written on
    /// `destination_type.target_field`.
    pub fn via_field_path(
        source_type: &str,
        source_field: &str,
        connecting_type: &str,
        connecting_field: &str,
        destination_type: &str,
        target_field: &str,
    ) -> Self {
        DerivedEdgeSpec {
            name: format!("{}.{}", destination_type, target_field),
            source_type: source_type.to_string(),
            destination_type: destination_type.to_string(),
            join: JoinPath::FieldPath {
                source_field: source_field.to_string(),
                connecting_type: connecting_type.to_string(),
                connecting_field: connecting_field.to_string(),
            },
            target_field: target_field.to_string(),
            cardinality: Cardinality::Single,
            group_by: GroupBy::Destination,
            write_mode: WriteMode::Replace,
        }
    }

    /// Copies the `member_type` members of `source_type.source_field` into their own collection.
    pub fn via_collection(source_type: &str, source_field: &str, member_type: &str, target_field: &str) -> Self {
        DerivedEdgeSpec {
            name: format!("{}.{}", source_type, target_field),
            source_type: source_type.to_string(),
            destination_type: member_type.to_string(),
            join: JoinPath::Collection { source_field: source_field.to_string() },
            target_field: target_field.to_string(),
            cardinality: Cardinality::Collection,
            group_by: GroupBy::Source,
            write_mode: WriteMode::Replace,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn grouped_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn merging(mut self) -> Self {
        self.write_mode = WriteMode::Merge;
        self
    }

    pub fn relation_fields(mut self, object: &str, subject: &str) -> Self {
        if let JoinPath::Relation { object_field, subject_field, .. } = &mut self.join {
            *object_field = object.to_string();
            *subject_field = subject.to_string();
        }
        self
    }

    /// Class whose entities are the group keys and receive the target field.
    pub fn lead_type(&self) -> &str {
        match self.group_by {
            GroupBy::Source => &self.source_type,
            GroupBy::Destination => &self.destination_type,
        }
    }

    pub fn related_type(&self) -> &str {
        match self.group_by {
            GroupBy::Source => &self.destination_type,
            GroupBy::Destination => &self.source_type,
        }
    }
}

/// Stores every related entity of a join again under a fresh id, with `owner_field` pointing
/// at the lead. With a `(field, class)` filter only related entities whose `field` reaches an
/// instance of `class` are copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicateSpec {
    pub name: String,
    pub edges: DerivedEdgeSpec,
    pub owner_field: String,
    #[serde(default)]
    pub filter: Option<(String, String)>,
}

impl ReplicateSpec {
    pub fn new(name: &str, edges: DerivedEdgeSpec, owner_field: &str) -> Self {
        ReplicateSpec { name: name.to_string(), edges, owner_field: owner_field.to_string(), filter: None }
    }

    pub fn only_when(mut self, field: &str, class: &str) -> Self {
        self.filter = Some((field.to_string(), class.to_string()));
        self
    }
}

/// How one hop of a join is tested, resolved from the declared field kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    Reference(String),
    Collection(String),
}

impl Link {
    /// Hops only follow fields `class` declares or inherits. A field carried by some subclass
    /// alone does not make a hop valid.
    pub fn resolve(schema: &Schema, class: &str, field: &str) -> Result<Link, AppError> {
        let descriptor = schema.field(class, field).ok_or_else(|| AppError::undeclared_field(class, field))?;
        match descriptor.kind {
            FieldKind::Reference => Ok(Link::Reference(field.to_string())),
            FieldKind::Collection => Ok(Link::Collection(field.to_string())),
            FieldKind::Attribute => Err(AppError::schema(format!("field {}.{} is an attribute and cannot be joined on", class, field))),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Link::Reference(f) | Link::Collection(f) => f,
        }
    }

    pub fn targets(&self, record: &EntityRecord) -> Vec<EntityId> {
        match self {
            Link::Reference(f) => record.get_reference(f).into_iter().collect(),
            Link::Collection(f) => record.get_collection(f).to_vec(),
        }
    }

    pub fn contains(&self, record: &EntityRecord, id: EntityId) -> bool {
        match self {
            Link::Reference(f) => record.get_reference(f) == Some(id),
            Link::Collection(f) => record.get_collection(f).contains(&id),
        }
    }
}

/// Target fields may live on a subclass of the written class, leads of other subclasses are
/// skipped row by row.
fn target_field<'a>(schema: &'a Schema, class: &str, field: &str) -> Result<&'a FieldDescriptor, AppError> {
    schema
        .field(class, field)
        .or_else(|| schema.declared_below(class, field))
        .ok_or_else(|| AppError::undeclared_field(class, field))
}

/// One joined row. `connecting` is absent for two-way joins.
#[derive(Debug, Clone)]
pub struct Row {
    pub lead: Arc<EntityRecord>,
    pub related: Arc<EntityRecord>,
    pub connecting: Option<Arc<EntityRecord>>,
}

/// Read access a plan needs while expanding one lead.
pub trait GraphView {
    fn schema(&self) -> &Schema;
    fn entity(&self, id: EntityId) -> Result<Option<Arc<EntityRecord>>, AppError>;
    /// Ids of the entities holding a reference or collection entry pointing at `id`, ascending.
    fn referrers(&self, id: EntityId) -> Result<Vec<EntityId>, AppError>;
}

#[derive(Debug, Clone)]
enum Shape {
    Relation { relation_type: String, lead_side: Link, related_side: Link },
    FieldPath { connecting_type: String, source: Link, connecting: Link },
    Collection { source: Link },
}

#[derive(Debug, Clone)]
pub struct JoinQuery {
    pub name: String,
    pub lead_type: String,
    pub related_type: String,
    pub group_by: GroupBy,
    pub target: FieldDescriptor,
    shape: Shape,
}

impl JoinQuery {
    /// Resolves every hop against the schema and checks the target field is declared on the
    /// lead class, or one of its subclasses, with a kind matching the cardinality.
    pub fn plan(spec: &DerivedEdgeSpec, schema: &Schema) -> Result<JoinQuery, AppError> {
        let shape = Self::shape(spec, schema)?;
        let lead_type = spec.lead_type();
        let target = target_field(schema, lead_type, &spec.target_field)?;
        let expected = spec.cardinality.field_kind();
        if target.kind != expected {
            return Err(AppError::schema(format!(
                "field {}.{} is {:?}, {} writes a {:?}",
                lead_type, spec.target_field, target.kind, spec.name, expected
            )));
        }
        Ok(JoinQuery {
            name: spec.name.clone(),
            lead_type: lead_type.to_string(),
            related_type: spec.related_type().to_string(),
            group_by: spec.group_by,
            target: target.clone(),
            shape,
        })
    }

    /// Plan for a replicate pass: the owner reference is written on copies of the related
    /// class instead of on the lead.
    pub fn plan_replica(spec: &ReplicateSpec, schema: &Schema) -> Result<JoinQuery, AppError> {
        let shape = Self::shape(&spec.edges, schema)?;
        let copied = spec.edges.related_type();
        let target = target_field(schema, copied, &spec.owner_field)?;
        if target.kind != FieldKind::Reference {
            return Err(AppError::schema(format!("field {}.{} is not a reference", copied, spec.owner_field)));
        }
        if let Some((field, class)) = &spec.filter {
            Link::resolve(schema, copied, field)?;
            schema.require_class(class)?;
        }
        Ok(JoinQuery {
            name: spec.name.clone(),
            lead_type: spec.edges.lead_type().to_string(),
            related_type: copied.to_string(),
            group_by: spec.edges.group_by,
            target: target.clone(),
            shape,
        })
    }

    fn shape(spec: &DerivedEdgeSpec, schema: &Schema) -> Result<Shape, AppError> {
        schema.require_class(&spec.source_type)?;
        schema.require_class(&spec.destination_type)?;
        match &spec.join {
            JoinPath::Relation { relation_type, object_field, subject_field } => {
                schema.require_class(relation_type)?;
                let object = Link::resolve(schema, relation_type, object_field)?;
                let subject = Link::resolve(schema, relation_type, subject_field)?;
                let (lead_side, related_side) = match spec.group_by {
                    GroupBy::Source => (object, subject),
                    GroupBy::Destination => (subject, object),
                };
                Ok(Shape::Relation { relation_type: relation_type.clone(), lead_side, related_side })
            }
            JoinPath::FieldPath { source_field, connecting_type, connecting_field } => {
                schema.require_class(connecting_type)?;
                let source = Link::resolve(schema, &spec.source_type, source_field)?;
                let connecting = Link::resolve(schema, connecting_type, connecting_field)?;
                Ok(Shape::FieldPath { connecting_type: connecting_type.clone(), source, connecting })
            }
            JoinPath::Collection { source_field } => {
                let source = Link::resolve(schema, &spec.source_type, source_field)?;
                Ok(Shape::Collection { source })
            }
        }
    }

    pub fn is_distinct(&self) -> bool {
        matches!(self.shape, Shape::FieldPath { .. })
    }

    pub fn connecting_type(&self) -> Option<&str> {
        match &self.shape {
            Shape::Relation { relation_type, .. } => Some(relation_type),
            Shape::FieldPath { connecting_type, .. } => Some(connecting_type),
            Shape::Collection { .. } => None,
        }
    }

    /// All rows of one lead, ordered by related id then connecting id.
    pub fn rows_for<G: GraphView>(&self, graph: &G, lead: &Arc<EntityRecord>) -> Result<Vec<Row>, AppError> {
        let mut pairs: Vec<(Arc<EntityRecord>, Option<Arc<EntityRecord>>)> = Vec::new();
        match (&self.shape, self.group_by) {
            (Shape::Relation { relation_type, lead_side, related_side }, _) => {
                for relation in self.fetch(graph, graph.referrers(lead.id)?, relation_type)? {
                    if !lead_side.contains(&relation, lead.id) {
                        continue;
                    }
                    for related in self.fetch(graph, related_side.targets(&relation), &self.related_type)? {
                        pairs.push((related, Some(relation.clone())));
                    }
                }
            }
            (Shape::FieldPath { connecting_type, source, connecting }, GroupBy::Source) => {
                for middle in self.fetch(graph, source.targets(lead), connecting_type)? {
                    for related in self.fetch(graph, connecting.targets(&middle), &self.related_type)? {
                        pairs.push((related, Some(middle.clone())));
                    }
                }
            }
            (Shape::FieldPath { connecting_type, source, connecting }, GroupBy::Destination) => {
                for middle in self.fetch(graph, graph.referrers(lead.id)?, connecting_type)? {
                    if !connecting.contains(&middle, lead.id) {
                        continue;
                    }
                    for related in self.fetch(graph, graph.referrers(middle.id)?, &self.related_type)? {
                        if source.contains(&related, middle.id) {
                            pairs.push((related, Some(middle.clone())));
                        }
                    }
                }
            }
            (Shape::Collection { source }, GroupBy::Source) => {
                for related in self.fetch(graph, source.targets(lead), &self.related_type)? {
                    pairs.push((related, None));
                }
            }
            (Shape::Collection { source }, GroupBy::Destination) => {
                for related in self.fetch(graph, graph.referrers(lead.id)?, &self.related_type)? {
                    if source.contains(&related, lead.id) {
                        pairs.push((related, None));
                    }
                }
            }
        }
        pairs.sort_by_key(|(related, connecting)| (related.id, connecting.as_ref().map(|c| c.id)));
        if self.is_distinct() {
            pairs.dedup_by_key(|(related, _)| related.id);
        }
        Ok(pairs.into_iter().map(|(related, connecting)| Row { lead: lead.clone(), related, connecting }).collect())
    }

    /// Loads `ids` and keeps those that are instances of `class`. Dangling ids are skipped.
    fn fetch<G: GraphView>(&self, graph: &G, ids: Vec<EntityId>, class: &str) -> Result<Vec<Arc<EntityRecord>>, AppError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = graph.entity(id)? {
                if graph.schema().is_a(&record.class, class) {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ClassDescriptor;
    use std::collections::BTreeMap;

    fn schema() -> Schema {
        Schema::builder("test")
            .class(ClassDescriptor::new("BioEntity").collection("subjects", "Relation"))
            .class(ClassDescriptor::new("Gene").extends("BioEntity").collection("transcripts", "Transcript").collection("exons", "Exon"))
            .class(ClassDescriptor::new("Transcript").extends("BioEntity").collection("exons", "Exon").reference("gene", "Gene"))
            .class(ClassDescriptor::new("MRNA").extends("Transcript").collection("UTRs", "UTR"))
            .class(ClassDescriptor::new("UTR").extends("BioEntity").reference("gene", "Gene"))
            .class(ClassDescriptor::new("Exon").extends("BioEntity").reference("gene", "Gene").attribute("identifier"))
            .class(ClassDescriptor::new("Relation").reference("object", "BioEntity").reference("subject", "BioEntity"))
            .class(ClassDescriptor::new("SimpleRelation").extends("Relation"))
            .build()
            .unwrap()
    }

    struct MemGraph {
        schema: Schema,
        records: BTreeMap<EntityId, Arc<EntityRecord>>,
    }

    impl MemGraph {
        fn new(records: Vec<EntityRecord>) -> Self {
            let records = records.into_iter().map(|r| (r.id, Arc::new(r))).collect();
            MemGraph { schema: schema(), records }
        }
    }

    impl GraphView for MemGraph {
        fn schema(&self) -> &Schema {
            &self.schema
        }

        fn entity(&self, id: EntityId) -> Result<Option<Arc<EntityRecord>>, AppError> {
            Ok(self.records.get(&id).cloned())
        }

        fn referrers(&self, id: EntityId) -> Result<Vec<EntityId>, AppError> {
            Ok(self.records.values().filter(|r| r.all_targets().any(|t| t == id)).map(|r| r.id).collect())
        }
    }

    fn graph() -> MemGraph {
        MemGraph::new(vec![
            EntityRecord::new(EntityId(1), "Gene").collection("transcripts", vec![EntityId(3), EntityId(2)]),
            EntityRecord::new(EntityId(2), "Transcript").collection("exons", vec![EntityId(11), EntityId(10)]),
            EntityRecord::new(EntityId(3), "Transcript").collection("exons", vec![EntityId(10)]),
            EntityRecord::new(EntityId(10), "Exon"),
            EntityRecord::new(EntityId(11), "Exon"),
            EntityRecord::new(EntityId(20), "SimpleRelation").reference("object", EntityId(2)).reference("subject", EntityId(11)),
            EntityRecord::new(EntityId(21), "SimpleRelation").reference("object", EntityId(2)).reference("subject", EntityId(10)),
        ])
    }

    fn ids(rows: &[Row]) -> Vec<(u64, u64, Option<u64>)> {
        rows.iter().map(|r| (r.lead.id.0, r.related.id.0, r.connecting.as_ref().map(|c| c.id.0))).collect()
    }

    #[test]
    fn relation_join_orders_by_related() {
        let graph = graph();
        let spec = DerivedEdgeSpec::via_relation("Transcript", "SimpleRelation", "Exon", "exons");
        let plan = JoinQuery::plan(&spec, &graph.schema).unwrap();
        let lead = graph.entity(EntityId(2)).unwrap().unwrap();
        assert_eq!(ids(&plan.rows_for(&graph, &lead).unwrap()), vec![(2, 10, Some(21)), (2, 11, Some(20))]);
    }

    #[test]
    fn field_path_join_is_distinct_per_pair() {
        let graph = graph();
        let spec = DerivedEdgeSpec::via_field_path("Gene", "transcripts", "Transcript", "exons", "Exon", "gene");
        let plan = JoinQuery::plan(&spec, &graph.schema).unwrap();
        assert!(plan.is_distinct());
        let exon = graph.entity(EntityId(10)).unwrap().unwrap();
        assert_eq!(ids(&plan.rows_for(&graph, &exon).unwrap()), vec![(10, 1, Some(2))]);

        let by_source = spec.clone().grouped_by(GroupBy::Source).with_cardinality(Cardinality::Collection);
        let by_source = DerivedEdgeSpec { target_field: "exons".to_string(), ..by_source };
        let plan = JoinQuery::plan(&by_source, &graph.schema).unwrap();
        let gene = graph.entity(EntityId(1)).unwrap().unwrap();
        assert_eq!(ids(&plan.rows_for(&graph, &gene).unwrap()), vec![(1, 10, Some(2)), (1, 11, Some(2))]);
    }

    #[test]
    fn collection_join_filters_member_type() {
        let graph = graph();
        let spec = DerivedEdgeSpec::via_collection("Gene", "transcripts", "Transcript", "transcripts").named("copy");
        let plan = JoinQuery::plan(&spec, &graph.schema).unwrap();
        let gene = graph.entity(EntityId(1)).unwrap().unwrap();
        assert_eq!(ids(&plan.rows_for(&graph, &gene).unwrap()), vec![(1, 2, None), (1, 3, None)]);
    }

    #[test]
    fn undeclared_fields_fail_planning() {
        let schema = schema();
        let bad_hop = DerivedEdgeSpec::via_field_path("Gene", "proteins", "Transcript", "exons", "Exon", "gene");
        let err = JoinQuery::plan(&bad_hop, &schema).unwrap_err();
        assert!(err.is_schema_error());
        assert!(err.to_string().contains("cannot find field \"proteins\" in class Gene"));

        let bad_target = DerivedEdgeSpec::via_relation("Transcript", "SimpleRelation", "Exon", "introns");
        assert!(JoinQuery::plan(&bad_target, &schema).unwrap_err().is_schema_error());

        let attribute_hop = DerivedEdgeSpec::via_collection("Exon", "identifier", "Gene", "gene");
        assert!(JoinQuery::plan(&attribute_hop, &schema).unwrap_err().is_schema_error());

        let bad_connecting = DerivedEdgeSpec::via_field_path("Gene", "transcripts", "Transcript", "introns", "Exon", "gene");
        let err = JoinQuery::plan(&bad_connecting, &schema).unwrap_err();
        assert!(err.to_string().contains("cannot find field \"introns\" in class Transcript"));

        let bad_relation_side = DerivedEdgeSpec::via_relation("Transcript", "SimpleRelation", "Exon", "exons").relation_fields("object", "target");
        assert!(JoinQuery::plan(&bad_relation_side, &schema).unwrap_err().is_schema_error());
    }

    #[test]
    fn connecting_field_declared_only_on_a_subclass_fails_planning() {
        let schema = schema();
        let subclass_hop = DerivedEdgeSpec::via_field_path("Gene", "transcripts", "Transcript", "UTRs", "UTR", "gene");
        let err = JoinQuery::plan(&subclass_hop, &schema).unwrap_err();
        assert!(err.is_schema_error());
        assert!(err.to_string().contains("cannot find field \"UTRs\" in class Transcript"));

        let on_subclass = DerivedEdgeSpec::via_field_path("Gene", "transcripts", "MRNA", "UTRs", "UTR", "gene");
        assert!(JoinQuery::plan(&on_subclass, &schema).is_ok());
    }

    #[test]
    fn target_field_may_live_on_a_subclass() {
        let schema = schema();
        assert!(Link::resolve(&schema, "Transcript", "UTRs").unwrap_err().is_schema_error());
        let spec = DerivedEdgeSpec::via_relation("Transcript", "SimpleRelation", "UTR", "UTRs");
        assert_eq!(JoinQuery::plan(&spec, &schema).unwrap().target.name, "UTRs");
    }

    #[test]
    fn target_kind_must_match_cardinality() {
        let spec = DerivedEdgeSpec::via_relation("Transcript", "SimpleRelation", "Gene", "gene");
        let err = JoinQuery::plan(&spec, &schema()).unwrap_err();
        assert!(err.to_string().contains("Transcript.gene"));
    }

    #[test]
    fn spec_serializes_to_json() {
        let spec = DerivedEdgeSpec::via_relation("Transcript", "SimpleRelation", "Exon", "exons").merging();
        let json = serde_json::to_string(&spec).unwrap();
        let back: DerivedEdgeSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
        assert_eq!(back.write_mode, WriteMode::Merge);
    }
}
