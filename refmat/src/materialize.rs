use crate::aggregate::Grouped;
use crate::batch::Batch;
use crate::entity::{EntityId, EntityRecord};
use crate::field_registry::FieldRegistry;
use crate::query::{DerivedEdgeSpec, JoinPath, JoinQuery, ReplicateSpec};
use crate::settings::MaterializeSettings;
use crate::storage::{ClassStats, EntityStore};
use crate::updater::{CopyOnWrite, Diagnostic};
use crate::{error, info, AppError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of one committed pass.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub name: String,
    pub class: String,
    pub groups: usize,
    pub entities_written: usize,
    pub edges_created: usize,
    pub skipped_groups: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub statistics: Option<ClassStats>,
    pub took_ms: u128,
}

impl StageReport {
    fn new(name: &str, class: &str) -> Self {
        StageReport {
            name: name.to_string(),
            class: class.to_string(),
            groups: 0,
            entities_written: 0,
            edges_created: 0,
            skipped_groups: 0,
            diagnostics: Vec::new(),
            statistics: None,
            took_ms: 0,
        }
    }

    pub fn ambiguous_references(&self) -> usize {
        self.diagnostics.iter().filter(|d| matches!(d, Diagnostic::AmbiguousReference { .. })).count()
    }
}

/// Runs derived-edge passes against one store. Holds no state between passes apart from the
/// field registry built from the store schema.
pub struct Materializer<'s, S: EntityStore + 's> {
    store: &'s S,
    registry: FieldRegistry,
    settings: MaterializeSettings,
}

impl<'s, S: EntityStore + 's> Materializer<'s, S> {
    pub fn new(store: &'s S, settings: MaterializeSettings) -> Self {
        let registry = FieldRegistry::from_schema(store.schema());
        Materializer { store, registry, settings }
    }

    pub fn settings(&self) -> &MaterializeSettings {
        &self.settings
    }

    /// Plans `spec`, streams its groups through the copy-on-write updater into one batch and
    /// commits. Partial field errors skip their group; any other error aborts the batch.
    pub fn run(&self, spec: &DerivedEdgeSpec) -> Result<StageReport, AppError> {
        let started = Instant::now();
        info!("Beginning {}", describe(spec));
        let plan = JoinQuery::plan(spec, self.store.schema())?;
        let mut batch = Batch::begin(self.store, &plan.lead_type)?;
        let rows = self.store.query(&plan, self.settings.fetch_batch_size)?;
        let updater = CopyOnWrite::new(&self.registry);
        let mut report = StageReport::new(&spec.name, &plan.lead_type);

        for group in Grouped::new(rows.map(|row| row.map(|r| (r.lead, r.related.id)))) {
            let group = group?;
            report.groups += 1;
            match updater.apply(&group.lead, &spec.target_field, group.related, spec.cardinality, spec.write_mode) {
                Ok(update) => {
                    batch.store(&update.record)?;
                    report.entities_written += 1;
                    report.edges_created += update.edges;
                    report.diagnostics.extend(update.diagnostic);
                }
                Err(partial) => {
                    error!("{}", partial);
                    report.skipped_groups += 1;
                    report.diagnostics.push(Diagnostic::PartialField(partial));
                }
            }
        }

        report.statistics = batch.commit(self.settings.refresh_statistics)?;
        report.took_ms = started.elapsed().as_millis();
        info!(
            "Created {} references in {} via the {} field in {} ms, skipped {} groups",
            report.edges_created, plan.lead_type, spec.target_field, report.took_ms, report.skipped_groups
        );
        if report.ambiguous_references() > 0 {
            info!("{}: {} single-valued targets had more than one candidate", spec.name, report.ambiguous_references());
        }
        Ok(report)
    }

    /// Stores every related entity of the join again under a fresh id with its owner
    /// reference pointing at the lead, once per (lead, related) pair.
    pub fn replicate(&self, spec: &ReplicateSpec) -> Result<StageReport, AppError> {
        let started = Instant::now();
        info!("Beginning {}", spec.name);
        let plan = JoinQuery::plan_replica(spec, self.store.schema())?;
        let mut batch = Batch::begin(self.store, &plan.related_type)?;
        let rows = self.store.query(&plan, self.settings.fetch_batch_size)?;
        let updater = CopyOnWrite::new(&self.registry);
        let mut report = StageReport::new(&spec.name, &plan.related_type);
        let mut last: Option<(EntityId, EntityId)> = None;

        for row in rows {
            let row = row?;
            let pair = (row.lead.id, row.related.id);
            if last == Some(pair) || !self.passes_filter(spec, &row.related)? {
                continue;
            }
            last = Some(pair);
            report.groups += 1;
            let mut copy = self.store.clone_entity(&row.related);
            copy.id = batch.next_id()?;
            copy.version = 0;
            match updater.point_at(&copy, &spec.owner_field, row.lead.id) {
                Ok(record) => {
                    batch.store(&record)?;
                    report.entities_written += 1;
                    report.edges_created += 1;
                }
                Err(partial) => {
                    error!("{}", partial);
                    report.skipped_groups += 1;
                    report.diagnostics.push(Diagnostic::PartialField(partial));
                }
            }
        }

        report.statistics = batch.commit(self.settings.refresh_statistics)?;
        report.took_ms = started.elapsed().as_millis();
        info!("Created {} new {} records owned by {}", report.entities_written, plan.related_type, plan.lead_type);
        Ok(report)
    }

    fn passes_filter(&self, spec: &ReplicateSpec, record: &Arc<EntityRecord>) -> Result<bool, AppError> {
        let Some((field, class)) = &spec.filter else { return Ok(true) };
        for target in record.targets(field) {
            if let Some(found) = self.store.get(target)? {
                if self.store.schema().is_a(&found.class, class) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

fn describe(spec: &DerivedEdgeSpec) -> String {
    match &spec.join {
        JoinPath::Relation { relation_type, .. } => format!(
            "{}: {} -{}-> {} into {}.{}",
            spec.name,
            spec.source_type,
            relation_type,
            spec.destination_type,
            spec.lead_type(),
            spec.target_field
        ),
        JoinPath::FieldPath { source_field, connecting_type, connecting_field } => format!(
            "{}: {}.{} -> {}.{} -> {} into {}.{}",
            spec.name,
            spec.source_type,
            source_field,
            connecting_type,
            connecting_field,
            spec.destination_type,
            spec.lead_type(),
            spec.target_field
        ),
        JoinPath::Collection { source_field } => format!(
            "{}: {}.{} members of type {} into {}.{}",
            spec.name, spec.source_type, source_field, spec.destination_type, spec.lead_type(), spec.target_field
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Cardinality, GroupBy};
    use crate::storage::test_utils::{gene_graph, seeded};

    fn settings() -> MaterializeSettings {
        MaterializeSettings { fetch_batch_size: 2, ..MaterializeSettings::default() }
    }

    #[test]
    fn relation_pass_fills_collections() {
        let storage = seeded("mat_relation", gene_graph());
        let materializer = Materializer::new(&storage, settings());
        let report = materializer.run(&DerivedEdgeSpec::via_relation("Transcript", "SimpleRelation", "Exon", "exons")).unwrap();

        assert_eq!((report.groups, report.entities_written, report.edges_created), (2, 2, 3));
        assert_eq!(report.statistics.as_ref().unwrap().entities, 2);
        let transcript = storage.get(EntityId(2)).unwrap().unwrap();
        assert_eq!(transcript.get_collection("exons"), &[EntityId(10), EntityId(11)]);
        assert_eq!(transcript.version, 1);
    }

    #[test]
    fn field_path_pass_sets_single_references() {
        let storage = seeded("mat_field_path", gene_graph());
        let materializer = Materializer::new(&storage, settings());
        let spec = DerivedEdgeSpec::via_field_path("Gene", "transcripts", "Transcript", "exons", "Exon", "gene");
        let report = materializer.run(&spec).unwrap();

        assert_eq!(report.entities_written, 2);
        assert_eq!(report.ambiguous_references(), 0);
        for exon in [10, 11] {
            assert_eq!(storage.get(EntityId(exon)).unwrap().unwrap().get_reference("gene"), Some(EntityId(1)));
        }
    }

    #[test]
    fn field_path_grouped_by_source_collects_destinations() {
        let storage = seeded("mat_by_source", gene_graph());
        let materializer = Materializer::new(&storage, settings());
        let by_source = DerivedEdgeSpec::via_field_path("Gene", "transcripts", "Transcript", "exons", "Exon", "exons")
            .grouped_by(GroupBy::Source)
            .with_cardinality(Cardinality::Collection);
        let report = materializer.run(&by_source).unwrap();

        assert_eq!((report.groups, report.edges_created), (1, 2));
        let gene = storage.get(EntityId(1)).unwrap().unwrap();
        assert_eq!(gene.get_collection("exons"), &[EntityId(10), EntityId(11)]);
    }

    #[test]
    fn missing_target_on_lead_subtype_is_skipped_not_fatal() {
        let storage = seeded("mat_partial", gene_graph());
        let materializer = Materializer::new(&storage, settings());
        // transcripts is declared on Gene only, the Transcript leads cannot hold it.
        let spec = DerivedEdgeSpec::via_relation("BioEntity", "SimpleRelation", "Exon", "transcripts");
        let report = materializer.run(&spec).unwrap();

        assert_eq!(report.groups, 2);
        assert_eq!(report.skipped_groups, 2);
        assert_eq!(report.entities_written, 0);
        assert!(matches!(&report.diagnostics[0], Diagnostic::PartialField(e) if e.entity_id() == EntityId(2)));
    }

    #[test]
    fn schema_errors_fail_before_any_write() {
        let storage = seeded("mat_schema", gene_graph());
        let materializer = Materializer::new(&storage, settings());
        let spec = DerivedEdgeSpec::via_relation("Transcript", "SimpleRelation", "Exon", "introns");
        assert!(materializer.run(&spec).unwrap_err().is_schema_error());
        assert!(storage.statistics("Transcript").unwrap().is_none());
    }

    #[test]
    fn undeclared_connecting_field_fails_before_any_row() {
        let storage = seeded("mat_connecting", gene_graph());
        let materializer = Materializer::new(&storage, settings());
        let spec = DerivedEdgeSpec::via_field_path("Gene", "transcripts", "Transcript", "introns", "Exon", "gene");
        let err = materializer.run(&spec).unwrap_err();

        assert!(err.is_schema_error());
        assert!(err.to_string().contains("cannot find field \"introns\" in class Transcript"));
        assert!(storage.statistics("Exon").unwrap().is_none());
        for exon in [10, 11] {
            let exon = storage.get(EntityId(exon)).unwrap().unwrap();
            assert_eq!((exon.version, exon.get_reference("gene")), (0, None));
        }
    }
}
