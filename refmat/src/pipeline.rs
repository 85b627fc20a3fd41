use crate::materialize::{Materializer, StageReport};
use crate::query::{DerivedEdgeSpec, ReplicateSpec};
use crate::settings::MaterializeSettings;
use crate::storage::EntityStore;
use crate::{error, info, AppError};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone)]
pub enum Step {
    Materialize(DerivedEdgeSpec),
    Replicate(ReplicateSpec),
    /// Refreshes statistics of every class before later steps plan their joins.
    RefreshAllStatistics,
}

/// Ordered list of passes. Later steps read fields earlier steps write, so the order is part
/// of the pipeline's meaning and is never changed at run time.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub name: String,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub name: String,
    pub stages: Vec<StageReport>,
    pub checkpoints: usize,
    pub took_ms: u128,
}

/// A fatal error in one stage. Stages before it stay committed.
#[derive(Debug, Error)]
#[error("{pipeline} failed in {stage} after {} committed stages: {source}", .completed.len())]
pub struct PipelineFailure {
    pub pipeline: String,
    pub completed: Vec<StageReport>,
    pub stage: String,
    pub source: AppError,
}

impl Pipeline {
    pub fn new(name: &str) -> Self {
        Pipeline { name: name.to_string(), steps: Vec::new() }
    }

    pub fn materialize(mut self, spec: DerivedEdgeSpec) -> Self {
        self.steps.push(Step::Materialize(spec));
        self
    }

    pub fn replicate(mut self, spec: ReplicateSpec) -> Self {
        self.steps.push(Step::Replicate(spec));
        self
    }

    pub fn checkpoint(mut self) -> Self {
        self.steps.push(Step::RefreshAllStatistics);
        self
    }

    /// Appends the steps of `other` after the steps of this pipeline.
    pub fn then(mut self, other: Pipeline) -> Self {
        self.steps.extend(other.steps);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn run<S: EntityStore>(&self, store: &S, settings: &MaterializeSettings) -> Result<PipelineReport, PipelineFailure> {
        let started = Instant::now();
        let materializer = Materializer::new(store, settings.clone());
        let mut report = PipelineReport { name: self.name.clone(), stages: Vec::new(), checkpoints: 0, took_ms: 0 };
        info!("Running {} with {} steps", self.name, self.steps.len());

        for (idx, step) in self.steps.iter().enumerate() {
            let outcome = match step {
                Step::Materialize(spec) => materializer.run(spec).map(Some),
                Step::Replicate(spec) => materializer.replicate(spec).map(Some),
                Step::RefreshAllStatistics => store.refresh_all_statistics().map(|stats| {
                    info!("Refreshed statistics of {} classes", stats.len());
                    None
                }),
            };
            match outcome {
                Ok(Some(stage)) => report.stages.push(stage),
                Ok(None) => report.checkpoints += 1,
                Err(source) => {
                    let stage = format!("step {} ({})", idx + 1, step_name(step));
                    error!("{} failed in {}: {}", self.name, stage, source);
                    return Err(PipelineFailure { pipeline: self.name.clone(), completed: report.stages, stage, source });
                }
            }
        }
        report.took_ms = started.elapsed().as_millis();
        Ok(report)
    }
}

fn step_name(step: &Step) -> &str {
    match step {
        Step::Materialize(spec) => &spec.name,
        Step::Replicate(spec) => &spec.name,
        Step::RefreshAllStatistics => "statistics checkpoint",
    }
}

impl PipelineReport {
    pub fn edges_created(&self) -> usize {
        self.stages.iter().map(|s| s.edges_created).sum()
    }

    pub fn skipped_groups(&self) -> usize {
        self.stages.iter().map(|s| s.skipped_groups).sum()
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Fixed-width table of the stage outcomes.
    pub fn printable(&self) -> Vec<String> {
        let name_width = self.stages.iter().map(|s| s.name.len()).max().unwrap_or(5).max(5);
        let mut lines = Vec::with_capacity(self.stages.len() + 2);
        lines.push(format!(
            "{:<name_width$}  {:>10}   {:>10}   {:>10}   {:>10}   {:>10}",
            "STAGE", "groups", "written", "edges", "skipped", "ms", name_width = name_width
        ));
        lines.extend(self.stages.iter().map(|s| {
            format!(
                "{:<name_width$}  {:>10}   {:>10}   {:>10}   {:>10}   {:>10}",
                s.name, s.groups, s.entities_written, s.edges_created, s.skipped_groups, s.took_ms, name_width = name_width
            )
        }));
        lines.push(format!(
            "{:<name_width$}  {:>10}   {:>10}   {:>10}   {:>10}   {:>10}",
            "TOTAL",
            self.stages.iter().map(|s| s.groups).sum::<usize>(),
            self.stages.iter().map(|s| s.entities_written).sum::<usize>(),
            self.edges_created(),
            self.skipped_groups(),
            self.took_ms,
            name_width = name_width
        ));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::storage::test_utils::{gene_graph, seeded};

    #[test]
    fn stages_run_in_order_and_report() {
        let storage = seeded("pipeline_ok", gene_graph());
        let pipeline = Pipeline::new("test")
            .materialize(DerivedEdgeSpec::via_relation("Transcript", "SimpleRelation", "Exon", "exons"))
            .checkpoint()
            .materialize(DerivedEdgeSpec::via_field_path("Gene", "transcripts", "Transcript", "exons", "Exon", "gene"));
        let report = pipeline.run(&storage, &MaterializeSettings::default()).unwrap();

        assert_eq!(report.stages.len(), 2);
        assert_eq!(report.checkpoints, 1);
        assert_eq!(report.edges_created(), 5);
        assert!(storage.statistics("Relation").unwrap().is_some());
        let table = report.printable();
        assert_eq!(table.len(), 4);
        assert!(table[1].starts_with("Transcript.exons"));
        assert!(report.to_json().unwrap().contains("\"edges_created\": 3"));
        assert_eq!(storage.get(EntityId(11)).unwrap().unwrap().get_reference("gene"), Some(EntityId(1)));
    }

    #[test]
    fn fatal_error_keeps_completed_stages() {
        let storage = seeded("pipeline_fail", gene_graph());
        let pipeline = Pipeline::new("test")
            .materialize(DerivedEdgeSpec::via_relation("Transcript", "SimpleRelation", "Exon", "exons"))
            .materialize(DerivedEdgeSpec::via_relation("Transcript", "SimpleRelation", "Exon", "introns"))
            .materialize(DerivedEdgeSpec::via_field_path("Gene", "transcripts", "Transcript", "exons", "Exon", "gene"));
        let failure = pipeline.run(&storage, &MaterializeSettings::default()).unwrap_err();

        assert_eq!(failure.completed.len(), 1);
        assert_eq!(failure.stage, "step 2 (Transcript.introns)");
        assert!(failure.source.is_schema_error());
        assert!(failure.to_string().contains("after 1 committed stages"));
        assert!(storage.get(EntityId(10)).unwrap().unwrap().get_reference("gene").is_none());
    }
}
