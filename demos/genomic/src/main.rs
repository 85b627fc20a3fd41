use genomic::*;
use std::fs;

fn run_pipeline(storage: &Storage, pipeline: Pipeline, settings: &MaterializeSettings) -> Result<PipelineReport, AppError> {
    match pipeline.run(storage, settings) {
        Ok(report) => {
            report.printable().iter().for_each(|line| info!("{}", line));
            Ok(report)
        }
        Err(failure) => {
            error!("{}", failure);
            Err(failure.source)
        }
    }
}

fn main() -> Result<(), AppError> {
    let config: GenomicConfig = load_config("config/settings", "GENOMIC")?;
    let storage = Storage::from_settings(model::schema()?, &config.store, config.materialize.object_cache_size)?;

    if config.seed_demo_graph {
        let loaded = demo::graph().load(&storage)?;
        info!("Seeded {} demo records into {}", loaded, storage.path().display());
    }

    let mut reports = vec![run_pipeline(&storage, stages::insert_references(), &config.materialize)?];
    if config.populate_orthologues {
        reports.push(run_pipeline(&storage, stages::populate_orthologues(), &config.materialize)?);
    }

    let cache = storage.cache_stats()?;
    info!("Object cache: {} entries, {} hits, {} misses", cache.entries, cache.hits, cache.misses);

    if let Some(path) = &config.report_path {
        fs::write(path, serde_json::to_string_pretty(&reports)?)?;
        info!("Report written to {}", path.display());
    }
    Ok(())
}
