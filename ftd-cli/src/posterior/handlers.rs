use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ArgMatches;

use ftd_core::models::IntervalSet;
use ftd_core::utils::get_dynamic_writer;
use ftd_posterior::{
    CountStore, ModelRegistry, PosteriorConfig, PosteriorScorer, ScoringPipeline,
    open_count_store, read_metadata,
};

use super::cli::DEFAULT_OUT;

///
/// Build the run configuration from the command line, falling back to the
/// library defaults for anything not given.
///
pub fn config_from_matches(matches: &ArgMatches) -> PosteriorConfig {
    let defaults = PosteriorConfig::default();

    PosteriorConfig {
        fdr_cutoff: matches
            .get_one::<f64>("fdr-cutoff")
            .copied()
            .unwrap_or(defaults.fdr_cutoff),
        post_cutoff: matches
            .get_one::<f64>("post-cutoff")
            .copied()
            .unwrap_or(defaults.post_cutoff),
        processors: matches
            .get_one::<usize>("processors")
            .copied()
            .unwrap_or(defaults.processors),
        readers: matches
            .get_one::<usize>("readers")
            .copied()
            .unwrap_or(defaults.readers),
        high_water_mark: matches
            .get_one::<usize>("queue-size")
            .copied()
            .unwrap_or(defaults.high_water_mark),
        window_radius: matches
            .get_one::<usize>("window")
            .copied()
            .unwrap_or(defaults.window_radius),
        tmp_dir: matches.get_one::<String>("tmpdir").map(PathBuf::from),
        keep_chunks: matches.get_flag("keep-chunks"),
        show_progress: !matches.get_flag("quiet"),
    }
}

pub fn run_posterior(matches: &ArgMatches) -> Result<()> {
    // clap enforces both positionals
    let metadata = matches
        .get_one::<String>("metadata")
        .context("A path to the metadata table is required.")?;
    let intervals = matches
        .get_one::<String>("intervals")
        .context("A path to an interval file is required.")?;
    let default_out = DEFAULT_OUT.to_string();
    let output = matches.get_one::<String>("output").unwrap_or(&default_out);

    let config = config_from_matches(matches);
    config.validate()?;

    // everything below up to the pipeline is fatal on failure
    let rows = read_metadata(Path::new(metadata))?;
    let registry = ModelRegistry::load(&rows)?;
    log::info!("Loaded {} datasets from {}", registry.len(), metadata);

    let stores = registry
        .count_stores()
        .iter()
        .map(|path| open_count_store(path))
        .collect::<Result<Vec<Box<dyn CountStore>>, _>>()?;

    let intervals = IntervalSet::try_from(Path::new(intervals))
        .with_context(|| format!("Failed to load intervals from {}", intervals))?;

    let scorer = PosteriorScorer::new(&registry, &config);
    let mut writer = get_dynamic_writer(output)?;
    ScoringPipeline::new(&config, &stores, &scorer).run(&intervals, &mut writer)?;
    writer.flush()?;

    Ok(())
}
