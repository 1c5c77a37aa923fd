use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use log::{error, info, warn};

use crate::config::defs::{PipelineError, RunConfig, RUNS_TABLE, SAMPLES_TABLE};
use crate::utils::annotate::{build_consensus, ConsensusBuilder};
use crate::utils::coverage::{classify_sample, gather_tiers, CoverageTier, TierSummary};
use crate::utils::depth::{plot_sample_depth, DepthPlotter};
use crate::utils::fragments::{aggregate_sample, Extractor};
use crate::utils::tables::SampleTables;
use crate::utils::vcf::{estimate_error_rate, ErrorRate};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Tables,
    Extraction,
    Consensus,
    Coverage,
    ErrorRate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Tables => "tables",
            Stage::Extraction => "extraction",
            Stage::Consensus => "consensus",
            Stage::Coverage => "coverage",
            Stage::ErrorRate => "error rate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct SampleFailure {
    pub sample: String,
    pub stage: Stage,
    pub error: String,
}

/// Outcome of one pipeline invocation.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub samples: Vec<String>,
    /// Samples with nothing to concatenate; not failures.
    pub skipped: Vec<String>,
    pub failures: Vec<SampleFailure>,
    pub coverage: Vec<(String, f64, CoverageTier)>,
    pub tiers: TierSummary,
    pub error_rates: Vec<ErrorRate>,
    pub plotted: usize,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn log(&self) {
        info!(
            "{} samples: {} gathered, {} skipped, {} failed",
            self.samples.len(),
            self.coverage.len(),
            self.skipped.len(),
            self.failures.len()
        );
        for tier in CoverageTier::all() {
            info!("  {}: {}", tier, self.tiers.members(tier).join(" "));
        }
        for failure in &self.failures {
            error!("  {} failed during {}: {}", failure.sample, failure.stage, failure.error);
        }
    }
}


/// Keeps track of which samples are still in play. In strict mode the first
/// failure is returned instead of recorded.
struct Tracker {
    strict: bool,
    active: BTreeSet<String>,
    summary: RunSummary,
}

impl Tracker {
    fn is_active(&self, sample: &str) -> bool {
        self.active.contains(sample)
    }

    fn fail(&mut self, sample: &str, stage: Stage, e: PipelineError) -> Result<(), PipelineError> {
        if self.strict {
            return Err(e);
        }
        warn!("{} dropped during {}: {}", sample, stage, e);
        self.active.remove(sample);
        self.summary.failures.push(SampleFailure {
            sample: sample.to_string(),
            stage,
            error: e.to_string(),
        });
        Ok(())
    }

    fn record<T>(&mut self, sample: &str, stage: Stage, result: Result<T, PipelineError>) -> Result<Option<T>, PipelineError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) => self.fail(sample, stage, e).map(|_| None),
        }
    }
}


/// Picks the samples to run. An explicit subset must be present in both
/// tables. Without one every sample in the runs table is run; samples
/// lacking metadata fail (or abort the run in strict mode).
fn select_samples(config: &RunConfig, tables: SampleTables, tracker: &mut Tracker) -> Result<SampleTables, PipelineError> {
    let mut tables = match &config.args.samples {
        Some(subset) => tables.restrict(subset)?,
        None => tables,
    };
    tracker.active = tables.runs.keys().cloned().collect();
    tracker.summary.samples = tables.runs.keys().cloned().collect();

    if let Err(e) = tables.validate_key_sets() {
        if config.args.strict {
            return Err(e);
        }
        if let PipelineError::SampleTableMismatch { only_in_runs, only_in_samples } = &e {
            if !only_in_samples.is_empty() {
                warn!("Ignoring samples without runs: {}", only_in_samples.join(", "));
            }
            for sample in only_in_samples {
                tables.metadata.remove(sample);
            }
            for sample in only_in_runs {
                tracker.fail(sample, Stage::Tables, PipelineError::UnknownSample {
                    sample: sample.clone(),
                    table: SAMPLES_TABLE.to_string(),
                })?;
            }
        }
    }
    Ok(tables)
}


/// Runs extraction, consensus, gathering, depth plots and error rates over
/// every selected sample, one stage at a time.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// RunSummary; Err only for run-level failures, or any failure in strict mode.
pub async fn run(config: Arc<RunConfig>) -> Result<RunSummary, PipelineError> {
    println!("\n-------------\n Consensus Genome\n-------------\n");
    let workspace = &config.workspace;
    let run_log = &config.run_log;

    let builder = ConsensusBuilder::from_config(&config);
    builder.check_inputs()?;

    let tables = SampleTables::load(workspace)?;
    info!("Loaded {} and {} ({} / {} samples)", RUNS_TABLE, SAMPLES_TABLE, tables.runs.len(), tables.metadata.len());

    let mut tracker = Tracker {
        strict: config.args.strict,
        active: BTreeSet::new(),
        summary: RunSummary::default(),
    };
    let tables = select_samples(&config, tables, &mut tracker)?;
    run_log.samples(tables.runs.iter())?;

    // Fragments and per-sample FASTA
    let extractor = Extractor::from_config(&config);
    for (sample, pairs) in &tables.runs {
        if !tracker.is_active(sample) {
            continue;
        }
        let result = aggregate_sample(workspace, run_log, &extractor, sample, pairs).await;
        if let Some(report) = tracker.record(sample, Stage::Extraction, result)? {
            info!("{}: {} fragment(s) built, {} cached", sample, report.built(), report.cached());
            if report.aggregate.is_none() {
                tracker.active.remove(sample);
                tracker.summary.skipped.push(sample.clone());
            }
        }
    }

    // Consensus and header annotation
    for (sample, metadata) in &tables.metadata {
        if !tracker.is_active(sample) {
            continue;
        }
        let result = build_consensus(workspace, run_log, &builder, sample, metadata).await;
        tracker.record(sample, Stage::Consensus, result)?;
    }

    // Coverage tiers
    let mut assignments = Vec::new();
    let active: Vec<String> = tracker.active.iter().cloned().collect();
    for sample in &active {
        if let Some((coverage, tier)) = tracker.record(sample, Stage::Coverage, classify_sample(workspace, sample))? {
            info!("{}: coverage {:.3} ({})", sample, coverage, tier);
            tracker.summary.coverage.push((sample.clone(), coverage, tier));
            assignments.push((sample.clone(), tier));
        }
    }
    tracker.summary.tiers = gather_tiers(workspace, run_log, &config.args.prefix, &assignments).await?;

    // Depth plots never fail a sample
    if config.args.skip_plots {
        info!("Skipping depth plots");
    } else {
        let plotter = DepthPlotter::from_config(&config);
        for sample in &active {
            if !tracker.is_active(sample) {
                continue;
            }
            match plot_sample_depth(workspace, run_log, &plotter, sample).await {
                Ok(true) => tracker.summary.plotted += 1,
                Ok(false) => {}
                Err(e) => warn!("Depth plot for {} failed: {}", sample, e),
            }
        }
    }

    // Error rates
    let active: Vec<String> = tracker.active.iter().cloned().collect();
    for sample in &active {
        let result = estimate_error_rate(workspace, sample, config.args.reference_length);
        if let Some(Some(rate)) = tracker.record(sample, Stage::ErrorRate, result)? {
            tracker.summary.error_rates.push(rate);
        }
    }
    run_log.event("Done calculating per-base error rates")?;

    Ok(tracker.summary)
}
