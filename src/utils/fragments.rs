/// Per-run fragment extraction and per-sample aggregation.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use sha2::{Digest, Sha256};

use crate::cli::Dimension;
use crate::config::defs::{NanopolishSubcommand, PipelineError, RunConfig};
use crate::utils::command::{nanopolish, run_tool_to_file};
use crate::utils::fastx::record_counter;
use crate::utils::file::concatenate_files;
use crate::utils::runlog::RunLog;
use crate::utils::tables::RunBarcodePair;
use crate::utils::workspace::SampleWorkspace;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentStatus {
    Built,
    Cached,
}

/// What happened to one sample during aggregation.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    pub sample: String,
    pub fragments: Vec<(PathBuf, FragmentStatus)>,
    /// None when there was nothing to concatenate.
    pub aggregate: Option<PathBuf>,
}

impl AggregateReport {
    pub fn built(&self) -> usize {
        self.fragments.iter().filter(|(_, s)| *s == FragmentStatus::Built).count()
    }

    pub fn cached(&self) -> usize {
        self.fragments.iter().filter(|(_, s)| *s == FragmentStatus::Cached).count()
    }
}

/// Extraction tool settings.
#[derive(Debug, Clone)]
pub struct Extractor {
    pub program: String,
    pub dimension: Dimension,
    pub force: bool,
}

impl Extractor {
    pub fn from_config(config: &RunConfig) -> Self {
        Extractor {
            program: config.nanopolish.clone(),
            dimension: config.args.dimension,
            force: config.args.force,
        }
    }
}


/// Materialises every fragment of `sample` and joins them, in pair order, into
/// the per-sample FASTA.
///
/// # Arguments
///
/// * `workspace` - Path resolution.
/// * `run_log` - Shared run log.
/// * `extractor` - Extraction tool settings.
/// * `sample` - Sample identifier.
/// * `pairs` - The sample's run/barcode pairs, in table order.
///
/// # Returns
/// AggregateReport; extraction failures are returned as errors.
pub async fn aggregate_sample(
    workspace: &SampleWorkspace,
    run_log: &RunLog,
    extractor: &Extractor,
    sample: &str,
    pairs: &[RunBarcodePair],
) -> Result<AggregateReport, PipelineError> {
    info!("Extracting {}", sample);
    let mut fragments = Vec::with_capacity(pairs.len());

    for pair in pairs {
        let status = ensure_fragment(workspace, run_log, extractor, sample, pair).await?;
        let path = workspace.fragment_fasta(sample, &pair.run_name, &pair.barcode_id);
        fragments.push((path, status));
    }

    let inputs: Vec<PathBuf> = fragments
        .iter()
        .map(|(p, _)| p.clone())
        .filter(|p| p.is_file())
        .collect();

    if inputs.is_empty() {
        warn!("No fragment files available for {}; skipping concatenation", sample);
        run_log.event(&format!("Unable to cat, no fasta files available for {}", sample))?;
        return Ok(AggregateReport { sample: sample.to_string(), fragments, aggregate: None });
    }

    let output = workspace.sample_fasta(sample);
    let bytes = concatenate_files(&inputs, &output).await?;
    match record_counter(&output) {
        Ok(n) => debug!("{}: {} reads, {} bytes from {} fragment(s)", output.display(), n, bytes, inputs.len()),
        Err(e) => warn!("Could not count records in {}: {}", output.display(), e),
    }
    run_log.event(&format!("Done writing complete fasta for {}", sample))?;

    Ok(AggregateReport { sample: sample.to_string(), fragments, aggregate: Some(output) })
}


async fn ensure_fragment(
    workspace: &SampleWorkspace,
    run_log: &RunLog,
    extractor: &Extractor,
    sample: &str,
    pair: &RunBarcodePair,
) -> Result<FragmentStatus, PipelineError> {
    let input_dir = workspace.extraction_input_dir(&pair.run_name, &pair.barcode_id);
    let output = workspace.fragment_fasta(sample, &pair.run_name, &pair.barcode_id);
    let stamp = workspace.fragment_stamp(sample, &pair.run_name, &pair.barcode_id);
    let digest = input_digest(&input_dir)?;

    if output.is_file() && !extractor.force {
        let stale = match (fs::read_to_string(&stamp).ok(), &digest) {
            (Some(recorded), Some(current)) => recorded.trim() != current,
            _ => false,
        };
        if !stale {
            debug!("{} already built", output.display());
            run_log.event(&format!("{} already in {}", output.display(), workspace.build_dir().display()))?;
            return Ok(FragmentStatus::Cached);
        }
        info!("Inputs of {} changed since it was built; rebuilding", output.display());
    }

    let digest = digest.ok_or_else(|| PipelineError::MissingFile(input_dir.clone()))?;
    let args = nanopolish::arg_generator(NanopolishSubcommand::Extract, extractor.dimension, &input_dir);
    run_tool_to_file(&extractor.program, &args, &output).await?;
    fs::write(&stamp, format!("{}\n", digest))?;
    Ok(FragmentStatus::Built)
}


/// SHA-256 over the sorted (relative path, size) listing of `dir`.
/// None if the directory does not exist.
pub fn input_digest(dir: &Path) -> io::Result<Option<String>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut entries = Vec::new();
    collect_entries(dir, dir, &mut entries)?;
    entries.sort();

    let mut hasher = Sha256::new();
    for (rel, size) in &entries {
        hasher.update(rel.as_bytes());
        hasher.update(b"\t");
        hasher.update(size.to_le_bytes());
        hasher.update(b"\n");
    }
    Ok(Some(format!("{:x}", hasher.finalize())))
}

fn collect_entries(root: &Path, dir: &Path, entries: &mut Vec<(String, u64)>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let meta = entry.metadata()?;
        if meta.is_dir() {
            collect_entries(root, &path, entries)?;
        } else {
            let rel = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().into_owned();
            entries.push((rel, meta.len()));
        }
    }
    Ok(())
}
