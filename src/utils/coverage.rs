/// Coverage scoring of consensus sequences and gathering by quality tier.
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::defs::{PipelineError, AMBIGUOUS_BASES, GOOD_COVERAGE, PARTIAL_COVERAGE};
use crate::utils::fastx::record_counter;
use crate::utils::file::concatenate_files;
use crate::utils::runlog::RunLog;
use crate::utils::workspace::SampleWorkspace;


#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CoverageTier {
    Poor,
    Partial,
    Good,
}

impl CoverageTier {
    /// `[0.8, 1.0]` is Good, `[0.5, 0.8)` Partial, everything below Poor.
    pub fn classify(coverage: f64) -> CoverageTier {
        if coverage >= GOOD_COVERAGE {
            CoverageTier::Good
        } else if coverage >= PARTIAL_COVERAGE {
            CoverageTier::Partial
        } else {
            CoverageTier::Poor
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            CoverageTier::Poor => "poor",
            CoverageTier::Partial => "partial",
            CoverageTier::Good => "good",
        }
    }

    /// Order the tier files are written in.
    pub fn all() -> [CoverageTier; 3] {
        [CoverageTier::Good, CoverageTier::Partial, CoverageTier::Poor]
    }
}

impl fmt::Display for CoverageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}


/// Fraction of non-ambiguous symbols in `seq`.
pub fn coverage_fraction(seq: &[u8]) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    // called / total keeps an exact 80% or 50% on the threshold literal
    let ambiguous = seq.iter().filter(|b| AMBIGUOUS_BASES.contains(b)).count();
    (seq.len() - ambiguous) as f64 / seq.len() as f64
}


/// Sequence of the first record in a consensus FASTA, line terminators removed.
pub fn read_consensus_sequence(path: &Path) -> Result<Vec<u8>, PipelineError> {
    let content = fs::read(path)?;
    let mut lines = content.split(|&b| b == b'\n');
    let malformed = |reason: &str| PipelineError::MalformedConsensus {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    match lines.next() {
        Some(header) if header.starts_with(b">") => {}
        _ => return Err(malformed("missing header line")),
    }

    let mut seq = Vec::new();
    let mut seq_lines = 0usize;
    for line in lines {
        if line.starts_with(b">") {
            break;
        }
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        seq.extend_from_slice(line);
        seq_lines += 1;
    }
    if seq_lines == 0 {
        return Err(malformed("missing sequence line"));
    }
    Ok(seq)
}


/// Coverage and tier for one sample's consensus.
pub fn classify_sample(workspace: &SampleWorkspace, sample: &str) -> Result<(f64, CoverageTier), PipelineError> {
    let path = workspace.consensus_fasta(sample);
    if !path.is_file() {
        return Err(PipelineError::MissingConsensus { sample: sample.to_string(), path });
    }
    let seq = read_consensus_sequence(&path)?;
    let coverage = coverage_fraction(&seq);
    let tier = CoverageTier::classify(coverage);
    debug!("{}: {} bases, coverage {:.4} -> {}", sample, seq.len(), coverage, tier);
    Ok((coverage, tier))
}


#[derive(Debug, Clone, Default)]
pub struct TierSummary {
    /// Sorted sample identifiers per tier.
    pub members: BTreeMap<CoverageTier, Vec<String>>,
    pub outputs: BTreeMap<CoverageTier, PathBuf>,
}

impl TierSummary {
    pub fn members(&self, tier: CoverageTier) -> &[String] {
        self.members.get(&tier).map(|v| v.as_slice()).unwrap_or(&[])
    }
}


/// Writes `<prefix>_good.fasta`, `<prefix>_partial.fasta` and
/// `<prefix>_poor.fasta`, each the consensus files of its members in sorted
/// sample order. An empty tier produces an empty file without any
/// concatenation.
///
/// # Arguments
///
/// * `workspace` - Path resolution.
/// * `run_log` - Shared run log.
/// * `prefix` - Output file prefix.
/// * `assignments` - (sample, tier) for every classified sample.
///
/// # Returns
/// TierSummary with members and output paths.
pub async fn gather_tiers(
    workspace: &SampleWorkspace,
    run_log: &RunLog,
    prefix: &str,
    assignments: &[(String, CoverageTier)],
) -> Result<TierSummary, PipelineError> {
    info!("Concatenating consensus fastas");
    let mut summary = TierSummary::default();
    for tier in CoverageTier::all() {
        summary.members.insert(tier, Vec::new());
    }
    for (sample, tier) in assignments {
        summary.members.entry(*tier).or_default().push(sample.clone());
    }
    for members in summary.members.values_mut() {
        members.sort();
        members.dedup();
    }

    for tier in CoverageTier::all() {
        let members = summary.members(tier).to_vec();
        info!("{} samples: {}", tier, members.join(" "));
        let output = workspace.tier_fasta(prefix, tier);

        if members.is_empty() {
            fs::write(&output, b"")?;
            debug!("No {} samples; wrote empty {}", tier, output.display());
        } else {
            let inputs: Vec<PathBuf> = members.iter().map(|s| workspace.consensus_fasta(s)).collect();
            concatenate_files(&inputs, &output).await?;
            match record_counter(&output) {
                Ok(n) if n as usize != members.len() => warn!(
                    "{} holds {} records for {} samples",
                    output.display(),
                    n,
                    members.len()
                ),
                Ok(_) => {}
                Err(e) => warn!("Could not count records in {}: {}", output.display(), e),
            }
        }
        summary.outputs.insert(tier, output);
    }

    run_log.event("Done gathering consensus fastas")?;
    Ok(summary)
}
