use std::path::PathBuf;
use crate::cli::Arguments;
use crate::utils::runlog::RunLog;
use crate::utils::workspace::SampleWorkspace;
use lazy_static::lazy_static;
use std::collections::HashMap;
use thiserror::Error;

// External software
pub const NANOPOLISH_TAG: &str = "nanopolish";
pub const SAMTOOLS_TAG: &str = "samtools";
pub const RSCRIPT_TAG: &str = "Rscript";
pub const CONSENSUS_SCRIPT_TAG: &str = "fasta_to_consensus";
pub const NANOPOLISH_ROOT_ENV: &str = "EBROOTNANOPOLISH";


lazy_static! {
    pub static ref TOOL_VERSIONS: HashMap<&'static str, f32> = {
        let mut m = HashMap::new();
        m.insert(NANOPOLISH_TAG, 0.8);
        m.insert(SAMTOOLS_TAG, 1.3);

        m
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamtoolsSubcommand {
    Depth
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NanopolishSubcommand {
    Extract
}

// Static Filenames
pub const RUNS_TABLE: &str = "runs.tsv";
pub const SAMPLES_TABLE: &str = "samples.tsv";
pub const RUN_LOG: &str = "log.txt";
pub const PLOT_SCRIPT: &str = "depth_coverage.R";
pub const BASECALLED_SUBDIR: &str = "basecalled_reads/workspace";

pub const FASTA_EXT: &str = "fasta";
pub const CONSENSUS_EXT: &str = "consensus.fasta";
pub const SORTED_BAM_EXT: &str = "sorted.bam";
pub const DEPTH_EXT: &str = "coverage";
pub const CHROM_DEPTH_EXT: &str = "chr1.coverage";
pub const VCF_EXT: &str = "vcf";
pub const ERROR_EXT: &str = "error";
pub const STAMP_EXT: &str = "sha256";


// Static Parameters

pub const HEADER_DELIMITER: &str = "|";
pub const PLATFORM_TAG: &str = "minion";
pub const AMBIGUOUS_BASES: &[u8] = b"Nn";
pub const GOOD_COVERAGE: f64 = 0.8;
pub const PARTIAL_COVERAGE: f64 = 0.5;
pub const DEFAULT_REFERENCE_LENGTH: f64 = 10794.0;


#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Missing required file: {0}")]
    MissingFile(PathBuf),

    #[error("Malformed row in {path} (line {line}): {reason}")]
    MalformedRow {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Malformed consensus file {path}: {reason}")]
    MalformedConsensus {
        path: PathBuf,
        reason: String,
    },

    #[error("Sample '{sample}' not found in {table}")]
    UnknownSample {
        sample: String,
        table: String,
    },

    #[error("Consensus for sample '{sample}' was not produced: {path} does not exist")]
    MissingConsensus {
        sample: String,
        path: PathBuf,
    },

    #[error("runs and samples tables disagree; only in runs: [{}]; only in samples: [{}]", .only_in_runs.join(", "), .only_in_samples.join(", "))]
    SampleTableMismatch {
        only_in_runs: Vec<String>,
        only_in_samples: Vec<String>,
    },

    #[error("{tool} failed: {error}")]
    ToolExecution {
        tool: String,
        error: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::IOError(e.to_string())
    }
}


pub struct RunConfig  {
    pub cwd: PathBuf,
    pub args: Arguments,
    pub workspace: SampleWorkspace,
    pub run_log: RunLog,
    pub nanopolish: String,
}
