/// Path resolution for every file the pipeline reads or writes.
///
/// All naming conventions live here so that no stage builds paths by
/// concatenating strings.
use std::path::{Path, PathBuf};
use crate::config::defs::{
    BASECALLED_SUBDIR, CHROM_DEPTH_EXT, CONSENSUS_EXT, DEPTH_EXT, ERROR_EXT, FASTA_EXT, PLOT_SCRIPT,
    RUNS_TABLE, RUN_LOG, SAMPLES_TABLE, SORTED_BAM_EXT, STAMP_EXT, VCF_EXT,
};
use crate::cli::Dimension;
use crate::config::defs::CONSENSUS_SCRIPT_TAG;
use crate::utils::coverage::CoverageTier;

#[derive(Debug, Clone)]
pub struct SampleWorkspace {
    data_dir: PathBuf,
    samples_dir: PathBuf,
    build_dir: PathBuf,
    scripts_dir: PathBuf,
}

impl SampleWorkspace {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        samples_dir: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
        scripts_dir: impl Into<PathBuf>,
    ) -> Self {
        SampleWorkspace {
            data_dir: data_dir.into(),
            samples_dir: samples_dir.into(),
            build_dir: build_dir.into(),
            scripts_dir: scripts_dir.into(),
        }
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn runs_table(&self) -> PathBuf {
        self.samples_dir.join(RUNS_TABLE)
    }

    pub fn samples_table(&self) -> PathBuf {
        self.samples_dir.join(SAMPLES_TABLE)
    }

    pub fn run_log(&self) -> PathBuf {
        self.build_dir.join(RUN_LOG)
    }

    /// Basecalled read directory for one run/barcode pair.
    pub fn extraction_input_dir(&self, run: &str, barcode: &str) -> PathBuf {
        self.data_dir.join(run).join(BASECALLED_SUBDIR).join(barcode)
    }

    pub fn fragment_fasta(&self, sample: &str, run: &str, barcode: &str) -> PathBuf {
        self.build_file(&format!("{}_{}_{}", sample, run, barcode), FASTA_EXT)
    }

    /// Sidecar holding the input digest a fragment was built from.
    pub fn fragment_stamp(&self, sample: &str, run: &str, barcode: &str) -> PathBuf {
        self.build_file(&format!("{}_{}_{}.{}", sample, run, barcode, FASTA_EXT), STAMP_EXT)
    }

    pub fn sample_fasta(&self, sample: &str) -> PathBuf {
        self.build_file(sample, FASTA_EXT)
    }

    /// Stem handed to the consensus script, which appends its own suffixes.
    pub fn sample_stem(&self, sample: &str) -> PathBuf {
        self.build_dir.join(sample)
    }

    pub fn consensus_fasta(&self, sample: &str) -> PathBuf {
        self.build_file(sample, CONSENSUS_EXT)
    }

    pub fn tier_fasta(&self, prefix: &str, tier: CoverageTier) -> PathBuf {
        self.build_file(&format!("{}_{}", prefix, tier.tag()), FASTA_EXT)
    }

    pub fn sorted_bam(&self, sample: &str) -> PathBuf {
        self.build_file(sample, SORTED_BAM_EXT)
    }

    pub fn depth_table(&self, sample: &str) -> PathBuf {
        self.build_file(sample, DEPTH_EXT)
    }

    pub fn chrom_depth_table(&self, sample: &str) -> PathBuf {
        self.build_file(sample, CHROM_DEPTH_EXT)
    }

    pub fn variants(&self, sample: &str) -> PathBuf {
        self.build_file(sample, VCF_EXT)
    }

    pub fn error_rate(&self, sample: &str) -> PathBuf {
        self.build_file(sample, ERROR_EXT)
    }

    pub fn consensus_script(&self, dimension: Dimension) -> PathBuf {
        self.scripts_dir.join(format!("{}_{}.sh", CONSENSUS_SCRIPT_TAG, dimension.tag()))
    }

    pub fn plot_script(&self) -> PathBuf {
        self.scripts_dir.join(PLOT_SCRIPT)
    }

    fn build_file(&self, stem: &str, ext: &str) -> PathBuf {
        self.build_dir.join(format!("{}.{}", stem, ext))
    }
}
