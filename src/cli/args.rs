use std::fmt;
use clap::{Parser, ValueEnum};
use crate::config::defs::{DEFAULT_REFERENCE_LENGTH, RSCRIPT_TAG, SAMTOOLS_TAG};

/// Library dimension of the nanopore runs. Selects the extraction read type
/// and the consensus script.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum Dimension {
    #[value(name = "1d")]
    OneD,
    #[default]
    #[value(name = "2d")]
    TwoD,
}

impl Dimension {
    pub fn tag(&self) -> &'static str {
        match self {
            Dimension::OneD => "1d",
            Dimension::TwoD => "2d",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "zikaseq-pipelines", version, about = "Nanopore viral consensus genome pipeline")]
pub struct Arguments {

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(long = "data-dir", default_value = "data/", help = "Directory containing raw run data")]
    pub data_dir: String,

    #[arg(long = "samples-dir", default_value = "samples/", help = "Directory containing runs.tsv and samples.tsv")]
    pub samples_dir: String,

    #[arg(short = 'o', long = "build-dir", default_value = "build/", help = "Output directory for all generated files")]
    pub build_dir: String,

    #[arg(long, default_value = "ZIKA_USVI", help = "Prepended onto all gathered consensus genome files")]
    pub prefix: String,

    #[arg(
        long,
        num_args = 1..,
        value_delimiter = ',',
        help = "Sample(s) to run; defaults to all samples listed in runs.tsv"
    )]
    pub samples: Option<Vec<String>>,

    #[arg(long = "dimension", default_value = "2d", value_enum)]
    pub dimension: Dimension,

    #[arg(long, default_value = "refs/KJ776791.2.fasta")]
    pub reference: String,

    #[arg(long, default_value = "metadata/v2_500.amplicons.ver2.bed", help = "Amplicon coordinate table (BED)")]
    pub amplicons: String,

    #[arg(long = "scripts-dir", default_value = "pipeline/scripts")]
    pub scripts_dir: String,

    #[arg(long, help = "Path to nanopolish; defaults to $EBROOTNANOPOLISH/nanopolish, then nanopolish on PATH")]
    pub nanopolish: Option<String>,

    #[arg(long, default_value = SAMTOOLS_TAG)]
    pub samtools: String,

    #[arg(long, default_value = RSCRIPT_TAG)]
    pub rscript: String,

    #[arg(long = "reference-length", default_value_t = DEFAULT_REFERENCE_LENGTH, help = "Genome length used to normalise per-base error rates")]
    pub reference_length: f64,

    #[arg(long, default_value_t = false, help = "Rebuild fragment files even if they already exist")]
    pub force: bool,

    #[arg(long, default_value_t = false, help = "Abort the whole run on the first failing sample")]
    pub strict: bool,

    #[arg(long = "skip-plots", default_value_t = false)]
    pub skip_plots: bool,
}
