/// Depth tables and coverage plots. Best-effort: nothing here fails a sample.
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::defs::{PipelineError, RunConfig, SamtoolsSubcommand};
use crate::utils::command::{rscript, run_tool, run_tool_to_file, samtools};
use crate::utils::runlog::RunLog;
use crate::utils::workspace::SampleWorkspace;


#[derive(Debug, Clone)]
pub struct DepthPlotter {
    pub samtools: String,
    pub rscript: String,
    pub script: PathBuf,
}

impl DepthPlotter {
    pub fn from_config(config: &RunConfig) -> Self {
        DepthPlotter {
            samtools: config.args.samtools.clone(),
            rscript: config.args.rscript.clone(),
            script: config.workspace.plot_script(),
        }
    }
}


/// Copies the rows of the first chromosome in a `samtools depth` table.
///
/// # Returns
/// The chromosome name, or None for an empty table.
pub fn extract_first_chromosome(input: &Path, output: &Path) -> Result<Option<String>, PipelineError> {
    let reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);
    let mut chromosome: Option<String> = None;

    for line in reader.lines() {
        let line = line?;
        let name = match line.split('\t').next() {
            Some(name) if !name.is_empty() => name,
            _ => continue,
        };
        match &chromosome {
            None => chromosome = Some(name.to_string()),
            Some(c) if c != name => continue,
            Some(_) => {}
        }
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(chromosome)
}


/// `samtools depth` on the sample's sorted BAM, first chromosome only, then the
/// plotting script.
///
/// # Returns
/// false when the sample has no sorted BAM to plot.
pub async fn plot_sample_depth(
    workspace: &SampleWorkspace,
    run_log: &RunLog,
    plotter: &DepthPlotter,
    sample: &str,
) -> Result<bool, PipelineError> {
    let bam = workspace.sorted_bam(sample);
    if !bam.is_file() {
        debug!("No sorted BAM for {}; skipping depth plot", sample);
        return Ok(false);
    }
    info!("Drawing depth coverage for {}", sample);

    let depth = workspace.depth_table(sample);
    let args = samtools::arg_generator(SamtoolsSubcommand::Depth, &bam);
    run_tool_to_file(&plotter.samtools, &args, &depth).await?;

    let chrom_depth = workspace.chrom_depth_table(sample);
    match extract_first_chromosome(&depth, &chrom_depth)? {
        Some(chrom) => debug!("{}: plotting depth over {}", sample, chrom),
        None => debug!("{}: depth table is empty", sample),
    }

    let args = rscript::arg_generator(&plotter.script, &chrom_depth, workspace.build_dir(), sample);
    run_tool(&plotter.rscript, &args).await?;
    run_log.event(&format!("Done drawing overlap graphs for {}", sample))?;
    Ok(true)
}
