/// Consensus building and header annotation.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use tempfile::NamedTempFile;

use crate::config::defs::{PipelineError, RunConfig, HEADER_DELIMITER, PLATFORM_TAG};
use crate::utils::command::{consensus, run_tool};
use crate::utils::runlog::RunLog;
use crate::utils::tables::Metadata;
use crate::utils::workspace::SampleWorkspace;


/// External consensus script and the reference files it is run against.
#[derive(Debug, Clone)]
pub struct ConsensusBuilder {
    pub script: PathBuf,
    pub reference: PathBuf,
    pub amplicons: PathBuf,
}

impl ConsensusBuilder {
    pub fn from_config(config: &RunConfig) -> Self {
        ConsensusBuilder {
            script: config.workspace.consensus_script(config.args.dimension),
            reference: PathBuf::from(&config.args.reference),
            amplicons: PathBuf::from(&config.args.amplicons),
        }
    }

    /// Reference and amplicon table must exist before any sample is run.
    pub fn check_inputs(&self) -> Result<(), PipelineError> {
        for path in [&self.reference, &self.amplicons] {
            if !path.is_file() {
                return Err(PipelineError::MissingFile(path.clone()));
            }
        }
        Ok(())
    }
}


/// `>strain|sample_id|date|country|division|location|minion`
pub fn consensus_header(metadata: &Metadata) -> String {
    let mut fields: Vec<&str> = metadata.fields().to_vec();
    fields.push(PLATFORM_TAG);
    format!(">{}", fields.join(HEADER_DELIMITER))
}


/// Runs the consensus script for one sample and stamps the metadata header
/// onto its output.
///
/// # Arguments
///
/// * `workspace` - Path resolution.
/// * `run_log` - Shared run log.
/// * `builder` - Consensus script and reference inputs.
/// * `sample` - Sample identifier.
/// * `metadata` - The sample's metadata row.
///
/// # Returns
/// Path of the annotated consensus FASTA.
pub async fn build_consensus(
    workspace: &SampleWorkspace,
    run_log: &RunLog,
    builder: &ConsensusBuilder,
    sample: &str,
    metadata: &Metadata,
) -> Result<PathBuf, PipelineError> {
    info!("Processing {}", sample);
    let consensus_path = workspace.consensus_fasta(sample);
    // A leftover file from an earlier run would hide a script that produced nothing
    if consensus_path.exists() {
        fs::remove_file(&consensus_path)?;
    }

    let args = consensus::arg_generator(&builder.reference, &workspace.sample_stem(sample), &builder.amplicons);
    run_tool(&builder.script.to_string_lossy(), &args).await?;

    if !consensus_path.is_file() {
        return Err(PipelineError::MissingConsensus {
            sample: sample.to_string(),
            path: consensus_path,
        });
    }

    rewrite_header(&consensus_path, &consensus_header(metadata))?;
    run_log.event(&format!("Consensus fasta completed for {}", sample))?;
    Ok(consensus_path)
}


/// Replaces the first line of `path` with `header`, leaving the sequence
/// lines byte-for-byte intact. The new contents go to a temporary file in the
/// same directory which is then renamed over the original.
pub fn rewrite_header(path: &Path, header: &str) -> Result<(), PipelineError> {
    let content = fs::read(path)?;
    if !content.starts_with(b">") {
        return Err(PipelineError::MalformedConsensus {
            path: path.to_path_buf(),
            reason: "first line is not a FASTA header".to_string(),
        });
    }
    let body: &[u8] = match content.iter().position(|&b| b == b'\n') {
        Some(idx) => &content[idx..],
        None => b"\n",
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(header.as_bytes())?;
    tmp.write_all(body)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| PipelineError::IOError(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn metadata() -> Metadata {
        Metadata {
            strain: "strainX".to_string(),
            sample_id: "S1".to_string(),
            collect_date: "2015-01-01".to_string(),
            country: "CountryX".to_string(),
            division: "DivX".to_string(),
            location: "LocX".to_string(),
        }
    }

    #[test]
    fn test_consensus_header() {
        assert_eq!(consensus_header(&metadata()), ">strainX|S1|2015-01-01|CountryX|DivX|LocX|minion");
    }

    #[test]
    fn test_rewrite_header_keeps_body() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("S1.consensus.fasta");
        fs::write(&path, ">KJ776791.2 consensus\nACGTNNACGT\nACGT\n")?;

        rewrite_header(&path, &consensus_header(&metadata()))?;
        assert_eq!(
            fs::read_to_string(&path)?,
            ">strainX|S1|2015-01-01|CountryX|DivX|LocX|minion\nACGTNNACGT\nACGT\n"
        );
        // nothing left behind in the directory
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_rewrite_rejects_headerless_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("S1.consensus.fasta");
        fs::write(&path, "ACGT\n")?;
        assert!(matches!(
            rewrite_header(&path, ">x"),
            Err(PipelineError::MalformedConsensus { .. })
        ));
        assert_eq!(fs::read_to_string(&path)?, "ACGT\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_script_without_output_is_missing_consensus() -> Result<()> {
        let dir = TempDir::new()?;
        let ws = SampleWorkspace::new(dir.path(), dir.path(), dir.path(), dir.path());
        let log = RunLog::start(&ws.run_log())?;
        fs::write(ws.consensus_fasta("S1"), ">stale\nACGT\n")?;
        let builder = ConsensusBuilder {
            script: PathBuf::from("true"),
            reference: dir.path().join("ref.fasta"),
            amplicons: dir.path().join("amplicons.bed"),
        };

        let err = build_consensus(&ws, &log, &builder, "S1", &metadata()).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingConsensus { ref sample, .. } if sample == "S1"));
        Ok(())
    }

    #[test]
    fn test_check_inputs() -> Result<()> {
        let dir = TempDir::new()?;
        let builder = ConsensusBuilder {
            script: PathBuf::from("true"),
            reference: dir.path().join("ref.fasta"),
            amplicons: dir.path().join("amplicons.bed"),
        };
        assert!(matches!(builder.check_inputs(), Err(PipelineError::MissingFile(p)) if p.ends_with("ref.fasta")));
        fs::write(&builder.reference, ">ref\nACGT\n")?;
        fs::write(&builder.amplicons, "KJ776791.2\t0\t500\n")?;
        builder.check_inputs()?;
        Ok(())
    }
}
