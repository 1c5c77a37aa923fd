#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tempfile::TempDir;

use zikaseq_pipelines::cli::Arguments;
use zikaseq_pipelines::config::defs::{PipelineError, RunConfig};
use zikaseq_pipelines::pipelines::consensus_genome::{self, Stage};
use zikaseq_pipelines::utils::coverage::CoverageTier;
use zikaseq_pipelines::utils::runlog::RunLog;
use zikaseq_pipelines::utils::workspace::SampleWorkspace;

const RUNS: &str = "sample_id\trun_name\tbarcode_id\n\
    S1\tRunA\tBC01\n\
    S1\tRunA\tBC02\n";
const SAMPLES: &str = "strain\tsample_id\tcollection_date\tcountry\tdivision\tlocation\n\
    strainX\tS1\t2015-01-01\tCountryX\tDivX\tLocX\n";

/// Temporary project tree with stand-in extraction and consensus tools.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(runs: &str, samples: &str) -> Result<Self> {
        let dir = TempDir::new()?;
        let root = dir.path();
        for sub in ["data", "samples", "build", "scripts", "refs"] {
            fs::create_dir_all(root.join(sub))?;
        }
        fs::write(root.join("samples/runs.tsv"), runs)?;
        fs::write(root.join("samples/samples.tsv"), samples)?;
        fs::write(root.join("refs/ref.fasta"), ">KJ776791.2\nACGT\n")?;
        fs::write(root.join("refs/amplicons.bed"), "KJ776791.2\t0\t500\tamp1\n")?;

        let calls = root.join("extract_calls.txt");
        write_script(
            &root.join("scripts/nanopolish"),
            &format!(
                "echo \"$@\" >> {calls}\nname=$(basename \"$4\")\necho \">read_$name\"\necho ACGTACGT\n",
                calls = calls.display()
            ),
        )?;
        // copies <stem>.expected into place, failing when it is absent
        write_script(
            &root.join("scripts/fasta_to_consensus_2d.sh"),
            "cp \"$2.expected\" \"$2.consensus.fasta\"\n",
        )?;
        Ok(Fixture { dir })
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn build(&self) -> PathBuf {
        self.root().join("build")
    }

    fn add_reads(&self, run: &str, barcode: &str) -> Result<()> {
        let reads = self.root().join("data").join(run).join("basecalled_reads/workspace").join(barcode);
        fs::create_dir_all(&reads)?;
        fs::write(reads.join("read.fast5"), b"fast5")?;
        Ok(())
    }

    fn expect_consensus(&self, sample: &str, seq: &str) -> Result<()> {
        fs::write(self.build().join(format!("{}.expected", sample)), format!(">KJ776791.2\n{}\n", seq))?;
        Ok(())
    }

    fn extract_calls(&self) -> usize {
        fs::read_to_string(self.root().join("extract_calls.txt"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    fn config(&self, extra: &[&str]) -> Result<Arc<RunConfig>> {
        let root = self.root();
        let mut argv: Vec<String> = vec!["zikaseq-pipelines".to_string(), "--skip-plots".to_string()];
        argv.extend(extra.iter().map(|s| s.to_string()));
        argv.extend([
            "--reference".to_string(),
            root.join("refs/ref.fasta").display().to_string(),
            "--amplicons".to_string(),
            root.join("refs/amplicons.bed").display().to_string(),
        ]);
        let args = Arguments::try_parse_from(argv)?;
        let workspace = SampleWorkspace::new(
            root.join("data"),
            root.join("samples"),
            self.build(),
            root.join("scripts"),
        );
        let run_log = RunLog::start(&workspace.run_log())?;
        Ok(Arc::new(RunConfig {
            cwd: root.to_path_buf(),
            args,
            workspace,
            run_log,
            nanopolish: root.join("scripts/nanopolish").display().to_string(),
        }))
    }
}

fn write_script(path: &Path, body: &str) -> Result<()> {
    fs::write(path, format!("#!/bin/sh\n{}", body))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

// 90% called
const GOOD_SEQ: &str = "ACGTACGTACGTACGTACNN";

#[tokio::test]
async fn test_single_sample_end_to_end() -> Result<()> {
    let fx = Fixture::new(RUNS, SAMPLES)?;
    fx.add_reads("RunA", "BC01")?;
    fx.add_reads("RunA", "BC02")?;
    fx.expect_consensus("S1", GOOD_SEQ)?;
    fs::write(
        fx.build().join("S1.vcf"),
        "#CHROM\tPOS\tID\tREF\tALT\nKJ\t1\t.\tA\tG\nKJ\t5\t.\tC\tTT\nKJ\t9\t.\tG\tA\n",
    )?;

    let summary = consensus_genome::run(fx.config(&["--prefix", "ZIKA"])?).await?;
    assert!(summary.is_success());
    assert_eq!(summary.tiers.members(CoverageTier::Good), ["S1"]);
    assert_eq!(fx.extract_calls(), 2);

    let build = fx.build();
    assert_eq!(
        fs::read_to_string(build.join("S1.fasta"))?,
        ">read_BC01\nACGTACGT\n>read_BC02\nACGTACGT\n"
    );
    assert_eq!(
        fs::read_to_string(build.join("ZIKA_good.fasta"))?,
        format!(">strainX|S1|2015-01-01|CountryX|DivX|LocX|minion\n{}\n", GOOD_SEQ)
    );
    assert_eq!(fs::read_to_string(build.join("ZIKA_partial.fasta"))?, "");
    assert_eq!(fs::read_to_string(build.join("ZIKA_poor.fasta"))?, "");
    assert_eq!(
        fs::read_to_string(build.join("S1.error"))?,
        format!("Error rate: {}", 4.0 / 10794.0)
    );

    let log = fs::read_to_string(build.join("log.txt"))?;
    assert!(log.contains("Samples:\nS1\n\t(RunA, BC01)\n\t(RunA, BC02)"));
    assert!(log.contains("Done writing complete fasta for S1"));
    assert!(log.contains("Consensus fasta completed for S1"));
    assert!(log.contains("Done gathering consensus fastas"));
    Ok(())
}

#[tokio::test]
async fn test_rerun_reuses_fragments() -> Result<()> {
    let fx = Fixture::new(RUNS, SAMPLES)?;
    fx.add_reads("RunA", "BC01")?;
    fx.add_reads("RunA", "BC02")?;
    fx.expect_consensus("S1", GOOD_SEQ)?;

    consensus_genome::run(fx.config(&[])?).await?;
    let first = fs::read(fx.build().join("S1.fasta"))?;
    assert_eq!(fx.extract_calls(), 2);

    consensus_genome::run(fx.config(&[])?).await?;
    assert_eq!(fx.extract_calls(), 2);
    assert_eq!(fs::read(fx.build().join("S1.fasta"))?, first);

    // changed inputs invalidate the cached fragment
    fs::write(
        fx.root().join("data/RunA/basecalled_reads/workspace/BC02/read2.fast5"),
        b"more",
    )?;
    consensus_genome::run(fx.config(&[])?).await?;
    assert_eq!(fx.extract_calls(), 3);

    consensus_genome::run(fx.config(&["--force"])?).await?;
    assert_eq!(fx.extract_calls(), 5);
    Ok(())
}

#[tokio::test]
async fn test_failing_sample_is_isolated() -> Result<()> {
    let runs = format!("{}S2\tRunB\tBC03\n", RUNS);
    let samples = format!("{}strainY\tS2\t2015-03-01\tCountryY\tDivY\tLocY\n", SAMPLES);
    let fx = Fixture::new(&runs, &samples)?;
    fx.add_reads("RunA", "BC01")?;
    fx.add_reads("RunA", "BC02")?;
    fx.add_reads("RunB", "BC03")?;
    fx.expect_consensus("S1", "ACGTACNNNN")?;
    // no expected consensus for S2: the consensus script exits nonzero

    let summary = consensus_genome::run(fx.config(&[])?).await?;
    assert!(!summary.is_success());
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].sample, "S2");
    assert_eq!(summary.failures[0].stage, Stage::Consensus);
    assert_eq!(summary.tiers.members(CoverageTier::Partial), ["S1"]);

    let strict = consensus_genome::run(fx.config(&["--strict"])?).await;
    assert!(matches!(strict, Err(PipelineError::ToolExecution { .. })));
    Ok(())
}

#[tokio::test]
async fn test_headerless_consensus_fails_at_coverage() -> Result<()> {
    let fx = Fixture::new(RUNS, SAMPLES)?;
    fx.add_reads("RunA", "BC01")?;
    fx.add_reads("RunA", "BC02")?;
    // header only, no sequence line
    fs::write(fx.build().join("S1.expected"), ">KJ776791.2\n")?;

    let summary = consensus_genome::run(fx.config(&["--prefix", "ZIKA"])?).await?;
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].stage, Stage::Coverage);
    assert!(summary.failures[0].error.contains("missing sequence line"));
    for tier in CoverageTier::all() {
        assert!(summary.tiers.members(tier).is_empty());
        assert_eq!(fs::read_to_string(fx.build().join(format!("ZIKA_{}.fasta", tier)))?, "");
    }
    Ok(())
}

#[tokio::test]
async fn test_unknown_sample_aborts() -> Result<()> {
    let fx = Fixture::new(RUNS, SAMPLES)?;
    let res = consensus_genome::run(fx.config(&["--samples", "S1,S9"])?).await;
    assert!(matches!(res, Err(PipelineError::UnknownSample { ref sample, .. }) if sample == "S9"));
    Ok(())
}

#[tokio::test]
async fn test_metadata_gap_fails_only_that_sample() -> Result<()> {
    let runs = format!("{}S2\tRunB\tBC03\n", RUNS);
    let fx = Fixture::new(&runs, SAMPLES)?;
    fx.add_reads("RunA", "BC01")?;
    fx.add_reads("RunA", "BC02")?;
    fx.expect_consensus("S1", GOOD_SEQ)?;

    let summary = consensus_genome::run(fx.config(&[])?).await?;
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].sample, "S2");
    assert_eq!(summary.failures[0].stage, Stage::Tables);
    assert_eq!(summary.tiers.members(CoverageTier::Good), ["S1"]);
    assert_eq!(fx.extract_calls(), 2);

    let strict = consensus_genome::run(fx.config(&["--strict"])?).await;
    assert!(matches!(strict, Err(PipelineError::SampleTableMismatch { .. })));
    Ok(())
}
