use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use env_logger::Builder;
use log::{self, LevelFilter, debug, error, info, warn};

use zikaseq_pipelines::cli::{parse, Arguments};
use zikaseq_pipelines::config::defs::{RunConfig, NANOPOLISH_ROOT_ENV, NANOPOLISH_TAG, SAMTOOLS_TAG};
use zikaseq_pipelines::pipelines::consensus_genome;
use zikaseq_pipelines::utils::command::check_version;
use zikaseq_pipelines::utils::runlog::RunLog;
use zikaseq_pipelines::utils::workspace::SampleWorkspace;


#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let mut args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n ZikaSeq\n-------------\n");

    let dir = env::current_dir()?;
    info!("The current directory is {:?}", dir);

    if !(args.reference_length > 0.0) {
        return Err(anyhow!("--reference-length must be positive, got {}", args.reference_length));
    }

    args.reference = absolute(&args.reference, &dir).to_string_lossy().into_owned();
    args.amplicons = absolute(&args.amplicons, &dir).to_string_lossy().into_owned();

    let build_dir = absolute(&args.build_dir, &dir);
    fs::create_dir_all(&build_dir)?;
    let workspace = SampleWorkspace::new(
        absolute(&args.data_dir, &dir),
        absolute(&args.samples_dir, &dir),
        build_dir,
        absolute(&args.scripts_dir, &dir),
    );
    let run_log = RunLog::start(&workspace.run_log())?;
    info!("Run log: {}", run_log.path().display());

    let nanopolish = resolve_nanopolish(&args);
    report_tool_versions(&nanopolish, &args).await;

    let run_config = Arc::new(RunConfig {
        cwd: dir,
        args,
        workspace,
        run_log,
        nanopolish,
    });

    let summary = match consensus_genome::run(run_config.clone()).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Pipeline failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
            let _ = run_config.run_log.event(&format!("Pipeline failed: {}", e));
            std::process::exit(1);
        }
    };

    summary.log();
    run_config.run_log.finish(run_start.elapsed())?;
    if !summary.is_success() {
        error!("{} sample(s) failed; see {}", summary.failures.len(), run_config.run_log.path().display());
        std::process::exit(1);
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}


/// Resolves `path` against `cwd` unless it is already absolute.
fn absolute(path: &str, cwd: &Path) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}


/// `--nanopolish`, else `$EBROOTNANOPOLISH/nanopolish`, else `nanopolish` on PATH.
fn resolve_nanopolish(args: &Arguments) -> String {
    if let Some(path) = &args.nanopolish {
        return path.clone();
    }
    match env::var(NANOPOLISH_ROOT_ENV) {
        Ok(root) if !root.is_empty() => Path::new(&root).join(NANOPOLISH_TAG).to_string_lossy().into_owned(),
        _ => NANOPOLISH_TAG.to_string(),
    }
}


/// Logs the versions of the tools the run depends on. Absent tools are only
/// warned about; the stage that needs them reports the real failure.
async fn report_tool_versions(nanopolish: &str, args: &Arguments) {
    for (tool, tag) in [(nanopolish, NANOPOLISH_TAG), (args.samtools.as_str(), SAMTOOLS_TAG)] {
        match check_version(tool, tag).await {
            Ok(version) => debug!("{} version {}", tag, version),
            Err(e) => warn!("{}", e),
        }
    }
}
