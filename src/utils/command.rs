/// Functions and structs for building command lines and running external tools

use std::path::Path;
use std::process::{Output, Stdio};

use anyhow::{anyhow, Result};
use log::debug;
use tokio::process::Command;

use crate::config::defs::{PipelineError, TOOL_VERSIONS};


pub mod nanopolish {
    use std::path::Path;
    use crate::cli::Dimension;
    use crate::config::defs::NanopolishSubcommand;

    /// `nanopolish extract` writes the reads of one basecalled directory to stdout.
    pub fn arg_generator(subcommand: NanopolishSubcommand, dimension: Dimension, input_dir: &Path) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        match subcommand {
            NanopolishSubcommand::Extract => {
                args_vec.push("extract".to_string());
                args_vec.push("--type".to_string());
                match dimension {
                    Dimension::TwoD => args_vec.push("2d".to_string()),
                    Dimension::OneD => args_vec.push("template".to_string()),
                }
                // nanopolish wants the trailing slash on directories
                args_vec.push(format!("{}/", input_dir.display()));
            }
        }
        args_vec
    }
}

pub mod consensus {
    use std::path::Path;

    pub fn arg_generator(reference: &Path, sample_stem: &Path, amplicons: &Path) -> Vec<String> {
        vec![
            reference.to_string_lossy().to_string(),
            sample_stem.to_string_lossy().to_string(),
            amplicons.to_string_lossy().to_string(),
        ]
    }
}

pub mod samtools {
    use std::path::Path;
    use crate::config::defs::SamtoolsSubcommand;

    pub fn arg_generator(subcommand: SamtoolsSubcommand, bam: &Path) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        match subcommand {
            SamtoolsSubcommand::Depth => {
                args_vec.push("depth".to_string());
                args_vec.push(bam.to_string_lossy().to_string());
            }
        }
        args_vec
    }
}

pub mod rscript {
    use std::path::Path;

    pub fn arg_generator(script: &Path, in_file: &Path, out_path: &Path, name: &str) -> Vec<String> {
        vec![
            script.to_string_lossy().to_string(),
            "--inFile".to_string(),
            in_file.to_string_lossy().to_string(),
            "--outPath".to_string(),
            format!("{}/", out_path.display()),
            "--name".to_string(),
            name.to_string(),
        ]
    }
}


/// Runs a tool to completion. Stdout and stderr are captured and echoed at
/// debug level.
///
/// # Arguments
///
/// * `tool` - Executable name or path.
/// * `args` - Arguments from one of the arg generators.
///
/// # Returns
/// Ok on a zero exit status, ToolExecution otherwise.
pub async fn run_tool(tool: &str, args: &[String]) -> Result<(), PipelineError> {
    debug!("{} {}", tool, args.join(" "));
    let output = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| spawn_error(tool, e))?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        debug!("[{}] {}", tool, line);
    }
    check_status(tool, &output)
}


/// Runs a tool with its stdout redirected into `stdout_path`.
/// A failed run removes the partial output so it is never mistaken for a
/// finished file.
pub async fn run_tool_to_file(tool: &str, args: &[String], stdout_path: &Path) -> Result<(), PipelineError> {
    debug!("{} {} > {}", tool, args.join(" "), stdout_path.display());
    let out_file = std::fs::File::create(stdout_path)?;
    // output() would re-pipe stdout, so spawn with the file attached and wait
    let result = match Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(out_file))
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child
            .wait_with_output()
            .await
            .map_err(|e| spawn_error(tool, e))
            .and_then(|output| check_status(tool, &output)),
        Err(e) => Err(spawn_error(tool, e)),
    };

    if result.is_err() {
        let _ = std::fs::remove_file(stdout_path);
    }
    result
}

fn spawn_error(tool: &str, e: std::io::Error) -> PipelineError {
    PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: format!("Failed to spawn: {}. Is {} installed?", e, tool),
    }
}

fn check_status(tool: &str, output: &Output) -> Result<(), PipelineError> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
    Err(PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: format!(
            "exited with {}: {}",
            output.status,
            tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
        ),
    })
}


/// Probes `tool --version` and pulls the first dotted number out of the output.
///
/// # Arguments
///
/// * `tool` - Executable name or path.
/// * `tag` - Key into TOOL_VERSIONS for the minimum supported version.
///
/// # Returns
/// The version string; an error if the tool is absent or too old.
pub async fn check_version(tool: &str, tag: &str) -> Result<String> {
    let output = Command::new(tool)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| anyhow!("Failed to spawn {}: {}. Is {} installed?", tool, e, tag))?;

    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let version = parse_version(&text).ok_or_else(|| anyhow!("No version number in {} --version output", tool))?;

    if let Some(min) = TOOL_VERSIONS.get(tag) {
        let major_minor: f32 = version
            .split('.')
            .take(2)
            .collect::<Vec<_>>()
            .join(".")
            .parse()
            .map_err(|_| anyhow!("Unparseable {} version: {}", tag, version))?;
        if major_minor < *min {
            return Err(anyhow!("{} version {} is older than the minimum {}", tag, version, min));
        }
    }
    Ok(version)
}

fn parse_version(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|w| w.trim_start_matches('v'))
        .find(|w| w.contains('.') && w.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(|w| w.trim_end_matches(|c: char| !c.is_ascii_digit()).to_string())
}
