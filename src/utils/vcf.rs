use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;

use crate::config::defs::PipelineError;
use crate::utils::file::file_reader;
use crate::utils::workspace::SampleWorkspace;


#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRate {
    pub sample: String,
    pub data_rows: u64,
    pub alt_bases: u64,
    pub rate: f64,
}


/// Sums the ALT allele lengths of a VCF
///
/// # Arguments
///
/// * `reader` - VCF lines; `#` header lines and blank lines are skipped.
/// * `path` - Source path, for error messages.
///
/// # Returns
///
/// result: tuple of (data rows, summed ALT field length)
pub fn sum_alt_lengths<R: BufRead>(reader: R, path: &Path) -> Result<(u64, u64), PipelineError> {
    let mut rows = 0;
    let mut alt_bases = 0;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim_end_matches('\r');
        if trimmed.trim().is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split('\t').collect();
        if fields.len() < 5 {
            return Err(PipelineError::MalformedRow {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: format!("expected at least 5 fields, found {}", fields.len()),
            });
        }
        rows += 1;
        alt_bases += fields[4].len() as u64;
    }
    Ok((rows, alt_bases))
}


/// Per-base error rate of one sample, written to `<sample>.error`.
///
/// # Arguments
///
/// * `workspace` - Path resolution.
/// * `sample` - Sample identifier.
/// * `reference_length` - Normalising genome length.
///
/// # Returns
///
/// None when the sample has no VCF or the VCF has no data rows; nothing is
/// written in that case and any earlier `<sample>.error` is removed.
pub fn estimate_error_rate(
    workspace: &SampleWorkspace,
    sample: &str,
    reference_length: f64,
) -> Result<Option<ErrorRate>, PipelineError> {
    let vcf = workspace.variants(sample);
    let error_file = workspace.error_rate(sample);
    if error_file.exists() {
        fs::remove_file(&error_file)?;
    }
    if !vcf.is_file() {
        debug!("No variant file for {}; skipping error rate", sample);
        return Ok(None);
    }
    let (data_rows, alt_bases) = sum_alt_lengths(BufReader::new(file_reader(&vcf)?), &vcf)?;
    if data_rows == 0 {
        debug!("{} has no variant rows; skipping error rate", vcf.display());
        return Ok(None);
    }

    let rate = alt_bases as f64 / reference_length;
    fs::write(&error_file, format!("Error rate: {}", rate))?;
    debug!("{}: {} ALT bases over {} rows, error rate {}", sample, alt_bases, data_rows, rate);
    Ok(Some(ErrorRate {
        sample: sample.to_string(),
        data_rows,
        alt_bases,
        rate,
    }))
}
