/// Loading of the runs and samples tables into per-sample mappings.
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use serde::Deserialize;

use crate::config::defs::{PipelineError, RUNS_TABLE, SAMPLES_TABLE};
use crate::utils::workspace::SampleWorkspace;


/// One sequencing run and the demultiplexing barcode of a sample within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunBarcodePair {
    pub run_name: String,
    pub barcode_id: String,
}

/// Fixed-order sample metadata, rendered into the consensus header.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Metadata {
    pub strain: String,
    pub sample_id: String,
    #[serde(rename = "collection_date")]
    pub collect_date: String,
    pub country: String,
    pub division: String,
    pub location: String,
}

impl Metadata {
    pub fn fields(&self) -> [&str; 6] {
        [
            &self.strain,
            &self.sample_id,
            &self.collect_date,
            &self.country,
            &self.division,
            &self.location,
        ]
    }
}

#[derive(Debug, Deserialize)]
struct RunRow {
    sample_id: String,
    run_name: String,
    barcode_id: String,
}

const RUN_COLUMNS: &[&str] = &["sample_id", "run_name", "barcode_id"];
const SAMPLE_COLUMNS: &[&str] = &["strain", "sample_id", "collection_date", "country", "division", "location"];

pub type RunMapping = BTreeMap<String, Vec<RunBarcodePair>>;
pub type MetadataMapping = BTreeMap<String, Metadata>;

#[derive(Debug, Clone, Default)]
pub struct SampleTables {
    pub runs: RunMapping,
    pub metadata: MetadataMapping,
}

impl SampleTables {
    /// Reads `runs.tsv` and `samples.tsv` from the workspace samples directory.
    /// The two tables are not cross-checked here; see [`SampleTables::validate_key_sets`].
    pub fn load(workspace: &SampleWorkspace) -> Result<Self, PipelineError> {
        let runs = load_run_mapping(&workspace.runs_table())?;
        let metadata = load_metadata_mapping(&workspace.samples_table())?;
        debug!("Loaded {} samples from {}, {} from {}", runs.len(), RUNS_TABLE, metadata.len(), SAMPLES_TABLE);
        Ok(SampleTables { runs, metadata })
    }

    /// Restricts both mappings to `subset`. Any identifier missing from either
    /// table aborts with `UnknownSample`.
    pub fn restrict(&self, subset: &[String]) -> Result<Self, PipelineError> {
        let mut runs = RunMapping::new();
        let mut metadata = MetadataMapping::new();
        for sample in subset {
            let pairs = self.runs.get(sample).ok_or_else(|| PipelineError::UnknownSample {
                sample: sample.clone(),
                table: RUNS_TABLE.to_string(),
            })?;
            let meta = self.metadata.get(sample).ok_or_else(|| PipelineError::UnknownSample {
                sample: sample.clone(),
                table: SAMPLES_TABLE.to_string(),
            })?;
            runs.insert(sample.clone(), pairs.clone());
            metadata.insert(sample.clone(), meta.clone());
        }
        Ok(SampleTables { runs, metadata })
    }

    /// Fails with the symmetric difference of the two key sets if they differ.
    pub fn validate_key_sets(&self) -> Result<(), PipelineError> {
        let run_keys: BTreeSet<&String> = self.runs.keys().collect();
        let meta_keys: BTreeSet<&String> = self.metadata.keys().collect();
        if run_keys == meta_keys {
            return Ok(());
        }
        Err(PipelineError::SampleTableMismatch {
            only_in_runs: run_keys.difference(&meta_keys).map(|s| s.to_string()).collect(),
            only_in_samples: meta_keys.difference(&run_keys).map(|s| s.to_string()).collect(),
        })
    }
}


/// sample_id -> run/barcode pairs, appended in row order.
pub fn load_run_mapping(path: &Path) -> Result<RunMapping, PipelineError> {
    let mut reader = open_table(path, RUN_COLUMNS)?;
    let mut mapping = RunMapping::new();
    for (idx, row) in reader.deserialize::<RunRow>().enumerate() {
        let row = row.map_err(|e| malformed(path, idx, e))?;
        mapping.entry(row.sample_id).or_default().push(RunBarcodePair {
            run_name: row.run_name,
            barcode_id: row.barcode_id,
        });
    }
    Ok(mapping)
}

/// sample_id -> metadata; a repeated sample_id keeps its last row.
pub fn load_metadata_mapping(path: &Path) -> Result<MetadataMapping, PipelineError> {
    let mut reader = open_table(path, SAMPLE_COLUMNS)?;
    let mut mapping = MetadataMapping::new();
    for (idx, row) in reader.deserialize::<Metadata>().enumerate() {
        let row = row.map_err(|e| malformed(path, idx, e))?;
        mapping.insert(row.sample_id.clone(), row);
    }
    Ok(mapping)
}

fn open_table(path: &Path, required: &[&str]) -> Result<csv::Reader<std::fs::File>, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::MissingFile(path.to_path_buf()));
    }
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .trim(Trim::Headers)
        .from_path(path)
        .map_err(|e| PipelineError::IOError(e.to_string()))?;
    let headers = reader.headers().map_err(|e| malformed(path, 0, e))?.clone();
    require_columns(path, &headers, required)?;
    Ok(reader)
}

fn require_columns(path: &Path, headers: &StringRecord, required: &[&str]) -> Result<(), PipelineError> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MalformedRow {
            path: path.to_path_buf(),
            line: 1,
            reason: format!("missing required column(s): {}", missing.join(", ")),
        })
    }
}

// Data rows start on line 2, after the header.
fn malformed(path: &Path, row_idx: usize, e: csv::Error) -> PipelineError {
    let line = e
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(row_idx + 2);
    PipelineError::MalformedRow {
        path: path.to_path_buf(),
        line,
        reason: e.to_string(),
    }
}
