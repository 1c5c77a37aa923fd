// src/utils/runlog.rs: Append-only, timestamped run log
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Local;

use crate::config::defs::PipelineError;
use crate::utils::tables::RunBarcodePair;


/// Run log shared by all stages. Every write opens the file, appends and
/// closes it again; the mutex keeps lines from different writers whole.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RunLog {
    /// Truncates any previous log at `path` and writes the start banner.
    pub fn start(path: &Path) -> Result<Self, PipelineError> {
        let mut file = File::create(path)?;
        writeln!(file, "{}", Local::now().format("Pipeline started on %Y-%m-%d at %H:%M:%S"))?;
        Ok(RunLog {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `[HH:MM:SS] message`.
    pub fn event(&self, message: &str) -> Result<(), PipelineError> {
        self.append(&format!("{} {}", Local::now().format("[%H:%M:%S]"), message))
    }

    /// Writes the operator's sample list with each sample's run/barcode pairs.
    pub fn samples<'a, I>(&self, samples: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = (&'a String, &'a Vec<RunBarcodePair>)>,
    {
        let mut block = String::from("Samples:");
        for (sample, pairs) in samples {
            block.push('\n');
            block.push_str(sample);
            for pair in pairs {
                block.push_str(&format!("\n\t({}, {})", pair.run_name, pair.barcode_id));
            }
        }
        self.append(&block)
    }

    pub fn finish(&self, elapsed: Duration) -> Result<(), PipelineError> {
        let secs = elapsed.as_secs();
        let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
        self.append(&format!(
            "{}\nTotal runtime: {}:{:02}:{:02}",
            Local::now().format("Pipeline completed on %Y-%m-%d at %H:%M:%S"),
            h,
            m,
            s
        ))
    }

    fn append(&self, text: &str) -> Result<(), PipelineError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PipelineError::IOError("run log lock poisoned".to_string()))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn test_log_lifecycle() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "stale contents\n")?;

        let log = RunLog::start(&path)?;
        log.event("Done writing complete fasta for S1")?;
        log.finish(Duration::from_secs(3723))?;

        let text = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().collect();
        assert!(!text.contains("stale"));
        assert!(lines[0].starts_with("Pipeline started on "));
        assert!(lines[1].starts_with('['));
        assert!(lines[1].ends_with("] Done writing complete fasta for S1"));
        assert!(lines[2].starts_with("Pipeline completed on "));
        assert_eq!(lines[3], "Total runtime: 1:02:03");
        Ok(())
    }

    #[test]
    fn test_sample_block() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("log.txt");
        let log = RunLog::start(&path)?;
        let sample = "S1".to_string();
        let pairs = vec![
            RunBarcodePair { run_name: "RunA".to_string(), barcode_id: "BC01".to_string() },
            RunBarcodePair { run_name: "RunA".to_string(), barcode_id: "BC02".to_string() },
        ];
        log.samples([(&sample, &pairs)])?;

        let text = std::fs::read_to_string(&path)?;
        assert!(text.contains("Samples:\nS1\n\t(RunA, BC01)\n\t(RunA, BC02)\n"));
        Ok(())
    }
}
