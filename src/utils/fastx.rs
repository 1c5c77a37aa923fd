use seq_io::fasta::Reader as FastaReader;
use std::io;
use std::path::Path;
use crate::utils::file::{file_reader, FileReader};


/// Opens a plain or gzipped FASTA file.
///
/// # Arguments
///
/// * `path`: &Path - Valid path to a FASTA file.
///
/// # Returns
/// io::Result<FastaReader<FileReader>>
///
pub fn fasta_reader(path: &Path) -> io::Result<FastaReader<FileReader>> {
    Ok(FastaReader::new(file_reader(path)?))
}


/// Counts the number of records in a FASTA.
///
/// # Arguments
///
/// * `path` - Valid path to a FASTA file.
///
/// # Returns
/// u64: Number of records in the FASTA.
///
pub fn record_counter(path: &Path) -> io::Result<u64> {
    let mut counter = 0;
    for record in fasta_reader(path)?.into_records() {
        record.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        counter += 1;
    }
    Ok(counter)
}


/// Header lines (without the leading '>') of every record, in file order.
pub fn fasta_headers(path: &Path) -> io::Result<Vec<String>> {
    let mut headers = Vec::new();
    for record in fasta_reader(path)?.into_records() {
        let record = record.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        headers.push(String::from_utf8_lossy(&record.head).into_owned());
    }
    Ok(headers)
}
