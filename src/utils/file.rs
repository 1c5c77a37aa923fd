use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use flate2::read::MultiGzDecoder;
use tokio::fs::File as TokioFile;
use tokio::io::{AsyncWriteExt, BufWriter};

pub fn is_gzipped(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 2];
    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1F, 0x8B]), // Gzip magic bytes
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Plain or gzip-compressed file, picked by magic bytes.
pub enum FileReader {
    Uncompressed(BufReader<File>),
    Gzipped(MultiGzDecoder<File>),
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileReader::Uncompressed(r) => r.read(buf),
            FileReader::Gzipped(r) => r.read(buf),
        }
    }
}

pub fn file_reader(path: &Path) -> io::Result<FileReader> {
    let file = File::open(path)?;
    let reader = if is_gzipped(path)? {
        FileReader::Gzipped(MultiGzDecoder::new(file))
    } else {
        FileReader::Uncompressed(BufReader::new(file))
    };
    Ok(reader)
}


/// Concatenates `inputs`, in order, into `output`, truncating it first.
///
/// # Arguments
///
/// * `inputs` - Files to join; callers guard the empty case themselves.
/// * `output` - Destination file.
///
/// # Returns
/// Number of bytes written.
pub async fn concatenate_files(inputs: &[PathBuf], output: &Path) -> io::Result<u64> {
    let out = TokioFile::create(output).await?;
    let mut writer = BufWriter::new(out);
    let mut total = 0u64;
    for input in inputs {
        let mut reader = TokioFile::open(input).await?;
        total += tokio::io::copy(&mut reader, &mut writer).await?;
    }
    writer.flush().await?;
    Ok(total)
}
