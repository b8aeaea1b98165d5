//! JSONL persistence - one receipt per line, append-only

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;
use trumpproof_types::Receipt;

use crate::{ChainError, ChainErrorKind, LedgerError, Result};

/// Receipts read back from a JSONL file, without verification
#[derive(Debug, Default)]
pub struct LoadedReceipts {
    /// Parsed prefix of the file
    pub receipts: Vec<Receipt>,
    /// First line that no longer parses, located by its line position
    pub unparseable: Option<ChainError>,
}

/// Read every line of a ledger file. Loading stops at the first line that
/// does not parse; the receipts before it are returned.
pub fn load_jsonl(path: impl AsRef<Path>) -> Result<LoadedReceipts> {
    let path = path.as_ref();
    let mut loaded = LoadedReceipts::default();
    if !path.exists() {
        return Ok(loaded);
    }

    let reader = BufReader::new(File::open(path)?);
    for (position, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<Receipt>(&line) {
            Ok(receipt) => loaded.receipts.push(receipt),
            Err(e) => {
                let at = loaded.receipts.len() as u64;
                warn!(
                    path = %path.display(),
                    line = position + 1,
                    sequence_no = at,
                    error = %e,
                    "Ledger line does not parse"
                );
                loaded.unparseable = Some(ChainError::new(at, ChainErrorKind::Unparseable(e.to_string())));
                break;
            }
        }
    }

    Ok(loaded)
}

/// Append-only JSONL writer
pub struct JsonlStore {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlStore {
    /// Open (creating if needed) a ledger file for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Write one receipt as a line and flush
    pub fn append(&mut self, receipt: &Receipt) -> Result<()> {
        let json = serde_json::to_string(receipt).map_err(|e| LedgerError::Serialization {
            message: e.to_string(),
        })?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JsonlStore {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
