//! Capture-file transport
//!
//! A capture is a sequence of records, each a `u32` little-endian length
//! followed by one driver datagram of that length.

use crate::error::{Result, SyncdError};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

/// Largest datagram the driver sends
pub const MAX_RECORD_LEN: usize = 64 * 1024;

/// Reader over one capture
pub struct CaptureSource<R> {
    name: String,
    reader: R,
}

impl CaptureSource<BufReader<File>> {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|e| {
            SyncdError::Transport(format!("cannot open {}: {}", path.display(), e))
        })?;
        Ok(Self::new(path.display().to_string(), BufReader::new(file)))
    }
}

impl<R: AsyncRead + Unpin> CaptureSource<R> {
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next datagram, `None` at a clean end of capture
    pub async fn next_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut len = [0u8; 4];
        match self.reader.read_exact(&mut len).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len) as usize;
        if len > MAX_RECORD_LEN {
            return Err(SyncdError::Transport(format!(
                "{}: record of {} bytes exceeds {}",
                self.name, len, MAX_RECORD_LEN
            )));
        }

        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf).await.map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                SyncdError::Transport(format!("{}: capture ends mid-record", self.name))
            } else {
                SyncdError::Io(e)
            }
        })?;
        Ok(Some(buf))
    }
}

/// Append one datagram to a capture
pub fn write_record<W: Write>(writer: &mut W, datagram: &[u8]) -> Result<()> {
    if datagram.len() > MAX_RECORD_LEN {
        return Err(SyncdError::Transport(format!(
            "record of {} bytes exceeds {}",
            datagram.len(),
            MAX_RECORD_LEN
        )));
    }
    writer.write_all(&(datagram.len() as u32).to_le_bytes())?;
    writer.write_all(datagram)?;
    Ok(())
}
