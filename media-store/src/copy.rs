use std::io::{Read, Write};
use tokio_util::sync::CancellationToken;

/// The operation was cancelled by its caller.
///
/// This is the only error the store lets through its public operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Failure of a copy loop
#[derive(Debug)]
pub enum CopyError {
    Io(std::io::Error),
    Cancelled,
}

impl std::fmt::Display for CopyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CopyError::Io(e) => write!(f, "IO error: {}", e),
            CopyError::Cancelled => write!(f, "Copy cancelled"),
        }
    }
}

impl std::error::Error for CopyError {}

impl From<std::io::Error> for CopyError {
    fn from(err: std::io::Error) -> Self {
        CopyError::Io(err)
    }
}

/// Copies `head` followed by the rest of `reader` into `writer` in chunks of
/// `buffer_size`, checking `cancel` between chunks.
///
/// Returns the number of bytes written. Both streams are consumed and dropped
/// (closed) before this returns, on success, failure and cancellation alike.
pub fn copy_chunked(
    head: &[u8],
    mut reader: Box<dyn Read + Send>,
    mut writer: Box<dyn Write + Send>,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<u64, CopyError> {
    if cancel.is_cancelled() {
        return Err(CopyError::Cancelled);
    }

    writer.write_all(head)?;
    let mut total = head.len() as u64;
    let mut buffer = vec![0u8; buffer_size.max(1)];

    loop {
        if cancel.is_cancelled() {
            log::debug!("Copy cancelled after {} bytes", total);
            return Err(CopyError::Cancelled);
        }

        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Io(e)),
        };

        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }

    writer.flush()?;
    Ok(total)
}

/// Reads up to `limit` bytes from the start of `reader` for format sniffing
pub fn read_head(reader: &mut dyn Read, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(limit);
    <&mut dyn Read as Read>::take(reader, limit as u64).read_to_end(&mut head)?;
    Ok(head)
}
