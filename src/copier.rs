// dir2iso/src/copier.rs
//! Streams serialized sectors into the caller's sink.

use std::io::{self, ErrorKind, Write};

use log::{info, warn};

use crate::error::{ImageError, Result};
use crate::utils::SECTOR_SIZE;

/// Retries allowed for one chunk after its first failed write.
pub const MAX_WRITE_RETRIES: u32 = 3;

/// Bytes pulled from the serializer and bytes accepted by the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteCounters {
    pub bytes_read: u64,
    pub bytes_written: u64,
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}

/// Copies every sector in order into `sink`, then flushes it.
///
/// A source error stops the copy and is returned as is. Transient sink
/// errors are retried for the chunk that failed; other sink errors, or
/// running out of retries, end with [`ImageError::Write`].
pub fn copy_stream<I, W>(sectors: I, sink: &mut W) -> Result<ByteCounters>
where
    I: IntoIterator<Item = Result<[u8; SECTOR_SIZE]>>,
    W: Write + ?Sized,
{
    let mut counters = ByteCounters::default();
    for sector in sectors {
        let sector = sector?;
        counters.bytes_read += sector.len() as u64;
        write_chunk(sink, &sector, &mut counters)?;
    }
    retry(|| sink.flush())?;
    info!(
        "copied image: read {} bytes, wrote {} bytes",
        counters.bytes_read, counters.bytes_written
    );
    Ok(counters)
}

fn write_chunk<W: Write + ?Sized>(
    sink: &mut W,
    chunk: &[u8],
    counters: &mut ByteCounters,
) -> Result<()> {
    let mut written = 0;
    let mut failures = 0;
    while written < chunk.len() {
        match sink.write(&chunk[written..]) {
            Ok(0) => {
                return Err(ImageError::Write {
                    attempts: failures + 1,
                    source: io::Error::new(ErrorKind::WriteZero, "sink accepted no bytes"),
                });
            }
            Ok(n) => {
                written += n;
                counters.bytes_written += n as u64;
            }
            Err(err) if is_transient(&err) && failures < MAX_WRITE_RETRIES => {
                failures += 1;
                warn!("write failed ({}), retry {} of {}", err, failures, MAX_WRITE_RETRIES);
            }
            Err(err) => {
                return Err(ImageError::Write {
                    attempts: failures + 1,
                    source: err,
                });
            }
        }
    }
    Ok(())
}

fn retry(mut op: impl FnMut() -> io::Result<()>) -> Result<()> {
    let mut failures = 0;
    loop {
        match op() {
            Ok(()) => return Ok(()),
            Err(err) if is_transient(&err) && failures < MAX_WRITE_RETRIES => failures += 1,
            Err(err) => {
                return Err(ImageError::Write {
                    attempts: failures + 1,
                    source: err,
                });
            }
        }
    }
}
