//! Descriptor validation for selected `.meta` files.
//!
//! A descriptor is recognised by the `ShopPedApparel` marker in its first two
//! lines. Nothing else about the file is inspected here; full parsing belongs
//! to the addon loader.
//!
//! # Examples
//!
//! ```ignore
//! use clothkit::services::descriptor::validate;
//! use camino::Utf8Path;
//!
//! if validate(Utf8Path::new("mp_m_freemode_01_tshirt.meta")).await {
//!     // load it
//! }
//! ```

use crate::models::CandidateFile;
use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};

/// Upper bound on bytes read while looking for the header lines.
const MAX_HEADER_BYTES: u64 = 1024 * 1024;

/// Read the first two lines of a candidate file.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected, so a
/// stray Latin-1 comment does not hide a marker on the other line.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub async fn read_candidate(path: &Utf8Path) -> io::Result<CandidateFile> {
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file.take(MAX_HEADER_BYTES));

    let first_line = next_lossy_line(&mut reader).await?;
    let second_line = match first_line {
        Some(_) => next_lossy_line(&mut reader).await?,
        None => None,
    };

    Ok(CandidateFile::new(path, first_line, second_line))
}

async fn next_lossy_line<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Decide whether a file is a genuine addon descriptor.
///
/// Unreadable files are reported as invalid and logged, never returned as errors,
/// so one bad file cannot abort a multi-file selection.
pub async fn validate(path: &Utf8Path) -> bool {
    match read_candidate(path).await {
        Ok(candidate) if candidate.has_marker() => {
            tracing::debug!("Descriptor marker found in {}", path);
            true
        }
        Ok(_) => {
            tracing::warn!(
                "Skipped file {} as it is probably not a correct .meta file",
                path
            );
            false
        }
        Err(e) => {
            tracing::warn!("Skipped file {} as it could not be read: {}", path, e);
            false
        }
    }
}

/// Keep only the candidates that pass [`validate`], preserving selection order.
pub async fn filter_valid(paths: &[Utf8PathBuf]) -> Vec<Utf8PathBuf> {
    let mut valid = Vec::with_capacity(paths.len());
    for path in paths {
        if validate(path).await {
            valid.push(path.clone());
        }
    }
    valid
}
